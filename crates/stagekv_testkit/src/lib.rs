//! # stagekv Testkit
//!
//! Test utilities for stagekv.
//!
//! This crate provides:
//! - Conformance suites every bucket implementation should pass
//! - Fixtures: temporary file buckets and a fault-injecting bucket
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent transactions
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stagekv_testkit::prelude::*;
//!
//! #[test]
//! fn my_bucket_conforms() {
//!     let ctx = Context::background();
//!     check_bucket_simple(&ctx, &MyBucket::new());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod tracing_setup;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::tracing_setup::*;
    pub use stagekv_storage::Context;
}

pub use conformance::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use tracing_setup::*;
