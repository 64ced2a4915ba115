//! Benchmark helpers for stagekv.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
