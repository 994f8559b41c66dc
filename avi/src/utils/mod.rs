//! Utility functions and supporting infrastructure.
//!
//! Provides the input staging buffer, little-endian field reading and error
//! types used by the demultiplexer.

pub mod accumulator;
pub mod byte_reader;
pub mod errors;
