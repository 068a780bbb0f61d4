//! Fixed-layout binary I/O shared by settings records and wire payloads

pub mod binary;

pub use binary::{read, read_array, read_clamped, read_value, write, write_array, BinaryRecord, Scalar};
