//! # Encoding Primitives
//!
//! Shared low-level encodings for the binary row format.

pub mod varint;

pub use varint::{
    read_7bit_i64, read_7bit_u128, read_7bit_u64, read_7bit_u64_opt, unzigzag, unzigzag128,
    varint_len, write_7bit_i64, write_7bit_u128, write_7bit_u64, zigzag, zigzag128,
};
