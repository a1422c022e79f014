//! # SQL Command Building
//!
//! Text/parameter accumulation shared by the predicate compiler and the
//! table engine.

pub mod command;

pub use command::{SqlCommand, SqlParam};
