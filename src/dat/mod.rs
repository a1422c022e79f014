//! # Binary Row Streams
//!
//! A versioned stream format carrying schema and row data outside any
//! database, reusing only the data model. Independent of the SQL layers.
//!
//! ## Stream Layout
//!
//! | Section | Encoding |
//! |---------|----------|
//! | magic | 8 bytes `DatTable` |
//! | version | 7-bit var-int, 1-5 |
//! | table name | length-prefixed string |
//! | field count | 7-bit var-int |
//! | fields[] | name, type code, flags, type-specific extras |
//! | rows[] | (length var-int, payload) records |
//!
//! Row records are length-prefixed so readers can always skip unconsumed
//! trailing bytes; a zero-length record is the end-of-table sentinel inside
//! a stream (normal EOF is simply reaching stream end). Per-field encoding
//! depends on the declared type, the stream version, and nullability; the
//! exact rules live in [`codec`].

pub mod codec;
pub mod reader;
pub mod writer;

pub use codec::{codec_for, FieldCodec};
pub use reader::DatReader;
pub use writer::DatWriter;

use std::io::{Read, Write};

use eyre::Result;

use crate::encoding::varint::{read_7bit_u64, write_7bit_u64};
use crate::error;
use crate::types::RowLayout;

/// Resolves the per-field codecs of a whole layout at one version.
pub(crate) fn build_codecs(layout: &RowLayout, version: u8) -> Result<Vec<FieldCodec>> {
    layout
        .fields()
        .iter()
        .map(|field| codec_for(field.data_type(), version, field.is_nullable()))
        .collect()
}

/// Stream magic tag.
pub const MAGIC: [u8; 8] = *b"DatTable";

/// Oldest readable format revision.
pub const MIN_VERSION: u8 = 1;

/// Newest format revision; the only one supporting nullable numerics.
pub const MAX_VERSION: u8 = 5;

/// Revision written by default.
pub const CURRENT_VERSION: u8 = MAX_VERSION;

/// Writes a header string: unsigned 7-bit length plus UTF-8 bytes.
pub(crate) fn write_header_string<W: Write>(out: &mut W, text: &str) -> Result<()> {
    write_7bit_u64(out, text.len() as u64)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Reads a header string written by [`write_header_string`].
pub(crate) fn read_header_string<R: Read>(input: &mut R) -> Result<String> {
    let len = read_7bit_u64(input)? as usize;
    let mut buf = vec![0u8; len];
    input
        .read_exact(&mut buf)
        .map_err(|_| error::corruption("truncated header string"))?;
    String::from_utf8(buf).map_err(|_| error::corruption("header string is not valid UTF-8"))
}
