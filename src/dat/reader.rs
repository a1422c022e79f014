//! # Stream Reader
//!
//! Sequential row reading with backward compatibility across every format
//! revision. Row records are length-prefixed, so a reader skips trailing
//! bytes it does not understand within a record; a zero-length record marks
//! the end of the current table, after which [`DatReader::next_table`] may
//! pick up another header in the same stream.

use std::io::Read;

use eyre::Result;

use crate::encoding::varint::{read_7bit_u64, read_7bit_u64_opt};
use crate::error;
use crate::types::{
    DataType, DateTimeKind, DateTimeType, FieldFlags, FieldProperties, Row, RowLayout,
    StringEncoding,
};

use super::codec::{decode_field, read_byte, FieldCodec};
use super::{build_codecs, read_header_string, MAGIC, MAX_VERSION, MIN_VERSION};

/// Sequential reader for one binary row stream.
#[derive(Debug)]
pub struct DatReader<R: Read> {
    input: R,
    version: u8,
    layout: RowLayout,
    codecs: Vec<FieldCodec>,
    end_of_table: bool,
}

impl<R: Read> DatReader<R> {
    /// Opens a stream: validates the magic tag and version, then reads the
    /// schema header.
    pub fn open(mut input: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        input
            .read_exact(&mut magic)
            .map_err(|_| error::corruption("stream too short for magic tag"))?;
        if magic != MAGIC {
            return Err(error::corruption("bad magic tag"));
        }
        let (version, layout) = read_header(&mut input)?;
        let codecs = build_codecs(&layout, version)?;
        Ok(Self {
            input,
            version,
            layout,
            codecs,
            end_of_table: false,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// True once the end-of-table sentinel has been consumed.
    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// Reads the next row. `Ok(None)` at the end-of-table sentinel or at
    /// clean end of stream; truncation inside a record is a data error.
    pub fn read_row(&mut self) -> Result<Option<Row>> {
        if self.end_of_table {
            return Ok(None);
        }
        let length = match read_7bit_u64_opt(&mut self.input)? {
            None => return Ok(None),
            Some(0) => {
                self.end_of_table = true;
                return Ok(None);
            }
            Some(length) => length as usize,
        };
        let mut payload = vec![0u8; length];
        self.input
            .read_exact(&mut payload)
            .map_err(|_| error::corruption("truncated row record"))?;
        let mut cursor = payload.as_slice();
        let mut values = Vec::with_capacity(self.layout.len());
        for (field, codec) in self.layout.fields().iter().zip(&self.codecs) {
            values.push(decode_field(&mut cursor, field, *codec)?);
        }
        // Trailing bytes within the declared length belong to a newer
        // writer; skip them.
        Ok(Some(Row::from(values)))
    }

    /// Reads every remaining row of the current table.
    pub fn read_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.read_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Advances to the next table header after an end-of-table sentinel.
    /// Returns false at clean end of stream, or when the current table ended
    /// without a sentinel.
    pub fn next_table(&mut self) -> Result<bool> {
        while self.read_row()?.is_some() {}
        if !self.end_of_table {
            return Ok(false);
        }
        let mut magic = [0u8; 8];
        let first = self.input.read(&mut magic[..1])?;
        if first == 0 {
            return Ok(false);
        }
        self.input
            .read_exact(&mut magic[1..])
            .map_err(|_| error::corruption("stream too short for magic tag"))?;
        if magic != MAGIC {
            return Err(error::corruption("bad magic tag"));
        }
        let (version, layout) = read_header(&mut self.input)?;
        self.codecs = build_codecs(&layout, version)?;
        self.version = version;
        self.layout = layout;
        self.end_of_table = false;
        Ok(true)
    }
}

/// Reads version, table name, and field metadata (everything after the magic
/// tag).
fn read_header<R: Read>(input: &mut R) -> Result<(u8, RowLayout)> {
    let version = read_7bit_u64(input)?;
    if !(MIN_VERSION as u64..=MAX_VERSION as u64).contains(&version) {
        return Err(error::corruption(format!(
            "unsupported stream version {version}"
        )));
    }
    let version = version as u8;
    let name = read_header_string(input)?;
    let count = read_7bit_u64(input)? as usize;
    let mut fields = Vec::with_capacity(count);
    for index in 0..count {
        fields.push(read_field(input, index)?);
    }
    let layout = RowLayout::decoded(name, fields)?;
    Ok((version, layout))
}

fn read_field<R: Read>(input: &mut R, index: usize) -> Result<FieldProperties> {
    let name = read_header_string(input)?;
    let data_type = DataType::try_from(read_byte(input)?)?;
    let bits = read_7bit_u64(input)?;
    let bits = u32::try_from(bits)
        .map_err(|_| error::corruption(format!("field flag bits out of range: {bits:#x}")))?;
    let flags = FieldFlags::from_bits(bits)?;
    let mut field = FieldProperties::new(index, name, data_type).with_flags(flags);
    match data_type {
        DataType::String | DataType::User => {
            field = field.with_string_encoding(StringEncoding::try_from(read_byte(input)?)?);
        }
        DataType::DateTime | DataType::TimeSpan => {
            let kind = DateTimeKind::try_from(read_byte(input)?)?;
            let date_time_type = DateTimeType::try_from(read_byte(input)?)?;
            field = field.with_date_time(kind, date_time_type);
        }
        _ => {}
    }
    if data_type.requires_value_type() {
        field = field.with_value_type(read_header_string(input)?);
    }
    Ok(field)
}
