//! # Stream Writer
//!
//! Sequential row writing: `create` emits the stream header at the newest
//! version (`with_version` picks an older one), `write_row` appends
//! length-prefixed records, `finish_table` emits the end-of-table sentinel
//! so another table header may follow via `start_table`. `append` reopens an
//! existing stream, validates layout compatibility, and continues at the
//! tail.

use std::io::{Read, Write};

use eyre::Result;

use crate::encoding::varint::write_7bit_u64;
use crate::error;
use crate::types::{DataType, FieldProperties, Row, RowLayout, TableFlags};

use super::codec::{encode_field, FieldCodec};
use super::reader::DatReader;
use super::{build_codecs, write_header_string, CURRENT_VERSION, MAGIC, MAX_VERSION, MIN_VERSION};

/// Sequential writer for one binary row stream.
pub struct DatWriter<W: Write> {
    out: W,
    version: u8,
    layout: RowLayout,
    codecs: Vec<FieldCodec>,
    /// Field-order map for appends through a reordered caller layout:
    /// `reorder[i]` is the incoming-row slot of stored field `i`.
    reorder: Option<Vec<usize>>,
    scratch: Vec<u8>,
}

impl<W: Write> DatWriter<W> {
    /// Starts a new stream at the current format version.
    pub fn create(out: W, layout: &RowLayout) -> Result<Self> {
        Self::with_version(out, layout, CURRENT_VERSION)
    }

    /// Starts a new stream at an explicit format version (1-5).
    pub fn with_version(mut out: W, layout: &RowLayout, version: u8) -> Result<Self> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(error::unsupported(format!(
                "cannot write stream version {version}"
            )));
        }
        let codecs = build_codecs(layout, version)?;
        write_header(&mut out, version, layout)?;
        Ok(Self {
            out,
            version,
            layout: layout.clone(),
            codecs,
            reorder: None,
            scratch: Vec::new(),
        })
    }

    /// Reopens an existing stream for appending: the stored layout must be
    /// compatible with `layout`, and the stream must not carry an
    /// end-of-table sentinel. Appended records follow the stored header's
    /// field order and flags; incoming rows stay in `layout` order.
    pub fn append(mut stream: W, layout: &RowLayout) -> Result<Self>
    where
        W: Read,
    {
        let (version, stored) = {
            let mut reader = DatReader::open(&mut stream)?;
            while reader.read_row()?.is_some() {}
            if reader.end_of_table() {
                return Err(error::unsupported(
                    "cannot append after an end-of-table sentinel",
                ));
            }
            (reader.version(), reader.layout().clone())
        };
        RowLayout::check(layout, &stored, TableFlags::NONE)?;
        // The stream header keeps the stored order and flags, so records
        // must be encoded against the stored fields, not the caller's.
        let mut reorder = Vec::with_capacity(stored.len());
        for field in stored.fields() {
            let slot = layout.field_index(field.name()).ok_or_else(|| {
                error::schema_mismatch(
                    stored.name(),
                    format!("layout is missing stored field `{}`", field.name()),
                )
            })?;
            reorder.push(slot);
        }
        let identity = reorder.iter().copied().eq(0..stored.len());
        let codecs = build_codecs(&stored, version)?;
        Ok(Self {
            out: stream,
            version,
            layout: stored,
            codecs,
            reorder: if identity { None } else { Some(reorder) },
            scratch: Vec::new(),
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Appends one row as a length-prefixed record.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        if row.len() != self.layout.len() {
            return Err(error::schema_mismatch(
                self.layout.name(),
                format!(
                    "row carries {} value(s) for a {}-field layout",
                    row.len(),
                    self.layout.len()
                ),
            ));
        }
        self.scratch.clear();
        let values = row.values();
        for (index, (field, codec)) in self.layout.fields().iter().zip(&self.codecs).enumerate() {
            let slot = match &self.reorder {
                Some(map) => map[index],
                None => index,
            };
            encode_field(&mut self.scratch, field, &values[slot], *codec)?;
        }
        write_7bit_u64(&mut self.out, self.scratch.len() as u64)?;
        self.out.write_all(&self.scratch)?;
        Ok(())
    }

    /// Emits the end-of-table sentinel. Call before [`Self::start_table`];
    /// a stream ending without a sentinel is also valid (plain EOF).
    pub fn finish_table(&mut self) -> Result<()> {
        write_7bit_u64(&mut self.out, 0)?;
        Ok(())
    }

    /// Starts another table in the same stream, at the same version.
    pub fn start_table(&mut self, layout: &RowLayout) -> Result<()> {
        self.codecs = build_codecs(layout, self.version)?;
        write_header(&mut self.out, self.version, layout)?;
        self.layout = layout.clone();
        self.reorder = None;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_header<W: Write>(out: &mut W, version: u8, layout: &RowLayout) -> Result<()> {
    out.write_all(&MAGIC)?;
    write_7bit_u64(out, version as u64)?;
    write_header_string(out, layout.name())?;
    write_7bit_u64(out, layout.len() as u64)?;
    for field in layout.fields() {
        write_field(out, field)?;
    }
    Ok(())
}

fn write_field<W: Write>(out: &mut W, field: &FieldProperties) -> Result<()> {
    write_header_string(out, field.name())?;
    out.write_all(&[field.data_type() as u8])?;
    write_7bit_u64(out, field.flags().bits() as u64)?;
    match field.data_type() {
        DataType::String | DataType::User => {
            out.write_all(&[field.string_encoding() as u8])?;
        }
        DataType::DateTime | DataType::TimeSpan => {
            out.write_all(&[field.date_time_kind() as u8, field.date_time_type() as u8])?;
        }
        _ => {}
    }
    if field.data_type().requires_value_type() {
        let value_type = field.value_type().ok_or_else(|| {
            error::unsupported(format!(
                "field `{}`: {:?} fields require a value type name",
                field.name(),
                field.data_type()
            ))
        })?;
        write_header_string(out, value_type)?;
    }
    Ok(())
}
