// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! # Lazy RLE-to-flat chunk decoding
//!
//! [DecodeArray] wraps an array whose chunks may be run-length encoded and
//! presents the same schema with every non-bitmap chunk expanded to a flat
//! payload.  Expansion is deferred until a consumer actually asks for a
//! chunk, performed at most once per position per iterator, and skipped
//! entirely for the existence-bitmap attribute: its chunks encode presence,
//! not compressible cell values, and are forwarded untouched.
//!
//! [materialize] is the expansion itself: a pure function from an RLE chunk
//! to a freshly allocated flat chunk.  The output size is known exactly up
//! front (`count * elem_size` plus fixed overhead), so it is a single
//! allocation rather than a growable [crate::buffer::PayloadBuilder].

use std::sync::Arc;

use log::trace;
use snafu::{location, Location};

use tessera_core::datatypes::{AttributeId, Coordinate, Schema};
use tessera_core::{Error, Result};

use crate::data::{Array, ArrayIterator, Chunk};
use crate::format::{PayloadHeader, Segment, FLAT_OVERHEAD};

/// Expands `source` into a flat payload of `elem_size`-byte cells.
///
/// The result holds one cell slot per logical position, segment records
/// `{0, 0}` and `{count, count}`, and carries over the source's coordinates
/// and its existence-bitmap association (shared, not copied).  The source is
/// not mutated.
///
/// Only fixed-width, non-null cells can be expanded; a variable-width source
/// or a NULL run is rejected rather than copied blindly.
pub fn materialize(source: &Chunk, elem_size: u64) -> Result<Chunk> {
    if elem_size == 0 {
        return Err(Error::not_supported(
            "variable-width attributes cannot be materialized to a fixed stride",
            location!(),
        ));
    }
    let count = source.cell_count();
    if count > u32::MAX as u64 {
        return Err(Error::invalid_input(
            format!("{} cells do not fit a segment record", count),
            location!(),
        ));
    }
    trace!("materializing {} cells of {} bytes", count, elem_size);

    let data_size = elem_size * count;
    let mut buf = vec![0u8; FLAT_OVERHEAD + data_size as usize];
    PayloadHeader::flat(count, elem_size).write(&mut buf)?;
    Segment::new(0, 0).write(&mut buf, 0)?;
    Segment::new(count, count as u32).write(&mut buf, 1)?;

    let mut write_pos = FLAT_OVERHEAD;
    let mut cursor = source.cells()?;
    while let Some(value) = cursor.try_next()? {
        if value.len() as u64 != elem_size {
            return Err(Error::Internal {
                message: format!(
                    "source cell is {} bytes, attribute declares {}",
                    value.len(),
                    elem_size
                ),
                location: location!(),
            });
        }
        buf[write_pos..write_pos + value.len()].copy_from_slice(value);
        write_pos += value.len();
    }
    if write_pos != buf.len() {
        return Err(Error::Internal {
            message: format!(
                "source cursor produced {} data bytes, chunk declares {}",
                write_pos - FLAT_OVERHEAD,
                data_size
            ),
            location: location!(),
        });
    }

    let flat = Chunk::new(source.coords().to_vec(), buf, count);
    Ok(match source.bitmap() {
        Some(bitmap) => flat.with_bitmap(bitmap.clone()),
        None => flat,
    })
}

/// An array wrapper that materializes non-bitmap chunks on demand.
///
/// The wrapper is pure pass-through at the schema level; only the internal
/// chunk encoding changes.  A cache of materialized chunks across positions
/// was considered and deliberately not built; the surrounding engine drives
/// one chunk at a time, so a single slot per iterator is enough.
pub struct DecodeArray {
    input: Arc<dyn Array>,
}

impl DecodeArray {
    pub fn new(input: Arc<dyn Array>) -> Self {
        Self { input }
    }

    /// The operator's type check: the chunk encoding changes, the schema
    /// does not.
    pub fn output_schema(input: &Schema) -> Schema {
        input.clone()
    }
}

impl Array for DecodeArray {
    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn iterator(&self, attr: AttributeId) -> Result<Box<dyn ArrayIterator + '_>> {
        let schema = self.input.schema();
        let attribute = schema.attribute(attr).ok_or_else(|| Error::Schema {
            message: format!("no attribute {} in the schema", attr),
            location: location!(),
        })?;
        Ok(Box::new(DecodeArrayIterator {
            inner: self.input.iterator(attr)?,
            cached: None,
            is_bitmap: schema.is_bitmap_attribute(attr),
            elem_size: attribute.size(),
        }))
    }
}

/// Per-attribute cursor of a [DecodeArray].
///
/// Holds the single most recently materialized chunk; any positional move
/// clears it, so a later read recomputes at the new position.
pub struct DecodeArrayIterator<'a> {
    inner: Box<dyn ArrayIterator + 'a>,
    cached: Option<Arc<Chunk>>,
    is_bitmap: bool,
    elem_size: u64,
}

impl ArrayIterator for DecodeArrayIterator<'_> {
    fn chunk(&mut self) -> Result<Arc<Chunk>> {
        if let Some(chunk) = &self.cached {
            return Ok(chunk.clone());
        }
        let source = self.inner.chunk()?;
        if self.is_bitmap {
            return Ok(source);
        }
        let flat = Arc::new(materialize(&source, self.elem_size)?);
        self.cached = Some(flat.clone());
        Ok(flat)
    }

    fn advance(&mut self) -> Result<()> {
        self.cached = None;
        self.inner.advance()
    }

    fn set_position(&mut self, coords: &[Coordinate]) -> Result<bool> {
        self.cached = None;
        self.inner.set_position(coords)
    }

    fn restart(&mut self) {
        self.cached = None;
        self.inner.restart();
    }

    fn end(&self) -> bool {
        self.inner.end()
    }
}

/// Thin operator surface: wrap `input` so consumers see flat chunks.
pub fn decode(input: Arc<dyn Array>) -> Arc<dyn Array> {
    Arc::new(DecodeArray::new(input))
}
