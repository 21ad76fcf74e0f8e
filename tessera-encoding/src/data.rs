// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! Chunk containers and position-order cell iteration

use std::sync::Arc;

use snafu::{location, Location};

use tessera_core::datatypes::{AttributeId, Coordinate, Schema};
use tessera_core::{Error, Result};

use crate::buffer::ChunkBuffer;
use crate::format::{PayloadHeader, Segment};

/// A positionally addressed unit of storage for one attribute of one
/// coordinate region of an array.
///
/// Chunks are created by the storage layer (or by materialization) and are
/// immutable afterwards; consumers share them through `Arc`.  The payload is
/// an opaque byte buffer in the layout described by [crate::format], except
/// for existence-bitmap chunks, whose bytes this crate never interprets.
#[derive(Debug)]
pub struct Chunk {
    coords: Vec<Coordinate>,
    payload: ChunkBuffer,
    cell_count: u64,
    bitmap: Option<Arc<Chunk>>,
}

impl Chunk {
    /// A chunk whose cell count the caller already knows.  The payload bytes
    /// are not inspected.
    pub fn new(
        coords: Vec<Coordinate>,
        payload: impl Into<ChunkBuffer>,
        cell_count: u64,
    ) -> Self {
        Self {
            coords,
            payload: payload.into(),
            cell_count,
            bitmap: None,
        }
    }

    /// Validates an RLE payload and derives the cell count from its terminal
    /// sentinel segment.
    pub fn from_rle_payload(
        coords: Vec<Coordinate>,
        payload: impl Into<ChunkBuffer>,
    ) -> Result<Self> {
        let payload = payload.into();
        let header = PayloadHeader::read(&payload)?;
        let sentinel = Segment::read(&payload, header.n_segs as usize)?;
        let data_end = header.segments_end() + header.data_size as usize;
        if data_end > payload.len() {
            return Err(Error::invalid_input(
                format!(
                    "payload is {} bytes but its header describes {}",
                    payload.len(),
                    data_end
                ),
                location!(),
            ));
        }
        Ok(Self {
            coords,
            payload,
            cell_count: sentinel.start,
            bitmap: None,
        })
    }

    pub fn with_bitmap(mut self, bitmap: Arc<Chunk>) -> Self {
        self.bitmap = Some(bitmap);
        self
    }

    /// Chunk-corner coordinates within the array.
    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of logical cells the chunk holds.
    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    /// The existence-bitmap chunk this chunk is associated with, if any.
    pub fn bitmap(&self) -> Option<&Arc<Chunk>> {
        self.bitmap.as_ref()
    }

    /// A cursor over the chunk's logical cells in position order.
    pub fn cells(&self) -> Result<CellCursor<'_>> {
        CellCursor::try_new(self)
    }
}

/// Iterates the logical cells of an RLE payload in ascending position order,
/// yielding each cell's raw fixed-width value bytes.
///
/// Runs are resolved through the segment table: a SAME run yields the same
/// value slice for every position it covers, a plain run walks consecutive
/// value indices.  Value offsets are bounds-checked against the data area on
/// every step, so a corrupt table surfaces as an error rather than a wild
/// read.
#[derive(Debug)]
pub struct CellCursor<'a> {
    payload: &'a [u8],
    elem_size: usize,
    data_offset: usize,
    data_end: usize,
    seg: Segment,
    seg_end: u64,
    seg_index: usize,
    pos: u64,
    total: u64,
}

impl<'a> CellCursor<'a> {
    fn try_new(chunk: &'a Chunk) -> Result<Self> {
        let payload = chunk.payload();
        let header = PayloadHeader::read(payload)?;
        if header.elem_size == 0 {
            return Err(Error::not_supported(
                "variable-width payloads have no fixed-stride cells to iterate",
                location!(),
            ));
        }
        let sentinel = Segment::read(payload, header.n_segs as usize)?;
        let total = sentinel.start;

        let (seg, seg_end) = if total == 0 {
            (Segment::new(0, 0), 0)
        } else {
            (
                Segment::read(payload, 0)?,
                Segment::read(payload, 1)?.start,
            )
        };

        let data_offset = header.data_offset();
        Ok(Self {
            payload,
            elem_size: header.elem_size as usize,
            data_offset,
            data_end: header.segments_end() + header.data_size as usize,
            seg,
            seg_end,
            seg_index: 0,
            pos: 0,
            total,
        })
    }

    /// The value bytes of the next cell, or `None` past the last position.
    pub fn try_next(&mut self) -> Result<Option<&'a [u8]>> {
        if self.pos == self.total {
            return Ok(None);
        }
        while self.pos >= self.seg_end {
            self.seg_index += 1;
            self.seg = Segment::read(self.payload, self.seg_index)?;
            self.seg_end = Segment::read(self.payload, self.seg_index + 1)?.start;
        }
        if self.seg.null {
            return Err(Error::not_supported(
                format!("null run at position {} cannot be materialized", self.pos),
                location!(),
            ));
        }

        let value_index = if self.seg.same {
            self.seg.value_index as u64
        } else {
            self.seg.value_index as u64 + (self.pos - self.seg.start)
        };
        let start = self.data_offset + value_index as usize * self.elem_size;
        let end = start + self.elem_size;
        if end > self.data_end {
            return Err(Error::invalid_input(
                format!(
                    "value index {} of position {} reaches past the data area",
                    value_index, self.pos
                ),
                location!(),
            ));
        }
        self.pos += 1;
        Ok(Some(&self.payload[start..end]))
    }
}

impl<'a> Iterator for CellCursor<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}

/// A chunked array the surrounding engine drives one attribute at a time.
///
/// Iterators over disjoint attributes may be advanced from different worker
/// threads; implementations hold no shared mutable state across them.
pub trait Array: Send + Sync {
    fn schema(&self) -> &Schema;

    /// A position-ordered cursor over one attribute's chunks.
    fn iterator(&self, attr: AttributeId) -> Result<Box<dyn ArrayIterator + '_>>;
}

/// Position-ordered cursor over the chunks of one attribute.
pub trait ArrayIterator {
    /// The chunk at the current position.
    fn chunk(&mut self) -> Result<Arc<Chunk>>;

    /// Move to the next chunk in position order.
    fn advance(&mut self) -> Result<()>;

    /// Seek to the chunk anchored at `coords`.  Returns false (leaving the
    /// position unchanged) if no chunk exists there.
    fn set_position(&mut self, coords: &[Coordinate]) -> Result<bool>;

    /// Rewind to the first chunk.
    fn restart(&mut self);

    /// True once the cursor has moved past the last chunk.
    fn end(&self) -> bool;
}

impl std::fmt::Debug for dyn ArrayIterator + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ArrayIterator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rle_payload, Run};

    #[test]
    fn test_from_rle_payload_derives_count() {
        let payload = rle_payload(
            4,
            &[
                Run::Same {
                    len: 5,
                    value: &7u32.to_le_bytes(),
                },
                Run::Literal {
                    values: &[1, 0, 0, 0, 2, 0, 0, 0],
                },
            ],
        );
        let chunk = Chunk::from_rle_payload(vec![0, 0], payload).unwrap();
        assert_eq!(chunk.cell_count(), 7);
    }

    #[test]
    fn test_from_rle_payload_rejects_garbage() {
        let err = Chunk::from_rle_payload(vec![0], b"not a payload".to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_from_rle_payload_rejects_truncated_data_area() {
        let mut payload = rle_payload(
            4,
            &[Run::Literal {
                values: &[1, 0, 0, 0, 2, 0, 0, 0],
            }],
        );
        payload.truncate(payload.len() - 1);
        let err = Chunk::from_rle_payload(vec![0], payload).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_cursor_expands_runs_in_position_order() {
        let payload = rle_payload(
            2,
            &[
                Run::Same {
                    len: 3,
                    value: &100u16.to_le_bytes(),
                },
                Run::Literal {
                    values: &[1, 0, 2, 0],
                },
                Run::Same {
                    len: 1,
                    value: &200u16.to_le_bytes(),
                },
            ],
        );
        let chunk = Chunk::from_rle_payload(vec![0], payload).unwrap();

        let cells: Vec<u16> = chunk
            .cells()
            .unwrap()
            .map(|cell| u16::from_le_bytes(cell.unwrap().try_into().unwrap()))
            .collect();
        assert_eq!(cells, vec![100, 100, 100, 1, 2, 200]);
    }

    #[test]
    fn test_cursor_on_empty_chunk() {
        let payload = rle_payload(4, &[]);
        let chunk = Chunk::from_rle_payload(vec![0], payload).unwrap();
        assert_eq!(chunk.cell_count(), 0);
        assert!(chunk.cells().unwrap().try_next().unwrap().is_none());
    }

    #[test]
    fn test_cursor_rejects_variable_width() {
        let mut payload = rle_payload(4, &[]);
        // rewrite elem_size as 0
        let mut header = PayloadHeader::read(&payload).unwrap();
        header.elem_size = 0;
        header.write(&mut payload).unwrap();

        let chunk = Chunk::from_rle_payload(vec![0], payload).unwrap();
        let err = chunk.cells().unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }

    #[test]
    fn test_cursor_rejects_null_run() {
        let payload = rle_payload(
            4,
            &[
                Run::Same {
                    len: 1,
                    value: &1u32.to_le_bytes(),
                },
                Run::Null { len: 2 },
            ],
        );
        let chunk = Chunk::from_rle_payload(vec![0], payload).unwrap();
        let mut cursor = chunk.cells().unwrap();
        assert!(cursor.try_next().unwrap().is_some());
        let err = cursor.try_next().unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }

    #[test]
    fn test_cursor_bounds_checks_value_indices() {
        // a SAME run pointing past the data area
        let mut payload = rle_payload(
            4,
            &[Run::Same {
                len: 2,
                value: &1u32.to_le_bytes(),
            }],
        );
        Segment::same_run(0, 9).write(&mut payload, 0).unwrap();

        let chunk = Chunk::from_rle_payload(vec![0], payload).unwrap();
        let err = chunk.cells().unwrap().try_next().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }
}
