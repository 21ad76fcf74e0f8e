// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! # Chunk Payload Layout
//!
//! Every chunk payload is a little-endian byte buffer with the shape:
//!
//! ```text
//! header | segment table | variable-part offsets | element data
//! ```
//!
//! ## Header (48 bytes)
//!
//! | offset | field      | type    |                                          |
//! |--------|------------|---------|------------------------------------------|
//! | 0      | magic      | u64     | [PAYLOAD_MAGIC]                          |
//! | 8      | n_segs     | u64     | data-bearing segments, sentinel excluded |
//! | 16     | elem_size  | u64     | bytes per cell, 0 for variable width     |
//! | 24     | data_size  | u64     | bytes past the segment table             |
//! | 32     | var_offset | u64     | byte length of the variable-part table   |
//! | 40     | is_boolean | u8      |                                          |
//! | 41     | pad        | [u8; 7] |                                          |
//!
//! ## Segment table (16 bytes per record)
//!
//! `n_segs + 1` records at byte 48.  Record *i* covers logical positions
//! `[start_i, start_{i+1})`; the final sentinel's `start` equals the total
//! logical cell count and terminates the table.
//!
//! | offset | field       | type    |                              |
//! |--------|-------------|---------|------------------------------|
//! | 0      | start       | u64     | first logical position       |
//! | 8      | value_index | u32     | index into the element data  |
//! | 12     | flags       | u8      | bit 0 = SAME, bit 1 = NULL   |
//! | 13     | pad         | [u8; 3] |                              |
//!
//! A SAME run maps every position it covers to the single value at
//! `value_index`; a plain run maps position `p` to value index
//! `value_index + (p - start)`.  A NULL run carries no data bytes.
//!
//! ## Flat payloads
//!
//! A flat payload is the degenerate case: one data-bearing segment, records
//! `{0, 0}` and `{count, count}`, no SAME or NULL runs, and
//! `data_size == elem_size * count`.  Cell `i` then lives at the fixed byte
//! offset `FLAT_OVERHEAD + i * elem_size`, which is what permits O(1) random
//! access without consulting the segment table.
//!
//! All fields are read and written through the accessors below; offsets are
//! bounds-checked against the buffer, never cast onto it.

use byteorder::{ByteOrder, LittleEndian};
use snafu::{location, Location};

use tessera_core::{Error, Result};

/// Tag identifying a well-formed chunk payload.
pub const PAYLOAD_MAGIC: u64 = u64::from_le_bytes(*b"TSRAPYL1");

pub const HEADER_SIZE: usize = 48;
pub const SEGMENT_SIZE: usize = 16;

/// Structural overhead of a flat payload: header plus two segment records.
pub const FLAT_OVERHEAD: usize = HEADER_SIZE + 2 * SEGMENT_SIZE;

/// Size of one variable-part offset table entry.
pub const VAR_ENTRY_SIZE: usize = 8;

/// A variable-width cell is prefixed by a 1-byte size flag and a u32 length.
pub const VAR_CELL_PREFIX: usize = 5;

const MAGIC_OFFSET: usize = 0;
const N_SEGS_OFFSET: usize = 8;
const ELEM_SIZE_OFFSET: usize = 16;
const DATA_SIZE_OFFSET: usize = 24;
const VAR_OFFSET_OFFSET: usize = 32;
const IS_BOOLEAN_OFFSET: usize = 40;

const SEG_START_OFFSET: usize = 0;
const SEG_VALUE_INDEX_OFFSET: usize = 8;
const SEG_FLAGS_OFFSET: usize = 12;

const SEG_FLAG_SAME: u8 = 0x01;
const SEG_FLAG_NULL: u8 = 0x02;

/// The decoded header of a chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub n_segs: u64,
    pub elem_size: u64,
    pub data_size: u64,
    pub var_offset: u64,
    pub is_boolean: bool,
}

impl PayloadHeader {
    /// The header of a flat payload holding `count` cells of `elem_size` bytes.
    pub fn flat(count: u64, elem_size: u64) -> Self {
        Self {
            n_segs: 1,
            elem_size,
            data_size: elem_size * count,
            var_offset: 0,
            is_boolean: false,
        }
    }

    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_input(
                format!(
                    "payload is {} bytes, the header alone needs {}",
                    buf.len(),
                    HEADER_SIZE
                ),
                location!(),
            ));
        }
        let magic = LittleEndian::read_u64(&buf[MAGIC_OFFSET..]);
        if magic != PAYLOAD_MAGIC {
            return Err(Error::invalid_input(
                format!("bad payload magic {:#018x}", magic),
                location!(),
            ));
        }
        Ok(Self {
            n_segs: LittleEndian::read_u64(&buf[N_SEGS_OFFSET..]),
            elem_size: LittleEndian::read_u64(&buf[ELEM_SIZE_OFFSET..]),
            data_size: LittleEndian::read_u64(&buf[DATA_SIZE_OFFSET..]),
            var_offset: LittleEndian::read_u64(&buf[VAR_OFFSET_OFFSET..]),
            is_boolean: buf[IS_BOOLEAN_OFFSET] != 0,
        })
    }

    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Internal {
                message: format!("{}-byte buffer cannot hold a payload header", buf.len()),
                location: location!(),
            });
        }
        LittleEndian::write_u64(&mut buf[MAGIC_OFFSET..], PAYLOAD_MAGIC);
        LittleEndian::write_u64(&mut buf[N_SEGS_OFFSET..], self.n_segs);
        LittleEndian::write_u64(&mut buf[ELEM_SIZE_OFFSET..], self.elem_size);
        LittleEndian::write_u64(&mut buf[DATA_SIZE_OFFSET..], self.data_size);
        LittleEndian::write_u64(&mut buf[VAR_OFFSET_OFFSET..], self.var_offset);
        buf[IS_BOOLEAN_OFFSET] = self.is_boolean as u8;
        buf[IS_BOOLEAN_OFFSET + 1..HEADER_SIZE].fill(0);
        Ok(())
    }

    /// Byte offset just past the segment table.  `data_size` counts
    /// everything from here on: the variable-part table, cell size
    /// prefixes, and the raw element data.
    pub fn segments_end(&self) -> usize {
        HEADER_SIZE + (self.n_segs as usize + 1) * SEGMENT_SIZE
    }

    /// Byte offset of the element data area, past the variable-part table.
    pub fn data_offset(&self) -> usize {
        self.segments_end() + self.var_offset as usize
    }
}

/// One segment table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub value_index: u32,
    pub same: bool,
    pub null: bool,
}

impl Segment {
    /// A plain run: position `p` maps to value index `value_index + (p - start)`.
    pub fn new(start: u64, value_index: u32) -> Self {
        Self {
            start,
            value_index,
            same: false,
            null: false,
        }
    }

    /// A run where every position shares the value at `value_index`.
    pub fn same_run(start: u64, value_index: u32) -> Self {
        Self {
            same: true,
            ..Self::new(start, value_index)
        }
    }

    /// A run with no data bytes.
    pub fn null_run(start: u64) -> Self {
        Self {
            null: true,
            ..Self::new(start, 0)
        }
    }

    pub fn read(buf: &[u8], index: usize) -> Result<Self> {
        let offset = HEADER_SIZE + index * SEGMENT_SIZE;
        if offset + SEGMENT_SIZE > buf.len() {
            return Err(Error::invalid_input(
                format!(
                    "segment {} ends at byte {}, payload is {} bytes",
                    index,
                    offset + SEGMENT_SIZE,
                    buf.len()
                ),
                location!(),
            ));
        }
        let flags = buf[offset + SEG_FLAGS_OFFSET];
        Ok(Self {
            start: LittleEndian::read_u64(&buf[offset + SEG_START_OFFSET..]),
            value_index: LittleEndian::read_u32(&buf[offset + SEG_VALUE_INDEX_OFFSET..]),
            same: flags & SEG_FLAG_SAME != 0,
            null: flags & SEG_FLAG_NULL != 0,
        })
    }

    pub fn write(&self, buf: &mut [u8], index: usize) -> Result<()> {
        let offset = HEADER_SIZE + index * SEGMENT_SIZE;
        if offset + SEGMENT_SIZE > buf.len() {
            return Err(Error::Internal {
                message: format!(
                    "segment {} ends at byte {}, buffer is {} bytes",
                    index,
                    offset + SEGMENT_SIZE,
                    buf.len()
                ),
                location: location!(),
            });
        }
        LittleEndian::write_u64(&mut buf[offset + SEG_START_OFFSET..], self.start);
        LittleEndian::write_u32(&mut buf[offset + SEG_VALUE_INDEX_OFFSET..], self.value_index);
        let mut flags = 0u8;
        if self.same {
            flags |= SEG_FLAG_SAME;
        }
        if self.null {
            flags |= SEG_FLAG_NULL;
        }
        buf[offset + SEG_FLAGS_OFFSET] = flags;
        buf[offset + SEG_FLAGS_OFFSET + 1..offset + SEGMENT_SIZE].fill(0);
        Ok(())
    }
}

/// Byte offset of cell `i` in a flat payload with the given element size.
pub fn flat_cell_offset(i: u64, elem_size: u64) -> usize {
    FLAT_OVERHEAD + (i * elem_size) as usize
}
