// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

use std::ops::Deref;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use log::trace;
use snafu::{location, Location};

use tessera_core::{Error, Result};

use crate::format::{
    PayloadHeader, Segment, FLAT_OVERHEAD, VAR_CELL_PREFIX, VAR_ENTRY_SIZE,
};

// A copy-on-write byte buffer for chunk payloads
//
// It can hold read-only shared bytes (e.g. a payload sliced out of a larger region),
// e.g. "borrowed", or a freshly materialized allocation, e.g. "owned"
#[derive(Debug)]
pub enum ChunkBuffer {
    Borrowed(Bytes),
    Owned(Vec<u8>),
}

impl ChunkBuffer {
    // Convert into a mutable buffer.  If this is a borrowed buffer, the data will be copied.
    pub fn into_owned(self) -> Vec<u8> {
        match self {
            Self::Borrowed(bytes) => bytes.to_vec(),
            Self::Owned(buffer) => buffer,
        }
    }

    // Convert into shared bytes.  Never copies data.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Borrowed(bytes) => bytes,
            Self::Owned(buffer) => Bytes::from(buffer),
        }
    }

    /// Converts the buffer into borrowed mode and returns a zero-copy clone.
    pub fn borrow_and_clone(&mut self) -> Self {
        match self {
            Self::Borrowed(bytes) => Self::Borrowed(bytes.clone()),
            Self::Owned(buffer) => {
                let bytes = Bytes::from(std::mem::take(buffer));
                *self = Self::Borrowed(bytes.clone());
                Self::Borrowed(bytes)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_ref().is_empty()
    }
}

impl AsRef<[u8]> for ChunkBuffer {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Borrowed(bytes) => bytes.as_ref(),
            Self::Owned(buffer) => buffer.as_slice(),
        }
    }
}

impl Deref for ChunkBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl From<Vec<u8>> for ChunkBuffer {
    fn from(buffer: Vec<u8>) -> Self {
        Self::Owned(buffer)
    }
}

impl From<Bytes> for ChunkBuffer {
    fn from(bytes: Bytes) -> Self {
        Self::Borrowed(bytes)
    }
}

/// Initial builder allocation: 8 MiB of data headroom plus header margin.
pub const INITIAL_CAPACITY: usize = 8 * 1024 * 1024 + 512;

/// Streaming builder for chunk payloads whose size is not known in advance.
///
/// The buffer is pre-formatted as a valid payload skeleton and grows by
/// doubling whenever an append would overflow the current capacity.  All
/// bookkeeping is kept as integer byte offsets from the buffer start, so
/// growth never invalidates a position.  Only the trailing size fields are
/// stale while appending; [PayloadBuilder::finish] derives them from the
/// write position and hands the payload off.
///
/// With a nonzero element size the finished payload is flat: the appended
/// bytes are its cells and the terminal segment records their count.  With
/// element size 0 the finished payload is a single-cell variable-width
/// payload whose one value is the entire appended stream.
#[derive(Debug)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
    elem_size: u64,
    data_start: usize,
    write_pos: usize,
    finalized: bool,
}

impl PayloadBuilder {
    pub fn new(elem_size: u64) -> Result<Self> {
        Self::with_capacity(elem_size, INITIAL_CAPACITY)
    }

    pub fn with_capacity(elem_size: u64, capacity: usize) -> Result<Self> {
        let var_table = if elem_size == 0 { VAR_ENTRY_SIZE } else { 0 };
        let cell_prefix = if elem_size == 0 { VAR_CELL_PREFIX } else { 0 };
        let data_start = FLAT_OVERHEAD + var_table + cell_prefix;

        let mut buf = vec![0u8; capacity.max(data_start)];
        PayloadHeader {
            n_segs: 1,
            elem_size,
            data_size: 0,
            var_offset: var_table as u64,
            is_boolean: false,
        }
        .write(&mut buf)?;
        Segment::new(0, 0).write(&mut buf, 0)?;
        // Terminal record: a variable-width skeleton describes one cell; a
        // fixed-width one starts out as a valid empty flat payload.
        let terminal = if elem_size == 0 { 1 } else { 0 };
        Segment::new(terminal, 0).write(&mut buf, 1)?;

        Ok(Self {
            buf,
            elem_size,
            data_start,
            write_pos: data_start,
            finalized: false,
        })
    }

    /// Copies `data` into the data region, doubling capacity first if needed.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(Error::Internal {
                message: "append on a finalized payload builder (reset it first)".to_string(),
                location: location!(),
            });
        }
        let needed = self.write_pos + data.len();
        if needed > self.buf.len() {
            let mut capacity = self.buf.len();
            while needed > capacity {
                capacity *= 2;
            }
            trace!(
                "growing payload builder from {} to {} bytes",
                self.buf.len(),
                capacity
            );
            self.buf.resize(capacity, 0);
        }
        self.buf[self.write_pos..needed].copy_from_slice(data);
        self.write_pos = needed;
        Ok(())
    }

    /// Bytes appended since construction or the last [PayloadBuilder::reset].
    pub fn data_len(&self) -> usize {
        self.write_pos - self.data_start
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Writes the true data length into the size fields and returns the
    /// finished payload.  Appending again requires a [PayloadBuilder::reset].
    pub fn finish(&mut self) -> Result<&[u8]> {
        let data_len = self.data_len() as u64;
        if self.elem_size == 0 {
            if data_len > u32::MAX as u64 {
                return Err(Error::invalid_input(
                    format!("{} bytes do not fit a variable-width cell", data_len),
                    location!(),
                ));
            }
            let prefix = FLAT_OVERHEAD + VAR_ENTRY_SIZE;
            self.buf[prefix] = 0;
            LittleEndian::write_u32(&mut self.buf[prefix + 1..], data_len as u32);
            PayloadHeader {
                n_segs: 1,
                elem_size: 0,
                data_size: (VAR_ENTRY_SIZE + VAR_CELL_PREFIX) as u64 + data_len,
                var_offset: VAR_ENTRY_SIZE as u64,
                is_boolean: false,
            }
            .write(&mut self.buf)?;
        } else {
            if data_len % self.elem_size != 0 {
                return Err(Error::Internal {
                    message: format!(
                        "{} appended bytes are not a whole number of {}-byte cells",
                        data_len, self.elem_size
                    ),
                    location: location!(),
                });
            }
            let count = data_len / self.elem_size;
            if count > u32::MAX as u64 {
                return Err(Error::invalid_input(
                    format!("{} cells do not fit a segment record", count),
                    location!(),
                ));
            }
            Segment::new(count, count as u32).write(&mut self.buf, 1)?;
            PayloadHeader::flat(count, self.elem_size).write(&mut self.buf)?;
        }
        self.finalized = true;
        Ok(&self.buf[..self.write_pos])
    }

    /// Rewinds the write cursor to the data start.  Capacity is kept and the
    /// skeleton is not re-zeroed.
    pub fn reset(&mut self) {
        self.write_pos = self.data_start;
        self.finalized = false;
    }
}
