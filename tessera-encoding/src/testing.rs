// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! Test support: hand-built RLE payloads and a scripted in-memory array

use std::sync::Arc;

use snafu::{location, Location};

use tessera_core::datatypes::{Attribute, AttributeId, Coordinate, Schema};
use tessera_core::{Error, Result};

use crate::data::{Array, ArrayIterator, Chunk};
use crate::format::{PayloadHeader, Segment};

/// One run of an RLE payload under construction.
pub enum Run<'a> {
    /// `value` repeated `len` times.
    Same { len: u64, value: &'a [u8] },
    /// `values.len() / elem_size` consecutive distinct cells.
    Literal { values: &'a [u8] },
    /// `len` positions with no data bytes.
    Null { len: u64 },
}

/// Assembles an RLE payload from run descriptions.
pub fn rle_payload(elem_size: u64, runs: &[Run]) -> Vec<u8> {
    let mut data: Vec<u8> = Vec::new();
    let mut segments = Vec::new();
    let mut pos = 0u64;
    for run in runs {
        let value_index = (data.len() as u64 / elem_size) as u32;
        match run {
            Run::Same { len, value } => {
                assert_eq!(value.len() as u64, elem_size);
                segments.push(Segment::same_run(pos, value_index));
                data.extend_from_slice(value);
                pos += len;
            }
            Run::Literal { values } => {
                assert_eq!(values.len() as u64 % elem_size, 0);
                segments.push(Segment::new(pos, value_index));
                data.extend_from_slice(values);
                pos += values.len() as u64 / elem_size;
            }
            Run::Null { len } => {
                segments.push(Segment::null_run(pos));
                pos += len;
            }
        }
    }
    let sentinel = Segment::new(pos, (data.len() as u64 / elem_size) as u32);

    let header = PayloadHeader {
        n_segs: runs.len() as u64,
        elem_size,
        data_size: data.len() as u64,
        var_offset: 0,
        is_boolean: false,
    };
    let mut buf = vec![0u8; header.data_offset() + data.len()];
    header.write(&mut buf).unwrap();
    for (index, segment) in segments.iter().enumerate() {
        segment.write(&mut buf, index).unwrap();
    }
    sentinel.write(&mut buf, runs.len()).unwrap();
    buf[header.data_offset()..].copy_from_slice(&data);
    buf
}

/// An in-memory array with a fixed chunk list per attribute, in position
/// order.
pub struct ScriptedArray {
    schema: Schema,
    chunks: Vec<(AttributeId, Vec<Arc<Chunk>>)>,
}

impl ScriptedArray {
    pub fn new(schema: Schema, chunks: Vec<(AttributeId, Vec<Arc<Chunk>>)>) -> Self {
        Self { schema, chunks }
    }
}

impl Array for ScriptedArray {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn iterator(&self, attr: AttributeId) -> Result<Box<dyn ArrayIterator + '_>> {
        let chunks = self
            .chunks
            .iter()
            .find(|(id, _)| *id == attr)
            .map(|(_, chunks)| chunks.clone())
            .ok_or_else(|| Error::Schema {
                message: format!("no chunks scripted for attribute {}", attr),
                location: location!(),
            })?;
        Ok(Box::new(ScriptedIterator { chunks, index: 0 }))
    }
}

pub struct ScriptedIterator {
    chunks: Vec<Arc<Chunk>>,
    index: usize,
}

impl ArrayIterator for ScriptedIterator {
    fn chunk(&mut self) -> Result<Arc<Chunk>> {
        self.chunks.get(self.index).cloned().ok_or_else(|| {
            Error::Internal {
                message: "chunk() on a cursor past the last chunk".to_string(),
                location: location!(),
            }
        })
    }

    fn advance(&mut self) -> Result<()> {
        if self.end() {
            return Err(Error::Internal {
                message: "advance() on a cursor past the last chunk".to_string(),
                location: location!(),
            });
        }
        self.index += 1;
        Ok(())
    }

    fn set_position(&mut self, coords: &[Coordinate]) -> Result<bool> {
        match self.chunks.iter().position(|c| c.coords() == coords) {
            Some(index) => {
                self.index = index;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn restart(&mut self) {
        self.index = 0;
    }

    fn end(&self) -> bool {
        self.index >= self.chunks.len()
    }
}

/// Two positions of a one-attribute array (plus its bitmap attribute).
///
/// Attribute 0 holds `[7, 7, 7]` then `[1, 2, 3]` as u32 cells; the bitmap
/// chunks deliberately carry bytes that are not a well-formed payload.
pub fn scripted_array() -> ScriptedArray {
    let schema = Schema::try_new(
        vec![Attribute::new(0, "val", 4), Attribute::bitmap(1)],
        1,
    )
    .unwrap();

    let first = rle_payload(
        4,
        &[Run::Same {
            len: 3,
            value: &7u32.to_le_bytes(),
        }],
    );
    let second = rle_payload(
        4,
        &[Run::Literal {
            values: &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0],
        }],
    );

    let values = vec![
        Arc::new(Chunk::from_rle_payload(vec![0], first).unwrap()),
        Arc::new(Chunk::from_rle_payload(vec![1], second).unwrap()),
    ];
    let bitmaps = vec![
        Arc::new(Chunk::new(vec![0], b"not an rle payload".to_vec(), 3)),
        Arc::new(Chunk::new(vec![1], b"not an rle payload".to_vec(), 3)),
    ];

    ScriptedArray::new(schema, vec![(0, values), (1, bitmaps)])
}
