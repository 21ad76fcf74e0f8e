// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! # Chunk payload decoding for the Tessera format
//!
//! Tessera stores each attribute of a multidimensional array as
//! run-length-encoded chunks: consecutive identical cell values are
//! represented by one segment spanning a range of logical positions.  That
//! is compact, but downstream operators that want O(1) random access need a
//! flat, fixed-stride layout instead.  This crate is the bridge:
//!
//! - [format]: the binary layout shared by RLE and flat payloads, exposed
//!   as bounds-checked field accessors over opaque byte buffers.
//! - [buffer]: [buffer::ChunkBuffer], the borrowed-or-owned payload
//!   storage, and [buffer::PayloadBuilder], a doubling-growth builder for
//!   payloads whose size is not known in advance.
//! - [data]: the [data::Chunk] container, its position-order cell cursor,
//!   and the [data::Array] / [data::ArrayIterator] traits the surrounding
//!   engine implements.
//! - [decoder]: [decoder::materialize], the RLE-to-flat expansion, and
//!   [decoder::DecodeArray], the wrapper that applies it lazily per chunk
//!   with a one-slot cache and forwards existence-bitmap chunks untouched.
//!
//! One chunk is processed at a time, synchronously; all work is CPU-bound
//! memory copying with no internal parallelism or I/O.

pub mod buffer;
pub mod data;
pub mod decoder;
pub mod format;
#[cfg(test)]
pub mod testing;
