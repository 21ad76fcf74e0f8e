// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

pub mod datatypes;
pub mod error;

pub use error::{Error, Result};

/// Reserved name of the existence-bitmap attribute.  Its chunks record which
/// logical positions hold a value; they are never run-length materialized.
pub const BITMAP_ATTR: &str = "_bitmap";
