// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

//! Tessera data types, [Schema] and [Attribute]

use snafu::{location, Location};

use crate::{Error, Result, BITMAP_ATTR};

/// One coordinate of a cell position in a multidimensional array.
pub type Coordinate = i64;

/// Identity of an attribute within a [Schema].
pub type AttributeId = u32;

/// One attribute (column) of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    id: AttributeId,
    name: String,
    size: u64,
    nullable: bool,
}

impl Attribute {
    /// A fixed-width, non-nullable attribute whose cells are `size` bytes wide.
    pub fn new(id: AttributeId, name: impl Into<String>, size: u64) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            nullable: false,
        }
    }

    /// The reserved existence-bitmap attribute.
    pub fn bitmap(id: AttributeId) -> Self {
        Self::new(id, BITMAP_ATTR, 1)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed byte width of one cell value.  0 means variable width.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// The ordered attribute set of an array, with one attribute designated as
/// the existence bitmap.
///
/// The bitmap attribute is designated explicitly rather than inferred from
/// its position, so reordering attributes cannot silently change which
/// chunks are treated as bitmaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<Attribute>,
    bitmap_attr: AttributeId,
}

impl Schema {
    pub fn try_new(attributes: Vec<Attribute>, bitmap_attr: AttributeId) -> Result<Self> {
        for (idx, attr) in attributes.iter().enumerate() {
            if attributes[..idx].iter().any(|a| a.id() == attr.id()) {
                return Err(Error::Schema {
                    message: format!("duplicate attribute id {}", attr.id()),
                    location: location!(),
                });
            }
        }
        if !attributes.iter().any(|a| a.id() == bitmap_attr) {
            return Err(Error::Schema {
                message: format!(
                    "designated bitmap attribute {} is not in the schema",
                    bitmap_attr
                ),
                location: location!(),
            });
        }
        Ok(Self {
            attributes,
            bitmap_attr,
        })
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id() == id)
    }

    /// The designated existence-bitmap attribute.
    pub fn bitmap_attribute(&self) -> AttributeId {
        self.bitmap_attr
    }

    pub fn is_bitmap_attribute(&self, id: AttributeId) -> bool {
        self.bitmap_attr == id
    }
}
