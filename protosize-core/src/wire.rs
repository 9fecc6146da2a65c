//! Wire kinds and tag lengths.
//!
//! A tag is `(field_number << 3) | wire_kind`, itself encoded as a varint.
//! The deprecated group kinds (3 and 4) are not represented.

use serde::Serialize;

use crate::varint::varint_len;

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;

/// Largest valid field number (`2^29 - 1`).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The 3-bit encoding category embedded in a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireKind {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireKind {
    /// Get the string representation of this wire kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireKind::Varint => "varint",
            WireKind::Fixed64 => "fixed64",
            WireKind::LengthDelimited => "length_delimited",
            WireKind::Fixed32 => "fixed32",
        }
    }

    /// Returns the fixed payload width for `Fixed32`/`Fixed64`, `None` otherwise.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            WireKind::Fixed64 => Some(8),
            WireKind::Fixed32 => Some(4),
            WireKind::Varint | WireKind::LengthDelimited => None,
        }
    }
}

impl std::fmt::Display for WireKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the tag value for a field number and wire kind.
#[inline]
pub const fn tag(field_number: u32, wire_kind: WireKind) -> u32 {
    (field_number << 3) | wire_kind as u32
}

/// Number of bytes the varint-encoded tag occupies.
///
/// ```
/// use protosize_core::{WireKind, tag_len};
///
/// assert_eq!(tag_len(15, WireKind::Varint), 1);
/// assert_eq!(tag_len(16, WireKind::Varint), 2);
/// ```
#[inline]
pub const fn tag_len(field_number: u32, wire_kind: WireKind) -> usize {
    varint_len(tag(field_number, wire_kind) as u64)
}
