//! Varint and zigzag length functions.
//!
//! Varints are little-endian base-128 groups with the continuation bit `0x80`
//! set on every byte except the last:
//!
//! ```text
//! 300 = 0b1_0010_1100 -> [0xAC, 0x02]
//! ```

/// Largest number of bytes a varint can occupy (`u64::MAX`).
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes needed to encode `value` as a varint.
///
/// Every 7 significant bits cost one byte, with a minimum of one byte for zero.
///
/// ```
/// use protosize_core::varint_len;
///
/// assert_eq!(varint_len(0), 1);
/// assert_eq!(varint_len(127), 1);
/// assert_eq!(varint_len(128), 2);
/// assert_eq!(varint_len(u64::MAX), 10);
/// ```
#[inline]
pub const fn varint_len(value: u64) -> usize {
    // `| 1` makes zero report one significant bit
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Zigzag-transform a signed integer so small magnitudes stay small.
///
/// `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`
#[inline]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Number of bytes needed to encode `value` as a zigzag varint (`sint32`/`sint64`).
///
/// 32-bit values are sign-extended before the transform, which yields the same
/// result as the 32-bit zigzag mapping.
#[inline]
pub const fn zigzag_len(value: i64) -> usize {
    varint_len(zigzag_encode(value))
}

/// Number of bytes a length-delimited payload of `len` bytes occupies,
/// including its varint length prefix.
#[inline]
pub const fn length_delimited_len(len: usize) -> usize {
    varint_len(len as u64) + len
}
