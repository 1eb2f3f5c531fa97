//! Variable-width integer columns
//!
//! Every integer column of the format is stored big-endian at a width of
//! 0 to 4 bytes. A width of 0 means the column holds only zeros and takes
//! no space at all.

use byteorder::{BigEndian, ByteOrder};

/// Largest width any column may use
pub const MAX_WIDTH: u8 = 4;

/// Smallest byte width able to hold `max_value` unsigned
#[inline]
pub fn width_for(max_value: u32) -> u8 {
    match max_value {
        0 => 0,
        0x01..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Width needed for dense keys `0..size`
///
/// This is the smallest `w` with `size <= 2^(8w)`.
#[inline]
pub fn width_for_count(size: usize) -> u8 {
    if size <= 1 {
        return 0;
    }
    let max = size - 1;
    if max > u32::MAX as usize {
        return MAX_WIDTH;
    }
    width_for(max as u32)
}

/// Read an unsigned value of `width` bytes from the front of `bytes`
#[inline]
pub fn read_uint(bytes: &[u8], width: u8) -> u32 {
    match width {
        0 => 0,
        1 => bytes[0] as u32,
        2 => BigEndian::read_u16(bytes) as u32,
        3 => BigEndian::read_u24(bytes),
        _ => BigEndian::read_u32(bytes),
    }
}

/// Append `value` at `width` bytes
///
/// The caller guarantees `width >= width_for(value)`.
#[inline]
pub fn write_uint(out: &mut Vec<u8>, value: u32, width: u8) {
    debug_assert!(width <= MAX_WIDTH && width >= width_for(value));
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf[4 - width as usize..]);
}

/// Alignment of a record table with the given stride
pub fn alignment(stride: usize) -> usize {
    if stride <= 1 {
        1
    } else {
        stride.next_power_of_two().min(8)
    }
}

/// Zero bytes needed so that `position` becomes a multiple of `align`
#[inline]
pub fn padding(position: u64, align: usize) -> usize {
    let align = align as u64;
    ((align - position % align) % align) as usize
}
