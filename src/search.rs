//! Byte and aligned-word search primitives. Everything here is brute force;
//! each search runs once per image so correctness beats speed.

use crate::codec;

/// First occurrence of an arbitrary byte sequence.
pub fn find_bytes(buf: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > buf.len() {
        return None;
    }
    buf.windows(needle.len()).position(|w| w == needle)
}

/// First u32 equal to `val`, scanning only at word-aligned offsets. This is
/// not a raw byte search: the value is decoded with ROM endianness before
/// comparing, so a match always starts on a 4-byte boundary.
pub fn find_u32_aligned(buf: &[u8], val: u32) -> Option<usize> {
    let mut ofs = 0;
    while ofs + 4 <= buf.len() {
        if codec::read_u32(buf, ofs) == val {
            return Some(ofs);
        }
        ofs += 4;
    }
    None
}

/// Same, at the 16-bit stride.
pub fn find_u16_aligned(buf: &[u8], val: u16) -> Option<usize> {
    let mut ofs = 0;
    while ofs + 2 <= buf.len() {
        if codec::read_u16(buf, ofs) == val {
            return Some(ofs);
        }
        ofs += 2;
    }
    None
}

/// Aligned u32 search scanning from `start` down to 0.
pub fn find_u32_aligned_reverse(buf: &[u8], start: usize, val: u32) -> Option<usize> {
    let mut ofs = start & !3;
    loop {
        if ofs + 4 <= buf.len() && codec::read_u32(buf, ofs) == val {
            return Some(ofs);
        }
        if ofs == 0 {
            return None;
        }
        ofs -= 4;
    }
}
