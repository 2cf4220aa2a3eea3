//! Standard / alt / alt2 self-check schemes: 32-bit sum and xor accumulation
//! over big-endian words, differing in which word slots are excluded.
//!
//! Standard detection theory: real cks = sum of all u32 except the cks and
//! ckx slots themselves; real ckx = xor of all u32 except those slots.
//! Xoring *everything* (both slots included) cancels ckx against itself, so
//! xort = cks. Summing everything counts cks twice, so sumt = 2*cks + ckx,
//! giving ckx = sumt - 2*xort. Then both derived values are hunted down in
//! the image with an aligned word search.

use crate::codec;
use crate::diag::Diag;

pub struct StdChecksum {
    pub p_cks: u32,
    pub p_ckx: u32,
    pub cks: u32,
    pub ckx: u32,
    /// more than one word matched either value; the first match of each was
    /// kept (the real checksums should sit close together)
    pub ambiguous: bool,
}

pub struct AltChecksum {
    pub p_acs: u32,
    pub p_acx: u32,
    pub acs: u32,
    pub acx: u32,
}

/// First aligned word equal to `val` plus the total number of matches.
fn find_word(buf: &[u8], val: u32) -> (Option<u32>, u32) {
    let siz = buf.len() & !3;
    let mut first = None;
    let mut count = 0;
    for ofs in (0..siz).step_by(4) {
        if codec::read_u32(buf, ofs) == val {
            if first.is_none() {
                first = Some(ofs as u32);
            }
            count += 1;
        }
    }
    (first, count)
}

/// Whole-image standard checksum detection.
pub fn locate_standard(buf: &[u8], diag: &dyn Diag) -> Option<StdChecksum> {
    let siz = buf.len() & !3;
    if siz == 0 {
        return None;
    }

    let mut sumt = 0u32;
    let mut xort = 0u32;
    for ofs in (0..siz).step_by(4) {
        let lw = codec::read_u32(buf, ofs);
        sumt = sumt.wrapping_add(lw);
        xort ^= lw;
    }

    let cks = xort;
    let ckx = sumt.wrapping_sub(xort.wrapping_mul(2));

    let (p_cks, nc) = find_word(buf, cks);
    let (p_ckx, nx) = find_word(buf, ckx);

    if nc == 0 && nx == 0 {
        diag.line("no checksum found !");
        return None;
    }
    let (p_cks, p_ckx) = match (p_cks, p_ckx) {
        (Some(s), Some(x)) => (s, x),
        _ => {
            diag.line("only one of the std checksum values found, rejecting");
            return None;
        }
    };
    let ambiguous = nc > 1 || nx > 1;
    if ambiguous {
        diag.line("more than one set of checksums found ! the real checksums should be close to each other");
    }

    Some(StdChecksum { p_cks, p_ckx, cks, ckx, ambiguous })
}

/// Sum/xor over the block `[start, end]` (end byte rounded up to the
/// enclosing word). The checksum slots live *outside* the block for this
/// scheme, so nothing is skipped; the two totals are searched image-wide.
pub fn validate_alt(buf: &[u8], start: u32, end: u32, diag: &dyn Diag) -> Option<AltChecksum> {
    if start >= end {
        return None;
    }
    let bsize = (((end + 1) - start) & !3) + 4;
    let (start, bsize) = (start as usize, bsize as usize);
    if start + bsize > buf.len() {
        return None;
    }

    let mut acs = 0u32;
    let mut acx = 0u32;
    for ofs in (start..start + bsize).step_by(4) {
        let lw = codec::read_u32(buf, ofs);
        acs = acs.wrapping_add(lw);
        acx ^= lw;
    }
    diag.line(&format!(
        "alt cks block 0x{:06X} - 0x{:06X}: sumt=0x{:08X}, xort=0x{:08X}",
        start,
        end,
        acs,
        acx
    ));

    let (p_acs, nc) = find_word(buf, acs);
    let (p_acx, nx) = find_word(buf, acx);
    let (p_acs, p_acx) = match (p_acs, p_acx) {
        (Some(s), Some(x)) => (s, x),
        _ => {
            diag.line("altcks values not found in ROM, possibly unskipped vals or bad algo");
            return None;
        }
    };
    if nc > 1 || nx > 1 {
        diag.line("more than one alt cks match, keeping the first");
    }
    diag.line(&format!(
        "confirmed altcks values found : acs @ 0x{:X}, acx @ 0x{:X}",
        p_acs, p_acx
    ));
    Some(AltChecksum { p_acs, p_acx, acs, acx })
}

/// Standard detection restricted to `region`, with up to two extra
/// region-relative word offsets left out of the running totals (used when a
/// known block is contaminated by two embedded fields). Returned offsets are
/// region-relative.
pub fn locate_alt2(
    region: &[u8],
    skip1: Option<u32>,
    skip2: Option<u32>,
    diag: &dyn Diag,
) -> Option<(u32, u32)> {
    let siz = region.len() & !3;
    if siz == 0 {
        return None;
    }

    let skipped = |ofs: u32| skip1 == Some(ofs) || skip2 == Some(ofs);
    let mut sumt = 0u32;
    let mut xort = 0u32;
    for ofs in (0..siz).step_by(4) {
        if skipped(ofs as u32) {
            continue;
        }
        let lw = codec::read_u32(region, ofs);
        sumt = sumt.wrapping_add(lw);
        xort ^= lw;
    }

    let cks = xort;
    let ckx = sumt.wrapping_sub(xort.wrapping_mul(2));
    let (p_cks, nc) = find_word(region, cks);
    let (p_ckx, nx) = find_word(region, ckx);
    let (p_cks, p_ckx) = match (p_cks, p_ckx) {
        (Some(s), Some(x)) => (s, x),
        _ => return None,
    };
    if nc > 1 || nx > 1 {
        diag.line("more than one alt2 cks match, keeping the first");
    }
    Some((p_cks, p_ckx))
}

/// Solve a+b = ds (mod 2^32) and a^b = dx, bit by bit from the MSB down,
/// tracking the carry the lower bits are required to produce. An xor bit of 1
/// forces the pair (1,0); an xor bit of 0 gives (0,0) or (1,1) to satisfy the
/// carry demanded from above. Returns None when the carry chain contradicts
/// the xor target (no solution exists).
pub fn solve_add_xor(ds: u32, dx: u32) -> Option<(u32, u32)> {
    let mut a = 0u32;
    let mut b = 0u32;
    // carry the next lower bit must feed into the bit just processed; the
    // carry out of bit 31 is discarded mod 2^32, so bit 31 is unconstrained
    let mut carry = false;
    for bit in (0..32).rev() {
        let xn = dx & (1 << bit) != 0;
        let sn = ds & (1 << bit) != 0;
        let cin = xn ^ sn; // carry into this bit, forced by the sum bit
        if xn {
            // pair must be (1,0); its carry out equals its carry in
            if bit != 31 && cin != carry {
                return None;
            }
            a |= 1 << bit;
        } else if bit != 31 && carry {
            // (1,1) produces the carry demanded from above
            a |= 1 << bit;
            b |= 1 << bit;
        }
        carry = cin;
    }
    // no bit below position 0 can produce a carry
    if carry {
        return None;
    }
    Some((a, b))
}

pub struct Correction {
    pub a: u32,
    pub b: u32,
    pub mangle: u32,
}

/// Repair the standard checksum: the words at `p_cks`/`p_ckx` already hold
/// the *desired* sum and xor; compute values for the three free correction
/// slots so that recomputing the checksum over the corrected image reproduces
/// those targets.
pub fn repair(
    buf: &mut [u8],
    p_cks: usize,
    p_ckx: usize,
    p_a: usize,
    p_b: usize,
    p_mangle: usize,
    diag: &dyn Diag,
) -> Result<Correction, Box<dyn std::error::Error>> {
    let siz = buf.len();
    if siz == 0 || siz & 3 != 0 {
        return Err("image size must be a multiple of 4".into());
    }
    let slots = [p_cks, p_ckx, p_a, p_b, p_mangle];
    for &p in &slots {
        if p + 4 > siz {
            return Err("correction slot out of range".into());
        }
        if p & 3 != 0 {
            return Err("correction slot not word-aligned".into());
        }
    }
    for i in 0..slots.len() {
        for j in i + 1..slots.len() {
            if slots[i] == slots[j] {
                return Err("checksum and correction slots must be distinct".into());
            }
        }
    }

    // read the targets before touching anything
    let cks = codec::read_u32(buf, p_cks);
    let ckx = codec::read_u32(buf, p_ckx);
    diag.line(&format!("desired cks=0x{:X}, ckx=0x{:X}", cks, ckx));

    // 1) zero the correction slots in place
    codec::write_u32(0, buf, p_a);
    codec::write_u32(0, buf, p_b);
    codec::write_u32(0, buf, p_mangle);

    // 2) actual sum & xor, skipping the checksum slots themselves
    let mut ds = 0u32;
    let mut dx = 0u32;
    for ofs in (0..siz).step_by(4) {
        if ofs == p_cks || ofs == p_ckx {
            continue;
        }
        let tw = codec::read_u32(buf, ofs);
        ds = ds.wrapping_add(tw);
        dx ^= tw;
    }
    diag.line(&format!("actual s=0x{:X}, x=0x{:X}", ds, dx));

    // 3) required deltas: cks = ds + a + b + mangle, ckx = dx ^ a ^ b ^ mangle.
    // Fixing mangle = dx-delta removes one unknown and zeroes the xor target,
    // leaving the standard two-unknown add/xor system.
    ds = cks.wrapping_sub(ds);
    dx = ckx ^ dx;
    diag.line(&format!("corrections ds=0x{:X}, dx=0x{:X}", ds, dx));
    let mangle = dx;
    ds = ds.wrapping_sub(mangle);
    dx ^= mangle;

    let (a, b) = solve_add_xor(ds, dx)
        .ok_or("no bit-level solution at these slots, cannot repair")?;

    codec::write_u32(a, buf, p_a);
    codec::write_u32(b, buf, p_b);
    codec::write_u32(mangle, buf, p_mangle);

    // verify against a fresh detection pass
    let located = locate_standard(buf, diag)
        .ok_or("repair inconsistent: no checksum found after correction")?;
    let vs = codec::read_u32(buf, located.p_cks as usize);
    let vx = codec::read_u32(buf, located.p_ckx as usize);
    if vs != cks || vx != ckx {
        return Err("repair inconsistent: corrected image does not match the standard scheme".into());
    }
    diag.line(&format!(
        "found correction vals a=0x{:X}, b=0x{:X}, mang=0x{:X}",
        a, b, mangle
    ));

    Ok(Correction { a, b, mangle })
}
