//! Heuristic, signature-driven discovery of the loader, FID, RAMF and ECUREC
//! blocks, one pass per sub-structure.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::checksum;
use crate::codec;
use crate::diag::Diag;
use crate::rom::include::*;
use crate::rom::RomDescriptor;
use crate::search;
use crate::variants;

/// Bounds-checked word read; None past the end of the image.
fn read_at(buf: &[u8], ofs: u32) -> Option<u32> {
    let ofs = ofs as usize;
    if ofs + 4 <= buf.len() {
        Some(codec::read_u32(buf, ofs))
    } else {
        None
    }
}

/// Look for "LOADER", backtrack to the beginning of the struct. Best effort:
/// a missing loader degrades those fields, it does not stop the analysis.
pub fn find_loader(buf: &[u8], desc: &mut RomDescriptor, diag: &dyn Diag) -> Option<u32> {
    let hit = match search::find_bytes(buf, LOADER_MARKER) {
        Some(h) => h as u32,
        None => {
            diag.line("LOADER not found !");
            return None;
        }
    };
    let start = hit.checked_sub(LOADER_MARKER_OFFSET)?;
    if start + LOADER_SIZE > buf.len() as u32 {
        diag.line("LOADER struct truncated at end of ROM");
        return None;
    }
    let blk: LoaderBlock =
        match Cursor::new(&buf[start as usize..(start + LOADER_SIZE) as usize]).read_be() {
            Ok(b) => b,
            Err(_) => return None,
        };

    desc.p_loader = Some(start);
    desc.loader_version = blk.version();
    desc.loader_cpu = Some(blk.cpu());
    Some(start)
}

/// Find and parse the FID struct. This is the step that selects the variant
/// descriptor, so failure here is fatal for the whole analysis.
pub fn find_fid(
    buf: &[u8],
    desc: &mut RomDescriptor,
    diag: &dyn Diag,
) -> Result<u32, Box<dyn std::error::Error>> {
    let siz = buf.len() as u32;
    let hit = search::find_bytes(buf, FID_MARKER).ok_or("no DATABASE found !?")? as u32;
    let mut sf_offset = hit
        .checked_sub(FID_DATABASE_OFFSET)
        .ok_or("DATABASE marker too close to start of ROM")?;

    // the loader block embeds its own database tag; a hit there means the
    // real FID tag comes later
    if let Some(ls) = hit.checked_sub(LOADER_DATABASE_OFFSET) {
        if &buf[ls as usize..ls as usize + 4] == b"LOAD" {
            let from = (ls + LOADER_SIZE) as usize;
            let hit2 = if from < buf.len() {
                search::find_bytes(&buf[from..], FID_MARKER).map(|h| h as u32 + from as u32)
            } else {
                None
            };
            let hit2 = hit2.ok_or("no FID DATABASE found !")?;
            sf_offset = hit2
                .checked_sub(FID_DATABASE_OFFSET)
                .ok_or("DATABASE marker too close to start of ROM")?;
        }
    }

    if sf_offset + FID_MAXSIZE >= siz {
        return Err("possibly incomplete / bad dump ? FID too close to end of ROM".into());
    }

    let blk: FidBlock = Cursor::new(&buf[sf_offset as usize..]).read_be()?;
    desc.p_fid = Some(sf_offset);
    desc.fid = Some(blk.fid());
    desc.fid_cpu = Some(blk.cpu());

    let variant = variants::by_cpu_code(blk.cpu_bytes())
        .ok_or_else(|| format!("unknown FID CPU type {} ! cannot proceed", blk.cpu()))?;
    desc.variant = Some(variant);

    if siz != variant.rom_size {
        diag.line(&format!(
            "warning : ROM size {} k, expected {} k; possibly incomplete dump",
            siz / 1024,
            variant.rom_size / 1024
        ));
    }

    Ok(sf_offset)
}

/// Fill the fields derived from a located RAMF block. The ECUREC path may
/// already have supplied the alt-checksum bounds and IVT2; those are never
/// overwritten.
fn parse_ramf(buf: &[u8], desc: &mut RomDescriptor) {
    let (Some(variant), Some(p_ramf)) = (desc.variant, desc.p_ramf) else {
        return;
    };
    if let Some(ofs) = variant.ramjump {
        desc.ramjump = read_at(buf, p_ramf + ofs);
    }
    if let Some(ofs) = variant.ram_dlamax {
        desc.ram_dlamax = read_at(buf, p_ramf + ofs);
    }
    if variant.features.alt_cks && desc.p_acstart.is_none() && desc.p_acend.is_none() {
        if let (Some(so), Some(eo)) = (variant.acks_start, variant.acks_end) {
            desc.p_acstart = read_at(buf, p_ramf + so);
            desc.p_acend = read_at(buf, p_ramf + eo);
        }
    }
    if let Some(ofs) = variant.ivt2 {
        if desc.p_ivt2.is_none() {
            desc.p_ivt2 = read_at(buf, p_ramf + ofs);
        }
    }
}

/// Trailer-style families have no RAMF; hunt for the expected &IVT2 value
/// near the end of the image instead, confirming each candidate through its
/// ROM-end field.
pub fn find_ecurec(buf: &[u8], desc: &mut RomDescriptor, diag: &dyn Diag) -> bool {
    let Some(variant) = desc.variant else {
        return false;
    };
    if !variant.features.ecurec {
        return false;
    }
    let (Some(ivt2_expected), Some(ivt2_ofs), Some(romend_ofs)) =
        (variant.ivt2_expected, variant.ivt2, variant.romend)
    else {
        return false;
    };

    let siz = buf.len();
    let mut start = 0usize;
    while start + 100 < siz {
        let Some(rel) = search::find_u32_aligned(&buf[start..], ivt2_expected) else {
            diag.line("IVT2/ROMEND not found");
            return false;
        };
        let temp_ivt2 = (start + rel) as u32;
        start = temp_ivt2 as usize + 4;

        let Some(pp_ecurec) = temp_ivt2.checked_sub(ivt2_ofs) else {
            continue;
        };
        let p_romend = pp_ecurec + romend_ofs;
        if p_romend as usize >= siz.saturating_sub(4) {
            continue;
        }
        let romend = codec::read_u32(buf, p_romend as usize);
        if romend.wrapping_add(1) != siz as u32 {
            // IVT2/ROMEND field mismatch
            continue;
        }

        desc.p_ivt2 = Some(ivt2_expected);
        if let Some(o) = variant.acks_start {
            desc.p_acstart = read_at(buf, pp_ecurec + o);
        }
        if let Some(o) = variant.acks_end {
            desc.p_acend = read_at(buf, pp_ecurec + o);
        }
        desc.p_ecurec = read_at(buf, pp_ecurec);
        return true;
    }
    diag.line("IVT2/ROMEND not found");
    false
}

/// Find and analyze the RAMF block (or the ECUREC trailer), then sanity-check
/// every derived offset. find_fid() must have run before this.
pub fn find_ramf(buf: &[u8], desc: &mut RomDescriptor, diag: &dyn Diag) {
    let (Some(variant), Some(p_fid)) = (desc.variant, desc.p_fid) else {
        return;
    };
    let siz = buf.len() as u32;
    let mut p_ramf = p_fid + variant.fid_size;

    match variant.ramf_header {
        None => {
            let mut found = false;
            if variant.features.ecurec {
                found = find_ecurec(buf, desc, diag);
            }
            if !found {
                diag.line("not trying to find RAMF");
                return;
            }
        }
        Some(magic) => {
            if read_at(buf, p_ramf) != Some(magic) {
                diag.line(&format!(
                    "unlikely contents for struct ramf; got 0x{:X}",
                    read_at(buf, p_ramf).unwrap_or(0)
                ));
                // search around: +4, -4, +8, -8, ... bounded by the variant
                'zigzag: for adj in (4..variant.ramf_maxdist as i64).step_by(4) {
                    for sign in [1i64, -1] {
                        let cand = p_ramf as i64 + sign * adj;
                        if cand < 0 || cand + 4 > siz as i64 {
                            continue;
                        }
                        if codec::read_u32(buf, cand as usize) == magic {
                            diag.line(&format!("probable RAMF found @ delta = {:+}", sign * adj));
                            desc.ramf_adjust = (sign * adj) as i32;
                            p_ramf = cand as u32;
                            break 'zigzag;
                        }
                    }
                }
            }
            desc.p_ramf = Some(p_ramf);
            parse_ramf(buf, desc);
        }
    }

    if variant.features.alt_cks {
        if let (Some(s), Some(e)) = (desc.p_acstart, desc.p_acend) {
            if s >= siz || e >= siz || s >= e {
                diag.line(&format!("bad alt cks bounds; 0x{:X} - 0x{:X}", s, e));
                desc.p_acstart = None;
                desc.p_acend = None;
            }
        }
        if let (Some(s), Some(e)) = (desc.p_acstart, desc.p_acend) {
            if let Some(alt) = checksum::validate_alt(buf, s, e, diag) {
                diag.line(&format!(
                    "alt cks values 0x{:08X} / 0x{:08X}",
                    alt.acs, alt.acx
                ));
                desc.p_acs = Some(alt.p_acs);
                desc.p_acx = Some(alt.p_acx);
                desc.cks_alt_good = true;
            }
        }
    }

    if let Some(ivt2) = desc.p_ivt2 {
        // ivt2 is raw image data; the comparison must not overflow
        if ivt2 >= siz.saturating_sub(IVT_MINSIZE) {
            diag.line("warning : IVT2 value out of bound, probably due to unusual RAMF structure");
            desc.p_ivt2 = None;
        } else {
            if variant.ivt2_expected != Some(ivt2) {
                diag.line(&format!("unexpected IVT2 0x{:X} ! please report this", ivt2));
            }
            if !check_ivt(&buf[ivt2 as usize..]) {
                diag.line(&format!(
                    "unlikely IVT2 location 0x{:06X} : {:08X} {:08X} {:08X} {:08X}...",
                    ivt2,
                    codec::read_u32(buf, ivt2 as usize),
                    codec::read_u32(buf, ivt2 as usize + 4),
                    codec::read_u32(buf, ivt2 as usize + 8),
                    codec::read_u32(buf, ivt2 as usize + 12)
                ));
                // discard so the brute force scan can attempt recovery
                desc.p_ivt2 = None;
            }
        }
    }

    // some families keep the normal RAMF method but still record an ECUREC
    // pointer in it
    if !variant.features.ecurec {
        if let (Some(ofs), Some(p_ramf)) = (variant.ecurec, desc.p_ramf) {
            desc.p_ecurec = read_at(buf, p_ramf + ofs);
        }
    }

    if variant.features.ecurec {
        if let Some(pec) = desc.p_ecurec {
            if pec >= siz.saturating_sub(6) {
                diag.line(&format!("unlikely pecurec = 0x{:X}", pec));
                desc.p_ecurec = None;
            } else {
                // skip the leading '1'
                diag.line(&format!(
                    "probable ECUID @ 0x{:X}: {}",
                    pec,
                    String::from_utf8_lossy(&buf[pec as usize + 1..pec as usize + 6])
                ));
            }
        }
    }
}

/// Judge a candidate vector table: the power-on and manual reset (PC, SP)
/// pairs coincide on this family, the PC points into the lower 16 MiB with
/// 2-byte alignment, and the SP sits in the top 128 KiB of the address space
/// with 4-byte alignment.
pub fn check_ivt(iv: &[u8]) -> bool {
    if iv.len() < 16 {
        return false;
    }
    if iv[0..8] != iv[8..16] {
        return false;
    }
    let pc = codec::read_u32(iv, 0);
    let sp = codec::read_u32(iv, 4);
    if pc >= 0x0100_0000 || pc & 1 != 0 {
        return false;
    }
    if sp < 0xFFFE_0000 || sp & 3 != 0 {
        return false;
    }
    true
}

/// Word-stride scan for the first plausible vector table.
pub fn find_ivt(buf: &[u8]) -> Option<u32> {
    let mut ofs = 0;
    while ofs + 16 <= buf.len() {
        if check_ivt(&buf[ofs..]) {
            return Some(ofs as u32);
        }
        ofs += 4;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Null;

    /// 512 KiB image with a loader block at 0x1000 and an SH705513 FID block
    /// at 0x1FF0, marker at 0x2000.
    fn synthetic_image() -> Vec<u8> {
        let mut buf = vec![0u8; 512 * 1024];
        buf[0x1000..0x1008].copy_from_slice(b"LOADER60");
        buf[0x1008..0x1010].copy_from_slice(b"SH705513");
        buf[0x1010..0x1018].copy_from_slice(b"DATABASE");
        buf[0x1FF0..0x1FF8].copy_from_slice(b"1MC10A00");
        buf[0x1FF8..0x2000].copy_from_slice(b"SH705513");
        buf[0x2000..0x2008].copy_from_slice(b"DATABASE");
        buf
    }

    #[test]
    fn locates_loader_and_version() {
        let buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        let pos = find_loader(&buf, &mut desc, &Null);
        assert_eq!(pos, Some(0x1000));
        assert_eq!(desc.loader_version, Some(60));
        assert_eq!(desc.loader_cpu.as_deref(), Some("SH705513"));
    }

    #[test]
    fn missing_loader_degrades_quietly() {
        let buf = vec![0u8; 4096];
        let mut desc = RomDescriptor::default();
        assert!(find_loader(&buf, &mut desc, &Null).is_none());
        assert!(desc.p_loader.is_none());
    }

    #[test]
    fn fid_search_skips_the_loader_tag() {
        let buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        // first "DATAB" hit is the loader's own tag at 0x1010
        let pos = find_fid(&buf, &mut desc, &Null).expect("FID should be found");
        assert_eq!(pos, 0x2000 - FID_DATABASE_OFFSET);
        assert_eq!(desc.fid.as_deref(), Some("1MC10A00"));
        assert_eq!(desc.fid_cpu.as_deref(), Some("SH705513"));
        let v = desc.variant.expect("variant resolved");
        assert_eq!(v.cpu, b"SH705513");
    }

    #[test]
    fn unknown_cpu_code_is_fatal() {
        let mut buf = synthetic_image();
        buf[0x1FF8..0x2000].copy_from_slice(b"SHXXXXXX");
        let mut desc = RomDescriptor::default();
        assert!(find_fid(&buf, &mut desc, &Null).is_err());
    }

    #[test]
    fn missing_fid_marker_is_fatal() {
        let buf = vec![0u8; 256 * 1024];
        let mut desc = RomDescriptor::default();
        assert!(find_fid(&buf, &mut desc, &Null).is_err());
    }

    #[test]
    fn ramf_found_at_expected_offset() {
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let p_ramf = 0x1FF0 + 0x5C; // fid + sizeof(fid struct)
        // header magic doubles as the RAM-jump field on this family
        codec::write_u32(0xFFFF8000, &mut buf, p_ramf);
        codec::write_u32(0xFFFF7F00, &mut buf, p_ramf + 0x04);
        find_ramf(&buf, &mut desc, &Null);
        assert_eq!(desc.p_ramf, Some(p_ramf as u32));
        assert_eq!(desc.ramf_adjust, 0);
        assert_eq!(desc.ramjump, Some(0xFFFF8000));
        assert_eq!(desc.ram_dlamax, Some(0xFFFF7F00));
    }

    #[test]
    fn ramf_zigzag_records_signed_adjustment() {
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let expected = 0x1FF0 + 0x5C;
        // magic sits 8 bytes before the expected position
        codec::write_u32(0xFFFF8000, &mut buf, expected - 8);
        find_ramf(&buf, &mut desc, &Null);
        assert_eq!(desc.ramf_adjust, -8);
        assert_eq!(desc.p_ramf, Some((expected - 8) as u32));
    }

    #[test]
    fn bad_alt_bounds_reset_to_unknown() {
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let p_ramf = 0x1FF0 + 0x5C;
        codec::write_u32(0xFFFF8000, &mut buf, p_ramf);
        // inverted bounds in the RAMF block
        codec::write_u32(0x00030000, &mut buf, p_ramf + 0x08);
        codec::write_u32(0x00020000, &mut buf, p_ramf + 0x0C);
        find_ramf(&buf, &mut desc, &Null);
        assert!(desc.p_acstart.is_none());
        assert!(desc.p_acend.is_none());
        assert!(!desc.cks_alt_good);
    }

    #[test]
    fn implausible_ivt2_is_discarded() {
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let p_ramf = 0x1FF0 + 0x5C;
        codec::write_u32(0xFFFF8000, &mut buf, p_ramf);
        // IVT2 pointer aims at garbage
        codec::write_u32(0x00010000, &mut buf, p_ramf + 0x10);
        codec::write_u32(0x12345678, &mut buf, 0x10000);
        find_ramf(&buf, &mut desc, &Null);
        assert!(desc.p_ivt2.is_none());
    }

    #[test]
    fn valid_ivt2_is_kept() {
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let p_ramf = 0x1FF0 + 0x5C;
        codec::write_u32(0xFFFF8000, &mut buf, p_ramf);
        codec::write_u32(0x00010000, &mut buf, p_ramf + 0x10);
        // plausible table: duplicated reset pair, aligned PC, top-of-RAM SP
        codec::write_u32(0x00000800, &mut buf, 0x10000);
        codec::write_u32(0xFFFF7FFC, &mut buf, 0x10004);
        codec::write_u32(0x00000800, &mut buf, 0x10008);
        codec::write_u32(0xFFFF7FFC, &mut buf, 0x1000C);
        find_ramf(&buf, &mut desc, &Null);
        assert_eq!(desc.p_ivt2, Some(0x10000));
    }

    #[test]
    fn huge_ivt2_field_resets_to_unknown() {
        // garbage near u32::MAX in the RAMF's IVT2 slot must degrade, not
        // wrap the bound check
        let mut buf = synthetic_image();
        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        let p_ramf = 0x1FF0 + 0x5C;
        codec::write_u32(0xFFFF8000, &mut buf, p_ramf);
        codec::write_u32(0xFFFFFFF0, &mut buf, p_ramf + 0x10);
        find_ramf(&buf, &mut desc, &Null);
        assert!(desc.p_ivt2.is_none());
    }

    #[test]
    fn huge_ecurec_pointer_resets_to_unknown() {
        let siz = 1280 * 1024;
        let mut buf = vec![0u8; siz];
        buf[0x1FF0..0x1FF8].copy_from_slice(b"1MR20B00");
        buf[0x1FF8..0x2000].copy_from_slice(b"SH72543R");
        buf[0x2000..0x2008].copy_from_slice(b"DATABASE");
        let pp = siz - 0x100;
        // confirmed trailer whose record pointer is garbage
        codec::write_u32(0xFFFFFFFE, &mut buf, pp);
        codec::write_u32(siz as u32 - 1, &mut buf, pp + 0x04);
        codec::write_u32(0x00010000, &mut buf, pp + 0x08);
        codec::write_u32(0x00020000, &mut buf, pp + 0x0C);
        codec::write_u32(0x00030000, &mut buf, pp + 0x10);

        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        find_ramf(&buf, &mut desc, &Null);
        assert!(desc.p_ecurec.is_none());
    }

    #[test]
    fn check_ivt_enforces_alignment_and_ranges() {
        let mut iv = vec![0u8; 16];
        codec::write_u32(0x00000800, &mut iv, 0);
        codec::write_u32(0xFFFF7FFC, &mut iv, 4);
        codec::write_u32(0x00000800, &mut iv, 8);
        codec::write_u32(0xFFFF7FFC, &mut iv, 12);
        assert!(check_ivt(&iv));

        // odd PC
        codec::write_u32(0x00000801, &mut iv, 0);
        codec::write_u32(0x00000801, &mut iv, 8);
        assert!(!check_ivt(&iv));

        // PC above 16 MiB
        codec::write_u32(0x01000000, &mut iv, 0);
        codec::write_u32(0x01000000, &mut iv, 8);
        assert!(!check_ivt(&iv));

        // SP below the top 128 KiB
        codec::write_u32(0x00000800, &mut iv, 0);
        codec::write_u32(0x00000800, &mut iv, 8);
        codec::write_u32(0xFF000000, &mut iv, 4);
        codec::write_u32(0xFF000000, &mut iv, 12);
        assert!(!check_ivt(&iv));

        // mismatched reset pairs
        codec::write_u32(0xFFFF7FFC, &mut iv, 4);
        codec::write_u32(0xFFFF7FF8, &mut iv, 12);
        assert!(!check_ivt(&iv));
    }

    #[test]
    fn ecurec_trailer_is_confirmed_through_romend() {
        let siz = 1280 * 1024;
        let mut buf = vec![0u8; siz];
        // FID for the trailer family
        buf[0x1FF0..0x1FF8].copy_from_slice(b"1MR20B00");
        buf[0x1FF8..0x2000].copy_from_slice(b"SH72543R");
        buf[0x2000..0x2008].copy_from_slice(b"DATABASE");
        // decoy match: expected IVT2 value with a bad ROM-end field
        codec::write_u32(0x00010000, &mut buf, 0x80000 + 0x08);
        // real ECUREC block near the end
        let pp = siz - 0x100;
        codec::write_u32(0x00123456, &mut buf, pp); // ECUID record pointer
        codec::write_u32(siz as u32 - 1, &mut buf, pp + 0x04);
        codec::write_u32(0x00010000, &mut buf, pp + 0x08);
        codec::write_u32(0x00020000, &mut buf, pp + 0x0C);
        codec::write_u32(0x00030000, &mut buf, pp + 0x10);

        let mut desc = RomDescriptor::default();
        find_fid(&buf, &mut desc, &Null).unwrap();
        assert!(find_ecurec(&buf, &mut desc, &Null));
        assert_eq!(desc.p_ivt2, Some(0x00010000));
        assert_eq!(desc.p_acstart, Some(0x00020000));
        assert_eq!(desc.p_acend, Some(0x00030000));
        assert_eq!(desc.p_ecurec, Some(0x00123456));
    }
}
