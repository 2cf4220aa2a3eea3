//! The analysis session: one ROM image, one mutable result record, locator
//! and checksum steps run in fixed dependency order with graceful
//! degradation. Only a missing/unknown FID aborts the whole analysis.

pub mod include;

use crate::checksum;
use crate::codec;
use crate::diag::Diag;
use crate::finders;
use crate::locate;
use crate::search;
use crate::variants::VariantDescriptor;

pub struct RomImage {
    pub filename: String,
    pub buf: Vec<u8>,
}

impl RomImage {
    pub fn new(buf: Vec<u8>, filename: String) -> Self {
        RomImage { filename, buf }
    }

    pub fn len(&self) -> u32 {
        self.buf.len() as u32
    }
}

/// Mutable result record for one analyzed image. Every position field is a
/// byte offset into the image; `None` means "not determined, do not use",
/// never "offset zero".
#[derive(Default)]
pub struct RomDescriptor {
    pub p_loader: Option<u32>,
    pub loader_version: Option<u32>,
    pub loader_cpu: Option<String>,

    pub p_fid: Option<u32>,
    pub fid: Option<String>,
    pub fid_cpu: Option<String>,
    pub variant: Option<&'static VariantDescriptor>,

    pub p_ramf: Option<u32>,
    /// signed delta from the expected RAMF position, 0 when found in place
    pub ramf_adjust: i32,
    pub ramjump: Option<u32>,
    pub ram_dlamax: Option<u32>,

    pub p_ivt2: Option<u32>,
    pub ivt2_confidence: u32,

    pub p_cks: Option<u32>,
    pub p_ckx: Option<u32>,
    pub cks_std_good: bool,
    pub std_cks_ambiguous: bool,

    pub p_acs: Option<u32>,
    pub p_acx: Option<u32>,
    pub p_acstart: Option<u32>,
    pub p_acend: Option<u32>,
    pub cks_alt_good: bool,

    pub p_a2cs: Option<u32>,
    pub p_a2cx: Option<u32>,
    pub p_a2start: Option<u32>,
    pub cks_alt2_good: bool,

    pub p_ecurec: Option<u32>,

    pub p_eepread: Option<u32>,
    pub eep_port: Option<u32>,

    pub has_rm160: bool,

    pub keyset_quality: u32,
    pub s27k: Option<u32>,
    pub s36k: Option<u32>,

    pub md5: Option<String>,
}

pub fn analyze(
    rom: &RomImage,
    diag: &dyn Diag,
) -> Result<RomDescriptor, Box<dyn std::error::Error>> {
    let mut desc = RomDescriptor::default();
    analyze_into(rom, &mut desc, diag)?;
    Ok(desc)
}

/// Same as [analyze] but fills a caller-owned descriptor, so a failed run
/// still leaves the partial (or untouched) record inspectable.
pub fn analyze_into(
    rom: &RomImage,
    desc: &mut RomDescriptor,
    diag: &dyn Diag,
) -> Result<(), Box<dyn std::error::Error>> {
    let buf = &rom.buf[..];

    locate::find_loader(buf, desc, diag);
    locate::find_fid(buf, desc, diag)?;
    let variant = desc.variant.ok_or("no variant resolved")?;
    locate::find_ramf(buf, desc, diag);

    // RIPEMD-160 initialization constants present anywhere?
    desc.has_rm160 = search::find_u32_aligned(buf, 0x67452301).is_some()
        && search::find_u32_aligned(buf, 0x98BADCFE).is_some();

    if variant.features.std_cks {
        if let Some(std) = checksum::locate_standard(buf, diag) {
            diag.line(&format!(
                "confirmed std cks=0x{:08X} @ 0x{:X}, ckx=0x{:08X} @ 0x{:X}",
                std.cks, std.p_cks, std.ckx, std.p_ckx
            ));
            desc.p_cks = Some(std.p_cks);
            desc.p_ckx = Some(std.p_ckx);
            desc.cks_std_good = true;
            desc.std_cks_ambiguous = std.ambiguous;
        }
    }

    // alt2 block starts at the ECUREC record and skips the word just before
    // the vector table; when the table sits below the record there is no
    // word to skip
    if variant.features.alt2_cks {
        if let (Some(pecurec), Some(ivt2)) = (desc.p_ecurec, desc.p_ivt2) {
            if (pecurec as usize) < buf.len() && (ivt2 as usize) < buf.len() {
                let skip2 = ivt2.checked_sub(4).and_then(|v| v.checked_sub(pecurec));
                desc.p_a2start = Some(pecurec);
                match checksum::locate_alt2(&buf[pecurec as usize..], None, skip2, diag) {
                    Some((ps, px)) => {
                        desc.cks_alt2_good = true;
                        desc.p_a2cs = Some(pecurec + ps);
                        desc.p_a2cx = Some(pecurec + px);
                    }
                    None => {
                        diag.line("alt2 checksum not found ?? bad algo, bad skip, or other problem");
                    }
                }
            }
        }
    }

    if variant.features.ivt2 && desc.p_ivt2.is_none() {
        brute_force_ivt2(buf, desc, diag);
    } else if desc.p_ivt2.is_some() {
        desc.ivt2_confidence = 99;
    }

    finders::find_eep(buf, desc, diag);
    finders::find_keys(buf, desc, diag)?;

    let digest = format!("{:x}", md5::compute(buf));
    diag.line(&format!("MD5: {}", digest));
    desc.md5 = Some(digest);

    Ok(())
}

/// Last resort when the variant expects an IVT2 but none was confirmed:
/// scan the whole image for anything shaped like a vector table. Confidence
/// only; the pointer field stays unknown.
fn brute_force_ivt2(buf: &[u8], desc: &mut RomDescriptor, diag: &dyn Diag) {
    diag.line("no IVT2 ?? last resort, brute force scan:");
    let siz = buf.len();
    let mut iter = 0x100usize; // skip the power-on IVT
    let mut found_probable = false;
    while iter + (include::IVT_MINSIZE as usize) < siz {
        match locate::find_ivt(&buf[iter..]) {
            None => {
                if !found_probable {
                    diag.line("no IVT2 found");
                }
                break;
            }
            Some(rel) => {
                iter += rel as usize;
                desc.ivt2_confidence = desc.ivt2_confidence.max(50);
                diag.line(&format!("possible IVT @ 0x{:X}", iter));
                if iter + 8 <= siz && codec::read_u32(buf, iter + 4) == 0xFFFF7FFC {
                    desc.ivt2_confidence = 75;
                    diag.line("probable IVT !");
                    found_probable = true;
                }
                iter += 4;
            }
        }
    }
}
