//! Auxiliary finders: the EEPROM read routine and the security keysets.
//! Both are best-effort signature scans; their results land in the report
//! verbatim and nothing downstream depends on them.

use crate::diag::Diag;
use crate::keys;
use crate::rom::RomDescriptor;
use crate::search;

/// I/O port registers known to drive the EEPROM pins on this family.
static EEP_PORTS: &[u32] = &[0xFFFFD002, 0xFFFFF720, 0xFFFFF728];

/// sts.l pr,@-r15 : the read routine's usual first opcode.
static EEPREAD_PROLOGUE: u16 = 0x4F22;

/// The routine loads its port register from a literal pool entry placed
/// shortly after the code. Hunt for a known port literal from the top of the
/// image down, then look for a function prologue in the window before it.
pub fn find_eep(buf: &[u8], desc: &mut RomDescriptor, diag: &dyn Diag) {
    for &port in EEP_PORTS {
        let Some(lit) = search::find_u32_aligned_reverse(buf, buf.len().saturating_sub(4), port)
        else {
            continue;
        };
        let win_start = lit.saturating_sub(0x200);
        if let Some(rel) = search::find_u16_aligned(&buf[win_start..lit], EEPREAD_PROLOGUE) {
            let p_eepread = (win_start + rel) as u32;
            diag.line(&format!(
                "eeprom_read() @ 0x{:X}, port 0x{:08X}",
                p_eepread, port
            ));
            desc.p_eepread = Some(p_eepread);
            desc.eep_port = Some(port);
            return;
        }
    }
}

/// Match the image against the embedded keyset table. Both key words found
/// as aligned values -> confirmed (2); a single word -> likely (1).
pub fn find_keys(
    buf: &[u8],
    desc: &mut RomDescriptor,
    diag: &dyn Diag,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut partial: Option<(u32, u32)> = None;
    for (s27_hex, s36_hex, name) in keys::KNOWN_KEYSETS {
        let s27 = u32::from_be_bytes(hex::decode(s27_hex)?.as_slice().try_into()?);
        let s36 = u32::from_be_bytes(hex::decode(s36_hex)?.as_slice().try_into()?);
        let h27 = search::find_u32_aligned(buf, s27).is_some();
        let h36 = search::find_u32_aligned(buf, s36).is_some();
        if h27 && h36 {
            diag.line(&format!("keyset \"{}\" confirmed in ROM", name));
            desc.keyset_quality = 2;
            desc.s27k = Some(s27);
            desc.s36k = Some(s36);
            return Ok(());
        }
        if (h27 || h36) && partial.is_none() {
            diag.line(&format!("keyset \"{}\" partial match", name));
            partial = Some((s27, s36));
        }
    }
    if let Some((s27, s36)) = partial {
        desc.keyset_quality = 1;
        desc.s27k = Some(s27);
        desc.s36k = Some(s36);
    }
    Ok(())
}
