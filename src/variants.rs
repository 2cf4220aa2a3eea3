//! Static descriptor table for the known firmware families, keyed by the CPU
//! code found in the FID block. These are lookup data, not inferred: one
//! entry per family, selected once and never mutated.
//!
//! All in-struct offsets are relative to the RAMF block (or the ECUREC block
//! for the trailer-style families). `None` means the family has no such
//! field; offset 0 stays a legal concrete offset.

pub struct Features {
    pub std_cks: bool,
    pub alt_cks: bool,
    pub alt2_cks: bool,
    pub ivt2: bool,
    pub ecurec: bool,
}

pub struct VariantDescriptor {
    /// CPU code as stored in the FID block
    pub cpu: &'static [u8; 8],
    pub rom_size: u32,
    /// sizeof the FID struct for this family; the RAMF block follows it
    pub fid_size: u32,
    pub features: Features,
    /// expected first word of the RAMF block; None = family has no RAMF
    pub ramf_header: Option<u32>,
    /// zigzag search bound when the header is not where expected
    pub ramf_maxdist: u32,
    pub ramjump: Option<u32>,
    pub ram_dlamax: Option<u32>,
    pub acks_start: Option<u32>,
    pub acks_end: Option<u32>,
    pub ivt2: Option<u32>,
    pub ecurec: Option<u32>,
    /// ECUREC trailer only: offset of the "last ROM byte" field used to
    /// confirm a candidate block
    pub romend: Option<u32>,
    /// value the IVT2 pointer is expected to hold
    pub ivt2_expected: Option<u32>,
}

const NO_FEAT: Features = Features {
    std_cks: true,
    alt_cks: false,
    alt2_cks: false,
    ivt2: false,
    ecurec: false,
};

const ALT_IVT2: Features = Features {
    std_cks: true,
    alt_cks: true,
    alt2_cks: false,
    ivt2: true,
    ecurec: false,
};

pub static VARIANTS: &[VariantDescriptor] = &[
    VariantDescriptor {
        cpu: b"SH705507",
        rom_size: 256 * 1024,
        fid_size: 0x58,
        features: NO_FEAT,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x10,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: None,
        acks_end: None,
        ivt2: None,
        ecurec: None,
        romend: None,
        ivt2_expected: None,
    },
    VariantDescriptor {
        cpu: b"SH705513",
        rom_size: 512 * 1024,
        fid_size: 0x5C,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x20,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    VariantDescriptor {
        cpu: b"SH705519",
        rom_size: 512 * 1024,
        fid_size: 0x5C,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x20,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    VariantDescriptor {
        cpu: b"SH705520",
        rom_size: 512 * 1024,
        fid_size: 0x60,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x20,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    VariantDescriptor {
        cpu: b"SH705821",
        rom_size: 1024 * 1024,
        fid_size: 0x60,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x40,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    // 705822 keeps the normal RAMF method but also carries an ECUREC
    // pointer, read through the RAMF after the fact
    VariantDescriptor {
        cpu: b"SH705822",
        rom_size: 1024 * 1024,
        fid_size: 0x60,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x40,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: Some(0x14),
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    VariantDescriptor {
        cpu: b"SH705823",
        rom_size: 1024 * 1024,
        fid_size: 0x60,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x40,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    VariantDescriptor {
        cpu: b"SH705828",
        rom_size: 1024 * 1024,
        fid_size: 0x68,
        features: ALT_IVT2,
        ramf_header: Some(0xFFFF8000),
        ramf_maxdist: 0x40,
        ramjump: Some(0x00),
        ram_dlamax: Some(0x04),
        acks_start: Some(0x08),
        acks_end: Some(0x0C),
        ivt2: Some(0x10),
        ecurec: None,
        romend: None,
        ivt2_expected: Some(0x00010000),
    },
    // trailer-style family: no RAMF, an ECUREC block near the end of the
    // image instead; offsets below are relative to that block
    VariantDescriptor {
        cpu: b"SH72543R",
        rom_size: 1280 * 1024,
        fid_size: 0x68,
        features: Features {
            std_cks: true,
            alt_cks: true,
            alt2_cks: true,
            ivt2: true,
            ecurec: true,
        },
        ramf_header: None,
        ramf_maxdist: 0,
        ramjump: None,
        ram_dlamax: None,
        acks_start: Some(0x0C),
        acks_end: Some(0x10),
        ivt2: Some(0x08),
        ecurec: None,
        romend: Some(0x04),
        ivt2_expected: Some(0x00010000),
    },
];

/// Resolve a raw CPU code slice from the FID block against the table.
pub fn by_cpu_code(cpu: &[u8]) -> Option<&'static VariantDescriptor> {
    if cpu.len() < 8 {
        return None;
    }
    VARIANTS.iter().find(|v| &cpu[..8] == v.cpu.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_cpu_codes() {
        let v = by_cpu_code(b"SH705513").expect("known CPU");
        assert_eq!(v.rom_size, 512 * 1024);
        assert!(v.features.alt_cks);
        assert!(by_cpu_code(b"SH999999").is_none());
        assert!(by_cpu_code(b"SH70").is_none());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        // FID CPU field is wider than the code on some ROMs
        assert!(by_cpu_code(b"SH705828\0\0").is_some());
    }

    #[test]
    fn table_is_internally_consistent() {
        for v in VARIANTS {
            assert!(v.rom_size >= 128 * 1024 && v.rom_size <= 2048 * 1024);
            // alt checksum needs both bound fields somewhere
            if v.features.alt_cks {
                assert!(v.acks_start.is_some() && v.acks_end.is_some());
            }
            // trailer families need the cross-check field and an IVT2 value
            if v.features.ecurec && v.ramf_header.is_none() {
                assert!(v.romend.is_some());
                assert!(v.ivt2.is_some());
                assert!(v.ivt2_expected.is_some());
            }
        }
    }
}
