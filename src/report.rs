//! Descriptor output: human-readable property list and CSV rows.
//! Column set and feature gating follow CSV conventions already in use for
//! these ROMs, so rows from different tool versions line up.

use crate::rom::{RomDescriptor, RomImage};

pub static PROP_NAMES: &[&str] = &[
    "ECUID",
    "file",
    "size",
    "LOADER ##",
    "LOADER ofs",
    "LOADER CPU",
    "LOADER CPUcode",
    "FID",
    "&FID",
    "FID CPU",
    "FID CPUcode",
    "RAMF_weird",
    "RAMjump_entry",
    "IVT2",
    "IVT2 confidence",
    "std cks?",
    "&std_s",
    "&std_x",
    "alt cks?",
    "&alt_s",
    "&alt_x",
    "alt_start",
    "alt_end",
    "alt2 cks?",
    "&alt2_s",
    "&alt2_x",
    "alt2_start",
    "RIPEMD160",
    "keyset quality",
    "s27k",
    "s36k1",
    "&EEPROM_read()",
    "EEPROM PORT",
    "MD5",
];

fn hex(v: Option<u32>) -> String {
    match v {
        Some(v) => format!("0x{:X}", v),
        None => String::new(),
    }
}

fn yesno(v: bool) -> String {
    if v { "1".into() } else { "0".into() }
}

/// The 8-char CPU field splits into a 6-char CPU name and a 2-char code.
fn cpu_split(cpu: &str) -> (String, String) {
    let name = cpu.get(..6).unwrap_or(cpu).to_string();
    let code = cpu.get(6..).unwrap_or_default().to_string();
    (name, code)
}

/// All property values for one image, in PROP_NAMES order. Fields behind a
/// variant feature the ROM does not carry come out empty.
pub fn build_values(rom: &RomImage, desc: &RomDescriptor) -> Vec<String> {
    let has = |f: fn(&crate::variants::Features) -> bool| {
        desc.variant.map_or(false, |v| f(&v.features))
    };

    let mut vals = Vec::with_capacity(PROP_NAMES.len());
    vals.push(ecuid_from_filename(&rom.filename).unwrap_or_default());
    vals.push(rom.filename.clone());
    vals.push(format!("{}k", rom.len() / 1024));
    vals.push(match desc.loader_version {
        Some(v) => format!("{:02}", v),
        None => String::new(),
    });
    vals.push(hex(desc.p_loader));
    let (lcpu, lcode) = cpu_split(desc.loader_cpu.as_deref().unwrap_or_default());
    vals.push(lcpu);
    vals.push(lcode);
    vals.push(desc.fid.clone().unwrap_or_default());
    vals.push(hex(desc.p_fid));
    let fid_cpu = desc.fid_cpu.clone().unwrap_or_default();
    let (_, fcode) = cpu_split(&fid_cpu);
    vals.push(fid_cpu);
    vals.push(fcode);
    vals.push(format!("{}", desc.ramf_adjust));
    vals.push(match desc.ramjump {
        Some(v) => format!("0x{:08X}", v),
        None => String::new(),
    });
    vals.push(hex(desc.p_ivt2));
    vals.push(format!("{}", desc.ivt2_confidence));
    if has(|f| f.std_cks) {
        vals.push(yesno(desc.cks_std_good));
        vals.push(hex(desc.p_cks));
        vals.push(hex(desc.p_ckx));
    } else {
        vals.extend(std::iter::repeat(String::new()).take(3));
    }
    if has(|f| f.alt_cks) {
        vals.push(yesno(desc.cks_alt_good));
        vals.push(hex(desc.p_acs));
        vals.push(hex(desc.p_acx));
        vals.push(hex(desc.p_acstart));
        vals.push(hex(desc.p_acend));
    } else {
        vals.extend(std::iter::repeat(String::new()).take(5));
    }
    if has(|f| f.alt2_cks) {
        vals.push(yesno(desc.cks_alt2_good));
        vals.push(hex(desc.p_a2cs));
        vals.push(hex(desc.p_a2cx));
        vals.push(hex(desc.p_a2start));
    } else {
        vals.extend(std::iter::repeat(String::new()).take(4));
    }
    vals.push(yesno(desc.has_rm160));
    vals.push(format!("{}", desc.keyset_quality));
    vals.push(hex(desc.s27k));
    vals.push(hex(desc.s36k));
    vals.push(hex(desc.p_eepread));
    vals.push(hex(desc.eep_port));
    vals.push(desc.md5.clone().unwrap_or_default());
    vals
}

pub fn print_human(rom: &RomImage, desc: &RomDescriptor) {
    let vals = build_values(rom, desc);
    for (name, val) in PROP_NAMES.iter().zip(vals.iter()) {
        println!("{}\t{}", name, val);
    }
}

pub fn print_csv_header() {
    let quoted: Vec<String> = PROP_NAMES.iter().map(|n| format!("\"{}\"", n)).collect();
    println!("{}", quoted.join(","));
}

pub fn print_csv_values(rom: &RomImage, desc: &RomDescriptor) {
    let vals = build_values(rom, desc);
    let quoted: Vec<String> = vals.iter().map(|v| format!("\"{}\"", v)).collect();
    println!("{}", quoted.join(","));
}

/// Guess the ECUID from the file name: first alphanumeric token of the
/// basename, uppercased. Valid IDs are 5 chars, or 6 starting with '1'
/// (drop the leading 1).
pub fn ecuid_from_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let token: String = base
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let token = token.to_ascii_uppercase();
    match token.len() {
        5 => Some(token),
        6 if token.starts_with('1') => Some(token[1..].to_string()),
        _ => None,
    }
}
