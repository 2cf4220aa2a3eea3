use crate::common;
use binrw::BinRead;

pub static MIN_ROMSIZE: u32 = 128 * 1024;
pub static MAX_ROMSIZE: u32 = 2048 * 1024;

pub static LOADER_MARKER: &[u8] = b"LOADER";
pub static FID_MARKER: &[u8] = b"DATAB";

/// marker offset inside the loader block
pub static LOADER_MARKER_OFFSET: u32 = 0x00;
/// database tag offset inside the loader block; the tag reads "DATAB..."
/// too, which is how an FID search can false-positive on the loader
pub static LOADER_DATABASE_OFFSET: u32 = 0x10;
pub static LOADER_SIZE: u32 = 0x20;

/// database tag offset inside the FID block, same for every family
pub static FID_DATABASE_OFFSET: u32 = 0x10;
pub static FID_CPU_OFFSET: u32 = 0x08;
/// upper bound on sizeof(fid struct) across families, for the end-of-image
/// sanity check
pub static FID_MAXSIZE: u32 = 0x80;

pub static IVT_MINSIZE: u32 = 0x400;

#[derive(BinRead)]
pub struct LoaderBlock {
    loader_bytes: [u8; 8], // "LOADER" + decimal version digits
    cpu_bytes: [u8; 8],
    _database_bytes: [u8; 8],
    _flags: u32,
    _entry: u32,
}

impl LoaderBlock {
    pub fn cpu(&self) -> String {
        common::string_from_bytes(&self.cpu_bytes)
    }

    /// Best effort: the two bytes after "LOADER" usually hold a decimal
    /// version number, but not on every ROM.
    pub fn version(&self) -> Option<u32> {
        let digits: String = self.loader_bytes[6..]
            .iter()
            .map(|&b| b as char)
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

#[derive(BinRead)]
pub struct FidBlock {
    fid_bytes: [u8; 8],
    cpu_bytes: [u8; 8],
    _database_bytes: [u8; 8],
}

impl FidBlock {
    pub fn fid(&self) -> String {
        common::string_from_bytes(&self.fid_bytes)
    }

    pub fn cpu(&self) -> String {
        common::string_from_bytes(&self.cpu_bytes)
    }

    pub fn cpu_bytes(&self) -> &[u8; 8] {
        &self.cpu_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinReaderExt;
    use std::io::Cursor;

    #[test]
    fn parses_loader_block_fields() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"LOADER60");
        raw.extend_from_slice(b"SH705513");
        raw.extend_from_slice(b"DATABASE");
        raw.extend_from_slice(&[0u8; 8]);
        let blk: LoaderBlock = Cursor::new(&raw).read_be().unwrap();
        assert_eq!(blk.version(), Some(60));
        assert_eq!(blk.cpu(), "SH705513");
    }

    #[test]
    fn missing_version_digits_stay_unknown() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"LOADER\0\0");
        raw.extend_from_slice(b"SH705507");
        raw.extend_from_slice(b"DATABASE");
        raw.extend_from_slice(&[0u8; 8]);
        let blk: LoaderBlock = Cursor::new(&raw).read_be().unwrap();
        assert_eq!(blk.version(), None);
    }
}
