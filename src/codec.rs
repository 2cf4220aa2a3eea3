//! Fixed byte-order conversions. The whole ROM uses SH endianness (most
//! significant byte first), regardless of the host.
//!
//! No bounds checking here: an out-of-range access is a caller bug and
//! panics, it is not a recoverable condition.

pub fn read_u32(buf: &[u8], ofs: usize) -> u32 {
    u32::from_be_bytes(buf[ofs..ofs + 4].try_into().unwrap())
}

pub fn read_u16(buf: &[u8], ofs: usize) -> u16 {
    u16::from_be_bytes(buf[ofs..ofs + 2].try_into().unwrap())
}

pub fn write_u32(val: u32, buf: &mut [u8], ofs: usize) {
    buf[ofs..ofs + 4].copy_from_slice(&val.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_most_significant_byte_first() {
        let buf = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_u32(&buf, 0), 0x12345678);
        assert_eq!(read_u16(&buf, 2), 0x5678);
    }

    #[test]
    fn write_round_trips() {
        let mut buf = [0u8; 8];
        write_u32(0xDEADBEEF, &mut buf, 4);
        assert_eq!(buf[..4], [0, 0, 0, 0]);
        assert_eq!(read_u32(&buf, 4), 0xDEADBEEF);
    }
}
