/// Text slice pulled out of the image: stops at the first NUL, lossy for
/// anything non-UTF8.
pub fn string_from_bytes(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_nul() {
        assert_eq!(string_from_bytes(b"SH705513"), "SH705513");
        assert_eq!(string_from_bytes(b"AB\0CD"), "AB");
        assert_eq!(string_from_bytes(b""), "");
    }
}
