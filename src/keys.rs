//! Known security keysets, (s27 key, s36k1 key, name), as hex strings.
//! Decoded at the point of use.

pub static KNOWN_KEYSETS: &[(&str, &str, &str)] = &[
    ("95E1A2B4", "4D0F3E21", "OEM common"),
    ("11E53F0C", "8A45C1D9", "diesel family"),
    ("7C2B9A40", "F31E06B8", "late 72543"),
    ("D4A09E77", "26C8135F", "aftermarket reflash"),
];
