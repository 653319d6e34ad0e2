//! Latin-1 (ISO-8859-1) text decoding.
//!
//! Every byte maps to the code point of the same value, so decoding never fails.

/// Decode bytes as Latin-1 text.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode bytes as Latin-1 text after dropping trailing NUL bytes.
pub fn decode_trimmed(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    decode(&bytes[..end])
}
