/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Map an arbitrary key (usually a URL) to a filesystem-safe file name.
///
/// The result keeps a readable prefix of the key with every character
/// outside `[A-Za-z0-9._-]` replaced by `-`, followed by the first 16 hex
/// digits of the key's BLAKE3 digest. Two keys that sanitize to the same
/// prefix still land in different files.
#[must_use]
pub fn mangle_key(key: &str) -> String {
    const PREFIX_LEN: usize = 64;

    let readable: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(PREFIX_LEN)
        .collect();
    let readable = readable.trim_matches(|c| c == '-' || c == '.');

    let digest = blake3_bytes(key.as_bytes());
    format!("{readable}-{}", &digest[..16])
}
