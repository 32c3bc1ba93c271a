//! Content checksums for installed artifacts
//!
//! Remote checksum files are published by several build hosts and are not
//! uniform: some carry trailing newlines, some are the raw output of a
//! hashing tool (`<hash>  <file>` or a header line followed by the hash).
//! Everything is normalised to lower-case hex before comparison.

/// Length of an MD5 digest in hex characters
const MD5_HEX_LEN: usize = 32;

/// Compute the lower-case hex MD5 of a byte buffer
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Extract a comparable checksum from a remote checksum payload
///
/// Prefers the first whitespace-separated token that looks like an MD5
/// digest and falls back to the first token. Returns `None` for a payload
/// that is empty after trimming.
pub fn normalize_remote(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut tokens = text.split_whitespace();
    let first = tokens.next()?;

    let digest = std::iter::once(first)
        .chain(tokens)
        .find(|token| is_md5_hex(token))
        .unwrap_or(first);

    Some(digest.to_ascii_lowercase())
}

fn is_md5_hex(token: &str) -> bool {
    token.len() == MD5_HEX_LEN && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Compare local content against a remote checksum payload
///
/// An empty local buffer never matches, so a missing file always reads as
/// stale.
pub fn matches_remote(local: &[u8], remote: &str) -> bool {
    if local.is_empty() {
        return false;
    }
    md5_hex(local).eq_ignore_ascii_case(remote.trim())
}
