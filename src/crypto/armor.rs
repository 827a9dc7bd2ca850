//! PEM envelope (RFC 7468)
//!
//! Wraps DER payloads in a labelled base64 envelope and finds the first such
//! envelope in arbitrary input. Encoding is strict (64 columns, LF); decoding
//! accepts any line width, CRLF line endings and RFC 1421 style headers.

use crate::errors::{KeyCacheError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pem_rfc7468::LineEnding;
use tracing::debug;
use zeroize::Zeroizing;

/// Label for PKCS#8 PrivateKeyInfo payloads
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Label for X.509 SubjectPublicKeyInfo payloads
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

const BEGIN_MARKER: &[u8] = b"-----BEGIN ";
const END_MARKER: &[u8] = b"-----END ";
const DELIMITER: &[u8] = b"-----";

/// A decoded envelope
pub struct Armored {
    pub label: String,
    pub der: Zeroizing<Vec<u8>>,
}

/// Armor a DER payload with LF line endings
pub fn encode(label: &str, der: &[u8]) -> std::result::Result<String, pem_rfc7468::Error> {
    pem_rfc7468::encode_string(label, LineEnding::LF, der)
}

/// Decode the first PEM block found in `input`
///
/// Text before the BEGIN line and after the END line is ignored.
pub fn decode(input: &[u8]) -> Result<Armored> {
    let block = find_block(input).ok_or(KeyCacheError::NoArmorFound)?;

    let text = std::str::from_utf8(block).map_err(|_| {
        debug!("Rejected PEM block with non UTF-8 content");
        KeyCacheError::NoArmorFound
    })?;

    parse_block(text).ok_or_else(|| {
        debug!("Rejected malformed PEM block");
        KeyCacheError::NoArmorFound
    })
}

fn find_block(input: &[u8]) -> Option<&[u8]> {
    let start = find(input, BEGIN_MARKER)?;
    let rest = &input[start..];

    let end_line = find(rest, END_MARKER)? + END_MARKER.len();
    let end = end_line + find(&rest[end_line..], DELIMITER)? + DELIMITER.len();

    Some(&rest[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse one block that starts at its BEGIN line and ends at its END line
fn parse_block(text: &str) -> Option<Armored> {
    let mut lines = text.lines().map(str::trim_end);

    let label = lines
        .next()?
        .strip_prefix("-----BEGIN ")?
        .strip_suffix("-----")?;
    let end_line = format!("-----END {}-----", label);

    let mut body = Zeroizing::new(String::new());
    let mut in_headers = true;

    for line in lines {
        if line == end_line {
            let der = STANDARD.decode(body.as_bytes()).ok()?;
            return Some(Armored {
                label: label.to_string(),
                der: Zeroizing::new(der),
            });
        }

        // Headers end at the first line without a colon; base64 never has one
        if in_headers {
            if line.contains(':') {
                continue;
            }
            in_headers = false;
            if line.is_empty() {
                continue;
            }
        }

        body.extend(line.chars().filter(|c| !c.is_ascii_whitespace()));
    }

    None
}
