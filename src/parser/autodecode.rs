//! Undo transfer encodings left inside text fields.
//!
//! Outlook sometimes stores a value still wrapped in Base64, Quoted-Printable
//! or RFC 2047 encoded-words. The checks run in that order and the first one
//! that decodes wins; anything else is returned as is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use super::charset::EncodingResolver;
use super::header::decode_encoded_words;

/// Stripped values this short are never treated as Base64.
const MIN_BASE64_LEN: usize = 20;

/// Whether `text` looks like a complete, strictly valid Base64 payload.
///
/// Whitespace is ignored. The payload must use only the standard alphabet
/// plus padding, have a length that is a multiple of 4, decode strictly, and
/// be longer than 20 characters so that short alphanumeric tokens do not
/// qualify.
pub fn is_base64_encoded(text: &str) -> bool {
    if text.len() < 4 {
        return false;
    }
    let cleaned = strip_whitespace(text);
    if !cleaned
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
    {
        return false;
    }
    if cleaned.len() % 4 != 0 {
        return false;
    }
    STANDARD.decode(cleaned.as_bytes()).is_ok() && cleaned.len() > MIN_BASE64_LEN
}

/// Whether `text` contains at least one `=XX` hex escape.
pub fn is_quoted_printable_encoded(text: &str) -> bool {
    text.as_bytes()
        .windows(3)
        .any(|w| w[0] == b'=' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

/// Whether `text` contains encoded-word markers.
pub fn has_encoded_words(text: &str) -> bool {
    text.contains("=?") && text.contains("?=")
}

/// Reverse Base64, Quoted-Printable or RFC 2047 wrapping, best effort.
///
/// Decoded bytes go through `resolver`. Returns the input unchanged when no
/// check matches or decoding fails.
pub fn auto_decode(text: &str, resolver: &EncodingResolver) -> String {
    if text.is_empty() {
        return String::new();
    }

    if is_base64_encoded(text) {
        match STANDARD.decode(strip_whitespace(text).as_bytes()) {
            Ok(bytes) => return resolver.resolve_bytes(&bytes).text,
            Err(e) => debug!(error = %e, "Base64 auto-decode failed"),
        }
    }

    if is_quoted_printable_encoded(text) {
        // Non-ASCII text cannot be a QP payload
        if text.is_ascii() {
            match quoted_printable::decode(text, quoted_printable::ParseMode::Robust) {
                Ok(bytes) => return resolver.resolve_bytes(&bytes).text,
                Err(e) => debug!(error = %e, "Quoted-printable auto-decode failed"),
            }
        }
    }

    if has_encoded_words(text) {
        return decode_encoded_words(text);
    }

    text.to_string()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}
