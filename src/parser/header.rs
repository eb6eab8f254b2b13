//! RFC 5322 header blocks: unfolding, deduplication and RFC 2047 decoding.

use base64::Engine;

use crate::model::header::{is_repeatable, HeaderEntry};

use super::charset::decode_charset;

/// Parse a raw transport-header blob into ordered entries.
///
/// - Line endings are normalized first.
/// - A blank line ends the block.
/// - Lines starting with a space or tab continue the open header.
/// - Any other line with a colon starts a new header.
/// - Everything else is skipped.
///
/// Folded fragments are trimmed and joined with a single space.
pub fn parse_header_block(raw: &str) -> Vec<HeaderEntry> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut headers = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, fragments)) = current.as_mut() {
                fragments.push(line.trim().to_string());
            }
        } else if let Some(colon_pos) = line.find(':') {
            flush(&mut current, &mut headers);
            let name = line[..colon_pos].trim();
            let value = line[colon_pos + 1..].trim();
            if !name.is_empty() {
                let fragments = if value.is_empty() {
                    Vec::new()
                } else {
                    vec![value.to_string()]
                };
                current = Some((name.to_string(), fragments));
            }
        }
        // Lines without a colon that are not continuations are skipped
    }

    flush(&mut current, &mut headers);
    headers
}

fn flush(current: &mut Option<(String, Vec<String>)>, out: &mut Vec<HeaderEntry>) {
    if let Some((name, fragments)) = current.take() {
        if let Some(entry) = HeaderEntry::new(&name, fragments.join(" ")) {
            out.push(entry);
        }
    }
}

/// Keep the first occurrence of each header name, except repeatable ones
/// (`Received`), which are all kept in their original order.
pub fn dedup_headers(headers: Vec<HeaderEntry>) -> Vec<HeaderEntry> {
    let mut seen = std::collections::HashSet::new();
    headers
        .into_iter()
        .filter(|h| seen.insert(h.key()) || is_repeatable(h.name()))
        .collect()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is not part of the text (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &after_start[decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    // RFC 2231 language suffix: charset*lang
    let charset = s[..first_q].split('*').next().unwrap_or_default();
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_b_encoding(encoded_text)?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_charset(charset, &bytes),
        consumed: total_consumed,
    })
}

/// Decode B-encoding, tolerating missing padding and stray whitespace.
fn decode_b_encoding(input: &str) -> Option<Vec<u8>> {
    use base64::alphabet;
    use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

    const LENIENT: GeneralPurpose = GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true),
    );

    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT.decode(cleaned.as_bytes()).ok()
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        result.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
