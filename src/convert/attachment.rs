//! Attachment parts: filename resolution, content type, placeholders.

use tracing::warn;

use crate::model::attachment::{Payload, SourceAttachment};
use crate::model::mime::MimeLeaf;

use super::fields::FieldNormalizer;

/// Characters not allowed in output filenames.
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Body of the placeholder for an attachment without content.
pub const PLACEHOLDER_ABSENT: &str = "[Attachment content not included]";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Replace every forbidden character with `_`, leaving the rest untouched.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// First non-empty name candidate, or `attachment_{index + 1}`, sanitized.
pub fn resolve_filename(
    attachment: &SourceAttachment,
    index: usize,
    fields: &FieldNormalizer<'_>,
) -> String {
    let name = attachment
        .name_candidates()
        .into_iter()
        .find_map(|candidate| fields.header(candidate))
        .unwrap_or_else(|| format!("attachment_{}", index + 1));
    sanitize_filename(&name)
}

/// Content type from the file extension, then the MSG mime tag.
pub fn guess_content_type(filename: &str, mime_tag: Option<&str>) -> String {
    if let Some(guess) = mime_guess::from_path(filename).first_raw() {
        return guess.to_string();
    }
    match mime_tag.map(str::trim) {
        Some(tag) if is_mime_type(tag) => tag.to_ascii_lowercase(),
        _ => DEFAULT_CONTENT_TYPE.to_string(),
    }
}

fn is_mime_type(s: &str) -> bool {
    let Some((top, sub)) = s.split_once('/') else {
        return false;
    };
    let token = |t: &str| {
        !t.is_empty()
            && t.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&^_.+-".contains(&b))
    };
    token(top) && token(sub)
}

/// Build the MIME leaf for one attachment.
///
/// An attachment without readable content becomes a short text placeholder
/// that keeps the resolved filename.
pub fn materialize(
    attachment: &SourceAttachment,
    index: usize,
    fields: &FieldNormalizer<'_>,
) -> MimeLeaf {
    let filename = resolve_filename(attachment, index, fields);
    match &attachment.payload {
        Payload::Data(data) => {
            let mime_tag = fields.header(attachment.mime_tag.as_ref());
            let content_type = guess_content_type(&filename, mime_tag.as_deref());
            MimeLeaf::attachment(&content_type, &filename, data.clone())
        }
        Payload::Absent => placeholder(&filename, PLACEHOLDER_ABSENT),
        Payload::Failed(error) => {
            warn!(filename = %filename, error = %error, "Attachment content unavailable");
            placeholder(
                &filename,
                &format!("[Attachment content unavailable: {error}]"),
            )
        }
    }
}

fn placeholder(filename: &str, note: &str) -> MimeLeaf {
    MimeLeaf {
        charset: Some("utf-8".to_string()),
        ..MimeLeaf::attachment("text/plain", filename, note.as_bytes().to_vec())
    }
}
