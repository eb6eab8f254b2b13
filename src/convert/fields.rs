//! Turn raw MSG field values into clean text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::ConvertOptions;
use crate::model::message::FieldValue;
use crate::parser::autodecode::auto_decode;
use crate::parser::charset::{decode_lossy, EncodingResolver};

use super::stamp::format_date;

/// Reads [`FieldValue`]s the way every text field of a message is read.
///
/// - Bytes go through the encoding resolver, or lossy UTF-8 when detection is off.
/// - Text goes through the auto-decoder when enabled.
/// - Timestamps, flags and integers are rendered as strings.
///
/// The result is trimmed and an empty result counts as absent.
#[derive(Debug, Clone, Copy)]
pub struct FieldNormalizer<'a> {
    options: &'a ConvertOptions,
    resolver: &'a EncodingResolver,
}

impl<'a> FieldNormalizer<'a> {
    pub fn new(options: &'a ConvertOptions, resolver: &'a EncodingResolver) -> Self {
        Self { options, resolver }
    }

    /// Normalized, trimmed text, or `None` when absent or blank.
    pub fn text(&self, value: Option<&FieldValue>) -> Option<String> {
        let text = self.render(value?);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Like [`text`](Self::text) but folded onto one line, for header values.
    pub fn header(&self, value: Option<&FieldValue>) -> Option<String> {
        self.text(value).map(|t| single_line(&t))
    }

    /// A body: normalized but not trimmed. Blank bodies count as absent.
    pub fn body(&self, value: Option<&FieldValue>) -> Option<String> {
        let text = self.render(value?);
        (!text.trim().is_empty()).then_some(text)
    }

    /// A body that is markup rather than prose (HTML, RTF).
    ///
    /// Only the charset is resolved; transfer-encoding detection would
    /// mistake attribute values like `width=100` for escapes.
    pub fn markup(&self, value: Option<&FieldValue>) -> Option<String> {
        let text = match value? {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bytes(b) => self.decode_bytes(b),
            other => self.render(other),
        };
        (!text.trim().is_empty()).then_some(text)
    }

    /// Decode bytes with the configured strategy.
    pub fn decode_bytes(&self, bytes: &[u8]) -> String {
        if self.options.detect_encoding {
            self.resolver.resolve_bytes(bytes).text
        } else {
            decode_lossy(bytes).text
        }
    }

    fn render(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Text(s) if self.options.auto_decode => auto_decode(s, self.resolver),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bytes(b) => self.decode_bytes(b),
            FieldValue::Timestamp(t) => format_date(t),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Integer(n) => n.to_string(),
        }
    }
}

/// Join the lines of `text` with single spaces.
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `PR_SENSITIVITY` as a word.
pub fn sensitivity_label(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Integer(n) => Some(
            match n {
                0 => "Normal",
                1 => "Personal",
                2 => "Private",
                3 => "Confidential",
                _ => return Some(n.to_string()),
            }
            .to_string(),
        ),
        _ => None,
    }
}

/// `PR_FLAG_STATUS` as a word.
pub fn flag_status_label(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Integer(n) => Some(
            match n {
                0 => "NotFlagged",
                1 => "Complete",
                2 => "Flagged",
                _ => return Some(n.to_string()),
            }
            .to_string(),
        ),
        _ => None,
    }
}

/// Binary values (the conversation index) as Base64, text as is.
pub fn binary_or_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Bytes(b) if !b.is_empty() => Some(STANDARD.encode(b)),
        FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn with<R>(options: ConvertOptions, f: impl FnOnce(FieldNormalizer<'_>) -> R) -> R {
        let resolver = EncodingResolver::default();
        f(FieldNormalizer::new(&options, &resolver))
    }

    #[test]
    fn test_absent_and_blank_are_none() {
        with(ConvertOptions::default(), |n| {
            assert_eq!(n.text(None), None);
            assert_eq!(n.text(Some(&FieldValue::text("  \r\n"))), None);
            assert_eq!(n.body(Some(&FieldValue::text(" "))), None);
        });
    }

    #[test]
    fn test_text_is_trimmed_and_auto_decoded() {
        with(ConvertOptions::default(), |n| {
            assert_eq!(
                n.text(Some(&FieldValue::text("  =?UTF-8?B?SG9sYQ==?= "))),
                Some("Hola".to_string())
            );
        });
        let options = ConvertOptions {
            auto_decode: false,
            ..Default::default()
        };
        with(options, |n| {
            assert_eq!(
                n.text(Some(&FieldValue::text("=?UTF-8?B?SG9sYQ==?="))),
                Some("=?UTF-8?B?SG9sYQ==?=".to_string())
            );
        });
    }

    #[test]
    fn test_bytes_use_detection_switch() {
        let (gbk, _, _) = encoding_rs::GBK.encode("测试");
        let value = FieldValue::Bytes(gbk.into_owned());
        with(ConvertOptions::default(), |n| {
            assert_eq!(n.text(Some(&value)), Some("测试".to_string()));
        });
        let options = ConvertOptions {
            detect_encoding: false,
            ..Default::default()
        };
        with(options, |n| {
            let text = n.text(Some(&value)).unwrap();
            assert_ne!(text, "测试");
            assert!(text.contains('\u{FFFD}'));
        });
    }

    #[test]
    fn test_scalars_are_rendered() {
        with(ConvertOptions::default(), |n| {
            let t = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
            assert_eq!(
                n.text(Some(&FieldValue::Timestamp(t))).as_deref(),
                Some("Mon, 15 Jan 2024 09:30:00 +0000")
            );
            assert_eq!(n.text(Some(&FieldValue::Flag(true))).as_deref(), Some("true"));
            assert_eq!(n.text(Some(&FieldValue::Integer(42))).as_deref(), Some("42"));
        });
    }

    #[test]
    fn test_header_is_single_line() {
        with(ConvertOptions::default(), |n| {
            assert_eq!(
                n.header(Some(&FieldValue::text("Line one\r\n  line two\n"))),
                Some("Line one line two".to_string())
            );
        });
    }

    #[test]
    fn test_markup_skips_transfer_decoding() {
        with(ConvertOptions::default(), |n| {
            let html = "<td width=100>x</td>";
            assert_eq!(n.markup(Some(&FieldValue::text(html))).as_deref(), Some(html));
            assert_eq!(
                n.markup(Some(&FieldValue::Bytes(html.as_bytes().to_vec()))).as_deref(),
                Some(html)
            );
        });
    }

    #[test]
    fn test_labels() {
        assert_eq!(sensitivity_label(&FieldValue::Integer(2)).as_deref(), Some("Private"));
        assert_eq!(sensitivity_label(&FieldValue::Integer(9)).as_deref(), Some("9"));
        assert_eq!(flag_status_label(&FieldValue::Integer(2)).as_deref(), Some("Flagged"));
        assert_eq!(flag_status_label(&FieldValue::text("x")), None);
        assert_eq!(
            binary_or_text(&FieldValue::Bytes(vec![1, 2, 3])).as_deref(),
            Some("AQID")
        );
    }
}
