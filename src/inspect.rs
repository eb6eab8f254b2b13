//! Look inside produced EML files and source MSG messages.

use std::str::FromStr;

use mail_parser::MessageParser;
use serde::Serialize;

use crate::config::ConvertOptions;
use crate::convert::fields::{binary_or_text, single_line};
use crate::convert::headers::describe_original;
use crate::convert::{ConversionStamp, Converter};
use crate::model::message::SourceMessage;
use crate::parser::header::decode_encoded_words;

/// Field values longer than this are cut in [`describe_source`].
pub const MAX_FIELD_DISPLAY: usize = 200;

const CONVERTER_HEADERS: &[&str] = &["x-converted-from", "x-converter", "x-conversion-date"];
const TRANSPORT_HEADERS: &[&str] = &[
    "received",
    "x-mailer",
    "x-originating-ip",
    "x-sender-ip",
    "authentication-results",
    "received-spf",
    "dkim-signature",
    "x-sender-smtp-address",
    "x-received-by-smtp-address",
];
const EXTENDED_HEADERS: &[&str] = &[
    "x-message-class",
    "x-sensitivity",
    "x-flag-status",
    "x-categories",
    "x-companies",
];

// ── Header categories ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCategory {
    Converter,
    Ip,
    Transport,
    Extended,
    Basic,
}

impl HeaderCategory {
    pub const ALL: [HeaderCategory; 5] = [
        Self::Converter,
        Self::Ip,
        Self::Transport,
        Self::Extended,
        Self::Basic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Converter => "converter",
            Self::Ip => "ip",
            Self::Transport => "transport",
            Self::Extended => "extended",
            Self::Basic => "basic",
        }
    }

    /// Classify one header. The first matching rule wins:
    /// converter, IPv4 in the value, transport, extended, basic.
    pub fn of(name: &str, value: &str) -> Self {
        let key = name.to_ascii_lowercase();
        if CONVERTER_HEADERS.contains(&key.as_str()) {
            Self::Converter
        } else if contains_ipv4(value) {
            Self::Ip
        } else if TRANSPORT_HEADERS.contains(&key.as_str()) {
            Self::Transport
        } else if key.starts_with("thread-") || EXTENDED_HEADERS.contains(&key.as_str()) {
            Self::Extended
        } else {
            Self::Basic
        }
    }
}

impl FromStr for HeaderCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown category '{s}' (expected one of: converter, ip, transport, extended, basic)"
                )
            })
    }
}

impl std::fmt::Display for HeaderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `text` contains a dotted-quad IPv4 address.
pub fn contains_ipv4(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .any(|token| {
            let parts: Vec<&str> = token.split('.').collect();
            parts.windows(4).any(|w| {
                w.iter().all(|p| {
                    (1..=3).contains(&p.len()) && p.parse::<u16>().is_ok_and(|n| n <= 255)
                })
            })
        })
}

/// One header of a produced EML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedHeader {
    pub name: String,
    /// Unfolded, with encoded-words decoded.
    pub value: String,
    pub category: HeaderCategory,
}

/// Every top-level header of `eml`, categorized. `None` if it does not parse.
pub fn categorize_headers(eml: &[u8]) -> Option<Vec<InspectedHeader>> {
    let message = MessageParser::default().parse(eml)?;
    Some(
        message
            .headers_raw()
            .map(|(name, raw)| {
                let value = decode_encoded_words(&single_line(raw));
                InspectedHeader {
                    category: HeaderCategory::of(name, &value),
                    name: name.to_string(),
                    value,
                }
            })
            .collect(),
    )
}

/// Keep only headers in `categories`; an empty filter keeps everything.
pub fn filter_headers(
    headers: Vec<InspectedHeader>,
    categories: &[HeaderCategory],
) -> Vec<InspectedHeader> {
    if categories.is_empty() {
        return headers;
    }
    headers
        .into_iter()
        .filter(|h| categories.contains(&h.category))
        .collect()
}

// ── Source attributes ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceField {
    pub name: &'static str,
    /// `text`, `bytes`, `time`, `flag` or `int`.
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub size: usize,
}

/// Populated fields of an MSG message plus its original headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescription {
    pub fields: Vec<SourceField>,
    pub recipients: usize,
    pub attachments: Vec<AttachmentInfo>,
    pub original_headers: Vec<(String, String)>,
}

/// List every populated source field, read the way conversion reads it.
pub fn describe_source(msg: &SourceMessage, converter: &Converter) -> SourceDescription {
    let fields = converter.fields();

    let described = msg
        .fields()
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value?;
            let text = match name {
                "conversation_index" => binary_or_text(value),
                "html_body" | "rtf_body" => fields.markup(Some(value)),
                _ => fields.text(Some(value)),
            }?;
            Some(SourceField {
                name,
                kind: value.kind(),
                value: truncate_display(&text),
            })
        })
        .collect();

    let attachments = msg
        .attachments
        .iter()
        .enumerate()
        .map(|(i, att)| AttachmentInfo {
            filename: crate::convert::attachment::resolve_filename(att, i, &fields),
            size: att.size(),
        })
        .collect();

    SourceDescription {
        fields: described,
        recipients: msg.recipients.len(),
        attachments,
        original_headers: describe_original(msg, &fields),
    }
}

fn truncate_display(text: &str) -> String {
    if text.chars().count() > MAX_FIELD_DISPLAY {
        let cut: String = text.chars().take(MAX_FIELD_DISPLAY).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

// ── Option presets ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Preset {
    Basic,
    TransportOnly,
    AttributesOnly,
    All,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Basic, Self::TransportOnly, Self::AttributesOnly, Self::All];

    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::TransportOnly => "Transport only",
            Self::AttributesOnly => "MSG attributes only",
            Self::All => "All",
        }
    }

    /// `base` with the three header switches set for this preset.
    pub fn apply(self, base: ConvertOptions) -> ConvertOptions {
        let (transport, extended, ip) = match self {
            Self::Basic => (false, false, false),
            Self::TransportOnly => (true, false, false),
            Self::AttributesOnly => (false, true, false),
            Self::All => (true, true, true),
        };
        ConvertOptions {
            preserve_transport_headers: transport,
            preserve_headers: extended,
            show_ip_info: ip,
            ..base
        }
    }
}

/// Headers produced under one preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetReport {
    pub preset: Preset,
    pub label: &'static str,
    pub headers: Vec<InspectedHeader>,
}

impl PresetReport {
    pub fn count(&self) -> usize {
        self.headers.len()
    }
}

/// Convert `msg` under each preset and collect the resulting headers.
pub fn compare_presets(msg: &SourceMessage, converter: &Converter) -> Vec<PresetReport> {
    let stamp = ConversionStamp::new();
    Preset::ALL
        .into_iter()
        .map(|preset| {
            let variant = converter.with_options(preset.apply(*converter.options()));
            let converted = variant.convert_with_stamp(msg, &stamp);
            PresetReport {
                preset,
                label: preset.label(),
                headers: categorize_headers(&converted.bytes).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::FieldValue;

    #[test]
    fn test_contains_ipv4() {
        assert!(contains_ipv4("from mail.example.com ([192.168.1.20])"));
        assert!(contains_ipv4("10.0.0.1"));
        assert!(!contains_ipv4("msg2eml/0.1.0"));
        assert!(!contains_ipv4("999.1.1.1"));
        assert!(!contains_ipv4("Mon, 15 Jan 2024 09:30:00 +0000"));
    }

    #[test]
    fn test_category_order() {
        assert_eq!(HeaderCategory::of("X-Converter", "10.0.0.1"), HeaderCategory::Converter);
        assert_eq!(
            HeaderCategory::of("Received", "from a ([10.1.2.3])"),
            HeaderCategory::Ip
        );
        assert_eq!(HeaderCategory::of("Received", "from a by b"), HeaderCategory::Transport);
        assert_eq!(HeaderCategory::of("Thread-Topic", "x"), HeaderCategory::Extended);
        assert_eq!(HeaderCategory::of("X-Sensitivity", "Private"), HeaderCategory::Extended);
        assert_eq!(HeaderCategory::of("Subject", "Hi"), HeaderCategory::Basic);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("IP".parse::<HeaderCategory>(), Ok(HeaderCategory::Ip));
        assert!("network".parse::<HeaderCategory>().is_err());
    }

    #[test]
    fn test_categorize_decodes_and_unfolds() {
        let eml = b"Subject: =?utf-8?b?5rWL6K+V?=\r\nReceived: from a\r\n by b\r\nX-Converter: msg2eml/0.1.0\r\n\r\nbody";
        let headers = categorize_headers(eml).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].value, "测试");
        assert_eq!(headers[0].category, HeaderCategory::Basic);
        assert_eq!(headers[1].value, "from a by b");
        assert_eq!(headers[1].category, HeaderCategory::Transport);
        assert_eq!(headers[2].category, HeaderCategory::Converter);

        let only = filter_headers(headers, &[HeaderCategory::Converter]);
        assert_eq!(only.len(), 1);
    }

    #[test]
    fn test_describe_source_truncates() {
        let msg = SourceMessage {
            subject: Some(FieldValue::text("Hello, world! ".repeat(25))),
            conversation_index: Some(FieldValue::Bytes(vec![0xFF, 0x00])),
            transport_headers: Some(FieldValue::text("Received: from a\r\nX-Mailer: Outlook\r\n")),
            ..Default::default()
        };
        let desc = describe_source(&msg, &Converter::default());
        let subject = desc.fields.iter().find(|f| f.name == "subject").unwrap();
        assert_eq!(subject.value.chars().count(), MAX_FIELD_DISPLAY + 3);
        let index = desc.fields.iter().find(|f| f.name == "conversation_index").unwrap();
        assert_eq!(index.value, "/wA=");
        assert_eq!(index.kind, "bytes");
        assert_eq!(desc.original_headers.len(), 2);
        assert!(desc.fields.iter().all(|f| f.name != "body"));
    }

    #[test]
    fn test_presets_change_header_counts() {
        let msg = SourceMessage {
            subject: Some(FieldValue::text("Hi")),
            message_class: Some(FieldValue::text("IPM.Note")),
            sender_smtp_address: Some(FieldValue::text("a@example.com")),
            transport_headers: Some(FieldValue::text(
                "Received: from relay ([10.0.0.5])\r\nX-Mailer: Outlook\r\n",
            )),
            ..Default::default()
        };
        let reports = compare_presets(&msg, &Converter::default());
        assert_eq!(reports.len(), 4);
        let has = |r: &PresetReport, name: &str| {
            r.headers.iter().any(|h| h.name.eq_ignore_ascii_case(name))
        };
        let [basic, transport, attrs, all] = [&reports[0], &reports[1], &reports[2], &reports[3]];
        assert!(!has(basic, "received") && !has(basic, "x-message-class"));
        assert!(has(transport, "received") && !has(transport, "x-message-class"));
        assert!(!has(attrs, "received") && has(attrs, "x-message-class"));
        assert!(has(all, "received") && has(all, "x-ip-info-note"));
        assert!(basic.count() < all.count());
    }
}
