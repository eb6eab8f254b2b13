//! Write a header set and MIME tree as RFC 5322 bytes.

use mail_builder::headers::address::Address;
use mail_builder::headers::content_type::ContentType;
use mail_builder::headers::raw::Raw;
use mail_builder::headers::text::Text;
use mail_builder::headers::HeaderType;
use mail_builder::mime::MimePart;
use mail_builder::MessageBuilder;

use crate::error::{ConvertError, Result};
use crate::model::address::Mailbox;
use crate::model::header::{is_valid_name, HeaderSet};
use crate::model::mime::{MimeLeaf, MimeNode};

use super::stamp::ConversionStamp;

/// Headers whose non-ASCII values are written as address lists.
const ADDRESS_HEADERS: &[&str] = &["from", "to", "cc", "bcc", "reply-to", "sender"];

/// The builder adds its own Date, Message-ID and MIME-Version unless it
/// sees exactly these spellings.
const BUILDER_NAMES: &[&str] = &["Date", "Message-ID", "MIME-Version"];

/// Serialize `root` under `headers`.
///
/// Headers come first in set order, followed by the root part's own
/// `Content-*` headers. Multipart boundaries derive from `stamp`. Fails when a
/// header name is unusable or a value would span lines.
pub fn serialize(headers: &HeaderSet, root: &MimeNode, stamp: &ConversionStamp) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new();
    for entry in headers {
        check_header(entry.name(), &entry.value)?;
        builder = builder.header(
            canonical_name(entry.name()),
            header_value(entry.name(), &entry.value),
        );
    }

    let mut boundaries = 0;
    builder = builder.body(mime_part(root, stamp, &mut boundaries));

    let mut out = Vec::new();
    builder
        .write_to(&mut out)
        .map_err(|e| ConvertError::Assembly(e.to_string()))?;
    Ok(out)
}

fn check_header(name: &str, value: &str) -> Result<()> {
    if !is_valid_name(name) {
        return Err(ConvertError::Assembly(format!(
            "invalid header name {name:?}"
        )));
    }
    if value.contains(['\r', '\n']) {
        return Err(ConvertError::Assembly(format!(
            "header {name} contains a line break"
        )));
    }
    Ok(())
}

fn canonical_name(name: &str) -> &str {
    BUILDER_NAMES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .copied()
        .unwrap_or(name)
}

/// ASCII values go out as they are; the rest get RFC 2047 encoding.
fn header_value<'x>(name: &str, value: &'x str) -> HeaderType<'x> {
    if value.is_ascii() {
        return Raw::new(value).into();
    }
    if ADDRESS_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
        let list = Mailbox::parse_list(value);
        if !list.is_empty() && list.iter().all(|m| !m.addr.is_empty()) {
            return Address::new_list(
                list.into_iter()
                    .map(|m| Address::new_address((!m.name.is_empty()).then_some(m.name), m.addr))
                    .collect(),
            )
            .into();
        }
    }
    Text::new(value).into()
}

/// Builder part for `node`, numbering multipart boundaries depth-first.
fn mime_part<'x>(node: &'x MimeNode, stamp: &ConversionStamp, boundaries: &mut usize) -> MimePart<'x> {
    match node {
        MimeNode::Leaf(leaf) => leaf_part(leaf),
        MimeNode::Multipart { kind, children } => {
            let boundary = stamp.boundary(*boundaries);
            *boundaries += 1;
            let parts: Vec<MimePart<'x>> = children
                .iter()
                .map(|child| mime_part(child, stamp, &mut *boundaries))
                .collect();
            MimePart::new(
                ContentType::new(format!("multipart/{}", kind.as_str())).attribute("boundary", boundary),
                parts,
            )
        }
    }
}

fn leaf_part(leaf: &MimeLeaf) -> MimePart<'_> {
    let mut content_type = ContentType::new(leaf.content_type.as_str());
    if let Some(charset) = &leaf.charset {
        content_type = content_type.attribute("charset", charset.as_str());
    }
    if let Some(name) = &leaf.attachment_name {
        content_type = content_type.attribute("name", name.as_str());
    }

    let part = match (&leaf.charset, std::str::from_utf8(&leaf.payload)) {
        (Some(_), Ok(text)) => MimePart::new(content_type, text),
        _ => MimePart::new(content_type, leaf.payload.as_slice()),
    };
    match &leaf.attachment_name {
        Some(name) => part.attachment(name.as_str()),
        None => part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::header::HeaderEntry;
    use crate::model::mime::MultipartKind;
    use chrono::{FixedOffset, TimeZone};
    use mail_parser::{MessageParser, MimeHeaders};
    use uuid::Uuid;

    fn stamp() -> ConversionStamp {
        ConversionStamp::fixed(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 5, 6, 14, 30, 0)
                .unwrap(),
            Uuid::nil(),
        )
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        let mut set = HeaderSet::new();
        for (n, v) in pairs {
            set.push(HeaderEntry::new(n, *v).unwrap());
        }
        set
    }

    fn standard() -> HeaderSet {
        headers(&[
            ("Subject", "Hi"),
            ("X-Mailer", "Outlook"),
            ("Date", "Mon, 06 May 2024 14:30:00 +0000"),
            ("Message-ID", "<a@example.com>"),
            ("MIME-Version", "1.0"),
        ])
    }

    fn render(headers: &HeaderSet, root: &MimeNode) -> String {
        String::from_utf8(serialize(headers, root, &stamp()).unwrap()).unwrap()
    }

    #[test]
    fn test_headers_keep_set_order() {
        let root = MimeNode::Leaf(MimeLeaf::text("plain", "Hello"));
        let text = render(&standard(), &root);
        assert!(text.starts_with(
            "Subject: Hi\r\n\
             X-Mailer: Outlook\r\n\
             Date: Mon, 06 May 2024 14:30:00 +0000\r\n\
             Message-ID: <a@example.com>\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain"
        ));
        let message = MessageParser::default().parse(text.as_bytes()).unwrap();
        assert_eq!(message.body_text(0).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_lowercase_names_are_not_duplicated() {
        let root = MimeNode::Leaf(MimeLeaf::text("plain", ""));
        let set = headers(&[
            ("date", "Mon, 06 May 2024 14:30:00 +0000"),
            ("message-id", "<a@example.com>"),
            ("mime-version", "1.0"),
        ]);
        let text = render(&set, &root).to_ascii_lowercase();
        assert_eq!(text.matches("date:").count(), 1);
        assert_eq!(text.matches("message-id:").count(), 1);
        assert_eq!(text.matches("mime-version:").count(), 1);
    }

    #[test]
    fn test_multipart_uses_stamp_boundaries() {
        let root = MimeNode::Multipart {
            kind: MultipartKind::Mixed,
            children: vec![
                MimeNode::Multipart {
                    kind: MultipartKind::Alternative,
                    children: vec![
                        MimeNode::Leaf(MimeLeaf::text("plain", "a")),
                        MimeNode::Leaf(MimeLeaf::text("html", "<b>a</b>")),
                    ],
                },
                MimeNode::Leaf(MimeLeaf::attachment("application/pdf", "q1 report.pdf", vec![0; 3])),
            ],
        };
        let text = render(&standard(), &root);
        let outer = stamp().boundary(0);
        let inner = stamp().boundary(1);
        assert!(text.contains(&format!("--{outer}\r\n")));
        assert!(text.contains(&format!("--{inner}--")));
        assert!(text.contains(&format!("--{outer}--")));

        let message = MessageParser::default().parse(text.as_bytes()).unwrap();
        assert_eq!(message.body_text(0).as_deref(), Some("a"));
        assert_eq!(message.body_html(0).as_deref(), Some("<b>a</b>"));
        let pdf = message.attachment(0).unwrap();
        assert_eq!(pdf.attachment_name(), Some("q1 report.pdf"));
        assert_eq!(pdf.contents(), &[0, 0, 0]);
    }

    #[test]
    fn test_same_stamp_same_bytes() {
        let root = MimeNode::Multipart {
            kind: MultipartKind::Mixed,
            children: vec![
                MimeNode::Leaf(MimeLeaf::text("plain", "body")),
                MimeNode::Leaf(MimeLeaf::attachment("image/png", "a.png", vec![7; 200])),
            ],
        };
        assert_eq!(
            serialize(&standard(), &root, &stamp()).unwrap(),
            serialize(&standard(), &root, &stamp()).unwrap()
        );
    }

    #[test]
    fn test_non_ascii_values_are_encoded() {
        let root = MimeNode::Leaf(MimeLeaf::attachment("application/pdf", "报告.pdf", vec![1]));
        let mut set = standard();
        set.set("Subject", "季度报告");
        set.push(HeaderEntry::new("From", "张三 <zhang@example.cn>").unwrap());
        set.push(HeaderEntry::new("To", "Ann, 李四").unwrap());
        let bytes = serialize(&set, &root, &stamp()).unwrap();
        let head_len = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        assert!(bytes[..head_len].is_ascii());

        let message = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(message.subject(), Some("季度报告"));
        let from = message.from().and_then(|a| a.first()).unwrap();
        assert_eq!(from.name(), Some("张三"));
        assert_eq!(from.address(), Some("zhang@example.cn"));
        assert_eq!(message.attachment(0).unwrap().attachment_name(), Some("报告.pdf"));
    }

    #[test]
    fn test_rejects_line_break_in_header() {
        let root = MimeNode::Leaf(MimeLeaf::text("plain", ""));
        let mut set = HeaderSet::new();
        set.push(HeaderEntry::new("Subject", "a\r\nBcc: x@y").unwrap());
        assert!(matches!(
            serialize(&set, &root, &stamp()),
            Err(ConvertError::Assembly(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_name() {
        let root = MimeNode::Leaf(MimeLeaf::text("plain", ""));
        let set = headers(&[("X Spam Score", "3")]);
        assert!(matches!(
            serialize(&set, &root, &stamp()),
            Err(ConvertError::Assembly(_))
        ));
    }
}
