//! Minimal error-notice message used when a conversion cannot be assembled.

use crate::model::header::HeaderSet;
use crate::model::mime::{MimeLeaf, MimeNode};

use super::headers::provenance_headers;
use super::serialize::serialize;
use super::stamp::ConversionStamp;

pub const ERROR_SUBJECT: &str = "MSG Conversion Error";
pub const ERROR_SENDER: &str = "msg-to-eml-converter@localhost";

/// A single-part text message describing why conversion failed.
pub fn compose_error_message(description: &str, stamp: &ConversionStamp) -> Vec<u8> {
    let mut headers = HeaderSet::new();
    headers.set("Subject", ERROR_SUBJECT);
    headers.set("From", ERROR_SENDER);
    headers.set("Date", stamp.date());
    headers.set("Message-ID", stamp.message_id());
    headers.set("MIME-Version", "1.0");
    for entry in &provenance_headers(stamp) {
        headers.set(entry.name(), entry.value.clone());
    }

    let body = format!("MSG conversion error:\n{description}");
    let root = MimeNode::Leaf(MimeLeaf::text("plain", &body));

    serialize(&headers, &root, stamp).unwrap_or_else(|_| {
        format!("Subject: {ERROR_SUBJECT}\r\nFrom: {ERROR_SENDER}\r\n\r\n{body}\r\n").into_bytes()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    #[test]
    fn test_error_message_parses() {
        let stamp = ConversionStamp::new();
        let bytes = compose_error_message("property stream truncated", &stamp);
        let message = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(message.subject(), Some(ERROR_SUBJECT));
        assert_eq!(
            message.body_text(0).unwrap().replace("\r\n", "\n").trim_end(),
            "MSG conversion error:\nproperty stream truncated"
        );
        assert_eq!(message.attachment_count(), 0);
        assert!(message.header_raw("X-Converted-From").is_some());
    }

    #[test]
    fn test_error_message_is_reproducible() {
        let stamp = ConversionStamp::new();
        assert_eq!(
            compose_error_message("bad", &stamp),
            compose_error_message("bad", &stamp)
        );
        let text = String::from_utf8(compose_error_message("bad", &stamp)).unwrap();
        assert_eq!(text.matches("Message-ID:").count(), 1);
        assert!(text.contains(&format!("Message-ID: {}", stamp.message_id())));
    }
}
