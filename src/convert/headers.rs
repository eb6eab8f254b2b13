//! Derive the header sources of a message from its MSG fields.

use crate::model::address::Mailbox;
use crate::model::header::HeaderEntry;
use crate::model::message::{FieldValue, RecipientKind, SourceMessage};
use crate::parser::header::{dedup_headers, parse_header_block};

use super::fields::{binary_or_text, flag_status_label, sensitivity_label, single_line, FieldNormalizer};
use super::reconcile::HeaderSources;
use super::stamp::{format_date, ConversionStamp};

/// Value of `X-Converted-From`.
pub const CONVERTED_FROM: &str = "MSG";
/// Value of `X-IP-Info-Note`.
pub const IP_INFO_NOTE: &str = "IP addresses preserved from original MSG headers";

/// `msg2eml/<version>`.
pub fn converter_name() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Collect every header source of `msg`.
pub fn header_sources(
    msg: &SourceMessage,
    fields: &FieldNormalizer<'_>,
    stamp: &ConversionStamp,
) -> HeaderSources {
    HeaderSources {
        original: original_headers(msg, fields),
        synthesized: standard_headers(msg, fields, stamp),
        extended: extended_headers(msg, fields),
        ip_info: ip_info_headers(msg, fields),
        provenance: provenance_headers(stamp),
    }
}

fn push(out: &mut Vec<HeaderEntry>, name: &str, value: Option<String>) {
    if let Some(entry) = value.and_then(|v| HeaderEntry::new(name, v)) {
        out.push(entry);
    }
}

/// The transport header block, parsed and deduplicated.
///
/// The block is decoded for charset only; its encoded-words stay as they are.
pub fn original_headers(msg: &SourceMessage, fields: &FieldNormalizer<'_>) -> Vec<HeaderEntry> {
    let raw = match msg.transport_headers.as_ref() {
        Some(FieldValue::Text(s)) => s.clone(),
        Some(FieldValue::Bytes(b)) => fields.decode_bytes(b),
        _ => return Vec::new(),
    };
    dedup_headers(parse_header_block(&raw))
}

/// Subject, From, To, Cc, Bcc, Date, Message-ID, Reply-To and MIME-Version.
pub fn standard_headers(
    msg: &SourceMessage,
    fields: &FieldNormalizer<'_>,
    stamp: &ConversionStamp,
) -> Vec<HeaderEntry> {
    let mut out = Vec::new();

    push(&mut out, "Subject", fields.header(msg.subject.as_ref()));
    push(&mut out, "From", sender(msg, fields));
    for (name, kind, display) in [
        ("To", RecipientKind::To, &msg.display_to),
        ("Cc", RecipientKind::Cc, &msg.display_cc),
        ("Bcc", RecipientKind::Bcc, &msg.display_bcc),
    ] {
        let value = recipient_list(msg, kind, fields).or_else(|| fields.header(display.as_ref()));
        push(&mut out, name, value);
    }

    let date = msg
        .sent_time()
        .map(|t| format_date(&t))
        .unwrap_or_else(|| stamp.date());
    push(&mut out, "Date", Some(date));

    let message_id = fields
        .header(msg.message_id.as_ref())
        .unwrap_or_else(|| stamp.message_id());
    push(&mut out, "Message-ID", Some(message_id));

    push(&mut out, "Reply-To", fields.header(msg.reply_to.as_ref()));
    push(&mut out, "MIME-Version", Some("1.0".to_string()));

    out
}

/// `Name <smtp>` from the sender fields.
///
/// The native email address is only used when it looks like SMTP; Exchange
/// DNs (`/O=ORG/OU=...`) are dropped.
pub fn sender(msg: &SourceMessage, fields: &FieldNormalizer<'_>) -> Option<String> {
    let name = fields.header(msg.sender_name.as_ref()).unwrap_or_default();
    let address = fields
        .header(msg.sender_smtp_address.as_ref())
        .or_else(|| fields.header(msg.sender_email.as_ref()).filter(|a| a.contains('@')))
        .unwrap_or_default();
    let mailbox = Mailbox::new(&name, &address);
    (!mailbox.is_empty()).then(|| mailbox.to_string())
}

/// Addresses of one kind from the recipient table.
pub fn recipient_list(
    msg: &SourceMessage,
    kind: RecipientKind,
    fields: &FieldNormalizer<'_>,
) -> Option<String> {
    let list: Vec<Mailbox> = msg
        .recipients_of(kind)
        .map(|r| {
            Mailbox::new(
                &fields.header(r.display_name.as_ref()).unwrap_or_default(),
                &fields.header(r.address.as_ref()).unwrap_or_default(),
            )
        })
        .filter(|a| !a.is_empty())
        .collect();
    (!list.is_empty()).then(|| Mailbox::join(&list))
}

/// Outlook-specific attributes as `Thread-*` and `X-` headers.
pub fn extended_headers(msg: &SourceMessage, fields: &FieldNormalizer<'_>) -> Vec<HeaderEntry> {
    let mut out = Vec::new();
    push(&mut out, "Thread-Topic", fields.header(msg.conversation_topic.as_ref()));
    push(&mut out, "Thread-Index", msg.conversation_index.as_ref().and_then(binary_or_text));
    push(&mut out, "X-Message-Class", fields.header(msg.message_class.as_ref()));
    push(&mut out, "X-Sensitivity", msg.sensitivity.as_ref().and_then(sensitivity_label));
    push(&mut out, "X-Flag-Status", msg.flag_status.as_ref().and_then(flag_status_label));
    push(&mut out, "X-Categories", fields.header(msg.categories.as_ref()));
    push(&mut out, "X-Companies", fields.header(msg.companies.as_ref()));
    push(&mut out, "X-Read-Receipt-Requested", fields.header(msg.read_receipt_requested.as_ref()));
    push(
        &mut out,
        "X-Delivery-Receipt-Requested",
        fields.header(msg.delivery_receipt_requested.as_ref()),
    );
    out
}

/// SMTP addresses and submit/delivery times, plus a note.
pub fn ip_info_headers(msg: &SourceMessage, fields: &FieldNormalizer<'_>) -> Vec<HeaderEntry> {
    let mut out = Vec::new();
    push(&mut out, "X-Sender-SMTP-Address", fields.header(msg.sender_smtp_address.as_ref()));
    push(
        &mut out,
        "X-Received-By-SMTP-Address",
        fields.header(msg.received_by_smtp_address.as_ref()),
    );
    push(&mut out, "X-Client-Submit-Time", fields.header(msg.client_submit_time.as_ref()));
    push(&mut out, "X-Message-Delivery-Time", fields.header(msg.delivery_time.as_ref()));
    push(&mut out, "X-IP-Info-Note", Some(IP_INFO_NOTE.to_string()));
    out
}

/// X-Converted-From, X-Converter and X-Conversion-Date.
pub fn provenance_headers(stamp: &ConversionStamp) -> Vec<HeaderEntry> {
    let mut out = Vec::new();
    push(&mut out, "X-Converted-From", Some(CONVERTED_FROM.to_string()));
    push(&mut out, "X-Converter", Some(converter_name()));
    push(&mut out, "X-Conversion-Date", Some(stamp.date()));
    out
}

/// Original headers of a message as plain text, for display.
pub fn describe_original(msg: &SourceMessage, fields: &FieldNormalizer<'_>) -> Vec<(String, String)> {
    original_headers(msg, fields)
        .into_iter()
        .map(|e| (e.name().to_string(), single_line(&e.value)))
        .collect()
}
