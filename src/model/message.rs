//! Read-only view of a parsed MSG message.
//!
//! Every field is populated once when the container is read. `None` means
//! the property was not stored at all, which is different from an empty
//! value.

use chrono::{DateTime, Utc};

use super::attachment::SourceAttachment;

/// A raw property value as stored in the MSG container.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Unicode text (already decoded from UTF-16).
    Text(String),
    /// 8-bit text in an unknown code page, or binary data.
    Bytes(Vec<u8>),
    /// A point in time (FILETIME).
    Timestamp(DateTime<Utc>),
    /// A boolean property.
    Flag(bool),
    /// A 32-bit integer property.
    Integer(i64),
}

impl FieldValue {
    /// Shorthand for `FieldValue::Text`.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Timestamp payload, if this is one.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Raw byte view for `Bytes`, UTF-8 view for `Text`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Short type tag, used when dumping attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "time",
            Self::Flag(_) => "flag",
            Self::Integer(_) => "int",
        }
    }
}

/// Recipient kind from `PR_RECIPIENT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    /// Map the MAPI recipient type (1, 2, 3). Unknown values are treated as To.
    pub fn from_mapi(value: i64) -> Self {
        match value & 0x0F {
            2 => Self::Cc,
            3 => Self::Bcc,
            _ => Self::To,
        }
    }
}

/// One entry of the recipient table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecipient {
    pub kind: RecipientKind,
    pub display_name: Option<FieldValue>,
    /// SMTP address when stored, otherwise the native email address.
    pub address: Option<FieldValue>,
}

/// All fields of an MSG message that conversion reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMessage {
    pub subject: Option<FieldValue>,
    pub sender_name: Option<FieldValue>,
    pub sender_email: Option<FieldValue>,
    pub sender_smtp_address: Option<FieldValue>,
    pub received_by_smtp_address: Option<FieldValue>,
    pub display_to: Option<FieldValue>,
    pub display_cc: Option<FieldValue>,
    pub display_bcc: Option<FieldValue>,
    pub reply_to: Option<FieldValue>,
    pub recipients: Vec<SourceRecipient>,

    pub body: Option<FieldValue>,
    pub html_body: Option<FieldValue>,
    /// Decompressed RTF body.
    pub rtf_body: Option<FieldValue>,

    /// The `PR_TRANSPORT_MESSAGE_HEADERS` blob.
    pub transport_headers: Option<FieldValue>,
    pub message_id: Option<FieldValue>,

    pub conversation_topic: Option<FieldValue>,
    pub conversation_index: Option<FieldValue>,
    pub message_class: Option<FieldValue>,
    pub sensitivity: Option<FieldValue>,
    pub flag_status: Option<FieldValue>,
    pub categories: Option<FieldValue>,
    pub companies: Option<FieldValue>,
    pub read_receipt_requested: Option<FieldValue>,
    pub delivery_receipt_requested: Option<FieldValue>,

    pub client_submit_time: Option<FieldValue>,
    pub delivery_time: Option<FieldValue>,

    pub attachments: Vec<SourceAttachment>,
}

impl SourceMessage {
    /// Every scalar field with its display name, in a stable order.
    pub fn fields(&self) -> Vec<(&'static str, Option<&FieldValue>)> {
        vec![
            ("subject", self.subject.as_ref()),
            ("sender_name", self.sender_name.as_ref()),
            ("sender_email", self.sender_email.as_ref()),
            ("sender_smtp_address", self.sender_smtp_address.as_ref()),
            ("received_by_smtp_address", self.received_by_smtp_address.as_ref()),
            ("display_to", self.display_to.as_ref()),
            ("display_cc", self.display_cc.as_ref()),
            ("display_bcc", self.display_bcc.as_ref()),
            ("reply_to", self.reply_to.as_ref()),
            ("body", self.body.as_ref()),
            ("html_body", self.html_body.as_ref()),
            ("rtf_body", self.rtf_body.as_ref()),
            ("transport_headers", self.transport_headers.as_ref()),
            ("message_id", self.message_id.as_ref()),
            ("conversation_topic", self.conversation_topic.as_ref()),
            ("conversation_index", self.conversation_index.as_ref()),
            ("message_class", self.message_class.as_ref()),
            ("sensitivity", self.sensitivity.as_ref()),
            ("flag_status", self.flag_status.as_ref()),
            ("categories", self.categories.as_ref()),
            ("companies", self.companies.as_ref()),
            ("read_receipt_requested", self.read_receipt_requested.as_ref()),
            (
                "delivery_receipt_requested",
                self.delivery_receipt_requested.as_ref(),
            ),
            ("client_submit_time", self.client_submit_time.as_ref()),
            ("delivery_time", self.delivery_time.as_ref()),
        ]
    }

    /// Recipients of one kind, in table order.
    pub fn recipients_of(&self, kind: RecipientKind) -> impl Iterator<Item = &SourceRecipient> {
        self.recipients.iter().filter(move |r| r.kind == kind)
    }

    /// Best timestamp for the `Date` header: submit time, then delivery time.
    pub fn sent_time(&self) -> Option<DateTime<Utc>> {
        self.client_submit_time
            .as_ref()
            .and_then(FieldValue::as_timestamp)
            .or_else(|| self.delivery_time.as_ref().and_then(FieldValue::as_timestamp))
    }
}
