//! Attachments as read from the MSG container.

use super::message::FieldValue;

/// Binary content of an attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The attachment data stream.
    Data(Vec<u8>),
    /// No data stream is stored (e.g. an embedded message or an OLE object).
    Absent,
    /// The data stream exists but could not be read.
    Failed(String),
}

/// One attachment of a source message.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttachment {
    /// `PR_ATTACH_LONG_FILENAME`.
    pub long_filename: Option<FieldValue>,
    /// `PR_ATTACH_FILENAME` (8.3 name).
    pub short_filename: Option<FieldValue>,
    /// Basename of `PR_ATTACH_LONG_PATHNAME`.
    pub alternate_filename: Option<FieldValue>,
    /// `PR_DISPLAY_NAME`.
    pub display_name: Option<FieldValue>,
    /// `PR_ATTACH_MIME_TAG`, used when the extension says nothing.
    pub mime_tag: Option<FieldValue>,
    pub payload: Payload,
}

impl SourceAttachment {
    /// An attachment with a single filename and binary content.
    pub fn with_data(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            long_filename: Some(FieldValue::Text(filename.into())),
            payload: Payload::Data(data),
            ..Self::empty()
        }
    }

    /// An attachment with no names and no content.
    pub fn empty() -> Self {
        Self {
            long_filename: None,
            short_filename: None,
            alternate_filename: None,
            display_name: None,
            mime_tag: None,
            payload: Payload::Absent,
        }
    }

    /// Filename candidates in resolution order.
    pub fn name_candidates(&self) -> [Option<&FieldValue>; 4] {
        [
            self.long_filename.as_ref(),
            self.short_filename.as_ref(),
            self.alternate_filename.as_ref(),
            self.display_name.as_ref(),
        ]
    }

    /// Size of the payload in bytes, 0 when there is none.
    pub fn size(&self) -> usize {
        match &self.payload {
            Payload::Data(d) => d.len(),
            _ => 0,
        }
    }
}
