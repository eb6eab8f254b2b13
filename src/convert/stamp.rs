//! Per-conversion time and identity.

use chrono::{DateTime, FixedOffset, Local, Utc};
use uuid::Uuid;

/// RFC 5322 date-time format.
pub const RFC5322_DATE: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Domain part of synthesized Message-IDs.
pub const MESSAGE_ID_DOMAIN: &str = "msg-to-eml-converter";

/// The clock reading and random id used by one conversion.
///
/// Everything time- or randomness-dependent in the output derives from this,
/// so two conversions with the same stamp produce identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStamp {
    pub now: DateTime<FixedOffset>,
    pub id: Uuid,
}

impl ConversionStamp {
    /// Current local time and a fresh v4 UUID.
    pub fn new() -> Self {
        Self {
            now: Local::now().fixed_offset(),
            id: Uuid::new_v4(),
        }
    }

    pub fn fixed(now: DateTime<FixedOffset>, id: Uuid) -> Self {
        Self { now, id }
    }

    /// `<uuid@msg-to-eml-converter>`.
    pub fn message_id(&self) -> String {
        format!("<{}@{MESSAGE_ID_DOMAIN}>", self.id)
    }

    /// The stamp time as an RFC 5322 date.
    pub fn date(&self) -> String {
        self.now.format(RFC5322_DATE).to_string()
    }

    /// Boundary for the `n`-th multipart of the message.
    pub fn boundary(&self, n: usize) -> String {
        format!("----=_Part_{n}_{}", self.id.simple())
    }
}

impl Default for ConversionStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a UTC timestamp as an RFC 5322 date.
pub fn format_date(t: &DateTime<Utc>) -> String {
    t.format(RFC5322_DATE).to_string()
}
