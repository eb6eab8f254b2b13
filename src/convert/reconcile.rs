//! Merge original, synthesized and MSG-derived headers under one precedence.

use tracing::debug;

use crate::config::ConvertOptions;
use crate::model::header::{is_valid_name, HeaderEntry, HeaderSet};
use crate::parser::header::dedup_headers;

/// Headers owned by the MIME serializer; never copied from the source.
pub const MIME_STRUCTURAL_HEADERS: &[&str] =
    &["content-type", "content-transfer-encoding", "mime-version"];

/// The five header sources of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSources {
    /// Parsed transport header block, in original order.
    pub original: Vec<HeaderEntry>,
    /// Subject, From, To, Cc, Bcc, Date, Message-ID, Reply-To, MIME-Version.
    pub synthesized: Vec<HeaderEntry>,
    /// Thread-Topic, Thread-Index and the `X-` MSG attributes.
    pub extended: Vec<HeaderEntry>,
    /// SMTP addresses and timing diagnostics.
    pub ip_info: Vec<HeaderEntry>,
    /// X-Converted-From, X-Converter, X-Conversion-Date.
    pub provenance: Vec<HeaderEntry>,
}

fn is_structural(name: &str) -> bool {
    MIME_STRUCTURAL_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the final header set.
///
/// 1. Original headers, deduplicated, without MIME-structural ones, empty values
///    or unusable names (only with `preserve_transport_headers`).
/// 2. Synthesized headers whose name is not present yet.
/// 3. Extended attributes (only with `preserve_headers`).
/// 4. IP diagnostics (only with `show_ip_info`).
/// 5. Provenance.
///
/// Steps 3 to 5 replace the value of a header of the same name where it
/// stands, so original headers keep their relative order.
pub fn reconcile(sources: &HeaderSources, options: &ConvertOptions) -> HeaderSet {
    let mut set = HeaderSet::new();

    if options.preserve_transport_headers {
        for entry in dedup_headers(sources.original.clone()) {
            if is_structural(entry.name()) || entry.value.trim().is_empty() {
                continue;
            }
            if !is_valid_name(entry.name()) {
                debug!(name = entry.name(), "Skipping malformed transport header");
                continue;
            }
            set.push(entry);
        }
    }

    for entry in &sources.synthesized {
        set.insert_if_absent(entry.name(), entry.value.clone());
    }

    let mut overriding: Vec<&HeaderEntry> = Vec::new();
    if options.preserve_headers {
        overriding.extend(&sources.extended);
    }
    if options.show_ip_info {
        overriding.extend(&sources.ip_info);
    }
    overriding.extend(&sources.provenance);

    for entry in overriding {
        set.set(entry.name(), entry.value.clone());
    }

    set
}
