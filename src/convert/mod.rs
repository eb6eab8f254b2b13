//! MSG to EML conversion: header reconciliation, MIME assembly, serialization.

pub mod assemble;
pub mod attachment;
pub mod fallback;
pub mod fields;
pub mod headers;
pub mod reconcile;
pub mod serialize;
pub mod stamp;

use tracing::{debug, warn};

use crate::config::{Config, ConvertOptions};
use crate::error::Result;
use crate::model::header::HeaderSet;
use crate::model::message::SourceMessage;
use crate::model::mime::MimeNode;
use crate::parser::charset::EncodingResolver;

pub use stamp::ConversionStamp;

use self::fields::FieldNormalizer;

/// The serialized output of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedMessage {
    pub bytes: Vec<u8>,
    /// Set when assembly failed and an error notice was produced instead.
    pub degraded: Option<String>,
}

/// Converts [`SourceMessage`]s with one fixed set of options.
#[derive(Debug, Clone)]
pub struct Converter {
    options: ConvertOptions,
    resolver: EncodingResolver,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertOptions::default(), EncodingResolver::default())
    }
}

impl Converter {
    pub fn new(options: ConvertOptions, resolver: EncodingResolver) -> Self {
        Self { options, resolver }
    }

    /// Converter for the `[convert]` and `[encoding]` sections of a config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.convert, EncodingResolver::new(&config.encoding))
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Same resolver, different options.
    pub fn with_options(&self, options: ConvertOptions) -> Self {
        Self {
            options,
            resolver: self.resolver.clone(),
        }
    }

    /// Convert with a fresh stamp. Never fails; see [`ConvertedMessage::degraded`].
    pub fn convert(&self, msg: &SourceMessage) -> ConvertedMessage {
        self.convert_with_stamp(msg, &ConversionStamp::new())
    }

    pub fn convert_with_stamp(&self, msg: &SourceMessage, stamp: &ConversionStamp) -> ConvertedMessage {
        match self.try_convert(msg, stamp) {
            Ok(bytes) => ConvertedMessage {
                bytes,
                degraded: None,
            },
            Err(e) => {
                warn!(error = %e, "Conversion degraded to an error notice");
                ConvertedMessage {
                    bytes: fallback::compose_error_message(&e.to_string(), stamp),
                    degraded: Some(e.to_string()),
                }
            }
        }
    }

    /// Convert without the error-notice fallback.
    pub fn try_convert(&self, msg: &SourceMessage, stamp: &ConversionStamp) -> Result<Vec<u8>> {
        let headers = self.headers(msg, stamp);
        let root = self.mime_tree(msg);
        debug!(
            headers = headers.len(),
            root = %root.content_type(),
            attachments = root.attachment_count(),
            "Assembled message"
        );
        serialize::serialize(&headers, &root, stamp)
    }

    /// The reconciled header set, without the root `Content-*` headers.
    pub fn headers(&self, msg: &SourceMessage, stamp: &ConversionStamp) -> HeaderSet {
        let fields = self.fields();
        let sources = headers::header_sources(msg, &fields, stamp);
        reconcile::reconcile(&sources, &self.options)
    }

    /// Bodies and attachments shaped into a MIME tree.
    pub fn mime_tree(&self, msg: &SourceMessage) -> MimeNode {
        let fields = self.fields();
        let (plain, html) = assemble::select_bodies(
            fields.body(msg.body.as_ref()),
            fields.markup(msg.html_body.as_ref()),
            fields.markup(msg.rtf_body.as_ref()),
        );

        let attachments = if self.options.include_attachments {
            msg.attachments
                .iter()
                .enumerate()
                .map(|(i, att)| attachment::materialize(att, i, &fields))
                .collect()
        } else {
            Vec::new()
        };

        assemble::assemble(
            plain.as_deref(),
            html.as_deref(),
            attachments,
            self.options.include_attachments,
        )
    }

    /// Field reader using this converter's options and resolver.
    pub fn fields(&self) -> FieldNormalizer<'_> {
        FieldNormalizer::new(&self.options, &self.resolver)
    }
}
