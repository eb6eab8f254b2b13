//! Text decoding for byte fields of unknown charset.
//!
//! Byte strings are first given to a statistical detector. A confident guess
//! is used directly; otherwise a configurable ladder of encodings is tried in
//! order, and as a last resort the bytes are decoded as lossy UTF-8. Every
//! path returns text.

use std::sync::Arc;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::config::EncodingConfig;

/// Non-ASCII byte count at which the detector's confidence saturates.
const FULL_EVIDENCE_BYTES: usize = 16;

/// A detector's best guess.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub encoding: &'static Encoding,
    /// 0.0 - 1.0.
    pub confidence: f32,
}

/// Statistical charset detection.
pub trait CharsetDetector: Send + Sync {
    fn detect(&self, bytes: &[u8]) -> Detection;
}

/// [`CharsetDetector`] backed by `chardetng`.
///
/// `chardetng` reports only whether its winner beat another candidate. That
/// flag is scaled by the amount of non-ASCII evidence, since a handful of
/// bytes is valid in many legacy encodings at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetngDetector;

impl CharsetDetector for ChardetngDetector {
    fn detect(&self, bytes: &[u8]) -> Detection {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        let (encoding, assessed) = detector.guess_assess(None, true);

        let non_ascii = bytes.iter().filter(|b| !b.is_ascii()).count();
        let confidence = if assessed {
            (non_ascii.min(FULL_EVIDENCE_BYTES) as f32) / FULL_EVIDENCE_BYTES as f32
        } else {
            0.0
        };
        Detection {
            encoding,
            confidence,
        }
    }
}

/// Borrowed input for [`EncodingResolver::resolve`].
#[derive(Debug, Clone, Copy)]
pub enum RawText<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Decoded text plus the label of the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub text: String,
    pub encoding: String,
}

impl Resolved {
    fn new(text: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: encoding.into(),
        }
    }
}

/// Picks a decoding for byte strings.
#[derive(Clone)]
pub struct EncodingResolver {
    detector: Arc<dyn CharsetDetector>,
    ladder: Vec<(String, &'static Encoding)>,
    min_confidence: f32,
}

impl std::fmt::Debug for EncodingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingResolver")
            .field("ladder", &self.ladder_labels())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::new(&EncodingConfig::default())
    }
}

impl EncodingResolver {
    /// Resolver using `chardetng` and the configured ladder.
    pub fn new(config: &EncodingConfig) -> Self {
        Self::with_detector(config, Arc::new(ChardetngDetector))
    }

    /// Resolver with a custom detector.
    pub fn with_detector(config: &EncodingConfig, detector: Arc<dyn CharsetDetector>) -> Self {
        let ladder = config
            .fallback_ladder
            .iter()
            .filter_map(|label| match Encoding::for_label(label.trim().as_bytes()) {
                Some(enc) => Some((label.trim().to_ascii_lowercase(), enc)),
                None => {
                    warn!(label = %label, "Unknown encoding in fallback ladder, skipping");
                    None
                }
            })
            .collect();
        Self {
            detector,
            ladder,
            min_confidence: config.min_confidence,
        }
    }

    /// Labels of the usable ladder entries, in order.
    pub fn ladder_labels(&self) -> Vec<&str> {
        self.ladder.iter().map(|(l, _)| l.as_str()).collect()
    }

    /// Decode `input`. Text passes through unchanged as `utf-8`.
    pub fn resolve(&self, input: RawText<'_>) -> Resolved {
        match input {
            RawText::Text(s) => Resolved::new(s, "utf-8"),
            RawText::Bytes(b) => self.resolve_bytes(b),
        }
    }

    /// Decode bytes: BOM, then confident detection, then the ladder, then lossy UTF-8.
    pub fn resolve_bytes(&self, bytes: &[u8]) -> Resolved {
        if bytes.is_empty() {
            return Resolved::new("", "utf-8");
        }

        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            if let Some(text) = decode_strict(encoding, &bytes[bom_len..]) {
                return Resolved::new(text, encoding.name().to_ascii_lowercase());
            }
        }

        let detection = self.detector.detect(bytes);
        if detection.confidence >= self.min_confidence {
            if let Some(text) = decode_strict(detection.encoding, bytes) {
                return Resolved::new(text, detection.encoding.name().to_ascii_lowercase());
            }
            debug!(
                encoding = detection.encoding.name(),
                "Detected encoding failed to decode, trying fallbacks"
            );
        }

        for (label, encoding) in &self.ladder {
            if let Some(text) = decode_strict(encoding, bytes) {
                return Resolved::new(text, label.clone());
            }
        }

        debug!(len = bytes.len(), "No encoding decoded cleanly, using lossy UTF-8");
        decode_lossy(bytes)
    }
}

/// Decode as UTF-8, replacing invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> Resolved {
    Resolved::new(String::from_utf8_lossy(bytes), "utf-8")
}

/// Decode without replacement; `None` if any sequence is malformed.
fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|cow| cow.into_owned())
}

/// Decode bytes using a declared charset name, lossy on invalid input.
///
/// Unknown charsets fall back to UTF-8.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.trim().to_ascii_lowercase();
    match charset_lower.as_str() {
        "" | "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = Encoding::for_label(charset_lower.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always reports the same guess.
    struct FixedDetector(&'static Encoding, f32);

    impl CharsetDetector for FixedDetector {
        fn detect(&self, _bytes: &[u8]) -> Detection {
            Detection {
                encoding: self.0,
                confidence: self.1,
            }
        }
    }

    fn gbk(text: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = encoding_rs::GBK.encode(text);
        assert!(!had_errors);
        bytes.into_owned()
    }

    #[test]
    fn test_text_passes_through() {
        let r = EncodingResolver::default().resolve(RawText::Text("déjà vu"));
        assert_eq!(r.text, "déjà vu");
        assert_eq!(r.encoding, "utf-8");
    }

    #[test]
    fn test_short_gbk_uses_ladder() {
        let r = EncodingResolver::default().resolve(RawText::Bytes(&gbk("测试")));
        assert_eq!(r.text, "测试");
        assert_eq!(r.encoding, "gbk");
    }

    #[test]
    fn test_long_gbk_detected() {
        let text = "这是一个用于测试编码检测的中文句子，其中包含足够多的汉字以便统计判断。";
        let r = EncodingResolver::default().resolve_bytes(&gbk(text));
        assert_eq!(r.text, text);
    }

    #[test]
    fn test_utf8_bytes() {
        let r = EncodingResolver::default().resolve_bytes("Grüße aus Köln".as_bytes());
        assert_eq!(r.text, "Grüße aus Köln");
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        let r = EncodingResolver::default().resolve_bytes(&bytes);
        assert_eq!(r.text, "hello");
        assert_eq!(r.encoding, "utf-8");
    }

    #[test]
    fn test_confident_guess_wins() {
        let detector = Arc::new(FixedDetector(encoding_rs::WINDOWS_1252, 0.9));
        let resolver = EncodingResolver::with_detector(&EncodingConfig::default(), detector);
        let r = resolver.resolve_bytes(&[0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(r.text, "café");
        assert_eq!(r.encoding, "windows-1252");
    }

    #[test]
    fn test_confident_guess_that_fails_falls_to_ladder() {
        // Lone 0xFF is not valid Shift_JIS; the ladder's utf-16 accepts two bytes
        let detector = Arc::new(FixedDetector(encoding_rs::SHIFT_JIS, 1.0));
        let config = EncodingConfig {
            fallback_ladder: vec!["utf-8".into(), "utf-16".into()],
            min_confidence: 0.7,
        };
        let resolver = EncodingResolver::with_detector(&config, detector);
        let r = resolver.resolve_bytes(&[0x41, 0xFF]);
        assert_eq!(r.encoding, "utf-16");
    }

    #[test]
    fn test_everything_fails_gives_lossy_utf8() {
        let detector = Arc::new(FixedDetector(encoding_rs::UTF_8, 0.0));
        let config = EncodingConfig {
            fallback_ladder: vec!["utf-8".into()],
            min_confidence: 0.7,
        };
        let resolver = EncodingResolver::with_detector(&config, detector);
        let r = resolver.resolve_bytes(&[b'o', b'k', 0xFF]);
        assert_eq!(r.text, "ok\u{FFFD}");
        assert_eq!(r.encoding, "utf-8");
    }

    #[test]
    fn test_unknown_ladder_label_is_skipped() {
        let config = EncodingConfig {
            fallback_ladder: vec!["utf-8".into(), "no-such-charset".into(), "big5".into()],
            min_confidence: 0.7,
        };
        let resolver = EncodingResolver::new(&config);
        assert_eq!(resolver.ladder_labels(), vec!["utf-8", "big5"]);
    }

    #[test]
    fn test_empty_bytes() {
        let r = EncodingResolver::default().resolve_bytes(&[]);
        assert_eq!(r, Resolved::new("", "utf-8"));
    }

    #[test]
    fn test_decode_charset_labels() {
        assert_eq!(decode_charset("ISO-8859-1", &[0x63, 0x61, 0x66, 0xE9]), "café");
        assert_eq!(decode_charset("x-unknown", b"plain"), "plain");
        assert_eq!(decode_charset("", b"plain"), "plain");
    }
}
