//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <path>` (command line)
//! 2. `$MSG2EML_CONFIG` (environment variable)
//! 3. `~/.config/msg2eml/config.toml` (Linux/macOS)
//!    `%APPDATA%\msg2eml\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Conversion feature toggles.
    pub convert: ConvertOptions,
    /// Text decoding heuristics.
    pub encoding: EncodingConfig,
    /// Output file placement.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Feature toggles read by a conversion.
///
/// A conversion takes its own copy of these, so changing them while a batch
/// runs never affects the item in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Emit attachment parts. When false, attachments are dropped entirely.
    pub include_attachments: bool,
    /// Emit MSG extended attributes (Thread-Topic, X-Message-Class, ...).
    pub preserve_headers: bool,
    /// Reverse Base64 / Quoted-Printable / RFC 2047 wrapping in text fields.
    pub auto_decode: bool,
    /// Run statistical charset detection on byte fields.
    pub detect_encoding: bool,
    /// Copy the original transport headers stored in the MSG.
    pub preserve_transport_headers: bool,
    /// Emit SMTP address and timing diagnostics.
    pub show_ip_info: bool,
}

/// Charset detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Encodings tried in order when detection is not confident.
    pub fallback_ladder: Vec<String>,
    /// Minimum detector confidence (0.0 - 1.0) to trust its guess.
    pub min_confidence: f32,
}

/// Output placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output directory (the source file's directory when unset).
    pub output_dir: Option<PathBuf>,
    /// Overwrite existing files instead of appending `_1`, `_2`, ...
    pub overwrite: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_attachments: true,
            preserve_headers: true,
            auto_decode: true,
            detect_encoding: true,
            preserve_transport_headers: true,
            show_ip_info: true,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            fallback_ladder: ["utf-8", "gbk", "gb2312", "big5", "utf-16"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_confidence: 0.7,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// `explicit` (from `--config`) wins over the environment and the standard
/// directory. Returns the default configuration if no file is found or on
/// parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        } else if explicit.is_some() {
            tracing::warn!(path = %path.display(), "Config file does not exist, using defaults");
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MSG2EML_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("msg2eml").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("msg2eml")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("msg2eml.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.convert.include_attachments);
        assert!(cfg.convert.show_ip_info);
        assert_eq!(
            cfg.encoding.fallback_ladder,
            vec!["utf-8", "gbk", "gb2312", "big5", "utf-16"]
        );
        assert!((cfg.encoding.min_confidence - 0.7).abs() < f32::EPSILON);
        assert!(!cfg.output.overwrite);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.convert.auto_decode = false;
        cfg.output.output_dir = Some(PathBuf::from("/tmp/out"));
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.convert, cfg.convert);
        assert_eq!(parsed.output.output_dir, cfg.output.output_dir);
        assert_eq!(parsed.encoding.fallback_ladder, cfg.encoding.fallback_ladder);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[convert]
show_ip_info = false

[encoding]
fallback_ladder = ["utf-8", "shift_jis"]
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.convert.show_ip_info);
        assert_eq!(cfg.encoding.fallback_ladder, vec!["utf-8", "shift_jis"]);
        // Other fields use defaults
        assert!(cfg.convert.include_attachments);
        assert!((cfg.encoding.min_confidence - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_load_explicit_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[output]\noverwrite = true\n").expect("write");
        let cfg = load_config(Some(&path));
        assert!(cfg.output.overwrite);
    }

    #[test]
    fn test_load_broken_config_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[convert\nnot toml").expect("write");
        let cfg = load_config(Some(&path));
        assert!(cfg.convert.preserve_headers);
    }
}
