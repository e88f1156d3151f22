use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::types::KeyFormat;

/// Default plaintext bytes per container chunk (64 KiB)
pub const DEFAULT_CHUNK_SIZE: u32 = 64 * 1024;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NalencConfig {
    pub cipher: CipherConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Plaintext bytes per chunk for newly written containers (default: 65536)
    pub chunk_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Encoding used by `keygen` when `--ascii` is not given
    pub default_format: KeyFormat,
    /// Directory `keygen` saves to when no output path is given
    pub default_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl NalencConfig {
    /// Read and parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Render the active configuration as TOML
    pub fn to_toml(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(format!("serializing: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[cipher]
chunk_size = 1048576

[keys]
default_format = "ascii"
default_dir = "/home/user/keys"

[log]
level = "debug"
format = "json"
"#;
        let config: NalencConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.cipher.chunk_size, 1_048_576);
        assert_eq!(config.keys.default_format, KeyFormat::Ascii);
        assert_eq!(config.keys.default_dir, Some(PathBuf::from("/home/user/keys")));
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: NalencConfig = toml::from_str("").unwrap();

        assert_eq!(config.cipher.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.keys.default_format, KeyFormat::Binary);
        assert!(config.keys.default_dir.is_none());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: NalencConfig = toml::from_str("[log]\nlevel = \"warn\"\n").unwrap();

        // Overridden
        assert_eq!(config.log.level, "warn");
        // Defaults
        assert_eq!(config.log.format, "text");
        assert_eq!(config.cipher.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = NalencConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: NalencConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.cipher.chunk_size, parsed.cipher.chunk_size);
        assert_eq!(config.keys.default_format, parsed.keys.default_format);
        assert_eq!(config.log.level, parsed.log.level);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = NalencConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.cipher.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[cipher\nchunk_size = ").unwrap();

        let err = NalencConfig::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
