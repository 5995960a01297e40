//! Application Configuration
//!
//! Reconstruction tuning and fallback settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::reading::ReadingConfig;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reading-order reconstruction settings
    pub reading: ReadingConfig,
    /// Captioning fallback settings
    pub caption: CaptionSettings,
    /// Batch processing settings
    pub batch: BatchSettings,
}

/// Captioning fallback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// Whether to describe the image when no text survives
    pub enabled: bool,
    /// Base URL of the Ollama-compatible vision endpoint
    pub base_url: String,
    /// Vision model name
    pub model: String,
    /// Language the description is requested in
    pub language: String,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            language: "Arabic".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker threads (0 = available parallelism)
    pub workers: usize,
}

/// Semantic problems in an otherwise parseable configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("reading.line_tolerance must be a positive finite number, got {0}")]
    InvalidTolerance(f64),

    #[error("reading.min_tokens_per_line must be at least 1")]
    ZeroMinTokens,

    #[error("reading.min_confidence must be within 0.0 - 1.0, got {0}")]
    InvalidConfidence(f32),

    #[error("reading.script.blocks must not be empty")]
    NoScriptBlocks,

    #[error("script block {start:#06X}-{end:#06X} is inverted")]
    InvertedBlock { start: u32, end: u32 },

    #[error("caption.timeout_secs must be at least 1")]
    ZeroTimeout,
}

impl AppConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reading.validate()?;

        if self.caption.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the per-user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "ocr-reading-order", "ocr-reading-order")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::ScriptBlock;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Reading defaults match the reference heuristic
        assert!((config.reading.line_tolerance - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.reading.min_tokens_per_line, 2);
        assert_eq!(config.reading.min_confidence, 0.0);
        assert_eq!(config.reading.script.name, "arabic");
        assert_eq!(config.reading.script.blocks, vec![ScriptBlock::ARABIC]);

        // Caption defaults
        assert!(config.caption.enabled);
        assert_eq!(config.caption.base_url, "http://localhost:11434");
        assert_eq!(config.caption.model, "llava");
        assert_eq!(config.caption.language, "Arabic");
        assert_eq!(config.caption.timeout_secs, 120);

        assert_eq!(config.batch.workers, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.reading.line_tolerance = 1.25;
        config.caption.model = "bakllava".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.reading.line_tolerance, 1.25);
        assert_eq!(parsed.reading.script.blocks, config.reading.script.blocks);
        assert_eq!(parsed.caption.model, "bakllava");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [reading]
            min_tokens_per_line = 3

            [caption]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(parsed.reading.min_tokens_per_line, 3);
        assert!((parsed.reading.line_tolerance - 0.8).abs() < f64::EPSILON);
        assert!(!parsed.caption.enabled);
        assert_eq!(parsed.caption.model, "llava");
    }

    #[test]
    fn test_custom_script_blocks() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [reading.script]
            name = "persian"
            blocks = [{ start = 1536, end = 1791 }, { start = 64336, end = 65023 }]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.reading.script.name, "persian");
        assert_eq!(parsed.reading.script.blocks.len(), 2);
        assert_eq!(parsed.reading.script.blocks[1], ScriptBlock { start: 0xFB50, end: 0xFDFF });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.reading.line_tolerance = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTolerance(0.0)));

        let mut config = AppConfig::default();
        config.reading.line_tolerance = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTolerance(_))));

        let mut config = AppConfig::default();
        config.reading.min_tokens_per_line = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMinTokens));

        let mut config = AppConfig::default();
        config.reading.min_confidence = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidConfidence(1.5)));

        let mut config = AppConfig::default();
        config.reading.script.blocks.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoScriptBlocks));

        let mut config = AppConfig::default();
        config.reading.script.blocks = vec![ScriptBlock { start: 0x06FF, end: 0x0600 }];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedBlock { start: 0x06FF, end: 0x0600 })
        );

        let mut config = AppConfig::default();
        config.caption.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.batch.workers = 4;
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.batch.workers, 4);
        assert_eq!(loaded.caption.language, config.caption.language);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[reading]\nline_tolerance = -1.0").unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
