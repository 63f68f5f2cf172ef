//! Rune scene configuration
//!
//! Centralized settings for the scene engine, loaded from `rune.toml` with
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RuneConfig {
    pub scene: SceneConfig,
    pub loader: LoaderConfig,
    pub text: TextConfig,
    pub cache: CacheConfig,
}

/// Viewport and root metrics the style resolver starts from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Font size `rem` units resolve against
    pub root_font_size: f32,
    /// Family used when a requested font family has no registered source
    pub default_font_family: String,
}

/// Background decode settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Worker thread count; `None` picks `min(available_parallelism, 4)`,
    /// `Some(0)` runs decodes inline while draining completions
    pub worker_threads: Option<usize>,
    /// Directory relative resource URIs are resolved against
    pub resource_root: Option<PathBuf>,
    /// Images wider or taller than this fail to decode
    pub max_image_dimension: u32,
}

/// Text rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    /// Path to a font file (.ttf/.otf) registered as the default family
    pub font: Option<PathBuf>,
    /// Whether text nodes default to ellipsis overflow
    pub ellipsis: bool,
}

/// Resource cache housekeeping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Frames between automatic `compact()` sweeps; 0 disables them
    pub compact_interval_frames: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            root_font_size: 16.0,
            default_font_family: "sans-serif".to_string(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            resource_root: None,
            max_image_dimension: 8192,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font: None,
            ellipsis: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            compact_interval_frames: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl LoaderConfig {
    /// Effective worker count after applying the default cap.
    pub fn effective_workers(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(4)
        })
    }
}

impl RuneConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the default location (rune.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file("rune.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Some(w) = env_parse("RUNE_VIEWPORT_WIDTH") {
            self.scene.viewport_width = w;
        }
        if let Some(h) = env_parse("RUNE_VIEWPORT_HEIGHT") {
            self.scene.viewport_height = h;
        }
        if let Some(size) = env_parse("RUNE_ROOT_FONT_SIZE") {
            self.scene.root_font_size = size;
        }
        if let Some(n) = env_parse("RUNE_WORKERS") {
            self.loader.worker_threads = Some(n);
        }
        if let Ok(root) = std::env::var("RUNE_RESOURCE_ROOT") {
            self.loader.resource_root = Some(PathBuf::from(root));
        }
        if let Ok(font) = std::env::var("RUNE_TEXT_FONT") {
            self.text.font = Some(PathBuf::from(font));
        }
        if let Some(n) = env_parse("RUNE_COMPACT_INTERVAL") {
            self.cache.compact_interval_frames = n;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from rune.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuneConfig::default();
        assert_eq!(config.scene.viewport_width, 800.0);
        assert_eq!(config.scene.root_font_size, 16.0);
        assert!(config.text.ellipsis);
        assert_eq!(config.cache.compact_interval_frames, 60);
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = RuneConfig::default();
        config.loader.worker_threads = Some(2);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RuneConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: RuneConfig = toml::from_str("[scene]\nviewport_width = 320.0\n").unwrap();
        assert_eq!(parsed.scene.viewport_width, 320.0);
        assert_eq!(parsed.scene.viewport_height, 600.0);
        assert_eq!(parsed.loader.max_image_dimension, 8192);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = RuneConfig::load_from_file("/nonexistent/rune.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let path = std::env::temp_dir().join(format!("rune-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[scene\nbroken").unwrap();
        let err = RuneConfig::load_from_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_effective_workers_cap() {
        let loader = LoaderConfig::default();
        let n = loader.effective_workers();
        assert!((1..=4).contains(&n));
        let inline = LoaderConfig {
            worker_threads: Some(0),
            ..LoaderConfig::default()
        };
        assert_eq!(inline.effective_workers(), 0);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("RUNE_VIEWPORT_WIDTH", "1024");
            std::env::set_var("RUNE_WORKERS", "0");
        }

        let mut config = RuneConfig::default();
        config.merge_with_env();

        assert_eq!(config.scene.viewport_width, 1024.0);
        assert_eq!(config.loader.worker_threads, Some(0));

        unsafe {
            std::env::remove_var("RUNE_VIEWPORT_WIDTH");
            std::env::remove_var("RUNE_WORKERS");
        }
    }
}
