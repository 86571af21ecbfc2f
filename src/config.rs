//! Codec options and their TOML loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default nesting limit applied while rebuilding plan trees.
pub const DEFAULT_MAX_DEPTH: usize = 64;
/// Default upper bound on nodes in one plan document.
pub const DEFAULT_MAX_NODES: usize = 10_000;

/// Options controlling plan document encoding and decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecOptions {
    /// Emit indented JSON text.
    pub pretty: bool,
    /// Deepest root-to-leaf path accepted by the decoder.
    pub max_depth: usize,
    /// Largest number of nodes accepted by the decoder.
    pub max_nodes: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl CodecOptions {
    /// Loads options from `explicit`, or from the default location when it exists.
    ///
    /// An explicit path must exist; the default path falls back to
    /// [`CodecOptions::default`] when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return read_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses options from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { path: None, source })
    }
}

fn read_file(path: &Path) -> Result<CodecOptions, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    CodecOptions::from_toml_str(&contents).map_err(|err| err.with_path(path))
}

/// Errors raised while loading configuration or catalog files.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File contents are not valid TOML for the target type.
    #[error("failed to parse {}: {source}", path_label(.path))]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    /// Catalog parsed but is inconsistent.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

impl ConfigError {
    pub(crate) fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

fn path_label(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "inline config".to_string(),
    }
}

/// Default location of the codec options file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("plan-wire").join("codec.toml"))
}
