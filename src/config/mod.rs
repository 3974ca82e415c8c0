//! Configuration management for the sync engine.
//!
//! Configuration is read from `~/.config/tidings/config.toml`.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod sections;

pub use sections::SectionConfig;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub transport: TransportConfig,
    pub sync: SyncConfig,
    pub sections: Vec<SectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            transport: TransportConfig::default(),
            sync: SyncConfig::default(),
            sections: sections::default_sections(),
        }
    }
}

/// Where pages are fetched from and how the query string is spelled.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub path: String,
    pub page_size: u32,
    pub paging: Paging,
    pub section_param: String,
    pub cursor_param: String,
    pub offset_param: String,
    pub limit_param: String,
}

/// How the server is told where the next page starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paging {
    /// Pass back the opaque cursor the previous page handed out.
    #[default]
    Cursor,
    /// Send a numeric start offset. A full page means more may follow.
    Offset,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            path: "api/news".to_string(),
            page_size: 10,
            paging: Paging::Cursor,
            section_param: "category".to_string(),
            cursor_param: "cursor".to_string(),
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("tidings/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on transport fetches running at once, across all sections.
    pub max_concurrent_fetches: usize,
    /// Response bodies at least this large are decoded on the blocking pool.
    pub decode_offload_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            decode_offload_bytes: 256 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/tidings/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tidings").join("config.toml"))
    }

    /// Display name for a section tag, falling back to "Other".
    pub fn section_name(&self, tag: &str) -> &str {
        self.sections
            .iter()
            .find(|s| s.tag == tag)
            .map(|s| s.name.as_str())
            .unwrap_or(sections::FALLBACK_NAME)
    }

    pub fn section_tags(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.tag.clone()).collect()
    }

    pub(crate) fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Tidings sync configuration

[endpoint]
# Server hosting the news API
base_url = "http://localhost:8080"
path = "api/news"

# Articles requested per page
page_size = 10

# "cursor": follow the server's next-page token
# "offset": request ?offset=N&limit=page_size; a short page ends the feed
paging = "cursor"

# Query parameter names
section_param = "category"
cursor_param = "cursor"
offset_param = "offset"
limit_param = "limit"

[transport]
# Request timeout in seconds
timeout_secs = 10
user_agent = "tidings/0.1.0"

[sync]
# Maximum page fetches in flight at once across all sections
max_concurrent_fetches = 4

# Bodies at least this many bytes are decoded off the async workers
decode_offload_bytes = 262144

# Feed sections, in tab order
[[sections]]
tag = "tech"
name = "Technology"

[[sections]]
tag = "economy"
name = "Economy"

[[sections]]
tag = "sports"
name = "Sports"

[[sections]]
tag = "health"
name = "Health"

[[sections]]
tag = "entertainment"
name = "Entertainment"

[[sections]]
tag = "education"
name = "Education"

[[sections]]
tag = "environment"
name = "Environment"

[[sections]]
tag = "food"
name = "Food"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
