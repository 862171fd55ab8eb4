//! `link-node` configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/link/node.toml`.
//!
//! # Required fields
//! - `schema_version = 1`
//! - `id`, `target`, `host`, `remote`
//! - At least one `[[channels]]` entry

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// A fully validated, defaulted `link-node` configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub schema_version: u32,
    pub id: String,
    pub target: String,
    pub host: String,
    pub remote: String,
    /// `None` disables watermark persistence for every channel.
    pub store_path: Option<PathBuf>,
    pub window_size: usize,
    pub recover_support: bool,
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    id: Option<String>,
    target: Option<String>,
    host: Option<String>,
    remote: Option<String>,
    store_path: Option<String>,
    window_size: Option<usize>,
    recover_support: Option<bool>,
    channels: Option<Vec<RawChannelEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawChannelEntry {
    name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required field {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loads config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<NodeConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&toml_str)
}

/// Loads config from the default path `/etc/link/node.toml`.
pub fn load_config() -> Result<NodeConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/link/node.toml"))
}

/// Loads config from a TOML string, validating required fields and
/// defaulting the rest.
pub fn load_config_from_str(toml_str: &str) -> Result<NodeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;

    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {schema_version}"
        )));
    }

    let id = raw.id.ok_or_else(|| ConfigError::MissingField("id".to_owned()))?;
    let target = raw
        .target
        .ok_or_else(|| ConfigError::MissingField("target".to_owned()))?;
    let host = raw
        .host
        .ok_or_else(|| ConfigError::MissingField("host".to_owned()))?;
    let remote = raw
        .remote
        .ok_or_else(|| ConfigError::MissingField("remote".to_owned()))?;

    let store_path = raw.store_path.filter(|s| !s.is_empty()).map(PathBuf::from);
    let window_size = raw.window_size.unwrap_or(8);
    if window_size == 0 {
        return Err(ConfigError::InvalidValue(
            "window_size must be at least 1".to_owned(),
        ));
    }
    let recover_support = raw.recover_support.unwrap_or(false);

    let raw_channels = raw
        .channels
        .ok_or_else(|| ConfigError::MissingField("channels".to_owned()))?;
    if raw_channels.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one [[channels]] entry is required".to_owned(),
        ));
    }
    let mut channels = Vec::with_capacity(raw_channels.len());
    for (i, c) in raw_channels.into_iter().enumerate() {
        let name = c
            .name
            .ok_or_else(|| ConfigError::MissingField(format!("channels[{i}].name")))?;
        channels.push(ChannelEntry { name });
    }

    Ok(NodeConfig {
        schema_version,
        id,
        target,
        host,
        remote,
        store_path,
        window_size,
        recover_support,
        channels,
    })
}
