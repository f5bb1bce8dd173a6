// Configuration module for the relay

pub mod watcher;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::proxy::{ProviderKind, ProviderRegistry};

pub use watcher::ConfigWatcher;

pub const DEFAULT_CONFIG_PATH: &str = "~/.continue/config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub models: Vec<ProviderEntry>,
}

/// Listener settings. Read once at startup, ignored by hot reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_port_attempts")]
    pub max_port_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            max_port_attempts: default_max_port_attempts(),
        }
    }
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11434
}

fn default_max_port_attempts() -> u32 {
    20
}

/// One routing target: the local alias clients ask for and where it goes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    #[serde(rename = "name")]
    pub alias: String,

    #[serde(default, rename = "provider", skip_serializing_if = "Option::is_none")]
    pub provider_kind: Option<ProviderKind>,

    #[serde(default, alias = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(rename = "model")]
    pub upstream_model: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ProviderEntry {
    /// The base URL requests for this entry go to.
    ///
    /// An explicit non-empty `apiBase` wins over the provider kind's default.
    pub fn resolved_api_base(&self) -> Option<&str> {
        self.api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .or_else(|| self.provider_kind.as_ref()?.default_api_base())
    }
}

impl ProxyConfig {
    /// Configuration written when none exists yet.
    pub fn example() -> Self {
        Self {
            server: ServerConfig::default(),
            models: vec![ProviderEntry {
                alias: "example-model".to_string(),
                provider_kind: None,
                api_base: Some("https://api.openai.com/v1".to_string()),
                upstream_model: "gpt-4o-mini".to_string(),
                api_key: "your_api_key_here".to_string(),
                system_message: Some("You are a helpful assistant.".to_string()),
                modelfile: None,
                parameters: None,
                template: None,
            }],
        }
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    PathBuf::from(path)
}

/// Reads the configuration source and publishes its provider list.
///
/// Startup and the file watcher both go through [`ConfigLoader::reload_into`],
/// so a file that fails to load at startup fails the same way on reload.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the example configuration if the file does not exist yet.
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_exists(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }

        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content =
            serde_yaml::to_string(&ProxyConfig::example()).map_err(|source| ConfigError::Decode {
                path: self.path.clone(),
                source,
            })?;
        std::fs::write(&self.path, content).map_err(io_err)?;

        tracing::info!("Created default config at {:?}", self.path);
        Ok(true)
    }

    /// Read and decode the whole file. Does not touch any registry.
    pub fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        ProxyConfig::parse(&content, &self.path)
    }

    /// Load the file and, only if that succeeds, swap its providers into
    /// `registry`. On error the registry keeps serving the previous snapshot.
    ///
    /// Returns the decoded configuration and the new snapshot generation.
    pub fn reload_into(
        &self,
        registry: &ProviderRegistry,
    ) -> Result<(ProxyConfig, u64), ConfigError> {
        let config = self.load()?;
        warn_duplicate_aliases(&config.models);

        let generation = registry.load(config.models.clone());
        tracing::info!(
            generation,
            models = config.models.len(),
            "Config loaded from {:?}",
            self.path
        );
        Ok((config, generation))
    }
}

/// Duplicate aliases are allowed; lookups use the first one.
fn warn_duplicate_aliases(models: &[ProviderEntry]) {
    let mut seen = std::collections::HashSet::new();
    for entry in models {
        if !seen.insert(entry.alias.as_str()) {
            tracing::warn!(
                alias = %entry.alias,
                "Duplicate model name in config; the first entry wins"
            );
        }
    }
}
