//! Service configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit `--config` path, or the override in the user config dir
//!    (~/.config/autometric/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Command-line flags are applied on top by the CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::explain::DEFAULT_TOP_N;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/autometric.toml");

/// Resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Exported tree ensemble
    pub model_path: PathBuf,
    /// Feature schema
    pub schema_path: PathBuf,
    /// Whether /price includes the explainability block
    pub explain_enabled: bool,
    /// Number of top factors and reasons
    pub top_n: usize,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.json"),
            schema_path: PathBuf::from("models/schema.json"),
            explain_enabled: true,
            top_n: DEFAULT_TOP_N,
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: vec![],
        }
    }
}

impl ServiceConfig {
    /// Load configuration (explicit path, then user override, then embedded default)
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let content = match explicit_path {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config(&path)?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };
        parse_config(&content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autometric").join("config.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    model: Option<RawModel>,
    explain: Option<RawExplain>,
    server: Option<RawServer>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    model_path: Option<PathBuf>,
    schema_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawExplain {
    enabled: Option<bool>,
    top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<ServiceConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = ServiceConfig::default();

    if let Some(model) = raw.model {
        if let Some(path) = model.model_path {
            config.model_path = path;
        }
        if let Some(path) = model.schema_path {
            config.schema_path = path;
        }
    }

    if let Some(explain) = raw.explain {
        if let Some(enabled) = explain.enabled {
            config.explain_enabled = enabled;
        }
        if let Some(top_n) = explain.top_n {
            if top_n == 0 {
                return Err(Error::Config("explain.top_n must be at least 1".into()));
            }
            config.top_n = top_n;
        }
    }

    if let Some(server) = raw.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(origins) = server.allowed_origins {
            config.allowed_origins = origins;
        }
    }

    Ok(config)
}
