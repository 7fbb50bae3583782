//! Push server configuration file handling.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::push::ServerOptions;

/// On-disk push server configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_address")]
    pub address: String,
    /// Server name used for logs and TLS.
    #[serde(default = "default_name")]
    pub name: String,
    /// PEM certificate chain; TLS requires both files.
    pub cert_file: Option<PathBuf>,
    /// PEM private key.
    pub key_file: Option<PathBuf>,
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_name() -> String {
    "localhost".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            name: default_name(),
            cert_file: None,
            key_file: None,
        }
    }
}

impl ServerConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject half-configured TLS.
    pub fn validate(&self) -> Result<()> {
        if self.cert_file.is_some() != self.key_file.is_some() {
            return Err(Error::config(
                "cert_file and key_file must be set together",
            ));
        }

        Ok(())
    }

    /// Convert into runtime server options.
    pub fn into_options(self) -> ServerOptions {
        ServerOptions {
            name: self.name,
            address: self.address,
            cert_file: self.cert_file,
            key_file: self.key_file,
            ..ServerOptions::default()
        }
    }
}
