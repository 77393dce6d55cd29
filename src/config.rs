//! Configuration manager for provisa.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Port to bind the HTTP server on.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to caller token verification.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to the external identity provider.
    #[serde(skip_serializing)]
    pub identity: Option<Identity>,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
}

/// Identity provider configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Base URL of the provider's admin REST API.
    pub address: String,
    /// Bearer key used to authenticate admin calls.
    pub api_key: String,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Caller token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    pub public_key_pem: String,
    pub private_key_pem: String,
    /// Update token audience.
    pub audience: Option<String>,
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize identity provider URL.
                if let Some(identity) = config.identity.as_mut() {
                    identity.address =
                        self.normalize_url(&identity.address)?;
                }

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
