use crate::peer::Nonce;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use std::fmt;
use std::time::Duration;

// For explanation, see issue: https://github.com/serde-rs/serde/issues/368
fn default_pool_timeout_ms() -> u64 {
    2000
}
fn default_client_timeout_ms() -> u64 {
    10000
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Worker => write!(f, "worker"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub role: Role,
    /// Peer listener of a worker, `ip:port`.
    pub listener_ip: String,
    /// Control listener of the master, `ip:port`.
    pub master_ip: String,
    #[serde(default)]
    pub worker_id: u32,
    /// Nonce shared by the master and the workers of one node, generated when unset.
    #[serde(default)]
    pub nonce: Option<String>,
    pub version: String,
    pub min_version: String,
    pub nethash: String,
    #[serde(default)]
    pub http_port: Option<u16>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Addresses the master never deletes.
    #[serde(default)]
    pub frozen_peers: Vec<String>,
    /// `nonce@ip:port` peers dialed on worker start.
    #[serde(default)]
    pub seed_peers: Vec<String>,
    #[serde(default = "default_pool_timeout_ms")]
    pub pool_timeout_ms: u64,
    #[serde(default = "default_client_timeout_ms")]
    pub client_timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

const CONFIG_FILE_PATH: &str = "config/Default";
const CONFIG_FILE_PREFIX: &str = "config/";
const ENV_PREFIX: &str = "PEERING";

#[derive(Clone, Debug, Deserialize)]
pub enum ENV {
    Testing,
    Development,
    Production,
}

impl fmt::Display for ENV {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ENV::Testing => write!(f, "Testing"),
            ENV::Production => write!(f, "Production"),
            ENV::Development => write!(f, "Development"),
        }
    }
}

impl From<&str> for ENV {
    fn from(env: &str) -> Self {
        match env {
            "Testing" => ENV::Testing,
            "Production" => ENV::Production,
            _ => ENV::Development,
        }
    }
}

impl Settings {
    /// Layers `config/Default`, the optional `config/<RUN_ENV>` and `PEERING_*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let env = ENV::from(std::env::var("RUN_ENV").unwrap_or_else(|_| "Development".into()).as_str());
        Config::builder()
            .set_default("env", env.to_string())?
            .add_source(File::with_name(CONFIG_FILE_PATH))
            .add_source(File::with_name(&format!("{}{}", CONFIG_FILE_PREFIX, env)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn nonce(&self) -> Nonce {
        match &self.nonce {
            Some(nonce) => Nonce::from(nonce.as_str()),
            None => Nonce::generate(),
        }
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
