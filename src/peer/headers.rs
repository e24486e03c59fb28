use super::{Nonce, NONCE_LENGTH};

/// Length of a hex encoded network hash.
pub const NETHASH_LENGTH: usize = 64;

/// The connection headers a node presents when it dials a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHeaders {
    pub version: String,
    pub min_version: String,
    pub ws_port: u16,
    pub http_port: Option<u16>,
    pub nethash: String,
    pub nonce: Nonce,
    pub os: Option<String>,
}

impl SystemHeaders {
    /// Headers for this process, with a freshly generated nonce.
    pub fn new(
        version: String,
        min_version: String,
        nethash: String,
        ws_port: u16,
        http_port: Option<u16>,
    ) -> Self {
        SystemHeaders {
            version,
            min_version,
            ws_port,
            http_port,
            nethash,
            nonce: Nonce::generate(),
            os: Some(std::env::consts::OS.to_owned()),
        }
    }

    /// Checks the shape of the headers, returning the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if !self.nonce.is_valid() {
            return Err(format!("nonce must be {} alphanumeric characters", NONCE_LENGTH));
        }
        if self.ws_port == 0 {
            return Err("wsPort must be in range 1..65535".to_owned());
        }
        if parse_version(&self.version).is_none() {
            return Err("version must match major.minor.patch".to_owned());
        }
        if !is_valid_nethash(&self.nethash) {
            return Err(format!("nethash must be {} hex characters", NETHASH_LENGTH));
        }
        if self.http_port == Some(0) {
            return Err("httpPort must be in range 1..65535".to_owned());
        }
        Ok(())
    }
}

/// Parses a `major.minor.patch` version string.
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.split('.').map(|part| part.parse::<u32>());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => Some((major, minor, patch)),
        _ => None,
    }
}

/// True if `version` is at least `min_version`. Unparseable versions are never compatible.
pub fn is_version_compatible(version: &str, min_version: &str) -> bool {
    match (parse_version(version), parse_version(min_version)) {
        (Some(version), Some(min_version)) => version >= min_version,
        _ => false,
    }
}

pub fn is_valid_nethash(nethash: &str) -> bool {
    nethash.len() == NETHASH_LENGTH && nethash.chars().all(|c| c.is_ascii_hexdigit())
}
