use derive_more::Display;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Number of characters in a node nonce.
pub const NONCE_LENGTH: usize = 16;

/// A random per-process identifier, unique within the network.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub struct Nonce(String);

impl Nonce {
    pub fn generate() -> Nonce {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();
        Nonce(nonce)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == NONCE_LENGTH && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl From<&str> for Nonce {
    fn from(nonce: &str) -> Self {
        Nonce(nonce.to_owned())
    }
}

impl From<String> for Nonce {
    fn from(nonce: String) -> Self {
        Nonce(nonce)
    }
}
