//! Stable failure codes shared by the handshake, the update protocol and the master.

pub const INVALID_HEADERS: u16 = 4100;
pub const INCOMPATIBLE_NONCE: u16 = 4101;
pub const INCOMPATIBLE_NETWORK: u16 = 4102;
pub const INCOMPATIBLE_VERSION: u16 = 4103;
pub const ALREADY_ADDED: u16 = 4104;
pub const ALREADY_REMOVED: u16 = 4105;
pub const DIFFERENT_CONN_ID: u16 = 4106;
pub const HANDSHAKE_ERROR: u16 = 4107;

/// Failures reported by the master process.
pub mod on_master {
    pub mod update {
        pub const CHECK_PRESENCE: u16 = 4200;
        pub const INVALID_PEER: u16 = 4201;
        pub const TRANSPORT: u16 = 4202;
    }

    pub mod insert {
        pub const INSERT_ONLY_FAILURE: u16 = 4230;
        pub const NOT_ACCEPTED: u16 = 4231;
        pub const NONCE_EXISTS: u16 = 4232;
    }

    pub mod remove {
        pub const REMOVE_ONLY_FAILURE: u16 = 4240;
        pub const FROZEN_PEER: u16 = 4241;
    }
}

/// Close code used for ordinary, intentional disconnects.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code used when the transport dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

pub fn error_message(code: u16) -> &'static str {
    match code {
        INVALID_HEADERS => "Request is made with invalid headers",
        INCOMPATIBLE_NONCE => "Request is made by itself",
        INCOMPATIBLE_NETWORK => "Request is made on the wrong network",
        INCOMPATIBLE_VERSION => "Request is made from incompatible version",
        ALREADY_ADDED => "Attempting to insert an already active peer",
        ALREADY_REMOVED => "Attempting to remove a non-existing peer",
        DIFFERENT_CONN_ID => "Attempting to change peer data from different connection",
        HANDSHAKE_ERROR => "Handshake error",
        on_master::update::CHECK_PRESENCE => "Failed to check if peer is already present",
        on_master::update::INVALID_PEER => "Failed to update peer because of invalid address",
        on_master::update::TRANSPORT => "Transport error while invoking update procedure",
        on_master::insert::INSERT_ONLY_FAILURE => "Insert only update failed, peer already exists",
        on_master::insert::NOT_ACCEPTED => "Peer is not accepted",
        on_master::insert::NONCE_EXISTS => "Peer with the same nonce is already connected",
        on_master::remove::REMOVE_ONLY_FAILURE => "Remove only update failed, peer does not exist",
        on_master::remove::FROZEN_PEER => "Attempting to remove a frozen peer",
        _ => "Unknown failure",
    }
}

/// A coded protocol failure, as carried by update acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerUpdateError {
    pub code: u16,
    pub message: String,
    pub description: Option<String>,
}

impl PeerUpdateError {
    pub fn new(code: u16) -> Self {
        PeerUpdateError { code, message: error_message(code).to_owned(), description: None }
    }

    pub fn with_description(code: u16, description: impl Into<String>) -> Self {
        PeerUpdateError {
            code,
            message: error_message(code).to_owned(),
            description: Some(description.into()),
        }
    }
}

impl std::fmt::Display for PeerUpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({}): {}", self.message, self.code, description),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

impl std::error::Error for PeerUpdateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        let err = PeerUpdateError::new(on_master::insert::NONCE_EXISTS);
        assert_eq!(err.code, 4232);
        assert_eq!(err.message, "Peer with the same nonce is already connected");
        assert_eq!(err.description, None);
        assert_eq!(error_message(9999), "Unknown failure");
    }

    #[test]
    fn test_display_includes_description() {
        let err = PeerUpdateError::with_description(on_master::update::TRANSPORT, "broken pipe");
        assert_eq!(
            err.to_string(),
            "Transport error while invoking update procedure (4202): broken pipe"
        );
    }
}
