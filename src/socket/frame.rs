use crate::peer::SystemHeaders;
use crate::Result;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Opaque, bincode encoded call arguments and results.
pub type Payload = Vec<u8>;

/// An error answered by the remote side of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        RemoteError { code: None, message: message.into() }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        RemoteError { code: Some(code), message: message.into() }
    }
}

/// A unit of the peer wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    Handshake(SystemHeaders),
    HandshakeAck,
    HandshakeReject { code: u16, description: String },
    Emit { event: String, data: Payload },
    Call { cid: u64, procedure: String, data: Payload },
    Reply { cid: u64, result: std::result::Result<Payload, RemoteError> },
    Close { code: u16, reason: String },
}

pub fn encode<T: Serialize>(value: &T) -> Result<Payload> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}
