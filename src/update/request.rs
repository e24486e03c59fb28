use crate::failure_codes::PeerUpdateError;
use crate::peer::{
    is_valid_nethash, parse_version, Nonce, PeerObject, PeerState, NETHASH_LENGTH, NONCE_LENGTH,
};
use crate::{Error, Result};

use std::convert::TryFrom;
use std::net::IpAddr;

/// Name of the single method carried by the worker to master channel.
pub const UPDATE_PEER: &str = "updatePeer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UpdateOperation {
    Insert,
    Remove,
}

impl From<UpdateOperation> for u8 {
    fn from(operation: UpdateOperation) -> u8 {
        match operation {
            UpdateOperation::Insert => 0,
            UpdateOperation::Remove => 1,
        }
    }
}

impl TryFrom<u8> for UpdateOperation {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(UpdateOperation::Insert),
            1 => Ok(UpdateOperation::Remove),
            _ => Err(format!("unknown update operation {}", code)),
        }
    }
}

/// A request to mutate the master's peers list.
#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[rtype(result = "UpdateAck")]
pub struct UpdateRequest {
    pub operation: UpdateOperation,
    pub peer: PeerObject,
    pub worker_id: u32,
}

impl UpdateRequest {
    pub fn new(operation: UpdateOperation, peer: PeerObject, worker_id: u32) -> Self {
        UpdateRequest { operation, peer, worker_id }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, MessageResponse)]
pub struct UpdateAck {
    pub error: Option<PeerUpdateError>,
}

impl UpdateAck {
    pub fn ok() -> Self {
        UpdateAck { error: None }
    }

    pub fn failed(error: PeerUpdateError) -> Self {
        UpdateAck { error: Some(error) }
    }
}

impl From<std::result::Result<(), PeerUpdateError>> for UpdateAck {
    fn from(result: std::result::Result<(), PeerUpdateError>) -> Self {
        match result {
            Ok(()) => UpdateAck::ok(),
            Err(err) => UpdateAck::failed(err),
        }
    }
}

/// The envelope sent over the worker to master channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub method: String,
    pub args: UpdateRequest,
}

impl ChannelRequest {
    pub fn update_peer(request: UpdateRequest) -> Self {
        ChannelRequest { method: UPDATE_PEER.to_owned(), args: request }
    }
}

/// Peer data as supplied by a remote node, checked before it is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerData {
    pub ip: String,
    pub ws_port: u32,
    pub http_port: Option<u32>,
    pub nonce: String,
    pub version: String,
    pub nethash: String,
    pub os: Option<String>,
}

impl PeerData {
    pub fn into_peer_object(self) -> Result<PeerObject> {
        let ip: IpAddr = self.ip.parse().map_err(|_| Error::PeerParseError)?;
        let ws_port = u16::try_from(self.ws_port).map_err(|_| Error::PeerParseError)?;
        let http_port = match self.http_port {
            Some(port) => Some(u16::try_from(port).map_err(|_| Error::PeerParseError)?),
            None => None,
        };
        Ok(PeerObject {
            nonce: Nonce::from(self.nonce),
            ip,
            ws_port,
            http_port,
            version: Some(self.version),
            nethash: Some(self.nethash),
            os: self.os,
            state: PeerState::Connected,
        })
    }
}

impl From<&PeerObject> for PeerData {
    fn from(peer: &PeerObject) -> Self {
        PeerData {
            ip: peer.ip.to_string(),
            ws_port: peer.ws_port as u32,
            http_port: peer.http_port.map(u32::from),
            nonce: peer.nonce.to_string(),
            version: peer.version.clone().unwrap_or_default(),
            nethash: peer.nethash.clone().unwrap_or_default(),
            os: peer.os.clone(),
        }
    }
}

/// An identity re-confirmation arriving over an established peer socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerUpdateRequest {
    /// Attached by the handshake; never supplied by the remote side.
    pub peer_object: Option<PeerObject>,
    pub socket_id: String,
    pub worker_id: u32,
    pub data: PeerData,
}

fn is_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

impl PeerUpdateRequest {
    /// Every schema violation, in check order.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = vec![];
        if self.socket_id.is_empty() {
            violations.push("socketId must not be empty".to_owned());
        }
        if self.data.ip.parse::<IpAddr>().is_err() {
            violations.push(format!("data.ip must be a valid IP address, got {}", self.data.ip));
        }
        if !is_port(self.data.ws_port) {
            violations.push(format!("data.wsPort must be in range 1..65535, got {}", self.data.ws_port));
        }
        if !Nonce::from(self.data.nonce.as_str()).is_valid() {
            violations.push(format!("data.nonce must be {} alphanumeric characters", NONCE_LENGTH));
        }
        if parse_version(&self.data.version).is_none() {
            violations.push("data.version must match major.minor.patch".to_owned());
        }
        if !is_valid_nethash(&self.data.nethash) {
            violations.push(format!("data.nethash must be {} hex characters", NETHASH_LENGTH));
        }
        if let Some(port) = self.data.http_port {
            if !is_port(port) {
                violations.push(format!("data.httpPort must be in range 1..65535, got {}", port));
            }
        }
        violations
    }

    /// Fails with the first schema violation.
    pub fn validate(&self) -> Result<()> {
        match self.violations().into_iter().next() {
            Some(violation) => Err(Error::Validation(violation)),
            None => Ok(()),
        }
    }
}
