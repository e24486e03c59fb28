use crate::{Error, Result};

use super::{Nonce, SystemHeaders};

use derive_more::Display;

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    Banned,
    Disconnected,
    Connected,
}

/// The canonical `ip:port` address of a peer, the key of both registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display(fmt = "{}:{}", ip, ws_port)]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub ws_port: u16,
}

impl PeerAddress {
    pub fn new(ip: IpAddr, ws_port: u16) -> Self {
        PeerAddress { ip, ws_port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.ws_port)
    }
}

impl FromStr for PeerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let addr: SocketAddr = s.parse().map_err(|_| Error::PeerParseError)?;
        Ok(PeerAddress::new(addr.ip(), addr.port()))
    }
}

/// What a node knows about a peer: identity, address, advertised headers and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerObject {
    pub nonce: Nonce,
    pub ip: IpAddr,
    pub ws_port: u16,
    pub http_port: Option<u16>,
    pub version: Option<String>,
    pub nethash: Option<String>,
    pub os: Option<String>,
    pub state: PeerState,
}

impl PeerObject {
    /// A peer known only by nonce and address, e.g. a configured seed.
    pub fn new(nonce: Nonce, address: PeerAddress) -> Self {
        PeerObject {
            nonce,
            ip: address.ip,
            ws_port: address.ws_port,
            http_port: None,
            version: None,
            nethash: None,
            os: None,
            state: PeerState::Disconnected,
        }
    }

    /// Builds the peer object of an admitted inbound connection from its handshake headers.
    pub fn from_headers(ip: IpAddr, headers: &SystemHeaders) -> Self {
        PeerObject {
            nonce: headers.nonce.clone(),
            ip,
            ws_port: headers.ws_port,
            http_port: headers.http_port,
            version: Some(headers.version.clone()),
            nethash: Some(headers.nethash.clone()),
            os: headers.os.clone(),
            state: PeerState::Disconnected,
        }
    }

    pub fn address(&self) -> PeerAddress {
        PeerAddress::new(self.ip, self.ws_port)
    }

    pub fn string(&self) -> String {
        self.address().to_string()
    }
}

/// Parses a peer description of the form `NONCE@IP:PORT`.
impl FromStr for PeerObject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (nonce, address) = match s.split_once('@') {
            Some(parts) => parts,
            None => return Err(Error::PeerParseError),
        };
        let nonce = Nonce::from(nonce);
        if !nonce.is_valid() {
            return Err(Error::PeerParseError);
        }
        Ok(PeerObject::new(nonce, address.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        let peer: PeerObject = "ABCDEFGHijklmn01@10.0.0.1:5001".parse().unwrap();
        assert_eq!(peer.nonce, Nonce::from("ABCDEFGHijklmn01"));
        assert_eq!(peer.string(), "10.0.0.1:5001");
        assert_eq!(peer.state, PeerState::Disconnected);
    }

    #[test]
    fn test_parse_seed_errors() {
        assert!("10.0.0.1:5001".parse::<PeerObject>().is_err());
        assert!("bad@10.0.0.1:5001".parse::<PeerObject>().is_err());
        assert!("ABCDEFGHijklmn01@10.0.0.1".parse::<PeerObject>().is_err());
    }

    #[test]
    fn test_address_display() {
        let address: PeerAddress = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(address.to_string(), "127.0.0.1:4000");
        assert_eq!(address.socket_addr().port(), 4000);
    }
}
