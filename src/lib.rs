#[macro_use]
extern crate serde_derive;
#[macro_use(Message, MessageResponse)]
extern crate actix_derive;
extern crate colored;

pub mod channel;
pub mod client;
pub mod failure_codes;
pub mod handshake;
pub mod master;
pub mod peer;
pub mod pool;
pub mod registry;
pub mod server;
pub mod socket;
pub mod transport;
pub mod update;

use failure_codes::PeerUpdateError;
use peer::Nonce;
use socket::RemoteError;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Bincode(String),
    Actix(actix::MailboxError),
    Config(config::ConfigError),

    // worker <-> master channel errors
    ChannelError(String),
    /// The master (or the update protocol) rejected a request with a failure code
    PeerUpdate(PeerUpdateError),

    // admission errors
    /// The candidate peer carries our own nonce
    SelfConnection,
    /// The handshake completed without a peer object attached to the socket
    MissingPeerObject,
    /// The first schema violation of a malformed request
    Validation(String),
    /// Error when parsing a peer description `NONCE@IP:PORT`
    PeerParseError,

    // not-found errors
    PeerNotFound(Nonce),
    ConnectionNotFound(String),

    // socket errors
    NotUpgraded,
    SocketClosed,
    Timeout,
    EmptyResponse,
    /// The remote side answered a call with an error
    Remote(RemoteError),
}

impl std::error::Error for Error {}

impl Error {
    /// The structured failure code, if the error carries one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::PeerUpdate(err) => Some(err.code),
            _ => None,
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Bincode(format!("{:?}", error))
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(error: actix::MailboxError) -> Self {
        Error::Actix(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::convert::From<PeerUpdateError> for Error {
    fn from(error: PeerUpdateError) -> Self {
        Error::PeerUpdate(error)
    }
}

impl std::convert::From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        Error::Remote(error)
    }
}

impl std::convert::From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
