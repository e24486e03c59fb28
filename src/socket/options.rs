use crate::peer::{PeerAddress, SystemHeaders};

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Connect and ack timeout used by the connection pool.
pub const POOL_TIMEOUT: Duration = Duration::from_millis(2000);
/// Connect and ack timeout used by the client call path.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(10000);

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub hostname: IpAddr,
    pub port: u16,
    pub query: SystemHeaders,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    /// Dial right away rather than on the first queued frame.
    pub auto_connect: bool,
    pub auto_reconnect: bool,
    pub multiplex: bool,
    pub ping_timeout_disabled: bool,
}

impl ConnectionOptions {
    /// Dial profile of the connection pool.
    pub fn for_pool(peer: &PeerAddress, headers: &SystemHeaders, timeout: Duration) -> Self {
        ConnectionOptions {
            hostname: peer.ip,
            port: peer.ws_port,
            query: headers.clone(),
            connect_timeout: timeout,
            ack_timeout: timeout,
            auto_connect: true,
            auto_reconnect: false,
            multiplex: false,
            ping_timeout_disabled: true,
        }
    }

    /// Dial profile of the client call path.
    pub fn for_client(peer: &PeerAddress, headers: &SystemHeaders, timeout: Duration) -> Self {
        ConnectionOptions {
            hostname: peer.ip,
            port: peer.ws_port,
            query: headers.clone(),
            connect_timeout: timeout,
            ack_timeout: timeout,
            auto_connect: false,
            auto_reconnect: false,
            multiplex: true,
            ping_timeout_disabled: true,
        }
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.hostname, self.port)
    }
}
