use crate::channel::{self, Receiver, Sender};
use crate::failure_codes::{PeerUpdateError, HANDSHAKE_ERROR};
use crate::handshake::admit;
use crate::peer::SystemHeaders;
use crate::pool::{AddPeer, PeerRecord};
use crate::registry::RegisterSocket;
use crate::socket::Frame;
use crate::transport::tcp;
use crate::{Error, Result};

use actix::Recipient;
use colored::Colorize;
use tracing::{debug, info};

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Implements a server for admitting incoming peer sessions.
pub struct Server {
    /// The ip address which this server binds to.
    ip: SocketAddr,
    system: SystemHeaders,
    /// Bounds the handshake and every call on admitted sockets.
    ack_timeout: Duration,
    connect: Recipient<RegisterSocket>,
    pool: Recipient<AddPeer>,
}

impl Server {
    pub fn new(
        ip: SocketAddr,
        system: SystemHeaders,
        ack_timeout: Duration,
        connect: Recipient<RegisterSocket>,
        pool: Recipient<AddPeer>,
    ) -> Server {
        Server { ip, system, ack_timeout, connect, pool }
    }

    pub async fn listen(self) -> Result<()> {
        let listener = TcpListener::bind(self.ip).await?;
        info!("listening on {}", self.ip.to_string().green());
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (sender, receiver, remote) = channel::accept::<Frame, Frame>(&listener).await?;
            let system = self.system.clone();
            let ack_timeout = self.ack_timeout;
            let connect = self.connect.clone();
            let pool = self.pool.clone();
            tokio::spawn(async move {
                if let Err(err) = session(sender, receiver, remote, system, ack_timeout, connect, pool).await {
                    debug!("session from {} ended: {:?}", remote, err);
                }
            });
        }
    }
}

async fn reject(sender: &mut Sender<Frame>, remote: SocketAddr, rejection: PeerUpdateError) -> Result<()> {
    debug!("rejected handshake from {}: {}", remote, rejection);
    let description = rejection.description.unwrap_or(rejection.message);
    sender.send(Frame::HandshakeReject { code: rejection.code, description }).await
}

/// Admits one inbound session, registers its socket and pumps it until it closes.
async fn session(
    mut sender: Sender<Frame>,
    mut receiver: Receiver<Frame>,
    remote: SocketAddr,
    system: SystemHeaders,
    ack_timeout: Duration,
    connect: Recipient<RegisterSocket>,
    pool: Recipient<AddPeer>,
) -> Result<()> {
    let headers = match tokio::time::timeout(ack_timeout, receiver.recv()).await?? {
        Some(Frame::Handshake(headers)) => headers,
        Some(_) => return reject(&mut sender, remote, PeerUpdateError::new(HANDSHAKE_ERROR)).await,
        None => return Err(Error::EmptyResponse),
    };

    let peer = match admit(&system, remote.ip(), &headers) {
        Ok(peer) => peer,
        Err(rejection) => return reject(&mut sender, remote, rejection).await,
    };
    sender.send(Frame::HandshakeAck).await?;

    let (socket, pump) = tcp::inbound(sender, receiver, peer.clone(), ack_timeout);
    info!("admitted peer {} at {}", peer.nonce, peer.string().yellow());
    // registered before any frame is pumped, so early calls find the router attached
    connect.send(RegisterSocket { socket: socket.clone() }).await?;
    pool.do_send(AddPeer(PeerRecord::inbound(peer, socket)));
    pump.await;
    Ok(())
}
