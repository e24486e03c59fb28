use crate::failure_codes::{HANDSHAKE_ERROR, NORMAL_CLOSURE};
use crate::peer::{Nonce, PeerObject, SystemHeaders};
use crate::registry::RegisterSocket;
use crate::socket::{
    ConnectionOptions, Direction, ListenerKey, Payload, Socket, SocketEvent, SocketEventKind,
    SocketId,
};
use crate::transport::Transport;
use crate::{Error, Result};

use super::{is_usable, peer_has_priority, rank};

use actix::{Actor, AsyncContext, Context, Handler, Recipient, ResponseFuture};
use colored::Colorize;
use tracing::{debug, error, info, trace};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const POOL_LISTENER: ListenerKey = "pool";

pub const DEPRECATED_REASON: &str =
    "Peer connection was deprecated because a better connection was found";
pub const ERROR_REASON: &str = "Intentionally disconnected from peer because of error";
pub const REMOVED_REASON: &str = "Peer was removed from the connection pool";

/// A peer known to the pool, with the socket it currently owns.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub peer: PeerObject,
    pub socket: Option<Socket>,
}

impl PeerRecord {
    /// A candidate to dial.
    pub fn outbound(peer: PeerObject) -> Self {
        PeerRecord { peer, socket: None }
    }

    /// A candidate carrying an accepted socket.
    pub fn inbound(peer: PeerObject, socket: Socket) -> Self {
        PeerRecord { peer, socket: Some(socket) }
    }

    pub fn nonce(&self) -> &Nonce {
        &self.peer.nonce
    }
}

/// Holds at most one socket per peer nonce.
pub struct PeerConnectionPool {
    system: SystemHeaders,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    registrar: Option<Recipient<RegisterSocket>>,
    peers: HashMap<Nonce, PeerRecord>,
    /// Sockets the pool listens on, with the nonce they serve.
    owners: HashMap<SocketId, Nonce>,
}

impl PeerConnectionPool {
    pub fn new(system: SystemHeaders, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        PeerConnectionPool {
            system,
            transport,
            timeout,
            registrar: None,
            peers: HashMap::default(),
            owners: HashMap::default(),
        }
    }

    /// Sockets dialed by the pool are also handed to `registrar` for registration.
    pub fn with_registrar(mut self, registrar: Recipient<RegisterSocket>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    fn add_peer(&mut self, candidate: PeerRecord, listener: Recipient<SocketEvent>) -> Result<SocketId> {
        let nonce = candidate.nonce().clone();
        if nonce == self.system.nonce {
            error!("[pool] refusing to add own nonce {} as a peer", nonce);
            return Err(Error::SelfConnection);
        }

        let existing = self.peers.remove(&nonce);
        let existing_socket = existing.as_ref().and_then(|record| record.socket.clone());
        let candidate_socket = candidate.socket.clone();
        let existing_usable = existing_socket.as_ref().map_or(false, is_usable);
        let candidate_usable = candidate_socket.as_ref().map_or(false, is_usable);
        let mut record = existing.unwrap_or(candidate);

        let (kept, deprecated) = match (existing_socket.clone(), candidate_socket) {
            (Some(existing), Some(candidate)) if existing_usable && candidate_usable => {
                let prioritize_inbound = peer_has_priority(&nonce, &self.system.nonce);
                let (kept, deprecated) = rank(existing, candidate, prioritize_inbound);
                debug!(
                    "[pool] peer {}: keeping {} socket {}, deprecating {} socket {}",
                    nonce,
                    kept.direction(),
                    kept.id(),
                    deprecated.direction(),
                    deprecated.id()
                );
                (kept, Some(deprecated))
            }
            (Some(existing), _) if existing_usable => (existing, None),
            (_, Some(candidate)) if candidate_usable => (candidate, None),
            _ => (self.dial(&record.peer), None),
        };

        // only the ranked loser is torn down, unusable sockets are left to their own lifecycle
        if let Some(replaced) = existing_socket.filter(|socket| socket.id() != kept.id()) {
            let _ = self.owners.remove(&replaced.id());
        }
        if let Some(deprecated) = deprecated.filter(|socket| socket.id() != kept.id()) {
            self.release(&deprecated);
        }

        kept.upgrade();
        if !self.owners.contains_key(&kept.id()) {
            kept.subscribe(POOL_LISTENER, listener);
            let _ = self.owners.insert(kept.id(), nonce.clone());
        }

        let id = kept.id();
        record.socket = Some(kept);
        let _ = self.peers.insert(nonce, record);
        Ok(id)
    }

    fn dial(&self, peer: &PeerObject) -> Socket {
        let options = ConnectionOptions::for_pool(&peer.address(), &self.system, self.timeout);
        let socket = self.transport.connect(options);
        socket.attach_peer_object(peer.clone());
        info!("[pool] dialing peer {} at {}", peer.nonce, peer.string().yellow());
        if let Some(registrar) = &self.registrar {
            registrar.do_send(RegisterSocket { socket: socket.clone() });
        }
        socket
    }

    fn release(&mut self, socket: &Socket) {
        let _ = self.owners.remove(&socket.id());
        socket.destroy(NORMAL_CLOSURE, DEPRECATED_REASON);
    }

    fn remove_peer(&mut self, nonce: &Nonce) -> bool {
        match self.peers.remove(nonce) {
            Some(record) => {
                if let Some(socket) = record.socket {
                    let _ = self.owners.remove(&socket.id());
                    socket.destroy(NORMAL_CLOSURE, REMOVED_REASON);
                }
                true
            }
            None => {
                error!("[pool] failed to remove non-existent peer {}", nonce);
                false
            }
        }
    }

    fn socket_of(&self, nonce: &Nonce) -> Option<Socket> {
        self.peers.get(nonce).and_then(|record| record.socket.clone())
    }

    /// Detaches a closed socket, dropping the record once it has no socket left.
    fn cleanup(&mut self, socket: &Socket, nonce: &Nonce) {
        socket.destroy(NORMAL_CLOSURE, "");
        let _ = self.owners.remove(&socket.id());

        let empty = match self.peers.get_mut(nonce) {
            Some(record) => {
                // a newer winner may already have replaced this socket
                if record.socket.as_ref().map_or(false, |current| current.id() == socket.id()) {
                    record.socket = None;
                }
                record.socket.is_none()
            }
            None => false,
        };
        if empty {
            let _ = self.peers.remove(nonce);
            debug!("[pool] removed peer {}", nonce);
        }
    }
}

impl Actor for PeerConnectionPool {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        info!("[pool] started with nonce {}", self.system.nonce.to_string().cyan());
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<SocketId>")]
pub struct AddPeer(pub PeerRecord);

impl Handler<AddPeer> for PeerConnectionPool {
    type Result = Result<SocketId>;

    fn handle(&mut self, msg: AddPeer, ctx: &mut Context<Self>) -> Self::Result {
        let listener = ctx.address().recipient();
        self.add_peer(msg.0, listener)
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct RemovePeer {
    pub nonce: Nonce,
}

impl Handler<RemovePeer> for PeerConnectionPool {
    type Result = bool;

    fn handle(&mut self, msg: RemovePeer, _ctx: &mut Context<Self>) -> Self::Result {
        self.remove_peer(&msg.nonce)
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<Payload>")]
pub struct CallPeer {
    pub nonce: Nonce,
    pub procedure: String,
    pub data: Payload,
}

impl Handler<CallPeer> for PeerConnectionPool {
    type Result = ResponseFuture<Result<Payload>>;

    fn handle(&mut self, msg: CallPeer, _ctx: &mut Context<Self>) -> Self::Result {
        match self.socket_of(&msg.nonce) {
            Some(socket) => {
                let call = socket.call(&msg.procedure, msg.data);
                Box::pin(async move { call.await })
            }
            None => {
                debug!("[pool] failed to call {} on non-existent peer {}", msg.procedure, msg.nonce);
                let failure: Result<Payload> = Err(Error::PeerNotFound(msg.nonce));
                Box::pin(async move { failure })
            }
        }
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct EmitToPeer {
    pub nonce: Nonce,
    pub event: String,
    pub data: Payload,
}

impl Handler<EmitToPeer> for PeerConnectionPool {
    type Result = Result<()>;

    fn handle(&mut self, msg: EmitToPeer, _ctx: &mut Context<Self>) -> Self::Result {
        match self.socket_of(&msg.nonce) {
            Some(socket) => socket.emit(&msg.event, msg.data),
            None => {
                debug!("[pool] failed to emit {} to non-existent peer {}", msg.event, msg.nonce);
                Err(Error::PeerNotFound(msg.nonce))
            }
        }
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Option<PeerRecord>")]
pub struct GetPeer {
    pub nonce: Nonce,
}

impl Handler<GetPeer> for PeerConnectionPool {
    type Result = Option<PeerRecord>;

    fn handle(&mut self, msg: GetPeer, _ctx: &mut Context<Self>) -> Self::Result {
        self.peers.get(&msg.nonce).cloned()
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "usize")]
pub struct PoolSize;

impl Handler<PoolSize> for PeerConnectionPool {
    type Result = usize;

    fn handle(&mut self, _msg: PoolSize, _ctx: &mut Context<Self>) -> Self::Result {
        self.peers.len()
    }
}

impl Handler<SocketEvent> for PeerConnectionPool {
    type Result = ();

    fn handle(&mut self, msg: SocketEvent, _ctx: &mut Context<Self>) -> Self::Result {
        let SocketEvent { socket, kind } = msg;
        let nonce = match self.owners.get(&socket.id()) {
            Some(nonce) => nonce.clone(),
            None => return,
        };
        let address = socket.peer_object().map(|peer| peer.string()).unwrap_or_default();

        match (socket.direction(), kind) {
            (Direction::Outbound, SocketEventKind::Connect) => {
                trace!("[Outbound socket :: connect] Peer connection to {} established", address)
            }
            (Direction::Outbound, SocketEventKind::Disconnect) => {
                trace!("[Outbound socket :: disconnect] Peer connection to {} disconnected", address)
            }
            (Direction::Outbound, SocketEventKind::ConnectAbort { code, reason }) => {
                debug!(
                    "[Outbound socket :: connectAbort] Peer connection to {} failed on handshake with code {} - {}",
                    address, code, reason
                );
                socket.disconnect(HANDSHAKE_ERROR, &reason);
            }
            (Direction::Outbound, SocketEventKind::Error(err)) => {
                debug!("[Outbound socket :: error] Peer connection to {} failed: {}", address, err);
                socket.disconnect(NORMAL_CLOSURE, ERROR_REASON);
            }
            (direction, SocketEventKind::Close { code, reason }) => {
                debug!(
                    "[{} socket :: close] Peer connection to {} closed with code {} - {}",
                    direction, address, code, reason
                );
                self.cleanup(&socket, &nonce);
            }
            (_, SocketEventKind::Message(message)) => {
                trace!("[socket :: message] {} from {}", message, address)
            }
            _ => (),
        }
    }
}
