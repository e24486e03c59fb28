use super::{Connections, Insert, Remove};
use crate::failure_codes::{on_master::update::INVALID_PEER, NORMAL_CLOSURE};
use crate::peer::PeerObject;
use crate::socket::{IncomingCall, ListenerKey, Socket, SocketEvent, SocketEventKind, SocketId};

use actix::{Actor, Addr, AsyncContext, Context, Handler, Recipient};
use tracing::{error, info, trace};

use std::collections::HashMap;

pub const CONNECT_LISTENER: ListenerKey = "connect";

pub const MISSING_PEER_REASON: &str = "Could not find the peerObject property on the handshake request";

/// Upgrades sockets, serves them through the router and keeps `Connections` in step with
/// their lifecycle.
pub struct Connect {
    connections: Addr<Connections>,
    router: Option<Recipient<IncomingCall>>,
    sockets: HashMap<SocketId, Socket>,
}

impl Connect {
    pub fn new(connections: Addr<Connections>, router: Option<Recipient<IncomingCall>>) -> Self {
        Connect { connections, router, sockets: HashMap::default() }
    }

    fn register(&mut self, socket: Socket, listener: Recipient<SocketEvent>) {
        let peer = match socket.peer_object() {
            Some(peer) => peer,
            None => {
                error!("[connect] socket {} has no peer object", socket.id());
                socket.disconnect(INVALID_PEER, MISSING_PEER_REASON);
                return;
            }
        };
        if socket.is_closed() {
            return;
        }

        socket.upgrade();
        if let Some(router) = &self.router {
            socket.serve(router.clone());
        }
        if !socket.subscribe(CONNECT_LISTENER, listener) {
            return;
        }
        let _ = self.sockets.insert(socket.id(), socket.clone());
        if socket.is_open() {
            self.connections.do_send(Insert { peer, socket });
        }
    }

    fn on_close(&mut self, socket: &Socket, peer: &PeerObject) {
        let _ = self.sockets.remove(&socket.id());
        socket.destroy(NORMAL_CLOSURE, "");
        self.connections.do_send(Remove { peer: peer.clone(), socket_id: Some(socket.id()) });

        // another open socket to the same peer takes over the registration
        let address = peer.string();
        let successor = self.sockets.values().find_map(|candidate| match candidate.peer_object() {
            Some(candidate_peer) if candidate.is_open() && candidate_peer.string() == address => {
                Some((candidate_peer, candidate.clone()))
            }
            _ => None,
        });
        if let Some((peer, socket)) = successor {
            info!("[connect] socket {} takes over the registration of {}", socket.id(), address);
            self.connections.do_send(Insert { peer, socket });
        }
    }
}

impl Actor for Connect {
    type Context = Context<Self>;
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct RegisterSocket {
    pub socket: Socket,
}

impl Handler<RegisterSocket> for Connect {
    type Result = ();

    fn handle(&mut self, msg: RegisterSocket, ctx: &mut Context<Self>) -> Self::Result {
        let listener = ctx.address().recipient();
        self.register(msg.socket, listener)
    }
}

/// Number of live sockets being tracked.
#[derive(Debug, Clone, Message)]
#[rtype(result = "usize")]
pub struct Tracked;

impl Handler<Tracked> for Connect {
    type Result = usize;

    fn handle(&mut self, _msg: Tracked, _ctx: &mut Context<Self>) -> Self::Result {
        self.sockets.len()
    }
}

impl Handler<SocketEvent> for Connect {
    type Result = ();

    fn handle(&mut self, msg: SocketEvent, _ctx: &mut Context<Self>) -> Self::Result {
        let SocketEvent { socket, kind } = msg;
        let peer = match socket.peer_object() {
            Some(peer) => peer,
            None => return,
        };
        match kind {
            SocketEventKind::Connect => {
                info!("[Event on socket :: connect] Peer connection to {} established", peer.string());
                self.connections.do_send(Insert { peer, socket });
            }
            SocketEventKind::Disconnect => {
                info!("[Event on socket :: disconnect] Peer connection to {} disconnected", peer.string())
            }
            SocketEventKind::ConnectAbort { code, reason } => info!(
                "[Event on socket :: connectAbort] Peer connection to {} failed with code {} - {}",
                peer.string(),
                code,
                reason
            ),
            SocketEventKind::Error(err) => {
                info!("[Event on socket :: error] Peer connection to {} failed: {}", peer.string(), err)
            }
            SocketEventKind::Close { code, reason } => {
                info!(
                    "[Event on socket :: close] Peer connection to {} closed with code {} - {}",
                    peer.string(),
                    code,
                    reason
                );
                self.on_close(&socket, &peer);
            }
            SocketEventKind::Message(message) => {
                trace!("[Event on socket :: message] {} from {}", message, peer.string())
            }
        }
    }
}
