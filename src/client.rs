use crate::peer::{PeerObject, SystemHeaders};
use crate::registry::{Connections, GetConnection, RegisterSocket};
use crate::socket::{ConnectionOptions, Payload, Socket};
use crate::transport::Transport;
use crate::Result;

use actix::{
    Actor, ActorFutureExt, Addr, Context, Handler, Recipient, ResponseActFuture, WrapFuture,
};
use colored::Colorize;
use tracing::{debug, info, warn};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Issues application calls and events to peers, independently of the pool.
///
/// A request reuses the socket registered for the peer's address, then any socket the
/// client dialed earlier, and otherwise dials lazily with the client profile.
pub struct Client {
    system: SystemHeaders,
    transport: Arc<dyn Transport>,
    connections: Addr<Connections>,
    connect: Recipient<RegisterSocket>,
    timeout: Duration,
    dialed: HashMap<String, Socket>,
}

impl Client {
    pub fn new(
        system: SystemHeaders,
        transport: Arc<dyn Transport>,
        connections: Addr<Connections>,
        connect: Recipient<RegisterSocket>,
        timeout: Duration,
    ) -> Client {
        Client { system, transport, connections, connect, timeout, dialed: HashMap::default() }
    }

    fn socket_for(&mut self, peer: &PeerObject, registered: Option<Socket>) -> Socket {
        let address = peer.string();
        if let Some(socket) = registered {
            return socket;
        }
        if let Some(socket) = self.dialed.get(&address).filter(|socket| !socket.is_closed()) {
            return socket.clone();
        }
        // sockets closed since the last dial are dropped, whatever peer they served
        self.dialed.retain(|_, socket| !socket.is_closed());

        let options = ConnectionOptions::for_client(&peer.address(), &self.system, self.timeout);
        let socket = self.transport.connect(options);
        socket.attach_peer_object(peer.clone());
        socket.upgrade();
        info!("[client] dialing {}", address.yellow());
        self.connect.do_send(RegisterSocket { socket: socket.clone() });
        let _ = self.dialed.insert(address, socket.clone());
        socket
    }

    fn lookup(&self, peer: &PeerObject) -> impl std::future::Future<Output = Option<Socket>> {
        let request = self.connections.send(GetConnection { address: peer.string() });
        async move {
            match request.await {
                Ok(socket) => socket,
                Err(err) => {
                    warn!("[client] connection lookup failed: {:?}", err);
                    None
                }
            }
        }
    }
}

impl Actor for Client {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("[client] started");
    }
}

/// Sends a fire-and-forget event to a peer.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct EventRequest {
    pub peer: PeerObject,
    pub event: String,
    pub data: Payload,
}

impl Handler<EventRequest> for Client {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, msg: EventRequest, _ctx: &mut Context<Self>) -> Self::Result {
        Box::pin(self.lookup(&msg.peer).into_actor(self).map(move |registered, act, _ctx| {
            let socket = act.socket_for(&msg.peer, registered);
            if let Err(err) = socket.emit(&msg.event, msg.data) {
                warn!("[client] event {} to {} failed: {:?}", msg.event, msg.peer.string(), err);
            }
        }))
    }
}

/// Calls a procedure on a peer and waits for the reply.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<Payload>")]
pub struct RpcRequest {
    pub peer: PeerObject,
    pub procedure: String,
    pub data: Payload,
}

impl Handler<RpcRequest> for Client {
    type Result = ResponseActFuture<Self, Result<Payload>>;

    fn handle(&mut self, msg: RpcRequest, _ctx: &mut Context<Self>) -> Self::Result {
        Box::pin(self.lookup(&msg.peer).into_actor(self).then(move |registered, act, _ctx| {
            let socket = act.socket_for(&msg.peer, registered);
            socket.call(&msg.procedure, msg.data).into_actor(act)
        }))
    }
}
