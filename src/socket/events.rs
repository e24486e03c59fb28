use crate::peer::PeerObject;

use super::{Payload, RemoteError, Socket, SocketId};

/// Lifecycle events raised by a socket, in transport order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    Connect,
    Disconnect,
    ConnectAbort { code: u16, reason: String },
    Error(String),
    Close { code: u16, reason: String },
    Message(String),
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct SocketEvent {
    pub socket: Socket,
    pub kind: SocketEventKind,
}

/// A remote call or event reaching a served socket.
#[derive(Debug, Clone, Message)]
#[rtype(result = "std::result::Result<Payload, RemoteError>")]
pub struct IncomingCall {
    pub socket_id: SocketId,
    pub peer_object: Option<PeerObject>,
    pub procedure: String,
    pub data: Payload,
    /// `false` for fire-and-forget events, whose result is discarded.
    pub expects_reply: bool,
}
