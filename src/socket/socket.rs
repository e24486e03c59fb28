use crate::peer::PeerObject;
use crate::transport::{SafeFuture, SocketDriver};
use crate::{Error, Result};

use super::{Frame, IncomingCall, Payload, RemoteError, SocketEvent, SocketEventKind};

use actix::Recipient;
use derive_more::Display;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Answer of an upgraded socket that serves no procedures.
pub const PROCEDURE_NOT_FOUND: &str = "procedure not found";

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process unique, monotonically allocated socket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct SocketId(u64);

impl SocketId {
    pub fn next() -> Self {
        SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    #[display(fmt = "inbound")]
    Inbound,
    #[display(fmt = "outbound")]
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Connecting,
    Open,
    Closed,
}

impl LifecycleState {
    /// The transition table. `None` leaves the state untouched.
    pub fn next(self, event: &SocketEventKind) -> Option<LifecycleState> {
        match (self, event) {
            (LifecycleState::Connecting, SocketEventKind::Connect) => Some(LifecycleState::Open),
            (LifecycleState::Connecting, SocketEventKind::Close { .. })
            | (LifecycleState::Open, SocketEventKind::Close { .. }) => Some(LifecycleState::Closed),
            _ => None,
        }
    }
}

/// Identifies a subscriber, which may listen to a socket at most once.
pub type ListenerKey = &'static str;

#[derive(Default)]
struct RpcState {
    next_cid: u64,
    pending: HashMap<u64, oneshot::Sender<Result<Payload>>>,
    handler: Option<Recipient<IncomingCall>>,
}

struct Inner {
    lifecycle: LifecycleState,
    rpc: Option<RpcState>,
    peer_object: Option<PeerObject>,
    listeners: Vec<(ListenerKey, Recipient<SocketEvent>)>,
}

enum Endpoint {
    Raw,
    Client,
    Server(Recipient<IncomingCall>),
}

/// A transport session with a peer. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Socket {
    id: SocketId,
    direction: Direction,
    ack_timeout: Duration,
    driver: Arc<dyn SocketDriver>,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl Socket {
    pub fn new(
        direction: Direction,
        lifecycle: LifecycleState,
        ack_timeout: Duration,
        driver: Arc<dyn SocketDriver>,
    ) -> Self {
        Socket {
            id: SocketId::next(),
            direction,
            ack_timeout,
            driver,
            inner: Arc::new(Mutex::new(Inner {
                lifecycle,
                rpc: None,
                peer_object: None,
                listeners: vec![],
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lock().lifecycle
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == LifecycleState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle() == LifecycleState::Closed
    }

    pub fn is_rpc_capable(&self) -> bool {
        self.lock().rpc.is_some()
    }

    pub fn peer_object(&self) -> Option<PeerObject> {
        self.lock().peer_object.clone()
    }

    pub fn attach_peer_object(&self, peer: PeerObject) {
        self.lock().peer_object = Some(peer);
    }

    /// Subscribes `listener` to lifecycle events. Returns `false` if `key` is already subscribed.
    pub fn subscribe(&self, key: ListenerKey, listener: Recipient<SocketEvent>) -> bool {
        let mut inner = self.lock();
        if inner.listeners.iter().any(|(k, _)| *k == key) {
            return false;
        }
        inner.listeners.push((key, listener));
        true
    }

    pub fn is_subscribed(&self, key: ListenerKey) -> bool {
        self.lock().listeners.iter().any(|(k, _)| *k == key)
    }

    /// Attaches call/response framing. Returns `false` without effect if already upgraded.
    pub fn upgrade(&self) -> bool {
        let mut inner = self.lock();
        if inner.rpc.is_some() {
            return false;
        }
        inner.rpc = Some(RpcState::default());
        true
    }

    /// Attaches the handler serving remote calls and events. Requires an upgraded socket,
    /// and returns `false` if a handler is already attached.
    pub fn serve(&self, handler: Recipient<IncomingCall>) -> bool {
        match self.lock().rpc.as_mut() {
            Some(rpc) if rpc.handler.is_none() => {
                rpc.handler = Some(handler);
                true
            }
            _ => false,
        }
    }

    /// Raises a lifecycle event: applies the transition table, then notifies every listener.
    /// Events on a closed socket are dropped.
    pub fn raise(&self, event: SocketEventKind) {
        let listeners = {
            let mut inner = self.lock();
            if inner.lifecycle == LifecycleState::Closed {
                trace!("[socket {}] dropped {:?} on closed socket", self.id, event);
                return;
            }
            if let Some(next) = inner.lifecycle.next(&event) {
                inner.lifecycle = next;
            }
            if inner.lifecycle == LifecycleState::Closed {
                // dropping the senders fails every pending call
                if let Some(rpc) = inner.rpc.as_mut() {
                    rpc.pending.clear();
                }
            }
            inner.listeners.iter().map(|(_, listener)| listener.clone()).collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.do_send(SocketEvent { socket: self.clone(), kind: event.clone() });
        }
    }

    /// Closes the session locally. Idempotent.
    pub fn disconnect(&self, code: u16, reason: &str) {
        if self.is_closed() {
            return;
        }
        self.driver.close(code, reason);
        self.hang_up(code, reason);
    }

    /// Disconnects, then unsubscribes every listener. The final `Close` still reaches them.
    pub fn destroy(&self, code: u16, reason: &str) {
        self.disconnect(code, reason);
        self.lock().listeners.clear();
    }

    /// Marks the session as closed by the remote side or by the transport.
    pub fn hang_up(&self, code: u16, reason: &str) {
        let was_open = match self.lifecycle() {
            LifecycleState::Closed => return,
            lifecycle => lifecycle == LifecycleState::Open,
        };
        if was_open {
            self.raise(SocketEventKind::Disconnect);
        }
        self.raise(SocketEventKind::Close { code, reason: reason.to_owned() });
    }

    /// Calls a remote procedure. Resolves exactly once.
    pub fn call(&self, procedure: &str, data: Payload) -> SafeFuture<Result<Payload>> {
        let (cid, rx) = {
            let mut inner = self.lock();
            if inner.lifecycle == LifecycleState::Closed {
                return Box::pin(futures::future::ready(Err(Error::SocketClosed)));
            }
            let rpc = match inner.rpc.as_mut() {
                Some(rpc) => rpc,
                None => return Box::pin(futures::future::ready(Err(Error::NotUpgraded))),
            };
            let cid = rpc.next_cid;
            rpc.next_cid += 1;
            let (tx, rx) = oneshot::channel();
            let _ = rpc.pending.insert(cid, tx);
            (cid, rx)
        };

        let frame = Frame::Call { cid, procedure: procedure.to_owned(), data };
        if let Err(err) = self.driver.send(frame) {
            self.forget_call(cid);
            return Box::pin(futures::future::ready(Err(err)));
        }

        let socket = self.clone();
        let ack_timeout = self.ack_timeout;
        Box::pin(async move {
            match tokio::time::timeout(ack_timeout, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(Error::SocketClosed),
                Err(_) => {
                    socket.forget_call(cid);
                    Err(Error::Timeout)
                }
            }
        })
    }

    fn forget_call(&self, cid: u64) {
        if let Some(rpc) = self.lock().rpc.as_mut() {
            let _ = rpc.pending.remove(&cid);
        }
    }

    /// Queues a fire-and-forget event.
    pub fn emit(&self, event: &str, data: Payload) -> Result<()> {
        {
            let inner = self.lock();
            if inner.lifecycle == LifecycleState::Closed {
                return Err(Error::SocketClosed);
            }
            if inner.rpc.is_none() {
                return Err(Error::NotUpgraded);
            }
        }
        self.driver.send(Frame::Emit { event: event.to_owned(), data })
    }

    fn endpoint(&self) -> Endpoint {
        match self.lock().rpc.as_ref() {
            None => Endpoint::Raw,
            Some(RpcState { handler: None, .. }) => Endpoint::Client,
            Some(RpcState { handler: Some(handler), .. }) => Endpoint::Server(handler.clone()),
        }
    }

    fn incoming(&self, procedure: String, data: Payload, expects_reply: bool) -> IncomingCall {
        IncomingCall {
            socket_id: self.id,
            peer_object: self.peer_object(),
            procedure,
            data,
            expects_reply,
        }
    }

    /// Handles a frame received by the transport.
    pub fn deliver(&self, frame: Frame) {
        match frame {
            Frame::Reply { cid, result } => {
                let waiting = self.lock().rpc.as_mut().and_then(|rpc| rpc.pending.remove(&cid));
                match waiting {
                    Some(tx) => {
                        let _ = tx.send(result.map_err(Error::Remote));
                    }
                    None => trace!("[socket {}] reply to unknown call {}", self.id, cid),
                }
            }
            Frame::Call { cid, procedure, data } => match self.endpoint() {
                Endpoint::Raw => self.raise(SocketEventKind::Message(format!("call {}", procedure))),
                Endpoint::Client => {
                    let result = Err(RemoteError::new(PROCEDURE_NOT_FOUND));
                    if let Err(err) = self.driver.send(Frame::Reply { cid, result }) {
                        debug!("[socket {}] failed to reply: {:?}", self.id, err);
                    }
                }
                Endpoint::Server(handler) => {
                    let call = self.incoming(procedure, data, true);
                    let driver = self.driver.clone();
                    let id = self.id;
                    let _ = tokio::spawn(async move {
                        let result = match handler.send(call).await {
                            Ok(result) => result,
                            Err(err) => Err(RemoteError::new(format!("{:?}", err))),
                        };
                        if let Err(err) = driver.send(Frame::Reply { cid, result }) {
                            debug!("[socket {}] failed to reply: {:?}", id, err);
                        }
                    });
                }
            },
            Frame::Emit { event, data } => match self.endpoint() {
                Endpoint::Server(handler) => handler.do_send(self.incoming(event, data, false)),
                _ => self.raise(SocketEventKind::Message(format!("event {}", event))),
            },
            Frame::Close { code, reason } => self.hang_up(code, &reason),
            Frame::Handshake(_) | Frame::HandshakeAck | Frame::HandshakeReject { .. } => {
                self.raise(SocketEventKind::Message("unexpected handshake frame".to_owned()))
            }
        }
    }
}
