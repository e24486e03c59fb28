use super::{SafeFuture, SocketDriver, Transport};
use crate::channel::{self, Receiver, Sender};
use crate::failure_codes::{PeerUpdateError, ABNORMAL_CLOSURE, HANDSHAKE_ERROR};
use crate::peer::{PeerObject, SystemHeaders};
use crate::socket::{
    ConnectionOptions, Direction, Frame, LifecycleState, Socket, SocketEventKind,
};
use crate::{Error, Result};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

enum Command {
    Frame(Frame),
    Close { code: u16, reason: String },
}

/// Queues frames for the session task that owns the TCP stream.
struct TcpDriver {
    outbox: UnboundedSender<Command>,
}

impl SocketDriver for TcpDriver {
    fn send(&self, frame: Frame) -> Result<()> {
        self.outbox.send(Command::Frame(frame)).map_err(|_| Error::SocketClosed)
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.outbox.send(Command::Close { code, reason: reason.to_owned() });
    }
}

/// Length-delimited bincode frames over TCP.
#[derive(Debug, Default, Clone)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, options: ConnectionOptions) -> Socket {
        let (outbox, commands) = mpsc::unbounded_channel();
        let socket = Socket::new(
            Direction::Outbound,
            LifecycleState::Connecting,
            options.ack_timeout,
            Arc::new(TcpDriver { outbox }),
        );
        let _ = tokio::spawn(dial(socket.clone(), options, commands));
        socket
    }
}

/// Wraps an admitted inbound session. The returned future pumps frames and should be
/// spawned once the socket has been registered.
pub fn inbound(
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    peer: PeerObject,
    ack_timeout: Duration,
) -> (Socket, SafeFuture<()>) {
    let (outbox, commands) = mpsc::unbounded_channel();
    let socket = Socket::new(
        Direction::Inbound,
        LifecycleState::Open,
        ack_timeout,
        Arc::new(TcpDriver { outbox }),
    );
    socket.attach_peer_object(peer);
    let session = pump(socket.clone(), sender, receiver, commands, None);
    (socket, Box::pin(session))
}

async fn handshake(
    address: SocketAddr,
    headers: &SystemHeaders,
) -> Result<(Sender<Frame>, Receiver<Frame>)> {
    let (mut sender, mut receiver) = channel::connect::<Frame, Frame>(&address).await?;
    sender.send(Frame::Handshake(headers.clone())).await?;
    match receiver.recv().await? {
        Some(Frame::HandshakeAck) => Ok((sender, receiver)),
        Some(Frame::HandshakeReject { code, description }) => {
            Err(PeerUpdateError::with_description(code, description).into())
        }
        Some(_) => Err(PeerUpdateError::new(HANDSHAKE_ERROR).into()),
        None => Err(Error::EmptyResponse),
    }
}

async fn dial(socket: Socket, options: ConnectionOptions, mut commands: UnboundedReceiver<Command>) {
    let mut first = None;
    if !options.auto_connect {
        // lazy dial: wait for the first queued frame
        match commands.recv().await {
            Some(Command::Frame(frame)) => first = Some(frame),
            _ => return,
        }
    }

    let address = options.address();
    let dialing = handshake(address, &options.query);
    let (sender, receiver) = match tokio::time::timeout(options.connect_timeout, dialing).await {
        Ok(Ok(session)) => session,
        Ok(Err(Error::PeerUpdate(rejection))) => {
            let reason = rejection.to_string();
            socket.raise(SocketEventKind::ConnectAbort { code: rejection.code, reason: reason.clone() });
            socket.hang_up(rejection.code, &reason);
            return;
        }
        Ok(Err(err)) => {
            socket.raise(SocketEventKind::Error(format!("{:?}", err)));
            socket.hang_up(ABNORMAL_CLOSURE, "Failed to connect");
            return;
        }
        Err(_) => {
            socket.raise(SocketEventKind::Error(format!("connect timeout to {}", address)));
            socket.hang_up(ABNORMAL_CLOSURE, "Connect timeout");
            return;
        }
    };

    if socket.is_closed() {
        trace!("[socket {}] closed while dialing {}", socket.id(), address);
        return;
    }
    socket.raise(SocketEventKind::Connect);
    pump(socket, sender, receiver, commands, first).await
}

fn fail(socket: &Socket, err: Error) {
    debug!("[socket {}] transport error: {:?}", socket.id(), err);
    socket.raise(SocketEventKind::Error(format!("{:?}", err)));
    socket.hang_up(ABNORMAL_CLOSURE, "Transport error");
}

async fn pump(
    socket: Socket,
    mut sender: Sender<Frame>,
    mut receiver: Receiver<Frame>,
    mut commands: UnboundedReceiver<Command>,
    first: Option<Frame>,
) {
    if let Some(frame) = first {
        if let Err(err) = sender.send(frame).await {
            return fail(&socket, err);
        }
    }
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Frame(frame)) => {
                    if let Err(err) = sender.send(frame).await {
                        return fail(&socket, err);
                    }
                }
                Some(Command::Close { code, reason }) => {
                    let _ = sender.send(Frame::Close { code, reason }).await;
                    return;
                }
                None => return,
            },
            frame = receiver.recv() => match frame {
                Ok(Some(Frame::Close { code, reason })) => {
                    return socket.hang_up(code, &reason);
                }
                Ok(Some(frame)) => socket.deliver(frame),
                Ok(None) => {
                    return socket.hang_up(ABNORMAL_CLOSURE, "Socket hung up");
                }
                Err(err) => return fail(&socket, err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::failure_codes::INCOMPATIBLE_NETWORK;
    use crate::peer::{test_headers, PeerAddress};
    use crate::socket::{IncomingCall, Payload, RemoteError, CLIENT_TIMEOUT, POOL_TIMEOUT};
    use crate::transport::testing::{GetEvents, Recorder};

    use actix::{Actor, Context, Handler};
    use tokio::net::TcpListener;

    struct Echo;

    impl Actor for Echo {
        type Context = Context<Self>;
    }

    impl Handler<IncomingCall> for Echo {
        type Result = std::result::Result<Payload, RemoteError>;

        fn handle(&mut self, msg: IncomingCall, _ctx: &mut Context<Self>) -> Self::Result {
            Ok(msg.data)
        }
    }

    async fn wait_for(socket: &Socket, lifecycle: LifecycleState) {
        for _ in 0..200 {
            if socket.lifecycle() == lifecycle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("socket never reached {:?}", lifecycle);
    }

    #[actix_rt::test]
    async fn test_dial_and_call() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let echo = Echo.start();

        let server = tokio::spawn(async move {
            let (mut sender, mut receiver, remote) =
                channel::accept::<Frame, Frame>(&listener).await.unwrap();
            let headers = match receiver.recv().await.unwrap() {
                Some(Frame::Handshake(headers)) => headers,
                other => panic!("unexpected frame: {:?}", other),
            };
            sender.send(Frame::HandshakeAck).await.unwrap();
            let peer = PeerObject::from_headers(remote.ip(), &headers);
            let (socket, session) = inbound(sender, receiver, peer, POOL_TIMEOUT);
            socket.upgrade();
            socket.serve(echo.recipient());
            session.await;
            socket
        });

        let headers = test_headers("ABCDEFGHijklmn01", 5000);
        let peer = PeerAddress::new(address.ip(), address.port());
        let options = ConnectionOptions::for_pool(&peer, &headers, POOL_TIMEOUT);
        let socket = TcpTransport.connect(options);
        assert!(socket.is_outbound());
        socket.upgrade();

        let reply = socket.call("echo", vec![4, 2]).await.unwrap();
        assert_eq!(reply, vec![4, 2]);
        assert!(socket.is_open());

        socket.disconnect(4000, "bye");
        let inbound = server.await.unwrap();
        assert!(inbound.is_closed());
        assert_eq!(inbound.peer_object().unwrap().nonce, headers.nonce);
    }

    #[actix_rt::test]
    async fn test_lazy_dial_waits_for_first_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let headers = test_headers("ABCDEFGHijklmn01", 5000);
        let peer = PeerAddress::new(address.ip(), address.port());
        let options = ConnectionOptions::for_client(&peer, &headers, CLIENT_TIMEOUT);
        let socket = TcpTransport.connect(options);
        socket.upgrade();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(socket.lifecycle(), LifecycleState::Connecting);

        socket.emit("blocks", vec![1]).unwrap();
        let (mut sender, mut receiver, _) = channel::accept::<Frame, Frame>(&listener).await.unwrap();
        assert!(matches!(receiver.recv().await.unwrap(), Some(Frame::Handshake(_))));
        sender.send(Frame::HandshakeAck).await.unwrap();
        match receiver.recv().await.unwrap() {
            Some(Frame::Emit { event, data }) => {
                assert_eq!(event, "blocks");
                assert_eq!(data, vec![1]);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        wait_for(&socket, LifecycleState::Open).await;
    }

    #[actix_rt::test]
    async fn test_rejected_handshake_aborts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sender, mut receiver, _) =
                channel::accept::<Frame, Frame>(&listener).await.unwrap();
            let _ = receiver.recv().await.unwrap();
            sender
                .send(Frame::HandshakeReject {
                    code: INCOMPATIBLE_NETWORK,
                    description: "Expected nethash: abc".to_owned(),
                })
                .await
                .unwrap();
        });

        let recorder = Recorder::default().start();
        let headers = test_headers("ABCDEFGHijklmn01", 5000);
        let peer = PeerAddress::new(address.ip(), address.port());
        let socket = TcpTransport.connect(ConnectionOptions::for_pool(&peer, &headers, POOL_TIMEOUT));
        socket.subscribe("recorder", recorder.clone().recipient());

        server.await.unwrap();
        wait_for(&socket, LifecycleState::Closed).await;

        let events = recorder.send(GetEvents).await.unwrap();
        match events.as_slice() {
            [SocketEventKind::ConnectAbort { code, .. }, SocketEventKind::Close { code: close_code, .. }] =>
            {
                assert_eq!(*code, INCOMPATIBLE_NETWORK);
                assert_eq!(*close_code, INCOMPATIBLE_NETWORK);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_unreachable_peer_closes() {
        // bind then drop, so nothing listens on the port
        let address = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let headers = test_headers("ABCDEFGHijklmn01", 5000);
        let peer = PeerAddress::new(address.ip(), address.port());
        let socket = TcpTransport.connect(ConnectionOptions::for_pool(&peer, &headers, POOL_TIMEOUT));
        wait_for(&socket, LifecycleState::Closed).await;
    }
}
