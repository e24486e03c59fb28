use super::{SocketDriver, Transport};
use crate::socket::{
    ConnectionOptions, Direction, Frame, LifecycleState, Socket, SocketEvent, SocketEventKind,
};
use crate::Result;

use actix::{Actor, Context, Handler};

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records frames and closes instead of touching the network.
#[derive(Default)]
pub struct MockDriver {
    sent: Mutex<Vec<Frame>>,
    closed: Mutex<Vec<(u16, String)>>,
}

impl MockDriver {
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}

impl SocketDriver for MockDriver {
    fn send(&self, frame: Frame) -> Result<()> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.closed.lock().unwrap().push((code, reason.to_owned()));
    }
}

pub fn mock_socket(direction: Direction, lifecycle: LifecycleState) -> (Socket, Arc<MockDriver>) {
    mock_socket_with_timeout(direction, lifecycle, Duration::from_secs(2))
}

pub fn mock_socket_with_timeout(
    direction: Direction,
    lifecycle: LifecycleState,
    ack_timeout: Duration,
) -> (Socket, Arc<MockDriver>) {
    let driver = Arc::new(MockDriver::default());
    let socket = Socket::new(direction, lifecycle, ack_timeout, driver.clone());
    (socket, driver)
}

/// Hands out mock outbound sockets and remembers every dial.
#[derive(Default)]
pub struct MockTransport {
    dialed: Mutex<Vec<(ConnectionOptions, Socket, Arc<MockDriver>)>>,
}

impl MockTransport {
    pub fn dialed(&self) -> Vec<(ConnectionOptions, Socket, Arc<MockDriver>)> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, options: ConnectionOptions) -> Socket {
        let (socket, driver) =
            mock_socket_with_timeout(Direction::Outbound, LifecycleState::Connecting, options.ack_timeout);
        self.dialed.lock().unwrap().push((options, socket.clone(), driver));
        socket
    }
}

/// Collects the lifecycle events it is subscribed to.
#[derive(Default)]
pub struct Recorder {
    events: Vec<SocketEventKind>,
}

impl Actor for Recorder {
    type Context = Context<Self>;
}

impl Handler<SocketEvent> for Recorder {
    type Result = ();

    fn handle(&mut self, msg: SocketEvent, _ctx: &mut Context<Self>) -> Self::Result {
        self.events.push(msg.kind);
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Vec<SocketEventKind>")]
pub struct GetEvents;

impl Handler<GetEvents> for Recorder {
    type Result = Vec<SocketEventKind>;

    fn handle(&mut self, _msg: GetEvents, _ctx: &mut Context<Self>) -> Self::Result {
        self.events.clone()
    }
}
