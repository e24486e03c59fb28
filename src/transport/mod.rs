//! The substrate that carries socket frames between peers.

pub mod tcp;
#[cfg(test)]
pub(crate) mod testing;

use crate::socket::{ConnectionOptions, Frame, Socket};
use crate::Result;

use std::future::Future;
use std::pin::Pin;

pub type SafeFuture<Out> = Pin<Box<dyn Future<Output = Out> + Send>>;

/// The transport half of one socket.
pub trait SocketDriver: Send + Sync {
    /// Queues a frame for the remote side.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Closes the session, sending a close frame when possible.
    fn close(&self, code: u16, reason: &str);
}

pub trait Transport: Send + Sync {
    /// Returns immediately with an outbound socket in `Connecting`. The outcome of the dial
    /// is reported through the socket's lifecycle events.
    fn connect(&self, options: ConnectionOptions) -> Socket;
}
