use super::{ChannelRequest, UpdateAck, UpdateRequest};
use crate::channel::{self, Receiver, Sender};
use crate::transport::SafeFuture;
use crate::{Error, Result};

use actix::Recipient;
use tokio::sync::Mutex;
use tracing::debug;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Carries update requests from a worker to the master.
pub trait UpdateChannel: Send + Sync {
    fn send(&self, request: UpdateRequest) -> SafeFuture<Result<UpdateAck>>;
}

/// Delivers requests to a master actor in the same process.
pub struct ActorChannel {
    master: Recipient<UpdateRequest>,
}

impl ActorChannel {
    pub fn new(master: Recipient<UpdateRequest>) -> Self {
        ActorChannel { master }
    }
}

impl UpdateChannel for ActorChannel {
    fn send(&self, request: UpdateRequest) -> SafeFuture<Result<UpdateAck>> {
        let response = self.master.send(request);
        Box::pin(async move { Ok(response.await?) })
    }
}

type Connection = (Sender<ChannelRequest>, Receiver<UpdateAck>);

/// A framed TCP connection to the master's control listener, opened on first use and
/// dropped after any failure.
pub struct TcpChannel {
    master: SocketAddr,
    timeout: Duration,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl TcpChannel {
    pub fn new(master: SocketAddr, timeout: Duration) -> Self {
        TcpChannel { master, timeout, connection: Arc::new(Mutex::new(None)) }
    }
}

async fn exchange(
    connection: &mut Option<Connection>,
    master: SocketAddr,
    request: UpdateRequest,
) -> Result<UpdateAck> {
    if connection.is_none() {
        *connection = Some(channel::connect(&master).await?);
    }
    let (sender, receiver) = match connection.as_mut() {
        Some(connection) => connection,
        None => return Err(Error::ChannelError(format!("no connection to master {}", master))),
    };
    sender.send(ChannelRequest::update_peer(request)).await?;
    match receiver.recv().await? {
        Some(ack) => Ok(ack),
        None => Err(Error::ChannelError(format!("master {} closed the channel", master))),
    }
}

impl UpdateChannel for TcpChannel {
    fn send(&self, request: UpdateRequest) -> SafeFuture<Result<UpdateAck>> {
        let connection = self.connection.clone();
        let master = self.master;
        let timeout = self.timeout;
        Box::pin(async move {
            // one request in flight per connection keeps acks in order
            let mut connection = connection.lock().await;
            let result = match tokio::time::timeout(timeout, exchange(&mut connection, master, request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            };
            if let Err(err) = &result {
                debug!("[channel] update request to master {} failed: {:?}", master, err);
                *connection = None;
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::peer::{Nonce, PeerObject};
    use crate::update::UpdateOperation;

    use tokio::net::TcpListener;

    fn request() -> UpdateRequest {
        let peer = PeerObject::new(Nonce::from("ABCDEFGHijklmn01"), "10.0.0.1:5001".parse().unwrap());
        UpdateRequest::new(UpdateOperation::Insert, peer, 3)
    }

    #[actix_rt::test]
    async fn test_tcp_channel_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let master = tokio::spawn(async move {
            let (mut sender, mut receiver, _) =
                channel::accept::<ChannelRequest, UpdateAck>(&listener).await.unwrap();
            for _ in 0..2 {
                let request = receiver.recv().await.unwrap().unwrap();
                assert_eq!(request.method, "updatePeer");
                assert_eq!(request.args.worker_id, 3);
                sender.send(UpdateAck::ok()).await.unwrap();
            }
        });

        let channel = TcpChannel::new(address, Duration::from_secs(2));
        assert_eq!(channel.send(request()).await.unwrap(), UpdateAck::ok());
        // the connection is reused
        assert_eq!(channel.send(request()).await.unwrap(), UpdateAck::ok());
        master.await.unwrap();
    }

    #[actix_rt::test]
    async fn test_tcp_channel_unreachable_master() {
        let address = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let channel = TcpChannel::new(address, Duration::from_secs(2));
        let result = channel.send(request()).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), None);
    }
}
