use super::{PeerUpdateRequest, UpdateAck, UpdateChannel, UpdateOperation, UpdateRequest};
use crate::failure_codes::{on_master::update::TRANSPORT, PeerUpdateError};
use crate::peer::{PeerObject, PeerState};
use crate::registry::IsConnected;
use crate::transport::SafeFuture;
use crate::{Error, Result};

use actix::Recipient;
use tracing::{debug, error};

use std::sync::Arc;

/// The only path through which a worker mutates the master's peers list.
#[derive(Clone)]
pub struct PeersUpdateRules {
    channel: Arc<dyn UpdateChannel>,
    worker_id: u32,
}

/// Errors without a failure code become `TRANSPORT` failures.
fn transport_failure(err: Error) -> Error {
    match err.code() {
        Some(_) => err,
        None => PeerUpdateError::with_description(TRANSPORT, err.to_string()).into(),
    }
}

impl PeersUpdateRules {
    pub fn new(channel: Arc<dyn UpdateChannel>, worker_id: u32) -> Self {
        PeersUpdateRules { channel, worker_id }
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn insert_on_master(&self, mut peer: PeerObject) -> SafeFuture<Result<()>> {
        peer.state = PeerState::Connected;
        self.send_to_master(UpdateOperation::Insert, peer)
    }

    pub fn remove_on_master(&self, peer: PeerObject) -> SafeFuture<Result<()>> {
        self.send_to_master(UpdateOperation::Remove, peer)
    }

    fn send_to_master(&self, operation: UpdateOperation, peer: PeerObject) -> SafeFuture<Result<()>> {
        let request = UpdateRequest::new(operation, peer, self.worker_id);
        let response = self.channel.send(request);
        Box::pin(async move {
            match response.await {
                Ok(UpdateAck { error: None }) => Ok(()),
                Ok(UpdateAck { error: Some(err) }) => Err(Error::PeerUpdate(err)),
                Err(err) => Err(transport_failure(err)),
            }
        })
    }

    /// Re-confirms the identity of a peer over its own, already admitted, socket.
    pub async fn external_update(
        &self,
        request: PeerUpdateRequest,
        connections: Recipient<IsConnected>,
    ) -> Result<()> {
        request.validate()?;

        let peer_object = match &request.peer_object {
            Some(peer_object) => peer_object,
            None => {
                error!("[update] external update called without a completed handshake");
                return Err(Error::MissingPeerObject);
            }
        };

        let address = peer_object.string();
        if !connections.send(IsConnected { address: address.clone() }).await? {
            debug!("[update] external update request called for non-existing connection {}", address);
            return Err(Error::ConnectionNotFound(address));
        }

        let peer = request.data.into_peer_object()?;
        self.send_to_master(UpdateOperation::Insert, peer).await
    }
}
