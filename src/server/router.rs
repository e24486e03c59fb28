use crate::peer::SystemHeaders;
use crate::registry::IsConnected;
use crate::socket::{decode, encode, IncomingCall, Payload, RemoteError, PROCEDURE_NOT_FOUND};
use crate::update::{PeerData, PeerUpdateRequest, PeersUpdateRules};
use crate::{Error, Result};

use tracing::{debug, info, trace};

use actix::{Actor, Context, Handler, Recipient, ResponseFuture};

/// Procedure through which a peer re-confirms its own identity.
pub const UPDATE_MYSELF: &str = "updateMyself";
/// Procedure answering the worker's own headers.
pub const STATUS: &str = "status";

/// Serves the calls and events arriving on upgraded inbound and outbound sockets.
pub struct Router {
    worker_id: u32,
    system: SystemHeaders,
    rules: PeersUpdateRules,
    connections: Recipient<IsConnected>,
}

impl Router {
    pub fn new(
        worker_id: u32,
        system: SystemHeaders,
        rules: PeersUpdateRules,
        connections: Recipient<IsConnected>,
    ) -> Self {
        Router { worker_id, system, rules, connections }
    }
}

impl Actor for Router {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("router> started");
    }
}

fn remote_error(err: Error) -> RemoteError {
    match err.code() {
        Some(code) => RemoteError::with_code(code, err.to_string()),
        None => RemoteError::new(err.to_string()),
    }
}

impl Handler<IncomingCall> for Router {
    type Result = ResponseFuture<std::result::Result<Payload, RemoteError>>;

    fn handle(&mut self, msg: IncomingCall, _ctx: &mut Context<Self>) -> Self::Result {
        if !msg.expects_reply {
            trace!("routing event {} from socket {}", msg.procedure, msg.socket_id);
        }
        let worker_id = self.worker_id;
        let rules = self.rules.clone();
        let connections = self.connections.clone();
        let status = encode(&self.system);
        Box::pin(async move {
            let IncomingCall { socket_id, peer_object, procedure, data, .. } = msg;
            match procedure.as_str() {
                UPDATE_MYSELF => {
                    info!("routing {} -> PeersUpdateRules", UPDATE_MYSELF);
                    let result: Result<()> = async move {
                        let data: PeerData = decode(&data)?;
                        let request = PeerUpdateRequest {
                            peer_object,
                            socket_id: socket_id.to_string(),
                            worker_id,
                            data,
                        };
                        rules.external_update(request, connections).await
                    }
                    .await;
                    result.and_then(|()| encode(&())).map_err(remote_error)
                }
                STATUS => status.map_err(remote_error),
                procedure => {
                    debug!("received unknown procedure {}", procedure);
                    Err(RemoteError::new(PROCEDURE_NOT_FOUND))
                }
            }
        })
    }
}
