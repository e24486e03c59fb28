use crate::failure_codes::on_master::insert::{NONCE_EXISTS, NOT_ACCEPTED};
use crate::failure_codes::on_master::update::INVALID_PEER;
use crate::failure_codes::{error_message, PeerUpdateError, ALREADY_ADDED, ALREADY_REMOVED, DIFFERENT_CONN_ID};
use crate::peer::PeerObject;
use crate::socket::{Socket, SocketId};
use crate::update::PeersUpdateRules;
use crate::Result;

use actix::{Actor, ActorFutureExt, AsyncContext, Context, Handler, ResponseActFuture, WrapFuture};
use colored::Colorize;
use tracing::{debug, error, info};

use std::collections::HashMap;
use std::time::Duration;

/// Interval of the registry state dump.
pub const DEBUG_INTERVAL: Duration = Duration::from_secs(5);

/// Master rejections after which a local registration is rolled back.
const ROLLBACK_CODES: [u16; 3] = [INVALID_PEER, NOT_ACCEPTED, NONCE_EXISTS];

/// The worker's `address -> socket` registry, mirrored to the master.
pub struct Connections {
    rules: PeersUpdateRules,
    connections: HashMap<String, Socket>,
}

impl Connections {
    pub fn new(rules: PeersUpdateRules) -> Self {
        Connections { rules, connections: HashMap::default() }
    }

    fn rollback(&mut self, address: &str, socket: &Socket, code: u16) {
        let registered = self.connections.get(address).map_or(false, |current| current.id() == socket.id());
        if registered {
            let _ = self.connections.remove(address);
            info!("[connections] rolled back {} after rejection {}", address, code);
            socket.disconnect(code, error_message(code));
        }
    }

    fn dump(&self) {
        let entries: Vec<String> = self
            .connections
            .iter()
            .map(|(address, socket)| format!("{} -> {}", address, socket.id()))
            .collect();
        debug!("[connections] {} registered: {:?}", entries.len(), entries);
    }
}

impl Actor for Connections {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        let _ = ctx.run_interval(DEBUG_INTERVAL, |act, _ctx| act.dump());
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct Insert {
    pub peer: PeerObject,
    pub socket: Socket,
}

impl Handler<Insert> for Connections {
    type Result = ResponseActFuture<Self, Result<()>>;

    fn handle(&mut self, msg: Insert, _ctx: &mut Context<Self>) -> Self::Result {
        let Insert { peer, socket } = msg;
        let address = peer.string();
        if self.connections.contains_key(&address) {
            info!("[connections] insert discarded, socket already exists - {}", address);
            let failure: Result<()> = Err(PeerUpdateError::new(ALREADY_ADDED).into());
            return Box::pin(actix::fut::ready(failure));
        }
        let _ = self.connections.insert(address.clone(), socket.clone());

        let update = self.rules.insert_on_master(peer);
        Box::pin(update.into_actor(self).map(move |result, act, _ctx| {
            match &result {
                Ok(()) => info!("[connections] insert peer {} - {}", address, "success".green()),
                Err(err) => {
                    error!("[connections] peer {} insert error: {}", address, err);
                    if let Some(code) = err.code() {
                        if ROLLBACK_CODES.contains(&code) {
                            act.rollback(&address, &socket, code);
                        }
                    }
                }
            }
            result
        }))
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct Remove {
    pub peer: PeerObject,
    /// Only remove the entry while it still holds this socket.
    pub socket_id: Option<SocketId>,
}

impl Handler<Remove> for Connections {
    type Result = ResponseActFuture<Self, Result<()>>;

    fn handle(&mut self, msg: Remove, _ctx: &mut Context<Self>) -> Self::Result {
        let Remove { peer, socket_id } = msg;
        let address = peer.string();
        match self.connections.get(&address) {
            None => {
                info!("[connections] remove discarded, socket does not exist - {}", address);
                let failure: Result<()> = Err(PeerUpdateError::new(ALREADY_REMOVED).into());
                return Box::pin(actix::fut::ready(failure));
            }
            Some(current) if socket_id.map_or(false, |id| id != current.id()) => {
                debug!("[connections] remove discarded, {} holds another socket", address);
                let failure: Result<()> = Err(PeerUpdateError::new(DIFFERENT_CONN_ID).into());
                return Box::pin(actix::fut::ready(failure));
            }
            Some(_) => (),
        }
        let _ = self.connections.remove(&address);

        let update = self.rules.remove_on_master(peer);
        Box::pin(update.into_actor(self).map(move |result, _act, _ctx| {
            match &result {
                Ok(()) => info!("[connections] remove peer {} - {}", address, "success".green()),
                Err(err) => error!("[connections] peer {} remove error: {}", address, err),
            }
            result
        }))
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Option<Socket>")]
pub struct GetConnection {
    pub address: String,
}

impl Handler<GetConnection> for Connections {
    type Result = Option<Socket>;

    fn handle(&mut self, msg: GetConnection, _ctx: &mut Context<Self>) -> Self::Result {
        self.connections.get(&msg.address).cloned()
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct IsConnected {
    pub address: String,
}

impl Handler<IsConnected> for Connections {
    type Result = bool;

    fn handle(&mut self, msg: IsConnected, _ctx: &mut Context<Self>) -> Self::Result {
        self.connections.contains_key(&msg.address)
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Vec<(String, SocketId)>")]
pub struct Snapshot;

impl Handler<Snapshot> for Connections {
    type Result = Vec<(String, SocketId)>;

    fn handle(&mut self, _msg: Snapshot, _ctx: &mut Context<Self>) -> Self::Result {
        let mut snapshot: Vec<(String, SocketId)> = self
            .connections
            .iter()
            .map(|(address, socket)| (address.clone(), socket.id()))
            .collect();
        snapshot.sort();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::failure_codes::on_master::update::TRANSPORT;
    use crate::peer::{Nonce, PeerState};
    use crate::socket::{Direction, LifecycleState};
    use crate::transport::testing::mock_socket;
    use crate::update::{RecordingChannel, UpdateOperation};

    use std::sync::Arc;

    fn peer() -> PeerObject {
        PeerObject::new(Nonce::from("ABCDEFGHijklmn01"), "10.0.0.1:5001".parse().unwrap())
    }

    #[actix_rt::test]
    async fn test_insert_registers_and_confirms() {
        let channel = Arc::new(RecordingChannel::default());
        let connections = Connections::new(PeersUpdateRules::new(channel.clone(), 1)).start();
        let (socket, _) = mock_socket(Direction::Inbound, LifecycleState::Open);

        connections.send(Insert { peer: peer(), socket: socket.clone() }).await.unwrap().unwrap();

        let snapshot = connections.send(Snapshot).await.unwrap();
        assert_eq!(snapshot, vec![("10.0.0.1:5001".to_owned(), socket.id())]);
        assert!(connections.send(IsConnected { address: "10.0.0.1:5001".to_owned() }).await.unwrap());
        let requests = channel.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operation, UpdateOperation::Insert);
        assert_eq!(requests[0].peer.state, PeerState::Connected);
    }

    #[actix_rt::test]
    async fn test_duplicate_insert_is_rejected() {
        let channel = Arc::new(RecordingChannel::default());
        let connections = Connections::new(PeersUpdateRules::new(channel.clone(), 1)).start();
        let (first, _) = mock_socket(Direction::Inbound, LifecycleState::Open);
        let (second, _) = mock_socket(Direction::Outbound, LifecycleState::Open);

        connections.send(Insert { peer: peer(), socket: first.clone() }).await.unwrap().unwrap();
        let result = connections.send(Insert { peer: peer(), socket: second.clone() }).await.unwrap();
        assert_eq!(result.unwrap_err().code(), Some(ALREADY_ADDED));

        let snapshot = connections.send(Snapshot).await.unwrap();
        assert_eq!(snapshot, vec![("10.0.0.1:5001".to_owned(), first.id())]);
        assert_eq!(channel.requests.lock().unwrap().len(), 1);
        assert!(!second.is_closed());
    }

    #[actix_rt::test]
    async fn test_rejected_insert_is_rolled_back() {
        let channel = Arc::new(RecordingChannel::default());
        *channel.reply.lock().unwrap() = Some(PeerUpdateError::new(NONCE_EXISTS));
        let connections = Connections::new(PeersUpdateRules::new(channel, 1)).start();
        let (socket, driver) = mock_socket(Direction::Inbound, LifecycleState::Open);

        let result = connections.send(Insert { peer: peer(), socket: socket.clone() }).await.unwrap();
        assert_eq!(result.unwrap_err().code(), Some(NONCE_EXISTS));
        assert!(connections.send(Snapshot).await.unwrap().is_empty());
        assert!(socket.is_closed());
        assert_eq!(driver.closed()[0].0, NONCE_EXISTS);
    }

    #[actix_rt::test]
    async fn test_transport_failure_keeps_entry() {
        let channel = Arc::new(RecordingChannel { broken: true, ..Default::default() });
        let connections = Connections::new(PeersUpdateRules::new(channel, 1)).start();
        let (socket, _) = mock_socket(Direction::Inbound, LifecycleState::Open);

        let result = connections.send(Insert { peer: peer(), socket: socket.clone() }).await.unwrap();
        assert_eq!(result.unwrap_err().code(), Some(TRANSPORT));
        assert_eq!(connections.send(Snapshot).await.unwrap().len(), 1);
        assert!(!socket.is_closed());
    }

    #[actix_rt::test]
    async fn test_remove() {
        let channel = Arc::new(RecordingChannel::default());
        let connections = Connections::new(PeersUpdateRules::new(channel.clone(), 1)).start();
        let (socket, _) = mock_socket(Direction::Inbound, LifecycleState::Open);

        let missing = connections.send(Remove { peer: peer(), socket_id: None }).await.unwrap();
        assert_eq!(missing.unwrap_err().code(), Some(ALREADY_REMOVED));

        connections.send(Insert { peer: peer(), socket: socket.clone() }).await.unwrap().unwrap();
        let (other, _) = mock_socket(Direction::Outbound, LifecycleState::Open);
        let stale = connections.send(Remove { peer: peer(), socket_id: Some(other.id()) }).await.unwrap();
        assert_eq!(stale.unwrap_err().code(), Some(DIFFERENT_CONN_ID));

        connections.send(Remove { peer: peer(), socket_id: Some(socket.id()) }).await.unwrap().unwrap();
        assert!(connections.send(Snapshot).await.unwrap().is_empty());
        let requests = channel.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].operation, UpdateOperation::Remove);
    }

    #[actix_rt::test]
    async fn test_get_connection() {
        let channel = Arc::new(RecordingChannel::default());
        let connections = Connections::new(PeersUpdateRules::new(channel, 1)).start();
        let (socket, _) = mock_socket(Direction::Inbound, LifecycleState::Open);
        connections.send(Insert { peer: peer(), socket: socket.clone() }).await.unwrap().unwrap();

        let found = connections.send(GetConnection { address: "10.0.0.1:5001".to_owned() }).await.unwrap();
        assert_eq!(found.unwrap().id(), socket.id());
        let missing = connections.send(GetConnection { address: "10.0.0.2:5001".to_owned() }).await.unwrap();
        assert!(missing.is_none());
    }
}
