use crate::failure_codes::on_master::insert::{NONCE_EXISTS, NOT_ACCEPTED};
use crate::failure_codes::on_master::remove::FROZEN_PEER;
use crate::failure_codes::on_master::update::{CHECK_PRESENCE, INVALID_PEER};
use crate::failure_codes::PeerUpdateError;
use crate::peer::{Nonce, PeerObject, PeerState};
use crate::update::{UpdateAck, UpdateOperation, UpdateRequest};

use actix::{Actor, Context, Handler};
use colored::Colorize;
use tracing::{debug, info, warn};

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// A peer as recorded by the master, with the worker that registered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterPeer {
    pub peer: PeerObject,
    pub worker_id: u32,
}

/// The authoritative `address -> peer` list, shared by every worker through
/// update requests.
pub struct PeersList {
    nonce: Nonce,
    blacklist: HashSet<IpAddr>,
    /// Addresses of configured seeds, which are never deleted.
    frozen: HashSet<String>,
    peers: HashMap<String, MasterPeer>,
    nonces: HashMap<Nonce, String>,
}

impl PeersList {
    pub fn new(nonce: Nonce, blacklist: HashSet<IpAddr>, frozen: HashSet<String>) -> Self {
        PeersList { nonce, blacklist, frozen, peers: HashMap::default(), nonces: HashMap::default() }
    }

    fn is_accepted(&self, peer: &PeerObject) -> bool {
        !self.blacklist.contains(&peer.ip) && peer.state != PeerState::Banned && peer.nonce != self.nonce
    }

    pub fn insert(&mut self, mut peer: PeerObject, worker_id: u32) -> Result<(), PeerUpdateError> {
        if peer.ip.is_unspecified() || peer.ws_port == 0 {
            return Err(PeerUpdateError::with_description(INVALID_PEER, peer.string()));
        }
        if !self.is_accepted(&peer) {
            return Err(PeerUpdateError::new(NOT_ACCEPTED));
        }

        let address = peer.string();
        if let Some(registered) = self.nonces.get(&peer.nonce) {
            if *registered != address {
                return Err(PeerUpdateError::with_description(
                    NONCE_EXISTS,
                    format!("nonce {} is registered at {}", peer.nonce, registered),
                ));
            }
        }

        // the address may change hands when a node restarts with a new nonce
        if let Some(previous) = self.peers.get(&address) {
            if previous.peer.nonce != peer.nonce {
                let _ = self.nonces.remove(&previous.peer.nonce);
            }
        }

        peer.state = PeerState::Connected;
        let _ = self.nonces.insert(peer.nonce.clone(), address.clone());
        let _ = self.peers.insert(address, MasterPeer { peer, worker_id });
        Ok(())
    }

    pub fn remove(&mut self, peer: &PeerObject) -> Result<(), PeerUpdateError> {
        let address = peer.string();
        let entry = match self.peers.get_mut(&address) {
            Some(entry) => entry,
            None => return Err(PeerUpdateError::with_description(CHECK_PRESENCE, address)),
        };
        if self.frozen.contains(&address) {
            entry.peer.state = PeerState::Disconnected;
            return Err(PeerUpdateError::with_description(FROZEN_PEER, address));
        }
        if let Some(removed) = self.peers.remove(&address) {
            let _ = self.nonces.remove(&removed.peer.nonce);
        }
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&MasterPeer> {
        self.peers.get(address)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Actor for PeersList {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("[master] peers list started, {} frozen", self.frozen.len());
    }
}

impl Handler<UpdateRequest> for PeersList {
    type Result = UpdateAck;

    fn handle(&mut self, msg: UpdateRequest, _ctx: &mut Context<Self>) -> Self::Result {
        let address = msg.peer.string();
        let result = match msg.operation {
            UpdateOperation::Insert => self.insert(msg.peer, msg.worker_id),
            UpdateOperation::Remove => self.remove(&msg.peer),
        };
        match &result {
            Ok(()) => info!(
                "[master] {:?} {} from worker {} ({} peers)",
                msg.operation,
                address.cyan(),
                msg.worker_id,
                self.peers.len()
            ),
            Err(err) => warn!("[master] {:?} {} from worker {} failed: {}", msg.operation, address, msg.worker_id, err),
        }
        UpdateAck::from(result)
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Vec<MasterPeer>")]
pub struct GetPeers;

impl Handler<GetPeers> for PeersList {
    type Result = Vec<MasterPeer>;

    fn handle(&mut self, _msg: GetPeers, _ctx: &mut Context<Self>) -> Self::Result {
        let mut peers: Vec<MasterPeer> = self.peers.values().cloned().collect();
        peers.sort_by_key(|entry| entry.peer.string());
        peers
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Option<MasterPeer>")]
pub struct GetPeer {
    pub address: String,
}

impl Handler<GetPeer> for PeersList {
    type Result = Option<MasterPeer>;

    fn handle(&mut self, msg: GetPeer, _ctx: &mut Context<Self>) -> Self::Result {
        self.get(&msg.address).cloned()
    }
}
