use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::client::Client;
use crate::master::{MasterServer, PeersList};
use crate::peer::{PeerAddress, PeerObject, SystemHeaders};
use crate::pool::{AddPeer, PeerConnectionPool, PeerRecord};
use crate::registry::{Connect, Connections};
use crate::server::{Router, Server, Settings};
use crate::transport::{tcp::TcpTransport, Transport};
use crate::update::{PeersUpdateRules, TcpChannel};
use crate::{Error, Result};
use actix::{Actor, Addr};
use colored::Colorize;
use tracing::{error, info};

fn parse_address(address: &str) -> Result<SocketAddr> {
    address.parse().map_err(|_| Error::PeerParseError)
}

/// The actors of a running worker.
pub struct Worker {
    pub system: SystemHeaders,
    pub pool: Addr<PeerConnectionPool>,
    pub connections: Addr<Connections>,
    pub connect: Addr<Connect>,
    pub client: Addr<Client>,
    pub router: Addr<Router>,
}

/// Starts the peers list and its control listener. Must run inside an actix system.
pub fn run_master(settings: &Settings) -> Result<Addr<PeersList>> {
    let control = parse_address(&settings.master_ip)?;
    let blacklist = settings
        .blacklist
        .iter()
        .map(|ip| ip.parse::<IpAddr>().map_err(|_| Error::PeerParseError))
        .collect::<Result<HashSet<IpAddr>>>()?;
    let frozen = settings
        .frozen_peers
        .iter()
        .map(|address| address.parse::<PeerAddress>().map(|address| address.to_string()))
        .collect::<Result<HashSet<String>>>()?;

    let nonce = settings.nonce();
    info!("Master {} is starting", nonce.to_string().cyan());
    let peers_list = PeersList::new(nonce, blacklist, frozen).start();

    let server = MasterServer::new(control, peers_list.clone());
    actix::spawn(async move {
        if let Err(err) = server.listen().await {
            error!("[master] control listener failed: {:?}", err);
        }
    });
    Ok(peers_list)
}

/// Wires the worker actors, submits the seed peers and starts the peer listener.
/// Must run inside an actix system.
pub fn run_worker(settings: &Settings) -> Result<Worker> {
    let listener_ip = parse_address(&settings.listener_ip)?;
    let master_ip = parse_address(&settings.master_ip)?;
    let seeds = settings
        .seed_peers
        .iter()
        .map(|seed| seed.parse::<PeerObject>())
        .collect::<Result<Vec<PeerObject>>>()?;

    let mut system = SystemHeaders::new(
        settings.version.clone(),
        settings.min_version.clone(),
        settings.nethash.clone(),
        listener_ip.port(),
        settings.http_port,
    );
    system.nonce = settings.nonce();
    system.validate().map_err(Error::Validation)?;
    info!("Worker {} ({}) is starting", settings.worker_id, system.nonce.to_string().cyan());

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
    let channel = Arc::new(TcpChannel::new(master_ip, settings.pool_timeout()));
    let rules = PeersUpdateRules::new(channel, settings.worker_id);

    let connections = Connections::new(rules.clone()).start();
    let router =
        Router::new(settings.worker_id, system.clone(), rules, connections.clone().recipient()).start();
    let connect = Connect::new(connections.clone(), Some(router.clone().recipient())).start();
    let pool = PeerConnectionPool::new(system.clone(), transport.clone(), settings.pool_timeout())
        .with_registrar(connect.clone().recipient())
        .start();
    let client = Client::new(
        system.clone(),
        transport,
        connections.clone(),
        connect.clone().recipient(),
        settings.client_timeout(),
    )
    .start();

    for seed in seeds {
        info!("seeding peer {} at {}", seed.nonce, seed.string());
        pool.do_send(AddPeer(PeerRecord::outbound(seed)));
    }

    let server = Server::new(
        listener_ip,
        system.clone(),
        settings.pool_timeout(),
        connect.clone().recipient(),
        pool.clone().recipient(),
    );
    actix::spawn(async move {
        if let Err(err) = server.listen().await {
            error!("peer listener failed: {:?}", err);
        }
    });

    Ok(Worker { system, pool, connections, connect, client, router })
}
