use super::PeersList;
use crate::channel::{self, Receiver, Sender};
use crate::failure_codes::{on_master::update::TRANSPORT, PeerUpdateError};
use crate::update::{ChannelRequest, UpdateAck, UPDATE_PEER};
use crate::Result;

use actix::Addr;
use colored::Colorize;
use tracing::{debug, info, warn};

use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Accepts update channels from workers and applies their requests to the peers list.
pub struct MasterServer {
    /// The control address which this server binds to.
    ip: SocketAddr,
    peers_list: Addr<PeersList>,
}

impl MasterServer {
    pub fn new(ip: SocketAddr, peers_list: Addr<PeersList>) -> MasterServer {
        MasterServer { ip, peers_list }
    }

    pub async fn listen(self) -> Result<()> {
        let listener = TcpListener::bind(self.ip).await?;
        info!("[master] listening for workers on {}", self.ip.to_string().green());
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (sender, receiver, worker) = channel::accept::<ChannelRequest, UpdateAck>(&listener).await?;
            debug!("[master] worker channel opened from {}", worker);
            let peers_list = self.peers_list.clone();
            tokio::spawn(async move {
                match handle_worker(sender, receiver, peers_list).await {
                    Ok(()) => debug!("[master] worker channel from {} closed", worker),
                    Err(err) => warn!("[master] worker channel from {} failed: {:?}", worker, err),
                }
            });
        }
    }
}

/// Answers every request of one worker channel, in order, until the worker hangs up.
async fn handle_worker(
    mut sender: Sender<UpdateAck>,
    mut receiver: Receiver<ChannelRequest>,
    peers_list: Addr<PeersList>,
) -> Result<()> {
    while let Some(request) = receiver.recv().await? {
        let ack = if request.method == UPDATE_PEER {
            peers_list.send(request.args).await?
        } else {
            UpdateAck::failed(PeerUpdateError::with_description(
                TRANSPORT,
                format!("unknown method {}", request.method),
            ))
        };
        sender.send(ack).await?;
    }
    Ok(())
}
