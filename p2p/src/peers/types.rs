use libp2p::{Multiaddr, PeerId};
use log::*;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

/// Where to dial a peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub peer_id: PeerId,
    pub address: Multiaddr,
}

impl PeerAddress {
    pub fn new(peer_id: PeerId, address: Multiaddr) -> Self {
        Self { peer_id, address }
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.peer_id, self.address)
    }
}

/// A peer found by discovery that we are not (necessarily) connected to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPeer {
    pub peer_id: PeerId,
    pub address: Multiaddr,
    /// Subnets the peer advertises to serve.
    pub subnets: BTreeSet<u64>,
}

impl DiscoveryPeer {
    pub fn new(peer_id: PeerId, address: Multiaddr, subnets: impl IntoIterator<Item = u64>) -> Self {
        Self { peer_id, address, subnets: subnets.into_iter().collect() }
    }

    pub fn to_address(&self) -> PeerAddress {
        PeerAddress::new(self.peer_id, self.address.clone())
    }
}

/// A connected peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub peer_id: PeerId,
    pub address: Multiaddr,
    pub subnets: BTreeSet<u64>,
}

impl Peer {
    pub fn new(peer_id: PeerId, address: Multiaddr, subnets: impl IntoIterator<Item = u64>) -> Self {
        Self { peer_id, address, subnets: subnets.into_iter().collect() }
    }
}

/// The network as seen by peer selection: who we are connected to right now.
pub trait P2PNetwork: Send + Sync {
    fn connected_peers(&self) -> Vec<Peer>;

    fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.connected_peers().iter().any(|p| &p.peer_id == peer_id)
    }

    fn peer_count(&self) -> usize {
        self.connected_peers().len()
    }
}

/// Why a peer is connected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerConnectionType {
    /// Configured by the operator. Never dropped to make room for others.
    Static,
    #[default]
    ScoreBased,
    RandomlySelected,
}

/// Connection type of every known peer. Peers that were never classified are [`PeerConnectionType::ScoreBased`].
#[derive(Debug, Default)]
pub struct PeerPools {
    pools: Mutex<HashMap<PeerId, PeerConnectionType>>,
}

impl PeerPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer_to_pool(&self, peer_id: PeerId, pool: PeerConnectionType) {
        if let Some(previous) = self.pools.lock().insert(peer_id, pool) {
            if previous != pool {
                debug!("Peer {peer_id} moved from {previous:?} to {pool:?}");
            }
        }
    }

    pub fn forget_peer(&self, peer_id: &PeerId) {
        self.pools.lock().remove(peer_id);
    }

    pub fn pool_for(&self, peer_id: &PeerId) -> PeerConnectionType {
        self.pools.lock().get(peer_id).copied().unwrap_or_default()
    }

    pub fn count(&self, pool: PeerConnectionType) -> usize {
        self.pools.lock().values().filter(|p| **p == pool).count()
    }
}
