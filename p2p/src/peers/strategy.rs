use crate::errors::PeerSelectionError;
use crate::peers::types::{DiscoveryPeer, P2PNetwork, Peer, PeerAddress, PeerPools};
use log::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Decides which peers to dial and which connections to drop.
pub trait PeerSelectionStrategy: Send + Sync {
    /// `candidates` is only called by strategies that need discovery results, since collecting them can be costly.
    fn select_peers_to_connect(
        &self,
        network: &dyn P2PNetwork,
        pools: &PeerPools,
        candidates: &dyn Fn() -> Vec<DiscoveryPeer>,
    ) -> Vec<PeerAddress>;

    fn select_peers_to_disconnect(&self, network: &dyn P2PNetwork, pools: &PeerPools) -> Vec<Peer>;
}

impl<S: PeerSelectionStrategy + ?Sized> PeerSelectionStrategy for Arc<S> {
    fn select_peers_to_connect(
        &self,
        network: &dyn P2PNetwork,
        pools: &PeerPools,
        candidates: &dyn Fn() -> Vec<DiscoveryPeer>,
    ) -> Vec<PeerAddress> {
        (**self).select_peers_to_connect(network, pools, candidates)
    }

    fn select_peers_to_disconnect(&self, network: &dyn P2PNetwork, pools: &PeerPools) -> Vec<Peer> {
        (**self).select_peers_to_disconnect(network, pools)
    }
}

/// Combines independent strategies.
///
/// Every child proposes peers to connect to and the proposals are concatenated in child order, without
/// de-duplication. Disconnection is delegated to a single child per call, rotating through them, so that no two
/// policies prune the same connections in the same round.
pub struct CompositePeerSelectionStrategy {
    strategies: Vec<Arc<dyn PeerSelectionStrategy>>,
    next_disconnect: AtomicUsize,
}

impl CompositePeerSelectionStrategy {
    pub fn new(strategies: Vec<Arc<dyn PeerSelectionStrategy>>) -> Result<Self, PeerSelectionError> {
        if strategies.is_empty() {
            return Err(PeerSelectionError::NoStrategies);
        }
        Ok(Self { strategies, next_disconnect: AtomicUsize::new(0) })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl PeerSelectionStrategy for CompositePeerSelectionStrategy {
    fn select_peers_to_connect(
        &self,
        network: &dyn P2PNetwork,
        pools: &PeerPools,
        candidates: &dyn Fn() -> Vec<DiscoveryPeer>,
    ) -> Vec<PeerAddress> {
        self.strategies.iter().flat_map(|s| s.select_peers_to_connect(network, pools, candidates)).collect()
    }

    fn select_peers_to_disconnect(&self, network: &dyn P2PNetwork, pools: &PeerPools) -> Vec<Peer> {
        // wraps around on overflow, which at worst repeats one child
        let turn = self.next_disconnect.fetch_add(1, Ordering::Relaxed) % self.strategies.len();
        trace!("Strategy {turn} of {} selects peers to disconnect", self.strategies.len());
        self.strategies[turn].select_peers_to_disconnect(network, pools)
    }
}
