use crate::errors::PeerSelectionError;
use crate::peers::strategy::PeerSelectionStrategy;
use crate::peers::types::{DiscoveryPeer, P2PNetwork, Peer, PeerAddress, PeerConnectionType, PeerPools};
use libp2p::PeerId;
use log::*;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;
use std::sync::Arc;

/// How much we want a peer. Any mandatory peer outranks every optional one, whatever its score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScoreResult {
    pub mandatory: bool,
    pub score: u64,
}

impl ScoreResult {
    pub const ZERO: ScoreResult = ScoreResult { mandatory: false, score: 0 };

    pub fn mandatory(score: u64) -> Self {
        Self { mandatory: true, score }
    }

    pub fn optional(score: u64) -> Self {
        Self { mandatory: false, score }
    }
}

impl Add for ScoreResult {
    type Output = ScoreResult;

    fn add(self, other: ScoreResult) -> ScoreResult {
        ScoreResult { mandatory: self.mandatory || other.mandatory, score: self.score.saturating_add(other.score) }
    }
}

pub trait PeerScorer: Send + Sync {
    /// Score a peer serving `subnets`, given the subnets of every *other* connected peer.
    fn score(&self, subnets: &BTreeSet<u64>, others: &[&BTreeSet<u64>]) -> ScoreResult;
}

/// Rewards peers that serve the subnets of outstanding sampling queries.
///
/// Queries are counted per `(epoch, subnet)`. For every queried subnet a peer serves, it scores
/// * `(min - n)²` and becomes mandatory if fewer than `min` other peers serve that subnet,
/// * `target - n` if fewer than `target` do,
/// * nothing otherwise.
pub struct SubnetQueryScorer {
    min_peers_per_subnet: u64,
    target_peers_per_subnet: u64,
    queries: Mutex<BTreeMap<u64, BTreeMap<u64, u32>>>,
}

impl SubnetQueryScorer {
    pub fn new(min_peers_per_subnet: u64, target_peers_per_subnet: u64) -> Self {
        Self {
            min_peers_per_subnet,
            target_peers_per_subnet: target_peers_per_subnet.max(min_peers_per_subnet),
            queries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn add_query(&self, epoch: u64, subnet: u64) {
        *self.queries.lock().entry(epoch).or_default().entry(subnet).or_default() += 1;
    }

    /// Forget one query added with [`add_query`](Self::add_query).
    pub fn remove_query(&self, epoch: u64, subnet: u64) -> Result<(), PeerSelectionError> {
        let mut queries = self.queries.lock();
        let subnets = queries.get_mut(&epoch).ok_or(PeerSelectionError::UnknownQuery { epoch, subnet })?;
        let count = subnets.get_mut(&subnet).ok_or(PeerSelectionError::UnknownQuery { epoch, subnet })?;
        *count -= 1;
        if *count == 0 {
            subnets.remove(&subnet);
        }
        if subnets.is_empty() {
            queries.remove(&epoch);
        }
        Ok(())
    }

    /// Number of outstanding queries across all epochs.
    pub fn outstanding_queries(&self) -> u32 {
        self.queries.lock().values().flat_map(|subnets| subnets.values()).sum()
    }

    fn queried_subnets(&self) -> BTreeSet<u64> {
        self.queries.lock().values().flat_map(|subnets| subnets.keys().copied()).collect()
    }

    fn subnet_score(&self, serving_peers: u64) -> ScoreResult {
        if serving_peers < self.min_peers_per_subnet {
            let missing = self.min_peers_per_subnet - serving_peers;
            ScoreResult::mandatory(missing * missing)
        } else if serving_peers < self.target_peers_per_subnet {
            ScoreResult::optional(self.target_peers_per_subnet - serving_peers)
        } else {
            ScoreResult::ZERO
        }
    }
}

impl PeerScorer for SubnetQueryScorer {
    fn score(&self, subnets: &BTreeSet<u64>, others: &[&BTreeSet<u64>]) -> ScoreResult {
        self.queried_subnets()
            .into_iter()
            .filter(|subnet| subnets.contains(subnet))
            .map(|subnet| {
                let serving = others.iter().filter(|o| o.contains(&subnet)).count() as u64;
                self.subnet_score(serving)
            })
            .fold(ScoreResult::ZERO, Add::add)
    }
}

/// Connects to the best scoring candidates and drops the worst scoring connections.
///
/// Candidates are dialled until `target_peer_count` is reached; mandatory candidates may go beyond it, up to
/// `max_peer_count`. Above the target, the lowest scoring peers are disconnected. Static and mandatory peers are never
/// disconnected. Ties are broken randomly.
pub struct ScoringPeerSelectionStrategy {
    scorers: Vec<Arc<dyn PeerScorer>>,
    target_peer_count: usize,
    max_peer_count: usize,
}

impl ScoringPeerSelectionStrategy {
    pub fn new(scorers: Vec<Arc<dyn PeerScorer>>, target_peer_count: usize, max_peer_count: usize) -> Self {
        Self { scorers, target_peer_count, max_peer_count: max_peer_count.max(target_peer_count) }
    }

    pub fn score(&self, subnets: &BTreeSet<u64>, others: &[&BTreeSet<u64>]) -> ScoreResult {
        self.scorers.iter().map(|s| s.score(subnets, others)).fold(ScoreResult::ZERO, Add::add)
    }

    fn others<'a>(connected: &'a [Peer], except: Option<&PeerId>) -> Vec<&'a BTreeSet<u64>> {
        connected.iter().filter(|p| Some(&p.peer_id) != except).map(|p| &p.subnets).collect()
    }
}

impl PeerSelectionStrategy for ScoringPeerSelectionStrategy {
    fn select_peers_to_connect(
        &self,
        network: &dyn P2PNetwork,
        _pools: &PeerPools,
        candidates: &dyn Fn() -> Vec<DiscoveryPeer>,
    ) -> Vec<PeerAddress> {
        let connected = network.connected_peers();
        let room = self.max_peer_count.saturating_sub(connected.len());
        if room == 0 {
            return Vec::new();
        }
        let room_to_target = self.target_peer_count.saturating_sub(connected.len());
        let others = Self::others(&connected, None);
        let mut scored: Vec<(DiscoveryPeer, ScoreResult)> = candidates()
            .into_iter()
            .filter(|c| !network.is_connected(&c.peer_id))
            .map(|c| {
                let score = self.score(&c.subnets, &others);
                (c, score)
            })
            .collect();
        scored.shuffle(&mut rand::rng());
        scored.sort_by(|(_, a), (_, b)| b.cmp(a));

        let mut selected = Vec::new();
        for (candidate, score) in scored {
            if selected.len() >= room {
                break;
            }
            if score.mandatory || selected.len() < room_to_target {
                selected.push(candidate.to_address());
            }
        }
        debug!("Selected {} of up to {room} peers to connect to", selected.len());
        selected
    }

    fn select_peers_to_disconnect(&self, network: &dyn P2PNetwork, pools: &PeerPools) -> Vec<Peer> {
        let connected = network.connected_peers();
        let excess = connected.len().saturating_sub(self.target_peer_count);
        if excess == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(&Peer, ScoreResult)> = connected
            .iter()
            .filter(|p| pools.pool_for(&p.peer_id) != PeerConnectionType::Static)
            .map(|p| (p, self.score(&p.subnets, &Self::others(&connected, Some(&p.peer_id)))))
            .filter(|(_, score)| !score.mandatory)
            .collect();
        scored.shuffle(&mut rand::rng());
        scored.sort_by_key(|(_, score)| *score);
        let dropped: Vec<Peer> = scored.into_iter().take(excess).map(|(p, _)| p.clone()).collect();
        debug!("Selected {} of {excess} excess peers to disconnect", dropped.len());
        dropped
    }
}
