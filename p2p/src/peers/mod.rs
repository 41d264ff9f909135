//! Peer selection.
//!
//! A [`PeerSelectionStrategy`] proposes peers to dial and connections to drop. Independent policies are combined with
//! [`CompositePeerSelectionStrategy`]; [`ScoringPeerSelectionStrategy`] is the scoring-based policy.

mod scoring;
mod strategy;
mod types;

pub use scoring::{PeerScorer, ScoreResult, ScoringPeerSelectionStrategy, SubnetQueryScorer};
pub use strategy::{CompositePeerSelectionStrategy, PeerSelectionStrategy};
pub use types::{DiscoveryPeer, P2PNetwork, Peer, PeerAddress, PeerConnectionType, PeerPools};

#[cfg(test)]
pub(crate) use types::stub;
