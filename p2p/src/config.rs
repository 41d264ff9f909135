use crate::errors::ConfigError;
use crate::gossip::{BatchingGossipLogger, LogGossipLogger};
use crate::peers::{PeerScorer, ScoringPeerSelectionStrategy, SubnetQueryScorer};
use crate::rpc::ResponseLogSettings;
use libbeacon::time::TimeProvider;
use log::Level;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the networking core. Every section and field may be omitted from the file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub gossip: GossipConfig,
    pub rpc: RpcConfig,
    pub peers: PeerConfig,
}

impl NetworkConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yml(&text)
    }

    pub fn from_yml(text: &str) -> Result<Self, ConfigError> {
        let config = serde_yml::from_str(text)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text = self.to_yml()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn to_yml(&self) -> Result<String, ConfigError> {
        let s = serde_yml::to_string(self)?;
        Ok(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Level of the per-message receive/publish lines.
    pub log_level: Level,
    /// Level of the lines reporting rejected messages.
    pub reject_log_level: Level,
    pub batch_flush_interval_ms: u64,
    /// Number of indexes a batched object is split into, e.g. the column count of a block.
    pub batch_max_index: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            log_level: Level::Debug,
            reject_log_level: Level::Info,
            batch_flush_interval_ms: 1000,
            batch_max_index: 128,
        }
    }
}

impl GossipConfig {
    pub fn batch_flush_interval(&self) -> Duration {
        Duration::from_millis(self.batch_flush_interval_ms)
    }

    pub fn topic_logger(&self, topic: impl Into<String>) -> LogGossipLogger {
        LogGossipLogger::new(topic, self.log_level, self.reject_log_level)
    }

    pub fn batching_logger(&self, label: impl Into<String>, time: Arc<dyn TimeProvider>) -> BatchingGossipLogger {
        BatchingGossipLogger::new(label, self.batch_max_index, self.log_level, time)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Most response chunks sent for a single request.
    pub max_response_chunks: u64,
    pub log_level: Level,
    /// Most items listed in an exchange summary line.
    pub max_logged_items: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { max_response_chunks: 1024, log_level: Level::Debug, max_logged_items: 16 }
    }
}

impl RpcConfig {
    pub fn response_log_settings(&self, time: Arc<dyn TimeProvider>) -> ResponseLogSettings {
        ResponseLogSettings { level: self.log_level, max_logged_items: self.max_logged_items, time }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub target_peer_count: usize,
    pub max_peer_count: usize,
    pub min_peers_per_subnet: u64,
    pub target_peers_per_subnet: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self { target_peer_count: 100, max_peer_count: 120, min_peers_per_subnet: 1, target_peers_per_subnet: 3 }
    }
}

impl PeerConfig {
    pub fn subnet_query_scorer(&self) -> SubnetQueryScorer {
        SubnetQueryScorer::new(self.min_peers_per_subnet, self.target_peers_per_subnet)
    }

    pub fn scoring_strategy(&self, scorers: Vec<Arc<dyn PeerScorer>>) -> ScoringPeerSelectionStrategy {
        ScoringPeerSelectionStrategy::new(scorers, self.target_peer_count, self.max_peer_count)
    }
}
