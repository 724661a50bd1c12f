//! The node's top-level configuration tree. Deserialized from TOML by the
//! binary, then converted into the `covenant-primitives` parameter types
//! the consensus core actually runs on.

use std::{path::PathBuf, time::Duration};

use covenant_primitives::prelude::{BatchParams, ChainId, CommitteeParams, Params, ParseError, TimingParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeConfig {
    pub size: usize,
    pub quorum: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub operator_tick_ms: u64,
    pub state_manager_tick_ms: u64,
    pub stage_timeout_secs: u64,
    pub inclusion_poll_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let d = TimingParams::default();
        Self {
            operator_tick_ms: d.operator_tick.as_millis() as u64,
            state_manager_tick_ms: d.state_manager_tick.as_millis() as u64,
            stage_timeout_secs: d.stage_timeout.as_secs(),
            inclusion_poll_secs: d.inclusion_poll_interval.as_secs(),
        }
    }
}

impl TimingConfig {
    pub fn to_params(&self) -> TimingParams {
        TimingParams {
            operator_tick: Duration::from_millis(self.operator_tick_ms),
            state_manager_tick: Duration::from_millis(self.state_manager_tick_ms),
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
            inclusion_poll_interval: Duration::from_secs(self.inclusion_poll_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub arg_solid_secs: u64,
    pub empty_batch_retry_ms: u64,
    pub leader_rotation_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let d = BatchParams::default();
        Self {
            max_batch_size: d.max_batch_size,
            arg_solid_secs: d.arg_solid_interval.as_secs(),
            empty_batch_retry_ms: d.empty_batch_retry_interval.as_millis() as u64,
            leader_rotation_secs: d.leader_rotation_timeout.as_secs(),
        }
    }
}

impl BatchConfig {
    pub fn to_params(&self) -> BatchParams {
        BatchParams {
            max_batch_size: self.max_batch_size,
            arg_solid_interval: Duration::from_secs(self.arg_solid_secs),
            empty_batch_retry_interval: Duration::from_millis(self.empty_batch_retry_ms),
            leader_rotation_timeout: Duration::from_secs(self.leader_rotation_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub bind_addr: String,
}

/// Root configuration tree, loaded once at startup from a TOML file and
/// optionally patched by CLI overrides before the node is wired up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub datadir: PathBuf,
    pub rpc: RpcConfig,
    pub committee: CommitteeConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Chain-ids (base58) to register as active and bring up at startup.
    #[serde(default)]
    pub preload_chains: Vec<String>,
}

impl Config {
    pub fn params(&self) -> Params {
        Params::new(
            CommitteeParams::new(self.committee.size, self.committee.quorum),
            self.timing.to_params(),
            self.batch.to_params(),
        )
    }

    pub fn preload_chain_ids(&self) -> Result<Vec<ChainId>, ParseError> {
        self.preload_chains.iter().map(|s| ChainId::from_base58(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        datadir = "/tmp/covenant"

        [rpc]
        bind_addr = "127.0.0.1:9090"

        [committee]
        size = 4
        quorum = 3
    "#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.committee.size, 4);
        assert_eq!(config.committee.quorum, 3);
        assert_eq!(config.timing.operator_tick_ms, 100);
        assert_eq!(config.batch.max_batch_size, 100);
        assert!(config.preload_chains.is_empty());
    }

    #[test]
    fn params_builds_from_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let params = config.params();
        assert_eq!(params.committee().size(), 4);
        assert_eq!(params.committee().quorum(), 3);
        assert_eq!(params.batch().max_batch_size, 100);
    }

    #[test]
    fn overridden_timing_values_round_trip() {
        let raw = format!(
            "{MINIMAL}\n[timing]\noperator_tick_ms = 250\nstage_timeout_secs = 10\n"
        );
        let config: Config = toml::from_str(&raw).unwrap();
        let params = config.params();
        assert_eq!(params.timing().operator_tick, Duration::from_millis(250));
        assert_eq!(params.timing().stage_timeout, Duration::from_secs(10));
        // Untouched fields keep their defaults.
        assert_eq!(params.timing().state_manager_tick, Duration::from_millis(100));
    }
}
