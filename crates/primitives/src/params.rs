//! Global parameters shared by every component of a chain's consensus core.

use std::time::Duration;

/// Parameters describing the committee running a chain's consensus: its
/// size, the quorum threshold, and the fee destination credited for
/// finalized batches. These are pre-agreed and don't change without a
/// committee rotation.
#[derive(Clone, Debug)]
pub struct CommitteeParams {
    /// Number of committee members (including this node, if a member).
    size: usize,

    /// Number of signature shares required to reach quorum.
    quorum: usize,
}

impl CommitteeParams {
    pub fn new(size: usize, quorum: usize) -> Self {
        assert!(quorum >= 1 && quorum <= size, "quorum must be in 1..=size");
        Self { size, quorum }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }
}

/// Tuning knobs for batch formation, all node-local: a node with a smaller
/// `max_batch_size` just proposes smaller batches, it never diverges from
/// peers who accept whatever subset the leader actually proposed.
#[derive(Clone, Debug)]
pub struct BatchParams {
    /// Upper bound on the number of requests picked into one batch.
    pub max_batch_size: usize,

    /// How long a non-leader waits for a proposed batch's requests to
    /// solidify before abandoning the cycle.
    pub arg_solid_interval: Duration,

    /// How long a leader cycle can sit with an empty mempool before
    /// re-checking for ready requests.
    pub empty_batch_retry_interval: Duration,

    /// How long to wait for the elected leader to propose before rotating
    /// to the next candidate in the permutation.
    pub leader_rotation_timeout: Duration,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            arg_solid_interval: Duration::from_secs(2),
            empty_batch_retry_interval: Duration::from_millis(500),
            leader_rotation_timeout: Duration::from_secs(5),
        }
    }
}

/// Timer cadence used by the operator and state manager event loops. These
/// are node-local tuning knobs, not consensus-critical: a node running a
/// slower timer just lags, it never diverges.
#[derive(Clone, Debug)]
pub struct TimingParams {
    /// How often `TimerTick` fires in the operator's event loop.
    pub operator_tick: Duration,

    /// How often `TimerTick` fires in the state manager's event loop.
    pub state_manager_tick: Duration,

    /// How long a consensus stage may sit unprogressed before the operator
    /// abandons the batch and restarts from `Synced`.
    pub stage_timeout: Duration,

    /// Poll interval used while waiting for L1 inclusion confirmation of a
    /// posted finalization transaction.
    pub inclusion_poll_interval: Duration,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            operator_tick: Duration::from_millis(100),
            state_manager_tick: Duration::from_millis(100),
            stage_timeout: Duration::from_secs(30),
            inclusion_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Combined set of parameters threaded through the consensus core.
#[derive(Clone, Debug)]
pub struct Params {
    committee: CommitteeParams,
    timing: TimingParams,
    batch: BatchParams,
}

impl Params {
    pub fn new(committee: CommitteeParams, timing: TimingParams, batch: BatchParams) -> Self {
        Self {
            committee,
            timing,
            batch,
        }
    }

    pub fn committee(&self) -> &CommitteeParams {
        &self.committee
    }

    pub fn timing(&self) -> &TimingParams {
        &self.timing
    }

    pub fn batch(&self) -> &BatchParams {
        &self.batch
    }
}
