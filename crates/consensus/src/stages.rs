//! Coarse consensus lifecycle for one chain. Each stage carries a deadline
//! checked on every `TimerTick`.

use std::time::Instant;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ConsensusStage {
    NoSync,
    Synced,
    /// Non-leader: received the leader's proposal, VM not yet dispatched.
    ProposalReceived,
    /// Leader: broadcast the proposal, VM dispatched locally.
    ProposalSent,
    /// VM dispatched (either role); awaiting `VMResult`.
    VMStarted,
    /// Non-leader: signature share sent to the leader.
    SignatureSent,
    /// Leader: quorum reached, aggregate signature attached.
    ResultFinalized,
    /// Leader: anchor transaction posted, awaiting inclusion.
    TxPosted,
}

#[derive(Copy, Clone, Debug)]
pub struct StageState {
    pub stage: ConsensusStage,
    pub deadline: Option<Instant>,
}

impl StageState {
    pub fn new() -> Self {
        Self {
            stage: ConsensusStage::NoSync,
            deadline: None,
        }
    }

    pub fn set(&mut self, stage: ConsensusStage, timeout: Option<std::time::Duration>) {
        self.stage = stage;
        self.deadline = timeout.map(|d| Instant::now() + d);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }
}

impl Default for StageState {
    fn default() -> Self {
        Self::new()
    }
}
