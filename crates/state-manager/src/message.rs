//! Messages flowing in and out of the state manager's event loop.

use covenant_committee::prelude::{BlockHeader as WireBlockHeader, PendingBlock, StateIndexPingPong};
use covenant_state::prelude::{StateOutput, VirtualState};

/// Stimuli the state manager's loop reacts to.
pub enum StateManagerMsg {
    /// Hint from the operator that a higher state index than what we've
    /// applied has been observed (e.g. via a peer's `SignedHash`).
    EvidenceStateIndex(u64),
    PingPong(StateIndexPingPong),
    GetBlock { peer_index: usize, block_index: u64 },
    BlockHeader(WireBlockHeader),
    StateOutput(StateOutput),
    PendingBlock(PendingBlock),
    TimerTick,
}

/// Posted to the operator whenever a new block is applied.
#[derive(Clone)]
pub struct StateTransitionMsg {
    pub virtual_state: VirtualState,
    pub state_output: StateOutput,
}
