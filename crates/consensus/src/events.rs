//! The single tagged-message variant delivered on the operator's event
//! channel. Collapses the source system's many `EventX` interface methods
//! into one enum the state machine matches on.

use covenant_committee::prelude::{NotifyFinalResultPosted, NotifyReq, SignedHash, StartProcessingBatch};
use covenant_ledger::InclusionState;
use covenant_primitives::prelude::Buf32;
use covenant_request::Request;
use covenant_state_manager::prelude::StateTransitionMsg;

use crate::operator::VmOutcome;

pub enum ConsensusEvent {
    StateTransition(StateTransitionMsg),
    Request(Request),
    NotifyReq { from_peer: usize, msg: NotifyReq },
    StartProcessingBatch { from_peer: usize, msg: StartProcessingBatch },
    VMResult(VmOutcome),
    SignedHash { from_peer: usize, msg: SignedHash },
    NotifyFinalResultPosted { from_peer: usize, msg: NotifyFinalResultPosted },
    InclusionState { tx_id: Buf32, state: InclusionState },
    TimerTick,
}
