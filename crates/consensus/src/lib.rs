//! Per-chain consensus core: batch proposal, VM dispatch, BLS
//! threshold-signature aggregation, and L1 finalization, driven by a
//! single-threaded event loop over [`events::ConsensusEvent`].

pub mod errors;
pub mod events;
pub mod leader;
pub mod operator;
pub mod stages;

pub mod prelude {
    pub use crate::{
        errors::ConsensusError,
        events::ConsensusEvent,
        operator::{OperatorState, VmOutcome},
        stages::{ConsensusStage, StageState},
    };
}
