//! Layered error taxonomy for the consensus core, following the teacher's
//! convention of `thiserror` inside library crates and `anyhow` only at the
//! binary/admin boundary.

use covenant_primitives::prelude::RequestId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("VM/ledger inconsistency: {0}")]
    Inconsistency(#[from] covenant_vm::VmError),

    #[error("unrecoverable invariant broken: {0}")]
    FatalInvariant(String),

    #[error("stage timed out before completion")]
    StageTimeout,

    #[error("request {0} missing from mempool during batch take")]
    MissingRequest(RequestId),
}
