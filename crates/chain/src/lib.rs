//! Per-chain façade and the process-wide chain registry: wires the
//! mempool, committee, ledger client, state manager and operator into one
//! running chain, and tracks which chains are active from their
//! persisted records.

pub mod chain;
pub mod chains;
pub mod errors;

pub mod prelude {
    pub use crate::{
        chain::Chain,
        chains::{ChainRecordStore, ChainSpawner, Chains},
        errors::ChainError,
    };
}
