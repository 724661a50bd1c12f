//! Shared state types: the virtual key-value state, its L1 anchor output,
//! and the persisted chain-activation record.

pub mod chain_record;
pub mod virtual_state;

pub mod prelude {
    pub use crate::{
        chain_record::{ChainRecord, ChainRecordError},
        virtual_state::{StateOutput, VirtualState},
    };
}
