//! Re-exports of the types used throughout the other crates.

pub use crate::{
    buf::{Buf32, Buf48, Buf96},
    constants::{CHAIN_ID_LEN, DUST_THRESHOLD},
    errors::ParseError,
    ids::{AgentId, ChainId, Hname, RequestId},
    params::{BatchParams, CommitteeParams, Params, TimingParams},
};
