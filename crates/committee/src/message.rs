//! Wire shapes exchanged between committee peers. All fields are fixed, so
//! every variant encodes to a deterministic byte sequence via borsh.

use borsh::{BorshDeserialize, BorshSerialize};
use covenant_primitives::prelude::{AgentId, Buf32, Buf96, RequestId};

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct NotifyReq {
    pub state_index: u32,
    pub request_ids: Vec<RequestId>,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct StartProcessingBatch {
    pub state_index: u32,
    pub timestamp_ns: i64,
    pub batch_hash: Buf32,
    pub fee_destination: AgentId,
    pub request_ids: Vec<RequestId>,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct SignedHash {
    pub state_index: u32,
    pub essence_hash: Buf32,
    pub sig_share: Buf96,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct NotifyFinalResultPosted {
    pub state_index: u32,
    pub tx_id: Buf32,
}

/// State-manager peer gossip, carried over the same transport but routed
/// to the state manager rather than the operator.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct StateIndexPingPong {
    pub state_index: u32,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct GetBlock {
    pub block_index: u64,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct BlockHeader {
    pub block_index: u64,
    pub parent_state_hash: Buf32,
    pub state_hash: Buf32,
    pub block_bytes: Vec<u8>,
}

#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct PendingBlock {
    pub block_index: u64,
    pub block_bytes: Vec<u8>,
}

/// A peer's announcement of a newly observed L1 anchor output, gossiped
/// independently of the full block body so peers can catch the state
/// manager up without waiting on `BlockHeader`/`GetBlock` round-trips.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct StateUpdate {
    pub state_hash: Buf32,
    pub block_index: u64,
    pub balance: u64,
    pub l1_timestamp_ns: i64,
}

/// Every message type carries the chain-id and state-index implicitly via
/// the transport envelope; a mismatch at the receiving end causes a drop
/// before the message is ever handed to a component.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub enum WireMessage {
    NotifyReq(NotifyReq),
    StartProcessingBatch(StartProcessingBatch),
    SignedHash(SignedHash),
    NotifyFinalResultPosted(NotifyFinalResultPosted),
    StateIndexPingPong(StateIndexPingPong),
    GetBlock(GetBlock),
    BlockHeader(BlockHeader),
    PendingBlock(PendingBlock),
    StateUpdate(StateUpdate),
}
