//! Committee abstraction: BLS threshold signing, peer transport contract,
//! and the wire messages exchanged between committee members.

pub mod bls;
pub mod dkshare;
pub mod loopback;
pub mod message;
pub mod peer_group;

pub mod prelude {
    pub use crate::{
        bls::{BlsError, SigningShare},
        dkshare::Committee,
        loopback::LoopbackCommittee,
        message::{
            BlockHeader, GetBlock, NotifyFinalResultPosted, NotifyReq, PendingBlock, SignedHash,
            StartProcessingBatch, StateIndexPingPong, StateUpdate, WireMessage,
        },
        peer_group::PeerGroupProvider,
    };
}
