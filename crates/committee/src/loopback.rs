//! Degenerate single-member committee: this node is its own quorum, with
//! no peer transport wired up. A practical stand-in for solo-chain
//! operation where the real peer-to-peer transport and the distributed-
//! key-share registry (both external collaborators, see crate docs)
//! aren't deployed.

use std::sync::Arc;

use parking_lot::Mutex;

use covenant_primitives::prelude::Buf48;

use crate::{bls::SigningShare, dkshare::Committee, message::WireMessage, peer_group::PeerGroupProvider};

pub struct LoopbackCommittee {
    share: SigningShare,
    handler: Mutex<Option<Arc<dyn Fn(usize, WireMessage) + Send + Sync>>>,
}

impl LoopbackCommittee {
    pub fn new() -> Self {
        Self {
            share: SigningShare::generate(),
            handler: Mutex::new(None),
        }
    }
}

impl Default for LoopbackCommittee {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerGroupProvider for LoopbackCommittee {
    fn size(&self) -> usize {
        1
    }

    fn send_to(&self, _peer_index: usize, _msg: WireMessage) {
        // No peers to deliver to.
    }

    fn send_to_all(&self, _msg: WireMessage) -> usize {
        0
    }

    fn is_alive(&self, peer_index: usize) -> bool {
        peer_index == 0
    }

    fn on_peer_message(&self, handler: Arc<dyn Fn(usize, WireMessage) + Send + Sync>) {
        *self.handler.lock() = Some(handler);
    }
}

impl Committee for LoopbackCommittee {
    fn my_index(&self) -> usize {
        0
    }

    fn quorum(&self) -> usize {
        1
    }

    fn signing_share(&self) -> &SigningShare {
        &self.share
    }

    fn public_share(&self, peer_index: usize) -> Option<Buf48> {
        (peer_index == 0).then(|| self.share.public_share())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_committee_is_self_leader_and_self_quorum() {
        let c = LoopbackCommittee::new();
        assert_eq!(c.size(), 1);
        assert_eq!(c.quorum(), 1);
        assert_eq!(c.my_index(), 0);
        assert!(c.is_alive(0));
        assert!(c.public_share(0).is_some());
        assert!(c.public_share(1).is_none());
    }
}
