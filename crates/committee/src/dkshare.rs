//! This node's view of the committee it belongs to: peer liveness/transport
//! plus access to its share of the distributed BLS key. The distributed-
//! key-share registry that provisions share material is an external
//! collaborator (see crate docs); this trait only exposes what the
//! operator needs once shares are in hand.

use covenant_primitives::prelude::Buf48;

use crate::{bls::SigningShare, peer_group::PeerGroupProvider};

/// A node's own committee: a [`PeerGroupProvider`] plus the signing
/// material needed to participate in threshold signing. The operator
/// depends on this; the state manager depends only on the narrower
/// `PeerGroupProvider`.
pub trait Committee: PeerGroupProvider {
    fn my_index(&self) -> usize;

    fn quorum(&self) -> usize;

    fn signing_share(&self) -> &SigningShare;

    fn public_share(&self, peer_index: usize) -> Option<Buf48>;
}

pub mod test_support {
    use super::*;
    use crate::{message::WireMessage, peer_group::test_support::FakePeerGroup};
    use std::sync::Arc;

    /// In-process committee stub wrapping a [`FakePeerGroup`] and a locally
    /// generated signing share, for consensus unit tests.
    pub struct FakeCommittee {
        peers: FakePeerGroup,
        my_index: usize,
        quorum: usize,
        share: SigningShare,
        pubkeys: Vec<Buf48>,
    }

    impl FakeCommittee {
        pub fn new(
            size: usize,
            my_index: usize,
            quorum: usize,
            share: SigningShare,
            pubkeys: Vec<Buf48>,
        ) -> Self {
            Self {
                peers: FakePeerGroup::new(size),
                my_index,
                quorum,
                share,
                pubkeys,
            }
        }

        pub fn kill_peer(&self, peer_index: usize) {
            self.peers.kill(peer_index)
        }

        pub fn sent(&self) -> Vec<(usize, WireMessage)> {
            self.peers.sent.lock().clone()
        }
    }

    impl PeerGroupProvider for FakeCommittee {
        fn size(&self) -> usize {
            self.peers.size()
        }

        fn send_to(&self, peer_index: usize, msg: WireMessage) {
            self.peers.send_to(peer_index, msg)
        }

        fn send_to_all(&self, msg: WireMessage) -> usize {
            self.peers.send_to_all(msg)
        }

        fn is_alive(&self, peer_index: usize) -> bool {
            self.peers.is_alive(peer_index)
        }

        fn on_peer_message(&self, handler: Arc<dyn Fn(usize, WireMessage) + Send + Sync>) {
            self.peers.on_peer_message(handler)
        }
    }

    impl Committee for FakeCommittee {
        fn my_index(&self) -> usize {
            self.my_index
        }

        fn quorum(&self) -> usize {
            self.quorum
        }

        fn signing_share(&self) -> &SigningShare {
            &self.share
        }

        fn public_share(&self, peer_index: usize) -> Option<Buf48> {
            self.pubkeys.get(peer_index).copied()
        }
    }
}
