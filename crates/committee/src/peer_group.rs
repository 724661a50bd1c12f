//! The narrow transport/liveness contract shared by the operator and the
//! state manager, kept separate from [`crate::dkshare::DkShare`] so neither
//! depends on the other's notion of "committee".

use std::sync::Arc;

use crate::message::WireMessage;

/// Capability exposing only peer count, liveness and message delivery. A
/// full `Committee` (this node's own peer group with DK-share access) is
/// one implementation; the state manager may run against a lighter
/// instantiation with only liveness/send.
pub trait PeerGroupProvider: Send + Sync {
    fn size(&self) -> usize;

    fn send_to(&self, peer_index: usize, msg: WireMessage);

    /// Broadcasts to every peer; returns the count of peers the message was
    /// handed off to (not necessarily delivered).
    fn send_to_all(&self, msg: WireMessage) -> usize;

    fn is_alive(&self, peer_index: usize) -> bool;

    fn quorum_is_alive(&self, quorum: usize) -> bool {
        (0..self.size()).filter(|&i| self.is_alive(i)).count() >= quorum
    }

    /// Registers the handler invoked for every inbound peer message. Only
    /// one handler is supported; re-registering replaces it.
    fn on_peer_message(&self, handler: Arc<dyn Fn(usize, WireMessage) + Send + Sync>);
}

pub mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// In-process peer group stub: `send_to`/`send_to_all` feed directly
    /// into an in-memory queue other test code can drain, and every peer is
    /// reported alive.
    pub struct FakePeerGroup {
        size: usize,
        pub sent: Mutex<Vec<(usize, WireMessage)>>,
        dead: Mutex<Vec<usize>>,
    }

    impl FakePeerGroup {
        pub fn new(size: usize) -> Self {
            Self {
                size,
                sent: Mutex::new(Vec::new()),
                dead: Mutex::new(Vec::new()),
            }
        }

        pub fn kill(&self, peer_index: usize) {
            self.dead.lock().push(peer_index);
        }
    }

    impl PeerGroupProvider for FakePeerGroup {
        fn size(&self) -> usize {
            self.size
        }

        fn send_to(&self, peer_index: usize, msg: WireMessage) {
            self.sent.lock().push((peer_index, msg));
        }

        fn send_to_all(&self, msg: WireMessage) -> usize {
            for i in 0..self.size {
                self.sent.lock().push((i, msg.clone()));
            }
            self.size
        }

        fn is_alive(&self, peer_index: usize) -> bool {
            !self.dead.lock().contains(&peer_index)
        }

        fn on_peer_message(&self, _handler: Arc<dyn Fn(usize, WireMessage) + Send + Sync>) {}
    }
}
