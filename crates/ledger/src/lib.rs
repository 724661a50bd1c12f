//! Contract for the underlying ledger client. The client itself (the
//! network connection to L1) lives outside this crate; only its event and
//! call shapes live here, shared by every chain that subscribes to it.

use covenant_primitives::prelude::{Buf32, ChainId};

/// Inclusion status of a posted transaction, as reported by the ledger.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InclusionState {
    Pending,
    Confirmed,
    Rejected,
}

/// Events the ledger client pushes to a subscribed chain.
#[derive(Clone, Debug)]
pub enum LedgerEvent {
    TransactionReceived { chain_id: ChainId, tx_bytes: Vec<u8> },
    InclusionStateReceived { tx_id: Buf32, state: InclusionState },
}

/// Outbound calls a chain issues to the ledger client. A node-wide
/// singleton implements this; subscribe/unsubscribe are idempotent per
/// alias address.
pub trait LedgerClient: Send + Sync {
    fn subscribe(&self, chain_id: ChainId);
    fn unsubscribe(&self, chain_id: ChainId);
    fn post_transaction(&self, chain_id: ChainId, tx_bytes: Vec<u8>) -> Buf32;
    fn pull_inclusion_state(&self, tx_id: Buf32);
}

pub mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    /// In-memory ledger client stub used by consensus/chain tests: records
    /// subscriptions and posted transactions without touching any network.
    #[derive(Default)]
    pub struct FakeLedgerClient {
        pub subscribed: Mutex<BTreeSet<ChainId>>,
        pub posted: Mutex<Vec<(ChainId, Vec<u8>)>>,
    }

    impl LedgerClient for FakeLedgerClient {
        fn subscribe(&self, chain_id: ChainId) {
            self.subscribed.lock().insert(chain_id);
        }

        fn unsubscribe(&self, chain_id: ChainId) {
            self.subscribed.lock().remove(&chain_id);
        }

        fn post_transaction(&self, chain_id: ChainId, tx_bytes: Vec<u8>) -> Buf32 {
            let tx_id = covenant_primitives::hash::raw(&tx_bytes);
            self.posted.lock().push((chain_id, tx_bytes));
            tx_id
        }

        fn pull_inclusion_state(&self, _tx_id: Buf32) {}
    }
}
