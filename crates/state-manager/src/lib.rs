//! Block synchronization driver, run as a peer of the chain operator.

pub mod manager;
pub mod message;

pub mod prelude {
    pub use crate::{
        manager::{state_manager_task, StateManager},
        message::{StateManagerMsg, StateTransitionMsg},
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use borsh::BorshSerialize;
    use covenant_committee::peer_group::test_support::FakePeerGroup;
    use covenant_committee::prelude::BlockHeader as WireBlockHeader;
    use covenant_state::prelude::{StateOutput, VirtualState};
    use std::sync::Arc;

    fn header_for(mutations: &[(Vec<u8>, Vec<u8>)], parent: &VirtualState) -> WireBlockHeader {
        let next = parent.apply(mutations);
        WireBlockHeader {
            block_index: next.block_index(),
            parent_state_hash: parent.state_hash(),
            state_hash: next.state_hash(),
            block_bytes: mutations.try_to_vec().unwrap(),
        }
    }

    #[test]
    fn applies_in_order_header_and_emits_transition() {
        let peers = Arc::new(FakePeerGroup::new(4));
        let (mut mgr, mut rx) = StateManager::new(peers);
        let genesis = VirtualState::genesis();
        let mutations = vec![(b"k".to_vec(), b"v".to_vec())];
        let header = header_for(&mutations, &genesis);
        let next_state = genesis.apply(&mutations);

        mgr.process_msg(StateManagerMsg::StateOutput(StateOutput {
            state_hash: next_state.state_hash(),
            block_index: next_state.block_index(),
            balance: 1_000_000,
            l1_timestamp_ns: 1,
        }));
        mgr.process_msg(StateManagerMsg::BlockHeader(header));

        assert_eq!(mgr.current_state().block_index(), 1);
        let transition = rx.try_recv().expect("transition should have been emitted");
        assert_eq!(transition.virtual_state.block_index(), 1);
    }

    #[test]
    fn buffers_out_of_order_header_until_parent_arrives() {
        let peers = Arc::new(FakePeerGroup::new(4));
        let (mut mgr, _rx) = StateManager::new(peers);
        let genesis = VirtualState::genesis();
        let m1 = vec![(b"a".to_vec(), b"1".to_vec())];
        let s1 = genesis.apply(&m1);
        let m2 = vec![(b"b".to_vec(), b"2".to_vec())];
        let h2 = header_for(&m2, &s1);

        // h2's parent hash doesn't match genesis; gets buffered.
        mgr.process_msg(StateManagerMsg::BlockHeader(h2));
        assert_eq!(mgr.current_state().block_index(), 0);

        let h1 = header_for(&m1, &genesis);
        mgr.process_msg(StateManagerMsg::BlockHeader(h1));
        // Applying h1 should drain the buffered h2 as well.
        assert_eq!(mgr.current_state().block_index(), 2);
    }

    #[test]
    fn duplicate_header_is_ignored() {
        let peers = Arc::new(FakePeerGroup::new(4));
        let (mut mgr, _rx) = StateManager::new(peers);
        let genesis = VirtualState::genesis();
        let m1 = vec![(b"a".to_vec(), b"1".to_vec())];
        let h1 = header_for(&m1, &genesis);
        mgr.process_msg(StateManagerMsg::BlockHeader(h1.clone()));
        mgr.process_msg(StateManagerMsg::BlockHeader(h1));
        assert_eq!(mgr.current_state().block_index(), 1);
    }
}
