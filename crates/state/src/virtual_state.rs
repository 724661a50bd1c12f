//! In-memory representation of a chain's key-value store at a given block
//! index, plus the anchor output it is committed to on L1.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use covenant_primitives::prelude::Buf32;

/// Content-addressable snapshot of a chain's state. The key-value store is
/// a flat sorted map; `state_hash` commits to its borsh encoding.
#[derive(Clone, Debug, Default, BorshDeserialize, BorshSerialize)]
pub struct VirtualState {
    block_index: u64,
    kv: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl VirtualState {
    pub fn genesis() -> Self {
        Self {
            block_index: 0,
            kv: BTreeMap::new(),
        }
    }

    pub fn block_index(&self) -> u64 {
        self.block_index
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.kv.get(key).map(|v| v.as_slice())
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.kv.insert(key, value);
    }

    /// Hash committing to this state's full content: the block index and
    /// the borsh encoding of the key-value store.
    pub fn state_hash(&self) -> Buf32 {
        covenant_primitives::hash::compute_borsh_hash(self)
    }

    /// Derives the next state by applying a set of mutations, bumping the
    /// block index by one. Used by the VM runner to build `result_block`.
    pub fn apply(&self, mutations: &[(Vec<u8>, Vec<u8>)]) -> Self {
        let mut next = self.clone();
        next.block_index += 1;
        for (k, v) in mutations {
            next.kv.insert(k.clone(), v.clone());
        }
        next
    }
}

/// Anchor output committing a chain's state hash to L1: a chained alias
/// output whose token balances hold the chain's on-ledger assets.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct StateOutput {
    pub state_hash: Buf32,
    pub block_index: u64,
    /// Total value held by the chain's alias output, denominated in the
    /// base ledger token.
    pub balance: u64,
    /// Unix nanosecond timestamp of the L1 transaction that produced this
    /// output.
    pub l1_timestamp_ns: i64,
}

impl StateOutput {
    /// Whether this output is consistent with the given virtual state, per
    /// invariant 1: matching hash and block index.
    pub fn consistent_with(&self, vs: &VirtualState) -> bool {
        self.state_hash == vs.state_hash() && self.block_index == vs.block_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_bumps_block_index_and_hash() {
        let genesis = VirtualState::genesis();
        let h0 = genesis.state_hash();
        let next = genesis.apply(&[(b"k".to_vec(), b"v".to_vec())]);
        assert_eq!(next.block_index(), 1);
        assert_ne!(next.state_hash(), h0);
        assert_eq!(next.get(b"k"), Some(b"v".as_slice()));
    }

    #[test]
    fn state_output_consistency() {
        let vs = VirtualState::genesis().apply(&[(b"a".to_vec(), b"1".to_vec())]);
        let out = StateOutput {
            state_hash: vs.state_hash(),
            block_index: vs.block_index(),
            balance: 1_000_000,
            l1_timestamp_ns: 42,
        };
        assert!(out.consistent_with(&vs));

        let stale = StateOutput {
            block_index: 0,
            ..out
        };
        assert!(!stale.consistent_with(&vs));
    }
}
