//! Constants for magic numbers used throughout the consensus core.

/// Dust threshold (in the base ledger token) that every chained alias output
/// must retain. The VM runner's correctness gate checks that the L1/L2
/// balance diff equals exactly this amount.
pub const DUST_THRESHOLD: u64 = 1_000_000;

/// Length in bytes of a [`crate::ids::ChainId`] / alias address.
pub const CHAIN_ID_LEN: usize = 32;

