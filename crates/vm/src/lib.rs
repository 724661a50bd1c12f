//! Single-shot deterministic batch executor contract. The VM itself (the
//! interpreter that actually runs a contract's bytecode) is out of scope;
//! only its driver — the loop that feeds it a batch and builds the
//! resulting block and anchor essence — lives here.

use borsh::{BorshDeserialize, BorshSerialize};
use covenant_primitives::prelude::{Buf32, DUST_THRESHOLD};
use covenant_request::Request;
use covenant_state::prelude::VirtualState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("task carries no requests")]
    EmptyBatch,

    #[error("L1/L2 inconsistency: computed output balance {0} does not match independently expected balance {1}")]
    BalanceInconsistency(u64, u64),
}

/// A single request's processing outcome: the key-value mutations it
/// produced, its result bytes, and an optional per-request error (which
/// does not abort the batch, only that request).
pub struct RequestOutcome {
    pub mutations: Vec<(Vec<u8>, Vec<u8>)>,
    pub result: Vec<u8>,
    pub err: Option<String>,
}

/// The deterministic single-request executor. Implementations run the
/// actual contract bytecode; this crate only sequences calls to it.
pub trait RequestProcessor: Send + Sync {
    fn process(&self, vs: &VirtualState, req: &Request) -> RequestOutcome;
}

/// Input to one VM run: an ordered batch against a cloned virtual state.
pub struct VmTask {
    pub requests: Vec<Request>,
    pub virtual_state: VirtualState,
    pub timestamp_ns: i64,
    /// Current balance of the chain's anchor output, before this batch.
    pub chain_input_balance: u64,
    /// An independently-sourced expectation for this batch's resulting
    /// anchor output balance, when the caller already has one (e.g. an
    /// external L1 balance observation). `None` when nothing independent
    /// is available, which is always true today since that observation is
    /// out of scope here; the gate below is a no-op in that case rather
    /// than checking this run's arithmetic against itself.
    pub expected_output_balance: Option<u64>,
}

/// Unsigned, deterministic body of the anchor transaction produced by a
/// batch: commits to the new state hash and the adjusted output balance.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct TransactionEssence {
    pub state_hash: Buf32,
    pub block_index: u64,
    pub output_balance: u64,
    pub timestamp_ns: i64,
}

impl TransactionEssence {
    pub fn essence_hash(&self) -> Buf32 {
        covenant_primitives::hash::concat(&[
            self.state_hash.as_slice(),
            &self.block_index.to_be_bytes(),
            &self.output_balance.to_be_bytes(),
            &self.timestamp_ns.to_be_bytes(),
        ])
    }
}

/// Output of a completed batch run.
pub struct VmResult {
    pub result_block: VirtualState,
    pub result_transaction: TransactionEssence,
    pub last_result: Vec<u8>,
    pub last_err: Option<String>,
}

/// Runs the batch of requests in order against a clone of `task`'s virtual
/// state, accumulating mutations, then builds the resulting block and
/// anchor essence. Applies the correctness gate before returning.
pub fn run(task: &VmTask, processor: &dyn RequestProcessor) -> Result<VmResult, VmError> {
    if task.requests.is_empty() {
        return Err(VmError::EmptyBatch);
    }

    let mut mutations = Vec::new();
    let mut last_result = Vec::new();
    let mut last_err = None;
    let mut incoming_tokens: u64 = 0;

    for req in &task.requests {
        let outcome = processor.process(&task.virtual_state, req);
        mutations.extend(outcome.mutations);
        last_result = outcome.result;
        last_err = outcome.err;
        incoming_tokens += req.tokens().iter().map(|t| t.amount).sum::<u64>();
    }

    let result_block = task.virtual_state.apply(&mutations);

    let last_total_assets = task.chain_input_balance as i128 + incoming_tokens as i128;
    let output_balance = (last_total_assets + DUST_THRESHOLD as i128) as u64;

    let essence = TransactionEssence {
        state_hash: result_block.state_hash(),
        block_index: result_block.block_index(),
        output_balance,
        timestamp_ns: task.timestamp_ns,
    };

    if let Some(expected) = task.expected_output_balance {
        if output_balance != expected {
            return Err(VmError::BalanceInconsistency(output_balance, expected));
        }
    }

    Ok(VmResult {
        result_block,
        result_transaction: essence,
        last_result,
        last_err,
    })
}

/// A [`RequestProcessor`] that records no mutations and echoes each
/// request's own id back as its result. Useful as a default when the real
/// deterministic VM (an external collaborator, see the module doc above)
/// isn't wired up, e.g. a freshly scaffolded chain with no contracts
/// deployed yet.
pub struct NoopProcessor;

impl RequestProcessor for NoopProcessor {
    fn process(&self, _vs: &VirtualState, req: &Request) -> RequestOutcome {
        RequestOutcome {
            mutations: Vec::new(),
            result: req.id().to_text().into_bytes(),
            err: None,
        }
    }
}
