//! Process-wide chain registry: activates and deactivates chains from
//! their persisted [`ChainRecord`]s, and is the only place in the node
//! that knows the full set of chains currently running.

use std::{collections::BTreeMap, sync::Arc};

use covenant_ledger::LedgerClient;
use covenant_primitives::prelude::ChainId;
use covenant_state::prelude::ChainRecord;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{chain::Chain, errors::ChainError};

/// CRUD surface over a chain's persisted activation record. The backing
/// store (a key-value store on disk, or whatever durable registry a
/// deployment wires in) is an external collaborator; this crate only
/// depends on this narrow contract and the wire format in
/// `covenant_state::ChainRecord`.
pub trait ChainRecordStore: Send + Sync {
    fn get(&self, id: ChainId) -> Option<ChainRecord>;
    fn put(&self, record: ChainRecord);
    fn list(&self) -> Vec<ChainRecord>;
}

pub mod test_support {
    use super::*;

    /// In-memory [`ChainRecordStore`], the in-scope default when no
    /// persistent registry has been wired in.
    #[derive(Default)]
    pub struct InMemoryChainRecordStore {
        records: Mutex<BTreeMap<ChainId, ChainRecord>>,
    }

    impl ChainRecordStore for InMemoryChainRecordStore {
        fn get(&self, id: ChainId) -> Option<ChainRecord> {
            self.records.lock().get(&id).copied()
        }

        fn put(&self, record: ChainRecord) {
            self.records.lock().insert(record.chain_id, record);
        }

        fn list(&self) -> Vec<ChainRecord> {
            self.records.lock().values().copied().collect()
        }
    }
}

/// Builds and spawns the running [`Chain`] for an activated chain-id. The
/// admin API and the node's startup wiring each supply their own closure,
/// since constructing a chain needs node-local collaborators (the
/// committee implementation, the processor) the registry itself has no
/// opinion on.
pub type ChainSpawner = Arc<dyn Fn(ChainId) -> Arc<Chain> + Send + Sync>;

/// Process-wide map of chain-id to running [`Chain`] instance, backed by a
/// [`ChainRecordStore`] for the persisted activation flag.
pub struct Chains {
    ledger: Arc<dyn LedgerClient>,
    records: Arc<dyn ChainRecordStore>,
    active: Mutex<BTreeMap<ChainId, Arc<Chain>>>,
}

impl Chains {
    pub fn new(ledger: Arc<dyn LedgerClient>, records: Arc<dyn ChainRecordStore>) -> Self {
        Self {
            ledger,
            records,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// The ledger client every chain activated through this registry
    /// shares.
    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Returns the running chain for `id`, lazily dropping it from the
    /// active map if it has since been dismissed.
    pub fn get(&self, id: ChainId) -> Option<Arc<Chain>> {
        let mut active = self.active.lock();
        match active.get(&id) {
            Some(ch) if ch.is_dismissed() => {
                active.remove(&id);
                None
            }
            Some(ch) => Some(ch.clone()),
            None => None,
        }
    }

    pub fn record(&self, id: ChainId) -> Option<ChainRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> Vec<ChainRecord> {
        self.records.list()
    }

    /// Creates a new chain record, inactive by default. Fails if a record
    /// for this chain-id already exists.
    pub fn put_record(&self, record: ChainRecord) -> Result<(), ChainError> {
        if self.records.get(record.chain_id).is_some() {
            return Err(ChainError::AlreadyExists(record.chain_id));
        }
        self.records.put(record);
        Ok(())
    }

    /// Activates a chain, spawning its component set via `spawn` if it
    /// isn't already running. Idempotent: activating an already-active
    /// chain is a no-op.
    pub fn activate(&self, id: ChainId, spawn: impl FnOnce() -> Arc<Chain>) -> Result<(), ChainError> {
        let mut record = self.records.get(id).ok_or(ChainError::UnknownChain(id))?;
        let mut active = self.active.lock();
        if active.contains_key(&id) {
            debug!(%id, "chain already active");
            return Ok(());
        }
        record.active = true;
        self.records.put(record);
        let chain = spawn();
        active.insert(id, chain);
        info!(%id, "activated chain");
        Ok(())
    }

    /// Deactivates a chain: flips its persisted record and dismisses the
    /// running instance, if any.
    pub fn deactivate(&self, id: ChainId) -> Result<(), ChainError> {
        let mut record = self.records.get(id).ok_or(ChainError::UnknownChain(id))?;
        record.active = false;
        self.records.put(record);
        if let Some(chain) = self.active.lock().remove(&id) {
            chain.dismiss();
            info!(%id, "deactivated chain");
        } else {
            debug!(%id, "chain was not active");
        }
        Ok(())
    }

    /// Re-activates every chain whose persisted record is marked active,
    /// e.g. at node startup.
    pub fn activate_all_from_registry(&self, mut spawn: impl FnMut(ChainId) -> Arc<Chain>) {
        for record in self.records.list() {
            if !record.active {
                continue;
            }
            let id = record.chain_id;
            if let Err(e) = self.activate(id, || spawn(id)) {
                tracing::warn!(%id, err = %e, "failed to activate chain from registry");
            }
        }
    }

    /// Dismisses every running chain, e.g. on node shutdown.
    pub fn dismiss_all(&self) {
        let mut active = self.active.lock();
        for (_, chain) in active.drain() {
            chain.dismiss();
        }
    }
}
