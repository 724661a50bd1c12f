//! Per-chain unordered set of pending requests with per-peer "seen"
//! bitmaps. Safe for concurrent use by the chain façade, the admin API and
//! the operator.

use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use covenant_primitives::prelude::RequestId;
use covenant_request::Request;
use parking_lot::Mutex;

/// A single pending request plus its notification bookkeeping.
struct MempoolEntry {
    request: Request,
    received_at: u64,
    seen: Vec<bool>,
    protected: bool,
}

struct Inner {
    committee_size: usize,
    entries: BTreeMap<RequestId, MempoolEntry>,
}

/// Thread-safe mempool of pending requests for one chain.
pub struct Mempool {
    inner: Mutex<Inner>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

impl Mempool {
    pub fn new(committee_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                committee_size,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Inserts the request if not already present; duplicates are ignored.
    pub fn receive(&self, request: Request) {
        let mut inner = self.inner.lock();
        let committee_size = inner.committee_size;
        inner.entries.entry(request.id()).or_insert_with(|| MempoolEntry {
            request,
            received_at: now_millis(),
            seen: vec![false; committee_size],
            protected: false,
        });
    }

    /// Records a peer's notification for a request id. Tolerant of unknown
    /// ids: the mark is a no-op until the request itself arrives, matching
    /// the spec's "recorded lazily" requirement for `NotifyReq` messages
    /// that race ahead of the request broadcast.
    pub fn mark_seen(&self, id: RequestId, peer_index: usize) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            if let Some(slot) = entry.seen.get_mut(peer_index) {
                *slot = true;
            }
        }
    }

    /// Clears every request's seen bitmap. Invoked on every state
    /// transition, since notifications are only valid within one state
    /// index.
    pub fn clear_seen_marks(&self) {
        let mut inner = self.inner.lock();
        for entry in inner.entries.values_mut() {
            entry.seen.iter_mut().for_each(|b| *b = false);
        }
    }

    /// Returns requests whose seen popcount is at least `seen_threshold`
    /// and whose arguments are solid, sorted by `(received_at, id)`.
    pub fn ready_list(&self, seen_threshold: usize) -> Vec<Request> {
        let inner = self.inner.lock();
        let mut ready: Vec<&MempoolEntry> = inner
            .entries
            .values()
            .filter(|e| {
                !e.protected
                    && e.request.args_solid()
                    && e.seen.iter().filter(|&&b| b).count() >= seen_threshold
            })
            .collect();
        ready.sort_by_key(|e| (e.received_at, e.request.id()));
        ready.into_iter().map(|e| e.request.clone()).collect()
    }

    /// Atomically marks the requested subset `protected`, excluding them
    /// from future `ready_list` calls, and returns their requests. Actual
    /// removal happens later via `remove`, once the batch they're part of
    /// is confirmed included; `unprotect` reverses this if the batch is
    /// abandoned first. If any id is missing, the mempool is left
    /// unchanged and the second return value is `false`.
    pub fn take_all_ready(&self, ids: &[RequestId]) -> (Vec<Request>, bool) {
        let mut inner = self.inner.lock();
        if !ids.iter().all(|id| inner.entries.contains_key(id)) {
            return (Vec::new(), false);
        }
        let reqs = ids
            .iter()
            .map(|id| inner.entries.get(id).expect("checked above").request.clone())
            .collect();
        for id in ids {
            if let Some(e) = inner.entries.get_mut(id) {
                e.protected = true;
            }
        }
        (reqs, true)
    }

    /// Marks a set of ids as protected without removing them, used by the
    /// leader immediately after proposing a batch.
    pub fn protect(&self, ids: &[RequestId]) {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(e) = inner.entries.get_mut(id) {
                e.protected = true;
            }
        }
    }

    /// Releases the protected flag without removing the requests, used
    /// when a batch is abandoned.
    pub fn unprotect(&self, ids: &[RequestId]) {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(e) = inner.entries.get_mut(id) {
                e.protected = false;
            }
        }
    }

    pub fn remove(&self, ids: &[RequestId]) {
        let mut inner = self.inner.lock();
        for id in ids {
            inner.entries.remove(id);
        }
    }

    pub fn has(&self, id: RequestId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_primitives::prelude::{AgentId, Buf32, ChainId, Hname};
    use covenant_request::{CallTarget, RequestOrigin};
    use std::collections::BTreeMap;

    fn req(n: u8) -> Request {
        Request::new(
            RequestId::new_on_ledger(Buf32::from([n; 32]), 0),
            RequestOrigin::OnLedger { output_index: 0 },
            Buf32::from([n; 32]),
            AgentId::new(ChainId::new(Buf32::from([n; 32])), Hname(1)),
            CallTarget {
                contract: Hname(1),
                entry_point: Hname(2),
            },
            false,
            Vec::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn receive_is_idempotent() {
        let mp = Mempool::new(4);
        mp.receive(req(1));
        mp.receive(req(1));
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn ready_list_respects_threshold_and_sort_order() {
        let mp = Mempool::new(4);
        mp.receive(req(2));
        mp.receive(req(1));
        mp.mark_seen(req(1).id(), 0);
        mp.mark_seen(req(1).id(), 1);
        mp.mark_seen(req(1).id(), 2);
        mp.mark_seen(req(2).id(), 0);

        let ready = mp.ready_list(3);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id(), req(1).id());
    }

    #[test]
    fn clear_seen_marks_resets_threshold_eligibility() {
        let mp = Mempool::new(4);
        mp.receive(req(1));
        mp.mark_seen(req(1).id(), 0);
        mp.mark_seen(req(1).id(), 1);
        mp.mark_seen(req(1).id(), 2);
        assert_eq!(mp.ready_list(3).len(), 1);

        mp.clear_seen_marks();
        assert_eq!(mp.ready_list(3).len(), 0);
    }

    #[test]
    fn take_all_ready_is_atomic() {
        let mp = Mempool::new(4);
        mp.receive(req(1));
        let ids = [req(1).id(), req(2).id()];
        let (reqs, all_present) = mp.take_all_ready(&ids);
        assert!(!all_present);
        assert!(reqs.is_empty());
        // mempool unchanged: req(1) still retrievable and unprotected
        assert_eq!(mp.ready_list(0).len(), 1);
    }

    #[test]
    fn mark_seen_on_unknown_id_is_a_noop() {
        let mp = Mempool::new(4);
        mp.mark_seen(req(9).id(), 0);
        assert!(!mp.has(req(9).id()));
    }
}
