//! The chain operator: a single serialized event loop driving a batch
//! through proposal, VM execution, threshold-signature aggregation, L1
//! posting and finalization, and reacting to asynchronous state-output
//! notifications from the state manager.

use std::{
    sync::{mpsc as std_mpsc, Arc},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use borsh::BorshSerialize;
use covenant_committee::{
    bls,
    prelude::{
        Committee, NotifyFinalResultPosted, NotifyReq, PeerGroupProvider, SignedHash,
        StartProcessingBatch, WireMessage,
    },
};
use covenant_ledger::{InclusionState, LedgerClient};
use covenant_mempool::Mempool;
use covenant_primitives::prelude::{AgentId, Buf32, Buf96, Params, RequestId};
use covenant_state::prelude::{StateOutput, VirtualState};
use covenant_vm::{RequestProcessor, TransactionEssence, VmResult, VmTask};
use tracing::{info, warn};

use crate::{
    errors::ConsensusError,
    events::ConsensusEvent,
    leader,
    stages::{ConsensusStage, StageState},
};

/// Leader-only bookkeeping for the batch currently in flight.
struct LeaderStatus {
    reqs: Vec<RequestId>,
    batch_hash: Buf32,
    result_tx_essence: Option<TransactionEssence>,
    finalized: bool,
    /// Deduplicated by peer index.
    signed_results: Vec<(usize, Buf96)>,
    /// Shares that arrived before our own VM run completed, so we don't
    /// yet know which essence hash to check them against.
    pending_votes: Vec<(usize, Buf32, Buf96)>,
}

impl LeaderStatus {
    fn essence_hash(&self) -> Option<Buf32> {
        self.result_tx_essence.as_ref().map(|e| e.essence_hash())
    }
}

struct PendingNonLeaderBatch {
    msg: StartProcessingBatch,
    deadline: Instant,
}

/// The per-chain consensus state machine. Generic over the committee
/// implementation so tests can swap in an in-process fake.
pub struct OperatorState<C: Committee> {
    params: Params,
    committee: Arc<C>,
    mempool: Arc<Mempool>,
    ledger: Arc<dyn LedgerClient>,
    processor: Arc<dyn RequestProcessor>,
    vm_pool: threadpool::ThreadPool,
    vm_result_tx: std_mpsc::Sender<VmOutcome>,
    fee_destination: AgentId,

    current_state: VirtualState,
    state_output: Option<StateOutput>,

    peer_permutation: Vec<usize>,
    /// How many times the elected leader has been rotated past within the
    /// current state index, because the previous candidate was detected
    /// dead. Reset to 0 on every state transition.
    leader_rotation: usize,
    leader_wait_deadline: Option<Instant>,
    leader_status: Option<LeaderStatus>,
    sent_result_to_leader: Option<(usize, Buf32)>,
    posted_result_txid: Option<Buf32>,
    next_pull_inclusion_deadline: Option<Instant>,
    consensus_stage: StageState,
    pending_non_leader_batch: Option<PendingNonLeaderBatch>,
    /// A non-leader's batch request ids once dispatched to the VM, kept
    /// around so they can be removed from the mempool on confirmed
    /// inclusion the same way `leader_status.reqs` is for the leader.
    processing_reqs: Option<Vec<RequestId>>,
}

/// Delivered by a VM worker thread back onto the operator's own event
/// channel as a `ConsensusEvent::VMResult`.
pub struct VmOutcome {
    pub state_index: u64,
    pub result: Result<VmResult, covenant_vm::VmError>,
}

impl<C: Committee> OperatorState<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: Params,
        committee: Arc<C>,
        mempool: Arc<Mempool>,
        ledger: Arc<dyn LedgerClient>,
        processor: Arc<dyn RequestProcessor>,
        vm_pool: threadpool::ThreadPool,
        vm_result_tx: std_mpsc::Sender<VmOutcome>,
        fee_destination: AgentId,
    ) -> Self {
        let current_state = VirtualState::genesis();
        let peer_permutation = leader::permutation_for(&current_state.state_hash(), committee.size());
        Self {
            params,
            committee,
            mempool,
            ledger,
            processor,
            vm_pool,
            vm_result_tx,
            fee_destination,
            current_state,
            state_output: None,
            peer_permutation,
            leader_rotation: 0,
            leader_wait_deadline: None,
            leader_status: None,
            sent_result_to_leader: None,
            posted_result_txid: None,
            next_pull_inclusion_deadline: None,
            consensus_stage: StageState::new(),
            pending_non_leader_batch: None,
            processing_reqs: None,
        }
    }

    pub fn stage(&self) -> ConsensusStage {
        self.consensus_stage.stage
    }

    #[cfg(test)]
    pub fn leader_for_test(&self) -> usize {
        self.leader_for(self.block_index())
    }

    #[cfg(test)]
    pub fn leader_essence_hash_for_test(&self) -> Option<Buf32> {
        self.leader_status.as_ref().and_then(|s| s.essence_hash())
    }

    #[cfg(test)]
    pub fn posted_txid_for_test(&self) -> Option<Buf32> {
        self.posted_result_txid
    }

    fn block_index(&self) -> u64 {
        self.current_state.block_index()
    }

    fn my_index(&self) -> usize {
        self.committee.my_index()
    }

    fn quorum(&self) -> usize {
        self.committee.quorum()
    }

    /// The current candidate leader for `state_index`, accounting for any
    /// rotations past dead candidates within this state index.
    fn leader_for(&self, state_index: u64) -> usize {
        let base = state_index as usize % self.peer_permutation.len();
        let rotated = (base + self.leader_rotation) % self.peer_permutation.len();
        self.peer_permutation[rotated]
    }

    fn is_leader(&self, state_index: u64) -> bool {
        self.leader_for(state_index) == self.my_index()
    }

    fn set_stage(&mut self, stage: ConsensusStage, timeout: Option<Duration>) {
        info!(?stage, block_index = self.block_index(), "consensus stage transition");
        self.consensus_stage.set(stage, timeout);
    }

    fn to_synced(&mut self) {
        self.leader_status = None;
        self.sent_result_to_leader = None;
        self.posted_result_txid = None;
        self.pending_non_leader_batch = None;
        self.processing_reqs = None;
        self.set_stage(ConsensusStage::Synced, None);
        self.leader_wait_deadline = if self.is_leader(self.block_index()) {
            None
        } else {
            Some(Instant::now() + self.params.batch().leader_rotation_timeout)
        };
    }

    /// Processes one inbound event to completion. Never blocks: VM
    /// dispatch and peer sends are fire-and-forget.
    pub fn handle_event(&mut self, event: ConsensusEvent) -> Result<(), ConsensusError> {
        match event {
            ConsensusEvent::StateTransition(t) => self.on_state_transition(t),
            ConsensusEvent::Request(req) => {
                self.mempool.receive(req);
                Ok(())
            }
            ConsensusEvent::NotifyReq { from_peer, msg } => self.on_notify_req(from_peer, msg),
            ConsensusEvent::StartProcessingBatch { from_peer, msg } => {
                self.on_start_processing_batch(from_peer, msg)
            }
            ConsensusEvent::VMResult(outcome) => self.on_vm_result(outcome),
            ConsensusEvent::SignedHash { from_peer, msg } => self.on_signed_hash(from_peer, msg),
            ConsensusEvent::NotifyFinalResultPosted { from_peer, msg } => {
                self.on_notify_final_result_posted(from_peer, msg)
            }
            ConsensusEvent::InclusionState { tx_id, state } => self.on_inclusion_state(tx_id, state),
            ConsensusEvent::TimerTick => self.on_timer_tick(),
        }
    }

    fn on_state_transition(
        &mut self,
        t: covenant_state_manager::prelude::StateTransitionMsg,
    ) -> Result<(), ConsensusError> {
        self.current_state = t.virtual_state;
        self.state_output = Some(t.state_output);
        self.peer_permutation =
            leader::permutation_for(&self.current_state.state_hash(), self.committee.size());
        self.leader_rotation = 0;
        self.mempool.clear_seen_marks();
        self.to_synced();

        if self.is_leader(self.block_index()) {
            self.try_propose_batch()?;
        }
        Ok(())
    }

    fn try_propose_batch(&mut self) -> Result<(), ConsensusError> {
        let quorum_minus_one = self.quorum().saturating_sub(1);
        let mut ready = self.mempool.ready_list(quorum_minus_one);
        if ready.is_empty() {
            self.set_stage(
                ConsensusStage::Synced,
                Some(self.params.batch().empty_batch_retry_interval),
            );
            return Ok(());
        }
        ready.truncate(self.params.batch().max_batch_size);

        let prior_timestamp = self.state_output.as_ref().map(|o| o.l1_timestamp_ns).unwrap_or(0);
        let timestamp_ns = std::cmp::max(prior_timestamp + 1, now_ns());
        let mut ids: Vec<RequestId> = ready.iter().map(|r| r.id()).collect();
        ids.sort();
        let batch_hash_val = batch_hash(&ids, timestamp_ns, &self.current_state.state_hash());

        self.committee.send_to_all(WireMessage::StartProcessingBatch(StartProcessingBatch {
            state_index: self.block_index() as u32,
            timestamp_ns,
            batch_hash: batch_hash_val,
            fee_destination: self.fee_destination,
            request_ids: ids.clone(),
        }));

        let (reqs, all_present) = self.mempool.take_all_ready(&ids);
        if !all_present {
            // The leader proposes only what its own mempool already holds
            // ready, so this should not happen; treat as a protocol bug.
            self.to_synced();
            return Err(ConsensusError::MissingRequest(ids[0]));
        }

        self.leader_status = Some(LeaderStatus {
            reqs: ids.clone(),
            batch_hash: batch_hash_val,
            result_tx_essence: None,
            finalized: false,
            signed_results: Vec::new(),
            pending_votes: Vec::new(),
        });
        self.set_stage(ConsensusStage::ProposalSent, Some(self.params.timing().stage_timeout));

        self.dispatch_vm(reqs, timestamp_ns);
        self.set_stage(ConsensusStage::VMStarted, Some(self.params.timing().stage_timeout));
        Ok(())
    }

    /// Hands a ready batch off to a worker thread. Completion re-enters
    /// this operator as a `ConsensusEvent::VMResult`, delivered via
    /// `vm_result_tx`; the caller is responsible for forwarding it onto
    /// the operator's own event channel.
    fn dispatch_vm(&self, requests: Vec<covenant_request::Request>, timestamp_ns: i64) {
        let state_index = self.block_index();
        let virtual_state = self.current_state.clone();
        let chain_input_balance = self.state_output.as_ref().map(|o| o.balance).unwrap_or(0);
        let processor = self.processor.clone();
        let result_tx = self.vm_result_tx.clone();

        self.vm_pool.execute(move || {
            let task = VmTask {
                requests,
                virtual_state,
                timestamp_ns,
                chain_input_balance,
                expected_output_balance: None,
            };
            let result = covenant_vm::run(&task, processor.as_ref());
            let _ = result_tx.send(VmOutcome { state_index, result });
        });
    }

    fn on_notify_req(&mut self, from_peer: usize, msg: NotifyReq) -> Result<(), ConsensusError> {
        if msg.state_index as u64 != self.block_index() {
            return Ok(());
        }
        for id in msg.request_ids {
            self.mempool.mark_seen(id, from_peer);
        }
        Ok(())
    }

    fn on_start_processing_batch(
        &mut self,
        from_peer: usize,
        msg: StartProcessingBatch,
    ) -> Result<(), ConsensusError> {
        if msg.state_index as u64 != self.block_index() {
            return Ok(());
        }
        if from_peer != self.leader_for(self.block_index()) {
            warn!(from_peer, "StartProcessingBatch from non-leader, dropping");
            return Ok(());
        }

        let expected_hash = batch_hash(&msg.request_ids, msg.timestamp_ns, &self.current_state.state_hash());
        if expected_hash != msg.batch_hash {
            warn!("batch hash mismatch, dropping proposal and returning to Synced");
            self.to_synced();
            return Ok(());
        }

        let (reqs, all_present) = self.mempool.take_all_ready(&msg.request_ids);
        if !all_present {
            self.set_stage(ConsensusStage::ProposalReceived, Some(self.params.batch().arg_solid_interval));
            self.pending_non_leader_batch = Some(PendingNonLeaderBatch {
                deadline: Instant::now() + self.params.batch().arg_solid_interval,
                msg,
            });
            return Ok(());
        }

        self.processing_reqs = Some(msg.request_ids.clone());
        self.dispatch_vm(reqs, msg.timestamp_ns);
        self.set_stage(ConsensusStage::VMStarted, Some(self.params.timing().stage_timeout));
        Ok(())
    }

    fn on_vm_result(&mut self, outcome: VmOutcome) -> Result<(), ConsensusError> {
        if outcome.state_index != self.block_index() {
            return Ok(());
        }
        let result = match outcome.result {
            Ok(r) => r,
            Err(e) => {
                warn!(err = %e, "VM run failed, abandoning cycle");
                self.abandon_cycle();
                return Err(ConsensusError::Inconsistency(e));
            }
        };

        let essence_hash = result.result_transaction.essence_hash();
        let my_share = self.committee.signing_share().sign(essence_hash.as_slice());
        let my_idx = self.my_index();

        if let Some(leader_status) = &mut self.leader_status {
            leader_status.result_tx_essence = Some(result.result_transaction);
            if !leader_status.signed_results.iter().any(|(i, _)| *i == my_idx) {
                leader_status.signed_results.push((my_idx, my_share));
            }
            let matching_hash = essence_hash;
            let pending = std::mem::take(&mut leader_status.pending_votes);
            for (peer, hash, share) in pending {
                if hash == matching_hash && !leader_status.signed_results.iter().any(|(i, _)| *i == peer) {
                    leader_status.signed_results.push((peer, share));
                }
            }
            self.try_finalize()
        } else {
            let leader_idx = self.leader_for(self.block_index());
            self.committee.send_to(
                leader_idx,
                WireMessage::SignedHash(SignedHash {
                    state_index: self.block_index() as u32,
                    essence_hash,
                    sig_share: my_share,
                }),
            );
            self.sent_result_to_leader = Some((leader_idx, essence_hash));
            self.set_stage(ConsensusStage::SignatureSent, Some(self.params.timing().stage_timeout));
            Ok(())
        }
    }

    fn on_signed_hash(&mut self, from_peer: usize, msg: SignedHash) -> Result<(), ConsensusError> {
        if msg.state_index as u64 != self.block_index() {
            return Ok(());
        }
        let Some(leader_status) = &mut self.leader_status else {
            return Ok(());
        };
        match leader_status.essence_hash() {
            None => {
                // Our own VM run hasn't completed yet; hold this vote and
                // check it once we know which essence hash is authoritative.
                leader_status.pending_votes.push((from_peer, msg.essence_hash, msg.sig_share));
                return Ok(());
            }
            Some(h) if h == msg.essence_hash => {}
            _ => return Ok(()),
        }
        if !leader_status.signed_results.iter().any(|(i, _)| *i == from_peer) {
            leader_status.signed_results.push((from_peer, msg.sig_share));
        }
        self.try_finalize()
    }

    fn try_finalize(&mut self) -> Result<(), ConsensusError> {
        let quorum = self.quorum();
        let state_index = self.block_index();
        let (essence, shares) = {
            let Some(leader_status) = &self.leader_status else {
                return Ok(());
            };
            if leader_status.finalized || leader_status.signed_results.len() < quorum {
                return Ok(());
            }
            let Some(essence) = leader_status.result_tx_essence.clone() else {
                return Ok(());
            };
            let shares: Vec<Buf96> = leader_status.signed_results.iter().map(|(_, s)| *s).collect();
            (essence, shares)
        };

        let agg_sig = bls::aggregate(&shares)
            .map_err(|e| ConsensusError::FatalInvariant(format!("BLS aggregation failed: {e}")))?;

        if let Some(leader_status) = &mut self.leader_status {
            leader_status.finalized = true;
        }
        self.set_stage(ConsensusStage::ResultFinalized, None);

        let tx_bytes = (essence, agg_sig)
            .try_to_vec()
            .expect("essence+sig borsh encoding cannot fail");
        let tx_id = self.ledger.post_transaction(self.fee_destination.chain_id(), tx_bytes);
        self.posted_result_txid = Some(tx_id);

        self.committee.send_to_all(WireMessage::NotifyFinalResultPosted(NotifyFinalResultPosted {
            state_index: state_index as u32,
            tx_id,
        }));
        self.next_pull_inclusion_deadline = Some(Instant::now() + self.params.timing().inclusion_poll_interval);
        self.set_stage(ConsensusStage::TxPosted, None);
        Ok(())
    }

    fn on_notify_final_result_posted(
        &mut self,
        _from_peer: usize,
        msg: NotifyFinalResultPosted,
    ) -> Result<(), ConsensusError> {
        if msg.state_index as u64 != self.block_index() {
            return Ok(());
        }
        self.posted_result_txid = Some(msg.tx_id);
        self.next_pull_inclusion_deadline = Some(Instant::now() + self.params.timing().inclusion_poll_interval);
        self.set_stage(ConsensusStage::TxPosted, None);
        Ok(())
    }

    fn on_inclusion_state(&mut self, tx_id: Buf32, state: InclusionState) -> Result<(), ConsensusError> {
        if self.posted_result_txid != Some(tx_id) {
            return Ok(());
        }
        match state {
            InclusionState::Confirmed => {
                if let Some(leader_status) = &self.leader_status {
                    self.mempool.remove(&leader_status.reqs);
                } else if let Some(reqs) = self.processing_reqs.take() {
                    self.mempool.remove(&reqs);
                }
                // The state manager will soon observe the new anchor
                // output and post a StateTransition; we stay in TxPosted
                // until then rather than guessing the next state early.
            }
            InclusionState::Rejected => self.abandon_cycle(),
            InclusionState::Pending => {}
        }
        Ok(())
    }

    fn abandon_cycle(&mut self) {
        if let Some(leader_status) = self.leader_status.take() {
            self.mempool.unprotect(&leader_status.reqs);
        }
        if let Some(pending) = self.pending_non_leader_batch.take() {
            self.mempool.unprotect(&pending.msg.request_ids);
        }
        if let Some(reqs) = self.processing_reqs.take() {
            self.mempool.unprotect(&reqs);
        }
        self.to_synced();
    }

    fn on_timer_tick(&mut self) -> Result<(), ConsensusError> {
        let now = Instant::now();

        if self.consensus_stage.is_expired(now) {
            if self.consensus_stage.stage == ConsensusStage::Synced {
                if self.is_leader(self.block_index()) {
                    self.try_propose_batch()?;
                }
            } else {
                warn!(stage = ?self.consensus_stage.stage, "stage timed out, abandoning cycle");
                self.abandon_cycle();
            }
        }

        if self.consensus_stage.stage == ConsensusStage::Synced && !self.is_leader(self.block_index()) {
            if let Some(deadline) = self.leader_wait_deadline {
                if now >= deadline {
                    let dead_leader = self.leader_for(self.block_index());
                    if !self.committee.is_alive(dead_leader) {
                        self.leader_rotation += 1;
                        warn!(
                            dead_leader,
                            new_leader = self.leader_for(self.block_index()),
                            "leader rotation timeout elapsed with no proposal, advancing permutation"
                        );
                        if self.is_leader(self.block_index()) {
                            self.leader_wait_deadline = None;
                            self.try_propose_batch()?;
                        } else {
                            self.leader_wait_deadline =
                                Some(now + self.params.batch().leader_rotation_timeout);
                        }
                    } else {
                        self.leader_wait_deadline =
                            Some(now + self.params.batch().leader_rotation_timeout);
                    }
                }
            }
        }

        if let Some(pending) = self.pending_non_leader_batch.take() {
            if now >= pending.deadline {
                let (reqs, all_present) = self.mempool.take_all_ready(&pending.msg.request_ids);
                if all_present {
                    self.processing_reqs = Some(pending.msg.request_ids.clone());
                    self.dispatch_vm(reqs, pending.msg.timestamp_ns);
                    self.set_stage(ConsensusStage::VMStarted, Some(self.params.timing().stage_timeout));
                } else {
                    warn!("batch requests never solidified in time, abandoning cycle");
                    self.mempool.unprotect(&pending.msg.request_ids);
                    self.to_synced();
                }
            } else {
                self.pending_non_leader_batch = Some(pending);
            }
        }

        if let Some(deadline) = self.next_pull_inclusion_deadline {
            if now >= deadline {
                if let Some(tx_id) = self.posted_result_txid {
                    self.ledger.pull_inclusion_state(tx_id);
                }
                self.next_pull_inclusion_deadline = Some(now + self.params.timing().inclusion_poll_interval);
            }
        }

        Ok(())
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos() as i64
}

fn batch_hash(ids: &[RequestId], timestamp_ns: i64, state_hash: &Buf32) -> Buf32 {
    let mut ids_bytes = Vec::new();
    for id in ids {
        id.serialize(&mut ids_bytes).expect("borsh serialize cannot fail");
    }
    covenant_primitives::hash::concat(&[&ids_bytes, &timestamp_ns.to_be_bytes(), state_hash.as_slice()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_committee::{bls::SigningShare, dkshare::test_support::FakeCommittee};
    use covenant_ledger::test_support::FakeLedgerClient;
    use covenant_mempool::Mempool;
    use covenant_primitives::prelude::{BatchParams, ChainId, CommitteeParams, Hname, TimingParams};
    use covenant_request::{CallTarget, Request, RequestOrigin};
    use covenant_vm::NoopProcessor;
    use std::{collections::BTreeMap, thread, time::Duration as StdDuration};

    fn fast_params(committee_size: usize, quorum: usize) -> Params {
        Params::new(
            CommitteeParams::new(committee_size, quorum),
            TimingParams {
                operator_tick: StdDuration::from_millis(5),
                state_manager_tick: StdDuration::from_millis(5),
                stage_timeout: StdDuration::from_secs(30),
                inclusion_poll_interval: StdDuration::from_secs(30),
            },
            BatchParams {
                max_batch_size: 100,
                arg_solid_interval: StdDuration::from_millis(20),
                empty_batch_retry_interval: StdDuration::from_millis(500),
                leader_rotation_timeout: StdDuration::from_millis(20),
            },
        )
    }

    fn req(n: u8) -> Request {
        Request::new(
            RequestId::new_on_ledger(Buf32::from([n; 32]), 0),
            RequestOrigin::OnLedger { output_index: 0 },
            Buf32::from([n; 32]),
            AgentId::new(ChainId::new(Buf32::from([0xaa; 32])), Hname(1)),
            CallTarget {
                contract: Hname(1),
                entry_point: Hname(2),
            },
            false,
            Vec::new(),
            BTreeMap::new(),
        )
    }

    fn fee_destination() -> AgentId {
        AgentId::new(ChainId::new(Buf32::from([0xaa; 32])), Hname(9))
    }

    #[allow(clippy::type_complexity)]
    fn build_operator(
        params: Params,
        my_index: usize,
    ) -> (
        OperatorState<FakeCommittee>,
        Arc<FakeCommittee>,
        Arc<FakeLedgerClient>,
        Arc<Mempool>,
        std_mpsc::Receiver<VmOutcome>,
    ) {
        let committee_size = params.committee().size();
        let quorum = params.committee().quorum();
        let committee = Arc::new(FakeCommittee::new(
            committee_size,
            my_index,
            quorum,
            SigningShare::generate(),
            Vec::new(),
        ));
        let mempool = Arc::new(Mempool::new(committee_size));
        let ledger = Arc::new(FakeLedgerClient::default());
        let (vm_tx, vm_rx) = std_mpsc::channel();
        let op = OperatorState::new(
            params,
            committee.clone(),
            mempool.clone(),
            ledger.clone(),
            Arc::new(NoopProcessor),
            threadpool::ThreadPool::with_name("test-vm".into(), 1),
            vm_tx,
            fee_destination(),
        );
        (op, committee, ledger, mempool, vm_rx)
    }

    fn genesis_transition() -> covenant_state_manager::prelude::StateTransitionMsg {
        let vs = VirtualState::genesis();
        covenant_state_manager::prelude::StateTransitionMsg {
            virtual_state: vs.clone(),
            state_output: StateOutput {
                state_hash: vs.state_hash(),
                block_index: vs.block_index(),
                balance: 5_000_000,
                l1_timestamp_ns: 0,
            },
        }
    }

    fn recv_vm_result(rx: &std_mpsc::Receiver<VmOutcome>) -> VmOutcome {
        rx.recv_timeout(StdDuration::from_secs(2))
            .expect("VM worker should complete quickly")
    }

    /// Scenario 1 from the spec: happy path to a posted, finalized batch.
    #[test]
    fn happy_path_finalizes_and_posts_transaction() {
        let params = fast_params(4, 3);
        let genesis_hash = VirtualState::genesis().state_hash();
        let perm = leader::permutation_for(&genesis_hash, 4);
        let leader_idx = leader::leader_index(&perm, 0);

        let (mut op, committee, ledger, mempool, vm_rx) = build_operator(params, leader_idx);

        mempool.receive(req(1));
        mempool.receive(req(2));
        for peer in 0..3 {
            mempool.mark_seen(req(1).id(), peer);
            mempool.mark_seen(req(2).id(), peer);
        }

        // The transition clears last state index's seen marks, so the
        // first proposal attempt finds nothing ready and falls back to
        // the empty-batch retry timer instead of proposing immediately.
        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();
        assert_eq!(op.stage(), ConsensusStage::Synced);

        // Peers re-advertise their mempool contents for the new state
        // index; the next retry tick finds a ready batch and proposes.
        for peer in 0..3 {
            mempool.mark_seen(req(1).id(), peer);
            mempool.mark_seen(req(2).id(), peer);
        }
        thread::sleep(StdDuration::from_millis(520));
        op.handle_event(ConsensusEvent::TimerTick).unwrap();
        assert_eq!(op.stage(), ConsensusStage::VMStarted);
        assert!(committee
            .sent()
            .iter()
            .any(|(_, m)| matches!(m, WireMessage::StartProcessingBatch(_))));

        let outcome = recv_vm_result(&vm_rx);
        op.handle_event(ConsensusEvent::VMResult(outcome)).unwrap();
        assert!(ledger.posted.lock().is_empty(), "quorum not yet reached");

        let essence_hash = op.leader_essence_hash_for_test().expect("essence computed");
        let other_peers: Vec<usize> = (0..4).filter(|&i| i != leader_idx).take(2).collect();
        for peer in other_peers {
            let share = SigningShare::generate();
            let sig = share.sign(essence_hash.as_slice());
            op.handle_event(ConsensusEvent::SignedHash {
                from_peer: peer,
                msg: SignedHash {
                    state_index: 0,
                    essence_hash,
                    sig_share: sig,
                },
            })
            .unwrap();
        }

        assert_eq!(op.stage(), ConsensusStage::TxPosted);
        assert_eq!(ledger.posted.lock().len(), 1);
        let tx_id = op.posted_txid_for_test().expect("tx posted");
        assert!(committee
            .sent()
            .iter()
            .any(|(_, m)| matches!(m, WireMessage::NotifyFinalResultPosted(_))));

        op.handle_event(ConsensusEvent::InclusionState {
            tx_id,
            state: InclusionState::Confirmed,
        })
        .unwrap();
        assert!(!mempool.has(req(1).id()));
        assert!(!mempool.has(req(2).id()));
    }

    /// Scenario 2: a non-leader waits for a proposed batch's arguments to
    /// solidify before dispatching the VM.
    #[test]
    fn non_leader_waits_for_arg_solidification() {
        let params = fast_params(4, 3);
        let genesis_hash = VirtualState::genesis().state_hash();
        let perm = leader::permutation_for(&genesis_hash, 4);
        let leader_idx = leader::leader_index(&perm, 0);
        let my_index = (0..4).find(|&i| i != leader_idx).unwrap();

        let (mut op, _committee, _ledger, mempool, vm_rx) = build_operator(params, my_index);
        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();
        assert_eq!(op.stage(), ConsensusStage::Synced);

        let ids = vec![req(1).id()];
        let msg = StartProcessingBatch {
            state_index: 0,
            timestamp_ns: 1,
            batch_hash: batch_hash(&ids, 1, &genesis_hash),
            fee_destination: fee_destination(),
            request_ids: ids,
        };
        op.handle_event(ConsensusEvent::StartProcessingBatch { from_peer: leader_idx, msg })
            .unwrap();
        assert_eq!(op.stage(), ConsensusStage::ProposalReceived);

        // Request solidifies before the arg-solid deadline elapses.
        mempool.receive(req(1));
        thread::sleep(StdDuration::from_millis(25));
        op.handle_event(ConsensusEvent::TimerTick).unwrap();
        assert_eq!(op.stage(), ConsensusStage::VMStarted);
        recv_vm_result(&vm_rx);
    }

    /// A non-leader's batch requests must leave the mempool on confirmed
    /// inclusion just like the leader's do, not only get marked protected
    /// forever.
    #[test]
    fn non_leader_removes_processing_reqs_on_confirmed_inclusion() {
        let params = fast_params(4, 3);
        let genesis_hash = VirtualState::genesis().state_hash();
        let perm = leader::permutation_for(&genesis_hash, 4);
        let leader_idx = leader::leader_index(&perm, 0);
        let my_index = (0..4).find(|&i| i != leader_idx).unwrap();

        let (mut op, _committee, _ledger, mempool, vm_rx) = build_operator(params, my_index);
        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();

        mempool.receive(req(1));
        let ids = vec![req(1).id()];
        let msg = StartProcessingBatch {
            state_index: 0,
            timestamp_ns: 1,
            batch_hash: batch_hash(&ids, 1, &genesis_hash),
            fee_destination: fee_destination(),
            request_ids: ids,
        };
        op.handle_event(ConsensusEvent::StartProcessingBatch { from_peer: leader_idx, msg })
            .unwrap();
        assert_eq!(op.stage(), ConsensusStage::VMStarted);
        recv_vm_result(&vm_rx);

        let tx_id = Buf32::from([0x42; 32]);
        op.handle_event(ConsensusEvent::NotifyFinalResultPosted {
            from_peer: leader_idx,
            msg: NotifyFinalResultPosted { state_index: 0, tx_id },
        })
        .unwrap();
        assert_eq!(op.stage(), ConsensusStage::TxPosted);

        op.handle_event(ConsensusEvent::InclusionState { tx_id, state: InclusionState::Confirmed })
            .unwrap();
        assert!(!mempool.has(req(1).id()), "confirmed batch requests must leave the mempool");
    }

    /// Scenario 3: a dead leader is rotated past after the timeout.
    #[test]
    fn dead_leader_is_rotated_past() {
        let params = fast_params(2, 1);
        let genesis_hash = VirtualState::genesis().state_hash();
        let perm = leader::permutation_for(&genesis_hash, 2);
        let leader_idx = leader::leader_index(&perm, 0);
        let my_index = (0..2).find(|&i| i != leader_idx).unwrap();

        let (mut op, committee, _ledger, _mempool, _vm_rx) = build_operator(params, my_index);
        committee.kill_peer(leader_idx);

        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();
        assert_eq!(op.leader_for_test(), leader_idx);

        thread::sleep(StdDuration::from_millis(30));
        op.handle_event(ConsensusEvent::TimerTick).unwrap();

        // With a 2-member committee, rotating once past the dead leader
        // always lands on this node.
        assert_eq!(op.leader_for_test(), my_index);
    }

    /// Scenario 4: a locally-computed batch hash mismatch drops the
    /// proposal and keeps the cycle in Synced without dispatching a VM.
    #[test]
    fn batch_hash_mismatch_drops_proposal() {
        let params = fast_params(4, 3);
        let genesis_hash = VirtualState::genesis().state_hash();
        let perm = leader::permutation_for(&genesis_hash, 4);
        let leader_idx = leader::leader_index(&perm, 0);
        let my_index = (0..4).find(|&i| i != leader_idx).unwrap();

        let (mut op, _committee, _ledger, _mempool, vm_rx) = build_operator(params, my_index);
        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();

        let ids = vec![req(1).id()];
        let msg = StartProcessingBatch {
            state_index: 0,
            timestamp_ns: 1,
            batch_hash: Buf32::from([0xff; 32]), // wrong on purpose
            fee_destination: fee_destination(),
            request_ids: ids,
        };
        op.handle_event(ConsensusEvent::StartProcessingBatch { from_peer: leader_idx, msg })
            .unwrap();

        assert_eq!(op.stage(), ConsensusStage::Synced);
        assert!(vm_rx.try_recv().is_err(), "no VM task should have been dispatched");
    }

    /// Scenario 5: a rejected inclusion clears leader state and unprotects
    /// the batch's requests so they remain eligible for a future cycle.
    #[test]
    fn rejected_inclusion_unprotects_requests() {
        let params = fast_params(1, 1);
        let (mut op, _committee, ledger, mempool, vm_rx) = build_operator(params, 0);

        mempool.receive(req(1));
        mempool.mark_seen(req(1).id(), 0);

        op.handle_event(ConsensusEvent::StateTransition(genesis_transition())).unwrap();
        assert_eq!(op.stage(), ConsensusStage::VMStarted);

        let outcome = recv_vm_result(&vm_rx);
        op.handle_event(ConsensusEvent::VMResult(outcome)).unwrap();
        assert_eq!(op.stage(), ConsensusStage::TxPosted);

        let tx_id = op.posted_txid_for_test().expect("tx posted");
        assert_eq!(ledger.posted.lock().len(), 1);

        op.handle_event(ConsensusEvent::InclusionState { tx_id, state: InclusionState::Rejected })
            .unwrap();

        assert_eq!(op.stage(), ConsensusStage::Synced);
        assert!(mempool.has(req(1).id()));
        assert_eq!(mempool.ready_list(1).len(), 1, "unprotected request is ready again");
    }
}
