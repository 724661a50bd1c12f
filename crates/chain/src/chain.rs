//! One running chain: wires the mempool, committee, ledger client, state
//! manager and operator together, and dispatches inbound events onto the
//! right component's channel. Mirrors the consensus core's single-
//! threaded, cooperative-event-loop model (see `covenant-consensus`):
//! the operator and the state manager each own exactly one consumer
//! thread, bridged to each other only through channels.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc as std_mpsc, Arc,
};

use covenant_committee::prelude::{Committee, WireMessage};
use covenant_consensus::prelude::{ConsensusEvent, OperatorState, VmOutcome};
use covenant_ledger::{InclusionState, LedgerClient};
use covenant_mempool::Mempool;
use covenant_primitives::prelude::{AgentId, Buf32, ChainId, Params};
use covenant_request::Request;
use covenant_state::prelude::StateOutput;
use covenant_state_manager::prelude::{state_manager_task, StateManager, StateManagerMsg};
use covenant_tasks::TaskExecutor;
use covenant_vm::RequestProcessor;
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::ChainError;

/// A chain's running component set, plus the narrow surface the registry
/// and the admin API need: its id, its mempool (for inspection) and a way
/// to hand it inbound events.
pub struct Chain {
    chain_id: ChainId,
    mempool: Arc<Mempool>,
    ledger: Arc<dyn LedgerClient>,
    consensus_tx: std_mpsc::Sender<ConsensusEvent>,
    state_mgr_tx: mpsc::Sender<StateManagerMsg>,
    dismissed: Arc<AtomicBool>,
}

impl Chain {
    /// Builds one chain's component set and spawns its event loops onto
    /// `executor`. Subscribes to the ledger client for `chain_id` as the
    /// final step, once every internal channel is wired up.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<C: Committee + 'static>(
        chain_id: ChainId,
        params: Params,
        committee: Arc<C>,
        ledger: Arc<dyn LedgerClient>,
        processor: Arc<dyn RequestProcessor>,
        fee_destination: AgentId,
        executor: &TaskExecutor,
    ) -> Arc<Self> {
        let mempool = Arc::new(Mempool::new(committee.size()));
        let (consensus_tx, consensus_rx) = std_mpsc::channel::<ConsensusEvent>();
        let (vm_result_tx, vm_result_rx) = std_mpsc::channel::<VmOutcome>();
        let (state_mgr_tx, state_mgr_rx) = mpsc::channel::<StateManagerMsg>(256);

        let mut operator = OperatorState::new(
            params,
            committee.clone(),
            mempool.clone(),
            ledger.clone(),
            processor,
            threadpool::ThreadPool::with_name(format!("vm-{chain_id}"), 2),
            vm_result_tx,
            fee_destination,
        );

        // The operator's own event loop: the single serialized consumer
        // of `consensus_rx`.
        executor.spawn_critical("chain-operator-loop", move |shutdown| {
            while !shutdown.should_shutdown() {
                match consensus_rx.recv_timeout(std::time::Duration::from_millis(200)) {
                    Ok(event) => {
                        if let Err(e) = operator.handle_event(event) {
                            warn!(err = %e, "consensus event failed");
                        }
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            Ok(())
        });

        // Bridges a VM worker's completion back onto the operator's
        // channel as a `ConsensusEvent::VMResult`.
        {
            let consensus_tx = consensus_tx.clone();
            executor.spawn_critical("chain-vm-result-forwarder", move |_shutdown| {
                while let Ok(outcome) = vm_result_rx.recv() {
                    if consensus_tx.send(ConsensusEvent::VMResult(outcome)).is_err() {
                        break;
                    }
                }
                Ok(())
            });
        }

        let (state_manager, mut transitions_rx) = StateManager::new(committee.clone());
        executor.spawn_critical("chain-state-manager-loop", move |_shutdown| {
            state_manager_task(state_manager, state_mgr_rx);
            Ok(())
        });

        // Bridges a completed block's state transition back onto the
        // operator's channel.
        {
            let consensus_tx = consensus_tx.clone();
            executor.spawn("chain-state-transition-forwarder", async move {
                while let Ok(msg) = transitions_rx.recv().await {
                    if consensus_tx.send(ConsensusEvent::StateTransition(msg)).is_err() {
                        break;
                    }
                }
            });
        }

        // Routes inbound peer messages to the operator or the state
        // manager depending on message type.
        {
            let consensus_tx = consensus_tx.clone();
            let state_mgr_tx = state_mgr_tx.clone();
            committee.on_peer_message(Arc::new(move |from_peer, msg| {
                route_peer_message(from_peer, msg, &consensus_tx, &state_mgr_tx);
            }));
        }

        ledger.subscribe(chain_id);

        Arc::new(Self {
            chain_id,
            mempool,
            ledger,
            consensus_tx,
            state_mgr_tx,
            dismissed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> ChainId {
        self.chain_id
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::SeqCst)
    }

    /// Tears down this chain: unsubscribes from the ledger client. The
    /// operator/state-manager loops exit on their own once the registry
    /// drops this `Chain` and its channel senders go away.
    pub fn dismiss(&self) {
        self.dismissed.store(true, Ordering::SeqCst);
        self.ledger.unsubscribe(self.chain_id);
    }

    /// A request arriving off-ledger, or lifted from an on-ledger output
    /// by the (out-of-scope) ledger client.
    pub fn receive_request(&self, req: Request) -> Result<(), ChainError> {
        self.consensus_tx
            .send(ConsensusEvent::Request(req))
            .map_err(|_| ChainError::Closed)
    }

    pub fn receive_inclusion_state(&self, tx_id: Buf32, state: InclusionState) -> Result<(), ChainError> {
        self.consensus_tx
            .send(ConsensusEvent::InclusionState { tx_id, state })
            .map_err(|_| ChainError::Closed)
    }

    pub async fn receive_state_output(&self, output: StateOutput) -> Result<(), ChainError> {
        self.state_mgr_tx
            .send(StateManagerMsg::StateOutput(output))
            .await
            .map_err(|_| ChainError::Closed)
    }

    /// Fans a single timer tick out to both the operator and the state
    /// manager's own loops.
    pub fn tick(&self) -> Result<(), ChainError> {
        self.consensus_tx
            .send(ConsensusEvent::TimerTick)
            .map_err(|_| ChainError::Closed)?;
        let _ = self.state_mgr_tx.try_send(StateManagerMsg::TimerTick);
        Ok(())
    }
}

fn route_peer_message(
    from_peer: usize,
    msg: WireMessage,
    consensus_tx: &std_mpsc::Sender<ConsensusEvent>,
    state_mgr_tx: &mpsc::Sender<StateManagerMsg>,
) {
    match msg {
        WireMessage::NotifyReq(msg) => {
            let _ = consensus_tx.send(ConsensusEvent::NotifyReq { from_peer, msg });
        }
        WireMessage::StartProcessingBatch(msg) => {
            let _ = consensus_tx.send(ConsensusEvent::StartProcessingBatch { from_peer, msg });
        }
        WireMessage::SignedHash(msg) => {
            let _ = consensus_tx.send(ConsensusEvent::SignedHash { from_peer, msg });
        }
        WireMessage::NotifyFinalResultPosted(msg) => {
            let _ = consensus_tx.send(ConsensusEvent::NotifyFinalResultPosted { from_peer, msg });
        }
        WireMessage::StateIndexPingPong(msg) => {
            let _ = state_mgr_tx.try_send(StateManagerMsg::PingPong(msg));
        }
        WireMessage::GetBlock(msg) => {
            let _ = state_mgr_tx.try_send(StateManagerMsg::GetBlock {
                peer_index: from_peer,
                block_index: msg.block_index,
            });
        }
        WireMessage::BlockHeader(msg) => {
            let _ = state_mgr_tx.try_send(StateManagerMsg::BlockHeader(msg));
        }
        WireMessage::PendingBlock(msg) => {
            let _ = state_mgr_tx.try_send(StateManagerMsg::PendingBlock(msg));
        }
        WireMessage::StateUpdate(msg) => {
            let _ = state_mgr_tx.try_send(StateManagerMsg::StateOutput(StateOutput {
                state_hash: msg.state_hash,
                block_index: msg.block_index,
                balance: msg.balance,
                l1_timestamp_ns: msg.l1_timestamp_ns,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_committee::prelude::LoopbackCommittee;
    use covenant_ledger::test_support::FakeLedgerClient;
    use covenant_primitives::prelude::{BatchParams, Buf32, ChainId, CommitteeParams, Hname, TimingParams};
    use covenant_vm::NoopProcessor;
    use std::time::Duration;

    fn test_params() -> Params {
        Params::new(
            CommitteeParams::new(1, 1),
            TimingParams::default(),
            BatchParams::default(),
        )
    }

    #[tokio::test]
    async fn spawn_wires_a_solo_chain_and_subscribes_to_the_ledger() {
        let rt_handle = tokio::runtime::Handle::current();
        let task_manager = covenant_tasks::TaskManager::new(rt_handle);
        let executor = task_manager.executor();

        let chain_id = ChainId::new(Buf32::from([7u8; 32]));
        let ledger = Arc::new(FakeLedgerClient::default());
        let committee = Arc::new(LoopbackCommittee::new());
        let fee_destination = AgentId::new(chain_id, Hname(1));

        let chain = Chain::spawn(
            chain_id,
            test_params(),
            committee,
            ledger.clone(),
            Arc::new(NoopProcessor),
            fee_destination,
            &executor,
        );

        assert_eq!(chain.id(), chain_id);
        assert!(ledger.subscribed.lock().contains(&chain_id));
        assert!(!chain.is_dismissed());

        chain.dismiss();
        assert!(chain.is_dismissed());
        assert!(!ledger.subscribed.lock().contains(&chain_id));

        // Let the spawned loops observe the closed channels and exit.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
