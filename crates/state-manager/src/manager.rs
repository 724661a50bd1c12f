//! Block fetch/apply driver: maintains `current_state` and `state_output`,
//! fetches missing blocks from peers, and emits `StateTransition` events to
//! the operator when a new block is applied.

use std::{collections::BTreeMap, sync::Arc};

use borsh::BorshDeserialize;
use covenant_committee::prelude::{BlockHeader as WireBlockHeader, PeerGroupProvider, WireMessage};
use covenant_state::prelude::{StateOutput, VirtualState};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::message::{StateManagerMsg, StateTransitionMsg};

pub struct StateManager<P: PeerGroupProvider> {
    peers: Arc<P>,
    current_state: VirtualState,
    state_output: Option<StateOutput>,
    /// Headers received out of order, keyed by block index, awaiting their
    /// parent to arrive.
    pending: BTreeMap<u64, WireBlockHeader>,
    transitions_tx: broadcast::Sender<StateTransitionMsg>,
}

impl<P: PeerGroupProvider> StateManager<P> {
    pub fn new(peers: Arc<P>) -> (Self, broadcast::Receiver<StateTransitionMsg>) {
        let (tx, rx) = broadcast::channel(64);
        (
            Self {
                peers,
                current_state: VirtualState::genesis(),
                state_output: None,
                pending: BTreeMap::new(),
                transitions_tx: tx,
            },
            rx,
        )
    }

    pub fn current_state(&self) -> &VirtualState {
        &self.current_state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateTransitionMsg> {
        self.transitions_tx.subscribe()
    }

    /// Applies one inbound message, possibly emitting a state transition.
    pub fn process_msg(&mut self, msg: StateManagerMsg) {
        match msg {
            StateManagerMsg::EvidenceStateIndex(n) => self.handle_evidence(n),
            StateManagerMsg::PingPong(pp) => {
                if pp.state_index as u64 > self.current_state.block_index() {
                    self.handle_evidence(pp.state_index as u64);
                }
            }
            StateManagerMsg::GetBlock { peer_index, .. } => {
                // Responding to peers' fetch requests is handled by the
                // chain façade, which owns the persisted block store; the
                // state manager only tracks that the peer wanted it.
                debug!(peer_index, "ignoring inbound GetBlock: no block store here");
            }
            StateManagerMsg::BlockHeader(header) => self.handle_header(header),
            StateManagerMsg::StateOutput(output) => self.handle_state_output(output),
            StateManagerMsg::PendingBlock(pb) => {
                debug!(block_index = pb.block_index, "received pending block gossip");
            }
            StateManagerMsg::TimerTick => self.retry_pending(),
        }
    }

    fn handle_evidence(&mut self, n: u64) {
        if n > self.current_state.block_index() + 1 {
            info!(hinted = n, current = self.current_state.block_index(), "behind peers, requesting next block");
        }
        let next = self.current_state.block_index() + 1;
        if n >= next && !self.pending.contains_key(&next) {
            self.peers.send_to_all(WireMessage::GetBlock(covenant_committee::prelude::GetBlock {
                block_index: next,
            }));
        }
    }

    fn handle_header(&mut self, header: WireBlockHeader) {
        if header.block_index <= self.current_state.block_index() {
            debug!(block_index = header.block_index, "duplicate/stale header ignored");
            return;
        }
        if header.parent_state_hash != self.current_state.state_hash() {
            // Out of order: buffer it and wait for the parent to apply first.
            self.pending.insert(header.block_index, header);
            return;
        }
        self.apply_header(header);
        self.drain_pending();
    }

    fn apply_header(&mut self, header: WireBlockHeader) {
        let mutations: Vec<(Vec<u8>, Vec<u8>)> =
            match BorshDeserialize::try_from_slice(&header.block_bytes) {
                Ok(m) => m,
                Err(e) => {
                    warn!(err = %e, "malformed block body, dropping header");
                    return;
                }
            };
        let next = self.current_state.apply(&mutations);
        if next.state_hash() != header.state_hash {
            warn!(
                block_index = header.block_index,
                "header state hash does not match locally computed hash, dropping"
            );
            return;
        }
        self.current_state = next;
        info!(block_index = self.current_state.block_index(), "applied block");

        if let Some(output) = &self.state_output {
            if output.consistent_with(&self.current_state) {
                let _ = self.transitions_tx.send(StateTransitionMsg {
                    virtual_state: self.current_state.clone(),
                    state_output: output.clone(),
                });
            }
        }
    }

    fn handle_state_output(&mut self, output: StateOutput) {
        let consistent = output.consistent_with(&self.current_state);
        self.state_output = Some(output.clone());
        if consistent {
            let _ = self.transitions_tx.send(StateTransitionMsg {
                virtual_state: self.current_state.clone(),
                state_output: output,
            });
        }
    }

    fn drain_pending(&mut self) {
        loop {
            let next = self.current_state.block_index() + 1;
            match self.pending.remove(&next) {
                Some(header) if header.parent_state_hash == self.current_state.state_hash() => {
                    self.apply_header(header);
                }
                Some(header) => {
                    // Parent still doesn't match; put it back and stop.
                    self.pending.insert(next, header);
                    break;
                }
                None => break,
            }
        }
    }

    fn retry_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let next = self.current_state.block_index() + 1;
        if self.pending.contains_key(&next) {
            // We have the header but are stuck waiting on our own hash
            // check; nothing more to do until a correct header arrives.
            return;
        }
        self.peers.send_to_all(WireMessage::GetBlock(covenant_committee::prelude::GetBlock {
            block_index: next,
        }));
    }
}

/// Runs the state manager's event loop on the calling thread until the
/// channel closes. Mirrors the chain operator's single-threaded,
/// cooperative scheduling model (see crate docs on the consensus core).
pub fn state_manager_task<P: PeerGroupProvider>(
    mut manager: StateManager<P>,
    mut rx: mpsc::Receiver<StateManagerMsg>,
) {
    while let Some(msg) = rx.blocking_recv() {
        manager.process_msg(msg);
    }
    info!("state manager event loop exiting");
}
