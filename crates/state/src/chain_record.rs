//! Persisted record of a chain's activation state.

use covenant_primitives::prelude::{ChainId, CHAIN_ID_LEN};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainRecordError {
    #[error("chain record too short: expected at least {0} bytes, got {1}")]
    TooShort(usize, usize),

    #[error("chain record has trailing bytes: expected {0}, got {1}")]
    TrailingBytes(usize, usize),

    #[error("invalid active flag byte: {0:#x}")]
    InvalidActiveByte(u8),
}

/// `{chain_id, active}`. Created by the admin interface, flipped by
/// activate/deactivate, and otherwise opaque to the operator.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ChainRecord {
    pub chain_id: ChainId,
    pub active: bool,
}

impl ChainRecord {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            active: false,
        }
    }

    /// Wire form: `alias_address || bool(active)`, i.e. the chain id's
    /// fixed-length bytes followed by a single 0x00/0x01 byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHAIN_ID_LEN + 1);
        out.extend_from_slice(self.chain_id.as_bytes());
        out.push(self.active as u8);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, ChainRecordError> {
        if buf.len() < CHAIN_ID_LEN + 1 {
            return Err(ChainRecordError::TooShort(CHAIN_ID_LEN + 1, buf.len()));
        }
        if buf.len() > CHAIN_ID_LEN + 1 {
            return Err(ChainRecordError::TrailingBytes(CHAIN_ID_LEN + 1, buf.len()));
        }
        let chain_id = ChainId::new(
            covenant_primitives::prelude::Buf32::try_from(&buf[..CHAIN_ID_LEN])
                .expect("length checked above"),
        );
        let active = match buf[CHAIN_ID_LEN] {
            0 => false,
            1 => true,
            other => return Err(ChainRecordError::InvalidActiveByte(other)),
        };
        Ok(Self { chain_id, active })
    }
}
