//! JSON wire shapes for the admin HTTP interface. Kept separate from
//! `covenant_state::ChainRecord` so the on-disk wire format and the HTTP
//! JSON shape can evolve independently.

use covenant_primitives::prelude::ChainId;
use covenant_state::prelude::ChainRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecordDto {
    pub chain_id: ChainId,
    pub active: bool,
}

impl From<ChainRecord> for ChainRecordDto {
    fn from(r: ChainRecord) -> Self {
        Self {
            chain_id: r.chain_id,
            active: r.active,
        }
    }
}

impl From<ChainRecordDto> for ChainRecord {
    fn from(d: ChainRecordDto) -> Self {
        ChainRecord {
            chain_id: d.chain_id,
            active: d.active,
        }
    }
}
