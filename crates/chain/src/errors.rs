use thiserror::Error;

use covenant_primitives::prelude::ChainId;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain event loop is closed")]
    Closed,

    #[error("unknown chain id {0}")]
    UnknownChain(ChainId),

    #[error("chain record already exists: {0}")]
    AlreadyExists(ChainId),
}
