//! Maps the admin API's failure modes onto HTTP status codes.

use axum::{http::StatusCode, response::IntoResponse};
use covenant_chain::prelude::ChainError;
use covenant_primitives::prelude::ChainId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("malformed chain id: {0}")]
    BadChainId(String),

    #[error("chain not found: {0}")]
    NotFound(ChainId),

    #[error("chain record already exists: {0}")]
    Conflict(ChainId),
}

impl From<ChainError> for AdminError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::UnknownChain(id) => AdminError::NotFound(id),
            ChainError::AlreadyExists(id) => AdminError::Conflict(id),
            ChainError::Closed => AdminError::BadChainId("chain event loop closed".to_owned()),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AdminError::BadChainId(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Conflict(_) => StatusCode::CONFLICT,
        };
        (status, self.to_string()).into_response()
    }
}
