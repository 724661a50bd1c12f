//! Admin HTTP interface: activates/deactivates chains and manages their
//! persisted records, mirrored one-to-one onto axum routes.

pub mod dto;
pub mod error;
pub mod routes;

pub mod prelude {
    pub use crate::{dto::ChainRecordDto, error::AdminError, routes::router};
}
