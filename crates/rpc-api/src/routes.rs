//! Routes and handlers for the admin HTTP interface: activating and
//! deactivating chains, and creating/inspecting their persisted records.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use covenant_chain::prelude::{ChainSpawner, Chains};
use covenant_primitives::prelude::ChainId;
use tower_http::trace::TraceLayer;

use crate::{dto::ChainRecordDto, error::AdminError};

#[derive(Clone)]
struct AppState {
    chains: Arc<Chains>,
    spawner: ChainSpawner,
}

/// Builds the admin HTTP router. `spawner` constructs a chain's component
/// set on demand, given node-local collaborators (the committee
/// implementation, the request processor) that this crate has no opinion
/// on; `chains` owns the persisted activation records and running chains.
pub fn router(chains: Arc<Chains>, spawner: ChainSpawner) -> Router {
    let state = AppState { chains, spawner };
    Router::new()
        .route("/adm/chain/:chain_id/activate", post(activate_chain))
        .route("/adm/chain/:chain_id/deactivate", post(deactivate_chain))
        .route("/adm/chainrecord", put(put_chain_record).get(list_chain_records))
        .route("/adm/chainrecord/:chain_id", get(get_chain_record))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_chain_id(raw: &str) -> Result<ChainId, AdminError> {
    ChainId::from_base58(raw).map_err(|_| AdminError::BadChainId(raw.to_owned()))
}

async fn activate_chain(
    State(state): State<AppState>,
    Path(chain_id_raw): Path<String>,
) -> Result<StatusCode, AdminError> {
    let chain_id = parse_chain_id(&chain_id_raw)?;
    let spawner = state.spawner.clone();
    state.chains.activate(chain_id, move || spawner(chain_id))?;
    Ok(StatusCode::OK)
}

async fn deactivate_chain(
    State(state): State<AppState>,
    Path(chain_id_raw): Path<String>,
) -> Result<StatusCode, AdminError> {
    let chain_id = parse_chain_id(&chain_id_raw)?;
    state.chains.deactivate(chain_id)?;
    Ok(StatusCode::OK)
}

async fn put_chain_record(
    State(state): State<AppState>,
    Json(dto): Json<ChainRecordDto>,
) -> Result<StatusCode, AdminError> {
    state.chains.put_record(dto.into())?;
    Ok(StatusCode::CREATED)
}

async fn get_chain_record(
    State(state): State<AppState>,
    Path(chain_id_raw): Path<String>,
) -> Result<Json<ChainRecordDto>, AdminError> {
    let chain_id = parse_chain_id(&chain_id_raw)?;
    let record = state.chains.record(chain_id).ok_or(AdminError::NotFound(chain_id))?;
    Ok(Json(record.into()))
}

async fn list_chain_records(State(state): State<AppState>) -> Json<Vec<ChainRecordDto>> {
    Json(state.chains.records().into_iter().map(ChainRecordDto::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use covenant_chain::chain::Chain;
    use covenant_chain::chains::test_support::InMemoryChainRecordStore;
    use covenant_committee::prelude::LoopbackCommittee;
    use covenant_ledger::test_support::FakeLedgerClient;
    use covenant_primitives::prelude::{AgentId, BatchParams, Buf32, CommitteeParams, Hname, Params, TimingParams};
    use covenant_state::prelude::ChainRecord;
    use covenant_tasks::TaskManager;
    use covenant_vm::NoopProcessor;
    use tower::ServiceExt;

    fn solo_params() -> Params {
        Params::new(CommitteeParams::new(1, 1), TimingParams::default(), BatchParams::default())
    }

    fn test_app() -> (Router, ChainId) {
        let chain_id = ChainId::new(Buf32::from([9u8; 32]));
        let ledger = Arc::new(FakeLedgerClient::default());
        let store = Arc::new(InMemoryChainRecordStore::default());
        let chains = Arc::new(Chains::new(ledger.clone(), store));
        chains.put_record(ChainRecord::new(chain_id)).unwrap();

        let rt = tokio::runtime::Handle::current();
        let task_manager = Box::leak(Box::new(TaskManager::new(rt)));
        let executor = task_manager.executor();

        let spawner: ChainSpawner = Arc::new(move |id: ChainId| {
            Chain::spawn(
                id,
                solo_params(),
                Arc::new(LoopbackCommittee::new()),
                ledger.clone(),
                Arc::new(NoopProcessor),
                AgentId::new(id, Hname(1)),
                &executor,
            )
        });

        (router(chains, spawner), chain_id)
    }

    #[tokio::test]
    async fn activate_then_deactivate_roundtrip() {
        let (app, chain_id) = test_app();
        let path = format!("/adm/chain/{}/activate", chain_id.to_base58());
        let resp = app
            .clone()
            .oneshot(Request::builder().method("POST").uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let path = format!("/adm/chain/{}/deactivate", chain_id.to_base58());
        let resp = app
            .oneshot(Request::builder().method("POST").uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn activate_unknown_chain_is_404() {
        let (app, _) = test_app();
        let unknown = ChainId::new(Buf32::from([0xffu8; 32])).to_base58();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/adm/chain/{unknown}/activate"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn activate_bad_chain_id_is_400() {
        let (app, _) = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/adm/chain/not-base58!!!/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_duplicate_chain_record_is_409() {
        let (app, chain_id) = test_app();
        let body = serde_json::to_vec(&ChainRecordDto { chain_id, active: false }).unwrap();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/adm/chainrecord")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
