use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::Caller,
    error::LedgerError,
    state::AppState,
    store::AccountSummary,
};

use super::dto::{AllocateRequest, ResourceResponse, SpendRequest};
use super::service::{self, Receipt};

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_resources))
        .route("/resources/by-id/:id", get(get_resource_by_id))
        .route("/resources/:name", get(get_resource))
        .route("/resources/:name/spend", post(spend_resource))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/allocations", post(allocate_resource))
        .route("/admin/accounts", get(list_accounts))
        .route(
            "/admin/accounts/:username/resources",
            get(account_resources),
        )
}

#[instrument(skip(state, caller))]
pub async fn list_resources(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ResourceResponse>>, LedgerError> {
    let rows = service::list_resources(state.store.as_ref(), &caller.0).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, caller))]
pub async fn get_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
) -> Result<Json<ResourceResponse>, LedgerError> {
    let resource = service::view(state.store.as_ref(), &caller.0, &name).await?;
    Ok(Json(resource.into()))
}

#[instrument(skip(state, caller))]
pub async fn get_resource_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceResponse>, LedgerError> {
    let resource = service::view_by_id(state.store.as_ref(), &caller.0, id).await?;
    Ok(Json(resource.into()))
}

#[instrument(skip(state, caller, payload))]
pub async fn spend_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
    Json(payload): Json<SpendRequest>,
) -> Result<Json<Receipt>, LedgerError> {
    let receipt = service::spend(state.store.as_ref(), &caller.0, &name, payload.amount).await?;
    Ok(Json(receipt))
}

#[instrument(skip(state, caller, payload))]
pub async fn allocate_resource(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<AllocateRequest>,
) -> Result<(StatusCode, HeaderMap, Json<ResourceResponse>), LedgerError> {
    let resource = service::allocate(
        state.store.as_ref(),
        &caller.0,
        &payload.to,
        &payload.name,
        payload.amount,
    )
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        format!("/resources/by-id/{}", resource.id)
            .parse()
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("location header: {e}")))?,
    );

    Ok((StatusCode::CREATED, headers, Json(resource.into())))
}

#[instrument(skip(state, caller))]
pub async fn list_accounts(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<AccountSummary>>, LedgerError> {
    let accounts = service::list_accounts(state.store.as_ref(), &caller.0).await?;
    Ok(Json(accounts))
}

#[instrument(skip(state, caller))]
pub async fn account_resources(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> Result<Json<Vec<ResourceResponse>>, LedgerError> {
    let rows = service::account_resources(state.store.as_ref(), &caller.0, &username).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
