//! Build handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use kiln_core::Error;
use kiln_core::build::{Build, BuildStatus, TriggerKind};
use kiln_core::ids::BuildId;
use kiln_core::task::BuildConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{ApiError, api_error};
use crate::state::AppState;

const INVALID_CONFIG: &str = "Invalid build configuration provided.";

#[derive(Deserialize)]
pub struct ListBuildsParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub message: String,
    pub build_id: BuildId,
    pub status: BuildStatus,
}

pub async fn trigger_build(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BuildConfig>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    trigger(&state, payload, TriggerKind::Manual).await
}

pub async fn trigger_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BuildConfig>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    trigger(&state, payload, TriggerKind::Webhook).await
}

async fn trigger(
    state: &AppState,
    payload: Result<Json<BuildConfig>, JsonRejection>,
    kind: TriggerKind,
) -> Result<Json<TriggerResponse>, ApiError> {
    let Json(config) = payload.map_err(|e| {
        warn!(error = %e, "Rejected build submission");
        api_error(StatusCode::BAD_REQUEST, INVALID_CONFIG)
    })?;

    let handle = state
        .orchestrator
        .trigger_build(config, kind)
        .await
        .map_err(|e| match e {
            Error::InvalidConfig(reason) => {
                warn!(reason = %reason, "Rejected build submission");
                api_error(StatusCode::BAD_REQUEST, INVALID_CONFIG)
            }
            other => {
                error!(error = %other, "Failed to trigger build");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;

    info!(build_id = %handle.id(), trigger = %kind, "Build triggered");

    Ok(Json(TriggerResponse {
        message: "Build triggered".to_string(),
        build_id: handle.id(),
        status: handle.build().status,
    }))
}

pub async fn list_builds(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListBuildsParams>,
) -> Result<Json<Vec<Build>>, ApiError> {
    let limit = params.limit.unwrap_or(state.list_limit);

    let builds = state.orchestrator.list_builds(limit).await.map_err(|e| {
        error!(error = %e, "Failed to list builds");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(builds))
}

pub async fn get_build(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Build>, ApiError> {
    let build_id: BuildId = id
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid build ID"))?;

    state
        .orchestrator
        .get_build(build_id)
        .await
        .map_err(|e| {
            error!(build_id = %build_id, error = %e, "Failed to load build");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Build not found"))
}
