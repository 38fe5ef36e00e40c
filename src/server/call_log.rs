//! Call history REST handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Claims;
use super::db::StoreError;
use super::AppState;
use crate::models::*;

/// Rows returned when the client does not ask for a limit
const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

fn store_error(e: StoreError) -> StatusCode {
    match e {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        other => {
            tracing::error!("Call log error: {}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /api/calls/log`: the authenticated user is the caller
pub async fn log_call(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(req): Json<LogCallRequest>,
) -> Result<(StatusCode, Json<CallResponse>), StatusCode> {
    if req.receiver_id == claims.sub {
        return Err(StatusCode::BAD_REQUEST);
    }

    let call = state
        .calls
        .create(claims.sub, req.receiver_id, req.call_type, req.status)
        .await
        .map_err(store_error)?;

    tracing::info!(
        "Logged {} call {} from user {} to user {}",
        call.call_type.as_str(),
        call.id,
        call.caller_id,
        call.receiver_id
    );
    Ok((StatusCode::CREATED, Json(CallResponse { call })))
}

/// `PATCH /api/calls/{id}`
pub async fn update_call(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCallRequest>,
) -> Result<Json<CallResponse>, StatusCode> {
    if req.duration < 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let call = state
        .calls
        .update(id, claims.sub, req.status, req.duration)
        .await
        .map_err(store_error)?;

    tracing::info!("Call {} marked {} ({}s)", call.id, call.status.as_str(), call.duration_seconds);
    Ok(Json(CallResponse { call }))
}

/// `PATCH /api/calls/by-users/{caller_id}/{receiver_id}`: used by the side
/// that never learned the row id
pub async fn update_call_by_users(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path((caller_id, receiver_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateCallRequest>,
) -> Result<Json<CallResponse>, StatusCode> {
    if claims.sub != caller_id && claims.sub != receiver_id {
        return Err(StatusCode::FORBIDDEN);
    }
    if req.duration < 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let call = state
        .calls
        .update_latest_between(caller_id, receiver_id, req.status, req.duration)
        .await
        .map_err(store_error)?;

    tracing::info!("Call {} marked {} by user {}", call.id, call.status.as_str(), claims.sub);
    Ok(Json(CallResponse { call }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

/// `GET /api/calls/history`
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<CallHistoryResponse>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let calls = state
        .calls
        .history_for(claims.sub, limit)
        .await
        .map_err(store_error)?;

    Ok(Json(CallHistoryResponse { calls }))
}
