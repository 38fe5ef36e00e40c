use crate::api::{ApiClient, ApiError};
use crate::models::{CallHistoryRecord, CallHistoryResponse, CallResponse, LogCallRequest, UpdateCallRequest};

/// Create a history row for a call the authenticated user is placing
pub async fn log_call(client: &ApiClient, request: &LogCallRequest) -> Result<CallHistoryRecord, ApiError> {
    let response: CallResponse = client.post("/api/calls/log", request).await?;
    Ok(response.call)
}

pub async fn update_call(client: &ApiClient, id: i64, update: &UpdateCallRequest) -> Result<CallHistoryRecord, ApiError> {
    let response: CallResponse = client.patch(&format!("/api/calls/{}", id), update).await?;
    Ok(response.call)
}

/// Update the newest row between a caller and a receiver, for when the row id
/// is not known locally (the receiving side never sees it)
pub async fn update_call_by_users(
    client: &ApiClient,
    caller_id: i64,
    receiver_id: i64,
    update: &UpdateCallRequest,
) -> Result<CallHistoryRecord, ApiError> {
    let path = format!("/api/calls/by-users/{}/{}", caller_id, receiver_id);
    let response: CallResponse = client.patch(&path, update).await?;
    Ok(response.call)
}

pub async fn get_call_history(client: &ApiClient, limit: Option<u32>) -> Result<Vec<CallHistoryRecord>, ApiError> {
    let path = match limit {
        Some(limit) => format!("/api/calls/history?limit={}", limit),
        None => "/api/calls/history".to_string(),
    };
    let response: CallHistoryResponse = client.get(&path).await?;
    Ok(response.calls)
}
