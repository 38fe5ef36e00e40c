//! Call history persistence as seen by the orchestrator

use async_trait::async_trait;

use crate::api::{calls, ApiClient, ApiError};
use crate::models::{LogCallRequest, UpdateCallRequest};

/// Which history row an update applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryTarget {
    /// Row id returned when the call was logged
    Id(i64),
    /// Newest row between the two users, for the side that never saw the id
    Users { caller_id: i64, receiver_id: i64 },
}

#[async_trait]
pub trait CallHistory: Send + Sync {
    /// Create the `initiated` row and return its id
    async fn log_call(&self, request: &LogCallRequest) -> Result<i64, ApiError>;

    async fn update_call(&self, target: HistoryTarget, update: &UpdateCallRequest) -> Result<(), ApiError>;
}

/// History backed by the REST endpoints
#[derive(Clone)]
pub struct RestCallHistory {
    client: ApiClient,
}

impl RestCallHistory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallHistory for RestCallHistory {
    async fn log_call(&self, request: &LogCallRequest) -> Result<i64, ApiError> {
        let record = calls::log_call(&self.client, request).await?;
        Ok(record.id)
    }

    async fn update_call(&self, target: HistoryTarget, update: &UpdateCallRequest) -> Result<(), ApiError> {
        match target {
            HistoryTarget::Id(id) => calls::update_call(&self.client, id, update).await?,
            HistoryTarget::Users { caller_id, receiver_id } => {
                calls::update_call_by_users(&self.client, caller_id, receiver_id, update).await?
            }
        };
        Ok(())
    }
}
