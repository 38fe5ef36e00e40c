//! Call history database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{CallHistoryRecord, CallStatus, CallType};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Call not found")]
    NotFound,
    #[error("Corrupt call row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

#[async_trait]
pub trait CallLogStore: Send + Sync {
    async fn create(
        &self,
        caller_id: i64,
        receiver_id: i64,
        call_type: CallType,
        status: CallStatus,
    ) -> Result<CallHistoryRecord, StoreError>;

    /// Update a row the given user took part in
    async fn update(
        &self,
        id: i64,
        participant_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError>;

    /// Update the newest row between a caller and a receiver, preferring rows
    /// that are still `initiated`
    async fn update_latest_between(
        &self,
        caller_id: i64,
        receiver_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError>;

    /// Rows where the user is caller or receiver, newest first
    async fn history_for(&self, user_id: i64, limit: i64) -> Result<Vec<CallHistoryRecord>, StoreError>;
}

/// Terminal statuses close the row
fn ended_at_for(status: CallStatus) -> Option<DateTime<Utc>> {
    status.is_terminal().then(Utc::now)
}

// ============== PostgreSQL ==============

#[derive(sqlx::FromRow)]
struct CallRow {
    id: i64,
    caller_id: i64,
    receiver_id: i64,
    call_type: String,
    status: String,
    duration_seconds: i32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<CallRow> for CallHistoryRecord {
    type Error = StoreError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        let call_type = CallType::parse(&row.call_type).ok_or_else(|| StoreError::Corrupt {
            id: row.id,
            reason: format!("call type {:?}", row.call_type),
        })?;
        let status = CallStatus::parse(&row.status).ok_or_else(|| StoreError::Corrupt {
            id: row.id,
            reason: format!("status {:?}", row.status),
        })?;

        Ok(CallHistoryRecord {
            id: row.id,
            caller_id: row.caller_id,
            receiver_id: row.receiver_id,
            call_type,
            status,
            duration_seconds: row.duration_seconds,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(Clone)]
pub struct PgCallLog {
    pool: PgPool,
}

impl PgCallLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallLogStore for PgCallLog {
    async fn create(
        &self,
        caller_id: i64,
        receiver_id: i64,
        call_type: CallType,
        status: CallStatus,
    ) -> Result<CallHistoryRecord, StoreError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            INSERT INTO call_history (caller_id, receiver_id, call_type, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, caller_id, receiver_id, call_type, status,
                      duration_seconds, started_at, ended_at
            "#
        )
        .bind(caller_id)
        .bind(receiver_id)
        .bind(call_type.as_str())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(
        &self,
        id: i64,
        participant_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE call_history
            SET status = $3,
                duration_seconds = $4,
                ended_at = COALESCE($5, ended_at)
            WHERE id = $1 AND (caller_id = $2 OR receiver_id = $2)
            RETURNING id, caller_id, receiver_id, call_type, status,
                      duration_seconds, started_at, ended_at
            "#
        )
        .bind(id)
        .bind(participant_id)
        .bind(status.as_str())
        .bind(duration)
        .bind(ended_at_for(status))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn update_latest_between(
        &self,
        caller_id: i64,
        receiver_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE call_history
            SET status = $3,
                duration_seconds = $4,
                ended_at = COALESCE($5, ended_at)
            WHERE id = (
                SELECT id FROM call_history
                WHERE caller_id = $1 AND receiver_id = $2
                ORDER BY (status = 'initiated') DESC, started_at DESC, id DESC
                LIMIT 1
            )
            RETURNING id, caller_id, receiver_id, call_type, status,
                      duration_seconds, started_at, ended_at
            "#
        )
        .bind(caller_id)
        .bind(receiver_id)
        .bind(status.as_str())
        .bind(duration)
        .bind(ended_at_for(status))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn history_for(&self, user_id: i64, limit: i64) -> Result<Vec<CallHistoryRecord>, StoreError> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT id, caller_id, receiver_id, call_type, status,
                   duration_seconds, started_at, ended_at
            FROM call_history
            WHERE caller_id = $1 OR receiver_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT $2
            "#
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CallHistoryRecord::try_from).collect()
    }
}

// ============== In-memory ==============

#[derive(Default)]
pub struct MemoryCallLog {
    rows: RwLock<Vec<CallHistoryRecord>>,
}

impl MemoryCallLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply(record: &mut CallHistoryRecord, status: CallStatus, duration: i32) {
    record.status = status;
    record.duration_seconds = duration;
    if let Some(ended_at) = ended_at_for(status) {
        record.ended_at = Some(ended_at);
    }
}

#[async_trait]
impl CallLogStore for MemoryCallLog {
    async fn create(
        &self,
        caller_id: i64,
        receiver_id: i64,
        call_type: CallType,
        status: CallStatus,
    ) -> Result<CallHistoryRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let record = CallHistoryRecord {
            id: rows.len() as i64 + 1,
            caller_id,
            receiver_id,
            call_type,
            status,
            duration_seconds: 0,
            started_at: Utc::now(),
            ended_at: None,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        participant_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let record = rows
            .iter_mut()
            .find(|r| r.id == id && (r.caller_id == participant_id || r.receiver_id == participant_id))
            .ok_or(StoreError::NotFound)?;

        apply(record, status, duration);
        Ok(record.clone())
    }

    async fn update_latest_between(
        &self,
        caller_id: i64,
        receiver_id: i64,
        status: CallStatus,
        duration: i32,
    ) -> Result<CallHistoryRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let record = rows
            .iter_mut()
            .filter(|r| r.caller_id == caller_id && r.receiver_id == receiver_id)
            .max_by_key(|r| (r.status == CallStatus::Initiated, r.started_at, r.id))
            .ok_or(StoreError::NotFound)?;

        apply(record, status, duration);
        Ok(record.clone())
    }

    async fn history_for(&self, user_id: i64, limit: i64) -> Result<Vec<CallHistoryRecord>, StoreError> {
        let rows = self.rows.read().await;
        let mut calls: Vec<_> = rows
            .iter()
            .filter(|r| r.caller_id == user_id || r.receiver_id == user_id)
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        calls.truncate(limit.max(0) as usize);
        Ok(calls)
    }
}
