//! Store client contracts plus the Postgres, HTTP content and in-memory backends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::{
    ContentQuery, ContentRecord, OpFilter, OperationalRecord, ParticipationRecord, Sort,
};
use reqwest::StatusCode;
use thiserror::Error;

pub mod content;
pub mod memory;
pub mod postgres;

pub use content::{ContentDocument, ContentFetcher, ContentStoreConfig, HttpContentStore};
pub use memory::{MemoryCollection, MemoryParticipation, MemoryTable};
pub use postgres::{PgConfig, PgOperationalStore, PgRecord};

pub const CRATE_NAME: &str = "hearth-storage";

/// The two systems every merged entity is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Operational,
    Content,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Operational => f.write_str("operational"),
            StoreKind::Content => f.write_str("content"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("request failed after retries: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding {what}: {message}")]
    Decode { what: String, message: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn decode(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        StoreError::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Http(err) => err.is_timeout(),
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    /// Transport-level failures a read can safely be repeated after.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Http(err) => classify_reqwest_error(err) == RetryDisposition::Retryable,
            StoreError::HttpStatus { status, .. } => StatusCode::from_u16(*status)
                .map(|status| classify_status(status) == RetryDisposition::Retryable)
                .unwrap_or(false),
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            StoreError::Migrate(_) | StoreError::Decode { .. } | StoreError::Unavailable(_) => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed CRUD reads over one operational table.
#[async_trait]
pub trait OperationalTable<R: OperationalRecord>: Send + Sync {
    async fn query(
        &self,
        filter: &OpFilter,
        sort: Sort,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<R>>;

    async fn get(&self, id: &str) -> StoreResult<Option<R>>;

    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, R>>;

    /// Largest id list a single `batch_get` accepts.
    fn batch_limit(&self) -> Option<usize> {
        None
    }
}

/// Query-language reads over one content document type.
#[async_trait]
pub trait ContentCollection<D: ContentRecord>: Send + Sync {
    async fn query(&self, query: &ContentQuery, limit: usize, offset: usize)
        -> StoreResult<Vec<D>>;

    async fn get(&self, id: &str) -> StoreResult<Option<D>>;

    async fn batch_get(&self, ids: &[String]) -> StoreResult<Vec<D>>;

    fn batch_limit(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
pub trait ParticipationStore: Send + Sync {
    async fn get_for_user(&self, user_id: &str) -> StoreResult<Vec<ParticipationRecord>>;

    async fn upsert(&self, record: ParticipationRecord) -> StoreResult<ParticipationRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}
