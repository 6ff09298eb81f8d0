//! Cross-store reconciliation: listing and lookup of merged entities drawn from the
//! operational and content stores, plus the consumer-facing [`Catalog`].

use chrono::{DateTime, Utc};
use hearth_core::EntityKind;
use hearth_mapping::{Entity, MergeError, MergedEntity};
use hearth_storage::{StoreError, StoreKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod batch;
pub mod catalog;
pub mod config;
pub mod filters;
pub mod reconciler;

pub use batch::BatchLookup;
pub use catalog::{Catalog, Stores};
pub use config::{HearthConfig, LogFormat, ReconcileConfig};
pub use filters::{
    ApplicationFilters, EventFilters, HouseFilters, ListFilter, RoomFilters, UserFilters,
};
pub use reconciler::{CrossReferenceIndex, Reconciler};

pub const CRATE_NAME: &str = "hearth-reconcile";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{entity} `{id}` exists in neither store")]
    NotFound { entity: EntityKind, id: String },
    #[error("{store} store unavailable during {entity} {operation}: {source}")]
    SourceUnavailable {
        entity: EntityKind,
        operation: &'static str,
        store: StoreKind,
        #[source]
        source: StoreError,
    },
    #[error("invalid request: {message}")]
    Validation { message: String },
    #[error("{entity} field `{field}` differs between the stores")]
    MergeConflict {
        entity: EntityKind,
        field: &'static str,
    },
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReconcileError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn operational(entity: EntityKind, operation: &'static str, source: StoreError) -> Self {
        ReconcileError::SourceUnavailable {
            entity,
            operation,
            store: StoreKind::Operational,
            source,
        }
    }

    pub(crate) fn content(entity: EntityKind, operation: &'static str, source: StoreError) -> Self {
        ReconcileError::SourceUnavailable {
            entity,
            operation,
            store: StoreKind::Content,
            source,
        }
    }
}

impl From<MergeError> for ReconcileError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::NoSource { entity } => ReconcileError::NotFound {
                entity,
                id: String::new(),
            },
            MergeError::Conflict { entity, field } => ReconcileError::MergeConflict { entity, field },
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// One window over a canonically sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Rows requested from each store: everything up to the end of the page plus one,
    /// always from offset zero.
    pub fn fetch_window(&self) -> usize {
        self.end().saturating_add(1)
    }

    pub fn validate(&self, config: &ReconcileConfig) -> ReconcileResult<()> {
        if self.limit == 0 || self.limit > config.max_page_size {
            return Err(ReconcileError::validation(format!(
                "limit must be between 1 and {}, got {}",
                config.max_page_size, self.limit
            )));
        }
        if self.fetch_window() > config.max_fetch_window {
            return Err(ReconcileError::validation(format!(
                "offset {} with limit {} reaches past the {}-row listing window",
                self.offset, self.limit, config.max_fetch_window
            )));
        }
        Ok(())
    }
}

/// Source of the wall-clock time handed to metric calculations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A page of merged entities. `degraded` marks pages served without content
/// enrichment because the content store failed or timed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Listing<E: Entity> {
    pub items: Vec<MergedEntity<E>>,
    pub has_more: bool,
    pub degraded: bool,
}
