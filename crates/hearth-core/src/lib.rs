//! Core data model for hearth: operational rows, content documents and the
//! provenance-bearing field type shared by every merged entity.

use serde::{Deserialize, Serialize};

pub mod query;
pub mod records;

pub use query::{
    CompareOp, Condition, ContentCondition, ContentOp, ContentQuery, FilterValue, OpFilter, Sort,
    SortDirection,
};
pub use records::{
    ApplicationAnswer, ApplicationDoc, ApplicationRow, ApplicationStatus, EventDoc, EventRow,
    EventStatus, HouseDoc, HouseRow, HouseStatus, ParticipationRecord, ParticipationStatus,
    RoomDoc, RoomRow, RoomStatus, RoomType, UnknownVariant, UserDoc, UserRole, UserRow,
};

pub const CRATE_NAME: &str = "hearth-core";

/// Business entity families reconciled across both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    House,
    Room,
    Event,
    User,
    Application,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::House => "house",
            EntityKind::Room => "room",
            EntityKind::Event => "event",
            EntityKind::User => "user",
            EntityKind::Application => "application",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stores contributed to a merged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Operational,
    Content,
    Both,
}

impl Source {
    pub fn classify(has_operational: bool, has_content: bool) -> Option<Self> {
        match (has_operational, has_content) {
            (true, true) => Some(Source::Both),
            (true, false) => Some(Source::Operational),
            (false, true) => Some(Source::Content),
            (false, false) => None,
        }
    }
}

/// Where a merged field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    Operational,
    Content,
    Lookup,
    #[default]
    Default,
}

/// How a source value is laid over an existing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Any present source value replaces the current one.
    Replace,
    /// Only fields still carrying their declared default are replaced.
    FillDefaults,
    /// Both sides must carry the same value when both define it.
    Agree,
}

/// Raised by [`OverlayMode::Agree`] when two sources disagree on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConflict;

/// Merged field wrapper with optional value + provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field<T> {
    pub value: Option<T>,
    pub origin: FieldOrigin,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Field<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            origin: FieldOrigin::Default,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Self {
            value: Some(value),
            origin: FieldOrigin::Default,
        }
    }

    pub fn with_origin(value: Option<T>, origin: FieldOrigin) -> Self {
        match value {
            Some(value) => Self {
                value: Some(value),
                origin,
            },
            None => Self::empty(),
        }
    }

    pub fn operational(value: T) -> Self {
        Self::with_origin(Some(value), FieldOrigin::Operational)
    }

    pub fn content(value: T) -> Self {
        Self::with_origin(Some(value), FieldOrigin::Content)
    }

    pub fn lookup(value: T) -> Self {
        Self::with_origin(Some(value), FieldOrigin::Lookup)
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_default(&self) -> bool {
        self.origin == FieldOrigin::Default
    }
}

impl<T: Clone + PartialEq> Field<T> {
    /// Lay `src` over `self`, tagging the result with `origin`. A source without a
    /// value never clears an existing one.
    pub fn overlay(
        &mut self,
        src: &Field<T>,
        origin: FieldOrigin,
        mode: OverlayMode,
    ) -> Result<(), FieldConflict> {
        let Some(value) = &src.value else {
            return Ok(());
        };
        match mode {
            OverlayMode::Replace => {}
            OverlayMode::FillDefaults => {
                if !self.is_default() {
                    return Ok(());
                }
            }
            OverlayMode::Agree => {
                if !self.is_default() {
                    return match &self.value {
                        Some(current) if current != value => Err(FieldConflict),
                        _ => Ok(()),
                    };
                }
            }
        }
        self.value = Some(value.clone());
        self.origin = origin;
        Ok(())
    }
}

impl Field<String> {
    /// Value text or the empty string.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// A row from the operational (relational) store.
pub trait OperationalRecord: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    /// Cross-reference key pointing at the content-store counterpart.
    fn content_ref(&self) -> Option<&str>;
    /// Column value for in-memory filter evaluation.
    fn field(&self, column: &str) -> Option<FilterValue>;
}

/// A document from the content (headless) store.
pub trait ContentRecord: Clone + Send + Sync + 'static {
    const CONTENT_TYPE: &'static str;

    fn content_id(&self) -> &str;
    fn field(&self, name: &str) -> Option<FilterValue>;
}
