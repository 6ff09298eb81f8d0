//! Per-entity mapping: declarative precedence tables, one generic merge, and the
//! derived metrics attached to every merged entity.

use std::cmp::Ordering;
use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use hearth_core::{
    ContentRecord, EntityKind, FieldOrigin, FieldConflict, OperationalRecord, OverlayMode,
    ParticipationRecord, Sort, Source,
};
use serde::Serialize;
use thiserror::Error;

/// Builds a [`FieldRule`] for a struct field of the same name.
#[macro_export]
macro_rules! field_rule {
    ($field:ident, $winner:ident) => {
        $crate::FieldRule {
            name: stringify!($field),
            winner: $crate::Precedence::$winner,
            apply: |dst, src, origin, mode| dst.$field.overlay(&src.$field, origin, mode),
        }
    };
}

pub mod application;
pub mod event;
pub mod house;
pub mod room;
pub mod status;
pub mod user;

pub use application::{Application, ApplicationFields, ApplicationMetrics};
pub use event::{Event, EventFields, EventMetrics};
pub use house::{House, HouseFields, HouseMetrics};
pub use room::{Room, RoomFields, RoomMetrics};
pub use status::{describe, describe_raw, status_catalog, StatusColor, StatusDescriptor};
pub use user::{User, UserFields, UserMetrics};

pub const CRATE_NAME: &str = "hearth-mapping";

/// Which source decides a field when both define it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    Operational,
    Content,
    /// Both sources must carry the same value; a mismatch is a merge conflict.
    Agree,
}

/// One row of an entity's precedence table.
pub struct FieldRule<F> {
    pub name: &'static str,
    pub winner: Precedence,
    pub apply: fn(&mut F, &F, FieldOrigin, OverlayMode) -> Result<(), FieldConflict>,
}

impl<F> Debug for FieldRule<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("name", &self.name)
            .field("winner", &self.winner)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("cannot merge {entity}: neither store supplied a record")]
    NoSource { entity: EntityKind },
    #[error("{entity} field `{field}` differs between the operational and content stores")]
    Conflict {
        entity: EntityKind,
        field: &'static str,
    },
}

/// A business entity reconciled from one operational row and one content document.
pub trait Entity: Sized + Send + Sync + 'static {
    const KIND: EntityKind;

    type Operational: OperationalRecord;
    type Content: ContentRecord;
    type Fields: Clone + Debug + PartialEq + Default + Serialize + Send + Sync + 'static;
    type Metrics: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;

    fn precedence() -> &'static [FieldRule<Self::Fields>];

    /// Declared defaults, tagged [`FieldOrigin::Default`].
    fn defaults() -> Self::Fields;

    fn operational_fields(row: &Self::Operational) -> Self::Fields;

    fn content_fields(doc: &Self::Content) -> Self::Fields;

    fn metrics(fields: &Self::Fields, now: DateTime<Utc>) -> Self::Metrics;

    /// Store-side ordering that matches [`Entity::canonical_cmp`].
    fn operational_sort() -> Sort;

    fn content_order() -> Sort;

    fn canonical_cmp(a: &MergedEntity<Self>, b: &MergedEntity<Self>) -> Ordering {
        a.id.cmp(&b.id)
    }
}

/// Entities that reference a house and display its name.
pub trait HouseScoped: Entity {
    fn house_id(fields: &Self::Fields) -> Option<&str>;

    fn set_house_name(fields: &mut Self::Fields, name: Option<String>);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct MergedEntity<E: Entity> {
    pub id: String,
    pub kind: EntityKind,
    pub source: Source,
    pub operational_id: Option<String>,
    pub content_id: Option<String>,
    pub fields: E::Fields,
    pub metrics: E::Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_data: Option<ParticipationRecord>,
}

impl<E: Entity> MergedEntity<E> {
    pub fn with_participation(mut self, record: Option<ParticipationRecord>) -> Self {
        self.participation_data = record;
        self
    }

    /// Identities this entity answers to, operational first.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.operational_id
            .as_deref()
            .into_iter()
            .chain(self.content_id.as_deref())
    }
}

impl<E: HouseScoped> MergedEntity<E> {
    pub fn house_id(&self) -> Option<&str> {
        E::house_id(&self.fields)
    }

    pub fn with_house_name(mut self, name: Option<String>) -> Self {
        E::set_house_name(&mut self.fields, name);
        self
    }
}

fn layer<F>(fields: Option<&F>, origin: FieldOrigin) -> Option<(&F, FieldOrigin)> {
    fields.map(|f| (f, origin))
}

/// Merges one optional operational row with one optional content document.
pub fn merge<E: Entity>(
    op: Option<&E::Operational>,
    content: Option<&E::Content>,
    now: DateTime<Utc>,
) -> Result<MergedEntity<E>, MergeError> {
    let source = Source::classify(op.is_some(), content.is_some())
        .ok_or(MergeError::NoSource { entity: E::KIND })?;
    let op_fields = op.map(E::operational_fields);
    let content_fields = content.map(E::content_fields);

    let mut fields = E::defaults();
    for rule in E::precedence() {
        let op_layer = layer(op_fields.as_ref(), FieldOrigin::Operational);
        let content_layer = layer(content_fields.as_ref(), FieldOrigin::Content);
        let (loser, winner, winner_mode) = match rule.winner {
            Precedence::Operational => (content_layer, op_layer, OverlayMode::Replace),
            Precedence::Content => (op_layer, content_layer, OverlayMode::Replace),
            Precedence::Agree => (op_layer, content_layer, OverlayMode::Agree),
        };
        if let Some((src, origin)) = loser {
            apply_rule::<E>(rule, &mut fields, src, origin, OverlayMode::Replace)?;
        }
        if let Some((src, origin)) = winner {
            apply_rule::<E>(rule, &mut fields, src, origin, winner_mode)?;
        }
    }

    let operational_id = op.map(|row| row.id().to_string());
    let content_id = content.map(|doc| doc.content_id().to_string());
    let id = operational_id
        .clone()
        .or_else(|| content_id.clone())
        .unwrap_or_default();
    let metrics = E::metrics(&fields, now);
    Ok(MergedEntity {
        id,
        kind: E::KIND,
        source,
        operational_id,
        content_id,
        fields,
        metrics,
        participation_data: None,
    })
}

/// Lays a content document over an already merged entity. For an entity merged
/// from its operational row alone this yields the same value as merging both.
pub fn overlay_content<E: Entity>(
    merged: MergedEntity<E>,
    content: &E::Content,
    now: DateTime<Utc>,
) -> Result<MergedEntity<E>, MergeError> {
    let incoming = E::content_fields(content);
    let mut fields = merged.fields;
    for rule in E::precedence() {
        let mode = match rule.winner {
            Precedence::Operational => OverlayMode::FillDefaults,
            Precedence::Content => OverlayMode::Replace,
            Precedence::Agree => OverlayMode::Agree,
        };
        apply_rule::<E>(rule, &mut fields, &incoming, FieldOrigin::Content, mode)?;
    }

    let source = Source::classify(merged.operational_id.is_some(), true)
        .ok_or(MergeError::NoSource { entity: E::KIND })?;
    let content_id = Some(content.content_id().to_string());
    let id = merged
        .operational_id
        .clone()
        .or_else(|| content_id.clone())
        .unwrap_or_default();
    let metrics = E::metrics(&fields, now);
    Ok(MergedEntity {
        id,
        kind: E::KIND,
        source,
        operational_id: merged.operational_id,
        content_id,
        fields,
        metrics,
        participation_data: merged.participation_data,
    })
}

fn apply_rule<E: Entity>(
    rule: &FieldRule<E::Fields>,
    fields: &mut E::Fields,
    src: &E::Fields,
    origin: FieldOrigin,
    mode: OverlayMode,
) -> Result<(), MergeError> {
    (rule.apply)(fields, src, origin, mode).map_err(|FieldConflict| {
        tracing::warn!(entity = %E::KIND, field = rule.name, "store values disagree");
        MergeError::Conflict {
            entity: E::KIND,
            field: rule.name,
        }
    })
}

/// Whole calendar days from `now` to `date`; negative when `date` is past.
pub fn days_between(now: DateTime<Utc>, date: NaiveDate) -> i64 {
    (date - now.date_naive()).num_days()
}

/// `part / whole`, clamped to `0.0..=1.0`; zero when `whole` is not positive.
pub fn ratio(part: i32, whole: i32) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (f64::from(part) / f64::from(whole)).clamp(0.0, 1.0)
}

/// Orders two optional keys with missing values last.
pub fn cmp_missing_last<T: Ord>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
