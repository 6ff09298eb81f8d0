//! Caller-facing filters and their translation into per-store queries.
//!
//! Each store only sees the conditions it can evaluate on its own fields. The
//! post-fetch [`ListFilter::matches`] check re-applies every condition to the merged
//! entity, so the combined listing is exact regardless of which store held the field.

use chrono::{DateTime, Utc};
use hearth_core::{
    ApplicationStatus, Condition, ContentCondition, ContentOp, ContentQuery, EventStatus,
    FilterValue, HouseStatus, OpFilter, RoomStatus, RoomType, UserRole,
};
use hearth_mapping::{Application, Event, House, MergedEntity, Room, User};
use serde::{Deserialize, Serialize};

use crate::{ReconcileError, ReconcileResult};

pub trait ListFilter<E: hearth_mapping::Entity>: Send + Sync {
    fn validate(&self) -> ReconcileResult<()> {
        Ok(())
    }

    /// Conditions the operational store can evaluate.
    fn operational(&self) -> OpFilter;

    /// Conditions the content store can evaluate; ordering is added by the reconciler.
    fn content(&self) -> ContentQuery;

    fn matches(&self, entity: &MergedEntity<E>) -> bool;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn status_texts<T: Copy>(statuses: &[T], as_str: fn(T) -> &'static str) -> Vec<String> {
    statuses.iter().map(|s| as_str(*s).to_string()).collect()
}

fn any_or<T: PartialEq>(wanted: &[T], actual: Option<&T>) -> bool {
    wanted.is_empty() || actual.is_some_and(|value| wanted.contains(value))
}

fn same_text(wanted: Option<&String>, actual: Option<&String>) -> bool {
    match wanted {
        Some(wanted) => actual.is_some_and(|value| value == wanted),
        None => true,
    }
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilters {
    pub statuses: Vec<EventStatus>,
    pub house_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive match on the title.
    pub text: Option<String>,
    pub tag: Option<String>,
    pub public_only: bool,
    pub featured: Option<bool>,
}

impl ListFilter<Event> for EventFilters {
    fn validate(&self) -> ReconcileResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(ReconcileError::validation(format!(
                "`from` ({from}) is after `to` ({to})"
            ))),
            _ => Ok(()),
        }
    }

    fn operational(&self) -> OpFilter {
        let mut filter = OpFilter::new();
        if !self.statuses.is_empty() {
            filter.push(Condition::in_list(
                "status",
                status_texts(&self.statuses, EventStatus::as_str),
            ));
        }
        if let Some(house_id) = &self.house_id {
            filter.push(Condition::eq("house_id", FilterValue::text(house_id.as_str())));
        }
        if let Some(from) = self.from {
            filter.push(Condition::gte("starts_at", FilterValue::Time(from)));
        }
        if let Some(to) = self.to {
            filter.push(Condition::lte("starts_at", FilterValue::Time(to)));
        }
        filter
    }

    fn content(&self) -> ContentQuery {
        let mut query = ContentQuery::new();
        if self.public_only {
            query.push(ContentCondition::new("isPublic", ContentOp::Eq, FilterValue::Bool(true)));
        }
        if let Some(featured) = self.featured {
            query.push(ContentCondition::new("featured", ContentOp::Eq, FilterValue::Bool(featured)));
        }
        if let Some(text) = blank_to_none(&self.text) {
            query.push(ContentCondition::new("title", ContentOp::Match, FilterValue::text(text)));
        }
        if let Some(tag) = blank_to_none(&self.tag) {
            query.push(ContentCondition::new("tags", ContentOp::Contains, FilterValue::text(tag)));
        }
        if let Some(from) = self.from {
            query.push(ContentCondition::new("startsAt", ContentOp::Gte, FilterValue::Time(from)));
        }
        if let Some(to) = self.to {
            query.push(ContentCondition::new("startsAt", ContentOp::Lte, FilterValue::Time(to)));
        }
        query
    }

    fn matches(&self, entity: &MergedEntity<Event>) -> bool {
        let fields = &entity.fields;
        let starts_at = fields.starts_at.get();
        any_or(&self.statuses, fields.status.get())
            && same_text(self.house_id.as_ref(), fields.house_id.get())
            && self.from.map_or(true, |from| starts_at.is_some_and(|at| *at >= from))
            && self.to.map_or(true, |to| starts_at.is_some_and(|at| *at <= to))
            && blank_to_none(&self.text).map_or(true, |text| contains_ci(fields.title.text(), text))
            && blank_to_none(&self.tag).map_or(true, |tag| {
                fields
                    .tags
                    .get()
                    .is_some_and(|tags| tags.iter().any(|t| t == tag))
            })
            && (!self.public_only || fields.is_public.get() == Some(&true))
            && self
                .featured
                .map_or(true, |featured| fields.featured.get() == Some(&featured))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseFilters {
    pub statuses: Vec<HouseStatus>,
    pub city: Option<String>,
    pub text: Option<String>,
    pub available_only: bool,
}

impl ListFilter<House> for HouseFilters {
    fn operational(&self) -> OpFilter {
        let mut filter = OpFilter::new();
        if !self.statuses.is_empty() {
            filter.push(Condition::in_list(
                "status",
                status_texts(&self.statuses, HouseStatus::as_str),
            ));
        }
        filter
    }

    fn content(&self) -> ContentQuery {
        let mut query = ContentQuery::new();
        if let Some(text) = blank_to_none(&self.text) {
            query.push(ContentCondition::new("name", ContentOp::Match, FilterValue::text(text)));
        }
        query
    }

    fn matches(&self, entity: &MergedEntity<House>) -> bool {
        let fields = &entity.fields;
        any_or(&self.statuses, fields.status.get())
            && blank_to_none(&self.city)
                .map_or(true, |city| fields.city.text().eq_ignore_ascii_case(city))
            && blank_to_none(&self.text).map_or(true, |text| contains_ci(fields.name.text(), text))
            && (!self.available_only || entity.metrics.is_available)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomFilters {
    pub house_id: Option<String>,
    pub statuses: Vec<RoomStatus>,
    pub room_type: Option<RoomType>,
    pub max_price_cents: Option<i64>,
    pub available_only: bool,
}

impl ListFilter<Room> for RoomFilters {
    fn validate(&self) -> ReconcileResult<()> {
        match self.max_price_cents {
            Some(price) if price < 0 => Err(ReconcileError::validation(
                "`max_price_cents` must not be negative",
            )),
            _ => Ok(()),
        }
    }

    fn operational(&self) -> OpFilter {
        let mut filter = OpFilter::new();
        if let Some(house_id) = &self.house_id {
            filter.push(Condition::eq("house_id", FilterValue::text(house_id.as_str())));
        }
        if !self.statuses.is_empty() {
            filter.push(Condition::in_list(
                "status",
                status_texts(&self.statuses, RoomStatus::as_str),
            ));
        }
        if let Some(room_type) = self.room_type {
            filter.push(Condition::eq("room_type", FilterValue::text(room_type.as_str())));
        }
        if let Some(price) = self.max_price_cents {
            filter.push(Condition::lte("monthly_price_cents", FilterValue::Int(price)));
        }
        filter
    }

    fn content(&self) -> ContentQuery {
        ContentQuery::new()
    }

    fn matches(&self, entity: &MergedEntity<Room>) -> bool {
        let fields = &entity.fields;
        same_text(self.house_id.as_ref(), fields.house_id.get())
            && any_or(&self.statuses, fields.status.get())
            && self
                .room_type
                .map_or(true, |room_type| fields.room_type.get() == Some(&room_type))
            && self.max_price_cents.map_or(true, |max| {
                fields.monthly_price_cents.get().is_some_and(|price| *price <= max)
            })
            && (!self.available_only || entity.metrics.is_available)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFilters {
    pub house_id: Option<String>,
    pub roles: Vec<UserRole>,
    pub text: Option<String>,
}

impl ListFilter<User> for UserFilters {
    fn operational(&self) -> OpFilter {
        let mut filter = OpFilter::new();
        if let Some(house_id) = &self.house_id {
            filter.push(Condition::eq("house_id", FilterValue::text(house_id.as_str())));
        }
        if !self.roles.is_empty() {
            filter.push(Condition::in_list("role", status_texts(&self.roles, UserRole::as_str)));
        }
        filter
    }

    fn content(&self) -> ContentQuery {
        let mut query = ContentQuery::new();
        if let Some(text) = blank_to_none(&self.text) {
            query.push(ContentCondition::new(
                "displayName",
                ContentOp::Match,
                FilterValue::text(text),
            ));
        }
        query
    }

    fn matches(&self, entity: &MergedEntity<User>) -> bool {
        let fields = &entity.fields;
        same_text(self.house_id.as_ref(), fields.house_id.get())
            && any_or(&self.roles, fields.role.get())
            && blank_to_none(&self.text)
                .map_or(true, |text| contains_ci(fields.display_name.text(), text))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationFilters {
    pub user_id: Option<String>,
    pub house_id: Option<String>,
    pub statuses: Vec<ApplicationStatus>,
    pub open_only: bool,
}

impl ListFilter<Application> for ApplicationFilters {
    fn operational(&self) -> OpFilter {
        let mut filter = OpFilter::new();
        if let Some(user_id) = &self.user_id {
            filter.push(Condition::eq("user_id", FilterValue::text(user_id.as_str())));
        }
        if let Some(house_id) = &self.house_id {
            filter.push(Condition::eq("house_id", FilterValue::text(house_id.as_str())));
        }
        if !self.statuses.is_empty() {
            filter.push(Condition::in_list(
                "status",
                status_texts(&self.statuses, ApplicationStatus::as_str),
            ));
        }
        filter
    }

    fn content(&self) -> ContentQuery {
        ContentQuery::new()
    }

    fn matches(&self, entity: &MergedEntity<Application>) -> bool {
        let fields = &entity.fields;
        same_text(self.user_id.as_ref(), fields.user_id.get())
            && same_text(self.house_id.as_ref(), fields.house_id.get())
            && any_or(&self.statuses, fields.status.get())
            && (!self.open_only || entity.metrics.is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hearth_core::{CompareOp, EventRow};
    use hearth_mapping::merge;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 18, 0, 0).single().unwrap()
    }

    fn event(status: EventStatus, title: &str) -> MergedEntity<Event> {
        let row = EventRow {
            id: "e1".into(),
            content_ref: None,
            house_id: Some("h1".into()),
            title: Some(title.into()),
            status,
            starts_at: at(12),
            ends_at: None,
            location: None,
            capacity: None,
            participant_count: 0,
        };
        merge::<Event>(Some(&row), None, at(1)).unwrap()
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let filters = EventFilters {
            from: Some(at(20)),
            to: Some(at(10)),
            ..EventFilters::default()
        };
        assert!(matches!(filters.validate(), Err(ReconcileError::Validation { .. })));
    }

    #[test]
    fn event_filters_split_by_store() {
        let filters = EventFilters {
            statuses: vec![EventStatus::Scheduled],
            from: Some(at(1)),
            text: Some("potluck".into()),
            public_only: true,
            ..EventFilters::default()
        };
        let op = filters.operational();
        let columns = op.conditions.iter().map(|c| c.column).collect::<Vec<_>>();
        assert_eq!(columns, vec!["status", "starts_at"]);
        assert_eq!(op.conditions[0].op, CompareOp::In);

        let content = filters.content();
        let fields = content.conditions.iter().map(|c| c.field).collect::<Vec<_>>();
        assert_eq!(fields, vec!["isPublic", "title", "startsAt"]);
    }

    #[test]
    fn post_fetch_predicate_rechecks_every_condition() {
        let filters = EventFilters {
            statuses: vec![EventStatus::Scheduled],
            text: Some("POT".into()),
            ..EventFilters::default()
        };
        assert!(filters.matches(&event(EventStatus::Scheduled, "Garden potluck")));
        assert!(!filters.matches(&event(EventStatus::Cancelled, "Garden potluck")));
        assert!(!filters.matches(&event(EventStatus::Scheduled, "Movie night")));

        let tagged = EventFilters {
            tag: Some("food".into()),
            ..EventFilters::default()
        };
        assert!(!tagged.matches(&event(EventStatus::Scheduled, "Potluck")));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let filters = RoomFilters {
            max_price_cents: Some(-1),
            ..RoomFilters::default()
        };
        assert!(filters.validate().is_err());
    }
}
