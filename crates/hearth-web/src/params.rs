//! Query-string shapes accepted by the listing routes and their translation
//! into reconciler filters.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hearth_core::{ParticipationStatus, RoomType};
use hearth_reconcile::{
    ApplicationFilters, Catalog, EventFilters, HouseFilters, Page, ReconcileError, RoomFilters,
    UserFilters,
};
use serde::Deserialize;

/// Requested window, falling back to the configured default page.
pub fn page(catalog: &Catalog, offset: Option<usize>, limit: Option<usize>) -> Page {
    let default = catalog.default_page();
    Page::new(
        offset.unwrap_or(default.offset),
        limit.unwrap_or(default.limit),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub status: Option<String>,
    pub house_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub q: Option<String>,
    pub tag: Option<String>,
    pub public_only: Option<bool>,
    pub featured: Option<bool>,
    pub user_id: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl EventsQuery {
    pub fn filters(&self) -> Result<EventFilters, ReconcileError> {
        Ok(EventFilters {
            statuses: csv(self.status.as_deref())?,
            house_id: non_blank(&self.house_id),
            from: timestamp("from", self.from.as_deref())?,
            to: timestamp("to", self.to.as_deref())?,
            text: non_blank(&self.q),
            tag: non_blank(&self.tag),
            public_only: self.public_only.unwrap_or(false),
            featured: self.featured,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserScope {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HousesQuery {
    pub status: Option<String>,
    pub city: Option<String>,
    pub q: Option<String>,
    pub available_only: Option<bool>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl HousesQuery {
    pub fn filters(&self) -> Result<HouseFilters, ReconcileError> {
        Ok(HouseFilters {
            statuses: csv(self.status.as_deref())?,
            city: non_blank(&self.city),
            text: non_blank(&self.q),
            available_only: self.available_only.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomsQuery {
    pub house_id: Option<String>,
    pub status: Option<String>,
    pub room_type: Option<String>,
    pub max_price_cents: Option<i64>,
    pub available_only: Option<bool>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl RoomsQuery {
    pub fn filters(&self) -> Result<RoomFilters, ReconcileError> {
        let room_type = match self.room_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse::<RoomType>(raw)?),
            _ => None,
        };
        Ok(RoomFilters {
            house_id: non_blank(&self.house_id),
            statuses: csv(self.status.as_deref())?,
            room_type,
            max_price_cents: self.max_price_cents,
            available_only: self.available_only.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub house_id: Option<String>,
    pub role: Option<String>,
    pub q: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl UsersQuery {
    pub fn filters(&self) -> Result<UserFilters, ReconcileError> {
        Ok(UserFilters {
            house_id: non_blank(&self.house_id),
            roles: csv(self.role.as_deref())?,
            text: non_blank(&self.q),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationsQuery {
    pub user_id: Option<String>,
    pub house_id: Option<String>,
    pub status: Option<String>,
    pub open_only: Option<bool>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ApplicationsQuery {
    pub fn filters(&self) -> Result<ApplicationFilters, ReconcileError> {
        Ok(ApplicationFilters {
            user_id: non_blank(&self.user_id),
            house_id: non_blank(&self.house_id),
            statuses: csv(self.status.as_deref())?,
            open_only: self.open_only.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ParticipationBody {
    pub user_id: String,
    pub status: ParticipationStatus,
}

fn parse<T>(raw: &str) -> Result<T, ReconcileError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|err: T::Err| ReconcileError::validation(err.to_string()))
}

/// Comma-separated enum values; blanks are skipped.
fn csv<T>(raw: Option<&str>) -> Result<Vec<T>, ReconcileError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse)
        .collect()
}

fn timestamp(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ReconcileError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|err| ReconcileError::validation(format!("`{name}` is not RFC 3339 ({err})"))),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
