//! Operational rows and content documents for every entity family.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{ContentRecord, FilterValue, OperationalRecord};

/// A status string that names no variant of its enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(HouseStatus {
    Active => "active",
    Full => "full",
    Inactive => "inactive",
});

text_enum!(RoomType {
    Private => "private",
    Shared => "shared",
    Suite => "suite",
});

text_enum!(RoomStatus {
    Available => "available",
    Occupied => "occupied",
    Maintenance => "maintenance",
});

text_enum!(EventStatus {
    Draft => "draft",
    Scheduled => "scheduled",
    Cancelled => "cancelled",
    Completed => "completed",
});

text_enum!(UserRole {
    Guest => "guest",
    Member => "member",
    Resident => "resident",
    Host => "host",
    Admin => "admin",
});

text_enum!(
    /// Closed lifecycle of a residency application.
    ApplicationStatus {
        Draft => "draft",
        Submitted => "submitted",
        UnderReview => "under_review",
        InterviewScheduled => "interview_scheduled",
        Accepted => "accepted",
        Waitlisted => "waitlisted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
);

text_enum!(ParticipationStatus {
    Going => "going",
    Interested => "interested",
    Waitlisted => "waitlisted",
    Declined => "declined",
});

/// Content documents may send `null` for list fields; treat that as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn text(value: &str) -> Option<FilterValue> {
    Some(FilterValue::text(value))
}

fn opt_text(value: &Option<String>) -> Option<FilterValue> {
    FilterValue::opt_text(value.as_deref())
}

fn int(value: impl Into<i64>) -> Option<FilterValue> {
    Some(FilterValue::Int(value.into()))
}

fn list(values: &[String]) -> Option<FilterValue> {
    Some(FilterValue::List(values.to_vec()))
}

// ---------------------------------------------------------------------------
// Houses

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseRow {
    pub id: String,
    pub content_ref: Option<String>,
    pub name: String,
    pub status: HouseStatus,
    pub city: Option<String>,
    pub capacity: i32,
    pub occupancy: i32,
    pub monthly_rent_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl OperationalRecord for HouseRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> Option<&str> {
        self.content_ref.as_deref()
    }

    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => text(&self.id),
            "content_ref" => opt_text(&self.content_ref),
            "name" => text(&self.name),
            "status" => text(self.status.as_str()),
            "city" => opt_text(&self.city),
            "capacity" => int(self.capacity),
            "occupancy" => int(self.occupancy),
            "monthly_rent_cents" => self.monthly_rent_cents.map(FilterValue::Int),
            "created_at" => Some(FilterValue::Time(self.created_at)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseDoc {
    #[serde(rename = "_id")]
    pub content_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hero_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gallery: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl ContentRecord for HouseDoc {
    const CONTENT_TYPE: &'static str = "house";

    fn content_id(&self) -> &str {
        &self.content_id
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "_id" => text(&self.content_id),
            "name" => opt_text(&self.name),
            "slug" => opt_text(&self.slug),
            "tagline" => opt_text(&self.tagline),
            "city" => opt_text(&self.city),
            "amenities" => list(&self.amenities),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRow {
    pub id: String,
    pub content_ref: Option<String>,
    pub house_id: String,
    pub name: String,
    pub room_type: RoomType,
    pub status: RoomStatus,
    pub capacity: i32,
    pub occupied: i32,
    pub monthly_price_cents: Option<i64>,
    pub available_from: Option<NaiveDate>,
}

impl OperationalRecord for RoomRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> Option<&str> {
        self.content_ref.as_deref()
    }

    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => text(&self.id),
            "content_ref" => opt_text(&self.content_ref),
            "house_id" => text(&self.house_id),
            "name" => text(&self.name),
            "room_type" => text(self.room_type.as_str()),
            "status" => text(self.status.as_str()),
            "capacity" => int(self.capacity),
            "occupied" => int(self.occupied),
            "monthly_price_cents" => self.monthly_price_cents.map(FilterValue::Int),
            "available_from" => self.available_from.map(FilterValue::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoc {
    #[serde(rename = "_id")]
    pub content_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub features: Vec<String>,
}

impl ContentRecord for RoomDoc {
    const CONTENT_TYPE: &'static str = "room";

    fn content_id(&self) -> &str {
        &self.content_id
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "_id" => text(&self.content_id),
            "name" => opt_text(&self.name),
            "features" => list(&self.features),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Events

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub content_ref: Option<String>,
    pub house_id: Option<String>,
    pub title: Option<String>,
    pub status: EventStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub participant_count: i32,
}

impl OperationalRecord for EventRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> Option<&str> {
        self.content_ref.as_deref()
    }

    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => text(&self.id),
            "content_ref" => opt_text(&self.content_ref),
            "house_id" => opt_text(&self.house_id),
            "title" => opt_text(&self.title),
            "status" => text(self.status.as_str()),
            "starts_at" => Some(FilterValue::Time(self.starts_at)),
            "ends_at" => self.ends_at.map(FilterValue::Time),
            "location" => opt_text(&self.location),
            "capacity" => self.capacity.and_then(|c| int(c)),
            "participant_count" => int(self.participant_count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDoc {
    #[serde(rename = "_id")]
    pub content_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl ContentRecord for EventDoc {
    const CONTENT_TYPE: &'static str = "event";

    fn content_id(&self) -> &str {
        &self.content_id
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "_id" => text(&self.content_id),
            "title" => opt_text(&self.title),
            "slug" => opt_text(&self.slug),
            "summary" => opt_text(&self.summary),
            "tags" => list(&self.tags),
            "startsAt" => self.starts_at.map(FilterValue::Time),
            "endsAt" => self.ends_at.map(FilterValue::Time),
            "isPublic" => self.is_public.map(FilterValue::Bool),
            "featured" => self.featured.map(FilterValue::Bool),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Users

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub content_ref: Option<String>,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub house_id: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl OperationalRecord for UserRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> Option<&str> {
        self.content_ref.as_deref()
    }

    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => text(&self.id),
            "content_ref" => opt_text(&self.content_ref),
            "email" => text(&self.email),
            "display_name" => text(&self.display_name),
            "role" => text(self.role.as_str()),
            "house_id" => opt_text(&self.house_id),
            "joined_at" => Some(FilterValue::Time(self.joined_at)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub content_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
}

impl ContentRecord for UserDoc {
    const CONTENT_TYPE: &'static str = "member";

    fn content_id(&self) -> &str {
        &self.content_id
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "_id" => text(&self.content_id),
            "displayName" => opt_text(&self.display_name),
            "bio" => opt_text(&self.bio),
            "interests" => list(&self.interests),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Applications

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub id: String,
    pub content_ref: Option<String>,
    pub user_id: String,
    pub house_id: String,
    pub status: ApplicationStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub move_in_date: Option<NaiveDate>,
}

impl OperationalRecord for ApplicationRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> Option<&str> {
        self.content_ref.as_deref()
    }

    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => text(&self.id),
            "content_ref" => opt_text(&self.content_ref),
            "user_id" => text(&self.user_id),
            "house_id" => text(&self.house_id),
            "status" => text(self.status.as_str()),
            "submitted_at" => self.submitted_at.map(FilterValue::Time),
            "reviewed_at" => self.reviewed_at.map(FilterValue::Time),
            "move_in_date" => self.move_in_date.map(FilterValue::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAnswer {
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDoc {
    #[serde(rename = "_id")]
    pub content_id: String,
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub answers: Vec<ApplicationAnswer>,
    #[serde(default)]
    pub portfolio_url: Option<String>,
}

impl ContentRecord for ApplicationDoc {
    const CONTENT_TYPE: &'static str = "application";

    fn content_id(&self) -> &str {
        &self.content_id
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "_id" => text(&self.content_id),
            "statement" => opt_text(&self.statement),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Participation

/// One user's participation in one event; unique per (user_id, event_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub user_id: String,
    pub event_id: String,
    pub status: ParticipationStatus,
    pub updated_at: DateTime<Utc>,
}
