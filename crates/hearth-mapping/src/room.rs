use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use hearth_core::{EntityKind, Field, FieldOrigin, RoomDoc, RoomRow, RoomStatus, RoomType, Sort};
use serde::Serialize;

use crate::{cmp_missing_last, days_between, ratio, Entity, FieldRule, HouseScoped, MergedEntity};

pub const DEFAULT_NAME: &str = "Untitled room";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Room;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoomFields {
    pub name: Field<String>,
    pub description: Field<String>,
    pub images: Field<Vec<String>>,
    pub features: Field<Vec<String>>,
    pub house_id: Field<String>,
    pub house_name: Field<String>,
    pub room_type: Field<RoomType>,
    pub status: Field<RoomStatus>,
    pub capacity: Field<i32>,
    pub occupied: Field<i32>,
    pub monthly_price_cents: Field<i64>,
    pub available_from: Field<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomMetrics {
    pub occupancy_rate: f64,
    pub is_available: bool,
    /// Zero once the room is available; `None` without an availability date.
    pub days_until_available: Option<i64>,
}

static PRECEDENCE: &[FieldRule<RoomFields>] = &[
    crate::field_rule!(name, Operational),
    crate::field_rule!(house_id, Operational),
    crate::field_rule!(room_type, Operational),
    crate::field_rule!(status, Operational),
    crate::field_rule!(capacity, Operational),
    crate::field_rule!(occupied, Operational),
    crate::field_rule!(monthly_price_cents, Operational),
    crate::field_rule!(available_from, Operational),
    crate::field_rule!(description, Content),
    crate::field_rule!(images, Content),
    crate::field_rule!(features, Content),
];

impl Entity for Room {
    const KIND: EntityKind = EntityKind::Room;

    type Operational = RoomRow;
    type Content = RoomDoc;
    type Fields = RoomFields;
    type Metrics = RoomMetrics;

    fn precedence() -> &'static [FieldRule<RoomFields>] {
        PRECEDENCE
    }

    fn defaults() -> RoomFields {
        RoomFields {
            name: Field::defaulted(DEFAULT_NAME.to_string()),
            description: Field::defaulted(String::new()),
            images: Field::defaulted(Vec::new()),
            features: Field::defaulted(Vec::new()),
            room_type: Field::defaulted(RoomType::Private),
            status: Field::defaulted(RoomStatus::Available),
            capacity: Field::defaulted(0),
            occupied: Field::defaulted(0),
            ..RoomFields::default()
        }
    }

    fn operational_fields(row: &RoomRow) -> RoomFields {
        RoomFields {
            name: Field::operational(row.name.clone()),
            house_id: Field::operational(row.house_id.clone()),
            room_type: Field::operational(row.room_type),
            status: Field::operational(row.status),
            capacity: Field::operational(row.capacity),
            occupied: Field::operational(row.occupied),
            monthly_price_cents: Field::with_origin(row.monthly_price_cents, FieldOrigin::Operational),
            available_from: Field::with_origin(row.available_from, FieldOrigin::Operational),
            ..RoomFields::default()
        }
    }

    fn content_fields(doc: &RoomDoc) -> RoomFields {
        RoomFields {
            name: Field::with_origin(doc.name.clone(), FieldOrigin::Content),
            description: Field::with_origin(doc.description.clone(), FieldOrigin::Content),
            images: Field::content(doc.images.clone()),
            features: Field::content(doc.features.clone()),
            ..RoomFields::default()
        }
    }

    fn metrics(fields: &RoomFields, now: DateTime<Utc>) -> RoomMetrics {
        let capacity = fields.capacity.get().copied().unwrap_or(0);
        let occupied = fields.occupied.get().copied().unwrap_or(0);
        let days_until_available = fields
            .available_from
            .get()
            .map(|date| days_between(now, *date).max(0));
        let status = fields.status.get().copied().unwrap_or(RoomStatus::Available);
        let is_available = status == RoomStatus::Available
            && occupied < capacity
            && days_until_available.unwrap_or(0) == 0;
        RoomMetrics {
            occupancy_rate: ratio(occupied, capacity),
            is_available,
            days_until_available,
        }
    }

    fn operational_sort() -> Sort {
        Sort::asc("name")
    }

    fn content_order() -> Sort {
        Sort::asc("name")
    }

    fn canonical_cmp(a: &MergedEntity<Self>, b: &MergedEntity<Self>) -> Ordering {
        cmp_missing_last(a.fields.name.get(), b.fields.name.get()).then_with(|| a.id.cmp(&b.id))
    }
}

impl HouseScoped for Room {
    fn house_id(fields: &RoomFields) -> Option<&str> {
        fields.house_id.get().map(String::as_str)
    }

    fn set_house_name(fields: &mut RoomFields, name: Option<String>) {
        fields.house_name = Field::with_origin(name, FieldOrigin::Lookup);
    }
}
