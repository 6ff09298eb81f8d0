use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use hearth_core::{EntityKind, Field, FieldOrigin, HouseDoc, HouseRow, HouseStatus, Sort};
use serde::Serialize;

use crate::{cmp_missing_last, ratio, Entity, FieldRule, MergedEntity};

pub const DEFAULT_NAME: &str = "Untitled house";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct House;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HouseFields {
    pub name: Field<String>,
    pub slug: Field<String>,
    pub tagline: Field<String>,
    pub description: Field<String>,
    pub hero_image: Field<String>,
    pub gallery: Field<Vec<String>>,
    pub amenities: Field<Vec<String>>,
    pub city: Field<String>,
    pub status: Field<HouseStatus>,
    pub capacity: Field<i32>,
    pub occupancy: Field<i32>,
    pub monthly_rent_cents: Field<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseMetrics {
    pub occupancy_rate: f64,
    pub available_beds: i32,
    pub is_available: bool,
    pub status_label: &'static str,
}

static PRECEDENCE: &[FieldRule<HouseFields>] = &[
    crate::field_rule!(name, Operational),
    crate::field_rule!(city, Operational),
    crate::field_rule!(status, Operational),
    crate::field_rule!(capacity, Operational),
    crate::field_rule!(occupancy, Operational),
    crate::field_rule!(monthly_rent_cents, Operational),
    crate::field_rule!(slug, Content),
    crate::field_rule!(tagline, Content),
    crate::field_rule!(description, Content),
    crate::field_rule!(hero_image, Content),
    crate::field_rule!(gallery, Content),
    crate::field_rule!(amenities, Content),
];

impl Entity for House {
    const KIND: EntityKind = EntityKind::House;

    type Operational = HouseRow;
    type Content = HouseDoc;
    type Fields = HouseFields;
    type Metrics = HouseMetrics;

    fn precedence() -> &'static [FieldRule<HouseFields>] {
        PRECEDENCE
    }

    fn defaults() -> HouseFields {
        HouseFields {
            name: Field::defaulted(DEFAULT_NAME.to_string()),
            tagline: Field::defaulted(String::new()),
            description: Field::defaulted(String::new()),
            gallery: Field::defaulted(Vec::new()),
            amenities: Field::defaulted(Vec::new()),
            status: Field::defaulted(HouseStatus::Active),
            capacity: Field::defaulted(0),
            occupancy: Field::defaulted(0),
            ..HouseFields::default()
        }
    }

    fn operational_fields(row: &HouseRow) -> HouseFields {
        HouseFields {
            name: Field::operational(row.name.clone()),
            city: Field::with_origin(row.city.clone(), FieldOrigin::Operational),
            status: Field::operational(row.status),
            capacity: Field::operational(row.capacity),
            occupancy: Field::operational(row.occupancy),
            monthly_rent_cents: Field::with_origin(row.monthly_rent_cents, FieldOrigin::Operational),
            ..HouseFields::default()
        }
    }

    fn content_fields(doc: &HouseDoc) -> HouseFields {
        let content = |value: &Option<String>| Field::with_origin(value.clone(), FieldOrigin::Content);
        HouseFields {
            name: content(&doc.name),
            slug: content(&doc.slug),
            tagline: content(&doc.tagline),
            description: content(&doc.description),
            hero_image: content(&doc.hero_image),
            gallery: Field::content(doc.gallery.clone()),
            amenities: Field::content(doc.amenities.clone()),
            city: content(&doc.city),
            ..HouseFields::default()
        }
    }

    fn metrics(fields: &HouseFields, _now: DateTime<Utc>) -> HouseMetrics {
        let capacity = fields.capacity.get().copied().unwrap_or(0);
        let occupancy = fields.occupancy.get().copied().unwrap_or(0);
        let available_beds = (capacity - occupancy).max(0);
        let status = fields.status.get().copied().unwrap_or(HouseStatus::Active);
        let is_available = status == HouseStatus::Active && available_beds > 0;
        let status_label = match status {
            HouseStatus::Active if is_available => "Accepting residents",
            HouseStatus::Active | HouseStatus::Full => "Full",
            HouseStatus::Inactive => "Closed",
        };
        HouseMetrics {
            occupancy_rate: ratio(occupancy, capacity),
            available_beds,
            is_available,
            status_label,
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
