use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use hearth_core::{EntityKind, EventDoc, EventRow, EventStatus, Field, FieldOrigin, Sort};
use serde::Serialize;

use crate::{cmp_missing_last, days_between, Entity, FieldRule, HouseScoped, MergedEntity};

pub const DEFAULT_TITLE: &str = "Untitled event";
pub const DEFAULT_STATUS: EventStatus = EventStatus::Scheduled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Event;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EventFields {
    pub title: Field<String>,
    pub slug: Field<String>,
    pub summary: Field<String>,
    pub description: Field<String>,
    pub cover_image: Field<String>,
    pub tags: Field<Vec<String>>,
    pub status: Field<EventStatus>,
    pub starts_at: Field<DateTime<Utc>>,
    pub ends_at: Field<DateTime<Utc>>,
    pub location: Field<String>,
    pub house_id: Field<String>,
    pub house_name: Field<String>,
    pub capacity: Field<i32>,
    pub participant_count: Field<i32>,
    pub is_public: Field<bool>,
    pub featured: Field<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMetrics {
    /// Calendar days until the start date; negative once it has passed.
    pub days_until: Option<i64>,
    pub is_upcoming: bool,
    pub is_past: bool,
    pub is_full: bool,
    pub spots_left: Option<i32>,
    pub status_label: &'static str,
}

static PRECEDENCE: &[FieldRule<EventFields>] = &[
    crate::field_rule!(title, Operational),
    crate::field_rule!(status, Operational),
    crate::field_rule!(starts_at, Operational),
    crate::field_rule!(ends_at, Operational),
    crate::field_rule!(location, Operational),
    crate::field_rule!(house_id, Operational),
    crate::field_rule!(capacity, Operational),
    crate::field_rule!(participant_count, Operational),
    crate::field_rule!(slug, Content),
    crate::field_rule!(summary, Content),
    crate::field_rule!(description, Content),
    crate::field_rule!(cover_image, Content),
    crate::field_rule!(tags, Content),
    crate::field_rule!(is_public, Content),
    crate::field_rule!(featured, Content),
];

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;

    type Operational = EventRow;
    type Content = EventDoc;
    type Fields = EventFields;
    type Metrics = EventMetrics;

    fn precedence() -> &'static [FieldRule<EventFields>] {
        PRECEDENCE
    }

    fn defaults() -> EventFields {
        EventFields {
            title: Field::defaulted(DEFAULT_TITLE.to_string()),
            summary: Field::defaulted(String::new()),
            description: Field::defaulted(String::new()),
            tags: Field::defaulted(Vec::new()),
            status: Field::defaulted(DEFAULT_STATUS),
            participant_count: Field::defaulted(0),
            is_public: Field::defaulted(true),
            featured: Field::defaulted(false),
            ..EventFields::default()
        }
    }

    fn operational_fields(row: &EventRow) -> EventFields {
        let op = FieldOrigin::Operational;
        EventFields {
            title: Field::with_origin(row.title.clone(), op),
            status: Field::operational(row.status),
            starts_at: Field::operational(row.starts_at),
            ends_at: Field::with_origin(row.ends_at, op),
            location: Field::with_origin(row.location.clone(), op),
            house_id: Field::with_origin(row.house_id.clone(), op),
            capacity: Field::with_origin(row.capacity, op),
            participant_count: Field::operational(row.participant_count),
            ..EventFields::default()
        }
    }

    fn content_fields(doc: &EventDoc) -> EventFields {
        let content = FieldOrigin::Content;
        EventFields {
            title: Field::with_origin(doc.title.clone(), content),
            slug: Field::with_origin(doc.slug.clone(), content),
            summary: Field::with_origin(doc.summary.clone(), content),
            description: Field::with_origin(doc.body.clone(), content),
            cover_image: Field::with_origin(doc.cover_image.clone(), content),
            tags: Field::content(doc.tags.clone()),
            starts_at: Field::with_origin(doc.starts_at, content),
            ends_at: Field::with_origin(doc.ends_at, content),
            is_public: Field::with_origin(doc.is_public, content),
            featured: Field::with_origin(doc.featured, content),
            ..EventFields::default()
        }
    }

    fn metrics(fields: &EventFields, now: DateTime<Utc>) -> EventMetrics {
        let status = fields.status.get().copied().unwrap_or(DEFAULT_STATUS);
        let starts_at = fields.starts_at.get().copied();
        let ends_at = fields.ends_at.get().copied().or(starts_at);
        let is_past = ends_at.is_some_and(|end| end < now);
        let has_started = starts_at.is_some_and(|start| start <= now);
        let is_upcoming = starts_at.is_some_and(|start| start > now)
            && matches!(status, EventStatus::Scheduled);
        let participants = fields.participant_count.get().copied().unwrap_or(0);
        let spots_left = fields
            .capacity
            .get()
            .map(|capacity| (capacity - participants).max(0));
        let is_full = spots_left == Some(0);
        let status_label = match status {
            EventStatus::Draft => "Draft",
            EventStatus::Cancelled => "Cancelled",
            EventStatus::Completed => "Completed",
            EventStatus::Scheduled if is_past => "Ended",
            EventStatus::Scheduled if has_started => "Happening now",
            EventStatus::Scheduled if is_full => "Full",
            EventStatus::Scheduled => "Upcoming",
        };
        EventMetrics {
            days_until: starts_at.map(|start| days_between(now, start.date_naive())),
            is_upcoming,
            is_past,
            is_full,
            spots_left,
            status_label,
        }
    }

    fn operational_sort() -> Sort {
        Sort::asc("starts_at")
    }

    fn content_order() -> Sort {
        Sort::asc("startsAt")
    }

    fn canonical_cmp(a: &MergedEntity<Self>, b: &MergedEntity<Self>) -> Ordering {
        cmp_missing_last(a.fields.starts_at.get(), b.fields.starts_at.get())
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl HouseScoped for Event {
    fn house_id(fields: &EventFields) -> Option<&str> {
        fields.house_id.get().map(String::as_str)
    }

    fn set_house_name(fields: &mut EventFields, name: Option<String>) {
        fields.house_name = Field::with_origin(name, FieldOrigin::Lookup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{merge, overlay_content};
    use chrono::TimeZone;
    use hearth_core::Source;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, day, hour, 0, 0).single().unwrap()
    }

    fn row(id: &str, content_ref: Option<&str>, title: Option<&str>) -> EventRow {
        EventRow {
            id: id.into(),
            content_ref: content_ref.map(str::to_string),
            house_id: Some("h1".into()),
            title: title.map(str::to_string),
            status: EventStatus::Scheduled,
            starts_at: at(10, 18),
            ends_at: Some(at(10, 21)),
            location: Some("Back garden".into()),
            capacity: Some(12),
            participant_count: 4,
        }
    }

    fn doc(id: &str, title: &str) -> EventDoc {
        EventDoc {
            content_id: id.into(),
            title: Some(title.into()),
            slug: Some("potluck".into()),
            summary: Some("Bring a dish".into()),
            body: Some("Long form description".into()),
            cover_image: None,
            tags: vec!["food".into()],
            starts_at: Some(at(9, 18)),
            ends_at: None,
            is_public: Some(false),
            featured: None,
        }
    }

    #[test]
    fn untitled_row_takes_the_content_title() {
        let op = row("r1", Some("c1"), None);
        let merged = merge::<Event>(Some(&op), Some(&doc("c1", "A")), at(1, 9)).unwrap();
        assert_eq!(merged.source, Source::Both);
        assert_eq!(merged.id, "r1");
        assert_eq!(merged.fields.title.text(), "A");
        assert_eq!(merged.fields.starts_at.get(), Some(&at(10, 18)));
        assert_eq!(merged.fields.is_public.get(), Some(&false));
    }

    #[test]
    fn operational_title_overrides_stale_content() {
        let merged = merge::<Event>(
            Some(&row("r1", Some("c1"), Some("Summer potluck"))),
            Some(&doc("c1", "Spring potluck")),
            at(1, 9),
        )
        .unwrap();
        assert_eq!(merged.fields.title.text(), "Summer potluck");
        assert_eq!(merged.fields.title.origin, FieldOrigin::Operational);
    }

    #[test]
    fn operational_only_event_defaults_every_content_field() {
        let merged = merge::<Event>(Some(&row("r2", None, None)), None, at(1, 9)).unwrap();
        assert_eq!(merged.source, Source::Operational);
        assert_eq!(merged.fields.title.text(), DEFAULT_TITLE);

        let defaults = Event::defaults();
        assert_eq!(merged.fields.slug, defaults.slug);
        assert_eq!(merged.fields.summary, defaults.summary);
        assert_eq!(merged.fields.description, defaults.description);
        assert_eq!(merged.fields.cover_image, defaults.cover_image);
        assert_eq!(merged.fields.tags, defaults.tags);
        assert_eq!(merged.fields.is_public, defaults.is_public);
        assert_eq!(merged.fields.featured, defaults.featured);
    }

    #[test]
    fn content_only_event_is_a_scheduled_shell() {
        let merged = merge::<Event>(None, Some(&doc("c2", "B")), at(1, 9)).unwrap();
        assert_eq!(merged.source, Source::Content);
        assert_eq!(merged.id, "c2");
        assert_eq!(merged.fields.title.text(), "B");
        assert_eq!(merged.fields.participant_count.get(), Some(&0));
        assert_eq!(merged.fields.status.get(), Some(&DEFAULT_STATUS));
        assert_eq!(merged.fields.starts_at.get(), Some(&at(9, 18)));
    }

    #[test]
    fn metrics_use_the_injected_clock() {
        let op = row("r1", None, Some("Potluck"));
        let before = merge::<Event>(Some(&op), None, at(7, 12)).unwrap();
        assert_eq!(before.metrics.days_until, Some(3));
        assert!(before.metrics.is_upcoming);
        assert_eq!(before.metrics.spots_left, Some(8));
        assert_eq!(before.metrics.status_label, "Upcoming");

        let during = merge::<Event>(Some(&op), None, at(10, 19)).unwrap();
        assert_eq!(during.metrics.status_label, "Happening now");
        assert!(!during.metrics.is_past);

        let after = merge::<Event>(Some(&op), None, at(11, 9)).unwrap();
        assert!(after.metrics.is_past);
        assert_eq!(after.metrics.days_until, Some(-1));
        assert_eq!(after.metrics.status_label, "Ended");
    }

    #[test]
    fn full_events_report_no_spots() {
        let mut op = row("r1", None, None);
        op.participant_count = 15;
        let merged = merge::<Event>(Some(&op), None, at(1, 9)).unwrap();
        assert!(merged.metrics.is_full);
        assert_eq!(merged.metrics.spots_left, Some(0));
        assert_eq!(merged.metrics.status_label, "Full");
    }

    #[test]
    fn overlay_matches_direct_merge() {
        for title in [None, Some("Ops title")] {
            let op = row("r1", Some("c1"), title);
            let content = doc("c1", "A");
            let direct = merge::<Event>(Some(&op), Some(&content), at(1, 9)).unwrap();
            let staged = merge::<Event>(Some(&op), None, at(1, 9)).unwrap();
            assert_eq!(overlay_content(staged, &content, at(1, 9)).unwrap(), direct);
        }
    }

    #[test]
    fn participation_is_omitted_from_json_when_absent() {
        let merged = merge::<Event>(Some(&row("r1", None, None)), None, at(1, 9)).unwrap();
        let json = serde_json::to_value(&merged).unwrap();
        assert!(json.get("participation_data").is_none());
        assert_eq!(json["source"], "operational");
        assert_eq!(json["fields"]["title"]["origin"], "default");
    }
}
