use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use hearth_core::{
    ApplicationAnswer, ApplicationDoc, ApplicationRow, ApplicationStatus, EntityKind, Field,
    FieldOrigin, Sort,
};
use serde::Serialize;

use crate::status::{describe, StatusDescriptor};
use crate::{cmp_missing_last, days_between, Entity, FieldRule, MergedEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Application;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ApplicationFields {
    pub user_id: Field<String>,
    pub house_id: Field<String>,
    pub status: Field<ApplicationStatus>,
    pub submitted_at: Field<DateTime<Utc>>,
    pub reviewed_at: Field<DateTime<Utc>>,
    pub move_in_date: Field<NaiveDate>,
    pub statement: Field<String>,
    pub answers: Field<Vec<ApplicationAnswer>>,
    pub portfolio_url: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationMetrics {
    pub days_since_submitted: Option<i64>,
    pub days_until_move_in: Option<i64>,
    pub is_open: bool,
    pub status: StatusDescriptor,
}

static PRECEDENCE: &[FieldRule<ApplicationFields>] = &[
    crate::field_rule!(user_id, Operational),
    crate::field_rule!(house_id, Operational),
    crate::field_rule!(status, Operational),
    crate::field_rule!(submitted_at, Operational),
    crate::field_rule!(reviewed_at, Operational),
    crate::field_rule!(move_in_date, Operational),
    crate::field_rule!(statement, Content),
    crate::field_rule!(answers, Content),
    crate::field_rule!(portfolio_url, Content),
];

fn is_terminal(status: ApplicationStatus) -> bool {
    matches!(
        status,
        ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
    )
}

impl Entity for Application {
    const KIND: EntityKind = EntityKind::Application;

    type Operational = ApplicationRow;
    type Content = ApplicationDoc;
    type Fields = ApplicationFields;
    type Metrics = ApplicationMetrics;

    fn precedence() -> &'static [FieldRule<ApplicationFields>] {
        PRECEDENCE
    }

    fn defaults() -> ApplicationFields {
        ApplicationFields {
            status: Field::defaulted(ApplicationStatus::Draft),
            statement: Field::defaulted(String::new()),
            answers: Field::defaulted(Vec::new()),
            ..ApplicationFields::default()
        }
    }

    fn operational_fields(row: &ApplicationRow) -> ApplicationFields {
        let op = FieldOrigin::Operational;
        ApplicationFields {
            user_id: Field::operational(row.user_id.clone()),
            house_id: Field::operational(row.house_id.clone()),
            status: Field::operational(row.status),
            submitted_at: Field::with_origin(row.submitted_at, op),
            reviewed_at: Field::with_origin(row.reviewed_at, op),
            move_in_date: Field::with_origin(row.move_in_date, op),
            ..ApplicationFields::default()
        }
    }

    fn content_fields(doc: &ApplicationDoc) -> ApplicationFields {
        ApplicationFields {
            statement: Field::with_origin(doc.statement.clone(), FieldOrigin::Content),
            answers: Field::content(doc.answers.clone()),
            portfolio_url: Field::with_origin(doc.portfolio_url.clone(), FieldOrigin::Content),
            ..ApplicationFields::default()
        }
    }

    fn metrics(fields: &ApplicationFields, now: DateTime<Utc>) -> ApplicationMetrics {
        let status = fields
            .status
            .get()
            .copied()
            .unwrap_or(ApplicationStatus::Draft);
        ApplicationMetrics {
            days_since_submitted: fields
                .submitted_at
                .get()
                .map(|at| -days_between(now, at.date_naive())),
            days_until_move_in: fields.move_in_date.get().map(|date| days_between(now, *date)),
            is_open: !is_terminal(status),
            status: describe(status),
        }
    }

    fn operational_sort() -> Sort {
        Sort::desc("submitted_at")
    }

    fn content_order() -> Sort {
        Sort::desc("_createdAt")
    }

    /// Newest submissions first; unsubmitted drafts last.
    fn canonical_cmp(a: &MergedEntity<Self>, b: &MergedEntity<Self>) -> Ordering {
        let (a_at, b_at) = (a.fields.submitted_at.get(), b.fields.submitted_at.get());
        let by_submission = match (a_at, b_at) {
            (Some(a_at), Some(b_at)) => b_at.cmp(a_at),
            _ => cmp_missing_last(a_at, b_at),
        };
        by_submission.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 15, 10, 0, 0).single().unwrap()
    }

    fn row(id: &str, status: ApplicationStatus, submitted_day: Option<u32>) -> ApplicationRow {
        ApplicationRow {
            id: id.into(),
            content_ref: None,
            user_id: "u1".into(),
            house_id: "h1".into(),
            status,
            submitted_at: submitted_day
                .map(|day| Utc.with_ymd_and_hms(2026, 9, day, 9, 0, 0).single().unwrap()),
            reviewed_at: None,
            move_in_date: NaiveDate::from_ymd_opt(2026, 10, 1),
        }
    }

    #[test]
    fn metrics_carry_the_status_descriptor() {
        let merged = merge::<Application>(
            Some(&row("a1", ApplicationStatus::InterviewScheduled, Some(5))),
            None,
            now(),
        )
        .unwrap();
        assert_eq!(merged.metrics.days_since_submitted, Some(10));
        assert_eq!(merged.metrics.days_until_move_in, Some(16));
        assert!(merged.metrics.is_open);
        assert_eq!(merged.metrics.status.label, "Interview scheduled");
        assert!(merged.fields.answers.is_default());
    }

    #[test]
    fn answers_come_from_content() {
        let doc = ApplicationDoc {
            content_id: "cms-a1".into(),
            statement: Some("I love cooking for twelve.".into()),
            answers: vec![ApplicationAnswer {
                question: "Chores you enjoy?".into(),
                answer: "Dishes".into(),
            }],
            portfolio_url: None,
        };
        let mut op = row("a1", ApplicationStatus::Accepted, Some(1));
        op.content_ref = Some("cms-a1".into());
        let merged = merge::<Application>(Some(&op), Some(&doc), now()).unwrap();
        assert_eq!(merged.fields.answers.get().map(Vec::len), Some(1));
        assert!(!merged.metrics.is_open);
    }

    #[test]
    fn newest_submissions_sort_first() {
        let mut items = [
            row("a1", ApplicationStatus::Submitted, Some(2)),
            row("a2", ApplicationStatus::Draft, None),
            row("a3", ApplicationStatus::Submitted, Some(9)),
        ]
        .iter()
        .map(|r| merge::<Application>(Some(r), None, now()).unwrap())
        .collect::<Vec<_>>();
        items.sort_by(Application::canonical_cmp);
        let ids = items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a3", "a1", "a2"]);
    }
}
