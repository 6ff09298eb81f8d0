use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use hearth_core::{EntityKind, Field, FieldOrigin, Sort, UserDoc, UserRole, UserRow};
use serde::Serialize;

use crate::{cmp_missing_last, Entity, FieldRule, MergedEntity};

pub const DEFAULT_DISPLAY_NAME: &str = "Community member";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct User;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserFields {
    pub display_name: Field<String>,
    pub email: Field<String>,
    pub role: Field<UserRole>,
    pub house_id: Field<String>,
    pub joined_at: Field<DateTime<Utc>>,
    pub bio: Field<String>,
    pub avatar: Field<String>,
    pub pronouns: Field<String>,
    pub interests: Field<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetrics {
    pub days_since_joined: Option<i64>,
    pub is_resident: bool,
    pub has_profile: bool,
}

static PRECEDENCE: &[FieldRule<UserFields>] = &[
    crate::field_rule!(display_name, Operational),
    crate::field_rule!(email, Operational),
    crate::field_rule!(role, Operational),
    crate::field_rule!(house_id, Operational),
    crate::field_rule!(joined_at, Operational),
    crate::field_rule!(bio, Content),
    crate::field_rule!(avatar, Content),
    crate::field_rule!(pronouns, Content),
    crate::field_rule!(interests, Content),
];

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    type Operational = UserRow;
    type Content = UserDoc;
    type Fields = UserFields;
    type Metrics = UserMetrics;

    fn precedence() -> &'static [FieldRule<UserFields>] {
        PRECEDENCE
    }

    fn defaults() -> UserFields {
        UserFields {
            display_name: Field::defaulted(DEFAULT_DISPLAY_NAME.to_string()),
            role: Field::defaulted(UserRole::Guest),
            bio: Field::defaulted(String::new()),
            interests: Field::defaulted(Vec::new()),
            ..UserFields::default()
        }
    }

    fn operational_fields(row: &UserRow) -> UserFields {
        UserFields {
            display_name: Field::operational(row.display_name.clone()),
            email: Field::operational(row.email.clone()),
            role: Field::operational(row.role),
            house_id: Field::with_origin(row.house_id.clone(), FieldOrigin::Operational),
            joined_at: Field::operational(row.joined_at),
            ..UserFields::default()
        }
    }

    fn content_fields(doc: &UserDoc) -> UserFields {
        UserFields {
            display_name: Field::with_origin(doc.display_name.clone(), FieldOrigin::Content),
            bio: Field::with_origin(doc.bio.clone(), FieldOrigin::Content),
            avatar: Field::with_origin(doc.avatar.clone(), FieldOrigin::Content),
            pronouns: Field::with_origin(doc.pronouns.clone(), FieldOrigin::Content),
            interests: Field::content(doc.interests.clone()),
            ..UserFields::default()
        }
    }

    fn metrics(fields: &UserFields, now: DateTime<Utc>) -> UserMetrics {
        let role = fields.role.get().copied().unwrap_or(UserRole::Guest);
        UserMetrics {
            days_since_joined: fields
                .joined_at
                .get()
                .map(|joined| (now.date_naive() - joined.date_naive()).num_days().max(0)),
            is_resident: matches!(role, UserRole::Resident | UserRole::Host),
            has_profile: !fields.bio.text().trim().is_empty() || fields.avatar.get().is_some(),
        }
    }

    fn operational_sort() -> Sort {
        Sort::asc("display_name")
    }

    fn content_order() -> Sort {
        Sort::asc("displayName")
    }

    fn canonical_cmp(a: &MergedEntity<Self>, b: &MergedEntity<Self>) -> Ordering {
        cmp_missing_last(a.fields.display_name.get(), b.fields.display_name.get())
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 30, 0).single().unwrap()
    }

    fn row() -> UserRow {
        UserRow {
            id: "u1".into(),
            content_ref: Some("cms-u1".into()),
            email: "sam@example.org".into(),
            display_name: "Sam".into(),
            role: UserRole::Resident,
            house_id: Some("h1".into()),
            joined_at: Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).single().unwrap(),
        }
    }

    #[test]
    fn profile_copy_comes_from_content() {
        let doc = UserDoc {
            content_id: "cms-u1".into(),
            display_name: Some("Samantha".into()),
            bio: Some("Bakes bread on Fridays.".into()),
            avatar: None,
            pronouns: Some("they/them".into()),
            interests: vec!["baking".into()],
        };
        let merged = merge::<User>(Some(&row()), Some(&doc), now()).unwrap();
        assert_eq!(merged.fields.display_name.text(), "Sam");
        assert_eq!(merged.fields.pronouns.text(), "they/them");
        assert!(merged.metrics.has_profile);
        assert!(merged.metrics.is_resident);
        assert_eq!(merged.metrics.days_since_joined, Some(31));
    }

    #[test]
    fn operational_only_user_has_an_empty_profile() {
        let merged = merge::<User>(Some(&row()), None, now()).unwrap();
        assert!(merged.fields.bio.is_default());
        assert!(merged.fields.interests.is_default());
        assert!(!merged.metrics.has_profile);
    }
}
