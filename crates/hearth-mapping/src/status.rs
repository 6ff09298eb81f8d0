//! User-facing descriptions of application statuses.

use hearth_core::ApplicationStatus;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Gray,
    Blue,
    Indigo,
    Purple,
    Green,
    Amber,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDescriptor {
    pub label: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<&'static str>,
    pub color: StatusColor,
}

pub const UNKNOWN: StatusDescriptor = StatusDescriptor {
    label: "Unknown",
    description: "This application has a status we don't recognise.",
    next_steps: Some("Contact the house team if this persists."),
    color: StatusColor::Gray,
};

pub fn describe(status: ApplicationStatus) -> StatusDescriptor {
    use ApplicationStatus::*;

    match status {
        Draft => StatusDescriptor {
            label: "Draft",
            description: "Your application has not been submitted yet.",
            next_steps: Some("Finish the remaining questions and submit."),
            color: StatusColor::Gray,
        },
        Submitted => StatusDescriptor {
            label: "Submitted",
            description: "We received your application.",
            next_steps: Some("The house team reviews new applications weekly."),
            color: StatusColor::Blue,
        },
        UnderReview => StatusDescriptor {
            label: "Under review",
            description: "Residents are reading your application.",
            next_steps: None,
            color: StatusColor::Indigo,
        },
        InterviewScheduled => StatusDescriptor {
            label: "Interview scheduled",
            description: "You're invited to meet the house.",
            next_steps: Some("Check your email for the time and place."),
            color: StatusColor::Purple,
        },
        Accepted => StatusDescriptor {
            label: "Accepted",
            description: "Welcome home! Your application was accepted.",
            next_steps: Some("Confirm your move-in date with the house."),
            color: StatusColor::Green,
        },
        Waitlisted => StatusDescriptor {
            label: "Waitlisted",
            description: "The house is full right now; you're on the waitlist.",
            next_steps: Some("We'll reach out when a room opens up."),
            color: StatusColor::Amber,
        },
        Rejected => StatusDescriptor {
            label: "Not accepted",
            description: "The house decided not to move forward this time.",
            next_steps: Some("You're welcome to apply to other houses."),
            color: StatusColor::Red,
        },
        Withdrawn => StatusDescriptor {
            label: "Withdrawn",
            description: "You withdrew this application.",
            next_steps: None,
            color: StatusColor::Gray,
        },
    }
}

/// Describes a status read as text. Unrecognised values are a programming error:
/// debug builds panic, release builds log and fall back to [`UNKNOWN`].
pub fn describe_raw(status: &str) -> StatusDescriptor {
    match status.parse::<ApplicationStatus>() {
        Ok(status) => describe(status),
        Err(err) => {
            tracing::error!(status, error = %err, "application status has no descriptor");
            debug_assert!(false, "application status `{status}` has no descriptor");
            UNKNOWN
        }
    }
}

/// Every status with its descriptor, in declaration order.
pub fn status_catalog() -> Vec<(ApplicationStatus, StatusDescriptor)> {
    ApplicationStatus::ALL
        .iter()
        .map(|status| (*status, describe(*status)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_a_label() {
        for (status, descriptor) in status_catalog() {
            assert!(!descriptor.label.is_empty(), "{status} has no label");
            assert!(!descriptor.description.is_empty());
            assert_ne!(descriptor, UNKNOWN);
        }
        assert_eq!(status_catalog().len(), ApplicationStatus::ALL.len());
    }

    #[test]
    fn raw_text_resolves_known_statuses() {
        assert_eq!(describe_raw("under_review").label, "Under review");
        assert_eq!(describe_raw("accepted").color, StatusColor::Green);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "has no descriptor")]
    fn unknown_status_fails_loudly_in_debug_builds() {
        describe_raw("ghosted");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn unknown_status_degrades_in_release_builds() {
        assert_eq!(describe_raw("ghosted"), UNKNOWN);
    }

    #[test]
    fn descriptors_serialize_without_empty_next_steps() {
        let json = serde_json::to_value(describe(ApplicationStatus::Withdrawn)).unwrap();
        assert!(json.get("next_steps").is_none());
        assert_eq!(json["color"], "gray");
    }
}
