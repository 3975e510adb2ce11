//! Property-based tests for the report status state machine.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use repgen_shared::types::ReportId;

use crate::report::error::ReportError;
use crate::report::types::{NewReport, Report, ReportStatus, is_valid_transition};

/// Strategy for generating random ReportStatus values.
fn arb_status() -> impl Strategy<Value = ReportStatus> {
    prop_oneof![
        Just(ReportStatus::Pending),
        Just(ReportStatus::Processing),
        Just(ReportStatus::Completed),
        Just(ReportStatus::Failed),
        Just(ReportStatus::Canceled),
    ]
}

/// Strategy for generating audit identities.
fn arb_actor() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,30}"
}

fn report_in(status: ReportStatus) -> Report {
    let stale = Utc::now() - Duration::hours(1);
    let mut report = NewReport::builder()
        .with_title("Inventory")
        .with_created_by("creator")
        .build()
        .expect("valid input")
        .into_report(ReportId::new(), stale);
    report.status = status;
    report
}

/// The lifecycle table, spelled out edge by edge.
fn table_allows(from: ReportStatus, to: ReportStatus) -> bool {
    const EDGES: [(ReportStatus, ReportStatus); 7] = [
        (ReportStatus::Pending, ReportStatus::Processing),
        (ReportStatus::Pending, ReportStatus::Canceled),
        (ReportStatus::Processing, ReportStatus::Completed),
        (ReportStatus::Processing, ReportStatus::Failed),
        (ReportStatus::Processing, ReportStatus::Canceled),
        (ReportStatus::Failed, ReportStatus::Pending),
        (ReportStatus::Canceled, ReportStatus::Pending),
    ];
    EDGES.contains(&(from, to))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Edges in the table succeed and stamp the audit fields; all others fail
    /// with InvalidTransition and leave the entity untouched.
    #[test]
    fn prop_set_status_follows_table(
        from in arb_status(),
        to in arb_status(),
        actor in arb_actor(),
    ) {
        let mut report = report_in(from);
        let original = report.clone();
        let result = report.set_status(to, &actor);

        prop_assert_eq!(is_valid_transition(from, to), table_allows(from, to));

        if table_allows(from, to) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(report.status, to);
            prop_assert_eq!(&report.updated_by, &actor);
            prop_assert!(report.updated_at > original.updated_at);
        } else {
            prop_assert_eq!(result, Err(ReportError::InvalidTransition { from, to }));
            prop_assert_eq!(report, original);
        }
    }

    /// generated_at is stamped on entry into Completed and never moves again,
    /// whatever sequence of transitions follows.
    #[test]
    fn prop_generated_at_set_once(steps in prop::collection::vec(arb_status(), 0..12)) {
        let mut report = report_in(ReportStatus::Processing);
        report.set_status(ReportStatus::Completed, "worker").expect("valid transition");
        let generated_at = report.generated_at;
        prop_assert!(generated_at.is_some());

        for step in steps {
            let _ = report.set_status(step, "someone");
            prop_assert_eq!(report.status, ReportStatus::Completed);
            prop_assert_eq!(report.generated_at, generated_at);
        }
    }

    /// Every status survives a string round trip.
    #[test]
    fn prop_status_string_roundtrip(status in arb_status()) {
        prop_assert_eq!(status.as_str().parse::<ReportStatus>(), Ok(status));
    }
}
