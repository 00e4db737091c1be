//! Property tests for push-output classification.

use embranch_domain::{PushOutcome, analyze_push};
use proptest::prelude::*;

proptest! {
    /// Every `(success, stdout, stderr)` triple classifies to exactly one
    /// variant, and identical inputs classify identically.
    #[test]
    fn classification_is_total_and_deterministic(
        success in any::<bool>(),
        stdout in ".{0,200}",
        stderr in ".{0,200}",
    ) {
        let first = analyze_push(success, &stdout, &stderr);
        let second = analyze_push(success, &stdout, &stderr);
        prop_assert_eq!(first, second);
    }

    /// Failed pushes never classify as a transfer outcome.
    #[test]
    fn failures_never_report_transfers(stdout in ".{0,200}", stderr in ".{0,200}") {
        let report = analyze_push(false, &stdout, &stderr);
        prop_assert!(
            !matches!(
                report.outcome,
                PushOutcome::UpToDate
                    | PushOutcome::NewBranch { .. }
                    | PushOutcome::CommitRange { .. }
                    | PushOutcome::ForcePush { .. }
            ),
            "failed push classified as a transfer outcome"
        );
    }

    /// Successful pushes never classify as a remote failure.
    #[test]
    fn successes_never_report_failures(stdout in ".{0,200}", stderr in ".{0,200}") {
        let report = analyze_push(true, &stdout, &stderr);
        prop_assert!(
            !matches!(
                report.outcome,
                PushOutcome::Rejected { .. }
                    | PushOutcome::AuthFailed
                    | PushOutcome::NetworkError
                    | PushOutcome::PermissionDenied
                    | PushOutcome::RepositoryNotFound
            ),
            "successful push classified as a remote failure"
        );
    }

    /// Up-to-date is the only outcome that reports zero pushed commits on
    /// the success path.
    #[test]
    fn commit_counts_are_zero_or_unknown(stdout in ".{0,200}", stderr in ".{0,200}") {
        let report = analyze_push(true, &stdout, &stderr);
        if report.outcome == PushOutcome::UpToDate {
            prop_assert_eq!(report.commits_pushed, 0);
        } else {
            prop_assert_eq!(report.commits_pushed, -1);
        }
    }
}
