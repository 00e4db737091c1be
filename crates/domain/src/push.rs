//! Push outcome model and the pure stdout/stderr classifier.
//!
//! The Dolt driver returns raw process output; this module turns it into a
//! structured outcome. Classification is pure data-in/data-out: identical
//! inputs always produce identical reports.

use embranch_shared::ErrorCode;
use serde::{Deserialize, Serialize};

/// Why a push was rejected by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The remote has commits the local branch lacks.
    NonFastForward,
    /// The remote asked for a fetch before accepting the push.
    FetchFirst,
    /// Rejected for another (unparsed) reason.
    Other,
}

/// Classified outcome of a `dolt push` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushOutcome {
    /// Nothing to push.
    UpToDate,
    /// A new branch was created on the remote.
    NewBranch {
        /// Remote-side ref that was created.
        target: String,
    },
    /// An existing branch advanced through a commit range.
    CommitRange {
        /// Pre-push remote commit (abbreviated).
        from: String,
        /// Post-push remote commit (abbreviated).
        to: String,
        /// Remote-side ref that advanced.
        target: String,
    },
    /// History was rewritten on the remote.
    ForcePush {
        /// Remote-side ref, when the output named one.
        target: Option<String>,
    },
    /// The remote refused the push.
    Rejected {
        /// Rejection detail.
        #[serde(rename = "reason")]
        kind: RejectionKind,
    },
    /// Credentials were missing or invalid.
    AuthFailed,
    /// The remote host could not be reached.
    NetworkError,
    /// The credentials lack permission for this repository.
    PermissionDenied,
    /// The remote repository does not exist.
    RepositoryNotFound,
    /// Output did not match any known pattern.
    Unknown,
}

impl PushOutcome {
    /// Error code for failure outcomes; `None` for successful ones.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected { .. } => Some(ErrorCode::rejected()),
            Self::AuthFailed => Some(ErrorCode::auth_failed()),
            Self::NetworkError => Some(ErrorCode::network()),
            Self::PermissionDenied => Some(ErrorCode::permission_denied()),
            Self::RepositoryNotFound => Some(ErrorCode::repository_not_found()),
            Self::UpToDate
            | Self::NewBranch { .. }
            | Self::CommitRange { .. }
            | Self::ForcePush { .. }
            | Self::Unknown => None,
        }
    }
}

/// Structured result of analyzing push output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    /// Classified outcome.
    pub outcome: PushOutcome,
    /// Number of commits pushed; `0` when up to date, `-1` when unknown
    /// (callers may recompute from the log).
    pub commits_pushed: i64,
    /// Remote URL extracted from a `To <url>` line, when present.
    pub remote_url: Option<String>,
    /// Human-readable summary.
    pub message: String,
}

/// Classify push output into a [`PushReport`].
///
/// Both streams are searched for the success patterns since Dolt builds
/// differ in which stream carries the transfer summary; failure keywords are
/// matched against stderr, falling back to stdout when stderr is empty.
/// First matching rule wins.
#[must_use]
pub fn analyze_push(success: bool, stdout: &str, stderr: &str) -> PushReport {
    let remote_url = extract_remote_url(stdout).or_else(|| extract_remote_url(stderr));
    let combined = if stderr.is_empty() {
        stdout.to_owned()
    } else {
        format!("{stdout}\n{stderr}")
    };

    if success {
        classify_success(&combined, remote_url)
    } else {
        let searched = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr
        };
        classify_failure(searched, remote_url)
    }
}

fn classify_success(output: &str, remote_url: Option<String>) -> PushReport {
    let lowered = output.to_ascii_lowercase();

    if lowered.contains("everything up-to-date") {
        return PushReport {
            outcome: PushOutcome::UpToDate,
            commits_pushed: 0,
            remote_url,
            message: "Everything up-to-date".to_owned(),
        };
    }

    for line in output.lines() {
        if let Some(target) = parse_new_branch_line(line) {
            return PushReport {
                outcome: PushOutcome::NewBranch {
                    target: target.clone(),
                },
                commits_pushed: -1,
                remote_url,
                message: format!("Created new remote branch {target}"),
            };
        }
    }

    for line in output.lines() {
        if let Some((from, to, target)) = parse_commit_range_line(line) {
            return PushReport {
                outcome: PushOutcome::CommitRange {
                    from: from.clone(),
                    to: to.clone(),
                    target: target.clone(),
                },
                commits_pushed: -1,
                remote_url,
                message: format!("Pushed {from}..{to} to {target}"),
            };
        }
    }

    if lowered.contains("forced update") || output.lines().any(is_force_push_line) {
        let target = output.lines().find_map(parse_refspec_target);
        return PushReport {
            outcome: PushOutcome::ForcePush { target },
            commits_pushed: -1,
            remote_url,
            message: "Forced update of remote branch".to_owned(),
        };
    }

    PushReport {
        outcome: PushOutcome::Unknown,
        commits_pushed: -1,
        remote_url,
        message: "Push completed successfully".to_owned(),
    }
}

fn classify_failure(searched: &str, remote_url: Option<String>) -> PushReport {
    let lowered = searched.to_ascii_lowercase();

    let matches_any = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

    let outcome = if matches_any(&["authentication failed", "401", "credentials invalid"]) {
        PushOutcome::AuthFailed
    } else if matches_any(&["rejected", "non-fast-forward", "fetch first"]) {
        let kind = if lowered.contains("fetch first") {
            RejectionKind::FetchFirst
        } else if lowered.contains("non-fast-forward") {
            RejectionKind::NonFastForward
        } else {
            RejectionKind::Other
        };
        PushOutcome::Rejected { kind }
    } else if matches_any(&["could not resolve host", "timeout", "unreachable"]) {
        PushOutcome::NetworkError
    } else if matches_any(&["permission denied", "403"]) {
        PushOutcome::PermissionDenied
    } else if matches_any(&["not found", "404"]) {
        PushOutcome::RepositoryNotFound
    } else {
        PushOutcome::Unknown
    };

    let message = match outcome {
        PushOutcome::AuthFailed => "Authentication to the remote failed".to_owned(),
        PushOutcome::Rejected { .. } => "Push rejected by the remote".to_owned(),
        PushOutcome::NetworkError => "Remote host unreachable".to_owned(),
        PushOutcome::PermissionDenied => "Permission denied by the remote".to_owned(),
        PushOutcome::RepositoryNotFound => "Remote repository not found".to_owned(),
        _ => {
            let first_line = searched.lines().next().unwrap_or("").trim();
            if first_line.is_empty() {
                "Push failed".to_owned()
            } else {
                format!("Push failed: {first_line}")
            }
        },
    };

    PushReport {
        outcome,
        commits_pushed: 0,
        remote_url,
        message,
    }
}

/// Parse `To <url>` from the start of a line.
fn extract_remote_url(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("To ") {
            let url = rest.split_whitespace().next()?;
            return Some(url.to_owned());
        }
    }
    None
}

/// Parse `* [new branch]  local -> remote`, returning the remote ref.
fn parse_new_branch_line(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix('*')?;
    let rest = rest.trim_start().strip_prefix("[new branch]")?;
    let (_, target) = split_refspec(rest)?;
    Some(target)
}

/// Parse `  abc1234..def5678  main -> main`, returning `(from, to, target)`.
fn parse_commit_range_line(line: &str) -> Option<(String, String, String)> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let trimmed = line.trim_start();
    let (range, rest) = trimmed.split_once(char::is_whitespace)?;
    let (from, to) = range.split_once("..")?;
    if from.is_empty() || to.is_empty() || !is_hex(from) || !is_hex(to) {
        return None;
    }
    let (_, target) = split_refspec(rest)?;
    Some((from.to_owned(), to.to_owned(), target))
}

fn is_force_push_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix('+')
        .is_some_and(|rest| rest.starts_with(char::is_whitespace) && !rest.trim().is_empty())
}

fn parse_refspec_target(line: &str) -> Option<String> {
    split_refspec(line).map(|(_, target)| target)
}

/// Split `local -> remote` out of a line fragment.
fn split_refspec(fragment: &str) -> Option<(String, String)> {
    let (left, right) = fragment.split_once("->")?;
    let source = left.split_whitespace().next_back()?.to_owned();
    let target = right.split_whitespace().next()?.to_owned();
    Some((source, target))
}

fn is_hex(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, 'a'..='f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_to_date_has_zero_commits() {
        let report = analyze_push(true, "Everything up-to-date\n", "");
        assert_eq!(report.outcome, PushOutcome::UpToDate);
        assert_eq!(report.commits_pushed, 0);
    }

    #[test]
    fn new_branch_extracts_remote_ref() {
        let stdout = "To https://dolthub.com/org/repo\n * [new branch]  feature -> feature\n";
        let report = analyze_push(true, stdout, "");
        assert_eq!(
            report.outcome,
            PushOutcome::NewBranch {
                target: "feature".to_owned()
            }
        );
        assert_eq!(report.commits_pushed, -1);
        assert_eq!(
            report.remote_url.as_deref(),
            Some("https://dolthub.com/org/repo")
        );
    }

    #[test]
    fn commit_range_matches_spec_scenario() {
        // Two new documents pushed: `   abc1234..def5678  main -> main`
        let report = analyze_push(true, "   abc1234..def5678  main -> main\n", "");
        assert_eq!(
            report.outcome,
            PushOutcome::CommitRange {
                from: "abc1234".to_owned(),
                to: "def5678".to_owned(),
                target: "main".to_owned(),
            }
        );
    }

    #[test]
    fn commit_range_requires_leading_whitespace_and_hex() {
        let no_indent = analyze_push(true, "abc1234..def5678 main -> main\n", "");
        assert_eq!(no_indent.outcome, PushOutcome::Unknown);

        let not_hex = analyze_push(true, "   zzz..qqq main -> main\n", "");
        assert_eq!(not_hex.outcome, PushOutcome::Unknown);
    }

    #[test]
    fn forced_update_classifies_as_force_push() {
        let report = analyze_push(true, " + abc1234...def5678 main -> main (forced update)\n", "");
        assert_eq!(
            report.outcome,
            PushOutcome::ForcePush {
                target: Some("main".to_owned())
            }
        );
    }

    #[test]
    fn successful_but_unparsed_output_is_unknown() {
        let report = analyze_push(true, "uploading chunks: 100%\n", "");
        assert_eq!(report.outcome, PushOutcome::Unknown);
        assert_eq!(report.message, "Push completed successfully");
    }

    #[test]
    fn rejected_matches_spec_scenario() {
        let stderr = "error: failed to push some refs\nhint: Updates were rejected (non-fast-forward)\n";
        let report = analyze_push(false, "", stderr);
        assert_eq!(
            report.outcome,
            PushOutcome::Rejected {
                kind: RejectionKind::NonFastForward
            }
        );
        assert_eq!(report.outcome.error_code(), Some(ErrorCode::rejected()));
    }

    #[test]
    fn failure_keyword_sets_classify_in_order() {
        let cases = [
            ("fatal: Authentication failed for remote", PushOutcome::AuthFailed),
            ("HTTP 401 returned", PushOutcome::AuthFailed),
            ("! [rejected] main -> main (fetch first)", PushOutcome::Rejected {
                kind: RejectionKind::FetchFirst,
            }),
            ("could not resolve host: dolthub.com", PushOutcome::NetworkError),
            ("connection timeout", PushOutcome::NetworkError),
            ("remote: Permission denied", PushOutcome::PermissionDenied),
            ("HTTP 403", PushOutcome::PermissionDenied),
            ("repository not found", PushOutcome::RepositoryNotFound),
            ("HTTP 404", PushOutcome::RepositoryNotFound),
            ("some inscrutable failure", PushOutcome::Unknown),
        ];

        for (stderr, expected) in cases {
            let report = analyze_push(false, "", stderr);
            assert_eq!(report.outcome, expected, "stderr: {stderr}");
        }
    }

    #[test]
    fn auth_wins_over_rejected_when_both_match() {
        // "authentication failed" appears before the rejected keyword set.
        let report = analyze_push(false, "", "authentication failed; push rejected");
        assert_eq!(report.outcome, PushOutcome::AuthFailed);
    }

    #[test]
    fn empty_stderr_falls_back_to_stdout_on_failure() {
        let report = analyze_push(false, "could not resolve host: x", "");
        assert_eq!(report.outcome, PushOutcome::NetworkError);
    }
}
