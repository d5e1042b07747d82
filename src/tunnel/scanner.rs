//! Watching `sc` stdout for its readiness or failure line.

use super::deadline::Deadline;
use super::process::{LineRead, TunnelProcess};

/// Printed once the tunnel is ready to carry traffic.
pub const SUCCESS_MARKER: &str = "you may start your tests.";
/// Printed when `sc` gives up and is about to exit.
pub const FAILURE_MARKER: &str = "Goodbye.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Success,
    Failure,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Every trimmed line read so far, newline-joined and trimmed.
    pub text: String,
    pub outcome: ScanOutcome,
}

/// Read lines until a marker shows up, the output closes, or the deadline fires.
///
/// Each line is trimmed before matching; markers are compared
/// case-insensitively against the end of the line. EOF without a marker is
/// a failure.
pub async fn scan(process: &mut TunnelProcess, deadline: &Deadline) -> ScanResult {
    let mut lines: Vec<String> = Vec::new();
    let outcome = loop {
        match process.read_line(deadline).await {
            LineRead::Line(raw) => {
                let line = raw.trim().to_string();
                let outcome = classify(&line);
                lines.push(line);
                if let Some(outcome) = outcome {
                    break outcome;
                }
            }
            LineRead::Closed => break ScanOutcome::Failure,
            LineRead::Expired => break ScanOutcome::TimedOut,
        }
    };

    ScanResult {
        text: lines.join("\n").trim().to_string(),
        outcome,
    }
}

fn classify(line: &str) -> Option<ScanOutcome> {
    if ends_with_ignore_case(line, FAILURE_MARKER) {
        Some(ScanOutcome::Failure)
    } else if ends_with_ignore_case(line, SUCCESS_MARKER) {
        Some(ScanOutcome::Success)
    } else {
        None
    }
}

fn ends_with_ignore_case(line: &str, suffix: &str) -> bool {
    line.len() >= suffix.len()
        && line.is_char_boundary(line.len() - suffix.len())
        && line[line.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_match_at_line_end_ignoring_case() {
        assert_eq!(
            classify("12 Mar 10:00:00 - Sauce Connect is up, you may start your tests."),
            Some(ScanOutcome::Success)
        );
        assert_eq!(classify("YOU MAY START YOUR TESTS."), Some(ScanOutcome::Success));
        assert_eq!(classify("12 Mar 10:00:01 - Goodbye."), Some(ScanOutcome::Failure));
        assert_eq!(classify("you may start your tests. later"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("é"), None);
    }

    #[test]
    fn failure_wins_when_both_could_match() {
        assert_eq!(classify("you may start your tests. Goodbye."), Some(ScanOutcome::Failure));
    }

    #[cfg(unix)]
    mod with_process {
        use super::super::*;
        use crate::tunnel::process::tests::fake_sc;
        use std::collections::BTreeMap;
        use std::time::Duration;
        use tokio_util::sync::CancellationToken;

        async fn scan_script(body: &str, timeout: Duration) -> ScanResult {
            let dir = tempfile::TempDir::new().unwrap();
            let sc = fake_sc(dir.path(), body);
            let mut process = TunnelProcess::spawn(&sc, dir.path(), &BTreeMap::new()).unwrap();
            let deadline = Deadline::after(timeout, CancellationToken::new());
            let result = scan(&mut process, &deadline).await;
            process.terminate().await;
            result
        }

        #[tokio::test]
        async fn success_output_ends_with_marker() {
            let result = scan_script(
                "echo '  Starting up  '\necho\necho 'Sauce Connect is up, you may start your tests.'\nsleep 60",
                Duration::from_secs(10),
            )
            .await;
            assert_eq!(result.outcome, ScanOutcome::Success);
            assert_eq!(
                result.text,
                "Starting up\n\nSauce Connect is up, you may start your tests."
            );
            assert!(result.text.ends_with(SUCCESS_MARKER));
        }

        #[tokio::test]
        async fn goodbye_is_failure() {
            let result = scan_script(
                "echo 'Bad credentials'\necho 'Goodbye.'\nsleep 60",
                Duration::from_secs(10),
            )
            .await;
            assert_eq!(result.outcome, ScanOutcome::Failure);
            assert_eq!(result.text, "Bad credentials\nGoodbye.");
        }

        #[tokio::test]
        async fn eof_without_marker_is_failure() {
            let result = scan_script("echo 'segfault'", Duration::from_secs(10)).await;
            assert_eq!(result.outcome, ScanOutcome::Failure);
            assert_eq!(result.text, "segfault");
        }

        #[tokio::test]
        async fn silence_times_out_with_partial_output() {
            let result = scan_script("echo 'Starting up'\nsleep 60", Duration::from_millis(300)).await;
            assert_eq!(result.outcome, ScanOutcome::TimedOut);
            assert_eq!(result.text, "Starting up");
        }
    }
}
