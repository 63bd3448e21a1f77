//! ClamAV subprocess integration.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::model::ScanResult;
use crate::Scanner;

/// Upper bound on one scan run; large payloads can take minutes.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Cap on captured scanner output. ClamAV prints one line per file, so a
/// pathological directory could otherwise balloon the buffer.
const OUTPUT_CAP_BYTES: u64 = 10 * 1024 * 1024;

/// Scanner implementation invoking the `clamscan` binary.
///
/// Exit-code contract: 0 means clean, 1 means infected, 2 means the scanner
/// itself failed. A missing binary is an `Error` verdict, not a crash.
pub struct ClamAvScanner {
    binary: PathBuf,
    timeout: Duration,
}

impl ClamAvScanner {
    /// Build a scanner around the given binary path.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: SCAN_TIMEOUT,
        }
    }

    /// Override the scan timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Scanner for ClamAvScanner {
    async fn scan(&self, dir: &Path) -> ScanResult {
        let started = Instant::now();
        debug!(dir = %dir.display(), "starting malware scan");

        let mut child = match Command::new(&self.binary)
            .arg("-r")
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(binary = %self.binary.display(), "scanner binary not found");
                return ScanResult::error("scanner binary not found", elapsed_ms(started));
            }
            Err(err) => {
                warn!(error = %err, "failed to launch scanner");
                return ScanResult::error(
                    format!("failed to launch scanner: {err}"),
                    elapsed_ms(started),
                );
            }
        };

        let stdout = child.stdout.take();
        let run = async {
            let mut buffer = Vec::new();
            if let Some(stdout) = stdout {
                stdout
                    .take(OUTPUT_CAP_BYTES)
                    .read_to_end(&mut buffer)
                    .await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, buffer))
        };

        let outcome = timeout(self.timeout, run).await;
        match outcome {
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                warn!(dir = %dir.display(), "scan timed out");
                ScanResult::error("scan timed out", elapsed_ms(started))
            }
            Ok(Err(err)) => {
                warn!(error = %err, "scanner io failed");
                ScanResult::error(format!("scanner io failed: {err}"), elapsed_ms(started))
            }
            Ok(Ok((status, output))) => {
                let text = String::from_utf8_lossy(&output);
                let summary = parse_output(&text);
                let duration_ms = elapsed_ms(started);
                match status.code() {
                    Some(0) => ScanResult::clean(summary.files_scanned, duration_ms),
                    Some(1) => ScanResult::infected(
                        summary.detail(),
                        summary.files_scanned,
                        summary.infected_count.max(1),
                        duration_ms,
                    ),
                    Some(2) => {
                        ScanResult::error("scanner reported an internal error", duration_ms)
                    }
                    Some(code) => ScanResult::error(
                        format!("scanner exited with unexpected code {code}"),
                        duration_ms,
                    ),
                    None => ScanResult::error("scanner terminated by signal", duration_ms),
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct ScanSummary {
    files_scanned: u64,
    infected_count: u64,
    found: Vec<String>,
}

impl ScanSummary {
    fn detail(&self) -> Option<String> {
        if self.found.is_empty() {
            None
        } else {
            Some(self.found.join("; "))
        }
    }
}

/// Extract the summary counters and `FOUND` lines from scanner output.
fn parse_output(output: &str) -> ScanSummary {
    let mut summary = ScanSummary::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Scanned files:") {
            summary.files_scanned = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("Infected files:") {
            summary.infected_count = rest.trim().parse().unwrap_or(0);
        } else if line.contains("FOUND") {
            summary.found.push(line.to_string());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanStatus;

    const INFECTED_OUTPUT: &str = "\
/data/job-1/payload.bin: Eicar-Test-Signature FOUND

----------- SCAN SUMMARY -----------
Known viruses: 8704462
Scanned directories: 1
Scanned files: 3
Infected files: 1
";

    #[test]
    fn parses_summary_counters_and_found_lines() {
        let summary = parse_output(INFECTED_OUTPUT);
        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.infected_count, 1);
        assert_eq!(
            summary.detail().as_deref(),
            Some("/data/job-1/payload.bin: Eicar-Test-Signature FOUND")
        );
    }

    #[test]
    fn clean_output_has_no_detail() {
        let summary = parse_output("Scanned files: 7\nInfected files: 0\n");
        assert_eq!(summary.files_scanned, 7);
        assert_eq!(summary.infected_count, 0);
        assert_eq!(summary.detail(), None);
    }

    #[tokio::test]
    async fn missing_binary_yields_error_without_panicking() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scanner = ClamAvScanner::new("/nonexistent/path/clamscan");
        let result = scanner.scan(dir.path()).await;
        assert_eq!(result.status, ScanStatus::Error);
        assert_eq!(result.detail.as_deref(), Some("scanner binary not found"));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        fn fake_scanner(dir: &Path, script: &str) -> PathBuf {
            let path = dir.join("fake-clamscan");
            fs::write(&path, script).expect("write script");
            let mut perms = fs::metadata(&path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("chmod");
            path
        }

        #[tokio::test]
        async fn clean_run_reports_counters() {
            let dir = tempfile::tempdir().expect("tempdir");
            let script = "#!/bin/sh\n\
                echo 'Scanned files: 4'\n\
                echo 'Infected files: 0'\n\
                exit 0\n";
            let binary = fake_scanner(dir.path(), script);
            let result = ClamAvScanner::new(binary).scan(dir.path()).await;
            assert_eq!(result.status, ScanStatus::Clean);
            assert_eq!(result.detail, None);
            assert_eq!(result.files_scanned, 4);
        }

        #[tokio::test]
        async fn infected_run_carries_threat_detail() {
            let dir = tempfile::tempdir().expect("tempdir");
            let script = "#!/bin/sh\n\
                echo '/data/x.bin: Eicar-Test-Signature FOUND'\n\
                echo 'Scanned files: 2'\n\
                echo 'Infected files: 1'\n\
                exit 1\n";
            let binary = fake_scanner(dir.path(), script);
            let result = ClamAvScanner::new(binary).scan(dir.path()).await;
            assert_eq!(result.status, ScanStatus::Infected);
            assert_eq!(result.infected_count, 1);
            assert!(
                result
                    .detail
                    .as_deref()
                    .is_some_and(|detail| detail.contains("Eicar-Test-Signature")),
                "detail must name the threat"
            );
        }

        #[tokio::test]
        async fn internal_failure_is_an_error_verdict() {
            let dir = tempfile::tempdir().expect("tempdir");
            let binary = fake_scanner(dir.path(), "#!/bin/sh\nexit 2\n");
            let result = ClamAvScanner::new(binary).scan(dir.path()).await;
            assert_eq!(result.status, ScanStatus::Error);
        }

        #[tokio::test]
        async fn hung_scanner_times_out() {
            let dir = tempfile::tempdir().expect("tempdir");
            let binary = fake_scanner(dir.path(), "#!/bin/sh\nsleep 30\n");
            let result = ClamAvScanner::new(binary)
                .with_timeout(Duration::from_millis(100))
                .scan(dir.path())
                .await;
            assert_eq!(result.status, ScanStatus::Error);
            assert_eq!(result.detail.as_deref(), Some("scan timed out"));
        }
    }
}
