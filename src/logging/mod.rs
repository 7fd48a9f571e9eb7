//! Diagnostic logging for the hook.
//!
//! Every run appends to a plain-text log next to the hook. The log is
//! trimmed to its most recent lines before each run so it never grows
//! without bound, then a `tracing` subscriber writes to both stderr and
//! the log file for the rest of the run.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Separator used to frame sections of the log.
pub const RULE: &str = "------------------------------------------------------------";

/// Trims the log at `path` to its last `max_lines` lines.
///
/// Returns `Ok(true)` if the file was rewritten and `Ok(false)` if there was
/// nothing to do (no log yet, or already within the cap).
///
/// # Errors
///
/// Returns an error if the log exists but cannot be read or rewritten.
/// Callers treat this as non-fatal.
pub fn rotate_log(path: &Path, max_lines: usize) -> io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return Ok(false);
    }

    let kept = &lines[lines.len() - max_lines..];
    let mut rotated = kept.join("\n");
    if !kept.is_empty() {
        rotated.push('\n');
    }
    fs::write(path, rotated)?;

    Ok(true)
}

/// Installs the global subscriber for this run.
///
/// Logs go to stderr and, when the log file can be opened, to `log_file` as
/// well. The returned guard flushes the file writer when dropped and must be
/// held until the hook has finished. If the log file cannot be opened the
/// hook still runs with stderr logging only.
pub fn init(log_file: &Path, verbose: bool) -> Option<WorkerGuard> {
    let default_filter = if verbose {
        "vault_session_hook=debug,session_start_hook=debug"
    } else {
        "vault_session_hook=info,session_start_hook=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .without_time();

    let (file_layer, guard, open_error) = match open_log_file(log_file) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    // try_init so repeated initialisation in tests does not panic
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some(e) = open_error {
        tracing::warn!(
            "Could not open log file {}: {}; logging to stderr only",
            log_file.display(),
            e
        );
    }

    guard
}

/// Opens the log in append mode, creating its directory if needed.
fn open_log_file(log_file: &Path) -> io::Result<fs::File> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(log_file)
}

/// Logs the banner that opens a run.
pub fn log_run_started() {
    tracing::info!("=== SessionStart Hook: {} ===", Local::now().to_rfc3339());
}

/// Logs the line that closes a run.
pub fn log_run_completed() {
    tracing::info!(
        "=== SessionStart Hook Completed: {} ===",
        Local::now().to_rfc3339()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn numbered_lines(count: usize) -> String {
        (1..=count).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_rotate_log_missing_file_is_noop() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("missing.log");

        assert!(!rotate_log(&path, 500)?);
        assert!(!path.exists(), "rotation must not create the log");

        Ok(())
    }

    #[test]
    fn test_rotate_log_under_cap_is_untouched() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("hook.log");
        let original = numbered_lines(10);
        fs::write(&path, &original)?;

        assert!(!rotate_log(&path, 500)?);
        assert_eq!(fs::read_to_string(&path)?, original);

        Ok(())
    }

    #[test]
    fn test_rotate_log_keeps_last_lines() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("hook.log");
        fs::write(&path, numbered_lines(600))?;

        assert!(rotate_log(&path, 500)?);

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 500);
        assert_eq!(lines.first(), Some(&"line 101"));
        assert_eq!(lines.last(), Some(&"line 600"));
        assert!(content.ends_with('\n'));

        Ok(())
    }

    #[test]
    fn test_rotate_log_exactly_at_cap() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("hook.log");
        fs::write(&path, numbered_lines(500))?;

        assert!(!rotate_log(&path, 500)?);
        assert_eq!(fs::read_to_string(&path)?.lines().count(), 500);

        Ok(())
    }

    #[test]
    fn test_rotate_log_zero_cap_empties_file() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("hook.log");
        fs::write(&path, numbered_lines(3))?;

        assert!(rotate_log(&path, 0)?);
        assert_eq!(fs::read_to_string(&path)?, "");

        Ok(())
    }

    #[test]
    fn test_rotate_log_unreadable_is_error() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("hook.log");
        fs::write(&path, [0xff, 0xfe, b'\n', 0xff])?;

        assert!(rotate_log(&path, 1).is_err());
        assert_eq!(fs::read(&path)?, vec![0xff, 0xfe, b'\n', 0xff]);

        Ok(())
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".claude").join("hooks").join("session_start.log");

        open_log_file(&path)?;

        assert!(path.exists());
        Ok(())
    }
}
