//! Runtime configuration for the hook.
//!
//! The host passes everything through environment variables
//! (`CLAUDE_PROJECT_DIR`, `CLAUDE_ENV_FILE`). The binary maps those, plus its
//! own flags, onto a [`HookConfig`] which then carries every path the
//! pipeline touches.

use anyhow::{Context, Result};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

/// Default cap on the diagnostic log, in lines.
pub const DEFAULT_MAX_LOG_LINES: usize = 500;

/// Name of the dotenv file looked up in the project directory.
const DOTENV_FILE: &str = ".env";

/// Fully resolved settings for a single hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    /// Project root the session was started in.
    pub project_dir: PathBuf,

    /// Session-scoped file that receives `export` statements, if the host
    /// provided one.
    pub env_file: Option<PathBuf>,

    /// Diagnostic log written on every run.
    pub log_file: PathBuf,

    /// Number of lines kept when the log is rotated.
    pub max_log_lines: usize,
}

impl HookConfig {
    /// Resolves the configuration, falling back to the current directory
    /// when no project directory was given.
    ///
    /// Empty values for the env file or log file are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the project directory is not given and the
    /// current working directory cannot be determined.
    pub fn resolve(
        project_dir: Option<PathBuf>,
        env_file: Option<PathBuf>,
        log_file: Option<PathBuf>,
        max_log_lines: Option<usize>,
    ) -> Result<Self> {
        let project_dir = match project_dir.filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };

        let env_file = env_file.filter(|p| !p.as_os_str().is_empty());
        let log_file = log_file
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| default_log_path(&project_dir));

        Ok(Self {
            project_dir,
            env_file,
            log_file,
            max_log_lines: max_log_lines.unwrap_or(DEFAULT_MAX_LOG_LINES),
        })
    }

    /// Path of the project's dotenv file.
    pub fn dotenv_path(&self) -> PathBuf {
        self.project_dir.join(DOTENV_FILE)
    }

    /// Path of the local settings file holding the vault location.
    pub fn settings_path(&self) -> PathBuf {
        self.project_dir.join(".claude").join("settings.local.json")
    }
}

/// Parses a log cap given as text, e.g. from `SESSION_HOOK_MAX_LOG_LINES`.
///
/// Blank input yields `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the text is not a non-negative integer.
pub fn parse_max_log_lines(raw: &str) -> Result<Option<usize>, ParseIntError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some)
}

/// Returns the default log location: `<project>/.claude/hooks/session_start.log`.
pub fn default_log_path(project_dir: &Path) -> PathBuf {
    project_dir
        .join(".claude")
        .join("hooks")
        .join("session_start.log")
}
