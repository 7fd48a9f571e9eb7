//! Vault configuration and publishing status.
//!
//! The blog's posts live in an Obsidian vault whose location is stored in
//! `.claude/settings.local.json` under `obsidianVaultPath`. A post is ready
//! to publish when its frontmatter has a `status` list containing
//! `Published`:
//!
//! ```yaml
//! ---
//! title: Hello
//! status:
//!   - Published
//! ---
//! ```
//!
//! Detection is a regular expression over the raw file text, not a YAML
//! parse, so a matching block anywhere in the file counts.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Guidance shown when no vault is configured.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "No vault configured. Run /blog:install to set up publishing.";

/// Frontmatter pattern marking a post as published.
const PUBLISHED_PATTERN: &str = r"(?i)status:\s*\n\s*-\s*published";

/// Local settings relevant to the vault. Other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSettings {
    /// Absolute path to the Obsidian vault.
    ///
    /// Kept as raw JSON so that `false`, `0`, `[]` and the like read as
    /// "not configured" instead of failing to deserialize.
    #[serde(default)]
    pub obsidian_vault_path: Option<Value>,
}

impl VaultSettings {
    /// Loads settings from `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Read`] if the file cannot be read,
    /// [`VaultError::Parse`] if it is not valid JSON, and
    /// [`VaultError::Invalid`] if it is JSON of the wrong shape.
    pub fn load(path: &Path) -> Result<Option<Self>, VaultError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| VaultError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let value: serde_json::Value = serde_json::from_str(&content).map_err(VaultError::Parse)?;
        let settings = serde_json::from_value(value).map_err(VaultError::Invalid)?;

        Ok(Some(settings))
    }

    /// The configured vault path.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`, `[]`, `{}`) are unset.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidPath`] for any other non-string value.
    pub fn vault_path(&self) -> Result<Option<&str>, VaultError> {
        match &self.obsidian_vault_path {
            None => Ok(None),
            Some(value) if is_falsy(value) => Ok(None),
            Some(Value::String(path)) => Ok(Some(path)),
            Some(other) => Err(VaultError::InvalidPath(other.to_string())),
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Errors while reading the vault settings.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The settings file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("{0}")]
    Parse(serde_json::Error),

    /// The settings file is valid JSON but not the expected shape.
    #[error("{0}")]
    Invalid(serde_json::Error),

    /// `obsidianVaultPath` is set to something other than a string.
    #[error("obsidianVaultPath must be a string, found {0}")]
    InvalidPath(String),

    /// The published-status pattern failed to compile.
    #[error("Invalid status pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Outcome of inspecting the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultStatus {
    /// No settings file, or no vault path in it.
    NotConfigured,
    /// The configured path is not an existing directory.
    NotFound(String),
    /// The vault exists but has no published posts.
    Empty,
    /// The vault has this many published posts.
    Ready(usize),
    /// The settings file is not valid JSON.
    ConfigError(String),
    /// Any other failure while checking the vault.
    CheckError(String),
}

impl VaultStatus {
    /// Human-readable summary for the hook context.
    pub fn message(&self) -> String {
        match self {
            VaultStatus::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
            VaultStatus::NotFound(path) => {
                format!("Vault path configured but not found: {path}")
            }
            VaultStatus::Empty => "Vault connected. No posts ready to publish.".to_string(),
            VaultStatus::Ready(count) => format!(
                "Ready: {count} post(s) with Published status. Run /blog:publish to continue."
            ),
            VaultStatus::ConfigError(reason) => format!("Error reading vault config: {reason}"),
            VaultStatus::CheckError(reason) => format!("Error checking vault: {reason}"),
        }
    }
}

impl From<VaultError> for VaultStatus {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Parse(_) => VaultStatus::ConfigError(err.to_string()),
            VaultError::Read { .. }
            | VaultError::Invalid(_)
            | VaultError::InvalidPath(_)
            | VaultError::Pattern(_) => VaultStatus::CheckError(err.to_string()),
        }
    }
}

/// Detects the frontmatter block that marks a post as published.
#[derive(Debug, Clone)]
pub struct PublishedMatcher {
    re: Regex,
}

impl PublishedMatcher {
    /// Compiles the status pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not compile.
    pub fn new() -> Result<Self, VaultError> {
        Ok(Self {
            re: Regex::new(PUBLISHED_PATTERN)?,
        })
    }

    /// Returns true if `content` has a published status block.
    pub fn is_published(&self, content: &str) -> bool {
        self.re.is_match(content)
    }

    /// Counts markdown files under `vault` marked as published.
    ///
    /// Visits every `*.md` entry recursively without descending into
    /// symlinked directories, so a post reachable through a link is counted
    /// once. Entries that cannot be read as UTF-8 text and traversal errors
    /// are skipped.
    pub fn count_in(&self, vault: &Path) -> usize {
        let mut count = 0;
        for entry in WalkDir::new(vault).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable vault entry: {}", e);
                    continue;
                }
            };

            let is_markdown = entry.file_name().to_string_lossy().ends_with(".md");
            if !is_markdown || entry.file_type().is_dir() {
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(content) if self.is_published(&content) => count += 1,
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        count
    }
}

/// Counts markdown files under `vault` marked as published.
///
/// # Errors
///
/// Returns an error if the status pattern does not compile.
pub fn count_published(vault: &Path) -> Result<usize, VaultError> {
    Ok(PublishedMatcher::new()?.count_in(vault))
}

/// Reads the vault settings at `settings_path` and reports the vault status.
///
/// Never fails; every problem becomes a [`VaultStatus`] variant.
pub fn inspect(settings_path: &Path) -> VaultStatus {
    tracing::info!(">>> Checking vault configuration...");

    let status = match VaultSettings::load(settings_path) {
        Ok(Some(settings)) => match settings.vault_path() {
            Ok(Some(vault_path)) => inspect_vault(vault_path),
            Ok(None) => VaultStatus::NotConfigured,
            Err(e) => VaultStatus::from(e),
        },
        Ok(None) => VaultStatus::NotConfigured,
        Err(e) => VaultStatus::from(e),
    };

    tracing::info!("  {}", status.message());
    status
}

fn inspect_vault(vault_path: &str) -> VaultStatus {
    let vault = Path::new(vault_path);
    if !vault.is_dir() {
        return VaultStatus::NotFound(vault_path.to_string());
    }

    let count = match count_published(vault) {
        Ok(count) => count,
        Err(e) => return VaultStatus::from(e),
    };
    tracing::info!("  Vault: {}", vault.display());
    tracing::info!("  Published posts: {}", count);

    if count > 0 {
        VaultStatus::Ready(count)
    } else {
        VaultStatus::Empty
    }
}
