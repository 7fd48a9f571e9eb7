//! Loads the project's `.env` file into the session environment.
//!
//! The host gives each session an environment file (`CLAUDE_ENV_FILE`) that
//! it sources before running commands. Variables from the project's dotenv
//! file are appended to it as single-quoted shell `export` statements.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Errors from reading the dotenv file or writing the exports.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The dotenv file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path of the dotenv file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The session environment file could not be opened or written.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Path of the session environment file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Result of the environment loading step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOutcome {
    /// Variables were appended; holds their names in file order.
    Loaded(Vec<String>),
    /// The host did not provide an environment file.
    NoTarget,
    /// The project has no dotenv file at this path.
    NoSource(PathBuf),
    /// Reading or writing failed; nothing further was attempted.
    Failed(String),
}

impl EnvOutcome {
    /// Text this outcome contributes to the hook context, if any.
    pub fn context_message(&self) -> Option<String> {
        match self {
            EnvOutcome::Loaded(names) if !names.is_empty() => Some(format!(
                "Loaded environment variables: {}",
                names.join(", ")
            )),
            EnvOutcome::Failed(reason) => {
                Some(format!("Could not load environment variables: {reason}"))
            }
            _ => None,
        }
    }
}

/// Reads a dotenv file into an ordered list of variables.
///
/// Quoting, comments and `export` prefixes follow `dotenvy`. Unquoted values
/// are taken literally up to an inline comment and only `${VAR}` references
/// are substituted (see [`quote_bare_values`]). Lines that fail to parse are
/// skipped. When a key repeats, the last value wins but the key keeps its
/// first position.
///
/// # Errors
///
/// Returns an error if the file cannot be read as UTF-8 text.
pub fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>, EnvError> {
    let text = fs::read_to_string(path).map_err(|source| EnvError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let normalized = quote_bare_values(&text);

    let mut vars: Vec<(String, String)> = Vec::new();
    for item in dotenvy::from_read_iter(normalized.as_bytes()) {
        match item {
            Ok((key, value)) => match vars.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => vars.push((key, value)),
            },
            Err(e) => {
                tracing::warn!("Skipping malformed line in {}: {}", path.display(), e);
            }
        }
    }

    Ok(vars)
}

/// Rewrites values so `dotenvy` reads them the way a dotenv file means them.
///
/// `dotenvy` treats a quote anywhere in a value as the start of a quoted
/// section, backslashes as escapes, inner whitespace as the end of the value
/// and any `$NAME` as a substitution, so `BAZ=a'b` would be rejected and
/// `PASS=pa$word` cut short. Bare values are literal text up to an inline
/// ` #` comment, with only `${NAME}` expanded; they are rewritten as escaped
/// double-quoted values. Inside double-quoted values (including the body of a
/// multi-line one) a `$` not followed by `{` is escaped. Single-quoted values
/// and plain lines pass through untouched.
fn quote_bare_values(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open_quote: Option<char> = None;

    for line in text.lines() {
        if let Some(quote) = open_quote {
            if closes_quote(line, quote) {
                open_quote = None;
            }
            if quote == '"' {
                out.push_str(&escape_dollars(line));
            } else {
                out.push_str(line);
            }
            out.push('\n');
            continue;
        }

        let Some((head, value)) = split_assignment(line) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        let trimmed = value.trim_start();
        match trimmed.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                if !closes_quote(&trimmed[1..], quote) {
                    open_quote = Some(quote);
                }
                if quote == '"' {
                    out.push_str(head);
                    out.push_str(&escape_dollars(value));
                } else {
                    out.push_str(line);
                }
            }
            _ if bare_value(value).contains(needs_quoting) => {
                out.push_str(head);
                out.push('"');
                let mut chars = bare_value(value).chars().peekable();
                while let Some(c) = chars.next() {
                    let escape = match c {
                        '\\' | '"' => true,
                        '$' => chars.peek() != Some(&'{'),
                        _ => false,
                    };
                    if escape {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }

    out
}

/// Returns true if `text` holds an unescaped `quote`. Backslashes only
/// escape inside double quotes.
fn closes_quote(text: &str, quote: char) -> bool {
    if quote != '"' {
        return text.contains(quote);
    }

    let mut escaped = false;
    for c in text.chars() {
        if c == quote && !escaped {
            return true;
        }
        escaped = c == '\\' && !escaped;
    }
    false
}

/// Escapes each unescaped `$` that does not start a `${NAME}` reference.
fn escape_dollars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if c == '$' && !escaped && chars.peek() != Some(&'{') {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }

    out
}

/// The literal text of an unquoted value.
fn bare_value(value: &str) -> &str {
    strip_inline_comment(value).trim()
}

fn needs_quoting(c: char) -> bool {
    matches!(c, '\'' | '"' | '\\' | '$') || c.is_whitespace()
}

/// Splits `KEY=value` into (`KEY=`, `value`). Comments and lines without
/// `=` yield `None`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    if line.trim_start().starts_with('#') {
        return None;
    }
    let idx = line.find('=')?;
    Some(line.split_at(idx + 1))
}

/// Cuts a bare value at the first `#` preceded by whitespace.
fn strip_inline_comment(value: &str) -> &str {
    let mut prev_is_space = false;
    for (idx, c) in value.char_indices() {
        if c == '#' && prev_is_space {
            return &value[..idx];
        }
        prev_is_space = c.is_whitespace();
    }
    value
}

/// Formats a variable as a shell `export` statement.
///
/// The value is single-quoted; embedded single quotes are closed, emitted
/// inside double quotes and reopened (`'` becomes `'"'"'`).
pub fn shell_export_line(key: &str, value: &str) -> String {
    let escaped = value.replace('\'', r#"'"'"'"#);
    format!("export {key}='{escaped}'")
}

/// Appends one `export` line per variable to `target`, in order.
///
/// The file is created if missing. Returns the names written.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_exports(target: &Path, vars: &[(String, String)]) -> Result<Vec<String>, EnvError> {
    let write_error = |source| EnvError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(target)
        .map_err(write_error)?;

    let mut buf = String::new();
    for (key, value) in vars {
        buf.push_str(&shell_export_line(key, value));
        buf.push('\n');
    }
    file.write_all(buf.as_bytes()).map_err(write_error)?;
    file.flush().map_err(write_error)?;

    Ok(vars.iter().map(|(key, _)| key.clone()).collect())
}

/// Loads `source` into `target`, reporting what happened.
///
/// Never fails: a missing target or source means there is nothing to do, and
/// read or write errors are logged and reported as [`EnvOutcome::Failed`].
pub fn load_into(source: &Path, target: Option<&Path>) -> EnvOutcome {
    let Some(target) = target else {
        tracing::info!(">>> CLAUDE_ENV_FILE not available - cannot persist variables");
        return EnvOutcome::NoTarget;
    };

    if !source.exists() {
        tracing::info!(">>> No .env file found at {}", source.display());
        return EnvOutcome::NoSource(source.to_path_buf());
    }

    tracing::info!(">>> Loading variables from {}...", source.display());

    let result = read_dotenv(source).and_then(|vars| append_exports(target, &vars));
    match result {
        Ok(names) => {
            for name in &names {
                tracing::info!("  Loaded: {}", name);
            }
            EnvOutcome::Loaded(names)
        }
        Err(e) => {
            tracing::error!("  Error loading .env: {}", e);
            EnvOutcome::Failed(e.to_string())
        }
    }
}
