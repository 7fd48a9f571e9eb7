//! SessionStart hook protocol and pipeline.
//!
//! The host writes a JSON object describing the session to stdin and reads
//! a single JSON object back from stdout. The pipeline here loads the
//! project's environment, checks the vault and assembles the context string
//! returned to the assistant.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::HookConfig;
use crate::dotenv::{self, EnvOutcome};
use crate::logging::RULE;
use crate::vault::{self, VaultStatus};

/// Event name reported back to the host.
pub const EVENT_NAME: &str = "SessionStart";

/// Placeholder for input fields the host did not send.
const UNKNOWN: &str = "unknown";

/// Input sent by the host on stdin.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Why the session started: `startup`, `resume`, `clear` or `compact`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_event_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl HookInput {
    /// Parses the raw stdin text.
    ///
    /// Returns the parsed record together with the raw JSON value for
    /// logging. Anything that is not a JSON object, including empty input,
    /// yields the default record and `None`.
    pub fn parse(text: &str) -> (Self, Option<serde_json::Value>) {
        let value = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(_) => {
                tracing::debug!("Hook input is not a JSON object; treating as empty");
                return (Self::default(), None);
            }
            Err(e) => {
                tracing::debug!("Hook input is not valid JSON ({}); treating as empty", e);
                return (Self::default(), None);
            }
        };

        match serde_json::from_value::<Self>(value.clone()) {
            Ok(input) => (input, Some(value)),
            Err(e) => {
                tracing::debug!("Unexpected hook input fields ({}); treating as empty", e);
                (Self::default(), Some(value))
            }
        }
    }

    /// Session source, or `unknown`.
    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(UNKNOWN)
    }

    /// Session id, or `unknown`.
    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Output written to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub hook_specific_output: HookSpecificOutput,
}

/// Event-specific part of [`HookOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
}

impl HookOutput {
    /// Output carrying `context` for the assistant.
    pub fn session_start(context: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: EVENT_NAME.to_string(),
                additional_context: context.into(),
            },
        }
    }

    /// Output reporting that the hook itself failed.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::session_start(format!("SessionStart hook error: {err}"))
    }

    /// Single-line JSON for stdout.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Only plain strings are serialized, so this is unreachable in practice
            format!(
                r#"{{"hookSpecificOutput":{{"hookEventName":"{EVENT_NAME}","additionalContext":""}}}}"#
            )
        })
    }

    /// Indented JSON for the log.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }

    /// The context string sent to the assistant.
    pub fn additional_context(&self) -> &str {
        &self.hook_specific_output.additional_context
    }
}

/// What a single run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub source: String,
    pub env: EnvOutcome,
    pub vault: VaultStatus,
}

impl SessionReport {
    /// Joins the messages from each step into the context string.
    pub fn additional_context(&self) -> String {
        let mut parts = vec![format!("SessionStart hook ran (source: {}).", self.source)];
        if let Some(message) = self.env.context_message() {
            parts.push(message);
        }
        parts.push(self.vault.message());
        parts.join(" ")
    }

    pub fn into_output(self) -> HookOutput {
        HookOutput::session_start(self.additional_context())
    }
}

/// Runs the hook for one session.
///
/// Environment and vault problems are reported in the returned
/// [`SessionReport`]; only unexpected failures surface as errors.
pub fn run(config: &HookConfig, input: &HookInput) -> Result<SessionReport> {
    tracing::info!("Claude Code SessionStart Hook: Loading Environment");
    tracing::info!("{}", RULE);
    tracing::info!("Source: {}", input.source());
    tracing::info!("Session ID: {}", input.session_id());
    tracing::info!("Project directory: {}", config.project_dir.display());
    match &config.env_file {
        Some(path) => tracing::info!("CLAUDE_ENV_FILE: {}", path.display()),
        None => tracing::info!("CLAUDE_ENV_FILE: not set"),
    }
    tracing::info!("Log file: {}", config.log_file.display());

    let env = dotenv::load_into(&config.dotenv_path(), config.env_file.as_deref());
    let vault = vault::inspect(&config.settings_path());

    tracing::info!("{}", RULE);
    tracing::info!("SessionStart Complete!");
    tracing::info!("{}", RULE);

    Ok(SessionReport {
        source: input.source().to_string(),
        env,
        vault,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(project: &TempDir, env_file: Option<PathBuf>) -> HookConfig {
        HookConfig {
            project_dir: project.path().to_path_buf(),
            env_file,
            log_file: project.path().join("hook.log"),
            max_log_lines: 500,
        }
    }

    #[test]
    fn test_parse_full_input() {
        let (input, raw) = HookInput::parse(
            r#"{"session_id":"abc123","source":"resume","hook_event_name":"SessionStart","transcript_path":"/t.jsonl","cwd":"/work","extra":1}"#,
        );

        assert_eq!(input.session_id(), "abc123");
        assert_eq!(input.source(), "resume");
        assert_eq!(input.cwd.as_deref(), Some("/work"));
        assert!(raw.is_some());
    }

    #[test]
    fn test_parse_invalid_json_is_default() {
        for text in ["", "not json", "{", "[1, 2]", "42", "null"] {
            let (input, raw) = HookInput::parse(text);
            assert_eq!(input, HookInput::default(), "input {text:?}");
            assert!(raw.is_none(), "input {text:?}");
        }
    }

    #[test]
    fn test_parse_wrong_field_types_is_default() {
        let (input, raw) = HookInput::parse(r#"{"source": 5}"#);

        assert_eq!(input.source(), "unknown");
        assert!(raw.is_some(), "raw input is still kept for logging");
    }

    #[test]
    fn test_output_schema() -> anyhow::Result<()> {
        let output = HookOutput::session_start("hello");
        let value: serde_json::Value = serde_json::from_str(&output.to_json())?;

        assert_eq!(
            value,
            serde_json::json!({
                "hookSpecificOutput": {
                    "hookEventName": "SessionStart",
                    "additionalContext": "hello"
                }
            })
        );

        Ok(())
    }

    #[test]
    fn test_error_output() {
        let output = HookOutput::error("disk on fire");
        assert_eq!(
            output.additional_context(),
            "SessionStart hook error: disk on fire"
        );
        assert!(!output.to_json().contains('\n'));
    }

    #[test]
    fn test_report_context_joins_parts() {
        let report = SessionReport {
            source: "startup".to_string(),
            env: EnvOutcome::Loaded(vec!["FOO".to_string(), "BAZ".to_string()]),
            vault: VaultStatus::Ready(2),
        };

        assert_eq!(
            report.additional_context(),
            "SessionStart hook ran (source: startup). \
             Loaded environment variables: FOO, BAZ \
             Ready: 2 post(s) with Published status. Run /blog:publish to continue."
        );
    }

    #[test]
    fn test_report_context_skips_empty_env() {
        let report = SessionReport {
            source: "unknown".to_string(),
            env: EnvOutcome::NoTarget,
            vault: VaultStatus::NotConfigured,
        };

        assert_eq!(
            report.additional_context(),
            "SessionStart hook ran (source: unknown). \
             No vault configured. Run /blog:install to set up publishing."
        );
    }

    #[test]
    fn test_run_empty_project() -> anyhow::Result<()> {
        let project = TempDir::new()?;
        let config = test_config(&project, None);

        let report = run(&config, &HookInput::default())?;

        assert_eq!(report.source, "unknown");
        assert_eq!(report.env, EnvOutcome::NoTarget);
        assert_eq!(report.vault, VaultStatus::NotConfigured);

        Ok(())
    }

    #[test]
    fn test_run_loads_env_and_counts_posts() -> anyhow::Result<()> {
        let project = TempDir::new()?;
        let vault_dir = project.path().join("vault");
        fs::create_dir_all(&vault_dir)?;
        fs::write(vault_dir.join("a.md"), "status:\n  - Published\n")?;
        fs::write(project.path().join(".env"), "FOO=bar\n")?;
        fs::create_dir_all(project.path().join(".claude"))?;
        fs::write(
            project.path().join(".claude").join("settings.local.json"),
            serde_json::json!({ "obsidianVaultPath": vault_dir }).to_string(),
        )?;
        let env_file = project.path().join("session.env");
        let config = test_config(&project, Some(env_file.clone()));
        let (input, _) = HookInput::parse(r#"{"source":"startup"}"#);

        let report = run(&config, &input)?;

        assert_eq!(report.env, EnvOutcome::Loaded(vec!["FOO".to_string()]));
        assert_eq!(report.vault, VaultStatus::Ready(1));
        assert_eq!(fs::read_to_string(env_file)?, "export FOO='bar'\n");
        assert!(report
            .additional_context()
            .starts_with("SessionStart hook ran (source: startup)."));

        Ok(())
    }
}
