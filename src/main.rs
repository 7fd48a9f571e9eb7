use clap::{error::ErrorKind, Parser};
use std::any::Any;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use vault_session_hook::config::{self, HookConfig, DEFAULT_MAX_LOG_LINES};
use vault_session_hook::hook::{self, HookInput, HookOutput};
use vault_session_hook::logging::{self, RULE};

/// SessionStart hook entry point.
#[derive(Parser)]
#[command(name = "session-start-hook")]
#[command(version)]
#[command(about = "SessionStart hook: load project environment and report vault status")]
#[command(long_about = "Reads the SessionStart event from stdin, appends the project's .env\n\
    variables to the session environment file and reports how many vault\n\
    posts are marked Published.\n\n\
    Always prints one JSON object to stdout and exits 0, so a failure here\n\
    never blocks the session.")]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, env = "CLAUDE_PROJECT_DIR", value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Session environment file that receives export statements
    #[arg(long, env = "CLAUDE_ENV_FILE", value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Diagnostic log (defaults to <project>/.claude/hooks/session_start.log)
    #[arg(long, env = "SESSION_HOOK_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Lines kept in the diagnostic log (invalid values fall back to 500)
    #[arg(long, env = "SESSION_HOOK_MAX_LOG_LINES", value_name = "N")]
    max_log_lines: Option<String>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let message = e.to_string();
            emit(&HookOutput::error(message.lines().next().unwrap_or_default()));
            return;
        }
    };

    // An invalid cap falls back to the default and is warned about once logging is up
    let parsed_cap = cli
        .max_log_lines
        .as_deref()
        .map(config::parse_max_log_lines);
    let (max_log_lines, cap_error) = match parsed_cap {
        Some(Ok(lines)) => (lines, None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let config = match HookConfig::resolve(
        cli.project_dir,
        cli.env_file,
        cli.log_file,
        max_log_lines,
    ) {
        Ok(config) => config,
        Err(e) => {
            emit(&HookOutput::error(format!("{e:#}")));
            return;
        }
    };

    let rotation = logging::rotate_log(&config.log_file, config.max_log_lines);

    // Held until main returns so the log is flushed after the output is written
    let _guard = logging::init(&config.log_file, cli.verbose);
    logging::log_run_started();

    if let (Some(e), Some(raw)) = (cap_error, cli.max_log_lines.as_deref()) {
        tracing::warn!(
            "Invalid log line cap {:?} ({}); keeping the last {} lines",
            raw,
            e,
            DEFAULT_MAX_LOG_LINES
        );
    }
    if let Err(e) = rotation {
        tracing::warn!("Could not rotate log {}: {}", config.log_file.display(), e);
    }

    let output = execute(&config);

    tracing::info!("HOOK OUTPUT (JSON returned via stdout):");
    tracing::info!("{}", RULE);
    tracing::info!("{}", output.to_json_pretty());
    logging::log_run_completed();

    emit(&output);
}

/// Runs the hook, turning any error or panic into an error output.
fn execute(config: &HookConfig) -> HookOutput {
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<HookOutput> {
        let (input, raw) = HookInput::parse(&read_stdin());

        tracing::info!("HOOK INPUT (JSON received via stdin):");
        tracing::info!("{}", RULE);
        let pretty = raw
            .as_ref()
            .and_then(|value| serde_json::to_string_pretty(value).ok())
            .unwrap_or_else(|| "{}".to_string());
        tracing::info!("{}", pretty);

        let report = hook::run(config, &input)?;
        Ok(report.into_output())
    }));

    match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::error!("!!! ERROR: {:#}", e);
            HookOutput::error(format!("{e:#}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("!!! ERROR: {}", message);
            HookOutput::error(message)
        }
    }
}

/// Reads all of stdin. Unreadable input is treated as empty.
fn read_stdin() -> String {
    io::read_to_string(io::stdin()).unwrap_or_else(|e| {
        tracing::debug!("Could not read stdin: {}", e);
        String::new()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

fn emit(output: &HookOutput) {
    // A closed stdout leaves nothing to report to
    let _ = writeln!(io::stdout(), "{}", output.to_json());
}
