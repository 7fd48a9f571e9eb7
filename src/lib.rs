//! SessionStart hook for the blog workspace.
//!
//! On each session start the hook copies the project's `.env` variables into
//! the session environment file provided by the host and reports how many
//! vault posts are ready to publish.

pub mod config;
pub mod dotenv;
pub mod hook;
pub mod logging;
pub mod vault;
