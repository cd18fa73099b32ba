use emote_core::{EmoteError, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "EMOTE_LOG";
const DEFAULT_DIRECTIVES: &str = "emote_core=info,emote_daemon=info";

/// Install the daemon's subscriber. Output goes to stderr, which the launcher
/// redirects into the daemon log file.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| EmoteError::Other(format!("failed to initialize logging: {}", err)))
}
