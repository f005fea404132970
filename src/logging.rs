use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` when set, using `EnvFilter` directive syntax.
pub const LOG_ENV_VAR: &str = "NEONCLOCK_LOG";

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_env(LOG_ENV_VAR) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|err| anyhow!("invalid log level '{level}': {err}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!("failed to initialise logging: {err}"))
}
