use std::time::Duration;

use clausewatch_events::EmailConfig;

/// Default delay between queue polls.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub poll_interval: Duration,
    /// `None` when `SMTP_HOST` is unset; the worker then has nothing to do.
    pub email: Option<EmailConfig>,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `DATABASE_URL`           | -       |
    /// | `EMAIL_POLL_INTERVAL_MS` | `1000`  |
    ///
    /// SMTP settings are read by [`EmailConfig::from_env`].
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let poll_interval_ms: u64 = std::env::var("EMAIL_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse()
            .expect("EMAIL_POLL_INTERVAL_MS must be a valid u64");

        Self {
            database_url,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            email: EmailConfig::from_env(),
        }
    }
}
