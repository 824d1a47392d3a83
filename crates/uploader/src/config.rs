use std::path::PathBuf;

/// Default API base URL for local development.
const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Default sign-in page for local development.
const DEFAULT_SIGN_IN_URL: &str = "http://localhost:5173/sign-in";

/// Query parameter carrying the session id on the sign-in link.
const SESSION_QUERY_PARAM: &str = "session";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be an http(s) URL, got '{value}'")]
    InvalidUrl { name: &'static str, value: String },

    #[error("No platform data directory; set CLAUSEWATCH_STATE_DIR")]
    NoStateDir,
}

/// Uploader configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// API base URL, without a trailing slash.
    pub api_url: String,
    pub sign_in_url: String,
    /// Directory holding session records and parked artifacts.
    pub state_dir: PathBuf,
}

impl UploaderConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                  | Default                              |
    /// |---------------------------|--------------------------------------|
    /// | `CLAUSEWATCH_API_URL`     | `http://localhost:3000`              |
    /// | `CLAUSEWATCH_SIGN_IN_URL` | `http://localhost:5173/sign-in`      |
    /// | `CLAUSEWATCH_STATE_DIR`   | `<platform data dir>/clausewatch`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("CLAUSEWATCH_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let sign_in_url = std::env::var("CLAUSEWATCH_SIGN_IN_URL")
            .unwrap_or_else(|_| DEFAULT_SIGN_IN_URL.to_string());

        let state_dir = match std::env::var("CLAUSEWATCH_STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_local_dir()
                .ok_or(ConfigError::NoStateDir)?
                .join("clausewatch"),
        };

        Self::new(api_url, sign_in_url, state_dir)
    }

    pub fn new(
        api_url: impl Into<String>,
        sign_in_url: impl Into<String>,
        state_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let api_url = check_url("CLAUSEWATCH_API_URL", api_url.into())?;
        let sign_in_url = check_url("CLAUSEWATCH_SIGN_IN_URL", sign_in_url.into())?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            sign_in_url,
            state_dir: state_dir.into(),
        })
    }

    /// Sign-in link that returns the user to `session_id` afterwards.
    pub fn sign_in_link(&self, session_id: &str) -> String {
        let separator = if self.sign_in_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}{SESSION_QUERY_PARAM}={session_id}",
            self.sign_in_url
        )
    }

    pub fn contracts_url(&self) -> String {
        format!("{}/api/v1/contracts", self.api_url)
    }
}

fn check_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value)
    } else {
        Err(ConfigError::InvalidUrl { name, value })
    }
}
