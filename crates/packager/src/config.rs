//! Configuration types for exporting packages and talking to the mod portal

use std::time::Duration;

/// Environment variable holding the mod portal user name
pub const USERNAME_ENV: &str = "FACTORIO_USERNAME";

/// Environment variable holding the mod portal token
pub const TOKEN_ENV: &str = "FACTORIO_TOKEN";

/// Settings for writing package files
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Deflate level for `.fmpa` entries. Mod files are zips already, so a
    /// fast level loses almost nothing.
    pub compression_level: i64,
    /// Indent the JSON document
    pub pretty_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: 1,
            pretty_json: true,
        }
    }
}

/// Builder for ExportConfig
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.config.compression_level = level.clamp(0, 9);
        self
    }

    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.config.pretty_json = pretty;
        self
    }

    pub fn build(self) -> ExportConfig {
        self.config
    }
}

/// Settings for the mod portal client
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    /// Needed for downloads only; release listings are public
    pub username: Option<String>,
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
}

impl PortalConfig {
    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn retry_delay_for(&self, attempt: usize) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.min(32) as u32);
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    /// Both credentials, if configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.token.as_deref()?))
    }

    /// Default settings with credentials taken from the environment
    ///
    /// A `.env` file in the working directory is honoured.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        Self {
            username: std::env::var(USERNAME_ENV).ok().filter(|v| !v.is_empty()),
            token: std::env::var(TOKEN_ENV).ok().filter(|v| !v.is_empty()),
            ..Self::default()
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mods.factorio.com".to_string(),
            username: None,
            token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("packager/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000), // Start with 1 second
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Builder for PortalConfig
#[derive(Debug, Default)]
pub struct PortalConfigBuilder {
    config: PortalConfig,
}

impl PortalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`PortalConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            config: PortalConfig::from_env(),
        }
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn credentials<U: Into<String>, T: Into<String>>(mut self, username: U, token: T) -> Self {
        self.config.username = Some(username.into());
        self.config.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = delay;
        self
    }

    pub fn build(self) -> PortalConfig {
        self.config
    }
}
