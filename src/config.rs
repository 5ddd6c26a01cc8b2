// src/config.rs

//! Application configuration.
//!
//! Loaded from a TOML file with serde defaults for every field, then
//! overlaid with environment variables for the secrets the scheduler
//! injects (mail credentials, push tokens). The resulting value is passed
//! into the orchestrator explicitly; nothing reads the environment later.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::RetryPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// HTTP and fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy shared by all network calls
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Notification channels
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return defaults if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay channel secrets from the environment.
    ///
    /// Environment values win over the TOML file, matching how the
    /// scheduler injects credentials.
    pub fn apply_env(&mut self) {
        if let Ok(user) = env::var("EMAIL_USER") {
            let email = self.notify.email.get_or_insert_with(EmailConfig::default);
            email.user = user;
        }
        if let Some(email) = self.notify.email.as_mut() {
            if let Ok(pass) = env::var("EMAIL_PASS") {
                email.pass = pass;
            }
            if let Ok(to) = env::var("EMAIL_TO") {
                email.to = to;
            }
            if let Ok(sender) = env::var("EMAIL_SENDER") {
                email.sender = sender;
            }
        }
        if let Ok(token) = env::var("PUSHPLUS_TOKEN") {
            self.notify.pushplus_token = Some(token);
        }
        if let (Ok(bot_token), Ok(chat_id)) =
            (env::var("TELEGRAM_BOT_TOKEN"), env::var("TELEGRAM_CHAT_ID"))
        {
            self.notify.telegram = Some(TelegramConfig { bot_token, chat_id });
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::config("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::config("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.per_page == 0 {
            return Err(AppError::config("fetch.per_page must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be > 0"));
        }
        if let Some(email) = &self.notify.email {
            if !email.user.contains('@') {
                return Err(AppError::config("notify.email.user is not an address"));
            }
        }
        Ok(())
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Snapshot file path
    #[serde(default = "defaults::state_file")]
    pub state_file: String,

    /// Directory for downloaded PDFs
    #[serde(default = "defaults::download_dir")]
    pub download_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
            download_dir: defaults::download_dir(),
        }
    }
}

/// HTTP client and fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Delay between category requests in milliseconds
    #[serde(default = "defaults::category_delay")]
    pub category_delay_ms: u64,

    /// Listing entries requested per category
    #[serde(default = "defaults::per_page")]
    pub per_page: usize,

    /// Reporting cap in incremental mode: newly detected documents older
    /// than this many days are not notified (stale backlog protection)
    #[serde(default = "defaults::max_report_days")]
    pub max_report_days: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            category_delay_ms: defaults::category_delay(),
            per_page: defaults::per_page(),
            max_report_days: defaults::max_report_days(),
        }
    }
}

/// Notification channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// SMTP email channel
    #[serde(default)]
    pub email: Option<EmailConfig>,

    /// PushPlus token
    #[serde(default)]
    pub pushplus_token: Option<String>,

    /// Telegram bot channel
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    /// Fail the run when every configured channel failed to deliver
    #[serde(default = "defaults::require_delivery")]
    pub require_delivery: bool,
}

/// SMTP email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Account address, also the default recipient
    #[serde(default)]
    pub user: String,

    /// Account password or app token
    #[serde(default)]
    pub pass: String,

    /// Recipient address; falls back to `user` when empty
    #[serde(default)]
    pub to: String,

    /// Display name on the From header
    #[serde(default = "defaults::email_sender")]
    pub sender: String,

    /// SMTP host override; derived as `smtp.<domain>` of `user` when unset
    #[serde(default)]
    pub smtp_host: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: String::new(),
            to: String::new(),
            sender: defaults::email_sender(),
            smtp_host: None,
        }
    }
}

impl EmailConfig {
    /// Effective recipient address.
    pub fn recipient(&self) -> &str {
        if self.to.trim().is_empty() {
            &self.user
        } else {
            &self.to
        }
    }

    /// Effective SMTP host.
    pub fn host(&self) -> Option<String> {
        if let Some(host) = &self.smtp_host {
            return Some(host.clone());
        }
        self.user
            .split_once('@')
            .map(|(_, domain)| format!("smtp.{domain}"))
    }

    /// Whether the channel has enough settings to attempt delivery.
    pub fn is_configured(&self) -> bool {
        !self.user.trim().is_empty() && !self.pass.trim().is_empty()
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

mod defaults {
    pub fn state_file() -> String {
        "data/documents.json".into()
    }
    pub fn download_dir() -> String {
        "downloads".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn category_delay() -> u64 {
        1500
    }
    pub fn per_page() -> usize {
        50
    }
    pub fn max_report_days() -> u64 {
        30
    }
    pub fn email_sender() -> String {
        "CAAC 文件监控".into()
    }
    pub fn require_delivery() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_per_page() {
        let mut config = Config::default();
        config.fetch.per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_email_address() {
        let mut config = Config::default();
        config.notify.email = Some(EmailConfig {
            user: "not-an-address".into(),
            pass: "x".into(),
            ..EmailConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[fetch]
per_page = 20

[notify]
pushplus_token = "tok"
"#,
        )
        .unwrap();
        assert_eq!(config.fetch.per_page, 20);
        assert_eq!(config.fetch.timeout_secs, 60);
        assert_eq!(config.paths.state_file, "data/documents.json");
        assert_eq!(config.notify.pushplus_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_email_recipient_falls_back_to_user() {
        let email = EmailConfig {
            user: "ops@example.com".into(),
            pass: "x".into(),
            ..EmailConfig::default()
        };
        assert_eq!(email.recipient(), "ops@example.com");
        assert_eq!(email.host().as_deref(), Some("smtp.example.com"));
    }

    #[test]
    fn test_email_host_override() {
        let email = EmailConfig {
            user: "ops@example.com".into(),
            smtp_host: Some("mail.example.com".into()),
            ..EmailConfig::default()
        };
        assert_eq!(email.host().as_deref(), Some("mail.example.com"));
    }
}
