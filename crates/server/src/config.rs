use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Apply pending migrations before the scheduler starts.
    #[serde(default)]
    pub run_migrations: bool,
    /// Upper bound for a single ledger or finder statement.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailBackend {
    #[default]
    Smtp,
    HttpApi,
}

#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Upgrade a plain connection with STARTTLS (port 587) instead of
    /// connecting over implicit TLS (port 465).
    #[serde(default)]
    pub starttls: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("starttls", &self.starttls)
            .finish_non_exhaustive()
    }
}

/// Transactional email provider reached over HTTPS.
#[derive(Clone, Deserialize)]
pub struct HttpApiConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl std::fmt::Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    #[serde(default)]
    pub backend: EmailBackend,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub http_api: Option<HttpApiConfig>,
}

impl EmailConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local time of day of the daily run, `HH:MM`.
    #[serde(default = "default_run_at")]
    pub run_at: String,
    /// IANA timezone name the run time and "today" are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Events starting within `[today, today + lookahead_days]` are reminded.
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_at: default_run_at(),
            timezone: default_timezone(),
            lookahead_days: default_lookahead_days(),
            max_concurrent_sends: default_max_concurrent_sends(),
        }
    }
}

impl SchedulerConfig {
    pub fn parsed_run_at(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M").map_err(|e| {
            ConfigError::Validation(format!(
                "scheduler.run_at must be HH:MM, got '{}': {e}",
                self.run_at
            ))
        })
    }

    pub fn parsed_timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| {
            ConfigError::Validation(format!(
                "scheduler.timezone '{}' is not a known IANA timezone: {e}",
                self.timezone
            ))
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_true() -> bool {
    true
}

fn default_statement_timeout_secs() -> u64 {
    10
}

fn default_send_timeout_secs() -> u64 {
    20
}

fn default_run_at() -> String {
    "09:00".to_string()
}

fn default_timezone() -> String {
    "America/Bogota".to_string()
}

fn default_lookahead_days() -> u32 {
    7
}

fn default_max_concurrent_sends() -> usize {
    5
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    /// Checks everything that would otherwise only fail on the first run.
    ///
    /// Missing email credentials are reported here so the process refuses to
    /// start instead of failing every delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must be set".into()));
        }
        if self.email.from.trim().is_empty() {
            return Err(ConfigError::Validation("email.from must be set".into()));
        }
        if self.email.send_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "email.send_timeout_secs must be > 0".into(),
            ));
        }
        if self.database.statement_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "database.statement_timeout_secs must be > 0".into(),
            ));
        }

        match self.email.backend {
            EmailBackend::Smtp => {
                let smtp = self.email.smtp.as_ref().ok_or_else(|| {
                    ConfigError::Validation("email.smtp is required for the smtp backend".into())
                })?;
                if smtp.server.trim().is_empty() {
                    return Err(ConfigError::Validation("email.smtp.server must be set".into()));
                }
                if smtp.port == 0 {
                    return Err(ConfigError::Validation("email.smtp.port must be > 0".into()));
                }
                if smtp.username.is_empty() || smtp.password.is_empty() {
                    return Err(ConfigError::Validation(
                        "email.smtp.username and email.smtp.password must be set".into(),
                    ));
                }
            }
            EmailBackend::HttpApi => {
                let api = self.email.http_api.as_ref().ok_or_else(|| {
                    ConfigError::Validation(
                        "email.http_api is required for the http_api backend".into(),
                    )
                })?;
                if api.endpoint.trim().is_empty() || api.api_key.is_empty() {
                    return Err(ConfigError::Validation(
                        "email.http_api.endpoint and email.http_api.api_key must be set".into(),
                    ));
                }
            }
        }

        self.scheduler.parsed_run_at()?;
        self.scheduler.parsed_timezone()?;
        if self.scheduler.max_concurrent_sends == 0 {
            return Err(ConfigError::Validation(
                "scheduler.max_concurrent_sends must be >= 1".into(),
            ));
        }

        Ok(())
    }
}

/// Load application configuration from an optional `config.yaml` plus
/// environment overrides.
///
/// A `.env` file is read first if present. Any variable matching a key path
/// separated by double underscores (e.g. `EMAIL__SMTP__PORT`) overrides the
/// file value, so a deployment can run entirely from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};

    let _ = dotenvy::dotenv();

    let cfg = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
