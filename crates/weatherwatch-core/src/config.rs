use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

/// Default OpenWeather current-conditions endpoint.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Environment variable naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "WEATHERWATCH_CONFIG";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider access
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Outbound alert mail
    #[serde(default)]
    pub mail: MailConfig,

    /// Poll scheduler settings
    #[serde(default)]
    pub poller: PollerConfig,

    /// Reading database location
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenWeather API key. Prefer `WEATHERWATCH_API_KEY` over storing it here.
    #[serde(default)]
    pub api_key: String,

    /// Current-conditions endpoint
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host (STARTTLS)
    #[serde(default = "default_mail_host")]
    pub host: String,

    #[serde(default = "default_mail_port")]
    pub port: u16,

    /// Sender address, also used as the SMTP login
    #[serde(default)]
    pub sender: String,

    /// SMTP password or app token. Prefer `WEATHERWATCH_MAIL_CREDENTIAL`.
    #[serde(default)]
    pub credential: String,
}

fn default_mail_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_mail_port() -> u16 {
    587
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: default_mail_host(),
            port: default_mail_port(),
            sender: String::new(),
            credential: String::new(),
        }
    }
}

impl MailConfig {
    /// Check if sender credentials are present
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.sender.trim().is_empty()
            && !self.credential.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Pause between the end of one cycle and the start of the next
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Fixed city list, polled in this order every cycle
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,

    /// City whose summary is shown on the dashboard
    #[serde(default = "default_summary_city")]
    pub summary_city: String,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_cities() -> Vec<String> {
    ["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_summary_city() -> String {
    "Delhi".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cities: default_cities(),
            summary_city: default_summary_city(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    default_config_dir().join("weather_data.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP API
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weatherwatch")
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist.
    ///
    /// `WEATHERWATCH_CONFIG` overrides the location. Environment overrides are
    /// applied after the file is read.
    pub fn load() -> Result<Self> {
        let config_path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => Self::config_path()?,
        };
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating a default file if missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        Self::load_from_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load_from`], with overrides read through `lookup`
    /// instead of the process environment.
    pub fn load_from_with<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            config
        };

        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply `WEATHERWATCH_*` overrides supplied by `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEATHERWATCH_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(host) = lookup("WEATHERWATCH_MAIL_HOST") {
            self.mail.host = host;
        }
        if let Some(port) = lookup("WEATHERWATCH_MAIL_PORT") {
            match port.trim().parse() {
                Ok(port) => self.mail.port = port,
                Err(_) => tracing::warn!("Ignoring invalid WEATHERWATCH_MAIL_PORT: {}", port),
            }
        }
        if let Some(sender) = lookup("WEATHERWATCH_MAIL_SENDER") {
            self.mail.sender = sender;
        }
        if let Some(credential) = lookup("WEATHERWATCH_MAIL_CREDENTIAL") {
            self.mail.credential = credential;
        }
        if let Some(interval) = lookup("WEATHERWATCH_POLL_INTERVAL_SECONDS") {
            match interval.trim().parse() {
                Ok(secs) => self.poller.interval_secs = secs,
                Err(_) => tracing::warn!(
                    "Ignoring invalid WEATHERWATCH_POLL_INTERVAL_SECONDS: {}",
                    interval
                ),
            }
        }
        if let Some(cities) = lookup("WEATHERWATCH_CITIES") {
            self.poller.cities = cities
                .split(',')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.provider.api_key.trim().is_empty() {
            result.add_error(
                "provider.api_key",
                "API key is required (set WEATHERWATCH_API_KEY)",
            );
        }

        self.validate_url(&self.provider.base_url, "provider.base_url", &mut result);

        if self.provider.timeout_secs == 0 {
            result.add_error("provider.timeout_secs", "Timeout must be greater than 0");
        }

        if self.poller.interval_secs == 0 {
            result.add_error("poller.interval_secs", "Poll interval must be greater than 0");
        } else if self.poller.interval_secs < 60 {
            result.add_warning(
                "poller.interval_secs",
                "Poll interval under one minute may exceed provider rate limits",
            );
        }

        if self.poller.cities.is_empty() {
            result.add_error("poller.cities", "At least one city is required");
        }
        if self.poller.cities.iter().any(|c| c.trim().is_empty()) {
            result.add_error("poller.cities", "City names cannot be blank");
        }
        // Names are matched exactly, so padding would split a city's readings.
        for city in &self.poller.cities {
            if !city.trim().is_empty() && city.trim() != city {
                result.add_error(
                    "poller.cities",
                    format!("City name has surrounding whitespace: {:?}", city),
                );
            }
        }
        if self.poller.summary_city.trim() != self.poller.summary_city {
            result.add_error(
                "poller.summary_city",
                format!(
                    "City name has surrounding whitespace: {:?}",
                    self.poller.summary_city
                ),
            );
        }

        let mut seen = HashSet::new();
        for city in &self.poller.cities {
            if !seen.insert(city.as_str()) {
                result.add_warning(
                    "poller.cities",
                    format!("City listed more than once: {}", city),
                );
            }
        }

        if !self.poller.cities.contains(&self.poller.summary_city) {
            result.add_warning(
                "poller.summary_city",
                format!(
                    "Summary city '{}' is not in the polled city list",
                    self.poller.summary_city
                ),
            );
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            result.add_error(
                "server.bind",
                format!("Invalid listen address: {}", self.server.bind),
            );
        }

        if !self.mail.is_configured() {
            result.add_warning(
                "mail",
                "Mail not configured - alerts will be logged instead of sent",
            );
        } else if self.mail.port == 0 {
            result.add_error("mail.port", "Port cannot be 0");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file, creating parent directories as needed
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherwatch");

        Ok(config_dir.join("config.toml"))
    }
}
