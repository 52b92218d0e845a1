use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use validator::Validate;

const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;
const DEFAULT_ADMIN_PORT: u16 = 9901;
const DEFAULT_ADMIN_PATH: &str = "/stats";
const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

fn default_max_request_size() -> usize {
    DEFAULT_MAX_REQUEST_SIZE
}

/// The proxy admin endpoint whose stats are rewritten into Prometheus form.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AdminConfig {
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ScrapeConfig {
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Comma-separated application metrics endpoints, each as
    /// `name@address:port/path`. Empty means the admin endpoint only.
    #[serde(default)]
    pub applications: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LogConfig {
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// One application metrics endpoint parsed out of `scrape.applications`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEndpoint {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub admin: AdminConfig,
    #[validate(nested)]
    pub scrape: ScrapeConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

fn parse_port(value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|e| {
        ConfigError::Message(format!(
            "Invalid port value '{}': {}. Port must be a number between 1 and 65535.",
            value, e
        ))
    })
}

fn parse_endpoint(entry: &str) -> Result<ApplicationEndpoint, ConfigError> {
    let invalid = |reason: &str| {
        ConfigError::Message(format!(
            "Invalid application endpoint '{}': {}. Expected name@address:port/path.",
            entry, reason
        ))
    };

    let (name, rest) = entry.split_once('@').ok_or_else(|| invalid("missing '@'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("empty name"));
    }

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/metrics"),
    };

    let (address, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing ':port'"))?;
    if address.is_empty() {
        return Err(invalid("empty address"));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
    if port == 0 {
        return Err(invalid("port must be a number between 1 and 65535"));
    }

    Ok(ApplicationEndpoint {
        name: name.to_string(),
        address: address.to_string(),
        port,
        path: path.to_string(),
    })
}

impl ScrapeConfig {
    pub fn application_endpoints(&self) -> Result<Vec<ApplicationEndpoint>, ConfigError> {
        self.applications
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_endpoint)
            .collect()
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9100)?
            .set_default("server.max_request_size", DEFAULT_MAX_REQUEST_SIZE as i64)?
            .set_default("admin.address", "127.0.0.1")?
            .set_default("admin.port", i64::from(DEFAULT_ADMIN_PORT))?
            .set_default("admin.path", DEFAULT_ADMIN_PATH)?
            .set_default("scrape.timeout_secs", DEFAULT_SCRAPE_TIMEOUT_SECS as i64)?
            .set_default("scrape.applications", "")?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", env::var("APP_SERVER__HOST").ok())?
            .set_override_option(
                "server.port",
                env::var("APP_SERVER__PORT")
                    .ok()
                    .map(|v| parse_port(&v))
                    .transpose()?,
            )?
            .set_override_option(
                "admin.port",
                env::var("APP_ADMIN__PORT")
                    .ok()
                    .map(|v| parse_port(&v))
                    .transpose()?,
            )?
            .build()?;

        let config: AppConfig = s.try_deserialize()?;

        if let Err(e) = config.validate() {
            return Err(ConfigError::Message(format!("Validation error: {}", e)));
        }

        if !config.admin.path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "admin.path must start with '/', got '{}'",
                config.admin.path
            )));
        }

        // Surface malformed application endpoints at startup, not per scrape.
        config.scrape.application_endpoints()?;

        Ok(config)
    }
}
