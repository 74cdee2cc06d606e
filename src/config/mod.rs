//! Configuration management
//!
//! This module handles loading and parsing configuration for the Zinnia weblog.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{DEFAULT_SITE_ID, DEFAULT_URL_PREFIX};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Permission handler selection
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Weblog behaviour
    #[serde(default)]
    pub weblog: WeblogConfig,
    /// Template overrides
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/zinnia.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Permission handler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Dotted path of the handler, e.g. `zinnia.permissions.StaffPermissionHandler`.
    /// Unset or empty selects the default policy.
    #[serde(default)]
    pub handler: Option<String>,
}

/// Weblog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeblogConfig {
    /// Current site; new entries are attached to it by default
    #[serde(default = "default_site_id")]
    pub site_id: i64,
    /// Prefix the HTML views are mounted under
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// How entry content is rendered
    #[serde(default)]
    pub markup_language: MarkupLanguage,
}

impl Default for WeblogConfig {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            url_prefix: default_url_prefix(),
            markup_language: MarkupLanguage::default(),
        }
    }
}

fn default_site_id() -> i64 {
    DEFAULT_SITE_ID
}

fn default_url_prefix() -> String {
    DEFAULT_URL_PREFIX.to_string()
}

/// Markup language of entry content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkupLanguage {
    /// Raw HTML, blank lines become paragraphs (default)
    #[default]
    Html,
    /// CommonMark
    Markdown,
}

/// Template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory whose `*.html` files override the built-in templates
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl WeblogConfig {
    /// URL prefix without a trailing slash ("" when mounted at the root)
    pub fn prefix(&self) -> &str {
        self.url_prefix.trim_end_matches('/')
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - ZINNIA_SERVER_HOST
    /// - ZINNIA_SERVER_PORT
    /// - ZINNIA_DATABASE_DRIVER
    /// - ZINNIA_DATABASE_URL
    /// - ZINNIA_PERMISSION_HANDLER
    /// - ZINNIA_SITE_ID
    /// - ZINNIA_MARKUP_LANGUAGE
    /// - ZINNIA_TEMPLATES_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.weblog.site_id <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "weblog.site_id must be positive, got {}",
                self.weblog.site_id
            )));
        }
        let prefix = &self.weblog.url_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "weblog.url_prefix must start with '/', got '{}'",
                prefix
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("ZINNIA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ZINNIA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("ZINNIA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("ZINNIA_DATABASE_URL") {
            self.database.url = url;
        }

        // Permissions
        if let Ok(handler) = std::env::var("ZINNIA_PERMISSION_HANDLER") {
            self.permissions.handler = Some(handler);
        }

        // Weblog
        if let Ok(site_id) = std::env::var("ZINNIA_SITE_ID") {
            if let Ok(site_id) = site_id.parse::<i64>() {
                self.weblog.site_id = site_id;
            }
        }
        if let Ok(markup) = std::env::var("ZINNIA_MARKUP_LANGUAGE") {
            match markup.to_lowercase().as_str() {
                "html" => self.weblog.markup_language = MarkupLanguage::Html,
                "markdown" => self.weblog.markup_language = MarkupLanguage::Markdown,
                _ => {}
            }
        }

        // Templates
        if let Ok(path) = std::env::var("ZINNIA_TEMPLATES_PATH") {
            self.templates.path = if path.is_empty() { None } else { Some(PathBuf::from(path)) };
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches ZINNIA_* environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
