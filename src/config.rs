// Configuration File Support
//
// This module provides configuration file parsing for the WeFeed webhook service.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the platform config directory, e.g.
// ~/.config/wefeed/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::otp::OtpConfig;
use crate::webhooks::DispatcherConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Webhook delivery configuration
    pub delivery: DispatcherConfig,

    /// One-time code configuration
    pub otp: OtpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    /// If the config file does not exist, returns default configuration
    /// with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/wefeed/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "wefeed", "WeFeed") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("wefeed").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - WEFEED_HOST
    /// - WEFEED_PORT
    /// - WEFEED_LOG_LEVEL
    /// - WEFEED_LOG_FORMAT
    /// - WEFEED_DELIVERY_TIMEOUT_SECS
    /// - WEFEED_DELIVERY_CONCURRENCY
    /// - WEFEED_DELIVERY_MAX_RETRIES
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("WEFEED_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("WEFEED_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(level) = std::env::var("WEFEED_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WEFEED_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(timeout) = std::env::var("WEFEED_DELIVERY_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.delivery.timeout_secs = timeout;
                }
            }
        }
        if let Ok(concurrency) = std::env::var("WEFEED_DELIVERY_CONCURRENCY") {
            if let Ok(concurrency) = concurrency.parse::<usize>() {
                if concurrency > 0 && concurrency <= 64 {
                    self.delivery.concurrency = concurrency;
                }
            }
        }
        if let Ok(retries) = std::env::var("WEFEED_DELIVERY_MAX_RETRIES") {
            if let Ok(retries) = retries.parse::<u32>() {
                self.delivery.retry.max_retries = retries;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host must not be empty");
        }

        if self.delivery.timeout_secs == 0 {
            anyhow::bail!("Delivery timeout must be > 0 seconds");
        }
        if self.delivery.concurrency == 0 || self.delivery.concurrency > 64 {
            anyhow::bail!("Delivery concurrency must be between 1 and 64");
        }
        if self.delivery.retry.max_retries > 10 {
            anyhow::bail!("Delivery max_retries must be <= 10");
        }

        if self.otp.code_ttl_secs == 0 || self.otp.reset_token_ttl_secs == 0 {
            anyhow::bail!("OTP lifetimes must be > 0 seconds");
        }

        Ok(())
    }
}
