//! Configuration data model and validation

use crate::models::environment::{EnvironmentMatrix, ProxyConfig};
use crate::types::{AppError, ProxyScheme, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the test server (`/ws`, `/sse` and `/test` hang off it)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Where the JSON result snapshot is written
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// HTTP proxy address (`host:port`) for the `http-proxy` environment
    #[serde(default = "default_http_proxy")]
    pub http_proxy: String,

    /// HTTPS proxy address (`host:port`) for the `https-proxy` environment
    #[serde(default = "default_https_proxy")]
    pub https_proxy: String,

    /// Environments to run; empty means the whole matrix
    #[serde(default)]
    pub environments: Vec<String>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Emit log entries as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            output_path: default_output_path(),
            http_proxy: default_http_proxy(),
            https_proxy: default_https_proxy(),
            environments: Vec::new(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            json_logs: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(AppError::config("Server URL cannot be empty"));
        }

        match url::Url::parse(&self.server_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "Server URL must use http:// or https://: {}",
                        self.server_url
                    )));
                }
                if parsed.host_str().is_none() {
                    return Err(AppError::config(format!("Server URL has no host: {}", self.server_url)));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid server URL '{}': {}", self.server_url, e)));
            }
        }

        if self.output_path.trim().is_empty() {
            return Err(AppError::config("Output path cannot be empty"));
        }

        ProxyConfig::parse(ProxyScheme::Http, &self.http_proxy)
            .map_err(|e| AppError::config(format!("Invalid HTTP proxy: {}", e)))?;
        ProxyConfig::parse(ProxyScheme::Https, &self.https_proxy)
            .map_err(|e| AppError::config(format!("Invalid HTTPS proxy: {}", e)))?;

        // Unknown names surface as configuration errors
        self.environment_matrix()?;

        Ok(())
    }

    /// Server URL without a trailing slash, ready for path concatenation
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_path)
    }

    /// Build the environment matrix described by this configuration
    pub fn environment_matrix(&self) -> Result<EnvironmentMatrix> {
        let http_proxy = ProxyConfig::parse(ProxyScheme::Http, &self.http_proxy)?;
        let https_proxy = ProxyConfig::parse(ProxyScheme::Https, &self.https_proxy)?;
        EnvironmentMatrix::with_proxies(http_proxy, https_proxy).filtered(&self.environments)
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server_url) = std::env::var("TCT_SERVER_URL") {
            self.server_url = server_url.trim().to_string();
        }

        if let Ok(output) = std::env::var("TCT_OUTPUT") {
            self.output_path = output.trim().to_string();
        }

        if let Ok(http_proxy) = std::env::var("TCT_HTTP_PROXY") {
            self.http_proxy = http_proxy.trim().to_string();
        }

        if let Ok(https_proxy) = std::env::var("TCT_HTTPS_PROXY") {
            self.https_proxy = https_proxy.trim().to_string();
        }

        if let Ok(environments) = std::env::var("TCT_ENVIRONMENTS") {
            self.environments = environments
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_server_url() -> String {
    crate::defaults::DEFAULT_SERVER_URL.to_string()
}

fn default_output_path() -> String {
    crate::defaults::DEFAULT_OUTPUT_FILE.to_string()
}

fn default_http_proxy() -> String {
    crate::defaults::DEFAULT_HTTP_PROXY.to_string()
}

fn default_https_proxy() -> String {
    crate::defaults::DEFAULT_HTTPS_PROXY.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
