//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::ProxyConfig;
use crate::types::ProxyScheme;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                println!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            println!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "TCT_SERVER_URL" => {
                url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid TCT_SERVER_URL value '{}': {}", value, e)))?;
            }
            "TCT_OUTPUT" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("TCT_OUTPUT cannot be empty"));
                }
            }
            "TCT_HTTP_PROXY" => {
                ProxyConfig::parse(ProxyScheme::Http, value.trim())
                    .map_err(|e| AppError::config(format!("Invalid TCT_HTTP_PROXY value '{}': {}", value, e)))?;
            }
            "TCT_HTTPS_PROXY" => {
                ProxyConfig::parse(ProxyScheme::Https, value.trim())
                    .map_err(|e| AppError::config(format!("Invalid TCT_HTTPS_PROXY value '{}': {}", value, e)))?;
            }
            "TCT_ENVIRONMENTS" => {
                let known = crate::models::EnvironmentMatrix::standard();
                for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    if !known.contains(name) {
                        return Err(AppError::config(format!("Unknown environment '{}' in TCT_ENVIRONMENTS", name)));
                    }
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TCT_SERVER_URL", "Base URL of the test server", "http://localhost:3000"),
            ("TCT_OUTPUT", "Path of the JSON results file", "websocket-sse-test-results.json"),
            ("TCT_HTTP_PROXY", "HTTP proxy address (host:port)", "localhost:8080"),
            ("TCT_HTTPS_PROXY", "HTTPS proxy address (host:port)", "localhost:8443"),
            ("TCT_ENVIRONMENTS", "Comma-separated environments to run", "direct,slow-network"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// `Environment variables:` block appended to `--help`
    pub fn env_vars_help() -> String {
        let vars = Self::get_supported_env_vars();
        let width = vars.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);

        let mut help = String::from("Environment variables (also read from .env):\n");
        for (name, description, example) in vars {
            help.push_str(&format!("  {:<width$}  {} (e.g. {})\n", name, description, example, width = width));
        }
        help
    }

    /// Validate the entries of an env file, one warning per bad line
    pub fn check_env_file_at(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }

    /// Check if .env file exists and validate its contents
    pub fn check_env_file() -> Result<Option<Vec<String>>> {
        Self::check_env_file_at(Path::new(".env"))
    }
}
