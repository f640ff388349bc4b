//! Command-line interface module

use crate::config::EnvManager;
use crate::models::ProxyConfig;
use crate::types::ProxyScheme;
use clap::{ArgAction, Parser};

/// Transport Compatibility Tester - WebSocket and SSE behaviour across proxies and slow networks
#[derive(Parser, Debug, Clone)]
#[command(name = "tct")]
#[command(version, about, long_about = None, after_help = EnvManager::env_vars_help())]
pub struct Cli {
    /// Base URL of the test server (serves /ws, /sse and /test)
    #[arg(value_name = "SERVER_URL")]
    pub server_url: Option<String>,

    /// Where to write the JSON results
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Run only the named environment (can be used multiple times)
    #[arg(long = "env", value_name = "NAME", action = ArgAction::Append)]
    pub environments: Vec<String>,

    /// HTTP proxy address used by the http-proxy environment
    #[arg(long, value_name = "HOST:PORT", value_parser = parse_proxy_address)]
    pub http_proxy: Option<String>,

    /// HTTPS proxy address used by the https-proxy environment
    #[arg(long, value_name = "HOST:PORT", value_parser = parse_proxy_address)]
    pub https_proxy: Option<String>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Emit log entries as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(output) = &self.output {
            if output.trim().is_empty() {
                return Err("--output cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Configuration Summary:\n");
        if let Some(url) = &self.server_url {
            summary.push_str(&format!("  Server URL: {}\n", url));
        }
        if let Some(output) = &self.output {
            summary.push_str(&format!("  Output file: {}\n", output));
        }
        if !self.environments.is_empty() {
            summary.push_str(&format!("  Environments: {}\n", self.environments.join(", ")));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

/// Parse a proxy address of the form `host:port`
fn parse_proxy_address(s: &str) -> Result<String, String> {
    ProxyConfig::parse(ProxyScheme::Http, s)
        .map(|proxy| proxy.authority())
        .map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    // On Windows, check for ANSICON or ConEmu
    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
