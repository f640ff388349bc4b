//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    ///
    /// Layers, lowest to highest priority: defaults, `.env`, process
    /// environment, command line.
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.cli.server_url {
            config.server_url = url.trim().to_string();
        }

        if let Some(output) = &self.cli.output {
            config.output_path = output.clone();
        }

        if let Some(proxy) = &self.cli.http_proxy {
            config.http_proxy = proxy.clone();
        }

        if let Some(proxy) = &self.cli.https_proxy {
            config.https_proxy = proxy.clone();
        }

        if !self.cli.environments.is_empty() {
            config.environments = self.cli.environments.clone();
        }

        if self.cli.color || self.cli.no_color {
            config.enable_color = self.cli.use_colors();
        } else {
            config.enable_color = config.enable_color && self.cli.use_colors();
        }

        // CLI-only switches
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;
        config.json_logs = self.cli.json_logs;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let environments = if config.environments.is_empty() {
        "all".to_string()
    } else {
        config.environments.join(", ")
    };

    [
        format!("Server URL: {}", config.server_url),
        format!("Output file: {}", config.output_path),
        format!("HTTP proxy: {}", config.http_proxy),
        format!("HTTPS proxy: {}", config.https_proxy),
        format!("Environments: {}", environments),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
        format!("JSON logs: {}", config.json_logs),
    ]
    .join("\n")
}
