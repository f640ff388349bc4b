//! Environment matrix: the named network conditions every probe runs under

use crate::types::{AppError, ProxyScheme, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Forward proxy a probe is routed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new<S: Into<String>>(scheme: ProxyScheme, host: S, port: u16) -> Self {
        Self { scheme, host: host.into(), port }
    }

    /// Parse a `host:port` address for the given scheme
    pub fn parse(scheme: ProxyScheme, address: &str) -> Result<Self> {
        let address = address.trim();
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| AppError::validation(format!("Proxy address '{}' must be host:port", address)))?;

        if host.is_empty() {
            return Err(AppError::validation(format!("Proxy address '{}' has an empty host", address)));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| AppError::validation(format!("Proxy address '{}' has an invalid port", address)))?;
        if port == 0 {
            return Err(AppError::validation(format!("Proxy address '{}' has port 0", address)));
        }

        Ok(Self::new(scheme, host, port))
    }

    /// Proxy URL as understood by HTTP clients, e.g. `http://localhost:8080`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// `host:port` authority used to open the tunnel
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// One named network condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Unique key, used in the result mapping
    pub name: String,
    /// Human label shown in reports
    pub description: String,
    /// Proxy to route through, if any
    pub proxy: Option<ProxyConfig>,
    /// Connection timeout in milliseconds
    pub timeout_ms: u64,
    /// Simulated added latency; informational only, probes do not enforce it
    pub delay_ms: Option<u64>,
}

impl EnvironmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_proxied(&self) -> bool {
        self.proxy.is_some()
    }
}

/// Ordered catalog of environments
#[derive(Debug, Clone)]
pub struct EnvironmentMatrix {
    configurations: Vec<EnvironmentConfig>,
}

impl EnvironmentMatrix {
    /// The standard four-environment matrix with default proxy endpoints
    pub fn standard() -> Self {
        let http_proxy = ProxyConfig::new(ProxyScheme::Http, "localhost", 8080);
        let https_proxy = ProxyConfig::new(ProxyScheme::Https, "localhost", 8443);
        Self::with_proxies(http_proxy, https_proxy)
    }

    /// The standard matrix with caller-supplied proxy endpoints
    pub fn with_proxies(http_proxy: ProxyConfig, https_proxy: ProxyConfig) -> Self {
        let configurations = vec![
            EnvironmentConfig {
                name: "direct".to_string(),
                description: "Direct connection".to_string(),
                proxy: None,
                timeout_ms: 5000,
                delay_ms: None,
            },
            EnvironmentConfig {
                name: "http-proxy".to_string(),
                description: "HTTP proxy".to_string(),
                proxy: Some(http_proxy),
                timeout_ms: 10000,
                delay_ms: None,
            },
            EnvironmentConfig {
                name: "https-proxy".to_string(),
                description: "HTTPS proxy".to_string(),
                proxy: Some(https_proxy),
                timeout_ms: 10000,
                delay_ms: None,
            },
            EnvironmentConfig {
                name: "slow-network".to_string(),
                description: "Slow network".to_string(),
                proxy: None,
                timeout_ms: 30000,
                delay_ms: Some(2000),
            },
        ];

        Self { configurations }
    }

    /// Build a matrix from an explicit list, e.g. for tests
    pub fn from_configurations(configurations: Vec<EnvironmentConfig>) -> Self {
        Self { configurations }
    }

    /// Keep only the named environments, preserving matrix order
    pub fn filtered(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        for name in names {
            if !self.contains(name) {
                return Err(AppError::config(format!(
                    "Unknown environment '{}' (known: {})",
                    name,
                    self.names().join(", ")
                )));
            }
        }

        let configurations = self
            .configurations
            .into_iter()
            .filter(|c| names.iter().any(|n| n == &c.name))
            .collect();

        Ok(Self { configurations })
    }

    pub fn configurations(&self) -> &[EnvironmentConfig] {
        &self.configurations
    }

    pub fn names(&self) -> Vec<&str> {
        self.configurations.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configurations.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

impl Default for EnvironmentMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

/// The standard environment list
pub fn list_configurations() -> Vec<EnvironmentConfig> {
    EnvironmentMatrix::standard().configurations
}
