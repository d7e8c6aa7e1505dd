//! File configuration for the `burrow` binary.
//!
//! The library is configured programmatically through
//! [`Config`](crate::server::Config); this module covers the optional TOML
//! file the binary accepts for the settings that make sense at rest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

/// Contents of the `--config` TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Listen address, e.g. `"0.0.0.0:1080"`. Overridden by `--listen`
    /// and the `PROXY_PORT` environment variable.
    #[serde(default)]
    pub listen: Option<String>,

    /// Username to password table. Non-empty enables user/pass
    /// authentication.
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// Outbound connect timeout in seconds. Unlimited when absent.
    #[serde(default)]
    pub connect_timeout: Option<u64>,

    /// Address BIND listeners are created on.
    #[serde(default)]
    pub bind_ip: Option<IpAddr>,
}

/// Load configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config file: {:?}", path.as_ref()))?;
    parse_config(&content)
}

/// Parse configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).context("failed to parse configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_valid() {
        let config = parse_config("").unwrap();
        assert!(config.listen.is_none());
        assert!(config.users.is_empty());
        assert!(config.connect_timeout.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = parse_config(
            r#"
listen = "127.0.0.1:1080"
connect_timeout = 15
bind_ip = "10.0.0.5"

[users]
alice = "wonderland"
bob = "builder"
"#,
        )
        .unwrap();

        assert_eq!(config.listen.as_deref(), Some("127.0.0.1:1080"));
        assert_eq!(config.connect_timeout, Some(15));
        assert_eq!(config.bind_ip, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users["alice"], "wonderland");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(parse_config("listen = [").is_err());
    }
}
