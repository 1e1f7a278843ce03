use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use super::error::ConfigError;

/// Configuration for the protected server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the protected HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// IAM user and role ARNs allowed past authentication
    #[serde(default)]
    pub allowed_arns: Vec<String>,

    /// Domain used to build `https://sts.<region>.<domain>`
    #[serde(default = "default_sts_domain")]
    pub sts_domain: String,
}

/// Configuration for the signing client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Region to sign for; falls back to the AWS default region chain
    pub region: Option<String>,

    /// Named AWS profile for the source credentials
    pub profile: Option<String>,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_yaml(path.as_ref())
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_yaml(path.as_ref())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            allowed_arns: Vec::new(),
            sts_domain: default_sts_domain(),
        }
    }
}

fn load_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
        path: display,
        source,
    })
}

// Default value functions
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_sts_domain() -> String {
    "amazonaws.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.sts_domain, "amazonaws.com");
        assert!(config.allowed_arns.is_empty());
    }

    #[test]
    fn test_server_config_from_yaml() {
        let yaml = r#"
listen_addr: "127.0.0.1:9000"
allowed_arns:
  - arn:aws:iam::1234567890:user/username
  - arn:aws:iam::1234567890:role/deployer
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.allowed_arns.len(), 2);
        assert_eq!(config.allowed_arns[1], "arn:aws:iam::1234567890:role/deployer");
    }

    #[test]
    fn test_client_config_from_yaml() {
        let config: ClientConfig =
            serde_yaml::from_str("region: eu-west-1\nprofile: dev\n").unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.profile.as_deref(), Some("dev"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load("/nonexistent/sts-auth.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
