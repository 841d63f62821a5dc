use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Transport the MCP service is exposed on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(Error::Config(format!(
                "invalid transport {other}: expected stdio or http"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transport: Transport,
    pub addr: String,
    pub kubeconfig: Option<String>,
    pub namespace: String,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            transport: std::env::var("MCP_TRANSPORT")
                .unwrap_or_else(|_| "stdio".to_string())
                .parse()?,
            addr: std::env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            kubeconfig: std::env::var("KUBECONFIG").ok().filter(|p| !p.is_empty()),
            namespace: std::env::var("KUBE_NAMESPACE").unwrap_or_else(|_| "default".to_string()),
        };

        if config.namespace.is_empty() {
            return Err(Error::Config(
                "KUBE_NAMESPACE must not be empty".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            addr: "127.0.0.1:8080".to_string(),
            kubeconfig: None,
            namespace: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_parses_known_values() {
        assert_eq!("stdio".parse::<Transport>().unwrap(), Transport::Stdio);
        assert_eq!("http".parse::<Transport>().unwrap(), Transport::Http);
        assert_eq!("HTTP".parse::<Transport>().unwrap(), Transport::Http);
    }

    #[test]
    fn transport_rejects_unknown_values() {
        let err = "websocket".parse::<Transport>().unwrap_err();
        assert!(err.to_string().contains("invalid transport"));
    }
}
