pub mod config;
pub mod kubernetes;
pub mod output;
pub mod sanitize;
pub mod server;
pub mod tools;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("workload not ready: {0}")]
    NotReady(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
