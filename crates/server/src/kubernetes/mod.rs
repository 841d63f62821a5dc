pub mod debug;
pub mod discovery;
pub mod pods;
pub mod resources;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as RestConfig};

use crate::config::Config;
use crate::{Error, Result};
use discovery::CapabilityCatalog;

/// Shared handle to the cluster: the API client, the discovery catalog and
/// the namespace substituted when a caller omits one.
pub struct ClusterClient {
    client: Client,
    catalog: CapabilityCatalog,
    default_namespace: String,
}

impl ClusterClient {
    pub async fn new(config: &Config) -> Result<Self> {
        let client = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::Config(format!("failed to read kubeconfig {path}: {e}"))
                })?;
                let rest =
                    RestConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| {
                            Error::Config(format!("failed to load kubeconfig {path}: {e}"))
                        })?;
                Client::try_from(rest)?
            }
            None => Client::try_default().await?,
        };

        Ok(Self {
            client,
            catalog: CapabilityCatalog::new(),
            default_namespace: config.namespace.clone(),
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Namespace for operations addressing one concrete pod: an omitted
    /// namespace falls back to the configured default.
    pub(crate) fn namespace_or_default(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            self.default_namespace.clone()
        } else {
            namespace.to_string()
        }
    }
}
