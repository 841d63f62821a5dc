use kube::api::{Api, DynamicObject, ListParams};

use super::discovery::CapabilityEntry;
use super::ClusterClient;
use crate::{Error, Result};

impl ClusterClient {
    /// Get a single object by group, version, kind, name and namespace.
    pub async fn get_resource(
        &self,
        group: &str,
        version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<DynamicObject> {
        let entry = self
            .catalog()
            .resolve(&self.client(), group, version, kind)
            .await?;
        let namespace =
            effective_get_namespace(entry.namespaced, namespace, self.default_namespace());
        let api = self.dynamic_api(&entry, namespace.as_deref());

        match api.get(name).await {
            Ok(obj) => Ok(obj),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::NotFound(format!(
                "{kind} {name} not found{}",
                namespace
                    .map(|ns| format!(" in namespace {ns}"))
                    .unwrap_or_default()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// List objects of a kind. An empty namespace lists across all
    /// namespaces; it is never narrowed to the default namespace. The label
    /// selector is passed through verbatim.
    pub async fn list_resources(
        &self,
        group: &str,
        version: &str,
        kind: &str,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>> {
        let entry = self
            .catalog()
            .resolve(&self.client(), group, version, kind)
            .await?;
        let namespace = if entry.namespaced && !namespace.is_empty() {
            Some(namespace)
        } else {
            None
        };
        let api = self.dynamic_api(&entry, namespace);

        let mut params = ListParams::default();
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }

        let list = api.list(&params).await?;
        Ok(list.items)
    }

    fn dynamic_api(&self, entry: &CapabilityEntry, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client(), ns, &entry.resource),
            None => Api::all_with(self.client(), &entry.resource),
        }
    }
}

/// Namespace used for a `get`: a namespaced kind with no namespace supplied
/// reads from the default namespace; a cluster-scoped kind ignores any
/// supplied namespace.
fn effective_get_namespace(namespaced: bool, requested: &str, default: &str) -> Option<String> {
    if !namespaced {
        return None;
    }
    if requested.is_empty() {
        Some(default.to_string())
    } else {
        Some(requested.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_defaults_namespace_for_namespaced_kinds() {
        assert_eq!(
            effective_get_namespace(true, "", "default"),
            Some("default".to_string())
        );
        assert_eq!(
            effective_get_namespace(true, "kube-system", "default"),
            Some("kube-system".to_string())
        );
    }

    #[test]
    fn get_ignores_namespace_for_cluster_scoped_kinds() {
        assert_eq!(effective_get_namespace(false, "", "default"), None);
        assert_eq!(effective_get_namespace(false, "kube-system", "default"), None);
    }
}
