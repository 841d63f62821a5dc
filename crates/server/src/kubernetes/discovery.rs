use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// One kind the cluster can serve, as reported by discovery: the addressable
/// plural collection plus whether the kind is namespace-scoped.
#[derive(Debug, Clone)]
pub struct CapabilityEntry {
    pub resource: ApiResource,
    pub namespaced: bool,
}

/// Runtime catalog of the cluster's (group, version, kind) triples.
///
/// Discovery responses are cached per (group, version) for the life of the
/// process and never invalidated; a kind created after startup is only
/// visible to a fresh process. Concurrent writers racing to populate the
/// same entry compute identical values, so last-write-wins is harmless.
#[derive(Default)]
pub struct CapabilityCatalog {
    cache: RwLock<HashMap<(String, String), Arc<Vec<CapabilityEntry>>>>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a kind to its collection endpoint and scope. Kind matching is
    /// exact and case-sensitive.
    pub async fn resolve(
        &self,
        client: &Client,
        group: &str,
        version: &str,
        kind: &str,
    ) -> Result<CapabilityEntry> {
        let entries = self.entries_for(client, group, version).await?;
        entries
            .iter()
            .find(|e| e.resource.kind == kind)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "kind {kind} not found in {}",
                    group_version(group, version)
                ))
            })
    }

    async fn entries_for(
        &self,
        client: &Client,
        group: &str,
        version: &str,
    ) -> Result<Arc<Vec<CapabilityEntry>>> {
        let key = (group.to_string(), version.to_string());
        if let Some(entries) = self.cache.read().await.get(&key) {
            return Ok(entries.clone());
        }

        let list = fetch_resource_list(client, group, version).await?;
        let entries = Arc::new(entries_from_list(group, version, &list));
        self.cache.write().await.insert(key, entries.clone());
        Ok(entries)
    }
}

async fn fetch_resource_list(
    client: &Client,
    group: &str,
    version: &str,
) -> Result<APIResourceList> {
    let result = if group.is_empty() {
        client.list_core_api_resources(version).await
    } else {
        client
            .list_api_group_resources(&format!("{group}/{version}"))
            .await
    };

    result.map_err(|e| {
        Error::DiscoveryUnavailable(format!(
            "failed to fetch server resources for {}: {e}",
            group_version(group, version)
        ))
    })
}

/// Subresource entries (names containing `/`) are not addressable
/// collections and are skipped.
fn entries_from_list(group: &str, version: &str, list: &APIResourceList) -> Vec<CapabilityEntry> {
    list.resources
        .iter()
        .filter(|r| !r.name.contains('/'))
        .map(|r| {
            let gvk = GroupVersionKind::gvk(group, version, &r.kind);
            CapabilityEntry {
                resource: ApiResource::from_gvk_with_plural(&gvk, &r.name),
                namespaced: r.namespaced,
            }
        })
        .collect()
}

fn group_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{group}/{version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;

    fn resource(name: &str, kind: &str, namespaced: bool) -> APIResource {
        APIResource {
            name: name.to_string(),
            kind: kind.to_string(),
            namespaced,
            singular_name: String::new(),
            verbs: vec!["get".to_string(), "list".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn scan_matches_kind_exactly() {
        let list = APIResourceList {
            group_version: "v1".to_string(),
            resources: vec![
                resource("pods", "Pod", true),
                resource("nodes", "Node", false),
            ],
        };

        let entries = entries_from_list("", "v1", &list);
        let pod = entries.iter().find(|e| e.resource.kind == "Pod").unwrap();
        assert_eq!(pod.resource.plural, "pods");
        assert!(pod.namespaced);

        let node = entries.iter().find(|e| e.resource.kind == "Node").unwrap();
        assert!(!node.namespaced);

        // Matching is case-sensitive.
        assert!(!entries.iter().any(|e| e.resource.kind == "pod"));
    }

    #[test]
    fn scan_skips_subresources() {
        let list = APIResourceList {
            group_version: "v1".to_string(),
            resources: vec![
                resource("pods", "Pod", true),
                resource("pods/log", "Pod", true),
                resource("pods/exec", "PodExecOptions", true),
            ],
        };

        let entries = entries_from_list("", "v1", &list);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource.plural, "pods");
    }

    #[test]
    fn group_version_formats_core_and_named_groups() {
        assert_eq!(group_version("", "v1"), "v1");
        assert_eq!(group_version("apps", "v1"), "apps/v1");
    }
}
