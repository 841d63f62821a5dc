//! Rendering of fetched documents into the views tools return: raw JSON or
//! YAML marshals, or a compact/detailed projection with a kubectl-style age.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use kube::ResourceExt;
use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Requested rendering of a document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Name, namespace and age.
    #[default]
    Compact,
    /// Compact plus labels and annotations verbatim.
    Wide,
    /// Full document marshalled as JSON.
    Json,
    /// Full document marshalled as YAML.
    Yaml,
}

/// Wire shape of a rendered document. Projections fill the named fields;
/// raw renderings fill `data`. Computed on demand, never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RenderedResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

pub fn render(obj: &DynamicObject, output: OutputType) -> Result<RenderedResource> {
    match output {
        OutputType::Json => Ok(RenderedResource {
            data: Some(serde_json::to_string(obj)?),
            ..Default::default()
        }),
        OutputType::Yaml => Ok(RenderedResource {
            data: Some(serde_yaml::to_string(obj)?),
            ..Default::default()
        }),
        OutputType::Compact => Ok(project(obj, false)),
        OutputType::Wide => Ok(project(obj, true)),
    }
}

fn project(obj: &DynamicObject, detailed: bool) -> RenderedResource {
    let mut rendered = RenderedResource {
        name: Some(obj.name_any()),
        namespace: obj.namespace(),
        age: obj
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| format_age(age_since(t))),
        ..Default::default()
    };

    if detailed {
        rendered.labels = Some(obj.labels().clone());
        rendered.annotations = Some(obj.annotations().clone());
    }

    rendered
}

fn age_since(created: &Time) -> Duration {
    // A clock-skewed future timestamp renders as zero age.
    Utc::now()
        .signed_duration_since(created.0)
        .to_std()
        .unwrap_or_default()
}

/// Human-readable age bucketed into the two largest applicable units, each
/// component truncated to integer units.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d{}h", secs / 86400, (secs % 86400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_object() -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "ovnkube-node-7xk2f",
                "namespace": "ovn-kubernetes",
                "creationTimestamp": "2020-01-01T00:00:00Z",
                "labels": { "app": "ovnkube-node" },
                "annotations": { "k8s.ovn.org/node-mgmt-port": "ovn-k8s-mp0" }
            },
            "spec": { "nodeName": "worker-0" }
        }))
        .unwrap()
    }

    #[test]
    fn format_age_buckets() {
        let cases = [
            (1, "1s"),
            (59, "59s"),
            (60, "1m0s"),
            (64, "1m4s"),
            (3599, "59m59s"),
            (3600, "1h0m"),
            (86399, "23h59m"),
            (86400, "1d0h"),
            (230400, "2d16h"),
        ];
        for (secs, expected) in cases {
            assert_eq!(format_age(Duration::from_secs(secs)), expected);
        }
    }

    #[test]
    fn compact_projection_omits_labels_and_annotations() {
        let rendered = render(&sample_object(), OutputType::Compact).unwrap();
        assert_eq!(rendered.name.as_deref(), Some("ovnkube-node-7xk2f"));
        assert_eq!(rendered.namespace.as_deref(), Some("ovn-kubernetes"));
        assert!(rendered.age.is_some());
        assert!(rendered.labels.is_none());
        assert!(rendered.annotations.is_none());
        assert!(rendered.data.is_none());
    }

    #[test]
    fn wide_projection_carries_labels_and_annotations_verbatim() {
        let rendered = render(&sample_object(), OutputType::Wide).unwrap();
        assert_eq!(
            rendered.labels.as_ref().unwrap().get("app").map(String::as_str),
            Some("ovnkube-node")
        );
        assert_eq!(
            rendered
                .annotations
                .as_ref()
                .unwrap()
                .get("k8s.ovn.org/node-mgmt-port")
                .map(String::as_str),
            Some("ovn-k8s-mp0")
        );
    }

    #[test]
    fn raw_json_round_trips_visible_fields() {
        let obj = sample_object();
        let rendered = render(&obj, OutputType::Json).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(rendered.data.as_deref().unwrap()).unwrap();

        assert_eq!(parsed["metadata"]["name"], "ovnkube-node-7xk2f");
        assert_eq!(parsed["metadata"]["namespace"], "ovn-kubernetes");
        assert_eq!(parsed["spec"]["nodeName"], "worker-0");
        assert_eq!(parsed["metadata"]["labels"]["app"], "ovnkube-node");
    }

    #[test]
    fn raw_yaml_marshals_the_full_document() {
        let rendered = render(&sample_object(), OutputType::Yaml).unwrap();
        let data = rendered.data.unwrap();
        assert!(data.contains("ovnkube-node-7xk2f"));
        assert!(data.contains("nodeName: worker-0"));
    }
}
