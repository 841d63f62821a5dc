//! Cluster-introspection tools: generic get/list over arbitrary API kinds,
//! pod logs, in-pod command execution and node debugging.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::{schemars, tool, tool_router, Json};
use serde::{Deserialize, Serialize};

use super::{require_fields, DebugToolServer};
use crate::kubernetes::pods::StderrPolicy;
use crate::output::{render, OutputType, RenderedResource};
use crate::Error;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetResourceRequest {
    /// API group of the kind; empty for the core group.
    #[serde(default)]
    pub group: String,
    /// API version of the kind, e.g. "v1".
    #[serde(default)]
    pub version: String,
    /// Kind name, case-sensitive, e.g. "Pod".
    #[serde(default)]
    pub kind: String,
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Namespace; empty selects the default namespace for namespaced kinds
    /// and is ignored for cluster-scoped kinds.
    #[serde(default)]
    pub namespace: String,
    /// Rendering of the result: compact (default), wide, json or yaml.
    #[serde(default)]
    pub output_type: Option<OutputType>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct GetResourceResponse {
    pub resource: RenderedResource,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListResourcesRequest {
    /// API group of the kind; empty for the core group.
    #[serde(default)]
    pub group: String,
    /// API version of the kind, e.g. "v1".
    #[serde(default)]
    pub version: String,
    /// Kind name, case-sensitive, e.g. "Pod".
    #[serde(default)]
    pub kind: String,
    /// Namespace to list in; empty lists across all namespaces.
    #[serde(default)]
    pub namespace: String,
    /// Label selector passed through verbatim, e.g. "app=ovnkube-node".
    #[serde(default)]
    pub label_selector: String,
    /// Rendering of each result: compact (default), wide, json or yaml.
    #[serde(default)]
    pub output_type: Option<OutputType>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ListResourcesResponse {
    pub resources: Vec<RenderedResource>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PodLogsRequest {
    /// Pod name.
    #[serde(default)]
    pub name: String,
    /// Namespace; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Container to read from; defaults to the pod's only/first container.
    #[serde(default)]
    pub container: Option<String>,
    /// Read the previous instance's logs instead of the current one.
    #[serde(default)]
    pub previous: bool,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct PodLogsResponse {
    pub logs: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExecInPodRequest {
    /// Pod name.
    #[serde(default)]
    pub name: String,
    /// Namespace; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Container to exec in; defaults to the first container in the pod spec.
    #[serde(default)]
    pub container: Option<String>,
    /// Command argument vector, e.g. ["ip", "route", "show"].
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ExecResponse {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DebugNodeRequest {
    /// Node to attach the debug pod to.
    #[serde(default)]
    pub name: String,
    /// Image for the debug container; must carry the tools the command needs.
    #[serde(default)]
    pub image: String,
    /// Command argument vector to run on the node.
    #[serde(default)]
    pub command: Vec<String>,
}

#[tool_router(router = kubernetes_tool_router, vis = "pub")]
impl DebugToolServer {
    #[tool(
        name = "get-resource",
        description = "Get a single cluster object by group, version, kind, name and namespace. \
                       Works for any kind the cluster serves, including CRDs. Example: \
                       {\"version\": \"v1\", \"kind\": \"Pod\", \"name\": \"my-pod\", \"namespace\": \"default\", \"output_type\": \"yaml\"}"
    )]
    pub async fn get_resource(
        &self,
        Parameters(req): Parameters<GetResourceRequest>,
    ) -> Result<Json<GetResourceResponse>, String> {
        tracing::info!(tool = "get-resource", kind = %req.kind, name = %req.name, "start");
        require_fields(&[
            ("version", &req.version),
            ("kind", &req.kind),
            ("name", &req.name),
        ])
        .map_err(fail("get-resource"))?;

        let obj = self
            .cluster
            .get_resource(&req.group, &req.version, &req.kind, &req.name, &req.namespace)
            .await
            .map_err(fail("get-resource"))?;
        let resource =
            render(&obj, req.output_type.unwrap_or_default()).map_err(fail("get-resource"))?;

        Ok(Json(GetResourceResponse { resource }))
    }

    #[tool(
        name = "list-resources",
        description = "List cluster objects of a kind, optionally narrowed to a namespace and a \
                       label selector. An empty namespace lists across all namespaces. Example: \
                       {\"version\": \"v1\", \"kind\": \"Pod\", \"namespace\": \"default\", \"label_selector\": \"app=ovs-node\"}"
    )]
    pub async fn list_resources(
        &self,
        Parameters(req): Parameters<ListResourcesRequest>,
    ) -> Result<Json<ListResourcesResponse>, String> {
        tracing::info!(tool = "list-resources", kind = %req.kind, namespace = %req.namespace, "start");
        require_fields(&[("version", &req.version), ("kind", &req.kind)])
            .map_err(fail("list-resources"))?;

        let objs = self
            .cluster
            .list_resources(
                &req.group,
                &req.version,
                &req.kind,
                &req.namespace,
                &req.label_selector,
            )
            .await
            .map_err(fail("list-resources"))?;

        let output = req.output_type.unwrap_or_default();
        let resources = objs
            .iter()
            .map(|obj| render(obj, output))
            .collect::<crate::Result<Vec<_>>>()
            .map_err(fail("list-resources"))?;

        Ok(Json(ListResourcesResponse { resources }))
    }

    #[tool(
        name = "get-pod-logs",
        description = "Get the logs of a pod, one line per element, with timestamps. Example: \
                       {\"name\": \"my-pod\", \"namespace\": \"default\", \"container\": \"my-container\", \"previous\": true}"
    )]
    pub async fn get_pod_logs(
        &self,
        Parameters(req): Parameters<PodLogsRequest>,
    ) -> Result<Json<PodLogsResponse>, String> {
        tracing::info!(tool = "get-pod-logs", pod = %req.name, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("get-pod-logs"))?;

        let logs = self
            .cluster
            .pod_logs(&req.name, &req.namespace, req.container.as_deref(), req.previous)
            .await
            .map_err(fail("get-pod-logs"))?;

        Ok(Json(PodLogsResponse { logs }))
    }

    #[tool(
        name = "exec-in-pod",
        description = "Run a command in a running pod and return stdout and stderr separately. \
                       Stderr content does not make the call fail; a non-zero exit status does. \
                       Example: {\"name\": \"my-pod\", \"namespace\": \"default\", \"command\": [\"ip\", \"addr\"]}"
    )]
    pub async fn exec_in_pod(
        &self,
        Parameters(req): Parameters<ExecInPodRequest>,
    ) -> Result<Json<ExecResponse>, String> {
        tracing::info!(tool = "exec-in-pod", pod = %req.name, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("exec-in-pod"))?;
        if req.command.is_empty() {
            return Err(fail("exec-in-pod")(Error::InvalidInput(
                "command is required".to_string(),
            )));
        }

        let output = self
            .cluster
            .exec_pod(&req.name, &req.namespace, req.container.as_deref(), &req.command)
            .await
            .and_then(|out| out.checked(StderrPolicy::Capture, &req.command))
            .map_err(fail("exec-in-pod"))?;

        Ok(Json(ExecResponse {
            stdout: output.stdout,
            stderr: output.stderr,
        }))
    }

    #[tool(
        name = "debug-node",
        description = "Run a command on a node through a short-lived privileged debug pod pinned \
                       to that node, with the host filesystem mounted at /host and host \
                       network/PID/IPC namespaces shared. The pod is always deleted afterwards. \
                       Example: {\"name\": \"worker-0\", \"image\": \"registry.k8s.io/e2e-test-images/agnhost:2.47\", \"command\": [\"ip\", \"route\"]}"
    )]
    pub async fn debug_node(
        &self,
        Parameters(req): Parameters<DebugNodeRequest>,
    ) -> Result<Json<ExecResponse>, String> {
        tracing::info!(tool = "debug-node", node = %req.name, image = %req.image, "start");
        require_fields(&[("name", &req.name), ("image", &req.image)])
            .map_err(fail("debug-node"))?;
        if req.command.is_empty() {
            return Err(fail("debug-node")(Error::InvalidInput(
                "command is required".to_string(),
            )));
        }

        let output = self
            .cluster
            .debug_node(&req.name, &req.image, &req.command)
            .await
            .and_then(|out| out.checked(StderrPolicy::Capture, &req.command))
            .map_err(fail("debug-node"))?;

        Ok(Json(ExecResponse {
            stdout: output.stdout,
            stderr: output.stderr,
        }))
    }
}

/// Log a tool failure and surface the typed error's message verbatim.
pub(crate) fn fail(tool: &'static str) -> impl Fn(Error) -> String {
    move |e| {
        tracing::error!(tool = tool, error = %e, "failed");
        e.to_string()
    }
}
