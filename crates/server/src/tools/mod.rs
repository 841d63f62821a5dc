//! The MCP surface: tool routers, parameter schemas and result shapes.

pub mod kubernetes;
pub mod ovs;

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool_handler, ServerHandler};

use crate::kubernetes::ClusterClient;
use crate::Error;

/// MCP service exposing the cluster-introspection and OVS debugging tools.
#[derive(Clone)]
pub struct DebugToolServer {
    cluster: Arc<ClusterClient>,
    tool_router: ToolRouter<Self>,
}

impl DebugToolServer {
    pub fn new(cluster: Arc<ClusterClient>) -> Self {
        Self {
            cluster,
            tool_router: Self::kubernetes_tool_router() + Self::ovs_tool_router(),
        }
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DebugToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Kubernetes cluster introspection and Open vSwitch debugging tools. \
                 Use get-resource/list-resources for arbitrary API kinds, get-pod-logs \
                 and exec-in-pod against running pods, debug-node to run a command on \
                 a node through a short-lived privileged debug pod, and the ovs-* \
                 tools to inspect bridges, flows and conntrack on a pod running OVS."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

/// Required tool parameters must be present and non-empty; everything
/// missing is reported in one message.
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> crate::Result<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| format!("{name} is required"))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(missing.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_fields_passes_when_all_present() {
        assert!(require_fields(&[("version", "v1"), ("kind", "Pod")]).is_ok());
    }

    #[test]
    fn require_fields_joins_every_missing_field() {
        let err = require_fields(&[("version", ""), ("kind", ""), ("name", "my-pod")])
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("version is required"));
        assert!(message.contains("kind is required"));
        assert!(!message.contains("name is required"));
    }
}
