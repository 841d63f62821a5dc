//! Open vSwitch debugging tools: thin command templates over exec-in-pod
//! with validation of every caller-supplied argument before it reaches the
//! command vector.

use regex::Regex;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{schemars, tool, tool_router, Json};
use serde::{Deserialize, Serialize};

use super::kubernetes::fail;
use super::{require_fields, DebugToolServer};
use crate::kubernetes::pods::StderrPolicy;
use crate::sanitize::{validate_freeform, validate_identifier};
use crate::Error;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OvsPodRequest {
    /// Name of the pod running OVS.
    #[serde(default)]
    pub name: String,
    /// Namespace of the OVS pod; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OvsBridgeRequest {
    /// Name of the pod running OVS.
    #[serde(default)]
    pub name: String,
    /// Namespace of the OVS pod; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Name of the OVS bridge, e.g. "br-int".
    #[serde(default)]
    pub bridge: String,
    /// Regex pattern to filter output lines.
    #[serde(default)]
    pub filter: String,
    /// Limit the number of lines returned; 0 means unlimited.
    #[serde(default)]
    pub max_lines: usize,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OvsShowRequest {
    /// Name of the pod running OVS.
    #[serde(default)]
    pub name: String,
    /// Namespace of the OVS pod; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Limit the number of lines returned; 0 means unlimited.
    #[serde(default)]
    pub max_lines: usize,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DumpConntrackRequest {
    /// Name of the pod running OVS.
    #[serde(default)]
    pub name: String,
    /// Namespace of the OVS pod; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Regex pattern to filter conntrack entries.
    #[serde(default)]
    pub filter: String,
    /// Limit the number of entries returned; 0 means unlimited.
    #[serde(default)]
    pub max_lines: usize,
    /// Additional arguments for dpctl/dump-conntrack, e.g. ["zone=5"].
    #[serde(default)]
    pub additional_params: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TraceRequest {
    /// Name of the pod running OVS.
    #[serde(default)]
    pub name: String,
    /// Namespace of the OVS pod; empty selects the default namespace.
    #[serde(default)]
    pub namespace: String,
    /// Name of the OVS bridge, e.g. "br-int".
    #[serde(default)]
    pub bridge: String,
    /// Packet-match specification describing the packet to trace, e.g.
    /// "in_port=1,ip,nw_src=10.244.0.5,nw_dst=10.96.0.1".
    #[serde(default)]
    pub flow: String,
    /// Regex pattern to filter trace output lines.
    #[serde(default)]
    pub filter: String,
    /// Limit the number of output lines returned; 0 means unlimited.
    #[serde(default)]
    pub max_lines: usize,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct BridgesResponse {
    pub bridges: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct PortsResponse {
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct InterfacesResponse {
    pub interfaces: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ShowResponse {
    pub output: String,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct FlowsResponse {
    pub bridge: String,
    pub flows: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ConntrackResponse {
    pub entries: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct TraceResponse {
    pub bridge: String,
    pub flow: String,
    pub output: String,
}

#[tool_router(router = ovs_tool_router, vis = "pub")]
impl DebugToolServer {
    #[tool(
        name = "ovs-list-bridges",
        description = "List all OVS bridges on a pod by running 'ovs-vsctl list-br'."
    )]
    pub async fn ovs_list_bridges(
        &self,
        Parameters(req): Parameters<OvsPodRequest>,
    ) -> Result<Json<BridgesResponse>, String> {
        tracing::info!(tool = "ovs-list-bridges", pod = %req.name, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-list-bridges"))?;

        let bridges = self
            .run_command(
                &req.name,
                &req.namespace,
                vec!["ovs-vsctl".into(), "list-br".into()],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-list-bridges"))?;

        Ok(Json(BridgesResponse { bridges }))
    }

    #[tool(
        name = "ovs-list-ports",
        description = "List all ports on an OVS bridge by running 'ovs-vsctl list-ports <bridge>'."
    )]
    pub async fn ovs_list_ports(
        &self,
        Parameters(req): Parameters<OvsBridgeRequest>,
    ) -> Result<Json<PortsResponse>, String> {
        tracing::info!(tool = "ovs-list-ports", pod = %req.name, bridge = %req.bridge, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-list-ports"))?;
        validate_identifier(&req.bridge).map_err(fail("ovs-list-ports"))?;

        let ports = self
            .run_command(
                &req.name,
                &req.namespace,
                vec!["ovs-vsctl".into(), "list-ports".into(), req.bridge],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-list-ports"))?;

        Ok(Json(PortsResponse { ports }))
    }

    #[tool(
        name = "ovs-list-interfaces",
        description = "List all interfaces on an OVS bridge by running 'ovs-vsctl list-ifaces <bridge>'."
    )]
    pub async fn ovs_list_interfaces(
        &self,
        Parameters(req): Parameters<OvsBridgeRequest>,
    ) -> Result<Json<InterfacesResponse>, String> {
        tracing::info!(tool = "ovs-list-interfaces", pod = %req.name, bridge = %req.bridge, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-list-interfaces"))?;
        validate_identifier(&req.bridge).map_err(fail("ovs-list-interfaces"))?;

        let interfaces = self
            .run_command(
                &req.name,
                &req.namespace,
                vec!["ovs-vsctl".into(), "list-ifaces".into(), req.bridge],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-list-interfaces"))?;

        Ok(Json(InterfacesResponse { interfaces }))
    }

    #[tool(
        name = "ovs-show",
        description = "Show the full OVS configuration (bridges, ports, interfaces, controllers) \
                       by running 'ovs-vsctl show'."
    )]
    pub async fn ovs_show(
        &self,
        Parameters(req): Parameters<OvsShowRequest>,
    ) -> Result<Json<ShowResponse>, String> {
        tracing::info!(tool = "ovs-show", pod = %req.name, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-show"))?;

        let lines = self
            .run_command(
                &req.name,
                &req.namespace,
                vec!["ovs-vsctl".into(), "show".into()],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-show"))?;
        let lines = limit_lines(lines, req.max_lines);

        Ok(Json(ShowResponse {
            output: lines.join("\n"),
        }))
    }

    #[tool(
        name = "ovs-dump-flows",
        description = "Dump OpenFlow flows from an OVS bridge by running 'ovs-ofctl dump-flows \
                       <bridge>', optionally filtered by a regex and truncated to max_lines."
    )]
    pub async fn ovs_dump_flows(
        &self,
        Parameters(req): Parameters<OvsBridgeRequest>,
    ) -> Result<Json<FlowsResponse>, String> {
        tracing::info!(tool = "ovs-dump-flows", pod = %req.name, bridge = %req.bridge, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-dump-flows"))?;
        validate_identifier(&req.bridge).map_err(fail("ovs-dump-flows"))?;

        let flows = self
            .run_command(
                &req.name,
                &req.namespace,
                vec!["ovs-ofctl".into(), "dump-flows".into(), req.bridge.clone()],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-dump-flows"))?;
        let flows = filter_lines(flows, &req.filter).map_err(fail("ovs-dump-flows"))?;
        let flows = limit_lines(flows, req.max_lines);

        Ok(Json(FlowsResponse {
            bridge: req.bridge,
            flows,
        }))
    }

    #[tool(
        name = "ovs-dump-conntrack",
        description = "Dump connection tracking entries from the OVS datapath by running \
                       'ovs-appctl dpctl/dump-conntrack', optionally with additional arguments \
                       such as [\"zone=5\"], filtered by a regex and truncated to max_lines."
    )]
    pub async fn ovs_dump_conntrack(
        &self,
        Parameters(req): Parameters<DumpConntrackRequest>,
    ) -> Result<Json<ConntrackResponse>, String> {
        tracing::info!(tool = "ovs-dump-conntrack", pod = %req.name, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-dump-conntrack"))?;

        let mut command: Vec<String> = vec!["ovs-appctl".into(), "dpctl/dump-conntrack".into()];
        for param in &req.additional_params {
            validate_freeform(param).map_err(fail("ovs-dump-conntrack"))?;
            command.push(param.clone());
        }

        let entries = self
            .run_command(
                &req.name,
                &req.namespace,
                command,
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-dump-conntrack"))?;
        let entries = filter_lines(entries, &req.filter).map_err(fail("ovs-dump-conntrack"))?;
        let entries = limit_lines(entries, req.max_lines);

        Ok(Json(ConntrackResponse { entries }))
    }

    #[tool(
        name = "ovs-trace",
        description = "Trace a packet through the OpenFlow pipeline by running 'ovs-appctl \
                       ofproto/trace <bridge> <flow>'. The flow is a packet-match specification \
                       such as \"in_port=1,ip,nw_src=10.244.0.5,nw_dst=10.96.0.1\"."
    )]
    pub async fn ovs_trace(
        &self,
        Parameters(req): Parameters<TraceRequest>,
    ) -> Result<Json<TraceResponse>, String> {
        tracing::info!(tool = "ovs-trace", pod = %req.name, bridge = %req.bridge, "start");
        require_fields(&[("name", &req.name)]).map_err(fail("ovs-trace"))?;
        validate_identifier(&req.bridge).map_err(fail("ovs-trace"))?;
        validate_freeform(&req.flow).map_err(fail("ovs-trace"))?;

        let lines = self
            .run_command(
                &req.name,
                &req.namespace,
                vec![
                    "ovs-appctl".into(),
                    "ofproto/trace".into(),
                    req.bridge.clone(),
                    req.flow.clone(),
                ],
                StderrPolicy::TreatAsFailure,
            )
            .await
            .map_err(fail("ovs-trace"))?;
        let lines = filter_lines(lines, &req.filter).map_err(fail("ovs-trace"))?;
        let lines = limit_lines(lines, req.max_lines);

        Ok(Json(TraceResponse {
            bridge: req.bridge,
            flow: req.flow,
            output: lines.join("\n"),
        }))
    }
}

impl DebugToolServer {
    /// Run a diagnostic command in the target pod. With
    /// [`StderrPolicy::TreatAsFailure`], any stderr content fails the call
    /// even on a zero exit status; with [`StderrPolicy::Capture`] the caller
    /// gets the raw streams.
    async fn run_command(
        &self,
        name: &str,
        namespace: &str,
        command: Vec<String>,
        policy: StderrPolicy,
    ) -> crate::Result<Vec<String>> {
        let output = self
            .cluster
            .exec_pod(name, namespace, None, &command)
            .await?
            .checked(policy, &command)?;

        Ok(split_lines(&output.stdout))
    }
}

/// Trimmed, non-empty stdout lines.
fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn filter_lines(lines: Vec<String>, pattern: &str) -> crate::Result<Vec<String>> {
    if pattern.is_empty() {
        return Ok(lines);
    }
    let re = Regex::new(pattern)
        .map_err(|e| Error::InvalidInput(format!("invalid filter pattern {pattern}: {e}")))?;
    Ok(lines.into_iter().filter(|line| re.is_match(line)).collect())
}

fn limit_lines(lines: Vec<String>, max_lines: usize) -> Vec<String> {
    if max_lines > 0 && lines.len() > max_lines {
        lines.into_iter().take(max_lines).collect()
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_lines_trims_and_drops_blanks() {
        let stdout = "br-int\n  br-ex  \n\n   \nbr-local\n";
        assert_eq!(split_lines(stdout), lines(&["br-int", "br-ex", "br-local"]));
    }

    #[test]
    fn filter_lines_applies_regex() {
        let input = lines(&[
            "cookie=0x0, table=0, priority=100,in_port=1 actions=output:2",
            "cookie=0x0, table=10, priority=90,arp actions=NORMAL",
        ]);
        let filtered = filter_lines(input, "table=10").unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].contains("arp"));
    }

    #[test]
    fn filter_lines_passes_through_without_pattern() {
        let input = lines(&["a", "b"]);
        assert_eq!(filter_lines(input.clone(), "").unwrap(), input);
    }

    #[test]
    fn filter_lines_rejects_invalid_pattern() {
        let err = filter_lines(lines(&["a"]), "table=(").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn limit_lines_truncates_only_past_the_cap() {
        let input = lines(&["1", "2", "3"]);
        assert_eq!(limit_lines(input.clone(), 2), lines(&["1", "2"]));
        assert_eq!(limit_lines(input.clone(), 0), input);
        assert_eq!(limit_lines(input.clone(), 5), input);
    }
}
