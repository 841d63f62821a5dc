use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams, AttachedProcess, LogParams};
use tokio::io::AsyncReadExt;

use super::ClusterClient;
use crate::{Error, Result};

/// Captured output of one remote command invocation. Non-empty stderr does
/// not by itself mean the command failed; a non-zero exit status does.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Whether a caller treats stderr content as a domain-level failure even when
/// the remote exit status was zero. Every call site names its policy; none
/// infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Diagnostic wrappers expect a clean channel; any stderr fails the call.
    TreatAsFailure,
    /// Raw exec hands stderr back to the caller as data.
    Capture,
}

impl ExecOutput {
    /// Apply an explicit stderr policy to a successful channel result.
    pub fn checked(self, policy: StderrPolicy, command: &[String]) -> Result<Self> {
        if policy == StderrPolicy::TreatAsFailure && !self.stderr.is_empty() {
            return Err(Error::ExecutionFailed(format!(
                "command {command:?} wrote to stderr: {}",
                self.stderr
            )));
        }
        Ok(self)
    }
}

impl ClusterClient {
    /// Fetch pod logs, one line per element. Timestamps are always included.
    pub async fn pod_logs(
        &self,
        name: &str,
        namespace: &str,
        container: Option<&str>,
        previous: bool,
    ) -> Result<Vec<String>> {
        let namespace = self.namespace_or_default(namespace);
        let pods: Api<Pod> = Api::namespaced(self.client(), &namespace);

        let params = LogParams {
            container: container.map(str::to_string),
            previous,
            timestamps: true,
            ..LogParams::default()
        };

        let raw = pods.logs(name, &params).await?;
        Ok(raw.split('\n').map(str::to_string).collect())
    }

    /// Run a command in a running pod and capture stdout/stderr into
    /// independent buffers. Fails fast, without opening the channel, when the
    /// pod is not in the Running phase.
    pub async fn exec_pod(
        &self,
        name: &str,
        namespace: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<ExecOutput> {
        let namespace = self.namespace_or_default(namespace);
        let pods: Api<Pod> = Api::namespaced(self.client(), &namespace);

        let pod = pods.get(name).await?;
        ensure_running(&pod_phase(&pod), name, &namespace)?;

        let container = match container {
            Some(c) => c.to_string(),
            None => first_container(&pod).ok_or_else(|| {
                Error::ExecutionFailed(format!("pod {namespace}/{name} declares no containers"))
            })?,
        };

        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true);

        let attached = pods.exec(name, command.to_vec(), &params).await?;
        read_exec_output(attached, command).await
    }
}

pub(crate) fn pod_phase(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Exec against anything but a Running pod would hang waiting for a channel
/// that never attaches; reject it up front, naming the observed phase.
pub(crate) fn ensure_running(phase: &str, name: &str, namespace: &str) -> Result<()> {
    if phase != "Running" {
        return Err(Error::NotReady(format!(
            "cannot exec in pod {namespace}/{name}: pod is not running; current phase is {phase}"
        )));
    }
    Ok(())
}

fn first_container(pod: &Pod) -> Option<String> {
    pod.spec.as_ref()?.containers.first().map(|c| c.name.clone())
}

async fn read_exec_output(mut attached: AttachedProcess, command: &[String]) -> Result<ExecOutput> {
    let mut stdout_stream = attached
        .stdout()
        .ok_or_else(|| Error::ExecutionFailed("exec channel has no stdout stream".to_string()))?;
    let mut stderr_stream = attached
        .stderr()
        .ok_or_else(|| Error::ExecutionFailed("exec channel has no stderr stream".to_string()))?;
    let status = attached.take_status();

    // Drain both streams concurrently; reading them one after the other can
    // stall the channel pump once the unread stream's buffer fills.
    let mut stdout = String::new();
    let mut stderr = String::new();
    let (out, err) = tokio::join!(
        stdout_stream.read_to_string(&mut stdout),
        stderr_stream.read_to_string(&mut stderr)
    );
    out?;
    err?;

    let status = match status {
        Some(status) => status.await,
        None => None,
    };

    attached
        .join()
        .await
        .map_err(|e| Error::ExecutionFailed(format!("exec channel terminated abnormally: {e}")))?;

    if let Some(status) = status {
        if status.status.as_deref() == Some("Failure") {
            return Err(Error::ExecutionFailed(status.message.unwrap_or_else(|| {
                format!("command {command:?} exited with a non-zero status")
            })));
        }
    }

    Ok(ExecOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodStatus};

    fn pod_in_phase(phase: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn exec_precondition_names_observed_phase() {
        let err = ensure_running("Pending", "ovs-node-abc", "openshift-ovn").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Pending"));
        assert!(message.contains("openshift-ovn/ovs-node-abc"));

        assert!(ensure_running("Running", "ovs-node-abc", "default").is_ok());
    }

    #[test]
    fn phase_defaults_to_unknown_without_status() {
        assert_eq!(pod_phase(&Pod::default()), "Unknown");
        assert_eq!(pod_phase(&pod_in_phase("Succeeded")), "Succeeded");
    }

    #[test]
    fn stderr_policy_is_explicit_per_call_site() {
        let output = ExecOutput {
            stdout: "br-int\n".to_string(),
            stderr: "ovs-vsctl: unix socket timeout\n".to_string(),
        };
        let command = vec!["ovs-vsctl".to_string(), "list-br".to_string()];

        let err = output
            .clone()
            .checked(StderrPolicy::TreatAsFailure, &command)
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(_)));
        assert!(err.to_string().contains("unix socket timeout"));

        let passed = output.checked(StderrPolicy::Capture, &command).unwrap();
        assert_eq!(passed.stdout, "br-int\n");

        let clean = ExecOutput {
            stdout: "br-int\n".to_string(),
            stderr: String::new(),
        };
        assert!(clean.checked(StderrPolicy::TreatAsFailure, &command).is_ok());
    }

    #[test]
    fn first_container_follows_spec_order() {
        let pod = Pod {
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "ovs-vswitchd".to_string(),
                        ..Default::default()
                    },
                    Container {
                        name: "ovsdb-server".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(first_container(&pod), Some("ovs-vswitchd".to_string()));
        assert_eq!(first_container(&Pod::default()), None);
    }
}
