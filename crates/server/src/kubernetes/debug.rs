use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Toleration, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use tracing::{debug, warn};

use super::pods::{pod_phase, ExecOutput};
use super::ClusterClient;
use crate::{Error, Result};

const DEBUG_CONTAINER: &str = "debug-container";
const HOST_MOUNT_PATH: &str = "/host";
const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(500);
const READINESS_DEADLINE: Duration = Duration::from_secs(60);

/// The pod operations the provisioning machinery needs. Split behind a trait
/// so the readiness wait and the teardown invariant are testable without a
/// cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PodStore: Send + Sync {
    /// Create the pod and return the server-assigned name.
    async fn create(&self, pod: &Pod) -> Result<String>;
    async fn phase(&self, name: &str) -> Result<String>;
    async fn delete(&self, name: &str) -> Result<()>;
}

struct ApiPodStore {
    pods: Api<Pod>,
}

#[async_trait]
impl PodStore for ApiPodStore {
    async fn create(&self, pod: &Pod) -> Result<String> {
        let created = self.pods.create(&PostParams::default(), pod).await?;
        Ok(created.metadata.name.clone().unwrap_or_default())
    }

    async fn phase(&self, name: &str) -> Result<String> {
        let pod = self.pods.get(name).await?;
        Ok(pod_phase(&pod))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.pods.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Owns one created debug pod. The pod must never outlive the call that
/// created it: every exit path either awaits [`DebugPodGuard::teardown`] or
/// falls through to `Drop`, which spawns the deletion so that a caller
/// cancelled mid-poll or mid-exec still cleans up.
struct DebugPodGuard {
    store: Arc<dyn PodStore>,
    name: Option<String>,
}

impl std::fmt::Debug for DebugPodGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugPodGuard")
            .field("name", &self.name)
            .finish()
    }
}

impl DebugPodGuard {
    fn new(store: Arc<dyn PodStore>, name: String) -> Self {
        Self {
            store,
            name: Some(name),
        }
    }

    async fn teardown(mut self) {
        if let Some(name) = self.name.take() {
            delete_logged(&*self.store, &name).await;
        }
    }
}

impl Drop for DebugPodGuard {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            let store = self.store.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { delete_logged(&*store, &name).await });
                }
                Err(_) => warn!(pod = %name, "runtime gone before debug pod cleanup"),
            }
        }
    }
}

/// Deletion failures are logged and swallowed so they never mask the primary
/// error of the call that provisioned the pod.
async fn delete_logged(store: &dyn PodStore, name: &str) {
    match store.delete(name).await {
        Ok(()) => debug!(pod = %name, "deleted debug pod"),
        Err(e) => warn!(pod = %name, error = %e, "failed to clean up debug pod"),
    }
}

impl ClusterClient {
    /// Run a command on a node through a privileged, host-attached debug pod
    /// pinned to that node. The pod is deleted before this returns, whatever
    /// the outcome.
    pub async fn debug_node(
        &self,
        node: &str,
        image: &str,
        command: &[String],
    ) -> Result<ExecOutput> {
        let namespace = self.default_namespace().to_string();
        let pods: Api<Pod> = Api::namespaced(self.client(), &namespace);
        let store: Arc<dyn PodStore> = Arc::new(ApiPodStore { pods });

        let (name, guard) = provision(store, node, &namespace, image).await?;
        let result = self
            .exec_pod(&name, &namespace, Some(DEBUG_CONTAINER), command)
            .await;
        guard.teardown().await;
        result
    }
}

/// Create the debug pod and wait for it to reach Running. On success the
/// returned guard owns the pod; on any failure the pod has already been
/// deleted.
async fn provision(
    store: Arc<dyn PodStore>,
    node: &str,
    namespace: &str,
    image: &str,
) -> Result<(String, DebugPodGuard)> {
    let name = store
        .create(&debug_pod_manifest(node, namespace, image))
        .await?;
    debug!(pod = %name, node = %node, "created debug pod");

    let guard = DebugPodGuard::new(store.clone(), name.clone());
    match wait_until_running(&*store, &name).await {
        Ok(()) => Ok((name, guard)),
        Err(e) => {
            guard.teardown().await;
            Err(e)
        }
    }
}

/// Poll the pod phase at a fixed interval under a hard deadline. A poll
/// error aborts immediately; the ceiling surfaces as [`Error::Timeout`].
async fn wait_until_running(store: &dyn PodStore, name: &str) -> Result<()> {
    let deadline = tokio::time::Instant::now() + READINESS_DEADLINE;
    loop {
        if store.phase(name).await? == "Running" {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::Timeout(format!(
                "debug pod {name} did not reach Running within {}s",
                READINESS_DEADLINE.as_secs()
            )));
        }
        tokio::time::sleep(READINESS_POLL_INTERVAL).await;
    }
}

/// Host-attached diagnostic pod: pinned to the node, sharing the host
/// network/PID/IPC namespaces, privileged root with the host filesystem
/// mounted at /host, parked on `sleep infinity` so the subsequent exec
/// carries the actual work.
fn debug_pod_manifest(node: &str, namespace: &str, image: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("debug-node-{node}-")),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            restart_policy: Some("Never".to_string()),
            tolerations: Some(vec![Toleration {
                operator: Some("Exists".to_string()),
                ..Default::default()
            }]),
            host_network: Some(true),
            host_pid: Some(true),
            host_ipc: Some(true),
            volumes: Some(vec![Volume {
                name: "host".to_string(),
                host_path: Some(HostPathVolumeSource {
                    path: "/".to_string(),
                    type_: Some("Directory".to_string()),
                }),
                ..Default::default()
            }]),
            containers: vec![Container {
                name: DEBUG_CONTAINER.to_string(),
                image: Some(image.to_string()),
                command: Some(vec!["sleep".to_string(), "infinity".to_string()]),
                security_context: Some(SecurityContext {
                    privileged: Some(true),
                    run_as_user: Some(0),
                    ..Default::default()
                }),
                volume_mounts: Some(vec![VolumeMount {
                    name: "host".to_string(),
                    mount_path: HOST_MOUNT_PATH.to_string(),
                    ..Default::default()
                }]),
                env: Some(vec![EnvVar {
                    // sos report collection inside the pod expects this
                    name: "HOST".to_string(),
                    value: Some(HOST_MOUNT_PATH.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}
