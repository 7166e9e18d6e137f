//! `Runtime` implementations (spec §6).
//!
//! The scheduler core only ever depends on `faas_common::Runtime`. These
//! are the two concrete collaborators: `DockerRuntime`, a thin reference
//! implementation, and `StubRuntime`, the in-memory double used by tests
//! and the simulation harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use faas_common::{FaasError, InvocationResult, Result, Runtime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const WORKER_CONTAINER_PORT: &str = "5000/tcp";

/// Reference `Runtime` backed by the Docker daemon.
///
/// Mirrors `original_source/scheduler.py`'s `start_new_container`: runs a
/// single fixed worker image (`faas-function:latest` by default) with all
/// ports published, waits for it to boot, and POSTs `{"exec_time": ...}`
/// to it on `invoke`. Nothing about this type leaks into the scheduler
/// core — it is reached only through the `Runtime` trait.
pub struct DockerRuntime {
    docker: Arc<Docker>,
    image: String,
    http: reqwest::Client,
    boot_timeout: Duration,
}

impl DockerRuntime {
    pub fn new(docker: Arc<Docker>, image: impl Into<String>) -> Self {
        Self {
            docker,
            image: image.into(),
            http: reqwest::Client::new(),
            boot_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    async fn launch(&self, image: &str) -> Result<(String, String)> {
        let name = format!("faas-{}", Uuid::new_v4());
        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        let host_config = HostConfig {
            publish_all_ports: Some(true),
            ..Default::default()
        };

        let config = Config {
            image: Some(image.to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| FaasError::Runtime(format!("container create failed: {e}")))?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| FaasError::Runtime(format!("container start failed: {e}")))?;

        let inspect = self
            .docker
            .inspect_container(&created.id, None)
            .await
            .map_err(|e| FaasError::Runtime(format!("container inspect failed: {e}")))?;

        let host_port = inspect
            .network_settings
            .as_ref()
            .and_then(|n| n.ports.as_ref())
            .and_then(|ports| ports.get(WORKER_CONTAINER_PORT))
            .and_then(|bindings: &Option<Vec<PortBinding>>| bindings.as_ref())
            .and_then(|bindings| bindings.first())
            .and_then(|b| b.host_port.clone())
            .ok_or_else(|| {
                FaasError::Runtime(format!("container {} published no host port", created.id))
            })?;

        let endpoint = format!("127.0.0.1:{host_port}");
        info!(container_id = %created.id, %endpoint, "cold start: container launched");
        Ok((created.id, endpoint))
    }

    async fn invoke(&self, endpoint: &str, exec_time: Duration) -> Result<InvocationResult> {
        let url = format!("http://{endpoint}/");
        let payload = HashMap::from([("exec_time", exec_time.as_secs_f64())]);

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| FaasError::Runtime(format!("invocation request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FaasError::Runtime(format!("invocation response read failed: {e}")))?;

        if status.is_success() {
            Ok(InvocationResult {
                request_id: Uuid::new_v4().to_string(),
                response: Some(body.into_bytes()),
                logs: None,
                error: None,
            })
        } else {
            Err(FaasError::Runtime(format!(
                "invocation returned status {status}: {body}"
            )))
        }
    }

    async fn stop(&self, id: &str) -> Result<()> {
        if let Err(e) = self
            .docker
            .stop_container(id, Some(StopContainerOptions { t: 5 }))
            .await
        {
            warn!(container_id = %id, error = %e, "stop failed, attempting removal anyway");
        }

        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| FaasError::Runtime(format!("container removal failed: {e}")))?;

        debug!(container_id = %id, "container removed");
        Ok(())
    }

    async fn probe(&self, endpoint: &str) -> Result<()> {
        probe_http(&self.http, endpoint).await
    }
}

/// Any HTTP response at all -- including a 404 -- means the worker
/// answered; a fixed-function worker with no GET route still does that.
/// A transport error (connection refused while the container is still
/// booting) is the one case that must propagate so
/// `Scheduler::wait_until_healthy`'s retry loop can do its job.
async fn probe_http(http: &reqwest::Client, endpoint: &str) -> Result<()> {
    let url = format!("http://{endpoint}/");
    http.get(&url)
        .timeout(Duration::from_millis(500))
        .send()
        .await
        .map(|_| ())
        .map_err(|e| FaasError::Runtime(format!("probe failed: {e}")))
}

/// In-memory `Runtime` double for tests, the HTTP gateway's smoke tests,
/// and the simulation harness (spec §6).
///
/// `invoke` sleeps for the requested duration rather than doing any real
/// I/O; the simulation harness never calls `invoke` at all since it
/// advances time itself (see `SimulationHarness`).
#[derive(Default)]
pub struct StubRuntime {
    next_id: AtomicU64,
    /// Instances launched but not yet stopped, kept only so tests can
    /// assert on cleanup.
    live: Mutex<HashMap<String, ()>>,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn live_count(&self) -> usize {
        self.live.lock().await.len()
    }
}

#[async_trait]
impl Runtime for StubRuntime {
    async fn launch(&self, _image: &str) -> Result<(String, String)> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("stub-{n}");
        let endpoint = format!("stub://{id}");
        self.live.lock().await.insert(id.clone(), ());
        Ok((id, endpoint))
    }

    async fn invoke(&self, endpoint: &str, exec_time: Duration) -> Result<InvocationResult> {
        tokio::time::sleep(exec_time).await;
        Ok(InvocationResult {
            request_id: Uuid::new_v4().to_string(),
            response: Some(b"ok".to_vec()),
            logs: Some(format!("executed on {endpoint}")),
            error: None,
        })
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.live.lock().await.remove(id);
        Ok(())
    }

    async fn probe(&self, _endpoint: &str) -> Result<()> {
        Ok(())
    }
}
