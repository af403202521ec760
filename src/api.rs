//! REST client for the Docker Ant backend.
//!
//! Lifecycle commands are dispatched optimistically: the target container's
//! `state` is patched in the cache before the request goes out, confirmed by
//! invalidation on success, and reverted on failure. The authoritative state
//! always arrives later on the realtime channel and supersedes whatever this
//! module wrote.

use std::time::Duration;

use reqwest::Response;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::activity::{LogEntry, LogLevel};
use crate::cache::{CollectionKey, Snapshot};
use crate::context::SyncContext;
use crate::error::{Result, SyncError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Container creation payload, shaped exactly like the backend expects.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub image: String,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMapping>,
    pub networks: Vec<String>,
    pub restart_policy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeMapping {
    pub host: String,
    pub container: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullImageRequest {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub driver: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// HTTP client bound to one backend host and one sync context.
pub struct DockerApi {
    http: reqwest::Client,
    base: Url,
    ctx: SyncContext,
}

impl DockerApi {
    pub fn new(host: &str, ctx: SyncContext) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base = Url::parse(&format!("http://{host}/api/"))?;
        Ok(Self { http, base, ctx })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// GET a collection list.
    pub async fn list(&self, key: CollectionKey) -> Result<Snapshot> {
        let url = self.endpoint(key.path())?;
        let res = check(self.http.get(url).send().await).await?;
        Ok(res.json().await?)
    }

    /// The explicit refetch path that `invalidate` signals for: GET the
    /// collection and write it back as the new authoritative snapshot.
    pub async fn refresh(&self, key: CollectionKey) -> Result<()> {
        let snapshot = self.list(key).await?;
        self.ctx.cache.write().await.set(key, snapshot);
        debug!("refreshed {key} snapshot");
        Ok(())
    }

    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.lifecycle(id, "start", "starting").await
    }

    pub async fn stop_container(&self, id: &str) -> Result<()> {
        self.lifecycle(id, "stop", "stopping").await
    }

    pub async fn restart_container(&self, id: &str) -> Result<()> {
        self.lifecycle(id, "restart", "restarting").await
    }

    /// POST /containers/{id}/{verb} with optimistic state + revert-on-failure.
    async fn lifecycle(&self, id: &str, verb: &str, transient_state: &str) -> Result<()> {
        let patch = self
            .ctx
            .cache
            .write()
            .await
            .patch_optimistic(CollectionKey::Containers, id, transient_state);

        let url = self.endpoint(&format!("containers/{id}/{verb}"))?;
        match check(self.http.post(url).send().await).await {
            Ok(_) => {
                info!(container = id, "{verb} dispatched");
                self.ctx
                    .cache
                    .write()
                    .await
                    .invalidate(CollectionKey::Containers);
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to {verb} container: {e}");
                self.fail_command(patch, id, message, e).await
            }
        }
    }

    pub async fn delete_container(&self, id: &str) -> Result<()> {
        let patch = self
            .ctx
            .cache
            .write()
            .await
            .patch_optimistic(CollectionKey::Containers, id, "deleting");

        let url = self.endpoint(&format!("containers/{id}"))?;
        match check(self.http.delete(url).send().await).await {
            Ok(_) => {
                info!(container = id, "delete dispatched");
                self.ctx
                    .cache
                    .write()
                    .await
                    .invalidate(CollectionKey::Containers);
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to delete container: {e}");
                self.fail_command(patch, id, message, e).await
            }
        }
    }

    pub async fn create_container(&self, req: &CreateContainerRequest) -> Result<()> {
        let url = self.endpoint("containers/create")?;
        check(self.http.post(url).json(req).send().await).await?;
        self.ctx
            .cache
            .write()
            .await
            .invalidate(CollectionKey::Containers);
        Ok(())
    }

    pub async fn pull_image(&self, req: &PullImageRequest) -> Result<()> {
        let url = self.endpoint("images/pull")?;
        check(self.http.post(url).json(req).send().await).await?;
        self.ctx.cache.write().await.invalidate(CollectionKey::Images);
        Ok(())
    }

    pub async fn delete_image(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&format!("images/{id}"))?;
        check(self.http.delete(url).send().await).await?;
        self.ctx.cache.write().await.invalidate(CollectionKey::Images);
        Ok(())
    }

    pub async fn inspect_image(&self, id: &str) -> Result<serde_json::Value> {
        let url = self.endpoint(&format!("images/{id}/inspect"))?;
        let res = check(self.http.get(url).send().await).await?;
        Ok(res.json().await?)
    }

    pub async fn image_history(&self, id: &str) -> Result<serde_json::Value> {
        let url = self.endpoint(&format!("images/{id}/history"))?;
        let res = check(self.http.get(url).send().await).await?;
        Ok(res.json().await?)
    }

    pub async fn prune_images(&self) -> Result<()> {
        let url = self.endpoint("images/prune")?;
        check(self.http.post(url).send().await).await?;
        self.ctx.cache.write().await.invalidate(CollectionKey::Images);
        Ok(())
    }

    pub async fn create_network(&self, req: &CreateNetworkRequest) -> Result<()> {
        let url = self.endpoint("networks")?;
        check(self.http.post(url).json(req).send().await).await?;
        self.ctx
            .cache
            .write()
            .await
            .invalidate(CollectionKey::Networks);
        Ok(())
    }

    pub async fn delete_network(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&format!("networks/{id}"))?;
        check(self.http.delete(url).send().await).await?;
        self.ctx
            .cache
            .write()
            .await
            .invalidate(CollectionKey::Networks);
        Ok(())
    }

    pub async fn create_volume(&self, req: &CreateVolumeRequest) -> Result<()> {
        let url = self.endpoint("volumes")?;
        check(self.http.post(url).json(req).send().await).await?;
        self.ctx
            .cache
            .write()
            .await
            .invalidate(CollectionKey::Volumes);
        Ok(())
    }

    pub async fn delete_volume(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&format!("volumes/{name}"))?;
        check(self.http.delete(url).send().await).await?;
        self.ctx
            .cache
            .write()
            .await
            .invalidate(CollectionKey::Volumes);
        Ok(())
    }

    /// GET /activity: the backend's retained log entries, newest last.
    pub async fn fetch_activity(&self) -> Result<Vec<LogEntry>> {
        let url = self.endpoint("activity")?;
        let res = check(self.http.get(url).send().await).await?;
        Ok(res.json().await?)
    }

    /// Common failure path for lifecycle commands: revert the optimistic
    /// patch (a no-op if authoritative data has landed since) and surface
    /// the failure as an activity log entry.
    async fn fail_command(
        &self,
        patch: Option<crate::cache::OptimisticPatch>,
        id: &str,
        message: String,
        err: SyncError,
    ) -> Result<()> {
        if let Some(patch) = patch {
            self.ctx.cache.write().await.revert(patch);
        }
        self.ctx
            .append_log(LogEntry::new(LogLevel::Error, message, Some(id.to_string())))
            .await;
        Err(err)
    }
}

/// Map transport errors and non-2xx responses to `SyncError`.
async fn check(res: reqwest::Result<Response>) -> Result<Response> {
    let res = res?;
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        let message = res.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            message: message.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_container_request_matches_backend_shape() {
        let req = CreateContainerRequest {
            name: Some("web".into()),
            image: "nginx:latest".into(),
            env: vec!["FOO=bar".into()],
            cmd: vec![],
            ports: vec![PortMapping {
                host: 8080,
                container: 80,
            }],
            volumes: vec![VolumeMapping {
                host: "/data".into(),
                container: "/var/lib/data".into(),
            }],
            networks: vec!["bridge".into()],
            restart_policy: "unless-stopped".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "web",
                "image": "nginx:latest",
                "env": ["FOO=bar"],
                "cmd": [],
                "ports": [{"host": 8080, "container": 80}],
                "volumes": [{"host": "/data", "container": "/var/lib/data"}],
                "networks": ["bridge"],
                "restartPolicy": "unless-stopped"
            })
        );
    }

    #[test]
    fn anonymous_create_requests_omit_name() {
        let net = serde_json::to_value(CreateNetworkRequest {
            name: None,
            driver: "bridge".into(),
        })
        .unwrap();
        assert_eq!(net, json!({"driver": "bridge"}));

        let vol = serde_json::to_value(CreateVolumeRequest { name: None }).unwrap();
        assert_eq!(vol, json!({}));
    }

    #[tokio::test]
    async fn command_failure_reverts_patch_and_logs_error() {
        let ctx = SyncContext::new();
        ctx.cache.write().await.set(
            CollectionKey::Containers,
            vec![json!({"id": "abc123", "names": ["/web"], "state": "exited"})],
        );

        // Port 1 refuses the connection, so the dispatch fails after the
        // optimistic patch has been written.
        let api = DockerApi::new("127.0.0.1:1", ctx.clone()).unwrap();
        let err = api.start_container("abc123").await.unwrap_err();
        assert!(matches!(err, SyncError::Http(_)));

        let cache = ctx.cache.read().await;
        assert_eq!(
            cache.get(CollectionKey::Containers).unwrap()[0]["state"],
            "exited"
        );
        assert!(!cache.is_stale(CollectionKey::Containers));
        drop(cache);

        let log = ctx.log.read().await;
        let newest = log.newest().unwrap();
        assert_eq!(newest.level, LogLevel::Error);
        assert_eq!(newest.container_ref(), Some("abc123"));
        assert!(newest.message.contains("start"));
    }

    #[test]
    fn endpoints_join_against_the_api_base() {
        let api = DockerApi::new("localhost:8080", SyncContext::new()).unwrap();
        assert_eq!(
            api.endpoint("containers/abc/start").unwrap().as_str(),
            "http://localhost:8080/api/containers/abc/start"
        );
        assert_eq!(
            api.endpoint("volumes").unwrap().as_str(),
            "http://localhost:8080/api/volumes"
        );
    }
}
