//! REST Backend Client
//!
//! `UatApiClient` implements `PlanningBackend` over the UAT backend's REST
//! endpoints. Non-success statuses become `BackendError::Http` except on the
//! approval endpoint, where 404 and 409 map to the contract errors.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use uat_pilot_core::backend::{BlockerDetection, PlanningBackend, RespondAck};
use uat_pilot_core::blocker::{BlockerAction, BlockerConfig, BlockerType, ConnectionTestResult};
use uat_pilot_core::error::{BackendError, BackendResult};
use uat_pilot_core::plan::{ApprovalReceipt, ModificationType, TestPlan, TriggerResponse};
use uat_pilot_core::progress::ProgressStats;
use uat_pilot_core::proxy::ProxyConfig;

use crate::http_client::build_http_client;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DetectBody<'a> {
    project_name: &'a str,
    project_path: &'a str,
}

#[derive(Serialize)]
struct RespondBody<'a> {
    blocker_id: &'a str,
    action: BlockerAction,
    project_name: &'a str,
}

#[derive(Serialize)]
struct TestConnectionBody<'a> {
    blocker_type: BlockerType,
    service: &'a str,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    project_name: &'a str,
    blocker_config: &'a BlockerConfig,
}

#[derive(Serialize)]
struct ModifyBody<'a> {
    project_name: &'a str,
    cycle_id: &'a str,
    modification_type: ModificationType,
    user_message: &'a str,
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    project_name: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// REST client for the UAT backend.
pub struct UatApiClient {
    base: String,
    client: reqwest::Client,
}

impl UatApiClient {
    /// Create a client for the given base URL (e.g. `http://localhost:8090`).
    pub fn new(base_url: &str, proxy: Option<&ProxyConfig>) -> BackendResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| BackendError::config(format!("invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::config(format!(
                "unsupported scheme '{}' for base URL",
                parsed.scheme()
            )));
        }
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            client: build_http_client(proxy),
        })
    }

    /// The WebSocket base derived from the REST base URL.
    pub fn ws_base(&self) -> String {
        if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            // constructor guarantees http(s); kept as a fallback
            self.base.clone()
        }
    }

    /// Derive the WebSocket URL for a cycle's progress channel.
    pub fn ws_url(&self, cycle_id: &str) -> String {
        format!("{}/uat/ws/{}", self.ws_base(), cycle_id)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> BackendResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_json<R>(&self, path: &str) -> BackendResult<R>
    where
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> BackendResult<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::invalid_response(e.to_string()))
    }

    /// Map approval-endpoint HTTP errors onto the plan contract errors.
    fn map_approve_error(err: BackendError, cycle_id: &str) -> BackendError {
        match err {
            BackendError::Http { status: 404, .. } => {
                BackendError::PlanNotFound(cycle_id.to_string())
            }
            BackendError::Http { status: 409, .. } => {
                BackendError::AlreadyApproved(cycle_id.to_string())
            }
            other => other,
        }
    }
}

#[async_trait]
impl PlanningBackend for UatApiClient {
    async fn detect_blockers(
        &self,
        project_name: &str,
        project_path: &str,
    ) -> BackendResult<BlockerDetection> {
        self.post_json(
            "/blocker/detect",
            &DetectBody {
                project_name,
                project_path,
            },
        )
        .await
    }

    async fn respond_blocker(
        &self,
        blocker_id: &str,
        action: BlockerAction,
        project_name: &str,
    ) -> BackendResult<RespondAck> {
        self.post_json(
            "/blocker/respond",
            &RespondBody {
                blocker_id,
                action,
                project_name,
            },
        )
        .await
    }

    async fn test_connection(
        &self,
        blocker_type: BlockerType,
        service: &str,
    ) -> BackendResult<ConnectionTestResult> {
        self.post_json(
            "/blocker/test-connection",
            &TestConnectionBody {
                blocker_type,
                service,
            },
        )
        .await
    }

    async fn generate_plan(
        &self,
        project_name: &str,
        blocker_config: &BlockerConfig,
    ) -> BackendResult<TestPlan> {
        self.post_json(
            "/uat/generate-plan",
            &GenerateBody {
                project_name,
                blocker_config,
            },
        )
        .await
    }

    async fn modify_plan(
        &self,
        project_name: &str,
        cycle_id: &str,
        modification_type: ModificationType,
        user_message: &str,
    ) -> BackendResult<TestPlan> {
        self.post_json(
            "/uat/modify-plan",
            &ModifyBody {
                project_name,
                cycle_id,
                modification_type,
                user_message,
            },
        )
        .await
    }

    async fn approve_plan(&self, cycle_id: &str) -> BackendResult<ApprovalReceipt> {
        let url = self.endpoint(&format!("/uat/approve-plan/{}", cycle_id));
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;
        Self::decode(response)
            .await
            .map_err(|e| Self::map_approve_error(e, cycle_id))
    }

    async fn trigger_execution(&self, project_name: &str) -> BackendResult<TriggerResponse> {
        self.post_json("/uat/trigger", &TriggerBody { project_name })
            .await
    }

    async fn get_progress(&self, cycle_id: &str) -> BackendResult<ProgressStats> {
        self.get_json(&format!("/uat/progress/{}", cycle_id)).await
    }
}
