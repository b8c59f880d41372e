//! Application State
//!
//! Service container wiring the planning core together: the backend handle,
//! the project store, the notification hub, and the per-cycle stream
//! registry. One live stream per cycle; teardown cancels every stream's
//! timers.

use std::sync::Arc;

use dashmap::DashMap;

use uat_pilot_api::UatApiClient;
use uat_pilot_core::backend::{BlockerDetection, PlanningBackend};
use uat_pilot_core::{Blocker, ProgressStats, ProxyConfig, TriggerResponse};

use crate::models::context::ProjectContext;
use crate::services::blocker::{BlockerDetector, BlockerNegotiator};
use crate::services::context::{ContextGatherer, ProjectStore};
use crate::services::execution::ExecutionLauncher;
use crate::services::notify::NotificationHub;
use crate::services::plan::PlanSession;
use crate::services::progress::{
    ProgressStreamHandle, StreamConfig, StreamController, StreamStatus,
};
use crate::utils::error::{AppError, AppResult};

fn stream_is_live(controller: &StreamController) -> bool {
    !matches!(
        controller.status(),
        StreamStatus::Disconnected | StreamStatus::Failed
    )
}

/// Application state for the planning core.
pub struct AppState {
    backend: Arc<dyn PlanningBackend>,
    store: Arc<dyn ProjectStore>,
    notifications: Arc<NotificationHub>,
    streams: DashMap<String, StreamController>,
    stream_config: StreamConfig,
    /// WebSocket base, e.g. `ws://localhost:8090`
    ws_base: String,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn PlanningBackend>,
        store: Arc<dyn ProjectStore>,
        ws_base: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            notifications: Arc::new(NotificationHub::new()),
            streams: DashMap::new(),
            stream_config: StreamConfig::default(),
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Wire the state against the REST backend at `base_url`, deriving the
    /// WebSocket base from the same address.
    pub fn connect(
        base_url: &str,
        proxy: Option<&ProxyConfig>,
        store: Arc<dyn ProjectStore>,
    ) -> AppResult<Self> {
        let client = UatApiClient::new(base_url, proxy)?;
        let ws_base = client.ws_base();
        Ok(Self::new(Arc::new(client), store, ws_base))
    }

    /// Override the stream configuration (heartbeat interval, backoff).
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn backend(&self) -> Arc<dyn PlanningBackend> {
        self.backend.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationHub> {
        self.notifications.clone()
    }

    /// Assemble a fresh readiness snapshot for a project.
    pub async fn gather_context(&self, project_name: &str) -> AppResult<ProjectContext> {
        let gatherer = ContextGatherer::new(self.store.clone());
        Ok(gatherer.gather(project_name).await?)
    }

    /// Detect environmental blockers for a project.
    pub async fn detect_blockers(
        &self,
        project_name: &str,
        project_path: &str,
    ) -> AppResult<BlockerDetection> {
        Ok(BlockerDetector::detect(self.backend.as_ref(), project_name, project_path).await?)
    }

    /// Start a negotiation session over detected blockers.
    pub fn begin_negotiation(
        &self,
        project_name: &str,
        blockers: Vec<Blocker>,
    ) -> AppResult<BlockerNegotiator> {
        Ok(BlockerNegotiator::new(project_name, blockers)?)
    }

    /// Start a fresh planning session for a project.
    pub fn new_plan_session(&self, project_name: &str) -> PlanSession {
        PlanSession::new(project_name)
    }

    /// Trigger execution for a confirmed session and open its progress
    /// stream, seeded with a one-shot snapshot.
    pub async fn start_execution(
        &self,
        session: &PlanSession,
    ) -> AppResult<(TriggerResponse, ProgressStreamHandle)> {
        let response = ExecutionLauncher::start(self.backend.as_ref(), session).await?;

        // Fetched at most once, before the channel is live; never polled
        // alongside the stream.
        let initial = match self.backend.get_progress(&response.cycle_id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(
                    "initial progress snapshot unavailable for cycle {}: {}",
                    response.cycle_id,
                    e
                );
                None
            }
        };

        let handle = self.open_stream(&response.cycle_id, initial)?;
        Ok((response, handle))
    }

    /// Open the progress stream for a cycle. At most one live stream per
    /// cycle id.
    pub fn open_stream(
        &self,
        cycle_id: &str,
        initial_stats: Option<ProgressStats>,
    ) -> AppResult<ProgressStreamHandle> {
        if let Some(existing) = self.streams.get(cycle_id) {
            if stream_is_live(existing.value()) {
                return Err(AppError::validation(format!(
                    "a progress stream is already open for cycle {}",
                    cycle_id
                )));
            }
        }

        let ws_url = format!("{}/uat/ws/{}", self.ws_base, cycle_id);
        let handle = ProgressStreamHandle::connect(
            ws_url,
            cycle_id,
            self.stream_config.clone(),
            Some(self.notifications.clone()),
            initial_stats,
        );

        self.streams
            .insert(cycle_id.to_string(), handle.controller());
        Ok(handle)
    }

    /// Cancel the registered stream for a cycle, if any.
    pub fn close_stream(&self, cycle_id: &str) -> bool {
        match self.streams.remove(cycle_id) {
            Some((_, controller)) => {
                controller.shutdown();
                true
            }
            None => false,
        }
    }

    /// Tear down every registered stream (project switch, panel close).
    pub fn shutdown(&self) {
        for entry in self.streams.iter() {
            entry.value().shutdown();
        }
        self.streams.clear();
        tracing::debug!("all progress streams cancelled");
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("ws_base", &self.ws_base)
            .field("open_streams", &self.streams.len())
            .finish()
    }
}
