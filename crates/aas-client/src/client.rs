//! HTTP client for the AAS simulation API.

use aas_core::api::{
    BatchJobRequest, BatchJobResponse, CombinedBillingResponse, ConfigResponse, CoordsResponse,
    CycleStartResponse, CycleStatusResponse, DevicesResponse, DirectJobRequest, DirectJobResponse,
    EnqueueJobResponse, HealthResponse, HistoryClearedResponse, HistoryListResponse, HistoryStats,
    IndividualJobsResponse, QueueChangeResponse, QueueResponse, RunRecord, ScenarioRunResponse,
    ScenarioStartResponse, SuccessResponse, ValidationResponse,
};
use aas_core::{
    AgvBilling, ConfigUpdate, Coords, DeviceKind, EngraverBilling, JobSource, OrderModel,
    PoseModel, QueueJob, StatusModel,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Backend address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// History export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Client for the `/api/v1` contract.
///
/// Cheap to clone; clones share the connection pool. No timeout is set
/// beyond the transport default and nothing is retried.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`
    /// (e.g. `http://localhost:8000`).
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of `segments` below the base URL. Each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn api(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut all = vec!["api", "v1"];
        all.extend_from_slice(segments);
        self.client.request(method, self.endpoint(&all))
    }

    async fn send_bytes(&self, request: RequestBuilder) -> ClientResult<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let err = ClientError::from_response(status, &body);
            debug!(status = status.as_u16(), error = %err, "Backend returned an error");
            return Err(err);
        }
        Ok(body.to_vec())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let body = self.send_bytes(request).await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        self.send(self.api(Method::GET, segments)).await
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        self.send(self.api(Method::POST, segments)).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.api(Method::POST, segments).json(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        self.send(self.api(Method::DELETE, segments)).await
    }

    // ========================================================================
    // Service
    // ========================================================================

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        self.send(self.client.get(self.endpoint(&["health"]))).await
    }

    // ========================================================================
    // Devices and billing
    // ========================================================================

    pub async fn devices(&self) -> ClientResult<DevicesResponse> {
        self.get(&["aas", "devices"]).await
    }

    pub async fn device_status(&self, device: DeviceKind) -> ClientResult<StatusModel> {
        self.get(&["aas", device.as_str(), "operational", "status"]).await
    }

    pub async fn device_order(&self, device: DeviceKind) -> ClientResult<OrderModel> {
        self.get(&["aas", device.as_str(), "operational", "order"]).await
    }

    pub async fn device_pose(&self, device: DeviceKind) -> ClientResult<PoseModel> {
        self.get(&["aas", device.as_str(), "operational", "pose"]).await
    }

    pub async fn engraver_billing(&self) -> ClientResult<EngraverBilling> {
        self.get(&["aas", DeviceKind::Engraver.as_str(), "billing"]).await
    }

    pub async fn agv_billing(&self) -> ClientResult<AgvBilling> {
        self.get(&["aas", DeviceKind::Agv.as_str(), "billing"]).await
    }

    pub async fn combined_billing(&self) -> ClientResult<CombinedBillingResponse> {
        self.get(&["aas", "combined-billing"]).await
    }

    pub async fn individual_jobs(&self, source: Option<JobSource>) -> ClientResult<IndividualJobsResponse> {
        let mut request = self.api(Method::GET, &["aas", "individual-jobs"]);
        if let Some(source) = source {
            request = request.query(&[("source", source.as_str())]);
        }
        self.send(request).await
    }

    pub async fn reset_user_billing(&self) -> ClientResult<SuccessResponse> {
        self.post(&["aas", "reset-user-billing"]).await
    }

    // ========================================================================
    // Queue
    // ========================================================================

    pub async fn queue(&self) -> ClientResult<QueueResponse> {
        self.get(&["queue"]).await
    }

    pub async fn enqueue(&self, job: &QueueJob) -> ClientResult<EnqueueJobResponse> {
        self.post_json(&["queue", "enqueue"], job).await
    }

    pub async fn remove_job(&self, order_no: &str) -> ClientResult<QueueChangeResponse> {
        self.delete(&["queue", order_no]).await
    }

    pub async fn clear_queue(&self) -> ClientResult<QueueChangeResponse> {
        self.delete(&["queue"]).await
    }

    // ========================================================================
    // Cycles
    // ========================================================================

    pub async fn cycle_status(&self) -> ClientResult<CycleStatusResponse> {
        self.get(&["cycle", "status"]).await
    }

    pub async fn run_status(&self, run_id: &str) -> ClientResult<RunRecord> {
        self.get(&["cycle", "status", run_id]).await
    }

    /// Start a cycle. `None` processes every queued job for the site.
    pub async fn run_cycle(&self, site: &str, max_jobs: Option<usize>) -> ClientResult<CycleStartResponse> {
        let max_jobs = max_jobs.map_or_else(|| "all".to_string(), |n| n.to_string());
        let request = self
            .api(Method::POST, &["cycle", "run"])
            .query(&[("site", site), ("maxJobs", max_jobs.as_str())]);
        self.send(request).await
    }

    /// Start predefined scenario `number` (1 or 2) in the background.
    pub async fn start_scenario(&self, number: u8) -> ClientResult<ScenarioStartResponse> {
        self.post(&["cycle", &format!("scenario{number}")]).await
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub async fn config(&self) -> ClientResult<ConfigResponse> {
        self.get(&["config"]).await
    }

    pub async fn update_config(&self, update: &ConfigUpdate) -> ClientResult<ConfigResponse> {
        self.send(self.api(Method::PATCH, &["config"]).json(update)).await
    }

    pub async fn coords(&self) -> ClientResult<Coords> {
        self.get(&["config", "coords"]).await
    }

    pub async fn update_coords(&self, coords: &Coords) -> ClientResult<CoordsResponse> {
        self.send(self.api(Method::PATCH, &["config", "coords"]).json(coords)).await
    }

    pub async fn reset_config(&self) -> ClientResult<ConfigResponse> {
        self.post(&["config", "reset"]).await
    }

    pub async fn config_defaults(&self) -> ClientResult<ConfigResponse> {
        self.get(&["config", "defaults"]).await
    }

    // ========================================================================
    // History
    // ========================================================================

    pub async fn history(&self, limit: Option<usize>) -> ClientResult<HistoryListResponse> {
        let mut request = self.api(Method::GET, &["history"]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        self.send(request).await
    }

    pub async fn run_details(&self, run_id: &str) -> ClientResult<RunRecord> {
        self.get(&["history", run_id]).await
    }

    /// Download the history export as text.
    pub async fn export_history(&self, format: ExportFormat, limit: Option<usize>) -> ClientResult<String> {
        let mut request = self.api(Method::GET, &["history", "export", format.as_str()]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let body = self.send_bytes(request).await?;
        String::from_utf8(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn clear_history(&self) -> ClientResult<HistoryClearedResponse> {
        self.delete(&["history"]).await
    }

    pub async fn history_stats(&self) -> ClientResult<HistoryStats> {
        self.get(&["history", "summary", "stats"]).await
    }

    // ========================================================================
    // Composer
    // ========================================================================

    pub async fn submit_direct(&self, request: &DirectJobRequest) -> ClientResult<DirectJobResponse> {
        self.post_json(&["composer", "direct"], request).await
    }

    pub async fn submit_batch(&self, request: &BatchJobRequest) -> ClientResult<BatchJobResponse> {
        self.post_json(&["composer", "batch"], request).await
    }

    /// Run scenario `number` synchronously through the composer.
    pub async fn composer_scenario(&self, number: u8) -> ClientResult<ScenarioRunResponse> {
        self.post(&["composer", &format!("scenario{number}")]).await
    }

    pub async fn validate_order(&self, order_no: &str) -> ClientResult<ValidationResponse> {
        self.get(&["composer", "validate-order", order_no]).await
    }

    // ========================================================================
    // Event stream
    // ========================================================================

    pub fn events_url(&self) -> Url {
        self.endpoint(&["api", "v1", "events"])
    }

    /// Open the event stream. The response body is consumed incrementally.
    pub async fn open_events(&self) -> ClientResult<reqwest::Response> {
        let response = self
            .client
            .get(self.events_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &body));
        }
        Ok(response)
    }
}
