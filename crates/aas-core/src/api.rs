//! Request and response bodies of the `/api/v1` HTTP contract.
//!
//! Shared by the server and the client. Response types consumed by the
//! dashboard default every missing field so a partial payload still renders.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::billing::{round6, IndividualJob, IndividualJobsSummary, JobDetails, JobSource, UsageDelta};
use crate::device::{
    AgvBilling, AgvDevice, EngraverBilling, EngraverDevice, OperationMode, OrderModel, PoseModel,
    StatusModel,
};
use crate::orders::QueueJob;
use crate::sim_config::{Coords, SimConfig};
use crate::validation::ComposerSite;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body. The server always sets `detail`; `message` carries the
/// underlying cause on internal errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// `detail`, then `message`, if either is a non-empty string.
    pub fn best_message(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectJobRequest {
    pub laser_text: String,
    #[serde(default)]
    pub site: ComposerSite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobItem {
    pub laser_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJobRequest {
    pub jobs: Vec<BatchJobItem>,
    #[serde(default)]
    pub site: ComposerSite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectJobResponse {
    pub success: bool,
    pub message: String,
    pub run_id: String,
    pub order_no: String,
    pub site: String,
    #[serde(rename = "tracking_url")]
    pub tracking_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchJobResponse {
    pub success: bool,
    pub message: String,
    pub run_id: String,
    pub order_numbers: Vec<String>,
    pub site: String,
    pub job_count: usize,
    #[serde(rename = "tracking_url")]
    pub tracking_url: String,
}

/// Result of a synchronous composer scenario run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioRunResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CycleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CycleSummary>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationResponse {
    pub order_no: String,
    pub valid: bool,
    pub format: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Body of `POST /queue/enqueue`.
pub type EnqueueJobRequest = QueueJob;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnqueueJobResponse {
    pub message: String,
    pub order_no: String,
    pub site: String,
    pub queue_length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueResponse {
    pub queue: Vec<QueueJob>,
    pub length: usize,
}

/// Response of queue removals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueChangeResponse {
    pub message: String,
    pub queue_length: usize,
}

// ---------------------------------------------------------------------------
// Cycles and runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleStatusResponse {
    pub engraver_mode: OperationMode,
    pub agv_mode: OperationMode,
    pub engraver_progress: u8,
    pub agv_progress: u8,
    pub queue_length: usize,
    pub billing_window_active: bool,
    pub agv_pose: PoseModel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycleStartResponse {
    pub message: String,
    pub run_id: String,
    pub site: String,
    pub estimated_jobs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioStartResponse {
    pub message: String,
    pub run_id: String,
    pub expected_jobs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_cycles: Option<usize>,
}

/// How a composer run processed its jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Individual,
    Batch,
}

/// Outcome of one or more AGV round trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycleSummary {
    pub site: String,
    pub jobs_processed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub individual_jobs: Vec<JobDetails>,
    pub agv_billed_meters: f64,
    #[serde(rename = "agvCostEUR")]
    pub agv_cost_eur: f64,
    #[serde(rename = "engraverEnergyKWh")]
    pub engraver_energy_kwh: f64,
    #[serde(rename = "engraverCO2g")]
    pub engraver_co2_g: f64,
    #[serde(rename = "engraverCostEUR")]
    pub engraver_cost_eur: f64,
    #[serde(rename = "combinedCostEUR")]
    pub combined_cost_eur: f64,
    pub order_ref: String,
    pub started_at: String,
    pub ended_at: String,
    /// Per-cycle summaries of a multi-site run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<CycleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<JobSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CycleSummary {
    /// Merge consecutive cycles into one summary that keeps them under `cycles`.
    pub fn combine(site: &str, order_ref: &str, cycles: Vec<CycleSummary>) -> Self {
        let mut combined = Self {
            site: site.to_string(),
            order_ref: order_ref.to_string(),
            started_at: cycles.first().map(|c| c.started_at.clone()).unwrap_or_default(),
            ended_at: cycles.last().map(|c| c.ended_at.clone()).unwrap_or_default(),
            ..Self::default()
        };
        for cycle in &cycles {
            combined.jobs_processed.extend(cycle.jobs_processed.iter().cloned());
            combined.agv_billed_meters += cycle.agv_billed_meters;
            combined.agv_cost_eur += cycle.agv_cost_eur;
            combined.engraver_energy_kwh += cycle.engraver_energy_kwh;
            combined.engraver_co2_g += cycle.engraver_co2_g;
            combined.engraver_cost_eur += cycle.engraver_cost_eur;
            combined.combined_cost_eur += cycle.combined_cost_eur;
        }
        combined.agv_billed_meters = round6(combined.agv_billed_meters);
        combined.agv_cost_eur = round6(combined.agv_cost_eur);
        combined.engraver_energy_kwh = round6(combined.engraver_energy_kwh);
        combined.engraver_co2_g = round6(combined.engraver_co2_g);
        combined.engraver_cost_eur = round6(combined.engraver_cost_eur);
        combined.combined_cost_eur = round6(combined.combined_cost_eur);
        combined.cycles = cycles;
        combined
    }

    pub fn usage(&self) -> UsageDelta {
        UsageDelta {
            engraver_energy_kwh: self.engraver_energy_kwh,
            engraver_co2_g: self.engraver_co2_g,
            engraver_cost_eur: self.engraver_cost_eur,
            agv_distance_m: self.agv_billed_meters,
            agv_cost_eur: self.agv_cost_eur,
        }
    }

    /// Equal split of the AGV trip over the jobs of this cycle.
    pub fn agv_shares(&self) -> (f64, f64) {
        if self.individual_jobs.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.individual_jobs.len() as f64;
        (
            round6(self.agv_billed_meters / n),
            round6(self.agv_cost_eur / n),
        )
    }
}

/// Lifecycle of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Error,
    NoJobs,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::NoJobs => "no_jobs",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of the run history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub site: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub status: RunStatus,
    pub jobs_processed: Vec<String>,
    pub cycle_summary: Option<CycleSummary>,
    pub config_snapshot: SimConfig,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<JobSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
}

impl RunRecord {
    pub fn started(run_id: impl Into<String>, site: impl Into<String>, config: SimConfig) -> Self {
        Self {
            run_id: run_id.into(),
            site: site.into(),
            started_at: crate::time::local_now_iso(),
            config_snapshot: config,
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, source: JobSource, mode: RunMode) -> Self {
        self.source = Some(source);
        self.mode = Some(mode);
        self
    }

    pub fn complete(&mut self, summary: CycleSummary) {
        self.status = RunStatus::Completed;
        self.ended_at = Some(summary.ended_at.clone());
        self.jobs_processed = summary.jobs_processed.clone();
        self.cycle_summary = Some(summary);
    }

    pub fn fail(&mut self, status: RunStatus, error: impl Into<String>) {
        self.status = status;
        self.ended_at = Some(crate::time::local_now_iso());
        self.error = Some(error.into());
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryListResponse {
    pub history: Vec<RunRecord>,
    pub total: usize,
    pub showing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_runs: usize,
    pub completed_runs: usize,
    pub error_runs: usize,
    pub total_jobs: usize,
    #[serde(rename = "totalEnergyKWh")]
    pub total_energy_kwh: f64,
    #[serde(rename = "totalCO2g")]
    pub total_co2_g: f64,
    #[serde(rename = "totalCostEUR")]
    pub total_cost_eur: f64,
    pub avg_cost_per_run: f64,
}

/// Document returned by the JSON history export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryExport {
    pub export_time: String,
    pub total_runs: usize,
    pub exported_runs: usize,
    pub history: Vec<RunRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryClearedResponse {
    pub message: String,
    pub total_runs: usize,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub coords: Coords,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordsResponse {
    pub message: String,
    pub coords: Coords,
}

// ---------------------------------------------------------------------------
// Devices and billing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub engraver: EngraverDevice,
    pub agv: AgvDevice,
}

/// Which aggregate a combined billing view was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingSource {
    UserJobs,
    ScenarioJobs,
    #[default]
    CurrentCycle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedEngraverBilling {
    #[serde(rename = "orderRef")]
    pub order_ref: Option<String>,
    #[serde(rename = "energy_kWh")]
    pub energy_kwh: f64,
    pub co2_g: f64,
    pub cost_eur: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedAgvBilling {
    pub distance_m: f64,
    pub cost_eur: f64,
    #[serde(rename = "orderRef")]
    pub order_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedBillingResponse {
    pub engraver: CombinedEngraverBilling,
    pub agv: CombinedAgvBilling,
    pub combined_cost_eur: f64,
    pub currency: String,
    pub billing_source: BillingSource,
    pub jobs_processed: Vec<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualJobsResponse {
    pub jobs: Vec<IndividualJob>,
    pub summary: IndividualJobsSummary,
    pub last_updated: Option<String>,
}

impl IndividualJobsResponse {
    pub fn from_jobs(jobs: Vec<IndividualJob>) -> Self {
        Self {
            summary: IndividualJobsSummary::from_jobs(&jobs),
            last_updated: jobs.last().map(|j| j.timestamp.clone()),
            jobs,
        }
    }
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthDevices {
    pub engraver: OperationMode,
    pub agv: OperationMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub devices: HealthDevices,
    pub queue_length: usize,
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

/// One device as pushed over the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSnapshot<B> {
    pub status: StatusModel,
    pub order: OrderModel,
    pub pose: PoseModel,
    pub billing: B,
}

impl From<&EngraverDevice> for DeviceSnapshot<EngraverBilling> {
    fn from(device: &EngraverDevice) -> Self {
        Self {
            status: device.operational_data.status.clone(),
            order: device.operational_data.order.clone(),
            pose: device.operational_data.pose,
            billing: device.usage_billing.clone(),
        }
    }
}

impl From<&AgvDevice> for DeviceSnapshot<AgvBilling> {
    fn from(device: &AgvDevice) -> Self {
        Self {
            status: device.operational_data.status.clone(),
            order: device.operational_data.order.clone(),
            pose: device.operational_data.pose,
            billing: device.usage_billing.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDevices {
    pub engraver: DeviceSnapshot<EngraverBilling>,
    pub agv: DeviceSnapshot<AgvBilling>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQueue {
    pub length: usize,
    /// First jobs of the queue only.
    pub jobs: Vec<QueueJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSnapshot {
    pub billing_window_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCombinedBilling {
    pub engraver_cost: f64,
    pub agv_cost: f64,
    pub total_cost: f64,
}

/// Payload of one `data:` line on `/api/v1/events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSnapshot {
    pub timestamp: String,
    pub devices: EventDevices,
    pub queue: EventQueue,
    pub orchestrator: OrchestratorSnapshot,
    pub combined_billing: EventCombinedBilling,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsTestResponse {
    pub message: String,
    pub endpoint: String,
    pub timestamp: String,
}
