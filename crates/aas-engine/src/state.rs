//! Shared simulation state.
//!
//! All mutable data sits behind one `parking_lot::RwLock`; lock scopes are
//! short and never held across an `.await`. Cycles are serialised by a
//! separate async mutex (see [`SimulationState::cycle_lock`]). Mutations
//! that affect devices, billing, jobs or history are persisted to the
//! optional [`JsonStateStore`] after the lock is released.

use std::collections::{BTreeMap, VecDeque};

use aas_core::api::{
    BillingSource, CombinedAgvBilling, CombinedBillingResponse, CombinedEngraverBilling,
    CycleStatusResponse, EventCombinedBilling, EventDevices, EventQueue, EventSnapshot,
    HealthDevices, HealthResponse, IndividualJobsResponse, OrchestratorSnapshot, RunRecord,
    RunStatus,
};
use aas_core::billing::{
    round6, BillingTotals, CumulativeBilling, IndividualJob, JobSource, UsageDelta,
};
use aas_core::device::{AgvDevice, Device, DeviceKind, EngraverDevice, OperationMode};
use aas_core::sim_config::{default_coords, ConfigUpdate, Coords, SimConfig};
use aas_core::time::{local_now_iso, now_iso};
use aas_core::QueueJob;
use aas_persistence::{JsonStateStore, PersistedDevices, PersistedState};
use aas_telemetry::Metrics;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::rules::SNAPSHOT_QUEUE_JOBS;

/// Mutable simulation data.
#[derive(Debug, Clone)]
pub struct SimData {
    pub engraver: EngraverDevice,
    pub agv: AgvDevice,
    pub config: SimConfig,
    pub coords: Coords,
    pub queue: VecDeque<QueueJob>,
    /// True while the AGV drives a billed leg.
    pub billing_window_active: bool,
    pub cumulative: CumulativeBilling,
    pub individual_jobs: Vec<IndividualJob>,
    pub history: BTreeMap<String, RunRecord>,
}

impl SimData {
    fn fresh(config: &SimConfig, coords: &Coords) -> Self {
        Self {
            engraver: EngraverDevice::new(config),
            agv: AgvDevice::new(config),
            config: config.clone(),
            coords: coords.clone(),
            queue: VecDeque::new(),
            billing_window_active: false,
            cumulative: CumulativeBilling::default(),
            individual_jobs: Vec::new(),
            history: BTreeMap::new(),
        }
    }

    /// Copy billing rates from the configuration into the device submodels.
    fn refresh_device_rates(&mut self) {
        let eng = &mut self.engraver.usage_billing;
        eng.emission_factor = self.config.engraver.emission_factor_g_per_kwh;
        eng.cost_per_energy_unit = self.config.engraver.cost_per_energy_unit_eur_per_kwh;
        self.agv.usage_billing.cost_per_meter = self.config.agv.cost_per_meter_eur;
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            devices: Some(PersistedDevices {
                engraver: self.engraver.clone(),
                agv: self.agv.clone(),
            }),
            billing: Some(self.cumulative.clone()),
            jobs: self.individual_jobs.clone(),
            history: self.history.clone(),
        }
    }

    pub fn site_coords(&self, site: &str) -> EngineResult<(f64, f64)> {
        self.coords
            .get(site)
            .copied()
            .ok_or_else(|| EngineError::InvalidSite {
                site: site.to_string(),
                available: self.coords.keys().cloned().collect(),
            })
    }
}

/// Process-wide simulation state, shared as `Arc<SimulationState>`.
pub struct SimulationState {
    data: RwLock<SimData>,
    cycle_lock: tokio::sync::Mutex<()>,
    store: Option<JsonStateStore>,
    default_config: SimConfig,
    default_coords: Coords,
}

impl std::fmt::Debug for SimulationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationState")
            .field("store", &self.store.as_ref().map(|s| s.path().to_path_buf()))
            .finish_non_exhaustive()
    }
}

impl SimulationState {
    /// Build the state from `store` (if any), falling back to fresh devices
    /// configured with `config` and `coords`.
    pub fn new(config: SimConfig, coords: Coords, store: Option<JsonStateStore>) -> Self {
        let mut data = SimData::fresh(&config, &coords);
        let persisted = store.as_ref().map(|s| s.load()).unwrap_or_default();
        let was_empty = persisted.is_empty();

        if let Some(devices) = persisted.devices {
            data.engraver = devices.engraver;
            data.agv = devices.agv;
            // A cycle cannot survive a restart.
            for status in [
                &mut data.engraver.operational_data.status,
                &mut data.agv.operational_data.status,
            ] {
                if status.operation_mode == OperationMode::Running {
                    status.operation_mode = OperationMode::Idle;
                }
            }
        }
        if let Some(billing) = persisted.billing {
            data.cumulative = billing;
        }
        data.individual_jobs = persisted.jobs;
        data.history = persisted.history;
        for run in data.history.values_mut() {
            if run.status == RunStatus::Running {
                run.fail(RunStatus::Error, "Interrupted by restart");
            }
        }
        data.refresh_device_rates();

        let state = Self {
            data: RwLock::new(data),
            cycle_lock: tokio::sync::Mutex::new(()),
            store,
            default_config: config,
            default_coords: coords,
        };
        if was_empty {
            state.persist();
        }
        state
    }

    /// State with default configuration and no persistence.
    pub fn in_memory() -> Self {
        Self::new(SimConfig::default(), default_coords(), None)
    }

    /// Lock serialising all cycle runs.
    pub fn cycle_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.cycle_lock
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SimData) -> R) -> R {
        f(&self.data.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut SimData) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Write the current state to the store. Failures are logged only.
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_with(|| self.data.read().snapshot()) {
            warn!(error = %e, path = %store.path().display(), "Failed to persist simulation state");
        }
    }

    /// Clone of the whole data set.
    pub fn data(&self) -> SimData {
        self.data.read().clone()
    }

    // ---------------------------------------------------------------------
    // Devices
    // ---------------------------------------------------------------------

    pub fn device(&self, kind: DeviceKind) -> Device {
        self.read(|d| match kind {
            DeviceKind::Engraver => Device::Engraver(d.engraver.clone()),
            DeviceKind::Agv => Device::Agv(d.agv.clone()),
        })
    }

    pub fn engraver(&self) -> EngraverDevice {
        self.read(|d| d.engraver.clone())
    }

    pub fn agv(&self) -> AgvDevice {
        self.read(|d| d.agv.clone())
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    pub fn config(&self) -> SimConfig {
        self.read(|d| d.config.clone())
    }

    pub fn coords(&self) -> Coords {
        self.read(|d| d.coords.clone())
    }

    pub fn default_config(&self) -> &SimConfig {
        &self.default_config
    }

    pub fn default_coords(&self) -> &Coords {
        &self.default_coords
    }

    /// Apply a partial update and refresh device billing rates.
    pub fn update_config(&self, update: &ConfigUpdate) -> EngineResult<SimConfig> {
        let config = self.write(|d| {
            let mut candidate = d.config.clone();
            candidate.apply(update);
            validate_config(&candidate)?;
            d.config = candidate;
            d.refresh_device_rates();
            Ok::<_, EngineError>(d.config.clone())
        })?;
        info!(currency = %config.currency, "Configuration updated");
        self.persist();
        Ok(config)
    }

    /// Set named coordinates. Entries that are not `[x, y]` number pairs are
    /// ignored.
    pub fn update_coords(&self, updates: &serde_json::Map<String, Value>) -> Coords {
        let accepted: Vec<(String, (f64, f64))> = updates
            .iter()
            .filter_map(|(name, value)| match value.as_array().map(Vec::as_slice) {
                Some([x, y]) => Some((name.clone(), (x.as_f64()?, y.as_f64()?))),
                _ => None,
            })
            .collect();

        self.write(|d| {
            d.coords.extend(accepted);
            d.coords.clone()
        })
    }

    /// Restore the startup configuration and coordinates.
    pub fn reset_config(&self) -> (SimConfig, Coords) {
        let result = self.write(|d| {
            d.config = self.default_config.clone();
            d.coords = self.default_coords.clone();
            d.refresh_device_rates();
            (d.config.clone(), d.coords.clone())
        });
        self.persist();
        result
    }

    /// Reset everything: configuration, devices, queue, billing, history.
    pub fn reset_to_defaults(&self) {
        self.write(|d| *d = SimData::fresh(&self.default_config, &self.default_coords));
        Metrics::queue_length(0);
        info!("Simulation state reset to defaults");
        self.persist();
    }

    // ---------------------------------------------------------------------
    // Queue
    // ---------------------------------------------------------------------

    /// Append a job. Returns the new queue length.
    pub fn enqueue(&self, job: QueueJob) -> EngineResult<usize> {
        let len = self.write(|d| {
            d.site_coords(&job.site)?;
            d.queue.push_back(job);
            Ok::<_, EngineError>(d.queue.len())
        })?;
        Metrics::queue_length(len);
        Ok(len)
    }

    pub fn queue_jobs(&self) -> Vec<QueueJob> {
        self.read(|d| d.queue.iter().cloned().collect())
    }

    pub fn queue_len(&self) -> usize {
        self.read(|d| d.queue.len())
    }

    /// Remove the first job with `order_no`. Returns the new queue length.
    pub fn remove_job(&self, order_no: &str) -> EngineResult<usize> {
        let len = self.write(|d| {
            let pos = d
                .queue
                .iter()
                .position(|j| j.order_no == order_no)
                .ok_or_else(|| EngineError::JobNotFound(order_no.to_string()))?;
            d.queue.remove(pos);
            Ok::<_, EngineError>(d.queue.len())
        })?;
        Metrics::queue_length(len);
        Ok(len)
    }

    /// Drop every queued job. Returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        let cleared = self.write(|d| {
            let n = d.queue.len();
            d.queue.clear();
            n
        });
        Metrics::queue_length(0);
        cleared
    }

    // ---------------------------------------------------------------------
    // Status views
    // ---------------------------------------------------------------------

    pub fn cycle_status(&self) -> CycleStatusResponse {
        self.read(|d| CycleStatusResponse {
            engraver_mode: d.engraver.status().operation_mode,
            agv_mode: d.agv.status().operation_mode,
            engraver_progress: d.engraver.status().production_progress,
            agv_progress: d.agv.status().production_progress,
            queue_length: d.queue.len(),
            billing_window_active: d.billing_window_active,
            agv_pose: *d.agv.pose(),
        })
    }

    pub fn health(&self) -> HealthResponse {
        self.read(|d| HealthResponse {
            status: "healthy".to_string(),
            timestamp: now_iso(),
            devices: HealthDevices {
                engraver: d.engraver.status().operation_mode,
                agv: d.agv.status().operation_mode,
            },
            queue_length: d.queue.len(),
        })
    }

    /// Payload pushed on the event stream.
    pub fn event_snapshot(&self) -> EventSnapshot {
        self.read(|d| {
            let engraver_cost = d.engraver.usage_billing.usage_cost;
            let agv_cost = d.agv.usage_billing.usage_cost;
            EventSnapshot {
                timestamp: local_now_iso(),
                devices: EventDevices {
                    engraver: (&d.engraver).into(),
                    agv: (&d.agv).into(),
                },
                queue: EventQueue {
                    length: d.queue.len(),
                    jobs: d.queue.iter().take(SNAPSHOT_QUEUE_JOBS).cloned().collect(),
                },
                orchestrator: OrchestratorSnapshot {
                    billing_window_active: d.billing_window_active,
                },
                combined_billing: EventCombinedBilling {
                    engraver_cost,
                    agv_cost,
                    total_cost: round6(engraver_cost + agv_cost),
                },
            }
        })
    }

    // ---------------------------------------------------------------------
    // Run history
    // ---------------------------------------------------------------------

    /// Record a new run and return it as stored. An id already taken gets a
    /// `_2`, `_3`, ... suffix so an earlier run is never replaced.
    pub fn add_run(&self, mut run: RunRecord) -> RunRecord {
        let stored = self.write(|d| {
            if d.history.contains_key(&run.run_id) {
                let base = run.run_id.clone();
                let mut n = 2;
                while d.history.contains_key(&format!("{base}_{n}")) {
                    n += 1;
                }
                run.run_id = format!("{base}_{n}");
            }
            d.history.insert(run.run_id.clone(), run.clone());
            run
        });
        self.persist();
        stored
    }

    /// Replace an existing run. Unknown ids are ignored.
    pub fn update_run(&self, run: RunRecord) {
        let updated = self.write(|d| match d.history.get_mut(&run.run_id) {
            Some(existing) => {
                *existing = run;
                true
            }
            None => false,
        });
        if updated {
            self.persist();
        }
    }

    pub fn run(&self, run_id: &str) -> EngineResult<RunRecord> {
        self.read(|d| d.history.get(run_id).cloned())
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.read(|d| d.history.values().cloned().collect())
    }

    pub fn run_count(&self) -> usize {
        self.read(|d| d.history.len())
    }

    /// Drop all runs. Returns how many were removed.
    pub fn clear_history(&self) -> usize {
        let cleared = self.write(|d| {
            let n = d.history.len();
            d.history.clear();
            n
        });
        self.persist();
        cleared
    }

    // ---------------------------------------------------------------------
    // Billing
    // ---------------------------------------------------------------------

    pub fn update_cumulative_billing(&self, source: JobSource, usage: &UsageDelta, jobs: &[String]) {
        self.write(|d| d.cumulative.record(source, usage, jobs));
        self.persist();
    }

    pub fn cumulative_billing(&self) -> CumulativeBilling {
        self.read(|d| d.cumulative.clone())
    }

    /// Billing view for the dashboard: user jobs if any, else scenario
    /// jobs, else the devices' current cycle.
    pub fn combined_billing(&self) -> CombinedBillingResponse {
        self.read(|d| {
            let currency = d.config.currency.clone();
            if !d.cumulative.user_jobs.is_empty() {
                bucket_view(&d.cumulative.user_jobs, "USER-JOBS", BillingSource::UserJobs, currency)
            } else if !d.cumulative.scenario_jobs.is_empty() {
                bucket_view(
                    &d.cumulative.scenario_jobs,
                    "SCENARIO-JOBS",
                    BillingSource::ScenarioJobs,
                    currency,
                )
            } else {
                let eng = &d.engraver.usage_billing;
                let agv = &d.agv.usage_billing;
                CombinedBillingResponse {
                    engraver: CombinedEngraverBilling {
                        order_ref: eng.order_ref.clone(),
                        energy_kwh: eng.energy_consumed,
                        co2_g: eng.carbon_emissions,
                        cost_eur: eng.usage_cost,
                    },
                    agv: CombinedAgvBilling {
                        distance_m: agv.distance_traveled,
                        cost_eur: agv.usage_cost,
                        order_ref: agv.order_ref.clone(),
                    },
                    combined_cost_eur: round6(eng.usage_cost + agv.usage_cost),
                    currency,
                    billing_source: BillingSource::CurrentCycle,
                    jobs_processed: Vec::new(),
                    last_updated: None,
                }
            }
        })
    }

    /// Zero both billing buckets, drop individual jobs and clear device
    /// usage. Idempotent.
    pub fn reset_user_billing(&self) {
        self.write(|d| {
            d.cumulative = CumulativeBilling::default();
            d.individual_jobs.clear();
            d.engraver.usage_billing.clear_usage();
            d.agv.usage_billing.clear_usage();
        });
        info!("User billing reset");
        self.persist();
    }

    pub fn add_individual_job(&self, job: IndividualJob) {
        self.write(|d| d.individual_jobs.push(job));
        self.persist();
    }

    pub(crate) fn add_individual_jobs(&self, jobs: Vec<IndividualJob>) {
        if jobs.is_empty() {
            return;
        }
        self.write(|d| d.individual_jobs.extend(jobs));
        self.persist();
    }

    pub fn individual_jobs(&self, source: Option<JobSource>) -> Vec<IndividualJob> {
        self.read(|d| {
            d.individual_jobs
                .iter()
                .filter(|j| source.map_or(true, |s| j.source == s))
                .cloned()
                .collect()
        })
    }

    pub fn individual_jobs_report(&self, source: Option<JobSource>) -> IndividualJobsResponse {
        IndividualJobsResponse::from_jobs(self.individual_jobs(source))
    }
}

fn bucket_view(
    totals: &BillingTotals,
    label: &str,
    source: BillingSource,
    currency: String,
) -> CombinedBillingResponse {
    let order_ref = Some(format!("{} ({} jobs)", label, totals.jobs_processed.len()));
    CombinedBillingResponse {
        engraver: CombinedEngraverBilling {
            order_ref: order_ref.clone(),
            energy_kwh: round6(totals.engraver_energy_kwh),
            co2_g: round6(totals.engraver_co2_g),
            cost_eur: round6(totals.engraver_cost_eur),
        },
        agv: CombinedAgvBilling {
            distance_m: round6(totals.agv_distance_m),
            cost_eur: round6(totals.agv_cost_eur),
            order_ref,
        },
        combined_cost_eur: round6(totals.total_cost_eur),
        currency,
        billing_source: source,
        jobs_processed: totals.jobs_processed.clone(),
        last_updated: Some(totals.last_updated.clone()),
    }
}

/// Reject values that would stall or invert the simulation.
fn validate_config(config: &SimConfig) -> EngineResult<()> {
    if !(1..=100).contains(&config.progress_step) {
        return Err(EngineError::InvalidConfig(
            "progress_step must be between 1 and 100".to_string(),
        ));
    }
    if !(config.agv.speed_m_per_s > 0.0) {
        return Err(EngineError::InvalidConfig(
            "agv.speed_m_per_s must be positive".to_string(),
        ));
    }
    let non_negative = [
        ("engraver.seconds_per_letter", config.engraver.seconds_per_letter),
        ("engraver.baseIdle_kWh", config.engraver.base_idle_kwh),
        (
            "engraver.k_laser_kWh_per_sec_at_power1",
            config.engraver.k_laser_kwh_per_sec_at_power1,
        ),
        (
            "engraver.emissionFactor_g_per_kWh",
            config.engraver.emission_factor_g_per_kwh,
        ),
        (
            "engraver.costPerEnergyUnit_EUR_per_kWh",
            config.engraver.cost_per_energy_unit_eur_per_kwh,
        ),
        ("agv.costPerMeter_EUR", config.agv.cost_per_meter_eur),
    ];
    if let Some((name, _)) = non_negative.iter().find(|(_, v)| !(*v >= 0.0)) {
        return Err(EngineError::InvalidConfig(format!("{name} must not be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_core::billing::JobDetails;
    use aas_core::sim_config::AgvConfigUpdate;
    use tempfile::TempDir;

    fn individual(order_no: &str, source: JobSource) -> IndividualJob {
        IndividualJob {
            details: JobDetails {
                order_no: order_no.to_string(),
                laser_text: "HELLO".to_string(),
                letters: 5,
                energy_kwh: 0.025,
                co2_g: 9.0,
                cost_eur: 0.01,
                completed_at: now_iso(),
            },
            source,
            site: None,
            run_id: None,
            agv_distance_share: 7.0,
            agv_cost_share: 0.14,
            timestamp: now_iso(),
        }
    }

    fn usage() -> UsageDelta {
        UsageDelta {
            engraver_energy_kwh: 10.0,
            engraver_co2_g: 100.0,
            engraver_cost_eur: 5.0,
            agv_distance_m: 100.0,
            agv_cost_eur: 10.0,
        }
    }

    #[test]
    fn test_update_config_refreshes_device_rates() {
        let state = SimulationState::in_memory();
        let update = ConfigUpdate {
            agv: Some(AgvConfigUpdate {
                cost_per_meter_eur: Some(0.1),
                speed_m_per_s: None,
            }),
            ..ConfigUpdate::default()
        };

        let config = state.update_config(&update).unwrap();
        assert_eq!(config.agv.cost_per_meter_eur, 0.1);
        assert_eq!(state.agv().usage_billing.cost_per_meter, 0.1);
    }

    #[test]
    fn test_update_config_rejects_stalling_values() {
        let state = SimulationState::in_memory();
        let update = ConfigUpdate {
            progress_step: Some(0),
            ..ConfigUpdate::default()
        };
        assert!(matches!(
            state.update_config(&update),
            Err(EngineError::InvalidConfig(_))
        ));
        assert_eq!(state.config().progress_step, 5);
    }

    #[test]
    fn test_concurrent_config_updates_are_not_lost() {
        let state = SimulationState::in_memory();
        let last = 199;

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..=last {
                    let update = ConfigUpdate {
                        agv: Some(AgvConfigUpdate {
                            cost_per_meter_eur: Some(0.01 + f64::from(i) * 0.001),
                            speed_m_per_s: None,
                        }),
                        ..ConfigUpdate::default()
                    };
                    state.update_config(&update).unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..=last {
                    let update = ConfigUpdate {
                        agv: Some(AgvConfigUpdate {
                            cost_per_meter_eur: None,
                            speed_m_per_s: Some(0.5 + f64::from(i) * 0.01),
                        }),
                        ..ConfigUpdate::default()
                    };
                    state.update_config(&update).unwrap();
                }
            });
        });

        let config = state.config();
        assert_eq!(config.agv.cost_per_meter_eur, 0.01 + f64::from(last) * 0.001);
        assert_eq!(config.agv.speed_m_per_s, 0.5 + f64::from(last) * 0.01);
    }

    #[test]
    fn test_update_coords_accepts_pairs_only() {
        let state = SimulationState::in_memory();
        let updates = serde_json::json!({
            "JOB_POS1": [1.0, 2.0],
            "JOB_POS3": [20, 4],
            "BROKEN": [1.0],
            "WORSE": "north",
        });

        let coords = state.update_coords(updates.as_object().unwrap());
        assert_eq!(coords["JOB_POS1"], (1.0, 2.0));
        assert_eq!(coords["JOB_POS3"], (20.0, 4.0));
        assert!(!coords.contains_key("BROKEN"));
        assert!(!coords.contains_key("WORSE"));
    }

    #[test]
    fn test_reset_config_restores_startup_values() {
        let state = SimulationState::in_memory();
        state
            .update_config(&ConfigUpdate {
                progress_step: Some(50),
                ..ConfigUpdate::default()
            })
            .unwrap();
        let (config, coords) = state.reset_config();
        assert_eq!(config, SimConfig::default());
        assert_eq!(coords, default_coords());
    }

    #[test]
    fn test_queue_operations() {
        let state = SimulationState::in_memory();
        assert_eq!(state.enqueue(QueueJob::new("E-1", "A", "JOB_POS1")).unwrap(), 1);
        assert_eq!(state.enqueue(QueueJob::new("E-2", "B", "JOB_POS2")).unwrap(), 2);
        assert!(matches!(
            state.enqueue(QueueJob::new("E-3", "C", "NOWHERE")),
            Err(EngineError::InvalidSite { .. })
        ));

        assert_eq!(state.remove_job("E-1").unwrap(), 1);
        assert!(matches!(
            state.remove_job("E-1"),
            Err(EngineError::JobNotFound(_))
        ));
        assert_eq!(state.clear_queue(), 1);
        assert_eq!(state.queue_len(), 0);
    }

    #[test]
    fn test_combined_billing_priority() {
        let state = SimulationState::in_memory();
        assert_eq!(
            state.combined_billing().billing_source,
            BillingSource::CurrentCycle
        );

        state.update_cumulative_billing(JobSource::Scenario, &usage(), &["E-1001".into()]);
        let view = state.combined_billing();
        assert_eq!(view.billing_source, BillingSource::ScenarioJobs);
        assert_eq!(view.engraver.order_ref.as_deref(), Some("SCENARIO-JOBS (1 jobs)"));

        state.update_cumulative_billing(JobSource::Direct, &usage(), &["D-1".into(), "D-2".into()]);
        let view = state.combined_billing();
        assert_eq!(view.billing_source, BillingSource::UserJobs);
        assert_eq!(view.agv.order_ref.as_deref(), Some("USER-JOBS (2 jobs)"));
        assert_eq!(view.combined_cost_eur, 15.0);
        assert_eq!(view.currency, "EUR");
    }

    #[test]
    fn test_reset_user_billing_is_idempotent() {
        let state = SimulationState::in_memory();
        state.update_cumulative_billing(JobSource::Batch, &usage(), &["B-1".into()]);
        state.add_individual_job(individual("B-1", JobSource::Batch));
        state.write(|d| {
            d.engraver.usage_billing.energy_consumed = 1.0;
            d.agv.usage_billing.distance_traveled = 5.0;
        });

        state.reset_user_billing();
        let first = state.cumulative_billing();
        state.reset_user_billing();
        let second = state.cumulative_billing();

        assert_eq!(first.user_jobs.total_cost_eur, 0.0);
        assert_eq!(first.user_jobs.jobs_processed, second.user_jobs.jobs_processed);
        assert_eq!(second.scenario_jobs.total_cost_eur, 0.0);
        assert!(state.individual_jobs(None).is_empty());
        assert_eq!(state.engraver().usage_billing.energy_consumed, 0.0);
        assert_eq!(state.agv().usage_billing.distance_traveled, 0.0);
    }

    #[test]
    fn test_individual_jobs_filter_and_report() {
        let state = SimulationState::in_memory();
        state.add_individual_job(individual("D-1", JobSource::Direct));
        state.add_individual_job(individual("E-1001", JobSource::Scenario));

        assert_eq!(state.individual_jobs(Some(JobSource::Direct)).len(), 1);
        let report = state.individual_jobs_report(None);
        assert_eq!(report.summary.total_jobs, 2);
        assert_eq!(report.summary.total_letters, 10);
        assert_eq!(report.summary.grand_total_eur, 0.3);
        assert!(report.last_updated.is_some());
    }

    #[test]
    fn test_event_snapshot_limits_queue() {
        let state = SimulationState::in_memory();
        for i in 0..12 {
            state
                .enqueue(QueueJob::new(format!("E-{i:04}"), "X", "JOB_POS1"))
                .unwrap();
        }
        let snapshot = state.event_snapshot();
        assert_eq!(snapshot.queue.length, 12);
        assert_eq!(snapshot.queue.jobs.len(), SNAPSHOT_QUEUE_JOBS);
        assert!(!snapshot.orchestrator.billing_window_active);
    }

    #[test]
    fn test_history_crud() {
        let state = SimulationState::in_memory();
        let mut run = RunRecord::started("run_1", "JOB_POS1", SimConfig::default());
        state.add_run(run.clone());

        run.fail(RunStatus::NoJobs, "No jobs found for site");
        state.update_run(run);
        assert_eq!(state.run("run_1").unwrap().status, RunStatus::NoJobs);

        state.update_run(RunRecord::started("ghost", "JOB_POS1", SimConfig::default()));
        assert!(state.run("ghost").is_err());

        assert_eq!(state.clear_history(), 1);
        assert_eq!(state.run_count(), 0);
    }

    #[test]
    fn test_duplicate_run_id_gets_suffix() {
        let state = SimulationState::in_memory();
        let run = || RunRecord::started("run_x", "JOB_POS1", SimConfig::default());

        assert_eq!(state.add_run(run()).run_id, "run_x");
        assert_eq!(state.add_run(run()).run_id, "run_x_2");
        assert_eq!(state.add_run(run()).run_id, "run_x_3");
        assert_eq!(state.run_count(), 3);
        assert!(state.run("run_x").is_ok());
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("simulation_state.json");

        {
            let state = SimulationState::new(
                SimConfig::default(),
                default_coords(),
                Some(JsonStateStore::new(&path)),
            );
            state.update_cumulative_billing(JobSource::Direct, &usage(), &["JOB-1".into()]);
            state.add_run(RunRecord::started("run_a", "JOB_POS1", SimConfig::default()));
            state.write(|d| d.engraver.operational_data.status.production_progress = 50);
            state.persist();
        }

        let state = SimulationState::new(
            SimConfig::default(),
            default_coords(),
            Some(JsonStateStore::new(&path)),
        );
        let billing = state.cumulative_billing();
        assert_eq!(billing.user_jobs.total_cost_eur, 15.0);
        assert!(billing.user_jobs.jobs_processed.contains(&"JOB-1".to_string()));
        assert_eq!(state.engraver().status().production_progress, 50);

        let run = state.run("run_a").unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error.as_deref(), Some("Interrupted by restart"));
    }

    #[test]
    fn test_fresh_store_is_written_on_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let _state =
            SimulationState::new(SimConfig::default(), default_coords(), Some(JsonStateStore::new(&path)));
        assert!(path.exists());
    }
}
