//! Run manager: background cycles, composer submissions and scenarios.
//!
//! Every run is recorded in the history before its task is spawned, so the
//! returned `runId` can be polled immediately. Tasks serialise on the cycle
//! lock and update the record when they finish.

use std::sync::Arc;

use aas_core::api::{
    BatchJobRequest, BatchJobResponse, CycleStartResponse, CycleSummary, DirectJobRequest,
    DirectJobResponse, RunMode, RunRecord, RunStatus, ScenarioRunResponse, ScenarioStartResponse,
};
use aas_core::billing::{IndividualJob, JobSource};
use aas_core::orders::{batch_order_number, generate_order_number};
use aas_core::time::{local_stamp, now_iso};
use aas_core::validation::{check_laser_text, MAX_BATCH_JOBS};
use aas_core::{CoreError, QueueJob};
use aas_telemetry::Metrics;
use chrono::Local;
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{run_cycle_for_orders, run_cycle_for_site, run_scenario_1, run_scenario_2};
use crate::rules::Scenario;
use crate::state::SimulationState;

/// Path clients poll for the status of a run.
pub fn tracking_url(run_id: &str) -> String {
    format!("/api/v1/cycle/status/{run_id}")
}

/// Individual job records of one cycle, each carrying an equal share of
/// the cycle's AGV trip.
fn individual_jobs(
    summary: &CycleSummary,
    source: JobSource,
    run_id: Option<&str>,
) -> Vec<IndividualJob> {
    let (distance_share, cost_share) = summary.agv_shares();
    summary
        .individual_jobs
        .iter()
        .map(|details| IndividualJob {
            details: details.clone(),
            source,
            site: Some(summary.site.clone()),
            run_id: run_id.map(str::to_string),
            agv_distance_share: distance_share,
            agv_cost_share: cost_share,
            timestamp: now_iso(),
        })
        .collect()
}

/// Starts and tracks simulation runs.
#[derive(Debug, Clone)]
pub struct RunManager {
    state: Arc<SimulationState>,
}

impl RunManager {
    pub fn new(state: Arc<SimulationState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<SimulationState> {
        &self.state
    }

    // ========================================================================
    // Queue cycles
    // ========================================================================

    /// Start a background cycle for `site`.
    ///
    /// Fails if the site is unknown or has no queued jobs.
    pub fn start_cycle(&self, site: &str, max_jobs: Option<usize>) -> EngineResult<CycleStartResponse> {
        let queued = self.state.read(|d| {
            d.site_coords(site)?;
            Ok::<_, EngineError>(d.queue.iter().filter(|j| j.site == site).count())
        })?;
        if queued == 0 {
            return Err(EngineError::NoQueuedJobs(site.to_string()));
        }
        let limit = max_jobs.filter(|n| *n > 0);
        let estimated_jobs = limit.map_or(queued, |n| n.min(queued));

        let record = self.state.add_run(RunRecord::started(
            format!("run_{}_{}", local_stamp(), site),
            site,
            self.state.config(),
        ));
        let run_id = record.run_id.clone();
        info!(run_id = %run_id, site, estimated_jobs, "Cycle queued");

        let state = Arc::clone(&self.state);
        let site_owned = site.to_string();
        tokio::spawn(async move {
            let outcome = {
                let _cycle = state.cycle_lock().lock().await;
                run_cycle_for_site(&state, &site_owned, limit).await
            };
            finish_run(&state, record, "cycle", "queue", RunStatus::NoJobs, outcome);
        });

        Ok(CycleStartResponse {
            message: format!("Cycle started for site {site}"),
            run_id,
            site: site.to_string(),
            estimated_jobs,
        })
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    /// Start a predefined scenario in the background. Its jobs replace the
    /// queue and its usage lands in the scenario billing bucket.
    pub fn start_scenario(&self, scenario: Scenario) -> ScenarioStartResponse {
        let record = self.state.add_run(RunRecord::started(
            format!("{}_{}", scenario, local_stamp()),
            scenario.history_site(),
            self.state.config(),
        ));
        let run_id = record.run_id.clone();
        info!(run_id = %run_id, %scenario, "Scenario queued");

        let state = Arc::clone(&self.state);
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            let outcome = {
                let _cycle = state.cycle_lock().lock().await;
                execute_scenario(&state, scenario).await
            };
            let summary = outcome.map(|(summary, cycles)| {
                let jobs = cycles
                    .iter()
                    .flat_map(|c| individual_jobs(c, JobSource::Scenario, Some(task_run_id.as_str())))
                    .collect();
                state.add_individual_jobs(jobs);
                state.update_cumulative_billing(
                    JobSource::Scenario,
                    &summary.usage(),
                    &summary.jobs_processed,
                );
                summary
            });
            finish_run(
                &state,
                record,
                "scenario",
                JobSource::Scenario.as_str(),
                RunStatus::NoJobs,
                summary,
            );
        });

        ScenarioStartResponse {
            message: scenario.start_message().to_string(),
            run_id,
            expected_jobs: scenario.order_numbers(),
            expected_cycles: (scenario.cycles() > 1).then(|| scenario.cycles()),
        }
    }

    /// Run a scenario to completion and return its summaries. Used by the
    /// composer aliases, which block until the run ends.
    pub async fn run_scenario_now(&self, scenario: Scenario) -> EngineResult<ScenarioRunResponse> {
        let (summary, cycles) = {
            let _cycle = self.state.cycle_lock().lock().await;
            execute_scenario(&self.state, scenario).await?
        };

        let jobs = cycles
            .iter()
            .flat_map(|c| individual_jobs(c, JobSource::Scenario, None))
            .collect();
        self.state.add_individual_jobs(jobs);
        self.state.update_cumulative_billing(
            JobSource::Scenario,
            &summary.usage(),
            &summary.jobs_processed,
        );
        Metrics::run_finished("scenario", RunStatus::Completed.as_str());
        Metrics::jobs_processed(JobSource::Scenario.as_str(), summary.jobs_processed.len());

        let response = match scenario {
            Scenario::SameSite => ScenarioRunResponse {
                success: true,
                message: "Scenario 1 (Batch Processing) completed successfully".to_string(),
                result: Some(CycleSummary {
                    source: Some(JobSource::Scenario),
                    mode: Some(RunMode::Batch),
                    scenario: Some(1),
                    description: Some("Batch Processing - Multiple jobs at same site".to_string()),
                    ..summary
                }),
                results: None,
            },
            Scenario::TwoSites => ScenarioRunResponse {
                success: true,
                message: "Scenario 2 (Individual Processing) completed successfully".to_string(),
                result: None,
                results: Some(
                    cycles
                        .into_iter()
                        .enumerate()
                        .map(|(i, cycle)| CycleSummary {
                            source: Some(JobSource::Scenario),
                            mode: Some(RunMode::Individual),
                            scenario: Some(2),
                            description: Some(format!("Individual Processing - Site {}", i + 1)),
                            ..cycle
                        })
                        .collect(),
                ),
            },
        };
        Ok(response)
    }

    // ========================================================================
    // Composer
    // ========================================================================

    /// Queue a single job and run it in its own cycle.
    pub fn submit_direct(&self, request: &DirectJobRequest) -> EngineResult<DirectJobResponse> {
        check_laser_text(&request.laser_text)?;
        let site = request.site.as_str();

        let order_no = generate_order_number("D", &Local::now());
        let job = QueueJob::new(order_no.clone(), request.laser_text.clone(), site);
        let run_id = self.spawn_composer_run(
            format!("direct_{}_{}", local_stamp(), order_no),
            site,
            vec![job],
            JobSource::Direct,
            RunMode::Individual,
        )?;

        Ok(DirectJobResponse {
            success: true,
            message: format!("Direct job {order_no} started successfully"),
            tracking_url: tracking_url(&run_id),
            run_id,
            order_no,
            site: site.to_string(),
        })
    }

    /// Queue one to five jobs for one site and run them in a single cycle.
    pub fn submit_batch(&self, request: &BatchJobRequest) -> EngineResult<BatchJobResponse> {
        if request.jobs.is_empty() || request.jobs.len() > MAX_BATCH_JOBS {
            return Err(CoreError::InvalidBatch(format!(
                "a batch holds 1 to {MAX_BATCH_JOBS} jobs, got {}",
                request.jobs.len()
            ))
            .into());
        }
        for item in &request.jobs {
            check_laser_text(&item.laser_text)?;
        }
        let site = request.site.as_str();

        let now = Local::now();
        let jobs: Vec<QueueJob> = request
            .jobs
            .iter()
            .enumerate()
            .map(|(i, item)| QueueJob::new(batch_order_number(&now, i), item.laser_text.clone(), site))
            .collect();
        let order_numbers: Vec<String> = jobs.iter().map(|j| j.order_no.clone()).collect();
        let run_id = self.spawn_composer_run(
            format!("batch_{}_{}jobs", local_stamp(), jobs.len()),
            site,
            jobs,
            JobSource::Batch,
            RunMode::Batch,
        )?;

        Ok(BatchJobResponse {
            success: true,
            message: format!("Batch of {} jobs started successfully", order_numbers.len()),
            tracking_url: tracking_url(&run_id),
            run_id,
            job_count: order_numbers.len(),
            order_numbers,
            site: site.to_string(),
        })
    }

    /// Returns the id the run was recorded under.
    fn spawn_composer_run(
        &self,
        run_id: String,
        site: &str,
        jobs: Vec<QueueJob>,
        source: JobSource,
        mode: RunMode,
    ) -> EngineResult<String> {
        let record = RunRecord::started(run_id, site, self.state.config()).with_origin(source, mode);
        for job in &jobs {
            self.state.enqueue(job.clone())?;
        }
        let record = self.state.add_run(record);
        let run_id = record.run_id.clone();
        info!(run_id = %run_id, site, jobs = jobs.len(), source = %source, "Composer run queued");

        let state = Arc::clone(&self.state);
        let site = site.to_string();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            let outcome = {
                let _cycle = state.cycle_lock().lock().await;
                run_cycle_for_orders(&state, &site, &jobs).await
            };
            let outcome = outcome.map(|summary| {
                state.update_cumulative_billing(source, &summary.usage(), &summary.jobs_processed);
                state.add_individual_jobs(individual_jobs(&summary, source, Some(task_run_id.as_str())));
                CycleSummary {
                    source: Some(source),
                    mode: Some(mode),
                    ..summary
                }
            });
            // Composer runs report an empty batch as an error.
            finish_run(&state, record, source.as_str(), source.as_str(), RunStatus::Error, outcome);
        });
        Ok(run_id)
    }
}

/// Run `scenario` and return its combined summary plus the per-cycle
/// summaries it was built from.
async fn execute_scenario(
    state: &SimulationState,
    scenario: Scenario,
) -> EngineResult<(CycleSummary, Vec<CycleSummary>)> {
    match scenario {
        Scenario::SameSite => {
            let summary = run_scenario_1(state).await?;
            Ok((summary.clone(), vec![summary]))
        }
        Scenario::TwoSites => {
            let cycles = run_scenario_2(state).await?;
            let combined = CycleSummary::combine(scenario.history_site(), "SCENARIO2", cycles.clone());
            Ok((combined, cycles))
        }
    }
}

/// Record the outcome of a background run. An empty batch ends the run
/// with `empty_status`.
fn finish_run(
    state: &SimulationState,
    mut record: RunRecord,
    kind: &str,
    job_source: &str,
    empty_status: RunStatus,
    outcome: EngineResult<CycleSummary>,
) {
    match outcome {
        Ok(summary) => {
            Metrics::jobs_processed(job_source, summary.jobs_processed.len());
            info!(
                run_id = %record.run_id,
                jobs = summary.jobs_processed.len(),
                cost = summary.combined_cost_eur,
                "Run completed"
            );
            record.complete(summary);
        }
        Err(e @ EngineError::NoJobsFound { .. }) => {
            warn!(run_id = %record.run_id, "Run found no jobs");
            record.fail(empty_status, e.to_string());
        }
        Err(e) => {
            error!(run_id = %record.run_id, error = %e, "Run failed");
            record.fail(RunStatus::Error, e.to_string());
        }
    }
    Metrics::run_finished(kind, record.status.as_str());
    state.update_run(record);
}
