//! AGV + engraver cycle orchestration.
//!
//! One cycle is a round trip of the AGV:
//! - HOME -> ENGRAVER_DOCK (not billed)
//! - ENGRAVER_DOCK -> site (billed)
//! - engrave every job of the batch at the site
//! - site -> ENGRAVER_DOCK (billed)
//! - ENGRAVER_DOCK -> HOME (not billed)
//!
//! Every function here expects the caller to hold
//! [`SimulationState::cycle_lock`]. State locks are taken per tick and
//! released before sleeping.

use std::time::Duration;

use aas_core::api::CycleSummary;
use aas_core::billing::{round6, JobDetails};
use aas_core::device::{BillingStatus, OperationMode, OrderState};
use aas_core::sim_config::{ENGRAVER_DOCK, HOME, JOB_POS1, JOB_POS2};
use aas_core::time::now_iso;
use aas_core::QueueJob;
use aas_telemetry::Metrics;
use chrono::Local;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::kinematics::{dist, move_pose_towards};
use crate::rules::{Scenario, POWER_FACTOR, TICK};
use crate::state::SimulationState;

// ============================================================================
// AGV
// ============================================================================

/// Drive the AGV to `target` in [`TICK`] steps. Distance is added to the
/// AGV's billed distance only when `billed` is set.
pub async fn agv_move_to(state: &SimulationState, target: (f64, f64), billed: bool) {
    let (start, step) = state.write(|d| {
        d.billing_window_active = billed;
        d.agv.operational_data.status.operation_mode = OperationMode::Running;
        (d.agv.pose().xy(), d.config.agv.speed_m_per_s * TICK.as_secs_f64())
    });
    let leg_len = match dist(start, target) {
        l if l > 0.0 => l,
        _ => 1.0,
    };

    loop {
        let arrived = state.write(|d| {
            let od = &mut d.agv.operational_data;
            let before = od.pose.xy();
            let arrived = move_pose_towards(&mut od.pose, target, step);
            let after = od.pose.xy();

            if d.billing_window_active {
                d.agv.usage_billing.distance_traveled += dist(before, after);
            }
            od.bump_heartbeat();
            od.set_progress((dist(start, after) / leg_len * 100.0).min(100.0));
            arrived
        });
        if arrived {
            break;
        }
        sleep(TICK).await;
    }

    state.write(|d| {
        let od = &mut d.agv.operational_data;
        od.status.operation_mode = OperationMode::Idle;
        od.set_progress(100.0);
    });
}

// ============================================================================
// Engraver
// ============================================================================

/// Engrave one job and add its usage to the engraver's billing.
///
/// Runtime is `max(1, letters * seconds_per_letter)` seconds, spread over
/// `100 / progress_step` progress ticks. Energy is
/// `baseIdle + k_laser * power * runtime`.
pub async fn run_engrave_job(state: &SimulationState, job: &QueueJob) -> JobDetails {
    let letters = job.letters();
    let config = state.write(|d| {
        let od = &mut d.engraver.operational_data;
        od.order.order_no = job.order_no.clone();
        od.order.laser_text = Some(job.laser_text.clone());
        od.order.transport_required = false;
        od.order.order_state = OrderState::InProcess;
        od.order.last_change_at = now_iso();
        od.status.operation_mode = OperationMode::Running;
        od.set_progress(0.0);
        d.config.clone()
    });

    let total_time_s = (letters as f64 * config.engraver.seconds_per_letter).max(1.0);
    let step = config.progress_step.clamp(1, 100);
    let loops = (100 / step).max(1);
    let per_loop = Duration::from_secs_f64(total_time_s / f64::from(loops));

    loop {
        let done = state.write(|d| {
            let od = &mut d.engraver.operational_data;
            if od.status.production_progress >= 100 {
                return true;
            }
            od.bump_heartbeat();
            od.set_progress(f64::from(od.status.production_progress) + f64::from(step));
            false
        });
        if done {
            break;
        }
        sleep(per_loop).await;
    }

    let energy =
        config.engraver.base_idle_kwh + config.engraver.k_laser_kwh_per_sec_at_power1 * POWER_FACTOR * total_time_s;

    state.write(|d| {
        let od = &mut d.engraver.operational_data;
        od.order.order_state = OrderState::Done;
        od.order.last_change_at = now_iso();
        od.status.operation_mode = OperationMode::Idle;
        od.set_progress(100.0);

        let ub = &mut d.engraver.usage_billing;
        let co2 = energy * ub.emission_factor;
        let cost = energy * ub.cost_per_energy_unit;
        ub.energy_consumed = round6(ub.energy_consumed + round6(energy));
        ub.carbon_emissions = round6(ub.carbon_emissions + round6(co2));
        ub.usage_cost = round6(ub.usage_cost + round6(cost));
        ub.order_ref = Some(job.order_no.clone());
        ub.billing_status = BillingStatus::Open;
        ub.last_billed_at = Some(now_iso());
        ub.last_updated = now_iso();

        debug!(
            order_no = %job.order_no,
            letters,
            runtime_s = total_time_s,
            energy_kwh = round6(energy),
            "Engraving job finished"
        );

        JobDetails {
            order_no: job.order_no.clone(),
            laser_text: job.laser_text.clone(),
            letters,
            energy_kwh: round6(energy),
            co2_g: round6(co2),
            cost_eur: round6(cost),
            completed_at: now_iso(),
        }
    })
}

// ============================================================================
// Cycles
// ============================================================================

/// Run one cycle for the first queued jobs of `site`.
///
/// `max_jobs` of `None` or `Some(0)` takes every queued job for the site.
pub async fn run_cycle_for_site(
    state: &SimulationState,
    site: &str,
    max_jobs: Option<usize>,
) -> EngineResult<CycleSummary> {
    let limit = max_jobs.filter(|n| *n > 0).unwrap_or(usize::MAX);
    let batch: Vec<QueueJob> = state.read(|d| {
        d.queue
            .iter()
            .filter(|j| j.site == site)
            .take(limit)
            .cloned()
            .collect()
    });
    run_cycle(state, site, batch).await
}

/// Run one cycle for exactly `jobs`. Jobs no longer queued are left out; if
/// none remain the cycle fails with [`EngineError::NoJobsFound`].
pub async fn run_cycle_for_orders(
    state: &SimulationState,
    site: &str,
    jobs: &[QueueJob],
) -> EngineResult<CycleSummary> {
    let batch: Vec<QueueJob> = jobs.iter().filter(|j| j.site == site).cloned().collect();
    run_cycle(state, site, batch).await
}

async fn run_cycle(
    state: &SimulationState,
    site: &str,
    batch: Vec<QueueJob>,
) -> EngineResult<CycleSummary> {
    let (site_xy, dock_xy, home_xy, batch) = state.read(|d| {
        // Jobs dropped from the queue since planning are not engraved.
        let batch: Vec<QueueJob> = batch.into_iter().filter(|j| d.queue.contains(j)).collect();
        Ok::<_, EngineError>((
            d.site_coords(site)?,
            d.site_coords(ENGRAVER_DOCK)?,
            d.site_coords(HOME)?,
            batch,
        ))
    })?;
    if batch.is_empty() {
        return Err(EngineError::NoJobsFound {
            site: site.to_string(),
        });
    }

    let started = Instant::now();
    let started_at = now_iso();
    info!(site, jobs = batch.len(), "Cycle started");

    state.write(|d| {
        d.agv.usage_billing.clear_usage();
        d.engraver.usage_billing.clear_usage();
        let order = &mut d.agv.operational_data.order;
        order.order_no = format!("TRANSPORT-{site}");
        order.order_state = OrderState::InProcess;
        order.last_change_at = now_iso();
    });

    agv_move_to(state, dock_xy, false).await;
    agv_move_to(state, site_xy, true).await;

    let mut jobs_processed = Vec::with_capacity(batch.len());
    let mut individual_jobs = Vec::with_capacity(batch.len());
    for job in &batch {
        let taken = state.write(|d| match d.queue.iter().position(|q| q == job) {
            Some(pos) => {
                d.queue.remove(pos);
                Some(d.queue.len())
            }
            None => None,
        });
        let Some(queue_len) = taken else {
            warn!(order_no = %job.order_no, "Job left the queue before engraving, skipping");
            continue;
        };
        Metrics::queue_length(queue_len);

        let details = run_engrave_job(state, job).await;
        jobs_processed.push(details.order_no.clone());
        individual_jobs.push(details);
    }

    agv_move_to(state, dock_xy, true).await;
    agv_move_to(state, home_xy, false).await;

    let ended_at = now_iso();
    let order_ref = format!("BATCH-{}", Local::now().format("%Y%m%d-%H%M%S"));

    let summary = state.write(|d| {
        d.billing_window_active = false;

        let agv = &mut d.agv.usage_billing;
        agv.distance_traveled = round6(agv.distance_traveled);
        agv.usage_cost = round6(agv.distance_traveled * agv.cost_per_meter);
        agv.order_ref = Some(order_ref.clone());
        agv.billing_status = BillingStatus::Open;
        agv.last_billed_at = Some(ended_at.clone());
        agv.last_updated = ended_at.clone();

        let order = &mut d.agv.operational_data.order;
        order.order_state = OrderState::Done;
        order.last_change_at = ended_at.clone();

        let eng = &d.engraver.usage_billing;
        let agv = &d.agv.usage_billing;
        CycleSummary {
            site: site.to_string(),
            jobs_processed,
            individual_jobs,
            agv_billed_meters: agv.distance_traveled,
            agv_cost_eur: agv.usage_cost,
            engraver_energy_kwh: eng.energy_consumed,
            engraver_co2_g: eng.carbon_emissions,
            engraver_cost_eur: eng.usage_cost,
            combined_cost_eur: round6(eng.usage_cost + agv.usage_cost),
            order_ref: order_ref.clone(),
            started_at,
            ended_at,
            ..CycleSummary::default()
        }
    });

    Metrics::cycle_duration(site, started.elapsed().as_secs_f64());
    Metrics::usage_billed(
        summary.agv_billed_meters,
        summary.agv_cost_eur,
        summary.engraver_energy_kwh,
        summary.engraver_cost_eur,
    );
    info!(
        site,
        order_ref = %summary.order_ref,
        jobs = summary.jobs_processed.len(),
        agv_m = summary.agv_billed_meters,
        cost = summary.combined_cost_eur,
        "Cycle completed"
    );
    Ok(summary)
}

// ============================================================================
// Scenarios
// ============================================================================

fn load_scenario(state: &SimulationState, scenario: Scenario) {
    let len = state.write(|d| {
        d.queue.clear();
        d.queue.extend(scenario.jobs());
        d.queue.len()
    });
    Metrics::queue_length(len);
}

/// Scenario 1: three jobs at one site, one billed round trip.
pub async fn run_scenario_1(state: &SimulationState) -> EngineResult<CycleSummary> {
    load_scenario(state, Scenario::SameSite);
    run_cycle_for_site(state, JOB_POS1, None).await
}

/// Scenario 2: one job at each site, two billed round trips.
pub async fn run_scenario_2(state: &SimulationState) -> EngineResult<Vec<CycleSummary>> {
    load_scenario(state, Scenario::TwoSites);
    let first = run_cycle_for_site(state, JOB_POS1, Some(1)).await?;
    let second = run_cycle_for_site(state, JOB_POS2, Some(1)).await?;
    Ok(vec![first, second])
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_core::sim_config::{default_coords, ConfigUpdate, EngraverConfigUpdate, SimConfig};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbilled_leg_leaves_distance_untouched() {
        let state = SimulationState::in_memory();
        agv_move_to(&state, (5.0, 0.0), false).await;

        let agv = state.agv();
        assert_eq!(agv.pose().xy(), (5.0, 0.0));
        assert_eq!(agv.usage_billing.distance_traveled, 0.0);
        assert_eq!(agv.status().production_progress, 100);
        assert_eq!(agv.status().operation_mode, OperationMode::Idle);
        assert!(agv.status().heartbeat_counter >= 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_billed_leg_accumulates_distance() {
        let state = SimulationState::in_memory();
        agv_move_to(&state, (3.0, 4.0), true).await;
        assert_close(round6(state.agv().usage_billing.distance_traveled), 5.0);
        assert!(state.cycle_status().billing_window_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engrave_job_energy_formula() {
        let state = SimulationState::in_memory();
        state
            .update_config(&ConfigUpdate {
                engraver: Some(EngraverConfigUpdate {
                    base_idle_kwh: Some(0.1),
                    k_laser_kwh_per_sec_at_power1: Some(0.01),
                    seconds_per_letter: Some(1.0),
                    emission_factor_g_per_kwh: Some(500.0),
                    cost_per_energy_unit_eur_per_kwh: Some(0.5),
                    default_power_preset: None,
                }),
                ..ConfigUpdate::default()
            })
            .unwrap();

        let details = run_engrave_job(&state, &QueueJob::new("T-0001", "A", JOB_POS1)).await;
        assert_close(details.energy_kwh, 0.11);
        assert_close(details.co2_g, 55.0);
        assert_close(details.cost_eur, 0.055);
        assert_eq!(details.letters, 1);

        let engraver = state.engraver();
        assert_eq!(engraver.operational_data.order.order_state, OrderState::Done);
        assert_eq!(engraver.status().production_progress, 100);
        assert_eq!(engraver.usage_billing.order_ref.as_deref(), Some("T-0001"));
        assert_close(engraver.usage_billing.energy_consumed, 0.11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engrave_runtime_follows_letter_count() {
        let state = SimulationState::in_memory();
        let start = Instant::now();
        // 10 letters * 0.5 s
        run_engrave_job(&state, &QueueJob::new("T-0002", "ENGRAVINGS", JOB_POS1)).await;
        let elapsed = start.elapsed().as_secs_f64();
        assert!((4.9..=5.1).contains(&elapsed), "elapsed {elapsed}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_without_jobs_fails() {
        let state = SimulationState::in_memory();
        state.enqueue(QueueJob::new("E-1", "X", JOB_POS2)).unwrap();

        let err = run_cycle_for_site(&state, JOB_POS1, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NoJobsFound { .. }));
        assert_eq!(err.to_string(), "No jobs found for site");
        assert_eq!(state.queue_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_rejects_unknown_site() {
        let state = SimulationState::in_memory();
        let err = run_cycle_for_site(&state, "JOB_POS9", None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSite { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_1_single_billed_round_trip() {
        let state = SimulationState::in_memory();
        let summary = run_scenario_1(&state).await.unwrap();

        assert_eq!(summary.jobs_processed, vec!["E-1001", "E-1002", "E-1003"]);
        assert_close(summary.agv_billed_meters, 21.260292);
        assert_close(summary.agv_cost_eur, 0.425206);
        assert_close(summary.engraver_energy_kwh, 0.074);
        assert_close(summary.engraver_co2_g, 26.64);
        assert_close(summary.engraver_cost_eur, 0.0296);
        assert_close(summary.combined_cost_eur, 0.454806);
        assert!(summary.order_ref.starts_with("BATCH-"));
        assert_eq!(summary.individual_jobs.len(), 3);

        let status = state.cycle_status();
        assert_eq!(status.queue_length, 0);
        assert!(!status.billing_window_active);
        assert_eq!(status.agv_pose.xy(), (0.0, 0.0));
        assert_close(state.engraver().usage_billing.energy_consumed, 0.074);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_2_two_round_trips() {
        let state = SimulationState::in_memory();
        let cycles = run_scenario_2(&state).await.unwrap();

        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].jobs_processed, vec!["E-2001"]);
        assert_eq!(cycles[1].jobs_processed, vec!["E-2002"]);
        assert_close(cycles[0].agv_billed_meters, 21.260292);
        // 2 * hypot(10, -6)
        assert_close(cycles[1].agv_billed_meters, 23.323808);
        // FACTORY: 7 letters * 0.5 s
        assert_close(cycles[1].engraver_energy_kwh, 0.027);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_jobs_limits_batch() {
        let state = SimulationState::in_memory();
        for (no, text) in [("Q-0001", "A"), ("Q-0002", "B"), ("Q-0003", "C")] {
            state.enqueue(QueueJob::new(no, text, JOB_POS1)).unwrap();
        }

        let summary = run_cycle_for_site(&state, JOB_POS1, Some(2)).await.unwrap();
        assert_eq!(summary.jobs_processed, vec!["Q-0001", "Q-0002"]);
        assert_eq!(state.queue_jobs()[0].order_no, "Q-0003");
    }

    #[tokio::test(start_paused = true)]
    async fn test_planned_cycle_only_runs_given_jobs() {
        let state = SimulationState::new(SimConfig::default(), default_coords(), None);
        state.enqueue(QueueJob::new("E-0001", "OLD", JOB_POS1)).unwrap();
        let mine = QueueJob::new("D-01010101", "HELLO", JOB_POS1);
        state.enqueue(mine.clone()).unwrap();

        let summary = run_cycle_for_orders(&state, JOB_POS1, &[mine]).await.unwrap();
        assert_eq!(summary.jobs_processed, vec!["D-01010101"]);
        assert_eq!(state.queue_jobs()[0].order_no, "E-0001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_planned_cycle_with_dropped_jobs_fails() {
        let state = SimulationState::in_memory();
        let job = QueueJob::new("D-01010101", "HELLO", JOB_POS1);
        state.enqueue(job.clone()).unwrap();
        state.clear_queue();

        let err = run_cycle_for_orders(&state, JOB_POS1, &[job]).await.unwrap_err();
        assert!(matches!(err, EngineError::NoJobsFound { .. }));
        assert_eq!(state.agv().status().heartbeat_counter, 0);
    }
}
