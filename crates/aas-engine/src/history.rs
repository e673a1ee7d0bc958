//! Run history views.

use aas_core::api::{HistoryStats, RunRecord, RunStatus};
use aas_core::billing::round6;

/// Default page size of `GET /history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Sort newest first by `startedAt` and keep at most `limit` runs.
/// A limit of `None` or `Some(0)` keeps every run.
pub fn newest_first(mut runs: Vec<RunRecord>, limit: Option<usize>) -> Vec<RunRecord> {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    if let Some(n) = limit.filter(|n| *n > 0) {
        runs.truncate(n);
    }
    runs
}

/// Aggregate statistics over completed runs.
pub fn stats(runs: &[RunRecord]) -> HistoryStats {
    let completed: Vec<&RunRecord> = runs
        .iter()
        .filter(|r| r.status == RunStatus::Completed)
        .collect();
    let error_runs = runs.iter().filter(|r| r.status == RunStatus::Error).count();

    let mut stats = HistoryStats {
        total_runs: runs.len(),
        completed_runs: completed.len(),
        error_runs,
        ..HistoryStats::default()
    };
    for run in &completed {
        stats.total_jobs += run.jobs_processed.len();
        if let Some(summary) = &run.cycle_summary {
            stats.total_energy_kwh += summary.engraver_energy_kwh;
            stats.total_co2_g += summary.engraver_co2_g;
            stats.total_cost_eur += summary.combined_cost_eur;
        }
    }

    stats.total_energy_kwh = round6(stats.total_energy_kwh);
    stats.total_co2_g = round6(stats.total_co2_g);
    stats.total_cost_eur = round6(stats.total_cost_eur);
    if !completed.is_empty() {
        stats.avg_cost_per_run = round6(stats.total_cost_eur / completed.len() as f64);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_core::api::CycleSummary;
    use aas_core::sim_config::SimConfig;

    fn run(id: &str, started_at: &str) -> RunRecord {
        RunRecord {
            started_at: started_at.to_string(),
            ..RunRecord::started(id, "JOB_POS1", SimConfig::default())
        }
    }

    fn completed(id: &str, started_at: &str, cost: f64) -> RunRecord {
        let mut r = run(id, started_at);
        r.complete(CycleSummary {
            jobs_processed: vec![format!("{id}-job")],
            engraver_energy_kwh: 0.025,
            engraver_co2_g: 9.0,
            combined_cost_eur: cost,
            ended_at: started_at.to_string(),
            ..CycleSummary::default()
        });
        r
    }

    #[test]
    fn test_newest_first_with_limit() {
        let runs = vec![
            run("a", "2025-01-21T10:00:00"),
            run("c", "2025-01-21T12:00:00"),
            run("b", "2025-01-21T11:00:00"),
        ];

        let sorted = newest_first(runs.clone(), None);
        let ids: Vec<&str> = sorted.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        assert_eq!(newest_first(runs.clone(), Some(2)).len(), 2);
        assert_eq!(newest_first(runs, Some(0)).len(), 3);
    }

    #[test]
    fn test_stats_counts_completed_only() {
        let mut failed = run("x", "2025-01-21T09:00:00");
        failed.fail(RunStatus::Error, "boom");
        let mut empty = run("y", "2025-01-21T09:30:00");
        empty.fail(RunStatus::NoJobs, "No jobs found for site");

        let runs = vec![
            completed("a", "2025-01-21T10:00:00", 0.4),
            completed("b", "2025-01-21T11:00:00", 0.5),
            failed,
            empty,
        ];
        let s = stats(&runs);

        assert_eq!(s.total_runs, 4);
        assert_eq!(s.completed_runs, 2);
        assert_eq!(s.error_runs, 1);
        assert_eq!(s.total_jobs, 2);
        assert_eq!(s.total_energy_kwh, 0.05);
        assert_eq!(s.total_cost_eur, 0.9);
        assert_eq!(s.avg_cost_per_run, 0.45);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(stats(&[]), HistoryStats::default());
    }
}
