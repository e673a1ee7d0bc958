//! Run history export (JSON document, CSV table).

use aas_core::api::{HistoryExport, RunRecord};
use chrono::{DateTime, TimeZone};

use crate::error::PersistenceResult;

const CSV_COLUMNS: [&str; 13] = [
    "runId",
    "site",
    "startedAt",
    "endedAt",
    "status",
    "jobsProcessed",
    "agvBilledMeters",
    "agvCostEUR",
    "engraverEnergyKWh",
    "engraverCO2g",
    "engraverCostEUR",
    "combinedCostEUR",
    "error",
];

/// Download file name, e.g. `aas_history_20250121_100000.csv`.
pub fn export_filename<Tz: TimeZone>(ext: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("aas_history_{}.{}", now.format("%Y%m%d_%H%M%S"), ext)
}

/// Pretty-printed JSON export. `total` is the size of the full history,
/// `runs` the (possibly limited) slice being exported.
pub fn history_json(runs: &[RunRecord], total: usize, export_time: &str) -> PersistenceResult<String> {
    let export = HistoryExport {
        export_time: export_time.to_string(),
        total_runs: total,
        exported_runs: runs.len(),
        history: runs.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// CSV export, one row per run. Billing columns are empty for runs
/// without a cycle summary.
pub fn history_csv(runs: &[RunRecord]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push_str("\r\n");

    for run in runs {
        let billing: [String; 6] = match &run.cycle_summary {
            Some(s) => [
                s.agv_billed_meters.to_string(),
                s.agv_cost_eur.to_string(),
                s.engraver_energy_kwh.to_string(),
                s.engraver_co2_g.to_string(),
                s.engraver_cost_eur.to_string(),
                s.combined_cost_eur.to_string(),
            ],
            None => Default::default(),
        };

        let mut row = vec![
            csv_field(&run.run_id),
            csv_field(&run.site),
            csv_field(&run.started_at),
            csv_field(run.ended_at.as_deref().unwrap_or("")),
            run.status.to_string(),
            csv_field(&run.jobs_processed.join("|")),
        ];
        row.extend(billing);
        row.push(csv_field(run.error.as_deref().unwrap_or("")));

        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}
