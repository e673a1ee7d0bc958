//! Plain-text views of the dashboard pages.

use std::fmt::Write;

use aas_core::api::{
    CombinedBillingResponse, ConfigResponse, CycleStatusResponse, DevicesResponse, EventSnapshot,
    HistoryListResponse, HistoryStats, IndividualJobsResponse, QueueResponse, RunRecord,
};
use aas_core::{format_currency, format_progress, format_timestamp};

/// Pages render into a `String`; writing to it cannot fail.
macro_rules! row {
    ($out:expr) => {
        let _ = writeln!($out);
    };
    ($out:expr, $($arg:tt)*) => {
        let _ = writeln!($out, $($arg)*);
    };
}

pub fn cycle_status(status: &CycleStatusResponse) -> String {
    let mut out = String::new();
    row!(out, "Cycle status");
    row!(
        out,
        "  Engraver  {:<8} {}",
        status.engraver_mode.to_string(),
        format_progress(f64::from(status.engraver_progress))
    );
    row!(
        out,
        "  AGV       {:<8} {}  at ({:.2}, {:.2})",
        status.agv_mode.to_string(),
        format_progress(f64::from(status.agv_progress)),
        status.agv_pose.pos_x,
        status.agv_pose.pos_y
    );
    row!(out, "  Queue     {} job(s)", status.queue_length);
    row!(
        out,
        "  Billing window {}",
        if status.billing_window_active { "ACTIVE" } else { "inactive" }
    );
    out
}

pub fn combined_billing(billing: &CombinedBillingResponse) -> String {
    let currency = billing.currency.as_str();
    let mut out = String::new();
    row!(out, "Billing ({:?})", billing.billing_source);
    row!(
        out,
        "  Engraver  {:>14}  {:.6} kWh  {:.3} g CO2",
        format_currency(billing.engraver.cost_eur, currency),
        billing.engraver.energy_kwh,
        billing.engraver.co2_g
    );
    row!(
        out,
        "  AGV       {:>14}  {:.3} m",
        format_currency(billing.agv.cost_eur, currency),
        billing.agv.distance_m
    );
    row!(
        out,
        "  Total     {:>14}",
        format_currency(billing.combined_cost_eur, currency)
    );
    if !billing.jobs_processed.is_empty() {
        row!(out, "  Jobs      {}", billing.jobs_processed.join(", "));
    }
    row!(
        out,
        "  Updated   {}",
        format_timestamp(billing.last_updated.as_deref())
    );
    out
}

pub fn devices(devices: &DevicesResponse) -> String {
    let mut out = String::new();
    let engraver = &devices.engraver;
    let agv = &devices.agv;

    row!(out, "{} ({})", engraver.device_id, engraver.device_type);
    let data = &engraver.operational_data;
    row!(
        out,
        "  {}  {}  heartbeat #{}",
        data.status.operation_mode,
        format_progress(f64::from(data.status.production_progress)),
        data.status.heartbeat_counter
    );
    row!(
        out,
        "  Order {} [{}] {}",
        or_dash(&data.order.order_no),
        data.order.order_state,
        data.order.laser_text.as_deref().unwrap_or("")
    );
    let billing = &engraver.usage_billing;
    row!(
        out,
        "  Usage {} ({:.6} kWh, {})",
        format_currency(billing.usage_cost, &billing.currency),
        billing.energy_consumed,
        billing.billing_status
    );

    row!(out, "{} ({})", agv.device_id, agv.device_type);
    let data = &agv.operational_data;
    row!(
        out,
        "  {}  {}  heartbeat #{}",
        data.status.operation_mode,
        format_progress(f64::from(data.status.production_progress)),
        data.status.heartbeat_counter
    );
    row!(
        out,
        "  Pose ({:.2}, {:.2}) heading {:.1}",
        data.pose.pos_x,
        data.pose.pos_y,
        data.pose.orientation
    );
    let billing = &agv.usage_billing;
    row!(
        out,
        "  Usage {} ({:.3} m, {})",
        format_currency(billing.usage_cost, &billing.currency),
        billing.distance_traveled,
        billing.billing_status
    );
    out
}

pub fn queue(queue: &QueueResponse) -> String {
    let mut out = String::new();
    row!(out, "Queue ({} job(s))", queue.length);
    if queue.queue.is_empty() {
        row!(out, "  No jobs in queue");
    }
    for (i, job) in queue.queue.iter().enumerate() {
        row!(
            out,
            "  {:>2}. {:<12} {:<9} {}",
            i + 1,
            job.order_no,
            job.site,
            job.laser_text
        );
    }
    out
}

pub fn individual_jobs(report: &IndividualJobsResponse, currency: &str) -> String {
    let mut out = String::new();
    row!(out, "Individual jobs ({})", report.summary.total_jobs);
    for job in &report.jobs {
        row!(
            out,
            "  {:<14} {:<8} {:<20} {:>12} + AGV {:>12}",
            job.details.order_no,
            job.source.as_str(),
            job.details.laser_text,
            format_currency(job.details.cost_eur, currency),
            format_currency(job.agv_cost_share, currency)
        );
    }
    let summary = &report.summary;
    row!(
        out,
        "  Letters {}  Energy {:.6} kWh  CO2 {:.3} g",
        summary.total_letters,
        summary.total_energy_kwh,
        summary.total_co2_g
    );
    row!(
        out,
        "  Engraver {}  AGV {}  Total {}",
        format_currency(summary.total_engraver_cost_eur, currency),
        format_currency(summary.total_agv_cost_eur, currency),
        format_currency(summary.grand_total_eur, currency)
    );
    out
}

pub fn history(list: &HistoryListResponse) -> String {
    let mut out = String::new();
    row!(out, "History (showing {} of {})", list.showing, list.total);
    for run in &list.history {
        let cost = run
            .cycle_summary
            .as_ref()
            .map(|s| format_currency(s.combined_cost_eur, &run.config_snapshot.currency))
            .unwrap_or_else(|| "-".to_string());
        row!(
            out,
            "  {:<40} {:<9} {:<10} {:>3} job(s) {:>14}  {}",
            run.run_id,
            run.site,
            run.status.as_str(),
            run.jobs_processed.len(),
            cost,
            format_timestamp(Some(&run.started_at))
        );
    }
    out
}

pub fn run(run: &RunRecord) -> String {
    let mut out = String::new();
    row!(out, "Run {}", run.run_id);
    row!(out, "  Site     {}", run.site);
    row!(out, "  Status   {}", run.status);
    row!(out, "  Started  {}", format_timestamp(Some(&run.started_at)));
    row!(out, "  Ended    {}", format_timestamp(run.ended_at.as_deref()));
    if !run.jobs_processed.is_empty() {
        row!(out, "  Jobs     {}", run.jobs_processed.join(", "));
    }
    if let Some(summary) = &run.cycle_summary {
        let currency = run.config_snapshot.currency.as_str();
        row!(out, "  Order    {}", summary.order_ref);
        row!(
            out,
            "  AGV      {:.3} m  {}",
            summary.agv_billed_meters,
            format_currency(summary.agv_cost_eur, currency)
        );
        row!(
            out,
            "  Engraver {:.6} kWh  {}",
            summary.engraver_energy_kwh,
            format_currency(summary.engraver_cost_eur, currency)
        );
        row!(
            out,
            "  Total    {}",
            format_currency(summary.combined_cost_eur, currency)
        );
    }
    if let Some(error) = &run.error {
        row!(out, "  Error    {error}");
    }
    out
}

pub fn history_stats(stats: &HistoryStats, currency: &str) -> String {
    let mut out = String::new();
    row!(
        out,
        "Runs {} (completed {}, errors {}), {} job(s)",
        stats.total_runs,
        stats.completed_runs,
        stats.error_runs,
        stats.total_jobs
    );
    row!(
        out,
        "Energy {:.6} kWh  CO2 {:.3} g  Cost {}  Avg/run {}",
        stats.total_energy_kwh,
        stats.total_co2_g,
        format_currency(stats.total_cost_eur, currency),
        format_currency(stats.avg_cost_per_run, currency)
    );
    out
}

pub fn config(response: &ConfigResponse) -> String {
    let config = &response.config;
    let mut out = String::new();
    if let Some(message) = &response.message {
        row!(out, "{message}");
    }
    row!(out, "Currency          {}", config.currency);
    row!(out, "Engraver");
    row!(
        out,
        "  emission factor   {} g/kWh",
        config.engraver.emission_factor_g_per_kwh
    );
    row!(
        out,
        "  energy price      {}/kWh",
        format_currency(config.engraver.cost_per_energy_unit_eur_per_kwh, &config.currency)
    );
    row!(out, "  base idle         {} kWh", config.engraver.base_idle_kwh);
    row!(
        out,
        "  laser             {} kWh/s at power 1",
        config.engraver.k_laser_kwh_per_sec_at_power1
    );
    row!(out, "  power preset      {}", config.engraver.default_power_preset);
    row!(out, "  seconds/letter    {}", config.engraver.seconds_per_letter);
    row!(out, "AGV");
    row!(
        out,
        "  price             {}/m",
        format_currency(config.agv.cost_per_meter_eur, &config.currency)
    );
    row!(out, "  speed             {} m/s", config.agv.speed_m_per_s);
    row!(out, "Progress step     {}%", config.progress_step);
    row!(out, "Poll interval     {} s", config.poll_interval_s);
    row!(out, "Coordinates");
    for (site, (x, y)) in &response.coords {
        row!(out, "  {site:<15} ({x}, {y})");
    }
    out
}

/// One line per event stream update.
pub fn event(snapshot: &EventSnapshot) -> String {
    let engraver = &snapshot.devices.engraver;
    let agv = &snapshot.devices.agv;
    format!(
        "{} engraver {} {} | agv {} ({:.2}, {:.2}) | queue {} | window {} | total {}",
        snapshot.timestamp,
        engraver.status.operation_mode,
        format_progress(f64::from(engraver.status.production_progress)),
        agv.status.operation_mode,
        agv.pose.pos_x,
        agv.pose.pos_y,
        snapshot.queue.length,
        if snapshot.orchestrator.billing_window_active { "on" } else { "off" },
        format_currency(snapshot.combined_billing.total_cost, &engraver.billing.currency)
    )
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
