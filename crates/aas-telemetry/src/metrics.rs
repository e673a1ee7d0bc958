//! Prometheus metrics for the AAS simulation.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A failure means a
//! duplicate metric name, which is a programming error caught on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge, Counter, CounterVec, Encoder, HistogramVec, IntCounterVec, IntGauge,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Finished runs.
/// Labels: kind (cycle/scenario/direct/batch), status (completed/error/no_jobs)
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aas_runs_total",
        "Total simulation runs by kind and final status",
        &["kind", "status"]
    )
    .unwrap()
});

/// Engraved jobs.
/// Labels: source (direct/batch/scenario/queue)
pub static JOBS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aas_jobs_processed_total",
        "Total engraving jobs processed",
        &["source"]
    )
    .unwrap()
});

/// Billed AGV distance.
pub static AGV_BILLED_METERS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "aas_agv_billed_meters_total",
        "AGV distance travelled on billed legs, in meters"
    )
    .unwrap()
});

/// Engraver energy.
pub static ENGRAVER_ENERGY_KWH_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "aas_engraver_energy_kwh_total",
        "Engraver energy consumed, in kWh"
    )
    .unwrap()
});

/// Billed amount.
/// Labels: device (engraver/agv)
pub static BILLED_COST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aas_billed_cost_total",
        "Usage cost billed, in configured currency",
        &["device"]
    )
    .unwrap()
});

/// Wall-clock duration of a cycle.
pub static CYCLE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "aas_cycle_duration_seconds",
        "Duration of a complete AGV round trip including engraving",
        &["site"],
        vec![5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0, 120.0, 300.0]
    )
    .unwrap()
});

/// Jobs waiting in the queue.
pub static QUEUE_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("aas_queue_length", "Jobs waiting in the orchestrator queue").unwrap()
});

/// Open event stream connections.
pub static SSE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("aas_sse_connections", "Open server-sent event connections").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished run.
    pub fn run_finished(kind: &str, status: &str) {
        RUNS_TOTAL.with_label_values(&[kind, status]).inc();
    }

    /// Record engraved jobs.
    pub fn jobs_processed(source: &str, count: usize) {
        JOBS_PROCESSED_TOTAL
            .with_label_values(&[source])
            .inc_by(count as u64);
    }

    /// Record billed usage of one cycle. Negative values are ignored.
    pub fn usage_billed(agv_meters: f64, agv_cost: f64, energy_kwh: f64, engraver_cost: f64) {
        if agv_meters > 0.0 {
            AGV_BILLED_METERS_TOTAL.inc_by(agv_meters);
        }
        if energy_kwh > 0.0 {
            ENGRAVER_ENERGY_KWH_TOTAL.inc_by(energy_kwh);
        }
        if agv_cost > 0.0 {
            BILLED_COST_TOTAL.with_label_values(&["agv"]).inc_by(agv_cost);
        }
        if engraver_cost > 0.0 {
            BILLED_COST_TOTAL
                .with_label_values(&["engraver"])
                .inc_by(engraver_cost);
        }
    }

    /// Record cycle duration.
    pub fn cycle_duration(site: &str, seconds: f64) {
        CYCLE_DURATION_SECONDS
            .with_label_values(&[site])
            .observe(seconds);
    }

    /// Set queue length.
    pub fn queue_length(len: usize) {
        QUEUE_LENGTH.set(len as i64);
    }

    pub fn sse_connected() {
        SSE_CONNECTIONS.inc();
    }

    pub fn sse_disconnected() {
        SSE_CONNECTIONS.dec();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
