//! Cumulative billing buckets and per-job billing records.
//!
//! Aggregates use snake_case wire names with unit suffixes
//! (`engraver_energy_kWh`, `agv_cost_eur`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time::now_iso;

/// Round to 6 decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Where a job came from. Direct and batch jobs are billed to the user bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Direct,
    Batch,
    Scenario,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Batch => "batch",
            Self::Scenario => "scenario",
        }
    }

    /// True for jobs submitted by a user (direct or batch).
    pub fn is_user(&self) -> bool {
        matches!(self, Self::Direct | Self::Batch)
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "batch" => Ok(Self::Batch),
            "scenario" => Ok(Self::Scenario),
            other => Err(format!("unknown job source '{other}'")),
        }
    }
}

/// Usage produced by one cycle, added to a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageDelta {
    pub engraver_energy_kwh: f64,
    pub engraver_co2_g: f64,
    pub engraver_cost_eur: f64,
    pub agv_distance_m: f64,
    pub agv_cost_eur: f64,
}

/// Running totals of one billing bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingTotals {
    #[serde(rename = "engraver_energy_kWh")]
    pub engraver_energy_kwh: f64,
    pub engraver_co2_g: f64,
    pub engraver_cost_eur: f64,
    pub agv_distance_m: f64,
    pub agv_cost_eur: f64,
    pub total_cost_eur: f64,
    pub jobs_processed: Vec<String>,
    pub last_updated: String,
}

impl Default for BillingTotals {
    fn default() -> Self {
        Self {
            engraver_energy_kwh: 0.0,
            engraver_co2_g: 0.0,
            engraver_cost_eur: 0.0,
            agv_distance_m: 0.0,
            agv_cost_eur: 0.0,
            total_cost_eur: 0.0,
            jobs_processed: Vec::new(),
            last_updated: now_iso(),
        }
    }
}

impl BillingTotals {
    /// Add a cycle's usage and the order numbers it processed.
    pub fn accumulate(&mut self, usage: &UsageDelta, jobs: &[String]) {
        self.engraver_energy_kwh += usage.engraver_energy_kwh;
        self.engraver_co2_g += usage.engraver_co2_g;
        self.engraver_cost_eur += usage.engraver_cost_eur;
        self.agv_distance_m += usage.agv_distance_m;
        self.agv_cost_eur += usage.agv_cost_eur;
        self.total_cost_eur = self.engraver_cost_eur + self.agv_cost_eur;
        self.jobs_processed.extend_from_slice(jobs);
        self.last_updated = now_iso();
    }

    pub fn is_empty(&self) -> bool {
        self.jobs_processed.is_empty()
    }
}

/// Cumulative billing split into user and scenario buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeBilling {
    #[serde(default)]
    pub user_jobs: BillingTotals,
    #[serde(default)]
    pub scenario_jobs: BillingTotals,
}

impl CumulativeBilling {
    pub fn bucket_mut(&mut self, source: JobSource) -> &mut BillingTotals {
        if source.is_user() {
            &mut self.user_jobs
        } else {
            &mut self.scenario_jobs
        }
    }

    pub fn record(&mut self, source: JobSource, usage: &UsageDelta, jobs: &[String]) {
        self.bucket_mut(source).accumulate(usage, jobs);
    }
}

/// Billing record of a single engraving job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub order_no: String,
    pub laser_text: String,
    pub letters: usize,
    #[serde(rename = "energy_kWh")]
    pub energy_kwh: f64,
    pub co2_g: f64,
    pub cost_eur: f64,
    pub completed_at: String,
}

/// Job record kept for the billing breakdown, with its share of the AGV trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualJob {
    #[serde(flatten)]
    pub details: JobDetails,
    pub source: JobSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub agv_distance_share: f64,
    pub agv_cost_share: f64,
    pub timestamp: String,
}

/// Totals over a list of individual jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualJobsSummary {
    pub total_jobs: usize,
    pub total_letters: usize,
    #[serde(rename = "total_energy_kWh")]
    pub total_energy_kwh: f64,
    pub total_co2_g: f64,
    pub total_engraver_cost_eur: f64,
    pub total_agv_distance_m: f64,
    pub total_agv_cost_eur: f64,
    pub grand_total_eur: f64,
}

impl IndividualJobsSummary {
    pub fn from_jobs(jobs: &[IndividualJob]) -> Self {
        let mut summary = Self {
            total_jobs: jobs.len(),
            ..Self::default()
        };
        for job in jobs {
            summary.total_letters += job.details.letters;
            summary.total_energy_kwh += job.details.energy_kwh;
            summary.total_co2_g += job.details.co2_g;
            summary.total_engraver_cost_eur += job.details.cost_eur;
            summary.total_agv_distance_m += job.agv_distance_share;
            summary.total_agv_cost_eur += job.agv_cost_share;
        }
        summary.grand_total_eur =
            round6(summary.total_engraver_cost_eur + summary.total_agv_cost_eur);
        summary.total_energy_kwh = round6(summary.total_energy_kwh);
        summary.total_co2_g = round6(summary.total_co2_g);
        summary.total_engraver_cost_eur = round6(summary.total_engraver_cost_eur);
        summary.total_agv_distance_m = round6(summary.total_agv_distance_m);
        summary.total_agv_cost_eur = round6(summary.total_agv_cost_eur);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(order_no: &str, letters: usize, cost: f64, agv_cost: f64) -> IndividualJob {
        IndividualJob {
            details: JobDetails {
                order_no: order_no.to_string(),
                laser_text: "X".repeat(letters),
                letters,
                energy_kwh: 0.1,
                co2_g: 36.0,
                cost_eur: cost,
                completed_at: now_iso(),
            },
            source: JobSource::Direct,
            site: Some("JOB_POS1".to_string()),
            run_id: None,
            agv_distance_share: 10.0,
            agv_cost_share: agv_cost,
            timestamp: now_iso(),
        }
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(0.1 + 0.01), 0.11);
        assert_eq!(round6(21.260292528148), 21.260293);
        assert_eq!(round6(-0.0000004), 0.0);
    }

    #[test]
    fn test_direct_and_batch_share_user_bucket() {
        let mut billing = CumulativeBilling::default();
        let usage = UsageDelta {
            engraver_energy_kwh: 10.0,
            engraver_co2_g: 100.0,
            engraver_cost_eur: 5.0,
            agv_distance_m: 100.0,
            agv_cost_eur: 10.0,
        };

        billing.record(JobSource::Direct, &usage, &["JOB-1".to_string()]);
        billing.record(JobSource::Batch, &usage, &["JOB-2".to_string()]);

        assert_eq!(billing.user_jobs.total_cost_eur, 30.0);
        assert_eq!(billing.user_jobs.jobs_processed, vec!["JOB-1", "JOB-2"]);
        assert!(billing.scenario_jobs.is_empty());
    }

    #[test]
    fn test_scenario_bucket() {
        let mut billing = CumulativeBilling::default();
        billing.record(
            JobSource::Scenario,
            &UsageDelta {
                engraver_cost_eur: 1.0,
                agv_cost_eur: 0.5,
                ..UsageDelta::default()
            },
            &["E-1001".to_string()],
        );
        assert_eq!(billing.scenario_jobs.total_cost_eur, 1.5);
        assert!(billing.user_jobs.is_empty());
    }

    #[test]
    fn test_totals_wire_names() {
        let json = serde_json::to_value(BillingTotals::default()).unwrap();
        assert!(json.get("engraver_energy_kWh").is_some());
        assert!(json.get("agv_distance_m").is_some());
        assert_eq!(json["jobs_processed"], serde_json::json!([]));
    }

    #[test]
    fn test_individual_job_is_flat() {
        let json = serde_json::to_value(job("D-01010101", 5, 0.03, 0.2)).unwrap();
        assert_eq!(json["order_no"], "D-01010101");
        assert_eq!(json["energy_kWh"], 0.1);
        assert_eq!(json["source"], "direct");
        assert!(json.get("run_id").is_none());

        let back: IndividualJob = serde_json::from_value(json).unwrap();
        assert_eq!(back.details.letters, 5);
    }

    #[test]
    fn test_summary_totals() {
        let jobs = vec![job("A", 5, 0.03, 0.2), job("B", 3, 0.02, 0.2)];
        let summary = IndividualJobsSummary::from_jobs(&jobs);

        assert_eq!(summary.total_jobs, 2);
        assert_eq!(summary.total_letters, 8);
        assert_eq!(summary.total_engraver_cost_eur, 0.05);
        assert_eq!(summary.total_agv_cost_eur, 0.4);
        assert_eq!(summary.grand_total_eur, 0.45);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = IndividualJobsSummary::from_jobs(&[]);
        assert_eq!(summary.total_jobs, 0);
        assert_eq!(summary.grand_total_eur, 0.0);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("batch".parse::<JobSource>().unwrap(), JobSource::Batch);
        assert!("user".parse::<JobSource>().is_err());
    }
}
