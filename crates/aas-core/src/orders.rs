//! Queue jobs and order number conventions.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::sim_config::JOB_POS1;

/// Job waiting in the orchestrator queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJob {
    pub order_no: String,
    pub laser_text: String,
    #[serde(default = "default_site")]
    pub site: String,
}

fn default_site() -> String {
    JOB_POS1.to_string()
}

impl QueueJob {
    pub fn new(
        order_no: impl Into<String>,
        laser_text: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            order_no: order_no.into(),
            laser_text: laser_text.into(),
            site: site.into(),
        }
    }

    /// Number of engraved characters.
    pub fn letters(&self) -> usize {
        self.laser_text.chars().count()
    }
}

/// Server-side order number: `{prefix}-{MMDDHHMM}`.
///
/// Minute resolution; batch jobs append a two-digit sequence to stay unique.
pub fn generate_order_number<Tz: TimeZone>(prefix: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}", prefix, now.format("%m%d%H%M"))
}

/// Order number of the `index`-th (0-based) job of a batch.
pub fn batch_order_number<Tz: TimeZone>(now: &DateTime<Tz>, index: usize) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{:02}", generate_order_number("B", now), index + 1)
}

/// Checks the `X-NNNN` order number format (one uppercase ASCII letter, dash, four digits).
pub fn validate_order_format(order_no: &str) -> bool {
    let bytes = order_no.as_bytes();
    bytes.len() == 6
        && bytes[0].is_ascii_uppercase()
        && bytes[1] == b'-'
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_generate_order_number() {
        let now = at("2025-01-01T01:01:30Z");
        assert_eq!(generate_order_number("D", &now), "D-01010101");
    }

    #[test]
    fn test_batch_order_numbers() {
        let now = at("2025-11-23T14:05:00Z");
        assert_eq!(batch_order_number(&now, 0), "B-1123140501");
        assert_eq!(batch_order_number(&now, 4), "B-1123140505");
    }

    #[test]
    fn test_validate_order_format() {
        assert!(validate_order_format("E-1001"));
        assert!(validate_order_format("Z-0000"));
        assert!(!validate_order_format("e-1001"));
        assert!(!validate_order_format("E-100"));
        assert!(!validate_order_format("E-10011"));
        assert!(!validate_order_format("EE1001"));
        assert!(!validate_order_format("D-01010101"));
        assert!(!validate_order_format(""));
    }

    #[test]
    fn test_queue_job_wire_and_letters() {
        let job: QueueJob =
            serde_json::from_str(r#"{"orderNo": "E-1001", "laserText": "HÉLLO"}"#).unwrap();
        assert_eq!(job.site, "JOB_POS1");
        assert_eq!(job.letters(), 5);

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["orderNo"], "E-1001");
        assert_eq!(json["laserText"], "HÉLLO");
    }
}
