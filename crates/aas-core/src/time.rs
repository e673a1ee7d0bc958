//! Timestamp helpers.
//!
//! Device submodels carry UTC timestamps with an explicit offset; run
//! history and export metadata use naive local time.

use chrono::{Local, SecondsFormat, Utc};

/// Current UTC time as ISO8601 with microseconds and `+00:00` offset.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Current local time as ISO8601 without offset.
pub fn local_now_iso() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Compact local timestamp (`YYYYmmdd_HHMMSS`) used in run ids and file names.
pub fn local_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_has_offset() {
        let ts = now_iso();
        assert!(ts.ends_with("+00:00"));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_local_stamp_shape() {
        let stamp = local_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }
}
