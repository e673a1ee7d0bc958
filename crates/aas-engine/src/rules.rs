//! Simulation constants and the predefined scenarios.

use std::fmt;
use std::time::Duration;

use aas_core::{QueueJob, JOB_POS1, JOB_POS2};

/// AGV simulation step.
pub const TICK: Duration = Duration::from_millis(100);

/// Laser power factor of the default preset.
pub const POWER_FACTOR: f64 = 1.0;

/// Queue entries included in an event snapshot.
pub const SNAPSHOT_QUEUE_JOBS: usize = 10;

/// Predefined demonstration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Three jobs at one site, one billed round trip.
    SameSite,
    /// Two jobs at two sites, two billed round trips.
    TwoSites,
}

impl Scenario {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::SameSite),
            2 => Some(Self::TwoSites),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::SameSite => 1,
            Self::TwoSites => 2,
        }
    }

    pub fn jobs(&self) -> Vec<QueueJob> {
        match self {
            Self::SameSite => vec![
                QueueJob::new("E-1001", "HELLO", JOB_POS1),
                QueueJob::new("E-1002", "WORLD", JOB_POS1),
                QueueJob::new("E-1003", "TEST", JOB_POS1),
            ],
            Self::TwoSites => vec![
                QueueJob::new("E-2001", "SMART", JOB_POS1),
                QueueJob::new("E-2002", "FACTORY", JOB_POS2),
            ],
        }
    }

    pub fn order_numbers(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.order_no).collect()
    }

    /// Site recorded in the run history.
    pub fn history_site(&self) -> &'static str {
        match self {
            Self::SameSite => JOB_POS1,
            Self::TwoSites => "MULTI",
        }
    }

    pub fn cycles(&self) -> usize {
        match self {
            Self::SameSite => 1,
            Self::TwoSites => 2,
        }
    }

    pub fn start_message(&self) -> &'static str {
        match self {
            Self::SameSite => "Scenario 1 started: Multiple jobs at same site",
            Self::TwoSites => "Scenario 2 started: Jobs at two different sites",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scenario{}", self.number())
    }
}
