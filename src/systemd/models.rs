// Systemd data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The one unit this tool manages
pub const UNIT_NAME: &str = "cloudflared.service";

/// Conflict-resolution mode for every submitted job: a new job supersedes a pending one
pub const JOB_MODE: &str = "replace";

/// Job status reported by the manager for a successful job
pub const JOB_DONE: &str = "done";

/// Kind of state transition requested for a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Start,
    Stop,
    Restart,
}

impl JobKind {
    /// Manager method submitting this kind of job
    pub fn method(&self) -> &'static str {
        match self {
            JobKind::Start => "StartUnit",
            JobKind::Stop => "StopUnit",
            JobKind::Restart => "RestartUnit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Start => "start",
            JobKind::Stop => "stop",
            JobKind::Restart => "restart",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the unit's current properties, rebuilt on every query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "activeState")]
    pub active_state: String,
    #[serde(rename = "subState")]
    pub sub_state: String,
    #[serde(rename = "loadState")]
    pub load_state: String,
    pub description: String,
    #[serde(rename = "mainPID")]
    pub main_pid: u32,
    #[serde(rename = "memoryCurrent")]
    pub memory_current: u64,
    #[serde(rename = "cpuUsageNSec")]
    pub cpu_usage_nsec: u64,
}

impl ServiceStatus {
    /// Returns true if the service is currently active/running
    pub fn is_active(&self) -> bool {
        self.active_state == "active"
    }

    /// Returns true if the service failed
    pub fn is_failed(&self) -> bool {
        self.active_state == "failed"
    }

    /// Cumulative CPU time consumed by the unit
    pub fn cpu_time(&self) -> Duration {
        Duration::from_nanos(self.cpu_usage_nsec)
    }

    /// Format memory usage as human-readable string (e.g., "45.2 MiB")
    pub fn memory_formatted(&self) -> String {
        use byte_unit::{Byte, UnitType};

        Byte::from_u64(self.memory_current)
            .get_appropriate_unit(UnitType::Binary)
            .to_string()
    }
}
