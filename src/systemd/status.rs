// Unit property snapshot

use crate::error::Result;
use crate::systemd::{PropertyMap, ServiceStatus, UnitManager, UNIT_NAME};
use std::sync::Arc;

/// Reads the tunnel unit's current properties; every call is a fresh round trip
#[derive(Clone)]
pub struct StatusQuery {
    manager: Arc<dyn UnitManager>,
}

impl StatusQuery {
    pub fn new(manager: Arc<dyn UnitManager>) -> Self {
        Self { manager }
    }

    /// Fetch the current status snapshot
    pub async fn status(&self) -> Result<ServiceStatus> {
        let props = self.manager.unit_properties(UNIT_NAME).await?;
        let status = ServiceStatus::from_properties(&props);

        tracing::debug!(
            "{} is {}/{} (pid {})",
            UNIT_NAME,
            status.active_state,
            status.sub_state,
            status.main_pid
        );

        Ok(status)
    }
}

impl ServiceStatus {
    /// Build a snapshot from the manager's property dictionary.
    ///
    /// Missing or wrong-typed properties take their zero value.
    pub fn from_properties(props: &PropertyMap) -> Self {
        Self {
            active_state: prop_string(props, "ActiveState"),
            sub_state: prop_string(props, "SubState"),
            load_state: prop_string(props, "LoadState"),
            description: prop_string(props, "Description"),
            main_pid: prop_u32(props, "MainPID"),
            memory_current: prop_counter(props, "MemoryCurrent"),
            cpu_usage_nsec: prop_counter(props, "CPUUsageNSec"),
        }
    }
}

pub(crate) fn prop_string(props: &PropertyMap, key: &str) -> String {
    props
        .get(key)
        .and_then(|v| v.downcast_ref::<String>().ok())
        .unwrap_or_default()
}

pub(crate) fn prop_u32(props: &PropertyMap, key: &str) -> u32 {
    props
        .get(key)
        .and_then(|v| v.downcast_ref::<u32>().ok())
        .unwrap_or(0)
}

pub(crate) fn prop_u64(props: &PropertyMap, key: &str) -> u64 {
    props
        .get(key)
        .and_then(|v| v.downcast_ref::<u64>().ok())
        .unwrap_or(0)
}

/// Accounting counters use `u64::MAX` for "[not set]", e.g. on a stopped unit
pub(crate) fn prop_counter(props: &PropertyMap, key: &str) -> u64 {
    match prop_u64(props, key) {
        u64::MAX => 0,
        value => value,
    }
}
