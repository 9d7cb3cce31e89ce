//! Typed views of the engine API documents.
//!
//! Only the fields that are used are modelled, and every one of them is optional: a
//! document missing something is skipped by the handler, it never fails to decode.

use std::collections::HashMap;

use serde::Deserialize;

/// One document from the event feed.
#[derive(Debug, Default, Deserialize)]
pub struct Event {
    pub status: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    #[serde(rename = "Action")]
    pub action: Option<String>,
    #[serde(rename = "Actor")]
    pub actor: Option<Actor>,
}

impl Event {
    /// Event status, falling back to the newer `Action` field.
    pub fn status(&self) -> Option<&str> {
        non_empty(self.status.as_deref()).or_else(|| non_empty(self.action.as_deref()))
    }

    /// Container id, falling back to the newer `Actor.ID` field.
    pub fn id(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
            .or_else(|| non_empty(self.actor.as_ref().and_then(|a| a.id.as_deref())))
    }

    pub fn name(&self) -> Option<&str> {
        self.actor
            .as_ref()?
            .attributes
            .as_ref()?
            .get("name")?
            .as_str()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Actor {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    #[serde(rename = "Attributes")]
    pub attributes: Option<HashMap<String, serde_json::Value>>,
}

/// One entry of the container listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListedContainer {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    #[serde(rename = "Names")]
    pub names: Option<Vec<String>>,
    #[serde(rename = "State")]
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Inspect {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<InspectState>,
    #[serde(rename = "Config")]
    pub config: Option<InspectConfig>,
    #[serde(rename = "HostConfig")]
    pub host_config: Option<HostConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectState {
    #[serde(rename = "Pid")]
    pub pid: Option<u32>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "Running")]
    pub running: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectConfig {
    #[serde(rename = "Hostname")]
    pub hostname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HostConfig {
    #[serde(rename = "Memory")]
    pub memory: Option<u64>,
    #[serde(rename = "CpuCount")]
    pub cpu_count: Option<u32>,
    #[serde(rename = "NanoCpus")]
    pub nano_cpus: Option<u64>,
}

/// Non-streaming usage stats of one container.
#[derive(Debug, Default, Deserialize)]
pub struct Stats {
    pub cpu_stats: Option<CpuStats>,
    pub memory_stats: Option<MemoryStats>,
    pub networks: Option<HashMap<String, NetworkStats>>,
    pub blkio_stats: Option<BlkioStats>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CpuStats {
    pub cpu_usage: Option<CpuUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CpuUsage {
    pub total_usage: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_dropped: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_dropped: u64,
    pub tx_errors: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
    pub io_serviced_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlkioEntry {
    pub op: Option<String>,
    pub value: Option<u64>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
