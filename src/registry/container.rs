use crate::adaptors::Adaptor;
use crate::container::{ContainerEvent, ContainerID, ContainerState, ContainerUuid};
use crate::sample::{DiskCounters, NetCounters};

/// Longest host name a sample may carry.
pub const MAX_HOSTNAME_LEN: usize = 64;

/// Which container attribute is reported as the sample's host name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameSource {
    #[default]
    Name,
    Hostname,
}

/// State of one tracked container.
///
/// Identity and the name/hostname pair are owned by the [`Registry`](super::Registry),
/// which keeps them consistent with its indexes; everything else is plain data updated
/// by the engine.
#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerID,
    uuid: ContainerUuid,
    pub(super) name: Option<String>,
    pub(super) hostname: Option<String>,
    pub(super) name_dup: bool,
    pub(super) hostname_dup: bool,

    pub pid: u32,
    pub last_event: Option<ContainerEvent>,
    pub state: ContainerState,
    pub inspect_sent: bool,
    pub inspect_received: bool,
    pub stats_sent: bool,
    pub stats_received: bool,

    pub memory_limit: u64,
    pub cpu_count: u32,
    pub cpu_count_fractional: f64,
    pub cpu_total_ns: u64,
    pub memory_usage: u64,
    pub net: NetCounters,
    pub disk: DiskCounters,
    pub adaptors: Vec<Adaptor>,

    /// Inspect/stats requests issued for this container and not yet resolved.
    pub outstanding: u32,
    /// When counters are next due, once inspected.
    pub next_poll: Option<u64>,
}

impl Container {
    pub fn new(id: ContainerID, uuid: ContainerUuid) -> Self {
        Self {
            id,
            uuid,
            name: None,
            hostname: None,
            name_dup: false,
            hostname_dup: false,
            pid: 0,
            last_event: None,
            state: ContainerState::default(),
            inspect_sent: false,
            inspect_received: false,
            stats_sent: false,
            stats_received: false,
            memory_limit: 0,
            cpu_count: 0,
            cpu_count_fractional: 0.0,
            cpu_total_ns: 0,
            memory_usage: 0,
            net: NetCounters::default(),
            disk: DiskCounters::default(),
            adaptors: Vec::new(),
            outstanding: 0,
            next_poll: None,
        }
    }

    pub fn id(&self) -> &ContainerID {
        &self.id
    }

    pub fn uuid(&self) -> ContainerUuid {
        self.uuid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn is_duplicate_name(&self) -> bool {
        self.name_dup
    }

    pub fn is_duplicate_hostname(&self) -> bool {
        self.hostname_dup
    }

    pub(super) fn label_mut(&mut self, source: NameSource) -> (&mut Option<String>, &mut bool) {
        match source {
            NameSource::Name => (&mut self.name, &mut self.name_dup),
            NameSource::Hostname => (&mut self.hostname, &mut self.hostname_dup),
        }
    }

    /// Whether the container may be forgotten: it has left the running state as seen
    /// through an event, and nothing is still in flight for it.
    pub fn is_finished(&self) -> bool {
        self.last_event.is_some() && !self.state.is_running() && self.outstanding == 0
    }

    /// The host name reported downstream.
    ///
    /// A duplicate becomes `<name>.<short-id>` so that it stays distinguishable without
    /// renaming the container itself. The result never exceeds [`MAX_HOSTNAME_LEN`] bytes.
    pub fn reported_name(&self, source: NameSource) -> String {
        let (label, duplicate) = match source {
            NameSource::Name => (self.name.as_deref(), self.name_dup),
            NameSource::Hostname => (
                self.hostname.as_deref().or(self.name.as_deref()),
                self.hostname_dup,
            ),
        };
        let label = label.unwrap_or_else(|| self.id.short());
        let mut name = if duplicate {
            format!("{}.{}", label, self.id.short())
        } else {
            label.to_owned()
        };
        truncate_at_char_boundary(&mut name, MAX_HOSTNAME_LEN);
        name
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
