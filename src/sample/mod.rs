//! Counter samples and their handoff out of the engine.
//!
//! The engine runs on a single task and must never block on a consumer, so samples
//! cross over through a bounded channel ([`ChannelSink`]). The consumer side keeps the
//! latest sample of every container in a [`SampleStore`].

mod error;
mod store;

pub use error::SinkError;
pub use store::SampleStore;

use crate::adaptors::Adaptor;
use crate::container::{ContainerState, ContainerUuid};
use crate::persistence::SamplePersister;
use crate::registry::Container;

/// Data source index of the physical host every container is parented to.
pub const PHYSICAL_DS_INDEX: u32 = 1;

/// Virtual network I/O totals, summed across all of a container's interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct NetCounters {
    pub bytes_in: u64,
    pub pkts_in: u64,
    pub errs_in: u64,
    pub drops_in: u64,
    pub bytes_out: u64,
    pub pkts_out: u64,
    pub errs_out: u64,
    pub drops_out: u64,
}

/// Virtual block I/O totals, summed across all of a container's block devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct DiskCounters {
    pub rd_req: u64,
    pub rd_bytes: u64,
    pub wr_req: u64,
    pub wr_bytes: u64,
}

/// Virtual domain state, as reported for a container's CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
    NoState,
    Running,
    Paused,
    Shutoff,
    Shutdown,
}

impl DomainState {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainState::NoState => "nostate",
            DomainState::Running => "running",
            DomainState::Paused => "paused",
            DomainState::Shutoff => "shutoff",
            DomainState::Shutdown => "shutdown",
        }
    }
}

impl From<ContainerState> for DomainState {
    fn from(state: ContainerState) -> Self {
        match state {
            ContainerState::Running => DomainState::Running,
            ContainerState::Paused => DomainState::Paused,
            ContainerState::Stopped => DomainState::Shutoff,
            ContainerState::Exited | ContainerState::Deleted => DomainState::Shutdown,
            ContainerState::Created | ContainerState::Unknown => DomainState::NoState,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ParentLink {
    pub ds_class: &'static str,
    pub ds_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct VirtualCpu {
    pub state: DomainState,
    pub vcpus: u32,
    pub cpu_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct VirtualMemory {
    pub usage: u64,
    pub limit: u64,
}

/// One standardized usage record for one container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CounterSample {
    pub timestamp: u64,
    pub hostname: String,
    pub uuid: ContainerUuid,
    pub container_id: String,
    pub os_name: &'static str,
    pub os_release: String,
    pub parent: ParentLink,
    pub net: NetCounters,
    pub cpu: VirtualCpu,
    pub memory: VirtualMemory,
    pub disk: DiskCounters,
    pub adaptors: Vec<Adaptor>,
}

impl CounterSample {
    /// Snapshots the counters of `container` under the externally reported `hostname`.
    pub fn new(container: &Container, hostname: String, os_release: &str, timestamp: u64) -> Self {
        let vcpus = if container.cpu_count > 0 {
            container.cpu_count
        } else {
            container.cpu_count_fractional.round() as u32
        };
        Self {
            timestamp,
            hostname,
            uuid: container.uuid(),
            container_id: container.id().to_string(),
            os_name: "linux",
            os_release: os_release.to_owned(),
            parent: ParentLink {
                ds_class: "physical_entity",
                ds_index: PHYSICAL_DS_INDEX,
            },
            net: container.net,
            cpu: VirtualCpu {
                state: container.state.into(),
                vcpus,
                cpu_time_ms: container.cpu_total_ns / 1_000_000,
            },
            memory: VirtualMemory {
                usage: container.memory_usage,
                limit: container.memory_limit,
            },
            disk: container.disk,
            adaptors: container.adaptors.clone(),
        }
    }
}

/// What the engine hands to the outside world.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Sample(CounterSample),
    /// The container is gone; no further samples will follow.
    Retired(ContainerUuid),
}

/// Receiver of telemetry produced by the engine. Implementations must not block.
pub trait SampleSink {
    fn submit(&mut self, telemetry: Telemetry) -> Result<(), SinkError>;
}

/// Forwards telemetry over a bounded channel; a full channel is reported, never waited on.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<Telemetry>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<Telemetry>) -> Self {
        Self { tx }
    }
}

impl SampleSink for ChannelSink {
    fn submit(&mut self, telemetry: Telemetry) -> Result<(), SinkError> {
        use tokio::sync::mpsc::error::TrySendError;

        self.tx.try_send(telemetry).map_err(|err| match err {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Samples waiting for the database before new ones are dropped.
const PERSIST_CHANNEL_CAPACITY: usize = 256;

/// Applies every received message to `store` and, if given, hands samples to a
/// separate persistence task so that a slow database never holds up the store.
pub async fn consume<P>(
    mut rx: tokio::sync::mpsc::Receiver<Telemetry>,
    store: SampleStore,
    persister: Option<P>,
) where
    P: SamplePersister + Send + Sync + 'static,
{
    let persist_tx = persister.map(|persister| {
        let (tx, rx) = tokio::sync::mpsc::channel(PERSIST_CHANNEL_CAPACITY);
        tokio::spawn(persist(rx, persister));
        tx
    });

    while let Some(telemetry) = rx.recv().await {
        if let (Telemetry::Sample(sample), Some(tx)) = (&telemetry, &persist_tx) {
            if tx.try_send(sample.clone()).is_err() {
                log::warn!("persistence is lagging, sample of {} not stored", sample.uuid);
            }
        }
        store.apply(telemetry);
    }
    log::debug!("telemetry channel closed");
}

async fn persist<P: SamplePersister>(
    mut rx: tokio::sync::mpsc::Receiver<CounterSample>,
    persister: P,
) {
    while let Some(sample) = rx.recv().await {
        if let Err(err) = persister.persist_sample(&sample).await {
            log::error!("failed to persist sample: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerID;

    fn container() -> Container {
        let id = ContainerID::new("2e781c0358b9940f7bc8399903b5af0d1f6a").unwrap();
        let uuid = ContainerUuid::derive(&id).unwrap();
        Container::new(id, uuid)
    }

    #[test]
    fn test_domain_state_mapping() {
        let expected = [
            (ContainerState::Running, DomainState::Running),
            (ContainerState::Created, DomainState::NoState),
            (ContainerState::Unknown, DomainState::NoState),
            (ContainerState::Paused, DomainState::Paused),
            (ContainerState::Stopped, DomainState::Shutoff),
            (ContainerState::Exited, DomainState::Shutdown),
            (ContainerState::Deleted, DomainState::Shutdown),
        ];
        for (state, domain) in expected {
            assert_eq!(DomainState::from(state), domain, "state {state}");
        }
    }

    #[test]
    fn test_sample_from_container() {
        let mut c = container();
        c.state = ContainerState::Running;
        c.cpu_total_ns = 2_500_000_000;
        c.cpu_count_fractional = 1.6;
        c.memory_usage = 100;
        c.memory_limit = 200;
        c.net.bytes_in = 5;
        c.disk.rd_bytes = 7;

        let sample = CounterSample::new(&c, "web".to_owned(), "6.1.0", 99);
        assert_eq!(sample.hostname, "web");
        assert_eq!(sample.uuid.to_string(), "2e781c03-58b9-940f-7bc8-399903b5af0d");
        assert_eq!(sample.cpu.state, DomainState::Running);
        assert_eq!(sample.cpu.vcpus, 2);
        assert_eq!(sample.cpu.cpu_time_ms, 2500);
        assert_eq!(sample.memory, VirtualMemory { usage: 100, limit: 200 });
        assert_eq!(sample.net.bytes_in, 5);
        assert_eq!(sample.disk.rd_bytes, 7);
        assert_eq!(sample.parent.ds_index, PHYSICAL_DS_INDEX);
        assert_eq!(sample.timestamp, 99);

        c.cpu_count = 4;
        assert_eq!(CounterSample::new(&c, "web".to_owned(), "", 0).cpu.vcpus, 4);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);
        let uuid = container().uuid();
        sink.submit(Telemetry::Retired(uuid)).unwrap();
        assert!(matches!(
            sink.submit(Telemetry::Retired(uuid)),
            Err(SinkError::Full)
        ));
        assert_eq!(rx.try_recv().unwrap(), Telemetry::Retired(uuid));
        drop(rx);
        assert!(matches!(
            sink.submit(Telemetry::Retired(uuid)),
            Err(SinkError::Closed)
        ));
    }

    struct StalledPersister;

    impl SamplePersister for StalledPersister {
        fn persist_sample(
            &self,
            _sample: &CounterSample,
        ) -> impl std::future::Future<Output = crate::persistence::Result<()>> + Send {
            std::future::pending()
        }
    }

    #[tokio::test]
    async fn test_consume_does_not_wait_for_persistence() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let store = SampleStore::default();
        let task = tokio::spawn(consume(rx, store.clone(), Some(StalledPersister)));

        let c = container();
        for ts in 1..=3 {
            let sample = CounterSample::new(&c, "web".to_owned(), "", ts);
            tx.send(Telemetry::Sample(sample)).await.unwrap();
        }
        tx.send(Telemetry::Retired(c.uuid())).await.unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(store.size(), 0);
    }
}
