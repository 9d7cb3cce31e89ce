use sqlx::{
    mysql::{MySql, MySqlArguments},
    query::Query,
};

use crate::adaptors::Adaptor;
use crate::container::ContainerUuid;
use crate::sample::CounterSample;

/// A container uuid stored as `BINARY(16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UuidColumn(pub [u8; 16]);

impl UuidColumn {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<ContainerUuid> for UuidColumn {
    fn from(value: ContainerUuid) -> Self {
        Self(value.as_raw())
    }
}

/// Flat row of the `counter_samples` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp: u64,
    pub uuid: UuidColumn,
    pub container_id: String,
    pub hostname: String,
    pub os_release: String,
    pub domain_state: String,
    pub vcpus: u32,
    pub cpu_time_ms: u64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub net_bytes_in: u64,
    pub net_pkts_in: u64,
    pub net_errs_in: u64,
    pub net_drops_in: u64,
    pub net_bytes_out: u64,
    pub net_pkts_out: u64,
    pub net_errs_out: u64,
    pub net_drops_out: u64,
    pub disk_rd_req: u64,
    pub disk_rd_bytes: u64,
    pub disk_wr_req: u64,
    pub disk_wr_bytes: u64,
}

impl SampleRow {
    pub fn bind_all<'q>(
        &'q self,
        query: Query<'q, MySql, MySqlArguments>,
    ) -> Query<'q, MySql, MySqlArguments> {
        query
            .bind(self.timestamp)
            .bind(self.uuid.as_slice())
            .bind(self.container_id.as_str())
            .bind(self.hostname.as_str())
            .bind(self.os_release.as_str())
            .bind(self.domain_state.as_str())
            .bind(self.vcpus)
            .bind(self.cpu_time_ms)
            .bind(self.memory_usage)
            .bind(self.memory_limit)
            .bind(self.net_bytes_in)
            .bind(self.net_pkts_in)
            .bind(self.net_errs_in)
            .bind(self.net_drops_in)
            .bind(self.net_bytes_out)
            .bind(self.net_pkts_out)
            .bind(self.net_errs_out)
            .bind(self.net_drops_out)
            .bind(self.disk_rd_req)
            .bind(self.disk_rd_bytes)
            .bind(self.disk_wr_req)
            .bind(self.disk_wr_bytes)
    }
}

impl From<&CounterSample> for SampleRow {
    fn from(sample: &CounterSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            uuid: sample.uuid.into(),
            container_id: sample.container_id.clone(),
            hostname: sample.hostname.clone(),
            os_release: sample.os_release.clone(),
            domain_state: sample.cpu.state.as_str().to_owned(),
            vcpus: sample.cpu.vcpus,
            cpu_time_ms: sample.cpu.cpu_time_ms,
            memory_usage: sample.memory.usage,
            memory_limit: sample.memory.limit,
            net_bytes_in: sample.net.bytes_in,
            net_pkts_in: sample.net.pkts_in,
            net_errs_in: sample.net.errs_in,
            net_drops_in: sample.net.drops_in,
            net_bytes_out: sample.net.bytes_out,
            net_pkts_out: sample.net.pkts_out,
            net_errs_out: sample.net.errs_out,
            net_drops_out: sample.net.drops_out,
            disk_rd_req: sample.disk.rd_req,
            disk_rd_bytes: sample.disk.rd_bytes,
            disk_wr_req: sample.disk.wr_req,
            disk_wr_bytes: sample.disk.wr_bytes,
        }
    }
}

/// One adaptor of a persisted sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptorRow {
    pub ifindex: u32,
    pub name: String,
    pub mac: String,
}

impl From<&Adaptor> for AdaptorRow {
    fn from(adaptor: &Adaptor) -> Self {
        Self {
            ifindex: adaptor.ifindex,
            name: adaptor.name.clone(),
            mac: adaptor.mac.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptors::MacAddress;
    use crate::container::{ContainerID, ContainerState};
    use crate::registry::Container;

    #[test]
    fn test_sample_row_flattens_sample() {
        let id = ContainerID::new("2e781c0358b9940f7bc8399903b5af0d1f6a").unwrap();
        let uuid = ContainerUuid::derive(&id).unwrap();
        let mut container = Container::new(id, uuid);
        container.state = ContainerState::Paused;
        container.cpu_count = 4;
        container.cpu_total_ns = 2_500_000_000;
        container.memory_usage = 10;
        container.memory_limit = 20;
        container.net.bytes_in = 7;
        container.disk.wr_bytes = 9;

        let sample = CounterSample::new(&container, "web".to_owned(), "6.1.0", 42);
        let row = SampleRow::from(&sample);
        assert_eq!(row.timestamp, 42);
        assert_eq!(row.uuid.as_slice(), uuid.as_raw().as_slice());
        assert_eq!(row.container_id, "2e781c0358b9940f7bc8399903b5af0d1f6a");
        assert_eq!(row.hostname, "web");
        assert_eq!(row.domain_state, "paused");
        assert_eq!(row.vcpus, 4);
        assert_eq!(row.cpu_time_ms, 2500);
        assert_eq!(row.memory_usage, 10);
        assert_eq!(row.memory_limit, 20);
        assert_eq!(row.net_bytes_in, 7);
        assert_eq!(row.disk_wr_bytes, 9);
    }

    #[test]
    fn test_adaptor_row_formats_mac() {
        let adaptor = Adaptor {
            ifindex: 12,
            name: "eth0".to_owned(),
            mac: MacAddress::new([0x02, 0x42, 0xac, 0x11, 0x00, 0x02]),
        };
        assert_eq!(AdaptorRow::from(&adaptor), AdaptorRow {
            ifindex: 12,
            name: "eth0".to_owned(),
            mac: "02:42:ac:11:00:02".to_owned(),
        });
    }
}
