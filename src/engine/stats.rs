use crate::adaptors::InterfaceDiscovery;
use crate::container::{ContainerID, ContainerState};
use crate::docker::{RequestKind, Transport};
use crate::registry::Container;
use crate::sample::{CounterSample, DiskCounters, NetCounters, SampleSink, Telemetry};

use super::Engine;
use super::models::{BlkioEntry, Inspect, Stats};

impl<T, S, D> Engine<T, S, D>
where
    T: Transport,
    S: SampleSink,
    D: InterfaceDiscovery,
{
    /// Requests the metadata of container `id`.
    pub(super) fn inspect(&mut self, id: &ContainerID, now: u64) {
        let Some(container) = self.registry.get_mut(id.as_ref()) else {
            return;
        };
        container.inspect_sent = true;
        container.outstanding += 1;
        self.request(RequestKind::Inspect, Some(id.clone()), now);
    }

    /// Requests the current usage counters of container `id`.
    pub(super) fn stats(&mut self, id: &ContainerID, now: u64) {
        let Some(container) = self.registry.get_mut(id.as_ref()) else {
            return;
        };
        container.stats_sent = true;
        container.outstanding += 1;
        self.request(RequestKind::Stats, Some(id.clone()), now);
    }

    /// Like [`Self::stats`], but not sent before `eligible_at`.
    fn deferred_stats(&mut self, id: &ContainerID, eligible_at: u64) {
        let Some(container) = self.registry.get_mut(id.as_ref()) else {
            return;
        };
        container.stats_sent = true;
        container.outstanding += 1;
        let command = RequestKind::Stats.command(&self.settings.api_version, Some(id));
        self.scheduler
            .issue_deferred(RequestKind::Stats, command, Some(id.clone()), eligible_at);
    }

    pub(super) fn handle_inspect(&mut self, body: &str, now: u64) {
        let inspect: Inspect = match serde_json::from_str(body) {
            Ok(inspect) => inspect,
            Err(err) => {
                log::debug!("dropping undecodable inspect response: {}", err);
                return;
            }
        };
        let Inspect {
            id: Some(id),
            name: Some(name),
            state: Some(state),
            config: Some(config),
            host_config: Some(host_config),
        } = inspect
        else {
            log::debug!("inspect response is missing fields");
            return;
        };
        if self.registry.get(&id).is_none() {
            return;
        }

        self.registry.set_name(&id, &name);
        if let Some(hostname) = &config.hostname {
            self.registry.set_hostname(&id, hostname);
        }
        let Some(container) = self.registry.get_mut(&id) else {
            return;
        };
        if let Some(pid) = state.pid {
            container.pid = pid;
        }
        if let Some(status) = &state.status {
            container.state = ContainerState::parse(status);
        }
        if state.running == Some(true) {
            container.state = ContainerState::Running;
        }
        if let Some(memory) = host_config.memory {
            container.memory_limit = memory;
        }
        if let Some(cpus) = host_config.cpu_count {
            container.cpu_count = cpus;
        }
        if let Some(nano_cpus) = host_config.nano_cpus {
            container.cpu_count_fractional = nano_cpus as f64 / 1e9;
        }
        container.inspect_received = true;
        container.next_poll = Some(now + self.settings.poll_interval);

        let pid = container.pid;
        let id = container.id().clone();
        container.adaptors = self.discovery.discover(pid);

        // baseline sample, so that downstream deltas start from zero
        self.emit_sample(&id, now);
        self.deferred_stats(&id, now + self.settings.timings.stats_wait);
    }

    pub(super) fn handle_stats(&mut self, id: &ContainerID, body: &str, now: u64) {
        let stats: Stats = match serde_json::from_str(body) {
            Ok(stats) => stats,
            Err(err) => {
                log::debug!("dropping undecodable stats response: {}", err);
                return;
            }
        };
        let Some(container) = self.registry.get_mut(id.as_ref()) else {
            return;
        };
        merge_stats(container, &stats);
        container.stats_received = true;
        self.emit_sample(id, now);
    }

    pub(super) fn emit_sample(&mut self, id: &ContainerID, now: u64) {
        let Some(container) = self.registry.get(id.as_ref()) else {
            return;
        };
        let hostname = container.reported_name(self.settings.name_source);
        let sample = CounterSample::new(container, hostname, &self.settings.os_release, now);
        log::debug!("sample for {} ({})", sample.hostname, id.short());
        self.submit(Telemetry::Sample(sample));
    }

    /// Asks for fresh counters of every inspected, running container that is due.
    pub(super) fn poll_due(&mut self, now: u64) {
        let interval = self.settings.poll_interval;
        let mut due = Vec::new();
        for container in self.registry.iter_mut() {
            let Some(next) = container.next_poll else {
                continue;
            };
            if next > now || !container.inspect_received || !container.state.is_running() {
                continue;
            }
            let next = next + interval;
            container.next_poll = Some(if next <= now { now + interval } else { next });
            due.push(container.id().clone());
        }
        for id in due {
            self.stats(&id, now);
        }
    }
}

fn merge_stats(container: &mut Container, stats: &Stats) {
    if let Some(total) = stats
        .cpu_stats
        .as_ref()
        .and_then(|cpu| cpu.cpu_usage.as_ref())
        .and_then(|usage| usage.total_usage)
    {
        container.cpu_total_ns = total;
    }

    if let Some(memory) = &stats.memory_stats {
        if let Some(usage) = memory.usage {
            container.memory_usage = usage;
        }
        // some engines only report the limit here
        if let Some(limit) = memory.limit {
            container.memory_limit = limit;
        }
    }

    if let Some(networks) = &stats.networks {
        let mut net = NetCounters::default();
        for dev in networks.values() {
            net.bytes_in += dev.rx_bytes;
            net.pkts_in += dev.rx_packets;
            net.drops_in += dev.rx_dropped;
            net.errs_in += dev.rx_errors;
            net.bytes_out += dev.tx_bytes;
            net.pkts_out += dev.tx_packets;
            net.drops_out += dev.tx_dropped;
            net.errs_out += dev.tx_errors;
        }
        container.net = net;
    }

    if let Some(blkio) = &stats.blkio_stats {
        let mut disk = DiskCounters::default();
        let (rd_bytes, wr_bytes) = sum_read_write(blkio.io_service_bytes_recursive.as_deref());
        let (rd_req, wr_req) = sum_read_write(blkio.io_serviced_recursive.as_deref());
        disk.rd_bytes = rd_bytes;
        disk.wr_bytes = wr_bytes;
        disk.rd_req = rd_req;
        disk.wr_req = wr_req;
        container.disk = disk;
    }
}

/// Sums the `Read` and `Write` entries across devices. `Sync`, `Async` and `Total`
/// repeat the same traffic and are skipped.
fn sum_read_write(entries: Option<&[BlkioEntry]>) -> (u64, u64) {
    let mut read = 0;
    let mut write = 0;
    for entry in entries.unwrap_or_default() {
        let value = entry.value.unwrap_or(0);
        if value == 0 {
            continue;
        }
        match entry.op.as_deref() {
            Some("Read") => read += value,
            Some("Write") => write += value,
            _ => {}
        }
    }
    (read, write)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: &str, value: u64) -> BlkioEntry {
        BlkioEntry {
            op: Some(op.to_owned()),
            value: Some(value),
        }
    }

    #[test]
    fn test_sum_read_write_skips_aggregates() {
        let entries = [
            entry("Read", 100),
            entry("Write", 0),
            entry("Sync", 100),
            entry("Async", 0),
            entry("Total", 100),
            entry("Read", 50),
            entry("Write", 7),
            entry("Total", 57),
        ];
        assert_eq!(sum_read_write(Some(&entries)), (150, 7));
        assert_eq!(sum_read_write(None), (0, 0));
    }
}
