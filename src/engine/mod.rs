//! The container state synchronization engine.
//!
//! [`Engine`] is a plain, synchronous state machine. It never reads a clock or a
//! socket itself: the caller delivers timer ticks and socket traffic together with the
//! current time in seconds, and the engine reacts by issuing requests through its
//! [`Scheduler`] and by handing telemetry to its [`SampleSink`].
//!
//! The engine starts out unsynchronized. A resynchronization drops all state, opens the
//! event feed and then asks for the container listing; events arriving before the
//! listing is applied are buffered and replayed afterwards, in order. Losing the event
//! feed or the engine socket puts the engine into flush mode, which lasts until the
//! next resynchronization.

mod models;
mod stats;
mod sync;


use crate::adaptors::InterfaceDiscovery;
use crate::container::{ContainerID, ContainerUuid};
use crate::docker::{
    CloseStatus, DispatchFailure, RequestKind, Scheduler, SeqNo, SocketMessage, Transport,
    TransportError,
};
use crate::registry::{NameSource, Registry};
use crate::sample::{SampleSink, SinkError, Telemetry};

/// Fixed delays of the synchronization protocol, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Backoff after the engine socket could not be reached.
    pub no_socket: u64,
    /// Backoff after the event feed was lost and outstanding work drained.
    pub event_drop: u64,
    /// Delay from start to the first synchronization.
    pub startup: u64,
    /// Interval of the passive container listing recheck.
    pub recheck: u64,
    /// Delay of the first stats request after an inspect.
    pub stats_wait: u64,
    /// Age after which an unanswered request is considered lost.
    pub request_timeout: u64,
    /// One-shot requests allowed on the wire at once.
    pub max_concurrent: usize,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            no_socket: 10,
            event_drop: 5,
            startup: 2,
            recheck: 120,
            stats_wait: 5,
            request_timeout: 20,
            max_concurrent: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_version: String,
    pub name_source: NameSource,
    pub os_release: String,
    pub poll_interval: u64,
    pub timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_version: "v1.24".to_owned(),
            name_source: NameSource::default(),
            os_release: String::new(),
            poll_interval: 20,
            timings: Timings::default(),
        }
    }
}

pub struct Engine<T: Transport, S, D> {
    settings: Settings,
    scheduler: Scheduler<T>,
    registry: Registry,
    sink: S,
    discovery: D,
    synced: bool,
    flushing: bool,
    /// Set after the event feed was lost; cleared when the drain is complete.
    draining: bool,
    resync_at: Option<u64>,
    recheck_at: Option<u64>,
    event_buffer: Vec<String>,
    /// Retirements the sink could not take yet, oldest first.
    pending_retired: Vec<ContainerUuid>,
}

impl<T, S, D> Engine<T, S, D>
where
    T: Transport,
    S: SampleSink,
    D: InterfaceDiscovery,
{
    pub fn new(settings: Settings, transport: T, sink: S, discovery: D) -> Self {
        let scheduler = Scheduler::new(
            transport,
            settings.timings.max_concurrent,
            settings.timings.request_timeout,
        );
        Self {
            settings,
            scheduler,
            registry: Registry::default(),
            sink,
            discovery,
            synced: false,
            flushing: false,
            draining: false,
            resync_at: None,
            recheck_at: None,
            event_buffer: Vec::new(),
            pending_retired: Vec::new(),
        }
    }

    /// Schedules the first synchronization.
    pub fn start(&mut self, now: u64) {
        self.schedule_resync(now + self.settings.timings.startup);
    }

    /// Periodic housekeeping, expected about once per second.
    pub fn tick(&mut self, now: u64) {
        let summary = self.scheduler.summary();
        if !summary.is_idle() {
            log::debug!(
                "currentRequests={}, queuedRequests={}, waitingRequests={}, generatedRequests={}, lostRequests={}, containers={}, names={}, hostnames={}",
                summary.current,
                summary.queued,
                summary.waiting,
                summary.generated,
                summary.lost,
                self.registry.len(),
                self.registry.distinct_names(),
                self.registry.distinct_hostnames()
            );
        }

        self.retry_retired();

        if self.resync_at.is_some_and(|at| at <= now) {
            self.resynchronize(now);
        }
        if self.recheck_at.is_some_and(|at| at <= now) {
            log::debug!("container recheck");
            self.capture(now);
        }

        if !self.flushing {
            self.scheduler.service_wait_list(now);
            self.service_pending(now);
        }
        for lost in self.scheduler.reap_lost(now) {
            if let Some(id) = lost.container_id {
                self.release(&id);
                if !self.flushing {
                    self.retire_if_finished(&id);
                }
            }
        }
        self.check_drained(now);

        if !self.flushing {
            self.poll_due(now);
        }
    }

    pub fn handle(&mut self, msg: SocketMessage, now: u64) {
        match msg {
            SocketMessage::Line { seq, line } => self.on_line(seq, &line, now),
            SocketMessage::Closed { seq, status } => self.on_closed(seq, status, now),
        }
    }

    /// Feeds one line received on the connection of request `seq`.
    pub fn on_line(&mut self, seq: SeqNo, line: &str, now: u64) {
        log::trace!("seqNo={} line={:?}", seq, line);
        if self.flushing {
            return;
        }
        match self.scheduler.feed_line(seq, line) {
            Ok(Some(document)) => self.on_event_document(document, now),
            Ok(None) => {}
            Err(err) => log::warn!("bad response for request seqNo={}: {}", seq, err),
        }
    }

    /// The connection of request `seq` ended.
    pub fn on_closed(&mut self, seq: SeqNo, status: CloseStatus, now: u64) {
        let Some(done) = self.scheduler.complete(seq) else {
            log::trace!("close of unknown request seqNo={}", seq);
            return;
        };
        log::debug!("request done seqNo={} kind={:?} status={:?}", seq, done.kind, status);

        if done.kind.is_event_feed() {
            log::warn!("lost the event feed, flushing");
            self.flushing = true;
            self.draining = true;
        } else if let Some(id) = &done.container_id {
            self.release(id);
        }

        if !self.flushing {
            if let Some(body) = &done.body {
                match done.kind {
                    RequestKind::Containers => self.handle_listing(body, now),
                    RequestKind::Inspect => self.handle_inspect(body, now),
                    RequestKind::Stats => {
                        if let Some(id) = &done.container_id {
                            self.handle_stats(id, body, now);
                        }
                    }
                    RequestKind::Events => {}
                }
            }
            if let Some(id) = &done.container_id {
                self.retire_if_finished(id);
            }
        }

        self.check_drained(now);
        if !self.flushing {
            self.service_pending(now);
        }
    }

    /// Drops all state and starts over: event feed first, then the listing.
    pub fn resynchronize(&mut self, now: u64) {
        log::info!("resynchronizing with the container engine");
        self.scheduler.clear();
        for container in self.registry.clear() {
            self.submit(Telemetry::Retired(container.uuid()));
        }
        self.event_buffer.clear();
        self.synced = false;
        self.flushing = false;
        self.draining = false;
        self.resync_at = None;

        self.request(RequestKind::Events, None, now);
        self.capture(now);
    }

    fn capture(&mut self, now: u64) {
        self.request(RequestKind::Containers, None, now);
        self.recheck_at = Some(now + self.settings.timings.recheck);
    }

    fn schedule_resync(&mut self, at: u64) {
        match self.resync_at {
            Some(current) if current <= at => {}
            _ => {
                log::debug!("resync scheduled at {}", at);
                self.resync_at = Some(at);
            }
        }
    }

    fn check_drained(&mut self, now: u64) {
        if self.draining && self.scheduler.dispatched() == 0 {
            self.draining = false;
            self.schedule_resync(now + self.settings.timings.event_drop);
        }
    }

    /// Issues a request, or parks it in the pending queue while flushing.
    fn request(&mut self, kind: RequestKind, container_id: Option<ContainerID>, now: u64) {
        let command = kind.command(&self.settings.api_version, container_id.as_ref());
        if self.flushing {
            self.scheduler.enqueue(kind, command, container_id);
            return;
        }
        if let Err(failure) = self.scheduler.issue(kind, command, container_id, now) {
            self.dispatch_failed(failure, now);
        }
    }

    fn service_pending(&mut self, now: u64) {
        while !self.flushing {
            match self.scheduler.service_pending(now) {
                Ok(_) => break,
                Err(failure) => self.dispatch_failed(failure, now),
            }
        }
    }

    fn dispatch_failed(&mut self, failure: DispatchFailure, now: u64) {
        let DispatchFailure { request, error } = failure;
        log::error!("request seqNo={} failed: {}", request.seq, error);
        if let TransportError::Connect { .. } = error {
            self.flushing = true;
            self.schedule_resync(now + self.settings.timings.no_socket);
        } else if request.kind.is_event_feed() {
            log::warn!("could not open the event feed, flushing");
            self.flushing = true;
            self.draining = true;
        }
        if let Some(id) = &request.container_id {
            self.release(id);
            if !self.flushing {
                self.retire_if_finished(id);
            }
        }
    }

    /// One inspect/stats request of container `id` got resolved.
    fn release(&mut self, id: &ContainerID) {
        if let Some(container) = self.registry.get_mut(id.as_ref()) {
            container.outstanding = container.outstanding.saturating_sub(1);
        }
    }

    fn retire_if_finished(&mut self, id: &ContainerID) {
        if !self
            .registry
            .get(id.as_ref())
            .is_some_and(|container| container.is_finished())
        {
            return;
        }
        if let Some(container) = self.registry.remove(id.as_ref()) {
            self.submit(Telemetry::Retired(container.uuid()));
        }
    }

    /// Hands `telemetry` to the sink. Samples are dropped when the sink is full, a
    /// retirement is kept and retried on the next tick.
    fn submit(&mut self, telemetry: Telemetry) {
        let retired = match &telemetry {
            Telemetry::Sample(sample) => {
                // a new sample supersedes an undelivered retirement of the same container
                self.pending_retired.retain(|uuid| *uuid != sample.uuid);
                None
            }
            Telemetry::Retired(uuid) => Some(*uuid),
        };
        match self.sink.submit(telemetry) {
            Ok(()) => {}
            Err(SinkError::Full) => match retired {
                Some(uuid) => {
                    log::warn!("telemetry channel full, retirement of {} deferred", uuid);
                    if !self.pending_retired.contains(&uuid) {
                        self.pending_retired.push(uuid);
                    }
                }
                None => log::warn!("telemetry channel full, dropping sample"),
            },
            Err(err) => log::warn!("{}", err),
        }
    }

    fn retry_retired(&mut self) {
        while let Some(&uuid) = self.pending_retired.first() {
            match self.sink.submit(Telemetry::Retired(uuid)) {
                Ok(()) => {
                    self.pending_retired.remove(0);
                }
                Err(SinkError::Full) => break,
                Err(err) => {
                    log::warn!("{}", err);
                    self.pending_retired.clear();
                }
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<T> {
        &mut self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn resync_at(&self) -> Option<u64> {
        self.resync_at
    }

    pub fn buffered_events(&self) -> usize {
        self.event_buffer.len()
    }

    pub fn pending_retirements(&self) -> &[ContainerUuid] {
        &self.pending_retired
    }
}
