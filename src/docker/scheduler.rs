use std::collections::{BTreeMap, VecDeque};

use crate::container::ContainerID;

use super::request::{Request, RequestKind, SeqNo, Slot};
use super::{ParseError, TransportError};

/// Opens one connection per request and writes the request text to it.
///
/// Whatever arrives on the connection afterwards is expected to be delivered back to
/// the scheduler, line by line, tagged with the request's sequence number.
pub trait Transport {
    type Socket;

    /// Connects and sends `command` for the request `seq`.
    fn open(&mut self, seq: SeqNo, command: &str) -> Result<Self::Socket, TransportError>;

    /// Forcibly closes a connection. No further lines for it are expected.
    fn close(&mut self, socket: Self::Socket);
}

/// A request that left the scheduler, for whatever reason.
#[derive(Debug)]
pub struct Finished {
    pub seq: SeqNo,
    pub kind: RequestKind,
    pub container_id: Option<ContainerID>,
    /// Accumulated response body, only set for one-shot requests that reached end of
    /// stream with a well-formed response.
    pub body: Option<String>,
}

/// Outcome of handing a request to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent(SeqNo),
    Queued(SeqNo),
}

/// The transport refused a request. The request has already been dropped.
#[derive(Debug)]
pub struct DispatchFailure {
    pub request: Finished,
    pub error: TransportError,
}

/// Counters describing the scheduler's current load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub current: usize,
    pub queued: usize,
    pub waiting: usize,
    pub generated: SeqNo,
    pub lost: u64,
}

impl Summary {
    pub fn is_idle(&self) -> bool {
        self.current == 0 && self.queued == 0 && self.waiting == 0
    }
}

/// Owns every engine API request between issue and completion.
///
/// `requests` is the authoritative table; each entry is additionally owned by exactly one
/// of the wait list, the pending queue or a live socket, as recorded in its [`Slot`].
/// At most `max_concurrent` one-shot requests are dispatched at any time. The event feed
/// is exempt from that cap and from timeout detection.
#[derive(Debug)]
pub struct Scheduler<T: Transport> {
    transport: T,
    max_concurrent: usize,
    timeout: u64,
    requests: BTreeMap<SeqNo, Request<T::Socket>>,
    wait_list: VecDeque<SeqNo>,
    pending: VecDeque<SeqNo>,
    dispatched: usize,
    generated: SeqNo,
    lost: u64,
}

impl<T: Transport> Scheduler<T> {
    pub fn new(transport: T, max_concurrent: usize, timeout: u64) -> Self {
        Self {
            transport,
            max_concurrent,
            timeout,
            requests: BTreeMap::new(),
            wait_list: VecDeque::new(),
            pending: VecDeque::new(),
            dispatched: 0,
            generated: 0,
            lost: 0,
        }
    }

    fn next_seq(&mut self) -> SeqNo {
        self.generated += 1;
        self.generated
    }

    /// Registers a request and dispatches it right away if a slot is free; otherwise it
    /// is appended to the pending queue.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchFailure`] if the transport could not open the connection.
    pub fn issue(
        &mut self,
        kind: RequestKind,
        command: String,
        container_id: Option<ContainerID>,
        now: u64,
    ) -> Result<Dispatch, DispatchFailure> {
        let seq = self.next_seq();
        self.requests.insert(
            seq,
            Request::new(seq, kind, command, container_id, Slot::Pending),
        );
        self.dispatch(seq, now)
    }

    /// Registers a request at the tail of the pending queue without trying to send it.
    pub fn enqueue(
        &mut self,
        kind: RequestKind,
        command: String,
        container_id: Option<ContainerID>,
    ) -> SeqNo {
        let seq = self.next_seq();
        self.requests.insert(
            seq,
            Request::new(seq, kind, command, container_id, Slot::Pending),
        );
        self.pending.push_back(seq);
        seq
    }

    /// Registers a request that must not be sent before `eligible_at`.
    ///
    /// Deferred requests are expected to be issued with non-decreasing eligibility
    /// times; the wait list is only ever scanned from its head.
    pub fn issue_deferred(
        &mut self,
        kind: RequestKind,
        command: String,
        container_id: Option<ContainerID>,
        eligible_at: u64,
    ) -> SeqNo {
        let seq = self.next_seq();
        let mut request = Request::new(seq, kind, command, container_id, Slot::Waiting);
        request.eligible_at = Some(eligible_at);
        self.requests.insert(seq, request);
        self.wait_list.push_back(seq);
        seq
    }

    fn dispatch(&mut self, seq: SeqNo, now: u64) -> Result<Dispatch, DispatchFailure> {
        let Some(mut request) = self.requests.remove(&seq) else {
            log::warn!("dispatch of unknown request seqNo={}", seq);
            return Ok(Dispatch::Queued(seq));
        };
        let event_feed = request.kind.is_event_feed();
        if !event_feed && self.dispatched >= self.max_concurrent {
            request.slot = Slot::Pending;
            self.requests.insert(seq, request);
            self.pending.push_back(seq);
            log::trace!("request seqNo={} queued", seq);
            return Ok(Dispatch::Queued(seq));
        }

        match self.transport.open(seq, &request.command) {
            Ok(socket) => {
                request.slot = Slot::Dispatched(socket);
                if !event_feed {
                    request.send_time = Some(now);
                    self.dispatched += 1;
                }
                log::debug!("request seqNo={} sent: {:?}", seq, request.kind);
                self.requests.insert(seq, request);
                Ok(Dispatch::Sent(seq))
            }
            Err(error) => Err(DispatchFailure {
                request: self.finish(request),
                error,
            }),
        }
    }

    /// Moves every wait list entry whose eligibility time has come to the pending queue.
    ///
    /// Scanning stops at the first entry that is not yet eligible.
    pub fn service_wait_list(&mut self, now: u64) -> usize {
        let mut moved = 0;
        while let Some(&seq) = self.wait_list.front() {
            let due = self
                .requests
                .get(&seq)
                .is_none_or(|request| request.eligible_at.is_none_or(|at| at <= now));
            if !due {
                break;
            }
            self.wait_list.pop_front();
            if let Some(request) = self.requests.get_mut(&seq) {
                request.slot = Slot::Pending;
                self.pending.push_back(seq);
                moved += 1;
            }
        }
        moved
    }

    /// Dispatches pending requests while slots are free. Returns how many were sent.
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first request the transport refused.
    pub fn service_pending(&mut self, now: u64) -> Result<usize, DispatchFailure> {
        let mut sent = 0;
        while self.dispatched < self.max_concurrent {
            let Some(seq) = self.pending.pop_front() else {
                break;
            };
            if let Dispatch::Sent(_) = self.dispatch(seq, now)? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Feeds one received line to the decoder of request `seq`.
    ///
    /// Returns a complete document for the event feed. Lines for requests that are no
    /// longer registered are dropped.
    pub fn feed_line(&mut self, seq: SeqNo, line: &str) -> Result<Option<String>, ParseError> {
        match self.requests.get_mut(&seq) {
            Some(request) => request.parser.feed_line(line),
            None => {
                log::trace!("dropping line for finished request seqNo={}", seq);
                Ok(None)
            }
        }
    }

    /// Frees request `seq` after its connection ended.
    ///
    /// Returns `None` if the request is not registered, e.g. because it was reclaimed
    /// as lost before its stream ended.
    pub fn complete(&mut self, seq: SeqNo) -> Option<Finished> {
        let request = self.requests.remove(&seq)?;
        Some(self.finish(request))
    }

    fn finish(&mut self, request: Request<T::Socket>) -> Finished {
        let Request {
            seq,
            kind,
            container_id,
            parser,
            send_time,
            slot,
            ..
        } = request;
        match slot {
            Slot::Dispatched(socket) => {
                self.transport.close(socket);
                if !kind.is_event_feed() && send_time.is_some() {
                    self.dispatched = self.dispatched.saturating_sub(1);
                }
            }
            Slot::Pending => self.pending.retain(|s| *s != seq),
            Slot::Waiting => self.wait_list.retain(|s| *s != seq),
        }
        Finished {
            seq,
            kind,
            container_id,
            body: parser.finish(),
        }
    }

    /// Reclaims one-shot requests that were sent more than `timeout` seconds ago and are
    /// still unanswered. Their sockets are closed.
    pub fn reap_lost(&mut self, now: u64) -> Vec<Finished> {
        let expired: Vec<SeqNo> = self
            .requests
            .values()
            .filter(|request| {
                !request.kind.is_event_feed()
                    && request
                        .send_time
                        .is_some_and(|sent| now.saturating_sub(sent) > self.timeout)
            })
            .map(|request| request.seq)
            .collect();

        let mut lost = Vec::with_capacity(expired.len());
        for seq in expired {
            if let Some(request) = self.requests.remove(&seq) {
                log::warn!(
                    "request lost: seqNo={} kind={:?} container={}",
                    seq,
                    request.kind,
                    request
                        .container_id
                        .as_ref()
                        .map_or("-", |id| id.as_ref())
                );
                self.lost += 1;
                let mut finished = self.finish(request);
                finished.body = None;
                lost.push(finished);
            }
        }
        lost
    }

    /// Drops every registered request and closes every open connection.
    pub fn clear(&mut self) {
        let requests = std::mem::take(&mut self.requests);
        for (_, request) in requests {
            if let Slot::Dispatched(socket) = request.slot {
                self.transport.close(socket);
            }
        }
        self.wait_list.clear();
        self.pending.clear();
        self.dispatched = 0;
    }

    pub fn summary(&self) -> Summary {
        Summary {
            current: self.dispatched,
            queued: self.pending.len(),
            waiting: self.wait_list.len(),
            generated: self.generated,
            lost: self.lost,
        }
    }

    /// Number of one-shot requests currently on the wire.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, seq: SeqNo) -> Option<&Request<T::Socket>> {
        self.requests.get(&seq)
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request<T::Socket>> {
        self.requests.values()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Verifies that every registered request is owned by exactly one collection and
    /// that the dispatch counter matches the requests on the wire.
    pub fn check_ownership(&self) -> Result<(), String> {
        let mut dispatched = 0;
        let mut queued = 0;
        for request in self.requests.values() {
            let in_wait = self.wait_list.contains(&request.seq);
            let in_pending = self.pending.contains(&request.seq);
            let ok = match request.slot {
                Slot::Waiting | Slot::Pending => {
                    queued += 1;
                    match request.slot {
                        Slot::Waiting => in_wait && !in_pending,
                        _ => in_pending && !in_wait,
                    }
                }
                Slot::Dispatched(_) => {
                    if !request.kind.is_event_feed() {
                        dispatched += 1;
                    }
                    !in_wait && !in_pending
                }
            };
            if !ok {
                return Err(format!(
                    "request seqNo={} marked {} but wait={} pending={}",
                    request.seq,
                    request.slot.name(),
                    in_wait,
                    in_pending
                ));
            }
        }
        if self.wait_list.len() + self.pending.len() != queued {
            return Err("queue entries without a matching request".to_owned());
        }
        if dispatched != self.dispatched {
            return Err(format!(
                "dispatch counter {} but {} requests on the wire",
                self.dispatched, dispatched
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// In-memory transport recording what would have been sent.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub opened: Vec<(SeqNo, String)>,
        pub closed: Vec<SeqNo>,
        pub refuse: bool,
        /// Fails the write of every command containing this text.
        pub fail_write: Option<&'static str>,
    }

    impl FakeTransport {
        pub fn commands_since(&self, from: usize) -> Vec<&str> {
            self.opened[from..].iter().map(|(_, c)| c.as_str()).collect()
        }

        pub fn last_seq(&self) -> Option<SeqNo> {
            self.opened.last().map(|(seq, _)| *seq)
        }

        pub fn seq_of(&self, needle: &str) -> Vec<SeqNo> {
            self.opened
                .iter()
                .filter(|(_, cmd)| cmd.contains(needle))
                .map(|(seq, _)| *seq)
                .collect()
        }
    }

    impl Transport for FakeTransport {
        type Socket = SeqNo;

        fn open(&mut self, seq: SeqNo, command: &str) -> Result<SeqNo, TransportError> {
            if self.refuse {
                return Err(TransportError::Connect {
                    path: "/fake/docker.sock".into(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                });
            }
            if self.fail_write.is_some_and(|needle| command.contains(needle)) {
                return Err(TransportError::Write {
                    path: "/fake/docker.sock".into(),
                    source: std::io::Error::from(std::io::ErrorKind::BrokenPipe),
                });
            }
            self.opened.push((seq, command.to_owned()));
            Ok(seq)
        }

        fn close(&mut self, socket: SeqNo) {
            self.closed.push(socket);
        }
    }
}
