use crate::container::ContainerID;

use super::parser::ResponseParser;

/// Sequence number of a request, unique for the lifetime of the process.
pub type SeqNo = u32;

/// The four calls made against the engine API.
///
/// Each kind has its own response handling; the response of a request is routed back
/// by matching on its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Long-lived subscription to container lifecycle events.
    Events,
    /// One-shot listing of running containers.
    Containers,
    /// One-shot metadata request for a single container.
    Inspect,
    /// One-shot, non-streaming usage stats for a single container.
    Stats,
}

impl RequestKind {
    pub fn is_event_feed(self) -> bool {
        self == RequestKind::Events
    }

    /// Builds the HTTP request text for this call.
    ///
    /// `id` is ignored by the calls that do not address a single container.
    pub fn command(self, api_version: &str, id: Option<&ContainerID>) -> String {
        let id: &str = id.map_or("", |id| id.as_ref());
        let (path, connection) = match self {
            RequestKind::Events => (
                // filters={"type":["container"]}
                format!(
                    "/{api_version}/events?filters=%7B%22type%22%3A%5B%22container%22%5D%7D"
                ),
                "",
            ),
            RequestKind::Containers => {
                (format!("/{api_version}/containers/json"), "Connection: close\r\n")
            }
            RequestKind::Inspect => (
                format!("/{api_version}/containers/{id}/json"),
                "Connection: close\r\n",
            ),
            RequestKind::Stats => (
                format!("/{api_version}/containers/{id}/stats?stream=false"),
                "Connection: close\r\n",
            ),
        };
        format!("GET {path} HTTP/1.1\r\nHost: docker\r\n{connection}\r\n")
    }
}

/// Which collection currently owns a request.
///
/// A registered request is always in exactly one of these.
#[derive(Debug)]
pub enum Slot<S> {
    /// Deferred until its eligibility time has passed.
    Waiting,
    /// Eligible, waiting for a free dispatch slot.
    Pending,
    /// Sent; owns the socket the response arrives on.
    Dispatched(S),
}

impl<S> Slot<S> {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Waiting => "waiting",
            Slot::Pending => "pending",
            Slot::Dispatched(_) => "dispatched",
        }
    }
}

/// One outstanding or queued engine API call.
#[derive(Debug)]
pub struct Request<S> {
    pub(super) seq: SeqNo,
    pub(super) kind: RequestKind,
    pub(super) command: String,
    pub(super) container_id: Option<ContainerID>,
    pub(super) parser: ResponseParser,
    pub(super) send_time: Option<u64>,
    pub(super) eligible_at: Option<u64>,
    pub(super) slot: Slot<S>,
}

impl<S> Request<S> {
    pub(super) fn new(
        seq: SeqNo,
        kind: RequestKind,
        command: String,
        container_id: Option<ContainerID>,
        slot: Slot<S>,
    ) -> Self {
        Self {
            seq,
            kind,
            command,
            container_id,
            parser: ResponseParser::new(kind.is_event_feed()),
            send_time: None,
            eligible_at: None,
            slot,
        }
    }

    pub fn seq(&self) -> SeqNo {
        self.seq
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn container_id(&self) -> Option<&ContainerID> {
        self.container_id.as_ref()
    }

    pub fn send_time(&self) -> Option<u64> {
        self.send_time
    }

    pub fn slot(&self) -> &Slot<S> {
        &self.slot
    }
}
