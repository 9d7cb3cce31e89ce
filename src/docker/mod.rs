//! Plumbing for the container engine's HTTP API over its local socket.
//!
//! Every request gets its own connection. Responses are decoded line by line by a
//! [`ResponseParser`], and the [`Scheduler`] bounds how many one-shot requests are on
//! the wire at once.

mod error;
mod parser;
mod request;
mod scheduler;
mod transport;

pub use error::{ParseError, TransportError};
pub use parser::{ParseState, ResponseParser};
pub use request::{Request, RequestKind, SeqNo, Slot};
pub use scheduler::{Dispatch, DispatchFailure, Finished, Scheduler, Summary, Transport};
pub use transport::{CloseStatus, SocketMessage, UnixSocketTransport};

#[cfg(test)]
pub(crate) use scheduler::fake::FakeTransport;
