use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::{SeqNo, Transport, TransportError};

/// How a request connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    Eof,
    Error,
}

/// Traffic from a request connection, tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    /// One line as received, including its terminator if there was one.
    Line { seq: SeqNo, line: String },
    Closed { seq: SeqNo, status: CloseStatus },
}

/// Talks to the engine over its local Unix domain socket, one connection per request.
///
/// Connecting and writing the request happen synchronously in [`Transport::open`]; the
/// response is read by a spawned task that forwards it line by line. Must be used from
/// within a tokio runtime.
#[derive(Debug)]
pub struct UnixSocketTransport {
    path: PathBuf,
    tx: mpsc::Sender<SocketMessage>,
}

impl UnixSocketTransport {
    pub fn new(path: PathBuf, tx: mpsc::Sender<SocketMessage>) -> Self {
        Self { path, tx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect_err(&self, source: std::io::Error) -> TransportError {
        TransportError::Connect {
            path: self.path.clone(),
            source,
        }
    }
}

impl Transport for UnixSocketTransport {
    type Socket = AbortHandle;

    fn open(&mut self, seq: SeqNo, command: &str) -> Result<AbortHandle, TransportError> {
        let mut stream = std::os::unix::net::UnixStream::connect(&self.path)
            .map_err(|source| self.connect_err(source))?;
        stream
            .write_all(command.as_bytes())
            .map_err(|source| TransportError::Write {
                path: self.path.clone(),
                source,
            })?;
        stream
            .set_nonblocking(true)
            .map_err(|source| self.connect_err(source))?;
        let stream =
            tokio::net::UnixStream::from_std(stream).map_err(|source| self.connect_err(source))?;

        let handle = tokio::spawn(read_lines(seq, stream, self.tx.clone()));
        Ok(handle.abort_handle())
    }

    fn close(&mut self, socket: AbortHandle) {
        socket.abort();
    }
}

async fn read_lines(seq: SeqNo, stream: tokio::net::UnixStream, tx: mpsc::Sender<SocketMessage>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(4096);
    let status = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break CloseStatus::Eof,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(SocketMessage::Line { seq, line }).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                log::debug!("read error on request seqNo={}: {}", seq, err);
                break CloseStatus::Error;
            }
        }
    };
    // receiver gone means the engine is shutting down
    let _ = tx.send(SocketMessage::Closed { seq, status }).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let mut transport = UnixSocketTransport::new(dir.path().join("missing.sock"), tx);
        let err = transport.open(1, "GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_lines_are_forwarded_until_eof() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 64];
            let n = conn.read(&mut req).await.unwrap();
            assert!(n > 0);
            conn.write_all(b"HTTP/1.1 200 OK\r\n\r\n4\r\ntest").await.unwrap();
        });

        let (tx, mut rx) = mpsc::channel(16);
        let mut transport = UnixSocketTransport::new(path, tx);
        transport.open(7, "GET / HTTP/1.1\r\n\r\n").unwrap();
        server.await.unwrap();

        let mut got = Vec::new();
        while let Some(msg) = rx.recv().await {
            let done = matches!(msg, SocketMessage::Closed { .. });
            got.push(msg);
            if done {
                break;
            }
        }
        let line = |s: &str| SocketMessage::Line {
            seq: 7,
            line: s.to_owned(),
        };
        assert_eq!(
            got,
            vec![
                line("HTTP/1.1 200 OK\r\n"),
                line("\r\n"),
                line("4\r\n"),
                line("test"),
                SocketMessage::Closed {
                    seq: 7,
                    status: CloseStatus::Eof
                },
            ]
        );
    }
}
