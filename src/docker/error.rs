use std::path::PathBuf;

/// Errors produced while decoding a response stream.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid chunk size line `{0}`")]
    ChunkSize(String),
    #[error("chunk length mismatch: expected {expected} bytes, got {actual}")]
    ChunkLength { expected: usize, actual: usize },
}

/// Errors produced while opening a request connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to socket `{path}`: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write request to socket `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
