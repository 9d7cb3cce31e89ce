#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("telemetry channel is full")]
    Full,
    #[error("telemetry channel is closed")]
    Closed,
}
