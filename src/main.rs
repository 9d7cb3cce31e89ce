/// Entry point for the container telemetry engine.
///
/// Connects to the container engine's local API socket, tracks every running
/// container and serves one counter sample per container over HTTP.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., invalid environment variables or
/// database connection issues).
///
/// # Examples
///
/// ```bash
/// ROOTFS_MOUNT_PATH=/rootfs RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    container_telemetry::run().await
}
