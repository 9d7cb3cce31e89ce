//! Container Telemetry: follows a container engine over its local API socket and keeps
//! one standardized counter sample per running container.
//!
//! The engine ([`engine::Engine`]) mirrors the container population through the engine's
//! event feed plus periodic listings, and asks for per-container metadata and usage
//! counters. Samples are served over HTTP and, when a database is configured, persisted
//! to MySQL.

use error::ResultOkLogExt;

pub mod adaptors;
pub mod api;
pub mod config;
pub mod container;
pub mod docker;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod persistence;
pub mod registry;
pub mod sample;

/// Capacity of the channel carrying socket traffic into the engine.
const SOCKET_CHANNEL_CAPACITY: usize = 1024;
/// Capacity of the telemetry channel; a full channel drops samples.
const TELEMETRY_CHANNEL_CAPACITY: usize = 256;

fn unix_now() -> Result<u64, std::time::SystemTimeError> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs())
}

/// Runs the telemetry engine.
///
/// Starts the sample consumer, the read API and, if `DATABASE_URL` is set, persistence,
/// then drives the engine forever from a one second tick and the socket traffic.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration values in the environment.
/// - Failure to connect to, or migrate, the database.
/// - A system clock set before the unix epoch.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Final rootfs: {}", config.rootfs.display());
    log::debug!("Engine socket: {}", config.docker_socket.display());

    let os_release = fsutil::read_trimmed(config.host_path("proc/sys/kernel/osrelease"))
        .ok_log()
        .unwrap_or_default();
    log::debug!("OS release: {}", &os_release);

    let persister = match &config.database_url {
        Some(url) => {
            let db = persistence::connect(url).await?;
            Some(persistence::MySqlSamplePersister::new(db))
        }
        None => {
            log::info!("DATABASE_URL not set, samples are kept in memory only");
            None
        }
    };

    let store = sample::SampleStore::default();
    let (telemetry_tx, telemetry_rx) =
        tokio::sync::mpsc::channel::<sample::Telemetry>(TELEMETRY_CHANNEL_CAPACITY);
    tokio::spawn(sample::consume(telemetry_rx, store.clone(), persister));

    {
        let api = api::APIServer::new(store);
        let addr = config.listen_addr;
        tokio::spawn(async move {
            if let Err(err) = api.listen(addr).await {
                log::error!("API server on {} failed: {}", addr, err);
            }
        });
    }

    let (socket_tx, mut socket_rx) =
        tokio::sync::mpsc::channel::<docker::SocketMessage>(SOCKET_CHANNEL_CAPACITY);
    let transport = docker::UnixSocketTransport::new(config.docker_socket.clone(), socket_tx);
    let settings = engine::Settings {
        api_version: config.api_version.clone(),
        name_source: config.name_source,
        os_release,
        poll_interval: config.poll_interval,
        timings: engine::Timings::default(),
    };
    let mut engine = engine::Engine::new(
        settings,
        transport,
        sample::ChannelSink::new(telemetry_tx),
        adaptors::ProcfsDiscovery::new(config.rootfs.clone()),
    );
    engine.start(unix_now()?);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => engine.tick(unix_now()?),
            Some(msg) = socket_rx.recv() => engine.handle(msg, unix_now()?),
        }
    }
}
