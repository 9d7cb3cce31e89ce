//! Runtime configuration, read from the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::registry::NameSource;

pub const DEFAULT_ROOTFS: &str = "/";
pub const DEFAULT_DOCKER_SOCKET: &str = "var/run/docker.sock";
pub const DEFAULT_API_VERSION: &str = "v1.24";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
pub const DEFAULT_API_LISTEN_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Host root; the engine socket and procfs are resolved below it.
    pub rootfs: PathBuf,
    pub docker_socket: PathBuf,
    pub api_version: String,
    pub name_source: NameSource,
    pub poll_interval: u64,
    pub listen_addr: SocketAddr,
    pub database_url: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidValue`] for a variable that is set but cannot be used.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |var: &str| lookup(var).filter(|value| !value.is_empty());

        let rootfs = get("ROOTFS_MOUNT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOTFS));
        let docker_socket = get("DOCKER_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| under_root(&rootfs, DEFAULT_DOCKER_SOCKET));
        let api_version = get("DOCKER_API_VERSION")
            .map(|version| normalize_api_version(&version))
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned());

        let name_source = match get("CONTAINER_NAME_SOURCE").as_deref() {
            None | Some("name") => NameSource::Name,
            Some("hostname") => NameSource::Hostname,
            Some(other) => {
                return Err(Error::InvalidValue {
                    var: "CONTAINER_NAME_SOURCE",
                    value: other.to_owned(),
                    reason: "expected `name` or `hostname`".to_owned(),
                });
            }
        };

        let poll_interval = match get("POLL_INTERVAL_SECS") {
            None => DEFAULT_POLL_INTERVAL_SECS,
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                Ok(_) => {
                    return Err(Error::InvalidValue {
                        var: "POLL_INTERVAL_SECS",
                        value,
                        reason: "must be positive".to_owned(),
                    });
                }
                Err(err) => {
                    return Err(Error::InvalidValue {
                        var: "POLL_INTERVAL_SECS",
                        value,
                        reason: err.to_string(),
                    });
                }
            },
        };

        let listen_addr =
            get("API_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_API_LISTEN_ADDR.to_owned());
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|err| Error::InvalidValue {
                var: "API_LISTEN_ADDR",
                value: listen_addr.clone(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            rootfs,
            docker_socket,
            api_version,
            name_source,
            poll_interval,
            listen_addr,
            database_url: get("DATABASE_URL"),
        })
    }

    /// Resolves an absolute host path below the configured root.
    pub fn host_path(&self, path: &str) -> PathBuf {
        under_root(&self.rootfs, path)
    }
}

fn under_root(rootfs: &Path, path: &str) -> PathBuf {
    rootfs.join(path.trim_start_matches('/'))
}

/// Accepts both `1.24` and `v1.24`.
fn normalize_api_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_owned()
    } else {
        format!("v{version}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.rootfs, PathBuf::from("/"));
        assert_eq!(config.docker_socket, PathBuf::from("/var/run/docker.sock"));
        assert_eq!(config.api_version, "v1.24");
        assert_eq!(config.name_source, NameSource::Name);
        assert_eq!(config.poll_interval, 20);
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_socket_follows_rootfs() {
        let config = load(&[("ROOTFS_MOUNT_PATH", "/rootfs")]).unwrap();
        assert_eq!(
            config.docker_socket,
            PathBuf::from("/rootfs/var/run/docker.sock")
        );
        assert_eq!(
            config.host_path("/proc/sys/kernel/osrelease"),
            PathBuf::from("/rootfs/proc/sys/kernel/osrelease")
        );

        let config = load(&[
            ("ROOTFS_MOUNT_PATH", "/rootfs"),
            ("DOCKER_SOCKET", "/run/docker.sock"),
        ])
        .unwrap();
        assert_eq!(config.docker_socket, PathBuf::from("/run/docker.sock"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DOCKER_API_VERSION", "1.41"),
            ("CONTAINER_NAME_SOURCE", "hostname"),
            ("POLL_INTERVAL_SECS", "60"),
            ("API_LISTEN_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", "mysql://u:p@db/telemetry"),
        ])
        .unwrap();
        assert_eq!(config.api_version, "v1.41");
        assert_eq!(config.name_source, NameSource::Hostname);
        assert_eq!(config.poll_interval, 60);
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("mysql://u:p@db/telemetry")
        );
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[("DATABASE_URL", ""), ("POLL_INTERVAL_SECS", "")]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.poll_interval, 20);
    }

    #[test]
    fn test_invalid_values() {
        for (var, value) in [
            ("CONTAINER_NAME_SOURCE", "label"),
            ("POLL_INTERVAL_SECS", "0"),
            ("POLL_INTERVAL_SECS", "soon"),
            ("API_LISTEN_ADDR", "localhost"),
        ] {
            let err = load(&[(var, value)]).unwrap_err();
            let Error::InvalidValue { var: got, .. } = err;
            assert_eq!(got, var);
        }
    }
}
