//! Discovery of the network interfaces inside a container's network namespace.

use std::fmt;
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ResultOkLogExt;
use crate::fsutil;

const IFF_UP: u32 = 0x1;
const IFF_LOOPBACK: u32 = 0x8;

/// Hardware address of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid mac address `{0}`")]
pub struct InvalidMacAddress(String);

impl FromStr for MacAddress {
    type Err = InvalidMacAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| InvalidMacAddress(s.to_owned()))?;
            if part.len() != 2 {
                return Err(InvalidMacAddress(s.to_owned()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| InvalidMacAddress(s.to_owned()))?;
        }
        if parts.next().is_some() {
            return Err(InvalidMacAddress(s.to_owned()));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl serde::Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A network adaptor visible inside a container.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Adaptor {
    pub ifindex: u32,
    pub name: String,
    pub mac: MacAddress,
}

/// Lists the network adaptors of the container whose init process is `pid`.
pub trait InterfaceDiscovery {
    /// Returns the up, non-loopback adaptors with a hardware address. A `pid` of 0
    /// means the container has no process and yields nothing.
    fn discover(&mut self, pid: u32) -> Vec<Adaptor>;
}

/// Reads the adaptor list from the host's procfs, through the container's own view of
/// `/proc/net/dev` and `/sys/class/net`.
#[derive(Debug, Clone)]
pub struct ProcfsDiscovery {
    rootfs: PathBuf,
}

impl ProcfsDiscovery {
    pub fn new(rootfs: PathBuf) -> Self {
        Self { rootfs }
    }

    fn device_names(&self, pid: u32) -> Vec<String> {
        let path = self.rootfs.join(format!("proc/{pid}/net/dev"));
        let Some(reader) = fsutil::open_file_reader(&path).ok_log() else {
            return Vec::new();
        };
        // two header lines precede the per-device lines
        reader
            .lines()
            .skip(2)
            .map_while(Result::ok)
            .filter_map(|line| parse_device_name(&line).map(str::to_owned))
            .collect()
    }

    fn adaptor(&self, pid: u32, name: String) -> Option<Adaptor> {
        let dir = self
            .rootfs
            .join(format!("proc/{pid}/root/sys/class/net/{name}"));
        let flags = fsutil::read_trimmed(dir.join("flags")).ok_log()?;
        let flags = parse_flags(&flags)?;
        if flags & IFF_UP == 0 || flags & IFF_LOOPBACK != 0 {
            log::trace!("skipping interface {} (flags={:#x})", name, flags);
            return None;
        }
        let ifindex = fsutil::read_trimmed(dir.join("ifindex"))
            .ok_log()?
            .parse()
            .ok()?;
        let mac: MacAddress = fsutil::read_trimmed(dir.join("address"))
            .ok_log()?
            .parse()
            .ok()?;
        if mac.is_zero() {
            return None;
        }
        Some(Adaptor { ifindex, name, mac })
    }
}

impl InterfaceDiscovery for ProcfsDiscovery {
    fn discover(&mut self, pid: u32) -> Vec<Adaptor> {
        if pid == 0 {
            return Vec::new();
        }
        let adaptors: Vec<Adaptor> = self
            .device_names(pid)
            .into_iter()
            .filter_map(|name| self.adaptor(pid, name))
            .collect();
        log::debug!("pid={} adaptors={:?}", pid, adaptors);
        adaptors
    }
}

fn parse_device_name(line: &str) -> Option<&str> {
    let (iface, _) = line.trim().split_once(':')?;
    let iface = iface.trim();
    (!iface.is_empty()).then_some(iface)
}

fn parse_flags(src: &str) -> Option<u32> {
    u32::from_str_radix(src.trim_start_matches("0x"), 16).ok()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:   90000     300    0    0    0     0          0         0    12000     100    0    0    0     0       0          0
  eth1:       0       0    0    0    0     0          0         0        0       0    0    0    0     0       0          0
";

    fn write_iface(root: &Path, pid: u32, name: &str, ifindex: u32, mac: &str, flags: &str) {
        let dir = root.join(format!("proc/{pid}/root/sys/class/net/{name}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ifindex"), format!("{ifindex}\n")).unwrap();
        fs::write(dir.join("address"), format!("{mac}\n")).unwrap();
        fs::write(dir.join("flags"), format!("{flags}\n")).unwrap();
    }

    fn fixture(pid: u32) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let net = tmp.path().join(format!("proc/{pid}/net"));
        fs::create_dir_all(&net).unwrap();
        fs::write(net.join("dev"), NET_DEV).unwrap();
        write_iface(tmp.path(), pid, "lo", 1, "00:00:00:00:00:00", "0x9");
        write_iface(tmp.path(), pid, "eth0", 7, "02:42:ac:11:00:02", "0x1003");
        write_iface(tmp.path(), pid, "eth1", 9, "02:42:ac:12:00:05", "0x1002");
        tmp
    }

    #[test]
    fn test_discovers_up_non_loopback_interfaces() {
        let tmp = fixture(4242);
        let mut discovery = ProcfsDiscovery::new(tmp.path().to_path_buf());
        let adaptors = discovery.discover(4242);
        assert_eq!(
            adaptors,
            vec![Adaptor {
                ifindex: 7,
                name: "eth0".to_owned(),
                mac: MacAddress::new([0x02, 0x42, 0xac, 0x11, 0x00, 0x02]),
            }]
        );
    }

    #[test]
    fn test_pid_zero_and_missing_process() {
        let tmp = fixture(4242);
        let mut discovery = ProcfsDiscovery::new(tmp.path().to_path_buf());
        assert!(discovery.discover(0).is_empty());
        assert!(discovery.discover(1111).is_empty());
    }

    #[test]
    fn test_parse_device_name() {
        assert_eq!(parse_device_name("  eth0: 1 2 3"), Some("eth0"));
        assert_eq!(parse_device_name("veth12ab:0 0"), Some("veth12ab"));
        assert_eq!(parse_device_name("garbage"), None);
    }

    #[test]
    fn test_mac_address() {
        let mac: MacAddress = "02:42:AC:11:00:02".parse().unwrap();
        assert_eq!(mac.to_string(), "02:42:ac:11:00:02");
        assert!("02:42:ac:11:00".parse::<MacAddress>().is_err());
        assert!("02:42:ac:11:00:02:ff".parse::<MacAddress>().is_err());
        assert!("zz:42:ac:11:00:02".parse::<MacAddress>().is_err());
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"02:42:ac:11:00:02\"");
    }
}
