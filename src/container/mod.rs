use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;
mod state;

pub use error::{Error, Result};
pub use state::{ContainerEvent, ContainerState};

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// Number of id characters used when a short form of the id is displayed.
pub const SHORT_ID_LEN: usize = 12;

/// An engine-assigned container identifier.
///
/// # Examples
///
/// ```
/// # use container_telemetry::container::ContainerID;
/// let raw_id = "2e781c0358b9940f7bc8399903b5af0d2e09f0b60714ef62f961280986467724";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.short(), "2e781c0358b9");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or its length exceeds
    /// [`CONTAINER_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// Returns the first [`SHORT_ID_LEN`] characters of the id, the way the engine
    /// abbreviates ids in its own output.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed 16-byte identity of a container, reported downstream in place of the
/// variable length engine id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerUuid([u8; 16]);

impl ContainerUuid {
    pub fn new(src: [u8; 16]) -> Self {
        Self(src)
    }

    pub fn as_raw(&self) -> [u8; 16] {
        self.0
    }

    /// Derives the uuid from the leading 32 hex digits of a container id.
    ///
    /// Dashes are skipped so that canonical uuid strings parse as well. Anything after
    /// the first 32 hex digits is ignored, which means two ids sharing that prefix map
    /// to the same uuid; callers that index by uuid have to check for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerUuid`] if fewer than 32 hex digits precede the
    /// first non-hex character.
    pub fn derive(id: &ContainerID) -> Result<Self> {
        let mut bytes = [0u8; 16];
        let mut nibbles = id.as_ref().bytes().filter(|b| *b != b'-');
        for byte in bytes.iter_mut() {
            let hi = nibbles.next().and_then(hex_value);
            let lo = nibbles.next().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) => *byte = (hi << 4) | lo,
                _ => return Err(Error::InvalidContainerUuid(id.to_string())),
            }
        }

        Ok(Self(bytes))
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

impl fmt::Display for ContainerUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ContainerUuid {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let id = ContainerID::new(s)?;
        if id.as_ref().bytes().filter(|b| *b != b'-').count() != 32 {
            return Err(Error::InvalidContainerUuid(s.to_owned()));
        }
        Self::derive(&id)
    }
}

impl serde::Serialize for ContainerUuid {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
