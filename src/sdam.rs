//! Server identity and role as reported by the handshake. Discovery and monitoring live outside
//! this crate; these types only carry what command construction needs.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::error::{Error, Result};

pub(crate) const DEFAULT_PORT: u16 = 27017;

/// A hostname:port address pair.
#[derive(Clone, Debug, Eq)]
pub struct ServerAddress {
    /// The hostname of the address.
    pub host: String,

    /// The port of the address.
    ///
    /// The default is 27017.
    pub port: Option<u16>,
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: None,
        }
    }
}

impl PartialEq for ServerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port.unwrap_or(DEFAULT_PORT) == other.port.unwrap_or(DEFAULT_PORT)
    }
}

impl Hash for ServerAddress {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.host.hash(state);
        self.port.unwrap_or(DEFAULT_PORT).hash(state);
    }
}

impl ServerAddress {
    /// Parses an address string into a `ServerAddress`.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        let invalid = || Error::invalid_argument(format!("invalid server address: {address:?}"));
        let mut parts = address.split(':');

        let host = match parts.next() {
            Some(part) if !part.is_empty() => part,
            _ => return Err(invalid()),
        };

        let port = match parts.next() {
            Some(part) => {
                let port: u16 = part.parse().map_err(|_| invalid())?;
                if parts.next().is_some() {
                    return Err(invalid());
                }
                Some(port)
            }
            None => None,
        };

        Ok(ServerAddress {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.host, self.port.unwrap_or(DEFAULT_PORT))
    }
}

/// The role a server reported in its handshake.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replica set mongod.
    Standalone,

    /// A router used in sharded deployments.
    Mongos,

    /// The primary node in a replica set.
    #[doc(alias = "Primary")]
    RsPrimary,

    /// A secondary node in a replica set.
    #[doc(alias = "Secondary")]
    RsSecondary,

    /// A non-data bearing node in a replica set which can participate in elections.
    RsArbiter,

    /// Hidden, starting up, or recovering nodes in a replica set.
    RsOther,

    /// A member of an uninitialized replica set or a member that has been removed from the replica
    /// set config.
    RsGhost,

    /// A server whose type has not been determined.
    #[default]
    Unknown,
}
