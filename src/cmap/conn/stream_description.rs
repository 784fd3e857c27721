use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::{
    feature::{Feature, ServerVersion},
    sdam::{ServerAddress, ServerType},
};

/// Contains information about a given server in a format digestible by command construction.
///
/// Channel implementations build one of these from the handshake reply of the server they are
/// bound to.
#[derive(Debug, Default, Clone, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct StreamDescription {
    /// The address of the server.
    pub server_address: ServerAddress,

    /// The type of the server when the handshake occurred.
    pub initial_server_type: ServerType,

    /// The version of the server, if known. Features are assumed to be supported by servers
    /// whose version is unknown.
    #[builder(default, setter(strip_option))]
    pub server_version: Option<ServerVersion>,

    /// The maximum wire version that the server understands.
    pub max_wire_version: Option<i32>,

    /// How long sessions started on this server will stay alive without
    /// executing an operation before the server kills them.
    pub logical_session_timeout: Option<Duration>,
}

impl StreamDescription {
    /// Whether the server supports logical sessions.
    pub fn supports_sessions(&self) -> bool {
        self.logical_session_timeout.is_some()
    }

    /// Whether this StreamDescription supports retryable writes.
    pub fn supports_retryable_writes(&self) -> bool {
        self.initial_server_type != ServerType::Standalone
            && self.supports_sessions()
            && Feature::RETRYABLE_WRITES.is_supported(self.server_version.as_ref())
    }

    /// Whether commands must be sent to this server as OP_QUERY wrapped queries.
    pub(crate) fn uses_legacy_commands(&self) -> bool {
        !Feature::COMMAND_MESSAGE.is_supported(self.server_version.as_ref())
    }

    /// Gets a description of a stream for a 4.2 replica set primary.
    #[cfg(test)]
    pub(crate) fn new_testing() -> Self {
        Self::with_server_version(ServerVersion::new(4, 2, 0))
    }

    /// Gets a description of a stream for a replica set primary with the provided version.
    #[cfg(test)]
    pub(crate) fn with_server_version(version: ServerVersion) -> Self {
        let max_wire_version = match (version.major, version.minor) {
            (major, _) if major >= 5 => 13,
            (4, 4) => 9,
            (4, 2) => 8,
            (4, 0) => 7,
            (3, 6) => 6,
            (3, 4) => 5,
            (3, 2) => 4,
            _ => 3,
        };
        let logical_session_timeout =
            (version >= ServerVersion::new(3, 6, 0)).then(|| Duration::from_secs(30 * 60));
        Self {
            server_address: Default::default(),
            initial_server_type: ServerType::RsPrimary,
            server_version: Some(version),
            max_wire_version: Some(max_wire_version),
            logical_session_timeout,
        }
    }
}
