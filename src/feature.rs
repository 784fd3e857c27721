//! A catalog of server capabilities keyed by the server version that introduced them.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// A MongoDB server version, ordered by major, then minor, then patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    /// The major version.
    pub major: u32,

    /// The minor version.
    pub minor: u32,

    /// The patch version.
    pub patch: u32,
}

impl ServerVersion {
    /// Creates a new `ServerVersion`.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    /// Parses versions such as `"4.2"`, `"4.4.1"` and `"5.0.0-rc1"`. Missing components are
    /// treated as zero, and anything after a `-` in the last component is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let core = s.split('-').next().unwrap_or_default();
        let mut parts = core.split('.');
        let mut next = |name: &str| -> Result<u32> {
            match parts.next() {
                None | Some("") if name != "major" => Ok(0),
                Some(part) => part.parse().map_err(|_| {
                    Error::invalid_argument(format!("invalid {name} component in version {s:?}"))
                }),
                None => Err(Error::invalid_argument(format!("invalid version {s:?}"))),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

/// What command construction does when a feature was explicitly requested but the server lacks
/// it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    /// Fail with an `UnsupportedFeature` error.
    Reject,

    /// Fail only on servers older than the given version. Servers between that version and the
    /// first supported version receive the field and report their own error.
    RejectBelow(ServerVersion),
}

/// A named server capability and the first server version that supports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feature {
    name: &'static str,
    first_supported: ServerVersion,
    policy: UnsupportedPolicy,
}

macro_rules! features {
    (@policy) => { UnsupportedPolicy::Reject };
    (@policy $policy:expr) => { $policy };
    ($(
        $(#[$attr:meta])*
        $konst:ident => $name:literal, ($major:literal, $minor:literal) $(, $policy:expr)?;
    )+) => {
        impl Feature {
            $(
                $(#[$attr])*
                pub const $konst: Feature = Feature {
                    name: $name,
                    first_supported: ServerVersion::new($major, $minor, 0),
                    policy: features!(@policy $($policy)?),
                };
            )+
        }
    };
}

features! {
    AGGREGATE_ALLOW_DISK_USE => "AggregateAllowDiskUse", (2, 6);
    AGGREGATE_COMMENT => "AggregateComment", (3, 6);
    AGGREGATE_HINT => "AggregateHint", (3, 6);
    AGGREGATE_LET => "AggregateLet", (5, 0);
    /// `$merge` as the final aggregation stage.
    AGGREGATE_MERGE => "AggregateMerge", (4, 2);
    AGGREGATE_OUT => "AggregateOut", (2, 6);
    ARRAY_FILTERS => "ArrayFilters", (3, 6);
    BYPASS_DOCUMENT_VALIDATION => "BypassDocumentValidation", (3, 2);
    COLLATION => "Collation", (3, 4);
    /// OP_MSG framing. Servers without it receive commands as OP_QUERY wrapped queries.
    COMMAND_MESSAGE => "CommandMessage", (3, 6);
    COMMANDS_THAT_WRITE_ACCEPT_WRITE_CONCERN => "CommandsThatWriteAcceptWriteConcern", (3, 4);
    CREATE_INDEX_COMMIT_QUORUM => "CreateIndexCommitQuorum", (4, 4);
    DOCUMENT_VALIDATION => "DocumentValidation", (3, 2);
    FIND_ALLOW_DISK_USE => "FindAllowDiskUse", (4, 4);
    FIND_AND_MODIFY_WRITE_CONCERN => "FindAndModifyWriteConcern", (3, 2);
    HIDDEN_INDEX => "HiddenIndex", (4, 4);
    HINT_FOR_DELETE_OPERATIONS => "HintForDeleteOperations", (4, 4);
    /// 4.2 servers reject the field themselves, so only older servers are refused up front.
    HINT_FOR_FIND_AND_MODIFY => "HintForFindAndModify", (4, 4),
        UnsupportedPolicy::RejectBelow(ServerVersion::new(4, 2, 0));
    HINT_FOR_UPDATE_AND_REPLACE_OPERATIONS => "HintForUpdateAndReplaceOperations", (4, 2);
    INDEX_OPTIONS_DEFAULTS => "IndexOptionsDefaults", (3, 2);
    MAX_TIME => "MaxTime", (2, 6);
    PARTIAL_INDEXES => "PartialIndexes", (3, 2);
    READ_CONCERN => "ReadConcern", (3, 2);
    RETRYABLE_WRITES => "RetryableWrites", (3, 6);
    SHARDED_TRANSACTIONS => "ShardedTransactions", (4, 2);
    TRANSACTIONS => "Transactions", (4, 0);
    VIEWS => "Views", (3, 4);
    WILDCARD_INDEXES => "WildcardIndexes", (4, 2);
}

impl Feature {
    /// The name of this feature.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The first server version that supports this feature.
    pub fn first_supported(&self) -> ServerVersion {
        self.first_supported
    }

    /// The newest server version that does not support this feature.
    pub fn last_not_supported(&self) -> ServerVersion {
        let ServerVersion {
            major,
            minor,
            patch,
        } = self.first_supported;
        match (minor, patch) {
            (_, p) if p > 0 => ServerVersion::new(major, minor, p - 1),
            (m, _) if m > 0 => ServerVersion::new(major, m - 1, u32::MAX),
            _ => ServerVersion::new(major.saturating_sub(1), u32::MAX, u32::MAX),
        }
    }

    /// The policy applied when this feature is requested against a server that lacks it.
    pub fn policy(&self) -> UnsupportedPolicy {
        self.policy
    }

    /// Whether a server with the given version supports this feature. Servers whose version is
    /// not known are assumed to support it.
    pub fn is_supported(&self, server_version: Option<&ServerVersion>) -> bool {
        match server_version {
            Some(version) => *version >= self.first_supported,
            None => true,
        }
    }

    /// Whether a request for this feature must be refused before it reaches a server with the
    /// given version.
    pub fn must_reject(&self, server_version: Option<&ServerVersion>) -> bool {
        let version = match server_version {
            Some(version) => version,
            None => return false,
        };
        match self.policy {
            UnsupportedPolicy::Reject => !self.is_supported(Some(version)),
            UnsupportedPolicy::RejectBelow(threshold) => *version < threshold,
        }
    }

    /// Returns an `UnsupportedFeature` error if `requested` is true and the server must not be
    /// sent this feature. Unrequested features are never checked.
    pub fn check(&self, server_version: Option<&ServerVersion>, requested: bool) -> Result<()> {
        match server_version {
            Some(version) if requested && self.must_reject(Some(version)) => {
                Err(Error::unsupported_feature(self, version))
            }
            _ => Ok(()),
        }
    }
}
