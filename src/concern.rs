//! Read and write concerns, and the rules for when they are sent at all.


use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::Timestamp,
    error::{Error, Result},
    serde_util,
};

/// The isolation a read asks for.
///
/// `ReadConcern::server_default()` has no level and is never written into a command; the server
/// then applies its own default.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[non_exhaustive]
pub struct ReadConcern {
    /// `None` leaves the choice to the server.
    pub level: Option<ReadConcernLevel>,
}

impl ReadConcern {
    /// No level; the field is left out of commands.
    pub fn server_default() -> Self {
        Self::default()
    }

    /// `{level: "majority"}`.
    pub fn majority() -> Self {
        ReadConcernLevel::Majority.into()
    }

    /// `{level: "local"}`.
    pub fn local() -> Self {
        ReadConcernLevel::Local.into()
    }

    /// `{level: "snapshot"}`.
    pub fn snapshot() -> Self {
        ReadConcernLevel::Snapshot.into()
    }

    /// A level given by name. Names this crate does not recognize become
    /// [`ReadConcernLevel::Custom`].
    pub fn custom(level: impl AsRef<str>) -> Self {
        ReadConcernLevel::from(level.as_ref()).into()
    }

    /// Whether no level is set.
    pub fn is_server_default(&self) -> bool {
        self.level.is_none()
    }
}

impl From<ReadConcernLevel> for ReadConcern {
    fn from(level: ReadConcernLevel) -> Self {
        Self { level: Some(level) }
    }
}

/// `readConcern` as it goes on the wire. Causal consistency and snapshot reads add timestamps to
/// the user's level.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadConcernInternal {
    pub(crate) level: Option<ReadConcernLevel>,

    pub(crate) at_cluster_time: Option<Timestamp>,

    /// Reads must observe everything up to this operation time.
    pub(crate) after_cluster_time: Option<Timestamp>,
}

impl ReadConcernInternal {
    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<ReadConcern> for ReadConcernInternal {
    fn from(read_concern: ReadConcern) -> Self {
        Self {
            level: read_concern.level,
            ..Default::default()
        }
    }
}

/// A read concern level, serialized as its lowercase name.
#[derive(Clone, Debug, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum ReadConcernLevel {
    /// The node's most recent data.
    #[display("local")]
    Local,

    /// Data acknowledged by a majority of the replica set.
    #[display("majority")]
    Majority,

    /// Majority data that reflects every write acknowledged before the read began.
    #[display("linearizable")]
    Linearizable,

    /// Like `local` on sharded clusters, without orphan filtering.
    #[display("available")]
    Available,

    /// Majority data from a single point in time.
    #[display("snapshot")]
    Snapshot,

    /// Any other level, passed through verbatim.
    #[display("{_0}")]
    Custom(String),
}

impl From<&str> for ReadConcernLevel {
    fn from(name: &str) -> Self {
        [
            Self::Local,
            Self::Majority,
            Self::Linearizable,
            Self::Available,
            Self::Snapshot,
        ]
        .into_iter()
        .find(|level| level.to_string() == name)
        .unwrap_or_else(|| Self::Custom(name.to_string()))
    }
}

impl Serialize for ReadConcernLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReadConcernLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// The acknowledgement a write asks for.
///
/// Every field is optional. A write concern with none of them set is the server default and is
/// omitted from commands.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct WriteConcern {
    /// How many nodes, or which tagged set of nodes, must have the write.
    pub w: Option<Acknowledgment>,

    /// How long the server waits for `w` before reporting a write concern error.
    #[serde(
        rename = "wtimeout",
        alias = "wtimeoutMS",
        serialize_with = "serde_util::serialize_duration_option_as_int_millis",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis",
        default
    )]
    pub w_timeout: Option<Duration>,

    /// Whether the write must reach the on-disk journal.
    #[serde(rename = "j", alias = "journal")]
    pub journal: Option<bool>,
}

impl WriteConcern {
    /// `w: count`.
    pub fn nodes(count: u32) -> Self {
        Acknowledgment::Nodes(count).into()
    }

    /// `w: "majority"`.
    pub fn majority() -> Self {
        Acknowledgment::Majority.into()
    }

    /// A named write concern defined through the replica set's `getLastErrorModes`.
    pub fn custom(name: impl AsRef<str>) -> Self {
        Acknowledgment::from(name.as_ref()).into()
    }

    /// `w: 0`.
    pub fn unacknowledged() -> Self {
        Self::nodes(0)
    }

    /// `false` only for `w: 0` without journaling. Such writes are never retried and cannot be
    /// paired with an explicit session.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self.w, Some(Acknowledgment::Nodes(0))) || self.journal == Some(true)
    }

    /// Whether no field is set, which makes this the server default.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match (&self.w, self.journal) {
            (Some(Acknowledgment::Nodes(0)), Some(true)) => Err(Error::invalid_argument(
                "a write concern cannot combine w: 0 with j: true",
            )),
            _ => Ok(()),
        }
    }
}

impl From<Acknowledgment> for WriteConcern {
    fn from(w: Acknowledgment) -> Self {
        Self {
            w: Some(w),
            ..Default::default()
        }
    }
}

/// The `w` of a [`WriteConcern`]: a node count, `"majority"` or a tag set name.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Acknowledgment {
    /// `0` requests no acknowledgement.
    Nodes(u32),

    /// `"majority"`.
    Majority,

    /// A tag set name.
    Custom(String),
}

impl From<u32> for Acknowledgment {
    fn from(count: u32) -> Self {
        Self::Nodes(count)
    }
}

impl From<&str> for Acknowledgment {
    fn from(name: &str) -> Self {
        match name {
            "majority" => Self::Majority,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Acknowledgment {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl Serialize for Acknowledgment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Nodes(count) => {
                let count = i32::try_from(*count).map_err(serde::ser::Error::custom)?;
                serializer.serialize_i32(count)
            }
            Self::Majority => serializer.serialize_str("majority"),
            Self::Custom(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for Acknowledgment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CountOrName {
            Count(u32),
            Name(String),
        }

        Ok(match CountOrName::deserialize(deserializer)? {
            CountOrName::Count(count) => count.into(),
            CountOrName::Name(name) => name.into(),
        })
    }
}
