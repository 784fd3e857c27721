use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use derive_where::derive_where;
use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    cmap::StreamDescription,
    error::{Error, Result},
    sdam::ServerType,
    serde_util,
};

/// What a [`ChannelSource`](crate::cmap::ChannelSource) is asked for when an operation needs a
/// channel.
#[derive(Clone, derive_more::Display)]
#[derive_where(Debug)]
#[non_exhaustive]
pub enum SelectionCriteria {
    /// Route by server role, tags and staleness.
    #[display("ReadPreference {_0}")]
    ReadPreference(ReadPreference),

    /// Route to any server whose description the predicate accepts.
    #[display("Custom predicate")]
    Predicate(#[derive_where(skip)] Predicate),
}

/// Predicates never compare equal, not even to themselves.
impl PartialEq for SelectionCriteria {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_read_pref(), other.as_read_pref()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        }
    }
}

impl From<ReadPreference> for SelectionCriteria {
    fn from(read_preference: ReadPreference) -> Self {
        Self::ReadPreference(read_preference)
    }
}

impl SelectionCriteria {
    pub(crate) fn as_read_pref(&self) -> Option<&ReadPreference> {
        match self {
            Self::ReadPreference(read_preference) => Some(read_preference),
            Self::Predicate(_) => None,
        }
    }

    /// Whether a server described by `description` is acceptable. Only the server role is
    /// considered for read preferences; tags and staleness need monitoring data this crate does
    /// not have.
    pub fn is_satisfied_by(&self, description: &StreamDescription) -> bool {
        match self {
            Self::Predicate(predicate) => predicate(description),
            Self::ReadPreference(read_preference) => {
                read_preference.accepts(description.initial_server_type)
            }
        }
    }
}

impl<'de> Deserialize<'de> for SelectionCriteria {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ReadPreference::deserialize(deserializer).map(Self::ReadPreference)
    }
}

/// A server filter for [`SelectionCriteria::Predicate`].
pub type Predicate = Arc<dyn Send + Sync + Fn(&StreamDescription) -> bool>;

/// A read preference tag set: every tag must match for a member to qualify.
pub type TagSet = HashMap<String, String>;

/// Which replica set members may serve a read.
///
/// Every mode except `Primary` can narrow the candidates further with
/// [`ReadPreferenceOptions`]. On the wire this becomes
/// `{mode, tags?, maxStalenessSeconds?}`.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ReadPreference {
    /// The primary only.
    Primary,

    /// Secondaries only.
    Secondary {
        options: Option<ReadPreferenceOptions>,
    },

    /// The primary, or a secondary when there is no primary.
    PrimaryPreferred {
        options: Option<ReadPreferenceOptions>,
    },

    /// A secondary, or the primary when there is no secondary.
    SecondaryPreferred {
        options: Option<ReadPreferenceOptions>,
    },

    /// Any member within the latency window.
    Nearest {
        options: Option<ReadPreferenceOptions>,
    },
}

/// Narrowing applied to a non-primary [`ReadPreference`].
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ReadPreferenceOptions {
    /// Tried in order; the first tag set that matches any member wins.
    #[serde(rename = "tags", alias = "tagSets")]
    pub tag_sets: Option<Vec<TagSet>>,

    /// How far behind the primary a secondary may be. Sent as whole seconds.
    #[serde(
        rename = "maxStalenessSeconds",
        default,
        with = "serde_util::duration_option_as_int_seconds"
    )]
    pub max_staleness: Option<Duration>,
}

impl ReadPreferenceOptions {
    /// An empty tag list and a list holding one empty tag set both match every member.
    fn is_default(&self) -> bool {
        let tags_match_all = match self.tag_sets.as_deref() {
            None | Some([]) => true,
            Some([only]) => only.is_empty(),
            Some(_) => false,
        };
        tags_match_all && self.max_staleness.is_none()
    }
}

impl ReadPreference {
    fn from_mode(mode: &str, options: ReadPreferenceOptions) -> Option<Self> {
        let options = Some(options);
        let read_preference = match mode.to_ascii_lowercase().as_str() {
            "primary" => Self::Primary,
            "secondary" => Self::Secondary { options },
            "primarypreferred" => Self::PrimaryPreferred { options },
            "secondarypreferred" => Self::SecondaryPreferred { options },
            "nearest" => Self::Nearest { options },
            _ => return None,
        };
        Some(read_preference)
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary { .. } => "secondary",
            Self::PrimaryPreferred { .. } => "primaryPreferred",
            Self::SecondaryPreferred { .. } => "secondaryPreferred",
            Self::Nearest { .. } => "nearest",
        }
    }

    fn options_slot(&mut self) -> Option<&mut Option<ReadPreferenceOptions>> {
        match self {
            Self::Primary => None,
            Self::Secondary { options }
            | Self::PrimaryPreferred { options }
            | Self::SecondaryPreferred { options }
            | Self::Nearest { options } => Some(options),
        }
    }

    pub(crate) fn options(&self) -> Option<&ReadPreferenceOptions> {
        match self {
            Self::Primary => None,
            Self::Secondary { options }
            | Self::PrimaryPreferred { options }
            | Self::SecondaryPreferred { options }
            | Self::Nearest { options } => options.as_ref(),
        }
    }

    pub(crate) fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }

    fn accepts(&self, server_type: ServerType) -> bool {
        match (self, server_type) {
            (_, ServerType::Standalone | ServerType::Mongos | ServerType::Unknown) => true,
            (Self::Primary, role) => role == ServerType::RsPrimary,
            (Self::Secondary { .. }, role) => role == ServerType::RsSecondary,
            (_, role) => matches!(role, ServerType::RsPrimary | ServerType::RsSecondary),
        }
    }

    fn with_option(
        mut self,
        what: &str,
        set: impl FnOnce(&mut ReadPreferenceOptions),
    ) -> Result<Self> {
        let Some(slot) = self.options_slot() else {
            return Err(Error::invalid_argument(format!(
                "{what} cannot be used with a primary read preference"
            )));
        };
        set(slot.get_or_insert_with(Default::default));
        Ok(self)
    }

    /// Returns this read preference restricted to members matching `tag_sets`. Fails for
    /// `Primary`.
    pub fn with_tags(self, tag_sets: Vec<TagSet>) -> Result<Self> {
        self.with_option("tag sets", |options| options.tag_sets = Some(tag_sets))
    }

    /// Returns this read preference restricted to secondaries at most `max_staleness` behind.
    /// Fails for `Primary`.
    pub fn with_max_staleness(self, max_staleness: Duration) -> Result<Self> {
        self.with_option("max staleness", |options| {
            options.max_staleness = Some(max_staleness)
        })
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ mode: {}", self.mode())?;
        if let Some(tag_sets) = self.options().and_then(|o| o.tag_sets.as_ref()) {
            write!(f, ", tags: {tag_sets:?}")?;
        }
        if let Some(max_staleness) = self.options().and_then(|o| o.max_staleness) {
            write!(f, ", max staleness: {max_staleness:?}")?;
        }
        f.write_str(" }")
    }
}

#[derive(Serialize, Deserialize)]
struct ReadPreferenceDocument<O> {
    mode: String,
    #[serde(flatten)]
    options: O,
}

impl Serialize for ReadPreference {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ReadPreferenceDocument {
            mode: self.mode().to_string(),
            options: self.options().cloned().unwrap_or_default(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReadPreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let document = ReadPreferenceDocument::<ReadPreferenceOptions>::deserialize(deserializer)?;
        let primary_with_options =
            document.mode.eq_ignore_ascii_case("primary") && !document.options.is_default();
        if primary_with_options {
            return Err(D::Error::custom(format!(
                "a primary read preference takes no options, got {:?}",
                document.options
            )));
        }
        let mode = document.mode.clone();
        Self::from_mode(&document.mode, document.options)
            .ok_or_else(|| D::Error::custom(format!("unknown read preference mode {mode}")))
    }
}
