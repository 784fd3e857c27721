use std::{convert::TryFrom, time::Duration};

use serde::Serialize;

use crate::{
    bson::{Bson, Document},
    cmap::StreamDescription,
    error::{ErrorKind, Result},
    feature::{Feature, ServerVersion},
    serde_util,
};

/// Coerce numeric types into an `i64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_int(val: &Bson) -> Option<i64> {
    match *val {
        Bson::Int32(i) => Some(i64::from(i)),
        Bson::Int64(i) => Some(i),
        Bson::Double(f) if (f - (f as i64 as f64)).abs() <= f64::EPSILON => Some(f as i64),
        _ => None,
    }
}

/// Coerce numeric types into an `u64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_u64(val: &Bson) -> Option<u64> {
    match *val {
        Bson::Int32(i) => u64::try_from(i).ok(),
        Bson::Int64(i) => u64::try_from(i).ok(),
        Bson::Double(f) if (f - (f as u64 as f64)).abs() <= f64::EPSILON => Some(f as u64),
        _ => None,
    }
}

/// Converts a count or offset to the `Int64` the server expects, saturating at `i64::MAX`.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn to_bson_array(docs: &[Document]) -> Bson {
    Bson::Array(docs.iter().map(|doc| Bson::Document(doc.clone())).collect())
}

pub(crate) fn first_key(document: &Document) -> Option<&str> {
    document.keys().next().map(String::as_str)
}

pub(crate) fn replacement_document_check(replacement: &Document) -> Result<()> {
    match first_key(replacement) {
        Some(key) if key.starts_with('$') => Err(ErrorKind::InvalidArgument {
            message: "replace document must have first key not starting with '$'".to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

pub(crate) fn update_document_check(update: &Document) -> Result<()> {
    match first_key(update) {
        Some(s) if s.starts_with('$') => Ok(()),
        _ => Err(ErrorKind::InvalidArgument {
            message: "update document must have first key starting with '$'".to_string(),
        }
        .into()),
    }
}

/// Merges `other` into `document`, keeping the existing value for keys present in both.
pub(crate) fn merge_without_overwrite(document: &mut Document, other: &Document) {
    for (key, value) in other {
        if !document.contains_key(key) {
            document.insert(key.clone(), value.clone());
        }
    }
}

/// Builds a command document one field at a time. Fields appear in the order they are added, and
/// optional fields are only written when a value is present.
///
/// Fields that depend on a server capability go through [`CommandBuilder::gated`], which consults
/// the [`Feature`] catalog against the server the command is being built for.
#[derive(Debug)]
pub(crate) struct CommandBuilder<'a> {
    document: Document,
    description: &'a StreamDescription,
}

impl<'a> CommandBuilder<'a> {
    /// Starts a command whose first field is the command verb.
    pub(crate) fn new(
        verb: &str,
        value: impl Into<Bson>,
        description: &'a StreamDescription,
    ) -> Self {
        let mut document = Document::new();
        document.insert(verb, value.into());
        Self {
            document,
            description,
        }
    }

    pub(crate) fn server_version(&self) -> Option<&ServerVersion> {
        self.description.server_version.as_ref()
    }

    pub(crate) fn append(mut self, key: &str, value: impl Into<Bson>) -> Self {
        self.document.insert(key, value.into());
        self
    }

    pub(crate) fn append_if(self, key: &str, value: impl Into<Bson>, predicate: bool) -> Self {
        if predicate {
            self.append(key, value)
        } else {
            self
        }
    }

    pub(crate) fn optional<V: Into<Bson>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.append(key, value),
            None => self,
        }
    }

    pub(crate) fn optional_serialized<T: Serialize>(
        self,
        key: &str,
        value: Option<&T>,
    ) -> Result<Self> {
        Ok(match value {
            Some(value) => {
                let value = bson::to_bson(value)?;
                self.append(key, value)
            }
            None => self,
        })
    }

    /// Appends a value that requires `feature`. Returns an `UnsupportedFeature` error when a
    /// value is present and the feature's policy refuses it for this server.
    pub(crate) fn gated<V: Into<Bson>>(
        self,
        key: &str,
        feature: &Feature,
        value: Option<V>,
    ) -> Result<Self> {
        feature.check(self.server_version(), value.is_some())?;
        Ok(self.optional(key, value))
    }

    pub(crate) fn gated_serialized<T: Serialize>(
        self,
        key: &str,
        feature: &Feature,
        value: Option<&T>,
    ) -> Result<Self> {
        feature.check(self.server_version(), value.is_some())?;
        self.optional_serialized(key, value)
    }

    /// Appends `maxTimeMS` as a 32-bit integer, rounding sub-millisecond durations up.
    pub(crate) fn max_time(self, max_time: Option<Duration>) -> Result<Self> {
        let millis = max_time
            .map(serde_util::duration_to_max_time_ms)
            .transpose()?;
        self.gated("maxTimeMS", &Feature::MAX_TIME, millis)
    }

    pub(crate) fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod test;
