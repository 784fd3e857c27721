use crate::{
    bson::{Bson, Document},
    bson_util,
    error::Result,
    sdam::ServerType,
    selection_criteria::ReadPreference,
};

use super::QueryFlags;

/// The OP_QUERY header fields that accompany a legacy query.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct QueryHeader {
    /// The `db.collection` the query targets. Commands target `db.$cmd`.
    pub full_collection_name: String,

    /// The number of documents the server should skip.
    pub number_to_skip: i32,

    /// The number of documents to return in the first batch. Commands use -1.
    pub number_to_return: i32,

    /// The projection applied to the returned documents.
    pub return_fields_selector: Option<Document>,
}

impl QueryHeader {
    pub(crate) fn for_command(db: &str) -> Self {
        Self {
            full_collection_name: format!("{db}.$cmd"),
            number_to_skip: 0,
            number_to_return: -1,
            return_fields_selector: None,
        }
    }
}

/// A command in the form it is written to the wire.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct WireCommand {
    /// The document to send.
    pub document: Document,

    /// Flags for the OP_QUERY header. Always empty for OP_MSG.
    pub flags: QueryFlags,

    /// `Some` when the document must be sent as an OP_QUERY, `None` for OP_MSG.
    pub query: Option<QueryHeader>,
}

/// A query that was wrapped when its operation was built and is sent as-is.
#[derive(Clone, Debug)]
pub(crate) struct LegacyQuery {
    pub(crate) header: QueryHeader,
    pub(crate) document: Document,
    pub(crate) flags: QueryFlags,
}

impl From<LegacyQuery> for WireCommand {
    fn from(query: LegacyQuery) -> Self {
        Self {
            document: query.document,
            flags: query.flags,
            query: Some(query.header),
        }
    }
}

/// Builds the `{$query: ...}` form of a query or command.
///
/// Wrapping happens only when there is something to put next to the query: a `$readPreference`
/// for a mongos, a modifier element or additional options. Otherwise the query is sent unwrapped.
/// `SECONDARY_OK` is set for every read preference other than primary whether or not the query is
/// wrapped.
#[derive(Debug)]
pub(crate) struct LegacyQueryWrapper<'a> {
    server_type: ServerType,
    read_preference: Option<&'a ReadPreference>,
    elements: Document,
    additional_options: Option<&'a Document>,
    flags: QueryFlags,
}

impl<'a> LegacyQueryWrapper<'a> {
    pub(crate) fn new(
        server_type: ServerType,
        read_preference: Option<&'a ReadPreference>,
    ) -> Self {
        let mut flags = QueryFlags::empty();
        if read_preference.is_some_and(|rp| !rp.is_primary()) {
            flags |= QueryFlags::SECONDARY_OK;
        }
        Self {
            server_type,
            read_preference,
            elements: Document::new(),
            additional_options: None,
            flags,
        }
    }

    /// Adds a top-level element after `$query` and `$readPreference`, if a value is present.
    pub(crate) fn element(mut self, key: &str, value: Option<impl Into<Bson>>) -> Self {
        if let Some(value) = value {
            self.elements.insert(key, value.into());
        }
        self
    }

    pub(crate) fn comment(self, comment: Option<Bson>) -> Self {
        self.element("$comment", comment)
    }

    /// Options merged into the top level last. They never replace an element that is already
    /// present.
    pub(crate) fn additional_options(mut self, options: Option<&'a Document>) -> Self {
        self.additional_options = options.filter(|options| !options.is_empty());
        self
    }

    pub(crate) fn flag(mut self, flag: QueryFlags, enabled: bool) -> Self {
        self.flags.set(flag, enabled);
        self
    }

    fn read_preference_element(&self) -> Option<&'a ReadPreference> {
        match self.read_preference {
            Some(rp) if self.server_type == ServerType::Mongos && !rp.is_primary() => Some(rp),
            _ => None,
        }
    }

    pub(crate) fn wrap(self, query: Document) -> Result<(Document, QueryFlags)> {
        let read_preference = self.read_preference_element();
        if read_preference.is_none()
            && self.elements.is_empty()
            && self.additional_options.is_none()
        {
            return Ok((query, self.flags));
        }

        let mut wrapped = Document::new();
        wrapped.insert("$query", query);
        if let Some(read_preference) = read_preference {
            wrapped.insert("$readPreference", bson::to_bson(read_preference)?);
        }
        for (key, value) in self.elements {
            if !wrapped.contains_key(&key) {
                wrapped.insert(key, value);
            }
        }
        if let Some(options) = self.additional_options {
            bson_util::merge_without_overwrite(&mut wrapped, options);
        }
        Ok((wrapped, self.flags))
    }
}

#[cfg(test)]
mod test;
