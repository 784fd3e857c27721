use std::time::Duration;

use serde::{de::Error as _, Deserialize, Deserializer};
use typed_builder::TypedBuilder;

use crate::{
    bson::{Bson, Document},
    bson_util,
    collation::Collation,
    concern::{ReadConcern, WriteConcern},
    selection_criteria::SelectionCriteria,
    serde_util,
};

/// Specifies whether a find-and-modify operation should return the document before or after
/// modification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReturnDocument {
    /// The document as it is after the change.
    After,
    /// The document as it was before the change.
    Before,
}

impl ReturnDocument {
    pub(crate) fn is_after(&self) -> bool {
        matches!(self, ReturnDocument::After)
    }
}

impl<'de> Deserialize<'de> for ReturnDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "after" => Ok(ReturnDocument::After),
            "before" => Ok(ReturnDocument::Before),
            other => Err(D::Error::custom(format!(
                "Unknown return document value: {other}"
            ))),
        }
    }
}

/// The index an operation should use.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Hint {
    /// By key pattern.
    Keys(Document),
    /// By index name.
    Name(String),
}

impl From<&Hint> for Bson {
    fn from(hint: &Hint) -> Self {
        match hint {
            Hint::Keys(ref d) => Bson::Document(d.clone()),
            Hint::Name(ref s) => Bson::String(s.clone()),
        }
    }
}

/// How a find cursor behaves once it reaches the end of the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub enum CursorType {
    /// The cursor closes once the last document has been returned.
    NonTailable,

    /// The cursor stays open at the end so later inserts can still be read.
    Tailable,

    /// A tailable cursor whose `getMore` waits on the server for new data.
    TailableAwait,
}

impl CursorType {
    pub(crate) fn is_tailable(self) -> bool {
        !matches!(self, CursorType::NonTailable)
    }

    pub(crate) fn is_await(self) -> bool {
        matches!(self, CursorType::TailableAwait)
    }
}

/// The `u` of an update statement.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum UpdateModifications {
    /// Update operators only, such as `$set`.
    Document(Document),

    /// An update pipeline.
    /// Requires a 4.2+ server.
    Pipeline(Vec<Document>),
}

impl UpdateModifications {
    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            UpdateModifications::Document(ref d) => Bson::Document(d.clone()),
            UpdateModifications::Pipeline(ref p) => bson_util::to_bson_array(p),
        }
    }

    /// Update documents must consist of update operators; pipelines are accepted as they are.
    pub(crate) fn validate(&self) -> crate::error::Result<()> {
        match self {
            UpdateModifications::Document(ref d) => bson_util::update_document_check(d),
            UpdateModifications::Pipeline(_) => Ok(()),
        }
    }
}

impl From<Document> for UpdateModifications {
    fn from(item: Document) -> Self {
        UpdateModifications::Document(item)
    }
}

impl From<Vec<Document>> for UpdateModifications {
    fn from(item: Vec<Document>) -> Self {
        UpdateModifications::Pipeline(item)
    }
}

/// Specifies the options to a `count` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct CountOptions {
    /// Sent as `hint`: index keys or an index name.
    pub hint: Option<Hint>,

    /// Sent as `limit`.
    pub limit: Option<u64>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as `skip`.
    pub skip: Option<u64>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Passed to the channel source when a channel is acquired.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Sent as `readConcern` unless it is the server default.
    pub read_concern: Option<ReadConcern>,

    /// Only sent by `countDocuments`, on the `aggregate` it runs.
    pub comment: Option<Bson>,
}

/// Specifies the options to a `distinct` command.
#[derive(Debug, Default, Deserialize, TypedBuilder, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DistinctOptions {
    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Passed to the channel source when a channel is acquired.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Sent as `readConcern` unless it is the server default.
    pub read_concern: Option<ReadConcern>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,
}

/// Specifies the options to a `find` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FindOptions {
    /// Enables writing to temporary files by the server. Only supported in server versions 4.4+.
    pub allow_disk_use: Option<bool>,

    /// Let a mongos answer with the shards that are up instead of failing.
    pub allow_partial_results: Option<bool>,

    /// Sent as `batchSize`.
    pub batch_size: Option<u32>,

    /// An arbitrary value echoed in the server's logs and profiler output.
    pub comment: Option<Bson>,

    /// Tailable cursors set `tailable` and, when awaiting, `awaitData`.
    #[serde(skip)]
    pub cursor_type: Option<CursorType>,

    /// Sent as `hint`: index keys or an index name.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Sent as `limit`. A negative value asks for a single batch of at most `-limit` documents
    /// and also sets `singleBatch`.
    pub limit: Option<i64>,

    /// Sent as `max`, the exclusive upper index bound.
    pub max: Option<Document>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as `min`, the inclusive lower index bound.
    pub min: Option<Document>,

    /// Keep the cursor open on the server even when it sits idle.
    pub no_cursor_timeout: Option<bool>,

    /// Sent as `oplogReplay`.
    pub oplog_replay: Option<bool>,

    /// Sent as the projection of the returned documents.
    pub projection: Option<Document>,

    /// Sent as `readConcern` unless it is the server default.
    pub read_concern: Option<ReadConcern>,

    /// Sent as `returnKey`.
    pub return_key: Option<bool>,

    /// Passed to the channel source when a channel is acquired.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Sent as `showRecordId`.
    pub show_record_id: Option<bool>,

    /// Sent as `skip`.
    pub skip: Option<u64>,

    /// Sent as `sort`.
    pub sort: Option<Document>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,
}

/// Specifies the options to a find sent as an OP_QUERY.
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct LegacyFindOptions {
    /// Let a mongos answer with the shards that are up instead of failing.
    pub allow_partial_results: Option<bool>,

    /// The number of documents the server should return per batch.
    pub batch_size: Option<u32>,

    /// Sent as `$comment`.
    pub comment: Option<Bson>,

    /// Tailable cursors set `tailable` and, when awaiting, `awaitData`.
    pub cursor_type: Option<CursorType>,

    /// The maximum number of documents to return. A negative limit closes the cursor after the
    /// first batch.
    pub limit: Option<i64>,

    /// Sent as `$maxTimeMS`.
    pub max_time: Option<Duration>,

    /// Query modifiers such as `$hint` or `$snapshot`. Modifiers never replace an element set by
    /// another option.
    pub modifiers: Option<Document>,

    /// Keep the cursor open on the server even when it sits idle.
    pub no_cursor_timeout: Option<bool>,

    /// Sent as `oplogReplay`.
    pub oplog_replay: Option<bool>,

    /// Limits the fields of the documents being returned.
    pub projection: Option<Document>,

    /// Passed to the channel source when a channel is acquired.
    pub selection_criteria: Option<SelectionCriteria>,

    /// Sent as `skip`.
    pub skip: Option<u64>,

    /// Sent as `$orderby`.
    pub sort: Option<Document>,
}

/// Specifies the options to an `aggregate` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct AggregateOptions {
    /// Enables writing to temporary files.
    pub allow_disk_use: Option<bool>,

    /// The number of documents the server should return per cursor batch. Ignored for
    /// aggregations that write their output to a collection.
    pub batch_size: Option<u32>,

    /// Opt out of document-level validation. Only sent for aggregations that write to a
    /// collection.
    pub bypass_document_validation: Option<bool>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// An arbitrary value echoed in the server's logs and profiler output.
    pub comment: Option<Bson>,

    /// Sent as `hint`: index keys or an index name.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the pipeline with `$$`. Only available in MongoDB
    /// 5.0+.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as `readConcern` unless it is the server default.
    pub read_concern: Option<ReadConcern>,

    /// Passed to the channel source when a channel is acquired.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// The write concern to use for the operation. Only sent for aggregations that write to a
    /// collection.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to an `insert` command.
#[derive(Clone, Debug, Default, TypedBuilder, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct InsertManyOptions {
    /// Sent as `bypassDocumentValidation` to servers that support document validation.
    pub bypass_document_validation: Option<bool>,

    /// Sent as `ordered`. Defaults to `true`, which stops at the first failed document.
    ///
    /// Defaults to true.
    pub ordered: Option<bool>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// An arbitrary value echoed in the server's logs and profiler output.
    pub comment: Option<Bson>,
}

/// Specifies the options to an `update` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct UpdateOptions {
    /// Sent as `arrayFilters`. Requires a 3.6+ server.
    pub array_filters: Option<Vec<Document>>,

    /// Sent as `bypassDocumentValidation` to servers that support document validation.
    pub bypass_document_validation: Option<bool>,

    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `hint`: index keys or an index name.
    ///
    /// Requires a 4.2+ server.
    pub hint: Option<Hint>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Variables that can be accessed within the update with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// An arbitrary value echoed in the server's logs and profiler output.
    pub comment: Option<Bson>,
}

impl From<ReplaceOptions> for UpdateOptions {
    fn from(options: ReplaceOptions) -> Self {
        Self {
            bypass_document_validation: options.bypass_document_validation,
            upsert: options.upsert,
            hint: options.hint,
            write_concern: options.write_concern,
            collation: options.collation,
            let_vars: options.let_vars,
            comment: options.comment,
            array_filters: None,
        }
    }
}

/// Specifies the options to a replacement sent through the `update` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ReplaceOptions {
    /// Sent as `bypassDocumentValidation` to servers that support document validation.
    pub bypass_document_validation: Option<bool>,

    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `hint`: index keys or an index name.
    pub hint: Option<Hint>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Tags the query with an arbitrary value.
    pub comment: Option<Bson>,
}

/// Specifies the options to a `delete` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct DeleteOptions {
    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Sent as `hint`: index keys or an index name.
    /// Requires a 4.4+ server.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Tags the query with an arbitrary value.
    pub comment: Option<Bson>,
}

/// Specifies the options to a `findAndModify` command that removes the matched document.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct FindOneAndDeleteOptions {
    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as the projection of the returned documents.
    pub projection: Option<Document>,

    /// Sent as `sort`.
    pub sort: Option<Document>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `hint`: index keys or an index name.
    /// Requires a 4.4+ server.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Tags the query with an arbitrary value.
    pub comment: Option<Bson>,
}

/// Specifies the options to a `findAndModify` command that replaces the matched document.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FindOneAndReplaceOptions {
    /// Sent as `bypassDocumentValidation` to servers that support document validation.
    pub bypass_document_validation: Option<bool>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as the projection of the returned documents.
    pub projection: Option<Document>,

    /// Which version of the document comes back. Sent as `new`.
    pub return_document: Option<ReturnDocument>,

    /// Sent as `sort`.
    pub sort: Option<Document>,

    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `hint`: index keys or an index name.
    /// Requires a 4.4+ server.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Tags the query with an arbitrary value.
    pub comment: Option<Bson>,
}

/// Specifies the options to a `findAndModify` command that updates the matched document.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct FindOneAndUpdateOptions {
    /// Sent as `arrayFilters`. Requires a 3.6+ server.
    pub array_filters: Option<Vec<Document>>,

    /// Sent as `bypassDocumentValidation` to servers that support document validation.
    pub bypass_document_validation: Option<bool>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as the projection of the returned documents.
    pub projection: Option<Document>,

    /// Which version of the document comes back. Sent as `new`.
    pub return_document: Option<ReturnDocument>,

    /// Sent as `sort`.
    pub sort: Option<Document>,

    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// Sent as `hint`: index keys or an index name.
    /// Requires a 4.4+ server.
    pub hint: Option<Hint>,

    /// Variables that can be accessed within the filter with `$$`.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Tags the query with an arbitrary value.
    pub comment: Option<Bson>,
}

/// Specifies how strictly the database should apply validation rules to existing documents during
/// an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ValidationLevel {
    /// Perform no validation for inserts and updates.
    #[display("off")]
    Off,
    /// Perform validation on all inserts and updates.
    #[display("strict")]
    Strict,
    /// Perform validation on inserts as well as updates on existing valid documents, but do not
    /// perform validations on updates on existing invalid documents.
    #[display("moderate")]
    Moderate,
}

/// Specifies whether the database should return an error or simply raise a warning if inserted
/// documents do not pass the validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ValidationAction {
    /// Return an error if inserted documents do not pass the validation.
    #[display("error")]
    Error,
    /// Raise a warning if inserted documents do not pass the validation.
    #[display("warn")]
    Warn,
}

/// Specifies the options to a `create` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateCollectionOptions {
    /// Whether the collection should be capped. If true, `size` must also be set.
    pub capped: Option<bool>,

    /// The maximum size (in bytes) for a capped collection.
    pub size: Option<u64>,

    /// The maximum number of documents in a capped collection.
    pub max: Option<u64>,

    /// The storage engine that the collection should use.
    pub storage_engine: Option<Document>,

    /// Specifies a validator to restrict the schema of documents which can exist in the
    /// collection.
    pub validator: Option<Document>,

    /// Specifies how strictly the database should apply the validation rules.
    pub validation_level: Option<ValidationLevel>,

    /// Specifies whether the database should return an error or simply raise a warning if
    /// inserted documents do not pass the validation.
    pub validation_action: Option<ValidationAction>,

    /// The default configuration for indexes created on this collection.
    pub index_option_defaults: Option<Document>,

    /// The name of the source collection or view to base this view on. Requires `pipeline`.
    pub view_on: Option<String>,

    /// An array that consists of the aggregation pipeline stages to run against `view_on` to
    /// determine the contents of this view.
    pub pipeline: Option<Vec<Document>>,

    /// The default collation for the collection or view.
    pub collation: Option<Collation>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to a `drop` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DropCollectionOptions {
    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to a `dropDatabase` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DropDatabaseOptions {
    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// The minimum number of data-bearing voting replica set members that must complete an index
/// build before the primary marks the indexes as ready.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum CommitQuorum {
    /// A specific number of voting replica set members.
    Nodes(u32),

    /// All data-bearing voting replica set members.
    VotingMembers,

    /// A simple majority of voting members.
    Majority,

    /// A replica set tag name.
    Custom(String),
}

impl From<&CommitQuorum> for Bson {
    fn from(quorum: &CommitQuorum) -> Self {
        match quorum {
            CommitQuorum::Nodes(n) => Bson::Int64(i64::from(*n)),
            CommitQuorum::VotingMembers => Bson::String("votingMembers".to_string()),
            CommitQuorum::Majority => Bson::String("majority".to_string()),
            CommitQuorum::Custom(s) => Bson::String(s.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for CommitQuorum {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IntOrString {
            Int(u32),
            String(String),
        }
        match IntOrString::deserialize(deserializer)? {
            IntOrString::String(s) if s == "votingMembers" => Ok(CommitQuorum::VotingMembers),
            IntOrString::String(s) if s == "majority" => Ok(CommitQuorum::Majority),
            IntOrString::String(s) => Ok(CommitQuorum::Custom(s)),
            IntOrString::Int(n) => Ok(CommitQuorum::Nodes(n)),
        }
    }
}

/// Specifies the options to a `createIndexes` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateIndexOptions {
    /// Specify the commit quorum needed to mark an `index` as ready.
    pub commit_quorum: Option<CommitQuorum>,

    /// The maximum amount of time to allow the index to build.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to a `dropIndexes` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DropIndexOptions {
    /// The maximum amount of time to allow the index to drop.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to a `listIndexes` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListIndexesOptions {
    /// The number of indexes the server should return per cursor batch.
    pub batch_size: Option<u32>,

    /// Sent as `maxTimeMS`, rounded up to whole milliseconds.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,
}

/// Specifies the options to a `listCollections` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListCollectionsOptions {
    /// The number of collections the server should return per cursor batch.
    pub batch_size: Option<u32>,

    /// Filters the list of collections to those the user is authorized to access.
    pub authorized_collections: Option<bool>,
}

/// Specifies the options to a `renameCollection` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RenameCollectionOptions {
    /// Whether an existing collection with the new name is dropped first.
    pub drop_target: Option<bool>,

    /// Sent as `writeConcern` unless it is the server default.
    pub write_concern: Option<WriteConcern>,
}

/// What a map-reduce does with an existing output collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum MapReduceOutputAction {
    /// Replace the contents of the output collection.
    Replace,
    /// Merge the results into the output collection, overwriting documents with the same key.
    Merge,
    /// Reduce the results into the output collection with the existing documents.
    Reduce,
}

impl MapReduceOutputAction {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            MapReduceOutputAction::Replace => "replace",
            MapReduceOutputAction::Merge => "merge",
            MapReduceOutputAction::Reduce => "reduce",
        }
    }
}

/// Where a map-reduce writes its results.
#[derive(Clone, Debug, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct MapReduceOutput {
    /// What to do with an existing output collection.
    #[builder(!default)]
    pub action: MapReduceOutputAction,

    /// The name of the output collection.
    #[builder(!default)]
    pub collection: String,

    /// The database of the output collection, if not the input collection's.
    pub database: Option<String>,

    /// Whether the output collection is sharded.
    pub sharded: Option<bool>,

    /// Whether the output is written without locking the database.
    pub non_atomic: Option<bool>,
}

impl MapReduceOutput {
    pub(crate) fn to_document(&self) -> Document {
        let mut out = Document::new();
        out.insert(self.action.as_str(), self.collection.clone());
        if let Some(ref db) = self.database {
            out.insert("db", db.clone());
        }
        if let Some(sharded) = self.sharded {
            out.insert("sharded", sharded);
        }
        if let Some(non_atomic) = self.non_atomic {
            out.insert("nonAtomic", non_atomic);
        }
        out
    }
}

/// Specifies the options to a `mapReduce` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct MapReduceOptions {
    /// Selects the input documents.
    pub query: Option<Document>,

    /// A JavaScript function applied to the output of the reduce function.
    pub finalize: Option<String>,

    /// Whether intermediate data is kept in JavaScript objects.
    pub js_mode: Option<bool>,

    /// The maximum number of input documents.
    pub limit: Option<u64>,

    /// The maximum amount of time to allow the command to run.
    #[serde(
        default,
        rename = "maxTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_time: Option<Duration>,

    /// Global variables accessible in the map, reduce and finalize functions.
    pub scope: Option<Document>,

    /// Sorts the input documents.
    pub sort: Option<Document>,

    /// Whether timing information is included in the result.
    pub verbose: Option<bool>,

    /// Sent as `collation`. Rejected before sending on servers older than 3.4.
    pub collation: Option<Collation>,

    /// The read concern to use for inline map-reduce.
    pub read_concern: Option<ReadConcern>,

    /// The criteria used to select a server for inline map-reduce.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Opt out of document-level validation. Only sent when writing to a collection.
    pub bypass_document_validation: Option<bool>,

    /// The write concern. Only sent when writing to a collection.
    pub write_concern: Option<WriteConcern>,
}

/// Specifies the options to a command run verbatim.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RunCommandOptions {
    /// The criteria used to select a server for the command.
    #[serde(rename = "readPreference")]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Tags the command with an arbitrary value.
    pub comment: Option<Bson>,
}
