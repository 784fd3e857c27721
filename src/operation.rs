mod abort_transaction;
mod aggregate;
mod commit_transaction;
mod count;
mod count_documents;
mod create;
mod create_indexes;
mod delete;
mod distinct;
mod drop_collection;
mod drop_database;
mod drop_indexes;
mod find;
mod find_and_modify;
mod insert;
mod legacy_find;
mod list_collections;
mod list_indexes;
mod map_reduce;
mod rename_collection;
mod run_command;
mod update;

#[cfg(test)]
mod test;

use std::{collections::VecDeque, ops::Deref};

use serde::Deserialize;

use crate::{
    bson::{Bson, Document, Timestamp},
    bson_util,
    client::ClusterTime,
    cmap::{Command, RawCommandResponse, StreamDescription},
    concern::{ReadConcern, ReadConcernInternal, WriteConcern},
    error::{
        BulkWriteFailure,
        CommandError,
        Error,
        ErrorKind,
        IndexedWriteError,
        Result,
        WriteConcernError,
        WriteFailure,
    },
    feature::Feature,
    sdam::ServerAddress,
    selection_criteria::SelectionCriteria,
    Namespace,
};

pub use abort_transaction::AbortTransaction;
pub use aggregate::{Aggregate, AggregateTarget, AggregateToCollection};
pub use commit_transaction::CommitTransaction;
pub use count::Count;
pub use count_documents::CountDocuments;
pub use create::Create;
pub use create_indexes::CreateIndexes;
pub use delete::Delete;
pub use distinct::Distinct;
pub use drop_collection::DropCollection;
pub use drop_database::DropDatabase;
pub use drop_indexes::DropIndexes;
pub use find::Find;
pub use find_and_modify::{FindAndModify, Modification};
pub use insert::Insert;
pub use legacy_find::LegacyFind;
pub use list_collections::ListCollections;
pub use list_indexes::ListIndexes;
pub use map_reduce::{MapReduce, MapReduceOutputToCollection};
pub use rename_collection::RenameCollection;
pub use run_command::RunCommand;
pub use update::{Update, UpdateOrReplace};

/// How an operation may be retried after a retryable error.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Retryability {
    /// Retried once as a retryable write, reusing the transaction number.
    Write,
    /// Retried once as a retryable read.
    Read,
    /// Never retried.
    None,
}

impl Retryability {
    /// Whether this level of retryability can retry the given error.
    pub(crate) fn can_retry_error(&self, error: &Error) -> bool {
        match self {
            Self::Write => error.is_write_retryable(),
            Self::Read => error.is_read_retryable(),
            Self::None => false,
        }
    }
}

/// One server command: how to build it for a given server and how to read its reply.
///
/// Every method is required here so that the [`Executor`](crate::Executor) never falls back to
/// behavior an operation did not choose. Operations implement `OperationWithDefaults` instead and
/// get this trait through a blanket impl.
pub trait Operation: Send + Sync {
    /// What a successful reply is parsed into.
    type O: Send;

    /// The command verb.
    const NAME: &'static str;

    /// Builds the command for the server described by `description`. Fails before any I/O when
    /// an argument is invalid or the server lacks a requested feature. Anything needed later to
    /// read the reply is recorded on `self`.
    fn build(&mut self, description: &StreamDescription) -> Result<Command>;

    /// Interprets the server response to the command. Replies with `ok: 0` never reach this
    /// method.
    fn handle_response(
        &self,
        response: &RawCommandResponse,
        description: &StreamDescription,
    ) -> Result<Self::O>;

    /// Gets the first look at a failed attempt, and may turn it into a result.
    fn handle_error(&self, error: Error) -> Result<Self::O>;

    /// Passed to the channel source. Transactions override it.
    fn selection_criteria(&self) -> Option<&SelectionCriteria>;

    /// Whether the server acknowledges this operation's writes.
    fn is_acknowledged(&self) -> bool;

    /// The write concern the command carries, if any.
    fn write_concern(&self) -> Option<&WriteConcern>;

    /// Whether the command may carry a read concern, and so `afterClusterTime`.
    fn supports_read_concern(&self, description: &StreamDescription) -> bool;

    /// Whether the command may carry `lsid`.
    fn supports_sessions(&self) -> bool;

    /// Which retry rules apply after a retryable error.
    fn retryability(&self) -> Retryability;

    /// Called before the second attempt.
    fn update_for_retry(&mut self);

    /// The command verb, which for `RunCommand` is the first key of the user's document.
    fn name(&self) -> &str;
}

/// [`Operation`] with the common answers filled in.
#[doc(hidden)]
pub trait OperationWithDefaults: Send + Sync {
    type O: Send;

    const NAME: &'static str;

    fn build(&mut self, description: &StreamDescription) -> Result<Command>;

    fn handle_response(
        &self,
        _response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        Err(Error::internal(format!(
            "response handling not implemented for {}",
            Self::NAME
        )))
    }

    fn handle_error(&self, error: Error) -> Result<Self::O> {
        Err(error)
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        None
    }

    fn is_acknowledged(&self) -> bool {
        self.write_concern()
            .map(WriteConcern::is_acknowledged)
            .unwrap_or(true)
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        None
    }

    fn supports_read_concern(&self, _description: &StreamDescription) -> bool {
        false
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn retryability(&self) -> Retryability {
        Retryability::None
    }

    fn update_for_retry(&mut self) {}

    fn name(&self) -> &str {
        Self::NAME
    }
}

impl<T: OperationWithDefaults> Operation for T {
    type O = T::O;
    const NAME: &'static str = T::NAME;
    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.build(description)
    }
    fn handle_response(
        &self,
        response: &RawCommandResponse,
        description: &StreamDescription,
    ) -> Result<Self::O> {
        self.handle_response(response, description)
    }
    fn handle_error(&self, error: Error) -> Result<Self::O> {
        self.handle_error(error)
    }
    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.selection_criteria()
    }
    fn is_acknowledged(&self) -> bool {
        self.is_acknowledged()
    }
    fn write_concern(&self) -> Option<&WriteConcern> {
        self.write_concern()
    }
    fn supports_read_concern(&self, description: &StreamDescription) -> bool {
        self.supports_read_concern(description)
    }
    fn supports_sessions(&self) -> bool {
        self.supports_sessions()
    }
    fn retryability(&self) -> Retryability {
        self.retryability()
    }
    fn update_for_retry(&mut self) {
        self.update_for_retry()
    }
    fn name(&self) -> &str {
        self.name()
    }
}

/// The read concern to send, if any. Server-default read concerns are never sent.
pub(crate) fn read_concern_for(
    description: &StreamDescription,
    read_concern: Option<&ReadConcern>,
) -> Result<Option<ReadConcernInternal>> {
    let read_concern = read_concern.filter(|rc| !rc.is_server_default());
    Feature::READ_CONCERN.check(description.server_version.as_ref(), read_concern.is_some())?;
    Ok(read_concern.cloned().map(Into::into))
}

/// The write concern to send on a command whose support for one depends on `feature`. Empty write
/// concerns are never sent.
pub(crate) fn write_concern_for(
    feature: &Feature,
    description: &StreamDescription,
    write_concern: Option<&WriteConcern>,
) -> Result<Option<WriteConcern>> {
    let write_concern = write_concern.filter(|wc| !wc.is_empty());
    if let Some(wc) = write_concern {
        wc.validate()?;
    }
    feature.check(description.server_version.as_ref(), write_concern.is_some())?;
    Ok(write_concern.cloned())
}

/// The write concern to send on `insert`, `update` and `delete`, which every server accepts.
pub(crate) fn crud_write_concern(
    write_concern: Option<&WriteConcern>,
) -> Result<Option<WriteConcern>> {
    let write_concern = write_concern.filter(|wc| !wc.is_empty());
    if let Some(wc) = write_concern {
        wc.validate()?;
    }
    Ok(write_concern.cloned())
}

/// Any reply: the `ok` flag, the gossiped times and the rest of the body as `T`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandResponse<T> {
    pub(crate) ok: Bson,

    #[serde(rename = "$clusterTime")]
    pub(crate) cluster_time: Option<ClusterTime>,

    pub(crate) operation_time: Option<Timestamp>,

    #[serde(flatten)]
    pub(crate) body: T,
}

impl<T> CommandResponse<T> {
    /// `ok: 1`, whatever numeric type the server used.
    pub(crate) fn is_success(&self) -> bool {
        bson_util::get_int(&self.ok) == Some(1)
    }
}

/// The fields of an `ok: 0` reply.
#[derive(Deserialize, Debug)]
pub(crate) struct CommandErrorBody {
    #[serde(rename = "errorLabels")]
    pub(crate) error_labels: Option<Vec<String>>,

    #[serde(flatten)]
    pub(crate) command_error: CommandError,
}

impl From<CommandErrorBody> for Error {
    fn from(command_error_response: CommandErrorBody) -> Error {
        Error::new(
            ErrorKind::Command(command_error_response.command_error),
            command_error_response.error_labels,
        )
    }
}

/// A reply that can only fail through its write concern.
#[derive(Debug, Deserialize, Default, Clone)]
pub(crate) struct WriteConcernOnlyBody {
    #[serde(rename = "writeConcernError")]
    write_concern_error: Option<WriteConcernError>,

    #[serde(rename = "errorLabels")]
    labels: Option<Vec<String>>,
}

impl WriteConcernOnlyBody {
    pub(crate) fn validate(&self) -> Result<()> {
        match self.write_concern_error {
            Some(ref wc_error) => Err(Error::new(
                ErrorKind::Write(WriteFailure::WriteConcernError(wc_error.clone())),
                self.labels.clone(),
            )),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct SingleWriteBody {
    #[serde(deserialize_with = "crate::serde_util::deserialize_u64_from_bson_number")]
    pub(crate) n: u64,
}

#[derive(Deserialize, Debug)]
pub(crate) struct WriteResponseBody<T = SingleWriteBody> {
    #[serde(flatten)]
    body: T,

    #[serde(rename = "writeErrors")]
    write_errors: Option<Vec<IndexedWriteError>>,

    #[serde(rename = "writeConcernError")]
    write_concern_error: Option<WriteConcernError>,

    #[serde(rename = "errorLabels")]
    labels: Option<Vec<String>>,
}

impl<T> WriteResponseBody<T> {
    pub(crate) fn write_errors(&self) -> Option<&[IndexedWriteError]> {
        self.write_errors.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.write_errors.is_none() && self.write_concern_error.is_none() {
            return Ok(());
        };

        let mut failure = BulkWriteFailure::new();
        failure.write_errors = self.write_errors.clone();
        failure.write_concern_error = self.write_concern_error.clone();

        Err(Error::new(
            ErrorKind::BulkWrite(failure),
            self.labels.clone(),
        ))
    }
}

impl<T> Deref for WriteResponseBody<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CursorBody {
    pub(crate) cursor: CursorInfo,
}

impl CursorBody {
    pub(crate) fn extract(response: &RawCommandResponse) -> Result<CursorBody> {
        response.body()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CursorInfo {
    pub(crate) id: i64,

    pub(crate) ns: Namespace,

    #[serde(default)]
    pub(crate) first_batch: VecDeque<Document>,

    pub(crate) post_batch_resume_token: Option<Document>,
}

/// The first reply of a cursor-returning command. Fetching further batches is left to the caller.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CursorSpecification {
    /// The namespace the cursor iterates.
    pub ns: Namespace,

    /// The server the cursor lives on. `getMore`s must go to the same server.
    pub address: ServerAddress,

    /// The cursor id. Zero means the cursor is exhausted.
    pub id: i64,

    /// The documents returned with the first reply.
    pub first_batch: VecDeque<Document>,

    /// The resume token of the last document in the batch, for change streams.
    pub post_batch_resume_token: Option<Document>,
}

impl CursorSpecification {
    pub(crate) fn new(info: CursorInfo, address: ServerAddress) -> Self {
        Self {
            ns: info.ns,
            address,
            id: info.id,
            first_batch: info.first_batch,
            post_batch_resume_token: info.post_batch_resume_token,
        }
    }

    /// A cursor with no documents and no server side state.
    pub(crate) fn empty(ns: Namespace, address: ServerAddress) -> Self {
        Self {
            ns,
            address,
            id: 0,
            first_batch: VecDeque::new(),
            post_batch_resume_token: None,
        }
    }
}

/// The `cursor` subdocument of commands that open a cursor.
pub(crate) fn cursor_document(batch_size: Option<u32>) -> Document {
    let mut cursor = Document::new();
    if let Some(batch_size) = batch_size {
        cursor.insert("batchSize", i64::from(batch_size));
    }
    cursor
}
