use serde::de::DeserializeOwned;

use crate::{
    bson::{Bson, Document, RawDocument, RawDocumentBuf, Timestamp},
    bson_util,
    client::ClusterTime,
    concern::{ReadConcernInternal, WriteConcern},
    error::{Error, ErrorKind, Result},
    sdam::{ServerAddress, ServerType},
    selection_criteria::ReadPreference,
    wire::{LegacyQuery, LegacyQueryWrapper, QueryHeader, WireCommand},
};

use super::StreamDescription;

/// Driver-side model of a database command.
///
/// An operation builds the body; the executor then attaches session, transaction and
/// consistency metadata. The final document is only produced by [`Command::document`] or
/// [`Command::wire_document`], so every stamp lands in a fixed position regardless of the order in
/// which it was set.
#[derive(Clone, Debug)]
pub struct Command {
    pub(crate) name: String,

    pub(crate) target_db: String,

    pub(crate) body: Document,

    pub(crate) read_concern: Option<ReadConcernInternal>,

    pub(crate) write_concern: Option<WriteConcern>,

    pub(crate) comment: Option<Bson>,

    pub(crate) additional_options: Option<Document>,

    pub(crate) lsid: Option<Document>,

    pub(crate) txn_number: Option<i64>,

    start_transaction: Option<bool>,

    autocommit: Option<bool>,

    cluster_time: Option<ClusterTime>,

    pub(crate) read_preference: Option<ReadPreference>,

    trailing_field: Option<(String, Bson)>,

    legacy_query: Option<LegacyQuery>,
}

impl Command {
    pub(crate) fn new(name: impl ToString, target_db: impl ToString, body: Document) -> Self {
        Self {
            name: name.to_string(),
            target_db: target_db.to_string(),
            body,
            read_concern: None,
            write_concern: None,
            comment: None,
            additional_options: None,
            lsid: None,
            txn_number: None,
            start_transaction: None,
            autocommit: None,
            cluster_time: None,
            read_preference: None,
            trailing_field: None,
            legacy_query: None,
        }
    }

    /// Constructs a read command carrying the given read concern.
    pub(crate) fn new_read(
        name: impl ToString,
        target_db: impl ToString,
        read_concern: Option<ReadConcernInternal>,
        body: Document,
    ) -> Self {
        let mut command = Self::new(name, target_db, body);
        command.read_concern = read_concern;
        command
    }

    /// Constructs a command whose wire form was fixed when it was built, such as a legacy find.
    pub(crate) fn new_legacy_query(
        name: impl ToString,
        target_db: impl ToString,
        query: LegacyQuery,
    ) -> Self {
        let mut command = Self::new(name, target_db, query.document.clone());
        command.legacy_query = Some(query);
        command
    }

    /// The name of the command.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database the command runs against.
    pub fn target_db(&self) -> &str {
        &self.target_db
    }

    pub(crate) fn set_write_concern(&mut self, write_concern: Option<WriteConcern>) {
        self.write_concern = write_concern;
    }

    pub(crate) fn set_comment(&mut self, comment: Option<Bson>) {
        self.comment = comment;
    }

    pub(crate) fn set_additional_options(&mut self, options: Option<Document>) {
        self.additional_options = options;
    }

    pub(crate) fn set_session_id(&mut self, lsid: &Document) {
        self.lsid = Some(lsid.clone());
    }

    pub(crate) fn set_txn_number(&mut self, txn_number: i64) {
        self.txn_number = Some(txn_number);
    }

    pub(crate) fn set_start_transaction(&mut self) {
        self.start_transaction = Some(true);
    }

    pub(crate) fn set_autocommit(&mut self) {
        self.autocommit = Some(false);
    }

    pub(crate) fn set_cluster_time(&mut self, cluster_time: &ClusterTime) {
        self.cluster_time = Some(cluster_time.clone());
    }

    pub(crate) fn set_read_preference(&mut self, read_preference: ReadPreference) {
        self.read_preference = Some(read_preference);
    }

    /// Sets a field that follows the concerns in the command document: the `cursor` of commands
    /// that open one, or the statements of a write command.
    pub(crate) fn set_trailing_field(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.trailing_field = Some((key.into(), value.into()));
    }

    /// Replaces the read concern with the transaction's, which is only sent on the first command
    /// of a transaction.
    pub(crate) fn set_read_concern(&mut self, read_concern: Option<ReadConcernInternal>) {
        self.read_concern = read_concern;
    }

    /// Sets `afterClusterTime`, creating the read concern if it is absent. Every other read
    /// concern field is preserved.
    pub(crate) fn set_after_cluster_time(&mut self, operation_time: Timestamp) {
        let inner = self.read_concern.get_or_insert_with(Default::default);
        inner.after_cluster_time = Some(operation_time);
    }

    fn base_document(&self) -> Result<Document> {
        let mut document = self.body.clone();
        if let Some(ref read_concern) = self.read_concern {
            if !read_concern.is_empty() {
                document.insert("readConcern", bson::to_bson(read_concern)?);
            }
        }
        if let Some(ref write_concern) = self.write_concern {
            if !write_concern.is_empty() {
                document.insert("writeConcern", bson::to_bson(write_concern)?);
            }
        }
        if let Some((ref key, ref value)) = self.trailing_field {
            document.insert(key.clone(), value.clone());
        }
        Ok(document)
    }

    fn append_session_fields(&self, document: &mut Document) -> Result<()> {
        if let Some(ref lsid) = self.lsid {
            document.insert("lsid", lsid.clone());
        }
        if let Some(txn_number) = self.txn_number {
            document.insert("txnNumber", txn_number);
        }
        if let Some(start_transaction) = self.start_transaction {
            document.insert("startTransaction", start_transaction);
        }
        if let Some(autocommit) = self.autocommit {
            document.insert("autocommit", autocommit);
        }
        if let Some(ref cluster_time) = self.cluster_time {
            document.insert("$clusterTime", bson::to_bson(cluster_time)?);
        }
        Ok(())
    }

    /// The full command document: the body, then concerns, the trailing field, comment,
    /// additional options and the session fields.
    pub fn document(&self) -> Result<Document> {
        let mut document = self.base_document()?;
        if let Some(ref comment) = self.comment {
            document.insert("comment", comment.clone());
        }
        if let Some(ref options) = self.additional_options {
            bson_util::merge_without_overwrite(&mut document, options);
        }
        self.append_session_fields(&mut document)?;
        Ok(document)
    }

    /// The command as it should be written to a server described by `description`.
    ///
    /// Servers without OP_MSG receive the command as an OP_QUERY against `db.$cmd`, wrapped when
    /// the read preference, comment or additional options require it.
    pub fn wire_document(&self, description: &StreamDescription) -> Result<WireCommand> {
        if let Some(ref query) = self.legacy_query {
            return Ok(query.clone().into());
        }

        if description.uses_legacy_commands() {
            let mut inner = self.base_document()?;
            self.append_session_fields(&mut inner)?;
            let (document, flags) = LegacyQueryWrapper::new(
                description.initial_server_type,
                self.read_preference.as_ref(),
            )
            .comment(self.comment.clone())
            .additional_options(self.additional_options.as_ref())
            .wrap(inner)?;
            return Ok(WireCommand {
                document,
                flags,
                query: Some(QueryHeader::for_command(&self.target_db)),
            });
        }

        let mut document = self.document()?;
        if let Some(ref read_preference) = self.read_preference {
            if !read_preference.is_primary()
                && description.initial_server_type != ServerType::Standalone
            {
                document.insert("$readPreference", bson::to_bson(read_preference)?);
            }
        }
        Ok(WireCommand {
            document,
            flags: Default::default(),
            query: None,
        })
    }
}

/// A reply to a command, as returned by a [`Channel`](crate::cmap::Channel).
#[derive(Debug, Clone)]
pub struct RawCommandResponse {
    pub(crate) source: ServerAddress,
    raw: RawDocumentBuf,
}

impl RawCommandResponse {
    /// Creates a response from the raw reply document sent by the server at `source`.
    pub fn new(source: ServerAddress, raw: RawDocumentBuf) -> Self {
        Self { source, raw }
    }

    /// Creates a response from a parsed reply document.
    pub fn from_document(source: ServerAddress, document: &Document) -> Result<Self> {
        let raw = RawDocumentBuf::from_document(document)?;
        Ok(Self::new(source, raw))
    }

    #[cfg(test)]
    pub(crate) fn with_document(document: bson::Document) -> Result<Self> {
        Self::from_document(ServerAddress::default(), &document)
    }

    pub(crate) fn body<T: DeserializeOwned>(&self) -> Result<T> {
        bson::from_slice(self.raw.as_bytes()).map_err(|e| {
            Error::from(ErrorKind::InvalidResponse {
                message: format!("{e}"),
            })
        })
    }

    pub(crate) fn raw_body(&self) -> &RawDocument {
        &self.raw
    }

    /// The address of the server that sent this response.
    pub(crate) fn source_address(&self) -> &ServerAddress {
        &self.source
    }
}
