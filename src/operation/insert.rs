use std::collections::HashMap;

use crate::{
    bson::{oid::ObjectId, Bson, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::InsertManyOptions, Namespace},
    concern::WriteConcern,
    error::{Error, ErrorKind, Result},
    feature::Feature,
    operation::{crud_write_concern, OperationWithDefaults, Retryability, WriteResponseBody},
    results::InsertManyResult,
};

/// Inserts one or more documents. Documents without an `_id` are given a fresh `ObjectId` before
/// they are sent.
#[derive(Debug)]
pub struct Insert {
    ns: Namespace,
    documents: Vec<Document>,
    inserted_ids: Vec<Bson>,
    options: Option<InsertManyOptions>,
}

impl Insert {
    pub fn new(
        ns: Namespace,
        documents: impl IntoIterator<Item = Document>,
        options: Option<InsertManyOptions>,
    ) -> Self {
        Self {
            ns,
            documents: documents.into_iter().collect(),
            inserted_ids: Vec::new(),
            options,
        }
    }

    fn is_ordered(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.ordered)
            .unwrap_or(true)
    }
}

/// Returns the document with an `_id` as its first field, and that `_id`.
fn with_id(document: &Document) -> (Document, Bson) {
    if let Some(id) = document.get("_id") {
        return (document.clone(), id.clone());
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    with_id.extend(document.clone());
    (with_id, id)
}

impl OperationWithDefaults for Insert {
    type O = InsertManyResult;

    const NAME: &'static str = "insert";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        if self.documents.is_empty() {
            return Err(Error::invalid_argument("no documents provided to insert"));
        }

        // Ids are assigned once so that a retry resends the same documents.
        if self.inserted_ids.is_empty() {
            let (documents, ids): (Vec<Document>, Vec<Bson>) =
                self.documents.iter().map(with_id).unzip();
            self.documents = documents;
            self.inserted_ids = ids;
        }

        let options = self.options.as_ref();
        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("ordered", self.is_ordered())
            .gated(
                "bypassDocumentValidation",
                &Feature::BYPASS_DOCUMENT_VALIDATION,
                options.and_then(|o| o.bypass_document_validation),
            )?
            .optional("comment", options.and_then(|o| o.comment.clone()))
            .build();

        let mut command = Command::new(Self::NAME, &self.ns.db, body);
        command.set_write_concern(crud_write_concern(self.write_concern())?);
        command.set_trailing_field("documents", bson_util::to_bson_array(&self.documents));
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: WriteResponseBody = response.body()?;

        let mut inserted_ids = HashMap::new();
        let failed: Vec<usize> = response
            .write_errors()
            .map(|errors| errors.iter().map(|e| e.index).collect())
            .unwrap_or_default();
        for (index, id) in self.inserted_ids.iter().enumerate() {
            // An ordered insert stops at its first failure.
            if failed.contains(&index) || (self.is_ordered() && failed.iter().any(|f| *f < index))
            {
                continue;
            }
            inserted_ids.insert(index, id.clone());
        }

        if let Err(error) = response.validate() {
            let labels: Vec<String> = error.labels().iter().cloned().collect();
            return Err(match *error.kind {
                ErrorKind::BulkWrite(mut failure) => {
                    failure.inserted_ids = inserted_ids;
                    Error::new(ErrorKind::BulkWrite(failure), Some(labels))
                }
                _ => error,
            });
        }

        let mut result = InsertManyResult::default();
        result.inserted_ids = inserted_ids;
        Ok(result)
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        Retryability::Write
    }
}
