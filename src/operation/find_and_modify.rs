mod options;

use serde::Deserialize;

use self::options::FindAndModifyOptions;
use crate::{
    bson::{Bson, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{
        options::{
            FindOneAndDeleteOptions,
            FindOneAndReplaceOptions,
            FindOneAndUpdateOptions,
            UpdateModifications,
        },
        Namespace,
    },
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, Retryability, WriteConcernOnlyBody},
};

/// What a `findAndModify` does to the document it finds.
#[derive(Clone, Debug, PartialEq)]
pub enum Modification {
    Delete,
    Replace(Document),
    Update(UpdateModifications),
}

impl Modification {
    fn validate(&self) -> Result<()> {
        match self {
            Modification::Delete => Ok(()),
            Modification::Replace(replacement) => {
                bson_util::replacement_document_check(replacement)
            }
            Modification::Update(update) => update.validate(),
        }
    }
}

/// Finds a single document and deletes, replaces or updates it atomically, returning either the
/// original or the modified document.
#[derive(Debug)]
pub struct FindAndModify {
    ns: Namespace,
    query: Document,
    modification: Modification,
    options: Option<FindAndModifyOptions>,
}

impl FindAndModify {
    pub fn with_delete(
        ns: Namespace,
        query: Document,
        options: Option<FindOneAndDeleteOptions>,
    ) -> Self {
        Self {
            ns,
            query,
            modification: Modification::Delete,
            options: options.map(Into::into),
        }
    }

    pub fn with_replace(
        ns: Namespace,
        query: Document,
        replacement: Document,
        options: Option<FindOneAndReplaceOptions>,
    ) -> Self {
        Self {
            ns,
            query,
            modification: Modification::Replace(replacement),
            options: options.map(Into::into),
        }
    }

    pub fn with_update(
        ns: Namespace,
        query: Document,
        update: impl Into<UpdateModifications>,
        options: Option<FindOneAndUpdateOptions>,
    ) -> Self {
        Self {
            ns,
            query,
            modification: Modification::Update(update.into()),
            options: options.map(Into::into),
        }
    }
}

impl OperationWithDefaults for FindAndModify {
    type O = Option<Document>;

    const NAME: &'static str = "findAndModify";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        self.modification.validate()?;
        let options = self.options.as_ref();

        let builder = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("query", self.query.clone());
        let builder = match self.modification {
            Modification::Delete => builder.append("remove", true),
            Modification::Replace(ref replacement) => builder.append("update", replacement.clone()),
            Modification::Update(ref update) => builder.append("update", update.to_bson()),
        };

        let body = builder
            .gated(
                "bypassDocumentValidation",
                &Feature::BYPASS_DOCUMENT_VALIDATION,
                options.and_then(|o| o.bypass_document_validation),
            )?
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .optional("upsert", options.and_then(|o| o.upsert))
            .max_time(options.and_then(|o| o.max_time))?
            .optional("fields", options.and_then(|o| o.projection.clone()))
            .optional("new", options.and_then(|o| o.new))
            .optional("sort", options.and_then(|o| o.sort.clone()))
            .gated(
                "arrayFilters",
                &Feature::ARRAY_FILTERS,
                options
                    .and_then(|o| o.array_filters.as_deref())
                    .map(bson_util::to_bson_array),
            )?
            .gated(
                "hint",
                &Feature::HINT_FOR_FIND_AND_MODIFY,
                options.and_then(|o| o.hint.as_ref()),
            )?
            .optional("let", options.and_then(|o| o.let_vars.clone()))
            .optional("comment", options.and_then(|o| o.comment.clone()))
            .build();

        let mut command = Command::new(Self::NAME, &self.ns.db, body);
        command.set_write_concern(write_concern_for(
            &Feature::FIND_AND_MODIFY_WRITE_CONCERN,
            description,
            self.write_concern(),
        )?);
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let body: Response = response.body()?;
        body.write_concern.validate()?;
        match body.value {
            Bson::Document(document) => Ok(Some(document)),
            Bson::Null => Ok(None),
            other => Err(Error::invalid_response(format!(
                "expected document for value field of findAndModify response, but instead got \
                 {other:?}"
            ))),
        }
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        Retryability::Write
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    value: Bson,

    #[serde(flatten)]
    write_concern: WriteConcernOnlyBody,
}
