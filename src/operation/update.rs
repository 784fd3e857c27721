use serde::Deserialize;

use crate::{
    bson::{Bson, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{
        options::{ReplaceOptions, UpdateModifications, UpdateOptions},
        Namespace,
    },
    concern::WriteConcern,
    error::{convert_bulk_write_error, Error, Result},
    feature::Feature,
    operation::{crud_write_concern, OperationWithDefaults, Retryability, WriteResponseBody},
    results::UpdateResult,
};

/// The `u` of an update statement.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOrReplace {
    UpdateModifications(UpdateModifications),
    Replacement(Document),
}

impl UpdateOrReplace {
    fn validate(&self) -> Result<()> {
        match self {
            UpdateOrReplace::UpdateModifications(update) => update.validate(),
            UpdateOrReplace::Replacement(replacement) => {
                bson_util::replacement_document_check(replacement)
            }
        }
    }

    fn to_bson(&self) -> Bson {
        match self {
            UpdateOrReplace::UpdateModifications(update) => update.to_bson(),
            UpdateOrReplace::Replacement(replacement) => Bson::Document(replacement.clone()),
        }
    }
}

impl From<UpdateModifications> for UpdateOrReplace {
    fn from(update: UpdateModifications) -> Self {
        UpdateOrReplace::UpdateModifications(update)
    }
}

/// A single-statement `update` command.
#[derive(Debug)]
pub struct Update {
    ns: Namespace,
    filter: Document,
    update: UpdateOrReplace,
    multi: bool,
    options: Option<UpdateOptions>,
}

impl Update {
    pub fn new(
        ns: Namespace,
        filter: Document,
        update: impl Into<UpdateModifications>,
        multi: bool,
        options: Option<UpdateOptions>,
    ) -> Self {
        Self {
            ns,
            filter,
            update: UpdateOrReplace::UpdateModifications(update.into()),
            multi,
            options,
        }
    }

    pub fn with_replace(
        ns: Namespace,
        filter: Document,
        replacement: Document,
        options: Option<ReplaceOptions>,
    ) -> Self {
        Self {
            ns,
            filter,
            update: UpdateOrReplace::Replacement(replacement),
            multi: false,
            options: options.map(Into::into),
        }
    }

    fn statement(&self, description: &StreamDescription) -> Result<Document> {
        let options = self.options.as_ref();
        Ok(CommandBuilder::new("q", self.filter.clone(), description)
            .append("u", self.update.to_bson())
            .append_if("multi", true, self.multi)
            .optional("upsert", options.and_then(|o| o.upsert))
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .gated(
                "arrayFilters",
                &Feature::ARRAY_FILTERS,
                options
                    .and_then(|o| o.array_filters.as_deref())
                    .map(bson_util::to_bson_array),
            )?
            .gated(
                "hint",
                &Feature::HINT_FOR_UPDATE_AND_REPLACE_OPERATIONS,
                options.and_then(|o| o.hint.as_ref()),
            )?
            .build())
    }
}

impl OperationWithDefaults for Update {
    type O = UpdateResult;

    const NAME: &'static str = "update";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        self.update.validate()?;
        if self.multi && matches!(self.update, UpdateOrReplace::Replacement(_)) {
            return Err(Error::invalid_argument(
                "a replacement cannot update multiple documents",
            ));
        }
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("ordered", true)
            .gated(
                "bypassDocumentValidation",
                &Feature::BYPASS_DOCUMENT_VALIDATION,
                options.and_then(|o| o.bypass_document_validation),
            )?
            .optional("let", options.and_then(|o| o.let_vars.clone()))
            .optional("comment", options.and_then(|o| o.comment.clone()))
            .build();
        let statement = self.statement(description)?;

        let mut command = Command::new(Self::NAME, &self.ns.db, body);
        command.set_write_concern(crud_write_concern(self.write_concern())?);
        command.set_trailing_field("updates", vec![Bson::Document(statement)]);
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: WriteResponseBody<UpdateBody> = response.body()?;
        response.validate().map_err(convert_bulk_write_error)?;

        let modified_count = response.n_modified;
        let upserted_id = response
            .upserted
            .as_ref()
            .and_then(|v| v.first())
            .and_then(|doc| doc.get("_id"))
            .cloned();

        let matched_count = if upserted_id.is_some() {
            0
        } else {
            response.n
        };

        Ok(UpdateResult {
            matched_count,
            modified_count,
            upserted_id,
        })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        if self.multi {
            Retryability::None
        } else {
            Retryability::Write
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(deserialize_with = "crate::serde_util::deserialize_u64_from_bson_number")]
    n: u64,

    #[serde(
        default,
        deserialize_with = "crate::serde_util::deserialize_u64_from_bson_number"
    )]
    n_modified: u64,

    upserted: Option<Vec<Document>>,
}
