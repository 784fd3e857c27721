use crate::{
    bson::{Bson, Document},
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::DeleteOptions, Namespace},
    concern::WriteConcern,
    error::{convert_bulk_write_error, Result},
    feature::Feature,
    operation::{crud_write_concern, OperationWithDefaults, Retryability, WriteResponseBody},
    results::DeleteResult,
};

#[derive(Debug)]
pub struct Delete {
    ns: Namespace,
    filter: Document,
    limit: u32,
    options: Option<DeleteOptions>,
}

impl Delete {
    /// A `limit` of `None` deletes every matching document.
    pub fn new(
        ns: Namespace,
        filter: Document,
        limit: Option<u32>,
        options: Option<DeleteOptions>,
    ) -> Self {
        Self {
            ns,
            filter,
            limit: limit.unwrap_or(0), // 0 = no limit
            options,
        }
    }
}

impl OperationWithDefaults for Delete {
    type O = DeleteResult;

    const NAME: &'static str = "delete";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("ordered", true)
            .optional("let", options.and_then(|o| o.let_vars.clone()))
            .optional("comment", options.and_then(|o| o.comment.clone()))
            .build();

        let statement = CommandBuilder::new("q", self.filter.clone(), description)
            .append("limit", i64::from(self.limit))
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .gated(
                "hint",
                &Feature::HINT_FOR_DELETE_OPERATIONS,
                options.and_then(|o| o.hint.as_ref()),
            )?
            .build();

        let mut command = Command::new(Self::NAME, &self.ns.db, body);
        command.set_write_concern(crud_write_concern(self.write_concern())?);
        command.set_trailing_field("deletes", vec![Bson::Document(statement)]);
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: WriteResponseBody = response.body()?;
        response.validate().map_err(convert_bulk_write_error)?;

        Ok(DeleteResult {
            deleted_count: response.n,
        })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        if self.limit == 1 {
            Retryability::Write
        } else {
            Retryability::None
        }
    }
}
