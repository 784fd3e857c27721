use crate::{
    bson::Document,
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::options::ListCollectionsOptions,
    error::{Error, Result},
    operation::{
        cursor_document,
        CursorBody,
        CursorSpecification,
        OperationWithDefaults,
        Retryability,
    },
};

#[derive(Debug)]
pub struct ListCollections {
    db: String,
    filter: Option<Document>,
    name_only: bool,
    options: Option<ListCollectionsOptions>,
}

impl ListCollections {
    pub fn new(
        db: impl Into<String>,
        filter: Option<Document>,
        name_only: bool,
        options: Option<ListCollectionsOptions>,
    ) -> Self {
        Self {
            db: db.into(),
            filter,
            name_only,
            options,
        }
    }
}

impl OperationWithDefaults for ListCollections {
    type O = CursorSpecification;

    const NAME: &'static str = "listCollections";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        if self.db.is_empty() {
            return Err(Error::invalid_argument("database name must not be empty"));
        }
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, 1, description)
            .optional("filter", self.filter.clone())
            .append_if("nameOnly", true, self.name_only)
            .optional(
                "authorizedCollections",
                options.and_then(|o| o.authorized_collections),
            )
            .append("cursor", cursor_document(options.and_then(|o| o.batch_size)))
            .build();

        Ok(Command::new(Self::NAME, &self.db, body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let body = CursorBody::extract(response)?;
        Ok(CursorSpecification::new(
            body.cursor,
            response.source_address().clone(),
        ))
    }

    fn retryability(&self) -> Retryability {
        Retryability::Read
    }
}
