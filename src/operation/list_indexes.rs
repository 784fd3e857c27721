use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::ListIndexesOptions, Namespace},
    error::{Error, Result},
    operation::{
        cursor_document,
        CursorBody,
        CursorSpecification,
        OperationWithDefaults,
        Retryability,
    },
    sdam::ServerAddress,
};

#[derive(Debug)]
pub struct ListIndexes {
    ns: Namespace,
    options: Option<ListIndexesOptions>,
    address: ServerAddress,
}

impl ListIndexes {
    pub fn new(ns: Namespace, options: Option<ListIndexesOptions>) -> Self {
        ListIndexes {
            ns,
            options,
            address: ServerAddress::default(),
        }
    }
}

impl OperationWithDefaults for ListIndexes {
    type O = CursorSpecification;

    const NAME: &'static str = "listIndexes";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        // A missing collection is answered with an empty cursor on this server.
        self.address = description.server_address.clone();
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("cursor", cursor_document(options.and_then(|o| o.batch_size)))
            .max_time(options.and_then(|o| o.max_time))?
            .build();

        Ok(Command::new(Self::NAME, &self.ns.db, body))
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

    fn handle_error(&self, error: Error) -> Result<Self::O> {
        if error.is_ns_not_found() {
            Ok(CursorSpecification::empty(
                self.ns.clone(),
                self.address.clone(),
            ))
        } else {
            Err(error)
        }
    }

    fn retryability(&self) -> Retryability {
        Retryability::Read
    }
}
