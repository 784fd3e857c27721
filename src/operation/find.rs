use crate::{
    bson::Document,
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::FindOptions, Namespace},
    error::{Error, Result},
    feature::Feature,
    operation::{
        read_concern_for,
        CursorBody,
        CursorSpecification,
        OperationWithDefaults,
        Retryability,
    },
    selection_criteria::SelectionCriteria,
};

#[derive(Debug)]
pub struct Find {
    ns: Namespace,
    filter: Option<Document>,
    options: Option<Box<FindOptions>>,
}

impl Find {
    pub fn new(ns: Namespace, filter: Option<Document>, options: Option<FindOptions>) -> Self {
        Self {
            ns,
            filter,
            options: options.map(Box::new),
        }
    }
}

impl OperationWithDefaults for Find {
    type O = CursorSpecification;

    const NAME: &'static str = "find";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_deref();

        // A negative limit asks for a single batch of at most |limit| documents.
        let limit = options.and_then(|o| o.limit);
        let single_batch = limit.is_some_and(|limit| limit < 0);
        let limit = limit
            .map(|limit| {
                limit
                    .checked_abs()
                    .ok_or_else(|| Error::invalid_argument(format!("limit {limit} out of range")))
            })
            .transpose()?;

        let mut batch_size = options.and_then(|o| o.batch_size);
        if let Some(size) = batch_size {
            if i32::try_from(size).is_err() {
                return Err(Error::invalid_argument(
                    "the batch size must fit into a signed 32-bit integer",
                ));
            }
            // Asking for exactly `limit` documents would leave an open cursor on the server.
            if limit.and_then(|l| u32::try_from(l).ok()) == Some(size) {
                batch_size = Some(size + 1);
            }
        }

        let cursor_type = options.and_then(|o| o.cursor_type);
        let flag = |f: fn(&FindOptions) -> Option<bool>| options.and_then(f);

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .optional("filter", self.filter.clone())
            .optional("sort", options.and_then(|o| o.sort.clone()))
            .optional("projection", options.and_then(|o| o.projection.clone()))
            .optional("hint", options.and_then(|o| o.hint.as_ref()))
            .optional("skip", options.and_then(|o| o.skip).map(bson_util::to_i64))
            .optional("limit", limit.filter(|l| *l != 0))
            .optional("batchSize", batch_size.map(i64::from))
            .append_if("singleBatch", true, single_batch)
            .optional("comment", options.and_then(|o| o.comment.clone()))
            .max_time(options.and_then(|o| o.max_time))?
            .optional("min", options.and_then(|o| o.min.clone()))
            .optional("max", options.and_then(|o| o.max.clone()))
            .optional("returnKey", flag(|o| o.return_key))
            .optional("showRecordId", flag(|o| o.show_record_id))
            .append_if(
                "tailable",
                true,
                cursor_type.is_some_and(|c| c.is_tailable()),
            )
            .optional("oplogReplay", flag(|o| o.oplog_replay))
            .optional("noCursorTimeout", flag(|o| o.no_cursor_timeout))
            .append_if("awaitData", true, cursor_type.is_some_and(|c| c.is_await()))
            .optional("allowPartialResults", flag(|o| o.allow_partial_results))
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .gated(
                "allowDiskUse",
                &Feature::FIND_ALLOW_DISK_USE,
                flag(|o| o.allow_disk_use),
            )?
            .optional("let", options.and_then(|o| o.let_vars.clone()))
            .build();

        Ok(Command::new_read(
            Self::NAME,
            &self.ns.db,
            read_concern_for(description, options.and_then(|o| o.read_concern.as_ref()))?,
            body,
        ))
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

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.options
            .as_ref()
            .and_then(|o| o.selection_criteria.as_ref())
    }

    fn supports_read_concern(&self, _description: &StreamDescription) -> bool {
        true
    }

    fn retryability(&self) -> Retryability {
        Retryability::Read
    }
}

#[cfg(test)]
mod test;
