use serde::Deserialize;

use crate::{
    bson::Document,
    bson_util,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::LegacyFindOptions, Namespace},
    error::{CommandError, Error, ErrorKind, Result},
    operation::{CursorInfo, CursorSpecification, OperationWithDefaults},
    selection_criteria::SelectionCriteria,
    serde_util,
    wire::{LegacyQuery, LegacyQueryWrapper, QueryFlags, QueryHeader},
};

/// A find written as an OP_QUERY against the collection itself, for servers that predate the
/// `find` command.
#[derive(Debug)]
pub struct LegacyFind {
    ns: Namespace,
    filter: Document,
    options: Option<Box<LegacyFindOptions>>,
}

impl LegacyFind {
    pub fn new(
        ns: Namespace,
        filter: Option<Document>,
        options: Option<LegacyFindOptions>,
    ) -> Self {
        Self {
            ns,
            filter: filter.unwrap_or_default(),
            options: options.map(Box::new),
        }
    }

    /// The `numberToReturn` of the query: the smaller of limit and batch size when both are set,
    /// negated when the cursor must close after the first batch.
    fn number_to_return(&self) -> Result<i32> {
        let options = self.options.as_deref();
        let limit = options.and_then(|o| o.limit).unwrap_or(0);
        let batch_size = i64::from(options.and_then(|o| o.batch_size).unwrap_or(0));
        let first_batch = match (limit, batch_size) {
            (limit, _) if limit < 0 => limit,
            (0, batch_size) => batch_size,
            (limit, 0) => limit,
            (limit, batch_size) => limit.min(batch_size),
        };
        i32::try_from(first_batch).map_err(|_| {
            Error::invalid_argument(format!("first batch size of {first_batch} is out of range"))
        })
    }

    fn flags(&self) -> QueryFlags {
        let mut flags = QueryFlags::empty();
        let Some(options) = self.options.as_deref() else {
            return flags;
        };
        if let Some(cursor_type) = options.cursor_type {
            flags.set(QueryFlags::TAILABLE_CURSOR, cursor_type.is_tailable());
            flags.set(QueryFlags::AWAIT_DATA, cursor_type.is_await());
        }
        flags.set(
            QueryFlags::NO_CURSOR_TIMEOUT,
            options.no_cursor_timeout == Some(true),
        );
        flags.set(QueryFlags::OPLOG_REPLAY, options.oplog_replay == Some(true));
        flags.set(QueryFlags::PARTIAL, options.allow_partial_results == Some(true));
        flags
    }
}

impl OperationWithDefaults for LegacyFind {
    type O = CursorSpecification;

    const NAME: &'static str = "find";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_deref();

        let number_to_skip = i32::try_from(options.and_then(|o| o.skip).unwrap_or(0))
            .map_err(|_| Error::invalid_argument("skip must fit in a 32-bit integer"))?;
        let max_time_ms = options
            .and_then(|o| o.max_time)
            .map(serde_util::duration_to_max_time_ms)
            .transpose()?;

        let read_preference = self
            .selection_criteria()
            .and_then(SelectionCriteria::as_read_pref);
        let (document, flags) =
            LegacyQueryWrapper::new(description.initial_server_type, read_preference)
                .element("$orderby", options.and_then(|o| o.sort.clone()))
                .comment(options.and_then(|o| o.comment.clone()))
                .element("$maxTimeMS", max_time_ms)
                .additional_options(options.and_then(|o| o.modifiers.as_ref()))
                .wrap(self.filter.clone())?;

        let query = LegacyQuery {
            header: QueryHeader {
                full_collection_name: self.ns.to_string(),
                number_to_skip,
                number_to_return: self.number_to_return()?,
                return_fields_selector: options.and_then(|o| o.projection.clone()),
            },
            document,
            flags: flags | self.flags(),
        };
        Ok(Command::new_legacy_query(Self::NAME, &self.ns.db, query))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let reply: LegacyReply = response.body()?;
        if let Some(failure) = reply.documents.first().filter(|d| d.contains_key("$err")) {
            return Err(query_failure(failure));
        }
        let info = CursorInfo {
            id: reply.cursor_id,
            ns: self.ns.clone(),
            first_batch: reply.documents.into(),
            post_batch_resume_token: None,
        };
        Ok(CursorSpecification::new(
            info,
            response.source_address().clone(),
        ))
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.options
            .as_ref()
            .and_then(|o| o.selection_criteria.as_ref())
    }

    fn supports_sessions(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyReply {
    cursor_id: i64,
    #[serde(default)]
    documents: Vec<Document>,
}

/// The error reported in the single document of a failed query's reply.
fn query_failure(document: &Document) -> Error {
    let code = document
        .get("code")
        .and_then(bson_util::get_int)
        .and_then(|code| i32::try_from(code).ok())
        .unwrap_or(0);
    let message = document.get_str("$err").unwrap_or_default().to_string();
    ErrorKind::Command(CommandError {
        code,
        code_name: String::new(),
        message,
        topology_version: None,
    })
    .into()
}

#[cfg(test)]
mod test;
