use serde::Deserialize;

use crate::{
    bson::Document,
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::CountOptions, Namespace},
    error::{Error, Result},
    feature::Feature,
    operation::{read_concern_for, OperationWithDefaults, Retryability},
    selection_criteria::SelectionCriteria,
};

/// The legacy `count` command, which counts using collection metadata when no filter is given.
#[derive(Debug)]
pub struct Count {
    ns: Namespace,
    filter: Option<Document>,
    options: Option<CountOptions>,
}

impl Count {
    pub fn new(ns: Namespace, filter: Option<Document>, options: Option<CountOptions>) -> Self {
        Count {
            ns,
            filter,
            options,
        }
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self::new(Namespace::empty(), None, None)
    }
}

impl OperationWithDefaults for Count {
    type O = u64;

    const NAME: &'static str = "count";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .optional("query", self.filter.clone())
            .optional("limit", options.and_then(|o| o.limit).map(bson_util::to_i64))
            .optional("skip", options.and_then(|o| o.skip).map(bson_util::to_i64))
            .optional("hint", options.and_then(|o| o.hint.as_ref()))
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .max_time(options.and_then(|o| o.max_time))?
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
        let response_body: ResponseBody = response.body()?;
        Ok(response_body.n)
    }

    fn handle_error(&self, error: Error) -> Result<Self::O> {
        if error.is_ns_not_found() {
            Ok(0)
        } else {
            Err(error)
        }
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

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(deserialize_with = "crate::serde_util::deserialize_u64_from_bson_number")]
    n: u64,
}

#[cfg(test)]
mod test;
