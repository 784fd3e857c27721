use serde::Deserialize;

use crate::{
    bson::{doc, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::CountOptions, Namespace},
    error::{Error, Result},
    feature::Feature,
    operation::{cursor_document, read_concern_for, OperationWithDefaults, Retryability},
    selection_criteria::SelectionCriteria,
};

/// Counts the documents matching a filter with an aggregation, which unlike `count` is accurate
/// on sharded clusters and inside transactions.
#[derive(Debug)]
pub struct CountDocuments {
    ns: Namespace,
    filter: Document,
    options: Option<CountOptions>,
}

impl CountDocuments {
    pub fn new(ns: Namespace, filter: Option<Document>, options: Option<CountOptions>) -> Self {
        Self {
            ns,
            filter: filter.unwrap_or_default(),
            options,
        }
    }

    fn pipeline(&self) -> Vec<Document> {
        let options = self.options.as_ref();
        let mut pipeline = vec![doc! { "$match": self.filter.clone() }];
        if let Some(skip) = options.and_then(|o| o.skip) {
            pipeline.push(doc! { "$skip": bson_util::to_i64(skip) });
        }
        if let Some(limit) = options.and_then(|o| o.limit) {
            pipeline.push(doc! { "$limit": bson_util::to_i64(limit) });
        }
        pipeline.push(doc! { "$group": { "_id": 1, "n": { "$sum": 1 } } });
        pipeline
    }
}

impl OperationWithDefaults for CountDocuments {
    type O = u64;

    const NAME: &'static str = "aggregate";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("pipeline", bson_util::to_bson_array(&self.pipeline()))
            .gated(
                "hint",
                &Feature::AGGREGATE_HINT,
                options.and_then(|o| o.hint.as_ref()),
            )?
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
            )?
            .max_time(options.and_then(|o| o.max_time))?
            .gated(
                "comment",
                &Feature::AGGREGATE_COMMENT,
                options.and_then(|o| o.comment.clone()),
            )?
            .build();

        let mut command = Command::new_read(
            Self::NAME,
            &self.ns.db,
            read_concern_for(description, options.and_then(|o| o.read_concern.as_ref()))?,
            body,
        );
        command.set_trailing_field("cursor", cursor_document(None));
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: Response = response.body()?;
        let n = match response.cursor.first_batch.first() {
            Some(result) => result
                .get("n")
                .and_then(bson_util::get_u64)
                .ok_or_else(|| Error::invalid_response("missing or invalid count in result"))?,
            None => 0,
        };
        Ok(n)
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
struct Response {
    cursor: ResponseCursor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCursor {
    first_batch: Vec<Document>,
}
