use serde::Deserialize;

use crate::{
    bson::{doc, Bson, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{
        options::{MapReduceOptions, MapReduceOutput},
        Namespace,
    },
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{
        read_concern_for,
        write_concern_for,
        OperationWithDefaults,
        Retryability,
        WriteConcernOnlyBody,
    },
    selection_criteria::SelectionCriteria,
};

/// The fields of a `mapReduce` command following `out`, which both flavours share.
fn map_reduce_body<'a>(
    ns: &Namespace,
    map: &str,
    reduce: &str,
    out: Document,
    options: Option<&MapReduceOptions>,
    description: &'a StreamDescription,
) -> Result<CommandBuilder<'a>> {
    ns.validate()?;
    if map.is_empty() || reduce.is_empty() {
        return Err(Error::invalid_argument(
            "map and reduce functions must not be empty",
        ));
    }
    CommandBuilder::new("mapreduce", ns.coll.clone(), description)
        .append("map", Bson::JavaScriptCode(map.to_string()))
        .append("reduce", Bson::JavaScriptCode(reduce.to_string()))
        .append("out", out)
        .optional("query", options.and_then(|o| o.query.clone()))
        .optional(
            "finalize",
            options
                .and_then(|o| o.finalize.clone())
                .map(Bson::JavaScriptCode),
        )
        .optional("jsMode", options.and_then(|o| o.js_mode))
        .optional("limit", options.and_then(|o| o.limit).map(bson_util::to_i64))
        .max_time(options.and_then(|o| o.max_time))?
        .optional("scope", options.and_then(|o| o.scope.clone()))
        .optional("sort", options.and_then(|o| o.sort.clone()))
        .optional("verbose", options.and_then(|o| o.verbose))
        .gated_serialized(
            "collation",
            &Feature::COLLATION,
            options.and_then(|o| o.collation.as_ref()),
        )
}

/// A map-reduce whose results are returned in the reply.
#[derive(Debug)]
pub struct MapReduce {
    ns: Namespace,
    map: String,
    reduce: String,
    options: Option<MapReduceOptions>,
}

impl MapReduce {
    pub fn new(
        ns: Namespace,
        map: impl Into<String>,
        reduce: impl Into<String>,
        options: Option<MapReduceOptions>,
    ) -> Self {
        Self {
            ns,
            map: map.into(),
            reduce: reduce.into(),
            options,
        }
    }
}

impl OperationWithDefaults for MapReduce {
    type O = Vec<Document>;

    const NAME: &'static str = "mapreduce";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        let options = self.options.as_ref();
        let body = map_reduce_body(
            &self.ns,
            &self.map,
            &self.reduce,
            doc! { "inline": 1 },
            options,
            description,
        )?
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
        let response: InlineResponse = response.body()?;
        Ok(response.results)
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
struct InlineResponse {
    results: Vec<Document>,
}

/// A map-reduce that writes its results to a collection.
#[derive(Debug)]
pub struct MapReduceOutputToCollection {
    ns: Namespace,
    map: String,
    reduce: String,
    output: MapReduceOutput,
    options: Option<MapReduceOptions>,
}

impl MapReduceOutputToCollection {
    pub fn new(
        ns: Namespace,
        map: impl Into<String>,
        reduce: impl Into<String>,
        output: MapReduceOutput,
        options: Option<MapReduceOptions>,
    ) -> Self {
        Self {
            ns,
            map: map.into(),
            reduce: reduce.into(),
            output,
            options,
        }
    }
}

impl OperationWithDefaults for MapReduceOutputToCollection {
    type O = ();

    const NAME: &'static str = "mapreduce";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        if self.output.collection.is_empty() {
            return Err(Error::invalid_argument(
                "output collection name must not be empty",
            ));
        }
        let options = self.options.as_ref();
        let body = map_reduce_body(
            &self.ns,
            &self.map,
            &self.reduce,
            self.output.to_document(),
            options,
            description,
        )?
        .gated(
            "bypassDocumentValidation",
            &Feature::BYPASS_DOCUMENT_VALIDATION,
            options.and_then(|o| o.bypass_document_validation),
        )?
        .build();

        let mut command = Command::new(Self::NAME, &self.ns.db, body);
        command.set_write_concern(write_concern_for(
            &Feature::COMMANDS_THAT_WRITE_ACCEPT_WRITE_CONCERN,
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
        let response: WriteConcernOnlyBody = response.body()?;
        response.validate()
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }
}

#[cfg(test)]
mod test;
