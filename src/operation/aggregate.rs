use crate::{
    bson::{Bson, Document},
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::AggregateOptions, Namespace},
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{
        cursor_document,
        read_concern_for,
        write_concern_for,
        CursorBody,
        CursorSpecification,
        OperationWithDefaults,
        Retryability,
        WriteConcernOnlyBody,
    },
    selection_criteria::SelectionCriteria,
};

/// What an aggregation runs against: a collection, or a whole database for pipelines that start
/// with a database-level stage such as `$currentOp`.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateTarget {
    Database(String),
    Collection(Namespace),
}

impl AggregateTarget {
    fn db_name(&self) -> &str {
        match self {
            AggregateTarget::Database(db) => db,
            AggregateTarget::Collection(ns) => &ns.db,
        }
    }

    fn to_bson(&self) -> Bson {
        match self {
            AggregateTarget::Database(_) => Bson::Int32(1),
            AggregateTarget::Collection(ns) => Bson::String(ns.coll.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AggregateTarget::Database(db) if db.is_empty() => {
                Err(Error::invalid_argument("database name must not be empty"))
            }
            AggregateTarget::Database(_) => Ok(()),
            AggregateTarget::Collection(ns) => ns.validate(),
        }
    }
}

impl From<Namespace> for AggregateTarget {
    fn from(ns: Namespace) -> Self {
        AggregateTarget::Collection(ns)
    }
}

/// The fields shared by both kinds of aggregation, up to and including `comment`.
fn aggregate_body<'a>(
    target: &AggregateTarget,
    pipeline: &[Document],
    options: Option<&AggregateOptions>,
    bypass_document_validation: Option<bool>,
    description: &'a StreamDescription,
) -> Result<CommandBuilder<'a>> {
    target.validate()?;
    CommandBuilder::new("aggregate", target.to_bson(), description)
        .append("pipeline", bson_util::to_bson_array(pipeline))
        .gated(
            "allowDiskUse",
            &Feature::AGGREGATE_ALLOW_DISK_USE,
            options.and_then(|o| o.allow_disk_use),
        )?
        .gated(
            "bypassDocumentValidation",
            &Feature::BYPASS_DOCUMENT_VALIDATION,
            bypass_document_validation,
        )?
        .max_time(options.and_then(|o| o.max_time))?
        .gated_serialized(
            "collation",
            &Feature::COLLATION,
            options.and_then(|o| o.collation.as_ref()),
        )?
        .gated(
            "hint",
            &Feature::AGGREGATE_HINT,
            options.and_then(|o| o.hint.as_ref()),
        )?
        .gated(
            "let",
            &Feature::AGGREGATE_LET,
            options.and_then(|o| o.let_vars.clone()),
        )?
        .gated(
            "comment",
            &Feature::AGGREGATE_COMMENT,
            options.and_then(|o| o.comment.clone()),
        )
}

/// An aggregation whose results are returned through a cursor.
#[derive(Debug)]
pub struct Aggregate {
    target: AggregateTarget,
    pipeline: Vec<Document>,
    options: Option<AggregateOptions>,
}

impl Aggregate {
    pub fn new(
        target: impl Into<AggregateTarget>,
        pipeline: impl IntoIterator<Item = Document>,
        options: Option<AggregateOptions>,
    ) -> Self {
        Self {
            target: target.into(),
            pipeline: pipeline.into_iter().collect(),
            options,
        }
    }
}

impl OperationWithDefaults for Aggregate {
    type O = CursorSpecification;

    const NAME: &'static str = "aggregate";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        let options = self.options.as_ref();
        let body =
            aggregate_body(&self.target, &self.pipeline, options, None, description)?.build();

        let mut command = Command::new_read(
            Self::NAME,
            self.target.db_name(),
            read_concern_for(description, options.and_then(|o| o.read_concern.as_ref()))?,
            body,
        );
        let cursor = cursor_document(options.and_then(|o| o.batch_size));
        command.set_trailing_field("cursor", cursor);
        Ok(command)
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

/// An aggregation ending in `$out` or `$merge`, which writes its results to a collection and
/// returns nothing.
#[derive(Debug)]
pub struct AggregateToCollection {
    target: AggregateTarget,
    pipeline: Vec<Document>,
    options: Option<AggregateOptions>,
}

impl AggregateToCollection {
    pub fn new(
        target: impl Into<AggregateTarget>,
        pipeline: impl IntoIterator<Item = Document>,
        options: Option<AggregateOptions>,
    ) -> Self {
        Self {
            target: target.into(),
            pipeline: pipeline.into_iter().collect(),
            options,
        }
    }

    fn final_stage(&self) -> Option<&str> {
        self.pipeline.last().and_then(bson_util::first_key)
    }
}

impl OperationWithDefaults for AggregateToCollection {
    type O = ();

    const NAME: &'static str = "aggregate";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        let server_version = description.server_version.as_ref();
        let is_merge = match self.final_stage() {
            Some("$out") => {
                Feature::AGGREGATE_OUT.check(server_version, true)?;
                false
            }
            Some("$merge") => {
                Feature::AGGREGATE_MERGE.check(server_version, true)?;
                true
            }
            _ => {
                return Err(Error::invalid_argument(
                    "the last pipeline stage must be $out or $merge",
                ))
            }
        };

        let options = self.options.as_ref();
        let body = aggregate_body(
            &self.target,
            &self.pipeline,
            options,
            options.and_then(|o| o.bypass_document_validation),
            description,
        )?
        .build();

        // Only `$merge` accepts a read concern.
        let read_concern = if is_merge {
            read_concern_for(description, options.and_then(|o| o.read_concern.as_ref()))?
        } else {
            None
        };

        let mut command = Command::new_read(Self::NAME, self.target.db_name(), read_concern, body);
        command.set_write_concern(write_concern_for(
            &Feature::COMMANDS_THAT_WRITE_ACCEPT_WRITE_CONCERN,
            description,
            self.write_concern(),
        )?);
        command.set_trailing_field("cursor", cursor_document(None));
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let body: WriteConcernOnlyBody = response.body()?;
        body.validate()
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.options
            .as_ref()
            .and_then(|o| o.selection_criteria.as_ref())
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn supports_read_concern(&self, _description: &StreamDescription) -> bool {
        self.final_stage() == Some("$merge")
    }
}
