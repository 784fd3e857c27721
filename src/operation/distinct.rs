use serde::Deserialize;

use crate::{
    bson::{Bson, Document},
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::DistinctOptions, Namespace},
    error::{Error, Result},
    feature::Feature,
    operation::{read_concern_for, OperationWithDefaults, Retryability},
    selection_criteria::SelectionCriteria,
};

#[derive(Debug)]
pub struct Distinct {
    ns: Namespace,
    field_name: String,
    query: Option<Document>,
    options: Option<DistinctOptions>,
}

impl Distinct {
    pub fn new(
        ns: Namespace,
        field_name: impl Into<String>,
        query: Option<Document>,
        options: Option<DistinctOptions>,
    ) -> Self {
        Distinct {
            ns,
            field_name: field_name.into(),
            query,
            options,
        }
    }
}

impl OperationWithDefaults for Distinct {
    type O = Vec<Bson>;

    const NAME: &'static str = "distinct";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        if self.field_name.is_empty() {
            return Err(Error::invalid_argument("distinct key must not be empty"));
        }
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("key", self.field_name.clone())
            .optional("query", self.query.clone())
            .max_time(options.and_then(|o| o.max_time))?
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
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
        let response: Response = response.body()?;
        Ok(response.values)
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
    values: Vec<Bson>,
}
