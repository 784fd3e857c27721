use crate::{
    bson::Bson,
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::CreateIndexOptions, Namespace},
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    index::IndexModel,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
    results::CreateIndexesResult,
};

#[derive(Debug)]
pub struct CreateIndexes {
    ns: Namespace,
    indexes: Vec<IndexModel>,
    options: Option<CreateIndexOptions>,
}

impl CreateIndexes {
    pub fn new(
        ns: Namespace,
        indexes: Vec<IndexModel>,
        options: Option<CreateIndexOptions>,
    ) -> Self {
        Self {
            ns,
            indexes,
            options,
        }
    }
}

impl OperationWithDefaults for CreateIndexes {
    type O = CreateIndexesResult;

    const NAME: &'static str = "createIndexes";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        if self.indexes.is_empty() {
            return Err(Error::invalid_argument("no indexes provided to create"));
        }

        // Generate names for unnamed indexes.
        self.indexes.iter_mut().for_each(IndexModel::update_name);
        let indexes = self
            .indexes
            .iter()
            .map(|index| {
                index
                    .to_index_document(description.server_version.as_ref())
                    .map(Bson::Document)
            })
            .collect::<Result<Vec<_>>>()?;

        let options = self.options.as_ref();
        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("indexes", indexes)
            .max_time(options.and_then(|o| o.max_time))?
            .gated(
                "commitQuorum",
                &Feature::CREATE_INDEX_COMMIT_QUORUM,
                options.and_then(|o| o.commit_quorum.as_ref()),
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
        response.validate()?;
        let index_names = self.indexes.iter().filter_map(IndexModel::get_name).collect();
        Ok(CreateIndexesResult { index_names })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }
}
