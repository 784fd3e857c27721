use crate::{
    bson_util::{self, CommandBuilder},
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::CreateCollectionOptions, Namespace},
    concern::WriteConcern,
    error::Result,
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
};

/// Creates a collection, or a view when `view_on` is set.
#[derive(Debug)]
pub struct Create {
    ns: Namespace,
    options: Option<CreateCollectionOptions>,
}

impl Create {
    pub fn new(ns: Namespace, options: Option<CreateCollectionOptions>) -> Self {
        Self { ns, options }
    }
}

impl OperationWithDefaults for Create {
    type O = ();

    const NAME: &'static str = "create";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .optional("capped", options.and_then(|o| o.capped))
            .optional("size", options.and_then(|o| o.size).map(bson_util::to_i64))
            .optional("max", options.and_then(|o| o.max).map(bson_util::to_i64))
            .optional("storageEngine", options.and_then(|o| o.storage_engine.clone()))
            .gated(
                "validator",
                &Feature::DOCUMENT_VALIDATION,
                options.and_then(|o| o.validator.clone()),
            )?
            .gated(
                "validationLevel",
                &Feature::DOCUMENT_VALIDATION,
                options
                    .and_then(|o| o.validation_level)
                    .map(|level| level.to_string()),
            )?
            .gated(
                "validationAction",
                &Feature::DOCUMENT_VALIDATION,
                options
                    .and_then(|o| o.validation_action)
                    .map(|action| action.to_string()),
            )?
            .gated(
                "indexOptionDefaults",
                &Feature::INDEX_OPTIONS_DEFAULTS,
                options.and_then(|o| o.index_option_defaults.clone()),
            )?
            .gated(
                "viewOn",
                &Feature::VIEWS,
                options.and_then(|o| o.view_on.clone()),
            )?
            .gated(
                "pipeline",
                &Feature::VIEWS,
                options
                    .and_then(|o| o.pipeline.as_deref())
                    .map(bson_util::to_bson_array),
            )?
            .gated_serialized(
                "collation",
                &Feature::COLLATION,
                options.and_then(|o| o.collation.as_ref()),
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
