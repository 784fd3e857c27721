use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::RenameCollectionOptions, Namespace},
    concern::WriteConcern,
    error::Result,
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
};

/// Renames a collection, possibly moving it to another database. Always runs against `admin`.
#[derive(Debug)]
pub struct RenameCollection {
    from: Namespace,
    to: Namespace,
    options: Option<RenameCollectionOptions>,
}

impl RenameCollection {
    pub fn new(from: Namespace, to: Namespace, options: Option<RenameCollectionOptions>) -> Self {
        Self { from, to, options }
    }
}

impl OperationWithDefaults for RenameCollection {
    type O = ();

    const NAME: &'static str = "renameCollection";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.from.validate()?;
        self.to.validate()?;
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.from.to_string(), description)
            .append("to", self.to.to_string())
            .optional("dropTarget", options.and_then(|o| o.drop_target))
            .build();

        let mut command = Command::new(Self::NAME, "admin", body);
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
