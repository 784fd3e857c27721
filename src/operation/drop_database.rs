use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::options::DropDatabaseOptions,
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
};

#[derive(Debug)]
pub struct DropDatabase {
    target_db: String,
    options: Option<DropDatabaseOptions>,
}

impl DropDatabase {
    pub fn new(target_db: impl Into<String>, options: Option<DropDatabaseOptions>) -> Self {
        Self {
            target_db: target_db.into(),
            options,
        }
    }
}

impl OperationWithDefaults for DropDatabase {
    type O = ();

    const NAME: &'static str = "dropDatabase";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        if self.target_db.is_empty() {
            return Err(Error::invalid_argument("database name must not be empty"));
        }
        let body = CommandBuilder::new(Self::NAME, 1, description).build();

        let mut command = Command::new(Self::NAME, &self.target_db, body);
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
