use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    concern::WriteConcern,
    error::Result,
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, Retryability, WriteConcernOnlyBody},
};

/// Aborts the transaction in progress on the session the command is run with.
#[derive(Debug)]
pub struct AbortTransaction {
    write_concern: Option<WriteConcern>,
}

impl AbortTransaction {
    pub fn new(write_concern: Option<WriteConcern>) -> Self {
        Self { write_concern }
    }
}

impl OperationWithDefaults for AbortTransaction {
    type O = ();

    const NAME: &'static str = "abortTransaction";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        let body = CommandBuilder::new(Self::NAME, 1, description).build();

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
        self.write_concern.as_ref()
    }

    fn retryability(&self) -> Retryability {
        Retryability::Write
    }
}
