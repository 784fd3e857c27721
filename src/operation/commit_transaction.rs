use std::time::Duration;

use crate::{
    bson_util::CommandBuilder,
    client::options::TransactionOptions,
    cmap::{Command, RawCommandResponse, StreamDescription},
    concern::{Acknowledgment, WriteConcern},
    error::Result,
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, Retryability, WriteConcernOnlyBody},
};

const RETRY_W_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Commits the transaction in progress on the session the command is run with.
#[derive(Debug)]
pub struct CommitTransaction {
    options: Option<TransactionOptions>,
}

impl CommitTransaction {
    pub fn new(options: Option<TransactionOptions>) -> Self {
        Self { options }
    }
}

impl OperationWithDefaults for CommitTransaction {
    type O = ();

    const NAME: &'static str = "commitTransaction";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        let body = CommandBuilder::new(Self::NAME, 1, description)
            .max_time(self.options.as_ref().and_then(|o| o.max_commit_time))?
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

    fn retryability(&self) -> Retryability {
        Retryability::Write
    }

    // A retried commit must not succeed on a minority of nodes, so it is upgraded to majority with
    // a timeout unless one was already given.
    fn update_for_retry(&mut self) {
        let options = self.options.get_or_insert_with(Default::default);
        let write_concern = options.write_concern.get_or_insert_with(Default::default);
        write_concern.w = Some(Acknowledgment::Majority);
        write_concern.w_timeout.get_or_insert(RETRY_W_TIMEOUT);
    }
}
