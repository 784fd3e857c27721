use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::DropCollectionOptions, Namespace},
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
};

#[derive(Debug)]
pub struct DropCollection {
    ns: Namespace,
    options: Option<DropCollectionOptions>,
}

impl DropCollection {
    pub fn new(ns: Namespace, options: Option<DropCollectionOptions>) -> Self {
        Self { ns, options }
    }
}

impl OperationWithDefaults for DropCollection {
    type O = ();

    const NAME: &'static str = "drop";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description).build();

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

    fn handle_error(&self, error: Error) -> Result<Self::O> {
        if error.is_ns_not_found() {
            Ok(())
        } else {
            Err(error)
        }
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }
}

#[cfg(test)]
mod test;
