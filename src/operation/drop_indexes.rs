use crate::{
    bson_util::CommandBuilder,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::{options::DropIndexOptions, Namespace},
    concern::WriteConcern,
    error::{Error, Result},
    feature::Feature,
    operation::{write_concern_for, OperationWithDefaults, WriteConcernOnlyBody},
};

/// Drops one index by name, or every index except `_id_` when no name is given.
#[derive(Debug)]
pub struct DropIndexes {
    ns: Namespace,
    name: Option<String>,
    options: Option<DropIndexOptions>,
}

impl DropIndexes {
    pub fn new(ns: Namespace, name: Option<String>, options: Option<DropIndexOptions>) -> Self {
        Self { ns, name, options }
    }
}

impl OperationWithDefaults for DropIndexes {
    type O = ();

    const NAME: &'static str = "dropIndexes";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.ns.validate()?;
        let index = match self.name.as_deref() {
            Some("*") => {
                return Err(Error::invalid_argument(
                    "use a name of None to drop all indexes rather than \"*\"",
                ))
            }
            Some(name) => name,
            None => "*",
        };
        let options = self.options.as_ref();

        let body = CommandBuilder::new(Self::NAME, self.ns.coll.clone(), description)
            .append("index", index)
            .max_time(options.and_then(|o| o.max_time))?
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
