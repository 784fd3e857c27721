use crate::{
    bson::Document,
    bson_util,
    cmap::{Command, RawCommandResponse, StreamDescription},
    coll::options::RunCommandOptions,
    error::{Error, Result},
    operation::OperationWithDefaults,
    selection_criteria::SelectionCriteria,
};

/// Commands the server rejects when they carry a session id, lowercased.
const SESSIONS_UNSUPPORTED_COMMANDS: &[&str] = &["killcursors", "parallelcollectionscan"];

/// Runs a user-supplied command document as-is.
#[derive(Debug, Clone)]
pub struct RunCommand {
    db: String,
    command: Document,
    options: Option<RunCommandOptions>,
}

impl RunCommand {
    pub fn new(
        db: impl Into<String>,
        command: Document,
        options: Option<RunCommandOptions>,
    ) -> Self {
        Self {
            db: db.into(),
            command,
            options,
        }
    }

    fn command_name(&self) -> Option<&str> {
        bson_util::first_key(&self.command)
    }
}

impl OperationWithDefaults for RunCommand {
    type O = Document;

    // The real name is the first key of the document; this one fails loudly if it ever reaches a
    // server.
    const NAME: &'static str = "$genericRunCommand";

    fn build(&mut self, _description: &StreamDescription) -> Result<Command> {
        if self.db.is_empty() {
            return Err(Error::invalid_argument("database name must not be empty"));
        }
        let command_name = self
            .command_name()
            .ok_or_else(|| Error::invalid_argument("the command document must not be empty"))?;

        let mut command = Command::new(command_name, &self.db, self.command.clone());
        if let Some(read_preference) = self
            .selection_criteria()
            .and_then(SelectionCriteria::as_read_pref)
        {
            command.set_read_preference(read_preference.clone());
        }
        command.set_comment(self.options.as_ref().and_then(|o| o.comment.clone()));
        Ok(command)
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        response.body()
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.options
            .as_ref()
            .and_then(|o| o.selection_criteria.as_ref())
    }

    fn supports_sessions(&self) -> bool {
        self.command_name().is_some_and(|name| {
            !SESSIONS_UNSUPPORTED_COMMANDS.contains(&name.to_lowercase().as_str())
        })
    }

    fn name(&self) -> &str {
        self.command_name().unwrap_or(Self::NAME)
    }
}
