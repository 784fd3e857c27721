use std::time::Duration;

use crate::{
    cmap::Command,
    error::Error,
    sdam::ServerAddress,
    trace::{
        truncate_on_char_boundary,
        TracingRepresentation,
        COMMAND_TRACING_EVENT_TARGET,
        DEFAULT_MAX_DOCUMENT_LENGTH_BYTES,
    },
};

/// Emits the events of a single attempt of a command.
#[derive(Debug)]
pub(crate) struct CommandTracer<'a> {
    pub(crate) command_name: &'a str,
    pub(crate) database_name: &'a str,
    pub(crate) operation_id: u64,
    pub(crate) attempt: u32,
    pub(crate) server: &'a ServerAddress,
}

fn serialize_truncated(mut serialized: String) -> String {
    truncate_on_char_boundary(&mut serialized, DEFAULT_MAX_DOCUMENT_LENGTH_BYTES);
    serialized
}

impl CommandTracer<'_> {
    pub(crate) fn started(&self, command: &Command) {
        if !tracing::enabled!(target: COMMAND_TRACING_EVENT_TARGET, tracing::Level::DEBUG) {
            return;
        }
        let command = match command.document() {
            Ok(document) => document.tracing_representation(),
            Err(error) => error.tracing_representation(),
        };
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            command = serialize_truncated(command),
            databaseName = self.database_name,
            commandName = self.command_name,
            operationId = self.operation_id,
            attempt = self.attempt,
            serverHost = self.server.host.as_str(),
            serverPort = self.server.port_tracing_representation(),
            "Command started"
        );
    }

    pub(crate) fn succeeded(&self, duration: Duration) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            commandName = self.command_name,
            operationId = self.operation_id,
            attempt = self.attempt,
            serverHost = self.server.host.as_str(),
            serverPort = self.server.port_tracing_representation(),
            durationMS = duration.as_millis(),
            "Command succeeded"
        );
    }

    pub(crate) fn failed(&self, duration: Duration, failure: &Error) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            failure = serialize_truncated(failure.tracing_representation()),
            commandName = self.command_name,
            operationId = self.operation_id,
            attempt = self.attempt,
            serverHost = self.server.host.as_str(),
            serverPort = self.server.port_tracing_representation(),
            durationMS = duration.as_millis(),
            "Command failed"
        );
    }

    pub(crate) fn retrying(&self, error: &Error) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            error = serialize_truncated(error.tracing_representation()),
            commandName = self.command_name,
            operationId = self.operation_id,
            "Retrying command"
        );
    }
}
