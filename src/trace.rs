//! `tracing` events emitted while commands run.

pub(crate) mod command;

use bson::Bson;

use crate::sdam::{ServerAddress, DEFAULT_PORT};

pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "mongodb_core::command";

/// Command documents and error messages longer than this are truncated in events.
pub(crate) const DEFAULT_MAX_DOCUMENT_LENGTH_BYTES: usize = 1000;

pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

impl TracingRepresentation for bson::Document {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        Bson::Document(self.clone())
            .into_relaxed_extjson()
            .to_string()
    }
}

impl TracingRepresentation for crate::error::Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

impl ServerAddress {
    pub(crate) fn port_tracing_representation(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Truncates `s` to at most `max_length` bytes, backing off to the nearest character boundary,
/// and appends "..." when anything was cut.
pub(crate) fn truncate_on_char_boundary(s: &mut String, max_length: usize) {
    if s.len() <= max_length {
        return;
    }
    let mut boundary = max_length;
    while !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    s.truncate(boundary);
    s.push_str("...");
}
