//! The boundary between command execution and the transport that carries commands to a server.
//!
//! Connection establishment, pooling and monitoring live behind these traits; this crate only
//! needs a way to obtain a channel to a suitable server and to send a command over it.

pub(crate) mod conn;

use tokio_util::sync::CancellationToken;

pub use self::conn::{Command, RawCommandResponse, StreamDescription};
use crate::{error::Result, selection_criteria::SelectionCriteria, BoxFuture};

/// A channel bound to a single server.
pub trait Channel: Send + Sync {
    /// The description of the server this channel is bound to, captured at handshake.
    fn stream_description(&self) -> &StreamDescription;

    /// Writes `command` to the server and waits for the reply. Implementations obtain the bytes to
    /// write from [`Command::wire_document`] and target [`Command::target_db`].
    ///
    /// An OP_REPLY to a command carries the reply document, which is returned as-is. An OP_REPLY
    /// to a query against a collection is returned as `{ok: 1, cursorId, documents}`.
    fn send_command<'a>(
        &'a self,
        command: Command,
        cancellation_token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RawCommandResponse>>;
}

/// A source of channels. Each call may route to a different server.
pub trait ChannelSource: Send + Sync {
    /// Acquires a channel to a server matching `criteria`, or to the primary if no criteria are
    /// given.
    fn get_channel<'a>(
        &'a self,
        criteria: Option<&'a SelectionCriteria>,
    ) -> BoxFuture<'a, Result<Box<dyn Channel>>>;
}
