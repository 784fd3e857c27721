mod command;
mod stream_description;

pub use self::{
    command::{Command, RawCommandResponse},
    stream_description::StreamDescription,
};
