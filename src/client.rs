//! Sessions, transactions and the executor that runs operations within them.

pub(crate) mod executor;
pub mod options;
pub mod session;

pub use self::{
    executor::Executor,
    session::{ClientSession, ClusterTime},
};
