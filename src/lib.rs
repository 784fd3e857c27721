//! Command construction and retryable execution for MongoDB drivers.
//!
//! This crate turns typed operations such as [`operation::Find`] or [`operation::Insert`] into
//! command documents whose fields follow the order and version rules of the server they are sent
//! to, and runs them through an [`Executor`]. The executor stamps each command with session,
//! transaction and cluster time metadata and retries it once after a retryable error.
//!
//! Connection establishment, pooling and server monitoring are left to the caller, which plugs in
//! through the [`cmap::ChannelSource`] and [`cmap::Channel`] traits.
//!
//! ```rust,ignore
//! use mongodb_core::{bson::doc, operation::Count, Executor, Namespace};
//!
//! let executor = Executor::new(source, None);
//! let mut count = Count::new(Namespace::new("db", "coll"), None, None);
//! let n = executor.execute(&mut count, None).await?;
//! ```
//!
//! Every command is traced at `DEBUG` level under the `mongodb_core::command` target.

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
#![allow(
    clippy::unreadable_literal,
    clippy::match_like_matches_macro,
    clippy::derive_partial_eq_without_eq
)]

pub mod options;

pub use ::bson;

mod bson_util;
mod client;
pub mod cmap;
mod coll;
mod collation;
mod concern;
pub mod error;
pub mod feature;
mod index;
pub mod operation;
pub mod results;
pub(crate) mod runtime;
pub mod sdam;
mod selection_criteria;
pub mod serde_util;
mod trace;
pub mod wire;

pub use crate::{
    client::{ClientSession, ClusterTime, Executor},
    coll::Namespace,
    index::IndexModel,
};

/// A boxed future, as returned by [`cmap::Channel`] and [`cmap::ChannelSource`].
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;
