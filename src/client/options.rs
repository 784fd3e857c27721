//! Options for sessions, transactions and the executor.

use std::time::Duration;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{
    concern::{ReadConcern, WriteConcern},
    selection_criteria::SelectionCriteria,
    serde_util,
};

/// Contains the options that can be used to create a new
/// [`ClientSession`](crate::ClientSession).
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SessionOptions {
    /// The default options to use for transactions started on this session.
    ///
    /// Options passed to `start_transaction` take precedence over these.
    pub default_transaction_options: Option<TransactionOptions>,

    /// If true, all read operations performed using this session will be read from the same
    /// snapshot of the data that the session's previous operations observed. Defaults to true for
    /// explicit sessions and is always false for implicit ones.
    pub causal_consistency: Option<bool>,
}

/// Contains the options that can be used for a transaction.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct TransactionOptions {
    /// The read concern to use for the transaction. It is sent with the first command of the
    /// transaction only.
    #[serde(skip)]
    pub read_concern: Option<ReadConcern>,

    /// The write concern to use when committing or aborting a transaction.
    pub write_concern: Option<WriteConcern>,

    /// The selection criteria to use for all read operations in a transaction.
    #[serde(skip)]
    pub selection_criteria: Option<SelectionCriteria>,

    /// The maximum amount of time to allow a single commitTransaction to run.
    #[serde(
        rename = "maxCommitTimeMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis",
        default
    )]
    pub max_commit_time: Option<Duration>,
}

/// Retry behavior of an [`Executor`](crate::Executor).
#[derive(Clone, Debug, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ExecutorOptions {
    /// Whether acknowledged writes that fail with a retryable error are retried once on servers
    /// that support retryable writes.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub retry_writes: bool,

    /// Whether reads that fail with a retryable error are retried once.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub retry_reads: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
