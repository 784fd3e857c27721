//! What the write and index operations report back.

use std::collections::HashMap;

use serde::Serialize;

use crate::bson::Bson;

/// Ids of the documents an `insert` wrote, keyed by their position in the request. Documents that
/// failed to insert are missing.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct InsertManyResult {
    #[allow(missing_docs)]
    pub inserted_ids: HashMap<usize, Bson>,
}

/// Counts from an `update`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UpdateResult {
    /// Documents the filter selected.
    pub matched_count: u64,

    /// Documents actually changed. Can be lower than `matched_count`.
    pub modified_count: u64,

    /// Set when an upsert inserted a new document.
    pub upserted_id: Option<Bson>,
}

/// Counts from a `delete`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeleteResult {
    #[allow(missing_docs)]
    pub deleted_count: u64,
}

/// Names of the indexes a `createIndexes` asked for, in request order.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateIndexesResult {
    #[allow(missing_docs)]
    pub index_names: Vec<String>,
}
