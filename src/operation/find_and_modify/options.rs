use std::time::Duration;

use crate::{
    bson::{Bson, Document},
    coll::options::{
        FindOneAndDeleteOptions,
        FindOneAndReplaceOptions,
        FindOneAndUpdateOptions,
        Hint,
        ReturnDocument,
    },
    collation::Collation,
    concern::WriteConcern,
};

/// The options of the three `findOneAnd*` flavours, merged into the shape of the
/// `findAndModify` command.
#[derive(Clone, Debug, Default)]
pub(super) struct FindAndModifyOptions {
    pub(super) sort: Option<Document>,
    pub(super) new: Option<bool>,
    pub(super) upsert: Option<bool>,
    pub(super) bypass_document_validation: Option<bool>,
    pub(super) write_concern: Option<WriteConcern>,
    pub(super) array_filters: Option<Vec<Document>>,
    pub(super) max_time: Option<Duration>,
    pub(super) projection: Option<Document>,
    pub(super) collation: Option<Collation>,
    pub(super) hint: Option<Hint>,
    pub(super) let_vars: Option<Document>,
    pub(super) comment: Option<Bson>,
}

fn return_new(return_document: Option<ReturnDocument>) -> Option<bool> {
    return_document.as_ref().map(ReturnDocument::is_after)
}

impl From<FindOneAndDeleteOptions> for FindAndModifyOptions {
    fn from(options: FindOneAndDeleteOptions) -> Self {
        Self {
            sort: options.sort,
            write_concern: options.write_concern,
            max_time: options.max_time,
            projection: options.projection,
            collation: options.collation,
            hint: options.hint,
            let_vars: options.let_vars,
            comment: options.comment,
            ..Default::default()
        }
    }
}

impl From<FindOneAndReplaceOptions> for FindAndModifyOptions {
    fn from(options: FindOneAndReplaceOptions) -> Self {
        Self {
            sort: options.sort,
            new: return_new(options.return_document),
            upsert: options.upsert,
            bypass_document_validation: options.bypass_document_validation,
            write_concern: options.write_concern,
            array_filters: None,
            max_time: options.max_time,
            projection: options.projection,
            collation: options.collation,
            hint: options.hint,
            let_vars: options.let_vars,
            comment: options.comment,
        }
    }
}

impl From<FindOneAndUpdateOptions> for FindAndModifyOptions {
    fn from(options: FindOneAndUpdateOptions) -> Self {
        Self {
            sort: options.sort,
            new: return_new(options.return_document),
            upsert: options.upsert,
            bypass_document_validation: options.bypass_document_validation,
            write_concern: options.write_concern,
            array_filters: options.array_filters,
            max_time: options.max_time,
            projection: options.projection,
            collation: options.collation,
            hint: options.hint,
            let_vars: options.let_vars,
            comment: options.comment,
        }
    }
}
