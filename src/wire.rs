//! OP_QUERY framing for servers that predate OP_MSG, and for legacy find queries.

mod flags;
mod legacy_query;

pub use self::{
    flags::QueryFlags,
    legacy_query::{QueryHeader, WireCommand},
};
pub(crate) use self::legacy_query::{LegacyQuery, LegacyQueryWrapper};
