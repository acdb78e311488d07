//! Cache mutation engine for PostgREST query results: cache-key codec,
//! predicate evaluation, primary-key identity, and the per-entry patching
//! that keeps cached rows and counts consistent after local writes.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod mutate;
pub mod obs;
pub mod predicate;
pub mod query;
pub mod row;
pub mod value;

///
/// Prelude
///
/// Domain vocabulary plus the engine entrypoints.
/// Errors and metrics stay in their modules.
///

pub mod prelude {
    pub use crate::{
        cache::{CacheAdapter, CacheEntry, MemoryCache},
        codec::KeyCodec,
        config::EngineConfig,
        mutate::{MutationEngine, MutationOutcome, MutationRequest, Operation, apply_mutation},
        query::{Filter, FilterClause, FilterOp, OrderTerm, QueryBuilder, QueryDescriptor},
        row::Row,
        value::Value,
    };
}
