//! Query descriptors: the structured form of a cached PostgREST query,
//! its canonical normalization, and the capability-tagged builder.

mod builder;
mod descriptor;
mod normalize;
mod selection;


pub use builder::{Capabilities, QueryBuilder, QueryError, QueryStage};
pub use descriptor::{
    Cardinality, CountMode, DEFAULT_SCHEMA, Filter, FilterClause, FilterOp, NullsOrder, OrderTerm,
    QueryDescriptor, Range, SortDirection, Window,
};
pub use normalize::normalize;
pub use selection::{SelectItem, Selection};
