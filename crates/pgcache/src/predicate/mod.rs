//! Predicate evaluation of decoded filters against cached rows.

mod coercion;
mod eval;
mod pattern;
mod range;


pub use eval::{EvalError, eval_filter, matches};
