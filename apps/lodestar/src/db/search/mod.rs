//! Search: expression parsing, filter specs and pipeline compilation

pub mod compiler;
mod escape;
pub mod expression;
pub mod fields;
pub mod filter;
pub mod predicate;
pub mod state;

pub use compiler::{CompiledQuery, Partition, PipelineCompiler};
pub use expression::{SearchExpression, SearchExpressionParser};
pub use filter::{FilterSpec, Paging};
pub use predicate::{Comparison, Pattern, Predicate};
pub use state::EngagementState;
