//! Boolean query language.
//!
//! Queries are written as terms joined by `AND`, `OR` and prefixed by `NOT`,
//! with precedence `NOT` > `AND` > `OR`:
//!
//! ```
//! use reindex::query::{parse, QueryPipeline};
//!
//! let query = parse("vampire AND NOT werewolf OR ghost").unwrap();
//! assert_eq!(query.to_string(), "((vampire AND (NOT werewolf)) OR ghost)");
//!
//! let rewritten = QueryPipeline::standard().parse("the AND ghosts").unwrap();
//! assert_eq!(rewritten.to_string(), "ghost");
//! ```

mod ast;
mod parser;
mod rewrite;

pub use ast::{Operands, Query};
pub use parser::parse;
pub use rewrite::{filter_terms, transform_terms, QueryPipeline, Rewrite};
