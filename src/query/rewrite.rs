//! Tree rewrites applied between parsing and execution.

use super::ast::{Operands, Query};
use super::parser;
use crate::error::QueryError;
use crate::tokenizer::english;

/// Replace every term matching `predicate` with [`Query::Empty`] and prune.
///
/// AND/OR nodes drop empty operands and collapse to their single survivor, or
/// to `Empty` when none remain. `NOT` over an empty operand is itself empty.
#[must_use]
pub fn filter_terms<F>(query: Query, predicate: &F) -> Query
where
    F: Fn(&str) -> bool + ?Sized,
{
    match query {
        Query::Term(text) if predicate(&text) => Query::Empty,
        Query::Term(text) => Query::Term(text),
        Query::And(operands) => prune(operands, predicate, Query::And),
        Query::Or(operands) => prune(operands, predicate, Query::Or),
        Query::Not(inner) => match filter_terms(*inner, predicate) {
            Query::Empty => Query::Empty,
            kept => Query::not(kept),
        },
        Query::Empty => Query::Empty,
    }
}

fn prune<F>(operands: Operands, predicate: &F, build: fn(Operands) -> Query) -> Query
where
    F: Fn(&str) -> bool + ?Sized,
{
    let mut kept: Vec<Query> = operands
        .into_vec()
        .into_iter()
        .map(|operand| filter_terms(operand, predicate))
        .filter(|operand| !operand.is_empty())
        .collect();

    match kept.len() {
        0 => Query::Empty,
        1 => kept.pop().unwrap_or(Query::Empty),
        _ => build(Operands(kept)),
    }
}

/// Map the text of every term. The tree shape is unchanged.
#[must_use]
pub fn transform_terms<F>(query: Query, transform: &F) -> Query
where
    F: Fn(&str) -> String + ?Sized,
{
    let map_all = |operands: Operands| {
        Operands(
            operands
                .into_vec()
                .into_iter()
                .map(|operand| transform_terms(operand, transform))
                .collect(),
        )
    };

    match query {
        Query::Term(text) => Query::Term(transform(&text)),
        Query::And(operands) => Query::And(map_all(operands)),
        Query::Or(operands) => Query::Or(map_all(operands)),
        Query::Not(inner) => Query::not(transform_terms(*inner, transform)),
        Query::Empty => Query::Empty,
    }
}

/// A rewrite step.
pub type Rewrite = Box<dyn Fn(Query) -> Query + Send + Sync>;

/// Parser followed by an ordered list of rewrites.
#[derive(Default)]
pub struct QueryPipeline {
    rewrites: Vec<Rewrite>,
}

impl QueryPipeline {
    /// Pipeline that only parses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stopword removal followed by plural stemming, mirroring what the
    /// standard tokenizer does to indexed text.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_rewrite(|query| filter_terms(query, &english::is_stop_word))
            .with_rewrite(|query| transform_terms(query, &english::stem))
    }

    /// Append a rewrite step.
    #[must_use]
    pub fn with_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(Query) -> Query + Send + Sync + 'static,
    {
        self.rewrites.push(Box::new(rewrite));
        self
    }

    /// Parse `input` and apply every rewrite in order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Parse`] if `input` does not parse.
    pub fn parse(&self, input: &str) -> Result<Query, QueryError> {
        let query = parser::parse(input)?;
        Ok(self
            .rewrites
            .iter()
            .fold(query, |query, rewrite| rewrite(query)))
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("rewrites", &self.rewrites.len())
            .finish()
    }
}
