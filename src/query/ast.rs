//! Boolean query tree and its evaluation.

use std::collections::HashSet;
use std::fmt;

use crate::error::QueryError;
use crate::index::{DocumentId, SearchIndex};

/// A parsed boolean query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Documents containing a term.
    Term(String),
    /// Documents matching every operand.
    And(Operands),
    /// Documents matching any operand.
    Or(Operands),
    /// Every indexed document except the operand's matches.
    Not(Box<Query>),
    /// Matches nothing; left behind when rewriting removes a whole subtree.
    Empty,
}

/// Non-empty operand list of an AND/OR node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands(pub(super) Vec<Query>);

impl Operands {
    /// Iterate over the operands.
    pub fn iter(&self) -> std::slice::Iter<'_, Query> {
        self.0.iter()
    }

    /// Number of operands, always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Operands as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Query] {
        &self.0
    }

    /// Take the operands out.
    #[must_use]
    pub fn into_vec(self) -> Vec<Query> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Operands {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Query {
    /// Term query.
    #[must_use]
    pub fn term(text: impl Into<String>) -> Self {
        Self::Term(text.into())
    }

    /// Conjunction of `operands`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyOperands`] when `operands` is empty.
    pub fn and(operands: Vec<Query>) -> Result<Self, QueryError> {
        if operands.is_empty() {
            return Err(QueryError::EmptyOperands { operator: "AND" });
        }
        Ok(Self::And(Operands(operands)))
    }

    /// Disjunction of `operands`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyOperands`] when `operands` is empty.
    pub fn or(operands: Vec<Query>) -> Result<Self, QueryError> {
        if operands.is_empty() {
            return Err(QueryError::EmptyOperands { operator: "OR" });
        }
        Ok(Self::Or(Operands(operands)))
    }

    /// Negation of `query`.
    #[must_use]
    pub fn not(query: Query) -> Self {
        Self::Not(Box::new(query))
    }

    /// Whether this is the empty query.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Evaluate against an index.
    ///
    /// `NOT` complements against every indexed document, not only against
    /// the results of an enclosing `AND`.
    pub fn execute<I: SearchIndex + ?Sized>(&self, index: &I) -> HashSet<DocumentId> {
        match self {
            Self::Term(term) => index.matching_documents(term),
            Self::And(operands) => fold_results(operands, index, |acc, next| {
                acc.intersection(&next).copied().collect()
            }),
            Self::Or(operands) => fold_results(operands, index, |mut acc, next| {
                acc.extend(next);
                acc
            }),
            Self::Not(query) => {
                let excluded = query.execute(index);
                index
                    .indexed_documents()
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect()
            }
            Self::Empty => HashSet::new(),
        }
    }
}

fn fold_results<I, F>(operands: &Operands, index: &I, combine: F) -> HashSet<DocumentId>
where
    I: SearchIndex + ?Sized,
    F: Fn(HashSet<DocumentId>, HashSet<DocumentId>) -> HashSet<DocumentId>,
{
    let mut results = operands.iter().map(|query| query.execute(index));
    let first = results.next().unwrap_or_default();
    results.fold(first, combine)
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => f.write_str(term),
            Self::And(operands) => write_joined(f, operands, " AND "),
            Self::Or(operands) => write_joined(f, operands, " OR "),
            Self::Not(query) => write!(f, "(NOT {query})"),
            Self::Empty => Ok(()),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &Operands, separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{operand}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Index answering each term with a fixed id set.
    struct StubIndex {
        terms: HashMap<&'static str, HashSet<DocumentId>>,
        documents: HashSet<DocumentId>,
    }

    impl StubIndex {
        fn new(documents: &[DocumentId]) -> Self {
            Self {
                terms: HashMap::new(),
                documents: documents.iter().copied().collect(),
            }
        }

        fn with_term(mut self, term: &'static str, ids: &[DocumentId]) -> Self {
            self.terms.insert(term, ids.iter().copied().collect());
            self
        }
    }

    impl SearchIndex for StubIndex {
        fn matching_documents(&self, term: &str) -> HashSet<DocumentId> {
            self.terms.get(term).cloned().unwrap_or_default()
        }

        fn indexed_documents(&self) -> HashSet<DocumentId> {
            self.documents.clone()
        }
    }

    fn set(ids: &[DocumentId]) -> HashSet<DocumentId> {
        ids.iter().copied().collect()
    }

    fn three_sets() -> StubIndex {
        StubIndex::new(&[1, 2, 3, 4, 5])
            .with_term("x", &[1, 2, 3])
            .with_term("y", &[2, 3, 4])
            .with_term("z", &[3, 4, 5])
    }

    fn xyz() -> Vec<Query> {
        vec![Query::term("x"), Query::term("y"), Query::term("z")]
    }

    #[test]
    fn test_and_intersects() {
        let query = Query::and(xyz()).unwrap();
        assert_eq!(query.execute(&three_sets()), set(&[3]));
    }

    #[test]
    fn test_or_unions() {
        let query = Query::or(xyz()).unwrap();
        assert_eq!(query.execute(&three_sets()), set(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_and_is_order_independent() {
        let index = three_sets();
        let forward = Query::and(xyz()).unwrap();
        let mut reversed_operands = xyz();
        reversed_operands.reverse();
        let reversed = Query::and(reversed_operands).unwrap();
        assert_eq!(forward.execute(&index), reversed.execute(&index));
    }

    #[test]
    fn test_single_operand() {
        let index = three_sets();
        let query = Query::and(vec![Query::term("y")]).unwrap();
        assert_eq!(query.execute(&index), set(&[2, 3, 4]));
    }

    #[test]
    fn test_not_complements_whole_index() {
        let index = StubIndex::new(&[1, 2, 3, 4, 5]).with_term("x", &[3]);
        let query = Query::not(Query::term("x"));
        assert_eq!(query.execute(&index), set(&[1, 2, 4, 5]));
    }

    #[test]
    fn test_not_inside_and_still_uses_whole_index() {
        let index = three_sets();
        let query = Query::and(vec![Query::term("x"), Query::not(Query::term("z"))]).unwrap();
        assert_eq!(query.execute(&index), set(&[1, 2]));
    }

    #[test]
    fn test_unknown_term_matches_nothing() {
        let query = Query::term("nope");
        assert!(query.execute(&three_sets()).is_empty());
    }

    #[test]
    fn test_empty_matches_nothing() {
        assert!(Query::Empty.execute(&three_sets()).is_empty());
    }

    #[test]
    fn test_empty_operands_rejected() {
        assert_eq!(
            Query::and(vec![]).unwrap_err(),
            QueryError::EmptyOperands { operator: "AND" }
        );
        assert_eq!(
            Query::or(vec![]).unwrap_err(),
            QueryError::EmptyOperands { operator: "OR" }
        );
    }

    #[test]
    fn test_display() {
        let query = Query::or(vec![
            Query::and(vec![Query::term("1"), Query::term("2")]).unwrap(),
            Query::not(Query::term("3")),
        ])
        .unwrap();
        assert_eq!(query.to_string(), "((1 AND 2) OR (NOT 3))");
        assert_eq!(Query::Empty.to_string(), "");
    }

    #[test]
    fn test_operands_accessors() {
        let Query::And(operands) = Query::and(xyz()).unwrap() else {
            panic!("expected AND");
        };
        assert_eq!(operands.len(), 3);
        assert!(!operands.is_empty());
        assert_eq!(operands.as_slice()[0], Query::term("x"));
        assert_eq!(operands.into_vec(), xyz());
    }
}
