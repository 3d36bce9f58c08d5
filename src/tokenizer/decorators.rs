//! Tokenizer decorators.

use std::io::BufRead;

use super::{Token, TokenStream, Tokenizer};

/// Drops every token matching a predicate.
pub struct FilteringTokenizer<T, F> {
    inner: T,
    predicate: F,
}

impl<T, F> FilteringTokenizer<T, F>
where
    T: Tokenizer,
    F: Fn(&Token) -> bool + Send + Sync,
{
    /// Wrap `inner`, removing tokens for which `predicate` returns true.
    pub fn new(inner: T, predicate: F) -> Self {
        Self { inner, predicate }
    }
}

impl<T, F> Tokenizer for FilteringTokenizer<T, F>
where
    T: Tokenizer,
    F: Fn(&Token) -> bool + Send + Sync,
{
    fn tokenize<'a>(&'a self, reader: Box<dyn BufRead + 'a>) -> TokenStream<'a> {
        Box::new(
            self.inner
                .tokenize(reader)
                .filter(move |token| !matches!(token, Ok(token) if (self.predicate)(token))),
        )
    }
}

/// Rewrites every token.
pub struct TransformingTokenizer<T, F> {
    inner: T,
    transform: F,
}

impl<T, F> TransformingTokenizer<T, F>
where
    T: Tokenizer,
    F: Fn(Token) -> Token + Send + Sync,
{
    /// Wrap `inner`, mapping each token through `transform`.
    pub fn new(inner: T, transform: F) -> Self {
        Self { inner, transform }
    }
}

impl<T, F> Tokenizer for TransformingTokenizer<T, F>
where
    T: Tokenizer,
    F: Fn(Token) -> Token + Send + Sync,
{
    fn tokenize<'a>(&'a self, reader: Box<dyn BufRead + 'a>) -> TokenStream<'a> {
        Box::new(
            self.inner
                .tokenize(reader)
                .map(move |token| token.map(|token| (self.transform)(token))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{collect_terms, WordTokenizer};

    #[test]
    fn test_filtering_tokenizer() {
        let tokenizer =
            FilteringTokenizer::new(WordTokenizer::new(64), |t: &Token| t.payload().len() < 3);
        let terms = collect_terms(&tokenizer, "a bb ccc dddd".as_bytes()).unwrap();
        assert_eq!(terms, vec!["ccc", "dddd"]);
    }

    #[test]
    fn test_transforming_tokenizer() {
        let tokenizer = TransformingTokenizer::new(WordTokenizer::new(64), |t: Token| {
            t.map_payload(str::to_uppercase)
        });
        let terms = collect_terms(&tokenizer, "quick brown".as_bytes()).unwrap();
        assert_eq!(terms, vec!["QUICK", "BROWN"]);
    }

    #[test]
    fn test_decorators_compose() {
        let tokenizer = FilteringTokenizer::new(
            TransformingTokenizer::new(WordTokenizer::new(64), |t: Token| {
                t.map_payload(str::to_lowercase)
            }),
            |t: &Token| t.payload() == "fox",
        );
        let terms = collect_terms(&tokenizer, "The FOX jumps".as_bytes()).unwrap();
        assert_eq!(terms, vec!["the", "jumps"]);
    }

    #[test]
    fn test_errors_pass_through_filter() {
        let bytes: &[u8] = &[0xff, b'\n'];
        let tokenizer = FilteringTokenizer::new(WordTokenizer::new(64), |_: &Token| true);
        let result = collect_terms(&tokenizer, bytes);
        assert!(result.is_err());
    }
}
