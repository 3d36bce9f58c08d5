//! Query text parser.
//!
//! ```text
//! query    := ws* orExpr ws*
//! orExpr   := andExpr (ws+ "OR" ws+ andExpr)*
//! andExpr  := notExpr (ws+ "AND" ws+ notExpr)*
//! notExpr  := "NOT" ws+ term | term
//! term     := alphanumeric+
//! ```
//!
//! Keywords are case-sensitive whole words, so `and` or `ANDROID` are terms.

use super::ast::{Operands, Query};
use crate::error::QueryError;

/// Parse `input` into a query.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] carrying the byte offset of the first
/// offending character when the input is empty, contains characters outside
/// the grammar, or is not fully consumed.
pub fn parse(input: &str) -> Result<Query, QueryError> {
    let lexemes = lex(input)?;
    if lexemes.is_empty() {
        return Err(QueryError::parse(input.len(), "empty query"));
    }

    let mut parser = Parser {
        lexemes: &lexemes,
        cursor: 0,
        end: input.len(),
    };
    let query = parser.or_expr()?;

    if let Some(extra) = parser.peek() {
        return Err(QueryError::parse(
            extra.position,
            format!("unexpected {}", extra.kind.describe()),
        ));
    }
    Ok(query)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind<'a> {
    Word(&'a str),
    And,
    Or,
    Not,
}

impl Kind<'_> {
    fn describe(&self) -> String {
        match self {
            Kind::Word(word) => format!("term '{word}'"),
            Kind::And => "'AND'".to_string(),
            Kind::Or => "'OR'".to_string(),
            Kind::Not => "'NOT'".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Lexeme<'a> {
    kind: Kind<'a>,
    position: usize,
}

fn lex(input: &str) -> Result<Vec<Lexeme<'_>>, QueryError> {
    let mut lexemes = Vec::new();
    let mut word_start: Option<usize> = None;

    for (position, ch) in input.char_indices() {
        if ch.is_alphanumeric() {
            word_start.get_or_insert(position);
            continue;
        }
        if let Some(start) = word_start.take() {
            lexemes.push(word(&input[start..position], start));
        }
        if !ch.is_whitespace() {
            return Err(QueryError::parse(
                position,
                format!("unexpected character '{ch}'"),
            ));
        }
    }
    if let Some(start) = word_start {
        lexemes.push(word(&input[start..], start));
    }

    Ok(lexemes)
}

fn word(text: &str, position: usize) -> Lexeme<'_> {
    let kind = match text {
        "AND" => Kind::And,
        "OR" => Kind::Or,
        "NOT" => Kind::Not,
        _ => Kind::Word(text),
    };
    Lexeme { kind, position }
}

struct Parser<'l, 'a> {
    lexemes: &'l [Lexeme<'a>],
    cursor: usize,
    end: usize,
}

impl<'a> Parser<'_, 'a> {
    fn peek(&self) -> Option<Lexeme<'a>> {
        self.lexemes.get(self.cursor).copied()
    }

    fn eat(&mut self, kind: Kind<'_>) -> bool {
        if self.peek().is_some_and(|lexeme| lexeme.kind == kind) {
            self.cursor += 1;
            return true;
        }
        false
    }

    fn or_expr(&mut self) -> Result<Query, QueryError> {
        let mut operands = vec![self.and_expr()?];
        while self.eat(Kind::Or) {
            operands.push(self.and_expr()?);
        }
        Ok(collapse(operands, Query::Or))
    }

    fn and_expr(&mut self) -> Result<Query, QueryError> {
        let mut operands = vec![self.not_expr()?];
        while self.eat(Kind::And) {
            operands.push(self.not_expr()?);
        }
        Ok(collapse(operands, Query::And))
    }

    fn not_expr(&mut self) -> Result<Query, QueryError> {
        if self.eat(Kind::Not) {
            return Ok(Query::not(self.term()?));
        }
        self.term()
    }

    fn term(&mut self) -> Result<Query, QueryError> {
        match self.peek() {
            Some(Lexeme {
                kind: Kind::Word(text),
                ..
            }) => {
                self.cursor += 1;
                Ok(Query::term(text))
            }
            Some(other) => Err(QueryError::parse(
                other.position,
                format!("expected a term, found {}", other.kind.describe()),
            )),
            None => Err(QueryError::parse(
                self.end,
                "expected a term, found end of input",
            )),
        }
    }
}

/// Single-operand chains collapse to their child.
fn collapse(mut operands: Vec<Query>, build: fn(Operands) -> Query) -> Query {
    if operands.len() == 1 {
        if let Some(only) = operands.pop() {
            return only;
        }
    }
    build(Operands(operands))
}
