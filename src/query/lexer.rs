//! Tokenizer for the query language

use crate::error::{Result, StoreError};
use crate::query::ast::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword, identifier, or bare literal
    Word(String),
    /// Contents of a single- or double-quoted string
    Str(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Star,
    Semicolon,
    /// `?` placeholder bound from query parameters
    Param,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token, quotes included
    pub text: String,
    /// Byte offset of the token in the query
    pub position: usize,
}

impl Token {
    /// Whether this token is the keyword `keyword` (case-insensitive)
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(word) if word.eq_ignore_ascii_case(keyword))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Split query text into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '(' => single(&mut chars, TokenKind::LParen),
            ')' => single(&mut chars, TokenKind::RParen),
            ',' => single(&mut chars, TokenKind::Comma),
            '*' => single(&mut chars, TokenKind::Star),
            ';' => single(&mut chars, TokenKind::Semicolon),
            '?' => single(&mut chars, TokenKind::Param),
            '=' => single(&mut chars, TokenKind::Op(CompareOp::Eq)),
            '<' | '>' | '!' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let op = match (c, next) {
                    ('<', Some('=')) => Some(CompareOp::Lte),
                    ('<', Some('>')) => Some(CompareOp::Ne),
                    ('>', Some('=')) => Some(CompareOp::Gte),
                    ('!', Some('=')) => Some(CompareOp::Ne),
                    _ => None,
                };
                match (c, op) {
                    (_, Some(op)) => {
                        chars.next();
                        TokenKind::Op(op)
                    }
                    ('<', None) => TokenKind::Op(CompareOp::Lt),
                    ('>', None) => TokenKind::Op(CompareOp::Gt),
                    _ => {
                        return Err(StoreError::query_syntax(
                            "unknown operator",
                            c.to_string(),
                            start,
                        ));
                    }
                }
            }
            '\'' | '"' => {
                chars.next();
                let mut content = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == c {
                        closed = true;
                        break;
                    }
                    content.push(n);
                }
                if !closed {
                    return Err(StoreError::query_syntax(
                        "unterminated string",
                        &input[start..],
                        start,
                    ));
                }
                TokenKind::Str(content)
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if !is_word_char(n) {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                TokenKind::Word(word)
            }
            other => {
                return Err(StoreError::query_syntax(
                    "unexpected character",
                    other.to_string(),
                    start,
                ));
            }
        };

        let end = chars.peek().map_or(input.len(), |&(i, _)| i);
        tokens.push(Token {
            kind,
            text: input[start..end].to_string(),
            position: start,
        });
    }

    Ok(tokens)
}

fn single(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    kind: TokenKind,
) -> TokenKind {
    chars.next();
    kind
}
