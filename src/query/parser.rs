//! Recursive-descent parser for the query language
//!
//! ```text
//! query      := SELECT * FROM ident [WHERE boolExpr] [ORDER BY ident [ASC|DESC]] [LIMIT int] [;]
//! boolExpr   := andExpr (OR andExpr)*
//! andExpr    := term (AND term)*
//! term       := ( boolExpr ) | comparison
//! comparison := ident op literal | ident IS [NOT] NULL
//!             | ident IN ( literal, ... ) | ident LIKE string
//! ```

use serde_json::{Number, Value};

use crate::error::{Result, StoreError};
use crate::query::ast::{Expr, OrderBy, Query, SortDirection};
use crate::query::lexer::{Token, TokenKind, tokenize};

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "ORDER", "BY", "ASC", "DESC", "LIMIT", "IS", "NOT",
    "NULL", "IN", "LIKE",
];

/// Parse a query without parameters
pub fn parse(sql: &str) -> Result<Query> {
    parse_with_params(sql, &[])
}

/// Parse a query, binding each `?` to the next value of `params`
pub fn parse_with_params(sql: &str, params: &[Value]) -> Result<Query> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        end: sql.len(),
        params,
        next_param: 0,
    };
    parser.query()
}

/// Typed value of an unquoted literal token
pub fn bare_literal(word: &str) -> Value {
    if word.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if word.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if word.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(n) = word.parse::<i64>() {
        return Value::Number(n.into());
    }
    word.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(word.to_string()), Value::Number)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    params: &'a [Value],
    next_param: usize,
}

impl Parser<'_> {
    fn query(&mut self) -> Result<Query> {
        self.expect_keyword("SELECT")?;
        self.expect(TokenKind::Star, "expected '*'")?;
        self.expect_keyword("FROM")?;
        let mut query = Query::new(self.ident()?);

        if self.eat_keyword("WHERE") {
            query.filter = Some(self.bool_expr()?);
        }
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let field = self.ident()?;
            let direction = if self.eat_keyword("DESC") {
                SortDirection::Desc
            } else {
                self.eat_keyword("ASC");
                SortDirection::Asc
            };
            query.order_by = Some(OrderBy { field, direction });
        }
        if self.eat_keyword("LIMIT") {
            query.limit = Some(self.integer()?);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Semicolon)) {
            self.pos += 1;
        }

        match self.peek() {
            Some(token) => Err(self.error_at(token, "unexpected token")),
            None => Ok(query),
        }
    }

    fn bool_expr(&mut self) -> Result<Expr> {
        let mut operands = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            operands.push(self.and_expr()?);
        }
        Ok(Expr::or(operands))
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut operands = vec![self.term()?];
        while self.eat_keyword("AND") {
            operands.push(self.term()?);
        }
        Ok(Expr::and(operands))
    }

    fn term(&mut self) -> Result<Expr> {
        if matches!(self.peek_kind(), Some(TokenKind::LParen)) {
            self.pos += 1;
            let inner = self.bool_expr()?;
            self.expect(TokenKind::RParen, "expected ')'")?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let field = self.ident()?;
        let token = self.next_token("expected operator")?;

        match &token.kind {
            TokenKind::Op(op) => Ok(Expr::Compare {
                field,
                op: *op,
                value: self.literal()?,
            }),
            _ if token.is_keyword("IS") => {
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("NULL")?;
                Ok(Expr::IsNull { field, negated })
            }
            _ if token.is_keyword("IN") => {
                self.expect(TokenKind::LParen, "expected '(' after IN")?;
                let mut values = vec![self.literal()?];
                while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                    self.pos += 1;
                    values.push(self.literal()?);
                }
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(Expr::In { field, values })
            }
            _ if token.is_keyword("LIKE") => {
                let pattern = self.next_token("expected quoted pattern after LIKE")?;
                let pattern = match &pattern.kind {
                    TokenKind::Str(text) => text.clone(),
                    TokenKind::Param => match self.bind(&pattern)? {
                        Value::String(text) => text,
                        _ => return Err(self.error_at(&pattern, "LIKE parameter must be a string")),
                    },
                    _ => return Err(self.error_at(&pattern, "expected quoted pattern after LIKE")),
                };
                Ok(Expr::Like { field, pattern })
            }
            _ => Err(self.error_at(&token, "unknown operator")),
        }
    }

    fn literal(&mut self) -> Result<Value> {
        let token = self.next_token("expected value")?;
        match &token.kind {
            TokenKind::Str(text) => Ok(Value::String(text.clone())),
            TokenKind::Word(word) => Ok(bare_literal(word)),
            TokenKind::Param => self.bind(&token),
            _ => Err(self.error_at(&token, "expected value")),
        }
    }

    fn bind(&mut self, token: &Token) -> Result<Value> {
        let value = self
            .params
            .get(self.next_param)
            .cloned()
            .ok_or_else(|| self.error_at(token, "missing query parameter"))?;
        self.next_param += 1;
        Ok(value)
    }

    fn ident(&mut self) -> Result<String> {
        let token = self.next_token("expected identifier")?;
        match &token.kind {
            TokenKind::Word(word)
                if !KEYWORDS.iter().any(|kw| word.eq_ignore_ascii_case(kw)) =>
            {
                Ok(word.clone())
            }
            _ => Err(self.error_at(&token, "expected identifier")),
        }
    }

    fn integer(&mut self) -> Result<usize> {
        let token = self.next_token("expected integer")?;
        match &token.kind {
            TokenKind::Word(word) => word
                .parse::<usize>()
                .map_err(|_| self.error_at(&token, "expected integer")),
            _ => Err(self.error_at(&token, "expected integer")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn next_token(&mut self, message: &str) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| StoreError::query_syntax(message, "", self.end))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek().is_some_and(|token| token.is_keyword(keyword));
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.next_token(&format!("expected {}", keyword))?;
        if token.is_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_at(&token, &format!("expected {}", keyword)))
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<()> {
        let token = self.next_token(message)?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(self.error_at(&token, message))
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> StoreError {
        StoreError::query_syntax(message, token.text.clone(), token.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::CompareOp;
    use serde_json::json;

    fn compare(field: &str, op: CompareOp, value: Value) -> Expr {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }

    fn syntax_error(sql: &str) -> (String, usize) {
        match parse(sql).unwrap_err() {
            StoreError::QuerySyntax {
                token, position, ..
            } => (token, position),
            other => panic!("Expected QuerySyntax, got {:?}", other),
        }
    }

    // =========================================================================
    // Statement Tests
    // =========================================================================

    #[test]
    fn test_parse_select_all() {
        assert_eq!(parse("SELECT * FROM users").unwrap(), Query::new("users"));
        assert_eq!(parse("select * from users;").unwrap(), Query::new("users"));
    }

    #[test]
    fn test_parse_full_statement() {
        let query = parse(
            "SELECT * FROM t WHERE age >= 18 AND (status = 'active' OR status = 'pending') \
             ORDER BY age DESC LIMIT 2",
        )
        .unwrap();

        let expected = Query::new("t")
            .with_filter(Expr::and(vec![
                compare("age", CompareOp::Gte, json!(18)),
                Expr::or(vec![
                    compare("status", CompareOp::Eq, json!("active")),
                    compare("status", CompareOp::Eq, json!("pending")),
                ]),
            ]))
            .with_order("age", SortDirection::Desc)
            .with_limit(2);
        assert_eq!(query, expected);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let query = parse("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        assert_eq!(
            query.filter,
            Some(Expr::or(vec![
                compare("a", CompareOp::Eq, json!(1)),
                Expr::and(vec![
                    compare("b", CompareOp::Eq, json!(2)),
                    compare("c", CompareOp::Eq, json!(3)),
                ]),
            ]))
        );
    }

    #[test]
    fn test_order_by_defaults_to_ascending() {
        let query = parse("SELECT * FROM t ORDER BY name").unwrap();
        assert_eq!(query.order_by.unwrap().direction, SortDirection::Asc);

        let query = parse("SELECT * FROM t ORDER BY name asc").unwrap();
        assert_eq!(query.order_by.unwrap().direction, SortDirection::Asc);
    }

    // =========================================================================
    // Predicate Form Tests
    // =========================================================================

    #[test]
    fn test_parse_null_tests() {
        let query = parse("SELECT * FROM t WHERE a IS NULL AND b is not null").unwrap();
        assert_eq!(
            query.filter,
            Some(Expr::and(vec![
                Expr::IsNull {
                    field: "a".to_string(),
                    negated: false
                },
                Expr::IsNull {
                    field: "b".to_string(),
                    negated: true
                },
            ]))
        );
    }

    #[test]
    fn test_parse_in_and_like() {
        let query =
            parse("SELECT * FROM t WHERE role IN ('admin', \"owner\", 3) AND name LIKE 'A_a%'")
                .unwrap();
        assert_eq!(
            query.filter,
            Some(Expr::and(vec![
                Expr::In {
                    field: "role".to_string(),
                    values: vec![json!("admin"), json!("owner"), json!(3)],
                },
                Expr::Like {
                    field: "name".to_string(),
                    pattern: "A_a%".to_string(),
                },
            ]))
        );
    }

    #[test]
    fn test_literal_typing() {
        assert_eq!(bare_literal("TRUE"), json!(true));
        assert_eq!(bare_literal("false"), json!(false));
        assert_eq!(bare_literal("Null"), Value::Null);
        assert_eq!(bare_literal("42"), json!(42));
        assert_eq!(bare_literal("-2.5"), json!(-2.5));
        assert_eq!(bare_literal("inf"), json!("inf"));
        assert_eq!(bare_literal("active"), json!("active"));

        let query = parse("SELECT * FROM t WHERE code = '42'").unwrap();
        assert_eq!(
            query.filter,
            Some(compare("code", CompareOp::Eq, json!("42")))
        );
    }

    // =========================================================================
    // Parameter Tests
    // =========================================================================

    #[test]
    fn test_parameters_bind_in_order() {
        let query = parse_with_params(
            "SELECT * FROM t WHERE a = ? AND b IN (?, ?) AND c LIKE ?",
            &[json!(1), json!("x"), json!(null), json!("%z")],
        )
        .unwrap();

        assert_eq!(
            query.filter,
            Some(Expr::and(vec![
                compare("a", CompareOp::Eq, json!(1)),
                Expr::In {
                    field: "b".to_string(),
                    values: vec![json!("x"), Value::Null],
                },
                Expr::Like {
                    field: "c".to_string(),
                    pattern: "%z".to_string(),
                },
            ]))
        );
    }

    #[test]
    fn test_missing_parameter() {
        let err = parse_with_params("SELECT * FROM t WHERE a = ? AND b = ?", &[json!(1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::QuerySyntax { position: 36, .. }));
    }

    #[test]
    fn test_like_parameter_must_be_string() {
        let err = parse_with_params("SELECT * FROM t WHERE a LIKE ?", &[json!(5)]).unwrap_err();
        assert!(matches!(err, StoreError::QuerySyntax { .. }));
    }

    // =========================================================================
    // Error Tests
    // =========================================================================

    #[test]
    fn test_misspelled_keyword() {
        assert_eq!(syntax_error("SELECT * FORM users"), ("FORM".to_string(), 9));
    }

    #[test]
    fn test_missing_star() {
        assert_eq!(syntax_error("SELECT name FROM users"), ("name".to_string(), 7));
    }

    #[test]
    fn test_unknown_comparison_operator() {
        assert_eq!(
            syntax_error("SELECT * FROM t WHERE a BETWEEN 1"),
            ("BETWEEN".to_string(), 24)
        );
    }

    #[test]
    fn test_unexpected_end() {
        let (token, position) = syntax_error("SELECT * FROM t WHERE a =");
        assert_eq!(token, "");
        assert_eq!(position, 25);
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let (_, position) = syntax_error("SELECT * FROM t WHERE (a = 1");
        assert_eq!(position, 28);
    }

    #[test]
    fn test_trailing_input() {
        assert_eq!(
            syntax_error("SELECT * FROM t LIMIT 5 extra"),
            ("extra".to_string(), 24)
        );
    }

    #[test]
    fn test_keyword_is_not_an_identifier() {
        assert_eq!(syntax_error("SELECT * FROM where"), ("where".to_string(), 14));
    }

    #[test]
    fn test_like_requires_quoted_pattern() {
        assert_eq!(
            syntax_error("SELECT * FROM t WHERE a LIKE abc"),
            ("abc".to_string(), 29)
        );
    }

    #[test]
    fn test_limit_must_be_integer() {
        assert_eq!(
            syntax_error("SELECT * FROM t LIMIT 2.5"),
            ("2.5".to_string(), 22)
        );
    }
}
