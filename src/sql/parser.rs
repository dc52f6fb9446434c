//! Predicate parser
//!
//! Turns predicate tokens into a [`Filter`]. Precedence, lowest first:
//! `OR`, `AND`, `NOT`, then a single column predicate or a parenthesised group.

use super::filter::{CompareOp, Filter};
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};
use crate::row::Value;

/// Predicate parser
pub struct FilterParser {
    tokens: Vec<Token>,
    position: usize,
}

impl FilterParser {
    /// Create a new parser from a predicate string
    pub fn new(predicate: &str) -> Result<Self> {
        let mut lexer = Lexer::new(predicate);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the whole input as one filter
    pub fn parse(&mut self) -> Result<Filter> {
        let filter = self.parse_or()?;
        self.expect(&Token::Eof)?;
        Ok(filter)
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;

        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = left.or(right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_not()?;

        while self.check(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = left.and(right);
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Filter> {
        if self.check(&Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Filter::Not(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Filter> {
        if self.check(&Token::LParen) {
            self.advance();
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        let column = self.expect_identifier()?;
        self.parse_predicate(column)
    }

    fn parse_predicate(&mut self, column: String) -> Result<Filter> {
        let op = match self.current() {
            Token::Eq => Some(CompareOp::Eq),
            Token::Neq => Some(CompareOp::Ne),
            Token::Lt => Some(CompareOp::Lt),
            Token::Lte => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Gte => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let value = self.parse_literal()?;
            return Ok(Filter::Compare { column, op, value });
        }

        // IS NULL / IS NOT NULL
        if self.check(&Token::Is) {
            self.advance();
            let negated = self.check(&Token::Not);
            if negated {
                self.advance();
            }
            self.expect(&Token::Null)?;
            return Ok(Filter::IsNull { column, negated });
        }

        let negated = self.check(&Token::Not);
        if negated {
            self.advance();
        }

        match self.current() {
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut values = vec![self.parse_literal()?];
                while self.check(&Token::Comma) {
                    self.advance();
                    values.push(self.parse_literal()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Filter::InList {
                    column,
                    values,
                    negated,
                })
            }
            Token::Like => {
                self.advance();
                match self.current().clone() {
                    Token::StringLiteral(pattern) => {
                        self.advance();
                        Ok(Filter::Like {
                            column,
                            pattern,
                            negated,
                        })
                    }
                    other => Err(Error::UnexpectedToken {
                        expected: "string pattern".to_string(),
                        found: format!("{}", other),
                    }),
                }
            }
            Token::Between => {
                self.advance();
                let low = self.parse_literal()?;
                self.expect(&Token::And)?;
                let high = self.parse_literal()?;
                Ok(Filter::Between {
                    column,
                    low,
                    high,
                    negated,
                })
            }
            other => Err(Error::UnexpectedToken {
                expected: if negated {
                    "IN, LIKE or BETWEEN".to_string()
                } else {
                    "comparison operator, IS, IN, LIKE or BETWEEN".to_string()
                },
                found: format!("{}", other),
            }),
        }
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let value = match self.current() {
            Token::IntegerLiteral(n) => Value::Int(*n),
            Token::FloatLiteral(n) => Value::Float(*n),
            Token::StringLiteral(s) => Value::Text(s.clone()),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "literal".to_string(),
                    found: format!("{}", other),
                })
            }
        };
        self.advance();
        Ok(value)
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("{}", token),
                found: format!("{}", self.current()),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(Error::UnexpectedToken {
                expected: "column name".to_string(),
                found: format!("{}", self.current()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(predicate: &str) -> Result<Filter> {
        FilterParser::new(predicate)?.parse()
    }

    #[test]
    fn test_parse_comparison() {
        let filter = parse("name = 'Alice'").unwrap();
        assert_eq!(filter, Filter::eq("name", "Alice"));

        let filter = parse("age >= 30").unwrap();
        assert_eq!(filter, Filter::ge("age", 30));
    }

    #[test]
    fn test_parse_precedence() {
        let filter = parse("a = 1 OR b = 2 AND c = 3").unwrap();
        assert_eq!(
            filter,
            Filter::eq("a", 1).or(Filter::eq("b", 2).and(Filter::eq("c", 3)))
        );

        let filter = parse("(a = 1 OR b = 2) AND c = 3").unwrap();
        let (sql, params) = filter.compile().unwrap();
        assert_eq!(sql, "((`a` = ? OR `b` = ?) AND `c` = ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_parse_special_predicates() {
        assert_eq!(
            parse("deleted_at IS NOT NULL").unwrap(),
            Filter::is_not_null("deleted_at")
        );
        assert_eq!(
            parse("id NOT IN (1, 2, 3)").unwrap(),
            Filter::not_in("id", [1, 2, 3])
        );
        assert_eq!(
            parse("email LIKE '%@example.com'").unwrap(),
            Filter::like("email", "%@example.com")
        );
        assert_eq!(
            parse("age BETWEEN 18 AND 65 AND active = TRUE").unwrap(),
            Filter::between("age", 18, 65).and(Filter::eq("active", true))
        );
        assert_eq!(
            parse("NOT name = 'Bob'").unwrap(),
            Filter::eq("name", "Bob").negate()
        );
    }

    #[test]
    fn test_parse_rejects_non_predicates() {
        assert!(parse("1 = 1").is_err());
        assert!(parse("name = other_column").is_err());
        assert!(parse("name = 'a' extra").is_err());
        assert!(parse("(name = 'a'").is_err());
        assert!(parse("").is_err());
        assert!(parse("name = 'x'; DELETE FROM users").is_err());
    }
}
