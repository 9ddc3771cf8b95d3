// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" or ")" | "true" | "false"
//!          | path op literal | path "in" "[" literal ("," literal)* "]" | path
//! ```

use super::ast::{CompareOp, Expression, Literal};
use crate::adk::error::WorkflowError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Num(f64),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, WorkflowError> {
    let invalid = |message: String| WorkflowError::InvalidCondition {
        expr: input.to_string(),
        message,
    };

    let tokens = tokenize(input).map_err(invalid)?;
    if tokens.is_empty() {
        return Err(invalid("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or().map_err(invalid)?;
    if let Some(extra) = parser.peek() {
        return Err(invalid(format!("unexpected token {:?}", extra)));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ',' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                });
            }
            '\'' | '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => s.push(escaped),
                            None => return Err("dangling escape".to_string()),
                        },
                        Some(ch) if ch == c => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                chars.next();
                let next = chars.peek().copied();
                let token = match (c, next) {
                    ('=', Some('=')) => Token::Op(CompareOp::Eq),
                    ('!', Some('=')) => Token::Op(CompareOp::NotEq),
                    ('>', Some('=')) => Token::Op(CompareOp::Gte),
                    ('<', Some('=')) => Token::Op(CompareOp::Lte),
                    ('&', Some('&')) => Token::And,
                    ('|', Some('|')) => Token::Or,
                    ('>', _) => {
                        tokens.push(Token::Op(CompareOp::Gt));
                        continue;
                    }
                    ('<', _) => {
                        tokens.push(Token::Op(CompareOp::Lt));
                        continue;
                    }
                    ('!', _) => {
                        tokens.push(Token::Not);
                        continue;
                    }
                    _ => return Err(format!("unexpected character '{}'", c)),
                };
                chars.next();
                tokens.push(token);
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = s
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", s))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "contains" => Token::Op(CompareOp::Contains),
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Path(word),
                });
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(format!("expected {:?}, found {:?}", expected, t)),
            None => Err(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expression::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::True) => Ok(Expression::True),
            Some(Token::False) => Ok(Expression::False),
            Some(Token::Path(path)) => match self.peek() {
                Some(Token::Op(op)) => {
                    let op = *op;
                    self.pos += 1;
                    let right = self.parse_literal()?;
                    Ok(Expression::Compare {
                        left: path,
                        op,
                        right,
                    })
                }
                Some(Token::In) => {
                    self.pos += 1;
                    let values = self.parse_list()?;
                    Ok(Expression::In { left: path, values })
                }
                _ => Ok(Expression::Exists(path)),
            },
            Some(t) => Err(format!("unexpected token {:?}", t)),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::String(s)),
            Some(Token::Num(n)) => Ok(Literal::Number(n)),
            Some(Token::True) => Ok(Literal::Boolean(true)),
            Some(Token::False) => Ok(Literal::Boolean(false)),
            Some(Token::Null) => Ok(Literal::Null),
            Some(t) => Err(format!("expected literal, found {:?}", t)),
            None => Err("expected literal, found end of input".to_string()),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Literal>, String> {
        self.expect(Token::LBracket)?;
        let mut values = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(values);
        }
        loop {
            values.push(self.parse_literal()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                Some(t) => return Err(format!("expected ',' or ']', found {:?}", t)),
                None => return Err("unterminated list".to_string()),
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(left: &str, op: CompareOp, right: Literal) -> Expression {
        Expression::Compare {
            left: left.to_string(),
            op,
            right,
        }
    }

    #[test]
    fn test_parse_simple_equality() {
        assert_eq!(
            parse("topic == 'medical'").unwrap(),
            cmp("topic", CompareOp::Eq, Literal::String("medical".to_string()))
        );
    }

    #[test]
    fn test_parse_double_quotes_and_escape() {
        assert_eq!(
            parse(r#"city != "St. \"John's\"""#).unwrap(),
            cmp(
                "city",
                CompareOp::NotEq,
                Literal::String("St. \"John's\"".to_string())
            )
        );
    }

    #[test]
    fn test_parse_numeric_comparisons() {
        assert_eq!(
            parse("total_cost >= 1000").unwrap(),
            cmp("total_cost", CompareOp::Gte, Literal::Number(1000.0))
        );
        assert_eq!(
            parse("exchange_rate < -0.5").unwrap(),
            cmp("exchange_rate", CompareOp::Lt, Literal::Number(-0.5))
        );
    }

    #[test]
    fn test_parse_contains_and_nested_path() {
        assert_eq!(
            parse("extracted.city contains 'York'").unwrap(),
            cmp(
                "extracted.city",
                CompareOp::Contains,
                Literal::String("York".to_string())
            )
        );
    }

    #[test]
    fn test_parse_in_list() {
        assert_eq!(
            parse("topic in ['medical', 'health']").unwrap(),
            Expression::In {
                left: "topic".to_string(),
                values: vec![
                    Literal::String("medical".to_string()),
                    Literal::String("health".to_string())
                ],
            }
        );
        assert_eq!(
            parse("topic in []").unwrap(),
            Expression::In {
                left: "topic".to_string(),
                values: vec![],
            }
        );
    }

    #[test]
    fn test_parse_exists_and_not() {
        assert_eq!(
            parse("not city").unwrap(),
            Expression::Not(Box::new(Expression::Exists("city".to_string())))
        );
        assert_eq!(
            parse("!city").unwrap(),
            Expression::Not(Box::new(Expression::Exists("city".to_string())))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        match expr {
            Expression::Or(_, right) => assert!(matches!(*right, Expression::And(_, _))),
            other => panic!("expected Or at top level, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(a == 1 or b == 2) && c == 3").unwrap();
        assert!(matches!(expr, Expression::And(_, _)));
    }

    #[test]
    fn test_parse_literal_booleans() {
        assert_eq!(parse("true").unwrap(), Expression::True);
        assert_eq!(parse(" false ").unwrap(), Expression::False);
        assert_eq!(
            parse("verified == true").unwrap(),
            cmp("verified", CompareOp::Eq, Literal::Boolean(true))
        );
        assert_eq!(
            parse("weather == null").unwrap(),
            cmp("weather", CompareOp::Eq, Literal::Null)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("topic ==").is_err());
        assert!(parse("topic == 'open").is_err());
        assert!(parse("(topic == 'a'").is_err());
        assert!(parse("topic = 'a'").is_err());
        assert!(parse("topic == 'a' 'b'").is_err());
        assert!(parse("topic in ['a' 'b']").is_err());

        let err = parse("topic ==").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidCondition { .. }));
    }
}
