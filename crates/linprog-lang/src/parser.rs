use linprog_model::{ConstraintOp, Sense};
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Span, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("`{name}` at position {span:?} is a reserved word and cannot name a variable")]
    ReservedName { name: String, span: Span },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<ModelFile, ParseError> {
        let tokens = crate::lexer::Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_model()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    /// Kind of the next token on the current line, skipping comments
    fn peek_inline(&mut self) -> TokenKind {
        while self.peek_kind() == TokenKind::Comment {
            self.advance();
        }
        self.peek_kind()
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn skip_newlines_and_comments(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Comment) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) if t.kind != TokenKind::Eof => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("{:?}", t.kind),
                span: t.span,
            },
            _ => ParseError::UnexpectedEof,
        }
    }

    /// Error for a keyword found where a variable name belongs
    fn reserved_or_unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) if t.kind.is_keyword() => ParseError::ReservedName {
                name: t.text.clone(),
                span: t.span,
            },
            _ => self.unexpected(expected),
        }
    }

    fn expect_inline(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_inline() == kind {
            if let Some(token) = self.current().cloned() {
                self.advance();
                return Ok(token);
            }
        }
        Err(self.unexpected(&format!("{:?}", kind)))
    }

    /// End of the most recently consumed token
    fn last_end(&self, fallback: Span) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span.end)
            .unwrap_or(fallback.end)
    }

    fn parse_model(&mut self) -> Result<ModelFile, ParseError> {
        let mut model = ModelFile {
            objective: None,
            constraints: Vec::new(),
            bounds: Vec::new(),
            integers: Vec::new(),
        };

        self.skip_newlines_and_comments();
        if matches!(self.peek_kind(), TokenKind::Min | TokenKind::Max) {
            model.objective = Some(self.parse_objective()?);
        }

        self.skip_newlines_and_comments();
        if self.peek_kind() == TokenKind::Subject {
            self.advance();
            self.expect_inline(TokenKind::To)?;
            loop {
                self.skip_newlines_and_comments();
                if matches!(self.peek_kind(), TokenKind::Bounds | TokenKind::Integer | TokenKind::Eof) {
                    break;
                }
                model.constraints.push(self.parse_constraint()?);
            }
        }

        self.skip_newlines_and_comments();
        if self.peek_kind() == TokenKind::Bounds {
            self.advance();
            loop {
                self.skip_newlines_and_comments();
                if matches!(self.peek_kind(), TokenKind::Integer | TokenKind::Eof) {
                    break;
                }
                model.bounds.push(self.parse_bound()?);
            }
        }

        self.skip_newlines_and_comments();
        if self.peek_kind() == TokenKind::Integer {
            self.advance();
            loop {
                self.skip_newlines_and_comments();
                if self.peek_kind() == TokenKind::Eof {
                    break;
                }
                model.integers.push(self.parse_ident()?);
            }
        }

        self.skip_newlines_and_comments();
        if self.peek_kind() != TokenKind::Eof {
            return Err(self.unexpected("subject to, bounds, integer, or end of file"));
        }

        Ok(model)
    }

    fn parse_objective(&mut self) -> Result<ObjectiveDecl, ParseError> {
        let token = self.advance().cloned().ok_or(ParseError::UnexpectedEof)?;
        let sense = match token.kind {
            TokenKind::Max => Sense::Maximize,
            _ => Sense::Minimize,
        };
        let expr = self.parse_expr()?;
        Ok(ObjectiveDecl {
            span: token.span.merge(expr.span),
            sense,
            expr,
        })
    }

    fn parse_constraint(&mut self) -> Result<ConstraintDecl, ParseError> {
        let lhs = self.parse_expr()?;
        let op = self.parse_relation()?;
        let rhs = self.parse_expr()?;
        Ok(ConstraintDecl {
            span: lhs.span.merge(rhs.span),
            lhs,
            op,
            rhs,
        })
    }

    fn parse_relation(&mut self) -> Result<ConstraintOp, ParseError> {
        let op = match self.peek_inline() {
            TokenKind::Le => ConstraintOp::Le,
            TokenKind::Ge => ConstraintOp::Ge,
            TokenKind::Eq => ConstraintOp::Eq,
            _ => return Err(self.unexpected("<=, >=, or =")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_bound(&mut self) -> Result<BoundDecl, ParseError> {
        let start = self.current().map(|t| t.span).unwrap_or(Span::new(0, 0));

        let (name, lower, upper) = match self.peek_kind() {
            TokenKind::Ident => {
                let name = self.parse_ident()?;
                match self.peek_inline() {
                    TokenKind::Free => {
                        self.advance();
                        (name, None, None)
                    }
                    TokenKind::Ge => {
                        self.advance();
                        (name, finite_lower(self.parse_signed_number()?), None)
                    }
                    TokenKind::Le => {
                        self.advance();
                        (name, None, finite_upper(self.parse_signed_number()?))
                    }
                    TokenKind::Eq => {
                        self.advance();
                        let value = self.parse_signed_number()?;
                        (name, Some(value), Some(value))
                    }
                    _ => return Err(self.unexpected("free, >=, <=, or =")),
                }
            }
            TokenKind::Number | TokenKind::Minus | TokenKind::Plus | TokenKind::Inf => {
                let lower = finite_lower(self.parse_signed_number()?);
                self.expect_inline(TokenKind::Le)?;
                let name = self.parse_ident()?;
                let upper = if self.peek_inline() == TokenKind::Le {
                    self.advance();
                    finite_upper(self.parse_signed_number()?)
                } else {
                    None
                };
                (name, lower, upper)
            }
            _ => return Err(self.reserved_or_unexpected("variable name or lower bound")),
        };

        Ok(BoundDecl {
            span: Span::new(start.start, self.last_end(start)),
            name,
            lower,
            upper,
        })
    }

    fn parse_ident(&mut self) -> Result<Ident, ParseError> {
        if self.peek_inline().is_keyword() {
            return Err(self.reserved_or_unexpected("Ident"));
        }
        let token = self.expect_inline(TokenKind::Ident)?;
        Ok(Ident {
            span: token.span,
            name: token.text,
        })
    }

    /// A sum of terms on a single line; a line break may only follow an operator
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().map(|t| t.span).unwrap_or(Span::new(0, 0));
        let mut terms = Vec::new();

        loop {
            let sign = match self.peek_inline() {
                TokenKind::Plus => 1.0,
                TokenKind::Minus => -1.0,
                _ if terms.is_empty() => {
                    terms.push(self.parse_term(1.0)?);
                    continue;
                }
                _ => break,
            };
            self.advance();
            self.skip_newlines_and_comments();
            terms.push(self.parse_term(sign)?);
        }

        Ok(Expr {
            span: Span::new(start.start, self.last_end(start)),
            terms,
        })
    }

    fn parse_term(&mut self, sign: f64) -> Result<Term, ParseError> {
        match self.peek_inline() {
            TokenKind::Number => {
                let value = self.parse_number()?;
                if self.peek_inline().is_keyword() {
                    return Err(self.reserved_or_unexpected("variable"));
                }
                if self.peek_inline() == TokenKind::Star {
                    self.advance();
                    let name = self.parse_ident()?;
                    return Ok(Term::Variable {
                        coefficient: sign * value,
                        name,
                    });
                }
                if self.peek_inline() == TokenKind::Ident {
                    let name = self.parse_ident()?;
                    return Ok(Term::Variable {
                        coefficient: sign * value,
                        name,
                    });
                }
                Ok(Term::Constant(sign * value))
            }
            TokenKind::Ident => {
                let name = self.parse_ident()?;
                Ok(Term::Variable {
                    coefficient: sign,
                    name,
                })
            }
            _ => Err(self.reserved_or_unexpected("number or variable")),
        }
    }

    fn parse_signed_number(&mut self) -> Result<f64, ParseError> {
        let sign = match self.peek_inline() {
            TokenKind::Minus => {
                self.advance();
                -1.0
            }
            TokenKind::Plus => {
                self.advance();
                1.0
            }
            _ => 1.0,
        };
        if self.peek_inline() == TokenKind::Inf {
            self.advance();
            return Ok(sign * f64::INFINITY);
        }
        Ok(sign * self.parse_number()?)
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let token = self.expect_inline(TokenKind::Number)?;
        token
            .text
            .parse()
            .map_err(|_| ParseError::InvalidNumber(token.text.clone()))
    }
}

fn finite_lower(value: f64) -> Option<f64> {
    (value != f64::NEG_INFINITY).then_some(value)
}

fn finite_upper(value: f64) -> Option<f64> {
    (value != f64::INFINITY).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(expr: &Expr) -> Vec<(f64, Option<&str>)> {
        expr.terms
            .iter()
            .map(|t| match t {
                Term::Variable { coefficient, name } => (*coefficient, Some(name.name.as_str())),
                Term::Constant(c) => (*c, None),
            })
            .collect()
    }

    #[test]
    fn test_parse_listing() {
        let source = r#"max 30 x + 20 y
subject to
  2 x + 4 y <= 32
bounds
  0 <= x <= 10
  0 <= y <= 6
"#;
        let model = Parser::parse(source).unwrap();
        let objective = model.objective.unwrap();
        assert_eq!(objective.sense, Sense::Maximize);
        assert_eq!(names(&objective.expr), vec![(30.0, Some("x")), (20.0, Some("y"))]);

        assert_eq!(model.constraints.len(), 1);
        let c = &model.constraints[0];
        assert_eq!(c.op, ConstraintOp::Le);
        assert_eq!(names(&c.lhs), vec![(2.0, Some("x")), (4.0, Some("y"))]);
        assert_eq!(names(&c.rhs), vec![(32.0, None)]);

        assert_eq!(model.bounds.len(), 2);
        assert_eq!(model.bounds[0].name.name, "x");
        assert_eq!((model.bounds[0].lower, model.bounds[0].upper), (Some(0.0), Some(10.0)));
        assert!(model.integers.is_empty());
    }

    #[test]
    fn test_signs_and_line_breaks() {
        let source = "min -a + 0.5 b - c - 3\nsubject to\n  a - 2*b >= -1\n  -c <= 4\n";
        let model = Parser::parse(source).unwrap();
        let objective = model.objective.unwrap();
        assert_eq!(
            names(&objective.expr),
            vec![(-1.0, Some("a")), (0.5, Some("b")), (-1.0, Some("c")), (-3.0, None)]
        );
        // the leading minus on the next line starts a new constraint
        assert_eq!(model.constraints.len(), 2);
        assert_eq!(names(&model.constraints[0].rhs), vec![(-1.0, None)]);
        assert_eq!(names(&model.constraints[1].lhs), vec![(-1.0, Some("c"))]);
    }

    #[test]
    fn test_bound_forms() {
        let source = "bounds\n a free\n b >= 1.5\n c <= 4\n d = 2\n -inf <= e <= inf\n 3 <= f\n";
        let model = Parser::parse(source).unwrap();
        assert!(model.objective.is_none());
        let bounds: Vec<_> = model
            .bounds
            .iter()
            .map(|b| (b.name.name.as_str(), b.lower, b.upper))
            .collect();
        assert_eq!(
            bounds,
            vec![
                ("a", None, None),
                ("b", Some(1.5), None),
                ("c", None, Some(4.0)),
                ("d", Some(2.0), Some(2.0)),
                ("e", None, None),
                ("f", Some(3.0), None),
            ]
        );
    }

    #[test]
    fn test_integer_section_and_comments() {
        let source = "# packing\nmax n + m // total\nbounds\n  0 <= n <= 3\n  0 <= m <= 2\ninteger\n  n m\n";
        let model = Parser::parse(source).unwrap();
        let integers: Vec<_> = model.integers.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(integers, vec!["n", "m"]);
    }

    #[test]
    fn test_missing_relation() {
        let err = Parser::parse("min x\nsubject to\n  x 3\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_trailing_garbage() {
        let err = Parser::parse("min x\nbounds\n  x free\nsubject to\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_keyword_as_variable_name() {
        let err = Parser::parse("min 2 max\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::ReservedName {
                name: "max".to_string(),
                span: Span::new(6, 9),
            }
        );

        let err = Parser::parse("min x\nbounds\n  free free\n").unwrap_err();
        assert!(matches!(err, ParseError::ReservedName { ref name, .. } if name == "free"));

        let err = Parser::parse("min x\nbounds\n  0 <= to <= 1\n").unwrap_err();
        assert!(matches!(err, ParseError::ReservedName { ref name, .. } if name == "to"));
    }

    #[test]
    fn test_unexpected_eof() {
        let err = Parser::parse("min x\nsubject to\n  x <=").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof);
    }
}
