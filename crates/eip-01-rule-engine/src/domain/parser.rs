//! Recursive-descent parser.
//!
//! ```text
//! expr     := or
//! or       := and (("||" | "or") and)*
//! and      := cmp (("&&" | "and") cmp)*
//! cmp      := sum (cmp_op sum)?
//! sum      := product (("+" | "-") product)*
//! product  := unary (("*" | "/" | "%") unary)*
//! unary    := ("!" | "not" | "-") unary | postfix
//! postfix  := primary ("." ident | "[" (string | integer) "]")*
//! primary  := literal | ident | call | "(" expr ")" | "[" (expr ("," expr)*)? "]"
//! ```
//!
//! A bare identifier followed by member accesses is folded into a single
//! [`Expr::Field`] path.

use serde_json::{Number, Value};
use shared_types::{FieldPath, Segment};

use crate::domain::ast::{BinaryOp, Expr, Function, LogicalOp, UnaryOp};
use crate::domain::lexer::{tokenize, Token, TokenKind};
use crate::error::RuleError;

/// Parse `source` into an expression tree, rejecting nesting beyond `max_depth`.
pub fn parse(source: &str, max_depth: usize) -> Result<Expr, RuleError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(RuleError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        Some(token) => Err(unexpected(token, "end of expression")),
        None => Ok(expr),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

fn unexpected(token: &Token, expected: &str) -> RuleError {
    RuleError::UnexpectedToken {
        found: token.kind.to_string(),
        expected: expected.to_string(),
        pos: token.pos,
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), RuleError> {
        match self.peek() {
            Some(token) if &token.kind == kind => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(unexpected(token, expected)),
            None => Err(RuleError::UnexpectedEnd {
                expected: expected.to_string(),
            }),
        }
    }

    fn enter(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(RuleError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Pop the levels taken by a left-associative chain.
    fn unwind(&mut self, links: usize) {
        self.depth -= links;
    }

    fn expr(&mut self) -> Result<Expr, RuleError> {
        self.enter()?;
        let expr = self.or();
        self.leave();
        expr
    }

    fn or(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.and()?;
        let mut links = 0;
        while self.eat(&TokenKind::Or) {
            self.enter()?;
            links += 1;
            let rhs = self.and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unwind(links);
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.comparison()?;
        let mut links = 0;
        while self.eat(&TokenKind::And) {
            self.enter()?;
            links += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unwind(links);
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, RuleError> {
        let lhs = self.sum()?;
        let op = match self.peek_kind() {
            Some(TokenKind::EqEq | TokenKind::EqEqEq) => BinaryOp::Eq,
            Some(TokenKind::NotEq | TokenKind::NotEqEq) => BinaryOp::Ne,
            Some(TokenKind::Lt) => BinaryOp::Lt,
            Some(TokenKind::Le) => BinaryOp::Le,
            Some(TokenKind::Gt) => BinaryOp::Gt,
            Some(TokenKind::Ge) => BinaryOp::Ge,
            Some(TokenKind::In) => BinaryOp::In,
            Some(TokenKind::Contains) => BinaryOp::Contains,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn sum(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.product()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => {
                    self.unwind(links);
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn product(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => {
                    self.unwind(links);
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Not) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary();
        self.leave();
        let operand = operand?;

        // Fold negative numeric literals.
        if op == UnaryOp::Neg {
            if let Expr::Literal(Value::Number(n)) = &operand {
                if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
                    return Ok(Expr::Literal(Value::from(i)));
                }
                if let Some(f) = n.as_f64().and_then(|f| Number::from_f64(-f)) {
                    return Ok(Expr::Literal(Value::Number(f)));
                }
            }
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, RuleError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            let segment = match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token {
                            kind: TokenKind::Ident(name),
                            ..
                        }) => Segment::Key(name),
                        Some(token) => return Err(unexpected(&token, "field name after '.'")),
                        None => {
                            return Err(RuleError::UnexpectedEnd {
                                expected: "field name after '.'".to_string(),
                            })
                        }
                    }
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    let segment = match self.advance() {
                        Some(Token {
                            kind: TokenKind::Str(key),
                            ..
                        }) => Segment::Key(key),
                        Some(Token {
                            kind: TokenKind::Integer(index),
                            pos,
                        }) => match usize::try_from(index) {
                            Ok(index) => Segment::Index(index),
                            Err(_) => {
                                return Err(RuleError::InvalidNumber {
                                    text: index.to_string(),
                                    pos,
                                })
                            }
                        },
                        Some(token) => {
                            return Err(unexpected(&token, "string key or integer index"))
                        }
                        None => {
                            return Err(RuleError::UnexpectedEnd {
                                expected: "string key or integer index".to_string(),
                            })
                        }
                    };
                    self.expect(&TokenKind::RBracket, "']'")?;
                    segment
                }
                _ => {
                    self.unwind(links);
                    return Ok(expr);
                }
            };

            expr = match expr {
                Expr::Field(path) => {
                    let mut segments = path.segments().to_vec();
                    segments.push(segment);
                    // Non-empty by construction.
                    match FieldPath::from_segments(segments) {
                        Some(path) => Expr::Field(path),
                        None => return Err(RuleError::Empty),
                    }
                }
                other => {
                    self.enter()?;
                    links += 1;
                    Expr::Member {
                        target: Box::new(other),
                        segment,
                    }
                }
            };
        }
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        let Some(token) = self.advance() else {
            return Err(RuleError::UnexpectedEnd {
                expected: "a value".to_string(),
            });
        };

        match token.kind {
            TokenKind::Integer(i) => Ok(Expr::Literal(Value::from(i))),
            TokenKind::Number(f) => Ok(Expr::Literal(
                Number::from_f64(f).map_or(Value::Null, Value::Number),
            )),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Ident(name) => {
                if self.peek_kind() == Some(&TokenKind::LParen) {
                    let function = Function::from_name(&name)
                        .ok_or_else(|| RuleError::UnknownFunction(name.clone()))?;
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Ok(Expr::Call {
                        function,
                        arg: Box::new(arg),
                    });
                }
                match FieldPath::from_segments(vec![Segment::Key(name)]) {
                    Some(path) => Ok(Expr::Field(path)),
                    None => Err(RuleError::Empty),
                }
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.enter()?;
                let items = self.array_items();
                self.leave();
                Ok(Expr::Array(items?))
            }
            _ => Err(unexpected(&token, "a value")),
        }
    }

    fn array_items(&mut self) -> Result<Vec<Expr>, RuleError> {
        let mut items = Vec::new();
        if self.eat(&TokenKind::RBracket) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RBracket, "',' or ']'")?;
            return Ok(items);
        }
    }
}
