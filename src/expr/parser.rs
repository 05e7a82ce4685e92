use serde_json::Value;

use crate::error::NodeError;

use super::lexer::{tokenize, Token};

/// Closed syntax tree. The evaluator walks exactly these kinds and
/// nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Access path rooted at the bound `payload` variable.
    Path(Vec<PathSeg>),
    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

/// The single variable an expression may reference.
pub const BOUND_VARIABLE: &str = "payload";

/// Parse an expression source into the restricted AST, failing closed on
/// any construct outside the grammar.
pub fn parse(source: &str) -> Result<Expr, NodeError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(NodeError::UnsafeExpression(
            "trailing tokens after expression".into(),
        ));
    }
    Ok(expr)
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
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn or_expr(&mut self) -> Result<Expr, NodeError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, NodeError> {
        let mut left = self.cmp_expr()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.cmp_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn cmp_expr(&mut self) -> Result<Expr, NodeError> {
        let left = self.operand()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Some(CmpOp::Eq),
            Some(Token::NotEq) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            Some(Token::In) => {
                self.next();
                let right = self.operand()?;
                return Ok(Expr::In {
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.next();
                let right = self.operand()?;
                Ok(Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            None => Ok(left),
        }
    }

    fn operand(&mut self) -> Result<Expr, NodeError> {
        let expr = match self.next() {
            Some(Token::Str(s)) => Expr::Literal(Value::String(s)),
            Some(Token::Int(n)) => Expr::Literal(Value::from(n)),
            Some(Token::Float(n)) => Expr::Literal(Value::from(n)),
            Some(Token::True) => Expr::Literal(Value::Bool(true)),
            Some(Token::False) => Expr::Literal(Value::Bool(false)),
            Some(Token::Null) => Expr::Literal(Value::Null),
            Some(Token::Ident(name)) => {
                if name != BOUND_VARIABLE {
                    return Err(NodeError::UnsafeExpression(format!(
                        "undeclared variable '{name}', only '{BOUND_VARIABLE}' is bound"
                    )));
                }
                Expr::Path(self.path_segments()?)
            }
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => inner,
                    _ => {
                        return Err(NodeError::UnsafeExpression(
                            "unbalanced parentheses".into(),
                        ))
                    }
                }
            }
            Some(other) => {
                return Err(NodeError::UnsafeExpression(format!(
                    "unexpected token {other:?}"
                )))
            }
            None => {
                return Err(NodeError::UnsafeExpression(
                    "unexpected end of expression".into(),
                ))
            }
        };

        // A parenthesis directly after an operand is call syntax.
        if self.peek() == Some(&Token::LParen) {
            return Err(NodeError::UnsafeExpression(
                "function calls are not permitted".into(),
            ));
        }
        Ok(expr)
    }

    fn path_segments(&mut self) -> Result<Vec<PathSeg>, NodeError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(key)) => segments.push(PathSeg::Key(key)),
                        // Keywords double as attribute names after a dot.
                        Some(Token::In) => segments.push(PathSeg::Key("in".into())),
                        Some(Token::And) => segments.push(PathSeg::Key("and".into())),
                        Some(Token::Or) => segments.push(PathSeg::Key("or".into())),
                        _ => {
                            return Err(NodeError::UnsafeExpression(
                                "expected attribute name after '.'".into(),
                            ))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    let seg = match self.next() {
                        Some(Token::Int(n)) if n >= 0 => PathSeg::Index(n as usize),
                        Some(Token::Str(key)) => PathSeg::Key(key),
                        _ => {
                            return Err(NodeError::UnsafeExpression(
                                "index must be a non-negative integer or string literal".into(),
                            ))
                        }
                    };
                    if self.next() != Some(Token::RBracket) {
                        return Err(NodeError::UnsafeExpression("expected ']'".into()));
                    }
                    segments.push(seg);
                }
                _ => break,
            }
        }
        Ok(segments)
    }
}
