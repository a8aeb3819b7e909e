//! Recursive-descent parser for the expression grammar.
//!
//! ```text
//! expression := logic_or
//! logic_or    := logic_and ( "||" logic_and )*
//! logic_and   := logic_not ( "&&" logic_not )*
//! logic_not   := "!" logic_not | equality
//! equality    := comparison ( ("=="|"!="|"in"|"not_in"|"contains"|"matches") comparison )*
//! comparison  := additive ( ("<"|"<="|">"|">=") additive )*
//! additive    := multiplicative ( ("+"|"-") multiplicative )*
//! multiplicative := unary ( ("*"|"/") unary )*
//! unary       := "-" unary | primary
//! primary     := literal | path | call | "(" expression ")"
//! path        := IDENT ( "." IDENT | "[" (NUMBER | "*") "]" )*
//! ```
//!
//! `!` sits between `&&` and the comparison level, so `!a == b` negates
//! the whole comparison rather than just `a`.

use super::ast::{BinaryOp, Expr, UnaryOp, MAX_AST_DEPTH};
use super::token::{Lexer, Token, TokenKind};
use crate::error::ExpressionError;

pub fn parse(src: &str) -> Result<Expr, ExpressionError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    if expr.depth() > MAX_AST_DEPTH {
        return Err(ExpressionError::parser(
            0,
            format!("expression exceeds maximum nesting depth of {MAX_AST_DEPTH}"),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<(), ExpressionError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(ExpressionError::parser(
                self.peek().position,
                format!("unexpected trailing token {:?}", self.peek().kind),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek().kind == TokenKind::Not {
            self.advance();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_not()?)));
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::In => BinaryOp::In,
                TokenKind::NotIn => BinaryOp::NotIn,
                TokenKind::Contains => BinaryOp::Contains,
                TokenKind::Matches => BinaryOp::Matches,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek().kind == TokenKind::Minus {
            self.advance();
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::String(s) => Ok(Expr::String(s)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Null => Ok(Expr::Null),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    let mut path = name;
                    loop {
                        match self.peek().kind {
                            TokenKind::Dot => {
                                self.advance();
                                match self.advance().kind {
                                    TokenKind::Ident(segment) => {
                                        path.push('.');
                                        path.push_str(&segment);
                                    }
                                    other => {
                                        return Err(ExpressionError::parser(
                                            tok.position,
                                            format!("expected identifier after '.', got {other:?}"),
                                        ));
                                    }
                                }
                            }
                            TokenKind::LBracket => {
                                self.advance();
                                match self.advance().kind {
                                    TokenKind::Number(n) if n.fract() == 0.0 && n >= 0.0 => {
                                        path.push_str(&format!("[{}]", n as usize));
                                    }
                                    TokenKind::Star => path.push_str("[*]"),
                                    other => {
                                        return Err(ExpressionError::parser(
                                            tok.position,
                                            format!("expected index or '*' inside '[]', got {other:?}"),
                                        ));
                                    }
                                }
                                self.expect(TokenKind::RBracket)?;
                            }
                            _ => break,
                        }
                    }
                    Ok(Expr::Path(path))
                }
            }
            other => Err(ExpressionError::parser(
                tok.position,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(ExpressionError::parser(
                        self.peek().position,
                        "expected ',' or ')' in call arguments".to_string(),
                    ));
                }
            }
        }
        Ok(args)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExpressionError> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::parser(
                self.peek().position,
                format!("expected {kind:?}, got {:?}", self.peek().kind),
            ))
        }
    }
}
