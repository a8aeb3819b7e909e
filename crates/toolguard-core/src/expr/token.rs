//! Tokenizer for the boolean expression language.

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    NotIn,
    Contains,
    Matches,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let at_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if at_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position: start,
            });
        };

        let kind = match c {
            b'(' => {
                self.advance();
                TokenKind::LParen
            }
            b')' => {
                self.advance();
                TokenKind::RParen
            }
            b'[' => {
                self.advance();
                TokenKind::LBracket
            }
            b']' => {
                self.advance();
                TokenKind::RBracket
            }
            b',' => {
                self.advance();
                TokenKind::Comma
            }
            b'.' => {
                self.advance();
                TokenKind::Dot
            }
            b'+' => {
                self.advance();
                TokenKind::Plus
            }
            b'-' => {
                self.advance();
                TokenKind::Minus
            }
            b'*' => {
                self.advance();
                TokenKind::Star
            }
            b'/' => {
                self.advance();
                TokenKind::Slash
            }
            b'=' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    return Err(ExpressionError::lexer(start, "unexpected '=', did you mean '=='?"));
                }
            }
            b'!' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            b'<' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                self.advance();
                if self.peek() == Some(b'&') {
                    self.advance();
                    TokenKind::And
                } else {
                    return Err(ExpressionError::lexer(start, "unexpected '&', did you mean '&&'?"));
                }
            }
            b'|' => {
                self.advance();
                if self.peek() == Some(b'|') {
                    self.advance();
                    TokenKind::Or
                } else {
                    return Err(ExpressionError::lexer(start, "unexpected '|', did you mean '||'?"));
                }
            }
            b'"' | b'\'' => self.lex_string(c)?,
            b'0'..=b'9' => self.lex_number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.lex_ident_or_keyword(),
            other => {
                return Err(ExpressionError::lexer(
                    start,
                    format!("unexpected character {:?}", other as char),
                ));
            }
        };

        Ok(Token {
            kind,
            position: start,
        })
    }

    fn lex_string(&mut self, quote: u8) -> Result<TokenKind, ExpressionError> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ExpressionError::lexer(start, "unterminated string literal"));
                }
                Some(c) if c == quote => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'r') => value.push('\r'),
                    Some(b'\\') => value.push('\\'),
                    Some(c) if c == quote => value.push(c as char),
                    Some(other) => value.push(other as char),
                    None => {
                        return Err(ExpressionError::lexer(start, "unterminated escape sequence"));
                    }
                },
                Some(c) => {
                    // Reconstruct multi-byte UTF-8 sequences correctly by
                    // pushing whole characters from the source slice.
                    if c.is_ascii() {
                        value.push(c as char);
                    } else {
                        let char_start = self.pos - 1;
                        let ch = self.src[char_start..].chars().next().unwrap();
                        value.push(ch);
                        self.pos = char_start + ch.len_utf8();
                    }
                }
            }
        }
        Ok(TokenKind::String(value))
    }

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.advance();
                }
            } else {
                self.pos = save;
            }
        }
        let text = &self.src[start..self.pos];
        TokenKind::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let text = &self.src[start..self.pos];
        // Logical operators are symbolic only (`&&`, `||`, `!`), so words
        // like `and` or `not` stay usable as path segments.
        match text {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            "not_in" => TokenKind::NotIn,
            "contains" => TokenKind::Contains,
            "matches" => TokenKind::Matches,
            _ => TokenKind::Ident(text.to_string()),
        }
    }
}
