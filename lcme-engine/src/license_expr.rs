//! SPDX license expression grammar
//!
//! ```text
//! or_expr   := and_expr ("OR" and_expr)*
//! and_expr  := with_expr ("AND" with_expr)*
//! with_expr := primary ("WITH" exception)?
//! primary   := license-id ["+"] | "(" or_expr ")"
//! ```
//!
//! Operators are case-insensitive. Identifiers are checked for shape only
//! (`[A-Za-z0-9.-]+`, optional trailing `+`, `LicenseRef-*`,
//! `DocumentRef-*:LicenseRef-*`); they are not checked against the SPDX
//! license list.

use std::fmt;
use thiserror::Error;

/// Parse failure with the byte offset it was detected at
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid license expression at offset {offset}: {message}")]
pub struct ExprError {
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpr {
    License { id: String, or_later: bool },
    With { license: Box<LicenseExpr>, exception: String },
    And(Vec<LicenseExpr>),
    Or(Vec<LicenseExpr>),
}

impl LicenseExpr {
    fn precedence(&self) -> u8 {
        match self {
            LicenseExpr::Or(_) => 0,
            LicenseExpr::And(_) => 1,
            LicenseExpr::With { .. } | LicenseExpr::License { .. } => 2,
        }
    }

    fn fmt_term(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "(")?;
            fmt::Display::fmt(self, f)?;
            write!(f, ")")
        } else {
            fmt::Display::fmt(self, f)
        }
    }
}

/// Canonical spelling: operators uppercase, single spaces, minimal parens
impl fmt::Display for LicenseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseExpr::License { id, or_later } => {
                write!(f, "{}{}", id, if *or_later { "+" } else { "" })
            }
            LicenseExpr::With { license, exception } => write!(f, "{} WITH {}", license, exception),
            LicenseExpr::And(terms) | LicenseExpr::Or(terms) => {
                let (op, prec) = match self {
                    LicenseExpr::And(_) => (" AND ", 1),
                    _ => (" OR ", 0),
                };
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    term.fmt_term(f, prec + 1)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind<'a> {
    Ident(&'a str),
    And,
    Or,
    With,
    Open,
    Close,
    Eof,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind<'a>,
    offset: usize,
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    idx: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            idx: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token<'a>>, ExprError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            out.push(token);
            if is_eof {
                return Ok(out);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, ExprError> {
        while self.idx < self.bytes.len() && self.bytes[self.idx].is_ascii_whitespace() {
            self.idx += 1;
        }
        let offset = self.idx;
        let Some(&b) = self.bytes.get(self.idx) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match b {
            b'(' => {
                self.idx += 1;
                TokenKind::Open
            }
            b')' => {
                self.idx += 1;
                TokenKind::Close
            }
            b if is_ident_byte(b) => {
                while self.idx < self.bytes.len() && is_ident_byte(self.bytes[self.idx]) {
                    self.idx += 1;
                }
                let text = &self.input[offset..self.idx];
                if text.eq_ignore_ascii_case("AND") {
                    TokenKind::And
                } else if text.eq_ignore_ascii_case("OR") {
                    TokenKind::Or
                } else if text.eq_ignore_ascii_case("WITH") {
                    TokenKind::With
                } else {
                    TokenKind::Ident(text)
                }
            }
            _ => {
                let c = self.input[offset..].chars().next().unwrap_or('?');
                return Err(ExprError::new(offset, format!("unexpected character '{}'", c)));
            }
        };
        Ok(Token { kind, offset })
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'+' | b':')
}

/// Parenthesis nesting accepted before parsing gives up
pub const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token<'a> {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token<'a> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<LicenseExpr, ExprError> {
        let mut terms = vec![self.and_expr()?];
        while self.peek().kind == TokenKind::Or {
            self.bump();
            terms.push(self.and_expr()?);
        }
        Ok(flatten(terms, Op::Or))
    }

    fn and_expr(&mut self) -> Result<LicenseExpr, ExprError> {
        let mut terms = vec![self.with_expr()?];
        while self.peek().kind == TokenKind::And {
            self.bump();
            terms.push(self.with_expr()?);
        }
        Ok(flatten(terms, Op::And))
    }

    fn with_expr(&mut self) -> Result<LicenseExpr, ExprError> {
        let primary = self.primary()?;
        if self.peek().kind != TokenKind::With {
            return Ok(primary);
        }
        self.bump();
        if !matches!(primary, LicenseExpr::License { .. }) {
            return Err(ExprError::new(
                self.peek().offset,
                "WITH must follow a single license identifier",
            ));
        }
        let token = self.bump();
        match token.kind {
            TokenKind::Ident(text) if is_valid_exception_id(text) => Ok(LicenseExpr::With {
                license: Box::new(primary),
                exception: text.to_string(),
            }),
            _ => Err(ExprError::new(token.offset, "expected exception identifier after WITH")),
        }
    }

    fn primary(&mut self) -> Result<LicenseExpr, ExprError> {
        let token = self.bump();
        match token.kind {
            TokenKind::Open => {
                if self.depth == MAX_NESTING {
                    return Err(ExprError::new(
                        token.offset,
                        format!("parentheses nested deeper than {}", MAX_NESTING),
                    ));
                }
                self.depth += 1;
                let inner = self.or_expr()?;
                self.depth -= 1;
                let close = self.bump();
                if close.kind != TokenKind::Close {
                    return Err(ExprError::new(close.offset, "expected ')'"));
                }
                Ok(inner)
            }
            TokenKind::Ident(text) => license_term(text, token.offset),
            TokenKind::Eof => Err(ExprError::new(token.offset, "unexpected end of expression")),
            _ => Err(ExprError::new(token.offset, "expected license identifier or '('")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

/// Merge nested same-operator nodes so `A AND (B AND C)` equals `A AND B AND C`
fn flatten(mut terms: Vec<LicenseExpr>, op: Op) -> LicenseExpr {
    if terms.len() == 1 {
        if let Some(only) = terms.pop() {
            return only;
        }
    }
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        match (op, term) {
            (Op::And, LicenseExpr::And(inner)) | (Op::Or, LicenseExpr::Or(inner)) => {
                flat.extend(inner)
            }
            (_, other) => flat.push(other),
        }
    }
    match op {
        Op::And => LicenseExpr::And(flat),
        Op::Or => LicenseExpr::Or(flat),
    }
}

fn license_term(text: &str, offset: usize) -> Result<LicenseExpr, ExprError> {
    let (id, or_later) = match text.strip_suffix('+') {
        Some(stripped) => (stripped, true),
        None => (text, false),
    };
    if !is_valid_license_id(id) {
        return Err(ExprError::new(offset, format!("'{}' is not a license identifier", text)));
    }
    Ok(LicenseExpr::License {
        id: id.to_string(),
        or_later,
    })
}

fn is_simple_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

fn is_valid_license_id(id: &str) -> bool {
    match id.split_once(':') {
        Some((document, license)) => {
            document.starts_with("DocumentRef-")
                && is_simple_id(document)
                && license.starts_with("LicenseRef-")
                && is_simple_id(license)
        }
        None => is_simple_id(id),
    }
}

fn is_valid_exception_id(id: &str) -> bool {
    is_simple_id(id)
}

/// Parse an SPDX license expression
pub fn parse(input: &str) -> Result<LicenseExpr, ExprError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ExprError::new(trailing.offset, "unexpected trailing input"));
    }
    Ok(expr)
}

pub fn is_valid(input: &str) -> bool {
    parse(input).is_ok()
}

/// Canonical spelling of a valid expression, `None` if it does not parse
pub fn canonicalize(input: &str) -> Option<String> {
    parse(input).ok().map(|expr| expr.to_string())
}
