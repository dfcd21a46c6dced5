//! Tokenizer for condition expressions.

use std::fmt;

use crate::error::RuleError;

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Integer(i64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Contains,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Number(n) => return write!(f, "number {n}"),
            TokenKind::Integer(n) => return write!(f, "number {n}"),
            TokenKind::Str(s) => return write!(f, "string {s:?}"),
            TokenKind::Ident(name) => return write!(f, "identifier '{name}'"),
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::And => "'&&'",
            TokenKind::Or => "'||'",
            TokenKind::Not => "'!'",
            TokenKind::In => "'in'",
            TokenKind::Contains => "'contains'",
            TokenKind::EqEq => "'=='",
            TokenKind::EqEqEq => "'==='",
            TokenKind::NotEq => "'!='",
            TokenKind::NotEqEq => "'!=='",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
        };
        f.write_str(text)
    }
}

/// A token and its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// Split `source` into tokens.
///
/// A word directly after `.` is always an identifier, so keys such as
/// `data.in` or `data.null` stay addressable.
pub fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let after_dot = matches!(tokens.last(), Some(Token { kind: TokenKind::Dot, .. }));
        let peek = chars.get(i + 1).map(|&(_, c)| c);
        let peek2 = chars.get(i + 2).map(|&(_, c)| c);

        let (kind, width) = match ch {
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '=' => match (peek, peek2) {
                (Some('='), Some('=')) => (TokenKind::EqEqEq, 3),
                (Some('='), _) => (TokenKind::EqEq, 2),
                _ => return Err(RuleError::UnexpectedChar { ch, pos }),
            },
            '!' => match (peek, peek2) {
                (Some('='), Some('=')) => (TokenKind::NotEqEq, 3),
                (Some('='), _) => (TokenKind::NotEq, 2),
                _ => (TokenKind::Not, 1),
            },
            '<' if peek == Some('=') => (TokenKind::Le, 2),
            '<' => (TokenKind::Lt, 1),
            '>' if peek == Some('=') => (TokenKind::Ge, 2),
            '>' => (TokenKind::Gt, 1),
            '&' if peek == Some('&') => (TokenKind::And, 2),
            '|' if peek == Some('|') => (TokenKind::Or, 2),
            '"' | '\'' => {
                let (text, consumed) = lex_string(&chars[i..], pos)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    pos,
                });
                i += consumed;
                continue;
            }
            c if c.is_ascii_digit() => {
                let (kind, consumed) = lex_number(&chars[i..], pos)?;
                tokens.push(Token { kind, pos });
                i += consumed;
                continue;
            }
            c if is_ident_start(c) => {
                let consumed = chars[i..]
                    .iter()
                    .take_while(|&&(_, c)| is_ident_continue(c))
                    .count();
                let word: String = chars[i..i + consumed].iter().map(|&(_, c)| c).collect();
                let kind = if after_dot {
                    TokenKind::Ident(word)
                } else {
                    keyword(&word).unwrap_or(TokenKind::Ident(word))
                };
                tokens.push(Token { kind, pos });
                i += consumed;
                continue;
            }
            _ => return Err(RuleError::UnexpectedChar { ch, pos }),
        };
        tokens.push(Token { kind, pos });
        i += width;
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "contains" => TokenKind::Contains,
        _ => return None,
    })
}

/// Lex a quoted string starting at `chars[0]`; returns the text and the
/// number of chars consumed including both quotes.
fn lex_string(chars: &[(usize, char)], pos: usize) -> Result<(String, usize), RuleError> {
    let quote = chars[0].1;
    let mut text = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i].1 {
            c if c == quote => return Ok((text, i + 1)),
            '\\' => {
                let Some(&(_, escaped)) = chars.get(i + 1) else {
                    break;
                };
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(RuleError::UnterminatedString { pos })
}

/// Lex a number: digits, optional fraction, optional exponent.
fn lex_number(chars: &[(usize, char)], pos: usize) -> Result<(TokenKind, usize), RuleError> {
    let digit_run = |from: usize| {
        chars[from..]
            .iter()
            .take_while(|&&(_, c)| c.is_ascii_digit())
            .count()
    };

    let mut len = digit_run(0);
    let mut is_float = false;

    // A fraction needs a digit after the dot, otherwise the dot is a member access.
    if chars.get(len).map(|&(_, c)| c) == Some('.')
        && chars.get(len + 1).is_some_and(|&(_, c)| c.is_ascii_digit())
    {
        is_float = true;
        len += 1 + digit_run(len + 1);
    }

    if matches!(chars.get(len).map(|&(_, c)| c), Some('e' | 'E')) {
        let mut exp = len + 1;
        if matches!(chars.get(exp).map(|&(_, c)| c), Some('+' | '-')) {
            exp += 1;
        }
        let exp_digits = digit_run(exp.min(chars.len()));
        if exp_digits > 0 {
            is_float = true;
            len = exp + exp_digits;
        }
    }

    let text: String = chars[..len].iter().map(|&(_, c)| c).collect();
    let invalid = || RuleError::InvalidNumber {
        text: text.clone(),
        pos,
    };

    let kind = if is_float {
        let value: f64 = text.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        TokenKind::Number(value)
    } else {
        match text.parse::<i64>() {
            Ok(value) => TokenKind::Integer(value),
            Err(_) => {
                let value: f64 = text.parse().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(invalid());
                }
                TokenKind::Number(value)
            }
        }
    };
    Ok((kind, len))
}
