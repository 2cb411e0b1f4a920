//! Splits template source into text runs and tokenized actions.
//!
//! Trim markers (`{{- ` and ` -}}`) are applied here so the parser only
//! ever sees already-trimmed text.

use crate::template::parse::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    Text(String),
    Action { tokens: Vec<Token>, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Whitespace precedes the token. `$x.A` is one operand, `$x .A` two.
    pub spaced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Field(String),
    Variable(String),
    Dot,
    Str(String),
    Number(String),
    Pipe,
    LParen,
    RParen,
    Declare,
    Assign,
    Comma,
}

pub(crate) fn lex(text: &str, left: &str, right: &str) -> Result<Vec<Item>, ParseError> {
    if left.is_empty() || right.is_empty() {
        return Err(ParseError::EmptyDelimiter);
    }

    let mut items = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while let Some(offset) = text[pos..].find(left) {
        let start = pos + offset;
        let mut after = start + left.len();
        let mut segment = &text[pos..start];
        line += segment.matches('\n').count();

        if has_trim_marker(&text[after..]) {
            segment = segment.trim_end();
            after += 1;
        }
        if !segment.is_empty() {
            items.push(Item::Text(segment.to_string()));
        }

        let body = text[after..].trim_start();
        let (end, trim_right) = if body.starts_with("/*") {
            let comment_start = text.len() - body.len();
            lex_comment(text, comment_start, right, line)?
        } else {
            let (tokens, end, trim_right) = lex_action(text, after, right, line)?;
            items.push(Item::Action { tokens, line });
            (end, trim_right)
        };

        line += text[start..end].matches('\n').count();
        pos = end;
        if trim_right {
            let rest = &text[pos..];
            let trimmed = rest.trim_start();
            line += rest[..rest.len() - trimmed.len()].matches('\n').count();
            pos += rest.len() - trimmed.len();
        }
    }

    if pos < text.len() {
        items.push(Item::Text(text[pos..].to_string()));
    }
    Ok(items)
}

fn has_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

// Returns the byte offset just past the closing delimiter.
fn lex_comment(
    text: &str,
    start: usize,
    right: &str,
    line: usize,
) -> Result<(usize, bool), ParseError> {
    let close = text[start..]
        .find("*/")
        .ok_or(ParseError::UnclosedComment { line })?;
    let after = start + close + 2;
    let rest = &text[after..];
    let trimmed = rest.trim_start();
    if let Some(tail) = trimmed.strip_prefix('-') {
        if trimmed.len() < rest.len() {
            if let Some(stripped) = tail.strip_prefix(right) {
                return Ok((text.len() - stripped.len(), true));
            }
        }
    }
    if let Some(stripped) = trimmed.strip_prefix(right) {
        return Ok((text.len() - stripped.len(), false));
    }
    Err(ParseError::UnclosedComment { line })
}

fn lex_action(
    text: &str,
    start: usize,
    right: &str,
    line: usize,
) -> Result<(Vec<Token>, usize, bool), ParseError> {
    let mut tokens = Vec::new();
    let mut i = start;
    let mut spaced = true;

    loop {
        let rest = &text[i..];
        if rest.is_empty() {
            return Err(ParseError::UnclosedAction { line });
        }
        if rest.starts_with(right) {
            return Ok((tokens, i + right.len(), false));
        }

        let c = match rest.chars().next() {
            Some(c) => c,
            None => return Err(ParseError::UnclosedAction { line }),
        };

        if c.is_whitespace() {
            let trimmed = rest.trim_start();
            i += rest.len() - trimmed.len();
            if let Some(tail) = trimmed.strip_prefix('-') {
                if tail.starts_with(right) {
                    return Ok((tokens, i + 1 + right.len(), true));
                }
            }
            spaced = true;
            continue;
        }

        let (kind, len) = match c {
            '|' => (TokenKind::Pipe, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            ',' => (TokenKind::Comma, 1),
            '=' => (TokenKind::Assign, 1),
            ':' if rest.starts_with(":=") => (TokenKind::Declare, 2),
            '"' => lex_quoted(rest, line)?,
            '`' => {
                let close = rest[1..]
                    .find('`')
                    .ok_or(ParseError::UnterminatedString { line })?;
                (TokenKind::Str(rest[1..1 + close].to_string()), close + 2)
            }
            '$' => {
                let len = 1 + ident_len(&rest[1..]);
                (TokenKind::Variable(rest[..len].to_string()), len)
            }
            '.' => {
                let name_len = ident_len(&rest[1..]);
                if name_len > 0 {
                    (TokenKind::Field(rest[1..1 + name_len].to_string()), 1 + name_len)
                } else if rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
                    let len = number_len(rest);
                    (TokenKind::Number(rest[..len].to_string()), len)
                } else {
                    (TokenKind::Dot, 1)
                }
            }
            '-' | '+' if rest[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                let len = 1 + number_len(&rest[1..]);
                (TokenKind::Number(rest[..len].to_string()), len)
            }
            c if c.is_ascii_digit() => {
                let len = number_len(rest);
                (TokenKind::Number(rest[..len].to_string()), len)
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = ident_len(rest);
                (TokenKind::Ident(rest[..len].to_string()), len)
            }
            other => {
                return Err(ParseError::Syntax {
                    line,
                    message: format!("unexpected {:?} in action", other),
                })
            }
        };

        tokens.push(Token { kind, spaced });
        spaced = false;
        i += len;
    }
}

fn lex_quoted(rest: &str, line: usize) -> Result<(TokenKind, usize), ParseError> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((TokenKind::Str(out), idx + 1)),
            '\n' => break,
            '\\' => {
                let (_, escaped) = chars.next().ok_or(ParseError::UnterminatedString { line })?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    Err(ParseError::UnterminatedString { line })
}

fn ident_len(s: &str) -> usize {
    s.char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn number_len(s: &str) -> usize {
    let mut prev = '\0';
    s.char_indices()
        .find(|&(_, c)| {
            let keep = c.is_ascii_alphanumeric()
                || c == '.'
                || c == '_'
                || ((c == '+' || c == '-') && matches!(prev, 'e' | 'E'));
            prev = c;
            !keep
        })
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
