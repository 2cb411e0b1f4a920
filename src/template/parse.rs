//! Template parser: token stream → node tree.
//!
//! # Responsibilities
//! - Build the node tree for text, actions and control structures
//! - Collect `define`/`block` sub-templates
//! - Resolve function names to callables at compile time
//! - Reject undefined variables and misplaced keywords
//!
//! # Design Decisions
//! - Every name a template refers to statically is checked here, so typos
//!   surface while the registry is being configured
//! - Sub-template names are resolved at render time (files may define them
//!   in any order)

use serde_json::Number;
use thiserror::Error;

use crate::template::funcs::{Func, FuncMap};
use crate::template::lexer::{lex, Item, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unclosed action")]
    UnclosedAction { line: usize },

    #[error("line {line}: unclosed comment")]
    UnclosedComment { line: usize },

    #[error("line {line}: unterminated quoted string")]
    UnterminatedString { line: usize },

    #[error("line {line}: function {name:?} not defined")]
    UndefinedFunction { line: usize, name: String },

    #[error("line {line}: undefined variable {name:?}")]
    UndefinedVariable { line: usize, name: String },

    #[error("template delimiters must not be empty")]
    EmptyDelimiter,

    #[error("unexpected EOF, missing end")]
    UnexpectedEof,

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If(Branch),
    Range(Branch),
    With(Branch),
    Template { name: String, pipe: Option<Pipeline> },
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub pipe: Pipeline,
    pub list: Vec<Node>,
    pub else_list: Option<Vec<Node>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Pipeline {
    pub decl: Vec<String>,
    pub is_assign: bool,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone)]
pub(crate) struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone)]
pub(crate) enum Arg {
    Dot,
    Nil,
    Bool(bool),
    Number(Number),
    Str(String),
    /// `.A.B` evaluated against dot.
    Field(Vec<String>),
    /// `$x.A.B`.
    Variable { name: String, fields: Vec<String> },
    /// `(pipeline).A`.
    Pipe { pipe: Box<Pipeline>, fields: Vec<String> },
    Func { name: String, func: Func },
}

impl Arg {
    pub fn describe(&self) -> String {
        match self {
            Arg::Dot => ".".into(),
            Arg::Nil => "nil".into(),
            Arg::Bool(b) => b.to_string(),
            Arg::Number(n) => n.to_string(),
            Arg::Str(s) => format!("{:?}", s),
            Arg::Field(f) => format!(".{}", f.join(".")),
            Arg::Variable { name, fields } if fields.is_empty() => name.clone(),
            Arg::Variable { name, fields } => format!("{}.{}", name, fields.join(".")),
            Arg::Pipe { .. } => "(pipeline)".into(),
            Arg::Func { name, .. } => name.clone(),
        }
    }
}

/// Output of parsing one source text.
#[derive(Debug, Default)]
pub(crate) struct Parsed {
    pub main: Vec<Node>,
    pub defines: Vec<(String, Vec<Node>)>,
}

pub(crate) fn parse(
    text: &str,
    left: &str,
    right: &str,
    funcs: &FuncMap,
) -> Result<Parsed, ParseError> {
    let items = lex(text, left, right)?;
    let mut parser = Parser {
        items,
        pos: 0,
        funcs,
        defines: Vec::new(),
        vars: vec!["$".to_string()],
        range_depth: 0,
        top_level: true,
    };

    let (main, end) = parser.parse_list()?;
    match end {
        End::Eof => Ok(Parsed {
            main,
            defines: parser.defines,
        }),
        End::End(line) => Err(ParseError::Syntax {
            line,
            message: "unexpected end".into(),
        }),
        End::Else { line, .. } => Err(ParseError::Syntax {
            line,
            message: "unexpected else".into(),
        }),
    }
}

enum End {
    Eof,
    End(usize),
    Else { line: usize, rest: Vec<Token> },
}

struct Parser<'a> {
    items: Vec<Item>,
    pos: usize,
    funcs: &'a FuncMap,
    defines: Vec<(String, Vec<Node>)>,
    vars: Vec<String>,
    range_depth: usize,
    top_level: bool,
}

impl Parser<'_> {
    fn parse_list(&mut self) -> Result<(Vec<Node>, End), ParseError> {
        let mut nodes = Vec::new();

        while self.pos < self.items.len() {
            let item = self.items[self.pos].clone();
            self.pos += 1;

            let (tokens, line) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { tokens, line } => (tokens, line),
            };

            let keyword = match tokens.first().map(|t| &t.kind) {
                Some(TokenKind::Ident(word)) => word.as_str(),
                Some(_) => "",
                None => {
                    return Err(syntax(line, "missing value for command"));
                }
            };

            match keyword {
                "end" => {
                    expect_empty(&tokens[1..], line, "end")?;
                    return Ok((nodes, End::End(line)));
                }
                "else" => {
                    return Ok((
                        nodes,
                        End::Else {
                            line,
                            rest: tokens[1..].to_vec(),
                        },
                    ));
                }
                "if" | "range" | "with" => {
                    let node = self.parse_control(keyword, &tokens[1..], line)?;
                    nodes.push(node);
                }
                "define" => self.parse_define(&tokens[1..], line)?,
                "template" => nodes.push(self.parse_template(&tokens[1..], line)?),
                "block" => nodes.push(self.parse_block(&tokens[1..], line)?),
                "break" | "continue" => {
                    if self.range_depth == 0 {
                        return Err(syntax(line, format!("{} outside range", keyword)));
                    }
                    expect_empty(&tokens[1..], line, keyword)?;
                    nodes.push(if keyword == "break" {
                        Node::Break
                    } else {
                        Node::Continue
                    });
                }
                _ => nodes.push(Node::Action(self.parse_pipeline(&tokens, line, true)?)),
            }
        }

        Ok((nodes, End::Eof))
    }

    fn parse_control(&mut self, keyword: &str, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let mark = self.vars.len();
        let pipe = self.parse_pipeline(tokens, line, true)?;
        if pipe.cmds.is_empty() {
            return Err(syntax(line, format!("missing value for {}", keyword)));
        }
        if pipe.decl.len() > 1 && keyword != "range" {
            return Err(syntax(line, "too many declarations"));
        }

        if keyword == "range" {
            self.range_depth += 1;
        }
        let body = self.parse_list();
        if keyword == "range" {
            self.range_depth -= 1;
        }
        let (list, end) = body?;

        let else_list = match end {
            End::Eof => return Err(ParseError::UnexpectedEof),
            End::End(_) => None,
            End::Else { rest, .. } if rest.is_empty() => {
                let (list, end) = self.parse_list()?;
                match end {
                    End::End(_) => Some(list),
                    End::Eof => return Err(ParseError::UnexpectedEof),
                    End::Else { line, .. } => return Err(syntax(line, "expected end, found else")),
                }
            }
            End::Else { line, rest } => match rest.first().map(|t| &t.kind) {
                Some(TokenKind::Ident(word)) if word == keyword && keyword != "range" => {
                    Some(vec![self.parse_control(keyword, &rest[1..], line)?])
                }
                _ => return Err(syntax(line, format!("unexpected tokens after else in {}", keyword))),
            },
        };

        self.vars.truncate(mark);
        let branch = Branch {
            pipe,
            list,
            else_list,
        };
        Ok(match keyword {
            "if" => Node::If(branch),
            "range" => Node::Range(branch),
            _ => Node::With(branch),
        })
    }

    fn parse_define(&mut self, tokens: &[Token], line: usize) -> Result<(), ParseError> {
        if !self.top_level {
            return Err(syntax(line, "define must be at top level"));
        }
        let name = match tokens {
            [Token {
                kind: TokenKind::Str(name),
                ..
            }] => name.clone(),
            _ => return Err(syntax(line, "define expects a quoted template name")),
        };

        let body = self.parse_sub_template()?;
        self.defines.push((name, body));
        Ok(())
    }

    fn parse_template(&mut self, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let (name, rest) = template_name(tokens, line, "template")?;
        let pipe = if rest.is_empty() {
            None
        } else {
            Some(self.parse_pipeline(rest, line, false)?)
        };
        Ok(Node::Template { name, pipe })
    }

    fn parse_block(&mut self, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let (name, rest) = template_name(tokens, line, "block")?;
        if rest.is_empty() {
            return Err(syntax(line, "block expects a pipeline"));
        }
        let pipe = self.parse_pipeline(rest, line, false)?;
        let body = self.parse_sub_template()?;
        self.defines.push((name.clone(), body));
        Ok(Node::Template {
            name,
            pipe: Some(pipe),
        })
    }

    // Body of a define/block: fresh variable scope, must close with end.
    fn parse_sub_template(&mut self) -> Result<Vec<Node>, ParseError> {
        let vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let range_depth = std::mem::replace(&mut self.range_depth, 0);
        let top_level = std::mem::replace(&mut self.top_level, false);

        let result = self.parse_list();

        self.vars = vars;
        self.range_depth = range_depth;
        self.top_level = top_level;

        match result? {
            (body, End::End(_)) => Ok(body),
            (_, End::Eof) => Err(ParseError::UnexpectedEof),
            (_, End::Else { line, .. }) => Err(syntax(line, "unexpected else")),
        }
    }

    fn parse_pipeline(&mut self, tokens: &[Token], line: usize, allow_decl: bool) -> Result<Pipeline, ParseError> {
        let mut pipe = Pipeline::default();
        let mut rest = tokens;

        if allow_decl {
            if let Some((decl, is_assign, tail)) = split_decl(tokens) {
                if is_assign {
                    for name in &decl {
                        self.check_var(name, line)?;
                    }
                }
                pipe.decl = decl;
                pipe.is_assign = is_assign;
                rest = tail;
            }
        }

        for segment in split_pipes(rest) {
            if segment.is_empty() {
                return Err(syntax(line, "missing command in pipeline"));
            }
            pipe.cmds.push(self.parse_command(segment, line)?);
        }

        if !pipe.decl.is_empty() && pipe.cmds.is_empty() {
            return Err(syntax(line, "missing value for declaration"));
        }
        if !pipe.is_assign {
            self.vars.extend(pipe.decl.iter().cloned());
        }
        Ok(pipe)
    }

    fn parse_command(&mut self, tokens: &[Token], line: usize) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let (arg, used) = self.parse_operand(&tokens[i..], line)?;
            args.push(arg);
            i += used;
        }
        Ok(Command { args })
    }

    fn parse_operand(&mut self, tokens: &[Token], line: usize) -> Result<(Arg, usize), ParseError> {
        let first = &tokens[0];
        let (arg, mut used) = match &first.kind {
            TokenKind::Dot => (Arg::Dot, 1),
            TokenKind::Field(name) => (Arg::Field(vec![name.clone()]), 1),
            TokenKind::Variable(name) => {
                self.check_var(name, line)?;
                (
                    Arg::Variable {
                        name: name.clone(),
                        fields: Vec::new(),
                    },
                    1,
                )
            }
            TokenKind::Str(s) => (Arg::Str(s.clone()), 1),
            TokenKind::Number(text) => (Arg::Number(parse_number(text, line)?), 1),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => (Arg::Bool(true), 1),
                "false" => (Arg::Bool(false), 1),
                "nil" => (Arg::Nil, 1),
                name => (
                    Arg::Func {
                        name: name.to_string(),
                        func: self.lookup_func(name, line)?,
                    },
                    1,
                ),
            },
            TokenKind::LParen => {
                let close = matching_paren(tokens).ok_or_else(|| syntax(line, "unclosed left paren"))?;
                let pipe = self.parse_pipeline(&tokens[1..close], line, false)?;
                if pipe.cmds.is_empty() {
                    return Err(syntax(line, "missing pipeline in parentheses"));
                }
                (
                    Arg::Pipe {
                        pipe: Box::new(pipe),
                        fields: Vec::new(),
                    },
                    close + 1,
                )
            }
            other => return Err(syntax(line, format!("unexpected {:?} in operand", other))),
        };

        // Field chain glued to the operand without whitespace.
        let mut chain = Vec::new();
        while let Some(Token {
            kind: TokenKind::Field(name),
            spaced: false,
        }) = tokens.get(used)
        {
            chain.push(name.clone());
            used += 1;
        }

        let arg = match arg {
            _ if chain.is_empty() => arg,
            Arg::Field(mut fields) => {
                fields.extend(chain);
                Arg::Field(fields)
            }
            Arg::Variable { name, .. } => Arg::Variable { name, fields: chain },
            Arg::Pipe { pipe, .. } => Arg::Pipe { pipe, fields: chain },
            other => {
                return Err(syntax(
                    line,
                    format!("unexpected field after {}", other.describe()),
                ))
            }
        };
        Ok((arg, used))
    }

    fn lookup_func(&self, name: &str, line: usize) -> Result<Func, ParseError> {
        self.funcs
            .get(name)
            .cloned()
            .ok_or_else(|| ParseError::UndefinedFunction {
                line,
                name: name.to_string(),
            })
    }

    fn check_var(&self, name: &str, line: usize) -> Result<(), ParseError> {
        if self.vars.iter().any(|v| v == name) {
            Ok(())
        } else {
            Err(ParseError::UndefinedVariable {
                line,
                name: name.to_string(),
            })
        }
    }
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

fn expect_empty(tokens: &[Token], line: usize, keyword: &str) -> Result<(), ParseError> {
    if tokens.is_empty() {
        Ok(())
    } else {
        Err(syntax(line, format!("unexpected arguments to {}", keyword)))
    }
}

fn template_name<'t>(tokens: &'t [Token], line: usize, keyword: &str) -> Result<(String, &'t [Token]), ParseError> {
    match tokens.split_first() {
        Some((
            Token {
                kind: TokenKind::Str(name),
                ..
            },
            rest,
        )) => Ok((name.clone(), rest)),
        _ => Err(syntax(line, format!("{} expects a quoted template name", keyword))),
    }
}

// `$x :=`, `$x =` or `$i, $v :=`.
fn split_decl(tokens: &[Token]) -> Option<(Vec<String>, bool, &[Token])> {
    use TokenKind::*;
    let kinds: Vec<&TokenKind> = tokens.iter().take(4).map(|t| &t.kind).collect();
    match kinds.as_slice() {
        [Variable(a), Comma, Variable(b), Declare, ..] => {
            Some((vec![a.clone(), b.clone()], false, &tokens[4..]))
        }
        [Variable(a), Declare, ..] => Some((vec![a.clone()], false, &tokens[2..])),
        [Variable(a), Assign, ..] => Some((vec![a.clone()], true, &tokens[2..])),
        _ => None,
    }
}

fn split_pipes(tokens: &[Token]) -> Vec<&[Token]> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Pipe if depth == 0 => {
                segments.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&tokens[start..]);
    segments
}

fn matching_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_number(text: &str, line: usize) -> Result<Number, ParseError> {
    let clean = text.replace('_', "");
    let (negative, digits) = match clean.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, clean.trim_start_matches('+')),
    };

    let int = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        digits.parse::<i64>().ok()
    };
    if let Some(n) = int {
        return Ok(Number::from(if negative { -n } else { n }));
    }

    digits
        .parse::<f64>()
        .ok()
        .and_then(|f| Number::from_f64(if negative { -f } else { f }))
        .ok_or_else(|| syntax(line, format!("bad number syntax: {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::funcs::builtins;

    fn parse_default(text: &str) -> Result<Parsed, ParseError> {
        parse(text, "{{", "}}", &builtins())
    }

    #[test]
    fn test_defines_are_collected() {
        let parsed = parse_default(r#"{{define "b"}}b{{end}}main"#).unwrap();
        assert_eq!(parsed.defines.len(), 1);
        assert_eq!(parsed.defines[0].0, "b");
        assert!(matches!(parsed.main.as_slice(), [Node::Text(t)] if t == "main"));
    }

    #[test]
    fn test_block_defines_and_calls() {
        let parsed = parse_default(r#"{{block "content" .}}default{{end}}"#).unwrap();
        assert_eq!(parsed.defines[0].0, "content");
        assert!(matches!(parsed.main.as_slice(), [Node::Template { name, .. }] if name == "content"));
    }

    #[test]
    fn test_undefined_function() {
        let err = parse_default("{{ nope }}").unwrap_err();
        assert_eq!(
            err,
            ParseError::UndefinedFunction {
                line: 1,
                name: "nope".into()
            }
        );
    }

    #[test]
    fn test_undefined_variable() {
        assert!(matches!(
            parse_default("{{ $x }}"),
            Err(ParseError::UndefinedVariable { .. })
        ));
        assert!(parse_default("{{ $x := 1 }}{{ $x }}").is_ok());
    }

    #[test]
    fn test_variable_scope_ends_with_block() {
        assert!(matches!(
            parse_default("{{ if true }}{{ $x := 1 }}{{ end }}{{ $x }}"),
            Err(ParseError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_else_if_chain() {
        let parsed = parse_default("{{if .A}}a{{else if .B}}b{{else}}c{{end}}").unwrap();
        match &parsed.main[0] {
            Node::If(branch) => {
                let nested = branch.else_list.as_ref().unwrap();
                assert!(matches!(nested.as_slice(), [Node::If(_)]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_end() {
        assert_eq!(parse_default("{{if .A}}a").unwrap_err(), ParseError::UnexpectedEof);
    }

    #[test]
    fn test_break_outside_range() {
        assert!(parse_default("{{break}}").is_err());
        assert!(parse_default("{{range .}}{{break}}{{end}}").is_ok());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_number("42", 1).unwrap(), Number::from(42));
        assert_eq!(parse_number("-7", 1).unwrap(), Number::from(-7));
        assert_eq!(parse_number("0x1F", 1).unwrap(), Number::from(31));
        assert_eq!(parse_number("1.5", 1).unwrap(), Number::from_f64(1.5).unwrap());
        assert!(parse_number("1.2.3", 1).is_err());
    }
}
