//! Template execution: walks a compiled node tree against data.
//!
//! # Data Flow
//! ```text
//! TemplateSet.entry ──walk──▶ Node ──eval──▶ Value ──print──▶ io::Write
//!                              │
//!                              └─ {{template "x"}} ──▶ TemplateSet.defs["x"]
//! ```
//!
//! # Design Decisions
//! - Plain values are HTML-escaped on output, `Value::Html` is written raw
//! - Nil and missing keys print as empty; a field on a non-map fails
//! - Nested template calls are bounded to stop runaway recursion

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;

use crate::routing::RouteTable;
use crate::template::component::Components;
use crate::template::funcs::CallEnv;
use crate::template::parse::{Arg, Branch, Command, Node, Pipeline};
use crate::template::value::{escape_html, Value};

/// Deepest allowed chain of nested template and component calls.
pub(crate) const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no such template {0:?}")]
    NoSuchTemplate(String),

    #[error("component {0:?} not found")]
    UnknownComponent(String),

    #[error("component {name:?} takes at most one data argument, got {count}")]
    ComponentArgs { name: String, count: usize },

    #[error("route {0:?} not found")]
    UnknownRoute(String),

    #[error("can't evaluate field {field} in type {kind}")]
    Field { field: String, kind: &'static str },

    #[error("error calling {name}: {message}")]
    Call { name: String, message: String },

    #[error("{0}")]
    Func(String),

    #[error("{0} is not a function, can't give it arguments")]
    NotAFunction(String),

    #[error("range can't iterate over {0}")]
    Range(&'static str),

    #[error("exceeded maximum template call depth in {0:?}")]
    Depth(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExecError {
    /// The output stream failed because the client hung up.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ExecError::Io(e) if crate::error::is_disconnect(e))
    }
}

/// A compiled, servable template: its entry tree plus every named
/// sub-template it can call.
#[derive(Debug, Clone)]
pub(crate) struct TemplateSet {
    pub name: String,
    pub entry: Arc<Vec<Node>>,
    pub defs: Arc<HashMap<String, Arc<Vec<Node>>>>,
}

impl TemplateSet {
    pub fn render(
        &self,
        out: &mut dyn Write,
        data: Value,
        components: &Components,
        routes: &RouteTable,
        depth: usize,
    ) -> Result<(), ExecError> {
        if depth > MAX_DEPTH {
            return Err(ExecError::Depth(self.name.clone()));
        }
        let mut state = State {
            set: self,
            env: CallEnv {
                template_name: &self.name,
                components,
                routes,
                depth,
            },
            out,
            vars: vec![("$".to_string(), data.clone())],
        };
        state.walk(&self.entry, &data).map(|_| ())
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
}

struct State<'a, 'w> {
    set: &'a TemplateSet,
    env: CallEnv<'a>,
    out: &'w mut dyn Write,
    vars: Vec<(String, Value)>,
}

impl State<'_, '_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<Flow, ExecError> {
        for node in nodes {
            match self.walk_node(node, dot)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn walk_node(&mut self, node: &Node, dot: &Value) -> Result<Flow, ExecError> {
        match node {
            Node::Text(text) => self.out.write_all(text.as_bytes())?,
            Node::Action(pipe) => {
                let value = self.eval_pipeline(pipe, dot, true)?;
                if pipe.decl.is_empty() {
                    self.print(&value)?;
                }
            }
            Node::If(branch) => return self.walk_if(branch, dot, false),
            Node::With(branch) => return self.walk_if(branch, dot, true),
            Node::Range(branch) => return self.walk_range(branch, dot),
            Node::Template { name, pipe } => {
                let data = match pipe {
                    Some(pipe) => self.eval_pipeline(pipe, dot, false)?,
                    None => Value::null(),
                };
                self.call_template(name, data)?;
            }
            Node::Break => return Ok(Flow::Break),
            Node::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn walk_if(&mut self, branch: &Branch, dot: &Value, with: bool) -> Result<Flow, ExecError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(&branch.pipe, dot, true)?;
        let flow = if value.is_truthy() {
            let inner = if with { &value } else { dot };
            self.walk(&branch.list, inner)
        } else if let Some(else_list) = &branch.else_list {
            self.walk(else_list, dot)
        } else {
            Ok(Flow::Normal)
        };
        self.vars.truncate(mark);
        flow
    }

    fn walk_range(&mut self, branch: &Branch, dot: &Value) -> Result<Flow, ExecError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(&branch.pipe, dot, false)?;

        let entries: Vec<(Value, Value)> = match value {
            Value::Data(Json::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i as i64), Value::Data(item)))
                .collect(),
            Value::Data(Json::Object(map)) => map
                .into_iter()
                .map(|(k, item)| (Value::from(k), Value::Data(item)))
                .collect(),
            Value::Data(Json::Number(n)) if n.is_u64() || n.is_i64() => {
                let count = n.as_i64().unwrap_or(0).max(0);
                (0..count).map(|i| (Value::from(i), Value::from(i))).collect()
            }
            Value::Data(Json::Null) => Vec::new(),
            other => return Err(ExecError::Range(other.kind())),
        };

        if entries.is_empty() {
            let flow = match &branch.else_list {
                Some(else_list) => self.walk(else_list, dot).map(|_| Flow::Normal),
                None => Ok(Flow::Normal),
            };
            self.vars.truncate(mark);
            return flow;
        }

        for (key, item) in entries {
            match branch.pipe.decl.as_slice() {
                [v] => self.vars.push((v.clone(), item.clone())),
                [k, v] => {
                    self.vars.push((k.clone(), key));
                    self.vars.push((v.clone(), item.clone()));
                }
                _ => {}
            }
            let flow = self.walk(&branch.list, &item);
            self.vars.truncate(mark);
            match flow? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn call_template(&mut self, name: &str, data: Value) -> Result<(), ExecError> {
        let nodes = self
            .set
            .defs
            .get(name)
            .cloned()
            .ok_or_else(|| ExecError::NoSuchTemplate(name.to_string()))?;
        if self.env.depth >= MAX_DEPTH {
            return Err(ExecError::Depth(name.to_string()));
        }

        let vars = std::mem::replace(&mut self.vars, vec![("$".to_string(), data.clone())]);
        self.env.depth += 1;
        let result = self.walk(&nodes, &data);
        self.env.depth -= 1;
        self.vars = vars;
        result.map(|_| ())
    }

    fn print(&mut self, value: &Value) -> Result<(), ExecError> {
        match value {
            Value::Html(html) => self.out.write_all(html.as_bytes())?,
            other => self.out.write_all(escape_html(&other.to_string()).as_bytes())?,
        }
        Ok(())
    }

    fn eval_pipeline(&mut self, pipe: &Pipeline, dot: &Value, bind: bool) -> Result<Value, ExecError> {
        let mut value: Option<Value> = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(cmd, dot, value.take())?);
        }
        let value = value.unwrap_or_else(Value::null);

        if bind {
            if let [name] = pipe.decl.as_slice() {
                if pipe.is_assign {
                    if let Some(slot) = self.vars.iter_mut().rev().find(|(n, _)| n == name) {
                        slot.1 = value.clone();
                    }
                } else {
                    self.vars.push((name.clone(), value.clone()));
                }
            }
        }
        Ok(value)
    }

    fn eval_command(&mut self, cmd: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, ExecError> {
        let (first, rest) = match cmd.args.split_first() {
            Some(split) => split,
            None => return Ok(Value::null()),
        };

        if let Arg::Func { name, func } = first {
            let mut args = rest
                .iter()
                .map(|arg| self.eval_arg(arg, dot))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            return func.call(&self.env, &args).map_err(|e| match e {
                ExecError::Func(message) => ExecError::Call {
                    name: name.clone(),
                    message,
                },
                other => other,
            });
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(ExecError::NotAFunction(first.describe()));
        }
        self.eval_arg(first, dot)
    }

    fn eval_arg(&mut self, arg: &Arg, dot: &Value) -> Result<Value, ExecError> {
        match arg {
            Arg::Dot => Ok(dot.clone()),
            Arg::Nil => Ok(Value::null()),
            Arg::Bool(b) => Ok(Value::from(*b)),
            Arg::Number(n) => Ok(Value::Data(Json::Number(n.clone()))),
            Arg::Str(s) => Ok(Value::from(s.as_str())),
            Arg::Field(fields) => walk_fields(dot.clone(), fields),
            Arg::Variable { name, fields } => {
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(Value::null);
                walk_fields(value, fields)
            }
            Arg::Pipe { pipe, fields } => {
                let value = self.eval_pipeline(pipe, dot, false)?;
                walk_fields(value, fields)
            }
            Arg::Func { name, .. } => self.eval_command(
                &Command {
                    args: vec![arg.clone()],
                },
                dot,
                None,
            )
            .map_err(|e| match e {
                ExecError::Func(message) => ExecError::Call {
                    name: name.clone(),
                    message,
                },
                other => other,
            }),
        }
    }
}

fn walk_fields(mut value: Value, fields: &[String]) -> Result<Value, ExecError> {
    for field in fields {
        value = match value {
            Value::Data(Json::Object(mut map)) => map
                .remove(field)
                .map(Value::Data)
                .unwrap_or_else(Value::null),
            Value::Data(Json::Null) => Value::null(),
            other => {
                return Err(ExecError::Field {
                    field: field.clone(),
                    kind: other.kind(),
                })
            }
        };
    }
    Ok(value)
}
