//! Registry-wide components callable from any template via
//! `{{component "name" data}}`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::template::exec::{ExecError, TemplateSet};
use crate::template::funcs::CallEnv;
use crate::template::value::Value;

/// Name → compiled component table.
#[derive(Debug, Clone, Default)]
pub struct Components {
    sets: HashMap<String, TemplateSet>,
}

impl Components {
    pub(crate) fn insert(&mut self, set: TemplateSet) -> Result<()> {
        if set.name.is_empty() {
            return Err(Error::EmptyComponentName);
        }
        if self.sets.contains_key(&set.name) {
            return Err(Error::DuplicateComponent(set.name));
        }
        self.sets.insert(set.name.clone(), set);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Render component `args[0]` with zero or one data argument and return
    /// its output as markup.
    pub(crate) fn invoke(&self, env: &CallEnv<'_>, args: &[Value]) -> Result<Value, ExecError> {
        let (name, data) = match args.split_first() {
            Some((name, data)) => (name, data),
            None => return Err(ExecError::Func("component name required".into())),
        };
        let name = name
            .as_str()
            .ok_or_else(|| ExecError::Func(format!("component name must be a string, got {}", name.kind())))?;

        if data.len() > 1 {
            return Err(ExecError::ComponentArgs {
                name: name.to_string(),
                count: data.len(),
            });
        }
        let set = self
            .sets
            .get(name)
            .ok_or_else(|| ExecError::UnknownComponent(name.to_string()))?;

        let mut out = Vec::new();
        let data = data.first().cloned().unwrap_or_else(Value::null);
        set.render(&mut out, data, self, env.routes, env.depth + 1)?;
        Ok(Value::Html(String::from_utf8_lossy(&out).into_owned()))
    }
}
