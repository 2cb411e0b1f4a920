//! Runtime values flowing through template pipelines.

use std::fmt;

use serde::Serialize;
use serde_json::Value as Json;

use crate::http::redirect::Param;

/// A value produced while executing a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain data; HTML-escaped when printed.
    Data(Json),
    /// Markup that is emitted without escaping.
    Html(String),
    /// A query parameter built by `param`, consumed by `route`.
    Param(Param),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(Json::Null)
    }

    /// Serialize any value into template data.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Value::Data)
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Data(Json::String(s)) => Some(s),
            Value::Html(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(Json::Null))
    }

    /// Truthiness for `if`, `with`, `and`, `or` and `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Data(v) => match v {
                Json::Null => false,
                Json::Bool(b) => *b,
                Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Json::String(s) => !s.is_empty(),
                Json::Array(a) => !a.is_empty(),
                Json::Object(o) => !o.is_empty(),
            },
            Value::Html(s) => !s.is_empty(),
            Value::Param(_) => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Data(Json::Null) => "nil",
            Value::Data(Json::Bool(_)) => "bool",
            Value::Data(Json::Number(_)) => "number",
            Value::Data(Json::String(_)) => "string",
            Value::Data(Json::Array(_)) => "array",
            Value::Data(Json::Object(_)) => "map",
            Value::Html(_) => "html",
            Value::Param(_) => "param",
        }
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::Data(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(Json::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(Json::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Data(Json::Bool(b))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Data(Json::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Data(Json::from(n))
    }
}

/// Unescaped text form, as `print` sees it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(v) => write_json(f, v),
            Value::Html(s) => f.write_str(s),
            Value::Param(p) => write!(f, "{}={}", p.name, p.value),
        }
    }
}

fn write_json(f: &mut fmt::Formatter<'_>, v: &Json) -> fmt::Result {
    match v {
        Json::Null => Ok(()),
        Json::Bool(b) => write!(f, "{}", b),
        Json::Number(n) => write!(f, "{}", n),
        Json::String(s) => f.write_str(s),
        Json::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write_json(f, item)?;
            }
            f.write_str("]")
        }
        Json::Object(map) => {
            f.write_str("map[")?;
            for (i, (k, item)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}:", k)?;
                write_json(f, item)?;
            }
            f.write_str("]")
        }
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::null().is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from(json!(0)).is_truthy());
        assert!(!Value::from(json!([])).is_truthy());
        assert!(Value::from(json!({"a": 1})).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::null().to_string(), "");
        assert_eq!(Value::from(json!([1, "a"])).to_string(), "[1 a]");
        assert_eq!(Value::from(json!({"k": true})).to_string(), "map[k:true]");
        assert_eq!(Value::Param(Param::new("id", 3)).to_string(), "id=3");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&#34;x&#34;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
