//! Template function table and built-in functions.
//!
//! # Design Decisions
//! - Names resolve to `Func` handles when a template is parsed, so a render
//!   never looks a function up by name
//! - Registry built-ins (`templateName`, `route`, `param`, `component`) read
//!   the per-render `CallEnv` instead of capturing registry state

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use serde_json::Value as Json;
use url::form_urlencoded;

use crate::http::redirect::{build_path, Param, UrlPart};
use crate::routing::RouteTable;
use crate::template::component::Components;
use crate::template::exec::ExecError;
use crate::template::value::{escape_html, Value};

/// Name → function table merged into every compiled template.
pub type FuncMap = HashMap<String, Func>;

type FuncImpl = dyn Fn(&CallEnv<'_>, &[Value]) -> Result<Value, ExecError> + Send + Sync;

/// Render-time context handed to every function call.
pub struct CallEnv<'a> {
    /// Registered name of the template set being executed.
    pub template_name: &'a str,
    pub components: &'a Components,
    pub routes: &'a RouteTable,
    pub depth: usize,
}

/// A callable template function.
#[derive(Clone)]
pub struct Func(Arc<FuncImpl>);

impl Func {
    /// Wrap a plain function over argument values.
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, E> + Send + Sync + 'static,
        E: Display,
    {
        Func(Arc::new(move |_env: &CallEnv<'_>, args: &[Value]| {
            f(args).map_err(|e| ExecError::Func(e.to_string()))
        }))
    }

    pub(crate) fn with_env<F>(f: F) -> Self
    where
        F: Fn(&CallEnv<'_>, &[Value]) -> Result<Value, ExecError> + Send + Sync + 'static,
    {
        Func(Arc::new(f))
    }

    pub(crate) fn call(&self, env: &CallEnv<'_>, args: &[Value]) -> Result<Value, ExecError> {
        (self.0)(env, args)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Func")
    }
}

fn fail(message: impl Into<String>) -> ExecError {
    ExecError::Func(message.into())
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExecError> {
    if args.len() < min || args.len() > max {
        return Err(fail(format!(
            "wrong number of args for {}: got {}",
            name,
            args.len()
        )));
    }
    Ok(())
}

/// Every built-in function.
pub(crate) fn builtins() -> FuncMap {
    let mut map = FuncMap::new();
    let mut add = |name: &str, func: Func| {
        map.insert(name.to_string(), func);
    };

    add("and", Func::with_env(|_, args| {
        arity("and", args, 1, usize::MAX)?;
        Ok(args
            .iter()
            .find(|v| !v.is_truthy())
            .unwrap_or(&args[args.len() - 1])
            .clone())
    }));
    add("or", Func::with_env(|_, args| {
        arity("or", args, 1, usize::MAX)?;
        Ok(args
            .iter()
            .find(|v| v.is_truthy())
            .unwrap_or(&args[args.len() - 1])
            .clone())
    }));
    add("not", Func::with_env(|_, args| {
        arity("not", args, 1, 1)?;
        Ok(Value::from(!args[0].is_truthy()))
    }));

    add("eq", Func::with_env(|_, args| {
        arity("eq", args, 2, usize::MAX)?;
        Ok(Value::from(args[1..].iter().any(|v| equal(&args[0], v))))
    }));
    add("ne", Func::with_env(|_, args| {
        arity("ne", args, 2, 2)?;
        Ok(Value::from(!equal(&args[0], &args[1])))
    }));
    for (name, accept) in [
        ("lt", (|o: Ordering| o == Ordering::Less) as fn(Ordering) -> bool),
        ("le", |o: Ordering| o != Ordering::Greater),
        ("gt", |o: Ordering| o == Ordering::Greater),
        ("ge", |o: Ordering| o != Ordering::Less),
    ] {
        add(name, Func::with_env(move |_, args| {
            arity(name, args, 2, 2)?;
            Ok(Value::from(accept(compare(name, &args[0], &args[1])?)))
        }));
    }

    add("len", Func::with_env(|_, args| {
        arity("len", args, 1, 1)?;
        let n = match &args[0] {
            Value::Data(Json::String(s)) | Value::Html(s) => s.len(),
            Value::Data(Json::Array(a)) => a.len(),
            Value::Data(Json::Object(o)) => o.len(),
            other => return Err(fail(format!("len of {}", other.kind()))),
        };
        Ok(Value::from(n as i64))
    }));
    add("index", Func::with_env(|_, args| {
        arity("index", args, 1, usize::MAX)?;
        args[1..].iter().try_fold(args[0].clone(), |item, key| index(&item, key))
    }));

    add("print", Func::with_env(|_, args| Ok(Value::from(sprint(args)))));
    add("println", Func::with_env(|_, args| {
        let mut line = args.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
        line.push('\n');
        Ok(Value::from(line))
    }));
    add("printf", Func::with_env(|_, args| {
        arity("printf", args, 1, usize::MAX)?;
        let format = args[0]
            .as_str()
            .ok_or_else(|| fail("printf format must be a string"))?;
        Ok(Value::from(sprintf(format, &args[1..])))
    }));
    add("html", Func::with_env(|_, args| {
        Ok(Value::Html(escape_html(&sprint(args))))
    }));
    add("urlquery", Func::with_env(|_, args| {
        Ok(Value::from(
            form_urlencoded::byte_serialize(sprint(args).as_bytes()).collect::<String>(),
        ))
    }));

    add("templateName", Func::with_env(|env, args| {
        arity("templateName", args, 0, 0)?;
        Ok(Value::from(env.template_name))
    }));
    add("route", Func::with_env(|env, args| {
        arity("route", args, 1, usize::MAX)?;
        let name = args[0]
            .as_str()
            .ok_or_else(|| fail("route name must be a string"))?;
        let pattern = env
            .routes
            .route(name)
            .map_err(|_| ExecError::UnknownRoute(name.to_string()))?;
        let parts = args[1..].iter().map(|arg| match arg {
            Value::Param(p) => UrlPart::Query(p.clone()),
            other => UrlPart::Segment(other.to_string()),
        });
        Ok(Value::from(build_path(pattern, parts)))
    }));
    add("param", Func::with_env(|_, args| {
        arity("param", args, 2, 2)?;
        let name = args[0]
            .as_str()
            .ok_or_else(|| fail("param name must be a string"))?;
        Ok(Value::Param(Param::new(name, &args[1])))
    }));
    add("component", Func::with_env(|env, args| env.components.invoke(env, args)));

    map
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Data(Json::Number(x)), Value::Data(Json::Number(y))) => x.as_f64() == y.as_f64(),
        (Value::Html(x), Value::Data(Json::String(y))) | (Value::Data(Json::String(y)), Value::Html(x)) => {
            x == y
        }
        (x, y) => x == y,
    }
}

fn compare(name: &str, a: &Value, b: &Value) -> Result<Ordering, ExecError> {
    match (a, b) {
        (Value::Data(Json::Number(x)), Value::Data(Json::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| fail(format!("{}: incomparable numbers", name))),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Ok(x.cmp(y)),
            _ => Err(fail(format!(
                "{}: incompatible types for comparison: {} and {}",
                name,
                a.kind(),
                b.kind()
            ))),
        },
    }
}

fn index(item: &Value, key: &Value) -> Result<Value, ExecError> {
    match (item, key) {
        (Value::Data(Json::Array(items)), Value::Data(Json::Number(n))) => {
            let i = n
                .as_u64()
                .ok_or_else(|| fail(format!("index {} out of range", n)))? as usize;
            items
                .get(i)
                .cloned()
                .map(Value::Data)
                .ok_or_else(|| fail(format!("index {} out of range", i)))
        }
        (Value::Data(Json::Object(map)), key) => {
            let key = key
                .as_str()
                .ok_or_else(|| fail(format!("cannot index map with {}", key.kind())))?;
            Ok(map.get(key).cloned().map(Value::Data).unwrap_or_else(Value::null))
        }
        (Value::Data(Json::Null), _) => Ok(Value::null()),
        (item, key) => Err(fail(format!(
            "cannot index {} with {}",
            item.kind(),
            key.kind()
        ))),
    }
}

// Space between operands when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && arg.as_str().is_none() && args[i - 1].as_str().is_none() {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        // Optional precision such as "%.2f".
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }

        let verb = match chars.next() {
            Some(v) => v,
            None => {
                out.push_str("%!(NOVERB)");
                break;
            }
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = match args.next() {
            Some(arg) => arg,
            None => {
                out.push_str(&format!("%!{}(MISSING)", verb));
                continue;
            }
        };
        match verb {
            's' | 'v' => out.push_str(&arg.to_string()),
            'q' => out.push_str(&format!("{:?}", arg.to_string())),
            'd' => match arg.as_json().and_then(Json::as_f64) {
                Some(n) => out.push_str(&format!("{}", n.trunc() as i64)),
                None => out.push_str(&format!("%!d({})", arg)),
            },
            'f' => match arg.as_json().and_then(Json::as_f64) {
                Some(n) => out.push_str(&format!("{:.*}", precision.unwrap_or(6), n)),
                None => out.push_str(&format!("%!f({})", arg)),
            },
            other => out.push_str(&format!("%!{}({})", other, arg)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, ExecError> {
        let components = Components::default();
        let routes: RouteTable = [("route1", "/route/1")].into_iter().collect();
        let env = CallEnv {
            template_name: "t",
            components: &components,
            routes: &routes,
            depth: 0,
        };
        builtins()[name].call(&env, args)
    }

    #[test]
    fn test_logic() {
        assert_eq!(call("and", &[Value::from(1), Value::from(0)]).unwrap(), Value::from(0));
        assert_eq!(call("or", &[Value::from(""), Value::from("x")]).unwrap(), Value::from("x"));
        assert_eq!(call("not", &[Value::null()]).unwrap(), Value::from(true));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(call("eq", &[Value::from(1), Value::from(json!(1.0))]).unwrap(), Value::from(true));
        assert_eq!(call("eq", &[Value::from("a"), Value::from("b"), Value::from("a")]).unwrap(), Value::from(true));
        assert_eq!(call("lt", &[Value::from(1), Value::from(2)]).unwrap(), Value::from(true));
        assert_eq!(call("ge", &[Value::from("a"), Value::from("b")]).unwrap(), Value::from(false));
        assert!(call("lt", &[Value::from(1), Value::from("a")]).is_err());
    }

    #[test]
    fn test_len_and_index() {
        let data = Value::from(json!({"items": [10, 20]}));
        assert_eq!(
            call("index", &[data.clone(), Value::from("items"), Value::from(1)]).unwrap(),
            Value::from(20)
        );
        assert_eq!(call("index", &[data, Value::from("missing")]).unwrap(), Value::null());
        assert_eq!(call("len", &[Value::from(json!([1, 2, 3]))]).unwrap(), Value::from(3));
        assert!(call("len", &[Value::from(3)]).is_err());
    }

    #[test]
    fn test_printing() {
        assert_eq!(call("print", &[Value::from("a"), Value::from("b")]).unwrap(), Value::from("ab"));
        assert_eq!(call("print", &[Value::from(1), Value::from(2)]).unwrap(), Value::from("1 2"));
        assert_eq!(
            call("printf", &[Value::from("%s=%d %.2f%%"), Value::from("n"), Value::from(3), Value::from(json!(2.5))]).unwrap(),
            Value::from("n=3 2.50%")
        );
        assert_eq!(call("urlquery", &[Value::from("a b&c")]).unwrap(), Value::from("a+b%26c"));
        assert_eq!(call("html", &[Value::from("<b>")]).unwrap(), Value::Html("&lt;b&gt;".into()));
    }

    #[test]
    fn test_route_and_param() {
        let param = call("param", &[Value::from("id"), Value::from(3)]).unwrap();
        assert_eq!(
            call("route", &[Value::from("route1"), Value::from("edit"), param]).unwrap(),
            Value::from("/route/1/edit?id=3")
        );
        assert!(matches!(
            call("route", &[Value::from("missing")]),
            Err(ExecError::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_template_name() {
        assert_eq!(call("templateName", &[]).unwrap(), Value::from("t"));
    }
}
