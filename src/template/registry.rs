//! Template registry: compiles named template sets during startup and
//! freezes into a read-only [`Templates`] table for serving.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{load_template_config, parse_template_config, TemplateConfig};
use crate::error::{Error, Result};
use crate::routing::RouteTable;
use crate::template::component::Components;
use crate::template::exec::{ExecError, TemplateSet};
use crate::template::funcs::{builtins, Func, FuncMap};
use crate::template::minify::minify_html;
use crate::template::parse::{parse, Node};
use crate::template::value::Value;

/// Mutable template builder used while the application is configured.
///
/// Functions and delimiters apply to sources compiled after they are set;
/// `minify` applies to every template regardless of order.
pub struct TemplateRegistry {
    dir: PathBuf,
    root: Option<String>,
    left: String,
    right: String,
    minify: bool,
    preload: Vec<String>,
    funcs: FuncMap,
    routes: Arc<RouteTable>,
    components: Components,
    sets: HashMap<String, TemplateSet>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            root: None,
            left: "{{".to_string(),
            right: "}}".to_string(),
            minify: false,
            preload: Vec::new(),
            funcs: builtins(),
            routes: Arc::new(RouteTable::new()),
            components: Components::default(),
            sets: HashMap::new(),
        }
    }
}

// One parsed source: the name it is registered under plus its nodes.
struct Source {
    name: String,
    main: Vec<Node>,
    defines: Vec<(String, Vec<Node>)>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory joined with every relative file name.
    pub fn dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.dir = dir.into();
        self
    }

    /// Sub-template served as the entry point of every later set.
    pub fn root(&mut self, name: impl Into<String>) -> &mut Self {
        self.root = Some(name.into());
        self
    }

    pub fn delims(&mut self, left: impl Into<String>, right: impl Into<String>) -> &mut Self {
        self.left = left.into();
        self.right = right.into();
        self
    }

    pub fn minify(&mut self, enabled: bool) -> &mut Self {
        self.minify = enabled;
        self
    }

    /// Files parsed into every template registered afterwards.
    pub fn preload<I, S>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload.extend(files.into_iter().map(Into::into));
        self
    }

    /// Register one function; replaces any function of the same name.
    pub fn func<F, E>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, E> + Send + Sync + 'static,
        E: std::fmt::Display,
    {
        self.funcs.insert(name.into(), Func::new(f));
        self
    }

    /// Merge a function table; later entries win on name collision.
    pub fn funcs<I, K>(&mut self, funcs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Func)>,
        K: Into<String>,
    {
        self.funcs
            .extend(funcs.into_iter().map(|(name, f)| (name.into(), f)));
        self
    }

    /// Route table used by the `route` template function.
    pub fn routes(&mut self, routes: Arc<RouteTable>) -> &mut Self {
        self.routes = routes;
        self
    }

    /// Register a component from inline source.
    pub fn component(&mut self, name: &str, text: &str) -> Result<&mut Self> {
        if name.is_empty() {
            return Err(Error::EmptyComponentName);
        }
        let source = self.parse_source(name, text)?;
        let set = TemplateSet {
            name: name.to_string(),
            entry: Arc::new(source.main),
            defs: Arc::new(
                source
                    .defines
                    .into_iter()
                    .map(|(n, body)| (n, Arc::new(body)))
                    .collect(),
            ),
        };
        self.components.insert(set)?;
        debug!(component = %name, "component registered");
        Ok(self)
    }

    /// Register a component from a file under `dir`.
    pub fn component_file(&mut self, name: &str, file: &str) -> Result<&mut Self> {
        if name.is_empty() {
            return Err(Error::EmptyComponentName);
        }
        let text = self.read(&self.dir.join(file))?;
        self.component(name, &text)
    }

    /// Register a template set from inline source.
    pub fn parse(&mut self, name: &str, text: &str) -> Result<&mut Self> {
        self.ensure_unique(name)?;
        let source = self.parse_source(name, text)?;
        self.register(name, vec![source])
    }

    /// Register a template set from files under `dir`. The first file is
    /// the entry point unless a root is configured.
    pub fn parse_files<I, S>(&mut self, name: &str, files: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = files
            .into_iter()
            .map(|f| self.dir.join(f.as_ref()))
            .collect::<Vec<_>>();
        self.parse_paths(name, &paths)
    }

    /// Register a template set from every file matching a glob pattern
    /// under `dir`, in sorted order.
    pub fn parse_glob(&mut self, name: &str, pattern: &str) -> Result<&mut Self> {
        let full = self.dir.join(pattern).to_string_lossy().into_owned();
        let matches = glob::glob(&full).map_err(|e| Error::Pattern {
            pattern: full.clone(),
            message: e.to_string(),
        })?;
        let mut paths = matches.filter_map(|entry| entry.ok()).collect::<Vec<_>>();
        paths.sort();
        if paths.is_empty() {
            return Err(Error::NoMatches(full));
        }
        self.parse_paths(name, &paths)
    }

    /// Apply a template configuration document.
    pub fn configure(&mut self, config: &TemplateConfig) -> Result<&mut Self> {
        if !config.dir.is_empty() {
            self.dir(&config.dir);
        }
        if !config.root.is_empty() {
            self.root(&config.root);
        }
        if let Some((left, right)) = config.delims() {
            self.delims(left, right);
        }
        if config.minify {
            self.minify(true);
        }
        self.preload(config.preload.iter().cloned());

        for (name, file) in &config.components {
            self.component_file(name, file)?;
        }
        for (name, files) in &config.list {
            self.parse_files(name, files)?;
        }
        Ok(self)
    }

    /// Parse and apply a YAML configuration document.
    pub fn parse_config(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let config = parse_template_config(bytes)?;
        self.configure(&config)
    }

    /// Load and apply a YAML configuration file.
    pub fn parse_config_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let config = load_template_config(path.as_ref())?;
        self.configure(&config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.sets.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// Finish configuration.
    pub fn freeze(self) -> Templates {
        Templates {
            sets: self.sets,
            components: self.components,
            routes: self.routes,
            minify: self.minify,
        }
    }

    fn parse_paths(&mut self, name: &str, paths: &[PathBuf]) -> Result<&mut Self> {
        self.ensure_unique(name)?;
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let text = self.read(path)?;
            sources.push(self.parse_source(&base_name(path), &text)?);
        }
        self.register(name, sources)
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.sets.contains_key(name) {
            return Err(Error::DuplicateTemplate(name.to_string()));
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| Error::ReadSource {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse_source(&self, name: &str, text: &str) -> Result<Source> {
        let parsed = parse(text, &self.left, &self.right, &self.funcs).map_err(|source| Error::Parse {
            name: name.to_string(),
            source,
        })?;
        Ok(Source {
            name: name.to_string(),
            main: parsed.main,
            defines: parsed.defines,
        })
    }

    // Preload files first, then `sources` in order; later definitions of a
    // name replace earlier ones.
    fn register(&mut self, name: &str, sources: Vec<Source>) -> Result<&mut Self> {
        let mut all = Vec::with_capacity(self.preload.len() + sources.len());
        for file in &self.preload {
            let path = self.dir.join(file);
            let text = self.read(&path)?;
            all.push(self.parse_source(&base_name(&path), &text)?);
        }
        let entry_name = sources.first().map(|s| s.name.clone());
        all.extend(sources);

        let mut defs: HashMap<String, Arc<Vec<Node>>> = HashMap::new();
        for source in all {
            defs.insert(source.name, Arc::new(source.main));
            for (def, body) in source.defines {
                defs.insert(def, Arc::new(body));
            }
        }

        let entry_key = match &self.root {
            Some(root) => root.clone(),
            None => entry_name.unwrap_or_else(|| name.to_string()),
        };
        let entry = match defs.get(&entry_key) {
            Some(entry) => entry.clone(),
            None if self.root.is_some() => {
                return Err(Error::RootNotFound {
                    template: name.to_string(),
                    root: entry_key,
                })
            }
            None => Arc::new(Vec::new()),
        };

        self.sets.insert(
            name.to_string(),
            TemplateSet {
                name: name.to_string(),
                entry,
                defs: Arc::new(defs),
            },
        );
        info!(template = %name, root = ?self.root, "template registered");
        Ok(self)
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Frozen, shareable template table.
#[derive(Debug)]
pub struct Templates {
    sets: HashMap<String, TemplateSet>,
    components: Components,
    routes: Arc<RouteTable>,
    minify: bool,
}

impl Templates {
    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.sets.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn minify_enabled(&self) -> bool {
        self.minify
    }

    /// Render template `name` with serializable data.
    pub fn execute<T: Serialize + ?Sized>(&self, name: &str, out: &mut dyn Write, data: &T) -> Result<()> {
        let data = Value::from_serialize(data)?;
        self.execute_value(name, out, data)
    }

    /// Render template `name` with an already-built value.
    pub fn execute_value(&self, name: &str, out: &mut dyn Write, data: Value) -> Result<()> {
        let set = self
            .sets
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;

        if !self.minify {
            set.render(out, data, &self.components, &self.routes, 0)?;
            return Ok(());
        }

        let mut buf = Vec::new();
        set.render(&mut buf, data, &self.components, &self.routes, 0)?;
        let minified = minify_html(&String::from_utf8_lossy(&buf)).map_err(Error::Minify)?;
        out.write_all(minified.as_bytes()).map_err(ExecError::from)?;
        Ok(())
    }

    /// Render template `name` into a string.
    pub fn render_to_string<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        let mut out = Vec::new();
        self.execute(name, &mut out, data)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::io;

    // Fails every write with the given kind.
    struct FailingWriter(io::ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(self.0, "write failed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(templates: &Templates, name: &str) -> Result<String> {
        templates.render_to_string(name, &json!(null))
    }

    #[test]
    fn test_inline_template() {
        let mut registry = TemplateRegistry::new();
        registry.parse("t", "Hello {{.}}").unwrap();
        let templates = registry.freeze();
        assert_eq!(templates.render_to_string("t", "you").unwrap(), "Hello you");
    }

    #[test]
    fn test_duplicate_template() {
        let mut registry = TemplateRegistry::new();
        registry.parse("t", "a").unwrap();
        assert!(matches!(registry.parse("t", "b"), Err(Error::DuplicateTemplate(_))));
    }

    #[test]
    fn test_component_rules() {
        let mut registry = TemplateRegistry::new();
        registry.component("c", "x").unwrap();
        assert!(matches!(registry.component("c", "y"), Err(Error::DuplicateComponent(_))));
        assert!(matches!(registry.component("", "y"), Err(Error::EmptyComponentName)));
    }

    #[test]
    fn test_component_call() {
        let mut registry = TemplateRegistry::new();
        registry
            .component("c", "<b>{{.}}</b>")
            .unwrap()
            .parse("t", r#"{{component "c" "hime"}}"#)
            .unwrap();
        let templates = registry.freeze();
        assert_eq!(render(&templates, "t").unwrap(), "<b>hime</b>");
    }

    #[test]
    fn test_component_errors_surface_at_render() {
        let mut registry = TemplateRegistry::new();
        registry
            .component("c", "{{.}}")
            .unwrap()
            .parse("args", r#"{{component "c" "a" "b"}}"#)
            .unwrap()
            .parse("unknown", r#"{{component "nope"}}"#)
            .unwrap();
        let templates = registry.freeze();

        let err = render(&templates, "args").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Exec(ExecError::ComponentArgs { .. })));

        let err = render(&templates, "unknown").unwrap_err();
        assert!(matches!(err, Error::Exec(ExecError::UnknownComponent(_))));
    }

    #[test]
    fn test_root_selects_entry() {
        let mut registry = TemplateRegistry::new();
        registry
            .root("main")
            .parse("t", r#"ignored{{define "main"}}entry{{end}}"#)
            .unwrap();
        assert_eq!(render(&registry.freeze(), "t").unwrap(), "entry");
    }

    #[test]
    fn test_missing_root() {
        let mut registry = TemplateRegistry::new();
        registry.root("R");
        assert!(matches!(
            registry.parse("t", "no defines"),
            Err(Error::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_minify_applies_regardless_of_order() {
        let mut before = TemplateRegistry::new();
        before.minify(true).parse("t", "  <h1>  Test   </h1>").unwrap();
        assert_eq!(render(&before.freeze(), "t").unwrap(), "<h1>Test</h1>");

        let mut after = TemplateRegistry::new();
        after.parse("t", "  <h1>  Test   </h1>").unwrap().minify(true);
        assert_eq!(render(&after.freeze(), "t").unwrap(), "<h1>Test</h1>");
    }

    #[test]
    fn test_minify_failure_is_recoverable() {
        let mut registry = TemplateRegistry::new();
        registry.minify(true).parse("t", "<div class=\"open").unwrap();
        let err = render(&registry.freeze(), "t").unwrap_err();
        assert!(matches!(err, Error::Minify(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_write_failure_severity_ignores_minify() {
        for minify in [false, true] {
            let mut registry = TemplateRegistry::new();
            registry.minify(minify).parse("t", "<p>{{.}}</p>").unwrap();
            let templates = registry.freeze();

            let err = templates
                .execute("t", &mut FailingWriter(io::ErrorKind::Other), "x")
                .unwrap_err();
            assert!(matches!(err, Error::Exec(ExecError::Io(_))), "minify={minify}");
            assert_eq!(err.kind(), ErrorKind::Fatal, "minify={minify}");

            let err = templates
                .execute("t", &mut FailingWriter(io::ErrorKind::BrokenPipe), "x")
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Ignorable, "minify={minify}");
        }
    }

    #[test]
    fn test_empty_delims_are_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.delims("", "");
        let err = registry.parse("t", "abc").err().unwrap();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.is_fatal());

        registry.delims("{{", "");
        assert!(registry.component("c", "abc").is_err());
    }

    #[test]
    fn test_user_func_overrides_builtin() {
        let mut registry = TemplateRegistry::new();
        registry
            .func("print", |_args: &[Value]| Ok::<_, String>(Value::from("mine")))
            .func("fail", |_args: &[Value]| Err::<Value, _>("boom"))
            .parse("t", "{{print 1}}")
            .unwrap()
            .parse("f", "{{fail}}")
            .unwrap();
        let templates = registry.freeze();
        assert_eq!(render(&templates, "t").unwrap(), "mine");

        let err = render(&templates, "f").unwrap_err();
        assert_eq!(err.to_string(), "error calling fail: boom");
    }

    #[test]
    fn test_undefined_function_fails_at_parse() {
        let mut registry = TemplateRegistry::new();
        assert!(matches!(
            registry.parse("t", "{{ missing }}"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_template_name_and_route() {
        let routes: RouteTable = [("route1", "/route/1")].into_iter().collect();
        let mut registry = TemplateRegistry::new();
        registry
            .routes(Arc::new(routes))
            .parse("page", r#"{{templateName}} {{route "route1" (param "id" 3)}}"#)
            .unwrap();
        assert_eq!(render(&registry.freeze(), "page").unwrap(), "page /route/1?id=3");
    }

    #[test]
    fn test_unknown_template() {
        let templates = TemplateRegistry::new().freeze();
        assert!(matches!(render(&templates, "nope"), Err(Error::TemplateNotFound(_))));
    }

    #[test]
    fn test_missing_source_file() {
        let mut registry = TemplateRegistry::new();
        registry.dir("does/not/exist");
        assert!(matches!(
            registry.parse_files("t", ["a.tmpl"]),
            Err(Error::ReadSource { .. })
        ));
    }
}
