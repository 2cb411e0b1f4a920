//! Template registry integration tests against the checked-in fixtures.

use std::io::Write;

use serde_json::json;
use stagehand::template::ExecError;
use stagehand::{Error, TemplateRegistry};
use tempfile::NamedTempFile;

const TEMPLATE_DIR: &str = "tests/testdata/template";

#[test]
fn test_preload_is_visible_to_inline_templates() {
    let mut registry = TemplateRegistry::new();
    registry
        .dir(TEMPLATE_DIR)
        .preload(["b.tmpl"])
        .parse("t", r#"Test Data {{template "b"}}"#)
        .unwrap();

    let templates = registry.freeze();
    assert_eq!(templates.render_to_string("t", &json!(null)).unwrap(), "Test Data b");
}

#[test]
fn test_config_file() {
    let mut registry = TemplateRegistry::new();
    registry
        .parse_config_file(format!("{TEMPLATE_DIR}/config.yaml"))
        .unwrap();
    assert_eq!(registry.names(), vec!["c", "k", "p"]);

    let templates = registry.freeze();
    assert!(templates.minify_enabled());
    assert!(templates.components().contains("card"));
    assert_eq!(templates.render_to_string("p", "x").unwrap(), "<h1>px</h1>");
    assert_eq!(templates.render_to_string("k", &json!(null)).unwrap(), "<h1>k</h1>");
    assert_eq!(
        templates.render_to_string("c", "hi").unwrap(),
        r#"<h1><div class="card">hi</div></h1>"#
    );
}

#[test]
fn test_config_bytes_with_missing_root() {
    let mut registry = TemplateRegistry::new();
    let err = registry
        .parse_config(
            format!("dir: {TEMPLATE_DIR}\nroot: missing\nlist:\n  t: [hello.tmpl]\n").as_bytes(),
        )
        .err()
        .unwrap();
    assert!(matches!(err, Error::RootNotFound { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_config_without_root_serves_first_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "dir: {TEMPLATE_DIR}\nlist:\n  hello: [hello.tmpl, b.tmpl]").unwrap();

    let mut registry = TemplateRegistry::new();
    registry.parse_config_file(file.path()).unwrap();
    let templates = registry.freeze();
    assert_eq!(
        templates.render_to_string("hello", &json!({"Name": "Ann"})).unwrap(),
        "<p>Hello, Ann!</p>"
    );
}

#[test]
fn test_malformed_config_fails_at_load() {
    let mut registry = TemplateRegistry::new();
    assert!(matches!(
        registry.parse_config(b"delims: [\"[[\"]\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        registry.parse_config_file("tests/testdata/does-not-exist.yaml"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_parse_glob() {
    let mut registry = TemplateRegistry::new();
    registry
        .dir("tests/testdata/glob")
        .parse_glob("g", "*.tmpl")
        .unwrap();
    assert!(matches!(
        registry.parse_glob("none", "*.nope"),
        Err(Error::NoMatches(_))
    ));

    let templates = registry.freeze();
    assert_eq!(templates.render_to_string("g", "x").unwrap(), "head body x");
}

#[test]
fn test_duplicate_names_are_rejected() {
    let mut registry = TemplateRegistry::new();
    registry.dir(TEMPLATE_DIR).parse_files("hello", ["hello.tmpl"]).unwrap();
    assert!(matches!(
        registry.parse("hello", "again"),
        Err(Error::DuplicateTemplate(_))
    ));

    registry.component("c", "x").unwrap();
    assert!(matches!(registry.component("c", "x"), Err(Error::DuplicateComponent(_))));
    assert!(matches!(registry.component("", "x"), Err(Error::EmptyComponentName)));
}

#[test]
fn test_component_call_errors() {
    let mut registry = TemplateRegistry::new();
    registry
        .component("c", "{{.}}")
        .unwrap()
        .parse("two", r#"{{component "c" "a" "b"}}"#)
        .unwrap()
        .parse("unknown", r#"{{component "missing"}}"#)
        .unwrap();
    let templates = registry.freeze();

    let err = templates.render_to_string("two", &json!(null)).unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::ComponentArgs { count: 2, .. })));
    assert!(err.is_fatal());

    let err = templates.render_to_string("unknown", &json!(null)).unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::UnknownComponent(_))));
    assert!(err.is_fatal());
}

#[test]
fn test_minify_failure_is_not_fatal() {
    let mut registry = TemplateRegistry::new();
    registry.parse("broken", r#"<div class="{{.}}"#).unwrap();
    registry.minify(true);
    let templates = registry.freeze();

    let err = templates.render_to_string("broken", "x").unwrap_err();
    assert!(matches!(err, Error::Minify(_)));
    assert_eq!(err.kind(), stagehand::ErrorKind::Recoverable);
}
