//! Compiled template cache over the source tree.

use std::path::Path;

use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior, Value};

use joist_site::TemplateRef;

use crate::render::render_markdown;

/// Errors raised while loading or rendering a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template not found: {name}")]
    NotFound { name: String },

    #[error("template syntax error in {name}: {message}")]
    Syntax { name: String, message: String },

    #[error("render failed for {name}: {message}")]
    Render { name: String, message: String },
}

/// Loads and caches compiled templates from the source root.
///
/// Backed by a minijinja environment with a path loader: a template
/// referenced by N pages is compiled once per build, and the cache is
/// safe to fill from concurrent render workers. Undefined bindings are
/// strict errors, never silent empty strings, and every interpolation is
/// HTML-escaped unless explicitly marked safe.
///
/// Templates also get data-access helpers: `yaml(name)` and `json(name)`
/// load a structured data file from the source root, and the `markdown`
/// filter renders a string to HTML inline.
pub struct TemplateStore {
    env: Environment<'static>,
}

impl TemplateStore {
    pub fn new(src_root: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(src_root));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let root = src_root.to_path_buf();
        env.add_function("yaml", move |name: String| -> Result<Value, minijinja::Error> {
            let text = read_data_file(&root, &name)?;
            let data: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("failed to parse YAML data file {name}: {e}"),
                )
            })?;
            Ok(Value::from_serialize(&data))
        });

        let root = src_root.to_path_buf();
        env.add_function("json", move |name: String| -> Result<Value, minijinja::Error> {
            let text = read_data_file(&root, &name)?;
            let data: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("failed to parse JSON data file {name}: {e}"),
                )
            })?;
            Ok(Value::from_serialize(&data))
        });

        env.add_filter("markdown", |text: String| {
            Value::from_safe_string(render_markdown(&text))
        });

        Self { env }
    }

    /// Render the referenced template with the given bindings.
    pub fn render(
        &self,
        template: &TemplateRef,
        bindings: minijinja::Value,
    ) -> Result<String, TemplateError> {
        let name = template.as_str();
        let tmpl = self
            .env
            .get_template(name)
            .map_err(|e| classify(name, e))?;
        tmpl.render(bindings).map_err(|e| classify(name, e))
    }
}

fn read_data_file(root: &Path, name: &str) -> Result<String, minijinja::Error> {
    let path = root.join(name);
    std::fs::read_to_string(&path).map_err(|e| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("failed to read data file {}: {}", path.display(), e),
        )
    })
}

fn classify(name: &str, err: minijinja::Error) -> TemplateError {
    match err.kind() {
        ErrorKind::TemplateNotFound => TemplateError::NotFound {
            name: name.to_string(),
        },
        ErrorKind::SyntaxError => TemplateError::Syntax {
            name: name.to_string(),
            message: err.to_string(),
        },
        _ => TemplateError::Render {
            name: name.to_string(),
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn renders_template_from_source_root() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.tmpl"), "Hello {{ name }}!").unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(&TemplateRef::new("base.tmpl"), context! { name => "world" })
            .unwrap();

        assert_eq!(html, "Hello world!");
    }

    #[test]
    fn resolves_includes_against_source_root() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("base.tmpl"),
            "{% include \"header.tmpl\" %}body",
        )
        .unwrap();
        fs::write(temp.path().join("header.tmpl"), "head|").unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(&TemplateRef::new("base.tmpl"), context! {})
            .unwrap();

        assert_eq!(html, "head|body");
    }

    #[test]
    fn missing_template_is_not_found() {
        let temp = tempdir().unwrap();

        let store = TemplateStore::new(temp.path());
        let result = store.render(&TemplateRef::new("ghost.tmpl"), context! {});

        assert!(matches!(
            result,
            Err(TemplateError::NotFound { name }) if name == "ghost.tmpl"
        ));
    }

    #[test]
    fn bad_template_is_syntax_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bad.tmpl"), "{% if %}").unwrap();

        let store = TemplateStore::new(temp.path());
        let result = store.render(&TemplateRef::new("bad.tmpl"), context! {});

        assert!(matches!(result, Err(TemplateError::Syntax { .. })));
    }

    #[test]
    fn values_are_html_escaped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.tmpl"), "{{ name }}").unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(
                &TemplateRef::new("base.tmpl"),
                context! { name => "<script>alert(1)</script>" },
            )
            .unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn yaml_function_loads_data_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("team.yaml"), "- Ann\n- Ben\n").unwrap();
        fs::write(
            temp.path().join("base.tmpl"),
            "{% for name in yaml(\"team.yaml\") %}{{ name }};{% endfor %}",
        )
        .unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(&TemplateRef::new("base.tmpl"), context! {})
            .unwrap();

        assert_eq!(html, "Ann;Ben;");
    }

    #[test]
    fn json_function_loads_data_files() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("links.json"),
            r#"[{"label": "Docs"}, {"label": "Blog"}]"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("base.tmpl"),
            "{% for link in json(\"links.json\") %}{{ link.label }};{% endfor %}",
        )
        .unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(&TemplateRef::new("base.tmpl"), context! {})
            .unwrap();

        assert_eq!(html, "Docs;Blog;");
    }

    #[test]
    fn missing_data_file_is_render_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.tmpl"), "{{ yaml(\"ghost.yaml\") }}").unwrap();

        let store = TemplateStore::new(temp.path());
        let result = store.render(&TemplateRef::new("base.tmpl"), context! {});

        assert!(matches!(result, Err(TemplateError::Render { .. })));
    }

    #[test]
    fn markdown_filter_emits_unescaped_html() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.tmpl"), "{{ blurb | markdown }}").unwrap();

        let store = TemplateStore::new(temp.path());
        let html = store
            .render(
                &TemplateRef::new("base.tmpl"),
                context! { blurb => "some *text*" },
            )
            .unwrap();

        assert!(html.contains("<em>text</em>"));
        assert!(!html.contains("&lt;em&gt;"));
    }

    #[test]
    fn missing_binding_is_render_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.tmpl"), "{{ missing }}").unwrap();

        let store = TemplateStore::new(temp.path());
        let result = store.render(&TemplateRef::new("base.tmpl"), context! {});

        assert!(matches!(result, Err(TemplateError::Render { .. })));
    }
}
