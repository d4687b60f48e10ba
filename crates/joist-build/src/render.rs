//! Page rendering: manifest metadata plus navigation context through a
//! template.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::Value;
use pulldown_cmark::{html, Options, Parser};

use joist_site::{Crumb, ManifestEntry, RenderContext};

use crate::templates::{TemplateError, TemplateStore};

/// Errors raised while rendering one page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to read content file {path}: {source}")]
    Content {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Render one page. Pure function of the entry, its navigation context,
/// and the template store, so pages render independently and in parallel.
///
/// Binding precedence, lowest to highest: navigation context, manifest
/// title, Markdown `content`, manifest attributes.
pub fn render_page(
    store: &TemplateStore,
    src_root: &Path,
    entry: &ManifestEntry,
    ctx: &RenderContext,
) -> Result<Vec<u8>, RenderError> {
    let mut bindings: BTreeMap<String, Value> = BTreeMap::new();

    bindings.insert(
        "path".to_string(),
        Value::from_safe_string(ctx.path.clone()),
    );
    bindings.insert(
        "breadcrumb".to_string(),
        ctx.breadcrumb.iter().map(crumb_value).collect(),
    );
    bindings.insert("prev".to_string(), opt_crumb_value(&ctx.prev));
    bindings.insert("next".to_string(), opt_crumb_value(&ctx.next));
    bindings.insert(
        "children".to_string(),
        ctx.children.iter().map(crumb_value).collect(),
    );
    bindings.insert("title".to_string(), Value::from(entry.title.as_str()));

    if let Some(content) = &entry.content {
        let content_path = src_root.join(content);
        let markdown =
            std::fs::read_to_string(&content_path).map_err(|source| RenderError::Content {
                path: content_path,
                source,
            })?;
        // Rendered Markdown is already HTML; exempt it from auto-escaping.
        bindings.insert(
            "content".to_string(),
            Value::from_safe_string(render_markdown(&markdown)),
        );
    }

    // Manifest attributes are the page-local source of truth; they win
    // every key collision.
    for (key, value) in &entry.attributes {
        if let Some(key) = key.as_str() {
            bindings.insert(key.to_string(), Value::from_serialize(value));
        }
    }

    let rendered = store.render(&entry.template, bindings.into_iter().collect())?;
    Ok(rendered.into_bytes())
}

/// Build the template value for one navigation entry. Paths are joined
/// from validated slugs and can never carry HTML metacharacters, so they
/// are exempt from auto-escaping and hrefs render cleanly.
fn crumb_value(crumb: &Crumb) -> Value {
    [
        ("title".to_string(), Value::from(crumb.title.as_str())),
        (
            "path".to_string(),
            Value::from_safe_string(crumb.path.clone()),
        ),
    ]
    .into_iter()
    .collect()
}

fn opt_crumb_value(crumb: &Option<Crumb>) -> Value {
    match crumb {
        Some(crumb) => crumb_value(crumb),
        None => Value::from(()),
    }
}

/// Render Markdown to HTML.
pub(crate) fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(source, options);

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
