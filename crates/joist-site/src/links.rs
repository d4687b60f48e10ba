//! Link resolution: output paths, breadcrumbs, and sibling navigation.

use std::collections::HashMap;

use serde::Serialize;

use crate::manifest::{ManifestError, ManifestStore, PageId};
use crate::sitemap::{NodeId, SiteTree};

/// One breadcrumb or navigation entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crumb {
    pub title: String,
    pub path: String,
}

/// Derived navigational context for one page.
///
/// Computed once per build, consumed by the renderer, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderContext {
    /// Canonical output path, e.g. `/about/`
    pub path: String,

    /// Ordered from the root to this page, inclusive
    pub breadcrumb: Vec<Crumb>,

    /// Previous sibling in declared order, absent for the first child
    pub prev: Option<Crumb>,

    /// Next sibling in declared order, absent for the last child
    pub next: Option<Crumb>,

    /// This page's children in declared order
    pub children: Vec<Crumb>,
}

/// Compute the output path and navigation context for every node.
///
/// Pre-order walk with a path stack of slugs: the root maps to
/// `site_root`, each child appends its own slug as one path segment.
/// Resolving the same tree twice yields identical results; nothing here
/// depends on rendering order.
pub fn resolve_links(
    tree: &SiteTree,
    manifest: &ManifestStore,
    site_root: &str,
) -> Result<HashMap<PageId, RenderContext>, ManifestError> {
    let order = tree.preorder();

    // Paths first; every other piece of context is phrased in terms of them.
    let mut paths: HashMap<NodeId, String> = HashMap::with_capacity(order.len());
    for &id in &order {
        let node = tree.node(id);
        let path = match node.parent {
            None => site_root.to_string(),
            Some(parent) => format!("{}{}/", paths[&parent], node.slug),
        };
        paths.insert(id, path);
    }

    let crumb = |id: NodeId| -> Result<Crumb, ManifestError> {
        let node = tree.node(id);
        Ok(Crumb {
            title: manifest.lookup(&node.page)?.title.clone(),
            path: paths[&id].clone(),
        })
    };

    let mut contexts = HashMap::with_capacity(order.len());
    for &id in &order {
        let node = tree.node(id);

        let mut breadcrumb = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            breadcrumb.push(crumb(c)?);
            cursor = tree.node(c).parent;
        }
        breadcrumb.reverse();

        let (prev, next) = match node.parent {
            None => (None, None),
            Some(parent) => {
                let siblings = &tree.node(parent).children;
                match siblings.iter().position(|&s| s == id) {
                    Some(pos) => {
                        let prev = match pos.checked_sub(1) {
                            Some(i) => Some(crumb(siblings[i])?),
                            None => None,
                        };
                        let next = match siblings.get(pos + 1) {
                            Some(&s) => Some(crumb(s)?),
                            None => None,
                        };
                        (prev, next)
                    }
                    None => (None, None),
                }
            }
        };

        let children = node
            .children
            .iter()
            .map(|&c| crumb(c))
            .collect::<Result<Vec<_>, _>>()?;

        contexts.insert(
            node.page.clone(),
            RenderContext {
                path: paths[&id].clone(),
                breadcrumb,
                prev,
                next,
                children,
            },
        );
    }

    Ok(contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::SiteTree;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn fixture(manifest_yaml: &str, sitemap_yaml: &str) -> (ManifestStore, SiteTree) {
        let temp = tempdir().unwrap();
        let manifest_path = temp.path().join("manifest.yaml");
        let sitemap_path = temp.path().join("sitemap.yaml");
        fs::write(&manifest_path, manifest_yaml).unwrap();
        fs::write(&sitemap_path, sitemap_yaml).unwrap();

        let manifest = ManifestStore::load(&manifest_path).unwrap();
        let tree = SiteTree::load(&sitemap_path, &manifest.page_ids()).unwrap();
        (manifest, tree)
    }

    const TWO_PAGE_MANIFEST: &str = r#"
- {id: home, title: Home, template: base.tmpl}
- {id: about, title: About, template: base.tmpl}
"#;

    const TWO_PAGE_SITEMAP: &str = r#"
- {page: home, slug: /}
- {page: about, slug: about, parent: home}
"#;

    #[test]
    fn resolves_root_and_child_paths() {
        let (manifest, tree) = fixture(TWO_PAGE_MANIFEST, TWO_PAGE_SITEMAP);

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        assert_eq!(contexts[&PageId::new("home")].path, "/");
        assert_eq!(contexts[&PageId::new("about")].path, "/about/");
    }

    #[test]
    fn breadcrumb_runs_from_root_to_self() {
        let (manifest, tree) = fixture(TWO_PAGE_MANIFEST, TWO_PAGE_SITEMAP);

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        let about = &contexts[&PageId::new("about")];
        assert_eq!(
            about.breadcrumb,
            vec![
                Crumb {
                    title: "Home".to_string(),
                    path: "/".to_string()
                },
                Crumb {
                    title: "About".to_string(),
                    path: "/about/".to_string()
                },
            ]
        );
    }

    #[test]
    fn only_child_has_no_siblings() {
        let (manifest, tree) = fixture(TWO_PAGE_MANIFEST, TWO_PAGE_SITEMAP);

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        let home = &contexts[&PageId::new("home")];
        assert_eq!(home.prev, None);
        assert_eq!(home.next, None);

        let about = &contexts[&PageId::new("about")];
        assert_eq!(about.prev, None);
        assert_eq!(about.next, None);
    }

    #[test]
    fn siblings_link_in_declared_order() {
        let (manifest, tree) = fixture(
            r#"
- {id: home, title: Home, template: base.tmpl}
- {id: a, title: Alpha, template: base.tmpl}
- {id: b, title: Beta, template: base.tmpl}
- {id: c, title: Gamma, template: base.tmpl}
"#,
            r#"
- {page: home, slug: /}
- {page: a, slug: a, parent: home}
- {page: b, slug: b, parent: home}
- {page: c, slug: c, parent: home}
"#,
        );

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        let b = &contexts[&PageId::new("b")];
        assert_eq!(b.prev.as_ref().map(|c| c.path.as_str()), Some("/a/"));
        assert_eq!(b.next.as_ref().map(|c| c.path.as_str()), Some("/c/"));

        let a = &contexts[&PageId::new("a")];
        assert_eq!(a.prev, None);
        assert_eq!(a.next.as_ref().map(|c| c.path.as_str()), Some("/b/"));

        let c = &contexts[&PageId::new("c")];
        assert_eq!(c.prev.as_ref().map(|c| c.path.as_str()), Some("/b/"));
        assert_eq!(c.next, None);
    }

    #[test]
    fn nested_paths_join_ancestor_slugs() {
        let (manifest, tree) = fixture(
            r#"
- {id: home, title: Home, template: base.tmpl}
- {id: docs, title: Docs, template: base.tmpl}
- {id: install, title: Install, template: base.tmpl}
"#,
            r#"
- {page: home, slug: /}
- {page: docs, slug: docs, parent: home}
- {page: install, slug: install, parent: docs}
"#,
        );

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        let install = &contexts[&PageId::new("install")];
        assert_eq!(install.path, "/docs/install/");
        assert_eq!(install.breadcrumb.len(), 3);
        assert_eq!(install.breadcrumb[1].path, "/docs/");
    }

    #[test]
    fn children_are_exposed_in_declared_order() {
        let (manifest, tree) = fixture(
            r#"
- {id: home, title: Home, template: base.tmpl}
- {id: z, title: Zeta, template: base.tmpl}
- {id: a, title: Alpha, template: base.tmpl}
"#,
            r#"
- {page: home, slug: /}
- {page: z, slug: z, parent: home}
- {page: a, slug: a, parent: home}
"#,
        );

        let contexts = resolve_links(&tree, &manifest, "/").unwrap();

        let home = &contexts[&PageId::new("home")];
        let titles: Vec<_> = home.children.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let (manifest, tree) = fixture(TWO_PAGE_MANIFEST, TWO_PAGE_SITEMAP);

        let first = resolve_links(&tree, &manifest, "/").unwrap();
        let second = resolve_links(&tree, &manifest, "/").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn honors_configured_site_root() {
        let (manifest, tree) = fixture(TWO_PAGE_MANIFEST, TWO_PAGE_SITEMAP);

        let contexts = resolve_links(&tree, &manifest, "/docs/").unwrap();

        assert_eq!(contexts[&PageId::new("home")].path, "/docs/");
        assert_eq!(contexts[&PageId::new("about")].path, "/docs/about/");
    }
}
