//! Sitemap parsing, validation, and tree construction.
//!
//! The sitemap file is a flat YAML sequence of nodes with parent
//! references. Validation turns it into an arena-backed tree whose
//! pre-order traversal (children in declared order) is the canonical
//! build order.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::manifest::PageId;

/// Index of a node within the sitemap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One position in the sitemap tree.
#[derive(Debug)]
pub struct SiteNode {
    /// The page this node is bound to
    pub page: PageId,

    /// This node's own path segment (`/` for the root)
    pub slug: String,

    /// Parent node, absent for the root
    pub parent: Option<NodeId>,

    /// Children in declared order
    pub children: Vec<NodeId>,
}

/// A sitemap node as written in the file.
#[derive(Debug, Deserialize)]
struct RawNode {
    page: PageId,
    slug: String,
    #[serde(default)]
    parent: Option<PageId>,
}

/// Errors raised while loading or validating the sitemap.
#[derive(Debug, thiserror::Error)]
pub enum SitemapError {
    #[error("failed to read sitemap {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed sitemap {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("sitemap references unknown page id \"{id}\"")]
    UnknownPage { id: PageId },

    #[error("duplicate slug \"{slug}\" among children of \"{parent}\"")]
    DuplicateSlug { slug: String, parent: PageId },

    #[error("sitemap node \"{id}\" is part of a parent cycle")]
    Cycle { id: PageId },
}

fn slug_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("slug pattern is valid")
    })
}

/// Immutable sitemap tree backed by an index arena.
#[derive(Debug)]
pub struct SiteTree {
    nodes: Vec<SiteNode>,
    root: NodeId,
}

impl SiteTree {
    /// Load a sitemap and validate it against the manifest's id set.
    ///
    /// Validation covers: every referenced page exists in `known_ids`,
    /// page ids are unique within the sitemap, exactly one root, parent
    /// references resolve, no parent cycles, slugs are well formed and
    /// unique among siblings.
    pub fn load(path: &Path, known_ids: &HashSet<PageId>) -> Result<Self, SitemapError> {
        let text = std::fs::read_to_string(path).map_err(|source| SitemapError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: Vec<RawNode> = serde_yaml::from_str(&text).map_err(|e| SitemapError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_raw(raw, known_ids, path)
    }

    fn from_raw(
        raw: Vec<RawNode>,
        known_ids: &HashSet<PageId>,
        path: &Path,
    ) -> Result<Self, SitemapError> {
        let parse = |message: String| SitemapError::Parse {
            path: path.to_path_buf(),
            message,
        };

        if raw.is_empty() {
            return Err(parse("sitemap is empty".to_string()));
        }

        // Page ids must be unique within the sitemap because parent
        // references are written in terms of them.
        let mut index: HashMap<PageId, usize> = HashMap::with_capacity(raw.len());
        for (i, node) in raw.iter().enumerate() {
            if !known_ids.contains(&node.page) {
                return Err(SitemapError::UnknownPage {
                    id: node.page.clone(),
                });
            }
            if index.insert(node.page.clone(), i).is_some() {
                return Err(parse(format!(
                    "page \"{}\" appears more than once",
                    node.page
                )));
            }
        }

        let mut root: Option<usize> = None;
        for (i, node) in raw.iter().enumerate() {
            match &node.parent {
                None => {
                    if node.slug != "/" {
                        return Err(parse(format!(
                            "root node \"{}\" must have slug \"/\", got \"{}\"",
                            node.page, node.slug
                        )));
                    }
                    if let Some(existing) = root.replace(i) {
                        return Err(parse(format!(
                            "multiple root nodes: \"{}\" and \"{}\"",
                            raw[existing].page, node.page
                        )));
                    }
                }
                Some(parent) => {
                    if !index.contains_key(parent) {
                        return Err(parse(format!(
                            "node \"{}\" has missing parent ref \"{}\"",
                            node.page, parent
                        )));
                    }
                    if !slug_pattern().is_match(&node.slug) {
                        return Err(parse(format!(
                            "node \"{}\" has invalid slug \"{}\"",
                            node.page, node.slug
                        )));
                    }
                }
            }
        }
        let root = root.ok_or_else(|| parse("sitemap has no root node".to_string()))?;

        // Build the arena, attaching children in declared order.
        let mut nodes: Vec<SiteNode> = raw
            .iter()
            .map(|r| SiteNode {
                page: r.page.clone(),
                slug: r.slug.clone(),
                parent: r.parent.as_ref().map(|p| NodeId(index[p])),
                children: Vec::new(),
            })
            .collect();

        for (i, r) in raw.iter().enumerate() {
            if let Some(parent) = &r.parent {
                nodes[index[parent]].children.push(NodeId(i));
            }
        }

        // A node on a parent cycle can never reach the root, so anything
        // left unvisited after a walk from the root sits on one.
        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            seen[i] = true;
            stack.extend(nodes[i].children.iter().map(|&NodeId(c)| c));
        }
        if let Some(i) = seen.iter().position(|&s| !s) {
            return Err(SitemapError::Cycle {
                id: nodes[i].page.clone(),
            });
        }

        // Sibling slugs must be unique or output paths would collide.
        for node in &nodes {
            let mut slugs = HashSet::new();
            for &NodeId(c) in &node.children {
                if !slugs.insert(nodes[c].slug.as_str()) {
                    return Err(SitemapError::DuplicateSlug {
                        slug: nodes[c].slug.clone(),
                        parent: node.page.clone(),
                    });
                }
            }
        }

        Ok(Self {
            nodes,
            root: NodeId(root),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SiteNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical build order: pre-order, children in declared order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.walk(self.root, &mut order);
        order
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in &self.node(id).children {
            self.walk(child, out);
        }
    }
}
