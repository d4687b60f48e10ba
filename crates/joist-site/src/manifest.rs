//! Manifest parsing and lookup.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Identifier joining manifest entries to sitemap nodes.
///
/// Unique across a manifest; otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a template file, resolved relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TemplateRef(String);

impl TemplateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for a single page.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    /// Page identifier, unique across the manifest
    pub id: PageId,

    /// Page title, also used for breadcrumbs and navigation
    pub title: String,

    /// Template that renders this page
    pub template: TemplateRef,

    /// Optional Markdown file, rendered to HTML and bound as `content`
    #[serde(default)]
    pub content: Option<String>,

    /// Page-local template bindings; these win every key collision
    #[serde(default)]
    pub attributes: serde_yaml::Mapping,
}

/// Errors raised while loading or querying the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("duplicate page id \"{id}\" in manifest")]
    DuplicateId { id: PageId },

    #[error("unknown page id \"{id}\"")]
    UnknownPage { id: PageId },
}

/// Read-only mapping from page id to manifest entry.
#[derive(Debug)]
pub struct ManifestStore {
    entries: HashMap<PageId, ManifestEntry>,
}

impl ManifestStore {
    /// Load a manifest from a YAML sequence of entries.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entries: Vec<ManifestEntry> =
            serde_yaml::from_str(&text).map_err(|e| ManifestError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Self::from_entries(entries, path)
    }

    fn from_entries(entries: Vec<ManifestEntry>, path: &Path) -> Result<Self, ManifestError> {
        let mut map = HashMap::with_capacity(entries.len());

        for entry in entries {
            // Attribute keys become template bindings, so they must be strings.
            if let Some(key) = entry.attributes.keys().find(|k| k.as_str().is_none()) {
                return Err(ManifestError::Parse {
                    path: path.to_path_buf(),
                    message: format!(
                        "page \"{}\" has a non-string attribute key: {:?}",
                        entry.id, key
                    ),
                });
            }

            if map.contains_key(&entry.id) {
                return Err(ManifestError::DuplicateId { id: entry.id });
            }
            map.insert(entry.id.clone(), entry);
        }

        Ok(Self { entries: map })
    }

    /// Look up the entry for a page id.
    pub fn lookup(&self, id: &PageId) -> Result<&ManifestEntry, ManifestError> {
        self.entries
            .get(id)
            .ok_or_else(|| ManifestError::UnknownPage { id: id.clone() })
    }

    /// The set of ids known to this manifest, used to validate the sitemap.
    pub fn page_ids(&self) -> HashSet<PageId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
