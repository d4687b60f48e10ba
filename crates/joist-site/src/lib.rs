//! Site model for the joist static-site builder.
//!
//! This crate parses the page manifest and the sitemap into an immutable
//! site model and derives per-page navigational context (output paths,
//! breadcrumbs, sibling links).

pub mod links;
pub mod manifest;
pub mod sitemap;

pub use links::{resolve_links, Crumb, RenderContext};
pub use manifest::{ManifestEntry, ManifestError, ManifestStore, PageId, TemplateRef};
pub use sitemap::{NodeId, SiteNode, SiteTree, SitemapError};
