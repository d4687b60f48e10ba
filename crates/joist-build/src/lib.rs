//! Build pipeline for the joist static-site builder.
//!
//! Takes the site model from `joist-site` through template loading, page
//! rendering, and an all-or-nothing write of the target tree.

pub mod assets;
pub mod builder;
pub mod render;
pub mod templates;

pub use builder::{BuildError, BuildOptions, BuildReport, SiteBuilder};
pub use render::RenderError;
pub use templates::{TemplateError, TemplateStore};
