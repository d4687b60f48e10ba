//! Build orchestration: load, resolve, render, atomic write.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use joist_site::{
    resolve_links, ManifestError, ManifestStore, PageId, RenderContext, SiteTree, SitemapError,
};

use crate::assets::{discover_assets, AssetOp};
use crate::render::{render_page, RenderError};
use crate::templates::TemplateStore;

/// Configuration for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Source tree with templates, content, and pass-through assets
    pub src_root: PathBuf,

    /// Page metadata manifest
    pub manifest_path: PathBuf,

    /// Site structure declaration
    pub sitemap_path: PathBuf,

    /// Output directory, replaced atomically on success
    pub target_root: PathBuf,

    /// URL prefix assigned to the sitemap root
    pub site_root: String,
}

impl BuildOptions {
    pub fn new(
        src_root: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        sitemap_path: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            src_root: src_root.into(),
            manifest_path: manifest_path.into(),
            sitemap_path: sitemap_path.into(),
            target_root: target_root.into(),
            site_root: "/".to_string(),
        }
    }
}

/// Summary of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of pages rendered
    pub pages: usize,

    /// Number of pass-through assets copied
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Target directory
    pub target_root: PathBuf,
}

/// Errors that can fail a build. All are fatal; the first one wins.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Sitemap(#[from] SitemapError),

    #[error("failed to render page \"{page}\": {source}")]
    Render {
        page: PageId,
        #[source]
        source: RenderError,
    },

    #[error("failed to copy asset {path}: {source}")]
    AssetCopy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write target tree at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything a build produces, buffered before any write to the target.
struct SiteOutput {
    pages: Vec<(PathBuf, Vec<u8>)>,
    assets: Vec<AssetOp>,
}

/// Pipeline stages as explicit states so partial-failure semantics are a
/// first-class transition: any stage error is terminal and skips Writing.
enum BuildState {
    Init,
    Loaded {
        manifest: ManifestStore,
        tree: SiteTree,
    },
    Resolved {
        manifest: ManifestStore,
        tree: SiteTree,
        contexts: HashMap<PageId, RenderContext>,
    },
    Rendered {
        output: SiteOutput,
    },
    Done {
        pages: usize,
        assets: usize,
    },
}

/// Runs the whole pipeline for one site.
pub struct SiteBuilder {
    opts: BuildOptions,
}

impl SiteBuilder {
    pub fn new(opts: BuildOptions) -> Self {
        Self { opts }
    }

    /// Run the build. The target tree is replaced wholesale on success and
    /// left untouched on any failure.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        let mut state = BuildState::Init;
        loop {
            state = self.step(state)?;
            if let BuildState::Done { pages, assets } = &state {
                let (pages, assets) = (*pages, *assets);
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::info!(pages, assets, duration_ms, "build succeeded");
                return Ok(BuildReport {
                    pages,
                    assets,
                    duration_ms,
                    target_root: self.opts.target_root.clone(),
                });
            }
        }
    }

    fn step(&self, state: BuildState) -> Result<BuildState, BuildError> {
        match state {
            BuildState::Init => {
                let manifest = ManifestStore::load(&self.opts.manifest_path)?;
                let tree = SiteTree::load(&self.opts.sitemap_path, &manifest.page_ids())?;
                tracing::debug!(entries = manifest.len(), nodes = tree.len(), "inputs loaded");
                Ok(BuildState::Loaded { manifest, tree })
            }

            BuildState::Loaded { manifest, tree } => {
                let contexts = resolve_links(&tree, &manifest, &self.opts.site_root)?;
                Ok(BuildState::Resolved {
                    manifest,
                    tree,
                    contexts,
                })
            }

            BuildState::Resolved {
                manifest,
                tree,
                contexts,
            } => {
                let output = self.render_all(&manifest, &tree, &contexts)?;
                Ok(BuildState::Rendered { output })
            }

            BuildState::Rendered { output } => {
                let pages = output.pages.len();
                let assets = output.assets.len();
                self.commit(output)?;
                Ok(BuildState::Done { pages, assets })
            }

            done @ BuildState::Done { .. } => Ok(done),
        }
    }

    /// Rendering stage: pages in parallel, assets enumerated alongside.
    /// The first render failure wins; queued work is abandoned and nothing
    /// reaches the target tree.
    fn render_all(
        &self,
        manifest: &ManifestStore,
        tree: &SiteTree,
        contexts: &HashMap<PageId, RenderContext>,
    ) -> Result<SiteOutput, BuildError> {
        let store = TemplateStore::new(&self.opts.src_root);
        let order = tree.preorder();

        let pages: Vec<(PathBuf, Vec<u8>)> = order
            .par_iter()
            .map(|&id| {
                let node = tree.node(id);
                let entry = manifest.lookup(&node.page)?;
                let ctx = &contexts[&node.page];

                let bytes = render_page(&store, &self.opts.src_root, entry, ctx).map_err(
                    |source| BuildError::Render {
                        page: node.page.clone(),
                        source,
                    },
                )?;

                tracing::debug!(page = %node.page, path = %ctx.path, "rendered");
                Ok((output_file(&ctx.path), bytes))
            })
            .collect::<Result<_, BuildError>>()?;

        let assets = discover_assets(&self.opts.src_root);

        Ok(SiteOutput { pages, assets })
    }

    /// Writing stage: stage the full tree next to the target, then swap it
    /// into place. A pre-existing target survives any failure here.
    fn commit(&self, output: SiteOutput) -> Result<(), BuildError> {
        let target = &self.opts.target_root;
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BuildError::Write { path, source }
        };

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err(&parent))?;

        let staging = tempfile::Builder::new()
            .prefix(".joist-stage-")
            .tempdir_in(&parent)
            .map_err(write_err(&parent))?;

        for (relative, bytes) in &output.pages {
            let path = staging.path().join(relative);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(write_err(dir))?;
            }
            fs::write(&path, bytes).map_err(write_err(&path))?;
        }

        for asset in &output.assets {
            let path = staging.path().join(&asset.relative);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(write_err(dir))?;
            }
            fs::copy(&asset.source, &path).map_err(|source| BuildError::AssetCopy {
                path: asset.source.clone(),
                source,
            })?;
        }

        // Staging is complete; promote it. On any swap failure, clean up
        // the orphaned staging tree before reporting.
        let staged = staging.into_path();
        let result = replace_dir(&staged, target);
        if result.is_err() {
            let _ = fs::remove_dir_all(&staged);
        }
        result.map_err(|source| BuildError::Write {
            path: target.clone(),
            source,
        })
    }
}

/// Swap the staged tree into place: move any previous build aside, rename
/// the staging tree onto the target path, then drop the old tree.
///
/// The target is never left missing: if promoting the staged tree fails
/// after the previous build was moved aside, the previous build is put
/// back before the error is reported.
fn replace_dir(staged: &Path, target: &Path) -> io::Result<()> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());
    let previous = target.with_file_name(format!(".{name}.old"));

    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }

    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &previous)?;
    }
    if let Err(err) = fs::rename(staged, target) {
        if had_previous {
            let _ = fs::rename(&previous, target);
        }
        return Err(err);
    }
    if had_previous {
        // The new tree is committed at this point; leftover cleanup must
        // not fail the build.
        if let Err(err) = fs::remove_dir_all(&previous) {
            tracing::warn!(
                "failed to remove old build at {}: {}",
                previous.display(),
                err
            );
        }
    }

    Ok(())
}

/// Map a resolved URL path to its file within the target tree: `/`
/// becomes `index.html`, `/a/b/` becomes `a/b/index.html`.
fn output_file(url_path: &str) -> PathBuf {
    let trimmed = url_path.trim_matches('/');
    if trimmed.is_empty() {
        PathBuf::from("index.html")
    } else {
        Path::new(trimmed).join("index.html")
    }
}
