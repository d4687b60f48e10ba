//! Pass-through asset discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extensions owned by the template/content pipeline. Everything else
/// under the source root is copied to the target unchanged.
const PIPELINE_EXTENSIONS: [&str; 3] = ["tmpl", "jinja", "md"];

/// A single copy operation from the source tree into the target tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetOp {
    /// Absolute path of the source file
    pub source: PathBuf,

    /// Path relative to the target root
    pub relative: PathBuf,
}

/// Enumerate pass-through assets under the source root in a stable order.
pub fn discover_assets(src_root: &Path) -> Vec<AssetOp> {
    let mut ops = Vec::new();

    for entry in WalkDir::new(src_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if PIPELINE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let relative = path.strip_prefix(src_root).unwrap_or(path).to_path_buf();
        ops.push(AssetOp {
            source: path.to_path_buf(),
            relative,
        });
    }

    ops
}
