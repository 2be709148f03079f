/// Persistence of a finished crawl: the tree in indented and minified
/// form, plus the build record.
use crate::error::OutputError;
use crate::model::TreeNode;
use crate::summary::BuildInfo;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TREE_FILE: &str = "tree.json";
pub const TREE_MIN_FILE: &str = "tree.min.json";
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub tree: PathBuf,
    pub tree_min: PathBuf,
    pub build_info: PathBuf,
}

/// Write `tree.json`, `tree.min.json` and `build-info.json` into `dir`,
/// creating it if needed.
pub fn write_outputs(
    dir: &Path,
    tree: &TreeNode,
    build_info: &BuildInfo,
) -> Result<WrittenFiles, OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let files = WrittenFiles {
        tree: dir.join(TREE_FILE),
        tree_min: dir.join(TREE_MIN_FILE),
        build_info: dir.join(BUILD_INFO_FILE),
    };

    write_json(&files.tree, tree, true, "tree")?;
    write_json(&files.tree_min, tree, false, "tree")?;
    write_json(&files.build_info, build_info, true, "build info")?;

    info!("Wrote tree and build info to {}", dir.display());
    Ok(files)
}

fn write_json<T: Serialize>(
    path: &Path,
    value: &T,
    pretty: bool,
    what: &'static str,
) -> Result<(), OutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|source| OutputError::Json { what, source })?;

    fs::write(path, json).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })
}
