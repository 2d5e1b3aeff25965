use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::git_ops;

/// A directory found directly under the mirror root.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    pub name: String,
    pub path: PathBuf,
    pub is_working_copy: bool,
    pub branch: Option<String>,
}

/// List the immediate subdirectories of `root`, sorted by name.
///
/// A directory without a `.git` marker is reported too; the next cycle will
/// try to clone into it and fail, so it is worth seeing.
pub fn scan_mirrors(root: &Path) -> Vec<LocalMirror> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_working_copy = git_ops::is_working_copy(root, &name);
            let branch = if is_working_copy {
                git_ops::current_branch(entry.path()).ok()
            } else {
                None
            };
            LocalMirror {
                name,
                path: entry.path().to_path_buf(),
                is_working_copy,
                branch,
            }
        })
        .collect()
}
