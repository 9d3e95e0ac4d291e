use std::path::{Path, PathBuf};

use crate::error::Result;

/// Recursively collect every file under `root`.
///
/// Hidden files and directories (names starting with `.`) are skipped.
/// Unsupported file types are still returned; the ingestion pipeline decides
/// what it can handle. Results are absolute paths, sorted so ingestion order
/// is deterministic.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &mut results)?;
    results.sort();
    Ok(results)
}

fn walk_dir(current: &Path, results: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(&entry.path(), results)?;
        } else if file_type.is_file() {
            results.push(entry.path().canonicalize()?);
        }
        // Symlinks are skipped: following them risks cycles and files
        // outside the tree being ingested.
    }

    Ok(())
}
