//! Recording discovery.
//!
//! A missing directory is not an error: it yields an empty file set, and the
//! caller decides whether "no recordings" is fatal.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};

/// Pattern used when the caller does not supply one.
pub const DEFAULT_PATTERN: &str = "*.gdf";

/// List regular files in `root` matching the glob `pattern`.
///
/// `root` is matched literally; only `pattern` is a glob.  Order is the
/// order in which `glob` yields entries.  Unreadable entries are logged and
/// skipped.
pub fn find_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = Path::new(&glob::Pattern::escape(&root.to_string_lossy())).join(pattern);
    let full = full.to_string_lossy();
    let entries = glob::glob(&full)
        .with_context(|| format!("invalid glob pattern '{full}'"))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {e}"),
        }
    }
    debug!("{} file(s) match {full}", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_directory_is_empty() {
        let files = find_files(Path::new("/nonexistent_dir_4217"), DEFAULT_PATTERN).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn matches_extension_only() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("A01T.gdf"), "").unwrap();
        fs::write(tmp.path().join("A01E.gdf"), "").unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();
        fs::create_dir(tmp.path().join("sub.gdf")).unwrap();

        let files = find_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.extension().unwrap() == "gdf"));
    }

    #[test]
    fn root_with_glob_characters_is_literal() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("data[1]");
        let decoy = tmp.path().join("data1");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&decoy).unwrap();
        fs::write(root.join("A01T.gdf"), "").unwrap();
        fs::write(decoy.join("A09E.gdf"), "").unwrap();

        let files = find_files(&root, DEFAULT_PATTERN).unwrap();
        assert_eq!(files, vec![root.join("A01T.gdf")]);
    }

    #[test]
    fn invalid_pattern_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_files(tmp.path(), "[").is_err());
    }
}
