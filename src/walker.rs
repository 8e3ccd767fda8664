use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::error::{Error, Result};

/// Default file name pattern for corpus documents.
pub const DEFAULT_PATTERN: &str = "*.txt";

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the corpus root directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

impl DiscoveredFile {
    /// Source identifier recorded on every chunk of this file: the relative
    /// path with `/` separators.
    pub fn source_id(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Compile a file name pattern such as `*.txt` or `*.{md,txt}`.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| {
            Error::Config(format!("invalid file pattern '{pattern}': {e}"))
        })
}

/// Recursively walk a directory and discover document files whose name
/// matches `pattern`.
///
/// Skips hidden files/directories (names starting with `.`). Results are
/// sorted by relative path so ingestion order is reproducible.
pub fn discover_files(
    root: &Path,
    pattern: &GlobMatcher,
) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(Error::NotFound {
            kind: "corpus directory",
            name: root.display().to_string(),
        });
    }

    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, pattern, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    pattern: &GlobMatcher,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        let matches = pattern.is_match(&*name);

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), pattern, results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Directory symlinks are never followed (cycle prevention).
            if resolved.is_file() && matches {
                results.push(make_discovered(root, &entry.path(), &resolved));
            }
        } else if file_type.is_file() && matches {
            let abs = entry.path().canonicalize()?;
            results.push(make_discovered(root, &entry.path(), &abs));
        }
    }

    Ok(())
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
) -> DiscoveredFile {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    DiscoveredFile {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
    }
}
