//! File discovery for finding uploadable images in directories.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted for upload.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Discover all supported image files at a path.
///
/// If path is a file, returns it if supported.
/// If path is a directory, recursively finds all supported files.
pub fn discover(path: &Path) -> Vec<DiscoveredFile> {
    if path.is_file() {
        if is_supported(path) {
            if let Ok(meta) = std::fs::metadata(path) {
                return vec![DiscoveredFile {
                    path: path.to_path_buf(),
                    size: meta.len(),
                }];
            }
        }
        return vec![];
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();
        if entry_path.is_file() && is_supported(entry_path) {
            if let Ok(meta) = entry.metadata() {
                files.push(DiscoveredFile {
                    path: entry_path.to_path_buf(),
                    size: meta.len(),
                });
            }
        }
    }

    // Sort by path for deterministic ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("test.jpg")));
        assert!(is_supported(Path::new("test.JPG")));
        assert!(is_supported(Path::new("test.jpeg")));
        assert!(is_supported(Path::new("test.png")));
        assert!(!is_supported(Path::new("test.webp")));
        assert!(!is_supported(Path::new("test.txt")));
    }

    #[test]
    fn test_discover_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"xy").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"z").unwrap();

        let files = discover(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("a.jpg"));
        assert_eq!(files[0].size, 2);
        assert!(files[1].path.ends_with("b.png"));
    }
}
