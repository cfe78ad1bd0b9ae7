//! Capture directory scanner
//!
//! Non-recursive discovery of image files, ordered oldest-first by
//! modification time. Captures are a time-ordered stream, so FIFO keeps the
//! oldest unprocessed evidence from going stale.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions the camera produces
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Capture scanner errors. Any of these is fatal to a queue run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Capture directory does not exist
    #[error("Capture directory not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot read directory contents or file metadata
    #[error("Cannot read {0}: {1}")]
    ReadError(PathBuf, String),
}

/// One discovered capture file
#[derive(Debug, Clone)]
pub struct DiscoveredImage {
    pub path: PathBuf,
    pub filename: String,
    /// Last-modified time; FIFO key and fallback upload timestamp
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Capture directory scanner
#[derive(Debug, Clone)]
pub struct CaptureScanner {
    dir: PathBuf,
}

impl CaptureScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Enumerate capture files sorted by modification time ascending.
    ///
    /// Ties are broken by filename so the order stays deterministic.
    pub fn scan_fifo(&self) -> Result<Vec<DiscoveredImage>, ScanError> {
        if !self.dir.exists() {
            return Err(ScanError::PathNotFound(self.dir.clone()));
        }
        if !self.dir.is_dir() {
            return Err(ScanError::NotADirectory(self.dir.clone()));
        }

        let mut images = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry
                .map_err(|e| ScanError::ReadError(self.dir.clone(), e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_path_buf();
            if !has_image_extension(&path) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| ScanError::ReadError(path.clone(), e.to_string()))?;
            let modified = metadata
                .modified()
                .map_err(|e| ScanError::ReadError(path.clone(), e.to_string()))?;

            images.push(DiscoveredImage {
                filename: entry.file_name().to_string_lossy().into_owned(),
                modified: DateTime::<Utc>::from(modified),
                size_bytes: metadata.len(),
                path,
            });
        }

        images.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        Ok(images)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File, OpenOptions};
    use std::time::{Duration, SystemTime};

    fn touch_with_mtime(path: &Path, mtime: SystemTime) {
        File::create(path).unwrap();
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_times(std::fs::FileTimes::new().set_modified(mtime))
            .unwrap();
    }

    #[test]
    fn extension_filter() {
        assert!(has_image_extension(Path::new("a.jpg")));
        assert!(has_image_extension(Path::new("a.JPEG")));
        assert!(has_image_extension(Path::new("a.webp")));
        assert!(!has_image_extension(Path::new("a.txt")));
        assert!(!has_image_extension(Path::new("noext")));
    }

    #[test]
    fn fifo_order_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(600);

        // Create out of lexical order so only mtime can explain the result
        touch_with_mtime(&dir.path().join("c.jpg"), base);
        touch_with_mtime(&dir.path().join("a.jpg"), base + Duration::from_secs(120));
        touch_with_mtime(&dir.path().join("b.png"), base + Duration::from_secs(60));
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let scanner = CaptureScanner::new(dir.path());
        let images = scanner.scan_fifo().unwrap();

        let names: Vec<_> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["c.jpg", "b.png", "a.jpg"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let scanner = CaptureScanner::new("/nonexistent/captures");
        match scanner.scan_fifo() {
            Err(ScanError::PathNotFound(_)) => {}
            other => panic!("expected PathNotFound, got {:?}", other),
        }
    }

    #[test]
    fn empty_directory_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = CaptureScanner::new(dir.path());
        assert!(scanner.scan_fifo().unwrap().is_empty());
    }
}
