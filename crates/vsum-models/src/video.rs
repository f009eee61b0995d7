//! Video reference for a single pipeline run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Immutable reference to the source video of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Absolute, canonicalized path to the source file
    pub path: PathBuf,
    /// File name without extension
    pub base_name: String,
    /// Extension without the leading dot (may be empty)
    pub extension: String,
}

impl VideoRef {
    /// Resolve a user-supplied path into a video reference.
    ///
    /// The file must exist and be a regular file. Relative paths are
    /// resolved against the current directory.
    pub fn from_path(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::VideoNotFound(path.to_path_buf()));
        }

        let path = std::fs::canonicalize(path)?;
        if !path.is_file() {
            return Err(ModelError::NotAFile(path));
        }

        let base_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ModelError::InvalidFileName(path.clone()))?
            .to_string();

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            path,
            base_name,
            extension,
        })
    }

    /// Directory containing the source file.
    pub fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Key of the Work Unit directory for this video.
    pub fn unit_key(&self) -> String {
        sanitize_unit_key(&self.base_name)
    }
}

/// Sanitize a base name into a directory-safe Work Unit key.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; every other character
/// becomes `_`. Leading dots are stripped so the key is never hidden or
/// a parent reference.
pub fn sanitize_unit_key(name: &str) -> String {
    let key: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let key = key.trim_start_matches('.');
    if key.is_empty() {
        "video".to_string()
    } else {
        key.chars().take(120).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_path_derives_names() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Holiday Clip.final.mp4");
        std::fs::write(&file, b"not really a video").unwrap();

        let video = VideoRef::from_path(&file).unwrap();
        assert!(video.path.is_absolute());
        assert_eq!(video.base_name, "Holiday Clip.final");
        assert_eq!(video.extension, "mp4");
        assert_eq!(video.unit_key(), "Holiday_Clip.final");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = VideoRef::from_path("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(err, ModelError::VideoNotFound(_)));
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = VideoRef::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::NotAFile(_)));
    }

    #[test]
    fn test_sanitize_unit_key() {
        assert_eq!(sanitize_unit_key("my video"), "my_video");
        assert_eq!(sanitize_unit_key("..hidden"), "hidden");
        assert_eq!(sanitize_unit_key("..."), "video");
        assert_eq!(sanitize_unit_key("clip/../../etc"), "clip_.._.._etc");
    }
}
