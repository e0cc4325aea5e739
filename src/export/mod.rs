use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ScrapeError};
use crate::post::Post;

/// What a completed scrape hands over: provider name, timestamp, and the
/// ordered deduplicated posts. The core's obligation ends here.
#[derive(Debug, Serialize)]
pub struct ScrapeResult {
    pub provider: String,
    pub date: DateTime<Utc>,
    pub posts: Vec<Post>,
}

/// Writes the result as one JSON artifact named after the provider and the
/// scrape timestamp. Returns the path written.
pub fn write_result(result: &ScrapeResult, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| {
        ScrapeError::StorageError(format!("Failed to create results directory: {}", e))
    })?;

    let path = dir.join(format!(
        "{}-{}.json",
        result.provider,
        result.date.to_rfc3339()
    ));
    let payload = serde_json::to_string(result)
        .map_err(|e| ScrapeError::StorageError(format!("Failed to serialize result: {}", e)))?;
    fs::write(&path, payload).map_err(|e| {
        ScrapeError::StorageError(format!("Failed to write result file: {}", e))
    })?;

    info!("exported {} posts to {}", result.posts.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_export_shape_and_order() {
        let dir = tempdir().unwrap();
        let result = ScrapeResult {
            provider: "x".to_string(),
            date: Utc::now(),
            posts: vec![
                Post::new("2", "second seen first", vec![], None),
                Post::new("1", "first seen second", vec!["https://m/1.jpg".into()], None),
            ],
        };

        let path = write_result(&result, dir.path()).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(written["provider"], "x");
        assert_eq!(written["posts"][0]["id"], "2");
        assert_eq!(written["posts"][1]["id"], "1");
        assert_eq!(written["posts"][1]["media"][0], "https://m/1.jpg");
    }

    #[test]
    fn test_export_creates_directory() {
        let dir = tempdir().unwrap();
        let result = ScrapeResult {
            provider: "instagram".to_string(),
            date: Utc::now(),
            posts: vec![],
        };
        let path = write_result(&result, dir.path().join("results")).unwrap();
        assert!(path.exists());
    }
}
