//! Sources for the canned response body.

use crate::error::ConnectionError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Produces the response body bytes for one request.
#[async_trait]
pub trait BodySource: Send + Sync {
    /// Load the body. Called once per request; implementations must not cache.
    async fn load(&self) -> Result<Vec<u8>, ConnectionError>;

    /// Where the body comes from, for logs.
    fn describe(&self) -> String;
}

/// Reads the body from a file on every request.
#[derive(Debug, Clone)]
pub struct FileBodySource {
    path: PathBuf,
}

impl FileBodySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BodySource for FileBodySource {
    async fn load(&self) -> Result<Vec<u8>, ConnectionError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ConnectionError::BodyUnavailable {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<ok/>").unwrap();

        let source = FileBodySource::new(file.path());
        assert_eq!(source.load().await.unwrap(), b"<ok/>");
    }

    #[tokio::test]
    async fn test_rereads_after_change() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "<first/>").unwrap();

        let source = FileBodySource::new(file.path());
        assert_eq!(source.load().await.unwrap(), b"<first/>");

        std::fs::write(file.path(), "<second/>").unwrap();
        assert_eq!(source.load().await.unwrap(), b"<second/>");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.xml");

        let source = FileBodySource::new(&path);
        match source.load().await {
            Err(ConnectionError::BodyUnavailable { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected BodyUnavailable, got {:?}", other),
        }
    }
}
