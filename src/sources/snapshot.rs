use crate::data::{FetchError, Fetcher, RawRow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads previously captured raw rows from a JSON file.
///
/// The file holds an array of row objects, each with its display-text fields
/// and a `source` array, e.g.
/// `{"ticker": "ABC", "marketCap": "128.682M", "source": ["Yahoo Finance"]}`.
/// Rows are returned in file order.
pub struct SnapshotFile {
    path: PathBuf,
    name: String,
}

impl SnapshotFile {
    /// Creates a fetcher over the file at `path`, named after it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("snapshot {}", path.display()),
            path,
        }
    }
}

#[async_trait]
impl Fetcher for SnapshotFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawRow>, FetchError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let rows: Vec<RawRow> = serde_json::from_str(&text)?;
        Ok(rows)
    }
}
