//! Append-only JSON-lines log of enrichment snapshots.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use socialpulse_core::{EnrichmentResult, Instrument};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentLogEntry {
    pub symbol: String,
    pub name: String,
    pub logged_at: DateTime<Utc>,
    pub enrichment: EnrichmentResult,
}

/// Appends one JSON object per line; never rewrites earlier lines.
pub struct EnrichmentLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EnrichmentLog {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a snapshot, creating the file and its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] or [`StorageError::Serialize`].
    pub async fn append(
        &self,
        instrument: &Instrument,
        enrichment: &EnrichmentResult,
    ) -> Result<(), StorageError> {
        let entry = EnrichmentLogEntry {
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            logged_at: Utc::now(),
            enrichment: enrichment.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(symbol = %instrument.symbol, path = %self.path.display(), "appended enrichment snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn enrichment(query: &str) -> EnrichmentResult {
        EnrichmentResult {
            interest_over_time: vec![],
            related_queries: vec![query.to_string()],
            interest_by_region: BTreeMap::from([("Ohio".to_string(), 42.0)]),
            fetched_at: None,
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let log = EnrichmentLog::new(dir.path().join("nested").join("enrichment.jsonl"));
        let aapl = Instrument::unlisted("AAPL");

        log.append(&aapl, &enrichment("first")).await.unwrap();
        log.append(&aapl, &enrichment("second")).await.unwrap();

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let entries: Vec<EnrichmentLogEntry> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].symbol, "AAPL");
        assert_eq!(entries[0].enrichment.related_queries, vec!["first"]);
        assert_eq!(entries[1].enrichment.related_queries, vec!["second"]);
    }
}
