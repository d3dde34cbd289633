use crate::infrastructure::config::TrackingSettings;
use crate::infrastructure::storage::session_files::sanitize_file_name;
use crate::util::errors::{QuillError, QuillResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const EXPORTS_DIR: &str = "exports";
const TRACKING_FILE: &str = "usage.jsonl";

/// One line of the usage tracking log, written per export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub document_name: String,
    pub date_processed: String,
    #[serde(default)]
    pub user_email: Option<String>,
    pub input_file: String,
    pub output_file: String,
    pub execution_time_minutes: f64,
    pub record_count: usize,
    pub volume_path: String,
    pub timezone: String,
}

/// Persistent volume (a mounted directory). Without a configured root every
/// write is skipped.
#[derive(Debug, Clone)]
pub struct VolumeStore {
    root: Option<PathBuf>,
    tracking: TrackingSettings,
}

impl VolumeStore {
    pub fn new(root: Option<PathBuf>, tracking: TrackingSettings) -> Self {
        Self { root, tracking }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub async fn persist_export(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> QuillResult<Option<PathBuf>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let dir = root.join(EXPORTS_DIR);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            QuillError::Export(format!("Volume not writable: {}: {}", dir.display(), e))
        })?;
        let path = dir.join(sanitize_file_name(file_name));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| QuillError::Export(format!("Failed to write {}: {}", path.display(), e)))?;
        info!("Export persisted to volume: {}", path.display());
        Ok(Some(path))
    }

    pub async fn record_tracking(&self, record: &TrackingRecord) -> QuillResult<Option<PathBuf>> {
        if !self.tracking.enabled {
            return Ok(None);
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let dir = root.join(&self.tracking.directory);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(TRACKING_FILE);
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!("Failed to append tracking record: {}", e);
            return Err(e.into());
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TrackingRecord {
        TrackingRecord {
            document_name: "Bank RFI".to_string(),
            date_processed: "2024-05-01 10:00:00".to_string(),
            user_email: None,
            input_file: "rfi.csv".to_string(),
            output_file: "Bank RFI_answers.csv".to_string(),
            execution_time_minutes: 1.5,
            record_count: 12,
            volume_path: "/Volumes/x".to_string(),
            timezone: "+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn unconfigured_volume_skips_writes() {
        let store = VolumeStore::new(None, TrackingSettings::default());
        assert!(store.persist_export("a.csv", b"x").await.unwrap().is_none());
        assert!(store.record_tracking(&record()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_exports_and_appends_tracking_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = VolumeStore::new(Some(dir.path().to_path_buf()), TrackingSettings::default());

        let export = store.persist_export("out.csv", b"a,b\n").await.unwrap().unwrap();
        assert_eq!(export, dir.path().join("exports").join("out.csv"));

        store.record_tracking(&record()).await.unwrap();
        let path = store.record_tracking(&record()).await.unwrap().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let parsed: TrackingRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.record_count, 12);
    }

    #[tokio::test]
    async fn tracking_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let tracking = TrackingSettings {
            enabled: false,
            ..Default::default()
        };
        let store = VolumeStore::new(Some(dir.path().to_path_buf()), tracking);
        assert!(store.record_tracking(&record()).await.unwrap().is_none());
    }
}
