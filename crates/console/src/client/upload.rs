//! Per-console upload tracking.
//!
//! Every file gets its own entry and its own [`CancellationToken`];
//! cancelling one upload never touches the others.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AnnexReceipt, AnnexUpload, ConsoleApi};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Completed,
    Failed,
    Stopped,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Stopped => "stopped",
        }
    }

    /// Whether the file still counts against the tray limits.
    fn is_held(self) -> bool {
        !matches!(self, UploadStatus::Failed | UploadStatus::Stopped)
    }

    fn is_running(self) -> bool {
        matches!(self, UploadStatus::Idle | UploadStatus::Uploading)
    }
}

/// A file in the upload tray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadEntry {
    pub id: Uuid,
    pub file_name: String,
    pub size: u64,
    pub status: UploadStatus,
    /// Percent, 0-100.
    pub progress: u8,
    pub annex_id: Option<String>,
    pub preview_url: Option<String>,
    pub error: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("at most {max} files can be uploaded")]
    TooManyFiles { max: usize },

    #[error("files exceed the {max_bytes} byte upload limit")]
    TooLarge { max_bytes: u64 },

    #[error("no upload with id {0}")]
    Unknown(Uuid),

    #[error("upload {0} is no longer running")]
    NotRunning(Uuid),
}

struct Tracked {
    entry: UploadEntry,
    cancel: CancellationToken,
}

/// Upload tray for one console.
pub struct UploadTracker {
    max_files: usize,
    max_total_bytes: u64,
    entries: Mutex<Vec<Tracked>>,
}

impl UploadTracker {
    pub fn new(max_files: usize, max_total_bytes: u64) -> Self {
        Self {
            max_files,
            max_total_bytes,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Add a file to the tray, enforcing count and size limits.
    pub fn register(
        &self,
        file_name: impl Into<String>,
        size: u64,
    ) -> Result<(Uuid, CancellationToken), UploadError> {
        let mut entries = self.entries.lock();

        let held: Vec<_> = entries.iter().filter(|t| t.entry.status.is_held()).collect();
        if held.len() >= self.max_files {
            return Err(UploadError::TooManyFiles {
                max: self.max_files,
            });
        }
        let total: u64 = held.iter().map(|t| t.entry.size).sum();
        if total.saturating_add(size) > self.max_total_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_total_bytes,
            });
        }

        let id = Uuid::now_v7();
        let cancel = CancellationToken::new();
        entries.push(Tracked {
            entry: UploadEntry {
                id,
                file_name: file_name.into(),
                size,
                status: UploadStatus::Idle,
                progress: 0,
                annex_id: None,
                preview_url: None,
                error: None,
                created: Utc::now(),
            },
            cancel: cancel.clone(),
        });
        Ok((id, cancel))
    }

    fn update<F>(&self, id: Uuid, f: F) -> Result<(), UploadError>
    where
        F: FnOnce(&mut UploadEntry) -> Result<(), UploadError>,
    {
        let mut entries = self.entries.lock();
        let tracked = entries
            .iter_mut()
            .find(|t| t.entry.id == id)
            .ok_or(UploadError::Unknown(id))?;
        f(&mut tracked.entry)
    }

    pub fn mark_uploading(&self, id: Uuid) -> Result<(), UploadError> {
        self.update(id, |e| {
            if e.status != UploadStatus::Idle {
                return Err(UploadError::NotRunning(id));
            }
            e.status = UploadStatus::Uploading;
            Ok(())
        })
    }

    /// Record success. Ignored once the upload was stopped.
    pub fn mark_completed(&self, id: Uuid, receipt: AnnexReceipt) -> Result<(), UploadError> {
        self.update(id, |e| {
            if !e.status.is_running() {
                return Err(UploadError::NotRunning(id));
            }
            e.status = UploadStatus::Completed;
            e.progress = 100;
            e.annex_id = Some(receipt.id);
            e.preview_url = receipt.preview_url;
            Ok(())
        })
    }

    pub fn mark_failed(&self, id: Uuid, message: impl Into<String>) -> Result<(), UploadError> {
        self.update(id, |e| {
            if !e.status.is_running() {
                return Err(UploadError::NotRunning(id));
            }
            e.status = UploadStatus::Failed;
            e.error = Some(message.into());
            Ok(())
        })
    }

    /// Stop one upload and abort its request.
    pub fn cancel(&self, id: Uuid) -> Result<(), UploadError> {
        let mut entries = self.entries.lock();
        let tracked = entries
            .iter_mut()
            .find(|t| t.entry.id == id)
            .ok_or(UploadError::Unknown(id))?;
        if !tracked.entry.status.is_running() {
            return Err(UploadError::NotRunning(id));
        }
        tracked.entry.status = UploadStatus::Stopped;
        tracked.cancel.cancel();
        Ok(())
    }

    /// Drop an entry from the tray, cancelling it if still running.
    pub fn remove(&self, id: Uuid) -> Option<UploadEntry> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|t| t.entry.id == id)?;
        let tracked = entries.remove(pos);
        tracked.cancel.cancel();
        Some(tracked.entry)
    }

    pub fn get(&self, id: Uuid) -> Option<UploadEntry> {
        self.entries
            .lock()
            .iter()
            .find(|t| t.entry.id == id)
            .map(|t| t.entry.clone())
    }

    pub fn list(&self) -> Vec<UploadEntry> {
        self.entries.lock().iter().map(|t| t.entry.clone()).collect()
    }

    /// Cancel everything still running.
    pub fn cancel_all(&self) {
        for tracked in self.entries.lock().iter_mut() {
            if tracked.entry.status.is_running() {
                tracked.entry.status = UploadStatus::Stopped;
                tracked.cancel.cancel();
            }
        }
    }
}

/// Drive one registered upload to completion or cancellation.
///
/// Returns the final status. An `Err` means the file service refused the
/// session token; the entry is already marked failed and the caller owns
/// ending the session.
pub async fn run_upload(
    tracker: Arc<UploadTracker>,
    api: Arc<dyn ConsoleApi>,
    token: String,
    id: Uuid,
    cancel: CancellationToken,
    upload: AnnexUpload,
) -> Result<UploadStatus, ApiError> {
    if tracker.mark_uploading(id).is_err() {
        return Ok(UploadStatus::Stopped);
    }

    let file_name = upload.file_name.clone();
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = api.upload_annex(&token, upload) => Some(result),
    };

    match result {
        None => {
            info!(%id, file = %file_name, "upload stopped");
            Ok(UploadStatus::Stopped)
        }
        Some(Ok(receipt)) => match tracker.mark_completed(id, receipt) {
            Ok(()) => {
                info!(%id, file = %file_name, "upload completed");
                Ok(UploadStatus::Completed)
            }
            Err(_) => Ok(UploadStatus::Stopped),
        },
        Some(Err(e)) => {
            warn!(%id, file = %file_name, error = %e, "upload failed");
            let status = match tracker.mark_failed(id, e.notice_text()) {
                Ok(()) => UploadStatus::Failed,
                Err(_) => UploadStatus::Stopped,
            };
            if e.is_unauthorized() {
                return Err(e);
            }
            Ok(status)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn receipt(id: &str) -> AnnexReceipt {
        AnnexReceipt {
            id: id.to_string(),
            preview_url: Some(format!("/preview/{id}")),
        }
    }

    #[test]
    fn enforces_file_count() {
        let tracker = UploadTracker::new(2, 1_000);
        tracker.register("a.txt", 1).unwrap();
        tracker.register("b.txt", 1).unwrap();
        assert_eq!(
            tracker.register("c.txt", 1).unwrap_err(),
            UploadError::TooManyFiles { max: 2 }
        );
    }

    #[test]
    fn enforces_total_size() {
        let tracker = UploadTracker::new(5, 100);
        tracker.register("a.bin", 60).unwrap();
        assert_eq!(
            tracker.register("b.bin", 41).unwrap_err(),
            UploadError::TooLarge { max_bytes: 100 }
        );
        tracker.register("c.bin", 40).unwrap();
    }

    #[test]
    fn stopped_files_free_their_slot() {
        let tracker = UploadTracker::new(1, 100);
        let (id, _) = tracker.register("a.bin", 90).unwrap();
        tracker.cancel(id).unwrap();
        tracker.register("b.bin", 90).unwrap();
    }

    #[test]
    fn cancel_only_affects_one_file() {
        let tracker = UploadTracker::new(5, 1_000);
        let (a, a_cancel) = tracker.register("a", 1).unwrap();
        let (b, b_cancel) = tracker.register("b", 1).unwrap();
        tracker.mark_uploading(a).unwrap();
        tracker.mark_uploading(b).unwrap();

        tracker.cancel(a).unwrap();

        assert!(a_cancel.is_cancelled());
        assert!(!b_cancel.is_cancelled());
        assert_eq!(tracker.get(a).unwrap().status, UploadStatus::Stopped);
        assert_eq!(tracker.get(b).unwrap().status, UploadStatus::Uploading);
    }

    #[test]
    fn completion_after_stop_is_rejected() {
        let tracker = UploadTracker::new(5, 1_000);
        let (id, _) = tracker.register("a", 1).unwrap();
        tracker.cancel(id).unwrap();
        assert_eq!(
            tracker.mark_completed(id, receipt("x")),
            Err(UploadError::NotRunning(id))
        );
        assert_eq!(tracker.cancel(id), Err(UploadError::NotRunning(id)));
    }

    #[test]
    fn completion_records_receipt() {
        let tracker = UploadTracker::new(5, 1_000);
        let (id, _) = tracker.register("a", 1).unwrap();
        tracker.mark_uploading(id).unwrap();
        tracker.mark_completed(id, receipt("annex-9")).unwrap();

        let entry = tracker.get(id).unwrap();
        assert_eq!(entry.status, UploadStatus::Completed);
        assert_eq!(entry.progress, 100);
        assert_eq!(entry.annex_id.as_deref(), Some("annex-9"));
        assert_eq!(entry.preview_url.as_deref(), Some("/preview/annex-9"));
    }

    #[test]
    fn remove_cancels_running_upload() {
        let tracker = UploadTracker::new(5, 1_000);
        let (id, cancel) = tracker.register("a", 1).unwrap();
        assert_eq!(tracker.remove(id).map(|e| e.file_name), Some("a".to_string()));
        assert!(cancel.is_cancelled());
        assert!(tracker.list().is_empty());
        assert_eq!(tracker.cancel(id), Err(UploadError::Unknown(id)));
    }
}
