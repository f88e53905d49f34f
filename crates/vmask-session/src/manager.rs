//! Session lifecycle and the region import merge policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::error::{AnnotationError, SessionResult};
use crate::store::SessionStore;
use vmask_models::{AnnotationSession, KeyFrame, Region, RegionExport};

/// Outcome of one region import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Regions newly added to the session
    pub imported: usize,
    /// Regions skipped because an identical one was already present
    pub duplicates: usize,
    /// Entries skipped as unusable (unknown keyframe, bad key, invalid box)
    pub rejected: usize,
}

/// Creates, loads and mutates annotation sessions on top of a [`SessionStore`].
///
/// Imports to the same session id are serialized through a per-session
/// async mutex; the session is the unit of locking, so work on different
/// sessions never contends.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create a session for `video_path`, exporting the sampled keyframe
    /// images into the session directory as the annotation surface's input.
    pub async fn create(
        &self,
        video_path: impl AsRef<Path>,
        target_description: &str,
        keyframes: &[KeyFrame],
    ) -> SessionResult<AnnotationSession> {
        let session_id = new_session_id();

        if keyframes.is_empty() {
            return Err(AnnotationError::NoKeyframes { session_id });
        }

        let mut session =
            AnnotationSession::new(&session_id, video_path.as_ref(), target_description);
        session.keyframes = keyframes.iter().map(KeyFrame::meta).collect();

        for (keyframe, meta) in keyframes.iter().zip(&session.keyframes) {
            self.store
                .store_keyframe_image(&session_id, &keyframe.image_path, &meta.image_file)
                .await?;
        }
        self.store.put(&session).await?;

        info!(
            session_id = %session.session_id,
            video = %session.video_path.display(),
            keyframes = session.keyframes.len(),
            "Created annotation session"
        );
        Ok(session)
    }

    pub async fn load(&self, session_id: &str) -> SessionResult<AnnotationSession> {
        self.store.get(session_id).await
    }

    pub async fn list(&self) -> SessionResult<Vec<AnnotationSession>> {
        self.store.list().await
    }

    /// Remove a session and its artifacts. Only explicit cleanup destroys
    /// annotation state; pipeline failures never call this.
    pub async fn cleanup(&self, session_id: &str) -> SessionResult<()> {
        self.store.delete(session_id).await?;
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        info!(session_id, "Removed annotation session");
        Ok(())
    }

    /// Merge a region export into a session.
    ///
    /// The merge is additive per keyframe and idempotent by value: a region
    /// identical to one already present counts as a duplicate instead of
    /// being appended. An entry with an empty region list marks that
    /// keyframe annotated-with-zero-targets. Entries for keyframes the
    /// sampler never produced are rejected, not fatal.
    pub async fn import_regions(
        &self,
        session_id: &str,
        export: &RegionExport,
    ) -> SessionResult<ImportSummary> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.store.get(session_id).await?;
        let mut summary = ImportSummary::default();

        let (resolved, bad_keys) = export.resolved();
        for key in &bad_keys {
            warn!(session_id, key = %key, "Rejecting non-numeric keyframe key");
        }
        summary.rejected += bad_keys.len();

        for (frame_index, entries) in resolved {
            if !session.has_keyframe(frame_index) {
                warn!(
                    session_id,
                    frame_index,
                    entries = entries.len(),
                    "Rejecting annotations for unknown keyframe"
                );
                summary.rejected += entries.len().max(1);
                continue;
            }

            // Inserting the entry is what marks the keyframe annotated,
            // even when it stays empty.
            let existing = session.regions_by_keyframe.entry(frame_index).or_default();

            for entry in entries {
                let region: Region = entry.into_region(frame_index);
                if !region.is_valid() {
                    warn!(session_id, frame_index, "Rejecting degenerate region");
                    summary.rejected += 1;
                } else if existing.contains(&region) {
                    summary.duplicates += 1;
                } else {
                    existing.push(region);
                    summary.imported += 1;
                }
            }
        }

        session.refresh_status();
        self.store.put(&session).await?;

        info!(
            session_id,
            imported = summary.imported,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            status = ?session.status,
            "Imported region export"
        );
        Ok(summary)
    }

    /// Parse the compact `kf:x,y,w,h;...` grammar and import it.
    pub async fn import_shorthand(
        &self,
        session_id: &str,
        shorthand: &str,
    ) -> SessionResult<ImportSummary> {
        let export = RegionExport::parse_shorthand(shorthand)?;
        self.import_regions(session_id, &export).await
    }

    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

fn new_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}
