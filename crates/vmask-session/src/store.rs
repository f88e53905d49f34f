//! Session storage backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{AnnotationError, SessionResult};
use vmask_models::AnnotationSession;

const SESSION_FILE: &str = "session.json";

/// Key-value storage for annotation sessions, keyed by session id.
///
/// One directory's worth of artifacts per session: the manifest document
/// plus the exported keyframe images the annotation surface works from.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist the full session document, replacing any previous version.
    async fn put(&self, session: &AnnotationSession) -> SessionResult<()>;

    /// Load a session document.
    async fn get(&self, session_id: &str) -> SessionResult<AnnotationSession>;

    /// All stored sessions, newest first. Unreadable entries are skipped.
    async fn list(&self) -> SessionResult<Vec<AnnotationSession>>;

    /// Remove a session and every artifact under it.
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    /// Copy a keyframe image into the session's directory, returning the
    /// stored path.
    async fn store_keyframe_image(
        &self,
        session_id: &str,
        src: &Path,
        file_name: &str,
    ) -> SessionResult<PathBuf>;

    /// Directory holding this session's artifacts.
    fn session_dir(&self, session_id: &str) -> PathBuf;
}

/// Filesystem-backed session store: `<root>/<session_id>/session.json`
/// plus keyframe images alongside it.
#[derive(Debug, Clone)]
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_file(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id).join(SESSION_FILE)
    }
}

/// Session ids are opaque but become directory names, so anything that
/// could escape the store root is rejected outright.
fn validate_session_id(session_id: &str) -> SessionResult<()> {
    let ok = !session_id.is_empty()
        && session_id.len() <= 64
        && session_id.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(AnnotationError::InvalidSessionId(session_id.to_string()))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn put(&self, session: &AnnotationSession) -> SessionResult<()> {
        validate_session_id(&session.session_id)?;

        let dir = self.session_dir(&session.session_id);
        fs::create_dir_all(&dir).await?;

        // Write-then-rename so a concurrent reader never sees a torn document.
        let file = self.session_file(&session.session_id);
        let tmp = file.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &file).await?;

        debug!(session_id = %session.session_id, "Persisted session document");
        Ok(())
    }

    async fn get(&self, session_id: &str) -> SessionResult<AnnotationSession> {
        validate_session_id(session_id)?;

        let file = self.session_file(session_id);
        let json = match fs::read_to_string(&file).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnnotationError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    async fn list(&self) -> SessionResult<Vec<AnnotationSession>> {
        let mut sessions = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.get(&name).await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(session_id = %name, error = %e, "Skipping unreadable session");
                }
            }
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        validate_session_id(session_id)?;

        let dir = self.session_dir(session_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AnnotationError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store_keyframe_image(
        &self,
        session_id: &str,
        src: &Path,
        file_name: &str,
    ) -> SessionResult<PathBuf> {
        validate_session_id(session_id)?;

        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir).await?;

        let dst = dir.join(file_name);
        fs::copy(src, &dst).await?;
        Ok(dst)
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_session(id: &str) -> AnnotationSession {
        AnnotationSession::new(id, "/videos/clip.mp4", "the red car")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let session = sample_session("abc12345");
        store.put(&session).await.unwrap();

        let loaded = store.get("abc12345").await.unwrap();
        assert_eq!(loaded.session_id, "abc12345");
        assert_eq!(loaded.target_description, "the red car");
    }

    #[tokio::test]
    async fn test_get_missing_session() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let err = store.get("deadbeef").await.unwrap_err();
        assert!(matches!(err, AnnotationError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let too_long = "x".repeat(65);
        for bad in ["../evil", "", "a/b", "a\\b", too_long.as_str()] {
            let err = store.get(bad).await.unwrap_err();
            assert!(
                matches!(err, AnnotationError::InvalidSessionId(_)),
                "id {bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_and_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let mut old = sample_session("aaaa1111");
        old.created_at -= chrono::Duration::hours(1);
        store.put(&old).await.unwrap();
        store.put(&sample_session("bbbb2222")).await.unwrap();

        // A directory without a readable manifest is skipped
        std::fs::create_dir(dir.path().join("cccc3333")).unwrap();

        let sessions = store.list().await.unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["bbbb2222", "aaaa1111"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let store = FsSessionStore::new("/nonexistent/sessions");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let session = sample_session("abcd0000");
        store.put(&session).await.unwrap();

        let img = dir.path().join("kf.png");
        std::fs::write(&img, b"png bytes").unwrap();
        let stored = store
            .store_keyframe_image("abcd0000", &img, "kf_0.png")
            .await
            .unwrap();
        assert!(stored.exists());

        store.delete("abcd0000").await.unwrap();
        assert!(!store.session_dir("abcd0000").exists());

        let err = store.delete("abcd0000").await.unwrap_err();
        assert!(matches!(err, AnnotationError::SessionNotFound(_)));
    }
}
