//! Annotation session persistence.
//!
//! A session is the resumable unit of labeling work for one video: its
//! keyframe images, a manifest, and per-keyframe region annotations, all
//! kept under one directory keyed by an opaque session id. The store is a
//! small key-value interface so the backing medium stays swappable; the
//! manager layers id generation, per-session locking and the region import
//! merge policy on top.

pub mod error;
pub mod manager;
pub mod store;

pub use error::{AnnotationError, SessionResult};
pub use manager::{ImportSummary, SessionManager};
pub use store::{FsSessionStore, SessionStore};
