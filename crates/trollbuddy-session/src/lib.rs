//! `TrollBuddy` Session Library
//!
//! Core functionality shared by the organizer and participant clients:
//! - Session creation, resume and teardown with one session per organizer
//! - Periodic camera capture with a bounded, reconciled image window
//! - Session resolution for viewers opening a share link
//! - Optional image moderation before upload

pub mod capture;
pub mod gallery;
pub mod moderation;
pub mod session;
pub mod viewer;

pub use capture::{CaptureHandle, CaptureScheduler, CaptureState, CapturedImage};
pub use session::{ActiveSession, Session, SessionForm, SessionManager, StartOutcome};
pub use viewer::{Resolution, SessionMetadata, SessionViewer};

/// Maximum number of images retained per session, locally and remotely.
pub const MAX_RETAINED_IMAGES: usize = 10;
