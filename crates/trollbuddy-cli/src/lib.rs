//! `TrollBuddy` CLI
//!
//! Organizer and viewer clients sharing one store:
//! - Organizer: create, resume and end sessions, list captured images
//! - Viewer: resolve a share link and run the capture loop

pub mod app;
pub mod organizer_cmd;
pub mod viewer_cmd;
