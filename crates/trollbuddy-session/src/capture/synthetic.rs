//! Synthetic acquisition source for development and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::source::{AcquisitionError, AcquisitionSource, FrameStream};

/// 1x1 grey PNG.
const BLANK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Produces a constant frame without touching any hardware.
///
/// Clones share counters, so a test can keep one clone and observe how the
/// scheduler uses another.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    deny: bool,
    live_tracks: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose access request is always refused.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    /// Tracks currently held by streams from this source.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    /// Number of access requests made.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionSource for SyntheticSource {
    async fn request(&self) -> Result<Box<dyn FrameStream>, AcquisitionError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(AcquisitionError::Denied("synthetic source".to_string()));
        }
        self.live_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            live: true,
            live_tracks: Arc::clone(&self.live_tracks),
        }))
    }
}

struct SyntheticStream {
    live: bool,
    live_tracks: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameStream for SyntheticStream {
    async fn snapshot(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        if !self.live {
            return Err(AcquisitionError::Stopped);
        }
        STANDARD
            .decode(BLANK_PNG_BASE64)
            .map_err(|e| AcquisitionError::Snapshot(e.to_string()))
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
