//! Acquisition source capability.

use async_trait::async_trait;

/// Errors raised while acquiring a camera or a frame.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The user or the OS refused access.
    #[error("Camera access denied: {0}")]
    Denied(String),

    /// No usable camera.
    #[error("No camera available: {0}")]
    Unavailable(String),

    /// A single snapshot failed; the stream stays usable.
    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    /// The stream was stopped.
    #[error("Capture stream stopped")]
    Stopped,
}

/// A camera-like capability.
///
/// `request` is the only place access is negotiated. A denial carries no
/// retry obligation: callers must not call `request` again on their own.
#[async_trait]
pub trait AcquisitionSource: Send + Sync {
    async fn request(&self) -> Result<Box<dyn FrameStream>, AcquisitionError>;
}

/// A granted, live stream of frames.
#[async_trait]
pub trait FrameStream: Send {
    /// Take one still frame, PNG encoded.
    async fn snapshot(&mut self) -> Result<Vec<u8>, AcquisitionError>;

    /// Number of live tracks held by this stream.
    fn active_tracks(&self) -> usize;

    /// Stop all tracks. Idempotent.
    fn stop(&mut self);
}

/// Owns a [`FrameStream`] and stops it when dropped, whatever the exit path.
pub(crate) struct StreamGuard {
    stream: Box<dyn FrameStream>,
}

impl StreamGuard {
    pub(crate) fn new(stream: Box<dyn FrameStream>) -> Self {
        Self { stream }
    }

    pub(crate) async fn snapshot(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        self.stream.snapshot().await
    }

    pub(crate) fn stop(&mut self) {
        self.stream.stop();
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.stop();
    }
}
