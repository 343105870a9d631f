//! Capture scheduler.
//!
//! One scheduler runs per viewer. It asks the source for access once, then
//! takes a snapshot every interval until the local window is full or the
//! handle is stopped or dropped. Each accepted frame is written to the store
//! and the remote collection is trimmed back to the retention ceiling.
//!
//! Resource release is scoped: the frame stream lives inside the loop task,
//! so every exit path (ceiling, explicit stop, handle drop, task abort)
//! stops its tracks.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use trollbuddy_core::Notifier;
use trollbuddy_core::db::unix_timestamp_millis;
use trollbuddy_core::store::{RemoteStore, paths};

use super::CapturedImage;
use super::reconcile::reconcile;
use super::source::{AcquisitionSource, StreamGuard};
use super::window::CaptureWindow;
use crate::MAX_RETAINED_IMAGES;
use crate::moderation::ImageModerator;

/// Why capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The window reached the retention ceiling.
    Complete,
    /// The handle was stopped.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Stopped(StopReason),
    /// Camera access was refused or unavailable. Terminal; no retry.
    Degraded,
}

/// Shortest tick period; the timer cannot run with a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Captured(i64),
    Skipped,
    Complete,
}

pub struct CaptureScheduler {
    session_id: String,
    store: Arc<dyn RemoteStore>,
    source: Arc<dyn AcquisitionSource>,
    notifier: Arc<dyn Notifier>,
    moderator: Option<Arc<dyn ImageModerator>>,
    interval: Duration,
}

impl CaptureScheduler {
    /// `interval` is raised to at least one millisecond.
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<dyn RemoteStore>,
        source: Arc<dyn AcquisitionSource>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            source,
            notifier,
            moderator: None,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Screen every frame before it is kept.
    #[must_use]
    pub fn with_moderator(mut self, moderator: Arc<dyn ImageModerator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    /// Request camera access and start the capture loop.
    ///
    /// A refused request yields a handle in [`CaptureState::Degraded`] with
    /// no timer running.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn start(self) -> CaptureHandle {
        let (state_tx, state_rx) = watch::channel(CaptureState::Idle);
        let window = Arc::new(Mutex::new(CaptureWindow::new(MAX_RETAINED_IMAGES)));
        let cancel = CancellationToken::new();

        let stream = match self.source.request().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Camera access failed");
                self.notifier.error(&format!("Camera unavailable: {e}"));
                state_tx.send_replace(CaptureState::Degraded);
                return CaptureHandle {
                    state: state_rx,
                    window,
                    cancel,
                    task: None,
                };
            }
        };

        info!(interval = ?self.interval, "Capture started");
        state_tx.send_replace(CaptureState::Capturing);

        let capture = CaptureLoop {
            session_id: self.session_id,
            store: self.store,
            notifier: self.notifier,
            moderator: self.moderator,
            stream: StreamGuard::new(stream),
            window: Arc::clone(&window),
            last_captured_at: 0,
        };
        let task = tokio::spawn(run(capture, self.interval, cancel.clone(), state_tx));

        CaptureHandle {
            state: state_rx,
            window,
            cancel,
            task: Some(task),
        }
    }
}

async fn run(
    mut capture: CaptureLoop,
    interval: Duration,
    cancel: CancellationToken,
    state_tx: watch::Sender<CaptureState>,
) {
    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break StopReason::Cancelled,
            _ = timer.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break StopReason::Cancelled,
                    outcome = capture.tick() => {
                        if outcome == TickOutcome::Complete {
                            break StopReason::Complete;
                        }
                    }
                }
            }
        }
    };

    capture.stream.stop();
    info!(session_id = %capture.session_id, ?reason, "Capture stopped");
    state_tx.send_replace(CaptureState::Stopped(reason));
}

/// Per-session capture state owned by the loop task.
pub(crate) struct CaptureLoop {
    session_id: String,
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    moderator: Option<Arc<dyn ImageModerator>>,
    stream: StreamGuard,
    window: Arc<Mutex<CaptureWindow>>,
    last_captured_at: i64,
}

impl CaptureLoop {
    /// Strictly increasing capture time, so keys never collide.
    fn next_timestamp(&mut self) -> i64 {
        let ts = unix_timestamp_millis().max(self.last_captured_at + 1);
        self.last_captured_at = ts;
        ts
    }

    fn window_is_full(&self) -> bool {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_full()
    }

    pub(crate) async fn tick(&mut self) -> TickOutcome {
        if self.window_is_full() {
            info!(session_id = %self.session_id, "Retention ceiling reached");
            self.notifier.success("All images captured");
            return TickOutcome::Complete;
        }

        let png = match self.stream.snapshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Snapshot failed");
                return TickOutcome::Skipped;
            }
        };
        let image = CapturedImage::from_png(self.next_timestamp(), &png);

        if let Some(moderator) = &self.moderator
            && !moderator.is_allowed(&image.data_url).await
        {
            warn!(
                session_id = %self.session_id,
                captured_at = image.captured_at,
                "Image blocked by moderation"
            );
            self.notifier.error("Image blocked by moderation");
            return TickOutcome::Skipped;
        }

        let captured_at = image.captured_at;
        let evicted = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_front(image.clone());
        if let Some(old) = evicted {
            debug!(captured_at = old.captured_at, "Evicted image from window");
        }

        let path = paths::captured_image(&self.session_id, captured_at);
        if let Err(e) = self.store.set(&path, Value::String(image.data_url)).await {
            warn!(session_id = %self.session_id, captured_at, error = %e, "Image upload failed");
            self.notifier.error("Image upload failed");
            return TickOutcome::Captured(captured_at);
        }

        match reconcile(self.store.as_ref(), &self.session_id, MAX_RETAINED_IMAGES).await {
            Ok(report) if !report.removed.is_empty() || !report.failed.is_empty() => {
                info!(
                    session_id = %self.session_id,
                    removed = report.removed.len(),
                    failed = report.failed.len(),
                    "Trimmed remote images"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Image reconciliation failed");
            }
        }

        TickOutcome::Captured(captured_at)
    }
}

/// Owner of a running capture. Dropping the handle cancels the loop and
/// releases the camera.
pub struct CaptureHandle {
    state: watch::Receiver<CaptureState>,
    window: Arc<Mutex<CaptureWindow>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.clone()
    }

    /// Local window, most recent first.
    pub fn images(&self) -> Vec<CapturedImage> {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    /// Whether the capture timer is still scheduled.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop and wait until the camera is released.
    pub async fn stop(&mut self) -> CaptureState {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to end on its own.
    pub async fn wait(&mut self) -> CaptureState {
        self.join().await
    }

    async fn join(&mut self) -> CaptureState {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Capture task ended abnormally");
        }
        self.state()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::capture::{AcquisitionError, FrameStream, SyntheticSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trollbuddy_core::store::MemoryStore;
    use trollbuddy_core::{NotificationKind, NotificationService, NotificationState};

    struct RecordingNotifier {
        messages: Mutex<Vec<(String, NotificationKind)>>,
        slot: NotificationService,
    }

    impl Default for RecordingNotifier {
        fn default() -> Self {
            Self {
                messages: Mutex::default(),
                slot: NotificationService::new(Duration::ZERO),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn emit(&self, message: &str, kind: NotificationKind) {
            self.messages
                .lock()
                .unwrap()
                .push((message.to_string(), kind));
            self.slot.emit(message, kind);
        }

        fn subscribe(&self) -> watch::Receiver<NotificationState> {
            self.slot.subscribe()
        }
    }

    struct FlakyStream {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameStream for FlakyStream {
        async fn snapshot(&mut self) -> Result<Vec<u8>, AcquisitionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(AcquisitionError::Snapshot("glitch".into()))
            } else {
                Ok(vec![0x89, b'P', b'N', b'G'])
            }
        }

        fn active_tracks(&self) -> usize {
            1
        }

        fn stop(&mut self) {}
    }

    struct BlockAll;

    #[async_trait]
    impl ImageModerator for BlockAll {
        async fn is_allowed(&self, _data_url: &str) -> bool {
            false
        }
    }

    fn capture_loop(
        store: Arc<dyn RemoteStore>,
        notifier: Arc<RecordingNotifier>,
        stream: Box<dyn FrameStream>,
    ) -> CaptureLoop {
        CaptureLoop {
            session_id: "s-1".to_string(),
            store,
            notifier,
            moderator: None,
            stream: StreamGuard::new(stream),
            window: Arc::new(Mutex::new(CaptureWindow::new(MAX_RETAINED_IMAGES))),
            last_captured_at: 0,
        }
    }

    async fn stored_keys(store: &MemoryStore) -> Vec<i64> {
        let mut keys: Vec<i64> = store
            .children("capturedImages/s-1")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.parse().unwrap())
            .collect();
        keys.sort_unstable();
        keys
    }

    #[tokio::test]
    async fn ticks_fill_window_then_complete() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let source = SyntheticSource::new();
        let stream = source.request().await.unwrap();
        let mut capture = capture_loop(store.clone(), notifier.clone(), stream);

        let mut stamps = Vec::new();
        for _ in 0..MAX_RETAINED_IMAGES {
            match capture.tick().await {
                TickOutcome::Captured(ts) => stamps.push(ts),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(capture.tick().await, TickOutcome::Complete);

        let window = capture.window.lock().unwrap().to_vec();
        assert_eq!(window.len(), MAX_RETAINED_IMAGES);
        assert_eq!(window[0].captured_at, *stamps.last().unwrap());
        assert_eq!(stored_keys(&store).await, stamps);

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.last().unwrap().1, NotificationKind::Success);

        drop(capture);
        assert_eq!(source.live_tracks(), 0);
    }

    #[tokio::test]
    async fn foreign_entries_are_trimmed_on_each_write() {
        let store = Arc::new(MemoryStore::new());
        for ts in 1..=12_i64 {
            store
                .set(&paths::captured_image("s-1", ts), Value::String("x".into()))
                .await
                .unwrap();
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let stream = SyntheticSource::new().request().await.unwrap();
        let mut capture = capture_loop(store.clone(), notifier, stream);

        let TickOutcome::Captured(ts) = capture.tick().await else {
            panic!("expected a capture");
        };
        let keys = stored_keys(&store).await;
        assert_eq!(keys.len(), MAX_RETAINED_IMAGES);
        assert_eq!(*keys.last().unwrap(), ts);
        assert_eq!(keys[0], 4);
    }

    #[tokio::test]
    async fn upload_failure_keeps_local_image() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let notifier = Arc::new(RecordingNotifier::default());
        let stream = SyntheticSource::new().request().await.unwrap();
        let mut capture = capture_loop(store.clone(), notifier.clone(), stream);

        assert!(matches!(capture.tick().await, TickOutcome::Captured(_)));
        assert!(matches!(capture.tick().await, TickOutcome::Captured(_)));
        assert_eq!(capture.window.lock().unwrap().len(), 2);

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|(_, k)| *k == NotificationKind::Error));
    }

    #[tokio::test]
    async fn snapshot_failure_skips_tick() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let stream = Box::new(FlakyStream {
            calls: calls.clone(),
        });
        let mut capture = capture_loop(store.clone(), notifier, stream);

        assert_eq!(capture.tick().await, TickOutcome::Skipped);
        assert!(matches!(capture.tick().await, TickOutcome::Captured(_)));
        assert_eq!(stored_keys(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn blocked_image_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let stream = SyntheticSource::new().request().await.unwrap();
        let mut capture = capture_loop(store.clone(), notifier.clone(), stream);
        capture.moderator = Some(Arc::new(BlockAll));

        assert_eq!(capture.tick().await, TickOutcome::Skipped);
        assert!(capture.window.lock().unwrap().is_empty());
        assert!(stored_keys(&store).await.is_empty());
        assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denied_access_degrades_without_timer() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let source = SyntheticSource::denying();

        let handle = CaptureScheduler::new(
            "s-1",
            store,
            Arc::new(source.clone()),
            notifier.clone(),
            Duration::from_millis(10),
        )
        .start()
        .await;

        assert_eq!(handle.state(), CaptureState::Degraded);
        assert!(!handle.is_running());
        assert_eq!(source.requests(), 1);
        assert_eq!(
            notifier.messages.lock().unwrap()[0].1,
            NotificationKind::Error
        );
        let slot = notifier.subscribe().borrow().clone();
        assert!(slot.visible);
        assert!(slot.message.starts_with("Camera unavailable"));
    }

    #[tokio::test]
    async fn stop_releases_camera() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let source = SyntheticSource::new();
        let mut handle = CaptureScheduler::new(
            "s-1",
            store,
            Arc::new(source.clone()),
            Arc::new(RecordingNotifier::default()),
            Duration::from_secs(60),
        )
        .start()
        .await;

        assert_eq!(handle.state(), CaptureState::Capturing);
        assert_eq!(source.live_tracks(), 1);

        let state = handle.stop().await;
        assert_eq!(state, CaptureState::Stopped(StopReason::Cancelled));
        assert!(!handle.is_running());
        assert_eq!(source.live_tracks(), 0);
        assert!(handle.images().is_empty());
    }

    #[tokio::test]
    async fn dropping_handle_releases_camera() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let source = SyntheticSource::new();
        let handle = CaptureScheduler::new(
            "s-1",
            store,
            Arc::new(source.clone()),
            Arc::new(RecordingNotifier::default()),
            Duration::from_secs(60),
        )
        .start()
        .await;
        assert_eq!(source.live_tracks(), 1);

        drop(handle);
        for _ in 0..100 {
            if source.live_tracks() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(source.live_tracks(), 0);
    }

    #[tokio::test]
    async fn zero_interval_still_runs_to_completion() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let source = SyntheticSource::new();
        let mut handle = CaptureScheduler::new(
            "s-1",
            store,
            Arc::new(source.clone()),
            Arc::new(RecordingNotifier::default()),
            Duration::ZERO,
        )
        .start()
        .await;

        let state = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();
        assert_eq!(state, CaptureState::Stopped(StopReason::Complete));
        assert_eq!(handle.images().len(), MAX_RETAINED_IMAGES);
        assert_eq!(source.live_tracks(), 0);
    }
}
