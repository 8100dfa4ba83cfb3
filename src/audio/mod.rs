//! Spoken feedback playback
//!
//! Clips play one at a time in arrival order. Each clip runs on its own
//! playback thread inside an output session that is released however the clip
//! ends. Failures are logged and count as the clip finishing.

mod backend;

pub use backend::{AudioBackend, AudioError, RodioBackend, SessionGuard};

use crate::config::AudioConfig;
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, LockResult, Mutex};
use std::thread;
use std::time::Duration;

/// One synthesized feedback clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioQueueItem {
    /// Encoded audio (mp3, wav, ...)
    pub audio_data: Vec<u8>,
    /// Transcript, for logging
    pub text: String,
}

impl AudioQueueItem {
    pub fn new(audio_data: Vec<u8>, text: impl Into<String>) -> Self {
        Self {
            audio_data,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Idle,
    Playing,
}

struct QueueInner {
    status: QueueStatus,
    backlog: VecDeque<AudioQueueItem>,
    current_cancel: Option<Arc<AtomicBool>>,
    /// Bumped by `cancel_all` so in-flight clips cannot advance the queue
    generation: u64,
}

struct Shared {
    inner: Mutex<QueueInner>,
    idle: Condvar,
    backend: Arc<dyn AudioBackend>,
    /// Held for the whole of a playback so clips never overlap on the device
    playback_turn: Mutex<()>,
}

/// FIFO queue of feedback clips with at most one playing
#[derive(Clone)]
pub struct AudioFeedbackQueue {
    shared: Arc<Shared>,
}

impl AudioFeedbackQueue {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(QueueInner {
                    status: QueueStatus::Idle,
                    backlog: VecDeque::new(),
                    current_cancel: None,
                    generation: 0,
                }),
                idle: Condvar::new(),
                backend,
                playback_turn: Mutex::new(()),
            }),
        }
    }

    /// Queue backed by the default output device
    pub fn with_default_output(config: &AudioConfig) -> Self {
        Self::new(Arc::new(RodioBackend::new(config.volume)))
    }

    /// Play `item` now if nothing is playing, otherwise queue it
    pub fn enqueue(&self, item: AudioQueueItem) {
        let mut inner = recover(self.shared.inner.lock());
        match inner.status {
            QueueStatus::Idle => {
                inner.status = QueueStatus::Playing;
                let generation = inner.generation;
                let cancel = Arc::new(AtomicBool::new(false));
                inner.current_cancel = Some(Arc::clone(&cancel));
                drop(inner);
                launch(Arc::clone(&self.shared), item, cancel, generation);
            }
            QueueStatus::Playing => {
                inner.backlog.push_back(item);
                tracing::debug!(
                    "Feedback clip queued behind current playback ({} waiting)",
                    inner.backlog.len()
                );
            }
        }
    }

    /// Drop the backlog and stop the current clip
    pub fn cancel_all(&self) {
        let mut inner = recover(self.shared.inner.lock());
        let dropped = inner.backlog.len();
        inner.backlog.clear();
        if let Some(cancel) = inner.current_cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        inner.generation += 1;
        inner.status = QueueStatus::Idle;
        drop(inner);

        self.shared.idle.notify_all();
        tracing::info!("Cancelled feedback playback ({} queued clips dropped)", dropped);
    }

    pub fn status(&self) -> QueueStatus {
        recover(self.shared.inner.lock()).status
    }

    pub fn is_playing(&self) -> bool {
        self.status() == QueueStatus::Playing
    }

    /// Clips waiting behind the current one
    pub fn backlog_len(&self) -> usize {
        recover(self.shared.inner.lock()).backlog.len()
    }

    /// Block until the queue is idle. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let inner = recover(self.shared.inner.lock());
        let (inner, _) = recover(self.shared.idle.wait_timeout_while(inner, timeout, |inner| {
            inner.status == QueueStatus::Playing
        }));
        inner.status == QueueStatus::Idle
    }
}

/// Start `item` on a dedicated playback thread
fn launch(shared: Arc<Shared>, item: AudioQueueItem, cancel: Arc<AtomicBool>, generation: u64) {
    let worker = Arc::clone(&shared);
    let spawned = thread::Builder::new()
        .name("feedback-playback".to_string())
        .spawn(move || {
            // A panicking backend counts as a failed clip
            let played = panic::catch_unwind(AssertUnwindSafe(|| {
                play_item(&worker, &item, &cancel);
            }));
            if played.is_err() {
                tracing::error!("Feedback playback panicked: {}", item.text);
            }
            advance(&worker, generation);
        });

    if let Err(e) = spawned {
        tracing::error!("Failed to spawn playback thread: {}", e);
        advance(&shared, generation);
    }
}

fn play_item(shared: &Shared, item: &AudioQueueItem, cancel: &AtomicBool) {
    let _turn = recover(shared.playback_turn.lock());
    if cancel.load(Ordering::SeqCst) {
        return;
    }

    let _session = SessionGuard::acquire(Arc::clone(&shared.backend));
    tracing::debug!("Playing feedback: {}", item.text);

    if let Err(e) = shared.backend.play(&item.audio_data, cancel) {
        tracing::warn!("Feedback playback failed: {}", e);
    }
}

/// A clip finished (or failed): play the next one or go idle
fn advance(shared: &Arc<Shared>, generation: u64) {
    let mut inner = recover(shared.inner.lock());
    if inner.generation != generation {
        // cancel_all already reset the queue
        return;
    }

    match inner.backlog.pop_front() {
        Some(next) => {
            let cancel = Arc::new(AtomicBool::new(false));
            inner.current_cancel = Some(Arc::clone(&cancel));
            drop(inner);
            launch(Arc::clone(shared), next, cancel, generation);
        }
        None => {
            inner.status = QueueStatus::Idle;
            inner.current_cancel = None;
            drop(inner);
            shared.idle.notify_all();
        }
    }
}

fn recover<T>(result: LockResult<T>) -> T {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
