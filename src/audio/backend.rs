//! Audio output backends

use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio session setup failed: {0}")]
    SessionSetup(String),

    #[error("Audio output unavailable: {0}")]
    Output(String),

    #[error("Could not decode audio clip: {0}")]
    Decode(String),
}

/// Something that can play one encoded clip at a time.
///
/// `play` blocks until the clip finishes or `cancel` is raised, and is only
/// ever called between `activate_session` and `deactivate_session`.
pub trait AudioBackend: Send + Sync + 'static {
    /// Claim the output device for a clip
    fn activate_session(&self) -> Result<(), AudioError>;

    /// Hand the output device back
    fn deactivate_session(&self);

    fn play(&self, audio_data: &[u8], cancel: &AtomicBool) -> Result<(), AudioError>;
}

/// Holds the output session for the lifetime of one clip
pub struct SessionGuard {
    backend: Arc<dyn AudioBackend>,
    active: bool,
}

impl SessionGuard {
    /// Activate the session. Failure is logged and playback carries on.
    pub fn acquire(backend: Arc<dyn AudioBackend>) -> Self {
        let active = match backend.activate_session() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}; attempting playback anyway", e);
                false
            }
        };
        Self { backend, active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.active {
            self.backend.deactivate_session();
        }
    }
}

/// Plays clips on the default output device through rodio
pub struct RodioBackend {
    volume: f32,
    poll_interval: Duration,
}

impl RodioBackend {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioBackend for RodioBackend {
    fn activate_session(&self) -> Result<(), AudioError> {
        rodio::cpal::default_host()
            .default_output_device()
            .map(|_| ())
            .ok_or_else(|| AudioError::SessionSetup("No default output device".to_string()))
    }

    fn deactivate_session(&self) {
        tracing::trace!("Audio session released");
    }

    fn play(&self, audio_data: &[u8], cancel: &AtomicBool) -> Result<(), AudioError> {
        // Stream must outlive the sink
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| AudioError::Output(format!("Failed to create audio output stream: {}", e)))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| AudioError::Output(format!("Failed to create audio sink: {}", e)))?;

        let source = Decoder::new(Cursor::new(audio_data.to_vec()))
            .map_err(|e| AudioError::Decode(e.to_string()))?;

        sink.set_volume(self.volume);
        sink.append(source);

        while !sink.empty() {
            if cancel.load(Ordering::SeqCst) {
                sink.stop();
                tracing::debug!("Playback cancelled");
                break;
            }
            thread::sleep(self.poll_interval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingBackend {
        fail_setup: bool,
        activations: AtomicUsize,
        deactivations: AtomicUsize,
    }

    impl AudioBackend for CountingBackend {
        fn activate_session(&self) -> Result<(), AudioError> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                Err(AudioError::SessionSetup("busy".into()))
            } else {
                Ok(())
            }
        }

        fn deactivate_session(&self) {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }

        fn play(&self, _audio_data: &[u8], _cancel: &AtomicBool) -> Result<(), AudioError> {
            Ok(())
        }
    }

    fn backend(fail_setup: bool) -> Arc<CountingBackend> {
        Arc::new(CountingBackend {
            fail_setup,
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let counting = backend(false);
        {
            let guard = SessionGuard::acquire(counting.clone());
            assert!(guard.is_active());
        }
        assert_eq!(counting.activations.load(Ordering::SeqCst), 1);
        assert_eq!(counting.deactivations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_setup_is_not_released() {
        let counting = backend(true);
        {
            let guard = SessionGuard::acquire(counting.clone());
            assert!(!guard.is_active());
        }
        assert_eq!(counting.deactivations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rodio_volume_is_clamped() {
        assert_eq!(RodioBackend::new(4.0).volume, 1.0);
        assert_eq!(RodioBackend::new(-1.0).volume, 0.0);
    }
}
