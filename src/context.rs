//! Explicit backend context.

use crate::backend::AudioBackend;
use crate::error::{PetalVoiceError, Result};
use std::fmt;

/// An open backend context.
///
/// Owned by the application: created once with [`AudioContext::init`], passed
/// by reference to every [`VoiceManager`](crate::VoiceManager) call, and torn
/// down with [`AudioContext::shutdown`] (or on drop).
pub struct AudioContext {
    backend: Box<dyn AudioBackend>,
    open: bool,
}

impl AudioContext {
    /// Open the backend's device and context.
    ///
    /// # Errors
    ///
    /// Returns [`PetalVoiceError::Backend`] when the backend cannot create a
    /// context (no device, driver failure).
    pub fn init<B: AudioBackend + 'static>(backend: B) -> Result<Self> {
        if !backend.create_context() {
            return Err(PetalVoiceError::Backend(format!(
                "{} backend failed to create a context",
                backend.name()
            )));
        }
        log::info!("Audio context created on {} backend", backend.name());
        Ok(Self {
            backend: Box::new(backend),
            open: true,
        })
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Destroy the context. Shut the managers using it down first so their
    /// handles are deleted while the context is still current.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.backend.destroy_context();
            log::info!("Audio context on {} backend destroyed", self.backend.name());
        }
    }
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("backend", &self.backend.name())
            .field("open", &self.open)
            .finish()
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    #[test]
    fn init_opens_and_shutdown_closes() {
        let backend = SimulatedBackend::new();
        let ctx = AudioContext::init(backend.clone()).unwrap();
        assert!(ctx.is_open());
        assert!(backend.context_open());
        ctx.shutdown();
        assert!(!backend.context_open());
    }

    #[test]
    fn unavailable_backend_is_an_error() {
        let err = AudioContext::init(SimulatedBackend::unavailable()).unwrap_err();
        assert!(matches!(err, PetalVoiceError::Backend(_)));
    }

    #[test]
    fn drop_destroys_context() {
        let backend = SimulatedBackend::new();
        drop(AudioContext::init(backend.clone()).unwrap());
        assert!(!backend.context_open());
    }
}
