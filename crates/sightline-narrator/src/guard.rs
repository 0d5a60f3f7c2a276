//! Exclusive access to the shared inference handle.
//!
//! The inference backend is unsafe to touch from two logical flows at once.
//! [`InferenceGuard`] hands out at most one [`InferenceLease`] at a time; a
//! second acquisition attempt is rejected immediately with
//! [`AcquireError::Busy`] rather than queued.
//!
//! Every backend operation (reset, run) is a method on the lease, so using
//! the handle without holding it does not compile. The lease releases the
//! handle when dropped, which covers every exit path (completion, stop,
//! error, task cancellation) exactly once.
//!
//! # Health
//!
//! A failed reset degrades the handle to [`HandleHealth::Unusable`]. While
//! unusable, `try_acquire` fails fast with [`AcquireError::Unusable`] so the
//! controller can report "model not ready" instead of running on a corrupted
//! backend. [`InferenceGuard::recover`] performs an explicit out-of-band reset
//! that restores the handle on success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sightline_core::ports::{GenerationStream, InferenceProvider};
use sightline_core::{Image, NarrationError};

const NOT_LOADED: &str = "model is not loaded";

/// Health of the inference handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleHealth {
    /// The handle may be acquired.
    Ready,
    /// A reset failed; the handle must be recovered before use.
    Unusable { reason: String },
}

/// Why a lease could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// Another flow holds the handle.
    #[error("inference handle is busy")]
    Busy,

    /// The handle is degraded or no backend is loaded.
    #[error("inference handle is unusable: {reason}")]
    Unusable { reason: String },
}

impl From<AcquireError> for NarrationError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Busy => Self::HandleBusy,
            AcquireError::Unusable { reason } => Self::HandleUnusable(reason),
        }
    }
}

struct GuardShared {
    provider: Arc<dyn InferenceProvider>,
    held: AtomicBool,
    /// Std lock: only touched in sync context, never across an `.await`.
    health: Mutex<HandleHealth>,
}

impl GuardShared {
    fn set_health(&self, health: HandleHealth) {
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = health;
    }
}

/// Owner of the inference handle for the application's lifetime.
///
/// Cheap to clone; all clones arbitrate the same handle.
#[derive(Clone)]
pub struct InferenceGuard {
    shared: Arc<GuardShared>,
}

impl InferenceGuard {
    /// Wrap a provider. The handle starts `Ready`.
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            shared: Arc::new(GuardShared {
                provider,
                held: AtomicBool::new(false),
                health: Mutex::new(HandleHealth::Ready),
            }),
        }
    }

    /// Current health of the handle.
    pub fn health(&self) -> HandleHealth {
        self.shared
            .health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a lease is currently outstanding.
    pub fn is_held(&self) -> bool {
        self.shared.held.load(Ordering::Acquire)
    }

    /// Try to take exclusive use of the handle. Never blocks.
    pub fn try_acquire(&self) -> Result<InferenceLease, AcquireError> {
        if let HandleHealth::Unusable { reason } = self.health() {
            return Err(AcquireError::Unusable { reason });
        }
        if !self.shared.provider.is_ready() {
            return Err(AcquireError::Unusable {
                reason: NOT_LOADED.to_owned(),
            });
        }
        self.claim()
    }

    /// Reset an unusable (or healthy) handle out of band.
    ///
    /// Takes the handle exclusively for the duration of the reset, so this
    /// fails with `HandleBusy` while a session holds it.
    pub async fn recover(&self) -> Result<(), NarrationError> {
        if !self.shared.provider.is_ready() {
            return Err(NarrationError::HandleUnusable(NOT_LOADED.to_owned()));
        }
        let mut lease = self.claim()?;
        lease.reset_if_idle().await?;
        tracing::info!("Inference handle recovered");
        Ok(())
    }

    fn claim(&self) -> Result<InferenceLease, AcquireError> {
        self.shared
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AcquireError::Busy)?;
        tracing::debug!("Inference handle acquired");
        Ok(InferenceLease {
            shared: Arc::clone(&self.shared),
        })
    }
}

impl std::fmt::Debug for InferenceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceGuard")
            .field("held", &self.is_held())
            .field("health", &self.health())
            .finish_non_exhaustive()
    }
}

/// Exclusive capability to use the inference handle.
///
/// Not `Clone`. Dropping it (or calling [`release`](Self::release)) returns
/// the handle to the guard.
pub struct InferenceLease {
    shared: Arc<GuardShared>,
}

impl InferenceLease {
    /// Clear accumulated conversational state before a fresh run.
    ///
    /// On failure the handle is marked [`HandleHealth::Unusable`] and the
    /// error is returned as `HandleUnusable`; the reset is not retried.
    pub async fn reset_if_idle(&mut self) -> Result<(), NarrationError> {
        match self.shared.provider.reset().await {
            Ok(()) => {
                self.shared.set_health(HandleHealth::Ready);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %reason, "Inference handle reset failed; marking unusable");
                self.shared.set_health(HandleHealth::Unusable {
                    reason: reason.clone(),
                });
                Err(NarrationError::HandleUnusable(reason))
            }
        }
    }

    /// Open a generation stream on the held handle.
    ///
    /// A failure here is a stream failure; it does not degrade the handle.
    pub async fn open_stream(
        &mut self,
        prompt: &str,
        images: Vec<Image>,
    ) -> Result<GenerationStream, NarrationError> {
        self.shared
            .provider
            .open_stream(prompt, images)
            .await
            .map_err(|e| NarrationError::StreamFailure(e.to_string()))
    }

    /// Return the handle to the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for InferenceLease {
    fn drop(&mut self) {
        self.shared.held.store(false, Ordering::Release);
        tracing::debug!("Inference handle released");
    }
}

impl std::fmt::Debug for InferenceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceLease").finish_non_exhaustive()
    }
}
