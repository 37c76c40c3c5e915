// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation of a generation pass.
//!
//! The host owns the token and may cancel from any thread (for example when
//! a keystroke invalidates the snapshot being analysed). Passes poll it at
//! every top-level type and every invocation and stop without output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Returned when a pass observes cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("generation pass was cancelled")]
pub struct Cancelled;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is never cancelled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Poll point.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] once [`CancellationToken::cancel`] has been called
    /// on this token or any clone of it.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
