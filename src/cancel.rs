//! Cooperative cancellation.
//!
//! Every streaming encoder polls a [`CancelToken`] once per input byte and
//! aborts with [`Error::Interrupted`](crate::Error::Interrupted) when it is
//! set. Output written before the abort is left intact as a valid prefix;
//! the caller decides whether to discard it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag.
///
/// Clones share the same underlying flag, so a token handed to an encoder
/// can be triggered from a signal handler or another task.
///
/// # Examples
///
/// ```
/// use sendmime::CancelToken;
///
/// let token = CancelToken::new();
/// let shared = token.clone();
/// assert!(!token.is_cancelled());
/// shared.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a new, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clears the flag so the token can be reused for a retry.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!other.is_cancelled());
    }
}
