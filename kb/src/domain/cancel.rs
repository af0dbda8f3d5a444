//! Cancellation token
//!
//! A latching binary signal: once raised it can never be lowered. Clones
//! share the flag, so a token handed to a child run observes the parent's
//! cancellation at the child's next loop boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shareable one-way cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal; stays raised forever
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been raised
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unsignalled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_latches() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        // There is no way to lower it; cancelling again is a no-op
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let parent = CancelToken::new();
        let child = parent.clone();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
