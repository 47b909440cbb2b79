//! Cancellation support for generation sessions
//!
//! Allows the caller to stop a running stream. Cards already delivered stay
//! delivered; nothing is emitted after cancellation.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for generation cancellation
#[derive(Clone, Debug)]
pub struct GenerationCancellation {
    token: CancellationToken,
}

impl GenerationCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel the session using this handle
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get a child token for a subtask
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

impl Default for GenerationCancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_children_and_clones() {
        let cancellation = GenerationCancellation::new();
        let child = cancellation.child_token();
        let clone = cancellation.clone();
        assert!(!child.is_cancelled());
        clone.cancel();
        assert!(cancellation.is_cancelled());
        assert!(child.is_cancelled());
    }
}
