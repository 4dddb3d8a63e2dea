//! Cooperative cancellation.

use std::sync::Arc;

use crossbeam_utils::atomic::AtomicCell;

/// A flag shared between whoever schedules a computation and the computation
/// itself. Long computations poll it at phase boundaries (and once per
/// baseline) and give up, returning no result, once it is set.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicCell<bool>>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Request that all computations holding this token stop.
    pub fn cancel(&self) {
        self.0.store(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
