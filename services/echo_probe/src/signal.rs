//! Set-once completion flag shared by all pollers of one probe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonic false→true flag; clones share the same flag
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    flag: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns true only for the call that flipped it
    pub fn set(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_is_monotonic() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_set());
        assert!(signal.set());
        assert!(signal.is_set());
        assert!(!signal.set());
        assert!(signal.is_set());
    }

    #[test]
    fn test_clones_share_flag() {
        let signal = CompletionSignal::new();
        let other = signal.clone();
        other.set();
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn test_concurrent_sets_flip_once() {
        let signal = CompletionSignal::new();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.set() })
            })
            .collect();
        let flips = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(flips, 1);
    }
}
