//! RAII guard that clears the refreshing flag when dropped.

use std::sync::atomic::{AtomicBool, Ordering};

/// Held for the duration of one refresh pass.
pub(super) struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    /// Sets the flag, or returns `None` if another pass already holds it.
    pub(super) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_drop() {
        let flag = AtomicBool::new(false);
        let guard = RefreshGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(RefreshGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RefreshGuard::try_acquire(&flag).is_some());
    }
}
