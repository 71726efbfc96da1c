//! Reordering window over incoming stream numbers.
//!
//! ```text
//! base                          base + 31
//!  │                                │
//!  ▼                                ▼
//! [ ][x][ ][x] ...                [ ]     x = already seen
//! ```
//!
//! The window starts at the lowest stream number not yet seen and slides
//! forward as the low end fills up. A stream number below the window, or
//! marked inside it, has been used and is refused.

use thicket_crypto::REORDERING_WINDOW_SIZE;

const _: () = assert!(REORDERING_WINDOW_SIZE == u32::BITS as u64);

/// Seen-set of incoming stream numbers for one key window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReorderingWindow {
    base: u64,
    seen: u32,
}

impl ReorderingWindow {
    /// Window starting at `base` with nothing seen.
    pub const fn new(base: u64) -> Self {
        Self { base, seen: 0 }
    }

    /// Lowest stream number not yet seen.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Whether `stream_number` falls inside the window.
    pub fn contains(&self, stream_number: u64) -> bool {
        stream_number
            .checked_sub(self.base)
            .is_some_and(|offset| offset < REORDERING_WINDOW_SIZE)
    }

    /// Whether `stream_number` has been used (seen, or below the window).
    pub fn is_seen(&self, stream_number: u64) -> bool {
        match stream_number.checked_sub(self.base) {
            None => true,
            Some(offset) if offset < REORDERING_WINDOW_SIZE => self.seen & (1 << offset) != 0,
            Some(_) => false,
        }
    }

    /// Mark `stream_number` as seen and slide the window.
    ///
    /// Returns `false` if the number is outside the window or was already
    /// seen, leaving the window unchanged.
    pub fn mark_seen(&mut self, stream_number: u64) -> bool {
        if !self.contains(stream_number) || self.is_seen(stream_number) {
            return false;
        }

        self.seen |= 1 << (stream_number - self.base);
        while self.seen & 1 == 1 {
            let Some(base) = self.base.checked_add(1) else {
                break;
            };
            self.base = base;
            self.seen >>= 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_slides_base() {
        let mut window = ReorderingWindow::default();
        for n in 0..5 {
            assert!(window.mark_seen(n));
        }
        assert_eq!(window.base(), 5);
        assert!(window.is_seen(3));
        assert!(!window.is_seen(5));
    }

    #[test]
    fn out_of_order_holds_base() {
        let mut window = ReorderingWindow::default();
        assert!(window.mark_seen(2));
        assert!(window.mark_seen(1));
        assert_eq!(window.base(), 0);

        assert!(window.mark_seen(0));
        assert_eq!(window.base(), 3);
    }

    #[test]
    fn replay_refused() {
        let mut window = ReorderingWindow::default();
        assert!(window.mark_seen(7));
        assert!(!window.mark_seen(7));

        assert!(window.mark_seen(0));
        assert!(!window.mark_seen(0), "below the window counts as seen");
    }

    #[test]
    fn outside_window_refused() {
        let mut window = ReorderingWindow::new(10);
        assert!(!window.mark_seen(10 + REORDERING_WINDOW_SIZE));
        assert!(window.mark_seen(10 + REORDERING_WINDOW_SIZE - 1));
        assert_eq!(window.base(), 10);
    }

    #[test]
    fn top_of_range_does_not_overflow() {
        let mut window = ReorderingWindow::new(u64::MAX);
        assert!(window.mark_seen(u64::MAX));
        assert_eq!(window.base(), u64::MAX);
        assert!(!window.mark_seen(u64::MAX));
    }
}
