//! Fixed-window inbound rate limiting.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A fixed-window counter: up to `limit` admissions per `window`, with the
/// window reset lazily on the first check after it expires. Safe under
/// parallel workers.
pub struct FixedWindowLimiter {
    window: Duration,
    limit: u32,
    state: Mutex<WindowState>,
}

struct WindowState {
    started: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            window,
            limit,
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Admit one request, or reject it if the current window is full.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.started.elapsed() >= self.window {
            state.started = Instant::now();
            state.count = 0;
        }
        if state.count >= self.limit {
            return false;
        }
        state.count += 1;
        true
    }
}
