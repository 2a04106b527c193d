//! Incremental reveal of a renderable set in fixed-size chunks.
//!
//! [`ChunkCursor`] is the pure counter; [`ChunkRevealer`] drives it from a tokio
//! task, growing the visible count by one chunk per tick until everything is
//! shown. Restarting the revealer (because any upstream filter input changed)
//! cancels the running task and starts again from the first chunk.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Records revealed per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Delay between two chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// Counts how many records of a collection are currently revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCursor {
    chunk_size: usize,
    total: usize,
    revealed: usize,
}

impl ChunkCursor {
    /// Start a reveal of `total` records; the first chunk is visible at once.
    ///
    /// A chunk size of zero is treated as one.
    #[must_use]
    pub fn new(chunk_size: usize, total: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            total,
            revealed: chunk_size.min(total),
        }
    }

    /// Number of records currently visible.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.revealed
    }

    /// Size of the collection being revealed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether every record is visible.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.revealed >= self.total
    }

    /// Reveal one more chunk. Returns `false` once nothing is left to reveal.
    pub fn advance(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.revealed = (self.revealed + self.chunk_size).min(self.total);
        true
    }

    /// Start over with a new collection size.
    pub fn reset(&mut self, total: usize) {
        *self = Self::new(self.chunk_size, total);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RevealState {
    generation: u64,
    visible: usize,
    total: usize,
}

/// Time-sliced reveal of a renderable set.
///
/// Must be used from within a tokio runtime. Dropping the revealer cancels any
/// reveal in progress.
#[derive(Debug)]
pub struct ChunkRevealer {
    chunk_size: usize,
    delay: Duration,
    state: Arc<watch::Sender<RevealState>>,
    lifetime: CancellationToken,
    run: CancellationToken,
}

impl Default for ChunkRevealer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_DELAY)
    }
}

impl ChunkRevealer {
    /// Create an idle revealer.
    #[must_use]
    pub fn new(chunk_size: usize, delay: Duration) -> Self {
        let (state, _) = watch::channel(RevealState {
            generation: 0,
            visible: 0,
            total: 0,
        });
        let lifetime = CancellationToken::new();
        let run = lifetime.child_token();
        Self {
            chunk_size: chunk_size.max(1),
            delay,
            state: Arc::new(state),
            lifetime,
            run,
        }
    }

    /// Number of records currently visible.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.state.borrow().visible
    }

    /// Size of the collection being revealed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.state.borrow().total
    }

    /// Whether the current reveal has shown every record.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let state = self.state.borrow();
        state.visible >= state.total
    }

    /// Watch the visible count as it grows.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        let (tx, rx) = watch::channel(self.visible());
        let mut source = self.state.subscribe();
        let token = self.lifetime.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    changed = source.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let visible = source.borrow_and_update().visible;
                if tx.send(visible).is_err() {
                    break;
                }
            }
        });
        rx
    }

    /// Cancel any reveal in progress and start revealing `total` records.
    pub fn restart(&mut self, total: usize) {
        self.run.cancel();
        self.run = self.lifetime.child_token();

        let mut cursor = ChunkCursor::new(self.chunk_size, total);
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.visible = cursor.visible();
            state.total = total;
            generation = state.generation;
        });
        debug!(total, chunk_size = self.chunk_size, "chunk reveal restarted");

        if cursor.is_complete() {
            return;
        }

        let mut ticker = interval_at(Instant::now() + self.delay, self.delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let state = Arc::clone(&self.state);
        let token = self.run.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                cursor.advance();
                let visible = cursor.visible();
                let current = state.send_if_modified(|s| {
                    if s.generation == generation {
                        s.visible = visible;
                        true
                    } else {
                        false
                    }
                });
                if !current || cursor.is_complete() {
                    return;
                }
            }
        });
    }

    /// Stop revealing; the visible count stays where it is.
    pub fn cancel(&self) {
        self.run.cancel();
    }
}

impl Drop for ChunkRevealer {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
