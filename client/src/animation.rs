use std::fmt;
use std::iter::Peekable;
use std::time::{Duration, Instant};

/// A clock-driven animation over a lazy frame sequence.
///
/// Frame `i` becomes due at `started_at + i * cadence`. Each `advance` call
/// returns the newest due frame, dropping any a late tick skipped over.
/// Replacing a track with a new one supersedes it; `cancel` abandons the
/// remaining frames.
pub struct Track<I: Iterator> {
    frames: Peekable<I>,
    started_at: Instant,
    cadence: Duration,
    emitted: u128,
    cancelled: bool,
}

impl<I: Iterator> Track<I> {
    pub fn new(frames: I, started_at: Instant, cadence: Duration) -> Self {
        Self {
            frames: frames.peekable(),
            started_at,
            cadence,
            emitted: 0,
            cancelled: false,
        }
    }

    pub fn advance(&mut self, now: Instant) -> Option<I::Item> {
        if self.cancelled {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let due = if self.cadence.is_zero() {
            u128::MAX
        } else {
            elapsed.as_nanos() / self.cadence.as_nanos() + 1
        };

        let mut latest = None;
        while self.emitted < due {
            let Some(frame) = self.frames.next() else {
                break;
            };
            latest = Some(frame);
            self.emitted += 1;
        }
        latest
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_finished(&mut self) -> bool {
        self.cancelled || self.frames.peek().is_none()
    }
}

impl<I: Iterator> fmt::Debug for Track<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("started_at", &self.started_at)
            .field("cadence", &self.cadence)
            .field("emitted", &self.emitted)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}
