use std::collections::VecDeque;
use std::time::Instant;

use gw2map_shared::Vector2;

/// Samples retained for the spline window.
pub const WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveTuning {
    /// Cadence of emitted frames.
    pub frame_ms: f64,
    /// EMA smoothing factor for the speed estimate.
    pub alpha: f64,
    /// Speed (map units per ms) above which the segment time stops shrinking.
    pub speed_cap: f64,
    /// Segment time before any speed estimate exists.
    pub initial_segment_ms: f64,
    /// Upper bound for slow or stationary entities.
    pub max_segment_ms: f64,
}

impl Default for CurveTuning {
    fn default() -> Self {
        Self {
            frame_ms: 15.0,
            alpha: 0.2,
            speed_cap: 0.05,
            initial_segment_ms: 300.0,
            max_segment_ms: 3_000.0,
        }
    }
}

impl CurveTuning {
    fn min_segment_ms(&self) -> f64 {
        self.frame_ms / self.speed_cap * 0.9
    }
}

/// Rolling position history with a speed estimate, producing spline frames
/// that ease a marker toward its newest reported position.
#[derive(Debug, Clone)]
pub struct CurveInterpolator {
    samples: VecDeque<Vector2>,
    last_sample_at: Option<Instant>,
    ema_speed: f64,
    segment_ms: f64,
    tuning: CurveTuning,
}

impl CurveInterpolator {
    pub fn new(tuning: CurveTuning) -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW + 1),
            last_sample_at: None,
            ema_speed: 0.0,
            segment_ms: tuning.initial_segment_ms,
            tuning,
        }
    }

    pub fn push_sample(&mut self, position: Vector2, at: Instant) {
        let elapsed_ms = self
            .last_sample_at
            .map(|last| at.saturating_duration_since(last).as_secs_f64() * 1000.0);
        if self.last_sample_at.is_none_or(|last| at > last) {
            self.last_sample_at = Some(at);
        }

        self.samples.push_back(position);
        while self.samples.len() > WINDOW {
            self.samples.pop_front();
        }

        let Some(elapsed_ms) = elapsed_ms.filter(|ms| *ms > 0.0) else {
            return;
        };
        let n = self.samples.len();
        if n < 2 {
            return;
        }

        let speed = self.samples[n - 1].distance(self.samples[n - 2]) / elapsed_ms;
        if !speed.is_finite() {
            return;
        }
        self.ema_speed = self.tuning.alpha * speed + (1.0 - self.tuning.alpha) * self.ema_speed;

        self.segment_ms = if self.ema_speed > self.tuning.speed_cap {
            self.tuning.min_segment_ms()
        } else if self.ema_speed > 0.0 {
            (self.tuning.frame_ms / self.ema_speed).min(self.tuning.max_segment_ms)
        } else {
            self.tuning.max_segment_ms
        };
    }

    /// Frames easing toward the newest sample, or `None` while fewer than
    /// [`WINDOW`] samples exist (the caller moves the marker directly).
    pub fn produce_frames(&self) -> Option<FrameSequence> {
        if self.samples.len() < WINDOW {
            return None;
        }

        let s1 = self.samples[1];
        let s2 = self.samples[2];
        let s3 = self.samples[3];
        // Shifted one sample forward of the s1..s2 span so the curve ends on the
        // newest sample: the warm-up moves already reached s3 and the marker must
        // not step back. The trailing control point continues the last step.
        let control = [s1, s2, s3, s3 + (s3 - s2)];

        Some(FrameSequence::new(
            control,
            self.tuning.frame_ms,
            self.segment_ms,
        ))
    }

    pub fn samples(&self) -> impl ExactSizeIterator<Item = &Vector2> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<Vector2> {
        self.samples.back().copied()
    }

    pub fn ema_speed(&self) -> f64 {
        self.ema_speed
    }

    pub fn segment_ms(&self) -> f64 {
        self.segment_ms
    }
}

/// Lazy, finite sequence of spline positions at a fixed cadence, from
/// `t = 0` to `t = 1` inclusive.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    control: [Vector2; 4],
    frame_ms: f64,
    segment_ms: f64,
    frame_count: u32,
    next: u32,
}

impl FrameSequence {
    fn new(control: [Vector2; 4], frame_ms: f64, segment_ms: f64) -> Self {
        let frame_count = (segment_ms / frame_ms).ceil().max(1.0) as u32;
        Self {
            control,
            frame_ms,
            segment_ms,
            frame_count,
            next: 0,
        }
    }
}

impl Iterator for FrameSequence {
    type Item = Vector2;

    fn next(&mut self) -> Option<Vector2> {
        if self.next > self.frame_count {
            return None;
        }
        let t = (f64::from(self.next) * self.frame_ms / self.segment_ms).min(1.0);
        self.next += 1;
        catmull_rom(t, &self.control)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.frame_count + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

/// Uniform Catmull-Rom through `points`, with `t` in `[0, 1]` spanning the
/// interior segments. The segment index is clamped so `t` never reads
/// outside the slice.
pub fn catmull_rom(t: f64, points: &[Vector2]) -> Option<Vector2> {
    let n = points.len();
    if n < 4 {
        return None;
    }

    let spans = (n - 3) as f64;
    let k = ((t * spans).floor().max(0.0) as usize).min(n - 4);
    let u = t * spans - k as f64;

    let p0 = points[k];
    let p1 = points[k + 1];
    let p2 = points[k + 2];
    let p3 = points[k + 3];

    let u2 = u * u;
    let u3 = u2 * u;

    let blend = |a: f64, b: f64, c: f64, d: f64| {
        0.5 * ((2.0 * b)
            + (-a + c) * u
            + (2.0 * a - 5.0 * b + 4.0 * c - d) * u2
            + (-a + 3.0 * b - 3.0 * c + d) * u3)
    };

    Some(Vector2::new(
        blend(p0.x, p1.x, p2.x, p3.x),
        blend(p0.y, p1.y, p2.y, p3.y),
    ))
}
