//! Progress reporting for the streaming passes.
//!
//! With the `progress` feature, [`PassProgress`] renders an `indicatif`
//! bar (or a spinner when the number of events is unknown) and reports the
//! per-event timing as an exponential moving average:
//!
//! ```text
//! ema ← α·dt + (1–α)·ema        α ∈ (0, 1]
//! ```
//!
//! Without the feature every method is a no-op and the type is zero-sized,
//! so the pass loops can call it unconditionally.
#[cfg(feature = "progress")]
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Smoothing factor of the per-event timing average.
#[cfg(feature = "progress")]
const TIMING_ALPHA: f64 = 0.2;

/// Refresh the message only every this many events.
#[cfg(feature = "progress")]
const MESSAGE_STRIDE: u64 = 1024;

#[cfg(feature = "progress")]
pub(crate) struct IterTimer {
    last: Instant,
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

#[cfg(feature = "progress")]
impl IterTimer {
    pub(crate) fn new(alpha: f64) -> Self {
        Self {
            last: Instant::now(),
            ema_ns: 0.0,
            alpha,
            count: 0,
        }
    }

    /// Close the current interval of `n` events and fold its mean duration into the average.
    #[inline]
    pub(crate) fn tick(&mut self, n: u64) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last) / n.max(1) as u32;
        self.last = now;
        self.count += 1;

        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
        dt
    }

    #[inline]
    pub(crate) fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }
}

#[cfg(feature = "progress")]
pub(crate) fn fmt_dur(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns < 1_000 {
        format!("{ns}ns")
    } else if ns < 1_000_000 {
        format!("{}µs", d.as_micros())
    } else if ns < 1_000_000_000 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f32())
    }
}

/// Progress display of one pass over a measurement source.
pub(crate) struct PassProgress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
    #[cfg(feature = "progress")]
    timer: IterTimer,
}

impl PassProgress {
    /// Start a display for `total` events, or a spinner when `total` is unknown.
    #[cfg_attr(not(feature = "progress"), allow(unused_variables))]
    pub(crate) fn new(label: &str, total: Option<usize>) -> Self {
        #[cfg(feature = "progress")]
        {
            let (bar, template) = match total {
                Some(n) => (
                    ProgressBar::new(n.max(1) as u64),
                    "{prefix} {bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
                ),
                None => (
                    ProgressBar::new_spinner(),
                    "{prefix} {spinner} {pos} events | {per_sec} | {elapsed_precise} | {msg}",
                ),
            };
            bar.set_style(
                ProgressStyle::with_template(template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(200));
            PassProgress {
                bar,
                timer: IterTimer::new(TIMING_ALPHA),
            }
        }
        #[cfg(not(feature = "progress"))]
        PassProgress {}
    }

    /// Record one processed event.
    #[inline]
    pub(crate) fn inc(&mut self) {
        #[cfg(feature = "progress")]
        {
            self.bar.inc(1);
            if self.bar.position() % MESSAGE_STRIDE == 0 {
                let last = self.timer.tick(MESSAGE_STRIDE);
                let avg = self.timer.avg();
                self.bar
                    .set_message(format!("last: {}, avg: {}", fmt_dur(last), fmt_dur(avg)));
            }
        }
    }

    pub(crate) fn finish(self) {
        #[cfg(feature = "progress")]
        {
            self.bar.disable_steady_tick();
            self.bar.finish_and_clear();
        }
    }
}
