use std::{
    fmt::{Display, Error, Formatter},
    time::Duration,
};

/// A timer accumulating the time spent between its `start`/`resume` and `pause` calls.
///
/// Without the `profiler` feature the timer never advances and always reports zero.
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer {
    time: Duration,
    #[cfg(feature = "profiler")]
    start: Option<web_time::Instant>,
}

impl Timer {
    /// Creates a new timer initialized to zero and not started.
    pub fn new() -> Self {
        Timer {
            time: Duration::ZERO,
            #[cfg(feature = "profiler")]
            start: None,
        }
    }

    /// Resets the timer to 0.
    pub fn reset(&mut self) {
        self.time = Duration::ZERO;
        #[cfg(feature = "profiler")]
        {
            self.start = None;
        }
    }

    /// Resets the timer, then starts it.
    pub fn start(&mut self) {
        self.reset();
        self.resume();
    }

    /// Pauses the timer, adding the time elapsed since the last `start` or `resume`.
    pub fn pause(&mut self) {
        #[cfg(feature = "profiler")]
        {
            if let Some(start) = self.start.take() {
                self.time += web_time::Instant::now().duration_since(start);
            }
        }
    }

    /// Resumes the timer without resetting it.
    pub fn resume(&mut self) {
        #[cfg(feature = "profiler")]
        {
            self.start = Some(web_time::Instant::now());
        }
    }

    /// The accumulated time, in milliseconds.
    pub fn time(&self) -> f64 {
        self.time.as_secs_f64() * 1000.0
    }
}

impl Display for Timer {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{:.3}ms", self.time())
    }
}
