use crate::foundation::error::{CadenzaError, CadenzaResult};

/// Per-tick input delivered by the external traversal framework.
///
/// `time` is seconds since engine start and is monotonically non-decreasing
/// across ticks; `duration` is the length of this tick in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TickContext {
    /// Absolute tick time in seconds since engine start.
    pub time: f64,
    /// Tick duration in seconds.
    pub duration: f64,
    /// Trigger-group mask forwarded to group start/stop broadcasts.
    #[serde(default)]
    pub trigger_mask: u32,
}

impl TickContext {
    /// Build a tick context with an empty trigger mask.
    pub fn new(time: f64, duration: f64) -> Self {
        Self {
            time,
            duration,
            trigger_mask: 0,
        }
    }

    /// Build a tick context carrying a trigger-group mask.
    pub fn with_mask(time: f64, duration: f64, trigger_mask: u32) -> Self {
        Self {
            time,
            duration,
            trigger_mask,
        }
    }
}

/// A relative time range in seconds, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Range start in seconds.
    pub start: f64,
    /// Range end in seconds (inclusive for cursor purposes).
    pub end: f64,
}

impl TimeRange {
    /// Build a range, rejecting `start > end` and non-finite bounds.
    pub fn new(start: f64, end: f64) -> CadenzaResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(CadenzaError::validation("TimeRange bounds must be finite"));
        }
        if start > end {
            return Err(CadenzaError::validation("TimeRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Range length in seconds.
    pub fn duration(self) -> f64 {
        self.end - self.start
    }

    /// Whether `t` lies within `[start, end]`.
    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    /// Clamp `t` into `[start, end]`.
    pub fn clamp(self, t: f64) -> f64 {
        t.clamp(self.start, self.end)
    }
}
