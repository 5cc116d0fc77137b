/// Anything that can be cross-faded.
///
/// A blendable exposes one scalar weight per stage; stage 0 is the primary
/// weight. Factors are written every tick while a transition ramp is running
/// and are always clamped to `[0, 1]`.
pub trait Blendable {
    /// Write the blend factor for `stage`.
    fn set_blend_factor(&mut self, stage: usize, factor: f64);

    /// Read the blend factor for `stage` (0.0 when the stage is unknown).
    fn blend_factor(&self, stage: usize) -> f64;
}

/// A named passive blend sink owned by the sequencer on behalf of an
/// external consumer (renderable/material nodes and the like).
///
/// The sequencer's clips write into the slot every tick a transition is
/// ramping; the host reads the factors back after `evaluate`.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BlendSlot {
    name: String,
    factors: Vec<f64>,
}

impl BlendSlot {
    /// Build a slot with a single zeroed stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factors: vec![0.0],
        }
    }

    /// Slot name as declared in the scene.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Blendable for BlendSlot {
    fn set_blend_factor(&mut self, stage: usize, factor: f64) {
        if self.factors.len() <= stage {
            self.factors.resize(stage + 1, 0.0);
        }
        self.factors[stage] = factor.clamp(0.0, 1.0);
    }

    fn blend_factor(&self, stage: usize) -> f64 {
        self.factors.get(stage).copied().unwrap_or(0.0)
    }
}

/// State of a transition ramp.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub enum RampState {
    /// Ramp has not been triggered.
    NotStarted,
    /// Ramp is running (or scheduled; see [`BlendRamp::value_at`]).
    Ramping {
        /// Absolute ramp start time in seconds (may lie in the future).
        start: f64,
        /// Ramp duration in seconds.
        duration: f64,
    },
    /// Ramp has reached its target.
    Finished,
}

/// A scheduled linear ramp between two blend weights.
///
/// Used by clips for both the in ramp (0 to 1) and the out ramp (1 to 0).
/// A ramp triggered with a start time in the future is delayed, not
/// discarded; one whose start lies in the past begins mid-way through.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct BlendRamp {
    from: f64,
    to: f64,
    state: RampState,
}

impl BlendRamp {
    /// A ramp resting at `from` until triggered, targeting `to`.
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from,
            to,
            state: RampState::NotStarted,
        }
    }

    /// Current ramp state.
    pub fn state(&self) -> RampState {
        self.state
    }

    /// Schedule the ramp. Returns `false` if it was already triggered with
    /// the same start and duration (nothing changed).
    pub fn trigger(&mut self, start: f64, duration: f64) -> bool {
        let next = RampState::Ramping {
            start,
            duration: duration.max(0.0),
        };
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }

    /// Reset to the untriggered baseline value.
    pub fn reset(&mut self) {
        self.state = RampState::NotStarted;
    }

    /// Whether the ramp has begun by `now` (trigger time reached).
    pub fn has_begun(&self, now: f64) -> bool {
        match self.state {
            RampState::NotStarted => false,
            RampState::Ramping { start, .. } => now >= start,
            RampState::Finished => true,
        }
    }

    /// Whether the ramp has reached its target value.
    pub fn is_finished(&self) -> bool {
        self.state == RampState::Finished
    }

    /// Ramp value at `now`, advancing to `Finished` once the target is hit.
    pub fn value_at(&mut self, now: f64) -> f64 {
        match self.state {
            RampState::NotStarted => self.from,
            RampState::Finished => self.to,
            RampState::Ramping { start, duration } => {
                if now < start {
                    self.from
                } else if duration <= 0.0 || now >= start + duration {
                    self.state = RampState::Finished;
                    self.to
                } else {
                    let t = (now - start) / duration;
                    self.from + (self.to - self.from) * t
                }
            }
        }
    }
}
