use crate::clip::clip::{Clip, ClipId};
use crate::timeline::arena::TimelineArena;
use crate::variable::expr::{Variable, VariableBank};

/// Enabled trigger conditions for a transition edge.
///
/// An edge with no condition enabled never fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TriggerSet {
    /// Fire so that the out-transition ends together with the source
    /// clip's timelines.
    #[serde(default)]
    pub clip_finished: bool,
    /// Fire so that the out-transition ends at a loop boundary (the outro
    /// is not waited for).
    #[serde(default)]
    pub loop_finished: bool,
    /// Fire the tick the trigger variable reads true.
    #[serde(default)]
    pub variable: bool,
}

impl TriggerSet {
    /// Whether any condition is enabled.
    pub fn any(&self) -> bool {
        self.clip_finished || self.loop_finished || self.variable
    }
}

/// Which condition satisfied a transition this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireReason {
    /// The source clip's remaining time crossed the fire threshold.
    ClipFinished,
    /// The source clip's remaining loop time crossed the fire threshold.
    LoopFinished,
    /// The trigger variable read true.
    Variable,
}

/// A directed, triggerable edge between two clips.
///
/// Evaluated once per tick by the owning sequencer, never self-scheduling.
/// Fire points are computed fresh from current remaining-time state each
/// tick, so `time_scale` changes and stalls between ticks are naturally
/// absorbed.
#[derive(Debug)]
pub struct ClipTransition {
    name: String,
    from: ClipId,
    to: ClipId,
    trigger: TriggerSet,
    variable: Option<usize>,
    out_duration: f64,
    out_offset: f64,
    in_duration: f64,
    in_offset: f64,
}

impl ClipTransition {
    /// Build an edge from `from` to `to` with the given trigger set.
    pub fn new(name: impl Into<String>, from: ClipId, to: ClipId, trigger: TriggerSet) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            trigger,
            variable: None,
            out_duration: 0.0,
            out_offset: 0.0,
            in_duration: 0.0,
            in_offset: 0.0,
        }
    }

    /// Attach the trigger variable (index into the sequencer's variables).
    pub fn with_variable(mut self, variable: usize) -> Self {
        self.variable = Some(variable);
        self
    }

    /// Set the out-transition duration and signed offset.
    pub fn with_out(mut self, duration: f64, offset: f64) -> Self {
        self.out_duration = duration.max(0.0);
        self.out_offset = offset;
        self
    }

    /// Set the in-transition duration and signed offset.
    pub fn with_in(mut self, duration: f64, offset: f64) -> Self {
        self.in_duration = duration.max(0.0);
        self.in_offset = offset;
        self
    }

    /// Edge name for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source clip.
    pub fn from(&self) -> ClipId {
        self.from
    }

    /// Target clip.
    pub fn to(&self) -> ClipId {
        self.to
    }

    /// Enabled trigger conditions.
    pub fn trigger(&self) -> TriggerSet {
        self.trigger
    }

    /// Index of the attached trigger variable, if any.
    pub fn variable_ref(&self) -> Option<usize> {
        self.variable
    }

    /// Evaluate the trigger conditions against current state. Multiple
    /// simultaneously-satisfied conditions collapse into a single fire.
    pub fn should_fire(
        &self,
        from_clip: &Clip,
        arena: &TimelineArena,
        variables: &[Variable],
        bank: &VariableBank,
    ) -> Option<FireReason> {
        // The offset shifts the fire point: negative fires earlier (more
        // remaining time), positive delays past the natural boundary.
        let threshold = self.out_duration - self.out_offset;

        if self.trigger.clip_finished && from_clip.remaining_clip_time(arena) <= threshold {
            return Some(FireReason::ClipFinished);
        }
        if self.trigger.loop_finished && from_clip.remaining_loop_time(arena) <= threshold {
            return Some(FireReason::LoopFinished);
        }
        if self.trigger.variable
            && let Some(var) = self.variable.and_then(|i| variables.get(i))
            && var.get_bool(bank)
        {
            return Some(FireReason::Variable);
        }
        None
    }

    /// Invoke the transition: schedule the source clip's fade-out and the
    /// target clip's fade-in independently (asymmetric cross-fades are
    /// fine).
    ///
    /// For the time-based conditions the out offset was already consumed by
    /// the fire-point computation, so the fade-out starts now; the in
    /// offset shifts the fade-in start relative to the fire tick. For the
    /// variable condition negative offsets are clamped to zero (no
    /// scheduling into the past).
    pub fn fire(
        &self,
        reason: FireReason,
        now: f64,
        from_clip: &mut Clip,
        to_clip: &mut Clip,
        arena: &mut TimelineArena,
    ) {
        let (out_start, in_start) = match reason {
            FireReason::Variable => (
                now + self.out_offset.max(0.0),
                now + self.in_offset.max(0.0),
            ),
            FireReason::ClipFinished | FireReason::LoopFinished => (now, now + self.in_offset),
        };
        from_clip.trigger_out_transition(out_start, self.out_duration);
        to_clip.trigger_in_transition(in_start, self.in_duration, now, arena);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequencer/transition.rs"]
mod tests;
