use crate::blend::blendable::{BlendRamp, BlendSlot, Blendable, RampState};
use crate::foundation::time::TickContext;
use crate::timeline::arena::{TimelineArena, TimelineId};
use crate::timeline::timeline::PlayState;

/// Non-owning index of a clip within its sequencer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ClipId(pub u32);

impl ClipId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a clip's transition ramp is written each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendTarget {
    /// A timeline in the arena (stage 0, fanning out to its sub-stages).
    Timeline(TimelineId),
    /// An external sink slot owned by the sequencer, readable by the host.
    External(usize),
}

/// A named animation state: a set of timelines started and stopped
/// together, plus the blend targets that receive the clip's in/out ramp.
///
/// The clip is passive: transitions are triggered on it by the owning
/// sequencer, and it never guards against being triggered twice in one
/// tick (that guard lives in the sequencer).
#[derive(Debug)]
pub struct Clip {
    name: String,
    timelines: Vec<TimelineId>,
    blend_targets: Vec<BlendTarget>,
    in_ramp: BlendRamp,
    out_ramp: BlendRamp,
    active: bool,
    timelines_started: bool,
    loops_released: bool,
}

impl Clip {
    /// Build an empty clip.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timelines: Vec::new(),
            blend_targets: Vec::new(),
            in_ramp: BlendRamp::new(0.0, 1.0),
            out_ramp: BlendRamp::new(1.0, 0.0),
            active: false,
            timelines_started: false,
            loops_released: false,
        }
    }

    /// Clip name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference a timeline; it is also registered as a blend target.
    pub fn add_timeline(&mut self, id: TimelineId) {
        self.timelines.push(id);
        self.blend_targets.push(BlendTarget::Timeline(id));
    }

    /// Register an additional blend target.
    pub fn add_blend_target(&mut self, target: BlendTarget) {
        self.blend_targets.push(target);
    }

    /// Referenced timeline ids.
    pub fn timelines(&self) -> &[TimelineId] {
        &self.timelines
    }

    /// Whether this clip currently participates in per-tick evaluation.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// In-ramp state (0 towards 1).
    pub fn in_transition_state(&self) -> RampState {
        self.in_ramp.state()
    }

    /// Out-ramp state (1 towards 0).
    pub fn out_transition_state(&self) -> RampState {
        self.out_ramp.state()
    }

    /// Whether the in ramp has reached its target for all blend targets.
    pub fn is_in_transition_finished(&self) -> bool {
        self.in_ramp.is_finished()
    }

    /// Whether the out ramp has reached its target for all blend targets.
    pub fn is_out_transition_finished(&self) -> bool {
        self.out_ramp.is_finished()
    }

    /// Schedule the blend-in ramp from `start` for `duration` seconds and
    /// mark the clip entered. Referenced timelines start once the ramp
    /// actually begins (start time reached — possibly this very call).
    /// A future `start` delays the effect, it does not discard it.
    pub fn trigger_in_transition(
        &mut self,
        start: f64,
        duration: f64,
        now: f64,
        arena: &mut TimelineArena,
    ) -> bool {
        let changed = self.in_ramp.trigger(start, duration);
        self.out_ramp.reset();
        self.active = true;
        self.timelines_started = false;
        self.loops_released = false;
        self.maybe_begin_in(now, arena);
        changed
    }

    /// Schedule the blend-out ramp from `start` for `duration` seconds.
    /// Referenced timelines stop once the ramp completes *and* each has
    /// independently reached its own end, whichever is later.
    pub fn trigger_out_transition(&mut self, start: f64, duration: f64) -> bool {
        self.out_ramp.trigger(start, duration)
    }

    /// Clear both ramps to their non-running baselines (in = 0, out = 1)
    /// without touching timeline playback state.
    pub fn reset_transitions(&mut self) {
        self.in_ramp.reset();
        self.out_ramp.reset();
        self.loops_released = false;
    }

    /// Stop every referenced timeline and return to the inert baseline.
    pub fn reset(&mut self, arena: &mut TimelineArena) {
        for &id in &self.timelines {
            arena.stop(id);
        }
        self.reset_transitions();
        self.active = false;
        self.timelines_started = false;
    }

    /// Aggregate remaining time over referenced timelines that have not
    /// stopped (maximum; 0 for a clip with no running timelines).
    pub fn remaining_clip_time(&self, arena: &TimelineArena) -> f64 {
        self.timelines
            .iter()
            .filter_map(|&id| arena.get(id))
            .filter(|t| t.state() != PlayState::Stopped)
            .map(|t| t.remaining_clip_time())
            .fold(0.0, f64::max)
    }

    /// Aggregate remaining loop time over referenced timelines that have
    /// not stopped (maximum; excludes outro phases).
    pub fn remaining_loop_time(&self, arena: &TimelineArena) -> f64 {
        self.timelines
            .iter()
            .filter_map(|&id| arena.get(id))
            .filter(|t| t.state() != PlayState::Stopped)
            .map(|t| t.remaining_loop_time())
            .fold(0.0, f64::max)
    }

    /// Per-tick ramp update: begins a due in-transition, writes the
    /// combined blend factor to every target, releases loops once the out
    /// ramp completes, and deactivates the clip when its timelines have all
    /// come to rest.
    pub fn update(
        &mut self,
        tick: &TickContext,
        arena: &mut TimelineArena,
        externals: &mut [BlendSlot],
    ) {
        if !self.active {
            return;
        }
        let now = tick.time;
        self.maybe_begin_in(now, arena);

        let in_v = self.in_ramp.value_at(now);
        let out_v = self.out_ramp.value_at(now);

        if self.out_ramp.is_finished() && !self.loops_released {
            // The fade-out is done; let still-looping timelines run their
            // current iteration to the boundary and end via their outro.
            for &id in &self.timelines {
                if let Some(t) = arena.get_mut(id)
                    && t.state() == PlayState::Running
                {
                    t.release_loops();
                }
            }
            self.loops_released = true;
        }

        let factor = (in_v * out_v).clamp(0.0, 1.0);
        self.write_blend(factor, arena, externals);

        if self.out_ramp.is_finished() && self.timelines_at_rest(arena) {
            self.deactivate(arena);
        }
    }

    fn maybe_begin_in(&mut self, now: f64, arena: &mut TimelineArena) {
        if self.timelines_started || !self.in_ramp.has_begun(now) {
            return;
        }
        for &id in &self.timelines {
            let auto = arena.get(id).is_some_and(|t| t.start_on_activate());
            if auto {
                // Gated-off or already-running starts are quiet no-ops.
                let _ = arena.start(id);
            }
        }
        self.timelines_started = true;
    }

    fn timelines_at_rest(&self, arena: &TimelineArena) -> bool {
        self.timelines
            .iter()
            .filter_map(|&id| arena.get(id))
            .all(|t| t.state() != PlayState::Running)
    }

    fn deactivate(&mut self, arena: &mut TimelineArena) {
        for &id in &self.timelines {
            let auto = arena.get(id).is_some_and(|t| t.stop_on_deactivate());
            if auto {
                arena.stop(id);
            }
        }
        self.active = false;
        self.timelines_started = false;
    }

    fn write_blend(&self, factor: f64, arena: &mut TimelineArena, externals: &mut [BlendSlot]) {
        for &target in &self.blend_targets {
            match target {
                BlendTarget::Timeline(id) => arena.set_blend_factor(id, 0, factor),
                BlendTarget::External(i) => {
                    if let Some(slot) = externals.get_mut(i) {
                        slot.set_blend_factor(0, factor);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/clip.rs"]
mod tests;
