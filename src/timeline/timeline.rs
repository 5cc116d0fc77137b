use crate::blend::blendable::Blendable;
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::foundation::time::{TickContext, TimeRange};

/// Playback state of a timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Not advancing; cursor frozen (or rewound when `auto_rewind` is set).
    Stopped,
    /// Advancing every tick.
    Running,
    /// Not advancing; cursor frozen, resumable.
    Paused,
}

/// Static configuration for a [`Timeline`].
///
/// Plain data; lowered from the scene model or built programmatically.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineSpec {
    /// Timeline name for authoring/debugging.
    pub name: String,
    /// Overall play range `[start, end]` in relative seconds.
    pub range: TimeRange,
    /// Loop phase bounds. `loop_range.start == range.start` removes the
    /// intro, `loop_range.end == range.end` removes the outro. Required
    /// when `loops != 0`, ignored otherwise.
    pub loop_range: Option<TimeRange>,
    /// Loop count: 0 = no loop phase, >0 = finite repeats, <0 = infinite.
    pub loops: i32,
    /// Loop iteration to begin playback in; >= 1 skips the intro.
    pub start_loop: u32,
    /// Tick-to-time scale applied to every advance.
    pub time_scale: f64,
    /// Cursor displacement applied at rewind time.
    pub time_offset: f64,
    /// Trigger-group membership mask for group start/stop broadcasts.
    pub trigger_group_mask: u32,
    /// Rewind the cursor when the timeline stops.
    pub auto_rewind: bool,
    /// Started automatically when the owning clip activates.
    pub start_on_activate: bool,
    /// Stopped automatically when the owning clip deactivates.
    pub stop_on_deactivate: bool,
}

impl Default for TimelineSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            range: TimeRange {
                start: 0.0,
                end: 0.0,
            },
            loop_range: None,
            loops: 0,
            start_loop: 0,
            time_scale: 1.0,
            time_offset: 0.0,
            trigger_group_mask: 0,
            auto_rewind: false,
            start_on_activate: true,
            stop_on_deactivate: true,
        }
    }
}

/// A running time cursor with intro/loop/outro phases.
///
/// The cursor lives in `[range.start, range.end]`; while the loop phase is
/// active it wraps back from `loop_range.end` to `loop_range.start` until
/// the configured iterations are exhausted. `current_loop` reports the
/// phase: 0 = intro, 1..=n = loop iteration, n+1 = outro.
#[derive(Clone, Debug)]
pub struct Timeline {
    spec: TimelineSpec,

    state: PlayState,
    current_time: f64,
    current_loop: i32,
    prev_time: f64,
    prev_loop: i32,
    outro_entered: bool,
    was_running: bool,
    stall_pending: bool,
    loop_release: bool,
    pending_shift: f64,
    blend: Vec<f64>,
}

impl Timeline {
    /// Build an inert (stopped, rewound) timeline from its spec.
    pub fn new(spec: TimelineSpec) -> CadenzaResult<Self> {
        validate_spec(&spec)?;
        let mut tl = Self {
            spec,
            state: PlayState::Stopped,
            current_time: 0.0,
            current_loop: 0,
            prev_time: 0.0,
            prev_loop: 0,
            outro_entered: false,
            was_running: false,
            stall_pending: false,
            loop_release: false,
            pending_shift: 0.0,
            blend: Vec::new(),
        };
        tl.rewind_cursor();
        Ok(tl)
    }

    /// Timeline name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Current configuration.
    pub fn spec(&self) -> &TimelineSpec {
        &self.spec
    }

    /// Playback state.
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Current cursor position in relative seconds.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Current phase index: 0 intro, 1..=n loop iteration, n+1 outro.
    pub fn current_loop(&self) -> i32 {
        self.current_loop
    }

    /// True for exactly one tick after the timeline stopped by reaching its
    /// end.
    pub fn was_running(&self) -> bool {
        self.was_running
    }

    /// Whether the timeline auto-starts when its owning clip activates.
    pub fn start_on_activate(&self) -> bool {
        self.spec.start_on_activate
    }

    /// Whether the timeline auto-stops when its owning clip deactivates.
    pub fn stop_on_deactivate(&self) -> bool {
        self.spec.stop_on_deactivate
    }

    /// Trigger-group membership mask.
    pub fn trigger_group_mask(&self) -> u32 {
        self.spec.trigger_group_mask
    }

    /// Begin running. Idempotent while already running (the cursor
    /// continues without resetting); resumes when paused; otherwise rewinds
    /// first. Returns whether anything changed.
    pub fn start(&mut self) -> CadenzaResult<bool> {
        validate_spec(&self.spec)?;
        if self.state == PlayState::Running {
            return Ok(false);
        }
        if self.state == PlayState::Stopped {
            self.rewind_cursor();
        }
        self.state = PlayState::Running;
        Ok(true)
    }

    /// Reconfigure the play range (and optionally the loop setup), rewind
    /// and begin running.
    pub fn start_with(
        &mut self,
        range: TimeRange,
        loop_range: Option<TimeRange>,
        loops: i32,
    ) -> CadenzaResult<()> {
        let mut spec = self.spec.clone();
        spec.range = range;
        spec.loop_range = loop_range;
        spec.loops = loops;
        validate_spec(&spec)?;
        self.spec = spec;
        self.rewind_cursor();
        self.state = PlayState::Running;
        Ok(())
    }

    /// Pause advancement. Returns `false` when not running.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayState::Running {
            return false;
        }
        self.state = PlayState::Paused;
        true
    }

    /// Resume a paused timeline. Returns `false` when not paused.
    pub fn resume(&mut self) -> bool {
        if self.state != PlayState::Paused {
            return false;
        }
        self.state = PlayState::Running;
        true
    }

    /// Stop playback, freezing the cursor (rewinding when `auto_rewind` is
    /// configured). Returns `false` when already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state == PlayState::Stopped {
            return false;
        }
        self.state = PlayState::Stopped;
        if self.spec.auto_rewind {
            self.rewind_cursor();
        }
        true
    }

    /// Move the cursor back to its start position without changing state.
    pub fn rewind(&mut self) -> bool {
        let before = (self.current_time, self.current_loop);
        self.rewind_cursor();
        before != (self.current_time, self.current_loop)
    }

    /// Fully re-initialize: stop, rewind, clear latches and pending
    /// adjustments.
    pub fn reset(&mut self) {
        self.state = PlayState::Stopped;
        self.was_running = false;
        self.stall_pending = false;
        self.pending_shift = 0.0;
        self.rewind_cursor();
    }

    /// Reconfigure from a new spec and fully re-initialize.
    pub fn reset_to(&mut self, spec: TimelineSpec) -> CadenzaResult<()> {
        validate_spec(&spec)?;
        self.spec = spec;
        self.reset();
        Ok(())
    }

    /// Skip advancement for exactly one tick without changing state.
    ///
    /// Used by data-starved media sources to stay in sync with a stalled
    /// producer. Returns `false` when a stall is already pending.
    pub fn stall(&mut self) -> bool {
        if self.stall_pending {
            return false;
        }
        self.stall_pending = true;
        true
    }

    /// Apply a one-shot cursor shift at the next advance (master-clock
    /// resync).
    pub fn shift_time(&mut self, delta: f64) {
        self.pending_shift += delta;
    }

    /// Leave the loop phase at the next loop boundary.
    ///
    /// The iteration in flight becomes the last one; the cursor then
    /// proceeds through the outro and the timeline ends naturally. Used
    /// when an owning clip's out-transition completes while this timeline
    /// still loops.
    pub fn release_loops(&mut self) -> bool {
        if self.loop_release || self.spec.loops == 0 {
            return false;
        }
        self.loop_release = true;
        true
    }

    /// Clear the one-tick `was_running` latch and edge-query baselines.
    /// Invoked by the arena at the start of every tick, before any
    /// advancement.
    pub(crate) fn begin_tick(&mut self) {
        self.was_running = false;
        self.prev_time = self.current_time;
        self.prev_loop = self.current_loop;
    }

    /// Advance the cursor by one tick. Invoked once per tick by the owning
    /// arena while `Running`.
    ///
    /// A timeline that declares trigger-group membership responds only to
    /// ticks whose mask intersects its own; the mask rides the tick rather
    /// than living in global state.
    pub(crate) fn advance(&mut self, tick: &TickContext) {
        if self.state != PlayState::Running {
            return;
        }
        if self.spec.trigger_group_mask != 0
            && tick.trigger_mask & self.spec.trigger_group_mask == 0
        {
            return;
        }
        if self.stall_pending {
            self.stall_pending = false;
            return;
        }

        self.prev_time = self.current_time;
        self.prev_loop = self.current_loop;

        let delta = tick.duration * self.spec.time_scale + self.pending_shift;
        self.pending_shift = 0.0;
        self.current_time += delta;

        self.resolve_phase();

        let can_end = self.loop_phase().is_none() || self.outro_entered;
        if can_end && self.current_time >= self.spec.range.end {
            self.current_time = self.spec.range.end;
            self.state = PlayState::Stopped;
            self.was_running = true;
            if self.spec.auto_rewind {
                self.rewind_cursor_keep_edges();
            }
        }
    }

    fn loop_phase(&self) -> Option<(TimeRange, i32)> {
        match self.spec.loop_range {
            Some(r) if self.spec.loops != 0 && r.duration() > 0.0 => Some((r, self.spec.loops)),
            _ => None,
        }
    }

    fn resolve_phase(&mut self) {
        let Some((lr, n)) = self.loop_phase() else {
            return;
        };
        if self.outro_entered {
            return;
        }

        // Intro -> first loop iteration.
        if self.current_loop == 0 {
            if self.current_time < lr.start {
                return;
            }
            self.current_loop = 1;
        }

        let loop_dur = lr.duration();
        while self.current_time >= lr.end {
            let last = self.loop_release || (n >= 0 && self.current_loop >= n);
            if last {
                // Enter the outro; the cursor keeps its overshoot.
                self.current_loop += 1;
                self.outro_entered = true;
                break;
            }
            self.current_time -= loop_dur;
            self.current_loop += 1;
        }
    }

    /// Naive remaining time: `range.end - current_time` (ignores pending
    /// loop iterations).
    pub fn remaining_time(&self) -> f64 {
        (self.spec.range.end - self.current_time).max(0.0)
    }

    /// Remaining time until this timeline ends, accounting for pending loop
    /// iterations. `f64::INFINITY` while looping infinitely (unless the
    /// loop has been released).
    pub fn remaining_clip_time(&self) -> f64 {
        let Some((lr, n)) = self.loop_phase() else {
            return self.remaining_time();
        };
        if n < 0 && !self.loop_release && !self.outro_entered {
            return f64::INFINITY;
        }
        let outro = (self.spec.range.end - lr.end).max(0.0);
        let loop_dur = lr.duration();

        match self.phase() {
            Phase::Intro => {
                let pending = if self.loop_release { 1 } else { n.max(1) };
                (lr.start - self.current_time).max(0.0) + f64::from(pending) * loop_dur + outro
            }
            Phase::Loop(k) => {
                let pending = if self.loop_release || n < 0 {
                    0
                } else {
                    (n - k).max(0)
                };
                (lr.end - self.current_time).max(0.0) + f64::from(pending) * loop_dur + outro
            }
            Phase::Outro => self.remaining_time(),
        }
    }

    /// Remaining time until the loop phase is exited (excluding the outro).
    ///
    /// For infinite loop counts this is the time to the current iteration's
    /// boundary, letting triggers cut away at a loop boundary. 0 during the
    /// outro; the naive remaining time when no loop phase is configured.
    pub fn remaining_loop_time(&self) -> f64 {
        let Some((lr, n)) = self.loop_phase() else {
            return self.remaining_time();
        };
        let loop_dur = lr.duration();
        match self.phase() {
            Phase::Intro => {
                let first = (lr.start - self.current_time).max(0.0) + loop_dur;
                if n < 0 || self.loop_release {
                    first
                } else {
                    first + f64::from((n - 1).max(0)) * loop_dur
                }
            }
            Phase::Loop(k) => {
                let boundary = (lr.end - self.current_time).max(0.0);
                if n < 0 || self.loop_release {
                    boundary
                } else {
                    boundary + f64::from((n - k).max(0)) * loop_dur
                }
            }
            Phase::Outro => 0.0,
        }
    }

    /// Remaining loop iterations: −1 when infinite, 0 during intro/outro or
    /// without a loop phase, else `loops - current_loop`.
    pub fn remaining_loops(&self) -> i32 {
        let Some((_, n)) = self.loop_phase() else {
            return 0;
        };
        if n < 0 {
            return -1;
        }
        match self.phase() {
            Phase::Loop(k) => (n - k).max(0),
            Phase::Intro | Phase::Outro => 0,
        }
    }

    /// Whether the cursor crossed `t` within the most recent tick only.
    pub fn has_passed_time(&self, t: f64) -> bool {
        self.prev_time < t && t <= self.current_time
    }

    /// Whether the phase index crossed `l` within the most recent tick
    /// only.
    pub fn has_passed_loop(&self, l: i32) -> bool {
        self.prev_loop < l && l <= self.current_loop
    }

    fn phase(&self) -> Phase {
        if self.outro_entered {
            return Phase::Outro;
        }
        match self.loop_phase() {
            None => Phase::Intro,
            Some((_, n)) => {
                if self.current_loop == 0 {
                    Phase::Intro
                } else if n >= 0 && self.current_loop > n {
                    Phase::Outro
                } else {
                    Phase::Loop(self.current_loop)
                }
            }
        }
    }

    fn rewind_cursor(&mut self) {
        self.rewind_cursor_keep_edges();
        self.prev_time = self.current_time;
        self.prev_loop = self.current_loop;
    }

    fn rewind_cursor_keep_edges(&mut self) {
        self.loop_release = false;
        self.outro_entered = false;
        let skip_intro = self.spec.start_loop >= 1 && self.loop_phase().is_some();
        if skip_intro {
            let (lr, n) = self.loop_phase().expect("loop phase checked above");
            let start_loop = self.spec.start_loop as i32;
            self.current_loop = if n >= 0 { start_loop.min(n) } else { start_loop };
            self.current_time = lr.start + self.spec.time_offset;
        } else {
            self.current_loop = 0;
            self.current_time = self.spec.range.start + self.spec.time_offset;
        }
    }
}

enum Phase {
    Intro,
    Loop(i32),
    Outro,
}

impl Blendable for Timeline {
    fn set_blend_factor(&mut self, stage: usize, factor: f64) {
        if self.blend.len() <= stage {
            self.blend.resize(stage + 1, 0.0);
        }
        self.blend[stage] = factor.clamp(0.0, 1.0);
    }

    fn blend_factor(&self, stage: usize) -> f64 {
        self.blend.get(stage).copied().unwrap_or(0.0)
    }
}

fn validate_spec(spec: &TimelineSpec) -> CadenzaResult<()> {
    if spec.range.start > spec.range.end {
        return Err(CadenzaError::validation(format!(
            "timeline '{}' has start > end",
            spec.name
        )));
    }
    if !spec.time_scale.is_finite() || spec.time_scale < 0.0 {
        return Err(CadenzaError::validation(format!(
            "timeline '{}' time_scale must be finite and >= 0",
            spec.name
        )));
    }
    if !spec.time_offset.is_finite() {
        return Err(CadenzaError::validation(format!(
            "timeline '{}' time_offset must be finite",
            spec.name
        )));
    }
    if let Some(lr) = spec.loop_range {
        if spec.loops != 0 && !(spec.range.contains(lr.start) && spec.range.contains(lr.end)) {
            return Err(CadenzaError::validation(format!(
                "timeline '{}' loop range must lie within the play range",
                spec.name
            )));
        }
    } else if spec.loops != 0 {
        return Err(CadenzaError::validation(format!(
            "timeline '{}' requests loops but has no loop range",
            spec.name
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/timeline.rs"]
mod tests;
