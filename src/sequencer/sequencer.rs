use smallvec::SmallVec;

use crate::blend::blendable::BlendSlot;
use crate::clip::clip::{Clip, ClipId};
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::foundation::time::TickContext;
use crate::sequencer::transition::ClipTransition;
use crate::timeline::arena::TimelineArena;
use crate::variable::expr::{Variable, VariableBank};

/// The top-level per-tick scheduler.
///
/// Owns the timeline arena, the clip states, the transition edges, the
/// trigger variables and the external blend slots. Not a classical FSM:
/// several clips may be mid-blend concurrently; `current_clip` tracks only
/// the most recently *entered* one.
#[derive(Debug)]
pub struct ClipSequencer {
    arena: TimelineArena,
    clips: Vec<Clip>,
    transitions: Vec<ClipTransition>,
    variables: Vec<Variable>,
    bank: VariableBank,
    externals: Vec<BlendSlot>,
    start_clip: ClipId,
    current: Option<ClipId>,
    processed: Vec<bool>,
    scanned: Vec<bool>,
    initialized: bool,
}

impl ClipSequencer {
    /// Build an empty sequencer around a configured timeline arena.
    pub fn new(arena: TimelineArena) -> Self {
        Self {
            arena,
            clips: Vec::new(),
            transitions: Vec::new(),
            variables: Vec::new(),
            bank: VariableBank::new(),
            externals: Vec::new(),
            start_clip: ClipId(0),
            current: None,
            processed: Vec::new(),
            scanned: Vec::new(),
            initialized: false,
        }
    }

    /// Add a clip state, returning its id.
    pub fn add_clip(&mut self, clip: Clip) -> ClipId {
        let id = ClipId(self.clips.len() as u32);
        self.clips.push(clip);
        id
    }

    /// Add a trigger variable, returning its index.
    pub fn add_variable(&mut self, variable: Variable) -> usize {
        self.variables.push(variable);
        self.variables.len() - 1
    }

    /// Add an external blend slot, returning its index.
    pub fn add_external(&mut self, slot: BlendSlot) -> usize {
        self.externals.push(slot);
        self.externals.len() - 1
    }

    /// Add a transition edge.
    ///
    /// Dangling clip references, self-loops and missing trigger variables
    /// are configuration errors: the edge is rejected (and thus never
    /// evaluated) rather than tolerated at runtime.
    pub fn add_transition(&mut self, transition: ClipTransition) -> CadenzaResult<usize> {
        let n = self.clips.len();
        if transition.from().index() >= n || transition.to().index() >= n {
            return Err(CadenzaError::validation(format!(
                "transition '{}' references a clip outside this sequencer",
                transition.name()
            )));
        }
        if transition.from() == transition.to() {
            return Err(CadenzaError::validation(format!(
                "transition '{}' must connect two distinct clips",
                transition.name()
            )));
        }
        if let Some(v) = transition.variable_ref()
            && v >= self.variables.len()
        {
            return Err(CadenzaError::validation(format!(
                "transition '{}' references a missing trigger variable",
                transition.name()
            )));
        }
        if !transition.trigger().any() {
            tracing::warn!(
                transition = transition.name(),
                "transition has no trigger condition enabled and will never fire"
            );
        }
        self.transitions.push(transition);
        Ok(self.transitions.len() - 1)
    }

    /// Designate the start clip (entered on reset).
    pub fn set_start_clip(&mut self, id: ClipId) -> CadenzaResult<()> {
        if id.index() >= self.clips.len() {
            return Err(CadenzaError::validation(
                "start clip is not a child of this sequencer",
            ));
        }
        self.start_clip = id;
        Ok(())
    }

    /// The most recently entered clip, if any.
    pub fn current_clip(&self) -> Option<&Clip> {
        self.current.and_then(|id| self.clips.get(id.index()))
    }

    /// Id of the most recently entered clip.
    pub fn current_clip_id(&self) -> Option<ClipId> {
        self.current
    }

    /// Every clip currently participating in evaluation (mid-blend clips
    /// included) — the set-valued companion to [`current_clip`](Self::current_clip).
    pub fn active_clips(&self) -> impl Iterator<Item = (ClipId, &Clip)> {
        self.clips
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active())
            .map(|(i, c)| (ClipId(i as u32), c))
    }

    /// Borrow a clip.
    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(id.index())
    }

    /// Iterate `(id, clip)` pairs.
    pub fn clips(&self) -> impl Iterator<Item = (ClipId, &Clip)> {
        self.clips
            .iter()
            .enumerate()
            .map(|(i, c)| (ClipId(i as u32), c))
    }

    /// The timeline arena.
    pub fn arena(&self) -> &TimelineArena {
        &self.arena
    }

    /// Mutable timeline arena access (host-driven VCR control).
    pub fn arena_mut(&mut self) -> &mut TimelineArena {
        &mut self.arena
    }

    /// The variable input bank (written by external logic between ticks).
    pub fn bank(&self) -> &VariableBank {
        &self.bank
    }

    /// Mutable variable input bank access.
    pub fn bank_mut(&mut self) -> &mut VariableBank {
        &mut self.bank
    }

    /// External blend slots, readable by the host after `evaluate`.
    pub fn externals(&self) -> &[BlendSlot] {
        &self.externals
    }

    /// Force the canonical state: stop every clip, then re-enter the start
    /// clip with a zero-duration in-transition. Idempotent.
    #[tracing::instrument(skip(self))]
    pub fn reset(&mut self, now: f64) {
        for clip in &mut self.clips {
            clip.reset(&mut self.arena);
        }
        if let Some(clip) = self.clips.get_mut(self.start_clip.index()) {
            clip.trigger_in_transition(now, 0.0, now, &mut self.arena);
            self.current = Some(self.start_clip);
        } else {
            self.current = None;
        }
        self.initialized = true;
    }

    /// Run one logic tick: advance timelines, update clip ramps, then
    /// evaluate transitions (with same-tick chaining and the per-tick
    /// re-entry guard).
    ///
    /// The first call self-initializes via [`reset`](Self::reset).
    #[tracing::instrument(skip_all, fields(time = tick.time))]
    pub fn evaluate(&mut self, tick: &TickContext) {
        if !self.initialized {
            self.reset(tick.time);
        }

        self.arena.begin_tick();
        self.arena.advance_all(tick);
        for clip in &mut self.clips {
            clip.update(tick, &mut self.arena, &mut self.externals);
        }

        self.evaluate_transitions(tick);
    }

    /// Trigger evaluation: a bounded work list seeded with the active
    /// clips; firing appends the entered clip so its outgoing edges are
    /// scanned in the same tick (zero-delay chaining). Each clip's edges
    /// are scanned at most once per tick, and a clip that was already
    /// entered or exited this tick is never entered again — a would-be
    /// second visit is deferred to the next tick.
    fn evaluate_transitions(&mut self, tick: &TickContext) {
        let n = self.clips.len();
        self.processed.clear();
        self.processed.resize(n, false);
        self.scanned.clear();
        self.scanned.resize(n, false);

        let mut queue: SmallVec<[usize; 8]> = (0..n).filter(|&i| self.clips[i].is_active()).collect();

        // The edge list is detached while firing needs split clip borrows.
        let transitions = std::mem::take(&mut self.transitions);

        let mut cursor = 0;
        while cursor < queue.len() {
            let c = queue[cursor];
            cursor += 1;
            if self.scanned[c] {
                continue;
            }
            self.scanned[c] = true;

            for transition in &transitions {
                if transition.from().index() != c {
                    continue;
                }
                if self.processed[c] {
                    // This clip was exited earlier in the scan.
                    break;
                }
                let to = transition.to().index();
                if self.processed[to] {
                    tracing::trace!(
                        transition = transition.name(),
                        "target already processed this tick; deferring"
                    );
                    continue;
                }
                let Some(reason) = transition.should_fire(
                    &self.clips[c],
                    &self.arena,
                    &self.variables,
                    &self.bank,
                ) else {
                    continue;
                };

                self.processed[c] = true;
                self.processed[to] = true;
                let (from_clip, to_clip) = two_clips(&mut self.clips, c, to);
                tracing::trace!(
                    transition = transition.name(),
                    from = from_clip.name(),
                    to = to_clip.name(),
                    ?reason,
                    "transition fired"
                );
                transition.fire(reason, tick.time, from_clip, to_clip, &mut self.arena);
                self.current = Some(transition.to());
                if !self.scanned[to] {
                    queue.push(to);
                }
            }
        }

        self.transitions = transitions;
    }
}

fn two_clips(clips: &mut [Clip], a: usize, b: usize) -> (&mut Clip, &mut Clip) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = clips.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = clips.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequencer/sequencer.rs"]
mod tests;
