use smallvec::SmallVec;

use crate::blend::blendable::Blendable;
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::foundation::time::TickContext;
use crate::timeline::timeline::{PlayState, Timeline};

/// Non-owning index of a timeline within a [`TimelineArena`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TimelineId(pub u32);

impl TimelineId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Id-indexed owner of every timeline in a scene subtree.
///
/// Parent and sub-stage relationships are plain indices into the arena;
/// ownership stays rooted here, at the scene-subtree level, so no
/// reference cycles can form. Link acyclicity is checked once at
/// configuration time via [`TimelineArena::validate_links`], not during
/// traversal.
#[derive(Debug, Default)]
pub struct TimelineArena {
    timelines: Vec<Timeline>,
    parent: Vec<Option<TimelineId>>,
    sub_stages: Vec<Vec<TimelineId>>,
    children: Vec<Vec<TimelineId>>,
    order: Vec<TimelineId>,
}

impl TimelineArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timelines.
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// Whether the arena holds no timelines.
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Insert a timeline, returning its id.
    pub fn insert(&mut self, timeline: Timeline) -> TimelineId {
        let id = TimelineId(self.timelines.len() as u32);
        self.timelines.push(timeline);
        self.parent.push(None);
        self.sub_stages.push(Vec::new());
        self.children.push(Vec::new());
        self.order.clear();
        id
    }

    /// Borrow a timeline.
    pub fn get(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(id.index())
    }

    /// Mutably borrow a timeline.
    pub fn get_mut(&mut self, id: TimelineId) -> Option<&mut Timeline> {
        self.timelines.get_mut(id.index())
    }

    /// Iterate `(id, timeline)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (TimelineId, &Timeline)> {
        self.timelines
            .iter()
            .enumerate()
            .map(|(i, t)| (TimelineId(i as u32), t))
    }

    /// Link `child` under `parent`; the parent gates the child's start and
    /// stop. Links take effect after [`validate_links`](Self::validate_links).
    pub fn set_parent(&mut self, child: TimelineId, parent: TimelineId) -> CadenzaResult<()> {
        self.check_id(child)?;
        self.check_id(parent)?;
        if child == parent {
            return Err(CadenzaError::validation(format!(
                "timeline '{}' cannot be its own parent",
                self.timelines[child.index()].name()
            )));
        }
        self.parent[child.index()] = Some(parent);
        self.order.clear();
        Ok(())
    }

    /// Register `sub` as the next blend sub-stage of `owner`: stage `i` of
    /// the owner fans out to the i-th registered sub timeline.
    pub fn add_sub_stage(&mut self, owner: TimelineId, sub: TimelineId) -> CadenzaResult<()> {
        self.check_id(owner)?;
        self.check_id(sub)?;
        if owner == sub {
            return Err(CadenzaError::validation(format!(
                "timeline '{}' cannot be its own sub-stage",
                self.timelines[owner.index()].name()
            )));
        }
        self.sub_stages[owner.index()].push(sub);
        self.order.clear();
        Ok(())
    }

    /// Validate parent/sub-stage link acyclicity and precompute the
    /// parents-first advance order. Must be called after configuration and
    /// before the first tick; returns the offending timeline on a cycle.
    pub fn validate_links(&mut self) -> CadenzaResult<()> {
        let n = self.timelines.len();

        for children in &mut self.children {
            children.clear();
        }
        for i in 0..n {
            if let Some(p) = self.parent[i] {
                self.children[p.index()].push(TimelineId(i as u32));
            }
        }

        // Cycle check over the combined parent->child / owner->sub graph.
        // 0 = unvisited, 1 = in progress, 2 = done.
        let mut color = vec![0u8; n];
        let mut edge_cursor = vec![0usize; n];
        for start in 0..n {
            if color[start] != 0 {
                continue;
            }
            let mut stack = vec![start];
            color[start] = 1;
            while let Some(&node) = stack.last() {
                let kids = &self.children[node];
                let subs = &self.sub_stages[node];
                let e = edge_cursor[node];
                if e < kids.len() + subs.len() {
                    edge_cursor[node] += 1;
                    let next = if e < kids.len() {
                        kids[e]
                    } else {
                        subs[e - kids.len()]
                    }
                    .index();
                    match color[next] {
                        0 => {
                            color[next] = 1;
                            stack.push(next);
                        }
                        1 => {
                            return Err(CadenzaError::validation(format!(
                                "timeline '{}' participates in a parent/sub-stage cycle",
                                self.timelines[next].name()
                            )));
                        }
                        _ => {}
                    }
                } else {
                    color[node] = 2;
                    stack.pop();
                }
            }
        }

        // Parents-first order (roots first, then their subtrees).
        self.order.clear();
        let mut queue: Vec<TimelineId> = (0..n)
            .filter(|&i| self.parent[i].is_none())
            .map(|i| TimelineId(i as u32))
            .collect();
        let mut cursor = 0;
        while cursor < queue.len() {
            let id = queue[cursor];
            cursor += 1;
            self.order.push(id);
            queue.extend(self.children[id.index()].iter().copied());
        }
        debug_assert_eq!(self.order.len(), n);
        Ok(())
    }

    /// Drop every parent and sub-stage link (degrade-to-inert path for a
    /// rejected link configuration).
    pub fn clear_all_links(&mut self) {
        for p in &mut self.parent {
            *p = None;
        }
        for s in &mut self.sub_stages {
            s.clear();
        }
        self.order.clear();
    }

    /// Clear per-tick latches on every timeline. Invoked once at tick
    /// start, before any advancement.
    pub fn begin_tick(&mut self) {
        for t in &mut self.timelines {
            t.begin_tick();
        }
    }

    /// Advance every running timeline once, parents before children, then
    /// cascade stops from parents that ended this tick.
    pub fn advance_all(&mut self, tick: &TickContext) {
        if self.order.len() != self.timelines.len() {
            // Not validated (or links changed); natural order still works
            // because gating only reads parent state.
            for t in &mut self.timelines {
                t.advance(tick);
            }
        } else {
            for i in 0..self.order.len() {
                let id = self.order[i];
                self.timelines[id.index()].advance(tick);
            }
        }

        // A parent that ended this tick takes its children down with it.
        let ended: SmallVec<[TimelineId; 8]> = self
            .iter()
            .filter(|(_, t)| t.was_running())
            .map(|(id, _)| id)
            .collect();
        for id in ended {
            self.stop_children(id);
        }
    }

    /// Start a timeline; gated off (returns `Ok(false)`) while its parent
    /// is not running.
    pub fn start(&mut self, id: TimelineId) -> CadenzaResult<bool> {
        self.check_id(id)?;
        if let Some(p) = self.parent[id.index()]
            && self.timelines[p.index()].state() != PlayState::Running
        {
            return Ok(false);
        }
        self.timelines[id.index()].start()
    }

    /// Stop a timeline and, transitively, every timeline it gates.
    pub fn stop(&mut self, id: TimelineId) -> bool {
        let Some(t) = self.timelines.get_mut(id.index()) else {
            return false;
        };
        let changed = t.stop();
        self.stop_children(id);
        changed
    }

    /// Start every timeline whose trigger-group mask intersects `mask`.
    /// Returns how many timelines changed state.
    pub fn start_group(&mut self, mask: u32) -> usize {
        let ids: SmallVec<[TimelineId; 8]> = self
            .iter()
            .filter(|(_, t)| t.trigger_group_mask() & mask != 0)
            .map(|(id, _)| id)
            .collect();
        ids.into_iter()
            .filter(|&id| self.start(id).unwrap_or(false))
            .count()
    }

    /// Stop every timeline whose trigger-group mask intersects `mask`.
    /// Returns how many timelines changed state.
    pub fn stop_group(&mut self, mask: u32) -> usize {
        let ids: SmallVec<[TimelineId; 8]> = self
            .iter()
            .filter(|(_, t)| t.trigger_group_mask() & mask != 0)
            .map(|(id, _)| id)
            .collect();
        ids.into_iter().filter(|&id| self.stop(id)).count()
    }

    /// Write a blend factor, fanning each stage out to the matching
    /// registered sub-stage timeline (stage `i` reaches sub-stage `i`'s
    /// stage 0).
    pub fn set_blend_factor(&mut self, id: TimelineId, stage: usize, factor: f64) {
        // Bounded: link acyclicity is validated at configuration time.
        let mut work: SmallVec<[(TimelineId, usize, f64); 8]> = SmallVec::new();
        work.push((id, stage, factor));
        while let Some((id, stage, factor)) = work.pop() {
            let Some(t) = self.timelines.get_mut(id.index()) else {
                continue;
            };
            t.set_blend_factor(stage, factor);
            if let Some(&sub) = self.sub_stages[id.index()].get(stage) {
                work.push((sub, 0, factor));
            }
        }
    }

    fn stop_children(&mut self, id: TimelineId) {
        let mut work: SmallVec<[TimelineId; 8]> = SmallVec::new();
        work.extend(self.children.get(id.index()).into_iter().flatten().copied());
        while let Some(c) = work.pop() {
            self.timelines[c.index()].stop();
            work.extend(self.children[c.index()].iter().copied());
        }
    }

    fn check_id(&self, id: TimelineId) -> CadenzaResult<()> {
        if id.index() >= self.timelines.len() {
            return Err(CadenzaError::sequencing(format!(
                "timeline id {} out of range",
                id.0
            )));
        }
        Ok(())
    }
}
