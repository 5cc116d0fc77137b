use std::collections::BTreeMap;

use crate::blend::blendable::BlendSlot;
use crate::clip::clip::{BlendTarget, Clip, ClipId};
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::foundation::time::TimeRange;
use crate::scene::library::{ClipRangeSource, ClipSelector};
use crate::scene::model::{BlendTargetDef, SceneDef};
use crate::sequencer::sequencer::ClipSequencer;
use crate::sequencer::transition::ClipTransition;
use crate::timeline::arena::{TimelineArena, TimelineId};
use crate::timeline::timeline::{Timeline, TimelineSpec};

/// A configuration fault that degraded to inert behavior at build time.
///
/// Diagnostics identify the offending element for authoring/debugging
/// contexts; in a shipped build the element simply never fires or
/// advances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Offending scene element (timeline/clip/transition id).
    pub element: String,
    /// Human-readable description of the fault.
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.element, self.message)
    }
}

/// Result of lowering a scene definition.
pub struct BuildOutput {
    /// The runnable sequencer.
    pub sequencer: ClipSequencer,
    /// Faults that were degraded to inert elements.
    pub diagnostics: Vec<Diagnostic>,
}

fn diag(diags: &mut Vec<Diagnostic>, element: impl Into<String>, message: impl Into<String>) {
    let d = Diagnostic {
        element: element.into(),
        message: message.into(),
    };
    tracing::warn!(element = %d.element, "{}", d.message);
    diags.push(d);
}

/// Lower a validated scene definition into a [`ClipSequencer`].
///
/// Hard structural faults (see [`SceneDef::validate`]) abort with an
/// error. Cross-reference faults — dangling transition endpoints,
/// unresolvable clip refs, rejected parent/sub-stage links — leave the
/// affected element inert and are collected as [`Diagnostic`]s instead of
/// failing the whole scene.
#[tracing::instrument(skip_all, fields(clips = def.clips.len(), timelines = def.timelines.len()))]
pub fn build(def: &SceneDef, resources: &dyn ClipRangeSource) -> CadenzaResult<BuildOutput> {
    def.validate()?;
    let mut diagnostics = Vec::new();

    let mut arena = TimelineArena::new();
    let mut tl_ids: BTreeMap<&str, TimelineId> = BTreeMap::new();
    for tl in &def.timelines {
        let range = match (&tl.range, &tl.clip_ref) {
            (Some([start, end]), None) => TimeRange::new(*start, *end)?,
            (None, Some(cr)) => {
                let selector = match (&cr.name, cr.index) {
                    (Some(name), None) => ClipSelector::Name(name),
                    (None, Some(index)) => ClipSelector::Index(index),
                    _ => unreachable!("checked by SceneDef::validate"),
                };
                match resources.clip_range(&cr.resource, selector) {
                    Ok(range) => range,
                    Err(e) => {
                        diag(
                            &mut diagnostics,
                            &tl.id,
                            format!("clip_ref lookup failed, timeline left inert: {e}"),
                        );
                        continue;
                    }
                }
            }
            _ => unreachable!("checked by SceneDef::validate"),
        };
        let loop_range = match tl.loop_range {
            Some([start, end]) => Some(TimeRange::new(start, end)?),
            None => None,
        };
        let spec = TimelineSpec {
            name: tl.id.clone(),
            range,
            loop_range,
            loops: tl.loops,
            start_loop: tl.start_loop,
            time_scale: tl.time_scale,
            time_offset: tl.time_offset,
            trigger_group_mask: tl.trigger_group_mask,
            auto_rewind: tl.auto_rewind,
            start_on_activate: tl.start_on_activate,
            stop_on_deactivate: tl.stop_on_deactivate,
        };
        match Timeline::new(spec) {
            Ok(t) => {
                tl_ids.insert(tl.id.as_str(), arena.insert(t));
            }
            Err(e) => diag(
                &mut diagnostics,
                &tl.id,
                format!("timeline left inert: {e}"),
            ),
        }
    }

    for tl in &def.timelines {
        let Some(&child) = tl_ids.get(tl.id.as_str()) else {
            continue;
        };
        if let Some(parent) = &tl.parent {
            match tl_ids.get(parent.as_str()) {
                Some(&pid) => {
                    if let Err(e) = arena.set_parent(child, pid) {
                        diag(&mut diagnostics, &tl.id, e.to_string());
                    }
                }
                None => diag(
                    &mut diagnostics,
                    &tl.id,
                    format!("unknown parent timeline '{parent}', link dropped"),
                ),
            }
        }
        for sub in &tl.sub_stages {
            match tl_ids.get(sub.as_str()) {
                Some(&sid) => {
                    if let Err(e) = arena.add_sub_stage(child, sid) {
                        diag(&mut diagnostics, &tl.id, e.to_string());
                    }
                }
                None => diag(
                    &mut diagnostics,
                    &tl.id,
                    format!("unknown sub-stage timeline '{sub}', link dropped"),
                ),
            }
        }
    }
    if let Err(e) = arena.validate_links() {
        diag(
            &mut diagnostics,
            "timelines",
            format!("{e}; all parent/sub-stage links dropped"),
        );
        arena.clear_all_links();
        arena
            .validate_links()
            .expect("an arena without links is acyclic");
    }

    let mut sequencer = ClipSequencer::new(arena);
    for (name, value) in &def.inputs {
        sequencer.bank_mut().set(name.clone(), value.clone());
    }

    let mut var_ids: BTreeMap<&str, usize> = BTreeMap::new();
    for var in &def.variables {
        var_ids.insert(var.id.as_str(), sequencer.add_variable(var.clone()));
    }

    let mut ext_ids: BTreeMap<&str, usize> = BTreeMap::new();
    for ext in &def.externals {
        ext_ids.insert(ext.as_str(), sequencer.add_external(BlendSlot::new(ext.clone())));
    }

    let mut clip_ids: BTreeMap<&str, ClipId> = BTreeMap::new();
    for c in &def.clips {
        let mut clip = Clip::new(c.id.clone());
        for t in &c.timelines {
            match tl_ids.get(t.as_str()) {
                Some(&tid) => clip.add_timeline(tid),
                None => diag(
                    &mut diagnostics,
                    &c.id,
                    format!("unknown timeline '{t}', reference dropped"),
                ),
            }
        }
        for target in &c.blend_targets {
            match target {
                BlendTargetDef::Timeline(t) => match tl_ids.get(t.as_str()) {
                    Some(&tid) => clip.add_blend_target(BlendTarget::Timeline(tid)),
                    None => diag(
                        &mut diagnostics,
                        &c.id,
                        format!("unknown blend-target timeline '{t}', reference dropped"),
                    ),
                },
                BlendTargetDef::External(x) => match ext_ids.get(x.as_str()) {
                    Some(&xid) => clip.add_blend_target(BlendTarget::External(xid)),
                    None => diag(
                        &mut diagnostics,
                        &c.id,
                        format!("undeclared external '{x}', reference dropped"),
                    ),
                },
            }
        }
        clip_ids.insert(c.id.as_str(), sequencer.add_clip(clip));
    }

    let start = clip_ids
        .get(def.start_clip.as_str())
        .copied()
        .ok_or_else(|| {
            CadenzaError::validation(format!("start_clip '{}' was not built", def.start_clip))
        })?;
    sequencer.set_start_clip(start)?;

    for tr in &def.transitions {
        let (Some(&from), Some(&to)) = (
            clip_ids.get(tr.from.as_str()),
            clip_ids.get(tr.to.as_str()),
        ) else {
            diag(
                &mut diagnostics,
                tr.name(),
                "references a missing clip; edge disabled",
            );
            continue;
        };
        let mut transition = ClipTransition::new(tr.name(), from, to, tr.trigger)
            .with_out(tr.out_duration, tr.out_offset)
            .with_in(tr.in_duration, tr.in_offset);
        if let Some(v) = &tr.variable {
            match var_ids.get(v.as_str()) {
                Some(&vi) => transition = transition.with_variable(vi),
                None => {
                    diag(
                        &mut diagnostics,
                        tr.name(),
                        format!("unknown trigger variable '{v}'; edge disabled"),
                    );
                    continue;
                }
            }
        }
        if let Err(e) = sequencer.add_transition(transition) {
            diag(
                &mut diagnostics,
                tr.name(),
                format!("{e}; edge disabled"),
            );
        }
    }

    Ok(BuildOutput {
        sequencer,
        diagnostics,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/scene/build.rs"]
mod tests;
