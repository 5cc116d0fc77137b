use super::*;
use crate::foundation::time::TickContext;
use crate::scene::library::StaticClipLibrary;
use crate::scene::model::{ClipDef, ClipRefDef, SceneDef, TimelineDef, TransitionDef};
use crate::sequencer::transition::TriggerSet;
use crate::timeline::timeline::PlayState;
use std::collections::BTreeMap;

fn timeline(id: &str, range: Option<[f64; 2]>) -> TimelineDef {
    TimelineDef {
        id: id.to_owned(),
        range,
        clip_ref: None,
        loop_range: None,
        loops: 0,
        start_loop: 0,
        time_scale: 1.0,
        time_offset: 0.0,
        trigger_group_mask: 0,
        auto_rewind: false,
        start_on_activate: true,
        stop_on_deactivate: true,
        parent: None,
        sub_stages: Vec::new(),
    }
}

fn scene(
    timelines: Vec<TimelineDef>,
    clips: Vec<ClipDef>,
    transitions: Vec<TransitionDef>,
) -> SceneDef {
    let start_clip = clips.first().map(|c| c.id.clone()).unwrap_or_default();
    SceneDef {
        inputs: BTreeMap::new(),
        variables: Vec::new(),
        timelines,
        externals: Vec::new(),
        clips,
        transitions,
        start_clip,
    }
}

fn clip(id: &str, timelines: &[&str]) -> ClipDef {
    ClipDef {
        id: id.to_owned(),
        timelines: timelines.iter().map(|s| (*s).to_owned()).collect(),
        blend_targets: Vec::new(),
    }
}

fn transition(from: &str, to: &str) -> TransitionDef {
    TransitionDef {
        id: None,
        from: from.to_owned(),
        to: to.to_owned(),
        trigger: TriggerSet {
            clip_finished: true,
            ..TriggerSet::default()
        },
        variable: None,
        out_duration: 0.1,
        out_offset: 0.0,
        in_duration: 0.1,
        in_offset: 0.0,
    }
}

#[test]
fn clean_scene_builds_without_diagnostics() {
    let def = scene(
        vec![timeline("tl", Some([0.0, 1.0]))],
        vec![clip("a", &["tl"]), clip("b", &[])],
        vec![transition("a", "b")],
    );
    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    assert!(out.diagnostics.is_empty());
    assert_eq!(out.sequencer.clips().count(), 2);
}

#[test]
fn clip_ref_ranges_resolve_through_the_library() {
    let mut def = scene(
        vec![timeline("tl", None)],
        vec![clip("a", &["tl"])],
        vec![],
    );
    def.timelines[0].clip_ref = Some(ClipRefDef {
        resource: "hero.anim".to_owned(),
        name: Some("walk".to_owned()),
        index: None,
    });

    let mut lib = StaticClipLibrary::new();
    lib.add_clip(
        "hero.anim",
        "walk",
        crate::foundation::time::TimeRange::new(0.25, 1.75).unwrap(),
    );

    let out = build(&def, &lib).unwrap();
    assert!(out.diagnostics.is_empty());
    let mut seq = out.sequencer;
    seq.evaluate(&TickContext::new(0.1, 0.1));
    let (_, tl) = seq.arena().iter().next().unwrap();
    assert_eq!(tl.state(), PlayState::Running);
    assert_eq!(tl.spec().range.start, 0.25);
    assert_eq!(tl.spec().range.end, 1.75);
}

#[test]
fn unknown_clip_ref_leaves_the_timeline_inert() {
    let mut def = scene(
        vec![timeline("tl", None), timeline("tl_ok", Some([0.0, 1.0]))],
        vec![clip("a", &["tl", "tl_ok"])],
        vec![],
    );
    def.timelines[0].clip_ref = Some(ClipRefDef {
        resource: "hero.anim".to_owned(),
        name: Some("missing".to_owned()),
        index: None,
    });

    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    // One diagnostic for the lookup, one for the dropped clip reference.
    assert_eq!(out.diagnostics.len(), 2);
    assert!(out.diagnostics[0].element == "tl");
    // The remaining timeline still drives the clip.
    assert_eq!(out.sequencer.arena().len(), 1);
}

#[test]
fn dangling_transition_endpoints_disable_the_edge() {
    let def = scene(
        vec![timeline("tl", Some([0.0, 1.0]))],
        vec![clip("a", &["tl"])],
        vec![transition("a", "ghost")],
    );
    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("edge disabled"));

    // The sequencer still runs; the edge simply never fires.
    let mut seq = out.sequencer;
    for i in 1..=20 {
        seq.evaluate(&TickContext::new(i as f64 * 0.1, 0.1));
    }
    assert_eq!(seq.current_clip().unwrap().name(), "a");
}

#[test]
fn unknown_trigger_variable_disables_the_edge() {
    let mut def = scene(
        vec![timeline("tl", Some([0.0, 1.0]))],
        vec![clip("a", &["tl"]), clip("b", &[])],
        vec![transition("a", "b")],
    );
    def.transitions[0].trigger = TriggerSet {
        variable: true,
        ..TriggerSet::default()
    };
    def.transitions[0].variable = Some("ghost_var".to_owned());

    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("ghost_var"));
}

#[test]
fn parent_cycles_drop_all_links() {
    let mut def = scene(
        vec![
            timeline("x", Some([0.0, 1.0])),
            timeline("y", Some([0.0, 1.0])),
        ],
        vec![clip("a", &["x", "y"])],
        vec![],
    );
    def.timelines[0].parent = Some("y".to_owned());
    def.timelines[1].parent = Some("x".to_owned());

    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    assert!(
        out.diagnostics
            .iter()
            .any(|d| d.message.contains("cycle")),
        "expected a cycle diagnostic, got {:?}",
        out.diagnostics
    );

    // With the links dropped both timelines start ungated.
    let mut seq = out.sequencer;
    seq.evaluate(&TickContext::new(0.1, 0.1));
    for (_, tl) in seq.arena().iter() {
        assert_eq!(tl.state(), PlayState::Running);
    }
}

#[test]
fn inputs_seed_the_variable_bank() {
    let mut def = scene(
        vec![timeline("tl", Some([0.0, 1.0]))],
        vec![clip("a", &["tl"])],
        vec![],
    );
    def.inputs.insert(
        "speed".to_owned(),
        crate::variable::value::Value::Real(3.0),
    );

    let out = build(&def, &StaticClipLibrary::new()).unwrap();
    assert_eq!(
        out.sequencer.bank().get("speed"),
        Some(&crate::variable::value::Value::Real(3.0))
    );
}
