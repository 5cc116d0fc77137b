use super::*;
use crate::variable::expr::VarExpr;

fn timeline(id: &str) -> TimelineDef {
    TimelineDef {
        id: id.to_owned(),
        range: Some([0.0, 2.0]),
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

fn clip(id: &str, timelines: &[&str]) -> ClipDef {
    ClipDef {
        id: id.to_owned(),
        timelines: timelines.iter().map(|s| (*s).to_owned()).collect(),
        blend_targets: Vec::new(),
    }
}

fn basic_scene() -> SceneDef {
    SceneDef {
        inputs: BTreeMap::new(),
        variables: Vec::new(),
        timelines: vec![timeline("tl_a"), timeline("tl_b")],
        externals: Vec::new(),
        clips: vec![clip("a", &["tl_a"]), clip("b", &["tl_b"])],
        transitions: vec![TransitionDef {
            id: None,
            from: "a".to_owned(),
            to: "b".to_owned(),
            trigger: TriggerSet {
                clip_finished: true,
                ..TriggerSet::default()
            },
            variable: None,
            out_duration: 0.5,
            out_offset: 0.0,
            in_duration: 0.5,
            in_offset: 0.0,
        }],
        start_clip: "a".to_owned(),
    }
}

#[test]
fn valid_scene_passes() {
    basic_scene().validate().unwrap();
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut scene = basic_scene();
    scene.timelines.push(timeline("tl_a"));
    assert!(scene.validate().is_err());

    let mut scene = basic_scene();
    scene.clips.push(clip("a", &[]));
    assert!(scene.validate().is_err());
}

#[test]
fn timeline_needs_exactly_one_range_source() {
    let mut scene = basic_scene();
    scene.timelines[0].clip_ref = Some(ClipRefDef {
        resource: "r".to_owned(),
        name: Some("walk".to_owned()),
        index: None,
    });
    assert!(scene.validate().is_err());

    let mut scene = basic_scene();
    scene.timelines[0].range = None;
    assert!(scene.validate().is_err());
}

#[test]
fn clip_ref_needs_exactly_one_selector() {
    let mut scene = basic_scene();
    scene.timelines[0].range = None;
    scene.timelines[0].clip_ref = Some(ClipRefDef {
        resource: "r".to_owned(),
        name: Some("walk".to_owned()),
        index: Some(0),
    });
    assert!(scene.validate().is_err());
}

#[test]
fn loops_require_a_loop_range() {
    let mut scene = basic_scene();
    scene.timelines[0].loops = -1;
    assert!(scene.validate().is_err());

    scene.timelines[0].loop_range = Some([0.5, 1.5]);
    scene.validate().unwrap();
}

#[test]
fn start_clip_must_exist() {
    let mut scene = basic_scene();
    scene.start_clip = "ghost".to_owned();
    assert!(scene.validate().is_err());
}

#[test]
fn inverted_and_non_finite_ranges_are_rejected() {
    let mut scene = basic_scene();
    scene.timelines[0].range = Some([3.0, 1.0]);
    assert!(scene.validate().is_err());

    let mut scene = basic_scene();
    scene.timelines[0].range = Some([0.0, f64::NAN]);
    assert!(scene.validate().is_err());

    let mut scene = basic_scene();
    scene.transitions[0].out_duration = -1.0;
    assert!(scene.validate().is_err());
}

#[test]
fn json_round_trip_preserves_the_scene() {
    let mut scene = basic_scene();
    scene.inputs.insert("speed".to_owned(), Value::Real(0.0));
    scene.variables.push(Variable {
        id: "fast".to_owned(),
        expr: VarExpr::Binary {
            op: crate::variable::expr::BinaryOp::Gt,
            left: Box::new(VarExpr::Input("speed".to_owned())),
            right: Box::new(VarExpr::Lit(Value::Real(1.0))),
        },
    });

    let json = scene.to_json().unwrap();
    let back = SceneDef::from_json(&json).unwrap();
    back.validate().unwrap();
    assert_eq!(back.clips.len(), 2);
    assert_eq!(back.variables[0].id, "fast");
    assert_eq!(back.variables[0].expr, scene.variables[0].expr);
}

#[test]
fn malformed_json_reports_a_serde_error() {
    let err = SceneDef::from_json("{not json").unwrap_err();
    assert!(matches!(err, crate::foundation::error::CadenzaError::Serde(_)));
}
