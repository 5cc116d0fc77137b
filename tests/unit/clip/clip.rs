use super::*;
use crate::blend::blendable::BlendSlot;
use crate::foundation::time::{TickContext, TimeRange};
use crate::timeline::timeline::{Timeline, TimelineSpec};

fn simple_timeline(name: &str, start: f64, end: f64) -> Timeline {
    Timeline::new(TimelineSpec {
        name: name.to_owned(),
        range: TimeRange::new(start, end).unwrap(),
        ..TimelineSpec::default()
    })
    .unwrap()
}

fn looping_timeline(name: &str) -> Timeline {
    Timeline::new(TimelineSpec {
        name: name.to_owned(),
        range: TimeRange::new(0.0, 2.5).unwrap(),
        loop_range: Some(TimeRange::new(0.5, 2.0).unwrap()),
        loops: -1,
        ..TimelineSpec::default()
    })
    .unwrap()
}

fn run_tick(
    clip: &mut Clip,
    arena: &mut TimelineArena,
    externals: &mut [BlendSlot],
    time: f64,
    dt: f64,
) {
    let tick = TickContext::new(time, dt);
    arena.begin_tick();
    arena.advance_all(&tick);
    clip.update(&tick, arena, externals);
}

#[test]
fn trigger_in_starts_timelines_and_ramps_blend() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(simple_timeline("a", 0.0, 10.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    clip.trigger_in_transition(0.0, 1.0, 0.0, &mut arena);
    assert!(clip.is_active());
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Running);

    run_tick(&mut clip, &mut arena, &mut [], 0.5, 0.5);
    assert!((arena.get(tid).unwrap().blend_factor(0) - 0.5).abs() < 1e-9);
    assert!(!clip.is_in_transition_finished());

    run_tick(&mut clip, &mut arena, &mut [], 1.0, 0.5);
    assert_eq!(arena.get(tid).unwrap().blend_factor(0), 1.0);
    assert!(clip.is_in_transition_finished());
}

#[test]
fn future_in_transition_is_delayed_not_discarded() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(simple_timeline("a", 0.0, 10.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    clip.trigger_in_transition(1.0, 0.0, 0.0, &mut arena);
    assert!(clip.is_active());
    // Timelines do not start before the ramp begins.
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Stopped);

    run_tick(&mut clip, &mut arena, &mut [], 0.5, 0.5);
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Stopped);

    run_tick(&mut clip, &mut arena, &mut [], 1.0, 0.5);
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Running);
    assert!(clip.is_in_transition_finished());
}

#[test]
fn out_transition_waits_for_timelines_to_end() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(simple_timeline("a", 0.0, 2.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    clip.trigger_in_transition(0.0, 0.0, 0.0, &mut arena);
    // Fade out over [0.5, 1.0]; the timeline itself runs until 2.0.
    clip.trigger_out_transition(0.5, 0.5);

    run_tick(&mut clip, &mut arena, &mut [], 1.0, 1.0);
    assert!(clip.is_out_transition_finished());
    // Still active: the timeline has not reached its own end yet.
    assert!(clip.is_active());
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Running);

    run_tick(&mut clip, &mut arena, &mut [], 2.0, 1.0);
    assert!(!clip.is_active());
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Stopped);
}

#[test]
fn out_transition_releases_infinite_loops() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(looping_timeline("walk"));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    clip.trigger_in_transition(0.0, 0.0, 0.0, &mut arena);
    let mut t = 0.0;
    for _ in 0..10 {
        t += 0.3;
        run_tick(&mut clip, &mut arena, &mut [], t, 0.3);
    }
    assert!(clip.is_active());
    assert_eq!(clip.remaining_clip_time(&arena), f64::INFINITY);

    clip.trigger_out_transition(t, 0.3);
    let mut guard = 0;
    while clip.is_active() {
        t += 0.3;
        run_tick(&mut clip, &mut arena, &mut [], t, 0.3);
        guard += 1;
        assert!(guard < 20, "clip with released loops must deactivate");
    }
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Stopped);
}

#[test]
fn blend_factor_is_product_of_in_and_out_ramps() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(simple_timeline("a", 0.0, 10.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    // Overlapping ramps: in over [0,2], out over [1,3].
    clip.trigger_in_transition(0.0, 2.0, 0.0, &mut arena);
    clip.trigger_out_transition(1.0, 2.0);

    run_tick(&mut clip, &mut arena, &mut [], 1.5, 0.5);
    let expected = 0.75 * 0.75;
    assert!((arena.get(tid).unwrap().blend_factor(0) - expected).abs() < 1e-9);
}

#[test]
fn external_blend_targets_receive_the_ramp() {
    let mut arena = TimelineArena::new();
    let mut externals = vec![BlendSlot::new("material")];
    let mut clip = Clip::new("c");
    clip.add_blend_target(BlendTarget::External(0));

    clip.trigger_in_transition(0.0, 2.0, 0.0, &mut arena);
    run_tick(&mut clip, &mut arena, &mut externals, 1.0, 1.0);
    assert!((externals[0].blend_factor(0) - 0.5).abs() < 1e-9);
}

#[test]
fn clip_without_timelines_finishes_instantly() {
    let mut arena = TimelineArena::new();
    let mut clip = Clip::new("empty");
    assert_eq!(clip.remaining_clip_time(&arena), 0.0);
    assert_eq!(clip.remaining_loop_time(&arena), 0.0);

    clip.trigger_in_transition(0.0, 0.0, 0.0, &mut arena);
    clip.trigger_out_transition(0.0, 0.0);
    run_tick(&mut clip, &mut arena, &mut [], 0.5, 0.5);
    assert!(clip.is_in_transition_finished());
    assert!(!clip.is_active());
}

#[test]
fn remaining_times_aggregate_as_maximum() {
    let mut arena = TimelineArena::new();
    let short = arena.insert(simple_timeline("short", 0.0, 1.0));
    let long = arena.insert(simple_timeline("long", 0.0, 3.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(short);
    clip.add_timeline(long);

    clip.trigger_in_transition(0.0, 0.0, 0.0, &mut arena);
    assert_eq!(clip.remaining_clip_time(&arena), 3.0);

    // Once the short timeline ends it drops out of the aggregate.
    run_tick(&mut clip, &mut arena, &mut [], 2.0, 2.0);
    assert_eq!(clip.remaining_clip_time(&arena), 1.0);
}

#[test]
fn reset_transitions_restores_baselines_without_stopping_playback() {
    let mut arena = TimelineArena::new();
    let tid = arena.insert(simple_timeline("a", 0.0, 10.0));
    let mut clip = Clip::new("c");
    clip.add_timeline(tid);

    clip.trigger_in_transition(0.0, 1.0, 0.0, &mut arena);
    run_tick(&mut clip, &mut arena, &mut [], 0.5, 0.5);

    clip.reset_transitions();
    assert_eq!(clip.in_transition_state(), RampState::NotStarted);
    assert_eq!(clip.out_transition_state(), RampState::NotStarted);
    // Playback is untouched.
    assert_eq!(arena.get(tid).unwrap().state(), PlayState::Running);
}
