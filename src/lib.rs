//! Cadenza is a clip sequencing and blending engine for real-time scene
//! graphs.
//!
//! It manages overlapping, time-based animation states ("clips"),
//! synchronizes them against running time cursors ("timelines"), and
//! performs triggered, blended transitions between them — all inside a
//! single external logic tick.
//!
//! # Evaluation overview
//!
//! Once per tick the host calls [`ClipSequencer::evaluate`] with a
//! [`TickContext`]:
//!
//! 1. **Advance**: every running [`Timeline`] moves its cursor, updating
//!    loop bookkeeping and end-of-timeline state
//! 2. **Blend**: every active [`Clip`] updates its in/out transition ramps
//!    and writes blend factors to its targets
//! 3. **Trigger**: every [`ClipTransition`] leaving an active clip is
//!    evaluated; fired edges cross-fade clips and may chain further
//!    zero-delay transitions within the same tick (guarded against
//!    same-tick cycles)
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single-threaded and tick-driven**: all mutation happens inside the
//!   one synchronous `evaluate` call; there is no internal threading.
//! - **Forward-looking triggers**: fire points are pure functions of
//!   current remaining-time state, re-evaluated fresh each tick.
//! - **Degrade to inert**: configuration faults disable the affected
//!   element instead of aborting the tick loop.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod blend;
mod clip;
mod foundation;
mod scene;
mod sequencer;
mod timeline;
mod variable;

pub use blend::blendable::{BlendRamp, BlendSlot, Blendable, RampState};
pub use clip::clip::{BlendTarget, Clip, ClipId};
pub use foundation::error::{CadenzaError, CadenzaResult};
pub use foundation::time::{TickContext, TimeRange};
pub use scene::build::{BuildOutput, Diagnostic, build};
pub use scene::library::{ClipRangeSource, ClipSelector, StaticClipLibrary};
pub use scene::model::{
    BlendTargetDef, ClipDef, ClipRefDef, SceneDef, TimelineDef, TransitionDef,
};
pub use sequencer::sequencer::ClipSequencer;
pub use sequencer::transition::{ClipTransition, FireReason, TriggerSet};
pub use timeline::arena::{TimelineArena, TimelineId};
pub use timeline::timeline::{PlayState, Timeline, TimelineSpec};
pub use variable::expr::{BinaryOp, UnaryOp, VarExpr, Variable, VariableBank};
pub use variable::value::Value;
