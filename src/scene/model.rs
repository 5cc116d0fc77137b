use std::collections::{BTreeMap, BTreeSet};

use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::sequencer::transition::TriggerSet;
use crate::variable::expr::Variable;
use crate::variable::value::Value;

/// A complete sequencer scene description.
///
/// A scene is a pure data model that can be built programmatically or
/// deserialized via Serde (JSON); lowering it into a runnable
/// [`ClipSequencer`](crate::ClipSequencer) is performed by
/// [`build`](crate::build).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneDef {
    /// Initial values for expression input slots.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Trigger variables (boolean-valued expressions over the inputs).
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Timelines owned by this scene subtree.
    pub timelines: Vec<TimelineDef>,
    /// Declared external blend sinks, by name.
    #[serde(default)]
    pub externals: Vec<String>,
    /// Clip states.
    pub clips: Vec<ClipDef>,
    /// Transition edges.
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
    /// Clip entered on reset (required).
    pub start_clip: String,
}

/// Timeline definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TimelineDef {
    /// Timeline identifier (stable within a scene).
    pub id: String,
    /// Explicit play range `[start, end]` in seconds. Exactly one of
    /// `range` and `clip_ref` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    /// Play range resolved through the external resource collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_ref: Option<ClipRefDef>,
    /// Loop phase bounds `[loop_start, loop_end]`; required when
    /// `loops != 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_range: Option<[f64; 2]>,
    /// Loop count: 0 = none, >0 = finite, <0 = infinite.
    #[serde(default)]
    pub loops: i32,
    /// Loop iteration to begin playback in (>= 1 skips the intro).
    #[serde(default)]
    pub start_loop: u32,
    /// Tick-to-time scale.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Cursor displacement applied at rewind time.
    #[serde(default)]
    pub time_offset: f64,
    /// Trigger-group membership mask.
    #[serde(default)]
    pub trigger_group_mask: u32,
    /// Rewind the cursor when the timeline stops.
    #[serde(default)]
    pub auto_rewind: bool,
    /// Started automatically when the owning clip activates.
    #[serde(default = "default_true")]
    pub start_on_activate: bool,
    /// Stopped automatically when the owning clip deactivates.
    #[serde(default = "default_true")]
    pub stop_on_deactivate: bool,
    /// Parent timeline gating this one's start/stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Sub-stage timelines receiving this timeline's per-stage blend
    /// factors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_stages: Vec<String>,
}

/// Reference to a clip range inside an animation resource.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ClipRefDef {
    /// Resource handle/key in the external collection.
    pub resource: String,
    /// Select the clip by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Select the clip by index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// Clip definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ClipDef {
    /// Clip identifier (stable within a scene).
    pub id: String,
    /// Referenced timelines (started/stopped with the clip).
    #[serde(default)]
    pub timelines: Vec<String>,
    /// Additional blend targets beyond the referenced timelines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blend_targets: Vec<BlendTargetDef>,
}

/// Blend target reference in a clip definition.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendTargetDef {
    /// A timeline, by id.
    Timeline(String),
    /// A declared external sink, by name.
    External(String),
}

/// Transition edge definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitionDef {
    /// Optional edge name for diagnostics; defaults to `from->to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source clip id.
    pub from: String,
    /// Target clip id.
    pub to: String,
    /// Enabled trigger conditions.
    #[serde(default)]
    pub trigger: TriggerSet,
    /// Trigger variable id (for the variable condition).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Fade-out duration in seconds.
    #[serde(default)]
    pub out_duration: f64,
    /// Signed fade-out offset in seconds (negative fires earlier).
    #[serde(default)]
    pub out_offset: f64,
    /// Fade-in duration in seconds.
    #[serde(default)]
    pub in_duration: f64,
    /// Signed fade-in offset in seconds.
    #[serde(default)]
    pub in_offset: f64,
}

impl TransitionDef {
    /// Edge name for diagnostics.
    pub fn name(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.from, self.to))
    }
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl SceneDef {
    /// Validate scene invariants that make the definition structurally
    /// unusable. Cross-reference faults (dangling ids, unresolvable clip
    /// refs) degrade to inert elements at build time instead.
    pub fn validate(&self) -> CadenzaResult<()> {
        let mut timeline_ids = BTreeSet::new();
        for tl in &self.timelines {
            if tl.id.trim().is_empty() {
                return Err(CadenzaError::validation("timeline id must be non-empty"));
            }
            if !timeline_ids.insert(tl.id.as_str()) {
                return Err(CadenzaError::validation(format!(
                    "duplicate timeline id '{}'",
                    tl.id
                )));
            }
            match (&tl.range, &tl.clip_ref) {
                (Some(_), Some(_)) | (None, None) => {
                    return Err(CadenzaError::validation(format!(
                        "timeline '{}' must set exactly one of range and clip_ref",
                        tl.id
                    )));
                }
                (Some([start, end]), None) => {
                    if !start.is_finite() || !end.is_finite() || start > end {
                        return Err(CadenzaError::validation(format!(
                            "timeline '{}' range must be finite with start <= end",
                            tl.id
                        )));
                    }
                }
                (None, Some(cr)) => {
                    let by_name = cr.name.is_some();
                    let by_index = cr.index.is_some();
                    if cr.resource.trim().is_empty() || by_name == by_index {
                        return Err(CadenzaError::validation(format!(
                            "timeline '{}' clip_ref needs a resource and exactly one of name/index",
                            tl.id
                        )));
                    }
                }
            }
            if let Some([ls, le]) = tl.loop_range
                && (!ls.is_finite() || !le.is_finite() || ls > le)
            {
                return Err(CadenzaError::validation(format!(
                    "timeline '{}' loop range must be finite with start <= end",
                    tl.id
                )));
            }
            if tl.loops != 0 && tl.loop_range.is_none() {
                return Err(CadenzaError::validation(format!(
                    "timeline '{}' requests loops but has no loop range",
                    tl.id
                )));
            }
            if !tl.time_scale.is_finite() || tl.time_scale < 0.0 {
                return Err(CadenzaError::validation(format!(
                    "timeline '{}' time_scale must be finite and >= 0",
                    tl.id
                )));
            }
            if !tl.time_offset.is_finite() {
                return Err(CadenzaError::validation(format!(
                    "timeline '{}' time_offset must be finite",
                    tl.id
                )));
            }
        }

        let mut clip_ids = BTreeSet::new();
        for clip in &self.clips {
            if clip.id.trim().is_empty() {
                return Err(CadenzaError::validation("clip id must be non-empty"));
            }
            if !clip_ids.insert(clip.id.as_str()) {
                return Err(CadenzaError::validation(format!(
                    "duplicate clip id '{}'",
                    clip.id
                )));
            }
        }

        let mut variable_ids = BTreeSet::new();
        for var in &self.variables {
            if var.id.trim().is_empty() {
                return Err(CadenzaError::validation("variable id must be non-empty"));
            }
            if !variable_ids.insert(var.id.as_str()) {
                return Err(CadenzaError::validation(format!(
                    "duplicate variable id '{}'",
                    var.id
                )));
            }
        }

        let mut external_ids = BTreeSet::new();
        for ext in &self.externals {
            if ext.trim().is_empty() {
                return Err(CadenzaError::validation("external name must be non-empty"));
            }
            if !external_ids.insert(ext.as_str()) {
                return Err(CadenzaError::validation(format!(
                    "duplicate external name '{ext}'"
                )));
            }
        }

        for tr in &self.transitions {
            for (field, value) in [
                ("out_duration", tr.out_duration),
                ("out_offset", tr.out_offset),
                ("in_duration", tr.in_duration),
                ("in_offset", tr.in_offset),
            ] {
                if !value.is_finite() {
                    return Err(CadenzaError::validation(format!(
                        "transition '{}' {field} must be finite",
                        tr.name()
                    )));
                }
            }
            if tr.out_duration < 0.0 || tr.in_duration < 0.0 {
                return Err(CadenzaError::validation(format!(
                    "transition '{}' durations must be >= 0",
                    tr.name()
                )));
            }
        }

        if self.start_clip.trim().is_empty() {
            return Err(CadenzaError::validation("start_clip must be non-empty"));
        }
        if !clip_ids.contains(self.start_clip.as_str()) {
            return Err(CadenzaError::validation(format!(
                "start_clip '{}' is not a declared clip",
                self.start_clip
            )));
        }

        Ok(())
    }

    /// Deserialize a scene from JSON.
    pub fn from_json(json: &str) -> CadenzaResult<Self> {
        serde_json::from_str(json).map_err(|e| CadenzaError::serde(e.to_string()))
    }

    /// Serialize the scene to pretty JSON.
    pub fn to_json(&self) -> CadenzaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CadenzaError::serde(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
