use std::collections::BTreeMap;

use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::foundation::time::TimeRange;

/// Selects a clip range within an animation resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipSelector<'a> {
    /// By numeric clip index.
    Index(usize),
    /// By clip name.
    Name(&'a str),
}

/// The external resource collection consulted to auto-configure timeline
/// play ranges.
///
/// Lookup failures (unknown resource, name or index) are reported to the
/// caller, never silently defaulted.
pub trait ClipRangeSource {
    /// Resolve `(start, end)` for a clip within `resource`.
    fn clip_range(&self, resource: &str, selector: ClipSelector<'_>) -> CadenzaResult<TimeRange>;
}

/// In-memory [`ClipRangeSource`] used by tests and the CLI.
#[derive(Clone, Debug, Default)]
pub struct StaticClipLibrary {
    resources: BTreeMap<String, Vec<(String, TimeRange)>>,
}

impl StaticClipLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named clip range under a resource key.
    pub fn add_clip(
        &mut self,
        resource: impl Into<String>,
        name: impl Into<String>,
        range: TimeRange,
    ) {
        self.resources
            .entry(resource.into())
            .or_default()
            .push((name.into(), range));
    }
}

impl ClipRangeSource for StaticClipLibrary {
    fn clip_range(&self, resource: &str, selector: ClipSelector<'_>) -> CadenzaResult<TimeRange> {
        let clips = self.resources.get(resource).ok_or_else(|| {
            CadenzaError::validation(format!("unknown animation resource '{resource}'"))
        })?;
        match selector {
            ClipSelector::Index(i) => clips.get(i).map(|(_, r)| *r).ok_or_else(|| {
                CadenzaError::validation(format!(
                    "clip index {i} out of range for resource '{resource}'"
                ))
            }),
            ClipSelector::Name(name) => clips
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, r)| *r)
                .ok_or_else(|| {
                    CadenzaError::validation(format!(
                        "unknown clip '{name}' in resource '{resource}'"
                    ))
                }),
        }
    }
}
