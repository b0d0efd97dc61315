//! Pipeline lifecycle.
//!
//! `Idle -> LoadingInputs -> ApplyingChangeFiles -> ApplyingTagOverrides ->
//! Writing -> Done`, with `Failed` reachable from any non-terminal state.

use std::fmt;

use log::debug;

/// Stage a pipeline run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing has happened yet.
    Idle,
    /// Validating the input and parsing change files and rules.
    LoadingInputs,
    /// Composing the change file stages over the base stream.
    ApplyingChangeFiles,
    /// Composing the tag override stage.
    ApplyingTagOverrides,
    /// Draining the composed stream into the staged output.
    Writing,
    /// Output published.
    Done,
    /// A fatal error stopped the run; no output was published.
    Failed,
}

impl PipelineState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The state following this one on success.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::LoadingInputs),
            Self::LoadingInputs => Some(Self::ApplyingChangeFiles),
            Self::ApplyingChangeFiles => Some(Self::ApplyingTagOverrides),
            Self::ApplyingTagOverrides => Some(Self::Writing),
            Self::Writing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// # Examples
    /// ```
    /// use refit_data::PipelineState;
    ///
    /// assert!(PipelineState::Idle.can_transition_to(PipelineState::LoadingInputs));
    /// assert!(PipelineState::Writing.can_transition_to(PipelineState::Failed));
    /// assert!(!PipelineState::Idle.can_transition_to(PipelineState::Writing));
    /// assert!(!PipelineState::Done.can_transition_to(PipelineState::Failed));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::LoadingInputs => "loading inputs",
            Self::ApplyingChangeFiles => "applying change files",
            Self::ApplyingTagOverrides => "applying tag overrides",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Records the states a run passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StateTrace {
    visited: Vec<PipelineState>,
}

impl StateTrace {
    pub(crate) fn new() -> Self {
        Self {
            visited: vec![PipelineState::Idle],
        }
    }

    pub(crate) fn current(&self) -> PipelineState {
        self.visited
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Move to the successor state.
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.current().successor() {
            self.enter(next);
        }
    }

    /// Move to `Failed` unless the run already finished.
    pub(crate) fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.enter(PipelineState::Failed);
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug_assert!(self.current().can_transition_to(next));
        debug!("pipeline: {} -> {next}", self.current());
        self.visited.push(next);
    }

    pub(crate) fn into_states(self) -> Vec<PipelineState> {
        self.visited
    }
}
