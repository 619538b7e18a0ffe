//! Render scheduler configuration

/// Default cap on layout/paint/bounds passes per frame
pub const DEFAULT_MAX_PASSES: usize = 16;

/// Tuning for the frame loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Passes run before remaining work is pushed to the next frame
    pub max_passes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pass cap (at least one pass always runs)
    pub fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }
}
