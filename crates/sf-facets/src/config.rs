//! Engine configuration.

use core::fmt;
use core::time::Duration;
use sf_core::SyncError;
use sf_core::SyncResult;

const MAX_DEBOUNCE: Duration = Duration::from_secs(10);
const MAX_ROOT_MARGIN_PX: u32 = 10_000;

/// Distance outside the viewport at which a lazy image starts loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootMargin {
    pub vertical_px: u32,
    pub horizontal_px: u32,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            vertical_px: 200,
            horizontal_px: 0,
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {}px", self.vertical_px, self.horizontal_px)
    }
}

/// Timing and observer settings for one [`crate::FacetEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period after the last form `input`/`change` before a render starts.
    pub submit_debounce: Duration,
    /// Quiet period after the last active-filter chip click.
    pub active_filter_debounce: Duration,
    pub lazy_root_margin: RootMargin,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            submit_debounce: Duration::from_millis(800),
            active_filter_debounce: Duration::from_millis(300),
            lazy_root_margin: RootMargin::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> SyncResult<()> {
        for (name, window) in [
            ("submit_debounce", self.submit_debounce),
            ("active_filter_debounce", self.active_filter_debounce),
        ] {
            if window > MAX_DEBOUNCE {
                return Err(SyncError::new(
                    "config.debounce_out_of_range",
                    format!(
                        "`{name}` must be at most {}ms, got {}ms",
                        MAX_DEBOUNCE.as_millis(),
                        window.as_millis()
                    ),
                ));
            }
        }

        let margin = self.lazy_root_margin;
        if margin.vertical_px > MAX_ROOT_MARGIN_PX || margin.horizontal_px > MAX_ROOT_MARGIN_PX {
            return Err(SyncError::new(
                "config.root_margin_out_of_range",
                format!("lazy image root margin `{margin}` exceeds {MAX_ROOT_MARGIN_PX}px"),
            ));
        }

        Ok(())
    }
}
