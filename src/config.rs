use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for a single `shift_layout_by_force` pass.
///
/// All fields have the engine's stock defaults; a config file only needs to
/// name the ones it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepelConfig {
    /// Base magnitude of the repulsion force between overlapping boxes.
    pub force_push: f32,
    /// Base magnitude of the attraction pulling a free label to its host.
    pub force_pull: f32,
    /// Hard cap on solver iterations; the loop exits earlier on the first
    /// full pass without overlap or leader-line crossing events.
    pub max_iter: u32,
    /// Velocity damping applied every iteration, in `(0, 1)`.
    pub friction: f32,
    /// Horizontal clamp range, pixel space. Defaults to the viewport's
    /// `left..right` extent when `None`.
    pub x_bounds: Option<(f32, f32)>,
    /// Vertical clamp range, pixel space. Defaults to `lower..upper`.
    pub y_bounds: Option<(f32, f32)>,
    /// Seed for the jitter and stuck-pair coin flips. `None` seeds from
    /// entropy, so repeated runs produce different (equally valid) layouts.
    pub seed: Option<u64>,
}

impl Default for RepelConfig {
    fn default() -> Self {
        Self {
            force_push: 1e-6,
            force_pull: 1e-4,
            max_iter: 3000,
            friction: 0.7,
            x_bounds: None,
            y_bounds: None,
            seed: None,
        }
    }
}

/// Load a `RepelConfig` from a JSON file, or the defaults when `path` is
/// `None`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RepelConfig> {
    let Some(path) = path else {
        return Ok(RepelConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let parsed: RepelConfig = serde_json::from_str(&contents)?;
    Ok(parsed)
}
