pub mod config;
pub mod geometry;
pub mod solver;

pub use config::{load_config, RepelConfig};
pub use geometry::{Point, Rect};
pub use solver::{
    shift_layout_by_force, shift_layout_by_force_with_rng, Bounds, RepelLabel, RepelOutcome,
};
