use std::{fs, path::Path};

use serde::Deserialize;

use crate::{error::DatasetError, types::Vec2};

pub const CANVAS_WIDTH: f32 = 1300.0;
pub const CANVAS_HEIGHT: f32 = 800.0;

pub const MERCATOR_SCALE: f32 = 1100.0;
pub const MERCATOR_TRANSLATE_X: f32 = 1650.0;
pub const MERCATOR_TRANSLATE_Y: f32 = 105.0;

pub const RADIUS_RANGE_MAX: f32 = 20.0;
pub const RADIUS_DISPLAY_FACTOR: f32 = 2.0;

pub const CYCLE_PERIOD_MS: u64 = 15_000;
pub const CLUSTER_DELAY_MS: u64 = 7_000;
pub const CENTER_DELAY_MS: u64 = 12_000;
pub const DIRECT_CENTER_DELAY_MS: u64 = 7_000;
pub const DIRECT_PERIOD_MS: u64 = 10_000;

pub const DISPERSE_DURATION_MS: u64 = 2_000;
pub const DISPERSE_STAGGER_MS: u64 = 20;
pub const CENTER_DURATION_MS: u64 = 2_000;
pub const CENTER_STAGGER_MS: u64 = 10;

pub const COVER_RADIUS: f32 = 40.0;

pub const FOCI_HEIGHT_STRETCH: f32 = 0.8;
pub const FOCI_OFFSET_Y: f32 = -100.0;
pub const LABEL_OFFSET_Y: f32 = -60.0;

pub const TICK_INTERVAL_MS: u64 = 16;
pub const ALPHA_START: f32 = 0.1;
pub const ALPHA_DECAY: f32 = 0.99;
pub const ALPHA_MIN: f32 = 0.005;
pub const GRAVITY: f32 = 0.02;

pub const COINCIDENT_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TweenConfig {
    pub duration_ms: u64,
    pub stagger_ms: u64,
}

impl TweenConfig {
    pub const INSTANT: TweenConfig = TweenConfig {
        duration_ms: 0,
        stagger_ms: 0,
    };
}

impl Default for TweenConfig {
    fn default() -> Self {
        Self {
            duration_ms: DISPERSE_DURATION_MS,
            stagger_ms: DISPERSE_STAGGER_MS,
        }
    }
}

/// How alpha evolves from one tick to the next.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cooling {
    /// Constant intensity; the simulation runs until stopped.
    Fixed { alpha: f32 },
    /// Starts at `start`, multiplies by `decay` every tick and stops below `min`.
    Decay { start: f32, decay: f32, min: f32 },
}

impl Default for Cooling {
    fn default() -> Self {
        Cooling::Decay {
            start: ALPHA_START,
            decay: ALPHA_DECAY,
            min: ALPHA_MIN,
        }
    }
}

/// Damping handed to the collision pass each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionDamping {
    #[default]
    TickAlpha,
    Fixed { alpha: f32 },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canvas: Vec2,
    pub mercator_scale: f32,
    pub mercator_translate: Vec2,
    pub radius_range_max: f32,
    pub radius_display_factor: f32,
    pub cover_radius: f32,
    /// Overrides the centre of the home-position bounds.
    pub cover_point: Option<Vec2>,
    pub foci_height_stretch: f32,
    pub foci_offset: Vec2,
    pub label_offset_y: f32,
    pub tick_interval_ms: u64,
    pub cooling: Cooling,
    pub collision_damping: CollisionDamping,
    pub gravity: f32,
    pub disperse: TweenConfig,
    pub center: TweenConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: Vec2::new(CANVAS_WIDTH, CANVAS_HEIGHT),
            mercator_scale: MERCATOR_SCALE,
            mercator_translate: Vec2::new(MERCATOR_TRANSLATE_X, MERCATOR_TRANSLATE_Y),
            radius_range_max: RADIUS_RANGE_MAX,
            radius_display_factor: RADIUS_DISPLAY_FACTOR,
            cover_radius: COVER_RADIUS,
            cover_point: None,
            foci_height_stretch: FOCI_HEIGHT_STRETCH,
            foci_offset: Vec2::new(0.0, FOCI_OFFSET_Y),
            label_offset_y: LABEL_OFFSET_Y,
            tick_interval_ms: TICK_INTERVAL_MS,
            cooling: Cooling::default(),
            collision_damping: CollisionDamping::default(),
            gravity: GRAVITY,
            disperse: TweenConfig {
                duration_ms: DISPERSE_DURATION_MS,
                stagger_ms: DISPERSE_STAGGER_MS,
            },
            center: TweenConfig {
                duration_ms: CENTER_DURATION_MS,
                stagger_ms: CENTER_STAGGER_MS,
            },
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let contents = fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Largest radius a point can reach on screen.
    pub fn effective_radius_max(&self) -> f32 {
        self.radius_range_max * self.radius_display_factor
    }
}
