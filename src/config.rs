//! Engine configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::consts::{
    HIDE_BELOW_ZOOM, INFLATE_OFFSET, OFFSET_DIVISOR, OFFSET_SCALAR, SNAPPING_RADIUS_PX,
    STROKE_WIDTH_PX, VERTEX_RADIUS_PX,
};

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A size or factor must be strictly positive.
    #[error("config value must be positive: {var} = {value}")]
    NonPositive { var: &'static str, value: f64 },
}

/// Tunables for sizes, snapping, and inflation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Vertex handle radius in screen pixels.
    pub vertex_radius_px: f64,
    /// Stroke width in screen pixels.
    pub stroke_width_px: f64,
    /// Snapping hit radius in screen pixels.
    pub snapping_radius_px: f64,
    /// Base inflation offset.
    pub inflate_offset: f64,
    /// Global inflation multiplier.
    pub offset_scalar: f64,
    /// Divisor for size-proportional polygon offsets.
    pub offset_divisor: f64,
    /// Zoom under which annotations are hidden.
    pub hide_below_zoom: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vertex_radius_px: VERTEX_RADIUS_PX,
            stroke_width_px: STROKE_WIDTH_PX,
            snapping_radius_px: SNAPPING_RADIUS_PX,
            inflate_offset: INFLATE_OFFSET,
            offset_scalar: OFFSET_SCALAR,
            offset_divisor: OFFSET_DIVISOR,
            hide_below_zoom: HIDE_BELOW_ZOOM,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `ANNOTATOR_VERTEX_RADIUS_PX`: default 4
    /// - `ANNOTATOR_STROKE_WIDTH_PX`: default 2
    /// - `ANNOTATOR_SNAPPING_RADIUS_PX`: default 10
    /// - `ANNOTATOR_INFLATE_OFFSET`: default 20
    /// - `ANNOTATOR_OFFSET_SCALAR`: default 1
    /// - `ANNOTATOR_OFFSET_DIVISOR`: default 80
    /// - `ANNOTATOR_HIDE_BELOW_ZOOM`: default 0.5
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositive`] if any parsed value is zero or negative.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            vertex_radius_px: env_positive(
                "ANNOTATOR_VERTEX_RADIUS_PX",
                defaults.vertex_radius_px,
            )?,
            stroke_width_px: env_positive("ANNOTATOR_STROKE_WIDTH_PX", defaults.stroke_width_px)?,
            snapping_radius_px: env_positive(
                "ANNOTATOR_SNAPPING_RADIUS_PX",
                defaults.snapping_radius_px,
            )?,
            inflate_offset: env_positive("ANNOTATOR_INFLATE_OFFSET", defaults.inflate_offset)?,
            offset_scalar: env_positive("ANNOTATOR_OFFSET_SCALAR", defaults.offset_scalar)?,
            offset_divisor: env_positive("ANNOTATOR_OFFSET_DIVISOR", defaults.offset_divisor)?,
            hide_below_zoom: env_positive("ANNOTATOR_HIDE_BELOW_ZOOM", defaults.hide_below_zoom)?,
        })
    }

    /// Vertex radius in viewport units at `scale`.
    #[must_use]
    pub fn vertex_radius(&self, scale: f64) -> f64 {
        self.vertex_radius_px / scale
    }

    /// Stroke width in viewport units at `scale`.
    #[must_use]
    pub fn stroke_width(&self, scale: f64) -> f64 {
        self.stroke_width_px / scale
    }

    /// Snapping radius in viewport units at `scale`.
    #[must_use]
    pub fn snapping_radius(&self, scale: f64) -> f64 {
        self.snapping_radius_px / scale
    }

    /// Squared distance under which a polygon cursor is pulled onto the first vertex.
    #[must_use]
    pub fn close_radius_sq(&self, scale: f64) -> f64 {
        self.vertex_radius_px / (scale * (scale / self.snapping_radius_px))
    }
}

fn env_positive(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = std::env::var(key)
        .map_or(default, |raw| raw.trim().parse::<f64>().unwrap_or(default));
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { var: key, value })
    }
}
