use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ATLAS_DIMENSION: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMode {
    /// Color target plus a depth-stencil attachment.
    Color,
    /// Depth-stencil attachment only.
    Depth,
}

impl SurfaceMode {
    pub const fn has_color(self) -> bool {
        matches!(self, SurfaceMode::Color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasConfigError {
    DimensionNotPowerOfTwo(u32),
    DimensionTooSmall(u32),
}

impl fmt::Display for AtlasConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtlasConfigError::DimensionNotPowerOfTwo(dimension) => {
                write!(formatter, "atlas dimension {dimension} is not a power of two")
            }
            AtlasConfigError::DimensionTooSmall(dimension) => {
                write!(formatter, "atlas dimension {dimension} is too small to subdivide")
            }
        }
    }
}

impl std::error::Error for AtlasConfigError {}

pub(crate) fn validate_dimension(dimension: u32) -> Result<(), AtlasConfigError> {
    if dimension < 2 {
        return Err(AtlasConfigError::DimensionTooSmall(dimension));
    }
    if !dimension.is_power_of_two() {
        return Err(AtlasConfigError::DimensionNotPowerOfTwo(dimension));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasConfig {
    pub dimension: u32,
    pub mode: SurfaceMode,
}

impl AtlasConfig {
    pub const fn color(dimension: u32) -> Self {
        Self {
            dimension,
            mode: SurfaceMode::Color,
        }
    }

    pub const fn depth(dimension: u32) -> Self {
        Self {
            dimension,
            mode: SurfaceMode::Depth,
        }
    }

    pub fn validate(&self) -> Result<(), AtlasConfigError> {
        validate_dimension(self.dimension)
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self::color(DEFAULT_ATLAS_DIMENSION)
    }
}

/// Sizes of the shared atlases a renderer keeps for probes and shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderAtlasesConfig {
    pub reflections: AtlasConfig,
    pub shadows: AtlasConfig,
    pub irradiance: AtlasConfig,
    pub irradiance_coefficients: AtlasConfig,
}

impl Default for RenderAtlasesConfig {
    fn default() -> Self {
        Self {
            reflections: AtlasConfig::color(2048),
            shadows: AtlasConfig::depth(4096),
            irradiance: AtlasConfig::color(1024),
            irradiance_coefficients: AtlasConfig::color(1024),
        }
    }
}

impl RenderAtlasesConfig {
    pub fn validate(&self) -> Result<(), AtlasConfigError> {
        self.reflections.validate()?;
        self.shadows.validate()?;
        self.irradiance.validate()?;
        self.irradiance_coefficients.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_color_atlas() {
        let config = AtlasConfig::default();
        assert_eq!(config.dimension, 1024);
        assert_eq!(config.mode, SurfaceMode::Color);
        assert!(config.validate().is_ok());
        assert!(RenderAtlasesConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_dimensions() {
        assert_eq!(
            AtlasConfig::color(0).validate(),
            Err(AtlasConfigError::DimensionTooSmall(0))
        );
        assert_eq!(
            AtlasConfig::depth(768).validate(),
            Err(AtlasConfigError::DimensionNotPowerOfTwo(768))
        );
        assert!(AtlasConfig::depth(2).validate().is_ok());
    }

    #[test]
    fn partial_settings_override_only_named_atlases() {
        let config: RenderAtlasesConfig = serde_json::from_str(
            r#"{ "shadows": { "dimension": 8192, "mode": "depth" } }"#,
        )
        .unwrap();
        assert_eq!(config.shadows, AtlasConfig::depth(8192));
        assert_eq!(config.reflections, AtlasConfig::color(2048));
        assert_eq!(config.irradiance_coefficients, AtlasConfig::color(1024));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RenderAtlasesConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert!(text.contains("\"depth\""));
        let parsed: RenderAtlasesConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn errors_render_readable_messages() {
        let message = AtlasConfigError::DimensionNotPowerOfTwo(1000).to_string();
        assert!(message.contains("1000"));
    }
}
