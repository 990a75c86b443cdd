use crate::error::ConfigError;
use crate::hint::HintStyle;
use crate::raster::{LcdFilter, SubpixelGeometry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment switch that turns the glyph cache off, whatever the config says.
pub const NO_GLYPH_CACHE_ENV: &str = "IPANEMA_NO_GLYPH_CACHE";

#[inline]
fn default_true() -> bool {
    true
}

#[inline]
pub fn default_subpixel_positions() -> u8 {
    4
}

#[inline]
pub fn default_max_cached_glyph_size() -> u32 {
    64
}

#[inline]
pub fn default_fast_glyph_limit() -> u32 {
    256
}

/// Rasterization defaults applied to every engine created by a context.
///
/// ```toml
/// hint-style = "light"
/// subpixel = "rgb"
/// lcd-filter = "legacy"
/// glyph-cache = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RasterConfig {
    #[serde(default = "HintStyle::platform_default", rename = "hint-style")]
    pub hint_style: HintStyle,
    #[serde(default = "SubpixelGeometry::default")]
    pub subpixel: SubpixelGeometry,
    #[serde(default = "LcdFilter::default", rename = "lcd-filter")]
    pub lcd_filter: LcdFilter,
    #[serde(default = "default_true")]
    pub antialias: bool,
    #[serde(default = "bool::default", rename = "embedded-bitmaps")]
    pub embedded_bitmaps: bool,
    #[serde(default = "default_true", rename = "glyph-cache")]
    pub glyph_cache: bool,
    #[serde(default = "default_subpixel_positions", rename = "subpixel-positions")]
    pub subpixel_positions: u8,
    #[serde(
        default = "default_max_cached_glyph_size",
        rename = "max-cached-glyph-size"
    )]
    pub max_cached_glyph_size: u32,
    #[serde(default = "default_fast_glyph_limit", rename = "fast-glyph-limit")]
    pub fast_glyph_limit: u32,
}

impl Default for RasterConfig {
    fn default() -> RasterConfig {
        RasterConfig {
            hint_style: HintStyle::platform_default(),
            subpixel: SubpixelGeometry::default(),
            lcd_filter: LcdFilter::default(),
            antialias: true,
            embedded_bitmaps: false,
            glyph_cache: true,
            subpixel_positions: default_subpixel_positions(),
            max_cached_glyph_size: default_max_cached_glyph_size(),
            fast_glyph_limit: default_fast_glyph_limit(),
        }
    }
}

impl RasterConfig {
    /// Parses a TOML document and applies environment overrides.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RasterConfig = toml::from_str(content)?;
        Ok(config.with_environment())
    }

    /// Disables the glyph cache when `IPANEMA_NO_GLYPH_CACHE` holds a non-zero value.
    pub fn with_environment(mut self) -> Self {
        if let Ok(value) = std::env::var(NO_GLYPH_CACHE_ENV) {
            if cache_disabled_by(&value) {
                debug!("glyph cache disabled through {}", NO_GLYPH_CACHE_ENV);
                self.glyph_cache = false;
            }
        }
        self
    }

    /// Sub-pixel bucket count, never below one.
    #[inline]
    pub fn subpixel_position_count(&self) -> u8 {
        self.subpixel_positions.max(1)
    }
}

fn cache_disabled_by(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.parse::<i64>().map(|v| v != 0).unwrap_or(true)
}
