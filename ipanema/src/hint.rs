//! Hinting policy: which load options a glyph request turns into, and how a
//! failing load is retried.

use crate::backend::{GlyphId, GlyphSlot, LoadFlags, LoadOptions, LoadTarget, NativeFace};
use crate::error::LoadError;
use crate::raster::PixelFormat;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum HintStyle {
    #[serde(alias = "none")]
    None,
    #[serde(alias = "light")]
    Light,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "full")]
    Full,
}

impl HintStyle {
    #[inline]
    pub fn platform_default() -> HintStyle {
        if cfg!(windows) {
            HintStyle::Full
        } else {
            HintStyle::None
        }
    }
}

/// Hinting preference as requested by text layout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum HintingPreference {
    #[default]
    Default,
    None,
    Vertical,
    Full,
}

impl HintingPreference {
    pub fn hint_style(self) -> HintStyle {
        match self {
            HintingPreference::Default => HintStyle::platform_default(),
            HintingPreference::None => HintStyle::None,
            HintingPreference::Vertical => HintStyle::Light,
            HintingPreference::Full => HintStyle::Full,
        }
    }
}

/// Load options for one request, plus the oversampling the pipeline must use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub options: LoadOptions,
    pub hsubpixel: bool,
    /// 3 for vertical LCD output, 1 otherwise.
    pub vfactor: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HintPolicy {
    pub hint_style: HintStyle,
    /// Flags OR'ed into every load of the engine.
    pub default_flags: LoadFlags,
    pub forced_autohint: bool,
}

impl HintPolicy {
    pub fn load_request(
        &self,
        format: PixelFormat,
        outline_drawing: bool,
        design_metrics: bool,
    ) -> LoadRequest {
        let mut flags = self.default_flags;
        let mut target = if self.hint_style == HintStyle::Light {
            LoadTarget::Light
        } else {
            LoadTarget::Normal
        };
        let mut hsubpixel = false;
        let mut vfactor = 1;

        match format {
            PixelFormat::Mono => target = LoadTarget::Mono,
            PixelFormat::Rgba32(geometry) if geometry.is_horizontal() => {
                if self.hint_style == HintStyle::Full {
                    target = LoadTarget::Lcd;
                }
                hsubpixel = true;
            }
            PixelFormat::Rgba32(geometry) if geometry.is_vertical() => {
                if self.hint_style == HintStyle::Full {
                    target = LoadTarget::LcdV;
                }
                vfactor = 3;
            }
            _ => {}
        }

        if outline_drawing {
            flags |= LoadFlags::NO_BITMAP;
        }

        if self.hint_style == HintStyle::None || design_metrics || outline_drawing {
            flags |= LoadFlags::NO_HINTING;
            target = LoadTarget::Normal;
        }

        if self.forced_autohint {
            flags |= LoadFlags::FORCE_AUTOHINT;
        }

        LoadRequest {
            options: LoadOptions::new(flags, target),
            hsubpixel,
            vfactor,
        }
    }
}

/// A fault worth reporting once per face.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    TooFewArguments,
    ExecutionTooLong,
    LoadFailed,
    Unrenderable,
}

/// Per-face hinting fault state.
#[derive(Debug, Default)]
pub struct FaultLog {
    forced_autohint: bool,
    reported: FxHashSet<Fault>,
}

impl FaultLog {
    #[inline]
    pub fn forced_autohint(&self) -> bool {
        self.forced_autohint
    }

    /// Logs `fault` unless this face already reported it. Returns true when logged.
    pub fn report(&mut self, fault: Fault, glyph: GlyphId) -> bool {
        if !self.reported.insert(fault) {
            return false;
        }
        match fault {
            Fault::TooFewArguments => {
                warn!("glyph {glyph}: hinting bytecode ran out of arguments, using the autohinter")
            }
            Fault::ExecutionTooLong => {
                warn!("glyph {glyph}: hinting bytecode ran too long, autohinting this face from now on")
            }
            Fault::LoadFailed => warn!("glyph {glyph}: load failed, using an empty glyph"),
            Fault::Unrenderable => {
                warn!("glyph {glyph}: metrics too large to cache, drawing without a bitmap")
            }
        }
        true
    }
}

/// Loads `glyph`, walking the fallback cascade on failure.
///
/// 1. A load without bitmaps is retried with bitmaps allowed.
/// 2. Too few arguments: retried once with the autohinter.
/// 3. Execution too long: the face switches to the autohinter for good.
pub fn load_glyph<F: NativeFace>(
    native: &mut F,
    faults: &mut FaultLog,
    glyph: GlyphId,
    options: LoadOptions,
) -> Result<GlyphSlot, LoadError> {
    let mut options = options;
    let mut result = native.load_glyph(glyph, options);

    if result.is_err() && options.flags.contains(LoadFlags::NO_BITMAP) {
        options = options.without(LoadFlags::NO_BITMAP);
        result = native.load_glyph(glyph, options);
    }

    if matches!(result, Err(LoadError::TooFewArguments)) {
        faults.report(Fault::TooFewArguments, glyph);
        result = native.load_glyph(glyph, options.with(LoadFlags::FORCE_AUTOHINT));
    } else if matches!(result, Err(LoadError::ExecutionTooLong)) {
        faults.report(Fault::ExecutionTooLong, glyph);
        faults.forced_autohint = true;
        result = native.load_glyph(glyph, options.with(LoadFlags::FORCE_AUTOHINT));
    }

    if let Err(err) = &result {
        debug!("glyph {glyph} failed to load: {err}");
        faults.report(Fault::LoadFailed, glyph);
    }
    result
}
