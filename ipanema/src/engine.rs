//! A face at one size: glyph loading, the glyph caches and face metrics.
//!
//! An engine never owns its [`Face`]. Every operation that touches the
//! rasterizer takes the face it was created on, so several engines can
//! share one face through the registry while each keeps its own caches.
//!
//! Two kinds of glyph set live here. The default set holds metrics and
//! untransformed glyphs for layout. Rasters requested under a transform go
//! to a small LRU of transformed sets, keyed by the 16.16 matrix.

use crate::backend::{
    GlyphId, LoadFlags, LoadOptions, LoadTarget, NativeFace, SizeMetrics, SlotImage,
};
use crate::config::RasterConfig;
use crate::error::LoadError;
use crate::face::{Face, FaceId, FaceKey, OutlinePoint, Os2};
use crate::fixed::{mul_fix, Fixed, FixedMatrix, Vector};
use crate::glyph::{quantize_subpixel, Glyph, GlyphMetrics, EMPTY_GLYPH};
use crate::glyph_set::GlyphSet;
use crate::hint::{self, Fault, HintPolicy, HintStyle, HintingPreference};
use crate::path::{bitmap_to_path, Path, PathBuilder, PathPoint};
use crate::raster::{self, GlyphInfo, LcdFilter, PixelFormat, RasterRequest, SubpixelGeometry};
use crate::synthetic;
use crate::transform::{Transform, TransformKind};
use bitflags::bitflags;
use lru::LruCache;
use std::borrow::Cow;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// Transformed glyph sets kept per engine.
pub const MAX_TRANSFORMED_SETS: usize = 10;

pub const WEIGHT_NORMAL: u16 = 400;
pub const WEIGHT_BOLD: u16 = 700;
/// Faces at or above this OS/2 weight class are never emboldened.
const WEIGHT_CLASS_EMBOLDEN_LIMIT: u16 = 750;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

/// What text layout asks an engine for.
#[derive(Clone, Debug, PartialEq)]
pub struct FontDef {
    pub pixel_size: f64,
    /// Horizontal stretch in percent.
    pub stretch: u16,
    pub weight: u16,
    pub style: FontStyle,
    pub hinting_preference: HintingPreference,
    /// Round every advance to whole pixels.
    pub force_integer_metrics: bool,
    /// Base transform applied to every glyph of the engine.
    pub transform: Transform,
}

impl Default for FontDef {
    fn default() -> Self {
        Self::new(12.0)
    }
}

impl FontDef {
    pub fn new(pixel_size: f64) -> Self {
        Self {
            pixel_size,
            stretch: 100,
            weight: WEIGHT_NORMAL,
            style: FontStyle::Normal,
            hinting_preference: HintingPreference::Default,
            force_integer_metrics: false,
            transform: Transform::IDENTITY,
        }
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn stretch(mut self, stretch: u16) -> Self {
        self.stretch = stretch;
        self
    }
}

bitflags! {
    /// Styles the engine fakes because the face lacks them.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Synthesized: u8 {
        const ITALIC = 1;
        const BOLD = 1 << 1;
        const STRETCH = 1 << 2;
    }
}

/// A raster lookup result.
#[derive(Debug)]
pub enum Raster<'a> {
    Glyph(Cow<'a, Glyph>),
    /// No bitmap is kept for this request; draw the glyph from its path.
    Outline,
}

impl Raster<'_> {
    pub fn glyph(&self) -> Option<&Glyph> {
        match self {
            Raster::Glyph(glyph) => Some(&**glyph),
            Raster::Outline => None,
        }
    }

    /// True when the glyph is owned by a glyph set.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Raster::Glyph(Cow::Borrowed(_)))
    }
}

/// Advances and bounds of one glyph at the engine size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphMeasure {
    pub advance: Fixed,
    pub linear_advance: Fixed,
    pub bounds: GlyphMetrics,
}

/// Glyphs and advances of a string, one entry per `char`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphLayout {
    pub glyphs: Vec<GlyphId>,
    pub advances: Vec<Fixed>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SetKey {
    Default,
    Transformed(FixedMatrix),
}

enum Loaded<'a> {
    Glyph(Cow<'a, Glyph>),
    /// Metrics too large for a cached record, straight from the slot.
    Oversized(GlyphInfo),
}

impl Loaded<'_> {
    fn metrics(&self) -> GlyphMetrics {
        match self {
            Loaded::Glyph(glyph) => GlyphMetrics::from_glyph(glyph),
            Loaded::Oversized(info) => GlyphMetrics::from_info(info),
        }
    }

    fn advance(&self, design: bool) -> Fixed {
        match self {
            Loaded::Glyph(glyph) if design => glyph.linear_advance(),
            Loaded::Glyph(glyph) => glyph.advance(),
            Loaded::Oversized(info) if design => Fixed::from_bits(info.linear_advance),
            Loaded::Oversized(info) => Fixed::from_int(info.x_off),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct LoadSpec {
    set: Option<SetKey>,
    glyph: GlyphId,
    subpixel: Fixed,
    format: PixelFormat,
    metrics_only: bool,
    hint_style: HintStyle,
    matrix: FixedMatrix,
}

/// Rendering settings an engine carries over to its clones.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Settings {
    hint_style: HintStyle,
    /// Style restored by [`HintingPreference::Default`].
    initial_hint_style: HintStyle,
    default_flags: LoadFlags,
    antialias: bool,
    default_format: Option<PixelFormat>,
    subpixel: SubpixelGeometry,
    lcd_filter: LcdFilter,
    embedded_bitmaps: bool,
    cache_enabled: bool,
    subpixel_positions: u8,
    max_cached_glyph_size: u32,
    fast_glyph_limit: u32,
}

impl Settings {
    fn from_config(config: &RasterConfig, preference: HintingPreference) -> Self {
        let default_format = if !config.antialias {
            PixelFormat::Mono
        } else if config.subpixel != SubpixelGeometry::None {
            PixelFormat::Rgba32(config.subpixel)
        } else {
            PixelFormat::Gray8
        };
        let hint_style = match preference {
            HintingPreference::Default => config.hint_style,
            preference => preference.hint_style(),
        };
        Self {
            hint_style,
            initial_hint_style: config.hint_style,
            default_flags: LoadFlags::empty(),
            antialias: config.antialias,
            default_format: Some(default_format),
            subpixel: config.subpixel,
            lcd_filter: config.lcd_filter,
            embedded_bitmaps: config.embedded_bitmaps,
            cache_enabled: config.glyph_cache,
            subpixel_positions: config.subpixel_position_count(),
            max_cached_glyph_size: config.max_cached_glyph_size,
            fast_glyph_limit: config.fast_glyph_limit,
        }
    }
}

pub struct FontEngine {
    face: FaceKey,
    face_id: FaceId,
    def: FontDef,
    settings: Settings,
    /// Char size in 26.6, zero when no strike could be selected.
    xsize: i32,
    ysize: i32,
    matrix: FixedMatrix,
    forced_autohint: bool,
    embolden: bool,
    oblique: bool,
    symbol: bool,
    is_scalable: bool,
    face_is_bold: bool,
    face_is_italic: bool,
    units_per_em: u16,
    num_glyphs: u32,
    os2: Option<Os2>,
    metrics: SizeMetrics,
    line_thickness: Fixed,
    underline_position: Fixed,
    default_set: GlyphSet,
    transformed: LruCache<FixedMatrix, GlyphSet>,
}

impl std::fmt::Debug for FontEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontEngine")
            .field("face", &self.face_id)
            .field("pixel_size", &self.def.pixel_size)
            .field("xsize", &self.xsize)
            .field("ysize", &self.ysize)
            .field("transformed_sets", &self.transformed.len())
            .finish()
    }
}

impl FontEngine {
    /// Creates an engine for `def` on `face`, stored in the registry under `key`.
    pub fn new<F: NativeFace>(
        face: &mut Face<F>,
        key: FaceKey,
        def: FontDef,
        config: &RasterConfig,
    ) -> FontEngine {
        let settings = Settings::from_config(config, def.hinting_preference);
        let mut engine = FontEngine::blank(face, key, def, settings);
        engine.init(face);
        engine
    }

    fn blank<F: NativeFace>(
        face: &Face<F>,
        key: FaceKey,
        def: FontDef,
        settings: Settings,
    ) -> FontEngine {
        let info = face.native().info();
        let matrix = def.transform.to_fixed_matrix();
        let capacity = NonZeroUsize::new(MAX_TRANSFORMED_SETS).unwrap_or(NonZeroUsize::MIN);
        FontEngine {
            face: key,
            face_id: face.id().clone(),
            settings,
            xsize: 0,
            ysize: 0,
            matrix,
            forced_autohint: false,
            embolden: false,
            oblique: false,
            symbol: false,
            is_scalable: info.is_scalable,
            face_is_bold: info.is_bold,
            face_is_italic: info.is_italic,
            units_per_em: info.units_per_em,
            num_glyphs: info.num_glyphs,
            os2: face.os2().copied(),
            metrics: SizeMetrics::default(),
            line_thickness: Fixed::ONE,
            underline_position: Fixed::ZERO,
            default_set: GlyphSet::new(FixedMatrix::IDENTITY, settings.fast_glyph_limit),
            transformed: LruCache::new(capacity),
            def,
        }
    }

    fn init<F: NativeFace>(&mut self, face: &mut Face<F>) {
        let info = face.native().info();
        let is_fixed_width = info.is_fixed_width;
        let has_ps_font_info = info.has_ps_font_info;
        let symbol_family = info.family_name.to_lowercase().contains("symbol");
        let underline = (info.underline_thickness as i32, info.underline_position as i32);
        let strikes = info.fixed_sizes.clone();

        let mut ysize = (self.def.pixel_size * 64.0).round() as i32;
        let mut xsize = ysize * self.def.stretch as i32 / 100;

        if !self.is_scalable {
            let best = strikes.iter().min_by_key(|strike| {
                ((ysize - strike.y_ppem).abs(), (xsize - strike.x_ppem).abs())
            });
            let applied = match best {
                Some(strike) => {
                    let size = (strike.x_ppem, strike.y_ppem);
                    face.with_char_size_and_transform(size, self.matrix, Vector::ZERO, |_, _| ());
                    (face.char_size() == Some(size)).then_some(size)
                }
                None => None,
            };
            (xsize, ysize) = match applied {
                Some(size) => size,
                None => {
                    debug!(
                        "no usable strike for {}px on {:?}",
                        self.def.pixel_size, self.face_id
                    );
                    (0, 0)
                }
            };
        } else {
            let limit = (self.settings.max_cached_glyph_size as i32) << 6;
            self.default_set.outline_drawing = xsize > limit || ysize > limit;
        }
        self.xsize = xsize;
        self.ysize = ysize;

        if self.is_scalable {
            self.oblique = self.def.style != FontStyle::Normal && !self.face_is_italic;
            if self.def.weight >= WEIGHT_BOLD && !self.face_is_bold && !is_fixed_width {
                self.embolden = self
                    .os2
                    .is_some_and(|os2| os2.weight_class < WEIGHT_CLASS_EMBOLDEN_LIMIT);
            }
        }

        let mut metrics =
            face.with_char_size_and_transform((xsize, ysize), self.matrix, Vector::ZERO, |native, _| {
                native.size_metrics()
            });

        if self.is_scalable {
            let (thickness, position) = underline;
            self.line_thickness = Fixed::from_bits(mul_fix(thickness, metrics.y_scale));
            self.underline_position = Fixed::from_bits(-mul_fix(position, metrics.y_scale));

            // A strike at exactly this size has its own line metrics.
            if let Some(strike) = strikes
                .iter()
                .find(|s| s.x_ppem == xsize && s.y_ppem == ysize)
            {
                if strike.ascender + strike.descender > 0 {
                    metrics.ascender = strike.ascender * 64;
                    metrics.descender = strike.descender * 64;
                }
            }
        } else {
            let score = (self.def.weight as f64 * self.def.pixel_size) as i32;
            let mut thickness = score / 700;
            if thickness < 2 && score >= 1050 {
                thickness = 2;
            }
            let thickness = Fixed::from_int(thickness);
            self.line_thickness = thickness;
            self.underline_position = (thickness * 2 + Fixed::from_int(3)) / 6;
        }
        if self.line_thickness < Fixed::ONE {
            self.line_thickness = Fixed::ONE;
        }
        self.metrics = metrics;

        self.symbol = if has_ps_font_info {
            symbol_family
        } else {
            face.has_symbol_map()
        };

        debug!(
            "engine {:?} at {}px: char size {}x{}, embolden {}, oblique {}",
            self.face_id, self.def.pixel_size, xsize, ysize, self.embolden, self.oblique
        );
    }

    /// A new engine on the same face at `pixel_size`, keeping this engine's
    /// rendering settings and synthetic styles.
    ///
    /// The caller owns the extra face reference this engine represents.
    pub fn clone_with_size<F: NativeFace>(&self, face: &mut Face<F>, pixel_size: f64) -> FontEngine {
        let def = FontDef {
            pixel_size,
            ..self.def.clone()
        };
        let mut engine = FontEngine::blank(face, self.face, def, self.settings);
        engine.init(face);
        engine.forced_autohint = self.forced_autohint;
        engine.embolden = self.embolden;
        engine.oblique = self.oblique;
        engine
    }

    #[inline]
    pub fn face_key(&self) -> FaceKey {
        self.face
    }

    #[inline]
    pub fn face_id(&self) -> &FaceId {
        &self.face_id
    }

    #[inline]
    pub fn font_def(&self) -> &FontDef {
        &self.def
    }

    /// Char size in 26.6.
    #[inline]
    pub fn char_size(&self) -> (i32, i32) {
        (self.xsize, self.ysize)
    }

    #[inline]
    pub fn hint_style(&self) -> HintStyle {
        self.settings.hint_style
    }

    #[inline]
    pub fn default_format(&self) -> Option<PixelFormat> {
        self.settings.default_format
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        self.symbol
    }

    #[inline]
    pub fn is_emboldened(&self) -> bool {
        self.embolden
    }

    #[inline]
    pub fn is_obliqued(&self) -> bool {
        self.oblique
    }

    /// Glyphs are drawn from paths at this size.
    #[inline]
    pub fn outline_drawing(&self) -> bool {
        self.default_set.outline_drawing
    }

    /// Switches the hint style. Cached glyphs were hinted differently, so
    /// every glyph set is cleared.
    pub fn set_hinting_preference(&mut self, preference: HintingPreference) {
        let style = match preference {
            HintingPreference::Default => self.settings.initial_hint_style,
            preference => preference.hint_style(),
        };
        if style == self.settings.hint_style {
            return;
        }
        self.settings.hint_style = style;
        self.default_set.clear();
        self.transformed.clear();
    }

    pub fn set_default_format(&mut self, format: Option<PixelFormat>) {
        self.settings.default_format = format;
    }

    /// Format of untransformed metrics loads. Matches what an untransformed
    /// raster request resolves to, so both share one record per bucket.
    #[inline]
    fn load_format(&self, format: Option<PixelFormat>) -> PixelFormat {
        self.raster_format(format, &Transform::IDENTITY)
    }

    #[inline]
    fn default_key(&self) -> Option<SetKey> {
        self.settings.cache_enabled.then_some(SetKey::Default)
    }

    fn glyph_set(&self, key: SetKey) -> Option<&GlyphSet> {
        match key {
            SetKey::Default => Some(&self.default_set),
            SetKey::Transformed(matrix) => self.transformed.peek(&matrix),
        }
    }

    fn glyph_set_mut(&mut self, key: SetKey) -> Option<&mut GlyphSet> {
        match key {
            SetKey::Default => Some(&mut self.default_set),
            SetKey::Transformed(matrix) => self.transformed.peek_mut(&matrix),
        }
    }

    /// Finds the glyph set for `transform`, creating it when needed.
    ///
    /// Faces without outlines cannot be transformed and only ever use the
    /// default set, for translations.
    fn select_set(&mut self, transform: &Transform) -> Option<SetKey> {
        if !self.settings.cache_enabled {
            return None;
        }
        if !self.is_scalable {
            return (transform.kind() <= TransformKind::Translate).then_some(SetKey::Default);
        }

        let matrix = transform.to_fixed_matrix();
        if self.transformed.get(&matrix).is_none() {
            let mut set = GlyphSet::new(matrix, self.settings.fast_glyph_limit);
            let px = self.def.pixel_size;
            let max = self.settings.max_cached_glyph_size as f64;
            set.outline_drawing = px * px * transform.determinant().abs() >= max * max;
            if let Some((evicted, glyphs)) = self.transformed.push(matrix, set) {
                debug!("evicted glyph set {:?} holding {} glyphs", evicted, glyphs.len());
            }
        }
        Some(SetKey::Transformed(matrix))
    }

    /// Number of transformed glyph sets alive.
    #[inline]
    pub fn transformed_set_count(&self) -> usize {
        self.transformed.len()
    }

    fn load_glyph<'a, F: NativeFace>(&'a mut self, face: &mut Face<F>, spec: LoadSpec) -> Loaded<'a> {
        let LoadSpec {
            set,
            glyph,
            subpixel,
            format,
            metrics_only,
            hint_style,
            matrix,
        } = spec;

        let (hit, missing, outline_drawing) = match set.and_then(|key| self.glyph_set(key)) {
            Some(glyphs) => {
                let cached = glyphs.get(glyph, subpixel);
                (
                    cached.is_some_and(|g| g.format == format && (metrics_only || g.data.is_some())),
                    cached.is_none() && glyphs.is_missing(glyph),
                    glyphs.outline_drawing,
                )
            }
            None => (false, false, false),
        };
        if hit {
            let cached = set
                .and_then(|key| self.glyph_set(key))
                .and_then(|glyphs| glyphs.get(glyph, subpixel));
            return Loaded::Glyph(Cow::Borrowed(cached.unwrap_or(&EMPTY_GLYPH)));
        }
        if missing {
            return Loaded::Glyph(Cow::Borrowed(&EMPTY_GLYPH));
        }

        let delta = if format.is_mono() {
            Vector::ZERO
        } else {
            Vector::new(subpixel.bits(), 0)
        };
        let policy = HintPolicy {
            hint_style,
            default_flags: self.settings.default_flags,
            forced_autohint: self.forced_autohint || face.faults().forced_autohint(),
        };
        let request = policy.load_request(format, outline_drawing, false);
        let mut transform = !matrix.is_identity();
        let mut options = request.options;
        if transform || (!format.is_mono() && !self.settings.embedded_bitmaps) {
            options = options.with(LoadFlags::NO_BITMAP);
        }

        let loaded = face.with_char_size_and_transform(
            (self.xsize, self.ysize),
            matrix,
            delta,
            |native, faults| hint::load_glyph(native, faults, glyph, options),
        );
        let mut slot = match loaded {
            Ok(slot) => slot,
            Err(_) => {
                if let Some(key) = set {
                    if let Some(glyphs) = self.glyph_set_mut(key) {
                        glyphs.set_missing(glyph);
                    }
                }
                return Loaded::Glyph(Cow::Borrowed(&EMPTY_GLYPH));
            }
        };

        if self.embolden {
            let strength = synthetic::embolden_strength(self.units_per_em, self.metrics.y_scale);
            synthetic::embolden_slot(&mut slot, strength);
        }
        let mut bounds = matrix;
        if self.oblique {
            synthetic::oblique_slot(&mut slot);
            transform = true;
            bounds = synthetic::oblique(&matrix);
        }

        let record = if outline_drawing || metrics_only {
            let info = GlyphInfo::from_slot_metrics(&slot);
            match Glyph::from_info(&info, format, None) {
                Some(record) => record,
                None => return Loaded::Oversized(info),
            }
        } else {
            let raster_request = RasterRequest {
                format,
                subpixel_offset: Fixed::from_bits(delta.x),
                hsubpixel: request.hsubpixel,
                vfactor: request.vfactor,
                lcd_filter: self.settings.lcd_filter,
                transform: transform.then_some(bounds),
            };
            let rendered = raster::rasterize(&slot, &raster_request)
                .and_then(|rasterized| Glyph::from_rasterized(rasterized, format));
            match rendered {
                Some(record) => record,
                None => {
                    face.report_fault(Fault::Unrenderable, glyph);
                    return Loaded::Oversized(GlyphInfo::from_slot_metrics(&slot));
                }
            }
        };

        trace!("glyph {glyph} loaded as {:?} at {:?}", format, subpixel);
        let stored = match set {
            Some(key) => self.glyph_set_mut(key),
            None => None,
        };
        match stored {
            Some(glyphs) => Loaded::Glyph(Cow::Borrowed(glyphs.insert(glyph, subpixel, record))),
            None => Loaded::Glyph(Cow::Owned(record)),
        }
    }

    /// Loads `glyph` under `transform`, through the matching glyph set.
    ///
    /// Returns `None` when the set draws from outlines and no bounds were asked for.
    fn load_glyph_for<'a, F: NativeFace>(
        &'a mut self,
        face: &mut Face<F>,
        glyph: GlyphId,
        subpixel: Fixed,
        format: PixelFormat,
        transform: &Transform,
        fetch_bounds: bool,
    ) -> Option<Loaded<'a>> {
        let set = self.select_set(transform);
        let outline_drawing = set
            .and_then(|key| self.glyph_set(key))
            .is_some_and(|glyphs| glyphs.outline_drawing);
        if outline_drawing && !fetch_bounds {
            return None;
        }

        let hint_style =
            if transform.kind() >= TransformKind::Scale && !transform.is_2d_rotation() {
                HintStyle::None
            } else {
                self.settings.hint_style
            };
        let set_matrix = match set {
            Some(SetKey::Transformed(matrix)) => matrix,
            Some(SetKey::Default) => FixedMatrix::IDENTITY,
            None => transform.to_fixed_matrix(),
        };
        let spec = LoadSpec {
            set,
            glyph,
            subpixel,
            format,
            metrics_only: outline_drawing,
            hint_style,
            matrix: set_matrix.multiply(&self.matrix),
        };
        Some(self.load_glyph(face, spec))
    }

    /// Format a raster request is served in.
    fn raster_format(&self, format: Option<PixelFormat>, transform: &Transform) -> PixelFormat {
        if !self.is_scalable || !self.settings.antialias {
            return PixelFormat::Mono;
        }
        match format.or(self.settings.default_format) {
            Some(PixelFormat::Rgba32(_)) if transform.kind() > TransformKind::Rotate => {
                PixelFormat::Gray8
            }
            Some(PixelFormat::Rgba32(SubpixelGeometry::None)) => {
                PixelFormat::Rgba32(self.settings.subpixel)
            }
            Some(format) => format,
            None => PixelFormat::Gray8,
        }
    }

    /// Format and sub-pixel bucket a raster or bounds request is keyed by.
    fn resolve_request(
        &self,
        format: Option<PixelFormat>,
        subpixel: Fixed,
        transform: &Transform,
    ) -> (PixelFormat, Fixed) {
        let format = self.raster_format(format, transform);
        let subpixel = if format.is_mono() {
            Fixed::ZERO
        } else {
            quantize_subpixel(subpixel, self.settings.subpixel_positions)
        };
        (format, subpixel)
    }

    /// Renders `glyph` at the sub-pixel pen position `subpixel` under
    /// `transform`. Repeated requests return the glyph cached by the first.
    ///
    /// Glyphs that fail to load come back as the empty sentinel.
    pub fn raster_for<'a, F: NativeFace>(
        &'a mut self,
        face: &mut Face<F>,
        glyph: GlyphId,
        subpixel: Fixed,
        format: Option<PixelFormat>,
        transform: &Transform,
    ) -> Raster<'a> {
        let (format, subpixel) = self.resolve_request(format, subpixel, transform);
        match self.load_glyph_for(face, glyph, subpixel, format, transform, false) {
            Some(Loaded::Glyph(glyph)) => Raster::Glyph(glyph),
            Some(Loaded::Oversized(_)) | None => Raster::Outline,
        }
    }

    /// Bounds of `glyph` as [`raster_for`](Self::raster_for) would render it.
    pub fn alpha_map_bounding_box<F: NativeFace>(
        &mut self,
        face: &mut Face<F>,
        glyph: GlyphId,
        subpixel: Fixed,
        transform: &Transform,
        format: Option<PixelFormat>,
    ) -> GlyphMetrics {
        let (format, subpixel) = self.resolve_request(format, subpixel, transform);
        self.load_glyph_for(face, glyph, subpixel, format, transform, true)
            .map(|loaded| loaded.metrics())
            .unwrap_or_default()
    }

    pub fn bounding_box_transformed<F: NativeFace>(
        &mut self,
        face: &mut Face<F>,
        glyph: GlyphId,
        transform: &Transform,
    ) -> GlyphMetrics {
        self.alpha_map_bounding_box(face, glyph, Fixed::ZERO, transform, None)
    }

    /// Metrics-only load through the default set.
    fn load_metrics<'a, F: NativeFace>(&'a mut self, face: &mut Face<F>, glyph: GlyphId) -> Loaded<'a> {
        let spec = LoadSpec {
            set: self.default_key(),
            glyph,
            subpixel: Fixed::ZERO,
            format: self.load_format(None),
            metrics_only: true,
            hint_style: self.settings.hint_style,
            matrix: self.matrix,
        };
        if self.settings.cache_enabled && self.default_set.get(glyph, Fixed::ZERO).is_some() {
            return Loaded::Glyph(Cow::Borrowed(
                self.default_set.get(glyph, Fixed::ZERO).unwrap_or(&EMPTY_GLYPH),
            ));
        }
        self.load_glyph(face, spec)
    }

    pub fn bounding_box<F: NativeFace>(&mut self, face: &mut Face<F>, glyph: GlyphId) -> GlyphMetrics {
        let round = self.def.force_integer_metrics;
        let mut metrics = self.load_metrics(face, glyph).metrics();
        if round {
            metrics.x_off = metrics.x_off.round();
        }
        metrics
    }

    /// Bounds of a run laid out with the glyph advances plus `offsets`.
    ///
    /// The box always spans at least the line height.
    pub fn bounding_box_run<F: NativeFace>(
        &mut self,
        face: &mut Face<F>,
        glyphs: &[GlyphId],
        offsets: &[(Fixed, Fixed)],
    ) -> GlyphMetrics {
        let mut overall = GlyphMetrics {
            y: -self.ascent(),
            height: self.ascent() + self.descent(),
            ..GlyphMetrics::default()
        };
        let mut xmax = Fixed::ZERO;
        let mut ymax = Fixed::ZERO;
        for (i, &glyph) in glyphs.iter().enumerate() {
            let (dx, dy) = offsets.get(i).copied().unwrap_or_default();
            let bounds = self.load_metrics(face, glyph).metrics();
            let x = overall.x_off + dx + bounds.x;
            let y = overall.y_off + dy + bounds.y;
            overall.x = overall.x.min(x);
            overall.y = overall.y.min(y);
            xmax = xmax.max(x + bounds.width);
            ymax = ymax.max(y + bounds.height);
            overall.x_off += bounds.x_off;
        }
        overall.height = overall.height.max(ymax - overall.y);
        overall.width = xmax - overall.x;
        overall
    }

    pub fn metrics_for<F: NativeFace>(&mut self, face: &mut Face<F>, glyph: GlyphId) -> GlyphMeasure {
        let round = self.def.force_integer_metrics;
        let loaded = self.load_metrics(face, glyph);
        let mut measure = GlyphMeasure {
            advance: loaded.advance(false),
            linear_advance: loaded.advance(true),
            bounds: loaded.metrics(),
        };
        if round {
            measure.advance = measure.advance.round();
            measure.bounds.x_off = measure.bounds.x_off.round();
        }
        measure
    }

    /// Linear advances apply for unhinted or lightly hinted outlines.
    pub fn should_use_design_metrics(&self, design_metrics: bool) -> bool {
        self.is_scalable
            && (matches!(self.settings.hint_style, HintStyle::None | HintStyle::Light)
                || design_metrics)
    }

    pub fn recalc_advances<F: NativeFace>(
        &mut self,
        face: &mut Face<F>,
        glyphs: &[GlyphId],
        design_metrics: bool,
    ) -> Vec<Fixed> {
        let design = self.should_use_design_metrics(design_metrics);
        let acceptable = self.load_format(None);
        let mut advances = Vec::with_capacity(glyphs.len());
        for &glyph in glyphs {
            let cached = if self.settings.cache_enabled {
                self.default_set
                    .get(glyph, Fixed::ZERO)
                    .filter(|g| g.format == acceptable)
                    .map(|g| if design { g.linear_advance() } else { g.advance() })
            } else {
                None
            };
            let advance = match cached {
                Some(advance) => advance,
                None => self.load_metrics(face, glyph).advance(design),
            };
            advances.push(if self.def.force_integer_metrics {
                advance.round()
            } else {
                advance
            });
        }
        advances
    }

    #[inline]
    pub fn glyph_index<F: NativeFace>(&self, face: &mut Face<F>, codepoint: char) -> GlyphId {
        face.glyph_index(codepoint as u32)
    }

    /// Maps every `char` of `text` to a glyph and measures it. No shaping.
    pub fn string_to_glyphs<F: NativeFace>(
        &mut self,
        face: &mut Face<F>,
        text: &str,
        design_metrics: bool,
    ) -> GlyphLayout {
        let glyphs: Vec<GlyphId> = text.chars().map(|c| face.glyph_index(c as u32)).collect();
        let advances = self.recalc_advances(face, &glyphs, design_metrics);
        GlyphLayout { glyphs, advances }
    }

    /// Outline of `glyph` in font units, y pointing down, with its unscaled
    /// metrics in 26.6 units of the em.
    ///
    /// Faces without outlines trace their bitmap at the engine size instead.
    pub fn path_for<F: NativeFace>(
        &self,
        face: &mut Face<F>,
        glyph: GlyphId,
    ) -> Result<(Path, GlyphMetrics), LoadError> {
        let em = (self.units_per_em as i32) << 6;
        let size = if self.is_scalable {
            (em, em)
        } else {
            (self.xsize, self.ysize)
        };
        let options = LoadOptions::new(LoadFlags::NO_BITMAP, LoadTarget::Normal);
        let slot = face.with_char_size_and_transform(
            size,
            FixedMatrix::IDENTITY,
            Vector::ZERO,
            |native, faults| hint::load_glyph(native, faults, glyph, options),
        )?;

        let m = &slot.metrics;
        let metrics = GlyphMetrics {
            x: Fixed::from_bits(m.hori_bearing_x),
            y: Fixed::from_bits(-m.hori_bearing_y),
            width: Fixed::from_bits(m.width),
            height: Fixed::from_bits(m.height),
            x_off: Fixed::from_bits(slot.advance.x),
            y_off: Fixed::ZERO,
        };
        let path = match &slot.image {
            SlotImage::Outline(outline) => PathBuilder::default().build(outline),
            SlotImage::Bitmap { bitmap, .. } => bitmap_to_path(
                bitmap,
                (m.hori_bearing_x >> 6) as f32,
                -((m.hori_bearing_y >> 6) as f32),
            ),
        };
        Ok((path, metrics))
    }

    /// Paths of `glyphs` at the engine size, each placed at its position.
    ///
    /// Synthetic bold and oblique are applied. Glyphs that fail to load are
    /// skipped.
    pub fn path_for_run<F: NativeFace>(
        &self,
        face: &mut Face<F>,
        glyphs: &[GlyphId],
        positions: &[PathPoint],
    ) -> Path {
        let mut path = Path::new();
        if self.is_scalable {
            let em = (self.units_per_em as i32) << 6;
            let options = LoadOptions::new(LoadFlags::NO_BITMAP, LoadTarget::Normal);
            // y_scale of the unscaled size: one font unit per 26.6 unit.
            let strength = synthetic::embolden_strength(self.units_per_em, 64 << 16);
            let scale_x = self.xsize as f32 / em as f32;
            let scale_y = self.ysize as f32 / em as f32;
            for (&glyph, &position) in glyphs.iter().zip(positions) {
                let loaded = face.with_char_size_and_transform(
                    (em, em),
                    FixedMatrix::IDENTITY,
                    Vector::ZERO,
                    |native, faults| hint::load_glyph(native, faults, glyph, options),
                );
                let Ok(mut slot) = loaded else {
                    continue;
                };
                if slot.is_bitmap() {
                    continue;
                }
                if self.embolden {
                    synthetic::embolden_slot(&mut slot, strength);
                }
                if self.oblique {
                    synthetic::oblique_slot(&mut slot);
                }
                if let Some(outline) = slot.outline() {
                    PathBuilder::new(position)
                        .scale(scale_x, scale_y)
                        .append(outline, &mut path);
                }
            }
        } else {
            let options = LoadOptions::new(LoadFlags::empty(), LoadTarget::Mono);
            for (&glyph, &position) in glyphs.iter().zip(positions) {
                let loaded = face.with_char_size_and_transform(
                    (self.xsize, self.ysize),
                    FixedMatrix::IDENTITY,
                    Vector::ZERO,
                    |native, faults| hint::load_glyph(native, faults, glyph, options),
                );
                let Ok(slot) = loaded else {
                    continue;
                };
                if let SlotImage::Bitmap { bitmap, .. } = &slot.image {
                    let m = &slot.metrics;
                    path.extend(bitmap_to_path(
                        bitmap,
                        position.x + (m.hori_bearing_x >> 6) as f32,
                        position.y - (m.hori_bearing_y >> 6) as f32,
                    ));
                }
            }
        }
        path
    }

    /// Point `point` of the hinted outline of `glyph` at the engine size.
    pub fn point_in_outline<F: NativeFace>(
        &self,
        face: &mut Face<F>,
        glyph: GlyphId,
        point: usize,
    ) -> Result<OutlinePoint, LoadError> {
        let policy = HintPolicy {
            hint_style: self.settings.hint_style,
            default_flags: self.settings.default_flags,
            forced_autohint: self.forced_autohint || face.faults().forced_autohint(),
        };
        let options = policy
            .load_request(PixelFormat::Gray8, self.default_set.outline_drawing, false)
            .options;
        face.with_char_size_and_transform(
            (self.xsize, self.ysize),
            self.matrix,
            Vector::ZERO,
            |_, _| (),
        );
        face.point_in_outline(glyph, options, point)
    }

    /// Drops the cached default rendering of `glyph`.
    pub fn remove_glyph_from_cache(&mut self, glyph: GlyphId) {
        self.default_set.remove(glyph, Fixed::ZERO);
    }

    /// Drops every cached glyph.
    pub fn clear_cache(&mut self) {
        self.default_set.clear();
        self.transformed.clear();
    }

    #[inline]
    pub fn glyph_count(&self) -> u32 {
        self.num_glyphs
    }

    pub fn em_square_size(&self) -> Fixed {
        if self.is_scalable {
            Fixed::from_int(self.units_per_em as i32)
        } else {
            Fixed::from_int(self.metrics.y_ppem as i32)
        }
    }

    #[inline]
    pub fn ascent(&self) -> Fixed {
        Fixed::from_bits(self.metrics.ascender)
    }

    #[inline]
    pub fn descent(&self) -> Fixed {
        Fixed::from_bits(-self.metrics.descender)
    }

    #[inline]
    pub fn leading(&self) -> Fixed {
        Fixed::from_bits(self.metrics.height - self.metrics.ascender + self.metrics.descender)
    }

    pub fn x_height<F: NativeFace>(&mut self, face: &mut Face<F>) -> Fixed {
        if let Some(x_height) = self.os2.and_then(|os2| os2.x_height) {
            if x_height != 0 {
                let em = self.em_square_size().truncate().max(1);
                return Fixed::from_int(x_height as i32 * self.metrics.y_ppem as i32) / em;
            }
        }
        let glyph = face.glyph_index('x' as u32);
        self.bounding_box(face, glyph).height
    }

    pub fn average_char_width<F: NativeFace>(&mut self, face: &mut Face<F>) -> Fixed {
        if let Some(os2) = self.os2 {
            if os2.avg_char_width != 0 {
                let em = self.em_square_size().truncate().max(1);
                return Fixed::from_int(os2.avg_char_width as i32 * self.metrics.x_ppem as i32)
                    / em;
            }
        }
        let glyph = face.glyph_index('x' as u32);
        self.bounding_box(face, glyph).x_off
    }

    #[inline]
    pub fn max_char_width(&self) -> i32 {
        self.metrics.max_advance >> 6
    }

    #[inline]
    pub fn line_thickness(&self) -> Fixed {
        self.line_thickness
    }

    #[inline]
    pub fn underline_position(&self) -> Fixed {
        self.underline_position
    }

    pub fn synthesized(&self) -> Synthesized {
        let mut flags = Synthesized::empty();
        if self.def.style != FontStyle::Normal && !self.face_is_italic {
            flags |= Synthesized::ITALIC;
        }
        if self.def.weight >= WEIGHT_BOLD && !self.face_is_bold {
            flags |= Synthesized::BOLD;
        }
        if self.def.stretch != 100 && self.is_scalable {
            flags |= Synthesized::STRETCH;
        }
        flags
    }
}
