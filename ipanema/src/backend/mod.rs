//! Boundary to the outline-font rasterization library.
//!
//! The engine never touches font tables directly for glyph work. It drives a
//! [`FontLibrary`] to open faces and a [`NativeFace`] to size, transform and
//! load glyphs, the same session-style protocol a FreeType face exposes:
//! char size and transform are mutable state on the face, and every glyph
//! load fills a fresh [`GlyphSlot`].

#[cfg(test)]
pub(crate) mod mock;
pub mod sfnt;

use crate::error::{FaceError, LoadError};
use crate::fixed::{ceil, div_fix, floor, mul_fix, round, FixedMatrix, Vector};
use bitflags::bitflags;
use std::path::Path;
use std::sync::Arc;

pub use sfnt::{SfntFace, SfntLibrary};

pub type GlyphId = u32;

/// Shared, immutable font file contents.
pub type FontData = Arc<[u8]>;

/// Point tag: on-curve.
pub const TAG_ON: u8 = 1;
/// Point tag: quadratic (conic) control point.
pub const TAG_CONIC: u8 = 0;
/// Point tag: cubic control point.
pub const TAG_CUBIC: u8 = 2;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        /// Load the unhinted outline.
        const NO_HINTING = 1 << 1;
        /// Ignore embedded bitmap strikes.
        const NO_BITMAP = 1 << 3;
        /// Use the automatic hinter instead of the font's bytecode.
        const FORCE_AUTOHINT = 1 << 5;
    }
}

/// Hinting target, the grid-fitting flavour requested from the library.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    #[default]
    Normal,
    Light,
    Mono,
    Lcd,
    LcdV,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    pub flags: LoadFlags,
    pub target: LoadTarget,
}

impl LoadOptions {
    pub const fn new(flags: LoadFlags, target: LoadTarget) -> Self {
        Self { flags, target }
    }

    #[inline]
    pub fn with(mut self, flags: LoadFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[inline]
    pub fn without(mut self, flags: LoadFlags) -> Self {
        self.flags.remove(flags);
        self
    }
}

/// Outline in 26.6 units, y pointing up.
///
/// `contours` holds the index of the last point of every contour. Tags use
/// [`TAG_ON`], [`TAG_CONIC`] and [`TAG_CUBIC`] in their two low bits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    pub points: Vec<Vector>,
    pub tags: Vec<u8>,
    pub contours: Vec<usize>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn transform(&mut self, matrix: &FixedMatrix) {
        if matrix.is_identity() {
            return;
        }
        for point in &mut self.points {
            *point = matrix.transform(*point);
        }
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        for point in &mut self.points {
            point.x = point.x.wrapping_add(dx);
            point.y = point.y.wrapping_add(dy);
        }
    }

    /// Control box `(x_min, y_min, x_max, y_max)`, all zero when empty.
    pub fn control_box(&self) -> (i32, i32, i32, i32) {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return (0, 0, 0, 0);
        };
        points.fold(
            (first.x, first.y, first.x, first.y),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Iterates contours as `(first, last)` inclusive point ranges.
    pub fn contour_ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut start = 0;
        self.contours.iter().filter_map(move |&end| {
            let first = start;
            start = end + 1;
            (end >= first && end < self.points.len()).then_some((first, end))
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelMode {
    /// One bit per pixel, most significant bit first.
    Mono,
    /// One coverage byte per pixel.
    Gray,
}

/// A rasterized bitmap, either an embedded strike or a scan-converted outline.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub rows: u32,
    pub pitch: usize,
    pub pixel_mode: PixelMode,
    pub buffer: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, rows: u32, pitch: usize, pixel_mode: PixelMode) -> Self {
        Self {
            width,
            rows,
            pitch,
            pixel_mode,
            buffer: vec![0; pitch * rows as usize],
        }
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.pitch;
        self.buffer.get(start..start + self.pitch).unwrap_or(&[])
    }

    /// True when the pixel at `(x, y)` is inked.
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        let row = self.row(y);
        match self.pixel_mode {
            PixelMode::Mono => row
                .get(x >> 3)
                .map(|byte| byte & (0x80 >> (x & 7)) != 0)
                .unwrap_or(false),
            PixelMode::Gray => row.get(x).map(|v| *v >= 0x80).unwrap_or(false),
        }
    }
}

/// Slot metrics in 26.6, before any transform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotMetrics {
    pub width: i32,
    pub height: i32,
    pub hori_bearing_x: i32,
    pub hori_bearing_y: i32,
    pub hori_advance: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlotImage {
    Outline(Outline),
    Bitmap {
        bitmap: Bitmap,
        /// Left bearing of the bitmap in whole pixels.
        left: i32,
        /// Top bearing of the bitmap in whole pixels, positive up.
        top: i32,
    },
}

/// The result of one glyph load.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphSlot {
    pub metrics: SlotMetrics,
    /// Transformed advance, 26.6.
    pub advance: Vector,
    /// Unhinted advance, 16.16.
    pub linear_hori_advance: i32,
    pub image: SlotImage,
}

impl GlyphSlot {
    #[inline]
    pub fn outline(&self) -> Option<&Outline> {
        match &self.image {
            SlotImage::Outline(outline) => Some(outline),
            SlotImage::Bitmap { .. } => None,
        }
    }

    #[inline]
    pub fn is_bitmap(&self) -> bool {
        matches!(self.image, SlotImage::Bitmap { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharmapEncoding {
    Unicode,
    AppleRoman,
    AdobeLatin1,
    AdobeCustom,
    MsSymbol,
    Other,
}

/// An embedded bitmap strike. Sizes are 26.6; line metrics are whole pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StrikeSize {
    pub x_ppem: i32,
    pub y_ppem: i32,
    pub ascender: i32,
    pub descender: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FontBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// Size-independent face properties, in font units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceInfo {
    pub family_name: String,
    pub style_name: String,
    pub postscript_name: Option<String>,
    pub is_scalable: bool,
    pub is_fixed_width: bool,
    pub is_bold: bool,
    pub is_italic: bool,
    /// Set for Type 1 faces, which carry a PostScript font-info dictionary.
    pub has_ps_font_info: bool,
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    /// Baseline-to-baseline distance.
    pub height: i16,
    pub max_advance_width: u16,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub bbox: FontBox,
    pub num_glyphs: u32,
    pub fixed_sizes: Vec<StrikeSize>,
    pub charmaps: Vec<CharmapEncoding>,
}

/// Metrics of the currently applied char size, FreeType style.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeMetrics {
    pub x_ppem: u16,
    pub y_ppem: u16,
    /// Font units to 26.6, in 16.16.
    pub x_scale: i32,
    pub y_scale: i32,
    pub ascender: i32,
    pub descender: i32,
    pub height: i32,
    pub max_advance: i32,
}

impl SizeMetrics {
    /// Metrics for a char size of `width` x `height` (26.6).
    ///
    /// Scalable faces scale their design metrics. Other faces take them from
    /// the strike whose ppem equals the request, if any.
    pub fn for_char_size(info: &FaceInfo, width: i32, height: i32) -> Option<SizeMetrics> {
        if !info.is_scalable {
            let strike = info.fixed_sizes.iter().find(|s| {
                (s.y_ppem + 32) >> 6 == (height + 32) >> 6
                    && (s.x_ppem + 32) >> 6 == (width + 32) >> 6
            })?;
            return Some(SizeMetrics {
                x_ppem: ((strike.x_ppem + 32) >> 6) as u16,
                y_ppem: ((strike.y_ppem + 32) >> 6) as u16,
                x_scale: 0x10000,
                y_scale: 0x10000,
                ascender: strike.ascender * 64,
                descender: strike.descender * 64,
                height: (strike.ascender - strike.descender) * 64,
                max_advance: strike.x_ppem,
            });
        }

        let upem = info.units_per_em.max(1) as i32;
        let x_scale = div_fix(width, upem);
        let y_scale = div_fix(height, upem);
        Some(SizeMetrics {
            x_ppem: ((width + 32) >> 6).clamp(0, u16::MAX as i32) as u16,
            y_ppem: ((height + 32) >> 6).clamp(0, u16::MAX as i32) as u16,
            x_scale,
            y_scale,
            ascender: ceil(mul_fix(info.ascender as i32, y_scale)),
            descender: floor(mul_fix(info.descender as i32, y_scale)),
            height: round(mul_fix(info.height as i32, y_scale)),
            max_advance: round(mul_fix(info.max_advance_width as i32, x_scale)),
        })
    }
}

/// A face opened by a [`FontLibrary`].
pub trait NativeFace {
    fn info(&self) -> &FaceInfo;

    /// Applies a char size in 26.6 points at 72 dpi.
    fn set_char_size(&mut self, width: i32, height: i32) -> Result<(), LoadError>;

    fn size_metrics(&self) -> SizeMetrics;

    /// Applies the transform used by every following load.
    fn set_transform(&mut self, matrix: FixedMatrix, delta: Vector);

    fn load_glyph(
        &mut self,
        glyph: GlyphId,
        options: LoadOptions,
    ) -> Result<GlyphSlot, LoadError>;

    /// Maps a code point through the selected charmap; 0 when unmapped.
    fn char_index(&self, codepoint: u32) -> GlyphId;

    /// Selects the charmap at `index` of [`FaceInfo::charmaps`].
    fn set_charmap(&mut self, index: usize) -> bool;

    fn sfnt_table(&self, tag: [u8; 4]) -> Option<Vec<u8>>;
}

/// An initialized rasterization library instance.
pub trait FontLibrary {
    type Face: NativeFace;

    fn new_face_from_memory(
        &mut self,
        data: FontData,
        index: u32,
    ) -> Result<Self::Face, FaceError>;

    fn new_face_from_path(
        &mut self,
        path: &Path,
        index: u32,
    ) -> Result<Self::Face, FaceError>;
}
