use crate::fixed::Fixed;
use crate::raster::{GlyphInfo, PixelFormat, Rasterized};

/// A rasterized glyph as stored in a glyph set.
///
/// Metrics are kept in the narrow ranges the pipeline checks with
/// [`GlyphInfo::fits_compact`]. `data` is `None` for metrics-only records.
#[derive(Clone, Debug, PartialEq)]
pub struct Glyph {
    /// Linear advance in 26.6.
    pub linear_advance: i16,
    pub width: u8,
    pub height: u8,
    /// Left bearing in pixels.
    pub x: i8,
    /// Top bearing in pixels, positive up.
    pub y: i8,
    /// Rounded advance in pixels.
    pub advance: i8,
    pub format: PixelFormat,
    pub data: Option<Box<[u8]>>,
}

/// Returned for glyphs that could not be loaded.
pub static EMPTY_GLYPH: Glyph = Glyph::EMPTY;

impl Glyph {
    pub const EMPTY: Glyph = Glyph {
        linear_advance: 0,
        width: 0,
        height: 0,
        x: 0,
        y: 0,
        advance: 0,
        format: PixelFormat::Mono,
        data: None,
    };

    /// Narrows `info`. Returns `None` if any field is out of range.
    pub fn from_info(
        info: &GlyphInfo,
        format: PixelFormat,
        data: Option<Box<[u8]>>,
    ) -> Option<Glyph> {
        Some(Glyph {
            linear_advance: i16::try_from(info.linear_advance).ok()?,
            width: u8::try_from(info.width).ok()?,
            height: u8::try_from(info.height).ok()?,
            x: i8::try_from(info.x).ok()?,
            y: i8::try_from(info.y).ok()?,
            advance: i8::try_from(info.x_off).ok()?,
            format,
            data,
        })
    }

    pub fn from_rasterized(rasterized: Rasterized, format: PixelFormat) -> Option<Glyph> {
        Self::from_info(&rasterized.info, format, Some(rasterized.data))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0 && self.data.is_none()
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        std::ptr::eq(self, &EMPTY_GLYPH)
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.format.pitch(self.width as usize)
    }

    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    #[inline]
    pub fn linear_advance(&self) -> Fixed {
        Fixed::from_bits(self.linear_advance as i32)
    }

    #[inline]
    pub fn advance(&self) -> Fixed {
        Fixed::from_int(self.advance as i32)
    }

    /// Coverage of an 8-bit glyph at `(x, y)`.
    pub fn coverage(&self, x: usize, y: usize) -> Option<u8> {
        if self.format != PixelFormat::Gray8 || x >= self.width as usize {
            return None;
        }
        self.data()?.get(y * self.pitch() + x).copied()
    }

    /// Packed color pixel of a 32-bit glyph at `(x, y)`.
    pub fn argb(&self, x: usize, y: usize) -> Option<u32> {
        if !matches!(self.format, PixelFormat::Rgba32(_)) || x >= self.width as usize {
            return None;
        }
        let start = y * self.pitch() + x * 4;
        let bytes = self.data()?.get(start..start + 4)?;
        Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Full-precision glyph metrics, y pointing down.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphMetrics {
    pub x: Fixed,
    pub y: Fixed,
    pub width: Fixed,
    pub height: Fixed,
    pub x_off: Fixed,
    pub y_off: Fixed,
}

impl GlyphMetrics {
    pub fn from_glyph(glyph: &Glyph) -> Self {
        Self {
            x: Fixed::from_int(glyph.x as i32),
            y: Fixed::from_int(-(glyph.y as i32)),
            width: Fixed::from_int(glyph.width as i32),
            height: Fixed::from_int(glyph.height as i32),
            x_off: glyph.advance(),
            y_off: Fixed::ZERO,
        }
    }

    pub fn from_info(info: &GlyphInfo) -> Self {
        Self {
            x: Fixed::from_int(info.x),
            y: Fixed::from_int(-info.y),
            width: Fixed::from_int(info.width),
            height: Fixed::from_int(info.height),
            x_off: Fixed::from_int(info.x_off),
            y_off: Fixed::ZERO,
        }
    }

    /// Smallest box holding both.
    pub fn united(&self, other: &GlyphMetrics) -> GlyphMetrics {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        GlyphMetrics {
            x,
            y,
            width: right - x,
            height: bottom - y,
            x_off: self.x_off,
            y_off: self.y_off,
        }
    }
}

/// Snaps a horizontal pen position to one of `count` fractional offsets.
///
/// The result is in `[0, 1)` pixel, a multiple of `1 / count`. Whole positions
/// and a count of one map to zero.
pub fn quantize_subpixel(position: Fixed, count: u8) -> Fixed {
    if count <= 1 {
        return Fixed::ZERO;
    }
    let fraction = position.bits() & 63;
    let bucket = fraction * count as i32 / 64;
    Fixed::from_bits(bucket * 64 / count as i32)
}

/// Index of the bucket a quantized offset belongs to.
#[inline]
pub fn subpixel_bucket(offset: Fixed, count: u8) -> u8 {
    if count <= 1 {
        return 0;
    }
    ((offset.bits() & 63) * count as i32 / 64) as u8
}
