/*!
Pixel pipeline.

Turns a loaded glyph slot into one of the cached pixel formats:

* `Mono`: one bit per pixel, rows padded to 32 bits.
* `Gray8`: one coverage byte per pixel, rows padded to 4 bytes.
* `Rgba32`: one `u32` per pixel. With an LCD geometry the outline is scan
  converted at three times the resolution along one axis and three adjacent
  samples become the red, green and blue channels. Alpha mirrors green.

Color fringes are reduced either with a 1-3-8-3-1 triangle filter over the
oversampled coverage or with the legacy per-pixel matrix, never both.
*/

use crate::backend::{Bitmap, GlyphSlot, Outline, PixelMode, SlotImage};
use crate::fixed::{ceil, floor, round, trunc, Fixed, FixedMatrix, Vector};
use crate::scan;
use serde::{Deserialize, Serialize};

/// Physical order of the color sub-pixels of the target display.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SubpixelGeometry {
    #[default]
    #[serde(alias = "none")]
    None,
    #[serde(alias = "rgb")]
    Rgb,
    #[serde(alias = "bgr")]
    Bgr,
    #[serde(alias = "vrgb")]
    VRgb,
    #[serde(alias = "vbgr")]
    VBgr,
}

impl SubpixelGeometry {
    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, SubpixelGeometry::Rgb | SubpixelGeometry::Bgr)
    }

    #[inline]
    pub fn is_vertical(self) -> bool {
        matches!(self, SubpixelGeometry::VRgb | SubpixelGeometry::VBgr)
    }

    /// True when blue comes first along the oversampled axis.
    #[inline]
    pub fn is_reversed(self) -> bool {
        matches!(self, SubpixelGeometry::Bgr | SubpixelGeometry::VBgr)
    }
}

/// Fringe reduction applied to LCD coverage.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LcdFilter {
    #[serde(alias = "none")]
    None,
    /// 1-3-8-3-1 triangle over the oversampled coverage.
    #[default]
    #[serde(alias = "default")]
    Default,
    /// Per-pixel weighted matrix.
    #[serde(alias = "legacy")]
    Legacy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Mono,
    Gray8,
    Rgba32(SubpixelGeometry),
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Gray8
    }
}

impl PixelFormat {
    /// Bytes per row for a glyph `width` pixels wide.
    #[inline]
    pub fn pitch(self, width: usize) -> usize {
        match self {
            PixelFormat::Mono => ((width + 31) & !31) >> 3,
            PixelFormat::Gray8 => (width + 3) & !3,
            PixelFormat::Rgba32(_) => width * 4,
        }
    }

    #[inline]
    pub fn is_mono(self) -> bool {
        self == PixelFormat::Mono
    }

    #[inline]
    pub fn geometry(self) -> SubpixelGeometry {
        match self {
            PixelFormat::Rgba32(geometry) => geometry,
            _ => SubpixelGeometry::None,
        }
    }
}

/// Integer glyph metrics before they are narrowed into a cached record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphInfo {
    /// Linear advance in 26.6.
    pub linear_advance: i32,
    /// Rounded advance in pixels.
    pub x_off: i32,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

impl GlyphInfo {
    /// True when every field fits the compact ranges of a cached glyph.
    pub fn fits_compact(&self) -> bool {
        i16::try_from(self.linear_advance).is_ok()
            && i8::try_from(self.x_off).is_ok()
            && u8::try_from(self.width).is_ok()
            && u8::try_from(self.height).is_ok()
            && i8::try_from(self.x).is_ok()
            && i8::try_from(self.y).is_ok()
    }

    /// Metrics of an untransformed slot, without any pixels.
    pub fn from_slot_metrics(slot: &GlyphSlot) -> GlyphInfo {
        let m = &slot.metrics;
        let left = floor(m.hori_bearing_x);
        let right = ceil(m.hori_bearing_x + m.width);
        let top = ceil(m.hori_bearing_y);
        let bottom = floor(m.hori_bearing_y - m.height);
        GlyphInfo {
            linear_advance: slot.linear_hori_advance >> 10,
            x_off: trunc(round(slot.advance.x)),
            width: trunc(right - left),
            height: trunc(top - bottom),
            x: trunc(left),
            y: trunc(top),
        }
    }
}

/// Parameters of one rasterization.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RasterRequest {
    pub format: PixelFormat,
    /// Quantized horizontal sub-pixel offset already applied to the outline.
    pub subpixel_offset: Fixed,
    /// Oversample horizontally for LCD output.
    pub hsubpixel: bool,
    /// Vertical oversampling factor, 1 or 3.
    pub vfactor: u8,
    pub lcd_filter: LcdFilter,
    /// Transform applied to the outline, used to bound it.
    pub transform: Option<FixedMatrix>,
}

impl RasterRequest {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            subpixel_offset: Fixed::ZERO,
            hsubpixel: false,
            vfactor: 1,
            lcd_filter: LcdFilter::Default,
            transform: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rasterized {
    pub info: GlyphInfo,
    pub data: Box<[u8]>,
}

/// Renders a slot into the requested format.
///
/// Returns `None` when the resulting metrics do not fit a cached glyph record.
pub fn rasterize(slot: &GlyphSlot, request: &RasterRequest) -> Option<Rasterized> {
    let m = &slot.metrics;
    let mut left = m.hori_bearing_x;
    let mut right = m.hori_bearing_x + m.width;
    let mut top = m.hori_bearing_y;
    let mut bottom = m.hori_bearing_y - m.height;

    if let (Some(matrix), SlotImage::Outline(_)) = (request.transform, &slot.image) {
        let corners = [
            matrix.transform(Vector::new(left, top)),
            matrix.transform(Vector::new(right, top)),
            matrix.transform(Vector::new(right, bottom)),
            matrix.transform(Vector::new(left, bottom)),
        ];
        left = corners.iter().map(|v| v.x).min().unwrap_or(left);
        right = corners.iter().map(|v| v.x).max().unwrap_or(right);
        top = corners.iter().map(|v| v.y).max().unwrap_or(top);
        bottom = corners.iter().map(|v| v.y).min().unwrap_or(bottom);
    }

    let left = floor(left);
    let right = ceil(right);
    let bottom = floor(bottom);
    let top = ceil(top);

    let format = request.format;
    let hsubpixel = request.hsubpixel;
    let vfactor = request.vfactor.max(1) as i32;

    let mut hpixels = trunc(right - left);
    // A shifted glyph can bleed into one more column.
    if request.subpixel_offset > Fixed::ZERO && !format.is_mono() {
        hpixels += 1;
    }
    if hsubpixel {
        hpixels = hpixels * 3 + 8;
    }

    let mut info = GlyphInfo {
        linear_advance: slot.linear_hori_advance >> 10,
        x_off: trunc(round(slot.advance.x)),
        width: hpixels,
        height: trunc(top - bottom),
        x: trunc(left),
        y: trunc(top),
    };
    if hsubpixel {
        info.width /= 3;
        info.x -= 1;
    }

    if !info.fits_compact() {
        return None;
    }

    let data = match &slot.image {
        SlotImage::Outline(outline) => render_outline(
            outline,
            request,
            &info,
            hpixels as u32,
            (left, bottom),
            vfactor,
        ),
        SlotImage::Bitmap { bitmap, .. } => expand_bitmap(bitmap, request, &info),
    };

    Some(Rasterized {
        info,
        data: data.into_boxed_slice(),
    })
}

fn render_outline(
    outline: &Outline,
    request: &RasterRequest,
    info: &GlyphInfo,
    hpixels: u32,
    (left, bottom): (i32, i32),
    vfactor: i32,
) -> Vec<u8> {
    let format = request.format;
    let width = info.width as usize;
    let height = info.height as usize;
    let hsubpixel = request.hsubpixel;

    let (mode, bitmap_pitch) = if format.is_mono() {
        (PixelMode::Mono, format.pitch(width))
    } else {
        (PixelMode::Gray, (hpixels as usize + 3) & !3)
    };
    let mut bitmap = Bitmap::new(hpixels, info.height as u32 * vfactor as u32, bitmap_pitch, mode);

    let mut placed = outline.clone();
    let hscale = if hsubpixel { 3 } else { 1 };
    placed.transform(&FixedMatrix::scale(hscale << 16, vfactor << 16));
    placed.translate(
        if hsubpixel { -3 * left + (4 << 6) } else { -left },
        -bottom * vfactor,
    );
    scan::render_outline(&placed, &mut bitmap);

    let geometry = format.geometry();
    let legacy = request.lcd_filter == LcdFilter::Legacy;
    if hsubpixel {
        let coverage = if request.lcd_filter == LcdFilter::Default {
            let mut filtered = vec![0; bitmap.buffer.len()];
            convolute_triangle(
                &bitmap.buffer,
                &mut filtered,
                bitmap.width as usize,
                height,
                bitmap.pitch,
            );
            filtered
        } else {
            bitmap.buffer
        };
        let mut pixels = vec![0u32; width * height];
        rgb_to_argb(
            coverage.get(1..).unwrap_or(&[]),
            &mut pixels,
            width,
            height,
            bitmap_pitch,
            geometry.is_reversed(),
            legacy,
        );
        argb_bytes(&pixels)
    } else if vfactor != 1 {
        let coverage = if request.lcd_filter == LcdFilter::Default {
            let mut filtered = vec![0; bitmap.buffer.len()];
            convolute_triangle_vertical(
                &bitmap.buffer,
                &mut filtered,
                bitmap.width as usize,
                bitmap.rows as usize,
                bitmap.pitch,
            );
            filtered
        } else {
            bitmap.buffer
        };
        let mut pixels = vec![0u32; width * height];
        rgb_to_argb_v(
            &coverage,
            &mut pixels,
            width,
            height,
            bitmap_pitch,
            geometry.is_reversed(),
            legacy,
        );
        argb_bytes(&pixels)
    } else if let PixelFormat::Rgba32(_) = format {
        let mut pixels = vec![0u32; width * height];
        gray_to_argb(&bitmap.buffer, &mut pixels, width, height, bitmap_pitch);
        argb_bytes(&pixels)
    } else {
        bitmap.buffer
    }
}

fn expand_bitmap(bitmap: &Bitmap, request: &RasterRequest, info: &GlyphInfo) -> Vec<u8> {
    let format = request.format;
    let width = info.width as usize;
    let pitch = format.pitch(width);
    let mut dst = vec![0u8; pitch * info.height as usize];
    let rows = (bitmap.rows as usize).min(info.height as usize);
    let src_width = bitmap.width as usize;

    let coverage = |row: &[u8], x: usize| -> u8 {
        match bitmap.pixel_mode {
            PixelMode::Mono => {
                if row.get(x >> 3).is_some_and(|b| b & (0x80 >> (x & 7)) != 0) {
                    0xff
                } else {
                    0
                }
            }
            PixelMode::Gray => row.get(x).copied().unwrap_or(0),
        }
    };

    for y in 0..rows {
        let src = bitmap.row(y);
        let out = &mut dst[y * pitch..(y + 1) * pitch];
        match format {
            PixelFormat::Mono => match bitmap.pixel_mode {
                PixelMode::Mono => {
                    let bytes = (((width + 7) & !7) >> 3).min(src.len()).min(out.len());
                    out[..bytes].copy_from_slice(&src[..bytes]);
                }
                PixelMode::Gray => {
                    for x in 0..src_width.min(width) {
                        if coverage(src, x) >= 0x80 {
                            out[x >> 3] |= 0x80 >> (x & 7);
                        }
                    }
                }
            },
            PixelFormat::Gray8 => {
                for x in 0..src_width.min(out.len()) {
                    out[x] = coverage(src, x);
                }
            }
            PixelFormat::Rgba32(_) => {
                // Horizontal LCD leaves one empty pixel on each side.
                let lead = usize::from(request.hsubpixel);
                for x in 0..src_width {
                    let index = (x + lead) * 4;
                    let Some(px) = out.get_mut(index..index + 4) else {
                        break;
                    };
                    let c = coverage(src, x) as u32;
                    px.copy_from_slice(&((c << 16) | (c << 8) | c).to_ne_bytes());
                }
            }
        }
    }
    dst
}

fn argb_bytes(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_ne_bytes()).collect()
}

const TRIANGLE: [u32; 5] = [1, 3, 8, 3, 1];

/// Horizontal 1-3-8-3-1 convolution, samples outside a row count as zero.
pub fn convolute_triangle(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    pitch: usize,
) {
    for y in 0..height {
        let row = &src[y * pitch..];
        for x in 0..width {
            let mut sum = 0;
            for (k, weight) in TRIANGLE.iter().enumerate() {
                let sx = x as isize + k as isize - 2;
                if sx >= 0 && (sx as usize) < width {
                    sum += weight * row[sx as usize] as u32;
                }
            }
            dst[y * pitch + x] = (sum >> 4) as u8;
        }
    }
}

/// Vertical 1-3-8-3-1 convolution, samples outside a column count as zero.
pub fn convolute_triangle_vertical(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    rows: usize,
    pitch: usize,
) {
    for y in 0..rows {
        for x in 0..width {
            let mut sum = 0;
            for (k, weight) in TRIANGLE.iter().enumerate() {
                let sy = y as isize + k as isize - 2;
                if sy >= 0 && (sy as usize) < rows {
                    sum += weight * src[sy as usize * pitch + x] as u32;
                }
            }
            dst[y * pitch + x] = (sum >> 4) as u8;
        }
    }
}

/// Legacy intra-pixel filter.
#[inline]
pub fn legacy_filter(red: u8, green: u8, blue: u8) -> (u8, u8, u8) {
    const R_R: u32 = 65538 * 9 / 13;
    const R_G: u32 = 65538 / 6;
    const R_B: u32 = 65538 / 13;
    const G_R: u32 = 65538 * 3 / 13;
    const G_G: u32 = 65538 * 4 / 6;
    const G_B: u32 = 65538 * 3 / 13;
    let (r, g, b) = (red as u32, green as u32, blue as u32);
    let mix = |a: u32, b_: u32, c: u32| ((r * a + g * b_ + b * c) / 65536).min(255) as u8;
    (
        mix(R_R, R_G, R_B),
        mix(G_R, G_G, G_B),
        mix(R_B, R_G, R_R),
    )
}

#[inline]
fn pack(red: u8, green: u8, blue: u8, legacy: bool) -> u32 {
    let (red, green, blue) = if legacy {
        legacy_filter(red, green, blue)
    } else {
        (red, green, blue)
    };
    ((green as u32) << 24) | ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

/// Packs three horizontally adjacent samples per pixel.
///
/// `src` starts at the first sample of the first pixel.
pub fn rgb_to_argb(
    src: &[u8],
    dst: &mut [u32],
    width: usize,
    height: usize,
    src_pitch: usize,
    bgr: bool,
    legacy: bool,
) {
    let sample = |row: &[u8], i: usize| row.get(i).copied().unwrap_or(0);
    for y in 0..height {
        let row = src.get(y * src_pitch..).unwrap_or(&[]);
        for x in 0..width {
            let (a, g, b) = (sample(row, 3 * x), sample(row, 3 * x + 1), sample(row, 3 * x + 2));
            let (red, blue) = if bgr { (b, a) } else { (a, b) };
            dst[y * width + x] = pack(red, g, blue, legacy);
        }
    }
}

/// Packs three vertically adjacent rows per output row.
pub fn rgb_to_argb_v(
    src: &[u8],
    dst: &mut [u32],
    width: usize,
    height: usize,
    src_pitch: usize,
    bgr: bool,
    legacy: bool,
) {
    let sample = |i: usize| src.get(i).copied().unwrap_or(0);
    for y in 0..height {
        let base = 3 * y * src_pitch;
        for x in 0..width {
            let a = sample(base + x);
            let g = sample(base + src_pitch + x);
            let b = sample(base + 2 * src_pitch + x);
            let (red, blue) = if bgr { (b, a) } else { (a, b) };
            dst[y * width + x] = pack(red, g, blue, legacy);
        }
    }
}

/// Replicates gray coverage into opaque color pixels.
pub fn gray_to_argb(src: &[u8], dst: &mut [u32], width: usize, height: usize, src_pitch: usize) {
    for y in 0..height {
        for x in 0..width {
            let gray = src.get(y * src_pitch + x).copied().unwrap_or(0) as u32;
            dst[y * width + x] = (0xff << 24) | (gray << 16) | (gray << 8) | gray;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SlotMetrics, TAG_ON};

    fn box_slot(x0: i32, y0: i32, x1: i32, y1: i32) -> GlyphSlot {
        let outline = Outline {
            points: vec![
                Vector::new(x0, y0),
                Vector::new(x0, y1),
                Vector::new(x1, y1),
                Vector::new(x1, y0),
            ],
            tags: vec![TAG_ON; 4],
            contours: vec![3],
        };
        GlyphSlot {
            metrics: SlotMetrics {
                width: x1 - x0,
                height: y1 - y0,
                hori_bearing_x: x0,
                hori_bearing_y: y1,
                hori_advance: x1 + 64,
            },
            advance: Vector::new(x1 + 64, 0),
            linear_hori_advance: (x1 + 64) << 10,
            image: SlotImage::Outline(outline),
        }
    }

    #[test]
    fn test_pitch_per_format() {
        assert_eq!(PixelFormat::Mono.pitch(1), 4);
        assert_eq!(PixelFormat::Mono.pitch(33), 8);
        assert_eq!(PixelFormat::Gray8.pitch(5), 8);
        assert_eq!(PixelFormat::Gray8.pitch(8), 8);
        assert_eq!(PixelFormat::Rgba32(SubpixelGeometry::Rgb).pitch(5), 20);
    }

    #[test]
    fn test_lcd_packing_rgb_and_bgr() {
        let (c0, c1, c2) = (10u8, 200u8, 30u8);
        let mut out = [0u32; 1];
        rgb_to_argb(&[c0, c1, c2], &mut out, 1, 1, 3, false, false);
        assert_eq!(
            out[0],
            ((c1 as u32) << 24) | ((c0 as u32) << 16) | ((c1 as u32) << 8) | c2 as u32
        );

        rgb_to_argb(&[c0, c1, c2], &mut out, 1, 1, 3, true, false);
        assert_eq!(
            out[0],
            ((c1 as u32) << 24) | ((c2 as u32) << 16) | ((c1 as u32) << 8) | c0 as u32
        );
    }

    #[test]
    fn test_vertical_lcd_packing() {
        // Three rows of one sample each.
        let src = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        let mut out = [0u32; 1];
        rgb_to_argb_v(&src, &mut out, 1, 1, 4, false, false);
        assert_eq!(out[0], (2 << 24) | (1 << 16) | (2 << 8) | 3);
        rgb_to_argb_v(&src, &mut out, 1, 1, 4, true, false);
        assert_eq!(out[0], (2 << 24) | (3 << 16) | (2 << 8) | 1);
    }

    #[test]
    fn test_triangle_filter_weights() {
        let src = [0u8, 0, 16, 0, 0];
        let mut dst = [0u8; 5];
        convolute_triangle(&src, &mut dst, 5, 1, 5);
        assert_eq!(dst, [1, 3, 8, 3, 1]);

        let column = [0u8, 0, 16, 0, 0];
        let mut dst = [0u8; 5];
        convolute_triangle_vertical(&column, &mut dst, 1, 5, 1);
        assert_eq!(dst, [1, 3, 8, 3, 1]);
    }

    #[test]
    fn test_legacy_filter_keeps_black_and_saturates() {
        assert_eq!(legacy_filter(0, 0, 0), (0, 0, 0));
        let (_, g, _) = legacy_filter(255, 255, 255);
        assert_eq!(g, 255);
    }

    #[test]
    fn test_compact_metric_ranges() {
        let mut info = GlyphInfo {
            linear_advance: 640,
            x_off: 10,
            width: 255,
            height: 12,
            x: -128,
            y: 127,
        };
        assert!(info.fits_compact());
        info.width = 256;
        assert!(!info.fits_compact());
        info.width = 10;
        info.x_off = 128;
        assert!(!info.fits_compact());
        info.x_off = 10;
        info.linear_advance = 40000;
        assert!(!info.fits_compact());
    }

    #[test]
    fn test_gray_box_render() {
        let slot = box_slot(64, 0, 5 * 64, 3 * 64);
        let out = rasterize(&slot, &RasterRequest::new(PixelFormat::Gray8)).unwrap();
        assert_eq!(out.info.width, 4);
        assert_eq!(out.info.height, 3);
        assert_eq!(out.info.x, 1);
        assert_eq!(out.info.y, 3);
        assert_eq!(out.info.x_off, 6);
        assert_eq!(out.data.len(), 4 * 3);
        assert!(out.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_mono_box_render() {
        let slot = box_slot(0, 0, 3 * 64, 2 * 64);
        let out = rasterize(&slot, &RasterRequest::new(PixelFormat::Mono)).unwrap();
        assert_eq!(out.info.width, 3);
        assert_eq!(out.data.len(), 4 * 2);
        assert_eq!(out.data[0], 0b1110_0000);
        assert_eq!(out.data[4], 0b1110_0000);
    }

    #[test]
    fn test_subpixel_offset_adds_a_column() {
        let slot = box_slot(0, 0, 2 * 64, 64);
        let mut request = RasterRequest::new(PixelFormat::Gray8);
        request.subpixel_offset = Fixed::from_bits(16);
        let out = rasterize(&slot, &request).unwrap();
        assert_eq!(out.info.width, 3);

        request.format = PixelFormat::Mono;
        let out = rasterize(&slot, &request).unwrap();
        assert_eq!(out.info.width, 2);
    }

    #[test]
    fn test_horizontal_lcd_dimensions() {
        let slot = box_slot(0, 0, 2 * 64, 64);
        let mut request = RasterRequest::new(PixelFormat::Rgba32(SubpixelGeometry::Rgb));
        request.hsubpixel = true;
        let out = rasterize(&slot, &request).unwrap();
        // 2 pixels + 8 padding samples, divided by three.
        assert_eq!(out.info.width, 4);
        assert_eq!(out.info.x, -1);
        assert_eq!(out.data.len(), 4 * 4);
    }

    fn argb_at(out: &Rasterized, x: usize, y: usize) -> u32 {
        let i = (y * out.info.width as usize + x) * 4;
        u32::from_ne_bytes([out.data[i], out.data[i + 1], out.data[i + 2], out.data[i + 3]])
    }

    fn vertical_request(geometry: SubpixelGeometry, filter: LcdFilter) -> RasterRequest {
        let mut request = RasterRequest::new(PixelFormat::Rgba32(geometry));
        request.vfactor = 3;
        request.lcd_filter = filter;
        request
    }

    #[test]
    fn test_vertical_lcd_render() {
        // 1.5 pixels tall: the top pixel's upper third is empty, its middle third half covered.
        let slot = box_slot(0, 0, 2 * 64, 96);

        let out = rasterize(&slot, &vertical_request(SubpixelGeometry::VRgb, LcdFilter::None))
            .unwrap();
        assert_eq!(out.info.width, 2);
        assert_eq!(out.info.height, 2);
        assert_eq!(out.info.y, 2);
        assert_eq!(out.data.len(), 2 * 2 * 4);
        for x in 0..2 {
            assert_eq!(argb_at(&out, x, 1), 0xffff_ffff);
            let top = argb_at(&out, x, 0);
            let (red, green, blue) = ((top >> 16) & 0xff, (top >> 8) & 0xff, top & 0xff);
            assert_eq!(red, 0);
            assert!(green > 0 && green < 255, "green {green}");
            assert_eq!(blue, 255);
        }

        let out = rasterize(&slot, &vertical_request(SubpixelGeometry::VBgr, LcdFilter::None))
            .unwrap();
        let top = argb_at(&out, 0, 0);
        assert_eq!((top >> 16) & 0xff, 255);
        assert_eq!(top & 0xff, 0);
    }

    #[test]
    fn test_vertical_lcd_filtered_render() {
        let slot = box_slot(0, 0, 2 * 64, 96);
        let out = rasterize(
            &slot,
            &vertical_request(SubpixelGeometry::VRgb, LcdFilter::Default),
        )
        .unwrap();
        assert_eq!(out.info.width, 2);
        assert_eq!(out.info.height, 2);
        assert_eq!(out.data.len(), 2 * 2 * 4);

        // The filter spreads coverage up into the empty top sample row.
        let top = argb_at(&out, 0, 0);
        assert!((top >> 16) & 0xff > 0);
        assert!(top & 0xff > (top >> 16) & 0xff);
        let bottom = argb_at(&out, 1, 1);
        assert!((bottom >> 8) & 0xff > 0);
    }

    #[test]
    fn test_oversized_glyph_is_metrics_only() {
        let slot = box_slot(0, 0, 300 * 64, 10 * 64);
        assert!(rasterize(&slot, &RasterRequest::new(PixelFormat::Gray8)).is_none());
    }

    #[test]
    fn test_mono_strike_expands_to_gray() {
        let mut bitmap = Bitmap::new(3, 1, 4, PixelMode::Mono);
        bitmap.buffer[0] = 0b1010_0000;
        let slot = GlyphSlot {
            metrics: SlotMetrics {
                width: 3 * 64,
                height: 64,
                hori_bearing_x: 0,
                hori_bearing_y: 64,
                hori_advance: 4 * 64,
            },
            advance: Vector::new(4 * 64, 0),
            linear_hori_advance: 4 << 16,
            image: SlotImage::Bitmap {
                bitmap,
                left: 0,
                top: 1,
            },
        };
        let out = rasterize(&slot, &RasterRequest::new(PixelFormat::Gray8)).unwrap();
        assert_eq!(&out.data[..3], &[0xff, 0, 0xff]);
    }
}
