//! SFNT backend: tables and strikes through ttf-parser, outlines and hinting
//! through skrifa.

use super::*;
use crate::fixed::{mul_div, round};
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::error::DrawError;
use skrifa::outline::{
    DrawSettings, Engine, HintingInstance, HintingOptions, OutlineGlyphCollection,
    OutlinePen, SmoothMode, Target,
};
use rustc_hash::FxHashMap;
use skrifa::MetadataProvider;
use tracing::{debug, trace};
use ttf_parser::{cmap, name_id, PlatformId, RasterImageFormat, Tag};

/// Hinting instances kept per face, searched linearly.
const MAX_CACHED_HINT_INSTANCES: usize = 8;

#[derive(Default)]
pub struct SfntLibrary {
    faces_opened: usize,
}

impl SfntLibrary {
    pub fn init() -> Result<Self, FaceError> {
        debug!("sfnt library initialized");
        Ok(Self::default())
    }

    fn open(&mut self, data: FontData, index: u32) -> Result<SfntFace, FaceError> {
        if data.is_empty() {
            return Err(FaceError::Malformed("empty font data".into()));
        }
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        if index >= count {
            return Err(FaceError::IndexOutOfRange { index, count });
        }
        let face = SfntFace::new(data, index)?;
        self.faces_opened += 1;
        trace!("opened face {} ({} so far)", face.info.family_name, self.faces_opened);
        Ok(face)
    }
}

impl FontLibrary for SfntLibrary {
    type Face = SfntFace;

    fn new_face_from_memory(
        &mut self,
        data: FontData,
        index: u32,
    ) -> Result<SfntFace, FaceError> {
        self.open(data, index)
    }

    fn new_face_from_path(&mut self, path: &Path, index: u32) -> Result<SfntFace, FaceError> {
        let bytes = std::fs::read(path).map_err(|source| FaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.open(bytes.into(), index)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
struct HintKey {
    ppem_bits: u32,
    target: LoadTarget,
    autohint: bool,
}

impl HintKey {
    fn options(&self) -> HintingOptions {
        let smooth = |mode| Target::Smooth {
            mode,
            symmetric_rendering: true,
            preserve_linear_metrics: false,
        };
        HintingOptions {
            engine: if self.autohint {
                Engine::Auto(None)
            } else {
                Engine::AutoFallback
            },
            target: match self.target {
                LoadTarget::Mono => Target::Mono,
                LoadTarget::Normal => smooth(SmoothMode::Normal),
                LoadTarget::Light => smooth(SmoothMode::Light),
                LoadTarget::Lcd => smooth(SmoothMode::Lcd),
                LoadTarget::LcdV => smooth(SmoothMode::VerticalLcd),
            },
        }
    }
}

struct HintingEntry {
    key: HintKey,
    instance: HintingInstance,
    serial: u64,
}

#[derive(Default)]
struct HintingCache {
    entries: Vec<HintingEntry>,
    serial: u64,
}

impl HintingCache {
    fn get(
        &mut self,
        outlines: &OutlineGlyphCollection,
        key: HintKey,
    ) -> Option<&HintingInstance> {
        let size = Size::new(f32::from_bits(key.ppem_bits));
        self.serial += 1;
        if let Some(ix) = self.entries.iter().position(|e| e.key == key) {
            let entry = &mut self.entries[ix];
            entry.serial = self.serial;
            return Some(&entry.instance);
        }

        debug!("hinting instance miss for size {:?}", size);
        if self.entries.len() < MAX_CACHED_HINT_INSTANCES {
            let instance =
                HintingInstance::new(outlines, size, LocationRef::default(), key.options())
                    .ok()?;
            self.entries.push(HintingEntry {
                key,
                instance,
                serial: self.serial,
            });
            return self.entries.last().map(|e| &e.instance);
        }

        let oldest = self.entries.iter_mut().min_by_key(|e| e.serial)?;
        oldest
            .instance
            .reconfigure(outlines, size, LocationRef::default(), key.options())
            .ok()?;
        oldest.key = key;
        oldest.serial = self.serial;
        Some(&oldest.instance)
    }
}

/// Collects skrifa pen output as a tagged 26.6 outline.
struct OutlineCollector {
    outline: Outline,
    scale_x: f32,
    contour_start: Option<usize>,
}

impl OutlineCollector {
    fn new(scale_x: f32) -> Self {
        Self {
            outline: Outline::new(),
            scale_x,
            contour_start: None,
        }
    }

    fn push(&mut self, x: f32, y: f32, tag: u8) {
        self.outline.points.push(Vector::new(
            (x * self.scale_x * 64.).round() as i32,
            (y * 64.).round() as i32,
        ));
        self.outline.tags.push(tag);
    }

    fn finish_contour(&mut self) {
        let Some(start) = self.contour_start.take() else {
            return;
        };
        let points = &mut self.outline.points;
        let tags = &mut self.outline.tags;
        // A closing point that repeats the start is implied by the contour.
        if points.len() > start + 1
            && points.last() == points.get(start)
            && tags.last() == Some(&TAG_ON)
        {
            points.pop();
            tags.pop();
        }
        if points.len() > start {
            self.outline.contours.push(points.len() - 1);
        }
    }

    fn finish(mut self) -> Outline {
        self.finish_contour();
        self.outline
    }
}

impl OutlinePen for OutlineCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.finish_contour();
        self.contour_start = Some(self.outline.points.len());
        self.push(x, y, TAG_ON);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push(x, y, TAG_ON);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.push(cx0, cy0, TAG_CONIC);
        self.push(x, y, TAG_ON);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.push(cx0, cy0, TAG_CUBIC);
        self.push(cx1, cy1, TAG_CUBIC);
        self.push(x, y, TAG_ON);
    }

    fn close(&mut self) {
        self.finish_contour();
    }
}

/// Maps a skrifa draw failure onto the load errors the hint cascade acts on.
///
/// skrifa does not export the interpreter's fault kind, so every hinting
/// failure is treated as runaway bytecode and the face moves to the autohinter.
fn classify_draw_error(err: DrawError) -> LoadError {
    match err {
        DrawError::HintingFailed(fault) => {
            debug!("hinting interpreter fault: {fault}");
            LoadError::ExecutionTooLong
        }
        DrawError::GlyphNotFound(glyph) => LoadError::InvalidGlyph(glyph.to_u32()),
        err => LoadError::Other(err.to_string()),
    }
}

/// A face parsed from SFNT data (TrueType, OpenType, collections).
pub struct SfntFace {
    data: FontData,
    index: u32,
    info: FaceInfo,
    /// cmap subtable index behind every entry of `info.charmaps`.
    charmap_subtables: Vec<u16>,
    charmap: usize,
    /// Code point to glyph for the selected charmap.
    cmap: FxHashMap<u32, GlyphId>,
    /// hmtx advances in font units, by glyph id.
    advances: Box<[u16]>,
    char_size: (i32, i32),
    size_metrics: SizeMetrics,
    matrix: FixedMatrix,
    delta: Vector,
    hinting: HintingCache,
}

impl SfntFace {
    fn new(data: FontData, index: u32) -> Result<Self, FaceError> {
        let face = ttf_parser::Face::parse(&data, index)
            .map_err(|err| FaceError::Malformed(err.to_string()))?;
        let font = skrifa::FontRef::from_index(&data, index)
            .map_err(|err| FaceError::Malformed(err.to_string()))?;

        let name = |id: u16| {
            face.names()
                .into_iter()
                .filter(|n| n.name_id == id)
                .find_map(|n| n.to_string())
        };

        let mut charmaps = Vec::new();
        let mut charmap_subtables = Vec::new();
        if let Some(table) = face.tables().cmap {
            for (i, subtable) in table.subtables.into_iter().enumerate() {
                charmaps.push(encoding_of(&subtable));
                charmap_subtables.push(i as u16);
            }
        }
        let charmap = charmaps
            .iter()
            .position(|e| *e == CharmapEncoding::Unicode)
            .unwrap_or(0);
        let cmap = charmap_subtables
            .get(charmap)
            .map(|&subtable| read_charmap(&face, subtable))
            .unwrap_or_default();
        let advances = (0..face.number_of_glyphs())
            .map(|id| face.glyph_hor_advance(ttf_parser::GlyphId(id)).unwrap_or(0))
            .collect();

        let is_scalable = font.outline_glyphs().format().is_some();
        let bbox = face.global_bounding_box();
        let underline = face.underline_metrics();
        let max_advance_width = font
            .metrics(Size::unscaled(), LocationRef::default())
            .max_width
            .map(|w| w.round() as u16)
            .unwrap_or(0);

        let info = FaceInfo {
            family_name: name(name_id::FAMILY).unwrap_or_default(),
            style_name: name(name_id::SUBFAMILY).unwrap_or_default(),
            postscript_name: name(name_id::POST_SCRIPT_NAME),
            is_scalable,
            is_fixed_width: face.is_monospaced(),
            is_bold: face.is_bold(),
            is_italic: face.is_italic() || face.is_oblique(),
            has_ps_font_info: false,
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            height: face.height(),
            max_advance_width,
            underline_position: underline.map(|m| m.position).unwrap_or(0),
            underline_thickness: underline.map(|m| m.thickness).unwrap_or(0),
            bbox: FontBox {
                x_min: bbox.x_min,
                y_min: bbox.y_min,
                x_max: bbox.x_max,
                y_max: bbox.y_max,
            },
            num_glyphs: face.number_of_glyphs() as u32,
            fixed_sizes: strike_sizes(&face),
            charmaps,
        };

        Ok(Self {
            data,
            index,
            info,
            charmap_subtables,
            charmap,
            cmap,
            advances,
            char_size: (0, 0),
            size_metrics: SizeMetrics::default(),
            matrix: FixedMatrix::IDENTITY,
            delta: Vector::ZERO,
            hinting: HintingCache::default(),
        })
    }

    fn parse(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.index).ok()
    }

    #[inline]
    fn design_advance(&self, glyph: GlyphId) -> i32 {
        self.advances.get(glyph as usize).copied().map(i32::from).unwrap_or(0)
    }

    fn load_bitmap(&self, glyph: GlyphId) -> Option<GlyphSlot> {
        let face = self.parse()?;
        let ppem = self.size_metrics.y_ppem;
        let image = face.glyph_raster_image(ttf_parser::GlyphId(glyph as u16), ppem)?;
        if image.pixels_per_em != ppem {
            return None;
        }
        let (width, rows) = (image.width as u32, image.height as u32);
        let bitmap = match image.format {
            RasterImageFormat::BitmapMono => {
                let pitch = (width as usize + 7) / 8;
                let mut bitmap = Bitmap::new(width, rows, pitch, PixelMode::Mono);
                let len = bitmap.buffer.len().min(image.data.len());
                bitmap.buffer[..len].copy_from_slice(&image.data[..len]);
                bitmap
            }
            RasterImageFormat::BitmapMonoPacked => {
                let pitch = (width as usize + 7) / 8;
                let mut bitmap = Bitmap::new(width, rows, pitch, PixelMode::Mono);
                for y in 0..rows as usize {
                    for x in 0..width as usize {
                        let bit = y * width as usize + x;
                        let set = image
                            .data
                            .get(bit >> 3)
                            .is_some_and(|b| b & (0x80 >> (bit & 7)) != 0);
                        if set {
                            bitmap.buffer[y * pitch + (x >> 3)] |= 0x80 >> (x & 7);
                        }
                    }
                }
                bitmap
            }
            RasterImageFormat::BitmapGray8 => {
                let mut bitmap = Bitmap::new(width, rows, width as usize, PixelMode::Gray);
                let len = bitmap.buffer.len().min(image.data.len());
                bitmap.buffer[..len].copy_from_slice(&image.data[..len]);
                bitmap
            }
            _ => return None,
        };

        let left = image.x as i32;
        let top = image.y as i32 + image.height as i32;
        let upem = self.info.units_per_em.max(1) as i32;
        let advance = round(mul_div(self.design_advance(glyph), ppem as i32 * 64, upem));
        Some(GlyphSlot {
            metrics: SlotMetrics {
                width: width as i32 * 64,
                height: rows as i32 * 64,
                hori_bearing_x: left * 64,
                hori_bearing_y: top * 64,
                hori_advance: advance,
            },
            advance: Vector::new(advance, 0),
            linear_hori_advance: advance << 10,
            image: SlotImage::Bitmap { bitmap, left, top },
        })
    }

    fn load_outline(
        &mut self,
        glyph: GlyphId,
        options: LoadOptions,
    ) -> Result<GlyphSlot, LoadError> {
        let font = skrifa::FontRef::from_index(&self.data, self.index)
            .map_err(|err| LoadError::Other(err.to_string()))?;
        let outlines = font.outline_glyphs();
        let outline_glyph = outlines
            .get(skrifa::GlyphId::new(glyph))
            .ok_or(LoadError::InvalidGlyph(glyph))?;

        let (width, height) = self.char_size;
        let ppem = height as f32 / 64.;
        let scale_x = if height != 0 { width as f32 / height as f32 } else { 1. };
        let hinted = !options.flags.contains(LoadFlags::NO_HINTING);

        let mut pen = OutlineCollector::new(scale_x);
        let instance = if hinted {
            let key = HintKey {
                ppem_bits: ppem.to_bits(),
                target: options.target,
                autohint: options.flags.contains(LoadFlags::FORCE_AUTOHINT),
            };
            self.hinting.get(&outlines, key)
        } else {
            None
        };
        let grid_fitted = instance.is_some();
        let settings: DrawSettings = match instance {
            Some(instance) => instance.into(),
            None => (Size::new(ppem), LocationRef::default()).into(),
        };
        let adjusted = outline_glyph
            .draw(settings, &mut pen)
            .map_err(classify_draw_error)?;
        let mut outline = pen.finish();

        let upem = self.info.units_per_em.max(1) as i32;
        let linear = mul_div(self.design_advance(glyph), width, upem);
        let mut advance = adjusted
            .advance_width
            .map(|w| (w * scale_x * 64.).round() as i32)
            .unwrap_or(linear);

        let (x_min, y_min, x_max, y_max) = outline.control_box();
        let mut metrics = SlotMetrics {
            width: x_max - x_min,
            height: y_max - y_min,
            hori_bearing_x: x_min,
            hori_bearing_y: y_max,
            hori_advance: advance,
        };
        if grid_fitted {
            let (left, right) = (floor(x_min), ceil(x_max));
            let (bottom, top) = (floor(y_min), ceil(y_max));
            advance = round(advance);
            metrics = SlotMetrics {
                width: right - left,
                height: top - bottom,
                hori_bearing_x: left,
                hori_bearing_y: top,
                hori_advance: advance,
            };
        }

        outline.transform(&self.matrix);
        outline.translate(self.delta.x, self.delta.y);
        Ok(GlyphSlot {
            metrics,
            advance: self.matrix.transform(Vector::new(advance, 0)),
            linear_hori_advance: linear << 10,
            image: SlotImage::Outline(outline),
        })
    }
}

impl NativeFace for SfntFace {
    fn info(&self) -> &FaceInfo {
        &self.info
    }

    fn set_char_size(&mut self, width: i32, height: i32) -> Result<(), LoadError> {
        if width <= 0 || height <= 0 {
            return Err(LoadError::Other(format!("invalid char size {width}x{height}")));
        }
        let metrics = SizeMetrics::for_char_size(&self.info, width, height)
            .ok_or_else(|| LoadError::Other("no strike at this size".into()))?;
        self.char_size = (width, height);
        self.size_metrics = metrics;
        Ok(())
    }

    fn size_metrics(&self) -> SizeMetrics {
        self.size_metrics
    }

    fn set_transform(&mut self, matrix: FixedMatrix, delta: Vector) {
        self.matrix = matrix;
        self.delta = delta;
    }

    fn load_glyph(
        &mut self,
        glyph: GlyphId,
        options: LoadOptions,
    ) -> Result<GlyphSlot, LoadError> {
        if glyph >= self.info.num_glyphs {
            return Err(LoadError::InvalidGlyph(glyph));
        }
        let bitmaps_allowed =
            !options.flags.contains(LoadFlags::NO_BITMAP) || !self.info.is_scalable;
        if bitmaps_allowed && !self.info.fixed_sizes.is_empty() {
            if let Some(slot) = self.load_bitmap(glyph) {
                return Ok(slot);
            }
        }
        if !self.info.is_scalable {
            return Err(LoadError::UnsupportedFormat);
        }
        self.load_outline(glyph, options)
    }

    fn char_index(&self, codepoint: u32) -> GlyphId {
        self.cmap.get(&codepoint).copied().unwrap_or(0)
    }

    fn set_charmap(&mut self, index: usize) -> bool {
        let Some(&subtable) = self.charmap_subtables.get(index) else {
            return false;
        };
        if index != self.charmap {
            self.cmap = self
                .parse()
                .map(|face| read_charmap(&face, subtable))
                .unwrap_or_default();
            self.charmap = index;
        }
        true
    }

    fn sfnt_table(&self, tag: [u8; 4]) -> Option<Vec<u8>> {
        let face = self.parse()?;
        face.raw_face().table(Tag::from_bytes(&tag)).map(|data| data.to_vec())
    }
}

/// Every mapped code point of one cmap subtable.
fn read_charmap(face: &ttf_parser::Face, subtable: u16) -> FxHashMap<u32, GlyphId> {
    let mut map = FxHashMap::default();
    let Some(subtable) = face.tables().cmap.and_then(|cmap| cmap.subtables.get(subtable)) else {
        return map;
    };
    subtable.codepoints(|codepoint| {
        if let Some(glyph) = subtable.glyph_index(codepoint).filter(|g| g.0 != 0) {
            map.insert(codepoint, glyph.0 as GlyphId);
        }
    });
    map
}

fn encoding_of(subtable: &cmap::Subtable) -> CharmapEncoding {
    match (subtable.platform_id, subtable.encoding_id) {
        (PlatformId::Windows, 0) => CharmapEncoding::MsSymbol,
        (PlatformId::Macintosh, 0) => CharmapEncoding::AppleRoman,
        _ if subtable.is_unicode() => CharmapEncoding::Unicode,
        _ => CharmapEncoding::Other,
    }
}

/// Reads the strike list from the EBLC or CBLC table.
fn strike_sizes(face: &ttf_parser::Face) -> Vec<StrikeSize> {
    let raw = face.raw_face();
    let Some(table) = raw
        .table(Tag::from_bytes(b"EBLC"))
        .or_else(|| raw.table(Tag::from_bytes(b"CBLC")))
    else {
        return Vec::new();
    };
    let count = table
        .get(4..8)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0) as usize;

    let mut sizes = Vec::new();
    for i in 0..count {
        let Some(record) = table.get(8 + i * 48..8 + (i + 1) * 48) else {
            break;
        };
        sizes.push(StrikeSize {
            x_ppem: record[44] as i32 * 64,
            y_ppem: record[45] as i32 * 64,
            ascender: record[16] as i8 as i32,
            descender: record[17] as i8 as i32,
        });
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_error_classification() {
        assert_eq!(
            classify_draw_error(DrawError::GlyphNotFound(skrifa::GlyphId::new(7))),
            LoadError::InvalidGlyph(7)
        );
        let memory = DrawError::InsufficientMemory;
        let message = memory.to_string();
        assert_eq!(classify_draw_error(memory), LoadError::Other(message));
        assert!(matches!(
            classify_draw_error(DrawError::TooManyPoints(skrifa::GlyphId::new(3))),
            LoadError::Other(_)
        ));
        assert!(matches!(
            classify_draw_error(DrawError::NoSources),
            LoadError::Other(_)
        ));
    }

    #[test]
    fn test_collector_drops_repeated_start() {
        let mut pen = OutlineCollector::new(1.);
        pen.move_to(0., 0.);
        pen.line_to(1., 0.);
        pen.quad_to(1., 1., 0., 1.);
        pen.line_to(0., 0.);
        pen.close();
        pen.move_to(5., 5.);
        let outline = pen.finish();
        assert_eq!(outline.points.len(), 5);
        assert_eq!(outline.tags, vec![TAG_ON, TAG_ON, TAG_CONIC, TAG_ON, TAG_ON]);
        assert_eq!(outline.contours, vec![3, 4]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let mut library = SfntLibrary::init().unwrap();
        let result = library.new_face_from_memory(vec![1u8, 2, 3].into(), 0);
        assert!(result.is_err());
        let result = library.new_face_from_memory(Vec::<u8>::new().into(), 0);
        assert!(matches!(result, Err(FaceError::Malformed(_))));
    }
}
