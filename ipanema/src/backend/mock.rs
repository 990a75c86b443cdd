//! Scripted backend for tests.
//!
//! Faces draw every glyph as a box and record each session call in a shared
//! journal. Load faults can be queued per glyph; each load of that glyph pops
//! the next one.

use super::*;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const MOCK_UPEM: u16 = 1000;
pub const MOCK_GLYPHS: u32 = 300;
/// Glyph drawn for U+0020.
pub const MOCK_SPACE: GlyphId = 3;
pub const MOCK_ADVANCE: i32 = 600;

pub type SharedJournal = Rc<RefCell<MockJournal>>;

#[derive(Debug, Default)]
pub struct MockJournal {
    pub char_sizes: Vec<(i32, i32)>,
    pub transforms: Vec<(FixedMatrix, Vector)>,
    pub loads: Vec<(GlyphId, LoadOptions)>,
    pub faces_opened: usize,
    pub libraries_dropped: usize,
    faults: FxHashMap<GlyphId, VecDeque<LoadError>>,
}

impl MockJournal {
    pub fn shared() -> SharedJournal {
        Rc::new(RefCell::new(MockJournal::default()))
    }

    /// Queues `errors` for the next loads of `glyph`.
    pub fn fail(&mut self, glyph: GlyphId, errors: Vec<LoadError>) {
        self.faults.entry(glyph).or_default().extend(errors);
    }

    pub fn loads_of(&self, glyph: GlyphId) -> Vec<LoadOptions> {
        self.loads
            .iter()
            .filter(|(g, _)| *g == glyph)
            .map(|(_, options)| *options)
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.char_sizes.clear();
        self.transforms.clear();
        self.loads.clear();
    }
}

pub fn scalable_info() -> FaceInfo {
    FaceInfo {
        family_name: "Mock".into(),
        style_name: "Regular".into(),
        postscript_name: Some("Mock-Regular".into()),
        is_scalable: true,
        units_per_em: MOCK_UPEM,
        ascender: 800,
        descender: -200,
        height: 1100,
        max_advance_width: 700,
        underline_position: -100,
        underline_thickness: 50,
        bbox: FontBox {
            x_min: 0,
            y_min: -200,
            x_max: 700,
            y_max: 800,
        },
        num_glyphs: MOCK_GLYPHS,
        charmaps: vec![CharmapEncoding::Unicode],
        ..FaceInfo::default()
    }
}

/// A bitmap-only face with a single 13px strike.
pub fn strike_info() -> FaceInfo {
    FaceInfo {
        is_scalable: false,
        fixed_sizes: vec![StrikeSize {
            x_ppem: 13 * 64,
            y_ppem: 13 * 64,
            ascender: 11,
            descender: -2,
        }],
        ..scalable_info()
    }
}

pub struct MockLibrary {
    journal: SharedJournal,
    info: FaceInfo,
    tables: FxHashMap<[u8; 4], Vec<u8>>,
}

impl MockLibrary {
    pub fn new(journal: SharedJournal) -> Self {
        Self::with_info(journal, scalable_info())
    }

    pub fn with_info(journal: SharedJournal, info: FaceInfo) -> Self {
        Self {
            journal,
            info,
            tables: FxHashMap::default(),
        }
    }

    pub fn with_table(mut self, tag: [u8; 4], data: Vec<u8>) -> Self {
        self.tables.insert(tag, data);
        self
    }

    fn open(&mut self, index: u32) -> Result<MockFace, FaceError> {
        if index > 0 {
            return Err(FaceError::IndexOutOfRange { index, count: 1 });
        }
        self.journal.borrow_mut().faces_opened += 1;
        let mut face = MockFace::with_info(self.journal.clone(), self.info.clone());
        face.tables = self.tables.clone();
        Ok(face)
    }
}

impl Drop for MockLibrary {
    fn drop(&mut self) {
        self.journal.borrow_mut().libraries_dropped += 1;
    }
}

impl FontLibrary for MockLibrary {
    type Face = MockFace;

    fn new_face_from_memory(
        &mut self,
        data: FontData,
        index: u32,
    ) -> Result<MockFace, FaceError> {
        if data.is_empty() {
            return Err(FaceError::Malformed("empty font data".into()));
        }
        self.open(index)
    }

    fn new_face_from_path(&mut self, _path: &Path, index: u32) -> Result<MockFace, FaceError> {
        self.open(index)
    }
}

pub struct MockFace {
    journal: SharedJournal,
    info: FaceInfo,
    tables: FxHashMap<[u8; 4], Vec<u8>>,
    char_size: (i32, i32),
    matrix: FixedMatrix,
    delta: Vector,
    charmap: usize,
}

impl MockFace {
    pub fn scalable(journal: SharedJournal) -> Self {
        Self::with_info(journal, scalable_info())
    }

    pub fn with_info(journal: SharedJournal, info: FaceInfo) -> Self {
        Self {
            journal,
            info,
            tables: FxHashMap::default(),
            char_size: (0, 0),
            matrix: FixedMatrix::IDENTITY,
            delta: Vector::ZERO,
            charmap: 0,
        }
    }

    pub fn fail(&mut self, glyph: GlyphId, errors: Vec<LoadError>) {
        self.journal.borrow_mut().fail(glyph, errors);
    }

    fn units(&self, value: i32, size: i32) -> i32 {
        crate::fixed::mul_div(value, size, self.info.units_per_em.max(1) as i32)
    }

    fn outline_slot(&self, glyph: GlyphId) -> GlyphSlot {
        let (w, h) = self.char_size;
        let advance = self.units(MOCK_ADVANCE, w);
        let mut outline = Outline::new();
        if glyph != MOCK_SPACE {
            let (x0, y0) = (self.units(100, w), 0);
            let (x1, y1) = (self.units(500, w), self.units(700, h));
            outline.points = vec![
                Vector::new(x0, y0),
                Vector::new(x0, y1),
                Vector::new(x1, y1),
                Vector::new(x1, y0),
            ];
            outline.tags = vec![TAG_ON; 4];
            outline.contours = vec![3];
        }
        let (x0, y0, x1, y1) = outline.control_box();
        let metrics = SlotMetrics {
            width: x1 - x0,
            height: y1 - y0,
            hori_bearing_x: x0,
            hori_bearing_y: y1,
            hori_advance: advance,
        };

        outline.transform(&self.matrix);
        outline.translate(self.delta.x, self.delta.y);
        GlyphSlot {
            metrics,
            advance: self.matrix.transform(Vector::new(advance, 0)),
            linear_hori_advance: advance << 10,
            image: SlotImage::Outline(outline),
        }
    }

    fn bitmap_slot(&self) -> GlyphSlot {
        let mut bitmap = Bitmap::new(6, 10, 4, PixelMode::Mono);
        for y in 0..10 {
            bitmap.buffer[y * 4] = 0b1111_1100;
        }
        GlyphSlot {
            metrics: SlotMetrics {
                width: 6 * 64,
                height: 10 * 64,
                hori_bearing_x: 64,
                hori_bearing_y: 10 * 64,
                hori_advance: 8 * 64,
            },
            advance: Vector::new(8 * 64, 0),
            linear_hori_advance: 8 << 16,
            image: SlotImage::Bitmap {
                bitmap,
                left: 1,
                top: 10,
            },
        }
    }
}

impl NativeFace for MockFace {
    fn info(&self) -> &FaceInfo {
        &self.info
    }

    fn set_char_size(&mut self, width: i32, height: i32) -> Result<(), LoadError> {
        self.journal.borrow_mut().char_sizes.push((width, height));
        if SizeMetrics::for_char_size(&self.info, width, height).is_none() {
            return Err(LoadError::Other("no strike at this size".into()));
        }
        self.char_size = (width, height);
        Ok(())
    }

    fn size_metrics(&self) -> SizeMetrics {
        SizeMetrics::for_char_size(&self.info, self.char_size.0, self.char_size.1)
            .unwrap_or_default()
    }

    fn set_transform(&mut self, matrix: FixedMatrix, delta: Vector) {
        self.journal.borrow_mut().transforms.push((matrix, delta));
        self.matrix = matrix;
        self.delta = delta;
    }

    fn load_glyph(
        &mut self,
        glyph: GlyphId,
        options: LoadOptions,
    ) -> Result<GlyphSlot, LoadError> {
        let fault = {
            let mut journal = self.journal.borrow_mut();
            journal.loads.push((glyph, options));
            journal.faults.get_mut(&glyph).and_then(|queue| queue.pop_front())
        };
        if let Some(err) = fault {
            return Err(err);
        }
        if glyph >= self.info.num_glyphs {
            return Err(LoadError::InvalidGlyph(glyph));
        }
        if self.info.is_scalable {
            Ok(self.outline_slot(glyph))
        } else {
            Ok(self.bitmap_slot())
        }
    }

    fn char_index(&self, codepoint: u32) -> GlyphId {
        let base = match self.info.charmaps.get(self.charmap) {
            Some(CharmapEncoding::Unicode) => 0,
            Some(CharmapEncoding::MsSymbol) => 0xf000,
            _ => return 0,
        };
        match codepoint.checked_sub(base) {
            Some(c @ 0x20..=0x7e) => c - 0x20 + MOCK_SPACE,
            _ => 0,
        }
    }

    fn set_charmap(&mut self, index: usize) -> bool {
        if index < self.info.charmaps.len() {
            self.charmap = index;
            true
        } else {
            false
        }
    }

    fn sfnt_table(&self, tag: [u8; 4]) -> Option<Vec<u8>> {
        self.tables.get(&tag).cloned()
    }
}
