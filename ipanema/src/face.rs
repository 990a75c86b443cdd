//! Faces and the per-thread face registry.
//!
//! A [`Face`] wraps one native face together with the session state the
//! engine must not reset needlessly: the applied char size and transform.
//! Faces are shared by every engine built on the same [`FaceId`] and live in
//! a [`FaceRegistry`], which also owns the library instance. The registry is
//! `!Send`; each rendering thread keeps its own.

use crate::backend::{
    CharmapEncoding, FontData, FontLibrary, GlyphId, LoadOptions, NativeFace, SfntLibrary,
};
use crate::error::{FaceError, LoadError};
use crate::fixed::{Fixed, FixedMatrix, Vector};
use crate::hint::{Fault, FaultLog};
use crate::path::PathRect;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Code points below this resolve through a direct table.
pub const CMAP_CACHE_SIZE: usize = 0x200;

const NO_BREAK_SPACE: u32 = 0xa0;
const TAB: u32 = 0x09;
const SPACE: u32 = 0x20;

static NEXT_BLOB_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory font data with a process-unique identity.
///
/// Two blobs are the same face source only if one is a clone of the other,
/// whatever their bytes.
#[derive(Clone)]
pub struct FontBlob {
    id: u64,
    data: FontData,
}

impl FontBlob {
    pub fn new(data: impl Into<FontData>) -> Self {
        Self {
            id: NEXT_BLOB_ID.fetch_add(1, Ordering::Relaxed),
            data: data.into(),
        }
    }

    #[inline]
    pub fn data(&self) -> &FontData {
        &self.data
    }
}

impl PartialEq for FontBlob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FontBlob {}

impl Hash for FontBlob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for FontBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBlob")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaceSource {
    File(PathBuf),
    Memory(FontBlob),
}

/// Identity of a face: where it comes from and which face of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FaceId {
    pub source: FaceSource,
    pub index: u32,
}

impl FaceId {
    pub fn file(path: impl Into<PathBuf>, index: u32) -> Self {
        Self {
            source: FaceSource::File(path.into()),
            index,
        }
    }

    pub fn memory(blob: FontBlob, index: u32) -> Self {
        Self {
            source: FaceSource::Memory(blob),
            index,
        }
    }

    fn is_empty(&self) -> bool {
        match &self.source {
            FaceSource::File(path) => path.as_os_str().is_empty(),
            FaceSource::Memory(blob) => blob.data.is_empty(),
        }
    }
}

/// The OS/2 fields the engine reads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Os2 {
    pub avg_char_width: i16,
    pub weight_class: u16,
    pub fs_type: u16,
    /// Only present from table version 2 on.
    pub x_height: Option<i16>,
}

impl Os2 {
    pub fn parse(data: &[u8]) -> Option<Os2> {
        let u16_at = |offset: usize| {
            data.get(offset..offset + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
        };
        let version = u16_at(0)?;
        Some(Os2 {
            avg_char_width: u16_at(2)? as i16,
            weight_class: u16_at(4)?,
            fs_type: u16_at(8)?,
            x_height: if version >= 2 {
                u16_at(86).map(|v| v as i16)
            } else {
                None
            },
        })
    }
}

/// Face-wide metrics, in font units for scalable faces and in 26.6 pixels
/// for strike-only faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceProperties {
    pub postscript_name: String,
    pub ascent: Fixed,
    pub descent: Fixed,
    pub leading: Fixed,
    pub em_square: Fixed,
    pub cap_height: Fixed,
    pub line_width: Fixed,
    pub italic_angle: Fixed,
    /// y pointing down.
    pub bounding_box: PathRect,
}

/// One point of a loaded outline, see [`Face::point_in_outline`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutlinePoint {
    /// 26.6, y pointing up. `None` when the outline has no points.
    pub position: Option<Vector>,
    pub point_count: usize,
}

pub struct Face<F: NativeFace> {
    native: F,
    id: FaceId,
    refs: usize,
    char_size: Option<(i32, i32)>,
    transform: Option<(FixedMatrix, Vector)>,
    unicode_map: Option<usize>,
    symbol_map: Option<usize>,
    cmap_cache: Box<[GlyphId; CMAP_CACHE_SIZE]>,
    faults: FaultLog,
    os2: Option<Os2>,
}

impl<F: NativeFace> Face<F> {
    pub fn new(id: FaceId, native: F) -> Self {
        let mut unicode_map = None;
        let mut symbol_map = None;
        let mut has_unicode = false;
        for (i, encoding) in native.info().charmaps.iter().enumerate() {
            match encoding {
                CharmapEncoding::Unicode => {
                    unicode_map = Some(i);
                    has_unicode = true;
                }
                CharmapEncoding::AppleRoman | CharmapEncoding::AdobeLatin1 => {
                    if !has_unicode {
                        unicode_map = Some(i);
                    }
                }
                CharmapEncoding::AdobeCustom | CharmapEncoding::MsSymbol => {
                    symbol_map.get_or_insert(i);
                }
                CharmapEncoding::Other => {}
            }
        }

        let os2 = native
            .sfnt_table(*b"OS/2")
            .and_then(|data| Os2::parse(&data));

        let mut face = Face {
            native,
            id,
            refs: 1,
            char_size: None,
            transform: None,
            unicode_map,
            symbol_map,
            cmap_cache: Box::new([0; CMAP_CACHE_SIZE]),
            faults: FaultLog::default(),
            os2,
        };

        let info = face.native.info();
        if !info.is_scalable && info.fixed_sizes.len() == 1 {
            let strike = info.fixed_sizes[0];
            face.set_char_size(strike.x_ppem, strike.y_ppem);
        }
        if let Some(map) = face.unicode_map {
            face.native.set_charmap(map);
        }
        face
    }

    #[inline]
    pub fn id(&self) -> &FaceId {
        &self.id
    }

    #[inline]
    pub fn native(&self) -> &F {
        &self.native
    }

    #[inline]
    pub fn refs(&self) -> usize {
        self.refs
    }

    #[inline]
    pub fn has_symbol_map(&self) -> bool {
        self.symbol_map.is_some()
    }

    #[inline]
    pub fn os2(&self) -> Option<&Os2> {
        self.os2.as_ref()
    }

    #[inline]
    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    /// Logs `fault` unless this face already reported it.
    #[inline]
    pub fn report_fault(&mut self, fault: Fault, glyph: GlyphId) -> bool {
        self.faults.report(fault, glyph)
    }

    /// Char size currently applied to the native face, if any.
    #[inline]
    pub fn char_size(&self) -> Option<(i32, i32)> {
        self.char_size
    }

    fn set_char_size(&mut self, width: i32, height: i32) {
        match self.native.set_char_size(width, height) {
            Ok(()) => self.char_size = Some((width, height)),
            Err(err) => {
                debug!("char size {width}x{height} rejected: {err}");
                self.char_size = None;
            }
        }
    }

    /// Runs `body` with the given char size and transform applied to the
    /// native face. Either is only pushed down when it differs from what the
    /// face already holds.
    pub fn with_char_size_and_transform<R>(
        &mut self,
        size: (i32, i32),
        matrix: FixedMatrix,
        delta: Vector,
        body: impl FnOnce(&mut F, &mut FaultLog) -> R,
    ) -> R {
        if self.char_size != Some(size) {
            self.set_char_size(size.0, size.1);
        }
        if self.transform != Some((matrix, delta)) {
            self.native.set_transform(matrix, delta);
            self.transform = Some((matrix, delta));
        }
        body(&mut self.native, &mut self.faults)
    }

    /// Maps a code point to a glyph.
    ///
    /// No-break space and tab fall back to the space glyph. Other unmapped
    /// code points are retried through the symbol map when the face has one.
    pub fn glyph_index(&mut self, codepoint: u32) -> GlyphId {
        let cached = (codepoint as usize) < CMAP_CACHE_SIZE;
        if cached {
            let glyph = self.cmap_cache[codepoint as usize];
            if glyph != 0 {
                return glyph;
            }
        }

        let mut glyph = self.native.char_index(codepoint);
        if glyph == 0 {
            if codepoint == NO_BREAK_SPACE || codepoint == TAB {
                glyph = self.native.char_index(SPACE);
            } else if let Some(symbol_map) = self.symbol_map {
                self.native.set_charmap(symbol_map);
                glyph = self.native.char_index(codepoint);
                if let Some(unicode_map) = self.unicode_map {
                    self.native.set_charmap(unicode_map);
                }
            }
        }

        if cached {
            self.cmap_cache[codepoint as usize] = glyph;
        }
        glyph
    }

    pub fn properties(&self) -> FaceProperties {
        let info = self.native.info();
        let postscript_name = info
            .postscript_name
            .clone()
            .unwrap_or_else(|| postscript_family_name(&info.family_name));

        let (ascent, descent, leading, em_square, bounding_box) = if info.is_scalable {
            let bbox = info.bbox;
            (
                Fixed::from_int(info.ascender as i32),
                Fixed::from_int(-(info.descender as i32)),
                Fixed::from_int(
                    info.height as i32 - info.ascender as i32 + info.descender as i32,
                ),
                Fixed::from_int(info.units_per_em as i32),
                PathRect {
                    x: bbox.x_min as f32,
                    y: -(bbox.y_max as f32),
                    width: (bbox.x_max as i32 - bbox.x_min as i32) as f32,
                    height: (bbox.y_max as i32 - bbox.y_min as i32) as f32,
                },
            )
        } else {
            let m = self.native.size_metrics();
            let ascent = Fixed::from_bits(m.ascender);
            let descent = Fixed::from_bits(-m.descender);
            (
                ascent,
                descent,
                Fixed::from_bits(m.height - m.ascender + m.descender),
                Fixed::from_int(m.y_ppem as i32),
                PathRect {
                    x: 0.,
                    y: -ascent.to_f32(),
                    width: (m.max_advance / 64) as f32,
                    height: (ascent + descent).to_f32(),
                },
            )
        };

        FaceProperties {
            postscript_name,
            ascent,
            descent,
            leading,
            em_square,
            cap_height: ascent,
            line_width: Fixed::from_int(info.underline_thickness as i32),
            italic_angle: Fixed::ZERO,
            bounding_box,
        }
    }

    /// OS/2 embedding permissions, 0 when the table is absent.
    #[inline]
    pub fn fs_type(&self) -> u16 {
        self.os2.map(|os2| os2.fs_type).unwrap_or(0)
    }

    /// Loads `glyph` with `options` at the current session state and returns
    /// point `point` of its outline.
    pub fn point_in_outline(
        &mut self,
        glyph: GlyphId,
        options: LoadOptions,
        point: usize,
    ) -> Result<OutlinePoint, LoadError> {
        let slot = self.native.load_glyph(glyph, options)?;
        let outline = slot.outline().ok_or(LoadError::UnsupportedFormat)?;
        let point_count = outline.points.len();
        if point_count == 0 {
            return Ok(OutlinePoint {
                position: None,
                point_count,
            });
        }
        let position = outline
            .points
            .get(point)
            .copied()
            .ok_or_else(|| LoadError::Other(format!("point {point} out of {point_count}")))?;
        Ok(OutlinePoint {
            position: Some(position),
            point_count,
        })
    }

    #[inline]
    pub fn sfnt_table(&self, tag: [u8; 4]) -> Option<Vec<u8>> {
        self.native.sfnt_table(tag)
    }
}

/// Family name with the characters PostScript names cannot hold removed.
fn postscript_family_name(family: &str) -> String {
    family
        .chars()
        .filter(|c| {
            c.is_ascii_graphic()
                && !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | '/' | '%')
        })
        .collect()
}

new_key_type! {
    pub struct FaceKey;
}

type LibraryInit<L> = Box<dyn Fn() -> Result<L, FaceError>>;

/// Per-thread table of open faces, keyed by [`FaceId`].
///
/// The library is created with the first face and dropped with the last.
pub struct FaceRegistry<L: FontLibrary = SfntLibrary> {
    library: Option<L>,
    init: LibraryInit<L>,
    faces: SlotMap<FaceKey, Face<L::Face>>,
    index: FxHashMap<FaceId, FaceKey>,
    _not_send: PhantomData<Rc<()>>,
}

impl FaceRegistry<SfntLibrary> {
    pub fn new() -> Self {
        Self::with_library(SfntLibrary::init)
    }
}

impl Default for FaceRegistry<SfntLibrary> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: FontLibrary> FaceRegistry<L> {
    pub fn with_library(init: impl Fn() -> Result<L, FaceError> + 'static) -> Self {
        Self {
            library: None,
            init: Box::new(init),
            faces: SlotMap::with_key(),
            index: FxHashMap::default(),
            _not_send: PhantomData,
        }
    }

    /// Returns the face for `id`, opening it on first use. Every successful
    /// call must be paired with a [`FaceRegistry::release`].
    pub fn acquire(&mut self, id: &FaceId) -> Result<FaceKey, FaceError> {
        if let Some(&key) = self.index.get(id) {
            if let Some(face) = self.faces.get_mut(key) {
                face.refs += 1;
                return Ok(key);
            }
        }
        if id.is_empty() {
            return Err(FaceError::EmptySource);
        }

        if self.library.is_none() {
            debug!("initializing font library");
            self.library = Some((self.init)()?);
        }
        let Some(library) = self.library.as_mut() else {
            return Err(FaceError::Library("library unavailable".into()));
        };
        let native = match &id.source {
            FaceSource::File(path) => library.new_face_from_path(path, id.index),
            FaceSource::Memory(blob) => library.new_face_from_memory(blob.data.clone(), id.index),
        };
        let native = match native {
            Ok(native) => native,
            Err(err) => {
                if self.faces.is_empty() {
                    self.library = None;
                }
                return Err(err);
            }
        };

        let key = self.faces.insert(Face::new(id.clone(), native));
        self.index.insert(id.clone(), key);
        debug!("opened face {:?}", id);
        Ok(key)
    }

    /// Adds a reference to a face that is already open.
    pub fn retain(&mut self, key: FaceKey) -> bool {
        match self.faces.get_mut(key) {
            Some(face) => {
                face.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drops one reference. The last one closes the face, and closing the
    /// last face releases the library.
    pub fn release(&mut self, key: FaceKey) {
        let Some(face) = self.faces.get_mut(key) else {
            return;
        };
        face.refs = face.refs.saturating_sub(1);
        if face.refs > 0 {
            trace!("face {:?} has {} references left", face.id, face.refs);
            return;
        }
        if let Some(face) = self.faces.remove(key) {
            self.index.remove(&face.id);
            debug!("closed face {:?}", face.id);
        }
        if self.faces.is_empty() {
            debug!("releasing font library");
            self.library = None;
        }
    }

    #[inline]
    pub fn get(&self, key: FaceKey) -> Option<&Face<L::Face>> {
        self.faces.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: FaceKey) -> Option<&mut Face<L::Face>> {
        self.faces.get_mut(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    #[inline]
    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }
}
