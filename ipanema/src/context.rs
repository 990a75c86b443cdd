//! Entry point for text layout and painting on one thread.

use crate::backend::{FontLibrary, GlyphId, SfntLibrary};
use crate::config::RasterConfig;
use crate::engine::{FontDef, FontEngine, GlyphLayout, GlyphMeasure, Raster, Synthesized};
use crate::error::FaceError;
use crate::face::{Face, FaceId, FaceProperties, FaceRegistry};
use crate::fixed::Fixed;
use crate::glyph::GlyphMetrics;
use crate::path::Path;
use crate::raster::PixelFormat;
use crate::transform::Transform;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, warn};

new_key_type! {
    pub struct EngineHandle;
}

/// Face-wide properties as seen at an engine's size.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineProperties {
    pub face: FaceProperties,
    pub ascent: Fixed,
    pub descent: Fixed,
    pub leading: Fixed,
    pub line_thickness: Fixed,
    pub underline_position: Fixed,
    pub synthesized: Synthesized,
}

/// Owns the faces and engines of the current thread.
///
/// Engines are addressed by [`EngineHandle`]. Each holds one reference on
/// its face until [`FontContext::release_engine`].
pub struct FontContext<L: FontLibrary = SfntLibrary> {
    registry: FaceRegistry<L>,
    engines: SlotMap<EngineHandle, FontEngine>,
    config: RasterConfig,
}

impl FontContext<SfntLibrary> {
    pub fn new(config: RasterConfig) -> Self {
        Self::with_library(config, SfntLibrary::init)
    }
}

impl Default for FontContext<SfntLibrary> {
    fn default() -> Self {
        Self::new(RasterConfig::default().with_environment())
    }
}

impl<L: FontLibrary> FontContext<L> {
    pub fn with_library(
        config: RasterConfig,
        init: impl Fn() -> Result<L, FaceError> + 'static,
    ) -> Self {
        Self {
            registry: FaceRegistry::with_library(init),
            engines: SlotMap::with_key(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &FaceRegistry<L> {
        &self.registry
    }

    /// Opens `id` if needed and creates an engine for `def` on it.
    pub fn acquire_engine(
        &mut self,
        id: &FaceId,
        def: FontDef,
    ) -> Result<EngineHandle, FaceError> {
        let key = self.registry.acquire(id)?;
        let Some(face) = self.registry.get_mut(key) else {
            return Err(FaceError::Library(format!("face {id:?} vanished")));
        };
        let engine = FontEngine::new(face, key, def, &self.config);
        Ok(self.engines.insert(engine))
    }

    /// Drops an engine and its face reference. Returns false for stale handles.
    pub fn release_engine(&mut self, handle: EngineHandle) -> bool {
        match self.engines.remove(handle) {
            Some(engine) => {
                self.registry.release(engine.face_key());
                true
            }
            None => {
                debug!("release of unknown engine {:?}", handle);
                false
            }
        }
    }

    /// A new engine at `pixel_size` sharing the face and settings of `handle`.
    pub fn clone_with_size(&mut self, handle: EngineHandle, pixel_size: f64) -> Option<EngineHandle> {
        let (engine, face) = self.parts(handle)?;
        let clone = engine.clone_with_size(face, pixel_size);
        self.registry.retain(clone.face_key());
        Some(self.engines.insert(clone))
    }

    fn parts(&mut self, handle: EngineHandle) -> Option<(&mut FontEngine, &mut Face<L::Face>)> {
        let engine = self.engines.get_mut(handle)?;
        let face = self.registry.get_mut(engine.face_key())?;
        Some((engine, face))
    }

    #[inline]
    pub fn engine(&self, handle: EngineHandle) -> Option<&FontEngine> {
        self.engines.get(handle)
    }

    #[inline]
    pub fn engine_mut(&mut self, handle: EngineHandle) -> Option<&mut FontEngine> {
        self.engines.get_mut(handle)
    }

    pub fn face(&self, handle: EngineHandle) -> Option<&Face<L::Face>> {
        self.registry.get(self.engines.get(handle)?.face_key())
    }

    #[inline]
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn glyph_index_for(&mut self, handle: EngineHandle, codepoint: char) -> Option<GlyphId> {
        let (engine, face) = self.parts(handle)?;
        Some(engine.glyph_index(face, codepoint))
    }

    pub fn metrics_for(&mut self, handle: EngineHandle, glyph: GlyphId) -> Option<GlyphMeasure> {
        let (engine, face) = self.parts(handle)?;
        Some(engine.metrics_for(face, glyph))
    }

    pub fn raster_for(
        &mut self,
        handle: EngineHandle,
        glyph: GlyphId,
        subpixel: Fixed,
        format: Option<PixelFormat>,
        transform: &Transform,
    ) -> Option<Raster<'_>> {
        let (engine, face) = self.parts(handle)?;
        Some(engine.raster_for(face, glyph, subpixel, format, transform))
    }

    /// Unscaled outline of `glyph`. `None` when the glyph cannot be loaded.
    pub fn path_for(&mut self, handle: EngineHandle, glyph: GlyphId) -> Option<(Path, GlyphMetrics)> {
        let (engine, face) = self.parts(handle)?;
        match engine.path_for(face, glyph) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("no path for glyph {glyph}: {err}");
                None
            }
        }
    }

    pub fn string_to_glyphs(
        &mut self,
        handle: EngineHandle,
        text: &str,
        design_metrics: bool,
    ) -> Option<GlyphLayout> {
        let (engine, face) = self.parts(handle)?;
        Some(engine.string_to_glyphs(face, text, design_metrics))
    }

    pub fn face_properties(&self, handle: EngineHandle) -> Option<EngineProperties> {
        let engine = self.engines.get(handle)?;
        let face = self.registry.get(engine.face_key())?;
        Some(EngineProperties {
            face: face.properties(),
            ascent: engine.ascent(),
            descent: engine.descent(),
            leading: engine.leading(),
            line_thickness: engine.line_thickness(),
            underline_position: engine.underline_position(),
            synthesized: engine.synthesized(),
        })
    }
}
