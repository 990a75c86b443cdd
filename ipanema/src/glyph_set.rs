use crate::backend::GlyphId;
use crate::fixed::{Fixed, FixedMatrix};
use crate::glyph::Glyph;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::Entry;

/// Glyphs rendered under one transform of one engine.
///
/// Small glyph ids at a zero sub-pixel offset live in a direct array, the
/// rest in a map keyed by id and offset. Records are boxed so references
/// handed out stay stable while the set lives.
#[derive(Debug)]
pub struct GlyphSet {
    pub matrix: FixedMatrix,
    /// Glyphs of this set are too large to cache as bitmaps.
    pub outline_drawing: bool,
    fast_limit: u32,
    fast: Vec<Option<Box<Glyph>>>,
    fast_count: usize,
    glyphs: FxHashMap<(GlyphId, Fixed), Box<Glyph>>,
    missing: FxHashSet<GlyphId>,
}

impl GlyphSet {
    pub fn new(matrix: FixedMatrix, fast_limit: u32) -> Self {
        Self {
            matrix,
            outline_drawing: false,
            fast_limit,
            fast: Vec::new(),
            fast_count: 0,
            glyphs: FxHashMap::default(),
            missing: FxHashSet::default(),
        }
    }

    #[inline]
    fn is_fast(&self, glyph: GlyphId, subpixel: Fixed) -> bool {
        glyph < self.fast_limit && subpixel == Fixed::ZERO
    }

    pub fn get(&self, glyph: GlyphId, subpixel: Fixed) -> Option<&Glyph> {
        if self.is_fast(glyph, subpixel) {
            self.fast.get(glyph as usize)?.as_deref()
        } else {
            self.glyphs.get(&(glyph, subpixel)).map(|g| &**g)
        }
    }

    /// Stores `record`, replacing any glyph at the same key, and returns it.
    pub fn insert(&mut self, glyph: GlyphId, subpixel: Fixed, record: Glyph) -> &Glyph {
        if self.is_fast(glyph, subpixel) {
            if self.fast.is_empty() {
                self.fast.resize_with(self.fast_limit as usize, || None);
            }
            let slot = &mut self.fast[glyph as usize];
            if slot.is_none() {
                self.fast_count += 1;
            }
            &**slot.insert(Box::new(record))
        } else {
            match self.glyphs.entry((glyph, subpixel)) {
                Entry::Occupied(entry) => {
                    let slot = entry.into_mut();
                    **slot = record;
                    &**slot
                }
                Entry::Vacant(entry) => &**entry.insert(Box::new(record)),
            }
        }
    }

    pub fn remove(&mut self, glyph: GlyphId, subpixel: Fixed) -> Option<Glyph> {
        if self.is_fast(glyph, subpixel) {
            let removed = self.fast.get_mut(glyph as usize)?.take()?;
            self.fast_count = self.fast_count.saturating_sub(1);
            Some(*removed)
        } else {
            self.glyphs.remove(&(glyph, subpixel)).map(|g| *g)
        }
    }

    pub fn is_missing(&self, glyph: GlyphId) -> bool {
        self.missing.contains(&glyph)
    }

    pub fn set_missing(&mut self, glyph: GlyphId) {
        self.missing.insert(glyph);
    }

    pub fn len(&self) -> usize {
        self.fast_count + self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every glyph and missing mark.
    pub fn clear(&mut self) {
        if self.fast_count > 0 {
            self.fast.clear();
            self.fast_count = 0;
        }
        self.glyphs.clear();
        self.missing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(advance: i8) -> Glyph {
        Glyph {
            advance,
            ..Glyph::EMPTY
        }
    }

    #[test]
    fn test_fast_and_keyed_storage() {
        let mut set = GlyphSet::new(FixedMatrix::IDENTITY, 256);
        set.insert(10, Fixed::ZERO, glyph(1));
        set.insert(10, Fixed::from_bits(16), glyph(2));
        set.insert(300, Fixed::ZERO, glyph(3));

        assert_eq!(set.len(), 3);
        assert_eq!(set.get(10, Fixed::ZERO).unwrap().advance, 1);
        assert_eq!(set.get(10, Fixed::from_bits(16)).unwrap().advance, 2);
        assert_eq!(set.get(300, Fixed::ZERO).unwrap().advance, 3);
        assert!(set.get(10, Fixed::from_bits(32)).is_none());
        assert!(set.get(11, Fixed::ZERO).is_none());
    }

    #[test]
    fn test_one_record_per_key() {
        let mut set = GlyphSet::new(FixedMatrix::IDENTITY, 4);
        set.insert(1, Fixed::ZERO, glyph(1));
        set.insert(1, Fixed::ZERO, glyph(5));
        set.insert(9, Fixed::ZERO, glyph(1));
        set.insert(9, Fixed::ZERO, glyph(6));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1, Fixed::ZERO).unwrap().advance, 5);
        assert_eq!(set.get(9, Fixed::ZERO).unwrap().advance, 6);
    }

    #[test]
    fn test_references_are_stable() {
        let mut set = GlyphSet::new(FixedMatrix::IDENTITY, 256);
        let first: *const Glyph = set.insert(500, Fixed::ZERO, glyph(1));
        for id in 501..600 {
            set.insert(id, Fixed::ZERO, glyph(0));
        }
        assert!(std::ptr::eq(first, set.get(500, Fixed::ZERO).unwrap()));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut set = GlyphSet::new(FixedMatrix::IDENTITY, 256);
        set.insert(3, Fixed::ZERO, glyph(1));
        set.insert(3, Fixed::from_bits(48), glyph(2));
        set.set_missing(42);

        assert_eq!(set.remove(3, Fixed::ZERO).map(|g| g.advance), Some(1));
        assert!(set.remove(3, Fixed::ZERO).is_none());
        assert_eq!(set.len(), 1);
        assert!(set.is_missing(42));

        set.clear();
        assert!(set.is_empty());
        assert!(!set.is_missing(42));
        assert!(set.get(3, Fixed::from_bits(48)).is_none());
    }
}
