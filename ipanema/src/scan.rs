//! Scan conversion of outlines into coverage bitmaps.

use crate::backend::{Bitmap, Outline, PixelMode};
use crate::path::{Path, PathBuilder, PathPoint, PathSegment};
use smallvec::SmallVec;
use zeno::{Format, Mask, Point, Verb};

type Points = SmallVec<[Point; 64]>;
type Verbs = SmallVec<[Verb; 32]>;

/// Fills `bitmap` with the coverage of `outline`.
///
/// The outline must already sit in bitmap space: 26.6 units, y up, the
/// bottom-left corner of the bitmap at the origin. Anything outside the
/// bitmap is clipped.
pub fn render_outline(outline: &Outline, bitmap: &mut Bitmap) {
    let path = PathBuilder::new(PathPoint::new(0.0, bitmap.rows as f32)).build(outline);
    render_path(&path, bitmap);
}

/// Fills `bitmap` with the coverage of a y-down path given in pixels.
pub fn render_path(path: &Path, bitmap: &mut Bitmap) {
    let (points, verbs) = zeno_path(path);
    if verbs.is_empty() || bitmap.width == 0 || bitmap.rows == 0 {
        return;
    }

    let (coverage, placement) = Mask::new((&points[..], &verbs[..]))
        .format(Format::Alpha)
        .render();

    let mask_width = placement.width as usize;
    let width = bitmap.width as i32;
    let rows = bitmap.rows as i32;
    for row in 0..placement.height as usize {
        let y = placement.top + row as i32;
        if y < 0 || y >= rows {
            continue;
        }
        let line = &coverage[row * mask_width..(row + 1) * mask_width];
        let dst = y as usize * bitmap.pitch;
        for (col, &value) in line.iter().enumerate() {
            let x = placement.left + col as i32;
            if x < 0 || x >= width || value == 0 {
                continue;
            }
            let x = x as usize;
            match bitmap.pixel_mode {
                PixelMode::Gray => bitmap.buffer[dst + x] = value,
                PixelMode::Mono => {
                    if value >= 0x80 {
                        bitmap.buffer[dst + (x >> 3)] |= 0x80 >> (x & 7);
                    }
                }
            }
        }
    }
}

fn zeno_path(path: &Path) -> (Points, Verbs) {
    let mut points = Points::with_capacity(path.segments().len() * 3);
    let mut verbs = Verbs::with_capacity(path.segments().len());
    for segment in path.segments() {
        match *segment {
            PathSegment::MoveTo(p) => {
                points.push(Point::new(p.x, p.y));
                verbs.push(Verb::MoveTo);
            }
            PathSegment::LineTo(p) => {
                points.push(Point::new(p.x, p.y));
                verbs.push(Verb::LineTo);
            }
            PathSegment::CubicTo(c1, c2, to) => {
                points.push(Point::new(c1.x, c1.y));
                points.push(Point::new(c2.x, c2.y));
                points.push(Point::new(to.x, to.y));
                verbs.push(Verb::CurveTo);
            }
            PathSegment::Close => verbs.push(Verb::Close),
        }
    }
    (points, verbs)
}
