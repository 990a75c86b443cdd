/*!
Outline to path conversion.

Glyph outlines arrive as TrueType/CFF style point arrays: every point carries
a tag saying whether it sits on the curve, is a quadratic control point, or
is one of a pair of cubic control points. Painting wants plain move/line/cubic
commands, so quadratic runs are elevated to cubics and the implied on-curve
midpoints between consecutive quadratic controls are synthesized here.

Paths use painter orientation: y grows downward.
*/

use crate::backend::{Bitmap, Outline, TAG_CONIC, TAG_CUBIC};
use std::ops::{Add, Div, Mul, Sub};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
}

impl PathPoint {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for PathPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for PathPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for PathPoint {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for PathPoint {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(PathPoint),
    LineTo(PathPoint),
    CubicTo(PathPoint, PathPoint, PathPoint),
    Close,
}

/// Axis aligned rectangle, `y` being the top edge.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PathRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn move_to(&mut self, p: PathPoint) {
        self.segments.push(PathSegment::MoveTo(p));
    }

    pub fn line_to(&mut self, p: PathPoint) {
        self.segments.push(PathSegment::LineTo(p));
    }

    pub fn cubic_to(&mut self, c1: PathPoint, c2: PathPoint, to: PathPoint) {
        self.segments.push(PathSegment::CubicTo(c1, c2, to));
    }

    pub fn close(&mut self) {
        self.segments.push(PathSegment::Close);
    }

    /// Appends every segment of `other`.
    pub fn extend(&mut self, other: Path) {
        self.segments.extend(other.segments);
    }

    /// Bounds of all end and control points, `None` for an empty path.
    pub fn bounds(&self) -> Option<PathRect> {
        let mut points = self.segments.iter().flat_map(|segment| {
            let (a, b, c, count) = match *segment {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => (p, p, p, 1),
                PathSegment::CubicTo(c1, c2, to) => (c1, c2, to, 3),
                PathSegment::Close => {
                    let origin = PathPoint::default();
                    (origin, origin, origin, 0)
                }
            };
            [a, b, c].into_iter().take(count)
        });
        let first = points.next()?;
        let (x0, y0, x1, y1) = points.fold(
            (first.x, first.y, first.x, first.y),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        );
        Some(PathRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Converts outlines into paths.
///
/// Points are read as 26.6 values, multiplied by `scale` and flipped to y-down,
/// then offset by `origin`.
#[derive(Copy, Clone, Debug)]
pub struct PathBuilder {
    origin: PathPoint,
    scale_x: f32,
    scale_y: f32,
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new(PathPoint::default())
    }
}

impl PathBuilder {
    pub fn new(origin: PathPoint) -> Self {
        Self {
            origin,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn scale(mut self, x: f32, y: f32) -> Self {
        self.scale_x = x;
        self.scale_y = y;
        self
    }

    #[inline]
    fn point(&self, outline: &Outline, index: usize) -> PathPoint {
        let p = outline.points[index];
        self.origin
            + PathPoint::new(
                p.x as f32 / 64.0 * self.scale_x,
                -(p.y as f32) / 64.0 * self.scale_y,
            )
    }

    pub fn build(&self, outline: &Outline) -> Path {
        let mut path = Path::new();
        self.append(outline, &mut path);
        path
    }

    pub fn append(&self, outline: &Outline, path: &mut Path) {
        let tag = |index: usize| outline.tags.get(index).copied().unwrap_or(1) & 3;
        for (first, last) in outline.contour_ranges() {
            let mut start = self.point(outline, first);
            let mut i = first as isize;
            if tag(first) & 1 == 0 {
                // Off-curve start: begin at the implied midpoint with the last
                // point, or at the last point when that one is on the curve.
                let end = self.point(outline, last);
                start = if tag(last) & 1 == 0 {
                    (end + start) / 2.0
                } else {
                    end
                };
                // Reconsume the first point as a control point.
                i -= 1;
            }

            path.move_to(start);

            let mut c = [start; 4];
            let mut n = 1;
            while i < last as isize {
                i += 1;
                c[n] = self.point(outline, i as usize);
                n += 1;

                match tag(i as usize) {
                    TAG_CUBIC => {
                        if n < 4 {
                            continue;
                        }
                        c[3] = (c[3] + c[2]) / 2.0;
                        i -= 1;
                    }
                    TAG_CONIC => {
                        if n < 3 {
                            continue;
                        }
                        c[3] = (c[1] + c[2]) / 2.0;
                        c[2] = (c[1] * 2.0 + c[3]) / 3.0;
                        c[1] = (c[1] * 2.0 + c[0]) / 3.0;
                        i -= 1;
                    }
                    _ => {
                        if n == 2 {
                            path.line_to(c[1]);
                            c[0] = c[1];
                            n = 1;
                            continue;
                        } else if n == 3 {
                            c[3] = c[2];
                            c[2] = (c[1] * 2.0 + c[3]) / 3.0;
                            c[1] = (c[1] * 2.0 + c[0]) / 3.0;
                        }
                    }
                }

                path.cubic_to(c[1], c[2], c[3]);
                c[0] = c[3];
                n = 1;
            }

            if n != 1 {
                // Pending controls curve back to the start point.
                c[3] = start;
                if n == 2 {
                    c[2] = (c[1] * 2.0 + c[3]) / 3.0;
                    c[1] = (c[1] * 2.0 + c[0]) / 3.0;
                }
                path.cubic_to(c[1], c[2], c[3]);
            }
            path.close();
        }
    }
}

/// Traces the inked pixels of a bitmap as rectangles, merging identical runs
/// on consecutive rows. `(x0, y0)` is the top-left corner of the bitmap.
pub fn bitmap_to_path(bitmap: &Bitmap, x0: f32, y0: f32) -> Path {
    let mut path = Path::new();
    // (start, end, first_row) of runs still growing downward.
    let mut open: Vec<(usize, usize, usize)> = Vec::new();
    let width = bitmap.width as usize;
    let rows = bitmap.rows as usize;

    let emit = |path: &mut Path, run: (usize, usize, usize), bottom: usize| {
        let (start, end, top) = run;
        let left = x0 + start as f32;
        let right = x0 + end as f32;
        let top = y0 + top as f32;
        let bottom = y0 + bottom as f32;
        path.move_to(PathPoint::new(left, top));
        path.line_to(PathPoint::new(right, top));
        path.line_to(PathPoint::new(right, bottom));
        path.line_to(PathPoint::new(left, bottom));
        path.close();
    };

    for y in 0..=rows {
        let mut runs = Vec::new();
        if y < rows {
            let mut x = 0;
            while x < width {
                if bitmap.is_set(x, y) {
                    let start = x;
                    while x < width && bitmap.is_set(x, y) {
                        x += 1;
                    }
                    runs.push((start, x));
                } else {
                    x += 1;
                }
            }
        }

        let mut next_open = Vec::with_capacity(runs.len());
        for run in &open {
            if runs.contains(&(run.0, run.1)) {
                next_open.push(*run);
            } else {
                emit(&mut path, *run, y);
            }
        }
        for (start, end) in runs {
            if !next_open.iter().any(|r| r.0 == start && r.1 == end) {
                next_open.push((start, end, y));
            }
        }
        open = next_open;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PixelMode, TAG_ON};
    use crate::fixed::Vector;

    fn outline(points: &[(i32, i32, u8)], contours: &[usize]) -> Outline {
        Outline {
            points: points
                .iter()
                .map(|&(x, y, _)| Vector::new(x * 64, y * 64))
                .collect(),
            tags: points.iter().map(|&(_, _, t)| t).collect(),
            contours: contours.to_vec(),
        }
    }

    #[test]
    fn test_lines_only_contour() {
        let o = outline(&[(0, 0, TAG_ON), (10, 0, TAG_ON), (10, 10, TAG_ON)], &[2]);
        let path = PathBuilder::default().build(&o);
        assert_eq!(
            path.segments(),
            &[
                PathSegment::MoveTo(PathPoint::new(0.0, 0.0)),
                PathSegment::LineTo(PathPoint::new(10.0, 0.0)),
                PathSegment::LineTo(PathPoint::new(10.0, -10.0)),
                PathSegment::Close,
            ]
        );
    }

    #[test]
    fn test_quadratic_is_elevated_to_cubic() {
        // on (0,0), conic (3,3), on (6,0)
        let o = outline(&[(0, 0, TAG_ON), (3, 3, TAG_CONIC), (6, 0, TAG_ON)], &[2]);
        let path = PathBuilder::default().build(&o);
        match path.segments()[1] {
            PathSegment::CubicTo(c1, c2, to) => {
                assert_eq!(c1, PathPoint::new(2.0, -2.0));
                assert_eq!(c2, PathPoint::new(4.0, -2.0));
                assert_eq!(to, PathPoint::new(6.0, 0.0));
            }
            other => panic!("expected cubic, got {other:?}"),
        }
        assert_eq!(path.segments().last(), Some(&PathSegment::Close));
    }

    #[test]
    fn test_implied_midpoint_between_conics() {
        let o = outline(
            &[
                (0, 0, TAG_ON),
                (2, 4, TAG_CONIC),
                (6, 4, TAG_CONIC),
                (8, 0, TAG_ON),
            ],
            &[3],
        );
        let path = PathBuilder::default().build(&o);
        let cubics: Vec<_> = path
            .segments()
            .iter()
            .filter_map(|s| match s {
                PathSegment::CubicTo(_, _, to) => Some(*to),
                _ => None,
            })
            .collect();
        // Implied on-curve point at the midpoint (4, 4).
        assert_eq!(cubics[0], PathPoint::new(4.0, -4.0));
        assert_eq!(cubics[1], PathPoint::new(8.0, 0.0));
    }

    #[test]
    fn test_off_curve_start_uses_midpoint_with_last_off_curve() {
        let o = outline(
            &[
                (0, 0, TAG_CONIC),
                (10, 0, TAG_ON),
                (10, 10, TAG_CONIC),
            ],
            &[2],
        );
        let path = PathBuilder::default().build(&o);
        assert_eq!(
            path.segments()[0],
            PathSegment::MoveTo(PathPoint::new(5.0, -5.0))
        );
        assert_eq!(path.segments().last(), Some(&PathSegment::Close));
    }

    #[test]
    fn test_off_curve_start_uses_on_curve_last_point() {
        let o = outline(
            &[(0, 0, TAG_CONIC), (10, 0, TAG_ON), (10, 10, TAG_ON)],
            &[2],
        );
        let path = PathBuilder::default().build(&o);
        assert_eq!(
            path.segments()[0],
            PathSegment::MoveTo(PathPoint::new(10.0, -10.0))
        );
    }

    #[test]
    fn test_cubic_pair() {
        let o = outline(
            &[
                (0, 0, TAG_ON),
                (0, 10, TAG_CUBIC),
                (10, 10, TAG_CUBIC),
                (10, 0, TAG_ON),
            ],
            &[3],
        );
        let path = PathBuilder::default().build(&o);
        assert_eq!(
            path.segments()[1],
            PathSegment::CubicTo(
                PathPoint::new(0.0, -10.0),
                PathPoint::new(10.0, -10.0),
                PathPoint::new(10.0, 0.0)
            )
        );
    }

    #[test]
    fn test_every_contour_is_closed() {
        let o = outline(
            &[
                (0, 0, TAG_ON),
                (4, 0, TAG_ON),
                (4, 4, TAG_CONIC),
                (10, 10, TAG_ON),
                (12, 10, TAG_ON),
                (12, 12, TAG_ON),
            ],
            &[2, 5],
        );
        let path = PathBuilder::default().build(&o);
        let closes = path
            .segments()
            .iter()
            .filter(|s| matches!(s, PathSegment::Close))
            .count();
        let moves = path
            .segments()
            .iter()
            .filter(|s| matches!(s, PathSegment::MoveTo(_)))
            .count();
        assert_eq!(closes, 2);
        assert_eq!(moves, 2);
    }

    #[test]
    fn test_origin_and_scale() {
        let o = outline(&[(1, 1, TAG_ON), (2, 1, TAG_ON), (2, 2, TAG_ON)], &[2]);
        let path = PathBuilder::new(PathPoint::new(100.0, 50.0))
            .scale(2.0, 2.0)
            .build(&o);
        let bounds = path.bounds().unwrap();
        assert_eq!(bounds.x, 102.0);
        assert_eq!(bounds.y, 46.0);
        assert_eq!(bounds.width, 2.0);
        assert_eq!(bounds.height, 2.0);
    }

    #[test]
    fn test_bitmap_runs_become_rectangles() {
        // 3x2 bitmap, a full-width bar on both rows.
        let mut bitmap = Bitmap::new(3, 2, 4, PixelMode::Mono);
        bitmap.buffer[0] = 0b1110_0000;
        bitmap.buffer[4] = 0b1110_0000;
        let path = bitmap_to_path(&bitmap, 10.0, 20.0);
        // Merged into a single rectangle.
        assert_eq!(path.segments().len(), 5);
        assert_eq!(
            path.bounds(),
            Some(PathRect {
                x: 10.0,
                y: 20.0,
                width: 3.0,
                height: 2.0
            })
        );
    }
}
