//! Synthetic styles for faces lacking a real bold or italic.

use crate::backend::{GlyphSlot, Outline, SlotImage};
use crate::fixed::{mul_fix, FixedMatrix, Vector};

/// Emboldening strength in 26.6 for the current size: one 24th of the em.
#[inline]
pub fn embolden_strength(units_per_em: u16, y_scale: i32) -> i32 {
    mul_fix(units_per_em as i32, y_scale) / 24
}

/// Shears `matrix` for a synthetic oblique. The shear applies after `matrix`.
#[inline]
pub fn oblique(matrix: &FixedMatrix) -> FixedMatrix {
    FixedMatrix::OBLIQUE.multiply(matrix)
}

/// Shears the outline of a slot in place. Metrics are left as loaded, so
/// bounds must be computed with [`oblique`] applied to the load matrix.
pub fn oblique_slot(slot: &mut GlyphSlot) {
    if let SlotImage::Outline(outline) = &mut slot.image {
        outline.transform(&FixedMatrix::OBLIQUE);
    }
}

/// Emboldens an outline slot, growing its metrics and advance to match.
///
/// Bitmap slots are left untouched.
pub fn embolden_slot(slot: &mut GlyphSlot, strength: i32) {
    let SlotImage::Outline(outline) = &mut slot.image else {
        return;
    };
    embolden_outline(outline, strength, strength);

    if slot.advance.x != 0 {
        slot.advance.x += strength;
    }
    if slot.advance.y != 0 {
        slot.advance.y += strength;
    }
    slot.metrics.width += strength;
    slot.metrics.height += strength;
    slot.metrics.hori_bearing_y += strength;
    slot.metrics.hori_advance += strength;
}

/// Below this, the two normals at a point nearly cancel and the corner is a
/// hairpin: the point is only translated.
const HAIRPIN: f32 = 0.06;

/// Grows every contour outward, by `x_strength` horizontally and
/// `y_strength` vertically in total.
///
/// Edges move out by half the strength along their normals, then the whole
/// outline moves up and right by the other half, so the left and bottom
/// extremes stay put.
pub fn embolden_outline(outline: &mut Outline, x_strength: i32, y_strength: i32) {
    if outline.is_empty() || (x_strength == 0 && y_strength == 0) {
        return;
    }
    let clockwise = signed_area(&outline.points) <= 0;
    let half = (x_strength as f32 / 2., y_strength as f32 / 2.);

    let ranges: Vec<_> = outline.contour_ranges().collect();
    for (first, last) in ranges {
        let contour = &mut outline.points[first..=last];
        let moved: Vec<Vector> = (0..contour.len())
            .map(|i| embolden_point(contour, i, clockwise, half))
            .collect();
        contour.copy_from_slice(&moved);
    }
}

/// Twice the signed area of all contours. Negative for clockwise (y up).
fn signed_area(points: &[Vector]) -> i64 {
    let Some(&last) = points.last() else {
        return 0;
    };
    let mut prev = last;
    let mut area = 0i64;
    for &cur in points {
        area += prev.x as i64 * cur.y as i64 - cur.x as i64 * prev.y as i64;
        prev = cur;
    }
    area
}

/// The nearest point before or after `i` that differs from it.
fn neighbor(contour: &[Vector], i: usize, forward: bool) -> Option<Vector> {
    let n = contour.len();
    (1..n)
        .map(|k| if forward { (i + k) % n } else { (i + n - k) % n })
        .map(|j| contour[j])
        .find(|&p| p != contour[i])
}

/// Unit direction from `a` to `b`, with the distance.
#[inline]
fn direction(a: Vector, b: Vector) -> ((f32, f32), f32) {
    let (dx, dy) = ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let len = (dx * dx + dy * dy).sqrt();
    ((dx / len, dy / len), len)
}

/// Normal pointing away from the ink, left of travel on clockwise outlines.
#[inline]
fn outward((dx, dy): (f32, f32), clockwise: bool) -> (f32, f32) {
    if clockwise {
        (-dy, dx)
    } else {
        (dy, -dx)
    }
}

fn embolden_point(contour: &[Vector], i: usize, clockwise: bool, (hx, hy): (f32, f32)) -> Vector {
    let cur = contour[i];
    let mut shift = (0., 0.);

    if let (Some(prev), Some(next)) = (neighbor(contour, i, false), neighbor(contour, i, true)) {
        let (d_in, in_len) = direction(prev, cur);
        let (d_out, out_len) = direction(cur, next);
        let n_in = outward(d_in, clockwise);
        let n_out = outward(d_out, clockwise);
        // Miter: the offset whose projection on both normals is one.
        let denom = 1. + n_in.0 * n_out.0 + n_in.1 * n_out.1;
        if denom > HAIRPIN {
            let mut sx = (n_in.0 + n_out.0) / denom * hx;
            let mut sy = (n_in.1 + n_out.1) / denom * hy;
            // A miter never reaches past the shorter adjacent edge.
            let len = (sx * sx + sy * sy).sqrt();
            let limit = in_len.min(out_len);
            if len > limit {
                sx *= limit / len;
                sy *= limit / len;
            }
            shift = (sx, sy);
        }
    }

    Vector::new(
        (cur.x as f32 + hx + shift.0).round() as i32,
        (cur.y as f32 + hy + shift.1).round() as i32,
    )
}
