use crate::fixed::FixedMatrix;

/// Classification of an affine transform, ordered by complexity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformKind {
    Identity,
    Translate,
    Scale,
    Rotate,
    Shear,
}

/// A 2D affine transform in painter convention (y grows downward).
///
/// Maps `(x, y)` to `(m11*x + m21*y + dx, m12*x + m22*y + dy)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub m11: f64,
    pub m12: f64,
    pub m21: f64,
    pub m22: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    pub const fn new(m11: f64, m12: f64, m21: f64, m22: f64, dx: f64, dy: f64) -> Self {
        Self {
            m11,
            m12,
            m21,
            m22,
            dx,
            dy,
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::IDENTITY
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            m11: sx,
            m22: sy,
            ..Self::IDENTITY
        }
    }

    /// Rotation by `degrees`, clockwise on screen.
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            m11: cos,
            m12: sin,
            m21: -sin,
            m22: cos,
            ..Self::IDENTITY
        }
    }

    pub fn shearing(sh: f64, sv: f64) -> Self {
        Self {
            m12: sv,
            m21: sh,
            ..Self::IDENTITY
        }
    }

    pub fn kind(&self) -> TransformKind {
        if self.m12 != 0.0 || self.m21 != 0.0 {
            let dot = self.m11 * self.m12 + self.m21 * self.m22;
            if fuzzy_is_null(dot) {
                TransformKind::Rotate
            } else {
                TransformKind::Shear
            }
        } else if self.m11 != 1.0 || self.m22 != 1.0 {
            TransformKind::Scale
        } else if self.dx != 0.0 || self.dy != 0.0 {
            TransformKind::Translate
        } else {
            TransformKind::Identity
        }
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.m11 * self.m22 - self.m12 * self.m21
    }

    /// True for an orthonormal rotation, which keeps hinting meaningful.
    pub fn is_2d_rotation(&self) -> bool {
        fuzzy_compare(self.m11, self.m22)
            && fuzzy_compare(self.m12, -self.m21)
            && fuzzy_compare(self.determinant(), 1.0)
    }

    /// Converts to the rasterizer's y-up 16.16 matrix. Translation is dropped.
    pub fn to_fixed_matrix(&self) -> FixedMatrix {
        FixedMatrix {
            xx: (self.m11 * 65536.0) as i32,
            xy: (-self.m21 * 65536.0) as i32,
            yx: (-self.m12 * 65536.0) as i32,
            yy: (self.m22 * 65536.0) as i32,
        }
    }

    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m11 * x + self.m21 * y + self.dx,
            self.m12 * x + self.m22 * y + self.dy,
        )
    }
}

fn fuzzy_is_null(value: f64) -> bool {
    value.abs() <= 0.000000000001
}

fn fuzzy_compare(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() * 1000000000000.0 <= a.abs().min(b.abs())
}
