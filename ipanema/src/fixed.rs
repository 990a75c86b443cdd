//! Fixed-point helpers shared by the rasterizer boundary and the caches.
//!
//! Two formats are in play: 26.6 for positions and metrics (what a glyph
//! slot reports) and 16.16 for matrices and linear advances.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Rounds a 26.6 value down to a whole pixel.
#[inline]
pub const fn floor(x: i32) -> i32 {
    x & -64
}

/// Rounds a 26.6 value up to a whole pixel.
#[inline]
pub const fn ceil(x: i32) -> i32 {
    x.wrapping_add(63) & -64
}

/// Rounds a 26.6 value to the nearest whole pixel.
#[inline]
pub const fn round(x: i32) -> i32 {
    x.wrapping_add(32) & -64
}

/// Drops the fractional bits of a 26.6 value.
#[inline]
pub const fn trunc(x: i32) -> i32 {
    x >> 6
}

/// `(a * b) / 0x10000` with rounding, the 16.16 product.
#[inline]
pub fn mul_fix(a: i32, b: i32) -> i32 {
    let product = a as i64 * b as i64;
    let rounded = if product < 0 {
        -((-product + 0x8000) >> 16)
    } else {
        (product + 0x8000) >> 16
    };
    rounded.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// `(a * 0x10000) / b` with rounding. Division by zero saturates.
#[inline]
pub fn div_fix(a: i32, b: i32) -> i32 {
    if b == 0 {
        return if a < 0 { i32::MIN } else { i32::MAX };
    }
    mul_div(a, 0x10000, b)
}

/// `(a * b) / c` with rounding and 64-bit intermediates.
#[inline]
pub fn mul_div(a: i32, b: i32, c: i32) -> i32 {
    if c == 0 {
        return if (a < 0) ^ (b < 0) { i32::MIN } else { i32::MAX };
    }
    let numerator = a as i64 * b as i64;
    let c = c as i64;
    let half = c.abs() / 2;
    let result = if (numerator < 0) ^ (c < 0) {
        -((numerator.abs() + half) / c.abs())
    } else {
        (numerator.abs() + half) / c.abs()
    };
    result.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// A 26.6 fixed-point number.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(64);

    /// Wraps a raw 26.6 value.
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self(value << 6)
    }

    #[inline]
    pub fn from_f32(value: f32) -> Self {
        Self((value * 64.0).round() as i32)
    }

    #[inline]
    pub const fn bits(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 64.0
    }

    #[inline]
    pub const fn round(self) -> Self {
        Self(round(self.0))
    }

    #[inline]
    pub const fn floor(self) -> Self {
        Self(floor(self.0))
    }

    #[inline]
    pub const fn ceil(self) -> Self {
        Self(ceil(self.0))
    }

    /// Integer part, rounding toward negative infinity.
    #[inline]
    pub const fn truncate(self) -> i32 {
        trunc(self.0)
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self.to_f32())
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl Add for Fixed {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Fixed {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Fixed {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl Mul<i32> for Fixed {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: i32) -> Self {
        Self(self.0.wrapping_mul(rhs))
    }
}

impl Div<i32> for Fixed {
    type Output = Self;

    #[inline]
    fn div(self, rhs: i32) -> Self {
        if rhs == 0 {
            return self;
        }
        Self(self.0 / rhs)
    }
}

/// A 26.6 vector, as used for outline points, advances and deltas.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A 2x2 matrix with 16.16 coefficients.
///
/// `xy` is the coefficient applied to `y` when computing the new `x`, and `yx`
/// the one applied to `x` when computing the new `y`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FixedMatrix {
    pub xx: i32,
    pub xy: i32,
    pub yx: i32,
    pub yy: i32,
}

impl Default for FixedMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FixedMatrix {
    pub const IDENTITY: FixedMatrix = FixedMatrix {
        xx: 0x10000,
        xy: 0,
        yx: 0,
        yy: 0x10000,
    };

    /// Shear used for synthetic oblique styles.
    pub const OBLIQUE: FixedMatrix = FixedMatrix {
        xx: 0x10000,
        xy: 0x6000,
        yx: 0,
        yy: 0x10000,
    };

    #[inline]
    pub const fn scale(sx: i32, sy: i32) -> Self {
        Self {
            xx: sx,
            xy: 0,
            yx: 0,
            yy: sy,
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Returns `self * other`, the matrix that applies `other` first.
    pub fn multiply(&self, other: &FixedMatrix) -> FixedMatrix {
        FixedMatrix {
            xx: mul_fix(self.xx, other.xx).wrapping_add(mul_fix(self.xy, other.yx)),
            xy: mul_fix(self.xx, other.xy).wrapping_add(mul_fix(self.xy, other.yy)),
            yx: mul_fix(self.yx, other.xx).wrapping_add(mul_fix(self.yy, other.yx)),
            yy: mul_fix(self.yx, other.xy).wrapping_add(mul_fix(self.yy, other.yy)),
        }
    }

    #[inline]
    pub fn transform(&self, v: Vector) -> Vector {
        Vector {
            x: mul_fix(v.x, self.xx).wrapping_add(mul_fix(v.y, self.xy)),
            y: mul_fix(v.x, self.yx).wrapping_add(mul_fix(v.y, self.yy)),
        }
    }

    /// Determinant as a float, used for area estimates.
    pub fn determinant(&self) -> f64 {
        let xx = self.xx as f64 / 65536.0;
        let xy = self.xy as f64 / 65536.0;
        let yx = self.yx as f64 / 65536.0;
        let yy = self.yy as f64 / 65536.0;
        xx * yy - xy * yx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_rounding() {
        assert_eq!(floor(100), 64);
        assert_eq!(ceil(100), 128);
        assert_eq!(round(95), 64);
        assert_eq!(round(96), 128);
        assert_eq!(trunc(130), 2);
        assert_eq!(floor(-10), -64);
        assert_eq!(ceil(-10), 0);
        assert_eq!(trunc(-1), -1);
    }

    #[test]
    fn test_mul_fix_and_div_fix() {
        assert_eq!(mul_fix(0x10000, 1234), 1234);
        assert_eq!(mul_fix(0x8000, 100), 50);
        assert_eq!(mul_fix(-0x8000, 100), -50);
        assert_eq!(div_fix(1, 2), 0x8000);
        assert_eq!(div_fix(5, 0), i32::MAX);
        assert_eq!(mul_div(10, 3, 4), 8);
    }

    #[test]
    fn test_fixed_arithmetic() {
        let a = Fixed::from_f32(1.5);
        assert_eq!(a.bits(), 96);
        assert_eq!(a.round(), Fixed::from_int(2));
        assert_eq!(a.floor().truncate(), 1);
        assert_eq!((a + Fixed::ONE).to_f32(), 2.5);
        assert_eq!((-a).ceil(), Fixed::from_int(-1));
        assert_eq!(a * 2, Fixed::from_int(3));
    }

    #[test]
    fn test_matrix_multiply_and_transform() {
        let scale = FixedMatrix::scale(0x20000, 0x10000);
        let sheared = FixedMatrix::OBLIQUE.multiply(&scale);
        assert_eq!(sheared.xx, 0x20000);
        assert_eq!(sheared.xy, 0x6000);

        let v = FixedMatrix::OBLIQUE.transform(Vector::new(0, 64));
        // 0x6000 / 0x10000 = 0.375
        assert_eq!(v, Vector::new(24, 64));
        assert!(FixedMatrix::IDENTITY.multiply(&FixedMatrix::IDENTITY).is_identity());
        assert_eq!(scale.determinant(), 2.0);
    }
}
