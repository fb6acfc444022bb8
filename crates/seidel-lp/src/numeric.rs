//! Values over the symbolic bounding box.
//!
//! The kernel bounds every variable by `|x_j| <= M` where `M` is larger than
//! any finite quantity. Coordinates and right-hand sides are therefore affine
//! in `M` and stored as `finite + infinite * M`, ordered lexicographically by
//! the `M` part first.

use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Extended {
    pub finite: f64,
    pub infinite: f64,
}

impl Extended {
    pub const ZERO: Extended = Extended {
        finite: 0.0,
        infinite: 0.0,
    };

    pub fn finite(value: f64) -> Self {
        Self {
            finite: value,
            infinite: 0.0,
        }
    }

    pub fn infinite(value: f64) -> Self {
        Self {
            finite: 0.0,
            infinite: value,
        }
    }

    /// `self > other` beyond tolerance. The `M` parts use an absolute
    /// tolerance, the finite parts one relative to `other`.
    pub fn exceeds(self, other: Extended, tolerance: f64) -> bool {
        let diff = self - other;
        if diff.infinite > tolerance {
            return true;
        }
        if diff.infinite < -tolerance {
            return false;
        }
        diff.finite > tolerance * (1.0 + other.finite.abs())
    }

    /// Within tolerance of `other` but not bit-equal.
    pub fn nearly_equals(self, other: Extended, tolerance: f64) -> bool {
        self != other && !self.exceeds(other, tolerance) && !other.exceeds(self, tolerance)
    }
}

impl Add for Extended {
    type Output = Extended;

    fn add(self, rhs: Extended) -> Extended {
        Extended {
            finite: self.finite + rhs.finite,
            infinite: self.infinite + rhs.infinite,
        }
    }
}

impl Sub for Extended {
    type Output = Extended;

    fn sub(self, rhs: Extended) -> Extended {
        Extended {
            finite: self.finite - rhs.finite,
            infinite: self.infinite - rhs.infinite,
        }
    }
}

impl Mul<f64> for Extended {
    type Output = Extended;

    fn mul(self, rhs: f64) -> Extended {
        Extended {
            finite: self.finite * rhs,
            infinite: self.infinite * rhs,
        }
    }
}

impl Neg for Extended {
    type Output = Extended;

    fn neg(self) -> Extended {
        Extended {
            finite: -self.finite,
            infinite: -self.infinite,
        }
    }
}

pub(crate) fn dot(coefficients: &[f64], point: &[Extended]) -> Extended {
    coefficients
        .iter()
        .zip(point)
        .fold(Extended::ZERO, |acc, (&a, &x)| acc + x * a)
}

pub(crate) fn inner(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Largest absolute entry, zero for an empty slice.
pub(crate) fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |m: f64, v| m.max(v.abs()))
}
