//! 26.6 fixed-point numbers: 26 integer bits, 6 fractional bits (1/64 px).
//!
//! Arithmetic saturates at the `i32` range instead of overflowing.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct F26Dot6(pub i32);

impl F26Dot6 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(64);

    pub const fn from_int(v: i32) -> Self {
        Self(v.saturating_mul(64))
    }

    /// Nearest 1/64 to `v`.
    pub fn from_f32(v: f32) -> Self {
        Self((v * 64.0).round() as i32)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 64.0
    }

    /// Smallest whole pixel count that contains this length.
    pub const fn ceil_px(self) -> i32 {
        self.0.saturating_add(63).div_euclid(64)
    }

    pub const fn floor_px(self) -> i32 {
        self.0.div_euclid(64)
    }

    pub const fn round_px(self) -> i32 {
        self.0.saturating_add(32).div_euclid(64)
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }
}

impl fmt::Debug for F26Dot6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.to_f32())
    }
}

impl Add for F26Dot6 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for F26Dot6 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for F26Dot6 {
    type Output = Self;
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Mul<i32> for F26Dot6 {
    type Output = Self;
    fn mul(self, rhs: i32) -> Self {
        Self(self.0.saturating_mul(rhs))
    }
}

impl AddAssign for F26Dot6 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for F26Dot6 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for F26Dot6 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |a, b| a + b)
    }
}
