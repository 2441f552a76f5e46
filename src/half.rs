//! Half-integers for angular momentum quantities.
use std::fmt;
use std::ops::{Add, Div, Neg, Rem, Sub};
use num::{One, Zero};

/// Type that logically behaves like half-integers, but what is actually
/// stored is twice its logical value.
///
/// For example, `Half(3)` represents the fraction `3/2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
         Serialize, Deserialize)]
pub struct Half<T>(pub T);

impl<T> fmt::Display for Half<T>
    where T: fmt::Display + Div<Output = T> + Rem<Output = T> +
             Zero + One + Clone
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.clone().try_get() {
            Ok(x) => write!(f, "{}", x),
            Err(d) => write!(f, "{}/2", d.0),
        }
    }
}

impl<T: Add<Output = T> + Clone> From<T> for Half<T> {
    #[inline]
    fn from(t: T) -> Self {
        Half(t.clone() + t)
    }
}

impl<T> Half<T> {
    /// Unwrap to twice its logical value.
    #[inline]
    pub fn twice(self) -> T {
        self.0
    }
}

impl<T: Clone + Div<Output = T> + Rem<Output = T> + Zero + One> Half<T> {
    /// Get the value if it's half-even.  Otherwise, returns `Err(self)`.
    #[inline]
    pub fn try_get(self) -> Result<T, Half<T>> {
        let two = T::one() + T::one();
        if (self.0.clone() % two.clone()).is_zero() {
            Ok(self.0 / two)
        } else {
            Err(self)
        }
    }
}

impl<T: Ord + Sub> Half<T> {
    #[inline]
    pub fn abs_diff(self, other: Self) -> Half<T::Output> {
        if self.0 >= other.0 {
            self - other
        } else {
            other - self
        }
    }
}

impl<T: Add<U>, U> Add<Half<U>> for Half<T> {
    type Output = Half<T::Output>;
    #[inline]
    fn add(self, other: Half<U>) -> Self::Output {
        Half(self.0 + other.0)
    }
}

impl<T: Sub<U>, U> Sub<Half<U>> for Half<T> {
    type Output = Half<T::Output>;
    #[inline]
    fn sub(self, other: Half<U>) -> Self::Output {
        Half(self.0 - other.0)
    }
}

impl<T: Neg> Neg for Half<T> {
    type Output = Half<T::Output>;
    #[inline]
    fn neg(self) -> Self::Output {
        Half(-self.0)
    }
}

impl<T: Zero> Zero for Half<T> {
    #[inline]
    fn zero() -> Self {
        Half(Zero::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Half<i32> {
    /// Returns the phase `(-1)^j`, or `None` if self is half-odd.
    #[inline]
    pub fn try_phase(self) -> Option<f64> {
        self.try_get().ok().map(super::ang_mom::phase)
    }

    /// Returns the phase `(-1)^j`.
    ///
    /// Panics if self is half-odd.
    #[inline]
    pub fn phase(self) -> f64 {
        self.try_phase().expect("phase is not real")
    }

    /// Returns `(2 j + 1)^(exponent / 2)`.
    #[inline]
    pub fn weight(self, exponent: i32) -> f64 {
        ((self.twice() + 1) as f64).powf(exponent as f64 / 2.0)
    }

    /// Whether `(self, j2, j3)` obey the triangle rule: `|j1 − j2| ≤ j3 ≤
    /// j1 + j2` with `j1 + j2 + j3` integral.
    #[inline]
    pub fn triangle(self, j2: Self, j3: Self) -> bool {
        (self.0 + j2.0 + j3.0) % 2 == 0
            && self.abs_diff(j2) <= j3
            && j3 <= self + j2
    }

    /// Iterate over the values that satisfy the triangular condition, i.e.
    /// from `|self − other|` to `self + other` (inclusive) in unit steps.
    #[inline]
    pub fn tri_range(self, other: Self) -> impl Iterator<Item = Self> {
        let start = self.abs_diff(other).twice();
        let end = (self + other).twice();
        (start ..= end).step_by(2).map(Half)
    }
}
