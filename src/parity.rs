//! Parity data type.
use std::fmt;
use std::ops::{Add, Rem};
use num::{One, Zero};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
         Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::Even
    }
}

impl Parity {
    #[inline]
    pub fn of<T: Rem<Output = T> + Zero + One>(i: T) -> Self {
        if (i % (T::one() + T::one())).is_zero() {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    #[inline]
    pub fn sign_f64(self) -> f64 {
        match self {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        }
    }

    #[inline]
    pub fn sign_char(self) -> char {
        match self {
            Parity::Even => '+',
            Parity::Odd => '-',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sign_char())
    }
}

impl From<Parity> for i32 {
    #[inline]
    fn from(p: Parity) -> Self {
        match p {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }
}

impl From<Parity> for u32 {
    #[inline]
    fn from(p: Parity) -> Self {
        match p {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }
}

impl Add for Parity {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self::Output {
        let p1: i32 = self.into();
        let p2: i32 = other.into();
        Parity::of(p1 ^ p2)
    }
}

impl Zero for Parity {
    #[inline]
    fn zero() -> Self {
        Parity::Even
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self == &Self::zero()
    }
}

/// Sort a pair, returning the parity of the permutation.
#[inline]
pub fn sort2<T: Ord>(a: T, b: T) -> (Parity, T, T) {
    if b < a {
        (Parity::Odd, b, a)
    } else {
        (Parity::Even, a, b)
    }
}
