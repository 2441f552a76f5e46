//! Owned, dense, row-major matrices.
use std::fmt;
use std::ops::{AddAssign, Index, IndexMut, Mul, MulAssign, SubAssign};
use std::slice;
use num::{One, Zero};

#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: fmt::Debug> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("mat!")?;
        let mut rows = f.debug_list();
        for row in self.rows() {
            rows.entry(&row);
        }
        rows.finish()
    }
}

impl<T: fmt::Display> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.rows() {
            for (j, x) in row.iter().enumerate() {
                if j != 0 {
                    f.write_str(" ")?;
                }
                match f.precision() {
                    Some(p) => write!(f, "{:12.*}", p, x)?,
                    None => write!(f, "{:12.6}", x)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<T> From<Vec<Vec<T>>> for Matrix<T> {
    /// Panics if the rows are ragged.
    fn from(rows: Vec<Vec<T>>) -> Self {
        let ni = rows.len();
        let nj = if ni == 0 { 0 } else { rows[0].len() };
        let mut data = Vec::with_capacity(ni * nj);
        for mut row in rows {
            assert_eq!(row.len(), nj, "rows must have equal lengths");
            data.extend(row.drain(..));
        }
        Self { data, nrows: ni, ncols: nj }
    }
}

impl<T> Matrix<T> {
    /// Returns `None` if the vector does not have exactly `nrows * ncols`
    /// elements.
    pub fn from_vec(data: Vec<T>, nrows: usize, ncols: usize)
                    -> Option<Self> {
        if data.len() != nrows * ncols {
            return None;
        }
        Some(Self { data, nrows, ncols })
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        if i < self.nrows && j < self.ncols {
            self.data.get(i * self.ncols + j)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        if i < self.nrows && j < self.ncols {
            self.data.get_mut(i * self.ncols + j)
        } else {
            None
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn rows(&self) -> slice::Chunks<T> {
        // chunks(0) panics
        self.data.chunks(self.ncols.max(1))
    }
}

impl<T: Clone> Matrix<T> {
    pub fn replicate(nrows: usize, ncols: usize, value: T) -> Self {
        Self { data: vec![value; nrows * ncols], nrows, ncols }
    }

    pub fn fill(&mut self, value: T) {
        for x in &mut self.data {
            *x = value.clone();
        }
    }

    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for j in 0 .. self.ncols {
            for i in 0 .. self.nrows {
                data.push(self[(i, j)].clone());
            }
        }
        Self { data, nrows: self.ncols, ncols: self.nrows }
    }
}

impl<T: Clone + Zero> Matrix<T> {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::replicate(nrows, ncols, T::zero())
    }
}

impl<T: Clone + Zero + One> Matrix<T> {
    /// Fills the diagonal with ones and everything else with zeros.
    pub fn set_eye(&mut self) {
        self.fill(T::zero());
        for i in 0 .. self.nrows.min(self.ncols) {
            self[(i, i)] = T::one();
        }
    }
}

impl Matrix<f64> {
    /// Sum of squares of all elements.
    pub fn norm_sqr(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    /// Frobenius norm.
    pub fn norm(&self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// Replaces a square matrix `M` with `(M + s Mᵗ) / 2`.
    pub fn symmetrize_with(&mut self, s: f64) {
        assert!(self.is_square(), "matrix must be square");
        let n = self.nrows;
        for i in 0 .. n {
            for j in i .. n {
                let x = self[(i, j)];
                let y = self[(j, i)];
                self[(i, j)] = (x + s * y) / 2.0;
                self[(j, i)] = (y + s * x) / 2.0;
            }
        }
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        assert!(i < self.nrows && j < self.ncols,
                "index ({}, {}) out of range for {}x{} matrix",
                i, j, self.nrows, self.ncols);
        &self.data[i * self.ncols + j]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        assert!(i < self.nrows && j < self.ncols,
                "index ({}, {}) out of range for {}x{} matrix",
                i, j, self.nrows, self.ncols);
        &mut self.data[i * self.ncols + j]
    }
}

impl<'a, T: AddAssign<&'a T>> AddAssign<&'a Matrix<T>> for Matrix<T> {
    /// Panics if the dimensions differ.
    fn add_assign(&mut self, other: &'a Matrix<T>) {
        assert_eq!(self.dims(), other.dims());
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += y;
        }
    }
}

impl<'a, T: SubAssign<&'a T>> SubAssign<&'a Matrix<T>> for Matrix<T> {
    /// Panics if the dimensions differ.
    fn sub_assign(&mut self, other: &'a Matrix<T>) {
        assert_eq!(self.dims(), other.dims());
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x -= y;
        }
    }
}

impl<T: MulAssign + Clone> MulAssign<T> for Matrix<T> {
    fn mul_assign(&mut self, factor: T) {
        for x in &mut self.data {
            *x *= factor.clone();
        }
    }
}

impl<T: MulAssign + Clone> Mul<T> for Matrix<T> {
    type Output = Self;
    fn mul(mut self, factor: T) -> Self::Output {
        self *= factor;
        self
    }
}
