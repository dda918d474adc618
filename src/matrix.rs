//! Dense row-major matrix and the primitive operations the layers build on.
//!
//! Every operation writes into a caller-supplied destination so that the
//! training loop never allocates. Componentwise operations also come in an
//! in-place form (`add_assign`, `sub_assign`, `mul_assign`) for the case
//! where the destination is one of the operands. `multiply` and `transpose`
//! take the destination by unique borrow, so source and destination can
//! never alias.
use crate::error::{NnError, Result};
use std::fmt;

/// How a freshly created matrix is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    /// Every element is 0.0.
    Zeroed,
    /// Contents are unspecified; the caller overwrites every element
    /// before reading any of them.
    Uninit,
}

/// Rectangular buffer of `f64`, addressed as `data[row * cols + col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Allocate a `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize, init: Init) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(NnError::EmptyShape);
        }
        let len = rows
            .checked_mul(cols)
            .ok_or(NnError::AllocationFailure { rows, cols })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| NnError::AllocationFailure { rows, cols })?;
        match init {
            Init::Zeroed => data.resize(len, 0.0),
            // NaN makes a missed write visible.
            Init::Uninit => data.resize(len, f64::NAN),
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::new(rows, cols, Init::Zeroed)
    }

    /// Build a matrix from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(NnError::EmptyShape);
        }
        let len = rows
            .checked_mul(cols)
            .ok_or(NnError::AllocationFailure { rows, cols })?;
        if data.len() != len {
            return Err(NnError::DimensionMismatch {
                op: "from_vec",
                left: (rows, cols),
                right: (1, data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Single-row matrix holding `values`.
    pub fn row_vector(values: &[f64]) -> Result<Self> {
        Self::from_vec(1, values.len(), values.to_vec())
    }

    /// Allocate uninitialised and let `f(row, col)` fill every cell.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut m = Self::new(rows, cols, Init::Uninit)?;
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, f(r, c));
            }
        }
        Ok(m)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Element at `(row, col)`. The caller guarantees the index is in range.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Overwrite the element at `(row, col)`. The caller guarantees the
    /// index is in range.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Copy `source` into `self`; both must have the same shape.
    pub fn copy_from(&mut self, source: &Matrix) -> Result<()> {
        same_shape("copy", source, self)?;
        self.data.copy_from_slice(&source.data);
        Ok(())
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        same_shape("add", self, other)?;
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(x, &y)| *x += y);
        Ok(())
    }

    /// `self -= other`
    pub fn sub_assign(&mut self, other: &Matrix) -> Result<()> {
        same_shape("subtract", self, other)?;
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(x, &y)| *x -= y);
        Ok(())
    }

    /// `self ⊙= other`
    pub fn mul_assign(&mut self, other: &Matrix) -> Result<()> {
        same_shape("elementwise_multiply", self, other)?;
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(x, &y)| *x *= y);
        Ok(())
    }

    /// `self *= scalar`
    pub fn scale(&mut self, scalar: f64) {
        self.data.iter_mut().for_each(|x| *x *= scalar);
    }

    /// Reset every element to zero.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(self.data[0], f64::max)
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(self.data[0], f64::min)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Column index of the largest value in `row`. Ties resolve to the
    /// lowest index.
    pub fn argmax_row(&self, row: usize) -> usize {
        let start = row * self.cols;
        let values = &self.data[start..start + self.cols];
        values
            .iter()
            .enumerate()
            .fold(0usize, |best, (i, &v)| if v > values[best] { i } else { best })
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows {
            for c in 0..self.cols {
                write!(f, "{:.5} ", self.get(r, c))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn same_shape(op: &'static str, a: &Matrix, b: &Matrix) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(NnError::DimensionMismatch {
            op,
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(())
}

fn zip_into<F>(op: &'static str, a: &Matrix, b: &Matrix, out: &mut Matrix, f: F) -> Result<()>
where
    F: Fn(f64, f64) -> f64,
{
    same_shape(op, a, b)?;
    same_shape(op, a, out)?;
    for ((o, &x), &y) in out.data.iter_mut().zip(&a.data).zip(&b.data) {
        *o = f(x, y);
    }
    Ok(())
}

/// `out = a + b`
pub fn add(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    zip_into("add", a, b, out, |x, y| x + y)
}

/// `out = a - b`
pub fn subtract(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    zip_into("subtract", a, b, out, |x, y| x - y)
}

/// `out = a ⊙ b`
pub fn elementwise_multiply(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    zip_into("elementwise_multiply", a, b, out, |x, y| x * y)
}

/// `out = a × b`
pub fn multiply(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    if a.cols != b.rows {
        return Err(NnError::IncompatibleShape {
            left: a.shape(),
            right: b.shape(),
        });
    }
    if out.shape() != (a.rows, b.cols) {
        return Err(NnError::DimensionMismatch {
            op: "multiply",
            left: (a.rows, b.cols),
            right: out.shape(),
        });
    }
    for i in 0..a.rows {
        let a_row = &a.data[i * a.cols..(i + 1) * a.cols];
        for j in 0..b.cols {
            let mut sum = 0.0;
            for (k, &a_ik) in a_row.iter().enumerate() {
                sum += a_ik * b.data[k * b.cols + j];
            }
            out.data[i * out.cols + j] = sum;
        }
    }
    Ok(())
}

/// Write the transpose of `src` into `out`, which must be `cols x rows`.
pub fn transpose(src: &Matrix, out: &mut Matrix) -> Result<()> {
    if out.shape() != (src.cols, src.rows) {
        return Err(NnError::DimensionMismatch {
            op: "transpose",
            left: (src.cols, src.rows),
            right: out.shape(),
        });
    }
    for i in 0..src.rows {
        for j in 0..src.cols {
            out.set(j, i, src.get(i, j));
        }
    }
    Ok(())
}

/// `out = src * scalar`
pub fn scalar_multiply(src: &Matrix, scalar: f64, out: &mut Matrix) -> Result<()> {
    same_shape("scalar_multiply", src, out)?;
    for (o, &x) in out.data.iter_mut().zip(&src.data) {
        *o = x * scalar;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Matrix {
        Matrix::from_vec(rows, cols, data.to_vec()).unwrap()
    }

    #[test]
    fn test_row_major_addressing() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(a.get(0, 2), 3.0);
        assert_eq!(a.get(1, 0), 4.0);
    }

    #[test]
    fn test_zero_sized_rejected() {
        assert_eq!(Matrix::zeros(0, 3), Err(NnError::EmptyShape));
        assert_eq!(Matrix::new(2, 0, Init::Uninit), Err(NnError::EmptyShape));
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let huge = usize::MAX / 2 + 1;
        assert_eq!(
            Matrix::from_vec(huge, 2, vec![0.0; 4]),
            Err(NnError::AllocationFailure { rows: huge, cols: 2 })
        );
        assert_eq!(
            Matrix::zeros(huge, 2),
            Err(NnError::AllocationFailure { rows: huge, cols: 2 })
        );
    }

    #[test]
    fn test_multiply() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = m(3, 2, &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let mut out = Matrix::zeros(2, 2).unwrap();
        multiply(&a, &b, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_multiply_incompatible() {
        let a = Matrix::zeros(2, 3).unwrap();
        let mut out = Matrix::zeros(2, 2).unwrap();
        let err = multiply(&a, &a, &mut out).unwrap_err();
        assert_eq!(
            err,
            NnError::IncompatibleShape {
                left: (2, 3),
                right: (2, 3)
            }
        );
    }

    #[test]
    fn test_multiply_wrong_destination_untouched() {
        let a = m(1, 2, &[1.0, 2.0]);
        let b = m(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let mut out = m(2, 2, &[9.0, 9.0, 9.0, 9.0]);
        assert!(multiply(&a, &b, &mut out).is_err());
        assert_eq!(out.as_slice(), &[9.0, 9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_transpose_shape() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut t = Matrix::zeros(3, 2).unwrap();
        transpose(&a, &mut t).unwrap();
        assert_eq!(t.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let mut wrong = Matrix::zeros(2, 3).unwrap();
        assert!(transpose(&a, &mut wrong).is_err());
    }

    #[test]
    fn test_in_place_ops() {
        let mut a = m(1, 3, &[1.0, 2.0, 3.0]);
        let b = m(1, 3, &[2.0, 2.0, 2.0]);
        a.mul_assign(&b).unwrap();
        assert_eq!(a.as_slice(), &[2.0, 4.0, 6.0]);
        a.sub_assign(&b).unwrap();
        assert_eq!(a.as_slice(), &[0.0, 2.0, 4.0]);
        a.scale(0.5);
        assert_eq!(a.as_slice(), &[0.0, 1.0, 2.0]);
        a.reset();
        assert_eq!(a.sum(), 0.0);
    }

    #[test]
    fn test_copy_mismatch() {
        let a = Matrix::zeros(2, 2).unwrap();
        let mut b = Matrix::zeros(1, 4).unwrap();
        assert!(matches!(
            b.copy_from(&a),
            Err(NnError::DimensionMismatch { op: "copy", .. })
        ));
    }

    #[test]
    fn test_min_max_argmax() {
        let a = m(2, 3, &[0.1, -4.0, 0.3, 7.0, 0.2, 7.0]);
        assert_eq!(a.max(), 7.0);
        assert_eq!(a.min(), -4.0);
        assert_eq!(a.argmax_row(0), 2);
        assert_eq!(a.argmax_row(1), 0);
    }

    #[test]
    fn test_scalar_multiply() {
        let a = m(1, 2, &[1.5, -2.0]);
        let mut out = Matrix::zeros(1, 2).unwrap();
        scalar_multiply(&a, 2.0, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[3.0, -4.0]);
    }

    #[test]
    fn test_display() {
        let a = m(1, 2, &[1.0, 0.5]);
        assert_eq!(a.to_string(), "1.00000 0.50000 \n");
    }
}
