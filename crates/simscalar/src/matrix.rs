use nalgebra::DMatrix;
use std::ops::{Add, Div, Index, IndexMut, Mul, Sub};

use crate::error::ScalarError;
use crate::negator::Negator;
use crate::promote::Promote;
use crate::scalar::ScalarKind;

/// Resizable column-major matrix over any scalar kind.
///
/// Scalar arithmetic follows the fixed-size containers: a lone scalar against
/// a matrix stands for a conforming diagonal matrix for `+`/`-` (square
/// shapes only), and is elementwise for `*`/`/`. Mixed kinds widen into
/// `Promote::Widest`, so scaling a traced matrix by a plain constant keeps
/// the recording intact.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<K> {
    nrows: usize,
    ncols: usize,
    data: Vec<K>,
}

impl<K: ScalarKind> Matrix<K> {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Matrix {
            nrows,
            ncols,
            data: vec![K::zero(); nrows * ncols],
        }
    }

    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> K) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Matrix { nrows, ncols, data }
    }

    /// Rows must all have the same length.
    pub fn from_rows(rows: &[Vec<K>]) -> Self {
        let nrows = rows.len();
        let ncols = if nrows == 0 { 0 } else { rows[0].len() };
        for row in rows {
            assert_eq!(row.len(), ncols, "ragged rows");
        }
        Matrix::from_fn(nrows, ncols, |i, j| rows[i][j])
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Column-major element iteration.
    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.data.iter()
    }

    /// Re-initializes every element to the constant through `from_real`.
    /// For a traced kind this severs the elements' derivative lineage: the
    /// derivative of anything computed from them afterwards, with respect to
    /// any prior independent, is exactly zero.
    pub fn elementwise_assign(&mut self, c: f64) {
        for e in &mut self.data {
            *e = K::from_real(c);
        }
    }

    pub fn elementwise_multiply<S>(&self, rhs: &Matrix<S>) -> Matrix<K::Widest>
    where
        K: Promote<S>,
        S: ScalarKind,
    {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) * <K as Promote<S>>::widen_rhs(rhs[(i, j)])
        })
    }

    /// Scales column `j` by `factors[j]`.
    pub fn col_scale<S>(&self, factors: &Vector<S>) -> Matrix<K::Widest>
    where
        K: Promote<S>,
        S: ScalarKind,
    {
        assert_eq!(self.ncols, factors.len());
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) * <K as Promote<S>>::widen_rhs(factors[j])
        })
    }

    /// Scales row `i` by `factors[i]`.
    pub fn row_scale<S>(&self, factors: &Vector<S>) -> Matrix<K::Widest>
    where
        K: Promote<S>,
        S: ScalarKind,
    {
        assert_eq!(self.nrows, factors.len());
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) * <K as Promote<S>>::widen_rhs(factors[i])
        })
    }

    pub fn col_scale_in_place<S>(&mut self, factors: &Vector<S>)
    where
        K: Promote<S, Widest = K>,
        S: ScalarKind,
    {
        assert_eq!(self.ncols, factors.len());
        for j in 0..self.ncols {
            let f = <K as Promote<S>>::widen_rhs(factors[j]);
            for i in 0..self.nrows {
                self[(i, j)] = self[(i, j)] * f;
            }
        }
    }

    pub fn row_scale_in_place<S>(&mut self, factors: &Vector<S>)
    where
        K: Promote<S, Widest = K>,
        S: ScalarKind,
    {
        assert_eq!(self.nrows, factors.len());
        for i in 0..self.nrows {
            let f = <K as Promote<S>>::widen_rhs(factors[i]);
            for j in 0..self.ncols {
                self[(i, j)] = self[(i, j)] * f;
            }
        }
    }

    pub fn abs(&self) -> Self {
        Matrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(|&e| e.abs()).collect(),
        }
    }

    /// Sum of conj(e) * e over all elements.
    pub fn norm_sqr(&self) -> K {
        self.data
            .iter()
            .fold(K::zero(), |acc, &e| acc + e.conj() * e)
    }

    /// Reinterprets every element as negated; bits only, the source is
    /// unchanged and no arithmetic runs.
    pub fn negate(&self) -> Matrix<Negator<K>> {
        Matrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(|&e| Negator::reinterpret(e)).collect(),
        }
    }

    /// Value-equivalent computed negation of every element.
    pub fn negate_in_place(&mut self) {
        for e in &mut self.data {
            *e = -*e;
        }
    }

    /// Guarded extraction into a plain real matrix. Fails with
    /// [`ScalarError::TapingNotAllowed`] if any element refuses extraction,
    /// i.e. for traced elements while a recording session is active.
    pub fn to_dmatrix(&self) -> Result<DMatrix<f64>, ScalarError> {
        let mut out = Vec::with_capacity(self.data.len());
        for &e in &self.data {
            out.push(e.value()?);
        }
        Ok(DMatrix::from_vec(self.nrows, self.ncols, out))
    }

    /// Gauss-Jordan inverse with partial pivoting; square shapes only.
    /// Pivots are chosen by numeric magnitude, a singular input yields
    /// non-finite elements rather than an error.
    pub fn invert(&self) -> Self {
        assert_eq!(self.nrows, self.ncols, "inverse requires a square matrix");
        let n = self.nrows;
        let mut a = self.clone();
        let mut inv = Matrix::from_fn(n, n, |i, j| if i == j { K::one() } else { K::zero() });

        for col in 0..n {
            let mut pivot = col;
            let mut best = a[(col, col)].numeric().norm();
            for r in col + 1..n {
                let mag = a[(r, col)].numeric().norm();
                if mag > best {
                    best = mag;
                    pivot = r;
                }
            }
            for j in 0..n {
                a.data.swap(j * n + col, j * n + pivot);
                inv.data.swap(j * n + col, j * n + pivot);
            }

            let p = a[(col, col)];
            for j in 0..n {
                a[(col, j)] = a[(col, j)] / p;
                inv[(col, j)] = inv[(col, j)] / p;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[(r, col)];
                for j in 0..n {
                    a[(r, j)] = a[(r, j)] - factor * a[(col, j)];
                    inv[(r, j)] = inv[(r, j)] - factor * inv[(col, j)];
                }
            }
        }

        inv
    }
}

impl<K: ScalarKind> Matrix<Negator<K>> {
    /// Computes the negated elements, one negation each.
    pub fn materialize(&self) -> Matrix<K> {
        Matrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(|n| n.materialize()).collect(),
        }
    }
}

impl<K> Index<(usize, usize)> for Matrix<K> {
    type Output = K;
    fn index(&self, (i, j): (usize, usize)) -> &K {
        &self.data[j * self.nrows + i]
    }
}

impl<K> IndexMut<(usize, usize)> for Matrix<K> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut K {
        let nrows = self.nrows;
        &mut self.data[j * nrows + i]
    }
}

impl<K, S> Add<S> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn add(self, rhs: S) -> Self::Output {
        assert_eq!(self.nrows, self.ncols, "diagonal shift requires square");
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            let w = <K as Promote<S>>::widen(self[(i, j)]);
            if i == j {
                w + <K as Promote<S>>::widen_rhs(rhs)
            } else {
                w
            }
        })
    }
}

impl<K, S> Sub<S> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn sub(self, rhs: S) -> Self::Output {
        assert_eq!(self.nrows, self.ncols, "diagonal shift requires square");
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            let w = <K as Promote<S>>::widen(self[(i, j)]);
            if i == j {
                w - <K as Promote<S>>::widen_rhs(rhs)
            } else {
                w
            }
        })
    }
}

impl<K, S> Mul<S> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn mul(self, rhs: S) -> Self::Output {
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) * <K as Promote<S>>::widen_rhs(rhs)
        })
    }
}

impl<K, S> Div<S> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn div(self, rhs: S) -> Self::Output {
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) / <K as Promote<S>>::widen_rhs(rhs)
        })
    }
}

impl<K, S> Add<Matrix<S>> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn add(self, rhs: Matrix<S>) -> Self::Output {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) + <K as Promote<S>>::widen_rhs(rhs[(i, j)])
        })
    }
}

impl<K, S> Sub<Matrix<S>> for Matrix<K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = Matrix<K::Widest>;
    fn sub(self, rhs: Matrix<S>) -> Self::Output {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        Matrix::from_fn(self.nrows, self.ncols, |i, j| {
            <K as Promote<S>>::widen(self[(i, j)]) - <K as Promote<S>>::widen_rhs(rhs[(i, j)])
        })
    }
}

/// Resizable column vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<K> {
    data: Vec<K>,
}

impl<K: ScalarKind> Vector<K> {
    pub fn new(data: Vec<K>) -> Self {
        Vector { data }
    }

    pub fn zeros(n: usize) -> Self {
        Vector {
            data: vec![K::zero(); n],
        }
    }

    pub fn from_fn(n: usize, f: impl FnMut(usize) -> K) -> Self {
        Vector {
            data: (0..n).map(f).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.data.iter()
    }

    pub fn elementwise_assign(&mut self, c: f64) {
        for e in &mut self.data {
            *e = K::from_real(c);
        }
    }

    pub fn abs(&self) -> Self {
        Vector {
            data: self.data.iter().map(|&e| e.abs()).collect(),
        }
    }

    pub fn norm_sqr(&self) -> K {
        self.data
            .iter()
            .fold(K::zero(), |acc, &e| acc + e.conj() * e)
    }

    pub fn negate(&self) -> Vector<Negator<K>> {
        Vector {
            data: self.data.iter().map(|&e| Negator::reinterpret(e)).collect(),
        }
    }

    pub fn negate_in_place(&mut self) {
        for e in &mut self.data {
            *e = -*e;
        }
    }

    /// Guarded extraction; fails like [`Matrix::to_dmatrix`].
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, ScalarError> {
        self.data.iter().map(|&e| e.value()).collect()
    }

    pub fn transpose(&self) -> RowVector<K> {
        RowVector {
            data: self.data.clone(),
        }
    }

    /// Rank-1 Moore-Penrose pseudoinverse: the conjugate transpose scaled by
    /// 1/|v|^2, so `pinv(v) * v = 1`.
    pub fn pinv(&self) -> RowVector<K> {
        let ns = self.norm_sqr();
        RowVector {
            data: self.data.iter().map(|&e| e.conj() / ns).collect(),
        }
    }
}

/// Resizable row vector, the transposed shape of [`Vector`]. Scalar division
/// by a [`Vector`] lands here, keeping the rank-1 pseudoinverse typing of the
/// fixed-size containers.
#[derive(Debug, Clone, PartialEq)]
pub struct RowVector<K> {
    data: Vec<K>,
}

impl<K: ScalarKind> RowVector<K> {
    pub fn new(data: Vec<K>) -> Self {
        RowVector { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.data.iter()
    }

    pub fn norm_sqr(&self) -> K {
        self.data
            .iter()
            .fold(K::zero(), |acc, &e| acc + e.conj() * e)
    }

    pub fn transpose(&self) -> Vector<K> {
        Vector {
            data: self.data.clone(),
        }
    }

    pub fn pinv(&self) -> Vector<K> {
        let ns = self.norm_sqr();
        Vector {
            data: self.data.iter().map(|&e| e.conj() / ns).collect(),
        }
    }
}

impl<K> Index<usize> for RowVector<K> {
    type Output = K;
    fn index(&self, i: usize) -> &K {
        &self.data[i]
    }
}

impl<K: ScalarKind> Vector<Negator<K>> {
    pub fn materialize(&self) -> Vector<K> {
        Vector {
            data: self.data.iter().map(|n| n.materialize()).collect(),
        }
    }
}

impl<K> Index<usize> for Vector<K> {
    type Output = K;
    fn index(&self, i: usize) -> &K {
        &self.data[i]
    }
}

impl<K> IndexMut<usize> for Vector<K> {
    fn index_mut(&mut self, i: usize) -> &mut K {
        &mut self.data[i]
    }
}

macro_rules! vector_scalar_op {
    ($trait:ident, $method:ident) => {
        impl<K, S> $trait<S> for Vector<K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = Vector<K::Widest>;
            fn $method(self, rhs: S) -> Self::Output {
                Vector {
                    data: self
                        .data
                        .iter()
                        .map(|&e| {
                            <K as Promote<S>>::widen(e).$method(<K as Promote<S>>::widen_rhs(rhs))
                        })
                        .collect(),
                }
            }
        }

        impl<K, S> $trait<Vector<S>> for Vector<K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = Vector<K::Widest>;
            fn $method(self, rhs: Vector<S>) -> Self::Output {
                assert_eq!(self.len(), rhs.len());
                Vector {
                    data: self
                        .data
                        .iter()
                        .zip(rhs.data.iter())
                        .map(|(&a, &b)| {
                            <K as Promote<S>>::widen(a).$method(<K as Promote<S>>::widen_rhs(b))
                        })
                        .collect(),
                }
            }
        }
    };
}

vector_scalar_op!(Add, add);
vector_scalar_op!(Sub, sub);
vector_scalar_op!(Mul, mul);
vector_scalar_op!(Div, div);

// Scalar-on-the-left forms, one instantiation per kind.
macro_rules! left_scalar_resizable {
    ($($s:ty),+ $(,)?) => {$(
        impl<K: ScalarKind> Add<Matrix<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Matrix<<$s as Promote<K>>::Widest>;
            fn add(self, rhs: Matrix<K>) -> Self::Output {
                assert_eq!(rhs.nrows, rhs.ncols, "diagonal shift requires square");
                Matrix::from_fn(rhs.nrows, rhs.ncols, |i, j| {
                    let w = <$s as Promote<K>>::widen_rhs(rhs[(i, j)]);
                    if i == j {
                        <$s as Promote<K>>::widen(self) + w
                    } else {
                        w
                    }
                })
            }
        }

        /// scalar*I minus the matrix; the off-diagonal comes out negated.
        impl<K: ScalarKind> Sub<Matrix<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Matrix<<$s as Promote<K>>::Widest>;
            fn sub(self, rhs: Matrix<K>) -> Self::Output {
                assert_eq!(rhs.nrows, rhs.ncols, "diagonal shift requires square");
                Matrix::from_fn(rhs.nrows, rhs.ncols, |i, j| {
                    let w = <$s as Promote<K>>::widen_rhs(rhs[(i, j)]);
                    if i == j {
                        <$s as Promote<K>>::widen(self) - w
                    } else {
                        -w
                    }
                })
            }
        }

        impl<K: ScalarKind> Mul<Matrix<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Matrix<<$s as Promote<K>>::Widest>;
            fn mul(self, rhs: Matrix<K>) -> Self::Output {
                Matrix::from_fn(rhs.nrows, rhs.ncols, |i, j| {
                    <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(rhs[(i, j)])
                })
            }
        }

        /// scalar / square matrix is scalar * inverse.
        impl<K: ScalarKind> Div<Matrix<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Matrix<<$s as Promote<K>>::Widest>;
            fn div(self, rhs: Matrix<K>) -> Self::Output {
                self * rhs.invert()
            }
        }

        impl<K: ScalarKind> Add<Vector<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Vector<<$s as Promote<K>>::Widest>;
            fn add(self, rhs: Vector<K>) -> Self::Output {
                Vector {
                    data: rhs
                        .data
                        .iter()
                        .map(|&e| {
                            <$s as Promote<K>>::widen(self) + <$s as Promote<K>>::widen_rhs(e)
                        })
                        .collect(),
                }
            }
        }

        impl<K: ScalarKind> Sub<Vector<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Vector<<$s as Promote<K>>::Widest>;
            fn sub(self, rhs: Vector<K>) -> Self::Output {
                Vector {
                    data: rhs
                        .data
                        .iter()
                        .map(|&e| {
                            <$s as Promote<K>>::widen(self) - <$s as Promote<K>>::widen_rhs(e)
                        })
                        .collect(),
                }
            }
        }

        impl<K: ScalarKind> Mul<Vector<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Vector<<$s as Promote<K>>::Widest>;
            fn mul(self, rhs: Vector<K>) -> Self::Output {
                Vector {
                    data: rhs
                        .data
                        .iter()
                        .map(|&e| {
                            <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(e)
                        })
                        .collect(),
                }
            }
        }

        /// scalar / vector resolves through the rank-1 pseudoinverse; the
        /// result is row-typed.
        impl<K: ScalarKind> Div<Vector<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = RowVector<<$s as Promote<K>>::Widest>;
            fn div(self, rhs: Vector<K>) -> Self::Output {
                let p = rhs.pinv();
                RowVector {
                    data: p
                        .data
                        .iter()
                        .map(|&e| {
                            <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(e)
                        })
                        .collect(),
                }
            }
        }

        impl<K: ScalarKind> Div<RowVector<K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = Vector<<$s as Promote<K>>::Widest>;
            fn div(self, rhs: RowVector<K>) -> Self::Output {
                let p = rhs.pinv();
                Vector {
                    data: p
                        .data
                        .iter()
                        .map(|&e| {
                            <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(e)
                        })
                        .collect(),
                }
            }
        }
    )+};
}

left_scalar_resizable!(f32, f64, i32, crate::autodiff::Traced);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{evaluate, gradient, jacobian, RecordingSession, Traced};
    use crate::scalar::is_numerically_equal;

    fn diag(entries: &[f64]) -> DMatrix<f64> {
        let n = entries.len();
        DMatrix::from_fn(n, n, |r, c| if r == c { entries[r] } else { 0.0 })
    }

    #[test]
    fn elementwise_assign_severs_derivative_lineage() {
        let f = |x: &[Traced], out: &mut [Traced]| {
            let mut m = Matrix::from_fn(1, 1, |_, _| x[0]);
            m.elementwise_assign(23.0);
            out[0] = m[(0, 0)] * m[(0, 0)];
        };

        let value = evaluate(21, &[3.5], 1, f).unwrap();
        assert_eq!(value[0], 529.0);

        let g = gradient(21, &[3.5], f).unwrap();
        assert_eq!(g[0], 0.0);
    }

    #[test]
    fn col_scale_jacobian_is_the_factor_diagonal() {
        let factors = Vector::new(vec![1.0, 10.0]);
        let x0 = [1.0, 2.0, 3.0, 4.0];

        let j = jacobian(22, &x0, 4, |x, out| {
            let m = Matrix::from_fn(2, 2, |i, jj| x[jj * 2 + i]);
            let scaled = m.col_scale(&factors);
            for (idx, e) in scaled.iter().enumerate() {
                out[idx] = *e;
            }
        })
        .unwrap();
        assert_eq!(j, diag(&[1.0, 1.0, 10.0, 10.0]));

        let j_inplace = jacobian(22, &x0, 4, |x, out| {
            let mut m = Matrix::from_fn(2, 2, |i, jj| x[jj * 2 + i]);
            m.col_scale_in_place(&factors);
            for (idx, e) in m.iter().enumerate() {
                out[idx] = *e;
            }
        })
        .unwrap();
        assert_eq!(j_inplace, diag(&[1.0, 1.0, 10.0, 10.0]));
    }

    #[test]
    fn row_scale_jacobian_interleaves_the_factors() {
        let factors = Vector::new(vec![1.0, 10.0]);
        let x0 = [1.0, 2.0, 3.0, 4.0];

        let j = jacobian(23, &x0, 4, |x, out| {
            let m = Matrix::from_fn(2, 2, |i, jj| x[jj * 2 + i]);
            let scaled = m.row_scale(&factors);
            for (idx, e) in scaled.iter().enumerate() {
                out[idx] = *e;
            }
        })
        .unwrap();
        assert_eq!(j, diag(&[1.0, 10.0, 1.0, 10.0]));
    }

    #[test]
    fn abs_jacobian_carries_the_sign() {
        let j = jacobian(24, &[2.0, -3.0], 2, |x, out| {
            let v = Vector::new(vec![x[0], x[1]]).abs();
            out[0] = v[0];
            out[1] = v[1];
        })
        .unwrap();
        assert_eq!(j, diag(&[1.0, -1.0]));
    }

    #[test]
    fn negation_jacobian_is_minus_identity() {
        let j = jacobian(25, &[1.0, -2.0], 2, |x, out| {
            let v = Vector::new(vec![x[0], x[1]]);
            let n = v.negate().materialize();
            out[0] = n[0];
            out[1] = n[1];
        })
        .unwrap();
        assert_eq!(j, diag(&[-1.0, -1.0]));

        let j_inplace = jacobian(25, &[1.0, -2.0], 2, |x, out| {
            let mut v = Vector::new(vec![x[0], x[1]]);
            v.negate_in_place();
            out[0] = v[0];
            out[1] = v[1];
        })
        .unwrap();
        assert_eq!(j_inplace, diag(&[-1.0, -1.0]));
    }

    #[test]
    fn norm_sqr_gradient_is_twice_the_point() {
        let g = gradient(26, &[1.5, -2.0], |x, out| {
            out[0] = Vector::new(vec![x[0], x[1]]).norm_sqr();
        })
        .unwrap();
        assert_eq!(g, vec![3.0, -4.0]);
    }

    #[test]
    fn elementwise_multiply_jacobian_is_the_constant_factor() {
        let c = Matrix::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]]);
        let j = jacobian(27, &[1.0, 2.0, 3.0, 4.0], 4, |x, out| {
            let m = Matrix::from_fn(2, 2, |i, jj| x[jj * 2 + i]);
            let p = m.elementwise_multiply(&c);
            for (idx, e) in p.iter().enumerate() {
                out[idx] = *e;
            }
        })
        .unwrap();
        // column-major element order
        assert_eq!(j, diag(&[5.0, 7.0, 6.0, 8.0]));
    }

    #[test]
    fn extraction_propagates_the_taping_guard() {
        let m = Matrix::from_fn(1, 1, |_, _| Traced::constant(2.0));
        let v = Vector::new(vec![Traced::constant(2.0)]);
        assert!(m.to_dmatrix().is_ok());
        assert!(v.to_f64_vec().is_ok());

        {
            let _session = RecordingSession::begin(9);
            assert_eq!(
                m.to_dmatrix(),
                Err(ScalarError::TapingNotAllowed { tag: 9 })
            );
            assert_eq!(
                v.to_f64_vec(),
                Err(ScalarError::TapingNotAllowed { tag: 9 })
            );
        }

        assert!(m.to_dmatrix().is_ok());
    }

    #[test]
    fn scalar_shift_is_diagonal_only() {
        let m = Matrix::from_rows(&[vec![2.0, -2.8], vec![-1.5, 1.87]]);
        let shifted = m.clone() + (-2.0);
        assert_eq!(shifted[(0, 0)], 0.0);
        assert_eq!(shifted[(0, 1)], -2.8);
        assert_eq!(shifted[(1, 0)], -1.5);
        assert_eq!(shifted[(1, 1)], 1.87 + (-2.0));

        let flipped = 3.0f64 - m;
        assert_eq!(flipped[(0, 1)], 2.8);
        assert_eq!(flipped[(0, 0)], 1.0);
    }

    #[test]
    fn division_by_square_matrix_multiplies_by_inverse() {
        let m = Matrix::from_rows(&[vec![2.0, 0.0], vec![0.0, 4.0]]);
        let inv = m.invert();
        assert_eq!(inv, Matrix::from_rows(&[vec![0.5, 0.0], vec![0.0, 0.25]]));
        assert_eq!(3.0 / m, 3.0 * inv);
    }

    #[test]
    fn dividing_by_a_vector_yields_the_pseudoinverse_row() {
        let v = Vector::new(vec![2.0, 4.0]);
        let r = 1.0f64 / v.clone();
        assert_eq!(r, RowVector::new(vec![2.0 / 20.0, 4.0 / 20.0]));

        // pinv(v) * v = 1 for any rank-1 shape
        let dot = r[0] * v[0] + r[1] * v[1];
        assert!((dot - 1.0).abs() < 1e-15);

        // dividing by the row lands back in the column shape
        let back = 1.0f64 / r;
        assert!(is_numerically_equal(back[0], v[0]));
        assert!(is_numerically_equal(back[1], v[1]));

        assert_eq!(v.transpose().transpose(), v);
    }

    #[test]
    fn vector_scalar_arithmetic_is_elementwise() {
        let v = Vector::new(vec![1.0, -2.0]);
        assert_eq!(v.clone() * 2.0, Vector::new(vec![2.0, -4.0]));
        assert_eq!(2.0 * v.clone(), v.clone() * 2.0);
        assert_eq!(v.clone() + 1.0, Vector::new(vec![2.0, -1.0]));
        assert_eq!(1.0 - v, Vector::new(vec![0.0, 3.0]));
    }
}
