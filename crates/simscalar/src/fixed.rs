use std::array;
use std::ops::{Add, Div, Index, IndexMut, Mul, Sub};

use crate::negator::Negator;
use crate::promote::Promote;
use crate::scalar::ScalarKind;

// Fixed-size containers over any scalar kind. Mixed-kind arithmetic widens
// both operands into `Promote::Widest`, so a matrix of constants times a
// traced scalar yields a traced matrix and the recording is preserved.
//
// A lone scalar against a matrix shape stands for a conforming diagonal
// matrix: addition and subtraction touch the diagonal only, and
// `scalar - M` is `scalar*I - M` with the off-diagonal negated. Against a
// vector or row the scalar is elementwise, and `scalar / v` resolves through
// the rank-1 pseudoinverse to the transposed shape.

macro_rules! linear_fixed {
    ($(#[$doc:meta])* $name:ident, dual: $dual:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name<const N: usize, K>([K; N]);

        impl<const N: usize, K> $name<N, K> {
            pub fn new(elements: [K; N]) -> Self {
                $name(elements)
            }

            pub fn len(&self) -> usize {
                N
            }

            pub fn is_empty(&self) -> bool {
                N == 0
            }

            pub fn iter(&self) -> std::slice::Iter<'_, K> {
                self.0.iter()
            }
        }

        impl<const N: usize, K: ScalarKind> $name<N, K> {
            pub fn zeros() -> Self {
                $name([K::zero(); N])
            }

            pub fn from_fn(f: impl FnMut(usize) -> K) -> Self {
                $name(array::from_fn(f))
            }

            pub fn abs(self) -> Self {
                $name(self.0.map(K::abs))
            }

            /// Sum of conj(e) * e over the elements; real-valued for every
            /// kind, typed as `K`.
            pub fn norm_sqr(self) -> K {
                self.0
                    .iter()
                    .fold(K::zero(), |acc, &e| acc + e.conj() * e)
            }

            pub fn transpose(self) -> $dual<N, K> {
                $dual(self.0)
            }

            /// Rank-1 Moore-Penrose pseudoinverse: the conjugate transpose
            /// scaled by 1/|v|^2, so `pinv(v) * v = 1`.
            pub fn pinv(self) -> $dual<N, K> {
                let ns = self.norm_sqr();
                $dual(array::from_fn(|i| self.0[i].conj() / ns))
            }

            /// Reinterprets every element as negated. Copies bits only; no
            /// arithmetic is performed and the source is untouched.
            pub fn negate(self) -> $name<N, Negator<K>> {
                $name(self.0.map(Negator::reinterpret))
            }

            /// Value-equivalent computed negation of every element.
            pub fn negate_in_place(&mut self) {
                for e in &mut self.0 {
                    *e = -*e;
                }
            }
        }

        impl<const N: usize, K: ScalarKind> $name<N, Negator<K>> {
            /// Computes the negated elements, one negation each.
            pub fn materialize(self) -> $name<N, K> {
                $name(self.0.map(Negator::materialize))
            }
        }

        impl<const N: usize, K> Index<usize> for $name<N, K> {
            type Output = K;
            fn index(&self, i: usize) -> &K {
                &self.0[i]
            }
        }

        impl<const N: usize, K> IndexMut<usize> for $name<N, K> {
            fn index_mut(&mut self, i: usize) -> &mut K {
                &mut self.0[i]
            }
        }

        impl<const N: usize, K, S> Add<S> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn add(self, rhs: S) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) + <K as Promote<S>>::widen_rhs(rhs)
                }))
            }
        }

        impl<const N: usize, K, S> Sub<S> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn sub(self, rhs: S) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) - <K as Promote<S>>::widen_rhs(rhs)
                }))
            }
        }

        impl<const N: usize, K, S> Mul<S> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn mul(self, rhs: S) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) * <K as Promote<S>>::widen_rhs(rhs)
                }))
            }
        }

        impl<const N: usize, K, S> Div<S> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn div(self, rhs: S) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) / <K as Promote<S>>::widen_rhs(rhs)
                }))
            }
        }

        impl<const N: usize, K, S> Add<$name<N, S>> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn add(self, rhs: $name<N, S>) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) + <K as Promote<S>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K, S> Sub<$name<N, S>> for $name<N, K>
        where
            K: Promote<S>,
            S: ScalarKind,
        {
            type Output = $name<N, K::Widest>;
            fn sub(self, rhs: $name<N, S>) -> Self::Output {
                $name(array::from_fn(|i| {
                    <K as Promote<S>>::widen(self.0[i]) - <K as Promote<S>>::widen_rhs(rhs.0[i])
                }))
            }
        }
    };
}

linear_fixed!(
    /// Fixed-length column vector.
    FixedVec, dual: FixedRow
);
linear_fixed!(
    /// Fixed-length row vector.
    FixedRow, dual: FixedVec
);

/// Fixed-size row-major matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMat<const M: usize, const N: usize, K>([[K; N]; M]);

impl<const M: usize, const N: usize, K> FixedMat<M, N, K> {
    pub fn new(rows: [[K; N]; M]) -> Self {
        FixedMat(rows)
    }

    pub fn nrows(&self) -> usize {
        M
    }

    pub fn ncols(&self) -> usize {
        N
    }
}

impl<const M: usize, const N: usize, K: ScalarKind> FixedMat<M, N, K> {
    pub fn zeros() -> Self {
        FixedMat([[K::zero(); N]; M])
    }

    pub fn from_fn(mut f: impl FnMut(usize, usize) -> K) -> Self {
        FixedMat(array::from_fn(|i| array::from_fn(|j| f(i, j))))
    }

    pub fn transpose(self) -> FixedMat<N, M, K> {
        FixedMat::from_fn(|i, j| self.0[j][i])
    }

    pub fn abs(self) -> Self {
        FixedMat(self.0.map(|row| row.map(K::abs)))
    }

    /// Reinterprets every element as negated; bits only.
    pub fn negate(self) -> FixedMat<M, N, Negator<K>> {
        FixedMat(self.0.map(|row| row.map(Negator::reinterpret)))
    }

    /// Value-equivalent computed negation of every element.
    pub fn negate_in_place(&mut self) {
        for row in &mut self.0 {
            for e in row {
                *e = -*e;
            }
        }
    }
}

impl<const M: usize, const N: usize, K: ScalarKind> FixedMat<M, N, Negator<K>> {
    pub fn materialize(self) -> FixedMat<M, N, K> {
        FixedMat(self.0.map(|row| row.map(Negator::materialize)))
    }
}

impl<const N: usize, K: ScalarKind> FixedMat<N, N, K> {
    pub fn identity() -> Self {
        FixedMat::from_fn(|i, j| if i == j { K::one() } else { K::zero() })
    }

    /// Gauss-Jordan inverse with partial pivoting. Pivots are selected by
    /// numeric magnitude so no ordering bound is needed on `K`; a singular
    /// input divides by a zero pivot and yields non-finite elements, like
    /// scalar division does.
    pub fn invert(&self) -> Self {
        let mut a = self.0;
        let mut inv = Self::identity().0;

        for col in 0..N {
            let mut pivot = col;
            let mut best = a[col][col].numeric().norm();
            for r in col + 1..N {
                let mag = a[r][col].numeric().norm();
                if mag > best {
                    best = mag;
                    pivot = r;
                }
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let p = a[col][col];
            for j in 0..N {
                a[col][j] = a[col][j] / p;
                inv[col][j] = inv[col][j] / p;
            }
            for r in 0..N {
                if r == col {
                    continue;
                }
                let factor = a[r][col];
                for j in 0..N {
                    a[r][j] = a[r][j] - factor * a[col][j];
                    inv[r][j] = inv[r][j] - factor * inv[col][j];
                }
            }
        }

        FixedMat(inv)
    }
}

impl<const M: usize, const N: usize, K> Index<(usize, usize)> for FixedMat<M, N, K> {
    type Output = K;
    fn index(&self, (i, j): (usize, usize)) -> &K {
        &self.0[i][j]
    }
}

impl<const M: usize, const N: usize, K> IndexMut<(usize, usize)> for FixedMat<M, N, K> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut K {
        &mut self.0[i][j]
    }
}

impl<const M: usize, const N: usize, K, S> Add<S> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn add(self, rhs: S) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            let w = <K as Promote<S>>::widen(self.0[i][j]);
            if i == j {
                w + <K as Promote<S>>::widen_rhs(rhs)
            } else {
                w
            }
        })
    }
}

impl<const M: usize, const N: usize, K, S> Sub<S> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn sub(self, rhs: S) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            let w = <K as Promote<S>>::widen(self.0[i][j]);
            if i == j {
                w - <K as Promote<S>>::widen_rhs(rhs)
            } else {
                w
            }
        })
    }
}

impl<const M: usize, const N: usize, K, S> Mul<S> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn mul(self, rhs: S) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            <K as Promote<S>>::widen(self.0[i][j]) * <K as Promote<S>>::widen_rhs(rhs)
        })
    }
}

impl<const M: usize, const N: usize, K, S> Div<S> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn div(self, rhs: S) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            <K as Promote<S>>::widen(self.0[i][j]) / <K as Promote<S>>::widen_rhs(rhs)
        })
    }
}

impl<const M: usize, const N: usize, K, S> Add<FixedMat<M, N, S>> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn add(self, rhs: FixedMat<M, N, S>) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            <K as Promote<S>>::widen(self.0[i][j]) + <K as Promote<S>>::widen_rhs(rhs.0[i][j])
        })
    }
}

impl<const M: usize, const N: usize, K, S> Sub<FixedMat<M, N, S>> for FixedMat<M, N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = FixedMat<M, N, K::Widest>;
    fn sub(self, rhs: FixedMat<M, N, S>) -> Self::Output {
        FixedMat::from_fn(|i, j| {
            <K as Promote<S>>::widen(self.0[i][j]) - <K as Promote<S>>::widen_rhs(rhs.0[i][j])
        })
    }
}

/// Symmetric matrix over square storage. Single-element writes go through
/// [`SymMat::set`], which mirrors across the diagonal, so the storage is
/// symmetric at all times; every operation provided here preserves that
/// invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymMat<const N: usize, K>(FixedMat<N, N, K>);

impl<const N: usize, K: ScalarKind> SymMat<N, K> {
    pub fn zeros() -> Self {
        SymMat(FixedMat::zeros())
    }

    /// Builds from a function of the lower triangle; `f` is called with
    /// row >= col and the value is mirrored.
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> K) -> Self {
        SymMat(FixedMat::from_fn(|i, j| f(i.max(j), i.min(j))))
    }

    pub fn get(&self, i: usize, j: usize) -> K {
        self.0[(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, v: K) {
        self.0[(i, j)] = v;
        self.0[(j, i)] = v;
    }

    pub fn as_mat(&self) -> &FixedMat<N, N, K> {
        &self.0
    }

    pub fn abs(self) -> Self {
        SymMat(self.0.abs())
    }

    pub fn invert(&self) -> Self {
        SymMat(self.0.invert())
    }

    pub fn negate(self) -> SymMat<N, Negator<K>> {
        SymMat(self.0.negate())
    }

    /// Negation preserves symmetry, so the mirrored-write invariant holds.
    pub fn negate_in_place(&mut self) {
        self.0.negate_in_place();
    }
}

impl<const N: usize, K: ScalarKind> SymMat<N, Negator<K>> {
    pub fn materialize(self) -> SymMat<N, K> {
        SymMat(self.0.materialize())
    }
}

impl<const N: usize, K, S> Add<S> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn add(self, rhs: S) -> Self::Output {
        SymMat(self.0 + rhs)
    }
}

impl<const N: usize, K, S> Sub<S> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn sub(self, rhs: S) -> Self::Output {
        SymMat(self.0 - rhs)
    }
}

impl<const N: usize, K, S> Mul<S> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn mul(self, rhs: S) -> Self::Output {
        SymMat(self.0 * rhs)
    }
}

impl<const N: usize, K, S> Div<S> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn div(self, rhs: S) -> Self::Output {
        SymMat(self.0 / rhs)
    }
}

impl<const N: usize, K, S> Add<SymMat<N, S>> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn add(self, rhs: SymMat<N, S>) -> Self::Output {
        SymMat(self.0 + rhs.0)
    }
}

impl<const N: usize, K, S> Sub<SymMat<N, S>> for SymMat<N, K>
where
    K: Promote<S>,
    S: ScalarKind,
{
    type Output = SymMat<N, K::Widest>;
    fn sub(self, rhs: SymMat<N, S>) -> Self::Output {
        SymMat(self.0 - rhs.0)
    }
}

// Scalar-on-the-left forms. The self type is foreign so these cannot be
// generic in the scalar; one instantiation per kind.
macro_rules! left_scalar_fixed {
    ($($s:ty),+ $(,)?) => {$(
        impl<const N: usize, K: ScalarKind> Add<FixedVec<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedVec<N, <$s as Promote<K>>::Widest>;
            fn add(self, rhs: FixedVec<N, K>) -> Self::Output {
                FixedVec(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) + <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K: ScalarKind> Sub<FixedVec<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedVec<N, <$s as Promote<K>>::Widest>;
            fn sub(self, rhs: FixedVec<N, K>) -> Self::Output {
                FixedVec(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) - <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K: ScalarKind> Mul<FixedVec<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedVec<N, <$s as Promote<K>>::Widest>;
            fn mul(self, rhs: FixedVec<N, K>) -> Self::Output {
                FixedVec(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        /// scalar / vector resolves through the rank-1 pseudoinverse.
        impl<const N: usize, K: ScalarKind> Div<FixedVec<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedRow<N, <$s as Promote<K>>::Widest>;
            fn div(self, rhs: FixedVec<N, K>) -> Self::Output {
                self * rhs.pinv()
            }
        }

        impl<const N: usize, K: ScalarKind> Add<FixedRow<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedRow<N, <$s as Promote<K>>::Widest>;
            fn add(self, rhs: FixedRow<N, K>) -> Self::Output {
                FixedRow(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) + <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K: ScalarKind> Sub<FixedRow<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedRow<N, <$s as Promote<K>>::Widest>;
            fn sub(self, rhs: FixedRow<N, K>) -> Self::Output {
                FixedRow(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) - <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K: ScalarKind> Mul<FixedRow<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedRow<N, <$s as Promote<K>>::Widest>;
            fn mul(self, rhs: FixedRow<N, K>) -> Self::Output {
                FixedRow(array::from_fn(|i| {
                    <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(rhs.0[i])
                }))
            }
        }

        impl<const N: usize, K: ScalarKind> Div<FixedRow<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedVec<N, <$s as Promote<K>>::Widest>;
            fn div(self, rhs: FixedRow<N, K>) -> Self::Output {
                self * rhs.pinv()
            }
        }

        impl<const M: usize, const N: usize, K: ScalarKind> Add<FixedMat<M, N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedMat<M, N, <$s as Promote<K>>::Widest>;
            fn add(self, rhs: FixedMat<M, N, K>) -> Self::Output {
                FixedMat::from_fn(|i, j| {
                    let w = <$s as Promote<K>>::widen_rhs(rhs.0[i][j]);
                    if i == j {
                        <$s as Promote<K>>::widen(self) + w
                    } else {
                        w
                    }
                })
            }
        }

        /// scalar*I minus the matrix: the off-diagonal comes out negated.
        impl<const M: usize, const N: usize, K: ScalarKind> Sub<FixedMat<M, N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedMat<M, N, <$s as Promote<K>>::Widest>;
            fn sub(self, rhs: FixedMat<M, N, K>) -> Self::Output {
                FixedMat::from_fn(|i, j| {
                    let w = <$s as Promote<K>>::widen_rhs(rhs.0[i][j]);
                    if i == j {
                        <$s as Promote<K>>::widen(self) - w
                    } else {
                        -w
                    }
                })
            }
        }

        impl<const M: usize, const N: usize, K: ScalarKind> Mul<FixedMat<M, N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedMat<M, N, <$s as Promote<K>>::Widest>;
            fn mul(self, rhs: FixedMat<M, N, K>) -> Self::Output {
                FixedMat::from_fn(|i, j| {
                    <$s as Promote<K>>::widen(self) * <$s as Promote<K>>::widen_rhs(rhs.0[i][j])
                })
            }
        }

        /// scalar / square matrix is scalar * inverse.
        impl<const N: usize, K: ScalarKind> Div<FixedMat<N, N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = FixedMat<N, N, <$s as Promote<K>>::Widest>;
            fn div(self, rhs: FixedMat<N, N, K>) -> Self::Output {
                self * rhs.invert()
            }
        }

        impl<const N: usize, K: ScalarKind> Add<SymMat<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = SymMat<N, <$s as Promote<K>>::Widest>;
            fn add(self, rhs: SymMat<N, K>) -> Self::Output {
                SymMat(self + rhs.0)
            }
        }

        impl<const N: usize, K: ScalarKind> Sub<SymMat<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = SymMat<N, <$s as Promote<K>>::Widest>;
            fn sub(self, rhs: SymMat<N, K>) -> Self::Output {
                SymMat(self - rhs.0)
            }
        }

        impl<const N: usize, K: ScalarKind> Mul<SymMat<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = SymMat<N, <$s as Promote<K>>::Widest>;
            fn mul(self, rhs: SymMat<N, K>) -> Self::Output {
                SymMat(self * rhs.0)
            }
        }

        impl<const N: usize, K: ScalarKind> Div<SymMat<N, K>> for $s
        where
            $s: Promote<K>,
        {
            type Output = SymMat<N, <$s as Promote<K>>::Widest>;
            fn div(self, rhs: SymMat<N, K>) -> Self::Output {
                self * rhs.invert()
            }
        }
    )+};
}

left_scalar_fixed!(f32, f64, i32, crate::autodiff::Traced);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{gradient, jacobian};
    use crate::scalar::is_numerically_equal;
    use nalgebra::DMatrix;

    #[test]
    fn scalar_addition_touches_only_the_diagonal() {
        let m = FixedMat::new([[2.0, -2.8], [-1.5, 1.87]]);
        let shifted = m + (-2.0);
        assert_eq!(shifted[(0, 0)], 0.0);
        assert_eq!(shifted[(0, 1)], -2.8);
        assert_eq!(shifted[(1, 0)], -1.5);
        assert_eq!(shifted[(1, 1)], 1.87 + (-2.0));

        let left = -2.0 + m;
        assert_eq!(left, shifted);
    }

    #[test]
    fn scalar_minus_matrix_negates_off_diagonal() {
        let m = FixedMat::new([[2.0, -2.8], [-1.5, 1.87]]);
        let d = 3.0f64 - m;
        assert_eq!(d[(0, 0)], 1.0);
        assert_eq!(d[(0, 1)], 2.8);
        assert_eq!(d[(1, 0)], 1.5);
        assert_eq!(d[(1, 1)], 3.0 - 1.87);
    }

    #[test]
    fn vector_scalar_arithmetic_is_elementwise() {
        let v = FixedVec::new([1.0, -2.0, 4.0]);
        assert_eq!(v + 2.0, FixedVec::new([3.0, 0.0, 6.0]));
        assert_eq!(2.0 + v, v + 2.0);
        assert_eq!(v - 1.0, FixedVec::new([0.0, -3.0, 3.0]));
        assert_eq!(1.0 - v, FixedVec::new([0.0, 3.0, -3.0]));
        assert_eq!(v * 2.0, FixedVec::new([2.0, -4.0, 8.0]));
        assert_eq!(v / 2.0, FixedVec::new([0.5, -1.0, 2.0]));
    }

    #[test]
    fn mixed_kind_arithmetic_widens() {
        let v = FixedVec::new([1.0f32, -2.0]);
        let w: FixedVec<2, f64> = v + 0.5f64;
        assert_eq!(w, FixedVec::new([1.5f64, -1.5]));

        let vi = FixedVec::new([1i32, -2]);
        let wf: FixedVec<2, f64> = vi * 0.5f64;
        assert_eq!(wf, FixedVec::new([0.5, -1.0]));
    }

    #[test]
    fn containers_of_matching_shape_add_elementwise() {
        let a = FixedVec::new([1.0, 2.0]);
        let b = FixedVec::new([0.5f32, -0.5]);
        let c: FixedVec<2, f64> = a + b;
        assert_eq!(c, FixedVec::new([1.5, 1.5]));

        let m = FixedMat::new([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(m - m, FixedMat::zeros());
    }

    #[test]
    fn inverse_of_diagonal_is_exact() {
        let m = FixedMat::new([[2.0, 0.0], [0.0, 4.0]]);
        assert_eq!(m.invert(), FixedMat::new([[0.5, 0.0], [0.0, 0.25]]));
    }

    #[test]
    fn division_by_square_matrix_multiplies_by_inverse() {
        let m = FixedMat::new([[1.0, 2.0], [3.0, 4.0]]);
        let inv = m.invert();
        let expected = FixedMat::new([[-2.0, 1.0], [1.5, -0.5]]);
        for i in 0..2 {
            for j in 0..2 {
                assert!(is_numerically_equal(inv[(i, j)], expected[(i, j)]));
            }
        }
        assert_eq!(2.0 / m, 2.0 * inv);
    }

    #[test]
    fn dividing_by_a_vector_uses_the_pseudoinverse() {
        let v = FixedVec::new([2.0, 4.0]);
        let r: FixedRow<2, f64> = 1.0 / v;
        assert_eq!(r, FixedRow::new([2.0 / 20.0, 4.0 / 20.0]));

        // pinv(v) * v = 1 for any rank-1 shape
        let dot = r[0] * v[0] + r[1] * v[1];
        assert!((dot - 1.0).abs() < 1e-15);
    }

    #[test]
    fn negate_copies_bits_and_materializes_to_the_negative() {
        let v = FixedVec::new([1.5, -2.5]);
        let n = v.negate();
        assert!(is_numerically_equal(n[0], -1.5));
        assert!(is_numerically_equal(n[1], 2.5));
        assert_eq!(n.materialize(), FixedVec::new([-1.5, 2.5]));

        let m = FixedMat::new([[1.0, -2.0], [3.0, -4.0]]);
        assert_eq!(
            m.negate().materialize(),
            FixedMat::new([[-1.0, 2.0], [-3.0, 4.0]])
        );
    }

    #[test]
    fn negate_in_place_matches_computed_negation() {
        let mut v = FixedVec::new([1.5, -2.5]);
        v.negate_in_place();
        assert_eq!(v, FixedVec::new([-1.5, 2.5]));

        let mut r = FixedRow::new([0.5, -0.25]);
        r.negate_in_place();
        assert_eq!(r, FixedRow::new([-0.5, 0.25]));

        let mut m = FixedMat::new([[1.0, -2.0], [3.0, -4.0]]);
        m.negate_in_place();
        assert_eq!(m, FixedMat::new([[-1.0, 2.0], [-3.0, 4.0]]));

        let mut s = SymMat::<2, f64>::zeros();
        s.set(0, 1, 3.0);
        s.negate_in_place();
        assert_eq!(s.get(0, 1), -3.0);
        assert_eq!(s.get(1, 0), -3.0);
    }

    #[test]
    fn negate_in_place_jacobian_is_minus_identity() {
        let j = jacobian(12, &[1.0, -2.0], 2, |x, out| {
            let mut v = FixedVec::new([x[0], x[1]]);
            v.negate_in_place();
            out[0] = v[0];
            out[1] = v[1];
        })
        .unwrap();
        let minus_identity =
            DMatrix::from_fn(2, 2, |r, c| if r == c { -1.0 } else { 0.0 });
        assert_eq!(j, minus_identity);
    }

    #[test]
    fn symmetric_writes_mirror_and_scalar_ops_preserve_symmetry() {
        let mut s = SymMat::<2, f64>::zeros();
        s.set(0, 1, 3.0);
        assert_eq!(s.get(1, 0), 3.0);
        s.set(0, 0, 2.0);
        s.set(1, 1, -1.0);

        let shifted = s + 1.0;
        assert_eq!(shifted.get(0, 0), 3.0);
        assert_eq!(shifted.get(1, 1), 0.0);
        assert_eq!(shifted.get(0, 1), 3.0);
        assert_eq!(shifted.get(0, 1), shifted.get(1, 0));

        let scaled = s * 2.0;
        assert_eq!(scaled.get(0, 1), 6.0);
        assert_eq!(scaled.get(1, 0), 6.0);

        let flipped = 1.0f64 - s;
        assert_eq!(flipped.get(0, 1), -3.0);
        assert_eq!(flipped.get(1, 0), -3.0);
        assert_eq!(flipped.get(0, 0), -1.0);
    }

    #[test]
    fn traced_elements_keep_their_derivative_through_containers() {
        let g = gradient(11, &[3.0], |x, out| {
            let v = FixedVec::new([1.0, -2.0]) * x[0];
            out[0] = v.norm_sqr();
        })
        .unwrap();
        // d/dx of 5x^2
        assert!((g[0] - 30.0).abs() < 1e-12);
    }

    #[test]
    fn transpose_swaps_shape_and_preserves_elements() {
        let v = FixedVec::new([1.0, 2.0]);
        let r = v.transpose();
        assert_eq!(r, FixedRow::new([1.0, 2.0]));
        assert_eq!(r.transpose(), v);

        let m = FixedMat::new([[1.0, 2.0], [3.0, 4.0]]);
        let t = m.transpose();
        assert_eq!(t[(0, 1)], 3.0);
        assert_eq!(t.transpose(), m);
    }
}
