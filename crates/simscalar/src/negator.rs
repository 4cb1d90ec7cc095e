use bytemuck::TransparentWrapper;
use num_complex::Complex;
use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::scalar::{Inspect, Powers, ScalarKind};

/// A value of kind `K` interpreted as its arithmetic negative.
///
/// The wrapper is layout-identical to `K`; the bits of a `Negator<K>` are
/// byte-for-byte the bits of the un-negated magnitude and only the
/// interpretation differs. That makes negation a reinterpretation of
/// storage rather than a computed operation:
///
/// - [`Negator::recast`] borrows existing storage as its negative with no
///   copy and no arithmetic,
/// - [`Negator::reinterpret`] moves the bits in unchanged, so the logical
///   value is `-k`,
/// - the `From<K>` conversion is value-preserving instead: it stores `-k`
///   so the wrapper still reads back as `k`.
///
/// Every operator on the wrapper cancels signs algebraically (double
/// negation returns the inner value untouched) and is numerically identical
/// to materializing the negative first and operating normally.
#[repr(transparent)]
#[derive(Debug, Clone, Copy)]
pub struct Negator<K>(K);

// Sole layout-sensitive declaration in the crate; sound because of
// repr(transparent) above.
unsafe impl<K> TransparentWrapper<K> for Negator<K> {}

impl<K: ScalarKind> Negator<K> {
    /// Reinterprets the bits of `v` in place: the result's logical value is
    /// `-v`. No conversion, no arithmetic.
    pub fn reinterpret(v: K) -> Self {
        Negator(v)
    }

    /// Zero-copy reinterpretation of borrowed storage.
    pub fn recast(v: &K) -> &Self {
        Negator::wrap_ref(v)
    }

    /// The stored (un-negated) magnitude.
    pub fn into_inner(self) -> K {
        self.0
    }

    /// Computes the logical value, paying for the negation once.
    pub fn materialize(self) -> K {
        -self.0
    }
}

/// Converting construction preserves the numeric value: the wrapper stores
/// the computed negative so it reads back as `v`.
impl<K: ScalarKind> From<K> for Negator<K> {
    fn from(v: K) -> Self {
        Negator(-v)
    }
}

impl<K: ScalarKind> Inspect for Negator<K> {
    const TOLERANCE: f64 = <K as Inspect>::TOLERANCE;

    fn numeric(self) -> Complex<f64> {
        -self.0.numeric()
    }

    // NaN/Inf/finite flags are sign-independent and pass straight through.
    fn is_nan(self) -> bool {
        self.0.is_nan()
    }

    fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    fn is_inf(self) -> bool {
        self.0.is_inf()
    }
}

impl<K: ScalarKind> Powers for Negator<K> {
    type Out = K;

    // Even: the sign vanishes, no negation at all.
    fn square(self) -> K {
        self.0 * self.0
    }

    // Odd: a single trailing negation, the input is never materialized.
    // Plain arithmetic on the inner value, so a traced kind stays recorded.
    fn cube(self) -> K {
        -(self.0 * self.0 * self.0)
    }
}

// --- algebraic operators -------------------------------------------------
//
// (-a) ⊙ (-b) and the mixed forms are rewritten so that at most one
// negation survives, and where both signs cancel none is computed.

impl<K: ScalarKind> Neg for Negator<K> {
    type Output = K;
    fn neg(self) -> K {
        self.0
    }
}

impl<K: ScalarKind> Add for Negator<K> {
    type Output = Negator<K>;
    fn add(self, rhs: Self) -> Negator<K> {
        Negator(self.0 + rhs.0)
    }
}

impl<K: ScalarKind> Sub for Negator<K> {
    type Output = K;
    fn sub(self, rhs: Self) -> K {
        rhs.0 - self.0
    }
}

impl<K: ScalarKind> Mul for Negator<K> {
    type Output = K;
    fn mul(self, rhs: Self) -> K {
        self.0 * rhs.0
    }
}

impl<K: ScalarKind> Div for Negator<K> {
    type Output = K;
    fn div(self, rhs: Self) -> K {
        self.0 / rhs.0
    }
}

impl<K: ScalarKind> Add<K> for Negator<K> {
    type Output = K;
    fn add(self, rhs: K) -> K {
        rhs - self.0
    }
}

impl<K: ScalarKind> Sub<K> for Negator<K> {
    type Output = Negator<K>;
    fn sub(self, rhs: K) -> Negator<K> {
        Negator(self.0 + rhs)
    }
}

impl<K: ScalarKind> Mul<K> for Negator<K> {
    type Output = Negator<K>;
    fn mul(self, rhs: K) -> Negator<K> {
        Negator(self.0 * rhs)
    }
}

impl<K: ScalarKind> Div<K> for Negator<K> {
    type Output = Negator<K>;
    fn div(self, rhs: K) -> Negator<K> {
        Negator(self.0 / rhs)
    }
}

// The kind-on-the-left forms cannot be written generically (K is a foreign
// type parameter there), so they are instantiated per kind.
macro_rules! left_kind_ops {
    ($($k:ty),+ $(,)?) => {$(
        impl Add<Negator<$k>> for $k {
            type Output = $k;
            fn add(self, rhs: Negator<$k>) -> $k {
                self - rhs.0
            }
        }

        impl Sub<Negator<$k>> for $k {
            type Output = $k;
            fn sub(self, rhs: Negator<$k>) -> $k {
                self + rhs.0
            }
        }

        impl Mul<Negator<$k>> for $k {
            type Output = Negator<$k>;
            fn mul(self, rhs: Negator<$k>) -> Negator<$k> {
                Negator(self * rhs.0)
            }
        }

        impl Div<Negator<$k>> for $k {
            type Output = Negator<$k>;
            fn div(self, rhs: Negator<$k>) -> Negator<$k> {
                Negator(self / rhs.0)
            }
        }

        impl PartialEq<Negator<$k>> for $k {
            fn eq(&self, other: &Negator<$k>) -> bool {
                *self == other.materialize()
            }
        }
    )+};
}

left_kind_ops!(f32, f64, i32, crate::autodiff::Traced);

impl<K: ScalarKind> PartialEq for Negator<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K: ScalarKind> PartialEq<K> for Negator<K> {
    fn eq(&self, other: &K) -> bool {
        self.materialize() == *other
    }
}

impl<K: ScalarKind + PartialOrd> PartialOrd for Negator<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // -a < -b iff b < a.
        other.0.partial_cmp(&self.0)
    }
}
