use num_complex::Complex;
use num_traits::{Float, One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::ScalarError;

/// Classification predicates shared by every scalar kind, including the
/// negated wrapper. Everything here is a pure read of the current numeric
/// value: predicates never touch recording state and may be called freely
/// while a tape is active.
pub trait Inspect: Copy {
    /// Default tolerance for approximate comparison, scaled by magnitude.
    const TOLERANCE: f64;

    /// Unguarded peek at the current numeric value, as a complex number so
    /// that real, complex and conjugate kinds share one representation.
    ///
    /// This is an inspection primitive for classification and comparison.
    /// It must never be fed back into a recorded computation; the guarded
    /// path for that is [`ScalarKind::value`].
    fn numeric(self) -> Complex<f64>;

    fn is_nan(self) -> bool {
        let v = self.numeric();
        v.re.is_nan() || v.im.is_nan()
    }

    fn is_finite(self) -> bool {
        let v = self.numeric();
        v.re.is_finite() && v.im.is_finite()
    }

    fn is_inf(self) -> bool {
        let v = self.numeric();
        v.re.is_infinite() || v.im.is_infinite()
    }

    /// IEEE sign bit of the (real part of the) logical value, so that a
    /// negated zero reports a set sign bit just like `-0.0` does.
    fn sign_bit(self) -> bool {
        self.numeric().re.is_sign_negative()
    }

    /// -1, 0 or 1 by comparison of the real part against zero.
    fn sign(self) -> i32 {
        let re = self.numeric().re;
        if re > 0.0 {
            1
        } else if re < 0.0 {
            -1
        } else {
            0
        }
    }
}

/// The full capability set a type needs to serve as a container element:
/// classification, closed arithmetic, constant construction and guarded
/// value extraction. This is the sole contract a new scalar kind has to
/// satisfy to plug into the vector/matrix types.
pub trait ScalarKind:
    Inspect
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Builds this kind from a plain real constant. For the traced kind this
    /// re-initializes the element to a constant and thereby severs any
    /// derivative lineage the previous value carried.
    fn from_real(v: f64) -> Self;

    fn abs(self) -> Self;

    /// Complex conjugate; identity for real kinds.
    fn conj(self) -> Self;

    /// Extracts the plain real magnitude of the value.
    ///
    /// For the traced kind this fails with
    /// [`ScalarError::TapingNotAllowed`] while a recording session is
    /// active; see the crate-level discussion in `autodiff`.
    fn value(self) -> Result<f64, ScalarError>;
}

// ---------------------------------------------------------------------------
// Built-in real and integer kinds
// ---------------------------------------------------------------------------

macro_rules! real_kind {
    ($t:ty, $tol:expr) => {
        impl Inspect for $t {
            const TOLERANCE: f64 = $tol;

            fn numeric(self) -> Complex<f64> {
                Complex::new(self as f64, 0.0)
            }
        }

        impl ScalarKind for $t {
            fn from_real(v: f64) -> Self {
                v as $t
            }

            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            fn conj(self) -> Self {
                self
            }

            fn value(self) -> Result<f64, ScalarError> {
                Ok(self as f64)
            }
        }
    };
}

real_kind!(f32, 1e-5);
real_kind!(f64, 1e-10);
real_kind!(i32, 1e-10);

// ---------------------------------------------------------------------------
// Complex kinds
// ---------------------------------------------------------------------------

macro_rules! complex_kind {
    ($t:ty, $tol:expr) => {
        impl Inspect for Complex<$t> {
            const TOLERANCE: f64 = $tol;

            fn numeric(self) -> Complex<f64> {
                Complex::new(self.re as f64, self.im as f64)
            }
        }

        impl ScalarKind for Complex<$t> {
            fn from_real(v: f64) -> Self {
                Complex::new(v as $t, 0.0)
            }

            fn abs(self) -> Self {
                Complex::new(self.norm(), 0.0)
            }

            fn conj(self) -> Self {
                Complex::conj(&self)
            }

            fn value(self) -> Result<f64, ScalarError> {
                Ok(self.re as f64)
            }
        }
    };
}

complex_kind!(f32, 1e-5);
complex_kind!(f64, 1e-10);

// ---------------------------------------------------------------------------
// Conjugate kind
// ---------------------------------------------------------------------------

/// A complex number stored as-is but interpreted as its conjugate.
///
/// `Conjugate::new(re, im)` represents `re - im*i` while storing `(re, im)`
/// untouched. Arithmetic operates on the stored representation directly,
/// which is sound because conjugation distributes over `+`, `-`, `*` and
/// `/`; the conjugation itself is never materialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conjugate<T>(Complex<T>);

impl<T: Float> Conjugate<T> {
    pub fn new(re: T, im: T) -> Self {
        Conjugate(Complex::new(re, im))
    }

    pub fn re(self) -> T {
        self.0.re
    }

    /// The imaginary component of the logical (conjugated) value.
    pub fn im(self) -> T {
        -self.0.im
    }

    /// Materializes the logical value as an ordinary complex number.
    pub fn as_complex(self) -> Complex<T> {
        Complex::new(self.0.re, -self.0.im)
    }
}

impl<T: Float> Add for Conjugate<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Conjugate(self.0 + rhs.0)
    }
}

impl<T: Float> Sub for Conjugate<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Conjugate(self.0 - rhs.0)
    }
}

impl<T: Float> Mul for Conjugate<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Conjugate(self.0 * rhs.0)
    }
}

impl<T: Float> Div for Conjugate<T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Conjugate(self.0 / rhs.0)
    }
}

impl<T: Float> Neg for Conjugate<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Conjugate(-self.0)
    }
}

impl<T: Float> Zero for Conjugate<T> {
    fn zero() -> Self {
        Conjugate(Complex::zero())
    }
    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl<T: Float> One for Conjugate<T> {
    fn one() -> Self {
        Conjugate(Complex::one())
    }
}

macro_rules! conjugate_kind {
    ($t:ty, $tol:expr) => {
        impl Inspect for Conjugate<$t> {
            const TOLERANCE: f64 = $tol;

            fn numeric(self) -> Complex<f64> {
                Complex::new(self.0.re as f64, -(self.0.im as f64))
            }
        }

        impl ScalarKind for Conjugate<$t> {
            fn from_real(v: f64) -> Self {
                Conjugate(Complex::new(v as $t, 0.0))
            }

            fn abs(self) -> Self {
                Conjugate(Complex::new(self.0.norm(), 0.0))
            }

            fn conj(self) -> Self {
                Conjugate(self.0.conj())
            }

            fn value(self) -> Result<f64, ScalarError> {
                Ok(self.0.re as f64)
            }
        }
    };
}

conjugate_kind!(f32, 1e-5);
conjugate_kind!(f64, 1e-10);

// ---------------------------------------------------------------------------
// Casting
// ---------------------------------------------------------------------------

/// Conversion between scalar kinds under the extraction policy.
///
/// Casting any kind to itself is always permitted, even while a recording
/// session is active: it is an identity operation, not a value extraction.
/// Narrowing a traced scalar to a plain representation is extraction and is
/// guarded the same way as [`ScalarKind::value`].
pub trait CastTo<R>: Sized {
    fn cast(self) -> Result<R, ScalarError>;
}

impl<K: ScalarKind> CastTo<K> for K {
    fn cast(self) -> Result<K, ScalarError> {
        Ok(self)
    }
}

macro_rules! lossless_cast {
    ($from:ty => $to:ty) => {
        impl CastTo<$to> for $from {
            fn cast(self) -> Result<$to, ScalarError> {
                Ok(self as $to)
            }
        }
    };
}

lossless_cast!(f32 => f64);
lossless_cast!(f64 => f32);
lossless_cast!(i32 => f32);
lossless_cast!(i32 => f64);

// ---------------------------------------------------------------------------
// Parity-aware powers
// ---------------------------------------------------------------------------

/// Squaring and cubing with the sign handled at the type level.
///
/// The blanket impl covers every ordinary kind. The negated wrapper gets its
/// own impl that exploits parity: squaring drops the sign entirely and
/// cubing folds it into a single trailing negation, so the wrapped value is
/// never materialized as a negative first.
pub trait Powers: Copy {
    type Out: ScalarKind;
    fn square(self) -> Self::Out;
    fn cube(self) -> Self::Out;
}

impl<K: ScalarKind> Powers for K {
    type Out = K;

    fn square(self) -> K {
        self * self
    }

    fn cube(self) -> K {
        self * self * self
    }
}

pub fn square<T: Powers>(x: T) -> T::Out {
    x.square()
}

pub fn cube<T: Powers>(x: T) -> T::Out {
    x.cube()
}

// ---------------------------------------------------------------------------
// Clamping
// ---------------------------------------------------------------------------

pub fn clamp<K: ScalarKind + PartialOrd>(low: K, v: K, high: K) -> K {
    if v < low {
        low
    } else if v > high {
        high
    } else {
        v
    }
}

pub fn clamp_in_place<K: ScalarKind + PartialOrd>(low: K, v: &mut K, high: K) -> K {
    *v = clamp(low, *v, high);
    *v
}

// ---------------------------------------------------------------------------
// Smooth step family
// ---------------------------------------------------------------------------
//
// C2-continuous quintic step and its first three derivatives, generic over
// the scalar kind so the whole family stays differentiable for traced
// values. The argument is expected in [0, 1] for step_up/step_down; outside
// that range the polynomial is extrapolated as-is.

pub fn step_up<K: ScalarKind>(y: K) -> K {
    let c10 = K::from_real(10.0);
    let c15 = K::from_real(15.0);
    let c6 = K::from_real(6.0);
    y * y * y * (c10 + y * (c6 * y - c15))
}

pub fn step_down<K: ScalarKind>(y: K) -> K {
    K::one() - step_up(y)
}

/// General step from y0 to y0+y_range as x runs from x0 over 1/one_over_x_range.
pub fn step_any<K: ScalarKind>(y0: K, y_range: K, x0: K, one_over_x_range: K, x: K) -> K {
    let y = (x - x0) * one_over_x_range;
    y0 + y_range * step_up(y)
}

pub fn dstep_up<K: ScalarKind>(y: K) -> K {
    let c30 = K::from_real(30.0);
    let ym1 = y - K::one();
    c30 * y * y * ym1 * ym1
}

pub fn dstep_down<K: ScalarKind>(y: K) -> K {
    -dstep_up(y)
}

pub fn dstep_any<K: ScalarKind>(y_range: K, x0: K, one_over_x_range: K, x: K) -> K {
    let y = (x - x0) * one_over_x_range;
    y_range * one_over_x_range * dstep_up(y)
}

pub fn d2step_up<K: ScalarKind>(y: K) -> K {
    let c60 = K::from_real(60.0);
    let c1 = K::one();
    let c2 = K::from_real(2.0);
    let c3 = K::from_real(3.0);
    c60 * y * (c1 - c3 * y + c2 * y * y)
}

pub fn d2step_down<K: ScalarKind>(y: K) -> K {
    -d2step_up(y)
}

pub fn d2step_any<K: ScalarKind>(y_range: K, x0: K, one_over_x_range: K, x: K) -> K {
    let y = (x - x0) * one_over_x_range;
    y_range * one_over_x_range * one_over_x_range * d2step_up(y)
}

pub fn d3step_up<K: ScalarKind>(y: K) -> K {
    let c60 = K::from_real(60.0);
    let c360 = K::from_real(360.0);
    c60 - c360 * y + c360 * y * y
}

pub fn d3step_down<K: ScalarKind>(y: K) -> K {
    -d3step_up(y)
}

pub fn d3step_any<K: ScalarKind>(y_range: K, x0: K, one_over_x_range: K, x: K) -> K {
    let y = (x - x0) * one_over_x_range;
    y_range * one_over_x_range * one_over_x_range * one_over_x_range * d3step_up(y)
}

// ---------------------------------------------------------------------------
// Approximate comparison
// ---------------------------------------------------------------------------

/// Numeric equality across possibly different kinds, within the looser of
/// the two kinds' default tolerances, scaled by magnitude.
pub fn is_numerically_equal<A: Inspect, B: Inspect>(a: A, b: B) -> bool {
    let tol = if A::TOLERANCE > B::TOLERANCE {
        A::TOLERANCE
    } else {
        B::TOLERANCE
    };
    let x = a.numeric();
    let y = b.numeric();
    let scale = x.norm().max(y.norm()).max(1.0);
    (x - y).norm() <= tol * scale
}
