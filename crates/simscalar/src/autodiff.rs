use anyhow::{bail, Result};
use nalgebra::DMatrix;
use num_complex::Complex;
use num_traits::{One, Zero};
use std::cell::RefCell;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::error::ScalarError;
use crate::scalar::{CastTo, Inspect, ScalarKind};

/// Identifier of a recording session, mirroring the external engine's tape
/// numbering.
pub type TapeTag = i16;

thread_local! {
    static ACTIVE_TAPES: RefCell<Vec<TapeTag>> = const { RefCell::new(Vec::new()) };
}

/// True if any recording session is active on this thread.
pub fn recording_active() -> bool {
    ACTIVE_TAPES.with(|t| !t.borrow().is_empty())
}

pub fn recording_active_for(tag: TapeTag) -> bool {
    ACTIVE_TAPES.with(|t| t.borrow().contains(&tag))
}

fn first_active_tag() -> Option<TapeTag> {
    ACTIVE_TAPES.with(|t| t.borrow().first().copied())
}

/// RAII proxy for the external engine's recording state. Sessions are
/// thread-confined; this layer only ever reads the active set, it is the
/// engine (or a test standing in for it) that begins and ends sessions.
#[derive(Debug)]
pub struct RecordingSession {
    tag: TapeTag,
}

impl RecordingSession {
    pub fn begin(tag: TapeTag) -> Self {
        ACTIVE_TAPES.with(|t| t.borrow_mut().push(tag));
        RecordingSession { tag }
    }

    pub fn tag(&self) -> TapeTag {
        self.tag
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        ACTIVE_TAPES.with(|t| {
            let mut tapes = t.borrow_mut();
            if let Some(pos) = tapes.iter().rposition(|&x| x == self.tag) {
                tapes.remove(pos);
            }
        });
    }
}

/// Forward-mode differentiable scalar: a value and the derivative carried
/// along with it. This is the opaque "recording" kind of the trait layer;
/// containers only see it through the [`ScalarKind`] capability set.
///
/// Comparison looks at the value alone; the hidden derivative never
/// affects numeric ordering or equality.
#[derive(Debug, Clone, Copy)]
pub struct Traced {
    pub(crate) val: f64,
    pub(crate) eps: f64,
}

impl Traced {
    pub(crate) fn new(val: f64, eps: f64) -> Self {
        Traced { val, eps }
    }

    /// A constant carries no derivative. Assigning a constant over a traced
    /// value is exactly what severs its recording lineage.
    pub fn constant(v: f64) -> Self {
        Traced { val: v, eps: 0.0 }
    }

    /// Guarded extraction of the concrete value; see [`ScalarError`].
    pub fn value(self) -> Result<f64, ScalarError> {
        match first_active_tag() {
            Some(tag) => Err(ScalarError::TapingNotAllowed { tag }),
            None => Ok(self.val),
        }
    }

    pub fn powi(self, n: i32) -> Self {
        Traced::new(
            self.val.powi(n),
            f64::from(n) * self.val.powi(n - 1) * self.eps,
        )
    }

    pub fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        Traced::new(s, self.eps / (2.0 * s))
    }

    pub fn exp(self) -> Self {
        let e = self.val.exp();
        Traced::new(e, e * self.eps)
    }

    pub fn ln(self) -> Self {
        Traced::new(self.val.ln(), self.eps / self.val)
    }

    pub fn sin(self) -> Self {
        Traced::new(self.val.sin(), self.eps * self.val.cos())
    }

    pub fn cos(self) -> Self {
        Traced::new(self.val.cos(), -self.eps * self.val.sin())
    }

    pub fn signum(self) -> Self {
        Traced::new(self.val.signum(), 0.0)
    }
}

impl PartialEq for Traced {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl PartialEq<f64> for Traced {
    fn eq(&self, other: &f64) -> bool {
        self.val == *other
    }
}

impl PartialEq<Traced> for f64 {
    fn eq(&self, other: &Traced) -> bool {
        *self == other.val
    }
}

impl PartialOrd for Traced {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

impl Add for Traced {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Traced::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Traced {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Traced::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Traced {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Traced::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Traced {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Traced::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl Neg for Traced {
    type Output = Self;
    fn neg(self) -> Self {
        Traced::new(-self.val, -self.eps)
    }
}

impl AddAssign for Traced {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Traced {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Traced {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Traced {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// Mixed forms with plain reals, so expressions like `3.0 * x` read naturally.
impl Add<f64> for Traced {
    type Output = Self;
    fn add(self, rhs: f64) -> Self {
        Traced::new(self.val + rhs, self.eps)
    }
}

impl Add<Traced> for f64 {
    type Output = Traced;
    fn add(self, rhs: Traced) -> Traced {
        Traced::new(self + rhs.val, rhs.eps)
    }
}

impl Sub<f64> for Traced {
    type Output = Self;
    fn sub(self, rhs: f64) -> Self {
        Traced::new(self.val - rhs, self.eps)
    }
}

impl Sub<Traced> for f64 {
    type Output = Traced;
    fn sub(self, rhs: Traced) -> Traced {
        Traced::new(self - rhs.val, -rhs.eps)
    }
}

impl Mul<f64> for Traced {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Traced::new(self.val * rhs, self.eps * rhs)
    }
}

impl Mul<Traced> for f64 {
    type Output = Traced;
    fn mul(self, rhs: Traced) -> Traced {
        Traced::new(self * rhs.val, self * rhs.eps)
    }
}

impl Div<f64> for Traced {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Traced::new(self.val / rhs, self.eps / rhs)
    }
}

impl Div<Traced> for f64 {
    type Output = Traced;
    fn div(self, rhs: Traced) -> Traced {
        Traced::constant(self) / rhs
    }
}

impl Zero for Traced {
    fn zero() -> Self {
        Traced::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Traced {
    fn one() -> Self {
        Traced::constant(1.0)
    }
}

impl Inspect for Traced {
    const TOLERANCE: f64 = 1e-10;

    fn numeric(self) -> Complex<f64> {
        Complex::new(self.val, 0.0)
    }
}

impl ScalarKind for Traced {
    fn from_real(v: f64) -> Self {
        Traced::constant(v)
    }

    fn abs(self) -> Self {
        Traced::new(
            self.val.abs(),
            if self.val >= 0.0 { self.eps } else { -self.eps },
        )
    }

    fn conj(self) -> Self {
        self
    }

    fn value(self) -> Result<f64, ScalarError> {
        Traced::value(self)
    }
}

// Narrowing a traced scalar is extraction and shares the guard; the
// identity cast is covered by the blanket impl and stays permitted while
// recording.
impl CastTo<f64> for Traced {
    fn cast(self) -> Result<f64, ScalarError> {
        self.value()
    }
}

impl CastTo<f32> for Traced {
    fn cast(self) -> Result<f32, ScalarError> {
        self.value().map(|v| v as f32)
    }
}

impl CastTo<Traced> for f64 {
    fn cast(self) -> Result<Traced, ScalarError> {
        Ok(Traced::constant(self))
    }
}

impl CastTo<Traced> for f32 {
    fn cast(self) -> Result<Traced, ScalarError> {
        Ok(Traced::constant(f64::from(self)))
    }
}

// ---------------------------------------------------------------------------
// Derivative drivers
// ---------------------------------------------------------------------------
//
// The consumed surface of the external differentiation engine: replay a
// recorded function and extract its partials. `f` maps independents to
// dependents through ordinary traced arithmetic and is total; each sweep
// runs under an active session with the given tag so that any illegal
// extraction inside `f` surfaces as TapingNotAllowed.

/// Replays the function value at `x`.
pub fn evaluate<F>(tag: TapeTag, x: &[f64], m: usize, f: F) -> Result<Vec<f64>>
where
    F: Fn(&[Traced], &mut [Traced]),
{
    if x.is_empty() {
        bail!("Evaluation requires at least one independent variable.");
    }
    if m == 0 {
        bail!("Evaluation requires at least one dependent variable.");
    }

    let _session = RecordingSession::begin(tag);
    let inputs: Vec<Traced> = x.iter().map(|&v| Traced::constant(v)).collect();
    let mut out = vec![Traced::zero(); m];
    f(&inputs, &mut out);
    Ok(out.iter().map(|t| t.val).collect())
}

/// Gradient of a scalar-valued function (single dependent variable).
pub fn gradient<F>(tag: TapeTag, x: &[f64], f: F) -> Result<Vec<f64>>
where
    F: Fn(&[Traced], &mut [Traced]),
{
    let j = jacobian(tag, x, 1, f)?;
    Ok(j.row(0).iter().copied().collect())
}

/// Jacobian of f: R(n) -> R(m) at `x`, one forward sweep per independent.
pub fn jacobian<F>(tag: TapeTag, x: &[f64], m: usize, f: F) -> Result<DMatrix<f64>>
where
    F: Fn(&[Traced], &mut [Traced]),
{
    if x.is_empty() {
        bail!("Jacobian requires at least one independent variable.");
    }
    if m == 0 {
        bail!("Jacobian requires at least one dependent variable.");
    }

    let n = x.len();
    let mut partials = DMatrix::zeros(m, n);
    let mut inputs = vec![Traced::zero(); n];
    let mut out = vec![Traced::zero(); m];

    for col in 0..n {
        let _session = RecordingSession::begin(tag);
        for (i, input) in inputs.iter_mut().enumerate() {
            *input = Traced::new(x[i], if i == col { 1.0 } else { 0.0 });
        }
        f(&inputs, &mut out);
        for (row, dep) in out.iter().enumerate() {
            partials[(row, col)] = dep.eps;
        }
    }

    Ok(partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negator::Negator;
    use crate::scalar::{cube, square};

    #[test]
    fn value_guarded_only_while_recording() {
        let a = Traced::constant(5.0);
        assert_eq!(a.value().unwrap(), 5.0);

        {
            let session = RecordingSession::begin(0);
            assert_eq!(
                a.value(),
                Err(ScalarError::TapingNotAllowed { tag: session.tag() })
            );
        }

        assert_eq!(a.value().unwrap(), 5.0);
    }

    #[test]
    fn narrowing_cast_guarded_identity_cast_exempt() {
        let a = Traced::constant(5.0);
        let b: f64 = a.cast().unwrap();
        assert_eq!(b, 5.0);

        {
            let _session = RecordingSession::begin(3);
            let narrowed: Result<f64, ScalarError> = a.cast();
            assert!(matches!(
                narrowed,
                Err(ScalarError::TapingNotAllowed { tag: 3 })
            ));
        }

        {
            let _session = RecordingSession::begin(4);
            let same: Traced = a.cast().unwrap();
            assert_eq!(same, a);
        }
    }

    #[test]
    fn simple_derivative() {
        // y = 3x^3 + cos x + 1, dy/dx = 9x^2 - sin x
        let xp = [-2.3];
        let g = gradient(1, &xp, |x, out| {
            out[0] = 3.0 * x[0].powi(3) + x[0].cos() + 1.0;
        })
        .unwrap();
        let expected = 9.0 * xp[0].powi(2) - xp[0].sin();
        assert!((g[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn negation_by_reinterpretation_stays_on_tape() {
        // y = -(x^3) via the negator, evaluated and differentiated at x = 2.
        let xp = [2.0];
        let f = evaluate(2, &xp, 1, |x, out| {
            let result = x[0].powi(3);
            out[0] = Negator::recast(&result).materialize();
        })
        .unwrap();
        assert_eq!(f[0], -8.0);

        let g = gradient(2, &xp, |x, out| {
            let result = x[0].powi(3);
            out[0] = Negator::recast(&result).materialize();
        })
        .unwrap();
        assert_eq!(g[0], -3.0 * square(xp[0]));
    }

    #[test]
    fn cube_of_negated_matches_computed_negation() {
        let xp = [2.0];
        let j = jacobian(5, &xp, 2, |x, out| {
            out[0] = cube(-x[0]);
            out[1] = cube(*Negator::recast(&x[0]));
        })
        .unwrap();
        assert_eq!(j[(0, 0)], -3.0 * square(xp[0]));
        assert_eq!(j[(1, 0)], -3.0 * square(xp[0]));

        let f = evaluate(5, &xp, 2, |x, out| {
            out[0] = cube(-x[0]);
            out[1] = cube(*Negator::recast(&x[0]));
        })
        .unwrap();
        assert_eq!(f[0], cube(-xp[0]));
        assert_eq!(f[1], cube(-xp[0]));
    }

    #[test]
    fn drivers_validate_input() {
        assert!(jacobian(0, &[], 1, |_, _| {}).is_err());
        assert!(jacobian(0, &[1.0], 0, |_, _| {}).is_err());
        assert!(evaluate(0, &[], 1, |_, _| {}).is_err());
    }

    #[test]
    fn sessions_nest_and_unwind() {
        assert!(!recording_active());
        let outer = RecordingSession::begin(7);
        {
            let _inner = RecordingSession::begin(8);
            assert!(recording_active_for(7));
            assert!(recording_active_for(8));
        }
        assert!(recording_active_for(7));
        assert!(!recording_active_for(8));
        drop(outer);
        assert!(!recording_active());
    }
}
