use num_complex::Complex;

use crate::autodiff::Traced;
use crate::scalar::{Conjugate, ScalarKind};

/// Compile-time promotion between two scalar kinds.
///
/// `Widest` is the kind both operands can be represented in without loss and
/// is the element kind of mixed-kind arithmetic results. `Narrowest` is the
/// cheapest kind that still captures the structure of both (complexness is
/// preserved, precision is narrowed). Both resolutions are symmetric in the
/// operand order.
///
/// The traced kind dominates every builtin: arithmetic mixing a recorded
/// value with a constant must stay on the tape, so `Widest` with `Traced` is
/// always `Traced` and `Narrowest` falls back to the builtin side.
///
/// `widen`/`widen_rhs` carry the actual values into `Widest`. They take no
/// self-type hint from context, so call sites with several promotions in
/// scope use the fully qualified form `<A as Promote<B>>::widen(a)`.
pub trait Promote<Rhs: ScalarKind>: ScalarKind {
    type Widest: ScalarKind;
    type Narrowest: ScalarKind;

    fn widen(self) -> Self::Widest;
    fn widen_rhs(rhs: Rhs) -> Self::Widest;
}

/// Promoting a kind with itself is the identity and never consults the
/// lattice.
impl<K: ScalarKind> Promote<K> for K {
    type Widest = K;
    type Narrowest = K;

    fn widen(self) -> K {
        self
    }

    fn widen_rhs(rhs: K) -> K {
        rhs
    }
}

// One unordered pair per invocation; both ordered impls are generated so the
// commutativity invariant holds by construction.
macro_rules! promote_pair {
    ($a:ty, $b:ty, widest: $w:ty, narrowest: $n:ty,
     |$va:ident| $ea:expr, |$vb:ident| $eb:expr) => {
        impl Promote<$b> for $a {
            type Widest = $w;
            type Narrowest = $n;

            fn widen(self) -> $w {
                let $va = self;
                $ea
            }

            fn widen_rhs(rhs: $b) -> $w {
                let $vb = rhs;
                $eb
            }
        }

        impl Promote<$a> for $b {
            type Widest = $w;
            type Narrowest = $n;

            fn widen(self) -> $w {
                let $vb = self;
                $eb
            }

            fn widen_rhs(rhs: $a) -> $w {
                let $va = rhs;
                $ea
            }
        }
    };
}

// --- builtin lattice: integer < real, lower precision < higher ------------

promote_pair!(f32, f64, widest: f64, narrowest: f32,
    |a| f64::from(a), |b| b);
promote_pair!(i32, f32, widest: f32, narrowest: i32,
    |a| a as f32, |b| b);
promote_pair!(i32, f64, widest: f64, narrowest: i32,
    |a| f64::from(a), |b| b);

// --- real with complex: complexness wins, Narrowest keeps it ---------------

promote_pair!(f32, Complex<f32>, widest: Complex<f32>, narrowest: Complex<f32>,
    |a| Complex::new(a, 0.0), |b| b);
promote_pair!(f32, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| Complex::new(f64::from(a), 0.0), |b| b);
promote_pair!(f64, Complex<f32>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| Complex::new(a, 0.0), |b| Complex::new(f64::from(b.re), f64::from(b.im)));
promote_pair!(f64, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f64>,
    |a| Complex::new(a, 0.0), |b| b);
promote_pair!(i32, Complex<f32>, widest: Complex<f32>, narrowest: Complex<f32>,
    |a| Complex::new(a as f32, 0.0), |b| b);
promote_pair!(i32, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| Complex::new(f64::from(a), 0.0), |b| b);
promote_pair!(Complex<f32>, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| Complex::new(f64::from(a.re), f64::from(a.im)), |b| b);

// --- conjugate: stays conjugate against reals, collapses against complex ---

promote_pair!(f32, Conjugate<f32>, widest: Conjugate<f32>, narrowest: Conjugate<f32>,
    |a| Conjugate::new(a, 0.0), |b| b);
promote_pair!(f32, Conjugate<f64>, widest: Conjugate<f64>, narrowest: Conjugate<f32>,
    |a| Conjugate::new(f64::from(a), 0.0), |b| b);
promote_pair!(f64, Conjugate<f32>, widest: Conjugate<f64>, narrowest: Conjugate<f32>,
    |a| Conjugate::new(a, 0.0),
    |b| Conjugate::new(f64::from(b.re()), f64::from(-b.im())));
promote_pair!(f64, Conjugate<f64>, widest: Conjugate<f64>, narrowest: Conjugate<f64>,
    |a| Conjugate::new(a, 0.0), |b| b);
promote_pair!(Conjugate<f32>, Conjugate<f64>, widest: Conjugate<f64>, narrowest: Conjugate<f32>,
    |a| Conjugate::new(f64::from(a.re()), f64::from(-a.im())), |b| b);
promote_pair!(Conjugate<f32>, Complex<f32>, widest: Complex<f32>, narrowest: Complex<f32>,
    |a| a.as_complex(), |b| b);
promote_pair!(Conjugate<f32>, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| { let c = a.as_complex(); Complex::new(f64::from(c.re), f64::from(c.im)) },
    |b| b);
promote_pair!(Conjugate<f64>, Complex<f32>, widest: Complex<f64>, narrowest: Complex<f32>,
    |a| a.as_complex(), |b| Complex::new(f64::from(b.re), f64::from(b.im)));
promote_pair!(Conjugate<f64>, Complex<f64>, widest: Complex<f64>, narrowest: Complex<f64>,
    |a| a.as_complex(), |b| b);

// --- opaque dominance: the traced kind absorbs every builtin ---------------
//
// Widening a complex operand keeps its real component: the traced kind is
// real-valued, so there is nothing for an imaginary part to flow into. These
// pairs exist for resolver completeness, not for lossless conversion.

promote_pair!(f32, Traced, widest: Traced, narrowest: f32,
    |a| Traced::constant(f64::from(a)), |b| b);
promote_pair!(f64, Traced, widest: Traced, narrowest: f64,
    |a| Traced::constant(a), |b| b);
promote_pair!(i32, Traced, widest: Traced, narrowest: i32,
    |a| Traced::constant(f64::from(a)), |b| b);
promote_pair!(Complex<f32>, Traced, widest: Traced, narrowest: Complex<f32>,
    |a| Traced::constant(f64::from(a.re)), |b| b);
promote_pair!(Complex<f64>, Traced, widest: Traced, narrowest: Complex<f64>,
    |a| Traced::constant(a.re), |b| b);

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn widest_of<A, B>() -> TypeId
    where
        A: Promote<B> + 'static,
        B: ScalarKind + 'static,
        A::Widest: 'static,
    {
        TypeId::of::<A::Widest>()
    }

    fn narrowest_of<A, B>() -> TypeId
    where
        A: Promote<B> + 'static,
        B: ScalarKind + 'static,
        A::Narrowest: 'static,
    {
        TypeId::of::<A::Narrowest>()
    }

    #[test]
    fn self_promotion_is_identity() {
        assert_eq!(widest_of::<f64, f64>(), TypeId::of::<f64>());
        assert_eq!(narrowest_of::<f64, f64>(), TypeId::of::<f64>());
        assert_eq!(widest_of::<Traced, Traced>(), TypeId::of::<Traced>());
        assert_eq!(
            widest_of::<Conjugate<f32>, Conjugate<f32>>(),
            TypeId::of::<Conjugate<f32>>()
        );
    }

    #[test]
    fn builtin_lattice_resolves_upward() {
        assert_eq!(widest_of::<f32, f64>(), TypeId::of::<f64>());
        assert_eq!(widest_of::<i32, f32>(), TypeId::of::<f32>());
        assert_eq!(widest_of::<f32, Complex<f32>>(), TypeId::of::<Complex<f32>>());
        assert_eq!(widest_of::<f32, Complex<f64>>(), TypeId::of::<Complex<f64>>());
        assert_eq!(widest_of::<f64, Complex<f32>>(), TypeId::of::<Complex<f64>>());

        assert_eq!(narrowest_of::<f32, f64>(), TypeId::of::<f32>());
        assert_eq!(narrowest_of::<i32, f64>(), TypeId::of::<i32>());
        // complexness survives narrowing, precision does not
        assert_eq!(
            narrowest_of::<f32, Complex<f64>>(),
            TypeId::of::<Complex<f32>>()
        );
        assert_eq!(
            narrowest_of::<f64, Complex<f32>>(),
            TypeId::of::<Complex<f32>>()
        );
    }

    #[test]
    fn conjugate_survives_reals_collapses_against_complex() {
        assert_eq!(
            widest_of::<f64, Conjugate<f32>>(),
            TypeId::of::<Conjugate<f64>>()
        );
        assert_eq!(
            widest_of::<Conjugate<f32>, Complex<f64>>(),
            TypeId::of::<Complex<f64>>()
        );
        assert_eq!(
            narrowest_of::<Conjugate<f64>, Complex<f32>>(),
            TypeId::of::<Complex<f32>>()
        );
    }

    #[test]
    fn traced_dominates_every_builtin() {
        assert_eq!(widest_of::<f32, Traced>(), TypeId::of::<Traced>());
        assert_eq!(widest_of::<f64, Traced>(), TypeId::of::<Traced>());
        assert_eq!(widest_of::<i32, Traced>(), TypeId::of::<Traced>());
        assert_eq!(widest_of::<Complex<f64>, Traced>(), TypeId::of::<Traced>());
        assert_eq!(widest_of::<Traced, f64>(), TypeId::of::<Traced>());

        assert_eq!(narrowest_of::<f64, Traced>(), TypeId::of::<f64>());
        assert_eq!(narrowest_of::<Traced, f64>(), TypeId::of::<f64>());
        assert_eq!(narrowest_of::<Traced, i32>(), TypeId::of::<i32>());
    }

    #[test]
    fn promotion_commutes() {
        assert_eq!(widest_of::<f32, f64>(), widest_of::<f64, f32>());
        assert_eq!(
            widest_of::<f64, Complex<f32>>(),
            widest_of::<Complex<f32>, f64>()
        );
        assert_eq!(
            widest_of::<Conjugate<f32>, f64>(),
            widest_of::<f64, Conjugate<f32>>()
        );
        assert_eq!(narrowest_of::<i32, f64>(), narrowest_of::<f64, i32>());
        assert_eq!(
            narrowest_of::<Complex<f64>, f32>(),
            narrowest_of::<f32, Complex<f64>>()
        );
    }

    #[test]
    fn widening_preserves_values() {
        let w: f64 = <f32 as Promote<f64>>::widen(1.5f32);
        assert_eq!(w, 1.5);
        let w: f64 = <f32 as Promote<f64>>::widen_rhs(2.25);
        assert_eq!(w, 2.25);

        let w: Complex<f64> = <f64 as Promote<Complex<f32>>>::widen(-3.0);
        assert_eq!(w, Complex::new(-3.0, 0.0));
        let w: Complex<f64> = <f64 as Promote<Complex<f32>>>::widen_rhs(Complex::new(1.0f32, -2.0));
        assert_eq!(w, Complex::new(1.0, -2.0));

        let cj = Conjugate::new(1.0f32, 2.0);
        let w: Conjugate<f64> = <Conjugate<f32> as Promote<Conjugate<f64>>>::widen(cj);
        assert_eq!(f64::from(cj.re()), w.re());
        assert_eq!(f64::from(cj.im()), w.im());

        let t = <f64 as Promote<Traced>>::widen(9.45);
        assert_eq!(t, Traced::constant(9.45));
    }
}
