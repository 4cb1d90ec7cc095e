/// The `simscalar` crate provides the scalar-kind layer for mixed-precision
/// and auto-differentiable numerics. It is generic over a small set of scalar
/// kinds (`f32`/`f64`/`i32`, complex, lazy-conjugate, and the opaque traced
/// kind) and keeps container arithmetic consistent across all of them.
///
/// Key components:
/// - **Scalar**: `Inspect`/`ScalarKind` capability traits, cast policy, sign
///   and power helpers, the smooth-step family.
/// - **Promote**: compile-time `Widest`/`Narrowest` resolution for mixed-kind
///   arithmetic, with the traced kind dominating every builtin.
/// - **Negator**: negation by reinterpretation of storage rather than by
///   computation.
/// - **Autodiff**: the `Traced` forward-mode scalar, the recording-session
///   guard behind `TapingNotAllowed`, and the derivative drivers.
/// - **Containers**: fixed-size `FixedVec`/`FixedRow`/`FixedMat`/`SymMat` and
///   resizable `Matrix`/`Vector` with kind-promoting scalar arithmetic.
pub mod autodiff;
pub mod error;
pub mod fixed;
pub mod matrix;
pub mod negator;
pub mod promote;
pub mod scalar;

pub use autodiff::{evaluate, gradient, jacobian, RecordingSession, TapeTag, Traced};
pub use error::ScalarError;
pub use fixed::{FixedMat, FixedRow, FixedVec, SymMat};
pub use matrix::{Matrix, RowVector, Vector};
pub use negator::Negator;
pub use promote::Promote;
pub use scalar::{CastTo, Conjugate, Inspect, Powers, ScalarKind};
