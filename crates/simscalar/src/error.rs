use thiserror::Error;

use crate::autodiff::TapeTag;

/// The single domain error of this crate.
///
/// Every arithmetic, classification and promotion operation is total; the
/// only failure path is extracting a concrete value out of a traced scalar
/// while a recording session is active. Doing so would silently desynchronize
/// the recorded computation graph from the value used downstream, so it is
/// rejected instead of guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScalarError {
    #[error("cannot extract a concrete value from a traced scalar while tape {tag} is recording")]
    TapingNotAllowed { tag: TapeTag },
}
