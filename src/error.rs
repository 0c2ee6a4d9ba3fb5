use std::fmt::Debug;

use thiserror::Error;

/// Errors reported by the driver itself, as opposed to the errors of the
/// driven computations, which pass through untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error<E: Debug> {
    /// The computation failed while waiting on it
    #[error("driven computation failed: {0:?}")]
    Failed(E),

    /// The computation failed and nobody was there to receive the error
    #[error("unhandled error in driven computation: {0:?}")]
    Unhandled(E),

    /// The computation did not finish in the given time
    #[error("driven computation did not complete in time")]
    Incomplete,
}

impl<E: Debug> Error<E> {
    /// The error of the computation, if there is one
    pub fn into_inner(self) -> Option<E> {
        match self {
            Error::Failed(e) | Error::Unhandled(e) => Some(e),
            Error::Incomplete => None,
        }
    }
}

/// Results whose failures come from the driver
pub type DriveResult<T, E> = Result<T, Error<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_inner_gives_back_the_body_error() {
        assert_eq!(Error::Failed("boom").into_inner(), Some("boom"));
        assert_eq!(Error::Unhandled("lost").into_inner(), Some("lost"));
        assert_eq!(Error::<&str>::Incomplete.into_inner(), None);
    }

    #[test]
    fn messages_carry_the_body_error() {
        let e: Error<&str> = Error::Unhandled("boom");
        assert_eq!(e.to_string(), "unhandled error in driven computation: \"boom\"");
        assert_eq!(Error::<&str>::Incomplete.to_string(), "driven computation did not complete in time");
    }
}
