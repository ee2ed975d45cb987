use std::fmt;

use thiserror::Error;

/// Errors produced by identity type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hash {0:?}: expected 12 characters from [a-z2-7]")]
    InvalidHash(String),

    #[error("invalid hour: {0}")]
    InvalidHour(String),

    #[error("unrecognized download file name: {0}")]
    InvalidDFileName(String),

    #[error("unrecognized archive file name: {0}")]
    InvalidAFileName(String),

    #[error("unknown compression format: {0}")]
    UnknownCompressionFormat(String),
}

/// Result alias for identity type operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// A collection of independent errors gathered from sibling operations.
///
/// Loops over independent units of work (fan-out writes, per-hour merges,
/// per-problem fixes) run every unit to completion and then report all
/// failures together through this type rather than stopping at the first.
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

impl<E> MultiError<E> {
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    /// `Ok(())` when no errors were collected.
    pub fn check(errors: Vec<E>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::new(errors))
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            errors => {
                write!(f, "{} errors:", errors.len())?;
                for err in errors {
                    write!(f, "\n  - {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for MultiError<E> {}

impl<E> FromIterator<E> for MultiError<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
