//! Crate-wide error type.

use std::fmt;

/// Everything that can go wrong between recording and dispatch.
///
/// None of these are recoverable inside the crate: a malformed kernel that
/// ran anyway would produce wrong numerical results, so every failure is
/// surfaced to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Call-time argument count differs from the recorded parameter count.
    Arity { expected: usize, got: usize },
    /// No vector argument was present, so no thread count can be derived.
    MissingVectorArg,
    /// An argument's kind or element type does not match the recorded
    /// parameter at the same position.
    KindMismatch {
        index: usize,
        expected: String,
        got: String,
    },
    /// A local placeholder was passed where a kernel parameter is required.
    NotAParameter(String),
    /// The assembled source failed device compilation or validation.
    Compile { device: String, message: String },
    /// Native argument-binding or enqueue failure.
    Dispatch(String),
    /// No usable compute device.
    NoDevice,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Arity { expected, got } => write!(
                f,
                "kernel takes {} argument(s), {} were supplied",
                expected, got
            ),
            Error::MissingVectorArg => {
                write!(f, "kernel needs at least one vector argument to size its dispatch")
            }
            Error::KindMismatch {
                index,
                expected,
                got,
            } => write!(
                f,
                "argument {}: expected {}, got {}",
                index, expected, got
            ),
            Error::NotAParameter(name) => write!(
                f,
                "placeholder {} is a local variable, not a kernel parameter",
                name
            ),
            Error::Compile { device, message } => {
                write!(f, "kernel failed to compile on {}: {}", device, message)
            }
            Error::Dispatch(message) => write!(f, "dispatch failed: {}", message),
            Error::NoDevice => write!(f, "no compute device available"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_specific() {
        let e = Error::Arity {
            expected: 4,
            got: 3,
        };
        assert_eq!(e.to_string(), "kernel takes 4 argument(s), 3 were supplied");

        let e = Error::KindMismatch {
            index: 2,
            expected: "vector of f32".to_string(),
            got: "scalar u32".to_string(),
        };
        assert!(e.to_string().contains("argument 2"));
    }
}
