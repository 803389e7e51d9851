use core::fmt;

/// Validation errors raised when constructing a kernel from its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required input or configuration field is empty.
    EmptyInput {
        /// Name of the empty argument.
        arg: &'static str,
    },
    /// A configuration argument value is invalid.
    InvalidArgument {
        /// Name of the argument.
        arg: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
    /// A contiguous 1D slice view could not be obtained.
    NonContiguous {
        /// Name of the non-contiguous argument.
        arg: &'static str,
    },
    /// Input/output lengths did not match the required shape.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyInput { arg } => write!(f, "Input `{arg}` was empty."),
            ConfigError::InvalidArgument { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            ConfigError::NonContiguous { arg } => {
                write!(f, "Argument `{arg}` is not contiguous in memory.")
            }
            ConfigError::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Length mismatch on `{arg}`. Expected {expected}, got {got}."
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failures reported by a [`super::ComputeBackend`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be initialised or has been released.
    Unavailable {
        /// Human readable reason.
        reason: &'static str,
    },
    /// A kernel enqueue was rejected.
    Enqueue {
        /// Name of the rejected kernel.
        kernel: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable { reason } => {
                write!(f, "Compute backend unavailable: {reason}")
            }
            BackendError::Enqueue { kernel, reason } => {
                write!(f, "Kernel `{kernel}` enqueue rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Runtime invariant violations raised by checked kernel entrypoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInvariantViolation {
    /// An execution precondition was violated.
    InvalidState {
        /// Human readable reason.
        reason: &'static str,
    },
    /// Output length mismatched the expected runtime shape.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// Adapter binding/configuration failure.
    Config(ConfigError),
    /// The compute backend rejected part of the pipeline.
    Backend(BackendError),
}

impl From<ConfigError> for ExecInvariantViolation {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<BackendError> for ExecInvariantViolation {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl fmt::Display for ExecInvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecInvariantViolation::InvalidState { reason } => {
                write!(f, "Execution invariant violation: {reason}")
            }
            ExecInvariantViolation::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Execution length mismatch on `{arg}`. Expected {expected}, got {got}."
                )
            }
            ExecInvariantViolation::Config(err) => write!(f, "{err}"),
            ExecInvariantViolation::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ExecInvariantViolation {}
