use thiserror::Error;

/// Errors surfaced by network evaluation and training setup.
///
/// Numeric trouble (division by zero, overflow to Inf/NaN) is never an
/// error: it propagates through `data` and `grad` under IEEE semantics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScalargradError {
    /// An input sequence whose length does not match the width a neuron or
    /// layer was built for. Indicates a wiring bug; not recoverable.
    #[error("shape mismatch: expected {expected} inputs, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Malformed training setup, rejected before any training happens.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
