//! Error types for pulse-train compilation.

use thiserror::Error;

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that can occur while compiling a stimulus train
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// No instruction clock divisor in the legal range lets the stimulus fit in the FIFO
    #[error(
        "Stimulus of {stimulus_us} us does not fit a FIFO of {fifo_size} samples \
         (stride {stride}) at any divisor up to {max_ticks} ticks"
    )]
    TimingUnsatisfiable {
        stimulus_us: f64,
        fifo_size: usize,
        stride: usize,
        max_ticks: u32,
    },

    /// Stimulus parameters that cannot be compiled
    #[error("Invalid stimulus: {0}")]
    InvalidSpec(String),

    /// A composition stage received a buffer of the wrong shape
    #[error("Buffer size mismatch in {stage}: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl CompileError {
    /// Check if this error comes from the clock-divisor search
    pub fn is_timing(&self) -> bool {
        matches!(self, CompileError::TimingUnsatisfiable { .. })
    }
}
