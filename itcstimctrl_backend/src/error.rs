//! Device controller error types

use itccompiler_backend::CompileError;
use thiserror::Error;

use crate::transport::ItcStatus;

/// Result type for device operations
pub type StimResult<T> = Result<T, StimError>;

/// Errors surfaced by the stimulus device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StimError {
    /// Open or initialization failed and running without hardware is not permitted
    #[error("ITC-18 unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stimulus could not be compiled; any previously loaded program is untouched
    #[error("Compile failed: {0}")]
    Compile(#[from] CompileError),

    /// Write availability after sequencer reset is below the train length
    #[error("ITC-18 write buffer was full: {available} available, {required} required")]
    BufferTooLarge { available: usize, required: usize },

    /// The transport returned a non-success status
    #[error("{operation} failed with status {status}")]
    HardwareWriteFailure { operation: &'static str, status: ItcStatus },

    /// FIFO overflow reported by a read-availability query
    #[error("Fatal FIFO overflow")]
    FifoOverflow,

    #[error("Start requested without first stopping IO")]
    AlreadyRunning,

    #[error("No ITC-18 handle is open")]
    NoHardware,

    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Parameter '{name}' holds a {found}, expected {expected}")]
    ParameterType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl StimError {
    /// Unrecoverable device fault: the owner should reset the device or stop the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, StimError::FifoOverflow)
    }

    /// No legal instruction clock fits the FIFO
    pub fn is_timing(&self) -> bool {
        matches!(self, StimError::Compile(err) if err.is_timing())
    }

    /// The hardware sequencer may have been reset without a new program being loaded
    pub fn leaves_device_idle(&self) -> bool {
        matches!(
            self,
            StimError::BufferTooLarge { .. } | StimError::HardwareWriteFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StimError::FifoOverflow.is_fatal());
        assert!(!StimError::AlreadyRunning.is_fatal());

        let timing: StimError = CompileError::TimingUnsatisfiable {
            stimulus_us: 1e8,
            fifo_size: 1024,
            stride: 2,
            max_ticks: 65535,
        }
        .into();
        assert!(timing.is_timing());
        assert!(!StimError::Compile(CompileError::InvalidSpec("x".into())).is_timing());

        assert!(StimError::BufferTooLarge { available: 1, required: 2 }.leaves_device_idle());
        assert!(!StimError::NoHardware.leaves_device_idle());
    }

    #[test]
    fn messages_carry_status() {
        let err = StimError::HardwareWriteFailure {
            operation: "ITC18_WriteFIFO",
            status: -3,
        };
        assert_eq!(err.to_string(), "ITC18_WriteFIFO failed with status -3");
    }
}
