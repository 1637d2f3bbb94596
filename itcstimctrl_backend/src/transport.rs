//! Hardware transport abstraction for the ITC-18.
//!
//! ## Overview
//!
//! [`ItcDriver`] opens the device and hands out an [`ItcHandle`], whose methods map one-to-one
//! onto the vendor C functions used by this crate (`ITC18_Initialize`, `ITC18_SetSequence`,
//! `ITC18_WriteFIFO`, ...). Command methods return the raw [`ItcStatus`]; queries return their
//! value or the failing status. Two implementations exist:
//!
//! - [`crate::sim::SimulatedItc18`], an in-memory device for development and tests.
//! - `crate::itc18::Itc18Driver` (feature `itc18`), the binding to the vendor library.
//!
//! ## Error Handling
//!
//! Every status other than [`ITC18_NO_ERR`] is an error. [`itc_call`] wraps a command, logs a
//! failing status and converts it into [`StimError::HardwareWriteFailure`] carrying the name of
//! the vendor function and the status code. Nothing is retried.

use tracing::error;

use crate::error::*;

/// Raw status code returned by the vendor library
pub type ItcStatus = i32;

/// Success status
pub const ITC18_NO_ERR: ItcStatus = 0;
/// `ITC18_Initialize` mode for standard operation
pub const ITC18_STANDARD: i32 = 0;

/// Bus the device is opened on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Pci,
    Usb,
}

impl OpenMode {
    /// Device number passed to `ITC18_Open`
    pub fn device_number(&self) -> i32 {
        match self {
            OpenMode::Pci => 0,
            OpenMode::Usb => 0x10000,
        }
    }
}

/// Buses tried on open, in order
pub const ITC18_OPEN_SEQUENCE: [OpenMode; 2] = [OpenMode::Pci, OpenMode::Usb];

/// Opens ITC-18 devices.
pub trait ItcDriver: Send {
    /// Opens the device on the given bus. A failed open leaves nothing to close.
    fn open(&mut self, mode: OpenMode) -> Result<Box<dyn ItcHandle>, ItcStatus>;
}

/// An open ITC-18.
///
/// Dropping a handle closes the device; [`ItcHandle::close`] does so explicitly.
pub trait ItcHandle: Send {
    fn initialize(&mut self, mode: i32) -> ItcStatus;
    fn set_digital_input_mode(&mut self, latch: bool, invert: bool) -> ItcStatus;
    fn set_external_trigger_mode(&mut self, external: bool, invert: bool) -> ItcStatus;
    /// FIFO capacity in samples
    fn fifo_size(&mut self) -> usize;
    /// Samples ready to be read, and whether the input FIFO has overflowed
    fn fifo_read_available_overflow(&mut self) -> Result<(usize, bool), ItcStatus>;
    /// Loads the sequencer program, one instruction word per FIFO sample of a sample-set
    fn set_sequence(&mut self, instructions: &[i32]) -> ItcStatus;
    fn stop_and_initialize(&mut self, stop: bool, initialize: bool) -> ItcStatus;
    /// Samples that can currently be written to the output FIFO
    fn fifo_write_available(&mut self) -> Result<usize, ItcStatus>;
    fn write_fifo(&mut self, samples: &[i16]) -> ItcStatus;
    fn set_sampling_interval(&mut self, ticks_per_instruction: u32, external_clock: bool) -> ItcStatus;
    fn start(
        &mut self,
        external_trigger: bool,
        output_enable: bool,
        stop_on_overflow: bool,
        stop_on_underrun: bool,
    ) -> ItcStatus;
    fn stop(&mut self) -> ItcStatus;
    fn close(self: Box<Self>);
}

/// Converts a failing status of `operation` into a [`StimError::HardwareWriteFailure`].
pub fn hardware_failure(operation: &'static str, status: ItcStatus) -> StimError {
    error!("{} failed with status {}", operation, status);
    StimError::HardwareWriteFailure { operation, status }
}

/// Calls an ITC-18 command and checks its status.
///
/// ```
/// use itcstimctrl_backend::transport::*;
///
/// assert!(itc_call("ITC18_Stop", || ITC18_NO_ERR).is_ok());
/// assert!(itc_call("ITC18_Stop", || -1).is_err());
/// ```
pub fn itc_call<F: FnOnce() -> ItcStatus>(operation: &'static str, func: F) -> StimResult<()> {
    match func() {
        ITC18_NO_ERR => Ok(()),
        status => Err(hardware_failure(operation, status)),
    }
}
