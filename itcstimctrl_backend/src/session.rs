//! Ownership of the ITC-18 handle.
//!
//! A [`HardwareSession`] holds the driver, the open handle (if any), the run state and the FIFO
//! size. Every operation that touches the device takes `&mut self`, so whoever holds the session
//! has exclusive access to the hardware; [`crate::device::StimDevice`] keeps it behind a single
//! lock.
//!
//! States: closed (no handle), open and idle, running. Closing always stops first, and the handle
//! is taken out of the session before the vendor close call runs.

use itccompiler_backend::CompiledProgram;
use tracing::{error, info, warn};

use crate::error::*;
use crate::transport::*;
use crate::upload::upload_program;

pub struct HardwareSession {
    driver: Box<dyn ItcDriver>,
    handle: Option<Box<dyn ItcHandle>>,
    open_mode: Option<OpenMode>,
    running: bool,
    fifo_size: usize,
    debug_fifo_size: usize,
}

impl HardwareSession {
    /// A closed session; `debug_fifo_size` is reported until a device is opened
    pub fn new(driver: Box<dyn ItcDriver>, debug_fifo_size: usize) -> Self {
        Self {
            driver,
            handle: None,
            open_mode: None,
            running: false,
            fifo_size: debug_fifo_size,
            debug_fifo_size,
        }
    }

    /// Opens and initializes the device, trying PCI then USB.
    ///
    /// An already open device is closed first. On failure the session stays closed and the FIFO
    /// size falls back to the debug size.
    pub fn open(&mut self) -> StimResult<()> {
        if let Some(handle) = self.handle.take() {
            info!("Re-opening ITC-18, closing the current handle");
            self.running = false;
            self.open_mode = None;
            handle.close();
        }
        self.fifo_size = self.debug_fifo_size;

        let mut opened = None;
        for mode in ITC18_OPEN_SEQUENCE {
            match self.driver.open(mode) {
                Ok(handle) => {
                    opened = Some((mode, handle));
                    break;
                }
                Err(status) => warn!("ITC18_Open on {:?} failed with status {}", mode, status),
            }
        }
        let (mode, mut handle) = opened.ok_or_else(|| {
            warn!("Failed to open ITC-18 using PCI or USB");
            StimError::DeviceUnavailable("no ITC-18 found on PCI or USB".to_string())
        })?;

        if let Err(err) = Self::configure(&mut *handle) {
            error!("Failed to initialize ITC-18: {}", err);
            handle.close();
            return Err(StimError::DeviceUnavailable(err.to_string()));
        }
        self.fifo_size = handle.fifo_size();
        self.handle = Some(handle);
        self.open_mode = Some(mode);
        info!("Opened ITC-18 on {:?}, FIFO of {} samples", mode, self.fifo_size);
        Ok(())
    }

    fn configure(handle: &mut dyn ItcHandle) -> StimResult<()> {
        itc_call("ITC18_Initialize", || handle.initialize(ITC18_STANDARD))?;
        // Latch, do not invert
        itc_call("ITC18_SetDigitalInputMode", || handle.set_digital_input_mode(true, false))?;
        itc_call("ITC18_SetExternalTriggerMode", || handle.set_external_trigger_mode(false, false))?;
        Ok(())
    }

    /// Stops IO and releases the handle. Closing a closed session does nothing.
    pub fn close(&mut self) -> StimResult<()> {
        let stopped = self.stop();
        if let Some(handle) = self.handle.take() {
            self.open_mode = None;
            handle.close();
            info!("Closed ITC-18");
        }
        stopped
    }

    /// Starts playback: no external trigger, output enabled.
    pub fn start(&mut self) -> StimResult<()> {
        if self.running {
            error!("Start requested without first stopping IO");
            return Err(StimError::AlreadyRunning);
        }
        let handle = self.handle.as_mut().ok_or(StimError::NoHardware)?;
        itc_call("ITC18_Start", || handle.start(false, true, false, false))?;
        self.running = true;
        Ok(())
    }

    /// Stops playback. Stopping a stopped session is not an error.
    pub fn stop(&mut self) -> StimResult<()> {
        let result = match self.handle.as_mut() {
            Some(handle) => itc_call("ITC18_Stop", || handle.stop()),
            None => Ok(()),
        };
        self.running = false;
        result
    }

    /// Loads a compiled program. The sequencer reset stops any playback in progress.
    pub fn upload(&mut self, program: &CompiledProgram) -> StimResult<()> {
        let handle = self.handle.as_mut().ok_or(StimError::NoHardware)?;
        if self.running {
            warn!("Loading a new program while running, playback stops");
        }
        self.running = false;
        upload_program(&mut **handle, program)
    }

    /// Samples ready to be read from the FIFO. An overflow is a fatal device fault.
    pub fn read_available(&mut self) -> StimResult<usize> {
        let handle = self.handle.as_mut().ok_or(StimError::NoHardware)?;
        let (available, overflow) = handle
            .fifo_read_available_overflow()
            .map_err(|status| hardware_failure("ITC18_GetFIFOReadAvailableOverflow", status))?;
        if overflow {
            error!("Fatal FIFO overflow");
            return Err(StimError::FifoOverflow);
        }
        Ok(available)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn open_mode(&self) -> Option<OpenMode> {
        self.open_mode
    }
    /// Device FIFO size, or the debug size when no device is open
    pub fn fifo_size(&self) -> usize {
        self.fifo_size
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Error while closing ITC-18: {}", err);
        }
    }
}
