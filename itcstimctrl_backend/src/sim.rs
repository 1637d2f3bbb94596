//! Simulated ITC-18 for development and testing
//!
//! [`SimulatedItc18`] implements [`ItcDriver`] entirely in memory. Clones share the same device,
//! so a test can hand one clone to the controller and keep another to inspect what was loaded
//! ([`SimulatedItc18::snapshot`]) or to inject faults ([`SimulatedItc18::configure`]).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::*;

/// Status returned when a write does not fit the simulated FIFO
pub const SIM_ERR_FIFO_FULL: ItcStatus = -100;
/// Status returned by commands issued on a handle that was closed
pub const SIM_ERR_CLOSED: ItcStatus = -101;
/// Status returned by a failed simulated open
pub const SIM_ERR_NOT_FOUND: ItcStatus = -102;

/// Behavior of the simulated device
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub pci_present: bool,
    pub usb_present: bool,
    /// FIFO capacity in samples
    pub fifo_size: usize,
    pub initialize_status: ItcStatus,
    pub write_status: ItcStatus,
    pub start_status: ItcStatus,
    /// Overrides the computed write availability
    pub write_available: Option<usize>,
    /// Samples reported by read-availability queries
    pub read_available: usize,
    pub overflow: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pci_present: true,
            usb_present: false,
            fifo_size: 1 << 18,
            initialize_status: ITC18_NO_ERR,
            write_status: ITC18_NO_ERR,
            start_status: ITC18_NO_ERR,
            write_available: None,
            read_available: 0,
            overflow: false,
        }
    }
}

/// Observable state of the simulated device
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimState {
    /// Vendor functions called, in order
    pub calls: Vec<&'static str>,
    pub open_mode: Option<OpenMode>,
    pub opens: usize,
    pub closes: usize,
    pub initialized: bool,
    pub digital_input_mode: Option<(bool, bool)>,
    pub external_trigger_mode: Option<(bool, bool)>,
    pub sequence: Vec<i32>,
    pub fifo: Vec<i16>,
    pub sampling_interval: Option<(u32, bool)>,
    pub started: bool,
}

impl SimState {
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|&&call| call == name).count()
    }
}

#[derive(Debug, Default)]
struct SimDevice {
    config: SimConfig,
    state: SimState,
}

/// Simulated ITC-18 driver
#[derive(Clone, Debug, Default)]
pub struct SimulatedItc18 {
    device: Arc<Mutex<SimDevice>>,
}

impl SimulatedItc18 {
    pub fn new(config: SimConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(SimDevice {
                config,
                state: SimState::default(),
            })),
        }
    }

    /// A driver that finds no device on either bus
    pub fn absent() -> Self {
        Self::new(SimConfig {
            pci_present: false,
            usb_present: false,
            ..Default::default()
        })
    }

    pub fn snapshot(&self) -> SimState {
        self.device.lock().state.clone()
    }

    pub fn configure<F: FnOnce(&mut SimConfig)>(&self, f: F) {
        f(&mut self.device.lock().config);
    }
}

impl ItcDriver for SimulatedItc18 {
    fn open(&mut self, mode: OpenMode) -> Result<Box<dyn ItcHandle>, ItcStatus> {
        let mut device = self.device.lock();
        device.state.calls.push("ITC18_Open");
        let present = match mode {
            OpenMode::Pci => device.config.pci_present,
            OpenMode::Usb => device.config.usb_present,
        };
        if !present {
            return Err(SIM_ERR_NOT_FOUND);
        }
        device.state.opens += 1;
        device.state.open_mode = Some(mode);
        device.state.initialized = false;
        Ok(Box::new(SimHandle {
            device: self.device.clone(),
            open: true,
        }))
    }
}

struct SimHandle {
    device: Arc<Mutex<SimDevice>>,
    open: bool,
}

impl SimHandle {
    /// Records the call and runs `f` on the device if the handle is still open
    fn command<F: FnOnce(&mut SimDevice) -> ItcStatus>(&mut self, name: &'static str, f: F) -> ItcStatus {
        let mut device = self.device.lock();
        device.state.calls.push(name);
        if !self.open {
            return SIM_ERR_CLOSED;
        }
        f(&mut device)
    }
}

impl ItcHandle for SimHandle {
    fn initialize(&mut self, mode: i32) -> ItcStatus {
        self.command("ITC18_Initialize", |device| {
            if device.config.initialize_status != ITC18_NO_ERR || mode != ITC18_STANDARD {
                return device.config.initialize_status.min(-1);
            }
            device.state.initialized = true;
            ITC18_NO_ERR
        })
    }

    fn set_digital_input_mode(&mut self, latch: bool, invert: bool) -> ItcStatus {
        self.command("ITC18_SetDigitalInputMode", |device| {
            device.state.digital_input_mode = Some((latch, invert));
            ITC18_NO_ERR
        })
    }

    fn set_external_trigger_mode(&mut self, external: bool, invert: bool) -> ItcStatus {
        self.command("ITC18_SetExternalTriggerMode", |device| {
            device.state.external_trigger_mode = Some((external, invert));
            ITC18_NO_ERR
        })
    }

    fn fifo_size(&mut self) -> usize {
        let mut size = 0;
        self.command("ITC18_GetFIFOSize", |device| {
            size = device.config.fifo_size;
            ITC18_NO_ERR
        });
        size
    }

    fn fifo_read_available_overflow(&mut self) -> Result<(usize, bool), ItcStatus> {
        let mut reading = (0, false);
        match self.command("ITC18_GetFIFOReadAvailableOverflow", |device| {
            reading = (device.config.read_available, device.config.overflow);
            ITC18_NO_ERR
        }) {
            ITC18_NO_ERR => Ok(reading),
            status => Err(status),
        }
    }

    fn set_sequence(&mut self, instructions: &[i32]) -> ItcStatus {
        self.command("ITC18_SetSequence", |device| {
            device.state.sequence = instructions.to_vec();
            ITC18_NO_ERR
        })
    }

    fn stop_and_initialize(&mut self, stop: bool, initialize: bool) -> ItcStatus {
        self.command("ITC18_StopAndInitialize", |device| {
            if stop {
                device.state.started = false;
            }
            if initialize {
                device.state.fifo.clear();
            }
            ITC18_NO_ERR
        })
    }

    fn fifo_write_available(&mut self) -> Result<usize, ItcStatus> {
        let mut available = 0;
        match self.command("ITC18_GetFIFOWriteAvailable", |device| {
            available = device
                .config
                .write_available
                .unwrap_or_else(|| device.config.fifo_size.saturating_sub(device.state.fifo.len()));
            ITC18_NO_ERR
        }) {
            ITC18_NO_ERR => Ok(available),
            status => Err(status),
        }
    }

    fn write_fifo(&mut self, samples: &[i16]) -> ItcStatus {
        self.command("ITC18_WriteFIFO", |device| {
            if device.config.write_status != ITC18_NO_ERR {
                return device.config.write_status;
            }
            if device.state.fifo.len() + samples.len() > device.config.fifo_size {
                return SIM_ERR_FIFO_FULL;
            }
            device.state.fifo.extend_from_slice(samples);
            ITC18_NO_ERR
        })
    }

    fn set_sampling_interval(&mut self, ticks_per_instruction: u32, external_clock: bool) -> ItcStatus {
        self.command("ITC18_SetSamplingInterval", |device| {
            device.state.sampling_interval = Some((ticks_per_instruction, external_clock));
            ITC18_NO_ERR
        })
    }

    fn start(
        &mut self,
        _external_trigger: bool,
        _output_enable: bool,
        _stop_on_overflow: bool,
        _stop_on_underrun: bool,
    ) -> ItcStatus {
        self.command("ITC18_Start", |device| {
            if device.config.start_status != ITC18_NO_ERR {
                return device.config.start_status;
            }
            device.state.started = true;
            ITC18_NO_ERR
        })
    }

    fn stop(&mut self) -> ItcStatus {
        self.command("ITC18_Stop", |device| {
            device.state.started = false;
            ITC18_NO_ERR
        })
    }

    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl SimHandle {
    fn shutdown(&mut self) {
        if self.open {
            let mut device = self.device.lock();
            device.state.calls.push("ITC18_Close");
            device.state.closes += 1;
            device.state.started = false;
            device.state.open_mode = None;
            self.open = false;
        }
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_device_fails_to_open() {
        let mut sim = SimulatedItc18::absent();
        assert_eq!(sim.open(OpenMode::Pci).err(), Some(SIM_ERR_NOT_FOUND));
        assert_eq!(sim.open(OpenMode::Usb).err(), Some(SIM_ERR_NOT_FOUND));
        assert_eq!(sim.snapshot().opens, 0);
    }

    #[test]
    fn fifo_accounting() {
        let mut sim = SimulatedItc18::new(SimConfig { fifo_size: 8, ..Default::default() });
        let mut handle = sim.open(OpenMode::Pci).unwrap();
        assert_eq!(handle.fifo_write_available(), Ok(8));
        assert_eq!(handle.write_fifo(&[1, 2, 3, 4, 5, 6]), ITC18_NO_ERR);
        assert_eq!(handle.fifo_write_available(), Ok(2));
        assert_eq!(handle.write_fifo(&[7, 8, 9]), SIM_ERR_FIFO_FULL);
        assert_eq!(handle.stop_and_initialize(true, true), ITC18_NO_ERR);
        assert_eq!(handle.fifo_write_available(), Ok(8));
    }

    #[test]
    fn drop_closes_once() {
        let mut sim = SimulatedItc18::default();
        let handle = sim.open(OpenMode::Pci).unwrap();
        handle.close();
        let handle = sim.open(OpenMode::Pci).unwrap();
        drop(handle);
        let state = sim.snapshot();
        assert_eq!(state.opens, 2);
        assert_eq!(state.closes, 2);
        assert_eq!(state.call_count("ITC18_Close"), 2);
    }

    #[test]
    fn faults_can_be_injected_after_open() {
        let mut sim = SimulatedItc18::default();
        let mut handle = sim.open(OpenMode::Pci).unwrap();
        sim.configure(|config| {
            config.overflow = true;
            config.read_available = 12;
        });
        assert_eq!(handle.fifo_read_available_overflow(), Ok((12, true)));
    }
}
