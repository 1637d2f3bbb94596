//! # ITC-18 stimulus device
//!
//! [`StimDevice`] ties the parameter store, the compiler and the hardware together:
//!
//! - **Parameters:** every stimulus parameter is watched; a change marks the compiled program
//!   stale (the dirty flag). With [`RecompilePolicy::Lazy`] nothing else happens until `prime` or
//!   the next start; with [`RecompilePolicy::Eager`] each change recompiles and uploads at once.
//! - **Prime:** compiles the current parameters and loads the result, holding the hardware lock
//!   only for the upload. Without hardware (and with the fallback permitted) the program is
//!   compiled but not loaded. The dirty flag is cleared only when this succeeds.
//! - **Run state:** `start` rejects a running device or a missing handle and primes first if the
//!   program is stale; `stop` is idempotent; `close` stops and releases the handle.
//!
//! Hardware access goes through two locks: one around the [`HardwareSession`] and one around the
//! scheduled read task. Callbacks registered with the store hold only a weak reference to the
//! device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itccompiler_backend::*;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::*;
use crate::error::*;
use crate::params::*;
use crate::session::HardwareSession;
use crate::transport::ItcDriver;

/// A periodic task driven by an external scheduler, e.g. FIFO read polling.
pub trait ScheduledTask: Send {
    fn cancel(&mut self);
}

/// Snapshot of the device state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceState {
    pub has_handle: bool,
    pub running: bool,
    pub parameters_dirty: bool,
}

pub struct StimDevice {
    config: StimDeviceConfig,
    store: Arc<dyn ParameterStore>,
    session: Mutex<HardwareSession>,
    poll_task: Mutex<Option<Box<dyn ScheduledTask>>>,
    parameters_dirty: AtomicBool,
    last_program: Mutex<Option<Arc<CompiledProgram>>>,
}

impl StimDevice {
    /// Creates a closed device. Nothing is opened or subscribed until [`StimDevice::initialize`].
    pub fn new(
        driver: Box<dyn ItcDriver>,
        store: Arc<dyn ParameterStore>,
        config: StimDeviceConfig,
    ) -> Arc<Self> {
        let session = HardwareSession::new(driver, config.debug_fifo_size);
        Arc::new(Self {
            config,
            store,
            session: Mutex::new(session),
            poll_task: Mutex::new(None),
            parameters_dirty: AtomicBool::new(true),
            last_program: Mutex::new(None),
        })
    }

    /// Subscribes to the parameters, opens the ITC-18 and loads the initial program.
    ///
    /// Fails only when no device can be opened and running without hardware is not permitted.
    /// A failed initial load is logged and leaves the program stale for the next start. Call once:
    /// every call adds another set of subscriptions.
    pub fn initialize(self: &Arc<Self>) -> StimResult<()> {
        self.subscribe()?;
        match self.open_hardware() {
            Ok(()) => {}
            Err(err) if self.config.allow_no_hardware => {
                warn!("No ITC-18 available ({}), running without ITC-18 hardware", err);
            }
            Err(err) => return Err(err),
        }
        self.mark_parameters_dirty();
        if let Err(err) = self.prime() {
            warn!("Initial stimulus program not loaded: {}", err);
        }
        Ok(())
    }

    fn subscribe(self: &Arc<Self>) -> StimResult<()> {
        for name in STIMULUS_PARAMETERS {
            let device = Arc::downgrade(self);
            self.store.subscribe(
                name,
                Arc::new(move |_: &str, _: ParamValue| {
                    if let Some(device) = device.upgrade() {
                        device.on_stimulus_change();
                    }
                }),
            )?;
        }

        let device = Arc::downgrade(self);
        self.store.subscribe(
            PRIME,
            Arc::new(move |_: &str, _: ParamValue| {
                if let Some(device) = device.upgrade() {
                    // Failures are logged by prime
                    let _ = device.prime();
                }
            }),
        )?;

        let device = Arc::downgrade(self);
        self.store.subscribe(
            RUN,
            Arc::new(move |_: &str, _: ParamValue| {
                if let Some(device) = device.upgrade() {
                    if let Err(err) = device.change_run_state() {
                        error!("Run state change failed: {}", err);
                    }
                }
            }),
        )?;
        Ok(())
    }

    fn on_stimulus_change(&self) {
        self.mark_parameters_dirty();
        if self.config.recompile == RecompilePolicy::Eager {
            // Failures are logged by prime
            let _ = self.prime();
        }
    }

    /// (Re)opens the ITC-18; an open device is closed first.
    pub fn open_hardware(&self) -> StimResult<()> {
        self.session.lock().open()
    }

    pub fn mark_parameters_dirty(&self) {
        self.parameters_dirty.store(true, Ordering::SeqCst);
        debug!("Marking parameters dirty");
    }

    /// The single-channel train described by the current parameters.
    pub fn train_spec(&self) -> StimResult<StimulusSpec> {
        let store = &self.store;
        Ok(StimulusSpec {
            amplitude: store.get_f64(PULSE_AMPLITUDE)?,
            current_pulses: store.get_bool(CURRENT_PULSES)?,
            ua_per_v: store.get_f64(UA_PER_V)?,
            duration_ms: store.get_f64(TRAIN_DURATION_MS)?,
            pulse_width_us: store.get_f64(PULSE_WIDTH_US)?,
            frequency_hz: store.get_f64(PULSE_FREQ_HZ)?,
            pulse_biphasic: store.get_bool(BIPHASIC_PULSES)?,
            ..self.config.train.spec()
        })
    }

    /// Compiles the current parameters against the device FIFO. Touches no hardware.
    pub fn compile(&self) -> StimResult<CompiledProgram> {
        let fifo_size = self.session.lock().fifo_size();
        let spec = self.train_spec()?;
        Ok(compile_pulse_train(&[spec], fifo_size, &self.config.limits)?)
    }

    /// Compiles the current parameters and loads the program.
    pub fn prime(&self) -> StimResult<Arc<CompiledProgram>> {
        // Changes arriving during the compile set the flag again
        self.parameters_dirty.store(false, Ordering::SeqCst);
        // Set when loading reset a running sequencer, whether or not the load succeeded
        let mut stopped = false;
        let result = self.compile().and_then(|program| {
            let mut session = self.session.lock();
            let was_running = session.is_running();
            let loaded = if session.is_open() {
                session.upload(&program)
            } else if self.config.allow_no_hardware {
                debug!("No ITC-18 attached, program compiled but not loaded");
                Ok(())
            } else {
                Err(StimError::NoHardware)
            };
            stopped = was_running && !session.is_running();
            loaded.map(|()| Arc::new(program))
        });

        match result {
            Ok(program) => {
                *self.last_program.lock() = Some(program.clone());
                if stopped {
                    self.store.set(RUNNING, ParamValue::Bool(false))?;
                }
                Ok(program)
            }
            Err(err) => {
                self.parameters_dirty.store(true, Ordering::SeqCst);
                error!("Failed to prime stimulus: {}", err);
                if stopped {
                    if let Err(store_err) = self.store.set(RUNNING, ParamValue::Bool(false)) {
                        warn!("Failed to clear {}: {}", RUNNING, store_err);
                    }
                }
                Err(err)
            }
        }
    }

    /// Starts stimulus output, priming first if the parameters changed.
    pub fn start(&self) -> StimResult<()> {
        {
            let session = self.session.lock();
            if session.is_running() {
                error!("Start requested without first stopping IO");
                return Err(StimError::AlreadyRunning);
            }
            if !session.is_open() {
                error!("Start requested without an ITC-18");
                return Err(StimError::NoHardware);
            }
        }
        if self.is_dirty() {
            self.prime()?;
        }
        self.session.lock().start()?;
        info!("Started stimulus IO");
        Ok(())
    }

    /// Cancels the scheduled read task and stops output. Stopping a stopped device is fine.
    pub fn stop(&self) -> StimResult<()> {
        if let Some(mut task) = self.poll_task.lock().take() {
            task.cancel();
        }
        self.session.lock().stop()
    }

    /// Stops output and releases the ITC-18.
    pub fn close(&self) -> StimResult<()> {
        let stopped = self.stop();
        let closed = self.session.lock().close();
        stopped.and(closed)
    }

    /// Starts or stops according to the `run` parameter, then mirrors the state in `running`.
    pub fn change_run_state(&self) -> StimResult<()> {
        let run = self.store.get_bool(RUN)?;
        let result = if run { self.start() } else { self.stop() };
        self.store.set(RUNNING, ParamValue::Bool(self.is_running()))?;
        result
    }

    /// Samples ready in the input FIFO. [`StimError::FifoOverflow`] is fatal.
    pub fn read_available(&self) -> StimResult<usize> {
        self.session.lock().read_available()
    }

    /// Installs the task cancelled by `stop`, cancelling any previous one.
    pub fn set_poll_task(&self, task: Box<dyn ScheduledTask>) {
        if let Some(mut previous) = self.poll_task.lock().replace(task) {
            previous.cancel();
        }
    }

    pub fn state(&self) -> DeviceState {
        let session = self.session.lock();
        DeviceState {
            has_handle: session.is_open(),
            running: session.is_running(),
            parameters_dirty: self.is_dirty(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_running()
    }
    pub fn is_dirty(&self) -> bool {
        self.parameters_dirty.load(Ordering::SeqCst)
    }
    pub fn has_hardware(&self) -> bool {
        self.session.lock().is_open()
    }
    pub fn fifo_size(&self) -> usize {
        self.session.lock().fifo_size()
    }
    /// The last successfully primed program
    pub fn last_program(&self) -> Option<Arc<CompiledProgram>> {
        self.last_program.lock().clone()
    }
    pub fn config(&self) -> &StimDeviceConfig {
        &self.config
    }
    pub fn store(&self) -> &Arc<dyn ParameterStore> {
        &self.store
    }
}

impl Drop for StimDevice {
    fn drop(&mut self) {
        if let Some(mut task) = self.poll_task.get_mut().take() {
            task.cancel();
        }
    }
}
