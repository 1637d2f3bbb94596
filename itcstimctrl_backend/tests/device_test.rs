use std::sync::Arc;
use std::thread;

use itccompiler_backend::{CompileError, ITC18_DEBUG_FIFO_SIZE};
use itcstimctrl_backend::sim::*;
use itcstimctrl_backend::*;

const SET_SEQUENCE: &str = "ITC18_SetSequence";

struct Fixture {
    sim: SimulatedItc18,
    store: Arc<MemoryParameterStore>,
    device: Arc<StimDevice>,
}

impl Fixture {
    fn new(sim: SimulatedItc18, config: StimDeviceConfig) -> Self {
        let store = Arc::new(MemoryParameterStore::with_defaults());
        store.set(TRAIN_DURATION_MS, 100i64.into()).unwrap();
        store.set(PULSE_AMPLITUDE, 5i64.into()).unwrap();
        store.set(PULSE_WIDTH_US, 100i64.into()).unwrap();
        store.set(PULSE_FREQ_HZ, 50i64.into()).unwrap();
        let device = StimDevice::new(Box::new(sim.clone()), store.clone(), config);
        Fixture { sim, store, device }
    }

    fn initialized(config: StimDeviceConfig) -> Self {
        let fixture = Fixture::new(SimulatedItc18::default(), config);
        fixture.device.initialize().unwrap();
        fixture
    }

    fn uploads(&self) -> usize {
        self.sim.snapshot().call_count(SET_SEQUENCE)
    }
}

#[test]
fn initialize_loads_the_current_parameters() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    let state = fixture.device.state();
    assert!(state.has_handle);
    assert!(!state.running);
    assert!(!state.parameters_dirty);
    assert_eq!(fixture.uploads(), 1);

    let program = fixture.device.last_program().unwrap();
    // 100 ms train between two 25 ms porches at 12.5 us per sample-set
    assert_eq!(program.ticks_per_instruction(), 5);
    assert_eq!(program.sample_sets(), 12_000);
    assert_eq!(program.train_sets(), 8_000);
    assert_eq!(fixture.sim.snapshot().fifo, program.interleaved().to_vec());
}

#[test]
fn lazy_policy_defers_recompile() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.store.set(PULSE_AMPLITUDE, 2i64.into()).unwrap();
    fixture.store.set(PULSE_FREQ_HZ, 20i64.into()).unwrap();
    assert!(fixture.device.is_dirty());
    assert_eq!(fixture.uploads(), 1);

    fixture.store.set(PRIME, true.into()).unwrap();
    assert!(!fixture.device.is_dirty());
    assert_eq!(fixture.uploads(), 2);
}

#[test]
fn eager_policy_recompiles_every_change() {
    let config = StimDeviceConfig::default().with_recompile(RecompilePolicy::Eager);
    let fixture = Fixture::initialized(config);
    fixture.store.set(PULSE_AMPLITUDE, 2i64.into()).unwrap();
    fixture.store.set(PULSE_FREQ_HZ, 20i64.into()).unwrap();
    fixture.store.set(BIPHASIC_PULSES, true.into()).unwrap();
    assert!(!fixture.device.is_dirty());
    assert_eq!(fixture.uploads(), 4);
}

#[test]
fn start_primes_a_stale_program() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.device.start().unwrap();
    assert_eq!(fixture.uploads(), 1);
    fixture.device.stop().unwrap();

    fixture.store.set(PULSE_WIDTH_US, 300i64.into()).unwrap();
    fixture.device.start().unwrap();
    assert_eq!(fixture.uploads(), 2);
    assert!(!fixture.device.is_dirty());
    assert_eq!(fixture.device.last_program().unwrap().phase_sets(), 24);

    let calls = fixture.sim.snapshot().calls;
    assert_eq!(calls.last(), Some(&"ITC18_Start"));
}

#[test]
fn run_parameter_drives_playback() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.store.set(RUN, true.into()).unwrap();
    assert!(fixture.device.is_running());
    assert!(fixture.sim.snapshot().started);
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(true));

    assert_eq!(fixture.device.start(), Err(StimError::AlreadyRunning));
    assert!(fixture.device.is_running());

    fixture.store.set(RUN, false.into()).unwrap();
    assert!(!fixture.device.is_running());
    assert!(!fixture.sim.snapshot().started);
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));

    // Stopping twice is harmless
    fixture.store.set(RUN, false.into()).unwrap();
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));
}

#[test]
fn failed_start_reports_not_running() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.sim.configure(|config| config.start_status = -3);
    fixture.store.set(RUN, true.into()).unwrap();
    assert!(!fixture.device.is_running());
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));
}

#[test]
fn upload_while_running_stops_playback() {
    let config = StimDeviceConfig::default().with_recompile(RecompilePolicy::Eager);
    let fixture = Fixture::initialized(config);
    fixture.store.set(RUN, true.into()).unwrap();
    assert!(fixture.device.is_running());

    fixture.store.set(PULSE_AMPLITUDE, 1i64.into()).unwrap();
    assert!(!fixture.device.is_running());
    assert!(!fixture.sim.snapshot().started);
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));
}

#[test]
fn failed_load_while_running_clears_running() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.store.set(RUN, true.into()).unwrap();
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(true));

    fixture.sim.configure(|config| config.write_available = Some(1));
    fixture.store.set(PULSE_AMPLITUDE, 3i64.into()).unwrap();
    assert!(fixture.device.prime().is_err());
    assert!(!fixture.device.is_running());
    assert!(!fixture.sim.snapshot().started);
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));
}

#[test]
fn failed_compile_while_running_keeps_playing() {
    let config = StimDeviceConfig::default().with_recompile(RecompilePolicy::Eager);
    let fixture = Fixture::initialized(config);
    fixture.store.set(RUN, true.into()).unwrap();

    fixture.store.set(PULSE_AMPLITUDE, 20_000i64.into()).unwrap();
    assert!(fixture.device.is_dirty());
    assert!(fixture.device.is_running());
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(true));
}

#[test]
fn buffer_too_large_keeps_parameters_dirty() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    let loaded = fixture.device.last_program().unwrap();
    fixture.sim.configure(|config| config.write_available = Some(100));

    fixture.store.set(PULSE_AMPLITUDE, 3i64.into()).unwrap();
    let err = fixture.device.prime().unwrap_err();
    assert_eq!(
        err,
        StimError::BufferTooLarge {
            available: 100,
            required: 8_000
        }
    );
    assert!(err.leaves_device_idle());
    assert!(fixture.device.is_dirty());
    assert!(Arc::ptr_eq(&fixture.device.last_program().unwrap(), &loaded));

    // The next start retries the load
    fixture.sim.configure(|config| config.write_available = None);
    fixture.device.start().unwrap();
    assert!(!fixture.device.is_dirty());
}

#[test]
fn invalid_parameters_never_reach_the_hardware() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    // 20 V against a 10.24 V full range
    fixture.store.set(PULSE_AMPLITUDE, 20_000i64.into()).unwrap();
    let err = fixture.device.prime().unwrap_err();
    assert!(matches!(err, StimError::Compile(CompileError::InvalidSpec(_))));
    assert_eq!(fixture.uploads(), 1);
    assert!(fixture.device.is_dirty());

    fixture.store.set(PULSE_AMPLITUDE, 5i64.into()).unwrap();
    fixture.store.set(PULSE_FREQ_HZ, 20_000i64.into()).unwrap();
    assert!(fixture.device.prime().is_err());
    assert_eq!(fixture.uploads(), 1);
}

#[test]
fn small_fifo_forces_slower_clock_or_fails() {
    let sim = SimulatedItc18::new(SimConfig {
        fifo_size: 1 << 14,
        ..Default::default()
    });
    let fixture = Fixture::new(sim, StimDeviceConfig::default());
    fixture.device.initialize().unwrap();
    assert_eq!(fixture.device.fifo_size(), 1 << 14);
    // 150 ms in at most 4096 instructions
    assert_eq!(fixture.device.last_program().unwrap().ticks_per_instruction(), 30);

    let before = fixture.sim.snapshot();
    fixture.store.set(TRAIN_DURATION_MS, 1_000_000i64.into()).unwrap();
    let err = fixture.device.prime().unwrap_err();
    assert!(err.is_timing());

    // The loaded program is left alone
    let after = fixture.sim.snapshot();
    assert_eq!(after.calls, before.calls);
    assert_eq!(after.fifo, before.fifo);
    assert_eq!(after.sampling_interval, before.sampling_interval);
}

#[test]
fn missing_hardware_compiles_without_loading() {
    let fixture = Fixture::new(SimulatedItc18::absent(), StimDeviceConfig::default());
    fixture.device.initialize().unwrap();
    assert!(!fixture.device.has_hardware());
    assert_eq!(fixture.device.fifo_size(), ITC18_DEBUG_FIFO_SIZE);

    let program = fixture.device.prime().unwrap();
    assert_eq!(program.timing().fifo_size, ITC18_DEBUG_FIFO_SIZE);
    assert!(!fixture.device.is_dirty());
    assert_eq!(fixture.uploads(), 0);

    assert_eq!(fixture.device.start(), Err(StimError::NoHardware));
    fixture.store.set(RUN, true.into()).unwrap();
    assert_eq!(fixture.store.get(RUNNING).unwrap(), ParamValue::Bool(false));
    assert!(fixture.device.stop().is_ok());
}

#[test]
fn missing_hardware_is_an_error_when_required() {
    let config = StimDeviceConfig::default().with_allow_no_hardware(false);
    let fixture = Fixture::new(SimulatedItc18::absent(), config);
    let err = fixture.device.initialize().unwrap_err();
    assert!(matches!(err, StimError::DeviceUnavailable(_)));
    assert_eq!(fixture.device.prime().unwrap_err(), StimError::NoHardware);
}

#[test]
fn usb_device_is_found_after_pci() {
    let sim = SimulatedItc18::new(SimConfig {
        pci_present: false,
        usb_present: true,
        ..Default::default()
    });
    let fixture = Fixture::new(sim, StimDeviceConfig::default());
    fixture.device.initialize().unwrap();
    assert!(fixture.device.has_hardware());
    assert_eq!(fixture.sim.snapshot().open_mode, Some(transport::OpenMode::Usb));
}

#[test]
fn fifo_overflow_is_fatal() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.store.set(RUN, true.into()).unwrap();
    fixture.sim.configure(|config| config.read_available = 512);
    assert_eq!(fixture.device.read_available(), Ok(512));

    fixture.sim.configure(|config| config.overflow = true);
    let err = fixture.device.read_available().unwrap_err();
    assert_eq!(err, StimError::FifoOverflow);
    assert!(err.is_fatal());
}

#[test]
fn reopen_and_close() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    fixture.device.start().unwrap();
    fixture.device.open_hardware().unwrap();
    assert!(!fixture.device.is_running());

    fixture.device.close().unwrap();
    assert!(!fixture.device.has_hardware());
    fixture.device.close().unwrap();
    let state = fixture.sim.snapshot();
    assert_eq!((state.opens, state.closes), (2, 2));

    drop(fixture.device);
    assert_eq!(fixture.sim.snapshot().closes, 2);
}

#[test]
fn dropping_the_device_closes_the_hardware() {
    let fixture = Fixture::initialized(StimDeviceConfig::default());
    let Fixture { sim, store, device } = fixture;
    drop(device);
    assert_eq!(sim.snapshot().closes, 1);
    // Subscriptions outlive the device without effect
    store.set(RUN, true.into()).unwrap();
    assert_eq!(store.get(RUNNING).unwrap(), ParamValue::Bool(false));
}

#[test]
fn concurrent_parameter_changes() {
    let config = StimDeviceConfig::default().with_recompile(RecompilePolicy::Eager);
    let fixture = Fixture::initialized(config);
    thread::scope(|scope| {
        for amplitude in 1..=4i64 {
            let store = fixture.store.clone();
            scope.spawn(move || {
                for _ in 0..5 {
                    store.set(PULSE_AMPLITUDE, amplitude.into()).unwrap();
                }
            });
        }
    });
    assert_eq!(fixture.uploads(), 21);
    assert!(!fixture.device.is_dirty());
    fixture.device.start().unwrap();
    assert!(fixture.device.is_running());
}
