use std::sync::Arc;

use itcstimctrl_backend::transport::ItcDriver;
use itcstimctrl_backend::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "itc18")]
fn driver() -> Box<dyn ItcDriver> {
    Box::new(itc18::Itc18Driver::default())
}

#[cfg(not(feature = "itc18"))]
fn driver() -> Box<dyn ItcDriver> {
    Box::new(SimulatedItc18::default())
}

fn main() -> StimResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = Arc::new(MemoryParameterStore::with_defaults());
    let device = StimDevice::new(driver(), store.clone(), StimDeviceConfig::default());
    device.initialize()?;

    store.set(TRAIN_DURATION_MS, 200i64.into())?;
    store.set(PULSE_AMPLITUDE, 2.5.into())?;
    store.set(PULSE_WIDTH_US, 200i64.into())?;
    store.set(PULSE_FREQ_HZ, 40i64.into())?;
    store.set(BIPHASIC_PULSES, true.into())?;
    store.set(PRIME, true.into())?;

    if let Some(program) = device.last_program() {
        info!(
            "Primed {} sample-sets at {} ticks per instruction ({:.1} ms)",
            program.sample_sets(),
            program.ticks_per_instruction(),
            program.duration_us() / 1000.
        );
    }

    if device.has_hardware() {
        store.set(RUN, true.into())?;
        info!("running = {}", store.get(RUNNING)?);
        store.set(RUN, false.into())?;
    }
    device.close()
}
