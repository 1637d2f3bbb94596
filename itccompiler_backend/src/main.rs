use itccompiler_backend::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), CompileError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let channels = [
        StimulusSpec {
            da_channel: parse_da_channel("da0")?,
            amplitude: 5.0,
            duration_ms: 100.,
            pulse_width_us: 100.,
            frequency_hz: 200.,
            pulse_biphasic: true,
            ..Default::default()
        },
        StimulusSpec {
            da_channel: parse_da_channel("da2")?,
            amplitude: -2.5,
            ..Default::default()
        },
    ];
    let program = compile_pulse_train(&channels, ITC18_DEBUG_FIFO_SIZE, &HardwareLimits::default())?;

    println!(
        "{} ticks per instruction, {} sample-sets of stride {} ({:.1} ms)",
        program.ticks_per_instruction(),
        program.sample_sets(),
        program.stride(),
        program.duration_us() / 1000.
    );
    println!("sequence: {:?}", program.instructions());
    let first_pulse = program.porch_sets();
    for set in first_pulse..first_pulse + program.pulse_sets() + 1 {
        println!("set {}: {:?}", set, program.sample_set(set).to_vec());
    }
    Ok(())
}
