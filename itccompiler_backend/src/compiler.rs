//! The pulse-train compiler.
//!
//! [`compile_pulse_train`] runs the full pipeline on freshly allocated buffers and touches no
//! hardware:
//!
//! 1. validate the channel specs (shared fields from the first channel only),
//! 2. resolve the instruction clock divisor against the FIFO size ([`crate::timing`]),
//! 3. synthesize one pulse ([`crate::pulse`]),
//! 4. lay out the train ([`crate::train`]),
//! 5. wrap it in gate porches and close the gate ([`crate::porch`]).
//!
//! Compiling the same specs twice yields identical programs.

use tracing::{debug, warn};

use crate::channel::*;
use crate::error::*;
use crate::porch::wrap_porch;
use crate::program::CompiledProgram;
use crate::pulse::{pulse_fits, synthesize_pulse};
use crate::timing::*;
use crate::train::assemble_train;
use crate::utils::TickTimer;

/// Compiles a stimulus train for up to four DA channels.
///
/// `fifo_size` is the device FIFO capacity in samples. Channels beyond the ITC-18's four DA
/// outputs are dropped with a warning.
///
/// # Examples
///
/// ```
/// use itccompiler_backend::*;
///
/// let spec = StimulusSpec {
///     amplitude: 5.0,
///     full_range_v: 10.0,
///     duration_ms: 100.,
///     pulse_width_us: 100.,
///     frequency_hz: 200.,
///     ..Default::default()
/// };
/// let program = compile_pulse_train(&[spec], 1 << 20, &HardwareLimits::default()).unwrap();
/// assert_eq!(program.ticks_per_instruction(), 5);
/// // 25 ms porches and a 100 ms train at 12.5 us per sample-set
/// assert_eq!(program.sample_sets(), 2000 + 8000 + 2000);
/// assert_eq!(program.digital_word(program.sample_sets() - 1), 0);
/// ```
pub fn compile_pulse_train(
    channels: &[StimulusSpec],
    fifo_size: usize,
    limits: &HardwareLimits,
) -> CompileResult<CompiledProgram> {
    let mut timer = TickTimer::new();

    let channels = active_channels(channels)?;
    let shared = &channels[0];
    let da_channels: Vec<usize> = channels.iter().map(|spec| spec.da_channel).collect();
    let stride = channels.len() + 1;

    let porch_us = shared.gate_porch_us();
    let stimulus_us = shared.duration_us() + 2. * porch_us;
    let timing = resolve_timing(stimulus_us, stride, fifo_size, limits)?;
    debug!(
        "Resolved {} ticks per instruction: {} us per sample-set, stride {}, FIFO {}",
        timing.ticks_per_instruction, timing.sample_set_period_us, stride, fifo_size
    );

    let train_sets = timing.sets_in(shared.duration_us());
    let pulse = if pulse_fits(shared, &timing, train_sets) {
        synthesize_pulse(channels, &timing)?
    } else {
        debug!("Pulse of {} us does not fit the train, gate only", shared.pulse_width_us);
        None
    };
    let train = assemble_train(shared, pulse.as_ref(), &timing)?;
    let porch_sets = timing.sets_in(porch_us);
    let samples = wrap_porch(train, porch_sets, shared.gate_bits())?;

    let program = CompiledProgram::new(
        samples,
        timing,
        &da_channels,
        train_sets,
        porch_sets,
        pulse.as_ref().map_or(0, |p| p.phase_sets()),
        pulse.as_ref().map_or(0, |p| p.pulse_sets()),
    )?;
    debug!(
        "Compiled {} sample-sets ({} porch + {} train + {} porch), {} sets per pulse",
        program.sample_sets(),
        program.porch_sets(),
        program.train_sets(),
        program.porch_sets(),
        program.pulse_sets()
    );
    timer.tick_debug("compile_pulse_train");
    Ok(program)
}

/// Validates the specs and clamps them to the available DA outputs.
fn active_channels(channels: &[StimulusSpec]) -> CompileResult<&[StimulusSpec]> {
    if channels.is_empty() {
        return Err(CompileError::InvalidSpec("no active channels".to_string()));
    }
    let channels = if channels.len() > ITC18_NUM_DA_OUTPUTS {
        warn!(
            "{} channels requested, only the first {} DA outputs are used",
            channels.len(),
            ITC18_NUM_DA_OUTPUTS
        );
        &channels[..ITC18_NUM_DA_OUTPUTS]
    } else {
        channels
    };

    for (i, spec) in channels.iter().enumerate() {
        spec.validate(i == 0)?;
        if channels[..i].iter().any(|other| other.da_channel == spec.da_channel) {
            return Err(CompileError::InvalidSpec(format!(
                "DA channel {} is driven by more than one spec",
                spec.da_channel
            )));
        }
    }
    Ok(channels)
}
