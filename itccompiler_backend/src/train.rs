//! Layout of the pulse train.
//!
//! The train buffer holds `max(train_sets, 1)` sample-sets. When gating is enabled the gate bit is
//! stamped into the digital slot of every train set first; pulses are then copied over it at
//! `round(k * pulse_period / sample_set_period)` for `k = 0, 1, ...` until the next pulse would run
//! past the end of the train. Pulses never blend with what they overwrite, and a pulse that would
//! only partially fit is dropped.

use ndarray::{s, Array2};
use tracing::debug;

use crate::channel::*;
use crate::error::*;
use crate::pulse::PulseWaveform;
use crate::timing::HardwareTiming;

/// Assembles the train for `shared` (the first channel's spec) at the resolved timing.
///
/// Overlapping pulses, i.e. a pulse starting before the previous one has ended, are rejected with
/// [`CompileError::InvalidSpec`].
pub fn assemble_train(
    shared: &StimulusSpec,
    pulse: Option<&PulseWaveform>,
    timing: &HardwareTiming,
) -> CompileResult<Array2<i16>> {
    let stride = timing.stride;
    let digital = stride - 1;
    let train_sets = timing.sets_in(shared.duration_us());

    let mut train = Array2::<i16>::zeros((train_sets.max(1), stride));
    let gate_bits = shared.gate_bits();
    if gate_bits != 0 {
        train.slice_mut(s![..train_sets, digital]).fill(gate_bits);
    }

    let pulse_period_us = shared.pulse_period_us();
    let pulse = match pulse {
        Some(pulse) if pulse_period_us > 0. => pulse,
        _ => return Ok(train),
    };
    if pulse.sets().ncols() != stride {
        return Err(CompileError::BufferSizeMismatch {
            stage: "train assembly",
            expected: stride,
            actual: pulse.sets().ncols(),
        });
    }

    let pulse_sets = pulse.pulse_sets();
    let mut previous_end = 0;
    let mut n_pulses = 0;
    for pulse_count in 0usize.. {
        let offset = timing.sets_nearest(pulse_count as f64 * pulse_period_us);
        match offset.checked_add(pulse_sets) {
            Some(end) if end <= train_sets => {}
            _ => break,
        }
        if pulse_count > 0 && offset < previous_end {
            return Err(CompileError::InvalidSpec(format!(
                "pulses overlap: pulse {} starts at set {} before the previous pulse ends at set {} \
                 ({} Hz with {} sets per pulse)",
                pulse_count, offset, previous_end, shared.frequency_hz, pulse_sets
            )));
        }
        train
            .slice_mut(s![offset..offset + pulse_sets, ..])
            .assign(pulse.sets());
        previous_end = offset + pulse_sets;
        n_pulses += 1;
    }
    debug!("Placed {} pulses of {} sets in a train of {} sets", n_pulses, pulse_sets, train_sets);
    Ok(train)
}
