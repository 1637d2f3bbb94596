//! Synthesis of a single (possibly biphasic) pulse.
//!
//! A pulse is a block of sample-sets: `phase_sets` sets at the positive amplitude, followed for
//! biphasic pulses by the same number of sets at the inverted amplitude. Each set carries one
//! range-normalized analog value per channel and the shared digital word (gate bit OR pulse-marker
//! bit).

use ndarray::{s, Array1, Array2};

use crate::channel::*;
use crate::error::*;
use crate::timing::HardwareTiming;

/// Full-scale DA code
pub const DA_FULL_SCALE: f64 = 32767.;

/// One pulse, laid out as `pulse_sets x stride` values.
#[derive(Clone, Debug, PartialEq)]
pub struct PulseWaveform {
    sets: Array2<i16>,
    phase_sets: usize,
}

impl PulseWaveform {
    pub fn sets(&self) -> &Array2<i16> {
        &self.sets
    }
    /// Sample-sets in one phase
    pub fn phase_sets(&self) -> usize {
        self.phase_sets
    }
    /// Sample-sets in the whole pulse (both phases for biphasic pulses)
    pub fn pulse_sets(&self) -> usize {
        self.sets.nrows()
    }
}

/// DA code for the first phase of a pulse on this channel.
pub fn phase_value(spec: &StimulusSpec) -> i16 {
    (spec.range_fraction() * DA_FULL_SCALE).round() as i16
}

/// Sample-sets in one pulse phase at the resolved timing.
pub fn phase_sets(shared: &StimulusSpec, timing: &HardwareTiming) -> usize {
    timing.sets_nearest(shared.pulse_width_us)
}

/// Whether a whole pulse (both phases when biphasic) fits in `train_sets` sample-sets.
pub fn pulse_fits(shared: &StimulusSpec, timing: &HardwareTiming, train_sets: usize) -> bool {
    let n_phases = if shared.pulse_biphasic { 2 } else { 1 };
    phase_sets(shared, timing)
        .checked_mul(n_phases)
        .is_some_and(|sets| sets <= train_sets)
}

/// Builds one pulse for the given channels.
///
/// Shared fields are taken from `channels[0]`. Returns `Ok(None)` when the pulse width is shorter
/// than half a sample-set, in which case the train carries no pulses.
pub fn synthesize_pulse(
    channels: &[StimulusSpec],
    timing: &HardwareTiming,
) -> CompileResult<Option<PulseWaveform>> {
    let shared = channels
        .first()
        .ok_or_else(|| CompileError::InvalidSpec("pulse needs at least one channel".to_string()))?;
    if channels.len() + 1 != timing.stride {
        return Err(CompileError::BufferSizeMismatch {
            stage: "pulse synthesis",
            expected: timing.stride,
            actual: channels.len() + 1,
        });
    }

    let phase_sets = phase_sets(shared, timing);
    if phase_sets == 0 {
        return Ok(None);
    }
    let n_phases = if shared.pulse_biphasic { 2 } else { 1 };
    let digital = shared.gate_and_marker_bits();

    // One sample-set per phase; the digital word is the same for both
    let mut first = Array1::<i16>::zeros(timing.stride);
    for (slot, spec) in channels.iter().enumerate() {
        first[slot] = phase_value(spec);
    }
    first[channels.len()] = digital;
    let mut second = first.mapv(|v| v.wrapping_neg());
    second[channels.len()] = digital;

    let pulse_sets = phase_sets.checked_mul(n_phases).ok_or_else(|| {
        CompileError::InvalidSpec(format!("pulse width {} us is too long", shared.pulse_width_us))
    })?;
    let mut sets = Array2::<i16>::zeros((pulse_sets, timing.stride));
    sets.slice_mut(s![..phase_sets, ..]).assign(&first);
    if shared.pulse_biphasic {
        sets.slice_mut(s![phase_sets.., ..]).assign(&second);
    }
    Ok(Some(PulseWaveform { sets, phase_sets }))
}
