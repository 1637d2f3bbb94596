//! The compiled stimulus program.
//!
//! A [`CompiledProgram`] is what gets uploaded to the ITC-18: a sample buffer of
//! `sample_sets x stride` signed 16-bit values (one row per sequencer pass, one DA value per
//! active channel followed by the digital output word), the sequencer instruction list that
//! consumes it, and the timing it was compiled for.
//!
//! Invariants, checked on construction:
//! - `stride == da_channels.len() + 1 == instructions.len()`
//! - `sample_sets == 2 * porch_sets + max(train_sets, 1)`
//! - the digital word of the last sample-set is zero

use std::borrow::Cow;

use ndarray::{Array2, ArrayView1};

use crate::channel::ITC18_NUM_DA_OUTPUTS;
use crate::error::*;
use crate::instruction::*;
use crate::timing::HardwareTiming;

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledProgram {
    samples: Array2<i16>,
    timing: HardwareTiming,
    instructions: Vec<SeqInstr>,
    train_sets: usize,
    porch_sets: usize,
    phase_sets: usize,
    pulse_sets: usize,
}

impl CompiledProgram {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        samples: Array2<i16>,
        timing: HardwareTiming,
        da_channels: &[usize],
        train_sets: usize,
        porch_sets: usize,
        phase_sets: usize,
        pulse_sets: usize,
    ) -> CompileResult<Self> {
        if let Some(&channel) = da_channels.iter().find(|&&c| c >= ITC18_NUM_DA_OUTPUTS) {
            return Err(CompileError::InvalidSpec(format!(
                "DA channel {} out of range, the ITC-18 has {} DA outputs",
                channel, ITC18_NUM_DA_OUTPUTS
            )));
        }
        let (sample_sets, stride) = samples.dim();
        if stride != timing.stride || stride != da_channels.len() + 1 {
            return Err(CompileError::BufferSizeMismatch {
                stage: "program stride",
                expected: da_channels.len() + 1,
                actual: stride,
            });
        }
        let expected_sets = 2 * porch_sets + train_sets.max(1);
        if sample_sets != expected_sets {
            return Err(CompileError::BufferSizeMismatch {
                stage: "program length",
                expected: expected_sets,
                actual: sample_sets,
            });
        }
        if samples[[sample_sets - 1, stride - 1]] != 0 {
            return Err(CompileError::InvalidSpec(
                "program leaves the gate open after its last sample-set".to_string(),
            ));
        }
        Ok(Self {
            samples,
            timing,
            instructions: instruction_sequence(da_channels),
            train_sets,
            porch_sets,
            phase_sets,
            pulse_sets,
        })
    }

    /// Sample buffer, one row per sample-set
    pub fn samples(&self) -> &Array2<i16> {
        &self.samples
    }
    pub fn timing(&self) -> &HardwareTiming {
        &self.timing
    }
    pub fn instructions(&self) -> &[SeqInstr] {
        &self.instructions
    }
    /// Sequencer program as hardware words
    pub fn instruction_words(&self) -> Vec<i32> {
        instruction_words(&self.instructions)
    }
    pub fn stride(&self) -> usize {
        self.samples.ncols()
    }
    /// Total sample-sets, porches included
    pub fn sample_sets(&self) -> usize {
        self.samples.nrows()
    }
    /// Total values in the buffer (`sample_sets * stride`)
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
    /// Sample-sets covering the train itself
    pub fn train_sets(&self) -> usize {
        self.train_sets
    }
    /// Sample-sets in each gate porch
    pub fn porch_sets(&self) -> usize {
        self.porch_sets
    }
    pub fn phase_sets(&self) -> usize {
        self.phase_sets
    }
    pub fn pulse_sets(&self) -> usize {
        self.pulse_sets
    }
    pub fn ticks_per_instruction(&self) -> u32 {
        self.timing.ticks_per_instruction
    }
    /// Playback time of the whole buffer, in microseconds
    pub fn duration_us(&self) -> f64 {
        self.sample_sets() as f64 * self.timing.sample_set_period_us
    }

    pub fn sample_set(&self, set: usize) -> ArrayView1<'_, i16> {
        self.samples.row(set)
    }
    pub fn digital_word(&self, set: usize) -> i16 {
        self.samples[[set, self.stride() - 1]]
    }
    /// Digital words of every sample-set, in playback order
    pub fn digital_words(&self) -> Vec<i16> {
        self.samples.column(self.stride() - 1).to_vec()
    }

    /// Interleaved buffer in FIFO order: DA values then the digital word, set after set.
    pub fn interleaved(&self) -> Cow<'_, [i16]> {
        match self.samples.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.samples.iter().copied().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn timing(stride: usize) -> HardwareTiming {
        HardwareTiming {
            ticks_per_instruction: 5,
            instruction_period_us: 6.25,
            sample_set_period_us: 6.25 * stride as f64,
            stride,
            fifo_size: 1 << 20,
        }
    }

    #[test]
    fn interleaved_is_row_major() {
        let samples = array![[0, 1], [7, 1], [-7, 1], [0, 0]];
        let program = CompiledProgram::new(samples, timing(2), &[0], 2, 1, 1, 2).unwrap();
        assert_eq!(&*program.interleaved(), &[0, 1, 7, 1, -7, 1, 0, 0]);
        assert_eq!(program.n_samples(), 8);
        assert_eq!(program.digital_words(), vec![1, 1, 1, 0]);
        assert_eq!(program.instruction_words(), vec![0x4000, 0x6C00]);
        assert_eq!(program.duration_us(), 50.);
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let samples = Array2::<i16>::zeros((4, 3));
        assert!(CompiledProgram::new(samples.clone(), timing(2), &[0], 2, 1, 0, 0).is_err());
        assert!(CompiledProgram::new(samples.clone(), timing(3), &[0], 2, 1, 0, 0).is_err());
        assert!(CompiledProgram::new(samples.clone(), timing(3), &[0, 1], 4, 1, 0, 0).is_err());
        assert!(CompiledProgram::new(samples, timing(3), &[0, 1], 2, 1, 0, 0).is_ok());
    }

    #[test]
    fn out_of_range_da_channel_is_rejected() {
        let samples = array![[0, 1], [0, 0]];
        let err = CompiledProgram::new(samples, timing(2), &[4], 0, 0, 0, 0).unwrap_err();
        assert!(matches!(err, CompileError::InvalidSpec(_)));
    }
}
