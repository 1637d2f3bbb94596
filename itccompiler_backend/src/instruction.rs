//! Provides definitions for ITC-18 sequencer instructions.
//!
//! ## Main Structures and Enumerations:
//!
//! - [`SeqInstr`]: one entry of the sequencer program. The ITC-18 runs its instruction list
//!   cyclically; every instruction selects an output (and optionally an input) and consumes one
//!   sample from the FIFO.
//!
//! - [`instruction_sequence`]: builds the instruction list for a stimulus: one DA update per active
//!   channel, followed by one digital-output update with input sampling skipped. One pass through
//!   the list consumes exactly one sample-set.
//!
//! Instruction words follow the bit layout of the vendor header (`ITC18.h`).

use std::fmt;

/// Sequencer word: update DA output 0..3
pub const ITC18_OUTPUT_DA: [i32; 4] = [0x0000, 0x0800, 0x1000, 0x1800];
/// Sequencer word: digital output port 0
pub const ITC18_OUTPUT_DIGITAL0: i32 = 0x2000;
/// Sequencer word: digital output port 1
pub const ITC18_OUTPUT_DIGITAL1: i32 = 0x2800;
/// Sequencer word: do not sample an input on this instruction
pub const ITC18_INPUT_SKIP: i32 = 0x0400;
/// Sequencer word: latch the selected output
pub const ITC18_OUTPUT_UPDATE: i32 = 0x4000;

/// Enum type for sequencer instructions. Supported instructions: `DaOutput`, `DigitalOutput`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqInstr {
    /// Write the next FIFO sample to the given DA channel
    DaOutput(usize),
    /// Write the next FIFO sample to the digital output word
    DigitalOutput,
}

impl SeqInstr {
    /// Encodes the instruction as the sequencer word the hardware expects.
    ///
    /// # Panics
    /// Panics for a DA channel outside `0..4`; channel indices are validated before compilation.
    pub fn word(&self) -> i32 {
        match *self {
            SeqInstr::DaOutput(channel) => ITC18_OUTPUT_DA[channel] | ITC18_OUTPUT_UPDATE,
            SeqInstr::DigitalOutput => ITC18_OUTPUT_DIGITAL1 | ITC18_INPUT_SKIP | ITC18_OUTPUT_UPDATE,
        }
    }
}

impl fmt::Display for SeqInstr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SeqInstr::DaOutput(channel) => write!(f, "DA{}", channel),
            SeqInstr::DigitalOutput => write!(f, "DIGITAL1"),
        }
    }
}

/// Builds the sequencer program for the given DA channels, in sample-set order.
///
/// ```
/// use itccompiler_backend::instruction::*;
///
/// let seq = instruction_sequence(&[0, 2]);
/// assert_eq!(seq, vec![SeqInstr::DaOutput(0), SeqInstr::DaOutput(2), SeqInstr::DigitalOutput]);
/// assert_eq!(seq[1].word(), 0x1000 | ITC18_OUTPUT_UPDATE);
/// ```
pub fn instruction_sequence(da_channels: &[usize]) -> Vec<SeqInstr> {
    da_channels
        .iter()
        .map(|&channel| SeqInstr::DaOutput(channel))
        .chain(std::iter::once(SeqInstr::DigitalOutput))
        .collect()
}

/// Encodes a sequencer program into hardware words.
pub fn instruction_words(seq: &[SeqInstr]) -> Vec<i32> {
    seq.iter().map(SeqInstr::word).collect()
}
