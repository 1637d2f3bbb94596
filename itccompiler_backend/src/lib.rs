//! # ITC-18 Stimulus Compiler Backend
//!
//! Compiles high-level pulse-train parameters into the interleaved sample buffer and sequencer
//! program an Instrutech ITC-18 plays out. The compiler is pure: it never touches hardware, and
//! the same inputs always produce the same [`CompiledProgram`].
//!
//! ## Pipeline
//! [`compile_pulse_train`] runs, in order:
//! - [`timing::resolve_timing`]: smallest instruction clock divisor for which the whole stimulus
//!   fits in half the device FIFO.
//! - [`pulse::synthesize_pulse`]: one mono- or biphasic pulse, one analog value per channel plus
//!   the gate/marker digital word.
//! - [`train::assemble_train`]: pulses copied at the requested frequency over a gate-only
//!   background.
//! - [`porch::wrap_porch`]: gate-only porches before and after the train; the last digital word
//!   is forced to zero.
//!
//! ## Modules
//! - [`channel`]: per-channel [`StimulusSpec`] and DA channel naming.
//! - [`instruction`]: sequencer instruction words.
//! - [`program`]: the compiled result handed to the device layer.
//! - [`error`]: [`CompileError`].
//!
//! With the `python` feature the crate also builds as a Python extension module exposing
//! `StimulusSpec` and `compile_pulse_train`.

pub mod channel;
pub mod compiler;
pub mod error;
pub mod instruction;
pub mod porch;
pub mod program;
pub mod pulse;
pub mod timing;
pub mod train;
pub mod utils;

#[cfg(feature = "python")]
pub mod python;

pub use channel::*;
pub use compiler::*;
pub use error::*;
pub use instruction::*;
pub use program::*;
pub use timing::*;
pub use utils::*;
