//! Loading a compiled program onto the ITC-18.
//!
//! [`upload_program`] is a single-shot transfer, called with the hardware lock held for its whole
//! duration:
//!
//! 1. load the sequencer program (one DA update per channel, then the digital output word),
//! 2. stop and reinitialize the sequencer, which empties the FIFO,
//! 3. check write availability against the train length,
//! 4. write the whole interleaved buffer,
//! 5. set the sampling interval to the resolved clock divisor.
//!
//! A failure aborts the transfer without retry. Past step 2 the device is left idle with no
//! program loaded.

use itccompiler_backend::*;
use tracing::{error, info};

use crate::error::*;
use crate::transport::*;

pub fn upload_program(handle: &mut dyn ItcHandle, program: &CompiledProgram) -> StimResult<()> {
    let mut timer = TickTimer::new();

    let instructions = program.instruction_words();
    itc_call("ITC18_SetSequence", || handle.set_sequence(&instructions))?;
    itc_call("ITC18_StopAndInitialize", || handle.stop_and_initialize(true, true))?;

    let available = handle
        .fifo_write_available()
        .map_err(|status| hardware_failure("ITC18_GetFIFOWriteAvailable", status))?;
    if available < program.train_sets() {
        error!(
            "ITC-18 write buffer was full: {} available, train needs {}",
            available,
            program.train_sets()
        );
        return Err(StimError::BufferTooLarge {
            available,
            required: program.train_sets(),
        });
    }

    let samples = program.interleaved();
    itc_call("ITC18_WriteFIFO", || handle.write_fifo(&samples))?;
    itc_call("ITC18_SetSamplingInterval", || {
        handle.set_sampling_interval(program.ticks_per_instruction(), false)
    })?;

    info!(
        "Loaded {} samples ({} sets of {}) at {} ticks per instruction",
        samples.len(),
        program.sample_sets(),
        program.stride(),
        program.ticks_per_instruction()
    );
    timer.tick_debug("upload_program");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::*;

    fn program() -> CompiledProgram {
        let spec = StimulusSpec {
            amplitude: 5.,
            full_range_v: 10.,
            duration_ms: 10.,
            pulse_width_us: 100.,
            frequency_hz: 100.,
            ..Default::default()
        };
        compile_pulse_train(&[spec], 1 << 18, &HardwareLimits::default()).unwrap()
    }

    #[test]
    fn transfer_order_and_contents() {
        let mut sim = SimulatedItc18::default();
        let mut handle = sim.open(OpenMode::Pci).unwrap();
        let program = program();
        upload_program(handle.as_mut(), &program).unwrap();

        let state = sim.snapshot();
        assert_eq!(
            state.calls[1..],
            [
                "ITC18_SetSequence",
                "ITC18_StopAndInitialize",
                "ITC18_GetFIFOWriteAvailable",
                "ITC18_WriteFIFO",
                "ITC18_SetSamplingInterval"
            ]
        );
        assert_eq!(state.sequence, vec![0x4000, 0x6C00]);
        assert_eq!(state.fifo, program.interleaved().to_vec());
        assert_eq!(state.sampling_interval, Some((program.ticks_per_instruction(), false)));
    }

    #[test]
    fn insufficient_availability_aborts_before_write() {
        let mut sim = SimulatedItc18::default();
        let mut handle = sim.open(OpenMode::Pci).unwrap();
        let program = program();
        sim.configure(|config| config.write_available = Some(program.train_sets() - 1));

        let err = upload_program(handle.as_mut(), &program).unwrap_err();
        assert!(matches!(err, StimError::BufferTooLarge { .. }));
        let state = sim.snapshot();
        assert_eq!(state.call_count("ITC18_WriteFIFO"), 0);
        assert!(state.fifo.is_empty());
        assert_eq!(state.sampling_interval, None);
    }

    #[test]
    fn write_failure_reports_status() {
        let mut sim = SimulatedItc18::default();
        let mut handle = sim.open(OpenMode::Pci).unwrap();
        sim.configure(|config| config.write_status = -7);

        let err = upload_program(handle.as_mut(), &program()).unwrap_err();
        assert_eq!(
            err,
            StimError::HardwareWriteFailure {
                operation: "ITC18_WriteFIFO",
                status: -7
            }
        );
        assert_eq!(sim.snapshot().call_count("ITC18_SetSamplingInterval"), 0);
    }
}
