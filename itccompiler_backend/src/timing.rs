//! Instruction clock selection.
//!
//! The ITC-18 sequencer executes one instruction every `ticks_per_instruction` base ticks, and
//! every sample-set takes one instruction per DA channel plus one for the digital output. The
//! whole stimulus (train plus both gate porches) is written to the FIFO up front, so the clock
//! must be slow enough for it to fit. [`resolve_timing`] walks the legal divisor range from the
//! fastest clock upward and stops at the first divisor whose instruction count fits in half the
//! FIFO.

use crate::error::*;

/// ITC-18 base tick, in microseconds (800 ticks per ms)
pub const ITC18_TICK_TIME_US: f64 = 1.25;
/// Smallest legal instruction clock divisor
pub const ITC18_MINIMUM_TICKS: u32 = 5;
/// Largest legal instruction clock divisor
pub const ITC18_MAXIMUM_TICKS: u32 = 65535;
/// FIFO size assumed when no device is attached
pub const ITC18_DEBUG_FIFO_SIZE: usize = 1 << 20;

/// Sequencer clock limits of the target hardware.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HardwareLimits {
    pub tick_time_us: f64,
    pub min_ticks: u32,
    pub max_ticks: u32,
}

impl Default for HardwareLimits {
    fn default() -> Self {
        Self {
            tick_time_us: ITC18_TICK_TIME_US,
            min_ticks: ITC18_MINIMUM_TICKS,
            max_ticks: ITC18_MAXIMUM_TICKS,
        }
    }
}

/// Resolved sequencer timing for one compiled stimulus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HardwareTiming {
    /// Instruction clock divisor, in base ticks per instruction
    pub ticks_per_instruction: u32,
    pub instruction_period_us: f64,
    /// Period of one full sample-set (`instruction_period_us * stride`)
    pub sample_set_period_us: f64,
    /// Values per sample-set: one per DA channel plus the digital word
    pub stride: usize,
    /// FIFO capacity in samples the timing was resolved against
    pub fifo_size: usize,
}

impl HardwareTiming {
    /// Whole sample-sets that fit in `duration_us` (truncating).
    pub fn sets_in(&self, duration_us: f64) -> usize {
        (duration_us / self.sample_set_period_us) as usize
    }

    /// Sample-sets closest to `duration_us` (rounding).
    pub fn sets_nearest(&self, duration_us: f64) -> usize {
        (duration_us / self.sample_set_period_us).round() as usize
    }
}

/// Checks whether `ticks` lets the stimulus fit within half the FIFO.
///
/// The FIFO budget is `fifo_size / (2 * stride)` in integer arithmetic; the factor of two is a
/// safety margin against the split between written and available samples.
pub fn fits_fifo(stimulus_us: f64, ticks: u32, stride: usize, fifo_size: usize, tick_time_us: f64) -> bool {
    let instructions = stimulus_us / (tick_time_us * ticks as f64);
    let budget = fifo_size / (2 * stride);
    instructions <= budget as f64
}

/// Finds the smallest legal divisor for which the stimulus fits the FIFO.
///
/// `stimulus_us` is the train duration plus both gate porches. Fails with
/// [`CompileError::TimingUnsatisfiable`] if even `limits.max_ticks` does not fit.
///
/// ```
/// use itccompiler_backend::timing::*;
///
/// // 10 ms on one channel (stride 2) into a 1024-sample FIFO needs 32 ticks per instruction
/// let timing = resolve_timing(10_000., 2, 1024, &HardwareLimits::default()).unwrap();
/// assert_eq!(timing.ticks_per_instruction, 32);
/// assert_eq!(timing.sample_set_period_us, 80.);
/// ```
pub fn resolve_timing(
    stimulus_us: f64,
    stride: usize,
    fifo_size: usize,
    limits: &HardwareLimits,
) -> CompileResult<HardwareTiming> {
    if stride == 0 {
        return Err(CompileError::BufferSizeMismatch {
            stage: "timing resolution",
            expected: 1,
            actual: 0,
        });
    }

    let ticks = (limits.min_ticks..=limits.max_ticks)
        .find(|&ticks| fits_fifo(stimulus_us, ticks, stride, fifo_size, limits.tick_time_us))
        .ok_or(CompileError::TimingUnsatisfiable {
            stimulus_us,
            fifo_size,
            stride,
            max_ticks: limits.max_ticks,
        })?;

    let instruction_period_us = ticks as f64 * limits.tick_time_us;
    Ok(HardwareTiming {
        ticks_per_instruction: ticks,
        instruction_period_us,
        sample_set_period_us: instruction_period_us * stride as f64,
        stride,
        fifo_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fastest_clock_when_everything_fits() {
        let timing = resolve_timing(150_000., 2, 1 << 20, &HardwareLimits::default()).unwrap();
        assert_eq!(timing.ticks_per_instruction, ITC18_MINIMUM_TICKS);
        assert_eq!(timing.instruction_period_us, 6.25);
        assert_eq!(timing.sample_set_period_us, 12.5);
        assert_eq!(timing.sets_in(100_000.), 8000);
        assert_eq!(timing.sets_in(25_000.), 2000);
    }

    #[test]
    fn smallest_fitting_divisor() {
        let limits = HardwareLimits::default();
        for (stimulus_us, stride, fifo_size) in [
            (10_000., 2, 1024),
            (150_000., 3, 4096),
            (1_000_000., 5, 1 << 18),
            (2_345_678., 2, 77_777),
        ] {
            let ticks = resolve_timing(stimulus_us, stride, fifo_size, &limits)
                .unwrap()
                .ticks_per_instruction;
            assert!(fits_fifo(stimulus_us, ticks, stride, fifo_size, limits.tick_time_us));
            if ticks > limits.min_ticks {
                assert!(!fits_fifo(stimulus_us, ticks - 1, stride, fifo_size, limits.tick_time_us));
            }
        }
    }

    #[test]
    fn fit_test_is_monotonic() {
        let limits = HardwareLimits::default();
        let fits: Vec<bool> = (limits.min_ticks..200)
            .map(|ticks| fits_fifo(123_456., ticks, 3, 8192, limits.tick_time_us))
            .collect();
        let first = fits.iter().position(|&f| f).unwrap();
        assert!(fits[first..].iter().all(|&f| f));
        assert!(fits[..first].iter().all(|&f| !f));
    }

    #[test]
    fn budget_uses_integer_division() {
        // 1025 / (2 * 2) = 256, not 256.25
        assert!(fits_fifo(256. * 1.25 * 5., 5, 2, 1025, 1.25));
        assert!(!fits_fifo(256.5 * 1.25 * 5., 5, 2, 1025, 1.25));
    }

    #[test]
    fn unsatisfiable_beyond_maximum_divisor() {
        // 100 ms into a budget of one instruction needs 80000 ticks
        let err = resolve_timing(100_000., 2, 4, &HardwareLimits::default()).unwrap_err();
        assert!(err.is_timing());

        let limits = HardwareLimits {
            max_ticks: 31,
            ..Default::default()
        };
        assert!(resolve_timing(10_000., 2, 1024, &limits).is_err());
        assert!(resolve_timing(10_000., 2, 1024, &HardwareLimits { max_ticks: 32, ..limits }).is_ok());
    }
}
