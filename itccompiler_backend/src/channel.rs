//! Per-channel stimulus parameters.
//!
//! A stimulus train is described by one [`StimulusSpec`] per active DA channel. Only a few fields
//! are genuinely per-channel: `da_channel`, `amplitude`, `full_range_v`, `current_pulses` and
//! `ua_per_v`. Everything else (gating, pulse markers, biphasic flag, duration, pulse width and
//! frequency) is shared by the whole train and is read from the first channel only; the same fields
//! on later channels are ignored.
//!
//! ## Channel naming
//! DA channels are addressed by index `0..ITC18_NUM_DA_OUTPUTS`, or by name with the pattern
//! `da(number)` (e.g. `da0`, `DA3`), see [`parse_da_channel`].

use regex::Regex;

use crate::error::*;

/// Number of DA outputs on the ITC-18
pub const ITC18_NUM_DA_OUTPUTS: usize = 4;

/// Highest usable bit index of the 16-bit digital output word
const MAX_DIGITAL_BIT: u32 = 15;

/// Pulse-train parameters for one DA channel.
///
/// Amplitude is in volts for voltage pulses and in microamps for current pulses; in the latter
/// case `ua_per_v` converts to DA volts.
#[derive(Clone, Debug, PartialEq)]
pub struct StimulusSpec {
    // Per-channel fields
    pub da_channel: usize,
    pub amplitude: f64,
    pub current_pulses: bool,
    pub full_range_v: f64,
    pub ua_per_v: f64,

    // Shared fields: only honored on the first channel
    pub duration_ms: f64,
    pub pulse_width_us: f64,
    pub frequency_hz: f64,
    pub pulse_biphasic: bool,
    pub do_gate: bool,
    pub gate_bit: u32,
    pub gate_porch_ms: f64,
    pub do_pulse_markers: bool,
    pub pulse_marker_bit: u32,
}

impl Default for StimulusSpec {
    fn default() -> Self {
        Self {
            da_channel: 0,
            amplitude: 0.,
            current_pulses: false,
            full_range_v: 10.24,
            ua_per_v: 1.,
            duration_ms: 0.,
            pulse_width_us: 0.,
            frequency_hz: 0.,
            pulse_biphasic: false,
            do_gate: true,
            gate_bit: 0,
            gate_porch_ms: 25.,
            do_pulse_markers: true,
            pulse_marker_bit: 1,
        }
    }
}

impl StimulusSpec {
    /// Fraction of the DA full-scale range that one pulse phase drives.
    ///
    /// `(amplitude / full_range_v) / (ua_per_v if current pulses else 1000)`. The voltage-mode
    /// divisor of 1000 is part of the amplitude pipeline and is kept as is.
    pub fn range_fraction(&self) -> f64 {
        let unit_scale = if self.current_pulses { self.ua_per_v } else { 1000. };
        (self.amplitude / self.full_range_v) / unit_scale
    }

    /// Gate porch in microseconds; zero when gating is disabled.
    pub fn gate_porch_us(&self) -> f64 {
        if self.do_gate {
            self.gate_porch_ms * 1000.
        } else {
            0.
        }
    }

    pub fn duration_us(&self) -> f64 {
        self.duration_ms * 1000.
    }

    /// Pulse period in microseconds; zero when pulsing is disabled.
    pub fn pulse_period_us(&self) -> f64 {
        if self.frequency_hz > 0. {
            1e6 / self.frequency_hz
        } else {
            0.
        }
    }

    /// Digital word asserted while the gate is open.
    pub fn gate_bits(&self) -> i16 {
        if self.do_gate {
            1u16.checked_shl(self.gate_bit).unwrap_or(0) as i16
        } else {
            0
        }
    }

    /// Digital word asserted during a pulse: gate bit OR pulse-marker bit.
    pub fn gate_and_marker_bits(&self) -> i16 {
        let marker = if self.do_pulse_markers {
            1u16.checked_shl(self.pulse_marker_bit).unwrap_or(0) as i16
        } else {
            0
        };
        self.gate_bits() | marker
    }

    /// Checks the fields this channel contributes.
    ///
    /// `shared` selects whether the train-wide fields are checked too, which is only done for the
    /// first channel since they are ignored everywhere else.
    pub fn validate(&self, shared: bool) -> CompileResult<()> {
        let invalid = |msg: String| Err(CompileError::InvalidSpec(msg));

        if self.da_channel >= ITC18_NUM_DA_OUTPUTS {
            return invalid(format!(
                "DA channel {} out of range, the ITC-18 has {} DA outputs",
                self.da_channel, ITC18_NUM_DA_OUTPUTS
            ));
        }
        if !self.amplitude.is_finite() {
            return invalid(format!("amplitude {} is not finite", self.amplitude));
        }
        if !(self.full_range_v.is_finite() && self.full_range_v > 0.) {
            return invalid(format!("full range {} V must be positive", self.full_range_v));
        }
        if self.current_pulses && !(self.ua_per_v.is_finite() && self.ua_per_v > 0.) {
            return invalid(format!("ua_per_v {} must be positive for current pulses", self.ua_per_v));
        }
        let fraction = self.range_fraction();
        if fraction.abs() > 1. {
            return invalid(format!(
                "DA channel {} amplitude {} exceeds the full range ({} of full scale)",
                self.da_channel, self.amplitude, fraction
            ));
        }
        if !shared {
            return Ok(());
        }

        for (name, value) in [
            ("duration_ms", self.duration_ms),
            ("pulse_width_us", self.pulse_width_us),
            ("frequency_hz", self.frequency_hz),
            ("gate_porch_ms", self.gate_porch_ms),
        ] {
            if !(value.is_finite() && value >= 0.) {
                return invalid(format!("{name} {value} must be finite and non-negative"));
            }
        }
        for (name, bit) in [("gate_bit", self.gate_bit), ("pulse_marker_bit", self.pulse_marker_bit)] {
            if bit > MAX_DIGITAL_BIT {
                return invalid(format!("{name} {bit} does not fit the 16-bit digital word"));
            }
        }
        Ok(())
    }
}

/// Parses a DA channel name of the form `da(number)` into its index.
///
/// ```
/// use itccompiler_backend::channel::parse_da_channel;
///
/// assert_eq!(parse_da_channel("da2").unwrap(), 2);
/// assert!(parse_da_channel("ao0").is_err());
/// assert!(parse_da_channel("da4").is_err());
/// ```
pub fn parse_da_channel(name: &str) -> CompileResult<usize> {
    let re = Regex::new(r"(?i)^da(\d+)$").map_err(|e| CompileError::InvalidSpec(e.to_string()))?;
    let index = re
        .captures(name)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .ok_or_else(|| {
            CompileError::InvalidSpec(format!(
                "Expecting DA channels to be of format 'da(number)' yet received channel name {name}"
            ))
        })?;
    if index >= ITC18_NUM_DA_OUTPUTS {
        return Err(CompileError::InvalidSpec(format!(
            "DA channel {name} out of range, the ITC-18 has {ITC18_NUM_DA_OUTPUTS} DA outputs"
        )));
    }
    Ok(index)
}
