//! Device configuration.
//!
//! Everything the controller needs that is not a live parameter: hardware limits, the no-hardware
//! fallback, the recompile policy, and the train fields that are fixed for this device.

use itccompiler_backend::*;

/// When a parameter change is turned into a new program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecompilePolicy {
    /// Changes only mark the program stale; it is rebuilt on `prime` or before the next start
    Lazy,
    /// Every change recompiles and uploads immediately
    Eager,
}

/// Train fields not exposed as parameters
#[derive(Clone, Debug, PartialEq)]
pub struct TrainDefaults {
    pub da_channel: usize,
    pub full_range_v: f64,
    pub do_gate: bool,
    pub gate_bit: u32,
    pub gate_porch_ms: f64,
    pub do_pulse_markers: bool,
    pub pulse_marker_bit: u32,
}

impl Default for TrainDefaults {
    fn default() -> Self {
        Self {
            da_channel: 0,
            full_range_v: 10.24,
            do_gate: true,
            gate_bit: 0,
            gate_porch_ms: 25.,
            do_pulse_markers: true,
            pulse_marker_bit: 1,
        }
    }
}

impl TrainDefaults {
    /// A spec carrying these fixed fields, with the parameter-driven ones zeroed
    pub fn spec(&self) -> StimulusSpec {
        StimulusSpec {
            da_channel: self.da_channel,
            full_range_v: self.full_range_v,
            do_gate: self.do_gate,
            gate_bit: self.gate_bit,
            gate_porch_ms: self.gate_porch_ms,
            do_pulse_markers: self.do_pulse_markers,
            pulse_marker_bit: self.pulse_marker_bit,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StimDeviceConfig {
    /// Run without hardware when no ITC-18 can be opened
    pub allow_no_hardware: bool,
    /// FIFO size compiled against when no device is attached
    pub debug_fifo_size: usize,
    pub recompile: RecompilePolicy,
    pub limits: HardwareLimits,
    pub train: TrainDefaults,
}

impl Default for StimDeviceConfig {
    fn default() -> Self {
        Self {
            allow_no_hardware: true,
            debug_fifo_size: ITC18_DEBUG_FIFO_SIZE,
            recompile: RecompilePolicy::Lazy,
            limits: HardwareLimits::default(),
            train: TrainDefaults::default(),
        }
    }
}

impl StimDeviceConfig {
    pub fn with_allow_no_hardware(mut self, allow: bool) -> Self {
        self.allow_no_hardware = allow;
        self
    }

    pub fn with_debug_fifo_size(mut self, fifo_size: usize) -> Self {
        self.debug_fifo_size = fifo_size;
        self
    }

    pub fn with_recompile(mut self, policy: RecompilePolicy) -> Self {
        self.recompile = policy;
        self
    }

    pub fn with_limits(mut self, limits: HardwareLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_train(mut self, train: TrainDefaults) -> Self {
        self.train = train;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_device() {
        let config = StimDeviceConfig::default();
        assert!(config.allow_no_hardware);
        assert_eq!(config.debug_fifo_size, 1 << 20);
        assert_eq!(config.recompile, RecompilePolicy::Lazy);

        let spec = config.train.spec();
        assert_eq!(spec.da_channel, 0);
        assert_eq!(spec.gate_bits(), 0b01);
        assert_eq!(spec.gate_and_marker_bits(), 0b11);
        assert_eq!(spec.gate_porch_us(), 25_000.);
        assert_eq!(spec.full_range_v, 10.24);
    }

    #[test]
    fn builder() {
        let config = StimDeviceConfig::default()
            .with_allow_no_hardware(false)
            .with_recompile(RecompilePolicy::Eager)
            .with_debug_fifo_size(4096)
            .with_train(TrainDefaults { da_channel: 2, ..Default::default() });
        assert!(!config.allow_no_hardware);
        assert_eq!(config.recompile, RecompilePolicy::Eager);
        assert_eq!(config.debug_fifo_size, 4096);
        assert_eq!(config.train.spec().da_channel, 2);
    }
}
