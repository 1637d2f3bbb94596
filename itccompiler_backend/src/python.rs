//! Python bindings, built with the `python` feature.
//!
//! Exposes [`PyStimulusSpec`] as `StimulusSpec` and a `compile_pulse_train` function returning
//! the sample buffer as a `(sample_sets, stride)` numpy array of `int16` together with the
//! resolved clock divisor.

use numpy::PyArray2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::channel::*;
use crate::compiler;
use crate::error::CompileError;
use crate::timing::{HardwareLimits, ITC18_DEBUG_FIFO_SIZE};

impl From<CompileError> for PyErr {
    fn from(err: CompileError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "StimulusSpec")]
#[derive(Clone)]
pub struct PyStimulusSpec {
    inner: StimulusSpec,
}

#[pymethods]
impl PyStimulusSpec {
    #[new]
    #[pyo3(signature = (
        da_channel,
        amplitude,
        duration_ms,
        pulse_width_us,
        frequency_hz,
        current_pulses = false,
        full_range_v = 10.24,
        ua_per_v = 1.,
        pulse_biphasic = false,
        do_gate = true,
        gate_bit = 0,
        gate_porch_ms = 25.,
        do_pulse_markers = true,
        pulse_marker_bit = 1,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        da_channel: &str,
        amplitude: f64,
        duration_ms: f64,
        pulse_width_us: f64,
        frequency_hz: f64,
        current_pulses: bool,
        full_range_v: f64,
        ua_per_v: f64,
        pulse_biphasic: bool,
        do_gate: bool,
        gate_bit: u32,
        gate_porch_ms: f64,
        do_pulse_markers: bool,
        pulse_marker_bit: u32,
    ) -> PyResult<Self> {
        Ok(Self {
            inner: StimulusSpec {
                da_channel: parse_da_channel(da_channel)?,
                amplitude,
                current_pulses,
                full_range_v,
                ua_per_v,
                duration_ms,
                pulse_width_us,
                frequency_hz,
                pulse_biphasic,
                do_gate,
                gate_bit,
                gate_porch_ms,
                do_pulse_markers,
                pulse_marker_bit,
            },
        })
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

/// Compiles the channels and returns `(samples, ticks_per_instruction)`.
#[pyfunction]
#[pyo3(signature = (channels, fifo_size = ITC18_DEBUG_FIFO_SIZE))]
fn compile_pulse_train(
    py: Python,
    channels: Vec<PyStimulusSpec>,
    fifo_size: usize,
) -> PyResult<(PyObject, u32)> {
    let specs: Vec<StimulusSpec> = channels.into_iter().map(|c| c.inner).collect();
    let program = compiler::compile_pulse_train(&specs, fifo_size, &HardwareLimits::default())?;
    let samples = PyArray2::from_array(py, program.samples()).to_object(py);
    Ok((samples, program.ticks_per_instruction()))
}

#[pymodule]
fn itccompiler_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyStimulusSpec>()?;
    m.add_function(wrap_pyfunction!(compile_pulse_train, m)?)?;
    Ok(())
}
