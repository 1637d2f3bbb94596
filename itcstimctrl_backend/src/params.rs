//! Named stimulus parameters.
//!
//! The device reads its train parameters by name from a [`ParameterStore`] and subscribes to
//! their changes. Stimulus parameters only mark the compiled program stale; the control
//! parameters `prime` and `run` trigger a program load and a run-state change respectively, and
//! `running` is written back by the device to mirror its run state.
//!
//! [`MemoryParameterStore`] is the in-process implementation. Subscribers are invoked after the
//! store's lock is released, so a callback may freely read or write the store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use maplit::hashmap;
use parking_lot::Mutex;

use crate::error::*;

pub const TRAIN_DURATION_MS: &str = "train_duration_ms";
pub const CURRENT_PULSES: &str = "current_pulses";
pub const BIPHASIC_PULSES: &str = "biphasic_pulses";
pub const PULSE_AMPLITUDE: &str = "pulse_amplitude";
pub const PULSE_WIDTH_US: &str = "pulse_width_us";
pub const PULSE_FREQ_HZ: &str = "pulse_freq_hz";
pub const UA_PER_V: &str = "ua_per_v";
pub const PRIME: &str = "prime";
pub const RUN: &str = "run";
pub const RUNNING: &str = "running";

/// Parameters whose change makes the compiled program stale
pub const STIMULUS_PARAMETERS: [&str; 7] = [
    TRAIN_DURATION_MS,
    CURRENT_PULSES,
    BIPHASIC_PULSES,
    PULSE_AMPLITUDE,
    PULSE_WIDTH_US,
    PULSE_FREQ_HZ,
    UA_PER_V,
];

/// Control parameters
pub const CONTROL_PARAMETERS: [&str; 3] = [PRIME, RUN, RUNNING];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Integer(_) => "integer",
            ParamValue::Float(_) => "float",
        }
    }

    /// Numeric value; integers and floats are interchangeable
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Integer(value) => Some(value as f64),
            ParamValue::Float(value) => Some(value),
            ParamValue::Bool(_) => None,
        }
    }

    /// Boolean value; an integer reads as true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(value) => Some(value),
            ParamValue::Integer(value) => Some(value != 0),
            ParamValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{}", value),
            ParamValue::Integer(value) => write!(f, "{}", value),
            ParamValue::Float(value) => write!(f, "{}", value),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// Change notification: receives the parameter name and its new value
pub type ParamCallback = Arc<dyn Fn(&str, ParamValue) + Send + Sync>;

/// Source of named parameters with change notification.
pub trait ParameterStore: Send + Sync {
    fn get(&self, name: &str) -> StimResult<ParamValue>;
    /// Stores the value and notifies the parameter's subscribers
    fn set(&self, name: &str, value: ParamValue) -> StimResult<()>;
    fn subscribe(&self, name: &str, callback: ParamCallback) -> StimResult<()>;

    fn get_f64(&self, name: &str) -> StimResult<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| StimError::ParameterType {
            name: name.to_string(),
            expected: "number",
            found: value.type_name(),
        })
    }

    fn get_bool(&self, name: &str) -> StimResult<bool> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| StimError::ParameterType {
            name: name.to_string(),
            expected: "bool",
            found: value.type_name(),
        })
    }
}

/// Initial values of the device parameters: all zero or false.
pub fn default_parameters() -> HashMap<&'static str, ParamValue> {
    hashmap! {
        PRIME => ParamValue::Bool(false),
        RUN => ParamValue::Bool(false),
        RUNNING => ParamValue::Bool(false),
        TRAIN_DURATION_MS => ParamValue::Integer(0),
        CURRENT_PULSES => ParamValue::Bool(false),
        BIPHASIC_PULSES => ParamValue::Bool(false),
        PULSE_AMPLITUDE => ParamValue::Integer(0),
        PULSE_WIDTH_US => ParamValue::Integer(0),
        PULSE_FREQ_HZ => ParamValue::Integer(0),
        UA_PER_V => ParamValue::Integer(0),
    }
}

struct Entry {
    value: ParamValue,
    subscribers: Vec<ParamCallback>,
}

/// In-memory parameter store.
///
/// ```
/// use itcstimctrl_backend::params::*;
///
/// let store = MemoryParameterStore::with_defaults();
/// store.set(PULSE_FREQ_HZ, 50.into()).unwrap();
/// assert_eq!(store.get_f64(PULSE_FREQ_HZ).unwrap(), 50.);
/// assert!(store.get("no_such_parameter").is_err());
/// ```
#[derive(Default)]
pub struct MemoryParameterStore {
    entries: Mutex<IndexMap<String, Entry>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding every control and stimulus parameter at its default value
    pub fn with_defaults() -> Self {
        let store = Self::new();
        let defaults = default_parameters();
        for name in CONTROL_PARAMETERS.iter().chain(STIMULUS_PARAMETERS.iter()) {
            if let Some(&value) = defaults.get(name) {
                store.define(name, value);
            }
        }
        store
    }

    /// Adds a parameter, or resets the value of an existing one without notifying
    pub fn define(&self, name: &str, value: ParamValue) {
        let mut entries = self.entries.lock();
        match entries.get_mut(name) {
            Some(entry) => entry.value = value,
            None => {
                entries.insert(
                    name.to_string(),
                    Entry {
                        value,
                        subscribers: Vec::new(),
                    },
                );
            }
        }
    }

    /// Parameter names in definition order
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl ParameterStore for MemoryParameterStore {
    fn get(&self, name: &str) -> StimResult<ParamValue> {
        self.entries
            .lock()
            .get(name)
            .map(|entry| entry.value)
            .ok_or_else(|| StimError::UnknownParameter(name.to_string()))
    }

    fn set(&self, name: &str, value: ParamValue) -> StimResult<()> {
        let subscribers = {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| StimError::UnknownParameter(name.to_string()))?;
            entry.value = value;
            entry.subscribers.clone()
        };
        for callback in subscribers {
            callback(name, value);
        }
        Ok(())
    }

    fn subscribe(&self, name: &str, callback: ParamCallback) -> StimResult<()> {
        self.entries
            .lock()
            .get_mut(name)
            .map(|entry| entry.subscribers.push(callback))
            .ok_or_else(|| StimError::UnknownParameter(name.to_string()))
    }
}
