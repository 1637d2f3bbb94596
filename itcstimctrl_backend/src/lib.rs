//! # ITC-18 Stimulus Controller Backend
//!
//! Owns an Instrutech ITC-18, loads pulse trains compiled by [`itccompiler_backend`] and controls
//! their playback from a set of named parameters.
//!
//! ## Layers
//! - [`transport`]: the [`transport::ItcDriver`] / [`transport::ItcHandle`] traits over the vendor
//!   calls, with [`sim`] as an in-memory device and `itc18` (feature `itc18`) as the binding to the
//!   vendor library.
//! - [`session`]: the open handle and run state behind one lock.
//! - [`upload`]: the sequencer/FIFO transfer of a [`itccompiler_backend::CompiledProgram`].
//! - [`params`]: named parameters with change notification.
//! - [`device`]: [`device::StimDevice`], the lifecycle controller tying the above together.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use itcstimctrl_backend::*;
//!
//! let sim = SimulatedItc18::default();
//! let store = Arc::new(MemoryParameterStore::with_defaults());
//! let device = StimDevice::new(Box::new(sim.clone()), store.clone(), StimDeviceConfig::default());
//! device.initialize().unwrap();
//!
//! store.set(TRAIN_DURATION_MS, 100i64.into()).unwrap();
//! store.set(PULSE_AMPLITUDE, 5i64.into()).unwrap();
//! store.set(PULSE_WIDTH_US, 100i64.into()).unwrap();
//! store.set(PULSE_FREQ_HZ, 50i64.into()).unwrap();
//! store.set(RUN, true.into()).unwrap();
//!
//! assert!(device.is_running());
//! assert_eq!(store.get(RUNNING).unwrap(), ParamValue::Bool(true));
//! assert!(sim.snapshot().started);
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod params;
pub mod session;
pub mod sim;
pub mod transport;
pub mod upload;

#[cfg(feature = "itc18")]
pub mod itc18;

pub use config::*;
pub use device::*;
pub use error::*;
pub use params::*;
pub use sim::SimulatedItc18;
