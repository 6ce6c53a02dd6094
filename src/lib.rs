//! Desktop companion for the Massage_Pro_X1 BLE massage device.
//!
//! - [`domain`] - telemetry models, waveform buffer, assistant rules, settings
//! - [`infrastructure`] - packet codec, connection session, transports, logging
//! - [`presentation`] - the egui shell

pub mod domain;
pub mod infrastructure;
pub mod presentation;
