//! Bluetooth Module
//!
//! Provides BLE communication with the massage device.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                     │
//! │  (owns session, codec and transport; one event at a time)│
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Session  │  │ Transport  │  │ Protocol │
//! │           │  │            │  │          │
//! │ - state   │  │ - simulator│  │ - UUIDs  │
//! │   machine │  │ - btleplug │  │ - encode │
//! │           │  │            │  │ - decode │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Packet codec and wire constants
//! - [`session`] - Per-connection state machine
//! - [`transport`] - Transport trait and event types
//! - [`simulator`] - In-process device emulator
//! - `btleplug_backend` - Real BLE transport (feature `ble`)
//! - [`service`] - Main service coordinator

#[cfg(feature = "ble")]
pub mod btleplug_backend;
pub mod protocol;
pub mod service;
pub mod session;
pub mod simulator;
pub mod transport;

// Re-export main service for convenience
pub use service::BluetoothService;

use crate::domain::settings::{Settings, TransportKind};
use simulator::{SimulatedPeripheral, SimulatorConfig};
use transport::{Transport, TransportError};

/// Build the transport selected in the settings
pub fn create_transport(settings: &Settings) -> Result<Box<dyn Transport>, TransportError> {
    match settings.device.transport {
        TransportKind::Simulated => Ok(Box::new(SimulatedPeripheral::new(simulator_config(
            settings,
        )))),
        #[cfg(feature = "ble")]
        TransportKind::Ble => {
            let config = btleplug_backend::BtleplugConfig::from_settings(&settings.device)?;
            Ok(Box::new(btleplug_backend::BtleplugTransport::new(config)))
        }
        #[cfg(not(feature = "ble"))]
        TransportKind::Ble => Err(TransportError::Unsupported("BLE")),
    }
}

/// Simulator parameters taken from the configured protocol and device name
pub fn simulator_config(settings: &Settings) -> SimulatorConfig {
    SimulatorConfig {
        protocol: settings.protocol,
        device_name: settings.device.name.clone(),
        ..SimulatorConfig::default()
    }
}
