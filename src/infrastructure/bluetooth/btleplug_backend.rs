//! BLE transport on top of `btleplug`
//!
//! Finds the peripheral by advertised name, connects, resolves the control
//! and notify characteristics of the massage service, subscribes to
//! notifications and forwards them as [`TransportEvent`]s. Writes are queued
//! to the same task so they go out in order. Nothing here retries: a failed
//! step is reported and the service decides what to do.

use crate::domain::settings::DeviceSettings;
use crate::infrastructure::bluetooth::transport::{
    EventSink, Transport, TransportError, TransportEvent,
};
use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BtleplugConfig {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub control_uuid: Uuid,
    pub notify_uuid: Uuid,
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
}

impl BtleplugConfig {
    pub fn from_settings(device: &DeviceSettings) -> Result<Self, TransportError> {
        let parse = |s: &str| {
            Uuid::parse_str(s).map_err(|_| TransportError::InvalidUuid(s.to_string()))
        };
        Ok(Self {
            device_name: device.name.clone(),
            service_uuid: parse(&device.service_uuid)?,
            control_uuid: parse(&device.control_char_uuid)?,
            notify_uuid: parse(&device.notify_char_uuid)?,
            scan_timeout: Duration::from_secs(device.scan_timeout_secs),
            connect_timeout: Duration::from_secs(device.connect_timeout_secs),
        })
    }
}

struct Worker {
    commands: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

pub struct BtleplugTransport {
    config: BtleplugConfig,
    worker: Option<Worker>,
}

impl BtleplugTransport {
    pub fn new(config: BtleplugConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }
}

impl Transport for BtleplugTransport {
    fn open(&mut self, sink: EventSink) -> Result<(), TransportError> {
        self.close();

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let task = runtime.spawn(async move {
            if let Err(e) = run_link(config, sink.clone(), command_rx).await {
                error!("BLE link failed: {:#}", e);
                sink.send(TransportEvent::Failed(e.to_string()));
            }
        });

        self.worker = Some(Worker { commands, task });
        Ok(())
    }

    fn write(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let worker = self.worker.as_ref().ok_or(TransportError::NotOpen)?;
        worker
            .commands
            .send(packet.to_vec())
            .map_err(|_| TransportError::WorkerStopped)
    }

    fn close(&mut self) {
        let Some(Worker { commands, task }) = self.worker.take() else {
            return;
        };
        // Dropping the command sender makes the link task disconnect
        drop(commands);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let abort = task.abort_handle();
                runtime.spawn(async move {
                    if tokio::time::timeout(Duration::from_secs(3), task).await.is_err() {
                        warn!("BLE link task did not stop in time");
                        abort.abort();
                    }
                });
            }
            Err(_) => task.abort(),
        }
    }
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!(TransportError::NoAdapter))
}

async fn find_device(adapter: &Adapter, config: &BtleplugConfig) -> Result<Peripheral> {
    info!(
        "Scanning for {} ({} s)",
        config.device_name,
        config.scan_timeout.as_secs()
    );
    adapter
        .start_scan(ScanFilter {
            services: vec![config.service_uuid],
        })
        .await?;

    let deadline = tokio::time::Instant::now() + config.scan_timeout;
    let found = 'scan: loop {
        for peripheral in adapter.peripherals().await? {
            let name = peripheral
                .properties()
                .await
                .ok()
                .flatten()
                .and_then(|p| p.local_name);
            if name.as_deref() == Some(config.device_name.as_str()) {
                break 'scan Some(peripheral);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            break None;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    adapter.stop_scan().await.ok();
    found.ok_or_else(|| anyhow!("{} not found", config.device_name))
}

fn find_char(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))
}

async fn run_link(
    config: BtleplugConfig,
    sink: EventSink,
    mut commands: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<()> {
    let adapter = first_adapter().await?;
    let peripheral = find_device(&adapter, &config).await?;

    tokio::time::timeout(config.connect_timeout, peripheral.connect())
        .await
        .map_err(|_| anyhow!("connect timed out after {:?}", config.connect_timeout))??;
    sink.send(TransportEvent::Connected {
        device_name: config.device_name.clone(),
    });

    // BlueZ reports the link before its GATT cache is filled
    #[cfg(target_os = "linux")]
    tokio::time::sleep(Duration::from_millis(600)).await;

    peripheral.discover_services().await?;
    let control = find_char(&peripheral, config.control_uuid)?;
    let notify = find_char(&peripheral, config.notify_uuid)?;

    // Writes the CCCD on the notify characteristic
    peripheral.subscribe(&notify).await?;
    let mut notifications = peripheral.notifications().await?;
    let mut central_events = adapter.events().await?;
    let peripheral_id = peripheral.id();

    sink.send(TransportEvent::ServicesReady);
    info!("{} ready", config.device_name);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(packet) = command else {
                    debug!("Disconnect requested");
                    peripheral.disconnect().await.ok();
                    return Ok(());
                };
                match peripheral.write(&control, &packet, WriteType::WithResponse).await {
                    Ok(()) => debug!("Sent: {:02X?}", packet),
                    Err(e) => {
                        warn!("Write {:02X?} failed: {}", packet, e);
                        sink.send(TransportEvent::WriteFailed(e.to_string()));
                    }
                }
            }
            notification = notifications.next() => {
                let Some(notification) = notification else {
                    sink.send(TransportEvent::Disconnected {
                        reason: "notification stream ended".to_string(),
                    });
                    return Ok(());
                };
                if notification.uuid == config.notify_uuid
                    && !sink.send(TransportEvent::Notification(notification.value))
                {
                    peripheral.disconnect().await.ok();
                    return Ok(());
                }
            }
            Some(event) = central_events.next() => {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == peripheral_id {
                        sink.send(TransportEvent::Disconnected {
                            reason: "device disconnected".to_string(),
                        });
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(all(test, feature = "ble"))]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol;

    #[test]
    fn test_config_from_default_settings() {
        let config = BtleplugConfig::from_settings(&DeviceSettings::default()).unwrap();
        assert_eq!(config.device_name, protocol::DEVICE_NAME);
        assert_eq!(config.service_uuid, Uuid::parse_str(protocol::SERVICE_UUID).unwrap());
        assert_eq!(config.control_uuid, Uuid::parse_str(protocol::CONTROL_CHAR_UUID).unwrap());
        assert_eq!(config.notify_uuid, Uuid::parse_str(protocol::NOTIFY_CHAR_UUID).unwrap());
        assert_eq!(config.scan_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_rejects_invalid_uuid() {
        let device = DeviceSettings {
            notify_char_uuid: "not-a-uuid".to_string(),
            ..DeviceSettings::default()
        };
        let result = BtleplugConfig::from_settings(&device);
        assert!(matches!(result, Err(TransportError::InvalidUuid(ref s)) if s == "not-a-uuid"));
    }
}
