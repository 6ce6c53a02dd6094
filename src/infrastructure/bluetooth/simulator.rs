//! Simulated massage device
//!
//! Stands in for the real peripheral when no radio is available. It goes
//! through the same connect / services / notify sequence as the hardware,
//! streams a synthetic PPG waveform and pulse-oximetry readings, and applies
//! the commands it receives to an emulated motor/heater state.

use crate::domain::models::HealthSample;
use crate::infrastructure::bluetooth::protocol::{
    self, ProtocolConfig, ProtocolRevision, WAVEFORM_MAX,
};
use crate::infrastructure::bluetooth::transport::{
    EventSink, Transport, TransportError, TransportEvent,
};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const ASSISTANT_MIN_LEVEL: u8 = 1;
const ASSISTANT_MAX_LEVEL: u8 = 5;
const ASSISTANT_MAX_MINUTES: u16 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectedCommand {
    #[error("empty command")]
    Empty,
    #[error("unknown command 0x{0:02X}")]
    Unknown(u8),
    #[error("command 0x{opcode:02X} needs {expected} bytes, got {actual}")]
    Truncated {
        opcode: u8,
        expected: usize,
        actual: usize,
    },
    #[error("invalid assistant session: level {level}, {duration_minutes} min")]
    InvalidAssistant { level: u8, duration_minutes: u16 },
    #[error("no assistant session is running")]
    NoActiveSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssistantSession {
    pub level: u8,
    pub heat: bool,
    pub duration_minutes: u16,
    pub started_at: Instant,
}

/// Motor, heater and assistant state as the firmware keeps it
#[derive(Debug, Clone)]
pub struct EmulatedDevice {
    config: ProtocolConfig,
    pub level: u8,
    pub reverse: bool,
    pub heat_on: bool,
    pub assistant: Option<AssistantSession>,
}

impl EmulatedDevice {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            level: 0,
            reverse: false,
            heat_on: false,
            assistant: None,
        }
    }

    /// Apply one packet written to the control characteristic
    pub fn process(&mut self, packet: &[u8], now: Instant) -> Result<(), RejectedCommand> {
        let opcode = *packet.first().ok_or(RejectedCommand::Empty)?;
        let ops = self.config.opcodes;
        let need = |expected: usize| {
            if packet.len() >= expected {
                Ok(())
            } else {
                Err(RejectedCommand::Truncated {
                    opcode,
                    expected,
                    actual: packet.len(),
                })
            }
        };

        if opcode == ops.rotate {
            self.reverse = !self.reverse;
            info!(reverse = self.reverse, "Device: rotation toggled");
        } else if opcode == ops.heat {
            self.heat_on = !self.heat_on;
            info!(heat = self.heat_on, "Device: heat toggled");
        } else if opcode == ops.level {
            need(2)?;
            self.level = packet[1].min(self.config.level_max);
            info!(level = self.level, "Device: level set");
        } else if opcode == ops.assistant_config {
            need(5)?;
            let level = packet[1];
            let heat = packet[2] != 0;
            let duration_minutes = u16::from_be_bytes([packet[3], packet[4]]);
            self.start_assistant(level, heat, duration_minutes, now)?;
        } else if opcode == ops.assistant_stop {
            self.stop_assistant()?;
        } else if opcode == ops.assistant {
            debug!("Device: legacy assistant command ignored");
        } else {
            return Err(RejectedCommand::Unknown(opcode));
        }
        Ok(())
    }

    fn start_assistant(
        &mut self,
        level: u8,
        heat: bool,
        duration_minutes: u16,
        now: Instant,
    ) -> Result<(), RejectedCommand> {
        if !(ASSISTANT_MIN_LEVEL..=ASSISTANT_MAX_LEVEL).contains(&level)
            || !(1..=ASSISTANT_MAX_MINUTES).contains(&duration_minutes)
        {
            return Err(RejectedCommand::InvalidAssistant {
                level,
                duration_minutes,
            });
        }

        self.assistant = Some(AssistantSession {
            level,
            heat,
            duration_minutes,
            started_at: now,
        });
        self.level = level;
        self.heat_on = heat;
        info!(level, heat, duration_minutes, "Device: assistant session started");
        Ok(())
    }

    fn stop_assistant(&mut self) -> Result<(), RejectedCommand> {
        if self.assistant.take().is_none() {
            return Err(RejectedCommand::NoActiveSession);
        }
        self.level = 0;
        self.heat_on = false;
        info!("Device: assistant session stopped");
        Ok(())
    }

    /// End the assistant session once its time is up
    pub fn tick(&mut self, now: Instant) {
        let expired = self.assistant.is_some_and(|session| {
            now.saturating_duration_since(session.started_at)
                >= Duration::from_secs(session.duration_minutes as u64 * 60)
        });
        if expired {
            info!("Device: assistant session finished");
            let _ = self.stop_assistant();
        }
    }

    /// Heart rate the emulated user shows at the current intensity
    pub fn heart_rate(&self) -> u8 {
        68 + self.level.min(ASSISTANT_MAX_LEVEL) * 2
    }
}

/// Synthetic fingertip PPG: a systolic peak, a dicrotic bump, and slow
/// respiratory baseline wander.
#[derive(Debug, Clone)]
pub struct PpgSynth {
    phase: f64,
    elapsed: f64,
    baseline: f64,
    pulse_amplitude: f64,
    respiration_amplitude: f64,
}

impl PpgSynth {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            elapsed: 0.0,
            baseline: 115_000.0,
            pulse_amplitude: 6_000.0,
            respiration_amplitude: 1_500.0,
        }
    }

    /// Advance by `dt` at `heart_rate` BPM and return the next IR magnitude
    pub fn next_sample(&mut self, dt: Duration, heart_rate: u8) -> u32 {
        let dt = dt.as_secs_f64();
        self.elapsed += dt;
        self.phase = (self.phase + dt * heart_rate as f64 / 60.0).fract();

        let bump = |center: f64, width: f64| (-((self.phase - center) / width).powi(2)).exp();
        let pulse = bump(0.15, 0.06) + 0.35 * bump(0.45, 0.08);
        let respiration = (TAU * self.elapsed / 4.0).sin();

        let value = self.baseline
            + self.pulse_amplitude * pulse
            + self.respiration_amplitude * respiration;
        (value.max(0.0) as u32).min(WAVEFORM_MAX)
    }
}

impl Default for PpgSynth {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub protocol: ProtocolConfig,
    pub device_name: String,
    pub connect_delay: Duration,
    pub sample_interval: Duration,
    pub health_interval: Duration,
    pub spo2: u8,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            device_name: protocol::DEVICE_NAME.to_string(),
            connect_delay: Duration::from_millis(300),
            // 100 Hz, matching the sensor task
            sample_interval: Duration::from_millis(10),
            health_interval: Duration::from_secs(1),
            spo2: 97,
        }
    }
}

struct Worker {
    commands: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

/// [`Transport`] backed by an in-process device emulator
pub struct SimulatedPeripheral {
    config: SimulatorConfig,
    worker: Option<Worker>,
}

impl SimulatedPeripheral {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }
}

impl Transport for SimulatedPeripheral {
    fn open(&mut self, sink: EventSink) -> Result<(), TransportError> {
        self.close();

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_device(self.config.clone(), sink, command_rx));

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
        if let Some(worker) = self.worker.take() {
            worker.task.abort();
            debug!("Simulated device closed");
        }
    }
}

impl Drop for SimulatedPeripheral {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_device(
    config: SimulatorConfig,
    sink: EventSink,
    mut commands: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    tokio::time::sleep(config.connect_delay).await;
    if !sink.send(TransportEvent::Connected {
        device_name: config.device_name.clone(),
    }) {
        return;
    }

    tokio::time::sleep(config.connect_delay).await;
    if !sink.send(TransportEvent::ServicesReady) {
        return;
    }
    info!(session = sink.session_id(), "Simulated device streaming");

    let mut device = EmulatedDevice::new(config.protocol);
    let mut synth = PpgSynth::new();
    let mut ticker = tokio::time::interval(config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_health = Instant::now();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(packet) = command else { break };
                if let Err(e) = device.process(&packet, Instant::now()) {
                    warn!("Simulated device rejected {:02X?}: {}", packet, e);
                }
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                device.tick(now);

                let packet = match config.protocol.revision {
                    ProtocolRevision::Tagged => {
                        let magnitude = synth.next_sample(config.sample_interval, device.heart_rate());
                        Some(protocol::waveform_packet(magnitude).to_vec())
                    }
                    ProtocolRevision::Untagged => None,
                };
                if let Some(packet) = packet {
                    if !sink.send(TransportEvent::Notification(packet)) {
                        break;
                    }
                }

                if now.duration_since(last_health) >= config.health_interval {
                    last_health = now;
                    let sample = HealthSample::new(device.heart_rate(), config.spo2);
                    let packet = match config.protocol.revision {
                        ProtocolRevision::Tagged => protocol::health_packet(sample).to_vec(),
                        ProtocolRevision::Untagged => vec![sample.heart_rate, sample.spo2],
                    };
                    if !sink.send(TransportEvent::Notification(packet)) {
                        break;
                    }
                }
            }
        }
    }
    debug!(session = sink.session_id(), "Simulated device task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::PacketCodec;
    use crate::domain::models::DeviceCommand;

    fn device() -> EmulatedDevice {
        EmulatedDevice::new(ProtocolConfig::tagged())
    }

    #[test]
    fn test_device_applies_encoded_commands() {
        let codec = PacketCodec::new(ProtocolConfig::tagged());
        let mut device = device();
        let now = Instant::now();

        device.process(&codec.encode(&DeviceCommand::SetLevel(3)), now).unwrap();
        device.process(&codec.encode(&DeviceCommand::ToggleHeat), now).unwrap();
        device.process(&codec.encode(&DeviceCommand::Rotate), now).unwrap();
        assert_eq!(device.level, 3);
        assert!(device.heat_on);
        assert!(device.reverse);

        device.process(&codec.encode(&DeviceCommand::Assistant), now).unwrap();
        assert_eq!(device.level, 3);
    }

    #[test]
    fn test_device_rejects_malformed_commands() {
        let mut device = device();
        let now = Instant::now();
        assert_eq!(device.process(&[], now), Err(RejectedCommand::Empty));
        assert_eq!(
            device.process(&[0x04], now),
            Err(RejectedCommand::Truncated {
                opcode: 0x04,
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(device.process(&[0x55], now), Err(RejectedCommand::Unknown(0x55)));
        assert_eq!(
            device.process(&[0x07], now),
            Err(RejectedCommand::NoActiveSession)
        );
    }

    #[test]
    fn test_assistant_session_lifecycle() {
        let mut device = device();
        let start = Instant::now();

        device.process(&[0x06, 2, 1, 0x00, 0x0A], start).unwrap();
        assert_eq!(device.level, 2);
        assert!(device.heat_on);
        assert_eq!(device.assistant.map(|s| s.duration_minutes), Some(10));

        device.tick(start + Duration::from_secs(599));
        assert!(device.assistant.is_some());
        device.tick(start + Duration::from_secs(600));
        assert!(device.assistant.is_none());
        assert_eq!(device.level, 0);
        assert!(!device.heat_on);
    }

    #[test]
    fn test_assistant_rejects_out_of_range() {
        let mut device = device();
        let now = Instant::now();
        assert_eq!(
            device.process(&[0x06, 0, 0, 0x00, 0x0A], now),
            Err(RejectedCommand::InvalidAssistant {
                level: 0,
                duration_minutes: 10
            })
        );
        assert!(device.process(&[0x06, 3, 0, 0x00, 61], now).is_err());
        assert!(device.assistant.is_none());
    }

    #[test]
    fn test_ppg_synth_stays_in_range() {
        let mut synth = PpgSynth::new();
        let samples: Vec<u32> = (0..500)
            .map(|_| synth.next_sample(Duration::from_millis(10), 72))
            .collect();
        let min = *samples.iter().min().unwrap();
        let max = *samples.iter().max().unwrap();
        assert!(max <= WAVEFORM_MAX);
        // Pulsatile component is large enough to clear the flatness threshold
        assert!(max - min > 1000);
    }

    #[tokio::test]
    async fn test_simulated_peripheral_streams_after_ready() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = SimulatedPeripheral::new(SimulatorConfig {
            connect_delay: Duration::from_millis(1),
            sample_interval: Duration::from_millis(1),
            health_interval: Duration::from_millis(2),
            ..SimulatorConfig::default()
        });
        transport.open(EventSink::new(9, tx)).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.session_id, 9);
        assert!(matches!(first.event, TransportEvent::Connected { .. }));
        assert_eq!(rx.recv().await.unwrap().event, TransportEvent::ServicesReady);

        let codec = PacketCodec::new(ProtocolConfig::tagged());
        let mut saw_waveform = false;
        let mut saw_health = false;
        while !(saw_waveform && saw_health) {
            let TransportEvent::Notification(bytes) = rx.recv().await.unwrap().event else {
                panic!("expected notification");
            };
            match codec.decode(&bytes) {
                Some(crate::domain::models::TelemetryEvent::Waveform { .. }) => saw_waveform = true,
                Some(crate::domain::models::TelemetryEvent::Health(sample)) => {
                    assert_eq!(sample.spo2, 97);
                    saw_health = true;
                }
                None => panic!("undecodable packet {:02X?}", bytes),
            }
        }

        transport.write(&[0x01]).unwrap();
        transport.close();
        assert!(matches!(
            transport.write(&[0x01]),
            Err(TransportError::NotOpen)
        ));
    }
}
