use serde::{Deserialize, Serialize};

/// One pulse-oximetry reading reported by the device.
///
/// A value of `0` means the sensor has no valid reading (finger not placed,
/// algorithm still settling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthSample {
    pub heart_rate: u8,
    pub spo2: u8,
}

impl HealthSample {
    pub fn new(heart_rate: u8, spo2: u8) -> Self {
        Self { heart_rate, spo2 }
    }

    /// Heart rate in BPM, or `None` when the sensor has no reading
    pub fn heart_rate(&self) -> Option<u8> {
        (self.heart_rate > 0).then_some(self.heart_rate)
    }

    /// SpO2 percentage, or `None` when the sensor has no reading
    pub fn spo2(&self) -> Option<u8> {
        (self.spo2 > 0).then_some(self.spo2)
    }

    pub fn heart_rate_label(&self) -> String {
        match self.heart_rate() {
            Some(bpm) => format!("{} BPM", bpm),
            None => "-- BPM".to_string(),
        }
    }

    pub fn spo2_label(&self) -> String {
        match self.spo2() {
            Some(pct) => format!("{} %", pct),
            None => "-- %".to_string(),
        }
    }
}

/// Decoded inbound notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    Health(HealthSample),
    /// Raw IR photoplethysmogram magnitude (24-bit unsigned)
    Waveform { magnitude: u32 },
}

/// Logical commands the shell can send to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Toggle rotation direction
    Rotate,
    /// Toggle heat on/off
    ToggleHeat,
    /// Set intensity level; clamped into the configured range when encoded
    SetLevel(i32),
    /// Legacy assistant toggle (ignored by current firmware)
    Assistant,
    /// Start an assistant session
    AssistantConfig {
        level: i32,
        heat_on: bool,
        duration_minutes: u32,
    },
    /// Stop the running assistant session
    AssistantStop,
}

/// Requests from the UI to the Bluetooth worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BluetoothCommand {
    Connect,
    Disconnect,
    Send(DeviceCommand),
    ClearWaveform,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionStatus(ConnectionStatus),
    Health(HealthSample),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Link is up, GATT services not resolved yet
    Connected,
    /// Control and notify characteristics found, commands can be sent
    Ready,
    Error,
}

impl ConnectionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Control,
    Health,
    Assistant,
    Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_readings_display_as_placeholder() {
        let sample = HealthSample::new(0, 0);
        assert_eq!(sample.heart_rate(), None);
        assert_eq!(sample.heart_rate_label(), "-- BPM");
        assert_eq!(sample.spo2_label(), "-- %");
    }

    #[test]
    fn test_valid_readings_display_values() {
        let sample = HealthSample::new(72, 98);
        assert_eq!(sample.heart_rate_label(), "72 BPM");
        assert_eq!(sample.spo2_label(), "98 %");
    }
}
