//! Massage device protocol
//!
//! Wire format for the single control/notify characteristic pair exposed by
//! the massage device.
//!
//! ```text
//! Outbound (control characteristic, write):
//!   [opcode] [payload...]
//!
//! Inbound, tagged revision (notify characteristic):
//!   [0xF1] [HR] [SpO2]                 health sample
//!   [0xF2] [IR_HI] [IR_MID] [IR_LO]    waveform sample, u24 big-endian
//!
//! Inbound, untagged revision:
//!   [HR] [SpO2]
//! ```
//!
//! Only one revision is active at a time; it is chosen through
//! [`ProtocolConfig`] and never auto-detected.

use crate::domain::models::{DeviceCommand, HealthSample, TelemetryEvent};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Massage device BLE service UUID
pub const SERVICE_UUID: &str = "12345678-1234-5678-1234-56789abcdef0";

/// Control characteristic UUID - where commands are written
pub const CONTROL_CHAR_UUID: &str = "abcdef01-1234-5678-1234-56789abcdef0";

/// Notify characteristic UUID - where telemetry is received
pub const NOTIFY_CHAR_UUID: &str = "abcdef02-1234-5678-1234-56789abcdef0";

/// Advertised name of the peripheral
pub const DEVICE_NAME: &str = "Massage_Pro_X1";

/// Health sample tag: `[0xF1][HR][SpO2]`
pub const TAG_HEALTH: u8 = 0xF1;
/// Waveform sample tag: `[0xF2][IR_HIGH][IR_MID][IR_LOW]`
pub const TAG_WAVEFORM: u8 = 0xF2;

const HEALTH_PACKET_LEN: usize = 3;
const WAVEFORM_PACKET_LEN: usize = 4;
const UNTAGGED_HEALTH_LEN: usize = 2;

/// Largest value a waveform packet can carry
pub const WAVEFORM_MAX: u32 = 0x00FF_FFFF;

/// Firmware protocol revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolRevision {
    /// Type-tagged notifications (health + waveform), levels 0-5
    Tagged,
    /// Bare 2-byte health notifications, levels 0-255
    Untagged,
}

/// Opcode bytes for one protocol revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeTable {
    pub rotate: u8,
    pub heat: u8,
    pub assistant: u8,
    pub level: u8,
    pub assistant_config: u8,
    pub assistant_stop: u8,
}

impl OpcodeTable {
    pub const TAGGED: Self = Self {
        rotate: 0x01,
        heat: 0x02,
        assistant: 0x03,
        level: 0x04,
        assistant_config: 0x06,
        assistant_stop: 0x07,
    };

    pub const UNTAGGED: Self = Self {
        rotate: 0x01,
        heat: 0x02,
        assistant: 0x04,
        level: 0x03,
        assistant_config: 0x06,
        assistant_stop: 0x07,
    };
}

/// Logical opcodes, mapped to bytes through an [`OpcodeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Rotate,
    Heat,
    Assistant,
    Level,
    AssistantConfig,
    AssistantStop,
}

/// Protocol profile selected at integration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub revision: ProtocolRevision,
    pub opcodes: OpcodeTable,
    pub level_min: u8,
    pub level_max: u8,
}

impl ProtocolConfig {
    pub fn tagged() -> Self {
        Self {
            revision: ProtocolRevision::Tagged,
            opcodes: OpcodeTable::TAGGED,
            level_min: 0,
            level_max: 5,
        }
    }

    pub fn untagged() -> Self {
        Self {
            revision: ProtocolRevision::Untagged,
            opcodes: OpcodeTable::UNTAGGED,
            level_min: 0,
            level_max: 255,
        }
    }

    pub fn for_revision(revision: ProtocolRevision) -> Self {
        match revision {
            ProtocolRevision::Tagged => Self::tagged(),
            ProtocolRevision::Untagged => Self::untagged(),
        }
    }

    pub fn opcode(&self, opcode: Opcode) -> u8 {
        let table = &self.opcodes;
        match opcode {
            Opcode::Rotate => table.rotate,
            Opcode::Heat => table.heat,
            Opcode::Assistant => table.assistant,
            Opcode::Level => table.level,
            Opcode::AssistantConfig => table.assistant_config,
            Opcode::AssistantStop => table.assistant_stop,
        }
    }

    /// Clamp a requested level into the valid range for this revision
    pub fn clamp_level(&self, level: i32) -> u8 {
        // A misconfigured min > max must not panic in `clamp`
        let (lo, hi) = if self.level_min <= self.level_max {
            (self.level_min, self.level_max)
        } else {
            (self.level_max, self.level_min)
        };
        level.clamp(lo as i32, hi as i32) as u8
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::tagged()
    }
}

/// Encodes commands and decodes notifications for one protocol revision.
///
/// Encoding never fails (arguments are clamped or truncated) and decoding
/// never fails loudly (malformed input yields `None`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    config: ProtocolConfig,
}

impl PacketCodec {
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }

    /// Single-byte packet with no payload
    pub fn encode_simple(&self, opcode: Opcode) -> Vec<u8> {
        vec![self.config.opcode(opcode)]
    }

    /// `[LEVEL][level]` with `level` clamped into the configured range
    pub fn encode_level(&self, level: i32) -> Vec<u8> {
        vec![
            self.config.opcode(Opcode::Level),
            self.config.clamp_level(level),
        ]
    }

    /// `[ASSISTANT_CONFIG][LEVEL][HEAT][DURATION_HIGH][DURATION_LOW]`
    ///
    /// Durations above 65535 minutes keep only their low 16 bits.
    pub fn encode_assistant_config(
        &self,
        level: i32,
        heat_on: bool,
        duration_minutes: u32,
    ) -> Vec<u8> {
        let [duration_high, duration_low] = (duration_minutes as u16).to_be_bytes();
        vec![
            self.config.opcode(Opcode::AssistantConfig),
            self.config.clamp_level(level),
            u8::from(heat_on),
            duration_high,
            duration_low,
        ]
    }

    /// Encode a logical command into the bytes written to the control characteristic
    pub fn encode(&self, command: &DeviceCommand) -> Vec<u8> {
        match *command {
            DeviceCommand::Rotate => self.encode_simple(Opcode::Rotate),
            DeviceCommand::ToggleHeat => self.encode_simple(Opcode::Heat),
            DeviceCommand::SetLevel(level) => self.encode_level(level),
            DeviceCommand::Assistant => self.encode_simple(Opcode::Assistant),
            DeviceCommand::AssistantConfig {
                level,
                heat_on,
                duration_minutes,
            } => self.encode_assistant_config(level, heat_on, duration_minutes),
            DeviceCommand::AssistantStop => self.encode_simple(Opcode::AssistantStop),
        }
    }

    /// Decode one notification payload
    pub fn decode(&self, bytes: &[u8]) -> Option<TelemetryEvent> {
        let event = match self.config.revision {
            ProtocolRevision::Tagged => decode_tagged(bytes),
            ProtocolRevision::Untagged => decode_untagged(bytes),
        };

        if event.is_none() {
            trace!("Ignoring notification: {:02X?}", bytes);
        }
        event
    }
}

fn decode_tagged(bytes: &[u8]) -> Option<TelemetryEvent> {
    match *bytes.first()? {
        TAG_HEALTH if bytes.len() >= HEALTH_PACKET_LEN => Some(TelemetryEvent::Health(
            HealthSample::new(bytes[1], bytes[2]),
        )),
        TAG_WAVEFORM if bytes.len() >= WAVEFORM_PACKET_LEN => {
            let magnitude = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
            Some(TelemetryEvent::Waveform { magnitude })
        }
        _ => None,
    }
}

fn decode_untagged(bytes: &[u8]) -> Option<TelemetryEvent> {
    if bytes.len() < UNTAGGED_HEALTH_LEN {
        return None;
    }
    Some(TelemetryEvent::Health(HealthSample::new(bytes[0], bytes[1])))
}

/// Build a tagged health notification
pub fn health_packet(sample: HealthSample) -> [u8; 3] {
    [TAG_HEALTH, sample.heart_rate, sample.spo2]
}

/// Build a tagged waveform notification; bits above 24 are dropped
pub fn waveform_packet(magnitude: u32) -> [u8; 4] {
    let [_, high, mid, low] = (magnitude & WAVEFORM_MAX).to_be_bytes();
    [TAG_WAVEFORM, high, mid, low]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged() -> PacketCodec {
        PacketCodec::new(ProtocolConfig::tagged())
    }

    fn untagged() -> PacketCodec {
        PacketCodec::new(ProtocolConfig::untagged())
    }

    #[test]
    fn test_simple_commands() {
        let codec = tagged();
        assert_eq!(codec.encode(&DeviceCommand::Rotate), vec![0x01]);
        assert_eq!(codec.encode(&DeviceCommand::ToggleHeat), vec![0x02]);
        assert_eq!(codec.encode(&DeviceCommand::Assistant), vec![0x03]);
        assert_eq!(codec.encode(&DeviceCommand::AssistantStop), vec![0x07]);
    }

    #[test]
    fn test_level_is_clamped() {
        let codec = tagged();
        for level in -10..=300 {
            let packet = codec.encode_level(level);
            assert_eq!(packet.len(), 2);
            assert_eq!(packet[0], 0x04);
            assert_eq!(packet[1] as i32, level.clamp(0, 5));
        }
    }

    #[test]
    fn test_untagged_level_range_and_opcode() {
        let codec = untagged();
        assert_eq!(codec.encode_level(200), vec![0x03, 200]);
        assert_eq!(codec.encode_level(1000), vec![0x03, 255]);
        assert_eq!(codec.encode_level(-1), vec![0x03, 0]);
    }

    #[test]
    fn test_inverted_level_bounds_do_not_panic() {
        let mut config = ProtocolConfig::tagged();
        config.level_min = 9;
        config.level_max = 2;
        assert_eq!(PacketCodec::new(config).encode_level(20), vec![0x04, 9]);
    }

    #[test]
    fn test_assistant_config_layout() {
        let packet = tagged().encode_assistant_config(3, true, 15);
        assert_eq!(packet, vec![0x06, 3, 1, 0x00, 0x0F]);

        let packet = tagged().encode_assistant_config(2, false, 0x0102);
        assert_eq!(packet, vec![0x06, 2, 0, 0x01, 0x02]);
    }

    #[test]
    fn test_assistant_duration_round_trip() {
        let codec = tagged();
        for duration in 0..=u16::MAX as u32 {
            let packet = codec.encode_assistant_config(1, false, duration);
            let decoded = u16::from_be_bytes([packet[3], packet[4]]) as u32;
            assert_eq!(decoded, duration);
        }
    }

    #[test]
    fn test_assistant_duration_truncates() {
        let packet = tagged().encode_assistant_config(1, false, 0x1_0005);
        assert_eq!(&packet[3..], &[0x00, 0x05]);
    }

    #[test]
    fn test_decode_health() {
        let codec = tagged();
        assert_eq!(codec.decode(&[0xF1, 0x50]), None);
        assert_eq!(
            codec.decode(&[0xF1, 0x50, 0x60]),
            Some(TelemetryEvent::Health(HealthSample::new(80, 96)))
        );
    }

    #[test]
    fn test_decode_waveform() {
        let codec = tagged();
        assert_eq!(
            codec.decode(&[0xF2, 0x01, 0x02, 0x03]),
            Some(TelemetryEvent::Waveform { magnitude: 66051 })
        );
        assert_eq!(codec.decode(&[0xF2, 0x01, 0x02]), None);
    }

    #[test]
    fn test_decode_high_bytes_are_unsigned() {
        let codec = tagged();
        assert_eq!(
            codec.decode(&[0xF2, 0xFF, 0x80, 0xC8]),
            Some(TelemetryEvent::Waveform {
                magnitude: 0xFF80C8
            })
        );
        assert_eq!(
            codec.decode(&[0xF1, 200, 255]),
            Some(TelemetryEvent::Health(HealthSample::new(200, 255)))
        );
    }

    #[test]
    fn test_decode_ignores_unknown_and_empty() {
        let codec = tagged();
        assert_eq!(codec.decode(&[]), None);
        assert_eq!(codec.decode(&[0x10, 0x20, 0x30, 0x40]), None);
    }

    #[test]
    fn test_decode_untagged() {
        let codec = untagged();
        assert_eq!(codec.decode(&[72]), None);
        assert_eq!(
            codec.decode(&[72, 97]),
            Some(TelemetryEvent::Health(HealthSample::new(72, 97)))
        );
        // No tag dispatch in this revision
        assert_eq!(
            codec.decode(&[0xF2, 0x01, 0x02, 0x03]),
            Some(TelemetryEvent::Health(HealthSample::new(0xF2, 0x01)))
        );
    }

    #[test]
    fn test_notification_builders_match_decoder() {
        let codec = tagged();
        assert_eq!(
            codec.decode(&waveform_packet(0x12_3456)),
            Some(TelemetryEvent::Waveform {
                magnitude: 0x12_3456
            })
        );
        assert_eq!(waveform_packet(0x0100_0001), [0xF2, 0x00, 0x00, 0x01]);
        assert_eq!(health_packet(HealthSample::new(60, 99)), [0xF1, 60, 99]);
    }
}
