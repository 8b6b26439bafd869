//! MIDI message types and value conversions
//!
//! Only the message kinds this surface actually exchanges: Control Change
//! (plain and extended 14-bit range) and System Exclusive.

use std::fmt;

use anyhow::Result;

/// MIDI messages used by the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Extended-range Control Change: 14-bit value split over cc (MSB) and
    /// cc+32 (LSB), delivered as one transmission. MSB/LSB pairing only
    /// exists for controllers 0-31.
    ControlChange14 { channel: u8, cc: u8, value: u16 },

    /// System Exclusive: data bytes between the F0/F7 markers
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse a message from raw bytes; anything else returns None.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match *data.first()? {
            0xF0 => {
                let end = data.iter().position(|&b| b == 0xF7)?;
                Some(MidiMessage::SysEx {
                    data: data[1..end].to_vec(),
                })
            }
            status if status & 0xF0 == 0xB0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::ControlChange {
                    channel: status & 0x0F,
                    cc: data[1] & 0x7F,
                    value: data[2] & 0x7F,
                })
            }
            _ => None,
        }
    }

    /// Encode the message to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ControlChange14 { channel, cc, value } => {
                debug_assert!(cc < 32, "14-bit CC pairs only exist for controllers 0-31");
                let status = 0xB0 | (channel & 0x0F);
                let msb = ((value >> 7) & 0x7F) as u8;
                let lsb = (value & 0x7F) as u8;
                vec![status, cc & 0x7F, msb, status, (cc & 0x1F) + 32, lsb]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend_from_slice(data);
                result.push(0xF7);
                result
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ControlChange14 { channel, cc, value } => {
                write!(f, "CC14 ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx {} bytes", data.len() + 2)
            }
        }
    }
}

/// Outbound transmission capability. Implemented by the hardware driver and
/// by recording stubs in tests.
pub trait MidiSink: Send + Sync {
    fn send(&self, data: &[u8]) -> Result<()>;
}

/// Format MIDI bytes as a hex string for diagnostics
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        let msg = MidiMessage::parse(&[0xB2, 7, 100]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 2,
                cc: 7,
                value: 100
            }
        );
    }

    #[test]
    fn test_parse_sysex() {
        let msg = MidiMessage::parse(&[0xF0, 0x00, 0x21, 0x45, 0x01, 0x7F, 0xF7]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::SysEx {
                data: vec![0x00, 0x21, 0x45, 0x01, 0x7F]
            }
        );
    }

    #[test]
    fn test_encode_cc14_pair() {
        let msg = MidiMessage::ControlChange14 {
            channel: 0,
            cc: 10,
            value: 0x1234,
        };
        // MSB on cc, LSB on cc+32
        assert_eq!(msg.encode(), vec![0xB0, 10, 0x24, 0xB0, 42, 0x34]);
    }

    #[test]
    #[should_panic(expected = "controllers 0-31")]
    fn test_encode_cc14_rejects_high_controller() {
        // cc 96 has no LSB companion; the wrap to cc 0 must not be silent
        let _ = MidiMessage::ControlChange14 {
            channel: 0,
            cc: 96,
            value: 0,
        }
        .encode();
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xF0, 0x00, 0xF7]), "F0 00 F7");
    }
}
