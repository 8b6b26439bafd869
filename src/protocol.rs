//! Electra.One wire protocol constants and envelope helpers
//!
//! Every SysEx frame exchanged with the device has the same envelope:
//! 4-byte vendor header, command byte, sub-command byte, variable content,
//! 0xF7 terminator.

use thiserror::Error;

/// Start of a System Exclusive message
pub const SYSEX_START: u8 = 0xF0;

/// End of a System Exclusive message
pub const SYSEX_END: u8 = 0xF7;

/// Electra.One vendor header: F0 00 21 45
pub const HEADER: [u8; 4] = [0xF0, 0x00, 0x21, 0x45];

/// Offset of the command (category) byte within a frame
pub const OFFSET_COMMAND: usize = 4;

/// Offset of the sub-command byte within a frame
pub const OFFSET_SUBCOMMAND: usize = 5;

/// Offset of the first content byte within a frame
pub const OFFSET_CONTENT: usize = 6;

// Command categories
pub const CMD_INFO: u8 = 0x01;
pub const CMD_QUERY: u8 = 0x02;
pub const CMD_LUA: u8 = 0x08;
pub const CMD_MIDI_CONTROL: u8 = 0x09;
pub const CMD_CONTROL_UPDATE: u8 = 0x14;
pub const CMD_CONTROLLER_EVENT: u8 = 0x7E;
pub const CMD_SYSTEM_CALL: u8 = 0x7F;

// Info sub-commands (device -> host)
pub const INFO_PRESET_LIST: u8 = 0x04;
pub const INFO_DEVICE: u8 = 0x7F;

// Controller-event sub-commands (device -> host)
pub const EVENT_PRESET_SWITCH: u8 = 0x02;
pub const EVENT_PAGE_SWITCH: u8 = 0x06;
pub const EVENT_POT_TOUCH: u8 = 0x0A;

// System-call sub-commands
pub const SYSCALL_LOG_MESSAGE: u8 = 0x00;
pub const SYSCALL_SET_REPAINT: u8 = 0x7A;
pub const SYSCALL_ENABLE_LOGGER: u8 = 0x7D;

// Query sub-commands (host -> device)
pub const QUERY_PRESET_LIST: u8 = 0x04;
pub const QUERY_DEVICE_INFO: u8 = 0x7F;

// MIDI-control sub-commands (host -> device)
pub const MIDI_CONTROL_SWITCH_PRESET: u8 = 0x08;
pub const MIDI_CONTROL_SWITCH_PAGE: u8 = 0x0A;

// Control-update sub-commands (host -> device)
pub const CONTROL_UPDATE_PROPERTIES: u8 = 0x07;
pub const CONTROL_UPDATE_VALUE_LABEL: u8 = 0x0E;
pub const CONTROL_UPDATE_SUBSCRIBE: u8 = 0x79;

// LUA sub-commands (host -> device)
pub const LUA_EXECUTE: u8 = 0x0D;

/// Event-subscription bitmask: page switches | pot touches | button presses
pub const SUBSCRIBE_EVENTS_MASK: u8 = 0x29;

/// Number of physical knobs on the device
pub const KNOB_COUNT: usize = 12;

/// Name of the on-device preset this integration drives
pub const HOME_PRESET_NAME: &str = "DrivenByMoss";

/// Oldest firmware `versionSeq` known to implement this protocol (3.0)
pub const MIN_FIRMWARE_SEQ: u64 = 0x0003_0000;

/// Protocol-level errors, see the error taxonomy in DESIGN.md
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("knob id {0} out of range (device has {KNOB_COUNT} knobs)")]
    KnobOutOfRange(i32),

    #[error("malformed info payload ({context}): {source}")]
    JsonPayload {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("preset '{0}' not found on device; the surface cannot operate without it")]
    HomePresetMissing(String),

    #[error("fragment is not valid hex: {0}")]
    BadHexFragment(#[from] hex::FromHexError),
}

/// Check whether a complete message carries our vendor header.
///
/// A mismatch means the frame belongs to some other device on the same
/// port and must be ignored without comment.
pub fn has_header(message: &[u8]) -> bool {
    message.len() > OFFSET_SUBCOMMAND && message[..HEADER.len()] == HEADER
}

/// Build an outbound frame: header + command pair + content + terminator.
pub fn frame(command: u8, subcommand: u8, content: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER.len() + 3 + content.len());
    data.extend_from_slice(&HEADER);
    data.push(command);
    data.push(subcommand);
    data.extend_from_slice(content);
    data.push(SYSEX_END);
    data
}

/// Encode a control id as two 7-bit bytes, low byte first.
pub fn encode_control_id(id: u16) -> [u8; 2] {
    [(id & 0x7F) as u8, ((id >> 7) & 0x7F) as u8]
}

/// Decode a control id from two 7-bit bytes, low byte first.
pub fn decode_control_id(lo: u8, hi: u8) -> u16 {
    ((hi as u16 & 0x7F) << 7) | (lo as u16 & 0x7F)
}

/// Replace characters outside 7-bit ASCII; SysEx content bytes are 0-127.
pub fn sanitize_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && c != '\u{7F}' { c } else { '?' })
        .collect()
}

/// Human-readable name for a command/sub-command pair (sniffer output).
pub fn describe_command(command: u8, subcommand: u8) -> &'static str {
    match (command, subcommand) {
        (CMD_INFO, INFO_DEVICE) => "device info",
        (CMD_INFO, INFO_PRESET_LIST) => "preset list",
        (CMD_CONTROLLER_EVENT, EVENT_PRESET_SWITCH) => "preset switch",
        (CMD_CONTROLLER_EVENT, EVENT_PAGE_SWITCH) => "page switch",
        (CMD_CONTROLLER_EVENT, EVENT_POT_TOUCH) => "pot touch",
        (CMD_SYSTEM_CALL, SYSCALL_LOG_MESSAGE) => "log message",
        (CMD_QUERY, QUERY_DEVICE_INFO) => "query device info",
        (CMD_QUERY, QUERY_PRESET_LIST) => "query preset list",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_match() {
        assert!(has_header(&[0xF0, 0x00, 0x21, 0x45, 0x01, 0x7F, 0xF7]));
        // Some other manufacturer
        assert!(!has_header(&[0xF0, 0x00, 0x00, 0x66, 0x14, 0x00, 0xF7]));
        // Too short to carry a command pair
        assert!(!has_header(&[0xF0, 0x00, 0x21, 0x45]));
    }

    #[test]
    fn test_frame_envelope() {
        let f = frame(CMD_MIDI_CONTROL, MIDI_CONTROL_SWITCH_PAGE, &[3]);
        assert_eq!(f, vec![0xF0, 0x00, 0x21, 0x45, 0x09, 0x0A, 3, 0xF7]);
    }

    #[test]
    fn test_control_id_roundtrip() {
        let [lo, hi] = encode_control_id(1000);
        assert_eq!(lo, (1000 & 0x7F) as u8);
        assert_eq!(decode_control_id(lo, hi), 1000);
        // Low byte comes first on the wire
        assert_eq!(encode_control_id(0x85), [0x05, 0x01]);
    }

    #[test]
    fn test_sanitize_ascii() {
        assert_eq!(sanitize_ascii("Volume"), "Volume");
        assert_eq!(sanitize_ascii("Pist\u{00E9}"), "Pist?");
    }
}
