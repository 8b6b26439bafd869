//! Outbound SysEx frame construction
//!
//! Pure builders, no protocol state: every function returns the exact bytes
//! to put on the wire. Suppression while the device is offline is handled
//! by the surface, not here.

use anyhow::Result;
use serde::Serialize;

use crate::midi::MidiMessage;
use crate::protocol::{self, encode_control_id, frame, sanitize_ascii};

/// Optional properties of an on-screen control. Absent fields are omitted
/// from the JSON entirely; the firmware treats an explicit `null` as a
/// value, so none are ever emitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Six-digit hex color, e.g. "F45C51"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl ControlProperties {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(sanitize_ascii(name)),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }
}

/// Update name/color/visibility of one control (0x14 0x07).
pub fn control_update(control_id: u16, properties: &ControlProperties) -> Result<Vec<u8>> {
    let json = serde_json::to_string(properties)?;
    let mut content = encode_control_id(control_id).to_vec();
    content.extend_from_slice(sanitize_ascii(&json).as_bytes());
    Ok(frame(
        protocol::CMD_CONTROL_UPDATE,
        protocol::CONTROL_UPDATE_PROPERTIES,
        &content,
    ))
}

/// Update the value label of one control (0x14 0x0E).
///
/// The firmware wants a NUL byte between the control address and the text;
/// without it the first character is swallowed.
pub fn value_label_update(control_id: u16, text: &str) -> Vec<u8> {
    let mut content = encode_control_id(control_id).to_vec();
    content.push(0x00);
    content.extend_from_slice(sanitize_ascii(text).as_bytes());
    frame(
        protocol::CMD_CONTROL_UPDATE,
        protocol::CONTROL_UPDATE_VALUE_LABEL,
        &content,
    )
}

/// Raw value update: not a SysEx frame but one extended-range CC
/// transmission on the control's channel.
pub fn raw_value_update(channel: u8, cc: u8, value: u16) -> MidiMessage {
    MidiMessage::ControlChange14 { channel, cc, value }
}

/// Make the device switch to a preset slot (0x09 0x08).
pub fn switch_preset(bank: u8, slot: u8) -> Vec<u8> {
    frame(
        protocol::CMD_MIDI_CONTROL,
        protocol::MIDI_CONTROL_SWITCH_PRESET,
        &[bank & 0x7F, slot & 0x7F],
    )
}

/// Make the device switch to a page of the active preset (0x09 0x0A).
pub fn switch_page(page: u8) -> Vec<u8> {
    frame(
        protocol::CMD_MIDI_CONTROL,
        protocol::MIDI_CONTROL_SWITCH_PAGE,
        &[page & 0x7F],
    )
}

/// Subscribe to page-switch, pot-touch and button runtime events
/// (0x14 0x79).
pub fn subscribe_events() -> Vec<u8> {
    frame(
        protocol::CMD_CONTROL_UPDATE,
        protocol::CONTROL_UPDATE_SUBSCRIBE,
        &[protocol::SUBSCRIBE_EVENTS_MASK],
    )
}

/// Enable or disable the device-side logger (0x7F 0x7D).
pub fn enable_logger(enabled: bool) -> Vec<u8> {
    frame(
        protocol::CMD_SYSTEM_CALL,
        protocol::SYSCALL_ENABLE_LOGGER,
        &[enabled as u8, 0x00],
    )
}

/// Enable or disable display repaints (0x7F 0x7A).
pub fn set_repaint_enabled(enabled: bool) -> Vec<u8> {
    frame(
        protocol::CMD_SYSTEM_CALL,
        protocol::SYSCALL_SET_REPAINT,
        &[enabled as u8, 0x00],
    )
}

/// Run a LUA snippet on the device (0x08 0x0D).
pub fn execute_lua(code: &str) -> Vec<u8> {
    frame(
        protocol::CMD_LUA,
        protocol::LUA_EXECUTE,
        sanitize_ascii(code).as_bytes(),
    )
}

/// Ask for the device-info JSON (0x02 0x7F).
pub fn request_device_info() -> Vec<u8> {
    frame(protocol::CMD_QUERY, protocol::QUERY_DEVICE_INFO, &[])
}

/// Ask for the preset-list JSON (0x02 0x04).
pub fn request_preset_list() -> Vec<u8> {
    frame(protocol::CMD_QUERY, protocol::QUERY_PRESET_LIST, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_update_omits_absent_keys() {
        let props = ControlProperties::named("Volume");
        let data = control_update(200, &props).unwrap();

        assert_eq!(&data[..4], &[0xF0, 0x00, 0x21, 0x45]);
        assert_eq!(&data[4..6], &[0x14, 0x07]);
        // Control id 200 as two 7-bit bytes, low first
        assert_eq!(&data[6..8], &[200 & 0x7F, 200 >> 7]);
        assert_eq!(*data.last().unwrap(), 0xF7);

        let json = std::str::from_utf8(&data[8..data.len() - 1]).unwrap();
        assert_eq!(json, r#"{"name":"Volume"}"#);
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_control_update_full_properties() {
        let props = ControlProperties::named("Mute")
            .with_color("F45C51")
            .with_visible(false);
        let data = control_update(1, &props).unwrap();
        let json = std::str::from_utf8(&data[8..data.len() - 1]).unwrap();
        assert_eq!(json, r#"{"name":"Mute","color":"F45C51","visible":false}"#);
    }

    #[test]
    fn test_value_label_has_nul_separator() {
        let data = value_label_update(0x85, "-6.0 dB");
        assert_eq!(&data[4..6], &[0x14, 0x0E]);
        assert_eq!(&data[6..8], &[0x05, 0x01]);
        assert_eq!(data[8], 0x00);
        assert_eq!(&data[9..data.len() - 1], b"-6.0 dB");
    }

    #[test]
    fn test_two_byte_payload_commands() {
        assert_eq!(
            enable_logger(true),
            vec![0xF0, 0x00, 0x21, 0x45, 0x7F, 0x7D, 1, 0, 0xF7]
        );
        assert_eq!(
            set_repaint_enabled(false),
            vec![0xF0, 0x00, 0x21, 0x45, 0x7F, 0x7A, 0, 0, 0xF7]
        );
        assert_eq!(
            switch_preset(1, 5),
            vec![0xF0, 0x00, 0x21, 0x45, 0x09, 0x08, 1, 5, 0xF7]
        );
        assert_eq!(
            switch_page(3),
            vec![0xF0, 0x00, 0x21, 0x45, 0x09, 0x0A, 3, 0xF7]
        );
    }

    #[test]
    fn test_raw_value_is_not_sysex() {
        let msg = raw_value_update(0, 10, 8000);
        assert!(matches!(msg, MidiMessage::ControlChange14 { .. }));
    }

    #[test]
    fn test_text_payloads_are_7bit_safe() {
        let data = value_label_update(1, "Pist\u{00E9}");
        assert!(data.iter().take(data.len() - 1).all(|&b| b < 0x80));
        let lua = execute_lua("print(\"\u{00FC}\")");
        assert!(lua.iter().take(lua.len() - 1).all(|&b| b < 0x80));
    }
}
