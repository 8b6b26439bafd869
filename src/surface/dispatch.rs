//! Inbound command dispatch
//!
//! Classifies a complete SysEx message by its command/sub-command pair and
//! routes to the info, controller-event, or system-call handlers. Frames
//! without our vendor header, and unknown commands, are dropped without
//! comment; they are simply not ours.

use tracing::{debug, info, warn};

use super::{outbound, ElectraSurface};
use crate::modes::PAGE_MODES;
use crate::presets::{
    decode_payload, DeviceInfo, PresetInventory, PresetList, PresetLocation,
};
use crate::protocol::{self, ProtocolError};
use crate::touch::MatchOutcome;

impl ElectraSurface {
    /// Process one complete, reassembled SysEx message.
    ///
    /// Recoverable protocol errors (malformed JSON, out-of-range knob id)
    /// are returned so the caller can report them; only
    /// [`ProtocolError::HomePresetMissing`] is fatal to setup.
    pub fn process_message(&self, message: &[u8]) -> Result<(), ProtocolError> {
        if !protocol::has_header(message) {
            return Ok(());
        }

        let command = message[protocol::OFFSET_COMMAND];
        let subcommand = message[protocol::OFFSET_SUBCOMMAND];
        // Content sits between the command pair and the F7 terminator
        let content = message
            .get(protocol::OFFSET_CONTENT..message.len() - 1)
            .unwrap_or(&[]);

        match (command, subcommand) {
            (protocol::CMD_INFO, protocol::INFO_DEVICE) => self.on_device_info(content),
            (protocol::CMD_INFO, protocol::INFO_PRESET_LIST) => self.on_preset_list(content),
            (protocol::CMD_CONTROLLER_EVENT, protocol::EVENT_PRESET_SWITCH) => {
                self.on_preset_switch(content);
                Ok(())
            }
            (protocol::CMD_CONTROLLER_EVENT, protocol::EVENT_PAGE_SWITCH) => {
                self.on_page_switch(content);
                Ok(())
            }
            (protocol::CMD_CONTROLLER_EVENT, protocol::EVENT_POT_TOUCH) => {
                self.on_pot_touch(content)
            }
            (protocol::CMD_SYSTEM_CALL, protocol::SYSCALL_LOG_MESSAGE) => {
                self.on_log_message(content);
                Ok(())
            }
            _ => {
                debug!(
                    "Ignoring unhandled command {:02X} {:02X}",
                    command, subcommand
                );
                Ok(())
            }
        }
    }

    /// Device info: check firmware, then continue the handshake with the
    /// preset-list query and the event subscription.
    fn on_device_info(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        let device: DeviceInfo = decode_payload(payload, "device info")?;
        info!(
            "Electra.One firmware {} (seq {:#x})",
            device.version_text, device.version_seq
        );

        if device.version_seq < protocol::MIN_FIRMWARE_SEQ {
            // Old firmware may misbehave, but blocking here would brick the
            // handshake for no proven reason
            warn!(
                "Electra.One firmware {} is older than the supported minimum; \
                 expect degraded behavior",
                device.version_text
            );
        }

        self.state.lock().firmware = Some(device);

        let _ = self
            .sink
            .send(&outbound::request_preset_list())
            .map_err(|e| warn!("Failed to request preset list: {e:#}"));
        let _ = self
            .sink
            .send(&outbound::subscribe_events())
            .map_err(|e| warn!("Failed to subscribe to events: {e:#}"));
        Ok(())
    }

    /// Preset list: build the lookup tables and resolve the home preset.
    /// A list without the home preset is fatal; nothing on the device would
    /// be addressable.
    fn on_preset_list(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        let list: PresetList = decode_payload(payload, "preset list")?;
        let inventory = PresetInventory::from_list(&list, protocol::HOME_PRESET_NAME)?;
        let home = inventory.home();
        info!(
            "Device reports {} preset(s); '{}' at bank {} slot {}",
            inventory.len(),
            protocol::HOME_PRESET_NAME,
            home.bank,
            home.slot
        );
        self.state.lock().inventory = Some(inventory);

        // Bring our preset up; the resulting preset-switch event flips us
        // online
        let _ = self
            .sink
            .send(&outbound::switch_preset(home.bank as u8, home.slot as u8))
            .map_err(|e| warn!("Failed to select home preset: {e:#}"));
        Ok(())
    }

    /// Preset switch event: online iff the reported location is home.
    fn on_preset_switch(&self, payload: &[u8]) {
        let [bank, slot, ..] = *payload else {
            debug!("Short preset-switch payload, ignoring");
            return;
        };
        let reported = PresetLocation::new(bank as i32, slot as i32);

        // Whatever was mid-gesture is gone after a preset change; release
        // events will never arrive
        self.touch.reset();

        if reported == self.home_location() {
            if let Err(e) = self.go_online() {
                warn!("Failed to complete online transition: {e:#}");
            }
        } else {
            debug!(
                "Foreign preset active (bank {} slot {})",
                reported.bank, reported.slot
            );
            self.go_offline();
        }
    }

    /// Page switch event: map the page index onto the fixed mode order.
    fn on_page_switch(&self, payload: &[u8]) {
        if !self.is_online() {
            return;
        }
        let Some(&page) = payload.first() else {
            return;
        };
        match PAGE_MODES.get(page as usize) {
            Some(&mode) => {
                debug!("Page {} -> mode {:?}", page, mode);
                self.modes.activate(mode);
            }
            // The preset may carry extra pages we do not manage
            None => debug!("Ignoring out-of-range page index {}", page),
        }
    }

    /// Pot touch event: update touch state, tell the active mode, run the
    /// combination matcher.
    fn on_pot_touch(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        let [knob, id_lo, id_hi, value, ..] = *payload else {
            debug!("Short pot-touch payload, ignoring");
            return Ok(());
        };
        let control_id = protocol::decode_control_id(id_lo, id_hi);

        if knob as usize >= protocol::KNOB_COUNT {
            // Reported and dropped; the state array is never touched
            return Err(ProtocolError::KnobOutOfRange(knob as i32));
        }

        if let Some(mode) = self.modes.active_mode() {
            if let Some(editing) = mode.as_touch_editing() {
                editing.on_parameter_touch(control_id, value != 0);
            }
        }

        match self.touch.update_and_match(knob as usize, value)? {
            MatchOutcome::ShiftEngaged => debug!("Shift chord engaged"),
            MatchOutcome::CommandFired => debug!("Touch combination command fired"),
            MatchOutcome::NoMatch => {}
        }
        Ok(())
    }

    /// Device-side log line, forwarded when enabled by configuration.
    fn on_log_message(&self, payload: &[u8]) {
        if !self.device_logging {
            return;
        }
        let text = String::from_utf8_lossy(payload);
        info!("Electra.One: {}", text.trim_end());
    }
}
