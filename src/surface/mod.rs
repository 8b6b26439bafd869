//! Electra.One control surface engine
//!
//! Owns the protocol state machine: message reassembly, command dispatch,
//! the online/offline handshake, and the coupling between device pages and
//! editing modes. Outbound hardware writes are suppressed whenever the
//! device is running a foreign preset, so third-party presets are never
//! corrupted.

mod dispatch;
pub mod outbound;

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::framing::SysexAssembler;
use crate::midi::MidiSink;
use crate::modes::{page_of, ModeId, ModeManager, DEFAULT_MODE};
use crate::presets::{DeviceInfo, PresetInventory, PresetLocation};
use crate::protocol::ProtocolError;
use crate::touch::TouchMatcher;

/// Mutable protocol state, one critical section. Touch/pattern state lives
/// in [`TouchMatcher`] behind its own lock; the two are never held together.
struct SurfaceState {
    online: bool,
    mode_before_offline: Option<ModeId>,
    inventory: Option<PresetInventory>,
    firmware: Option<DeviceInfo>,
}

/// The Electra.One surface.
pub struct ElectraSurface {
    sink: Arc<dyn MidiSink>,
    modes: Arc<dyn ModeManager>,
    touch: Arc<TouchMatcher>,
    assembler: SysexAssembler,
    state: Mutex<SurfaceState>,
    /// Forward device-side log messages to the host log
    device_logging: bool,
}

impl ElectraSurface {
    pub fn new(
        sink: Arc<dyn MidiSink>,
        modes: Arc<dyn ModeManager>,
        touch: Arc<TouchMatcher>,
        device_logging: bool,
    ) -> Self {
        Self {
            sink,
            modes,
            touch,
            assembler: SysexAssembler::new(),
            state: Mutex::new(SurfaceState {
                online: false,
                mode_before_offline: None,
                inventory: None,
                firmware: None,
            }),
            device_logging,
        }
    }

    /// Kick off the handshake: the device-info response drives the rest
    /// (preset list, event subscription, preset selection).
    pub fn start_handshake(&self) -> Result<()> {
        info!("Requesting Electra.One device info");
        self.sink.send(&outbound::request_device_info())?;
        if self.device_logging {
            self.sink.send(&outbound::enable_logger(true))?;
        }
        Ok(())
    }

    /// Feed one raw transport fragment; dispatches when a message completes.
    pub fn handle_fragment(&self, fragment: &[u8]) -> Result<(), ProtocolError> {
        if let Some(message) = self.assembler.handle_fragment(fragment) {
            self.process_message(&message)?;
        }
        Ok(())
    }

    /// Feed one hex-encoded transport fragment.
    pub fn handle_hex_fragment(&self, fragment: &str) -> Result<(), ProtocolError> {
        if let Some(message) = self.assembler.handle_hex_fragment(fragment)? {
            self.process_message(&message)?;
        }
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    pub fn is_shift_engaged(&self) -> bool {
        self.touch.is_shift_engaged()
    }

    pub fn home_location(&self) -> PresetLocation {
        self.state
            .lock()
            .inventory
            .as_ref()
            .map(|i| i.home())
            .unwrap_or(PresetLocation::UNKNOWN)
    }

    pub fn firmware(&self) -> Option<DeviceInfo> {
        self.state.lock().firmware.clone()
    }

    // --- outbound API, gated on the online state ----------------------------

    /// Update name/color/visibility of a control. No-op while offline.
    pub fn set_control_properties(
        &self,
        control_id: u16,
        properties: &outbound::ControlProperties,
    ) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink.send(&outbound::control_update(control_id, properties)?)
    }

    /// Update the value label of a control. No-op while offline.
    pub fn set_value_label(&self, control_id: u16, text: &str) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink.send(&outbound::value_label_update(control_id, text))
    }

    /// Send a raw 14-bit value to a control's CC (0-31, the MSB of the
    /// CC pair). No-op while offline.
    pub fn set_raw_value(&self, channel: u8, cc: u8, value: u16) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink
            .send(&outbound::raw_value_update(channel, cc, value).encode())
    }

    /// Run a LUA snippet on the device. No-op while offline.
    pub fn run_lua(&self, code: &str) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink.send(&outbound::execute_lua(code))
    }

    /// Enable or disable display repaints. No-op while offline.
    pub fn set_repaint_enabled(&self, enabled: bool) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink.send(&outbound::set_repaint_enabled(enabled))
    }

    /// Activate a mode and select its page on the device.
    pub fn select_mode(&self, mode: ModeId) -> Result<()> {
        self.modes.activate(mode);
        if self.is_online() {
            if let Some(page) = page_of(mode) {
                self.sink.send(&outbound::switch_page(page))?;
            }
        }
        Ok(())
    }

    // --- online/offline transitions -----------------------------------------

    fn go_online(&self) -> Result<()> {
        let restored = {
            let mut state = self.state.lock();
            if state.online {
                return Ok(());
            }
            state.online = true;
            state.mode_before_offline.take().unwrap_or(DEFAULT_MODE)
        };
        info!("Electra.One online, restoring mode {:?}", restored);
        self.modes.activate(restored);
        if let Some(page) = page_of(restored) {
            self.sink.send(&outbound::switch_page(page))?;
        }
        Ok(())
    }

    fn go_offline(&self) {
        let mut state = self.state.lock();
        if !state.online && state.mode_before_offline.is_some() {
            return;
        }
        state.online = false;
        let current = self.modes.active_id();
        if current != ModeId::Dummy {
            state.mode_before_offline = Some(current);
        }
        drop(state);
        debug!("Electra.One offline, parking in dummy mode");
        self.modes.activate(ModeId::Dummy);
    }
}
