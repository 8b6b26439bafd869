//! Typed decoders for the device's JSON info payloads
//!
//! Device info and the preset list arrive as JSON text embedded in SysEx
//! frames. Small serde structs per message keep the field names checked at
//! compile time instead of navigating a generic JSON tree.

use std::collections::HashMap;

use serde::Deserialize;

use crate::protocol::ProtocolError;

/// Payload of the device-info response (info sub-command 0x7F).
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "versionSeq")]
    pub version_seq: u64,
    #[serde(rename = "versionText")]
    pub version_text: String,
    #[serde(default)]
    pub serial: Option<String>,
}

/// One entry of the preset-list response (info sub-command 0x04).
#[derive(Debug, Clone, Deserialize)]
pub struct PresetEntry {
    pub name: String,
    #[serde(rename = "bankNumber")]
    pub bank_number: i32,
    pub slot: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetList {
    pub presets: Vec<PresetEntry>,
}

/// A (bank, slot) pair on the device. `UNKNOWN` means not yet discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetLocation {
    pub bank: i32,
    pub slot: i32,
}

impl PresetLocation {
    pub const UNKNOWN: PresetLocation = PresetLocation { bank: -1, slot: -1 };

    pub fn new(bank: i32, slot: i32) -> Self {
        Self { bank, slot }
    }
}

/// Lookup tables built from the preset list, with the home preset's
/// location resolved by exact name match.
#[derive(Debug, Clone)]
pub struct PresetInventory {
    bank_by_name: HashMap<String, i32>,
    slot_by_name: HashMap<String, i32>,
    home: PresetLocation,
}

impl PresetInventory {
    /// Build the inventory. The home preset is mandatory: without it no UI
    /// element on the device is addressable, so its absence is fatal.
    pub fn from_list(list: &PresetList, home_name: &str) -> Result<Self, ProtocolError> {
        let mut bank_by_name = HashMap::new();
        let mut slot_by_name = HashMap::new();
        let mut home = None;

        for preset in &list.presets {
            if preset.name == home_name {
                home = Some(PresetLocation::new(preset.bank_number, preset.slot));
            }
            bank_by_name.insert(preset.name.clone(), preset.bank_number);
            slot_by_name.insert(preset.name.clone(), preset.slot);
        }

        let home = home.ok_or_else(|| ProtocolError::HomePresetMissing(home_name.to_string()))?;

        Ok(Self {
            bank_by_name,
            slot_by_name,
            home,
        })
    }

    pub fn home(&self) -> PresetLocation {
        self.home
    }

    pub fn bank_of(&self, name: &str) -> Option<i32> {
        self.bank_by_name.get(name).copied()
    }

    pub fn slot_of(&self, name: &str) -> Option<i32> {
        self.slot_by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.bank_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bank_by_name.is_empty()
    }
}

/// Decode the JSON text embedded in an info frame.
pub fn decode_payload<'a, T: Deserialize<'a>>(
    bytes: &'a [u8],
    context: &'static str,
) -> Result<T, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|source| ProtocolError::JsonPayload { context, source })
}
