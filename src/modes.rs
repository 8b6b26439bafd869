//! Mode abstraction and page-to-mode mapping
//!
//! Each page of the home preset corresponds to one editing mode. The
//! surface only needs a small capability interface: activate a mode by id,
//! query the active one, restore the previous one, and optionally notify a
//! mode of parameter touches.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

/// Identifier of an editing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeId {
    Volume,
    Pan,
    Sends,
    Device,
    Transport,
    Session,
    /// Neutral mode forced while the device runs a foreign preset; emits no
    /// hardware output.
    Dummy,
}

/// Device pages in order; page index reported by the hardware maps straight
/// into this table. Indices past the end are ignored.
pub const PAGE_MODES: [ModeId; 6] = [
    ModeId::Volume,
    ModeId::Pan,
    ModeId::Sends,
    ModeId::Device,
    ModeId::Transport,
    ModeId::Session,
];

/// Mode activated when the device first comes online with nothing
/// remembered yet.
pub const DEFAULT_MODE: ModeId = ModeId::Volume;

/// Page index for a mode, the inverse of [`PAGE_MODES`].
pub fn page_of(mode: ModeId) -> Option<u8> {
    PAGE_MODES.iter().position(|&m| m == mode).map(|i| i as u8)
}

/// Optional capability: a mode that reacts to parameter touch begin/end.
pub trait TouchEditingMode: Send + Sync {
    fn on_parameter_touch(&self, control_id: u16, touched: bool);
}

/// One editing mode.
pub trait Mode: Send + Sync {
    fn id(&self) -> ModeId;

    fn on_activate(&self) {}
    fn on_deactivate(&self) {}

    /// Capability query instead of runtime type probing: a mode that edits
    /// touch-sensitive parameters returns itself here.
    fn as_touch_editing(&self) -> Option<&dyn TouchEditingMode> {
        None
    }
}

/// Mode lifecycle collaborator consumed by the dispatcher.
pub trait ModeManager: Send + Sync {
    fn activate(&self, id: ModeId);
    fn active_id(&self) -> ModeId;
    fn active_mode(&self) -> Option<Arc<dyn Mode>>;
    fn restore_previous(&self);
}

/// In-process mode manager: a registry of modes plus active/previous ids.
pub struct SimpleModeManager {
    modes: HashMap<ModeId, Arc<dyn Mode>>,
    current: Mutex<(ModeId, Option<ModeId>)>,
}

impl SimpleModeManager {
    pub fn new(modes: Vec<Arc<dyn Mode>>, initial: ModeId) -> Self {
        let modes: HashMap<ModeId, Arc<dyn Mode>> =
            modes.into_iter().map(|m| (m.id(), m)).collect();
        Self {
            modes,
            current: Mutex::new((initial, None)),
        }
    }
}

impl ModeManager for SimpleModeManager {
    fn activate(&self, id: ModeId) {
        let mut current = self.current.lock();
        let previous = current.0;
        if previous == id {
            return;
        }
        if let Some(old) = self.modes.get(&previous) {
            old.on_deactivate();
        }
        *current = (id, Some(previous));
        drop(current);

        if let Some(new) = self.modes.get(&id) {
            new.on_activate();
        }
        info!("Mode activated: {:?}", id);
    }

    fn active_id(&self) -> ModeId {
        self.current.lock().0
    }

    fn active_mode(&self) -> Option<Arc<dyn Mode>> {
        let id = self.active_id();
        self.modes.get(&id).cloned()
    }

    fn restore_previous(&self) {
        let previous = self.current.lock().1;
        if let Some(id) = previous {
            debug!("Restoring previous mode: {:?}", id);
            self.activate(id);
        }
    }
}

/// Minimal mode implementation that only tracks its identity. Used by the
/// binary until real editing modes are wired up, and by tests.
pub struct PlainMode {
    id: ModeId,
}

impl PlainMode {
    pub fn new(id: ModeId) -> Arc<Self> {
        Arc::new(Self { id })
    }

    /// One plain mode per supported page, plus the dummy mode.
    pub fn all() -> Vec<Arc<dyn Mode>> {
        let mut modes: Vec<Arc<dyn Mode>> = PAGE_MODES
            .iter()
            .map(|&id| PlainMode::new(id) as Arc<dyn Mode>)
            .collect();
        modes.push(PlainMode::new(ModeId::Dummy));
        modes
    }
}

impl Mode for PlainMode {
    fn id(&self) -> ModeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_mode_mapping_roundtrip() {
        for (page, &mode) in PAGE_MODES.iter().enumerate() {
            assert_eq!(page_of(mode), Some(page as u8));
        }
        assert_eq!(page_of(ModeId::Dummy), None);
    }

    #[test]
    fn test_activate_and_restore() {
        let manager = SimpleModeManager::new(PlainMode::all(), ModeId::Volume);
        assert_eq!(manager.active_id(), ModeId::Volume);

        manager.activate(ModeId::Device);
        assert_eq!(manager.active_id(), ModeId::Device);

        manager.restore_previous();
        assert_eq!(manager.active_id(), ModeId::Volume);
    }

    #[test]
    fn test_reactivating_current_keeps_previous() {
        let manager = SimpleModeManager::new(PlainMode::all(), ModeId::Volume);
        manager.activate(ModeId::Pan);
        manager.activate(ModeId::Pan);
        manager.restore_previous();
        assert_eq!(manager.active_id(), ModeId::Volume);
    }
}
