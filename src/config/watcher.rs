//! Live rebinding of touch combinations
//!
//! Watches the configuration file and turns each successful reload directly
//! into a fresh slot-binding table, resolved against the command registry it
//! was built with. Consumers receive tables ready for
//! [`crate::touch::TouchMatcher::rebuild_bindings`]; a reload that fails to
//! parse or validate emits nothing, so the bindings already installed stay
//! in force.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::touch::{SlotBinding, TouchCommand};

use super::AppConfig;

/// Editors emit a burst of modify events per save; reloads wait this long
/// for the file to settle.
const RELOAD_SETTLE: Duration = Duration::from_millis(100);

/// Commands a reload may bind to a combination slot, by config name.
pub type CommandRegistry = HashMap<String, Arc<dyn TouchCommand>>;

/// Emits a resolved slot-binding table whenever the config file changes.
pub struct BindingWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Vec<SlotBinding>>,
}

impl BindingWatcher {
    pub fn new(config_path: &str, commands: Arc<CommandRegistry>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(8);
        let path = config_path.to_string();

        // notify invokes the callback on its own OS thread; hop back onto
        // the runtime for the async file read
        let runtime = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }
            debug!("Config file changed: {:?}", event.paths);

            let path = path.clone();
            let tx = tx.clone();
            let commands = Arc::clone(&commands);
            runtime.spawn(async move {
                tokio::time::sleep(RELOAD_SETTLE).await;
                match AppConfig::load(&path).await {
                    Ok(config) => {
                        let bindings = config.slot_bindings(|name| commands.get(name).cloned());
                        info!("Touch combinations reloaded from {}", path);
                        if tx.send(bindings).await.is_err() {
                            debug!("Binding receiver gone, dropping reload");
                        }
                    }
                    Err(e) => warn!("Keeping current bindings, reload rejected: {:#}", e),
                }
            });
        })?;

        watcher
            .watch(Path::new(config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;
        info!("Watching {} for touch-combination changes", config_path);

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next resolved binding table; None once the watcher shuts down.
    pub async fn next_bindings(&mut self) -> Option<Vec<SlotBinding>> {
        self.rx.recv().await
    }
}
