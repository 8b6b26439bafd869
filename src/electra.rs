//! Electra.One hardware driver
//!
//! Handles MIDI port discovery and raw byte I/O with the device. Incoming
//! data is forwarded as transport fragments; reassembly and dispatch live
//! in [`crate::surface`].

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::midi::{format_hex, MidiSink};

/// One transport delivery from the device. SysEx messages larger than the
/// transport limit arrive as several of these.
#[derive(Debug, Clone)]
pub struct ElectraEvent {
    pub timestamp: Instant,
    pub raw_data: Vec<u8>,
}

/// Sendable handle to the output connection; this is what the surface gets
/// as its [`MidiSink`].
pub struct ElectraOutput {
    conn: Mutex<MidiOutputConnection>,
}

impl MidiSink for ElectraOutput {
    fn send(&self, data: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(data)
            .context("Failed to send MIDI data")?;
        debug!("Sent: {}", format_hex(data));
        Ok(())
    }
}

/// Electra.One driver for hardware communication
pub struct ElectraDriver {
    input_conn: Option<MidiInputConnection<()>>,
    output: Option<Arc<ElectraOutput>>,

    event_tx: mpsc::Sender<ElectraEvent>,
    event_rx: Option<mpsc::Receiver<ElectraEvent>>,

    input_port_name: String,
    output_port_name: String,
}

impl ElectraDriver {
    /// Create a new driver; ports are matched by case-insensitive substring.
    pub fn new(input_port: &str, output_port: &str) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);

        Self {
            input_conn: None,
            output: None,
            event_tx,
            event_rx: Some(event_rx),
            input_port_name: input_port.to_string(),
            output_port_name: output_port.to_string(),
        }
    }

    /// List available MIDI input port names
    pub fn list_input_ports() -> Result<Vec<String>> {
        let midi_in = MidiInput::new("ElectraSurface-Scanner")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect())
    }

    /// List available MIDI output port names
    pub fn list_output_ports() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("ElectraSurface-Scanner")?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }

    fn find_input_port(
        midi_in: &MidiInput,
        pattern: &str,
    ) -> Option<(midir::MidiInputPort, String)> {
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                if name.to_lowercase().contains(&pattern.to_lowercase()) {
                    debug!("Found port '{}' matching pattern '{}'", name, pattern);
                    return Some((port, name));
                }
            }
        }
        None
    }

    fn find_output_port(
        midi_out: &MidiOutput,
        pattern: &str,
    ) -> Option<(midir::MidiOutputPort, String)> {
        for port in midi_out.ports() {
            if let Ok(name) = midi_out.port_name(&port) {
                if name.to_lowercase().contains(&pattern.to_lowercase()) {
                    debug!("Found port '{}' matching pattern '{}'", name, pattern);
                    return Some((port, name));
                }
            }
        }
        None
    }

    /// Connect to the device's MIDI ports
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        info!(
            "Connecting to Electra.One - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let midi_in =
            MidiInput::new("ElectraSurface-Input").context("Failed to create MIDI input")?;

        let (in_port, port_name) = Self::find_input_port(&midi_in, &self.input_port_name)
            .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", self.input_port_name))?;

        info!("Connecting to input port: {}", port_name);

        let event_tx = self.event_tx.clone();

        let input_conn = midi_in
            .connect(
                &in_port,
                "ElectraSurface",
                move |_timestamp, data, _| {
                    let event = ElectraEvent {
                        timestamp: Instant::now(),
                        raw_data: data.to_vec(),
                    };
                    // Never block or panic inside the MIDI callback
                    let _ = event_tx.try_send(event);
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .context("Failed to connect to input port")?;

        self.input_conn = Some(input_conn);

        let midi_out =
            MidiOutput::new("ElectraSurface-Output").context("Failed to create MIDI output")?;

        let (out_port, port_name) = Self::find_output_port(&midi_out, &self.output_port_name)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", self.output_port_name))?;

        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, "ElectraSurface")
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .context("Failed to connect to output port")?;

        self.output = Some(Arc::new(ElectraOutput {
            conn: Mutex::new(output_conn),
        }));

        info!("Electra.One connected");
        Ok(())
    }

    /// Disconnect from MIDI ports
    pub fn disconnect(&mut self) {
        if self.input_conn.take().is_some() || self.output.take().is_some() {
            info!("Electra.One disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output.is_some()
    }

    /// The output handle the surface uses as its sink
    pub fn output(&self) -> Result<Arc<ElectraOutput>> {
        self.output
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Not connected to output port"))
    }

    /// Take the event receiver (for the main loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ElectraEvent>> {
        self.event_rx.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_discovery_does_not_panic() {
        let _ = ElectraDriver::list_input_ports();
        let _ = ElectraDriver::list_output_ports();
    }
}
