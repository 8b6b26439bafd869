//! MIDI sniffer for debugging and development
//!
//! Monitors MIDI traffic and decodes Electra.One SysEx envelopes, including
//! messages that arrive chunked across several transport deliveries.

use anyhow::Result;
use colored::*;
use midir::{MidiInput, MidiInputConnection};
use std::time::Instant;
use tokio::sync::mpsc;

use crate::framing::SysexAssembler;
use crate::midi::format_hex;
use crate::protocol::{self, describe_command};

/// One captured delivery
#[derive(Debug, Clone)]
pub struct SnifferEvent {
    pub timestamp_ms: u64,
    pub port_name: String,
    pub data: Vec<u8>,
}

/// Print all MIDI ports to stdout
pub fn list_ports_formatted() {
    use crate::electra::ElectraDriver;

    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());
    match ElectraDriver::list_input_ports() {
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  {}: {}", i, name);
            }
        }
        Err(e) => println!("  {} {}", "error:".red(), e),
    }

    println!("\n{}", "=== MIDI Output Ports ===".bold().cyan());
    match ElectraDriver::list_output_ports() {
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  {}: {}", i, name);
            }
        }
        Err(e) => println!("  {} {}", "error:".red(), e),
    }
    println!();
}

/// CLI sniffer: dump decoded Electra traffic from ports matching a pattern
/// (all ports when the pattern is empty).
pub async fn run_cli_sniffer(pattern: &str) -> Result<()> {
    println!("{}", "=== Electra.One Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (event_tx, mut event_rx) = mpsc::channel::<SnifferEvent>(1000);
    let start_time = Instant::now();

    let scanner = MidiInput::new("ElectraSurface-Sniffer")?;
    let port_names: Vec<String> = scanner
        .ports()
        .iter()
        .filter_map(|p| scanner.port_name(p).ok())
        .collect();
    drop(scanner);

    let mut connections: Vec<MidiInputConnection<()>> = Vec::new();

    for (index, name) in port_names.iter().enumerate() {
        if !pattern.is_empty() && !name.to_lowercase().contains(&pattern.to_lowercase()) {
            continue;
        }

        // midir wants one MidiInput per connection; ports may have come or
        // gone since the first scan, so re-resolve by name, not by index
        let input = MidiInput::new(&format!("Sniffer-{}", index))?;
        let ports = input.ports();
        let fresh_names: Vec<String> = ports
            .iter()
            .filter_map(|p| input.port_name(p).ok())
            .collect();
        let Some(position) = port_position(&fresh_names, name) else {
            println!("Skipping {}: port no longer present", name.yellow());
            continue;
        };
        let port = &ports[position];
        let tx = event_tx.clone();
        let port_name = name.clone();
        let conn = input.connect(
            port,
            "sniffer",
            move |_ts, data, _| {
                let _ = tx.try_send(SnifferEvent {
                    timestamp_ms: start_time.elapsed().as_millis() as u64,
                    port_name: port_name.clone(),
                    data: data.to_vec(),
                });
            },
            (),
        );
        match conn {
            Ok(conn) => {
                println!("Monitoring: {}", name.green());
                connections.push(conn);
            }
            Err(e) => println!("Skipping {}: {}", name.yellow(), e),
        }
    }

    if connections.is_empty() {
        anyhow::bail!("No MIDI input ports matched '{}'", pattern);
    }

    println!(
        "\n{}",
        "Format: [timestamp] PORT | HEX => DECODED".dimmed()
    );
    println!("{}\n", "─".repeat(80).dimmed());

    let assembler = SysexAssembler::new();
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                print_event(&assembler, &event);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Sniffer stopped".yellow());
                break;
            }
        }
    }

    Ok(())
}

fn print_event(assembler: &SysexAssembler, event: &SnifferEvent) {
    // Only SysEx traffic goes through the reassembler; everything else is
    // plain channel data
    let is_sysex = event.data.first() == Some(&0xF0) || assembler.pending_len() > 0;
    let decoded = if is_sysex {
        match assembler.handle_fragment(&event.data) {
            Some(message) => describe_message(&message),
            None => "… chunk".dimmed().to_string(),
        }
    } else {
        crate::midi::MidiMessage::parse(&event.data)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unparsed".dimmed().to_string())
    };

    println!(
        "[{:08}ms] {} | {} => {}",
        event.timestamp_ms,
        event.port_name.cyan(),
        format_hex(&event.data),
        decoded
    );
}

/// Locate a port in a fresh enumeration by its name.
fn port_position(names: &[String], wanted: &str) -> Option<usize> {
    names.iter().position(|n| n == wanted)
}

fn describe_message(message: &[u8]) -> String {
    if !protocol::has_header(message) {
        return "non-Electra SysEx".yellow().to_string();
    }
    let command = message[protocol::OFFSET_COMMAND];
    let subcommand = message[protocol::OFFSET_SUBCOMMAND];
    format!(
        "{} ({:02X} {:02X}, {} content bytes)",
        describe_command(command, subcommand).green(),
        command,
        subcommand,
        message.len().saturating_sub(protocol::OFFSET_CONTENT + 1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_resolved_by_name_after_rescan() {
        // A device unplugged between scans shifts every later index down;
        // name lookup still lands on the right port
        let fresh = vec!["Electra Controller".to_string(), "Synth".to_string()];
        assert_eq!(port_position(&fresh, "Synth"), Some(1));
        assert_eq!(port_position(&fresh, "Unplugged Loop"), None);
    }

    #[test]
    fn test_describe_message() {
        let described = describe_message(&[0xF0, 0x00, 0x21, 0x45, 0x7E, 0x0A, 3, 0, 0, 64, 0xF7]);
        assert!(described.contains("pot touch"));
        assert!(described.contains("4 content bytes"));
    }

    #[test]
    fn test_describe_foreign_sysex() {
        let described = describe_message(&[0xF0, 0x7E, 0x00, 0x06, 0x01, 0x00, 0xF7]);
        assert!(described.contains("non-Electra"));
    }
}
