//! Electra.One control surface engine
//!
//! Bidirectional SysEx protocol implementation for the Electra.One MIDI
//! controller: message chunking/reassembly, command dispatch, the device
//! online/offline handshake, and multi-knob touch-chord detection.

pub mod config;
pub mod electra;
pub mod framing;
pub mod midi;
pub mod modes;
pub mod presets;
pub mod protocol;
pub mod sniffer;
pub mod surface;
pub mod touch;

pub use surface::ElectraSurface;
