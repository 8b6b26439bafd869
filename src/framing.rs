//! SysEx chunk reassembly
//!
//! The transport limits how many bytes one callback can deliver, so a logical
//! SysEx message may arrive as several fragments. This layer buffers the
//! fragments and hands the flat byte sequence to the dispatcher once the
//! terminator shows up.

use parking_lot::Mutex;
use tracing::warn;

use crate::protocol::{ProtocolError, SYSEX_END, SYSEX_START};

/// Reassembles logical SysEx messages from transport fragments.
///
/// The buffer is its own critical section: the transport callback and the
/// processing path may run on different threads, and nothing else is ever
/// held while the buffer lock is taken.
#[derive(Default)]
pub struct SysexAssembler {
    buffer: Mutex<Vec<Vec<u8>>>,
}

impl SysexAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one hex-encoded transport fragment (e.g. `"F000214501"`).
    pub fn handle_hex_fragment(&self, fragment: &str) -> Result<Option<Vec<u8>>, ProtocolError> {
        let bytes = hex::decode(fragment.trim())?;
        Ok(self.handle_fragment(&bytes))
    }

    /// Feed one transport fragment, returning the complete message once the
    /// terminator arrives.
    ///
    /// A start marker while earlier fragments are still pending means the
    /// previous message was interrupted: the stale buffer is reported and
    /// discarded, and reassembly restarts from the new fragment. A message
    /// that never receives its terminator simply waits for that to happen.
    pub fn handle_fragment(&self, fragment: &[u8]) -> Option<Vec<u8>> {
        let mut buffer = self.buffer.lock();

        if fragment.first() == Some(&SYSEX_START) && !buffer.is_empty() {
            let stale: usize = buffer.iter().map(Vec::len).sum();
            warn!(
                "SysEx desync: new message started with {} buffered bytes pending, discarding",
                stale
            );
            buffer.clear();
        }

        buffer.push(fragment.to_vec());

        if fragment.last() == Some(&SYSEX_END) {
            let message = if buffer.len() == 1 {
                buffer.pop().unwrap_or_default()
            } else {
                buffer.concat()
            };
            buffer.clear();
            Some(message)
        } else {
            None
        }
    }

    /// Number of bytes currently awaiting a terminator.
    pub fn pending_len(&self) -> usize {
        self.buffer.lock().iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MESSAGE: [u8; 7] = [0xF0, 0x00, 0x21, 0x45, 0x01, 0x7F, 0xF7];

    #[test]
    fn test_single_fragment_message() {
        let asm = SysexAssembler::new();
        assert_eq!(asm.handle_fragment(&MESSAGE), Some(MESSAGE.to_vec()));
        assert_eq!(asm.pending_len(), 0);
    }

    #[test]
    fn test_two_fragment_message() {
        let asm = SysexAssembler::new();
        assert_eq!(asm.handle_fragment(&MESSAGE[..4]), None);
        assert_eq!(asm.pending_len(), 4);
        assert_eq!(asm.handle_fragment(&MESSAGE[4..]), Some(MESSAGE.to_vec()));
        assert_eq!(asm.pending_len(), 0);
    }

    #[test]
    fn test_hex_fragment() {
        let asm = SysexAssembler::new();
        assert_eq!(asm.handle_hex_fragment("F0002145").unwrap(), None);
        assert_eq!(
            asm.handle_hex_fragment("017FF7").unwrap(),
            Some(MESSAGE.to_vec())
        );
    }

    #[test]
    fn test_bad_hex_rejected() {
        let asm = SysexAssembler::new();
        assert!(asm.handle_hex_fragment("F0ZZ").is_err());
        // A bad fragment leaves the buffer untouched
        assert_eq!(asm.pending_len(), 0);
    }

    #[test]
    fn test_desync_discards_stale_buffer() {
        let asm = SysexAssembler::new();
        // First message never terminates
        assert_eq!(asm.handle_fragment(&[0xF0, 0x00, 0x21]), None);
        // New start marker forces a discard; stale bytes must not leak
        let complete = asm.handle_fragment(&MESSAGE).unwrap();
        assert_eq!(complete, MESSAGE.to_vec());
    }

    #[test]
    fn test_desync_mid_reassembly() {
        let asm = SysexAssembler::new();
        assert_eq!(asm.handle_fragment(&[0xF0, 0x00, 0x21, 0x45]), None);
        assert_eq!(asm.handle_fragment(&[0x01, 0x04, 0x5B]), None);
        assert_eq!(asm.handle_fragment(&MESSAGE[..4]), None);
        assert_eq!(asm.handle_fragment(&MESSAGE[4..]), Some(MESSAGE.to_vec()));
    }

    proptest! {
        /// Reassembly is invariant under fragment boundaries: any split of a
        /// message yields byte-identical output to delivering it whole.
        #[test]
        fn prop_reassembly_is_split_invariant(
            payload in proptest::collection::vec(0u8..0x80, 0..64),
            cuts in proptest::collection::vec(any::<proptest::sample::Index>(), 0..6),
        ) {
            let mut message = vec![SYSEX_START];
            message.extend_from_slice(&payload);
            message.push(SYSEX_END);

            let mut boundaries: Vec<usize> =
                cuts.iter().map(|i| 1 + i.index(message.len() - 1)).collect();
            boundaries.sort_unstable();
            boundaries.dedup();
            boundaries.push(message.len());

            let asm = SysexAssembler::new();
            let mut start = 0;
            let mut result = None;
            for end in boundaries {
                if start == end {
                    continue;
                }
                let out = asm.handle_fragment(&message[start..end]);
                if end == message.len() {
                    result = out;
                } else {
                    prop_assert!(out.is_none());
                }
                start = end;
            }
            prop_assert_eq!(result, Some(message));
        }
    }
}
