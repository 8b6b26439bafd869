//! Built-in knob touch patterns
//!
//! The device reports touch on its 12 pots (two rows of six, ids 0-11).
//! These are the 37 two/three-knob combinations the firmware can deliver
//! reliably: adjacent pairs, skip-one pairs, adjacent triples, and vertical
//! pairs (same column, both rows).

use crate::protocol::KNOB_COUNT;

/// Pattern position: the knob must be released
pub const RELEASED: u8 = 0;
/// Pattern position: the knob must be touched
pub const TOUCHED: u8 = 1;
/// Pattern position: the knob state does not matter
pub const IGNORE: u8 = 2;

/// An immutable 12-position touch pattern over {RELEASED, TOUCHED, IGNORE}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPattern(pub [u8; KNOB_COUNT]);

impl TouchPattern {
    /// Exact comparison: every position must agree with the live state,
    /// IGNORE positions included (they must be released). Used for command
    /// bindings, where a stray extra touch must not fire the command.
    pub fn matches_exact(&self, state: &[u8; KNOB_COUNT]) -> bool {
        self.0
            .iter()
            .zip(state.iter())
            .all(|(&p, &s)| (p == TOUCHED) == (s != 0))
    }

    /// Ignore-aware comparison: IGNORE positions always match, the rest must
    /// agree. Used for shift chords, which stay engaged while unrelated
    /// knobs are being touched.
    pub fn matches_ignoring(&self, state: &[u8; KNOB_COUNT]) -> bool {
        self.0.iter().zip(state.iter()).all(|(&p, &s)| match p {
            IGNORE => true,
            TOUCHED => s != 0,
            _ => s == 0,
        })
    }

    /// Derive the shift variant: TOUCHED positions stay required, every
    /// RELEASED position is relaxed to IGNORE. This is what lets a shift
    /// chord be held while other knobs are in use.
    pub fn to_shift_pattern(self) -> TouchPattern {
        let mut derived = self.0;
        for p in derived.iter_mut() {
            if *p == RELEASED {
                *p = IGNORE;
            }
        }
        TouchPattern(derived)
    }
}

// Shorthand for the table below
const O: u8 = RELEASED;
const X: u8 = TOUCHED;

/// The 37 combinations assignable to a function slot, in slot order.
pub static COMBINATIONS: [TouchPattern; 37] = [
    // Adjacent pairs (i, i+1)
    TouchPattern([X, X, O, O, O, O, O, O, O, O, O, O]),
    TouchPattern([O, X, X, O, O, O, O, O, O, O, O, O]),
    TouchPattern([O, O, X, X, O, O, O, O, O, O, O, O]),
    TouchPattern([O, O, O, X, X, O, O, O, O, O, O, O]),
    TouchPattern([O, O, O, O, X, X, O, O, O, O, O, O]),
    TouchPattern([O, O, O, O, O, X, X, O, O, O, O, O]),
    TouchPattern([O, O, O, O, O, O, X, X, O, O, O, O]),
    TouchPattern([O, O, O, O, O, O, O, X, X, O, O, O]),
    TouchPattern([O, O, O, O, O, O, O, O, X, X, O, O]),
    TouchPattern([O, O, O, O, O, O, O, O, O, X, X, O]),
    TouchPattern([O, O, O, O, O, O, O, O, O, O, X, X]),
    // Skip-one pairs (i, i+2)
    TouchPattern([X, O, X, O, O, O, O, O, O, O, O, O]),
    TouchPattern([O, X, O, X, O, O, O, O, O, O, O, O]),
    TouchPattern([O, O, X, O, X, O, O, O, O, O, O, O]),
    TouchPattern([O, O, O, X, O, X, O, O, O, O, O, O]),
    TouchPattern([O, O, O, O, X, O, X, O, O, O, O, O]),
    TouchPattern([O, O, O, O, O, X, O, X, O, O, O, O]),
    TouchPattern([O, O, O, O, O, O, X, O, X, O, O, O]),
    TouchPattern([O, O, O, O, O, O, O, X, O, X, O, O]),
    TouchPattern([O, O, O, O, O, O, O, O, X, O, X, O]),
    TouchPattern([O, O, O, O, O, O, O, O, O, X, O, X]),
    // Adjacent triples (i, i+1, i+2)
    TouchPattern([X, X, X, O, O, O, O, O, O, O, O, O]),
    TouchPattern([O, X, X, X, O, O, O, O, O, O, O, O]),
    TouchPattern([O, O, X, X, X, O, O, O, O, O, O, O]),
    TouchPattern([O, O, O, X, X, X, O, O, O, O, O, O]),
    TouchPattern([O, O, O, O, X, X, X, O, O, O, O, O]),
    TouchPattern([O, O, O, O, O, X, X, X, O, O, O, O]),
    TouchPattern([O, O, O, O, O, O, X, X, X, O, O, O]),
    TouchPattern([O, O, O, O, O, O, O, X, X, X, O, O]),
    TouchPattern([O, O, O, O, O, O, O, O, X, X, X, O]),
    TouchPattern([O, O, O, O, O, O, O, O, O, X, X, X]),
    // Vertical pairs (i, i+6): same column on both rows
    TouchPattern([X, O, O, O, O, O, X, O, O, O, O, O]),
    TouchPattern([O, X, O, O, O, O, O, X, O, O, O, O]),
    TouchPattern([O, O, X, O, O, O, O, O, X, O, O, O]),
    TouchPattern([O, O, O, X, O, O, O, O, O, X, O, O]),
    TouchPattern([O, O, O, O, X, O, O, O, O, O, X, O]),
    TouchPattern([O, O, O, O, O, X, O, O, O, O, O, X]),
];
