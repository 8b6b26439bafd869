//! Knob touch state, combination registry, and pattern matching
//!
//! Multi-knob touch chords emulate the shift key the hardware does not have.
//! Each of the 37 built-in combinations can be assigned to nothing, to
//! shift, or to a command; the assignment is rebuilt whenever configuration
//! changes, while touch events keep arriving.

pub mod patterns;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::protocol::{KNOB_COUNT, ProtocolError};
use self::patterns::{COMBINATIONS, TouchPattern};

/// Synthetic press event delivered to a fired command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Down,
    Up,
}

/// A unit of behavior bound to a touch combination.
///
/// The physical gesture has no usable release signal, so a match fires
/// `Down` immediately followed by `Up`.
pub trait TouchCommand: Send + Sync {
    fn name(&self) -> &str;
    fn execute(&self, event: ButtonEvent);
}

/// Per-slot assignment of one of the 37 combinations.
#[derive(Clone)]
pub enum SlotBinding {
    Off,
    Shift,
    Command(Arc<dyn TouchCommand>),
}

impl fmt::Debug for SlotBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotBinding::Off => write!(f, "Off"),
            SlotBinding::Shift => write!(f, "Shift"),
            SlotBinding::Command(c) => write!(f, "Command({})", c.name()),
        }
    }
}

/// Result of one update-and-match cycle, mainly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    ShiftEngaged,
    CommandFired,
    NoMatch,
}

struct TouchTables {
    /// Raw touch value per knob, 0 = released
    state: [u8; KNOB_COUNT],
    /// Derived shift patterns (RELEASED relaxed to IGNORE)
    shift_patterns: Vec<TouchPattern>,
    /// Exact patterns with their bound commands
    command_patterns: Vec<(TouchPattern, Arc<dyn TouchCommand>)>,
    shift_engaged: bool,
}

/// Owns all touch/pattern state behind a single internal lock.
///
/// Matching and binding rebuilds share that lock, so a live configuration
/// change can never interleave with a half-finished match. The raw state
/// array is never handed out for external mutation.
pub struct TouchMatcher {
    tables: Mutex<TouchTables>,
}

impl Default for TouchMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchMatcher {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(TouchTables {
                state: [0; KNOB_COUNT],
                shift_patterns: Vec::new(),
                command_patterns: Vec::new(),
                shift_engaged: false,
            }),
        }
    }

    /// Rebuild the derived pattern tables from per-slot assignments.
    ///
    /// Slots beyond the built-in table are ignored; missing slots count as
    /// `Off`.
    pub fn rebuild_bindings(&self, bindings: &[SlotBinding]) {
        let mut tables = self.tables.lock();
        tables.shift_patterns.clear();
        tables.command_patterns.clear();

        for (pattern, binding) in COMBINATIONS.iter().zip(bindings.iter()) {
            match binding {
                SlotBinding::Off => {}
                SlotBinding::Shift => {
                    tables.shift_patterns.push(pattern.to_shift_pattern());
                }
                SlotBinding::Command(command) => {
                    tables.command_patterns.push((*pattern, Arc::clone(command)));
                }
            }
        }

        debug!(
            "Touch bindings rebuilt: {} shift pattern(s), {} command pattern(s)",
            tables.shift_patterns.len(),
            tables.command_patterns.len()
        );
    }

    /// Record a touch report for one knob and run the matcher.
    ///
    /// Precedence: shift patterns first (ignore-aware); then command
    /// patterns (exact); a command match fires Down+Up and clears the whole
    /// state array, because release events for multi-knob gestures are not
    /// reliably delivered. No match at all disengages shift. A plain shift
    /// engagement deliberately leaves the state untouched so the chord can
    /// be held.
    pub fn update_and_match(&self, knob: usize, value: u8) -> Result<MatchOutcome, ProtocolError> {
        if knob >= KNOB_COUNT {
            return Err(ProtocolError::KnobOutOfRange(knob as i32));
        }

        let fired;
        let outcome;
        {
            let mut tables = self.tables.lock();
            tables.state[knob] = value;

            let state = tables.state;
            if tables
                .shift_patterns
                .iter()
                .any(|p| p.matches_ignoring(&state))
            {
                tables.shift_engaged = true;
                return Ok(MatchOutcome::ShiftEngaged);
            }

            if let Some((_, command)) = tables
                .command_patterns
                .iter()
                .find(|(p, _)| p.matches_exact(&state))
            {
                fired = Some(Arc::clone(command));
                // Anti-hang safeguard: consume the whole gesture
                tables.state = [0; KNOB_COUNT];
                outcome = MatchOutcome::CommandFired;
            } else {
                tables.shift_engaged = false;
                fired = None;
                outcome = MatchOutcome::NoMatch;
            }
        }

        // Fire outside the lock; a command may call back into this matcher.
        if let Some(command) = fired {
            debug!("Touch combination fired: {}", command.name());
            command.execute(ButtonEvent::Down);
            command.execute(ButtonEvent::Up);
        }

        Ok(outcome)
    }

    /// Force-clear all touch state, e.g. when the device switches presets
    /// and pending release events will never arrive.
    pub fn reset(&self) {
        let mut tables = self.tables.lock();
        if tables.state.iter().any(|&v| v != 0) {
            warn!("Clearing touch state with knobs still reported down");
        }
        tables.state = [0; KNOB_COUNT];
    }

    pub fn is_shift_engaged(&self) -> bool {
        self.tables.lock().shift_engaged
    }

    #[cfg(test)]
    fn state_snapshot(&self) -> [u8; KNOB_COUNT] {
        self.tables.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCommand {
        downs: AtomicUsize,
        ups: AtomicUsize,
    }

    impl CountingCommand {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                downs: AtomicUsize::new(0),
                ups: AtomicUsize::new(0),
            })
        }
    }

    impl TouchCommand for CountingCommand {
        fn name(&self) -> &str {
            "counting"
        }
        fn execute(&self, event: ButtonEvent) {
            match event {
                ButtonEvent::Down => self.downs.fetch_add(1, Ordering::SeqCst),
                ButtonEvent::Up => self.ups.fetch_add(1, Ordering::SeqCst),
            };
        }
    }

    /// Slot 0 binds knobs 0+1, slot 21 binds knobs 0+1+2 (first triple).
    fn matcher_with(slot0: SlotBinding, slot21: SlotBinding) -> TouchMatcher {
        let matcher = TouchMatcher::new();
        let mut bindings = vec![SlotBinding::Off; 37];
        bindings[0] = slot0;
        bindings[21] = slot21;
        matcher.rebuild_bindings(&bindings);
        matcher
    }

    #[test]
    fn test_command_fires_down_then_up_and_resets_state() {
        let command = CountingCommand::new();
        let matcher = matcher_with(
            SlotBinding::Off,
            SlotBinding::Command(command.clone()),
        );

        assert_eq!(matcher.update_and_match(0, 40).unwrap(), MatchOutcome::NoMatch);
        assert_eq!(matcher.update_and_match(1, 50).unwrap(), MatchOutcome::NoMatch);
        assert_eq!(
            matcher.update_and_match(2, 60).unwrap(),
            MatchOutcome::CommandFired
        );

        assert_eq!(command.downs.load(Ordering::SeqCst), 1);
        assert_eq!(command.ups.load(Ordering::SeqCst), 1);
        // Anti-hang: the whole array is cleared after a fire
        assert_eq!(matcher.state_snapshot(), [0; KNOB_COUNT]);
    }

    #[test]
    fn test_shift_takes_precedence_over_commands() {
        let command = CountingCommand::new();
        // Same chord assigned as shift (slot 0, knobs 0+1) and a command
        // that would also match once knob 2 joins
        let matcher = matcher_with(SlotBinding::Shift, SlotBinding::Command(command.clone()));

        matcher.update_and_match(0, 10).unwrap();
        assert_eq!(
            matcher.update_and_match(1, 10).unwrap(),
            MatchOutcome::ShiftEngaged
        );
        assert!(matcher.is_shift_engaged());

        // Extra knob: the shift pattern still matches through its IGNORE
        // positions, so the exact command pattern never gets a chance
        assert_eq!(
            matcher.update_and_match(2, 10).unwrap(),
            MatchOutcome::ShiftEngaged
        );
        assert_eq!(command.downs.load(Ordering::SeqCst), 0);

        // Shift engagement does not clear the state (the chord is held)
        assert_ne!(matcher.state_snapshot(), [0; KNOB_COUNT]);
    }

    #[test]
    fn test_no_match_disengages_shift() {
        let matcher = matcher_with(SlotBinding::Shift, SlotBinding::Off);

        matcher.update_and_match(0, 10).unwrap();
        matcher.update_and_match(1, 10).unwrap();
        assert!(matcher.is_shift_engaged());

        // Release one required knob: chord broken, shift drops
        matcher.update_and_match(0, 0).unwrap();
        assert!(!matcher.is_shift_engaged());

        // Idempotent when already disengaged
        matcher.update_and_match(1, 0).unwrap();
        assert!(!matcher.is_shift_engaged());
    }

    #[test]
    fn test_out_of_range_knob_rejected_without_mutation() {
        let matcher = matcher_with(SlotBinding::Shift, SlotBinding::Off);
        assert!(matcher.update_and_match(KNOB_COUNT, 40).is_err());
        assert_eq!(matcher.state_snapshot(), [0; KNOB_COUNT]);
    }

    #[test]
    fn test_rebuild_drops_stale_bindings() {
        let command = CountingCommand::new();
        let matcher = matcher_with(SlotBinding::Off, SlotBinding::Command(command.clone()));

        // Reconfigure everything off; the old command must not fire
        matcher.rebuild_bindings(&vec![SlotBinding::Off; 37]);
        matcher.update_and_match(0, 10).unwrap();
        matcher.update_and_match(1, 10).unwrap();
        matcher.update_and_match(2, 10).unwrap();
        assert_eq!(command.downs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let matcher = matcher_with(SlotBinding::Off, SlotBinding::Off);
        matcher.update_and_match(3, 99).unwrap();
        matcher.reset();
        assert_eq!(matcher.state_snapshot(), [0; KNOB_COUNT]);
    }
}
