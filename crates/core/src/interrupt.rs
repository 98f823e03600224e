// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Interrupt arbiter: pending latches, the start/running handshake with the
//! control unit, and the fixed-priority vector register.

use crate::signals::IRQ_LINES;
use serde::{Deserialize, Serialize};

const LINE_MASK: u8 = (1 << IRQ_LINES) - 1;

/// Registered arbiter latches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterState {
    pub pending: u8,
    pub start: bool,
    pub running: bool,
    pub vector: u8,
}

/// Signals sampled by the arbiter in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterInputs {
    /// Request line levels, bit `i` for line `i`.
    pub lines: u8,
    pub gie: bool,
    /// Acknowledge pulse from the last interrupt-entry state.
    pub ack: bool,
    /// Return pulse from the last return-from-interrupt state.
    pub ret: bool,
}

/// Lowest pending index wins.
pub fn priority(pending: u8) -> Option<u8> {
    let pending = pending & LINE_MASK;
    if pending == 0 {
        None
    } else {
        Some(pending.trailing_zeros() as u8)
    }
}

/// Per-line accept mask: every line stays eligible except the one being
/// acknowledged.
pub fn ack_mask(ack: bool, vector: u8) -> u8 {
    if ack {
        LINE_MASK & !(1 << (vector & 0x3))
    } else {
        LINE_MASK
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterruptArbiter {
    state: ArbiterState,
}

impl InterruptArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ArbiterState {
        self.state
    }

    pub fn start(&self) -> bool {
        self.state.start
    }

    pub fn running(&self) -> bool {
        self.state.running
    }

    pub fn vector(&self) -> u8 {
        self.state.vector
    }

    pub fn pending(&self) -> u8 {
        self.state.pending
    }

    /// Next latch values. Pure; the current state is not touched.
    pub fn next(&self, inputs: &ArbiterInputs) -> ArbiterState {
        let cur = self.state;
        let lines = inputs.lines & LINE_MASK;

        let pending = if inputs.gie || cur.running {
            (cur.pending & ack_mask(inputs.ack, cur.vector)) | lines
        } else {
            0
        };

        let start = if cur.start {
            // Held until acknowledged; withdrawn if interrupts get masked first.
            inputs.gie && !inputs.ack
        } else {
            cur.pending != 0 && inputs.gie
        };

        let running = if cur.running {
            !inputs.ret
        } else {
            cur.start
        };

        let vector = if cur.start {
            cur.vector
        } else {
            priority(cur.pending).unwrap_or(cur.vector)
        };

        ArbiterState {
            pending,
            start,
            running,
            vector,
        }
    }

    pub fn commit(&mut self, next: ArbiterState) {
        if self.state.start && !next.start && next.pending != 0 && !next.running {
            tracing::trace!("interrupt start withdrawn, pending {:#06b}", next.pending);
        }
        self.state = next;
    }

    pub fn reset(&mut self) {
        self.state = ArbiterState::default();
    }

    pub fn restore(&mut self, state: ArbiterState) {
        self.state = ArbiterState {
            pending: state.pending & LINE_MASK,
            vector: state.vector & 0x3,
            ..state
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(arb: &mut InterruptArbiter, inputs: ArbiterInputs) -> ArbiterState {
        let next = arb.next(&inputs);
        arb.commit(next);
        next
    }

    fn lines(mask: u8, gie: bool) -> ArbiterInputs {
        ArbiterInputs {
            lines: mask,
            gie,
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_encoder() {
        assert_eq!(priority(0), None);
        assert_eq!(priority(0b1000), Some(3));
        assert_eq!(priority(0b0110), Some(1));
        assert_eq!(priority(0b1111), Some(0));
    }

    #[test]
    fn test_ack_mask_single_line() {
        assert_eq!(ack_mask(false, 2), 0b1111);
        assert_eq!(ack_mask(true, 0), 0b1110);
        assert_eq!(ack_mask(true, 2), 0b1011);
    }

    #[test]
    fn test_latch_start_then_running() {
        let mut arb = InterruptArbiter::new();
        let s = step(&mut arb, lines(0b0100, true));
        assert_eq!(s.pending, 0b0100);
        assert!(!s.start);

        let s = step(&mut arb, lines(0, true));
        // Level dropped but the latch holds
        assert_eq!(s.pending, 0b0100);
        assert!(s.start);
        assert_eq!(s.vector, 2);
        assert!(!s.running);

        let s = step(&mut arb, lines(0, true));
        assert!(s.start);
        assert!(s.running);
    }

    #[test]
    fn test_masked_without_running_drops_pending() {
        let mut arb = InterruptArbiter::new();
        let s = step(&mut arb, lines(0b0001, false));
        assert_eq!(s.pending, 0);
        assert!(!s.start);
    }

    #[test]
    fn test_priority_lines_one_and_two() {
        let mut arb = InterruptArbiter::new();
        step(&mut arb, lines(0b0110, true));
        let s = step(&mut arb, lines(0b0110, true));
        assert_eq!(s.vector, 1);
        for _ in 0..4 {
            let s = step(&mut arb, lines(0b0110, true));
            assert_eq!(s.vector, 1);
        }
    }

    #[test]
    fn test_ack_clears_only_serviced_line() {
        let mut arb = InterruptArbiter::new();
        step(&mut arb, lines(0b1001, true));
        step(&mut arb, lines(0b1001, true));
        assert!(arb.start());
        assert_eq!(arb.vector(), 0);

        // Handshake: ack for vector 0 with line 0 released
        let s = step(
            &mut arb,
            ArbiterInputs {
                lines: 0b1000,
                gie: true,
                ack: true,
                ret: false,
            },
        );
        assert_eq!(s.pending, 0b1000);
        assert!(!s.start);
        assert!(s.running);
        assert_eq!(s.vector, 0);

        // Handler runs with interrupts masked: line 3 stays latched
        let s = step(&mut arb, lines(0, false));
        assert_eq!(s.pending, 0b1000);
        assert!(!s.start);
        assert_eq!(s.vector, 3);
    }

    #[test]
    fn test_gie_drop_withdraws_start() {
        let mut arb = InterruptArbiter::new();
        step(&mut arb, lines(0b0010, true));
        step(&mut arb, lines(0b0010, true));
        assert!(arb.start());
        step(&mut arb, lines(0b0010, true));
        assert!(arb.running());

        let s = step(&mut arb, lines(0, false));
        assert!(!s.start);
        // Kept latched for when interrupts come back
        assert_eq!(s.pending, 0b0010);

        step(&mut arb, lines(0, true));
        assert!(arb.start());
        assert_eq!(arb.vector(), 1);
    }

    #[test]
    fn test_return_without_running_is_ignored() {
        let mut arb = InterruptArbiter::new();
        let before = arb.state();
        let s = step(
            &mut arb,
            ArbiterInputs {
                ret: true,
                gie: true,
                ..Default::default()
            },
        );
        assert_eq!(s, before);
    }

    #[test]
    fn test_return_clears_running() {
        let mut arb = InterruptArbiter::new();
        arb.restore(ArbiterState {
            running: true,
            ..Default::default()
        });
        let s = step(
            &mut arb,
            ArbiterInputs {
                ret: true,
                ..Default::default()
            },
        );
        assert!(!s.running);
    }

    #[test]
    fn test_reset_clears_latches() {
        let mut arb = InterruptArbiter::new();
        step(&mut arb, lines(0b1111, true));
        step(&mut arb, lines(0b1111, true));
        arb.reset();
        assert_eq!(arb.state(), ArbiterState::default());
    }
}
