// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const IRQ_LINES: usize = 4;

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

/// The four level-sensitive interrupt request inputs. Line 0 has the
/// highest priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLines {
    levels: [DigitalLevel; IRQ_LINES],
}

impl RequestLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines at or beyond `IRQ_LINES` are ignored.
    pub fn set(&mut self, line: usize, level: DigitalLevel) {
        if let Some(slot) = self.levels.get_mut(line) {
            *slot = level;
        }
    }

    pub fn get(&self, line: usize) -> DigitalLevel {
        self.levels.get(line).copied().unwrap_or_default()
    }

    /// Asserted lines as a bit mask, bit `i` for line `i`.
    pub fn mask(&self) -> u8 {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, level)| bool::from(**level))
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }
}
