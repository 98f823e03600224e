// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BOOT_ADDRESS: u16 = 0xF000;
pub const DEFAULT_VECTOR_BASE: u16 = 0xFFF8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Program counter value loaded by the reset state.
    pub boot_address: u16,
    /// First of the four handler-address slots.
    pub vector_base: u16,
    pub memory_base: u64,
    pub memory_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            boot_address: DEFAULT_BOOT_ADDRESS,
            vector_base: DEFAULT_VECTOR_BASE,
            memory_base: 0,
            memory_size: 0x1_0000,
        }
    }
}
