// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub core: CoreSnapshot,
    pub arbiter: ArbiterSnapshot,
    pub datapath: DatapathSnapshot,
    #[serde(default)]
    pub reset_asserted: bool,
    pub total_cycles: u64,
    #[serde(default)]
    pub instructions: u64,
}

/// Registered control-unit state. `ctrl` is the packed control word.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CoreSnapshot {
    pub state: u8,
    pub ctrl: u32,
    pub imm: u16,
    pub ir: u16,
    pub mode: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArbiterSnapshot {
    pub pending: u8,
    pub start: bool,
    pub running: bool,
    pub vector: u8,
    /// Request line levels at snapshot time.
    pub lines: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatapathSnapshot {
    pub registers: Vec<u16>,
    pub op_a: u16,
    pub op_b: u16,
    pub mar: u16,
    pub read_data: u16,
}

impl MachineSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
