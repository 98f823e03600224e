// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{REG_CG, REG_SR};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Format I, two operands.
    Dual,
    /// Format II, one operand.
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrcMode {
    Register,
    Indexed,
    Indirect,
    IndirectIncrement,
}

impl SrcMode {
    pub fn from_as(as_mode: u8) -> Self {
        match as_mode & 0x3 {
            0 => SrcMode::Register,
            1 => SrcMode::Indexed,
            2 => SrcMode::Indirect,
            _ => SrcMode::IndirectIncrement,
        }
    }

    /// Source mode after constant-generator substitution: R3 in any mode and
    /// R2 in the two indirect modes produce constants with register timing.
    pub fn effective(reg: u8, as_mode: u8) -> Self {
        if reg == REG_CG || (reg == REG_SR && as_mode >= 2) {
            SrcMode::Register
        } else {
            SrcMode::from_as(as_mode)
        }
    }

    fn bits(self) -> u8 {
        match self {
            SrcMode::Register => 0,
            SrcMode::Indexed => 1,
            SrcMode::Indirect => 2,
            SrcMode::IndirectIncrement => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DstMode {
    Register,
    /// Indexed destination for format I; any memory operand for format II.
    Indexed,
}

/// Addressing-mode code `{class, src[1:0], dst}` latched during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressingMode {
    pub class: OpClass,
    pub src: SrcMode,
    pub dst: DstMode,
}

impl Default for AddressingMode {
    fn default() -> Self {
        Self::REGISTER
    }
}

impl AddressingMode {
    pub const REGISTER: AddressingMode = AddressingMode {
        class: OpClass::Dual,
        src: SrcMode::Register,
        dst: DstMode::Register,
    };

    /// All codes reachable from a decoded instruction.
    pub const ALL: [AddressingMode; 12] = [
        Self::dual(SrcMode::Register, DstMode::Register),
        Self::dual(SrcMode::Register, DstMode::Indexed),
        Self::dual(SrcMode::Indexed, DstMode::Register),
        Self::dual(SrcMode::Indexed, DstMode::Indexed),
        Self::dual(SrcMode::Indirect, DstMode::Register),
        Self::dual(SrcMode::Indirect, DstMode::Indexed),
        Self::dual(SrcMode::IndirectIncrement, DstMode::Register),
        Self::dual(SrcMode::IndirectIncrement, DstMode::Indexed),
        Self::single(SrcMode::Register),
        Self::single(SrcMode::Indexed),
        Self::single(SrcMode::Indirect),
        Self::single(SrcMode::IndirectIncrement),
    ];

    const fn dual(src: SrcMode, dst: DstMode) -> Self {
        AddressingMode {
            class: OpClass::Dual,
            src,
            dst,
        }
    }

    const fn single(src: SrcMode) -> Self {
        AddressingMode {
            class: OpClass::Single,
            src,
            dst: match src {
                SrcMode::Register => DstMode::Register,
                _ => DstMode::Indexed,
            },
        }
    }

    pub fn code(&self) -> u8 {
        let class = match self.class {
            OpClass::Dual => 0,
            OpClass::Single => 1,
        };
        let dst = match self.dst {
            DstMode::Register => 0,
            DstMode::Indexed => 1,
        };
        (class << 3) | (self.src.bits() << 1) | dst
    }

    /// Inverse of [`AddressingMode::code`]. Codes no decoder can produce
    /// (single-operand with a mismatched destination bit) are rejected.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|am| am.code() == code & 0xF)
    }

    /// True when the result goes to memory at the latched MAR.
    pub fn writes_memory(&self) -> bool {
        self.dst == DstMode::Indexed
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.code())
    }
}
