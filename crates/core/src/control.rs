// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Single-bit enables of the control word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlFlags: u32 {
        const MEM_READ = 1 << 0;
        const MEM_WRITE = 1 << 1;
        const REG_WRITE = 1 << 2;
        /// Register write data comes from the address adder instead of the ALU.
        const REG_INPUT_ADDR = 1 << 3;
        const ALU_OPA_WRITE = 1 << 4;
        const ALU_OPB_WRITE = 1 << 5;
        /// Adder addend is the memory read bus instead of the constant offset.
        const ADDR_INDEX = 1 << 6;
        const MAR_WRITE = 1 << 7;
        const BYTE_MODE = 1 << 8;
        const FLAGS_UPDATE = 1 << 9;
        const BOOT_LOAD = 1 << 10;
        const SLEEP_DISABLE = 1 << 11;
        const GIE_DISABLE = 1 << 12;
        /// Memory address taken straight from the register file output.
        const ADDR_BYPASS = 1 << 13;
        const IVEC_OUTPUT = 1 << 14;
    }
}

/// Source of the value loaded into the ALU operand latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AluInput {
    #[default]
    Register,
    Memory,
    Immediate,
}

impl AluInput {
    pub fn bits(self) -> u32 {
        match self {
            AluInput::Register => 0,
            AluInput::Memory => 1,
            AluInput::Immediate => 2,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(AluInput::Register),
            1 => Some(AluInput::Memory),
            2 => Some(AluInput::Immediate),
            _ => None,
        }
    }
}

/// Constant fed to the address adder when `ADDR_INDEX` is clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressOffset {
    #[default]
    Zero,
    PlusOne,
    PlusTwo,
    MinusTwo,
}

impl AddressOffset {
    pub fn bits(self) -> u32 {
        match self {
            AddressOffset::Zero => 0b00,
            AddressOffset::PlusOne => 0b01,
            AddressOffset::PlusTwo => 0b10,
            AddressOffset::MinusTwo => 0b11,
        }
    }

    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0b00 => AddressOffset::Zero,
            0b01 => AddressOffset::PlusOne,
            0b10 => AddressOffset::PlusTwo,
            _ => AddressOffset::MinusTwo,
        }
    }

    /// Two's-complement addend.
    pub fn value(self) -> u16 {
        match self {
            AddressOffset::Zero => 0,
            AddressOffset::PlusOne => 1,
            AddressOffset::PlusTwo => 2,
            AddressOffset::MinusTwo => 0xFFFE,
        }
    }
}

const REG_ADDR_SHIFT: u32 = 16;
const REG_MODE_SHIFT: u32 = 20;
const ALU_OP_SHIFT: u32 = 22;
const ALU_INPUT_SHIFT: u32 = 26;
const OFFSET_SHIFT: u32 = 28;
const FLAGS_MASK: u32 = 0x7FFF;

/// One cycle's worth of datapath commands. The all-zero word is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControlWord {
    pub flags: ControlFlags,
    pub reg_addr: u8,
    pub reg_addr_mode: u8,
    pub alu_opcode: u8,
    pub alu_input: AluInput,
    pub address_offset: AddressOffset,
}

impl ControlWord {
    pub const IDLE: ControlWord = ControlWord {
        flags: ControlFlags::empty(),
        reg_addr: 0,
        reg_addr_mode: 0,
        alu_opcode: 0,
        alu_input: AluInput::Register,
        address_offset: AddressOffset::Zero,
    };

    pub fn new(flags: ControlFlags) -> Self {
        Self {
            flags,
            ..Self::IDLE
        }
    }

    pub fn reg(mut self, addr: u8) -> Self {
        self.reg_addr = addr & 0xF;
        self
    }

    pub fn mode(mut self, as_mode: u8) -> Self {
        self.reg_addr_mode = as_mode & 0x3;
        self
    }

    pub fn alu(mut self, opcode: u8) -> Self {
        self.alu_opcode = opcode & 0xF;
        self
    }

    pub fn input(mut self, input: AluInput) -> Self {
        self.alu_input = input;
        self
    }

    pub fn offset(mut self, offset: AddressOffset) -> Self {
        self.address_offset = offset;
        self
    }

    pub fn with(mut self, flags: ControlFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Adds `flags` only when `cond` holds.
    pub fn with_if(mut self, cond: bool, flags: ControlFlags) -> Self {
        if cond {
            self.flags |= flags;
        }
        self
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::IDLE
    }

    pub fn has(&self, flags: ControlFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn pack(&self) -> u32 {
        self.flags.bits()
            | (self.reg_addr as u32 & 0xF) << REG_ADDR_SHIFT
            | (self.reg_addr_mode as u32 & 0x3) << REG_MODE_SHIFT
            | (self.alu_opcode as u32 & 0xF) << ALU_OP_SHIFT
            | self.alu_input.bits() << ALU_INPUT_SHIFT
            | self.address_offset.bits() << OFFSET_SHIFT
    }

    pub fn unpack(bits: u32) -> SimResult<Self> {
        let alu_input = AluInput::from_bits((bits >> ALU_INPUT_SHIFT) & 0x3)
            .ok_or(SimulationError::InvalidControlWord(bits))?;
        Ok(Self {
            flags: ControlFlags::from_bits_truncate(bits & FLAGS_MASK),
            reg_addr: ((bits >> REG_ADDR_SHIFT) & 0xF) as u8,
            reg_addr_mode: ((bits >> REG_MODE_SHIFT) & 0x3) as u8,
            alu_opcode: ((bits >> ALU_OP_SHIFT) & 0xF) as u8,
            alu_input,
            address_offset: AddressOffset::from_bits(bits >> OFFSET_SHIFT),
        })
    }
}

impl fmt::Display for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            return write!(f, "idle");
        }
        write!(
            f,
            "r{} as={} alu={:X} in={:?} off={:?} [{:?}]",
            self.reg_addr,
            self.reg_addr_mode,
            self.alu_opcode,
            self.alu_input,
            self.address_offset,
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let word = ControlWord::new(ControlFlags::MEM_READ | ControlFlags::ADDR_BYPASS)
            .reg(0xF)
            .mode(0b11)
            .alu(0xA)
            .input(AluInput::Immediate)
            .offset(AddressOffset::MinusTwo);
        let bits = word.pack();
        assert_eq!(bits & 0x7FFF, 0x2001);
        assert_eq!((bits >> 16) & 0xF, 0xF);
        assert_eq!((bits >> 20) & 0x3, 0b11);
        assert_eq!((bits >> 22) & 0xF, 0xA);
        assert_eq!((bits >> 26) & 0x3, 0b10);
        assert_eq!((bits >> 28) & 0x3, 0b11);
        assert_eq!(ControlWord::unpack(bits).unwrap(), word);
    }

    #[test]
    fn test_idle_word_packs_to_zero() {
        assert_eq!(ControlWord::IDLE.pack(), 0);
        assert!(ControlWord::unpack(0).unwrap().is_idle());
        assert_eq!(ControlWord::IDLE.to_string(), "idle");
    }

    #[test]
    fn test_unpack_rejects_reserved_alu_input() {
        let bits = 0b11 << 26;
        assert!(matches!(
            ControlWord::unpack(bits),
            Err(SimulationError::InvalidControlWord(b)) if b == bits
        ));
    }

    #[test]
    fn test_offset_values() {
        assert_eq!(AddressOffset::MinusTwo.value(), 0xFFFE);
        assert_eq!(0x0200u16.wrapping_add(AddressOffset::MinusTwo.value()), 0x01FE);
        assert_eq!(AddressOffset::from_bits(0b01), AddressOffset::PlusOne);
    }

    #[test]
    fn test_with_if() {
        let w = ControlWord::IDLE
            .with_if(true, ControlFlags::BYTE_MODE)
            .with_if(false, ControlFlags::FLAGS_UPDATE);
        assert!(w.has(ControlFlags::BYTE_MODE));
        assert!(!w.has(ControlFlags::FLAGS_UPDATE));
    }
}
