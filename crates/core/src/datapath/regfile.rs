// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::StatusFlags;
use crate::decoder::{REG_CG, REG_PC, REG_SP, REG_SR};

pub const REGISTER_NAMES: [&str; 16] = [
    "pc", "sp", "sr", "cg", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

/// Sixteen 16-bit registers with the constant generator folded into reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u16; 16],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register read as seen by the datapath: R3 always, and R2 outside
    /// register mode, produce constants selected by `as_mode`.
    pub fn read(&self, addr: u8, as_mode: u8) -> u16 {
        let addr = addr & 0xF;
        match (addr, as_mode & 0x3) {
            (REG_CG, 0b00) => 0,
            (REG_CG, 0b01) => 1,
            (REG_CG, 0b10) => 2,
            (REG_CG, _) => 0xFFFF,
            (REG_SR, 0b01) => 0,
            (REG_SR, 0b10) => 4,
            (REG_SR, 0b11) => 8,
            _ => self.regs[addr as usize],
        }
    }

    pub fn write(&mut self, addr: u8, value: u16, byte: bool) {
        let addr = addr & 0xF;
        if addr == REG_CG {
            return;
        }
        let mut value = if byte { value & 0x00FF } else { value };
        if addr == REG_PC || addr == REG_SP {
            value &= !1;
        }
        self.regs[addr as usize] = value;
    }

    /// Raw storage, bypassing the constant generator.
    pub fn get(&self, addr: u8) -> u16 {
        self.regs[(addr & 0xF) as usize]
    }

    /// Debug write. Same alignment rules as the datapath write port.
    pub fn set(&mut self, addr: u8, value: u16) {
        self.write(addr, value, false);
    }

    pub fn pc(&self) -> u16 {
        self.regs[REG_PC as usize]
    }

    pub fn sp(&self) -> u16 {
        self.regs[REG_SP as usize]
    }

    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.regs[REG_SR as usize])
    }

    pub fn set_status(&mut self, flags: StatusFlags) {
        self.regs[REG_SR as usize] = flags.bits();
    }

    pub fn as_array(&self) -> [u16; 16] {
        self.regs
    }

    pub fn load(&mut self, regs: [u16; 16]) {
        self.regs = regs;
        self.regs[REG_CG as usize] = 0;
    }

    pub fn reset(&mut self) {
        self.regs = [0; 16];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_generator_reads() {
        let mut rf = RegisterFile::new();
        rf.set_status(StatusFlags::CARRY | StatusFlags::GIE);
        assert_eq!(rf.read(REG_CG, 0), 0);
        assert_eq!(rf.read(REG_CG, 1), 1);
        assert_eq!(rf.read(REG_CG, 2), 2);
        assert_eq!(rf.read(REG_CG, 3), 0xFFFF);
        assert_eq!(rf.read(REG_SR, 0), 0x0009);
        assert_eq!(rf.read(REG_SR, 1), 0);
        assert_eq!(rf.read(REG_SR, 2), 4);
        assert_eq!(rf.read(REG_SR, 3), 8);
    }

    #[test]
    fn test_write_rules() {
        let mut rf = RegisterFile::new();
        rf.write(REG_CG, 0x1234, false);
        assert_eq!(rf.get(REG_CG), 0);

        rf.write(REG_PC, 0xF001, false);
        assert_eq!(rf.pc(), 0xF000);
        rf.write(REG_SP, 0x0401, false);
        assert_eq!(rf.sp(), 0x0400);

        rf.write(5, 0xABCD, false);
        assert_eq!(rf.read(5, 0), 0xABCD);
        rf.write(5, 0xABCD, true);
        assert_eq!(rf.read(5, 0), 0x00CD);
        // Indirect modes read the register itself for general registers
        assert_eq!(rf.read(5, 3), 0x00CD);
    }
}
