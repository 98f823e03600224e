// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reference collaborators driven by the control word: register file,
//! address adder and MAR, operand latches with the ALU, and memory with a
//! registered read-data bus.

pub mod alu;
pub mod regfile;

use crate::config::CoreConfig;
use crate::control::{AluInput, ControlFlags, ControlWord};
use crate::decoder::{REG_PC, REG_SR};
use crate::memory::{LinearMemory, ProgramImage};
use crate::SimResult;
use bitflags::bitflags;
pub use regfile::{RegisterFile, REGISTER_NAMES};

bitflags! {
    /// Status register (R2) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u16 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const NEGATIVE = 1 << 2;
        const GIE = 1 << 3;
        const CPUOFF = 1 << 4;
        const OVERFLOW = 1 << 8;
    }
}

/// Memory traffic caused by one executed control word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusActivity {
    pub address: u16,
    pub read: bool,
    pub write: Option<u16>,
    pub byte: bool,
}

impl BusActivity {
    pub fn is_active(&self) -> bool {
        self.read || self.write.is_some()
    }
}

pub struct Datapath {
    pub regs: RegisterFile,
    pub memory: LinearMemory,
    /// Operand latch A (source).
    pub op_a: u16,
    /// Operand latch B (destination).
    pub op_b: u16,
    pub mar: u16,
    /// Registered read-data bus; holds the last word read.
    pub read_data: u16,
    boot_address: u16,
    vector_base: u16,
}

impl Datapath {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            regs: RegisterFile::new(),
            memory: LinearMemory::new(config.memory_size, config.memory_base),
            op_a: 0,
            op_b: 0,
            mar: 0,
            read_data: 0,
            boot_address: config.boot_address,
            vector_base: config.vector_base,
        }
    }

    pub fn boot_address(&self) -> u16 {
        self.boot_address
    }

    /// Address of the handler slot for `vector`.
    pub fn vector_address(&self, vector: u8) -> u16 {
        self.vector_base
            .wrapping_add(2 * (vector & 0x3) as u16)
    }

    pub fn status(&self) -> StatusFlags {
        self.regs.status()
    }

    pub fn load_image(&mut self, image: &ProgramImage) -> usize {
        let mut loaded = 0;
        for segment in &image.segments {
            if self.memory.load_from_segment(segment) {
                loaded += segment.data.len();
            } else {
                tracing::warn!(
                    "Failed to load segment at {:#x} ({} bytes) - outside of memory",
                    segment.start_addr,
                    segment.data.len()
                );
            }
        }
        loaded
    }

    /// Clears registers, latches and the read bus. Memory is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.op_a = 0;
        self.op_b = 0;
        self.mar = 0;
        self.read_data = 0;
    }

    /// Executes one registered control word. All sources are sampled before
    /// any destination is written, so every update lands at the clock edge.
    pub fn execute(&mut self, ctrl: &ControlWord, vector: u8, imm: u16) -> SimResult<BusActivity> {
        let byte = ctrl.has(ControlFlags::BYTE_MODE);
        let status = self.regs.status();

        let rf_out = self.regs.read(ctrl.reg_addr, ctrl.reg_addr_mode);
        let addend = if ctrl.has(ControlFlags::ADDR_INDEX) {
            // Symbolic X(PC) is relative to the extension word, which PC
            // has already stepped past.
            if ctrl.reg_addr == REG_PC {
                self.read_data.wrapping_sub(2)
            } else {
                self.read_data
            }
        } else {
            ctrl.address_offset.value()
        };
        let sum = rf_out.wrapping_add(addend);

        let address = if ctrl.has(ControlFlags::IVEC_OUTPUT) {
            self.vector_address(vector)
        } else if ctrl.has(ControlFlags::ADDR_BYPASS) {
            rf_out
        } else {
            self.mar
        };

        let result = alu::execute(ctrl.alu_opcode, self.op_a, self.op_b, byte, status);
        let operand = match ctrl.alu_input {
            AluInput::Register => rf_out,
            AluInput::Memory => self.read_data,
            AluInput::Immediate => imm,
        };

        let mut bus = BusActivity {
            address,
            byte,
            ..Default::default()
        };

        if ctrl.has(ControlFlags::MEM_READ) {
            self.read_data = if byte {
                self.memory.read_byte(address)? as u16
            } else {
                self.memory.read_word(address)?
            };
            bus.read = true;
        }
        if ctrl.has(ControlFlags::MEM_WRITE) {
            if byte {
                self.memory.write_byte(address, result.value as u8)?;
            } else {
                self.memory.write_word(address, result.value)?;
            }
            bus.write = Some(result.value);
        }

        if ctrl.has(ControlFlags::FLAGS_UPDATE) {
            if let Some(flags) = result.flags {
                let merged = (status - alu::ARITH_FLAGS) | (flags & alu::ARITH_FLAGS);
                self.regs.set_status(merged);
            }
        }
        if ctrl.has(ControlFlags::REG_WRITE) {
            if ctrl.has(ControlFlags::REG_INPUT_ADDR) {
                self.regs.write(ctrl.reg_addr, sum, false);
            } else {
                self.regs.write(ctrl.reg_addr, result.value, byte);
            }
        }
        if ctrl.has(ControlFlags::MAR_WRITE) {
            self.mar = sum;
        }
        if ctrl.has(ControlFlags::ALU_OPA_WRITE) {
            self.op_a = operand;
        }
        if ctrl.has(ControlFlags::ALU_OPB_WRITE) {
            self.op_b = operand;
        }
        if ctrl.has(ControlFlags::BOOT_LOAD) {
            self.regs.write(REG_PC, self.boot_address, false);
        }

        let clear = ctrl.flags & (ControlFlags::SLEEP_DISABLE | ControlFlags::GIE_DISABLE);
        if !clear.is_empty() {
            let mut sr = self.regs.status();
            if clear.contains(ControlFlags::SLEEP_DISABLE) {
                sr.remove(StatusFlags::CPUOFF);
            }
            if clear.contains(ControlFlags::GIE_DISABLE) {
                sr.remove(StatusFlags::GIE);
            }
            self.regs.write(REG_SR, sr.bits(), false);
        }

        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::AddressOffset;
    use crate::decoder::REG_SP;

    fn datapath() -> Datapath {
        Datapath::new(&CoreConfig::default())
    }

    #[test]
    fn test_boot_load() {
        let mut dp = datapath();
        dp.execute(&ControlWord::new(ControlFlags::BOOT_LOAD), 0, 0)
            .unwrap();
        assert_eq!(dp.regs.pc(), 0xF000);
    }

    #[test]
    fn test_fetch_word_reads_and_increments() {
        let mut dp = datapath();
        dp.memory.write_word(0xF000, 0x4303).unwrap();
        dp.regs.set(REG_PC, 0xF000);
        let fetch = ControlWord::new(
            ControlFlags::MEM_READ
                | ControlFlags::ADDR_BYPASS
                | ControlFlags::REG_WRITE
                | ControlFlags::REG_INPUT_ADDR,
        )
        .reg(REG_PC)
        .offset(AddressOffset::PlusTwo);
        let bus = dp.execute(&fetch, 0, 0).unwrap();
        assert!(bus.read);
        assert_eq!(bus.address, 0xF000);
        assert_eq!(dp.read_data, 0x4303);
        assert_eq!(dp.regs.pc(), 0xF002);
    }

    #[test]
    fn test_stack_decrement_latches_mar() {
        let mut dp = datapath();
        dp.regs.set(REG_SP, 0x0400);
        let word = ControlWord::new(
            ControlFlags::REG_WRITE | ControlFlags::REG_INPUT_ADDR | ControlFlags::MAR_WRITE,
        )
        .reg(REG_SP)
        .offset(AddressOffset::MinusTwo);
        dp.execute(&word, 0, 0).unwrap();
        assert_eq!(dp.regs.sp(), 0x03FE);
        assert_eq!(dp.mar, 0x03FE);
    }

    #[test]
    fn test_operand_swap_in_one_cycle() {
        // A <- PC while PC <- MOV(A)
        let mut dp = datapath();
        dp.regs.set(REG_PC, 0xF004);
        dp.op_a = 0xF100;
        let word = ControlWord::new(ControlFlags::REG_WRITE | ControlFlags::ALU_OPA_WRITE)
            .reg(REG_PC)
            .alu(alu::OP_MOV);
        dp.execute(&word, 0, 0).unwrap();
        assert_eq!(dp.regs.pc(), 0xF100);
        assert_eq!(dp.op_a, 0xF004);
    }

    #[test]
    fn test_vector_output_overrides_address() {
        let mut dp = datapath();
        dp.memory.write_word(0xFFFC, 0xF200).unwrap();
        let word = ControlWord::new(ControlFlags::MEM_READ | ControlFlags::IVEC_OUTPUT);
        let bus = dp.execute(&word, 2, 0).unwrap();
        assert_eq!(bus.address, 0xFFFC);
        assert_eq!(dp.read_data, 0xF200);
    }

    #[test]
    fn test_flags_update_and_status_clears() {
        let mut dp = datapath();
        dp.regs
            .set_status(StatusFlags::GIE | StatusFlags::CPUOFF | StatusFlags::CARRY);
        dp.op_a = 1;
        dp.op_b = 0xFFFF;
        let word = ControlWord::new(
            ControlFlags::FLAGS_UPDATE | ControlFlags::SLEEP_DISABLE | ControlFlags::GIE_DISABLE,
        )
        .alu(alu::OP_ADD);
        dp.execute(&word, 0, 0).unwrap();
        assert_eq!(dp.status(), StatusFlags::CARRY | StatusFlags::ZERO);
    }

    #[test]
    fn test_byte_write_to_memory() {
        let mut dp = datapath();
        dp.memory.write_word(0x0200, 0xAAAA).unwrap();
        dp.mar = 0x0201;
        dp.op_a = 0x1234;
        let word = ControlWord::new(ControlFlags::MEM_WRITE | ControlFlags::BYTE_MODE)
            .alu(alu::OP_MOV);
        let bus = dp.execute(&word, 0, 0).unwrap();
        assert_eq!(bus.write, Some(0x0034));
        assert_eq!(dp.memory.read_word(0x0200).unwrap(), 0x34AA);
    }

    #[test]
    fn test_out_of_range_access_is_reported() {
        let mut dp = Datapath::new(&CoreConfig {
            memory_size: 0x100,
            ..CoreConfig::default()
        });
        dp.mar = 0x0400;
        let word = ControlWord::new(ControlFlags::MEM_READ);
        assert!(dp.execute(&word, 0, 0).is_err());
    }
}
