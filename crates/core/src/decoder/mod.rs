// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod mode;

pub use mode::{AddressingMode, DstMode, OpClass, SrcMode};

pub const REG_PC: u8 = 0;
pub const REG_SP: u8 = 1;
pub const REG_SR: u8 = 2;
pub const REG_CG: u8 = 3;

/// Two-operand (format I) opcodes, `ir[15:12]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualOp {
    Mov = 0x4,
    Add = 0x5,
    Addc = 0x6,
    Subc = 0x7,
    Sub = 0x8,
    Cmp = 0x9,
    Dadd = 0xA,
    Bit = 0xB,
    Bic = 0xC,
    Bis = 0xD,
    Xor = 0xE,
    And = 0xF,
}

impl DualOp {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0x4 => DualOp::Mov,
            0x5 => DualOp::Add,
            0x6 => DualOp::Addc,
            0x7 => DualOp::Subc,
            0x8 => DualOp::Sub,
            0x9 => DualOp::Cmp,
            0xA => DualOp::Dadd,
            0xB => DualOp::Bit,
            0xC => DualOp::Bic,
            0xD => DualOp::Bis,
            0xE => DualOp::Xor,
            0xF => DualOp::And,
            _ => return None,
        })
    }

    /// CMP and BIT only produce flags.
    pub fn writes_back(self) -> bool {
        !matches!(self, DualOp::Cmp | DualOp::Bit)
    }
}

/// One-operand (format II) opcodes, `ir[9:7]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOp {
    Rrc,
    Swpb,
    Rra,
    Sxt,
    Push,
    Call,
    Reti,
}

impl SingleOp {
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => SingleOp::Rrc,
            1 => SingleOp::Swpb,
            2 => SingleOp::Rra,
            3 => SingleOp::Sxt,
            4 => SingleOp::Push,
            5 => SingleOp::Call,
            6 => SingleOp::Reti,
            _ => return None,
        })
    }

    /// PUSH, CALL and RETI leave the flags alone and finish in a dedicated epilogue.
    pub fn is_special(self) -> bool {
        matches!(self, SingleOp::Push | SingleOp::Call | SingleOp::Reti)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Jump {
        condition: u8,
        offset: i16,
    },
    DualOperand {
        op: DualOp,
        src: u8,
        as_mode: u8,
        ad: bool,
        dst: u8,
        byte: bool,
    },
    SingleOperand {
        op: SingleOp,
        as_mode: u8,
        reg: u8,
        byte: bool,
    },
    Reserved(u16),
}

pub fn decode(ir: u16) -> Instruction {
    let as_mode = ((ir >> 4) & 0x3) as u8;
    let byte = (ir >> 6) & 1 != 0;
    let low_reg = (ir & 0xF) as u8;

    match ir >> 12 {
        0x2 | 0x3 => Instruction::Jump {
            condition: ((ir >> 10) & 0x7) as u8,
            offset: branch_offset(ir) as i16,
        },
        0x1 if (ir >> 10) & 0x3 == 0 => match SingleOp::from_bits(((ir >> 7) & 0x7) as u8) {
            Some(op) => Instruction::SingleOperand {
                op,
                as_mode,
                reg: low_reg,
                byte,
            },
            None => Instruction::Reserved(ir),
        },
        nibble => match DualOp::from_nibble(nibble as u8) {
            Some(op) => Instruction::DualOperand {
                op,
                src: ((ir >> 8) & 0xF) as u8,
                as_mode,
                ad: (ir >> 7) & 1 != 0,
                dst: low_reg,
                byte,
            },
            None => Instruction::Reserved(ir),
        },
    }
}

/// Sign-extended `ir[9:0]`, shifted left by one (word offset to byte offset).
pub fn branch_offset(ir: u16) -> u16 {
    let field = ir & 0x03FF;
    let extended = if field & 0x0200 != 0 {
        field | 0xFC00
    } else {
        field
    };
    extended << 1
}

impl Instruction {
    /// Addressing-mode code latched during decode. Jumps reuse the
    /// register-to-register path; reserved words have no transfer path.
    pub fn addressing_mode(&self) -> Option<AddressingMode> {
        match *self {
            Instruction::Jump { .. } => Some(AddressingMode::REGISTER),
            Instruction::DualOperand {
                src, as_mode, ad, ..
            } => Some(AddressingMode {
                class: OpClass::Dual,
                src: SrcMode::effective(src, as_mode),
                dst: if ad { DstMode::Indexed } else { DstMode::Register },
            }),
            Instruction::SingleOperand { reg, as_mode, .. } => {
                let src = SrcMode::effective(reg, as_mode);
                Some(AddressingMode {
                    class: OpClass::Single,
                    src,
                    dst: if src == SrcMode::Register {
                        DstMode::Register
                    } else {
                        DstMode::Indexed
                    },
                })
            }
            Instruction::Reserved(_) => None,
        }
    }

    /// Register supplying the (first) operand.
    pub fn source_register(&self) -> u8 {
        match *self {
            Instruction::DualOperand { src, .. } => src,
            Instruction::SingleOperand { reg, .. } => reg,
            _ => REG_PC,
        }
    }

    /// Register receiving the result of a register-mode write-back.
    pub fn destination_register(&self) -> u8 {
        match *self {
            Instruction::DualOperand { dst, .. } => dst,
            Instruction::SingleOperand { reg, .. } => reg,
            _ => REG_PC,
        }
    }

    pub fn source_as(&self) -> u8 {
        match *self {
            Instruction::DualOperand { as_mode, .. } | Instruction::SingleOperand { as_mode, .. } => {
                as_mode
            }
            _ => 0,
        }
    }

    pub fn is_byte(&self) -> bool {
        match *self {
            Instruction::DualOperand { byte, .. } => byte,
            Instruction::SingleOperand { op, byte, .. } => {
                byte && !matches!(op, SingleOp::Call | SingleOp::Reti | SingleOp::Swpb | SingleOp::Sxt)
            }
            _ => false,
        }
    }

    /// ALU opcode presented in the control word for the result cycle.
    pub fn alu_opcode(&self) -> u8 {
        match *self {
            Instruction::DualOperand { op, .. } => op as u8,
            Instruction::SingleOperand { op, .. } => match op {
                SingleOp::Rrc => 0,
                SingleOp::Swpb => 1,
                SingleOp::Rra => 2,
                SingleOp::Sxt => 3,
                SingleOp::Push | SingleOp::Call | SingleOp::Reti => DualOp::Mov as u8,
            },
            Instruction::Jump { .. } => DualOp::Add as u8,
            Instruction::Reserved(_) => 0,
        }
    }
}
