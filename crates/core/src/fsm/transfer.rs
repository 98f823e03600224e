// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Operand-transfer table and the control words of each transfer step.
//!
//! An instruction runs as a flat list of actions. DECODE issues action 0
//! and TRANS_k issues action k+1; whichever state issues the last action
//! hands over to the instruction's exit state.

use crate::control::{AddressOffset, AluInput, ControlFlags, ControlWord};
use crate::datapath::alu::{OP_ADD, OP_MOV};
use crate::decoder::{
    AddressingMode, DstMode, DualOp, Instruction, OpClass, SingleOp, SrcMode, REG_PC, REG_SP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A <- Rs
    LoadSrcReg,
    /// B <- Rd
    LoadDstReg,
    /// read [PC], PC += 2
    FetchExt,
    /// MAR <- Rs + extension word
    IndexSrc,
    /// MAR <- Rd + extension word
    IndexDst,
    /// read [MAR]
    ReadMar,
    /// read [Rs], MAR <- Rs
    ReadIndirect,
    /// A <- mem
    LatchSrc,
    /// A <- mem, Rs += 1 or 2
    LatchSrcInc,
    /// A <- mem while reading the next extension word
    LatchSrcFetchExt,
    /// B <- mem
    LatchDst,
    /// A <- branch offset
    LoadImm,
    /// B <- PC
    LoadPc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Transfer(Step),
    Idle,
    WriteBack { flags: bool },
    BranchWrite,
}

/// State entered after the last action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Fetch,
    PushCall,
    Reti,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Single idle word (not-taken jump, reserved opcode).
    Skip,
    WriteBack,
    /// DADD: one idle cycle, then a write-back without flags.
    DecimalWriteBack,
    /// PUSH/CALL/RETI: idle word, then the dedicated epilogue.
    Handoff,
    Branch,
}

impl Tail {
    fn len(self) -> usize {
        match self {
            Tail::DecimalWriteBack => 2,
            _ => 1,
        }
    }

    fn action(self, index: usize) -> Option<Action> {
        match (self, index) {
            (Tail::Skip, 0) | (Tail::Handoff, 0) | (Tail::DecimalWriteBack, 0) => Some(Action::Idle),
            (Tail::WriteBack, 0) => Some(Action::WriteBack { flags: true }),
            (Tail::DecimalWriteBack, 1) => Some(Action::WriteBack { flags: false }),
            (Tail::Branch, 0) => Some(Action::BranchWrite),
            _ => None,
        }
    }
}

/// Source/destination transfer steps for an addressing-mode code.
pub fn transfer_steps(mode: AddressingMode) -> &'static [Step] {
    use Step::*;
    match (mode.class, mode.src, mode.dst) {
        (OpClass::Dual, SrcMode::Register, DstMode::Register) => &[LoadSrcReg, LoadDstReg],
        (OpClass::Dual, SrcMode::Register, DstMode::Indexed) => {
            &[LoadSrcReg, FetchExt, IndexDst, ReadMar, LatchDst]
        }
        (OpClass::Dual, SrcMode::Indexed, DstMode::Register) => {
            &[FetchExt, IndexSrc, ReadMar, LatchSrc, LoadDstReg]
        }
        (OpClass::Dual, SrcMode::Indexed, DstMode::Indexed) => &[
            FetchExt,
            IndexSrc,
            ReadMar,
            LatchSrcFetchExt,
            IndexDst,
            ReadMar,
            LatchDst,
        ],
        (OpClass::Dual, SrcMode::Indirect, DstMode::Register) => {
            &[ReadIndirect, LatchSrc, LoadDstReg]
        }
        (OpClass::Dual, SrcMode::Indirect, DstMode::Indexed) => {
            &[ReadIndirect, LatchSrcFetchExt, IndexDst, ReadMar, LatchDst]
        }
        (OpClass::Dual, SrcMode::IndirectIncrement, DstMode::Register) => {
            &[ReadIndirect, LatchSrcInc, LoadDstReg]
        }
        (OpClass::Dual, SrcMode::IndirectIncrement, DstMode::Indexed) => &[
            ReadIndirect,
            LatchSrcInc,
            FetchExt,
            IndexDst,
            ReadMar,
            LatchDst,
        ],
        (OpClass::Single, SrcMode::Register, _) => &[LoadSrcReg],
        (OpClass::Single, SrcMode::Indexed, _) => &[FetchExt, IndexSrc, ReadMar, LatchSrc],
        (OpClass::Single, SrcMode::Indirect, _) => &[ReadIndirect, LatchSrc],
        (OpClass::Single, SrcMode::IndirectIncrement, _) => &[ReadIndirect, LatchSrcInc],
    }
}

/// Action list of one instruction, fixed at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    steps: &'static [Step],
    tail: Tail,
    pub exit: Exit,
}

impl Plan {
    /// `taken` is the branch decision; it only matters for jumps.
    pub fn new(instr: &Instruction, mode: AddressingMode, taken: bool) -> Self {
        const BRANCH: &[Step] = &[Step::LoadImm, Step::LoadPc];
        let (steps, tail, exit) = match *instr {
            Instruction::Jump { .. } if taken => (BRANCH, Tail::Branch, Exit::Fetch),
            Instruction::Jump { .. } | Instruction::Reserved(_) => (&[][..], Tail::Skip, Exit::Fetch),
            Instruction::SingleOperand { op, .. } if op.is_special() => {
                let exit = if op == SingleOp::Reti {
                    Exit::Reti
                } else {
                    Exit::PushCall
                };
                (transfer_steps(mode), Tail::Handoff, exit)
            }
            Instruction::DualOperand {
                op: DualOp::Dadd, ..
            } => (transfer_steps(mode), Tail::DecimalWriteBack, Exit::Fetch),
            _ => (transfer_steps(mode), Tail::WriteBack, Exit::Fetch),
        };
        Self { steps, tail, exit }
    }

    pub fn len(&self) -> usize {
        self.steps.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn action(&self, index: usize) -> Option<Action> {
        match self.steps.get(index) {
            Some(step) => Some(Action::Transfer(*step)),
            None => self.tail.action(index - self.steps.len()),
        }
    }

    /// Number of TRANS states the plan occupies.
    pub fn trans_cycles(&self) -> usize {
        self.len() - 1
    }
}

fn fetch_ext() -> ControlWord {
    ControlWord::new(
        ControlFlags::MEM_READ
            | ControlFlags::ADDR_BYPASS
            | ControlFlags::REG_WRITE
            | ControlFlags::REG_INPUT_ADDR,
    )
    .reg(REG_PC)
    .offset(AddressOffset::PlusTwo)
}

/// Control word for one action of `instr`.
pub fn action_word(action: Action, instr: &Instruction, mode: AddressingMode) -> ControlWord {
    let rs = instr.source_register();
    let rd = instr.destination_register();
    let byte = instr.is_byte();

    match action {
        Action::Idle => ControlWord::IDLE,
        Action::Transfer(step) => step_word(step, rs, rd, instr.source_as(), byte),
        Action::WriteBack { flags } => {
            let writes = match *instr {
                Instruction::DualOperand { op, .. } => op.writes_back(),
                _ => true,
            };
            let word = ControlWord::IDLE
                .alu(instr.alu_opcode())
                .with_if(byte, ControlFlags::BYTE_MODE)
                .with_if(flags, ControlFlags::FLAGS_UPDATE);
            if !writes {
                word
            } else if mode.writes_memory() {
                word.with(ControlFlags::MEM_WRITE)
            } else {
                word.reg(rd).with(ControlFlags::REG_WRITE)
            }
        }
        Action::BranchWrite => ControlWord::new(ControlFlags::REG_WRITE)
            .reg(REG_PC)
            .alu(OP_ADD),
    }
}

fn step_word(step: Step, rs: u8, rd: u8, as_mode: u8, byte: bool) -> ControlWord {
    match step {
        Step::LoadSrcReg => ControlWord::new(ControlFlags::ALU_OPA_WRITE)
            .reg(rs)
            .mode(as_mode),
        Step::LoadDstReg => ControlWord::new(ControlFlags::ALU_OPB_WRITE).reg(rd),
        Step::FetchExt => fetch_ext(),
        Step::IndexSrc => ControlWord::new(ControlFlags::MAR_WRITE | ControlFlags::ADDR_INDEX)
            .reg(rs)
            .mode(0b01),
        Step::IndexDst => ControlWord::new(ControlFlags::MAR_WRITE | ControlFlags::ADDR_INDEX)
            .reg(rd)
            .mode(0b01),
        Step::ReadMar => {
            ControlWord::new(ControlFlags::MEM_READ).with_if(byte, ControlFlags::BYTE_MODE)
        }
        Step::ReadIndirect => ControlWord::new(
            ControlFlags::MEM_READ | ControlFlags::ADDR_BYPASS | ControlFlags::MAR_WRITE,
        )
        .reg(rs)
        .with_if(byte, ControlFlags::BYTE_MODE),
        Step::LatchSrc => ControlWord::new(ControlFlags::ALU_OPA_WRITE).input(AluInput::Memory),
        Step::LatchSrcInc => {
            let step = if byte && rs != REG_PC && rs != REG_SP {
                AddressOffset::PlusOne
            } else {
                AddressOffset::PlusTwo
            };
            ControlWord::new(
                ControlFlags::ALU_OPA_WRITE | ControlFlags::REG_WRITE | ControlFlags::REG_INPUT_ADDR,
            )
            .reg(rs)
            .input(AluInput::Memory)
            .offset(step)
        }
        Step::LatchSrcFetchExt => fetch_ext()
            .with(ControlFlags::ALU_OPA_WRITE)
            .input(AluInput::Memory),
        Step::LatchDst => ControlWord::new(ControlFlags::ALU_OPB_WRITE).input(AluInput::Memory),
        Step::LoadImm => ControlWord::new(ControlFlags::ALU_OPA_WRITE).input(AluInput::Immediate),
        Step::LoadPc => ControlWord::new(ControlFlags::ALU_OPB_WRITE).reg(REG_PC),
    }
}

/// PUSHCALL_k control word.
pub fn push_call_word(index: usize, instr: &Instruction) -> ControlWord {
    match index {
        0 => ControlWord::new(ControlFlags::REG_WRITE | ControlFlags::REG_INPUT_ADDR)
            .reg(REG_SP)
            .offset(AddressOffset::MinusTwo),
        1 if matches!(
            instr,
            Instruction::SingleOperand {
                op: SingleOp::Call,
                ..
            }
        ) =>
        {
            // Return address into A, call target into PC, same edge.
            ControlWord::new(ControlFlags::ALU_OPA_WRITE | ControlFlags::REG_WRITE)
                .reg(REG_PC)
                .alu(OP_MOV)
        }
        1 => ControlWord::IDLE,
        _ => ControlWord::new(ControlFlags::MEM_WRITE | ControlFlags::ADDR_BYPASS)
            .reg(REG_SP)
            .alu(OP_MOV)
            .with_if(instr.is_byte(), ControlFlags::BYTE_MODE),
    }
}
