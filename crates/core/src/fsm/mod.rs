// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Control FSM. [`transition`] is a pure function of the registered state and
//! the sampled inputs; [`ControlUnit::commit`] applies its result at the
//! clock edge.

pub mod transfer;

use crate::condition::branch_taken;
use crate::control::{AddressOffset, AluInput, ControlFlags, ControlWord};
use crate::datapath::alu::OP_MOV;
use crate::datapath::StatusFlags;
use crate::decoder::{branch_offset, decode, AddressingMode, Instruction, REG_PC, REG_SP, REG_SR};
use std::fmt;
pub use transfer::{Action, Exit, Plan, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum State {
    #[default]
    Reset,
    Fetch0,
    Fetch1,
    Fetch2,
    Decode,
    Trans0,
    Trans1,
    Trans2,
    Trans3,
    Trans4,
    Trans5,
    Trans6,
    Trans7,
    PushCall0,
    PushCall1,
    PushCall2,
    Reti0,
    Reti1,
    Reti2,
    Reti3,
    Reti4,
    Irq0,
    Irq1,
    Irq2,
    Irq3,
    Irq4,
    Irq5,
}

impl State {
    pub const ALL: [State; 27] = [
        State::Reset,
        State::Fetch0,
        State::Fetch1,
        State::Fetch2,
        State::Decode,
        State::Trans0,
        State::Trans1,
        State::Trans2,
        State::Trans3,
        State::Trans4,
        State::Trans5,
        State::Trans6,
        State::Trans7,
        State::PushCall0,
        State::PushCall1,
        State::PushCall2,
        State::Reti0,
        State::Reti1,
        State::Reti2,
        State::Reti3,
        State::Reti4,
        State::Irq0,
        State::Irq1,
        State::Irq2,
        State::Irq3,
        State::Irq4,
        State::Irq5,
    ];

    pub const TRANS: [State; 8] = [
        State::Trans0,
        State::Trans1,
        State::Trans2,
        State::Trans3,
        State::Trans4,
        State::Trans5,
        State::Trans6,
        State::Trans7,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn trans(index: usize) -> Option<Self> {
        Self::TRANS.get(index).copied()
    }

    fn trans_index(self) -> Option<usize> {
        Self::TRANS.iter().position(|s| *s == self)
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Reset => "RESET",
            State::Fetch0 => "FETCH_0",
            State::Fetch1 => "FETCH_1",
            State::Fetch2 => "FETCH_2",
            State::Decode => "DECODE",
            State::Trans0 => "TRANS_0",
            State::Trans1 => "TRANS_1",
            State::Trans2 => "TRANS_2",
            State::Trans3 => "TRANS_3",
            State::Trans4 => "TRANS_4",
            State::Trans5 => "TRANS_5",
            State::Trans6 => "TRANS_6",
            State::Trans7 => "TRANS_7",
            State::PushCall0 => "PUSHCALL_0",
            State::PushCall1 => "PUSHCALL_1",
            State::PushCall2 => "PUSHCALL_2",
            State::Reti0 => "RETI_0",
            State::Reti1 => "RETI_1",
            State::Reti2 => "RETI_2",
            State::Reti3 => "RETI_3",
            State::Reti4 => "RETI_4",
            State::Irq0 => "IRQ_0",
            State::Irq1 => "IRQ_1",
            State::Irq2 => "IRQ_2",
            State::Irq3 => "IRQ_3",
            State::Irq4 => "IRQ_4",
            State::Irq5 => "IRQ_5",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signals sampled by the control unit in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsmInputs {
    pub flags: StatusFlags,
    /// Registered memory read-data bus.
    pub read_data: u16,
    pub irq_start: bool,
}

/// Everything the control unit drives for one cycle: the registered
/// values it will hold after the edge plus the handshake pulses of the
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: State,
    pub ctrl: ControlWord,
    pub imm: u16,
    pub ir: u16,
    pub mode: AddressingMode,
    pub irq_ack: bool,
    pub irq_ret: bool,
}

/// Registered state of the control unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlUnit {
    state: State,
    ctrl: ControlWord,
    imm: u16,
    ir: u16,
    mode: AddressingMode,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Registered control word; this is what the datapath executes.
    pub fn ctrl(&self) -> ControlWord {
        self.ctrl
    }

    pub fn imm(&self) -> u16 {
        self.imm
    }

    pub fn ir(&self) -> u16 {
        self.ir
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn transition(&self, inputs: &FsmInputs) -> Transition {
        transition(self.state, self.ir, self.mode, inputs)
    }

    pub fn commit(&mut self, next: &Transition) {
        self.state = next.state;
        self.ctrl = next.ctrl;
        self.imm = next.imm;
        self.ir = next.ir;
        self.mode = next.mode;
    }

    /// Asynchronous reset: RESET state, idle control word.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rebuilds registered state from raw values. Unknown state codes snap
    /// to RESET; an unused addressing-mode code falls back to register mode.
    pub fn restore(&mut self, state_code: u8, ctrl: ControlWord, ir: u16, mode_code: u8, imm: u16) {
        self.state = State::from_code(state_code).unwrap_or_else(|| {
            tracing::warn!("Unknown FSM state code {}, forcing RESET", state_code);
            State::Reset
        });
        self.ctrl = ctrl;
        self.imm = imm;
        self.ir = ir;
        self.mode = AddressingMode::from_code(mode_code).unwrap_or_default();
    }
}

/// The transition table: `(state, ir, mode, inputs) -> next registered values`.
pub fn transition(state: State, ir: u16, mode: AddressingMode, inputs: &FsmInputs) -> Transition {
    let mut next = Transition {
        state: State::Reset,
        ctrl: ControlWord::IDLE,
        imm: branch_offset(ir),
        ir,
        mode,
        irq_ack: state == State::Irq5,
        irq_ret: state == State::Reti4,
    };

    match state {
        State::Reset => {
            next.ctrl = ControlWord::new(ControlFlags::BOOT_LOAD);
            next.state = State::Fetch0;
        }
        State::Fetch0 => {
            let pc_out = ControlWord::new(ControlFlags::ADDR_BYPASS)
                .reg(REG_PC)
                .offset(AddressOffset::PlusTwo);
            if inputs.irq_start {
                next.ctrl = ControlWord::IDLE;
                next.state = State::Irq0;
            } else if !inputs.flags.contains(StatusFlags::CPUOFF) {
                next.ctrl = pc_out.with(
                    ControlFlags::MEM_READ | ControlFlags::REG_WRITE | ControlFlags::REG_INPUT_ADDR,
                );
                next.state = State::Fetch1;
            } else {
                next.ctrl = pc_out;
                next.state = State::Fetch0;
            }
        }
        State::Fetch1 => next.state = State::Fetch2,
        State::Fetch2 => {
            next.ir = inputs.read_data;
            next.imm = branch_offset(inputs.read_data);
            next.state = State::Decode;
        }
        State::Decode => {
            let instr = decode(ir);
            next.mode = instr.addressing_mode().unwrap_or_default();
            let taken = match instr {
                Instruction::Jump { condition, .. } => branch_taken(condition, inputs.flags),
                _ => false,
            };
            let plan = Plan::new(&instr, next.mode, taken);
            sequence(&mut next, &plan, &instr, 0);
        }
        State::Trans0
        | State::Trans1
        | State::Trans2
        | State::Trans3
        | State::Trans4
        | State::Trans5
        | State::Trans6
        | State::Trans7 => {
            let instr = decode(ir);
            // Only taken jumps reach TRANS.
            let plan = Plan::new(&instr, mode, true);
            let index = state.trans_index().map_or(usize::MAX, |k| k + 1);
            sequence(&mut next, &plan, &instr, index);
        }
        State::PushCall0 => {
            next.ctrl = transfer::push_call_word(0, &decode(ir));
            next.state = State::PushCall1;
        }
        State::PushCall1 => {
            next.ctrl = transfer::push_call_word(1, &decode(ir));
            next.state = State::PushCall2;
        }
        State::PushCall2 => {
            next.ctrl = transfer::push_call_word(2, &decode(ir));
            next.state = State::Fetch0;
        }
        State::Reti0 => {
            next.ctrl = pop_word();
            next.state = State::Reti1;
        }
        State::Reti1 => {
            next.ctrl = pop_word()
                .with(ControlFlags::ALU_OPA_WRITE)
                .input(AluInput::Memory);
            next.state = State::Reti2;
        }
        State::Reti2 => {
            // SR <- A while A <- saved PC
            next.ctrl = ControlWord::new(ControlFlags::REG_WRITE | ControlFlags::ALU_OPA_WRITE)
                .reg(REG_SR)
                .alu(OP_MOV)
                .input(AluInput::Memory);
            next.state = State::Reti3;
        }
        State::Reti3 => {
            next.ctrl = ControlWord::new(ControlFlags::REG_WRITE)
                .reg(REG_PC)
                .alu(OP_MOV);
            next.state = State::Reti4;
        }
        State::Reti4 => next.state = State::Fetch0,
        State::Irq0 => {
            next.ctrl = ControlWord::new(ControlFlags::ALU_OPA_WRITE | ControlFlags::SLEEP_DISABLE)
                .reg(REG_PC);
            next.state = State::Irq1;
        }
        State::Irq1 => {
            next.ctrl = push_slot_word();
            next.state = State::Irq2;
        }
        State::Irq2 => {
            // [MAR] <- PC while A <- SR
            next.ctrl = ControlWord::new(ControlFlags::MEM_WRITE | ControlFlags::ALU_OPA_WRITE)
                .reg(REG_SR)
                .alu(OP_MOV);
            next.state = State::Irq3;
        }
        State::Irq3 => {
            next.ctrl = push_slot_word().with(ControlFlags::MEM_READ | ControlFlags::IVEC_OUTPUT);
            next.state = State::Irq4;
        }
        State::Irq4 => {
            // [MAR] <- SR while A <- handler address
            next.ctrl = ControlWord::new(
                ControlFlags::MEM_WRITE | ControlFlags::ALU_OPA_WRITE | ControlFlags::GIE_DISABLE,
            )
            .alu(OP_MOV)
            .input(AluInput::Memory);
            next.state = State::Irq5;
        }
        State::Irq5 => {
            next.ctrl = ControlWord::new(ControlFlags::REG_WRITE)
                .reg(REG_PC)
                .alu(OP_MOV);
            next.state = State::Fetch0;
        }
    }

    next
}

/// Issues action `index` of `plan` and picks the following state.
fn sequence(next: &mut Transition, plan: &Plan, instr: &Instruction, index: usize) {
    let Some(action) = plan.action(index) else {
        next.state = State::Reset;
        next.ctrl = ControlWord::IDLE;
        return;
    };
    next.ctrl = transfer::action_word(action, instr, next.mode);
    next.state = if plan.action(index + 1).is_some() {
        State::trans(index).unwrap_or(State::Reset)
    } else {
        match plan.exit {
            Exit::Fetch => State::Fetch0,
            Exit::PushCall => State::PushCall0,
            Exit::Reti => State::Reti0,
        }
    };
}

/// read [SP], SP += 2
fn pop_word() -> ControlWord {
    ControlWord::new(
        ControlFlags::MEM_READ
            | ControlFlags::ADDR_BYPASS
            | ControlFlags::REG_WRITE
            | ControlFlags::REG_INPUT_ADDR,
    )
    .reg(REG_SP)
    .offset(AddressOffset::PlusTwo)
}

/// SP -= 2, MAR <- SP - 2
fn push_slot_word() -> ControlWord {
    ControlWord::new(
        ControlFlags::REG_WRITE | ControlFlags::REG_INPUT_ADDR | ControlFlags::MAR_WRITE,
    )
    .reg(REG_SP)
    .offset(AddressOffset::MinusTwo)
}
