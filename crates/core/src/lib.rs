// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod condition;
pub mod config;
pub mod control;
pub mod datapath;
pub mod decoder;
pub mod fsm;
pub mod interrupt;
pub mod memory;
pub mod metrics;
pub mod signals;
pub mod snapshot;

use std::collections::HashSet;
use std::sync::Arc;

pub use config::CoreConfig;
pub use control::ControlWord;
pub use fsm::State;

use condition::Condition;
use control::ControlFlags;
use datapath::{BusActivity, Datapath, StatusFlags, REGISTER_NAMES};
use decoder::{Instruction, REG_PC};
use fsm::{ControlUnit, FsmInputs};
use interrupt::{ArbiterInputs, InterruptArbiter};
use signals::{DigitalLevel, RequestLines};


#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Invalid control word {0:#010x}")]
    InvalidControlWord(u32),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// What happened in one clock cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    pub cycle: u64,
    /// State during the cycle.
    pub state: State,
    /// State after the edge.
    pub next_state: State,
    /// Registered control word executed by the datapath in this cycle.
    pub ctrl: ControlWord,
    /// PC after the edge.
    pub pc: u16,
    pub bus: BusActivity,
    pub irq_start: bool,
    pub irq_ack: bool,
    pub irq_ret: bool,
    pub irq_pending: u8,
    pub irq_vector: u8,
    pub irq_running: bool,
    pub reset: bool,
}

impl CycleRecord {
    /// FETCH_0 holding because CPUOFF is set.
    pub fn is_sleeping(&self) -> bool {
        self.state == State::Fetch0 && self.next_state == State::Fetch0 && !self.reset
    }
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_cycle(&self, _record: &CycleRecord) {}
    /// Called once per decoded instruction with its fetch address.
    fn on_instruction(&self, _pc: u16, _ir: u16) {}
    /// Interrupt entry completed for `vector`.
    fn on_interrupt(&self, _vector: u8) {}
    fn on_interrupt_return(&self) {}
    fn on_memory_write(&self, _addr: u16, _value: u16, _byte: bool) {}
}

/// Trait for controlling the machine in debug mode
pub trait DebugControl {
    fn add_breakpoint(&mut self, addr: u16);
    fn remove_breakpoint(&mut self, addr: u16);
    fn clear_breakpoints(&mut self);

    /// Run until breakpoint or cycle limit
    fn run(&mut self, max_cycles: Option<u64>) -> SimResult<StopReason>;

    /// Run to the next instruction boundary
    fn step_instruction(&mut self) -> SimResult<StopReason>;

    fn read_core_reg(&self, id: u8) -> u16;
    fn write_core_reg(&mut self, id: u8, val: u16);

    fn read_memory(&self, addr: u16, len: usize) -> SimResult<Vec<u8>>;
    fn write_memory(&mut self, addr: u16, data: &[u8]) -> SimResult<()>;

    fn get_pc(&self) -> u16;
    fn set_pc(&mut self, addr: u16);
    fn get_register_names(&self) -> Vec<String>;
    fn get_cycle_count(&self) -> u64;
    fn reset(&mut self) -> SimResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u16),
    StepDone,
    MaxCyclesReached,
}

/// Upper bound for `step_instruction`; covers the longest instruction plus
/// an interrupt entry.
pub const STEP_CYCLE_LIMIT: u64 = 64;

/// Control unit, interrupt arbiter and reference datapath clocked together.
pub struct Machine {
    pub control: ControlUnit,
    pub arbiter: InterruptArbiter,
    pub datapath: Datapath,
    pub lines: RequestLines,
    pub observers: Vec<Arc<dyn SimulationObserver>>,

    // Debug state
    pub breakpoints: HashSet<u16>,
    pub total_cycles: u64,
    pub instructions: u64,
    reset_asserted: bool,
    fetch_address: u16,
    config: CoreConfig,
}

impl Machine {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            control: ControlUnit::new(),
            arbiter: InterruptArbiter::new(),
            datapath: Datapath::new(&config),
            lines: RequestLines::new(),
            observers: Vec::new(),
            breakpoints: HashSet::new(),
            total_cycles: 0,
            instructions: 0,
            reset_asserted: false,
            fetch_address: 0,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn load_image(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        let loaded = self.datapath.load_image(image);
        tracing::debug!("Loaded {} of {} image bytes", loaded, image.len());

        for observer in &self.observers {
            observer.on_simulation_start();
        }
        self.reset_core();
        Ok(())
    }

    /// Notifies observers that the run is over.
    pub fn finish(&self) {
        for observer in &self.observers {
            observer.on_simulation_stop();
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> State {
        self.control.state()
    }

    pub fn status(&self) -> StatusFlags {
        self.datapath.status()
    }

    /// Address of the most recently fetched instruction.
    pub fn fetch_address(&self) -> u16 {
        self.fetch_address
    }

    /// True when the next cycle issues an instruction fetch.
    pub fn at_instruction_boundary(&self) -> bool {
        self.control.state() == State::Fetch1
    }

    pub fn reset_asserted(&self) -> bool {
        self.reset_asserted
    }

    /// Drives the reset input. Assertion takes effect immediately and holds
    /// the core in RESET until released.
    pub fn assert_reset(&mut self, asserted: bool) {
        self.reset_asserted = asserted;
        if asserted {
            self.reset_core();
        }
    }

    pub fn set_irq_line(&mut self, line: usize, level: DigitalLevel) {
        self.lines.set(line, level);
    }

    pub fn peek_word(&self, addr: u16) -> SimResult<u16> {
        self.datapath.memory.read_word(addr)
    }

    fn reset_core(&mut self) {
        self.control.reset();
        self.arbiter.reset();
        self.datapath.reset();
    }

    /// Advances one clock cycle.
    pub fn step(&mut self) -> SimResult<CycleRecord> {
        self.total_cycles += 1;

        if self.reset_asserted {
            self.reset_core();
            let record = CycleRecord {
                cycle: self.total_cycles,
                state: State::Reset,
                next_state: State::Reset,
                ctrl: ControlWord::IDLE,
                pc: self.datapath.regs.pc(),
                bus: BusActivity::default(),
                irq_start: false,
                irq_ack: false,
                irq_ret: false,
                irq_pending: 0,
                irq_vector: 0,
                irq_running: false,
                reset: true,
            };
            self.notify_cycle(&record);
            return Ok(record);
        }

        // Sample everything first; nothing below may see a half-updated cycle.
        let status = self.datapath.status();
        let arb = self.arbiter.state();
        let state = self.control.state();
        let ctrl = self.control.ctrl();
        let imm = self.control.imm();

        let next = self.control.transition(&FsmInputs {
            flags: status,
            read_data: self.datapath.read_data,
            irq_start: arb.start,
        });
        let arb_next = self.arbiter.next(&ArbiterInputs {
            lines: self.lines.mask(),
            gie: status.contains(StatusFlags::GIE),
            ack: next.irq_ack,
            ret: next.irq_ret,
        });

        let bus = self.datapath.execute(&ctrl, arb.vector, imm)?;

        self.control.commit(&next);
        self.arbiter.commit(arb_next);

        tracing::trace!(
            "cycle {} {} -> {} ctrl={}",
            self.total_cycles,
            state,
            next.state,
            ctrl
        );

        if state == State::Fetch1 && bus.read {
            self.fetch_address = bus.address;
        }
        if state == State::Decode {
            self.on_decode();
        }
        if let Some(value) = bus.write {
            for observer in &self.observers {
                observer.on_memory_write(bus.address, value, bus.byte);
            }
        }
        if next.irq_ack {
            tracing::debug!(
                "Interrupt entry: vector {} handler {:#06x}",
                arb.vector,
                self.datapath.op_a
            );
            for observer in &self.observers {
                observer.on_interrupt(arb.vector);
            }
        }
        if next.irq_ret {
            tracing::debug!("Return from interrupt to {:#06x}", self.datapath.regs.pc());
            for observer in &self.observers {
                observer.on_interrupt_return();
            }
        }
        if ctrl.has(ControlFlags::BOOT_LOAD) {
            tracing::debug!("Boot: PC <- {:#06x}", self.datapath.boot_address());
        }

        let record = CycleRecord {
            cycle: self.total_cycles,
            state,
            next_state: next.state,
            ctrl,
            pc: self.datapath.regs.pc(),
            bus,
            irq_start: arb.start,
            irq_ack: next.irq_ack,
            irq_ret: next.irq_ret,
            irq_pending: arb.pending,
            irq_vector: arb.vector,
            irq_running: arb.running,
            reset: false,
        };
        self.notify_cycle(&record);
        Ok(record)
    }

    fn on_decode(&mut self) {
        let ir = self.control.ir();
        let pc = self.fetch_address;
        self.instructions += 1;
        match decoder::decode(ir) {
            Instruction::Reserved(word) => {
                tracing::warn!("Reserved opcode {:#06x} at {:#06x}, skipped", word, pc);
            }
            Instruction::Jump { condition, offset } => {
                let mnemonic = Condition::from_code(condition).map_or("j??", Condition::mnemonic);
                tracing::debug!("{:#06x}: {:#06x} {} {:+}", pc, ir, mnemonic, offset);
            }
            instr => {
                tracing::debug!(
                    "{:#06x}: {:#06x} {:?} mode {}",
                    pc,
                    ir,
                    instr,
                    self.control.mode()
                );
            }
        }
        for observer in &self.observers {
            observer.on_instruction(pc, ir);
        }
    }

    fn notify_cycle(&self, record: &CycleRecord) {
        for observer in &self.observers {
            observer.on_cycle(record);
        }
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        let arb = self.arbiter.state();
        snapshot::MachineSnapshot {
            core: snapshot::CoreSnapshot {
                state: self.control.state().code(),
                ctrl: self.control.ctrl().pack(),
                imm: self.control.imm(),
                ir: self.control.ir(),
                mode: self.control.mode().code(),
            },
            arbiter: snapshot::ArbiterSnapshot {
                pending: arb.pending,
                start: arb.start,
                running: arb.running,
                vector: arb.vector,
                lines: self.lines.mask(),
            },
            datapath: snapshot::DatapathSnapshot {
                registers: self.datapath.regs.as_array().to_vec(),
                op_a: self.datapath.op_a,
                op_b: self.datapath.op_b,
                mar: self.datapath.mar,
                read_data: self.datapath.read_data,
            },
            reset_asserted: self.reset_asserted,
            total_cycles: self.total_cycles,
            instructions: self.instructions,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &snapshot::MachineSnapshot) -> SimResult<()> {
        let registers: [u16; 16] = snapshot
            .datapath
            .registers
            .as_slice()
            .try_into()
            .map_err(|_| {
                SimulationError::InvalidSnapshot(format!(
                    "expected 16 registers, got {}",
                    snapshot.datapath.registers.len()
                ))
            })?;
        let ctrl = ControlWord::unpack(snapshot.core.ctrl)?;

        self.control.restore(
            snapshot.core.state,
            ctrl,
            snapshot.core.ir,
            snapshot.core.mode,
            snapshot.core.imm,
        );
        self.arbiter.restore(interrupt::ArbiterState {
            pending: snapshot.arbiter.pending,
            start: snapshot.arbiter.start,
            running: snapshot.arbiter.running,
            vector: snapshot.arbiter.vector,
        });
        for line in 0..signals::IRQ_LINES {
            let level = snapshot.arbiter.lines & (1 << line) != 0;
            self.lines.set(line, level.into());
        }
        self.datapath.regs.load(registers);
        self.datapath.op_a = snapshot.datapath.op_a;
        self.datapath.op_b = snapshot.datapath.op_b;
        self.datapath.mar = snapshot.datapath.mar;
        self.datapath.read_data = snapshot.datapath.read_data;
        self.reset_asserted = snapshot.reset_asserted;
        self.total_cycles = snapshot.total_cycles;
        self.instructions = snapshot.instructions;
        Ok(())
    }
}

impl DebugControl for Machine {
    fn add_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr & !1);
    }

    fn remove_breakpoint(&mut self, addr: u16) {
        self.breakpoints.remove(&(addr & !1));
    }

    fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    fn run(&mut self, max_cycles: Option<u64>) -> SimResult<StopReason> {
        let mut cycles = 0;
        loop {
            self.step()?;
            cycles += 1;

            // Breakpoints match the address of the fetch about to be issued.
            if self.at_instruction_boundary() {
                let pc = self.datapath.regs.pc();
                if self.breakpoints.contains(&pc) {
                    return Ok(StopReason::Breakpoint(pc));
                }
            }

            if let Some(max) = max_cycles {
                if cycles >= max {
                    return Ok(StopReason::MaxCyclesReached);
                }
            }
        }
    }

    fn step_instruction(&mut self) -> SimResult<StopReason> {
        for _ in 0..STEP_CYCLE_LIMIT {
            self.step()?;
            if self.at_instruction_boundary() {
                return Ok(StopReason::StepDone);
            }
        }
        Ok(StopReason::MaxCyclesReached)
    }

    fn read_core_reg(&self, id: u8) -> u16 {
        self.datapath.regs.get(id)
    }

    fn write_core_reg(&mut self, id: u8, val: u16) {
        self.datapath.regs.set(id, val);
    }

    fn read_memory(&self, addr: u16, len: usize) -> SimResult<Vec<u8>> {
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            let a = addr as u64 + i as u64;
            let byte = self
                .datapath
                .memory
                .read_u8(a)
                .ok_or(SimulationError::MemoryViolation(a))?;
            data.push(byte);
        }
        Ok(data)
    }

    fn write_memory(&mut self, addr: u16, data: &[u8]) -> SimResult<()> {
        for (i, byte) in data.iter().enumerate() {
            let a = addr as u64 + i as u64;
            if !self.datapath.memory.write_u8(a, *byte) {
                return Err(SimulationError::MemoryViolation(a));
            }
        }
        Ok(())
    }

    fn get_pc(&self) -> u16 {
        self.datapath.regs.pc()
    }

    fn set_pc(&mut self, addr: u16) {
        self.datapath.regs.set(REG_PC, addr);
    }

    fn get_register_names(&self) -> Vec<String> {
        REGISTER_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn get_cycle_count(&self) -> u64 {
        self.total_cycles
    }

    fn reset(&mut self) -> SimResult<()> {
        self.reset_core();
        Ok(())
    }
}
