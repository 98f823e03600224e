// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{CycleRecord, SimulationObserver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    instruction_count: AtomicU64,
    cycle_count: AtomicU64,
    interrupt_count: AtomicU64,
    sleep_cycle_count: AtomicU64,
    memory_write_count: AtomicU64,
    start_time: Instant,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            instruction_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            interrupt_count: AtomicU64::new(0),
            sleep_cycle_count: AtomicU64::new(0),
            memory_write_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn get_instructions(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_interrupts(&self) -> u64 {
        self.interrupt_count.load(Ordering::SeqCst)
    }

    pub fn get_sleep_cycles(&self) -> u64 {
        self.sleep_cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_memory_writes(&self) -> u64 {
        self.memory_write_count.load(Ordering::SeqCst)
    }

    /// Average clock cycles per decoded instruction.
    pub fn get_cpi(&self) -> f64 {
        let instructions = self.get_instructions();
        if instructions == 0 {
            0.0
        } else {
            self.get_cycles() as f64 / instructions as f64
        }
    }

    /// Simulated cycles per wall-clock second.
    pub fn get_cycle_rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_cycles() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_cycle(&self, record: &CycleRecord) {
        self.cycle_count.fetch_add(1, Ordering::SeqCst);
        if record.is_sleeping() {
            self.sleep_cycle_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_instruction(&self, _pc: u16, _ir: u16) {
        self.instruction_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interrupt(&self, _vector: u8) {
        self.interrupt_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_memory_write(&self, _addr: u16, _value: u16, _byte: bool) {
        self.memory_write_count.fetch_add(1, Ordering::SeqCst);
    }
}
