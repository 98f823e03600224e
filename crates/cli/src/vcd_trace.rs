// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use sequent_core::{CycleRecord, SimulationObserver};
use std::fs::File;
use std::io::BufWriter;
use std::sync::Mutex;
use vcd::{IdCode, TimescaleUnit, Value, Writer};

/// Per-cycle waveform of the control engine: FSM state, PC, the executed
/// control word, the memory bus and the interrupt handshake.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    signals: Vec<Signal>,
}

struct Signal {
    id: IdCode,
    width: u32,
}

struct VcdState {
    /// Dropped (and thereby flushed) when the run stops.
    writer: Option<Writer<BufWriter<File>>>,
    last: Vec<u64>,
}

// (scope, name, width) in the order `sample` returns values.
const LAYOUT: &[(&str, &str, u32)] = &[
    ("top", "state", 5),
    ("top", "pc", 16),
    ("top", "reset", 1),
    ("ctrl", "flags", 15),
    ("ctrl", "reg_addr", 4),
    ("ctrl", "reg_addr_mode", 2),
    ("ctrl", "alu_opcode", 4),
    ("ctrl", "alu_input", 2),
    ("ctrl", "address_offset", 2),
    ("bus", "addr", 16),
    ("bus", "re", 1),
    ("bus", "we", 1),
    ("bus", "wdata", 16),
    ("bus", "byte", 1),
    ("irq", "pending", 4),
    ("irq", "vector", 2),
    ("irq", "start", 1),
    ("irq", "ack", 1),
    ("irq", "ret", 1),
    ("irq", "running", 1),
];

fn sample(record: &CycleRecord) -> Vec<u64> {
    let ctrl = &record.ctrl;
    vec![
        record.state.code() as u64,
        record.pc as u64,
        record.reset as u64,
        ctrl.flags.bits() as u64,
        ctrl.reg_addr as u64,
        ctrl.reg_addr_mode as u64,
        ctrl.alu_opcode as u64,
        ctrl.alu_input.bits() as u64,
        ctrl.address_offset.bits() as u64,
        record.bus.address as u64,
        record.bus.read as u64,
        record.bus.write.is_some() as u64,
        record.bus.write.unwrap_or(0) as u64,
        record.bus.byte as u64,
        record.irq_pending as u64,
        record.irq_vector as u64,
        record.irq_start as u64,
        record.irq_ack as u64,
        record.irq_ret as u64,
        record.irq_running as u64,
    ]
}

impl VcdObserver {
    pub fn new(path: std::path::PathBuf) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let buf = BufWriter::new(file);
        let mut writer = Writer::new(buf);

        // Header
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("sequent")?;

        let mut signals = Vec::with_capacity(LAYOUT.len());
        let mut scope = "";
        for (module, name, width) in LAYOUT {
            if *module != scope {
                if !scope.is_empty() {
                    writer.upscope()?;
                }
                writer.add_module(module)?;
                scope = *module;
            }
            let id = writer.add_wire(*width, name)?;
            signals.push(Signal { id, width: *width });
        }
        writer.upscope()?; // last scope
        writer.upscope()?; // sequent
        writer.enddefinitions()?;

        Ok(Self {
            state: Mutex::new(VcdState {
                writer: Some(writer),
                last: Vec::new(),
            }),
            signals,
        })
    }
}

// Helper to convert u64 to Vec<Value> (MSB first)
fn u64_to_vec(val: u64, width: u32) -> Vec<Value> {
    let mut bits = Vec::with_capacity(width as usize);
    for i in (0..width).rev() {
        let bit = (val >> i) & 1;
        bits.push(if bit == 1 { Value::V1 } else { Value::V0 });
    }
    bits
}

fn emit(writer: &mut Writer<BufWriter<File>>, signal: &Signal, value: u64) -> std::io::Result<()> {
    if signal.width == 1 {
        let v = if value != 0 { Value::V1 } else { Value::V0 };
        writer.change_scalar(signal.id, v)
    } else {
        writer.change_vector(signal.id, u64_to_vec(value, signal.width))
    }
}

impl core::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VcdObserver")
    }
}

impl SimulationObserver for VcdObserver {
    fn on_cycle(&self, record: &CycleRecord) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let values = sample(record);
        let VcdState { writer, last } = &mut *state;
        let Some(writer) = writer.as_mut() else {
            return;
        };

        if writer.timestamp(record.cycle).is_err() {
            return;
        }
        for (i, (signal, value)) in self.signals.iter().zip(&values).enumerate() {
            if last.get(i) != Some(value) {
                if let Err(e) = emit(writer, signal, *value) {
                    tracing::error!("VCD write failed: {}", e);
                    return;
                }
            }
        }
        *last = values;
    }

    fn on_simulation_stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.writer.take().is_some() {
                tracing::debug!("VCD trace closed");
            }
        }
    }
}
