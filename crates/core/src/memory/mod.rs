// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

/// Raw memory contents to place before reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramImage {
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat binary placed at `load_addr`.
    pub fn from_binary(load_addr: u64, data: Vec<u8>) -> Self {
        let mut image = Self::new();
        image.add_segment(load_addr, data);
        image
    }

    /// Little-endian words placed at `load_addr`.
    pub fn from_words(load_addr: u64, words: &[u16]) -> Self {
        let data = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self::from_binary(load_addr, data)
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    pub fn add_word(&mut self, addr: u64, value: u16) {
        self.add_segment(addr, value.to_le_bytes().to_vec());
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A simple flat memory storage
#[derive(Debug, Clone)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if addr >= self.base_addr && addr < self.base_addr + self.data.len() as u64 {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if addr >= self.base_addr && addr < self.base_addr + self.data.len() as u64 {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    /// Word read; address bit 0 is ignored.
    pub fn read_word(&self, addr: u16) -> SimResult<u16> {
        let aligned = (addr & !1) as u64;
        let lo = self
            .read_u8(aligned)
            .ok_or(SimulationError::MemoryViolation(aligned))?;
        let hi = self
            .read_u8(aligned + 1)
            .ok_or(SimulationError::MemoryViolation(aligned + 1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn write_word(&mut self, addr: u16, value: u16) -> SimResult<()> {
        let aligned = (addr & !1) as u64;
        let [lo, hi] = value.to_le_bytes();
        if !(self.write_u8(aligned, lo) && self.write_u8(aligned + 1, hi)) {
            return Err(SimulationError::MemoryViolation(aligned));
        }
        Ok(())
    }

    pub fn read_byte(&self, addr: u16) -> SimResult<u8> {
        self.read_u8(addr as u64)
            .ok_or(SimulationError::MemoryViolation(addr as u64))
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) -> SimResult<()> {
        if self.write_u8(addr as u64, value) {
            Ok(())
        } else {
            Err(SimulationError::MemoryViolation(addr as u64))
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let Some(end_addr) = segment.start_addr.checked_add(segment.data.len() as u64) else {
            return false;
        };
        let mem_end = self.base_addr + self.data.len() as u64;

        if segment.start_addr >= self.base_addr && end_addr <= mem_end {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}
