// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Address space reachable by the 16-bit core.
pub const ADDRESS_SPACE: u64 = 0x1_0000;
pub const IRQ_LINES: u8 = 4;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_memory() -> MemoryRange {
    MemoryRange {
        base: 0,
        size: "64KiB".to_string(),
    }
}

fn default_boot_address() -> u16 {
    0xF000
}

fn default_vector_base() -> u16 {
    0xFFF8
}

fn default_load_address() -> u64 {
    0xF000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64KiB"
}

/// Drives one request line high at `assert_at` and, optionally, low again
/// at `release_at` (both in cycles since reset release).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IrqStimulus {
    pub line: u8,
    pub assert_at: u64,
    #[serde(default)]
    pub release_at: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default = "default_memory")]
    pub memory: MemoryRange,
    #[serde(default = "default_boot_address")]
    pub boot_address: u16,
    #[serde(default = "default_vector_base")]
    pub vector_base: u16,
    /// Where a flat binary image is placed.
    #[serde(default = "default_load_address")]
    pub load_address: u64,
    #[serde(default)]
    pub irq_stimuli: Vec<IrqStimulus>,
}

impl Default for SystemManifest {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "default".to_string(),
            memory: default_memory(),
            boot_address: default_boot_address(),
            vector_base: default_vector_base(),
            load_address: default_load_address(),
            irq_stimuli: Vec::new(),
        }
    }
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open system manifest at {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse System Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml).context("Failed to parse System Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Memory size in bytes.
    pub fn memory_size(&self) -> Result<u64> {
        parse_size(&self.memory.size)
            .with_context(|| format!("Invalid memory size '{}'", self.memory.size))
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        let size = self.memory_size()?;
        if size == 0 {
            anyhow::bail!("Memory size must be greater than zero");
        }
        let end = self
            .memory
            .base
            .checked_add(size)
            .filter(|end| *end <= ADDRESS_SPACE);
        if end.is_none() {
            anyhow::bail!(
                "Memory {:#x}+{:#x} exceeds the 16-bit address space",
                self.memory.base,
                size
            );
        }
        if self.load_address >= ADDRESS_SPACE {
            anyhow::bail!(
                "load_address {:#x} is outside the 16-bit address space",
                self.load_address
            );
        }
        if self.boot_address & 1 != 0 {
            anyhow::bail!("boot_address {:#06x} must be word aligned", self.boot_address);
        }
        if self.vector_base & 1 != 0 || self.vector_base > 0xFFF8 {
            anyhow::bail!(
                "vector_base {:#06x} must be word aligned with room for {} vectors",
                self.vector_base,
                IRQ_LINES
            );
        }

        for stimulus in &self.irq_stimuli {
            if stimulus.line >= IRQ_LINES {
                anyhow::bail!(
                    "Interrupt line {} out of range (0..{})",
                    stimulus.line,
                    IRQ_LINES
                );
            }
            if let Some(release) = stimulus.release_at {
                if release <= stimulus.assert_at {
                    anyhow::bail!(
                        "Line {} released at cycle {} before it is asserted at {}",
                        stimulus.line,
                        release,
                        stimulus.assert_at
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub image: String,
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_cycles: u64,
    #[serde(default)]
    pub max_instructions: Option<u64>,
    /// Stop when the fetch address has not changed for this many cycles.
    #[serde(default)]
    pub no_progress_cycles: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    MaxCycles,
    MaxInstructions,
    NoProgress,
    Breakpoint,
    MemoryViolation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueDetails {
    /// `PC`, `SP`, `SR` or `R0`..`R15`.
    pub register: String,
    pub expected_value: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueAssertion {
    pub register_value: RegisterValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MemoryValueDetails {
    pub address: u16,
    pub expected_value: u16,
    #[serde(default)]
    pub mask: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MemoryValueAssertion {
    pub memory_value: MemoryValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    ExpectedStopReason(StopReasonAssertion),
    RegisterValue(RegisterValueAssertion),
    MemoryValue(MemoryValueAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.image.trim().is_empty() {
            anyhow::bail!("Input 'image' path cannot be empty");
        }

        if self.limits.max_cycles == 0 {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }
        if self.limits.max_instructions == Some(0) {
            anyhow::bail!("Limit 'max_instructions' must be greater than zero");
        }
        if self.limits.no_progress_cycles == Some(0) {
            anyhow::bail!("Limit 'no_progress_cycles' must be greater than zero");
        }

        for assertion in &self.assertions {
            if let TestAssertion::RegisterValue(a) = assertion {
                if parse_register(&a.register_value.register).is_none() {
                    anyhow::bail!("Unknown register '{}'", a.register_value.register);
                }
            }
        }

        Ok(())
    }
}

/// Register index for `PC`, `SP`, `SR`, `CG` or `R0`..`R15` (case-insensitive).
pub fn parse_register(name: &str) -> Option<u8> {
    let name = name.trim().to_ascii_uppercase();
    match name.as_str() {
        "PC" => Some(0),
        "SP" => Some(1),
        "SR" => Some(2),
        "CG" => Some(3),
        _ => name
            .strip_prefix('R')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| *n < 16),
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
