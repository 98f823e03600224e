// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use sequent_config::IrqStimulus;
use sequent_core::signals::DigitalLevel;
use sequent_core::Machine;

/// Replays the manifest's request-line schedule against the machine's
/// cycle counter.
#[derive(Debug, Default)]
pub struct StimulusDriver {
    stimuli: Vec<IrqStimulus>,
}

impl StimulusDriver {
    pub fn new(stimuli: Vec<IrqStimulus>) -> Self {
        Self { stimuli }
    }

    /// Drives the lines for the cycle about to run.
    pub fn apply(&self, machine: &mut Machine) {
        let cycle = machine.total_cycles;
        for s in &self.stimuli {
            if s.assert_at == cycle {
                tracing::debug!("cycle {}: IRQ line {} high", cycle, s.line);
                machine.set_irq_line(s.line as usize, DigitalLevel::High);
            }
            if s.release_at == Some(cycle) {
                tracing::debug!("cycle {}: IRQ line {} low", cycle, s.line);
                machine.set_irq_line(s.line as usize, DigitalLevel::Low);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequent_core::CoreConfig;

    #[test]
    fn test_assert_and_release() {
        let driver = StimulusDriver::new(vec![IrqStimulus {
            line: 2,
            assert_at: 3,
            release_at: Some(5),
        }]);
        let mut machine = Machine::new(CoreConfig::default());

        let mut levels = Vec::new();
        for cycle in 0..7 {
            machine.total_cycles = cycle;
            driver.apply(&mut machine);
            levels.push(machine.lines.get(2));
        }
        use DigitalLevel::*;
        assert_eq!(levels, vec![Low, Low, Low, High, High, Low, Low]);
    }
}
