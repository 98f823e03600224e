// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::datapath::StatusFlags;

/// Branch condition encoded in `ir[12:10]` of a jump instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NotZero,      // JNE / JNZ
    Zero,         // JEQ / JZ
    NoCarry,      // JNC / JLO
    Carry,        // JC / JHS
    Negative,     // JN
    GreaterEqual, // JGE
    Less,         // JL
    Always,       // JMP
}

impl Condition {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Condition::NotZero),
            1 => Some(Condition::Zero),
            2 => Some(Condition::NoCarry),
            3 => Some(Condition::Carry),
            4 => Some(Condition::Negative),
            5 => Some(Condition::GreaterEqual),
            6 => Some(Condition::Less),
            7 => Some(Condition::Always),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::NotZero => "jnz",
            Condition::Zero => "jz",
            Condition::NoCarry => "jnc",
            Condition::Carry => "jc",
            Condition::Negative => "jn",
            Condition::GreaterEqual => "jge",
            Condition::Less => "jl",
            Condition::Always => "jmp",
        }
    }

    pub fn holds(self, flags: StatusFlags) -> bool {
        let z = flags.contains(StatusFlags::ZERO);
        let c = flags.contains(StatusFlags::CARRY);
        let n = flags.contains(StatusFlags::NEGATIVE);
        let v = flags.contains(StatusFlags::OVERFLOW);
        match self {
            Condition::NotZero => !z,
            Condition::Zero => z,
            Condition::NoCarry => !c,
            Condition::Carry => c,
            Condition::Negative => n,
            Condition::GreaterEqual => !(n ^ v),
            Condition::Less => n ^ v,
            Condition::Always => true,
        }
    }
}

/// Evaluates a raw 3-bit condition code. Codes outside the table never branch.
pub fn branch_taken(code: u8, flags: StatusFlags) -> bool {
    Condition::from_code(code).is_some_and(|cond| cond.holds(flags))
}
