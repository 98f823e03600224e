// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reference execution unit. Operand A is the source, B the destination;
//! one-operand opcodes (0..=3) work on A alone.

use super::StatusFlags;

pub const OP_RRC: u8 = 0x0;
pub const OP_SWPB: u8 = 0x1;
pub const OP_RRA: u8 = 0x2;
pub const OP_SXT: u8 = 0x3;
pub const OP_MOV: u8 = 0x4;
pub const OP_ADD: u8 = 0x5;
pub const OP_ADDC: u8 = 0x6;
pub const OP_SUBC: u8 = 0x7;
pub const OP_SUB: u8 = 0x8;
pub const OP_CMP: u8 = 0x9;
pub const OP_DADD: u8 = 0xA;
pub const OP_BIT: u8 = 0xB;
pub const OP_BIC: u8 = 0xC;
pub const OP_BIS: u8 = 0xD;
pub const OP_XOR: u8 = 0xE;
pub const OP_AND: u8 = 0xF;

/// Flags the ALU is allowed to touch.
pub const ARITH_FLAGS: StatusFlags = StatusFlags::CARRY
    .union(StatusFlags::ZERO)
    .union(StatusFlags::NEGATIVE)
    .union(StatusFlags::OVERFLOW);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u16,
    /// New C/Z/N/V, or `None` for operations that keep the flags.
    pub flags: Option<StatusFlags>,
}

#[derive(Clone, Copy)]
struct Width {
    mask: u16,
    msb: u16,
}

impl Width {
    fn of(byte: bool) -> Self {
        if byte {
            Width {
                mask: 0x00FF,
                msb: 0x0080,
            }
        } else {
            Width {
                mask: 0xFFFF,
                msb: 0x8000,
            }
        }
    }

    fn nz(self, value: u16) -> StatusFlags {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::ZERO, value & self.mask == 0);
        flags.set(StatusFlags::NEGATIVE, value & self.msb != 0);
        flags
    }
}

pub fn execute(opcode: u8, a: u16, b: u16, byte: bool, status: StatusFlags) -> AluResult {
    let w = Width::of(byte);
    let a = a & w.mask;
    let b = b & w.mask;
    let carry = status.contains(StatusFlags::CARRY);

    match opcode & 0xF {
        OP_MOV => keep(a),
        OP_ADD => add(w, b, a, false),
        OP_ADDC => add(w, b, a, carry),
        OP_SUBC => add(w, b, !a & w.mask, carry),
        OP_SUB | OP_CMP => add(w, b, !a & w.mask, true),
        OP_DADD => dadd(w, b, a, carry, status),
        OP_BIT | OP_AND => logic(w, a & b, false),
        OP_BIC => keep(b & !a),
        OP_BIS => keep(b | a),
        OP_XOR => logic(w, a ^ b, a & w.msb != 0 && b & w.msb != 0),
        OP_RRC => {
            let value = (a >> 1) | if carry { w.msb } else { 0 };
            shift(w, value, a & 1 != 0)
        }
        OP_SWPB => keep(a.swap_bytes()),
        OP_RRA => shift(w, (a >> 1) | (a & w.msb), a & 1 != 0),
        _ => {
            // OP_SXT
            let value = (a as u8) as i8 as i16 as u16;
            logic(Width::of(false), value, false)
        }
    }
}

fn keep(value: u16) -> AluResult {
    AluResult { value, flags: None }
}

fn add(w: Width, dst: u16, src: u16, carry_in: bool) -> AluResult {
    let sum = dst as u32 + src as u32 + carry_in as u32;
    let value = sum as u16 & w.mask;
    let mut flags = w.nz(value);
    flags.set(StatusFlags::CARRY, sum > w.mask as u32);
    flags.set(
        StatusFlags::OVERFLOW,
        (src ^ value) & (dst ^ value) & w.msb != 0,
    );
    AluResult {
        value,
        flags: Some(flags),
    }
}

fn dadd(w: Width, dst: u16, src: u16, carry_in: bool, status: StatusFlags) -> AluResult {
    let digits = if w.mask == 0xFF { 2 } else { 4 };
    let mut carry = carry_in as u16;
    let mut value = 0u16;
    for digit in 0..digits {
        let shift = digit * 4;
        let mut d = ((src >> shift) & 0xF) + ((dst >> shift) & 0xF) + carry;
        carry = 0;
        if d > 9 {
            d -= 10;
            carry = 1;
        }
        value |= (d & 0xF) << shift;
    }
    let mut flags = w.nz(value);
    flags.set(StatusFlags::CARRY, carry != 0);
    flags.set(StatusFlags::OVERFLOW, status.contains(StatusFlags::OVERFLOW));
    AluResult {
        value,
        flags: Some(flags),
    }
}

fn logic(w: Width, value: u16, overflow: bool) -> AluResult {
    let value = value & w.mask;
    let mut flags = w.nz(value);
    flags.set(StatusFlags::CARRY, value != 0);
    flags.set(StatusFlags::OVERFLOW, overflow);
    AluResult {
        value,
        flags: Some(flags),
    }
}

fn shift(w: Width, value: u16, carry_out: bool) -> AluResult {
    let value = value & w.mask;
    let mut flags = w.nz(value);
    flags.set(StatusFlags::CARRY, carry_out);
    AluResult {
        value,
        flags: Some(flags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: u8, a: u16, b: u16) -> AluResult {
        execute(op, a, b, false, StatusFlags::empty())
    }

    #[test]
    fn test_add_carry_and_overflow() {
        let r = run(OP_ADD, 1, 0xFFFF);
        assert_eq!(r.value, 0);
        let f = r.flags.unwrap();
        assert!(f.contains(StatusFlags::CARRY | StatusFlags::ZERO));
        assert!(!f.contains(StatusFlags::OVERFLOW));

        let r = run(OP_ADD, 1, 0x7FFF);
        assert_eq!(r.value, 0x8000);
        let f = r.flags.unwrap();
        assert!(f.contains(StatusFlags::OVERFLOW | StatusFlags::NEGATIVE));
        assert!(!f.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_sub_sets_carry_when_no_borrow() {
        // dst - src = 5 - 3
        let r = run(OP_SUB, 3, 5);
        assert_eq!(r.value, 2);
        assert!(r.flags.unwrap().contains(StatusFlags::CARRY));

        let r = run(OP_CMP, 5, 3);
        assert_eq!(r.value, 0xFFFE);
        let f = r.flags.unwrap();
        assert!(!f.contains(StatusFlags::CARRY));
        assert!(f.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_byte_mode_wraps_at_eight_bits() {
        let r = execute(OP_ADD, 0x01, 0x12FF, true, StatusFlags::empty());
        assert_eq!(r.value, 0x00);
        assert!(r.flags.unwrap().contains(StatusFlags::CARRY | StatusFlags::ZERO));
    }

    #[test]
    fn test_flag_preserving_ops() {
        assert_eq!(run(OP_MOV, 0x1234, 0).flags, None);
        assert_eq!(run(OP_BIS, 0x00F0, 0x000F).value, 0x00FF);
        assert_eq!(run(OP_BIC, 0x000F, 0x00FF).value, 0x00F0);
        assert_eq!(run(OP_SWPB, 0x1234, 0).value, 0x3412);
        assert_eq!(run(OP_SWPB, 0x1234, 0).flags, None);
    }

    #[test]
    fn test_logic_carry_is_not_zero() {
        let r = run(OP_AND, 0x00F0, 0x0F00);
        assert_eq!(r.value, 0);
        let f = r.flags.unwrap();
        assert!(f.contains(StatusFlags::ZERO));
        assert!(!f.contains(StatusFlags::CARRY));

        let r = run(OP_XOR, 0x8001, 0x8000);
        assert_eq!(r.value, 1);
        let f = r.flags.unwrap();
        assert!(f.contains(StatusFlags::CARRY | StatusFlags::OVERFLOW));
    }

    #[test]
    fn test_shifts() {
        let r = execute(OP_RRC, 0x0001, 0, false, StatusFlags::CARRY);
        assert_eq!(r.value, 0x8000);
        assert!(r.flags.unwrap().contains(StatusFlags::CARRY | StatusFlags::NEGATIVE));

        let r = run(OP_RRA, 0x8004, 0);
        assert_eq!(r.value, 0xC002);
        assert!(!r.flags.unwrap().contains(StatusFlags::CARRY));

        let r = run(OP_SXT, 0x0080, 0);
        assert_eq!(r.value, 0xFF80);
        assert!(r.flags.unwrap().contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_decimal_add() {
        let r = run(OP_DADD, 0x0019, 0x0023);
        assert_eq!(r.value, 0x0042);
        let r = run(OP_DADD, 0x0001, 0x9999);
        assert_eq!(r.value, 0x0000);
        assert!(r.flags.unwrap().contains(StatusFlags::CARRY));
    }
}
