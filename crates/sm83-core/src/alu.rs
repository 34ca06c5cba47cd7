//! Flag-producing arithmetic shared by the execution engine.
//!
//! Each helper owns exactly the flag bits the documented instruction writes
//! (gbdev.io/pandocs/CPU_Instruction_Set.html); everything else is left as is.

use crate::opcodes::{AluOp, ShiftOp};
use crate::registers::{Flag, Registers};

/// 8-bit accumulator operation. `CP` computes `SUB` without storing it.
pub(crate) fn accumulate(regs: &mut Registers, op: AluOp, val: u8) {
    let a = regs.a;
    match op {
        AluOp::Add | AluOp::Adc => {
            let carry_in = if op == AluOp::Adc { regs.carry_bit() } else { 0 };
            let wide = a as u16 + val as u16 + carry_in as u16;
            let res = wide as u8;
            regs.set_flags(
                Some(res == 0),
                Some(false),
                Some((a & 0x0F) + (val & 0x0F) + carry_in > 0x0F),
                Some(wide > 0xFF),
            );
            regs.a = res;
        }
        AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
            let carry_in = if op == AluOp::Sbc { regs.carry_bit() } else { 0 };
            let res = a.wrapping_sub(val).wrapping_sub(carry_in);
            regs.set_flags(
                Some(res == 0),
                Some(true),
                Some((a & 0x0F) < (val & 0x0F) + carry_in),
                Some((a as u16) < val as u16 + carry_in as u16),
            );
            if op != AluOp::Cp {
                regs.a = res;
            }
        }
        AluOp::And => {
            regs.a = a & val;
            regs.set_flags(Some(regs.a == 0), Some(false), Some(true), Some(false));
        }
        AluOp::Xor => {
            regs.a = a ^ val;
            regs.set_flags(Some(regs.a == 0), Some(false), Some(false), Some(false));
        }
        AluOp::Or => {
            regs.a = a | val;
            regs.set_flags(Some(regs.a == 0), Some(false), Some(false), Some(false));
        }
    }
}

/// INC r: carry untouched.
pub(crate) fn inc8(regs: &mut Registers, val: u8) -> u8 {
    let res = val.wrapping_add(1);
    regs.set_flags(Some(res == 0), Some(false), Some(val & 0x0F == 0x0F), None);
    res
}

/// DEC r: carry untouched.
pub(crate) fn dec8(regs: &mut Registers, val: u8) -> u8 {
    let res = val.wrapping_sub(1);
    regs.set_flags(Some(res == 0), Some(true), Some(val & 0x0F == 0), None);
    res
}

/// ADD HL,rr: half carry out of bit 11, carry out of bit 15, Z untouched.
pub(crate) fn add_hl(regs: &mut Registers, val: u16) {
    let hl = regs.hl();
    let (res, carry) = hl.overflowing_add(val);
    regs.set_flags(
        None,
        Some(false),
        Some((hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF),
        Some(carry),
    );
    regs.set_hl(res);
}

/// SP plus a signed offset, as used by ADD SP,r8 and LD HL,SP+r8.
///
/// Both carries come from the unsigned low-byte addition, and Z is always
/// cleared.
pub(crate) fn sp_offset(regs: &mut Registers, offset: u8) -> u16 {
    let sp = regs.sp;
    let res = sp.wrapping_add(offset as i8 as i16 as u16);
    regs.set_flags(
        Some(false),
        Some(false),
        Some((sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F),
        Some((sp & 0x00FF) + offset as u16 > 0x00FF),
    );
    res
}

/// Decimal-adjust A after a BCD addition or subtraction.
pub(crate) fn daa(regs: &mut Registers) {
    let mut a = regs.a;
    let mut carry = regs.flag(Flag::C);
    if !regs.flag(Flag::N) {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if regs.flag(Flag::H) || a & 0x0F > 0x09 {
            a = a.wrapping_add(0x06);
        }
    } else {
        if carry {
            a = a.wrapping_sub(0x60);
        }
        if regs.flag(Flag::H) {
            a = a.wrapping_sub(0x06);
        }
    }
    regs.a = a;
    regs.set_flags(Some(a == 0), None, Some(false), Some(carry));
}

pub(crate) fn cpl(regs: &mut Registers) {
    regs.a = !regs.a;
    regs.set_flags(None, Some(true), Some(true), None);
}

pub(crate) fn scf(regs: &mut Registers) {
    regs.set_flags(None, Some(false), Some(false), Some(true));
}

pub(crate) fn ccf(regs: &mut Registers) {
    let carry = regs.flag(Flag::C);
    regs.set_flags(None, Some(false), Some(false), Some(!carry));
}

/// CB-prefixed rotate/shift. Z reflects the result.
pub(crate) fn shift(regs: &mut Registers, op: ShiftOp, val: u8) -> u8 {
    let carry_in = regs.carry_bit();
    let (res, carry) = match op {
        ShiftOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
        ShiftOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
        ShiftOp::Rl => ((val << 1) | carry_in, val & 0x80 != 0),
        ShiftOp::Rr => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
        ShiftOp::Sla => (val << 1, val & 0x80 != 0),
        ShiftOp::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        ShiftOp::Swap => (val.rotate_left(4), false),
        ShiftOp::Srl => (val >> 1, val & 0x01 != 0),
    };
    regs.set_flags(Some(res == 0), Some(false), Some(false), Some(carry));
    res
}

/// RLCA/RRCA/RLA/RRA: like their CB forms but Z is always cleared.
pub(crate) fn rotate_a(regs: &mut Registers, op: ShiftOp) {
    let res = shift(regs, op, regs.a);
    regs.a = res;
    regs.clear_flag(Flag::Z);
}

/// BIT n: Z set when the bit is clear, carry untouched.
pub(crate) fn bit(regs: &mut Registers, bit: u8, val: u8) {
    regs.set_flags(Some(val & (1 << bit) == 0), Some(false), Some(true), None);
}
