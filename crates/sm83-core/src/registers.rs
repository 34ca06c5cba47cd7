use std::fmt;

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

// The low nibble of F has no storage behind it and always reads back as zero.
const FLAG_MASK: u8 = 0xF0;

/// One of the four live bits in F.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    Z,
    N,
    H,
    C,
}

impl Flag {
    pub const ALL: [Flag; 4] = [Flag::Z, Flag::N, Flag::H, Flag::C];

    #[inline]
    pub const fn mask(self) -> u8 {
        match self {
            Flag::Z => FLAG_Z,
            Flag::N => FLAG_N,
            Flag::H => FLAG_H,
            Flag::C => FLAG_C,
        }
    }
}

/// 8-bit register identifiers usable as instruction operands.
///
/// F is deliberately absent: no instruction addresses it as a plain 8-bit
/// operand, only through AF or the flag helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

impl Reg8 {
    /// Decode the 3-bit register field used throughout the opcode map.
    /// Index 6 selects `(HL)` and has no register counterpart.
    pub const fn from_index(index: u8) -> Option<Reg8> {
        match index & 0x07 {
            0 => Some(Reg8::B),
            1 => Some(Reg8::C),
            2 => Some(Reg8::D),
            3 => Some(Reg8::E),
            4 => Some(Reg8::H),
            5 => Some(Reg8::L),
            7 => Some(Reg8::A),
            _ => None,
        }
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg8::A => "A",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
        };
        f.write_str(name)
    }
}

/// 16-bit register pairs plus SP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg16::AF => "AF",
            Reg16::BC => "BC",
            Reg16::DE => "DE",
            Reg16::HL => "HL",
            Reg16::SP => "SP",
        };
        f.write_str(name)
    }
}

/// The SM83 register file.
///
/// Pairs are big-endian in the sense that the first register named is the
/// high byte: `BC == (B << 8) | C`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    #[inline]
    pub fn f(&self) -> u8 {
        self.f
    }

    #[inline]
    pub fn set_f(&mut self, val: u8) {
        self.f = val & FLAG_MASK;
    }

    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    #[inline]
    pub fn set_af(&mut self, val: u16) {
        let [a, f] = val.to_be_bytes();
        self.a = a;
        self.set_f(f);
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn set_bc(&mut self, val: u16) {
        [self.b, self.c] = val.to_be_bytes();
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn set_de(&mut self, val: u16) {
        [self.d, self.e] = val.to_be_bytes();
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_hl(&mut self, val: u16) {
        [self.h, self.l] = val.to_be_bytes();
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.a = val,
            Reg8::B => self.b = val,
            Reg8::C => self.c = val,
            Reg8::D => self.d = val,
            Reg8::E => self.e = val,
            Reg8::H => self.h = val,
            Reg8::L => self.l = val,
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => self.af(),
            Reg16::BC => self.bc(),
            Reg16::DE => self.de(),
            Reg16::HL => self.hl(),
            Reg16::SP => self.sp,
        }
    }

    pub fn set16(&mut self, reg: Reg16, val: u16) {
        match reg {
            Reg16::AF => self.set_af(val),
            Reg16::BC => self.set_bc(val),
            Reg16::DE => self.set_de(val),
            Reg16::HL => self.set_hl(val),
            Reg16::SP => self.sp = val,
        }
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.f & flag.mask() != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag) {
        self.f |= flag.mask();
    }

    #[inline]
    pub fn clear_flag(&mut self, flag: Flag) {
        self.f &= !flag.mask();
    }

    #[inline]
    pub fn assign_flag(&mut self, flag: Flag, on: bool) {
        if on {
            self.set_flag(flag);
        } else {
            self.clear_flag(flag);
        }
    }

    /// Update the flags from an ALU result. `None` leaves that bit as it was,
    /// so every instruction spells out exactly which bits it owns.
    pub fn set_flags(
        &mut self,
        zero: Option<bool>,
        subtract: Option<bool>,
        half_carry: Option<bool>,
        carry: Option<bool>,
    ) {
        let updates = [
            (Flag::Z, zero),
            (Flag::N, subtract),
            (Flag::H, half_carry),
            (Flag::C, carry),
        ];
        for (flag, value) in updates {
            if let Some(on) = value {
                self.assign_flag(flag, on);
            }
        }
    }

    /// Carry flag as an arithmetic operand.
    #[inline]
    pub fn carry_bit(&self) -> u8 {
        u8::from(self.flag(Flag::C))
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} SP:{:04X} PC:{:04X} [{}{}{}{}]",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.sp,
            self.pc,
            if self.flag(Flag::Z) { 'Z' } else { '-' },
            if self.flag(Flag::N) { 'N' } else { '-' },
            if self.flag(Flag::H) { 'H' } else { '-' },
            if self.flag(Flag::C) { 'C' } else { '-' },
        )
    }
}
