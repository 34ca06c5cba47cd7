//! Instruction descriptors for the unprefixed and CB-prefixed opcode maps.
//!
//! Durations are in machine cycles (1 M-cycle = 4 T-cycles) and follow the
//! tables at gbdev.io/gb-opcodes. CB-prefixed durations include the fetch of
//! the 0xCB prefix itself, so the prefix slot carries no duration of its own.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{TableError, TableKind};
use crate::registers::{Reg8, Reg16};

/// 8-bit operand locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand8 {
    Reg(Reg8),
    /// Memory addressed by HL.
    HlMem,
    /// Byte following the opcode.
    Imm,
}

impl Operand8 {
    /// Decode the 3-bit register field (B, C, D, E, H, L, (HL), A).
    pub const fn from_index(index: u8) -> Operand8 {
        match Reg8::from_index(index) {
            Some(reg) => Operand8::Reg(reg),
            None => Operand8::HlMem,
        }
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand8::Reg(reg) => write!(f, "{reg}"),
            Operand8::HlMem => f.write_str("(HL)"),
            Operand8::Imm => f.write_str("d8"),
        }
    }
}

/// Branch conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cond::NZ => "NZ",
            Cond::Z => "Z",
            Cond::NC => "NC",
            Cond::C => "C",
        };
        f.write_str(name)
    }
}

/// Accumulator ALU operations (opcodes 0x80-0xBF and their immediate forms).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    const ORDER: [AluOp; 8] = [
        AluOp::Add,
        AluOp::Adc,
        AluOp::Sub,
        AluOp::Sbc,
        AluOp::And,
        AluOp::Xor,
        AluOp::Or,
        AluOp::Cp,
    ];

    fn prefix(self) -> &'static str {
        match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB ",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND ",
            AluOp::Xor => "XOR ",
            AluOp::Or => "OR ",
            AluOp::Cp => "CP ",
        }
    }
}

/// CB-prefixed rotate and shift operations (CB 0x00-0x3F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    const ORDER: [ShiftOp; 8] = [
        ShiftOp::Rlc,
        ShiftOp::Rrc,
        ShiftOp::Rl,
        ShiftOp::Rr,
        ShiftOp::Sla,
        ShiftOp::Sra,
        ShiftOp::Swap,
        ShiftOp::Srl,
    ];
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShiftOp::Rlc => "RLC",
            ShiftOp::Rrc => "RRC",
            ShiftOp::Rl => "RL",
            ShiftOp::Rr => "RR",
            ShiftOp::Sla => "SLA",
            ShiftOp::Sra => "SRA",
            ShiftOp::Swap => "SWAP",
            ShiftOp::Srl => "SRL",
        };
        f.write_str(name)
    }
}

/// What an instruction does. The execution engine matches on this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Nop,
    /// LD between registers, (HL) and immediates.
    Ld8 { dst: Operand8, src: Operand8 },
    /// LD (BC),A / LD (DE),A
    StoreA(Reg16),
    /// LD A,(BC) / LD A,(DE)
    LoadA(Reg16),
    /// LD (HL+),A / LD (HL-),A
    StoreAHl { inc: bool },
    /// LD A,(HL+) / LD A,(HL-)
    LoadAHl { inc: bool },
    /// LD rr,d16
    Ld16Imm(Reg16),
    /// LD (a16),SP
    StoreSp,
    LdSpHl,
    /// LD HL,SP+r8
    LdHlSpOffset,
    /// LDH (a8),A
    StoreHighImm,
    /// LDH A,(a8)
    LoadHighImm,
    /// LD (C),A
    StoreHighC,
    /// LD A,(C)
    LoadHighC,
    /// LD (a16),A
    StoreAbs,
    /// LD A,(a16)
    LoadAbs,
    Push(Reg16),
    Pop(Reg16),
    Alu(AluOp, Operand8),
    Inc8(Operand8),
    Dec8(Operand8),
    Inc16(Reg16),
    Dec16(Reg16),
    AddHl(Reg16),
    /// ADD SP,r8
    AddSpOffset,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr(Option<Cond>),
    Jp(Option<Cond>),
    JpHl,
    Call(Option<Cond>),
    Ret(Option<Cond>),
    Reti,
    Rst(u8),
    Halt,
    Stop,
    Di,
    Ei,
    /// 0xCB: selects the second table.
    Prefix,
    /// A hole in the opcode map. Executing it is fatal.
    Illegal,
    Shift(ShiftOp, Operand8),
    Bit(u8, Operand8),
    Res(u8, Operand8),
    Set(u8, Operand8),
}

impl Operation {
    /// Operand bytes the operation consumes after its opcode.
    pub fn operand_len(&self) -> u8 {
        match self {
            Operation::Ld8 { dst, src } => {
                u8::from(*dst == Operand8::Imm) + u8::from(*src == Operand8::Imm)
            }
            Operation::Alu(_, Operand8::Imm) => 1,
            Operation::Ld16Imm(_)
            | Operation::StoreSp
            | Operation::StoreAbs
            | Operation::LoadAbs
            | Operation::Jp(_)
            | Operation::Call(_) => 2,
            Operation::LdHlSpOffset
            | Operation::StoreHighImm
            | Operation::LoadHighImm
            | Operation::AddSpOffset
            | Operation::Jr(_)
            | Operation::Stop => 1,
            _ => 0,
        }
    }

    /// Whether the duration depends on a runtime condition.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Operation::Jr(Some(_))
                | Operation::Jp(Some(_))
                | Operation::Call(Some(_))
                | Operation::Ret(Some(_))
        )
    }

    fn timeless(&self) -> bool {
        matches!(self, Operation::Prefix | Operation::Illegal)
    }

    /// The 8-bit location the result is stored into, if any.
    pub fn destination(&self) -> Option<Operand8> {
        match *self {
            Operation::Ld8 { dst, .. } => Some(dst),
            Operation::Inc8(target)
            | Operation::Dec8(target)
            | Operation::Shift(_, target)
            | Operation::Res(_, target)
            | Operation::Set(_, target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn cond(c: &Option<Cond>) -> String {
            c.map(|c| format!("{c},")).unwrap_or_default()
        }

        match self {
            Operation::Nop => f.write_str("NOP"),
            Operation::Ld8 { dst, src } => write!(f, "LD {dst},{src}"),
            Operation::StoreA(rr) => write!(f, "LD ({rr}),A"),
            Operation::LoadA(rr) => write!(f, "LD A,({rr})"),
            Operation::StoreAHl { inc } => write!(f, "LD (HL{}),A", if *inc { '+' } else { '-' }),
            Operation::LoadAHl { inc } => write!(f, "LD A,(HL{})", if *inc { '+' } else { '-' }),
            Operation::Ld16Imm(rr) => write!(f, "LD {rr},d16"),
            Operation::StoreSp => f.write_str("LD (a16),SP"),
            Operation::LdSpHl => f.write_str("LD SP,HL"),
            Operation::LdHlSpOffset => f.write_str("LD HL,SP+r8"),
            Operation::StoreHighImm => f.write_str("LDH (a8),A"),
            Operation::LoadHighImm => f.write_str("LDH A,(a8)"),
            Operation::StoreHighC => f.write_str("LD (C),A"),
            Operation::LoadHighC => f.write_str("LD A,(C)"),
            Operation::StoreAbs => f.write_str("LD (a16),A"),
            Operation::LoadAbs => f.write_str("LD A,(a16)"),
            Operation::Push(rr) => write!(f, "PUSH {rr}"),
            Operation::Pop(rr) => write!(f, "POP {rr}"),
            Operation::Alu(op, src) => write!(f, "{}{src}", op.prefix()),
            Operation::Inc8(dst) => write!(f, "INC {dst}"),
            Operation::Dec8(dst) => write!(f, "DEC {dst}"),
            Operation::Inc16(rr) => write!(f, "INC {rr}"),
            Operation::Dec16(rr) => write!(f, "DEC {rr}"),
            Operation::AddHl(rr) => write!(f, "ADD HL,{rr}"),
            Operation::AddSpOffset => f.write_str("ADD SP,r8"),
            Operation::Rlca => f.write_str("RLCA"),
            Operation::Rrca => f.write_str("RRCA"),
            Operation::Rla => f.write_str("RLA"),
            Operation::Rra => f.write_str("RRA"),
            Operation::Daa => f.write_str("DAA"),
            Operation::Cpl => f.write_str("CPL"),
            Operation::Scf => f.write_str("SCF"),
            Operation::Ccf => f.write_str("CCF"),
            Operation::Jr(c) => write!(f, "JR {}r8", cond(c)),
            Operation::Jp(c) => write!(f, "JP {}a16", cond(c)),
            Operation::JpHl => f.write_str("JP HL"),
            Operation::Call(c) => write!(f, "CALL {}a16", cond(c)),
            Operation::Ret(Some(c)) => write!(f, "RET {c}"),
            Operation::Ret(None) => f.write_str("RET"),
            Operation::Reti => f.write_str("RETI"),
            Operation::Rst(vector) => write!(f, "RST {vector:02X}H"),
            Operation::Halt => f.write_str("HALT"),
            Operation::Stop => f.write_str("STOP"),
            Operation::Di => f.write_str("DI"),
            Operation::Ei => f.write_str("EI"),
            Operation::Prefix => f.write_str("PREFIX CB"),
            Operation::Illegal => f.write_str("ILLEGAL"),
            Operation::Shift(op, dst) => write!(f, "{op} {dst}"),
            Operation::Bit(bit, src) => write!(f, "BIT {bit},{src}"),
            Operation::Res(bit, dst) => write!(f, "RES {bit},{dst}"),
            Operation::Set(bit, dst) => write!(f, "SET {bit},{dst}"),
        }
    }
}

/// Immutable description of one opcode slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub prefixed: bool,
    /// Operand bytes following the opcode (0-2).
    pub length: u8,
    /// Machine cycles, or the not-taken duration of a conditional branch.
    pub cycles: u8,
    /// Machine cycles when a conditional branch is taken.
    pub branch_cycles: Option<u8>,
    pub op: Operation,
}

impl Instruction {
    const fn new(opcode: u8, op: Operation, length: u8, cycles: u8) -> Self {
        Self {
            opcode,
            prefixed: false,
            length,
            cycles,
            branch_cycles: None,
            op,
        }
    }

    const fn branch(opcode: u8, op: Operation, length: u8, cycles: u8, taken: u8) -> Self {
        Self {
            opcode,
            prefixed: false,
            length,
            cycles,
            branch_cycles: Some(taken),
            op,
        }
    }

    pub fn is_illegal(&self) -> bool {
        self.op == Operation::Illegal
    }

    /// Duration of one execution given the branch outcome.
    #[inline]
    pub fn duration(&self, taken: bool) -> u32 {
        match (taken, self.branch_cycles) {
            (true, Some(cycles)) => cycles as u32,
            _ => self.cycles as u32,
        }
    }

    /// Mnemonic template, e.g. `LD B,d8`.
    pub fn mnemonic(&self) -> String {
        self.op.to_string()
    }

    /// Render the instruction with its operand bytes substituted.
    pub fn disassemble(&self, operands: &[u8]) -> String {
        let lo = operands.first().copied().unwrap_or(0);
        let hi = operands.get(1).copied().unwrap_or(0);
        let word = u16::from_le_bytes([lo, hi]);
        let offset = lo as i8;
        self.mnemonic()
            .replace("d16", &format!("${word:04X}"))
            .replace("a16", &format!("${word:04X}"))
            .replace("d8", &format!("${lo:02X}"))
            .replace("a8", &format!("$FF{lo:02X}"))
            .replace("+r8", &format!("{offset:+}"))
            .replace("r8", &format!("{offset:+}"))
    }

    fn validate(&self, table: TableKind, slot: u8) -> Result<(), TableError> {
        if self.opcode != slot {
            return Err(TableError::SlotMismatch {
                table,
                slot,
                opcode: self.opcode,
            });
        }
        let expected = self.op.operand_len();
        if self.length != expected {
            return Err(TableError::LengthMismatch {
                table,
                opcode: self.opcode,
                declared: self.length,
                expected,
            });
        }
        if self.op.destination() == Some(Operand8::Imm) {
            return Err(TableError::ImmediateDestination {
                table,
                opcode: self.opcode,
            });
        }
        if self.cycles == 0 && !self.op.timeless() {
            return Err(TableError::MissingDuration {
                table,
                opcode: self.opcode,
            });
        }
        match self.branch_cycles {
            Some(taken) if !self.op.is_conditional() || taken <= self.cycles => {
                Err(TableError::BranchTiming {
                    table,
                    opcode: self.opcode,
                })
            }
            None if self.op.is_conditional() => Err(TableError::BranchTiming {
                table,
                opcode: self.opcode,
            }),
            _ => Ok(()),
        }
    }
}

/// Both opcode maps, built once and shared read-only.
#[derive(Debug)]
pub struct OpcodeTable {
    unprefixed: [Instruction; 256],
    prefixed: [Instruction; 256],
}

static SHARED: OnceLock<Result<OpcodeTable, TableError>> = OnceLock::new();

impl OpcodeTable {
    /// Process-wide table, built and validated on first use.
    pub fn shared() -> Result<&'static OpcodeTable, TableError> {
        SHARED.get_or_init(OpcodeTable::build).as_ref().map_err(|e| *e)
    }

    /// Build both tables and check every descriptor for internal consistency.
    pub fn build() -> Result<OpcodeTable, TableError> {
        let table = OpcodeTable {
            unprefixed: std::array::from_fn(|i| unprefixed(i as u8)),
            prefixed: std::array::from_fn(|i| prefixed(i as u8)),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), TableError> {
        for (slot, instr) in self.unprefixed.iter().enumerate() {
            instr.validate(TableKind::Unprefixed, slot as u8)?;
        }
        for (slot, instr) in self.prefixed.iter().enumerate() {
            instr.validate(TableKind::Prefixed, slot as u8)?;
        }
        Ok(())
    }

    #[inline]
    pub fn unprefixed(&self, opcode: u8) -> &Instruction {
        &self.unprefixed[opcode as usize]
    }

    #[inline]
    pub fn prefixed(&self, opcode: u8) -> &Instruction {
        &self.prefixed[opcode as usize]
    }
}

const RR: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
const RR_STACK: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::AF];
const CONDS: [Cond; 4] = [Cond::NZ, Cond::Z, Cond::NC, Cond::C];

/// Unprefixed opcode map. The 0x40-0xBF block is regular and decoded from
/// the opcode's bit fields; the rest is spelled out row by row.
fn unprefixed(opcode: u8) -> Instruction {
    use Operation::*;

    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let pair = RR[(y >> 1) as usize];
    let cond = CONDS[(y & 0x03) as usize];

    match opcode {
        0x76 => Instruction::new(opcode, Halt, 0, 1),
        0x40..=0x7F => {
            let dst = Operand8::from_index(y);
            let src = Operand8::from_index(z);
            let cycles = if dst == Operand8::HlMem || src == Operand8::HlMem { 2 } else { 1 };
            Instruction::new(opcode, Ld8 { dst, src }, 0, cycles)
        }
        0x80..=0xBF => {
            let src = Operand8::from_index(z);
            let cycles = if src == Operand8::HlMem { 2 } else { 1 };
            Instruction::new(opcode, Alu(AluOp::ORDER[y as usize], src), 0, cycles)
        }

        0x00 => Instruction::new(opcode, Nop, 0, 1),
        0x10 => Instruction::new(opcode, Stop, 1, 1),
        0x08 => Instruction::new(opcode, StoreSp, 2, 5),
        0x18 => Instruction::new(opcode, Jr(None), 1, 3),
        0x20 | 0x28 | 0x30 | 0x38 => Instruction::branch(
            opcode,
            Jr(Some(CONDS[(y - 4) as usize])),
            1,
            2,
            3,
        ),
        0x01 | 0x11 | 0x21 | 0x31 => Instruction::new(opcode, Ld16Imm(pair), 2, 3),
        0x09 | 0x19 | 0x29 | 0x39 => Instruction::new(opcode, AddHl(pair), 0, 2),
        0x02 => Instruction::new(opcode, StoreA(Reg16::BC), 0, 2),
        0x12 => Instruction::new(opcode, StoreA(Reg16::DE), 0, 2),
        0x22 => Instruction::new(opcode, StoreAHl { inc: true }, 0, 2),
        0x32 => Instruction::new(opcode, StoreAHl { inc: false }, 0, 2),
        0x0A => Instruction::new(opcode, LoadA(Reg16::BC), 0, 2),
        0x1A => Instruction::new(opcode, LoadA(Reg16::DE), 0, 2),
        0x2A => Instruction::new(opcode, LoadAHl { inc: true }, 0, 2),
        0x3A => Instruction::new(opcode, LoadAHl { inc: false }, 0, 2),
        0x03 | 0x13 | 0x23 | 0x33 => Instruction::new(opcode, Inc16(pair), 0, 2),
        0x0B | 0x1B | 0x2B | 0x3B => Instruction::new(opcode, Dec16(pair), 0, 2),
        0x34 => Instruction::new(opcode, Inc8(Operand8::HlMem), 0, 3),
        0x35 => Instruction::new(opcode, Dec8(Operand8::HlMem), 0, 3),
        0x36 => Instruction::new(
            opcode,
            Ld8 {
                dst: Operand8::HlMem,
                src: Operand8::Imm,
            },
            1,
            3,
        ),
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
            Instruction::new(opcode, Inc8(Operand8::from_index(y)), 0, 1)
        }
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
            Instruction::new(opcode, Dec8(Operand8::from_index(y)), 0, 1)
        }
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => Instruction::new(
            opcode,
            Ld8 {
                dst: Operand8::from_index(y),
                src: Operand8::Imm,
            },
            1,
            2,
        ),
        0x07 => Instruction::new(opcode, Rlca, 0, 1),
        0x0F => Instruction::new(opcode, Rrca, 0, 1),
        0x17 => Instruction::new(opcode, Rla, 0, 1),
        0x1F => Instruction::new(opcode, Rra, 0, 1),
        0x27 => Instruction::new(opcode, Daa, 0, 1),
        0x2F => Instruction::new(opcode, Cpl, 0, 1),
        0x37 => Instruction::new(opcode, Scf, 0, 1),
        0x3F => Instruction::new(opcode, Ccf, 0, 1),

        0xC0 | 0xC8 | 0xD0 | 0xD8 => Instruction::branch(opcode, Ret(Some(cond)), 0, 2, 5),
        0xC2 | 0xCA | 0xD2 | 0xDA => Instruction::branch(opcode, Jp(Some(cond)), 2, 3, 4),
        0xC4 | 0xCC | 0xD4 | 0xDC => Instruction::branch(opcode, Call(Some(cond)), 2, 3, 6),
        0xC1 | 0xD1 | 0xE1 | 0xF1 => {
            Instruction::new(opcode, Pop(RR_STACK[((y >> 1) & 0x03) as usize]), 0, 3)
        }
        0xC5 | 0xD5 | 0xE5 | 0xF5 => {
            Instruction::new(opcode, Push(RR_STACK[((y >> 1) & 0x03) as usize]), 0, 4)
        }
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            Instruction::new(opcode, Alu(AluOp::ORDER[y as usize], Operand8::Imm), 1, 2)
        }
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            Instruction::new(opcode, Rst(y * 8), 0, 4)
        }
        0xC3 => Instruction::new(opcode, Jp(None), 2, 4),
        0xC9 => Instruction::new(opcode, Ret(None), 0, 4),
        0xCB => Instruction::new(opcode, Prefix, 0, 0),
        0xCD => Instruction::new(opcode, Call(None), 2, 6),
        0xD9 => Instruction::new(opcode, Reti, 0, 4),
        0xE0 => Instruction::new(opcode, StoreHighImm, 1, 3),
        0xE2 => Instruction::new(opcode, StoreHighC, 0, 2),
        0xE8 => Instruction::new(opcode, AddSpOffset, 1, 4),
        0xE9 => Instruction::new(opcode, JpHl, 0, 1),
        0xEA => Instruction::new(opcode, StoreAbs, 2, 4),
        0xF0 => Instruction::new(opcode, LoadHighImm, 1, 3),
        0xF2 => Instruction::new(opcode, LoadHighC, 0, 2),
        0xF3 => Instruction::new(opcode, Di, 0, 1),
        0xF8 => Instruction::new(opcode, LdHlSpOffset, 1, 3),
        0xF9 => Instruction::new(opcode, LdSpHl, 0, 2),
        0xFA => Instruction::new(opcode, LoadAbs, 2, 4),
        0xFB => Instruction::new(opcode, Ei, 0, 1),

        // 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD
        _ => Instruction::new(opcode, Illegal, 0, 0),
    }
}

/// CB-prefixed opcode map: `xx yyy zzz` with `zzz` the operand and `yyy`
/// either the shift kind (xx = 0) or the bit number.
fn prefixed(opcode: u8) -> Instruction {
    let y = (opcode >> 3) & 0x07;
    let target = Operand8::from_index(opcode & 0x07);
    let on_hl = target == Operand8::HlMem;

    let (op, cycles) = match opcode >> 6 {
        0 => (
            Operation::Shift(ShiftOp::ORDER[y as usize], target),
            if on_hl { 4 } else { 2 },
        ),
        // BIT only reads (HL), so it is one cycle shorter than RES/SET.
        1 => (Operation::Bit(y, target), if on_hl { 3 } else { 2 }),
        2 => (Operation::Res(y, target), if on_hl { 4 } else { 2 }),
        _ => (Operation::Set(y, target), if on_hl { 4 } else { 2 }),
    };

    Instruction {
        opcode,
        prefixed: true,
        length: 0,
        cycles,
        branch_cycles: None,
        op,
    }
}
