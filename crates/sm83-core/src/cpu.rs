use std::fmt;

use log::{debug, warn};

use crate::alu;
use crate::bus::Bus;
use crate::error::{CpuError, TableError};
use crate::hardware::{BootMode, CpuConfig, HaltBugTrigger};
use crate::interrupts::{INTERRUPT_MASK, Interrupt, InterruptState};
use crate::opcodes::{Cond, Instruction, OpcodeTable, Operand8, Operation, ShiftOp};
use crate::registers::{Flag, Registers};

#[cfg(feature = "cpu-trace")]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "cpu-trace"))]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {};
}

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

/// Clock ratio: every duration reported by the core is in machine cycles.
pub const T_CYCLES_PER_M_CYCLE: u32 = 4;

const CB_PREFIX: u8 = 0xCB;

/// Coarse execution state of the CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Running,
    /// Waiting for an enabled interrupt request.
    Halted,
    /// Waiting for a joypad request or the host.
    Stopped,
    /// Acknowledging an interrupt. Held only inside the `step` that performs
    /// the acknowledge, so a CPU is never left in it between steps.
    InterruptDispatch,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "running",
            RunState::Halted => "halted",
            RunState::Stopped => "stopped",
            RunState::InterruptDispatch => "interrupt dispatch",
        };
        f.write_str(name)
    }
}

/// Everything needed to resume execution later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub state: RunState,
    pub interrupts: InterruptState,
    pub halt_bug: bool,
    pub cycles: u64,
    pub instruction_addr: u16,
}

pub struct Cpu {
    pub(crate) regs: Registers,
    pub(crate) state: RunState,
    pub(crate) interrupts: InterruptState,
    halt_bug: bool,
    cycles: u64,
    instruction_addr: u16,
    config: CpuConfig,
    table: &'static OpcodeTable,
}

impl Cpu {
    /// Create a CPU and reset it according to `config`.
    ///
    /// Fails only if the shared opcode table is internally inconsistent.
    pub fn new(config: CpuConfig) -> Result<Self, TableError> {
        let table = OpcodeTable::shared()?;
        let mut cpu = Self {
            regs: Registers::default(),
            state: RunState::Running,
            interrupts: InterruptState::default(),
            halt_bug: false,
            cycles: 0,
            instruction_addr: 0,
            config,
            table,
        };
        cpu.reset();
        Ok(cpu)
    }

    /// Return to the configured boot state. The bus is left untouched.
    pub fn reset(&mut self) {
        let mut regs = Registers::default();
        if self.config.boot == BootMode::SkipBootRom {
            let boot = self.config.revision.boot_registers();
            regs.a = boot.a;
            regs.set_f(boot.f);
            regs.b = boot.b;
            regs.c = boot.c;
            regs.d = boot.d;
            regs.e = boot.e;
            regs.h = boot.h;
            regs.l = boot.l;
            regs.sp = BOOT_SP;
            regs.pc = BOOT_PC;
        }

        self.regs = regs;
        self.state = RunState::Running;
        self.interrupts = InterruptState::default();
        self.halt_bug = false;
        self.cycles = 0;
        self.instruction_addr = regs.pc;
        debug!("CPU reset ({:?}, {:?}): {}", self.config.boot, self.config.revision, self.regs);
    }

    #[inline]
    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Direct register access for hosts and debuggers.
    #[inline]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[inline]
    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.regs.flag(flag)
    }

    #[inline]
    pub fn ime(&self) -> bool {
        self.interrupts.ime
    }

    /// Force IME, cancelling any pending EI.
    pub fn set_ime(&mut self, enabled: bool) {
        if enabled {
            self.interrupts.enable_now();
        } else {
            self.interrupts.disable();
        }
    }

    #[inline]
    pub fn interrupts(&self) -> &InterruptState {
        &self.interrupts
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether the next fetch will re-read the current byte.
    #[inline]
    pub fn halt_bug_pending(&self) -> bool {
        self.halt_bug
    }

    /// Machine cycles elapsed since the last reset.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Address of the most recently fetched opcode.
    #[inline]
    pub fn instruction_addr(&self) -> u16 {
        self.instruction_addr
    }

    /// Leave the Stopped state on behalf of the host (e.g. a button press
    /// the bus does not model).
    pub fn wake(&mut self) {
        if self.state == RunState::Stopped {
            debug!("STOP exit at {:04X} (host)", self.regs.pc);
            self.state = RunState::Running;
        }
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs,
            state: self.state,
            interrupts: self.interrupts,
            halt_bug: self.halt_bug,
            cycles: self.cycles,
            instruction_addr: self.instruction_addr,
        }
    }

    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.regs = snapshot.regs;
        self.state = snapshot.state;
        self.interrupts = snapshot.interrupts;
        self.halt_bug = snapshot.halt_bug;
        self.cycles = snapshot.cycles;
        self.instruction_addr = snapshot.instruction_addr;
    }

    /// Descriptor for the instruction at `addr`, without side effects on the
    /// CPU. Reads through the bus, so device registers may observe it.
    pub fn decode_at<B: Bus + ?Sized>(&self, bus: &mut B, addr: u16) -> &'static Instruction {
        let table = self.table;
        let opcode = bus.read(addr);
        if opcode == CB_PREFIX {
            table.prefixed(bus.read(addr.wrapping_add(1)))
        } else {
            table.unprefixed(opcode)
        }
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "{} IME:{} {} CY:{}",
            self.regs,
            u8::from(self.interrupts.ime),
            self.state,
            self.cycles
        )
    }

    /// Advance by one instruction, one idle cycle, or one interrupt
    /// acknowledge, and return the machine cycles consumed.
    ///
    /// An illegal opcode leaves PC on the faulting byte and counts nothing,
    /// so stepping again reports the same error.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        let cycles = match self.state {
            RunState::Stopped => {
                self.interrupts.poll(bus);
                if self.interrupts.if_ & Interrupt::Joypad.bit() != 0 {
                    debug!("STOP exit at {:04X} (joypad)", self.regs.pc);
                    self.state = RunState::Running;
                }
                1
            }
            RunState::Halted => 1 + self.handle_interrupts(bus),
            RunState::Running | RunState::InterruptDispatch => {
                // Only a restored snapshot can start a step mid-acknowledge;
                // the vector was already entered, so carry on from it.
                self.state = RunState::Running;
                let cycles = self.execute_next(bus)?;
                if self.state == RunState::Stopped {
                    cycles
                } else {
                    cycles + self.handle_interrupts(bus)
                }
            }
        };
        self.cycles += u64::from(cycles);
        Ok(cycles)
    }

    fn execute_next<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        let table = self.table;
        let enable_after = self.interrupts.begin_instruction();
        let addr = self.regs.pc;
        self.instruction_addr = addr;

        let opcode = if self.halt_bug {
            self.halt_bug = false;
            bus.read(addr)
        } else {
            self.fetch8(bus)
        };
        let instr = if opcode == CB_PREFIX {
            let cb = self.fetch8(bus);
            table.prefixed(cb)
        } else {
            table.unprefixed(opcode)
        };

        if instr.is_illegal() {
            self.regs.pc = addr;
            warn!("illegal opcode {opcode:02X} at {addr:04X}");
            return Err(CpuError::IllegalOpcode { opcode, addr });
        }

        cpu_trace!("{:04X}: {:<12} {}", addr, instr.mnemonic(), self.regs);
        let taken = self.execute(bus, instr);
        self.interrupts.end_instruction(enable_after);
        Ok(instr.duration(taken))
    }

    /// Apply the semantics of `instr`, whose opcode bytes have already been
    /// consumed. Returns whether a conditional branch was taken.
    fn execute<B: Bus + ?Sized>(&mut self, bus: &mut B, instr: &Instruction) -> bool {
        match instr.op {
            Operation::Nop => {}
            Operation::Ld8 { dst, src } => {
                let val = self.read_operand(bus, src);
                self.write_operand(bus, dst, val);
            }
            Operation::StoreA(pair) => {
                let addr = self.regs.get16(pair);
                bus.write(addr, self.regs.a);
            }
            Operation::LoadA(pair) => {
                let addr = self.regs.get16(pair);
                self.regs.a = bus.read(addr);
            }
            Operation::StoreAHl { inc } => {
                let addr = self.regs.hl();
                bus.write(addr, self.regs.a);
                self.regs.set_hl(step_hl(addr, inc));
            }
            Operation::LoadAHl { inc } => {
                let addr = self.regs.hl();
                self.regs.a = bus.read(addr);
                self.regs.set_hl(step_hl(addr, inc));
            }
            Operation::Ld16Imm(pair) => {
                let val = self.fetch16(bus);
                self.regs.set16(pair, val);
            }
            Operation::StoreSp => {
                let addr = self.fetch16(bus);
                let [lo, hi] = self.regs.sp.to_le_bytes();
                bus.write(addr, lo);
                bus.write(addr.wrapping_add(1), hi);
            }
            Operation::LdSpHl => self.regs.sp = self.regs.hl(),
            Operation::LdHlSpOffset => {
                let offset = self.fetch8(bus);
                let val = alu::sp_offset(&mut self.regs, offset);
                self.regs.set_hl(val);
            }
            Operation::StoreHighImm => {
                let offset = self.fetch8(bus);
                bus.write(0xFF00 | offset as u16, self.regs.a);
            }
            Operation::LoadHighImm => {
                let offset = self.fetch8(bus);
                self.regs.a = bus.read(0xFF00 | offset as u16);
            }
            Operation::StoreHighC => bus.write(0xFF00 | self.regs.c as u16, self.regs.a),
            Operation::LoadHighC => self.regs.a = bus.read(0xFF00 | self.regs.c as u16),
            Operation::StoreAbs => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.a);
            }
            Operation::LoadAbs => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read(addr);
            }
            Operation::Push(pair) => {
                let val = self.regs.get16(pair);
                self.push_stack(bus, val);
            }
            Operation::Pop(pair) => {
                // POP AF goes through set_af, which drops the low nibble.
                let val = self.pop_stack(bus);
                self.regs.set16(pair, val);
            }
            Operation::Alu(op, src) => {
                let val = self.read_operand(bus, src);
                alu::accumulate(&mut self.regs, op, val);
            }
            Operation::Inc8(target) => {
                let val = self.read_operand(bus, target);
                let res = alu::inc8(&mut self.regs, val);
                self.write_operand(bus, target, res);
            }
            Operation::Dec8(target) => {
                let val = self.read_operand(bus, target);
                let res = alu::dec8(&mut self.regs, val);
                self.write_operand(bus, target, res);
            }
            Operation::Inc16(pair) => {
                let val = self.regs.get16(pair).wrapping_add(1);
                self.regs.set16(pair, val);
            }
            Operation::Dec16(pair) => {
                let val = self.regs.get16(pair).wrapping_sub(1);
                self.regs.set16(pair, val);
            }
            Operation::AddHl(pair) => {
                let val = self.regs.get16(pair);
                alu::add_hl(&mut self.regs, val);
            }
            Operation::AddSpOffset => {
                let offset = self.fetch8(bus);
                self.regs.sp = alu::sp_offset(&mut self.regs, offset);
            }
            Operation::Rlca => alu::rotate_a(&mut self.regs, ShiftOp::Rlc),
            Operation::Rrca => alu::rotate_a(&mut self.regs, ShiftOp::Rrc),
            Operation::Rla => alu::rotate_a(&mut self.regs, ShiftOp::Rl),
            Operation::Rra => alu::rotate_a(&mut self.regs, ShiftOp::Rr),
            Operation::Daa => alu::daa(&mut self.regs),
            Operation::Cpl => alu::cpl(&mut self.regs),
            Operation::Scf => alu::scf(&mut self.regs),
            Operation::Ccf => alu::ccf(&mut self.regs),
            Operation::Jr(cond) => {
                let offset = self.fetch8(bus) as i8;
                if self.condition(cond) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    return true;
                }
            }
            Operation::Jp(cond) => {
                let addr = self.fetch16(bus);
                if self.condition(cond) {
                    self.regs.pc = addr;
                    return true;
                }
            }
            Operation::JpHl => self.regs.pc = self.regs.hl(),
            Operation::Call(cond) => {
                let addr = self.fetch16(bus);
                if self.condition(cond) {
                    let ret = self.regs.pc;
                    self.push_stack(bus, ret);
                    self.regs.pc = addr;
                    return true;
                }
            }
            Operation::Ret(cond) => {
                if self.condition(cond) {
                    self.regs.pc = self.pop_stack(bus);
                    return true;
                }
            }
            Operation::Reti => {
                self.regs.pc = self.pop_stack(bus);
                self.interrupts.enable_now();
            }
            Operation::Rst(vector) => {
                let ret = self.regs.pc;
                self.push_stack(bus, ret);
                self.regs.pc = vector as u16;
            }
            Operation::Halt => self.halt(bus),
            Operation::Stop => {
                // The byte after STOP is skipped.
                self.fetch8(bus);
                debug!("STOP at {:04X}", self.instruction_addr);
                self.state = RunState::Stopped;
            }
            Operation::Di => self.interrupts.disable(),
            Operation::Ei => self.interrupts.schedule_enable(),
            // Resolved during decode.
            Operation::Prefix | Operation::Illegal => {}
            Operation::Shift(op, target) => {
                let val = self.read_operand(bus, target);
                let res = alu::shift(&mut self.regs, op, val);
                self.write_operand(bus, target, res);
            }
            Operation::Bit(bit, target) => {
                let val = self.read_operand(bus, target);
                alu::bit(&mut self.regs, bit, val);
            }
            Operation::Res(bit, target) => {
                let val = self.read_operand(bus, target);
                self.write_operand(bus, target, val & !(1 << bit));
            }
            Operation::Set(bit, target) => {
                let val = self.read_operand(bus, target);
                self.write_operand(bus, target, val | (1 << bit));
            }
        }
        false
    }

    fn halt<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        let pending = self.interrupts.poll(bus);
        if self.interrupts.ime || self.interrupts.enable_pending() {
            debug!("HALT at {:04X}", self.instruction_addr);
            self.state = RunState::Halted;
            return;
        }

        let triggered = match self.config.halt_bug {
            HaltBugTrigger::AnyRequest => self.interrupts.if_ & INTERRUPT_MASK != 0,
            HaltBugTrigger::EnabledRequest => pending != 0,
        };
        if triggered {
            // HALT falls through and the next opcode fetch fails to bump PC.
            debug!("HALT bug at {:04X}", self.instruction_addr);
            self.halt_bug = true;
        } else {
            debug!("HALT at {:04X} with IME clear", self.instruction_addr);
            self.state = RunState::Halted;
        }
    }

    fn condition(&self, cond: Option<Cond>) -> bool {
        match cond {
            None => true,
            Some(Cond::NZ) => !self.regs.flag(Flag::Z),
            Some(Cond::Z) => self.regs.flag(Flag::Z),
            Some(Cond::NC) => !self.regs.flag(Flag::C),
            Some(Cond::C) => self.regs.flag(Flag::C),
        }
    }

    #[inline(always)]
    fn fetch8<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let val = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    #[inline(always)]
    fn fetch16<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read_operand<B: Bus + ?Sized>(&mut self, bus: &mut B, operand: Operand8) -> u8 {
        match operand {
            Operand8::Reg(reg) => self.regs.get8(reg),
            Operand8::HlMem => bus.read(self.regs.hl()),
            Operand8::Imm => self.fetch8(bus),
        }
    }

    fn write_operand<B: Bus + ?Sized>(&mut self, bus: &mut B, operand: Operand8, val: u8) {
        match operand {
            Operand8::Reg(reg) => self.regs.set8(reg, val),
            Operand8::HlMem => bus.write(self.regs.hl(), val),
            // Table validation rejects immediates as destinations.
            Operand8::Imm => {}
        }
    }

    pub(crate) fn push_stack<B: Bus + ?Sized>(&mut self, bus: &mut B, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    fn pop_stack<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }
}

#[inline]
fn step_hl(hl: u16, inc: bool) -> u16 {
    if inc {
        hl.wrapping_add(1)
    } else {
        hl.wrapping_sub(1)
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("state", &self.state)
            .field("interrupts", &self.interrupts)
            .field("halt_bug", &self.halt_bug)
            .field("cycles", &self.cycles)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

