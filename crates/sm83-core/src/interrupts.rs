use log::{debug, trace};

use crate::bus::{Bus, IE_ADDR, IF_ADDR};
use crate::cpu::{Cpu, RunState};

// Interrupt vectors (gbdev.io/pandocs/Interrupts.html)
const INTERRUPT_VBLANK: u16 = 0x40;
const INTERRUPT_STAT: u16 = 0x48;
const INTERRUPT_TIMER: u16 = 0x50;
const INTERRUPT_SERIAL: u16 = 0x58;
const INTERRUPT_JOYPAD: u16 = 0x60;

/// Only the low five bits of IE/IF name interrupt sources.
pub const INTERRUPT_MASK: u8 = 0x1F;

/// Machine cycles spent acknowledging an interrupt: two wait states, the
/// two stack writes and the jump.
pub const DISPATCH_CYCLES: u32 = 5;

/// Interrupt sources in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interrupt {
    VBlank,
    Stat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::Stat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Bit in IE/IF.
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::Stat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => INTERRUPT_VBLANK,
            Interrupt::Stat => INTERRUPT_STAT,
            Interrupt::Timer => INTERRUPT_TIMER,
            Interrupt::Serial => INTERRUPT_SERIAL,
            Interrupt::Joypad => INTERRUPT_JOYPAD,
        }
    }

    /// The source serviced first among `pending` bits: lowest bit wins.
    pub fn highest_priority(pending: u8) -> Option<Interrupt> {
        Interrupt::ALL
            .into_iter()
            .find(|interrupt| pending & interrupt.bit() != 0)
    }
}

/// Raise `interrupt` in IF through the bus, as a device would.
pub fn request<B: Bus + ?Sized>(bus: &mut B, interrupt: Interrupt) {
    let flags = bus.read(IF_ADDR);
    bus.write(IF_ADDR, flags | interrupt.bit());
}

/// IME, the EI delay latch and the last IE/IF values seen on the bus.
///
/// IE and IF live behind the bus; the copies here are refreshed on every
/// poll and only serve inspection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptState {
    pub(crate) ime: bool,
    pub(crate) ime_enable_delay: u8,
    pub(crate) ie: u8,
    pub(crate) if_: u8,
}

impl InterruptState {
    #[inline]
    pub fn ime(&self) -> bool {
        self.ime
    }

    /// EI executed and IME not yet set.
    #[inline]
    pub fn enable_pending(&self) -> bool {
        self.ime_enable_delay > 0
    }

    #[inline]
    pub fn ie(&self) -> u8 {
        self.ie
    }

    #[inline]
    pub fn if_flags(&self) -> u8 {
        self.if_
    }

    /// Requests that are both flagged and enabled.
    #[inline]
    pub fn pending(&self) -> u8 {
        self.ie & self.if_ & INTERRUPT_MASK
    }

    pub(crate) fn poll<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        self.ie = bus.read(IE_ADDR);
        self.if_ = bus.read(IF_ADDR);
        self.pending()
    }

    /// EI: IME goes high once the following instruction has completed.
    pub(crate) fn schedule_enable(&mut self) {
        if !self.ime {
            self.ime_enable_delay = 2;
        }
    }

    pub(crate) fn disable(&mut self) {
        self.ime = false;
        self.ime_enable_delay = 0;
    }

    pub(crate) fn enable_now(&mut self) {
        self.ime = true;
        self.ime_enable_delay = 0;
    }

    /// Called before an instruction executes: whether this instruction is
    /// the one whose completion sets IME.
    #[inline]
    pub(crate) fn begin_instruction(&self) -> bool {
        self.ime_enable_delay == 1
    }

    #[inline]
    pub(crate) fn end_instruction(&mut self, enable_after: bool) {
        if enable_after && self.ime_enable_delay > 0 {
            self.ime = true;
        }
        if self.ime_enable_delay > 0 {
            self.ime_enable_delay -= 1;
        }
    }
}

impl Cpu {
    /// Check for pending interrupts between instructions.
    ///
    /// A halted CPU wakes on any enabled request even with IME clear; with IME
    /// set the highest-priority request is acknowledged and its vector entered.
    /// Returns the machine cycles the acknowledge consumed.
    pub(crate) fn handle_interrupts<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let pending = self.interrupts.poll(bus);
        if pending == 0 {
            return 0;
        }

        if self.state == RunState::Halted {
            debug!("HALT exit at {:04X}, pending {:02X}", self.regs.pc, pending);
            self.state = RunState::Running;
        }

        if !self.interrupts.ime {
            return 0;
        }

        let Some(interrupt) = Interrupt::highest_priority(pending) else {
            return 0;
        };

        self.state = RunState::InterruptDispatch;
        let flags = self.interrupts.if_ & !interrupt.bit();
        bus.write(IF_ADDR, flags);
        self.interrupts.if_ = flags;
        self.interrupts.disable();

        let return_pc = self.regs.pc;
        self.push_stack(bus, return_pc);
        self.regs.pc = interrupt.vector();
        self.state = RunState::Running;

        trace!(
            "dispatch {:?} from {:04X} to {:04X}",
            interrupt,
            return_pc,
            interrupt.vector()
        );
        DISPATCH_CYCLES
    }
}
