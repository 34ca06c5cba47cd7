//! Sharp SM83 (Game Boy DMG) CPU core.
//!
//! This crate contains the instruction set, register file, and interrupt
//! handling of the DMG CPU. Memory and every mapped device sit behind the
//! [`bus::Bus`] trait supplied by the host, which drives execution through
//! [`cpu::Cpu::step`].

/// Flag-producing arithmetic helpers.
mod alu;

/// Memory bus contract and a flat RAM implementation.
pub mod bus;

/// Fetch/decode/execute engine.
pub mod cpu;

/// Error types.
pub mod error;

/// Hardware revisions and construction-time configuration.
pub mod hardware;

/// Interrupt sources, IME bookkeeping and dispatch.
pub mod interrupts;

/// Instruction descriptors for both opcode maps.
pub mod opcodes;

/// CPU registers and flags.
pub mod registers;

pub use bus::{Bus, FlatBus};
pub use cpu::{Cpu, CpuSnapshot, RunState, T_CYCLES_PER_M_CYCLE};
pub use error::{CpuError, TableError};
pub use hardware::{BootMode, CpuConfig, DmgRevision, HaltBugTrigger};
pub use interrupts::Interrupt;
pub use registers::{Flag, Reg8, Reg16, Registers};
