use thiserror::Error;

/// Failures surfaced by `Cpu::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("illegal opcode {opcode:#04X} at {addr:#06X}")]
    IllegalOpcode { opcode: u8, addr: u16 },
}

/// Internal inconsistencies found while building the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("{table} slot {slot:#04X} holds a descriptor for opcode {opcode:#04X}")]
    SlotMismatch {
        table: TableKind,
        slot: u8,
        opcode: u8,
    },

    #[error("{table} opcode {opcode:#04X} declares {declared} operand bytes, operation takes {expected}")]
    LengthMismatch {
        table: TableKind,
        opcode: u8,
        declared: u8,
        expected: u8,
    },

    #[error("{table} opcode {opcode:#04X} has no duration")]
    MissingDuration { table: TableKind, opcode: u8 },

    #[error("{table} opcode {opcode:#04X} stores its result into an immediate operand")]
    ImmediateDestination { table: TableKind, opcode: u8 },

    #[error("{table} opcode {opcode:#04X} has inconsistent branch timing")]
    BranchTiming { table: TableKind, opcode: u8 },
}

/// Which of the two 256-entry tables a descriptor lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Unprefixed,
    Prefixed,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Unprefixed => f.write_str("unprefixed"),
            TableKind::Prefixed => f.write_str("CB-prefixed"),
        }
    }
}
