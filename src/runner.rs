use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, trace};
use sm83_core::bus::Bus;
use sm83_core::{Cpu, CpuError, RunState, TableError};
use thiserror::Error;

use crate::config::RunnerConfig;
use crate::serial::{SerialBus, serial_verdict};

const ADDRESS_SPACE: usize = 0x1_0000;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to read program image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program image of {len} bytes does not fit at {load_address:#06X}")]
    ImageTooLarge { len: usize, load_address: u16 },

    #[error("opcode table rejected: {0}")]
    Table(#[from] TableError),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    CycleLimit,
    /// HALT with IME clear and nothing pending: nothing can wake the CPU.
    Halted,
    Stopped,
    /// Serial output contained a pass/fail verdict.
    SerialResult { passed: bool },
    Illegal { opcode: u8, addr: u16 },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            RunOutcome::Illegal { .. } | RunOutcome::SerialResult { passed: false }
        )
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::CycleLimit => f.write_str("cycle limit reached"),
            RunOutcome::Halted => f.write_str("halted with interrupts disabled"),
            RunOutcome::Stopped => f.write_str("stopped"),
            RunOutcome::SerialResult { passed: true } => f.write_str("serial output reports Passed"),
            RunOutcome::SerialResult { passed: false } => f.write_str("serial output reports Failed"),
            RunOutcome::Illegal { opcode, addr } => {
                write!(f, "illegal opcode {opcode:02X} at {addr:04X}")
            }
        }
    }
}

/// A CPU wired to a serial-capturing flat bus.
pub struct Runner {
    pub cpu: Cpu,
    pub bus: SerialBus,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        let mut cpu = Cpu::new(config.cpu_config())?;
        if let Some(entry) = config.entry_point {
            cpu.registers_mut().pc = entry;
        }
        Ok(Self {
            cpu,
            bus: SerialBus::new(),
            config,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn load_image(&mut self, data: &[u8]) -> Result<(), RunnerError> {
        let load_address = self.config.load_address;
        if load_address as usize + data.len() > ADDRESS_SPACE {
            return Err(RunnerError::ImageTooLarge {
                len: data.len(),
                load_address,
            });
        }
        self.bus.load(load_address, data);
        info!("Loaded {} bytes at {:04X}", data.len(), load_address);
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), RunnerError> {
        let data = std::fs::read(path).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_image(&data)
    }

    /// Step until one of the stop conditions in the config is met.
    pub fn run(&mut self) -> RunOutcome {
        let start = self.cpu.cycles();
        let mut serial_checked = 0;
        loop {
            if self.cpu.cycles() - start >= self.config.max_cycles {
                return RunOutcome::CycleLimit;
            }

            if self.config.trace && self.cpu.state() == RunState::Running {
                let pc = self.cpu.pc();
                trace!(
                    "{:04X}  {:<16} {}",
                    pc,
                    disassemble_at(&self.cpu, &mut self.bus, pc),
                    self.cpu.registers()
                );
            }

            if let Err(CpuError::IllegalOpcode { opcode, addr }) = self.cpu.step(&mut self.bus) {
                return RunOutcome::Illegal { opcode, addr };
            }

            if let Some(passed) = serial_verdict(self.bus.peek_output(), &mut serial_checked) {
                return RunOutcome::SerialResult { passed };
            }

            match self.cpu.state() {
                RunState::Stopped => return RunOutcome::Stopped,
                RunState::Halted
                    if self.config.stop_on_halt
                        && !self.cpu.ime()
                        && self.cpu.interrupts().pending() == 0 =>
                {
                    debug!("HALT at {:04X} cannot be woken", self.cpu.pc());
                    return RunOutcome::Halted;
                }
                _ => {}
            }
        }
    }

    pub fn serial_output(&self) -> &[u8] {
        self.bus.peek_output()
    }
}

/// Disassemble the instruction at `addr`, operands included.
pub fn disassemble_at<B: Bus + ?Sized>(cpu: &Cpu, bus: &mut B, addr: u16) -> String {
    let instr = cpu.decode_at(bus, addr);
    let operands: Vec<u8> = (1..=instr.length as u16)
        .map(|offset| bus.read(addr.wrapping_add(offset)))
        .collect();
    instr.disassemble(&operands)
}
