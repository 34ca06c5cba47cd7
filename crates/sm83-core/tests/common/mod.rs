#![allow(dead_code)]

use sm83_core::bus::{Bus, FlatBus, IE_ADDR, IF_ADDR};
use sm83_core::{Cpu, CpuConfig};

/// Entry point the default (boot-ROM-skipping) reset jumps to.
pub const ENTRY: u16 = 0x0100;

pub fn cpu_with(config: CpuConfig) -> Cpu {
    Cpu::new(config).expect("opcode table must build")
}

/// Default CPU plus a flat bus holding `program` at the entry point.
pub fn machine(program: &[u8]) -> (Cpu, FlatBus) {
    machine_with(CpuConfig::default(), program)
}

pub fn machine_with(config: CpuConfig, program: &[u8]) -> (Cpu, FlatBus) {
    let cpu = cpu_with(config);
    let mut bus = FlatBus::new();
    bus.load(cpu.pc(), program);
    (cpu, bus)
}

/// Step `count` times, returning the total machine cycles.
pub fn run_steps<B: Bus>(cpu: &mut Cpu, bus: &mut B, count: usize) -> u32 {
    (0..count)
        .map(|_| cpu.step(bus).expect("unexpected CPU error"))
        .sum()
}

pub fn set_interrupts<B: Bus>(bus: &mut B, enable: u8, flags: u8) {
    bus.write(IE_ADDR, enable);
    bus.write(IF_ADDR, flags);
}

/// Bus wrapper that records every write in order.
#[derive(Default)]
pub struct RecordingBus {
    pub inner: FlatBus,
    pub writes: Vec<(u16, u8)>,
}

impl Bus for RecordingBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.inner.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.writes.push((addr, val));
        self.inner.write(addr, val);
    }
}
