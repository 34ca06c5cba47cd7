#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// DMG hardware revision.
///
/// The revisions differ in the register values the boot ROM leaves behind,
/// which is what a boot-ROM-skipping reset has to reproduce.
pub enum DmgRevision {
    Rev0,
    RevA,
    RevB,
    #[default]
    RevC,
}

/// Register values left by the boot ROM, from gbdev.io/pandocs/Power_Up_State.html.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootRegisters {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

const DMG0_BOOT: BootRegisters = BootRegisters {
    a: 0x01,
    f: 0x00,
    b: 0xFF,
    c: 0x13,
    d: 0x00,
    e: 0xC1,
    h: 0x84,
    l: 0x03,
};

const DMG_ABC_BOOT: BootRegisters = BootRegisters {
    a: 0x01,
    f: 0xB0,
    b: 0x00,
    c: 0x13,
    d: 0x00,
    e: 0xD8,
    h: 0x01,
    l: 0x4D,
};

impl DmgRevision {
    #[inline]
    pub const fn boot_registers(self) -> BootRegisters {
        match self {
            DmgRevision::Rev0 => DMG0_BOOT,
            DmgRevision::RevA | DmgRevision::RevB | DmgRevision::RevC => DMG_ABC_BOOT,
        }
    }
}

/// How `Cpu::reset` initializes the register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BootMode {
    /// Start at the cartridge entry point with the post-boot register state.
    #[default]
    SkipBootRom,
    /// Start at 0x0000 from a neutral state, for running a real boot ROM.
    PowerOn,
}

/// Which pending requests make HALT misbehave when IME is clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HaltBugTrigger {
    /// Any request bit set in IF, enabled or not.
    #[default]
    AnyRequest,
    /// Only requests that are also enabled in IE.
    EnabledRequest,
}

/// Construction-time knobs for the CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CpuConfig {
    pub boot: BootMode,
    pub revision: DmgRevision,
    pub halt_bug: HaltBugTrigger,
}

impl CpuConfig {
    pub fn power_on() -> Self {
        Self {
            boot: BootMode::PowerOn,
            ..Self::default()
        }
    }
}
