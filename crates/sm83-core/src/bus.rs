/// Interrupt Enable register (gbdev.io/pandocs/Interrupts.html).
pub const IE_ADDR: u16 = 0xFFFF;
/// Interrupt Flag register.
pub const IF_ADDR: u16 = 0xFF0F;

const ADDRESS_SPACE: usize = 0x1_0000;

/// Byte-addressed view of the 16-bit address space, as seen from the CPU.
///
/// Both operations are total: whatever sits behind an address (ROM, I/O
/// registers, nothing at all) is the implementation's business, and the CPU
/// never interprets a value as an error. `read` takes `&mut self` because
/// hardware registers commonly have read side effects.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, val: u8);
}

impl<B: Bus + ?Sized> Bus for &mut B {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        (**self).write(addr, val)
    }
}

/// 64 KiB of plain RAM with nothing mapped into it.
///
/// IE and IF are ordinary bytes at their architectural addresses, so tests
/// (or a host stub) raise interrupts simply by writing to `IF_ADDR`.
#[derive(Clone)]
pub struct FlatBus {
    mem: Box<[u8]>,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            mem: vec![0; ADDRESS_SPACE].into_boxed_slice(),
        }
    }

    /// Copy `data` into memory starting at `addr`, wrapping at the top of the
    /// address space.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let target = addr.wrapping_add(offset as u16);
            self.mem[target as usize] = byte;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FlatBus {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
    }
}

impl std::fmt::Debug for FlatBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatBus")
            .field("ie", &self.mem[IE_ADDR as usize])
            .field("if", &self.mem[IF_ADDR as usize])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_address_space() {
        let mut bus = FlatBus::new();
        bus.load(0xFFFE, &[1, 2, 3]);
        assert_eq!(bus.read(0xFFFE), 1);
        assert_eq!(bus.read(IE_ADDR), 2);
        assert_eq!(bus.read(0x0000), 3);
    }

    #[test]
    fn mutable_reference_is_a_bus() {
        fn poke<B: Bus>(mut bus: B) {
            bus.write(IF_ADDR, 0x1F);
        }

        let mut bus = FlatBus::default();
        poke(&mut bus);
        assert_eq!(bus.as_slice()[IF_ADDR as usize], 0x1F);
    }
}
