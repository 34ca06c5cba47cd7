use sm83_core::bus::{Bus, FlatBus};
use sm83_core::interrupts::{Interrupt, request};

pub const SB_ADDR: u16 = 0xFF01;
pub const SC_ADDR: u16 = 0xFF02;

// SC bit 7 starts a transfer, bit 0 selects the internal clock.
const SC_START: u8 = 0x80;
const SC_INTERNAL_CLOCK: u8 = 0x01;
// Unused SC bits read back as 1 on DMG.
const SC_UNUSED: u8 = 0x7E;

/// Flat RAM with the serial port registers mapped on top.
///
/// No cable is attached: an internally clocked transfer completes as soon as
/// it is started, the outgoing byte is captured and SB reads back 0xFF, as
/// with a dead line. Test ROMs that print through the serial port (blargg's
/// suites) therefore show their output immediately. With an external clock
/// the transfer never completes and SC bit 7 stays set.
#[derive(Debug, Default)]
pub struct SerialBus {
    mem: FlatBus,
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
}

impl SerialBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        self.mem.load(addr, data);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }

    fn start_transfer(&mut self) {
        self.out_buf.push(self.sb);
        self.sb = 0xFF;
        self.sc &= !SC_START;
        request(&mut self.mem, Interrupt::Serial);
    }
}

impl Bus for SerialBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            SB_ADDR => self.sb,
            SC_ADDR => self.sc | SC_UNUSED,
            _ => self.mem.read(addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            SB_ADDR => self.sb = val,
            SC_ADDR => {
                self.sc = val & (SC_START | SC_INTERNAL_CLOCK);
                if val & SC_START != 0 && val & SC_INTERNAL_CLOCK != 0 {
                    self.start_transfer();
                }
            }
            _ => self.mem.write(addr, val),
        }
    }
}

const PASSED: &[u8] = b"Passed";
const FAILED: &[u8] = b"Failed";

/// Scan serial output for the verdict blargg-style test ROMs print.
///
/// Only bytes appended since the previous call are searched, plus enough
/// lookbehind to catch a marker split across calls. `checked_up_to` tracks
/// the scanned length between calls; start it at 0.
pub fn serial_verdict(output: &[u8], checked_up_to: &mut usize) -> Option<bool> {
    if output.len() == *checked_up_to {
        return None;
    }

    let lookbehind = PASSED.len().max(FAILED.len()) - 1;
    let start = checked_up_to.saturating_sub(lookbehind).min(output.len());
    let window = &output[start..];
    *checked_up_to = output.len();

    if window.windows(PASSED.len()).any(|chunk| chunk == PASSED) {
        Some(true)
    } else if window.windows(FAILED.len()).any(|chunk| chunk == FAILED) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm83_core::bus::IF_ADDR;

    #[test]
    fn internal_clock_transfer_captures_byte() {
        let mut bus = SerialBus::new();
        bus.write(SB_ADDR, b'P');
        bus.write(SC_ADDR, 0x81);

        assert_eq!(bus.peek_output(), b"P");
        assert_eq!(bus.read(SB_ADDR), 0xFF);
        assert_eq!(bus.read(SC_ADDR), 0x7F);
        assert_eq!(bus.read(IF_ADDR) & 0x08, 0x08);
        assert_eq!(bus.take_output(), b"P".to_vec());
        assert!(bus.peek_output().is_empty());
    }

    #[test]
    fn external_clock_transfer_stays_pending() {
        let mut bus = SerialBus::new();
        bus.write(SB_ADDR, 0x42);
        bus.write(SC_ADDR, 0x80);

        assert!(bus.peek_output().is_empty());
        assert_eq!(bus.read(SC_ADDR), 0xFE);
        assert_eq!(bus.read(IF_ADDR), 0x00);
    }

    #[test]
    fn other_addresses_are_plain_ram() {
        let mut bus = SerialBus::new();
        bus.load(0xC000, &[1, 2, 3]);
        assert_eq!(bus.read(0xC001), 2);
        bus.write(0xFF03, 0x99);
        assert_eq!(bus.read(0xFF03), 0x99);
    }

    #[test]
    fn verdict_detection() {
        let mut checked = 0;
        assert_eq!(serial_verdict(b"cpu_instrs\n\nPassed all tests", &mut checked), Some(true));
        let mut checked = 0;
        assert_eq!(serial_verdict(b"01:ok 02:Failed #3", &mut checked), Some(false));
        let mut checked = 0;
        assert_eq!(serial_verdict(b"still running", &mut checked), None);
        assert_eq!(checked, 13);
    }

    #[test]
    fn verdict_scan_is_incremental() {
        let mut output = b"01:ok 02:Pa".to_vec();
        let mut checked = 0;
        assert_eq!(serial_verdict(&output, &mut checked), None);
        assert_eq!(checked, output.len());

        // Unchanged output is not rescanned.
        assert_eq!(serial_verdict(&output, &mut checked), None);

        // A marker split across calls is still found.
        output.extend_from_slice(b"ssed");
        assert_eq!(serial_verdict(&output, &mut checked), Some(true));
    }

    #[test]
    fn old_output_outside_the_lookbehind_is_not_rescanned() {
        let output = b"Failed earlier, then more text";
        let mut checked = 20;
        assert_eq!(serial_verdict(output, &mut checked), None);
        assert_eq!(checked, output.len());
    }
}
