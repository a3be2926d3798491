use crate::interrupt::{Interrupt, InterruptFlags};

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    last_signal: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, intf: &mut InterruptFlags) {
        match addr {
            0xFF04 => {
                self.div = 0;
                self.update_signal(intf);
            }
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                self.tac = val & 0x07;
                self.update_signal(intf);
            }
            _ => {}
        }
    }

    /// Advance the timer by `cycles` CPU cycles and request the timer
    /// interrupt when TIMA overflows.
    pub fn step(&mut self, cycles: u32, intf: &mut InterruptFlags) {
        for _ in 0..cycles {
            self.div = self.div.wrapping_add(1);
            self.update_signal(intf);
        }
    }

    /// TIMA ticks on the falling edge of the selected divider bit ANDed
    /// with the enable bit, so DIV resets and TAC writes can tick it too.
    fn update_signal(&mut self, intf: &mut InterruptFlags) {
        let new = Self::signal_with(self.div, self.tac);
        if self.last_signal && !new {
            self.increment(intf);
        }
        self.last_signal = new;
    }

    fn increment(&mut self, intf: &mut InterruptFlags) {
        if self.tima == 0xFF {
            self.tima = self.tma;
            intf.request(Interrupt::Timer);
        } else {
            self.tima += 1;
        }
    }

    fn timer_bit_with(div: u16, tac: u8) -> u8 {
        match tac & 0x03 {
            0x00 => ((div >> 9) & 1) as u8,
            0x01 => ((div >> 3) & 1) as u8,
            0x02 => ((div >> 5) & 1) as u8,
            _ => ((div >> 7) & 1) as u8,
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        tac & 0x04 != 0 && Self::timer_bit_with(div, tac) != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_counts_every_256_cycles() {
        let mut timer = Timer::new();
        let mut intf = InterruptFlags::new();
        timer.step(255, &mut intf);
        assert_eq!(timer.read(0xFF04), 0);
        timer.step(1, &mut intf);
        assert_eq!(timer.read(0xFF04), 1);
        timer.write(0xFF04, 0x55, &mut intf);
        assert_eq!(timer.read(0xFF04), 0);
    }

    #[test]
    fn tima_overflow_reloads_and_interrupts() {
        let mut timer = Timer::new();
        let mut intf = InterruptFlags::new();
        timer.write(0xFF06, 0xAB, &mut intf);
        timer.write(0xFF05, 0xFF, &mut intf);
        // 16-cycle period
        timer.write(0xFF07, 0x05, &mut intf);
        timer.step(16, &mut intf);
        assert_eq!(timer.read(0xFF05), 0xAB);
        assert!(intf.is_requested(Interrupt::Timer));
    }

    #[test]
    fn disabled_timer_does_not_count() {
        let mut timer = Timer::new();
        let mut intf = InterruptFlags::new();
        timer.write(0xFF07, 0x01, &mut intf);
        timer.step(4096, &mut intf);
        assert_eq!(timer.read(0xFF05), 0);
        assert_eq!(timer.read(0xFF07), 0xF9);
    }

    #[test]
    fn tac_periods() {
        for (tac, period) in [(0x04u8, 1024u32), (0x05, 16), (0x06, 64), (0x07, 256)] {
            let mut timer = Timer::new();
            let mut intf = InterruptFlags::new();
            timer.write(0xFF07, tac, &mut intf);
            timer.step(period * 4, &mut intf);
            assert_eq!(timer.read(0xFF05), 4, "tac {tac:#04x}");
        }
    }
}
