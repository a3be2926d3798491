use crate::interrupt::{Interrupt, InterruptFlags};

/// Joypad buttons. The low two bits of the discriminant are the bit in the
/// P1 nibble; bit 2 picks the group (0 = d-pad, 1 = buttons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Right = 0,
    Left = 1,
    Up = 2,
    Down = 3,
    A = 4,
    B = 5,
    Select = 6,
    Start = 7,
}

impl Key {
    fn is_button(self) -> bool {
        self as u8 & 0x04 != 0
    }

    fn bit(self) -> u8 {
        1 << (self as u8 & 0x03)
    }
}

/// P1/JOYP (FF00).
#[derive(Debug, Clone)]
pub struct Input {
    select: u8,
    // 1 = pressed
    dpad: u8,
    buttons: u8,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            dpad: 0,
            buttons: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= !self.dpad & 0x0F;
        }
        if self.select & 0x20 == 0 {
            low &= !self.buttons & 0x0F;
        }
        0xC0 | self.select | low
    }

    /// Only the select bits are writable.
    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    pub fn key_down(&mut self, key: Key, intf: &mut InterruptFlags) {
        let group = if key.is_button() {
            &mut self.buttons
        } else {
            &mut self.dpad
        };
        if *group & key.bit() == 0 {
            *group |= key.bit();
            intf.request(Interrupt::Joypad);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if key.is_button() {
            self.buttons &= !key.bit();
        } else {
            self.dpad &= !key.bit();
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}
