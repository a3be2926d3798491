use crate::interrupt::{Interrupt, InterruptFlags};

/// SB/SC (FF01/FF02) with no cable attached.
///
/// A transfer started on the internal clock completes at once: the partner
/// reads as a dead line (0xFF) and the outgoing byte is kept so test ROMs
/// that print over serial can be observed.
#[derive(Debug, Clone)]
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    cgb_mode: bool,
}

impl Serial {
    pub fn new(cgb: bool) -> Self {
        Self {
            sb: 0,
            sc: 0,
            out_buf: Vec::new(),
            cgb_mode: cgb,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            // Bit 1 (clock speed) only exists on CGB
            0xFF02 if self.cgb_mode => self.sc | 0x7C,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, intf: &mut InterruptFlags) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val;
                if val & 0x81 == 0x81 {
                    self.out_buf.push(self.sb);
                    self.sb = 0xFF;
                    self.sc &= 0x7F;
                    intf.request(Interrupt::Serial);
                }
            }
            _ => {}
        }
    }

    /// Drain the bytes sent so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}
