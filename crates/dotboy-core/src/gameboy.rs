use std::io;

use crate::{
    cartridge::Cartridge,
    input::Key,
    mmu::Mmu,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};

/// Video cycles in one full frame (154 lines of 456 dots).
pub const FRAME_CYCLES: u32 = 456 * 154;

const STOP_OPCODE: u8 = 0x10;

/// An instruction interpreter driven by [`GameBoy`].
pub trait Cpu {
    /// Execute one instruction (or interrupt dispatch) against the bus and
    /// return the CPU cycles it took.
    fn step(&mut self, mmu: &mut Mmu) -> u32;

    /// Address of the next instruction.
    fn pc(&self) -> u16;
}

/// A CPU that never executes anything. Each step costs 4 cycles, which is
/// enough to run the rest of the machine headless.
#[derive(Debug, Clone)]
pub struct IdleCpu {
    pc: u16,
}

impl IdleCpu {
    pub fn new() -> Self {
        Self { pc: 0x0100 }
    }
}

impl Default for IdleCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for IdleCpu {
    fn step(&mut self, _mmu: &mut Mmu) -> u32 {
        4
    }

    fn pc(&self) -> u16 {
        self.pc
    }
}

pub struct GameBoy<C: Cpu> {
    pub cpu: C,
    pub mmu: Mmu,
}

impl<C: Cpu> GameBoy<C> {
    pub fn new(cpu: C, cart: Cartridge) -> Self {
        Self {
            cpu,
            mmu: Mmu::new(cart),
        }
    }

    pub fn new_with_mode(cpu: C, cart: Cartridge, cgb: bool) -> Self {
        Self {
            cpu,
            mmu: Mmu::new_with_mode(cart, cgb),
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.mmu.is_cgb()
    }

    /// Run one CPU step and advance the rest of the machine to match.
    /// Returns the video cycles that elapsed.
    pub fn step(&mut self) -> u32 {
        if self.mmu.read_byte(self.cpu.pc()) == STOP_OPCODE {
            self.mmu.switch_speed();
        }
        let cycles = self.cpu.step(&mut self.mmu);
        self.mmu.advance(cycles)
    }

    /// Step until the PPU completes a frame. Gives up after two frames
    /// worth of video cycles, which happens while the LCD is off.
    pub fn run_frame(&mut self) -> bool {
        let mut elapsed = 0u32;
        while elapsed < FRAME_CYCLES * 2 {
            elapsed += self.step().max(1);
            if self.check_and_reset_frame() {
                return true;
            }
        }
        false
    }

    pub fn check_and_reset_frame(&mut self) -> bool {
        self.mmu.ppu.take_frame_updated()
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.mmu.ppu.framebuffer()
    }

    pub fn key_down(&mut self, key: Key) {
        self.mmu.key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.mmu.key_up(key);
    }

    /// Write battery-backed RAM and the RTC epoch, if the cartridge has them.
    pub fn save(&self) -> io::Result<()> {
        self.mmu.save_cart_ram()
    }
}
