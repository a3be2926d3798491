use std::io;

use crate::{
    apu::Apu,
    cartridge::Cartridge,
    input::{Input, Key},
    interrupt::InterruptFlags,
    ppu::Ppu,
    serial::Serial,
    timer::Timer,
};

const WRAM_BANK_SIZE: usize = 0x1000;
const OAM_DMA_LEN: u16 = 0xA0;
const HDMA_CHUNK: u16 = 0x10;
/// Video cycles spent per 16-byte VRAM DMA chunk.
const HDMA_CHUNK_CYCLES: u32 = 8;

/// Transfer mode for CGB DMA operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmaMode {
    /// General DMA (immediate)
    Gdma,
    /// HBlank DMA
    Hdma,
}

#[derive(Debug)]
struct HdmaState {
    /// 16-bit source pointer (low nibble forced to 0)
    src: u16,
    /// Destination in VRAM (0x8000 | (dst & 0x1FF0))
    dst: u16,
    /// Chunks left minus one; wraps to 0x7F after the last chunk
    remain: u8,
    mode: DmaMode,
    active: bool,
}

/// The system bus.
///
/// Owns every memory-mapped unit and is the only holder of IF. CPU cycles
/// enter through [`Mmu::advance`], which converts them to the video clock
/// and drives DMA, timer, PPU and APU in that order.
pub struct Mmu {
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub hram: [u8; 0x7F],
    pub cart: Cartridge,
    pub intf: InterruptFlags,
    pub ie_reg: u8,
    pub serial: Serial,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub input: Input,
    hdma: HdmaState,
    key1_shift: bool,
    double_speed: bool,
    cgb_mode: bool,
}

impl Mmu {
    /// Build the bus for `cart`, choosing color mode from its header.
    pub fn new(cart: Cartridge) -> Self {
        let cgb = cart.cgb;
        Self::new_with_mode(cart, cgb)
    }

    pub fn new_with_mode(cart: Cartridge, cgb: bool) -> Self {
        let mut mmu = Self {
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            hram: [0; 0x7F],
            cart,
            intf: InterruptFlags::new(),
            ie_reg: 0,
            serial: Serial::new(cgb),
            ppu: Ppu::new_with_mode(cgb),
            apu: Apu::new(),
            timer: Timer::new(),
            input: Input::new(),
            hdma: HdmaState {
                src: 0,
                dst: Self::sanitize_vram_dma_dest(0),
                remain: 0x7F,
                mode: DmaMode::Gdma,
                active: false,
            },
            key1_shift: false,
            double_speed: false,
            cgb_mode: cgb,
        };
        mmu.apply_boot_state();
        mmu
    }

    /// Register values left behind by the boot ROM.
    fn apply_boot_state(&mut self) {
        const BOOT_REGS: [(u16, u8); 31] = [
            (0xFF05, 0x00),
            (0xFF06, 0x00),
            (0xFF07, 0x00),
            (0xFF10, 0x80),
            (0xFF11, 0xBF),
            (0xFF12, 0xF3),
            (0xFF14, 0xBF),
            (0xFF16, 0x3F),
            (0xFF17, 0x00),
            (0xFF19, 0xBF),
            (0xFF1A, 0x7F),
            (0xFF1B, 0xFF),
            (0xFF1C, 0x9F),
            (0xFF1E, 0xFF),
            (0xFF20, 0xFF),
            (0xFF21, 0x00),
            (0xFF22, 0x00),
            (0xFF23, 0xBF),
            (0xFF24, 0x77),
            (0xFF25, 0xF3),
            (0xFF26, 0xF1),
            (0xFF40, 0x91),
            (0xFF42, 0x00),
            (0xFF43, 0x00),
            (0xFF45, 0x00),
            (0xFF47, 0xFC),
            (0xFF48, 0xFF),
            (0xFF49, 0xFF),
            (0xFF4A, 0x00),
            (0xFF4B, 0x00),
            (0xFFFF, 0x00),
        ];
        for (addr, val) in BOOT_REGS {
            self.write_byte(addr, val);
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb_mode
    }

    pub fn double_speed(&self) -> bool {
        self.double_speed
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.cart.read(addr),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cart.read(addr),
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize],
            0xE000..=0xEFFF => self.wram[0][(addr - 0xE000) as usize],
            0xF000..=0xFDFF => self.wram[self.wram_bank][(addr - 0xF000) as usize],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => 0x00,
            0xFF00 => self.input.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => 0xE0 | self.intf.bits(),
            0xFF10..=0xFF3F => self.apu.read_reg(addr),
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => self.ppu.read_reg(addr),
            0xFF4D if self.cgb_mode => {
                let speed = if self.double_speed { 0x80 } else { 0 };
                0x7E | speed | self.key1_shift as u8
            }
            0xFF51 if self.cgb_mode => (self.hdma.src >> 8) as u8,
            0xFF52 if self.cgb_mode => self.hdma.src as u8,
            0xFF53 if self.cgb_mode => (self.hdma.dst >> 8) as u8,
            0xFF54 if self.cgb_mode => self.hdma.dst as u8,
            0xFF55 if self.cgb_mode => {
                let busy = if self.hdma.active { 0 } else { 0x80 };
                self.hdma.remain | busy
            }
            0xFF70 if self.cgb_mode => 0xF8 | self.wram_bank as u8,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => {
                log::debug!("Unmapped read {:04X}", addr);
                0xFF
            }
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.cart.write(addr, val),
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => self.cart.write(addr, val),
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize] = val,
            0xE000..=0xEFFF => self.wram[0][(addr - 0xE000) as usize] = val,
            0xF000..=0xFDFF => self.wram[self.wram_bank][(addr - 0xF000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.input.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val, &mut self.intf),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.intf),
            0xFF0F => self.intf.set_bits(val),
            0xFF10..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF46 => self.oam_dma(val),
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => self.ppu.write_reg(addr, val),
            0xFF4D if self.cgb_mode => self.key1_shift = val & 0x01 != 0,
            0xFF51 if self.cgb_mode => {
                self.hdma.src = (val as u16) << 8 | (self.hdma.src & 0x00FF);
            }
            0xFF52 if self.cgb_mode => {
                self.hdma.src = (self.hdma.src & 0xFF00) | (val & 0xF0) as u16;
            }
            0xFF53 if self.cgb_mode => {
                let raw = ((val & 0x1F) as u16) << 8 | (self.hdma.dst & 0x00FF);
                self.hdma.dst = Self::sanitize_vram_dma_dest(raw);
            }
            0xFF54 if self.cgb_mode => {
                let raw = (self.hdma.dst & 0xFF00) | (val & 0xF0) as u16;
                self.hdma.dst = Self::sanitize_vram_dma_dest(raw);
            }
            0xFF55 if self.cgb_mode => self.write_hdma_control(val),
            0xFF70 if self.cgb_mode => {
                let bank = (val & 0x07) as usize;
                self.wram_bank = if bank == 0 { 1 } else { bank };
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => log::debug!("Unmapped write {:04X} <- {:02X}", addr, val),
        }
    }

    fn oam_dma(&mut self, val: u8) {
        self.ppu.dma = val;
        let src = (val as u16) << 8;
        for i in 0..OAM_DMA_LEN {
            let byte = self.read_byte(src.wrapping_add(i));
            self.ppu.oam[i as usize] = byte;
        }
    }

    fn write_hdma_control(&mut self, val: u8) {
        if self.hdma.active && self.hdma.mode == DmaMode::Hdma {
            if val & 0x80 == 0 {
                self.hdma.active = false;
            }
            return;
        }
        self.hdma.remain = val & 0x7F;
        self.hdma.mode = if val & 0x80 != 0 {
            DmaMode::Hdma
        } else {
            DmaMode::Gdma
        };
        self.hdma.active = true;
    }

    #[inline]
    fn sanitize_vram_dma_dest(addr: u16) -> u16 {
        0x8000 | (addr & 0x1FF0)
    }

    fn hdma_chunk(&mut self) {
        for i in 0..HDMA_CHUNK {
            let byte = self.read_byte(self.hdma.src.wrapping_add(i));
            self.ppu.write_vram(self.hdma.dst + i, byte);
        }
        self.hdma.src = self.hdma.src.wrapping_add(HDMA_CHUNK);
        self.hdma.dst = Self::sanitize_vram_dma_dest(self.hdma.dst.wrapping_add(HDMA_CHUNK));
        self.hdma.remain = self.hdma.remain.wrapping_sub(1) & 0x7F;
    }

    /// Run any pending VRAM DMA and return the video cycles it took.
    pub fn run_dma(&mut self) -> u32 {
        if !self.hdma.active {
            return 0;
        }
        match self.hdma.mode {
            DmaMode::Gdma => {
                let chunks = self.hdma.remain as u32 + 1;
                for _ in 0..chunks {
                    self.hdma_chunk();
                }
                self.hdma.active = false;
                chunks * HDMA_CHUNK_CYCLES
            }
            DmaMode::Hdma => {
                if !self.ppu.hblank_entered() {
                    return 0;
                }
                self.hdma_chunk();
                if self.hdma.remain == 0x7F {
                    self.hdma.active = false;
                }
                HDMA_CHUNK_CYCLES
            }
        }
    }

    /// Advance the hardware by `cycles` CPU cycles; returns the video
    /// cycles that elapsed, including any DMA stall.
    pub fn advance(&mut self, cycles: u32) -> u32 {
        let dma = self.run_dma();
        let divider = if self.double_speed { 2 } else { 1 };
        let video = cycles / divider + dma;
        self.timer.step(cycles + dma * divider, &mut self.intf);
        self.ppu.step(video, &mut self.intf);
        self.apu.step(video);
        video
    }

    /// Perform a pending speed switch. Called when the CPU executes STOP.
    pub fn switch_speed(&mut self) {
        if self.key1_shift {
            self.double_speed = !self.double_speed;
            log::info!(
                "Switched to {} speed",
                if self.double_speed { "double" } else { "normal" }
            );
        }
        self.key1_shift = false;
    }

    pub fn key_down(&mut self, key: Key) {
        self.input.key_down(key, &mut self.intf);
    }

    pub fn key_up(&mut self, key: Key) {
        self.input.key_up(key);
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        self.serial.take_output()
    }

    pub fn save_cart_ram(&self) -> io::Result<()> {
        self.cart.persist()
    }
}
