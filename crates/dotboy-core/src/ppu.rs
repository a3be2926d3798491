use crate::interrupt::{Interrupt, InterruptFlags};

#[cfg(feature = "ppu-trace")]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "ppu-trace"))]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {};
}

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing constants in dots
const LINE_DOTS: u32 = 456;
const MODE2_DOTS: u32 = 80; // OAM scan
const MODE3_DOTS: u32 = 172; // Pixel transfer
const LINES_PER_FRAME: u8 = 154;
/// Largest slice of time processed before the mode is re-evaluated. No
/// mode lasts fewer dots than this, so none can be skipped.
const STEP_CHUNK: u32 = 80;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Internal memory sizes
const VRAM_BANK_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

// LCDC bits
const LCDC_BG_ENABLE: u8 = 0x01;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_WINDOW_ENABLE: u8 = 0x20;
const LCDC_WINDOW_MAP: u8 = 0x40;
const LCDC_LCD_ENABLE: u8 = 0x80;

// STAT interrupt enables
const STAT_HBLANK_INT: u8 = 0x08;
const STAT_VBLANK_INT: u8 = 0x10;
const STAT_OAM_INT: u8 = 0x20;
const STAT_LYC_INT: u8 = 0x40;
const STAT_ENABLE_MASK: u8 = 0x78;

/// Gray levels for DMG shades 0-3.
const DMG_SHADES: [u8; 4] = [0xFF, 0xC0, 0x60, 0x00];
const WHITE: u32 = 0x00FF_FFFF;

// Palette memory: 8 palettes x 4 colors x RGB, one 5-bit component per byte
const PALETTE_COUNT: usize = 8;
const COLORS_PER_PALETTE: usize = 4;
const PAL_RAM_SIZE: usize = PALETTE_COUNT * COLORS_PER_PALETTE * 3;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_UNUSED_BIT: u8 = 0x40;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

/// What the background pass left at one pixel, consulted by sprites.
#[derive(Debug, Clone, Copy, Default)]
struct Priority {
    bg_priority: bool,
    color: u8,
}

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

/// CGB palette memory behind an index/data register pair (FF68/FF69 or
/// FF6A/FF6B).
struct CgbPalette {
    index: u8,
    auto_increment: bool,
    data: [u8; PAL_RAM_SIZE],
}

impl CgbPalette {
    fn new() -> Self {
        Self {
            index: 0,
            auto_increment: false,
            data: [0; PAL_RAM_SIZE],
        }
    }

    fn read_index(&self) -> u8 {
        let auto = if self.auto_increment {
            PAL_AUTO_INCREMENT_BIT
        } else {
            0
        };
        auto | PAL_UNUSED_BIT | self.index
    }

    fn write_index(&mut self, val: u8) {
        self.index = val & PAL_INDEX_MASK;
        self.auto_increment = val & PAL_AUTO_INCREMENT_BIT != 0;
    }

    /// Offset of the red component of the color the index points into.
    fn slot(&self) -> usize {
        (self.index >> 1) as usize * 3
    }

    fn read_data(&self) -> u8 {
        let i = self.slot();
        let (r, g, b) = (self.data[i], self.data[i + 1], self.data[i + 2]);
        if self.index & 0x01 == 0 {
            r | (g & 0x07) << 5
        } else {
            g >> 3 | b << 2
        }
    }

    fn write_data(&mut self, val: u8) {
        let i = self.slot();
        if self.index & 0x01 == 0 {
            self.data[i] = val & 0x1F;
            self.data[i + 1] = (self.data[i + 1] & 0x18) | (val >> 5);
        } else {
            self.data[i + 1] = (self.data[i + 1] & 0x07) | ((val & 0x03) << 3);
            self.data[i + 2] = (val >> 2) & 0x1F;
        }
        if self.auto_increment {
            self.index = (self.index + 1) & PAL_INDEX_MASK;
        }
    }

    /// Color as 0x00RRGGBB, corrected for the CGB panel.
    fn rgb(&self, palette: usize, color: usize) -> u32 {
        let i = (palette * COLORS_PER_PALETTE + color) * 3;
        let (r, g, b) = (
            self.data[i] as u32,
            self.data[i + 1] as u32,
            self.data[i + 2] as u32,
        );
        let r_ = ((r * 13 + g * 2 + b) >> 1).min(0xFF);
        let g_ = ((g * 3 + b) << 1).min(0xFF);
        let b_ = ((r * 3 + g * 2 + b * 11) >> 1).min(0xFF);
        (r_ << 16) | (g_ << 8) | b_
    }
}

pub struct Ppu {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    pub oam: [u8; OAM_SIZE],

    cgb: bool,

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    bg_palette: CgbPalette,
    obj_palette: CgbPalette,

    dots: u32,
    mode: Mode,

    pub framebuffer: [u32; SCREEN_WIDTH * SCREEN_HEIGHT],
    line_priority: [Priority; SCREEN_WIDTH],
    /// Set during the step that entered HBlank; consumed by HDMA.
    hblank: bool,
    /// Indicates a completed frame is available in `framebuffer`
    frame_updated: bool,
}

impl Ppu {
    pub fn new_with_mode(cgb: bool) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            cgb,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0x01,
            wy: 0,
            wx: 0,
            bg_palette: CgbPalette::new(),
            obj_palette: CgbPalette::new(),
            dots: 0,
            mode: Mode::OamSearch,
            framebuffer: [WHITE; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_priority: [Priority {
                bg_priority: true,
                color: 0,
            }; SCREEN_WIDTH],
            hblank: false,
            frame_updated: false,
        }
    }

    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    /// Returns true if the PPU is running in Game Boy Color mode.
    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_LCD_ENABLE != 0
    }

    /// True if the most recent `step` entered HBlank.
    pub fn hblank_entered(&self) -> bool {
        self.hblank
    }

    /// Returns true if a full frame has been rendered and is ready to display.
    pub fn frame_updated(&self) -> bool {
        self.frame_updated
    }

    /// Returns and clears the frame flag.
    pub fn take_frame_updated(&mut self) -> bool {
        std::mem::take(&mut self.frame_updated)
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    /// Get a CGB background palette color as 0x00RRGGBB.
    pub fn bg_palette_color(&self, palette: usize, color_id: usize) -> u32 {
        self.bg_palette.rgb(palette, color_id)
    }

    /// Get a CGB object palette color as 0x00RRGGBB.
    pub fn ob_palette_color(&self, palette: usize, color_id: usize) -> u32 {
        self.obj_palette.rgb(palette, color_id)
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[self.vram_bank][(addr as usize - 0x8000) & (VRAM_BANK_SIZE - 1)]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        self.vram[self.vram_bank][(addr as usize - 0x8000) & (VRAM_BANK_SIZE - 1)] = val;
    }

    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam.get(addr as usize - 0xFE00).copied().unwrap_or(0xFF)
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        if let Some(b) = self.oam.get_mut(addr as usize - 0xFE00) {
            *b = val;
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let mode = if self.lcd_enabled() { self.mode as u8 } else { 0 };
                let coincidence = if self.ly == self.lyc { 0x04 } else { 0 };
                0x80 | (self.stat & STAT_ENABLE_MASK) | coincidence | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF4F if self.cgb => 0xFE | self.vram_bank as u8,
            0xFF68 if self.cgb => self.bg_palette.read_index(),
            0xFF69 if self.cgb => self.bg_palette.read_data(),
            0xFF6A if self.cgb => self.obj_palette.read_index(),
            0xFF6B if self.cgb => self.obj_palette.read_data(),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                self.lcdc = val;
                if val & LCDC_LCD_ENABLE == 0 {
                    self.lcd_off();
                }
            }
            0xFF41 => self.stat = val & STAT_ENABLE_MASK,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF4F if self.cgb => self.vram_bank = (val & 0x01) as usize,
            0xFF68 if self.cgb => self.bg_palette.write_index(val),
            0xFF69 if self.cgb => self.bg_palette.write_data(val),
            0xFF6A if self.cgb => self.obj_palette.write_index(val),
            0xFF6B if self.cgb => self.obj_palette.write_data(val),
            _ => {}
        }
    }

    fn lcd_off(&mut self) {
        self.dots = 0;
        self.ly = 0;
        self.mode = Mode::OamSearch;
        self.hblank = false;
        self.framebuffer.fill(WHITE);
        self.frame_updated = true;
    }

    /// Advance the PPU by `cycles` dots.
    ///
    /// The dot counter is moved forward in slices of at most 80 dots; after
    /// each slice the mode is recomputed from (LY, dot) and any mode entry
    /// raises its interrupts. Entering HBlank renders the current line.
    pub fn step(&mut self, cycles: u32, intf: &mut InterruptFlags) {
        if !self.lcd_enabled() {
            return;
        }
        self.hblank = false;
        if cycles == 0 {
            return;
        }

        let chunks = (cycles - 1) / STEP_CHUNK + 1;
        for i in 0..chunks {
            self.dots += if i == chunks - 1 {
                cycles - STEP_CHUNK * (chunks - 1)
            } else {
                STEP_CHUNK
            };
            if self.dots >= LINE_DOTS {
                self.dots -= LINE_DOTS;
                self.ly = (self.ly + 1) % LINES_PER_FRAME;
                if self.stat & STAT_LYC_INT != 0 && self.ly == self.lyc {
                    intf.request(Interrupt::LcdStat);
                }
            }

            let mode = if self.ly as usize >= SCREEN_HEIGHT {
                Mode::VBlank
            } else if self.dots <= MODE2_DOTS {
                Mode::OamSearch
            } else if self.dots <= MODE2_DOTS + MODE3_DOTS {
                Mode::Transfer
            } else {
                Mode::HBlank
            };
            if mode != self.mode {
                self.enter_mode(mode, intf);
            }
        }
    }

    fn enter_mode(&mut self, mode: Mode, intf: &mut InterruptFlags) {
        ppu_trace!("PPU LY={} dot={} {:?} -> {:?}", self.ly, self.dots, self.mode, mode);
        self.mode = mode;
        match mode {
            Mode::VBlank => {
                self.frame_updated = true;
                intf.request(Interrupt::VBlank);
                if self.stat & STAT_VBLANK_INT != 0 {
                    intf.request(Interrupt::LcdStat);
                }
            }
            Mode::OamSearch => {
                if self.stat & STAT_OAM_INT != 0 {
                    intf.request(Interrupt::LcdStat);
                }
            }
            Mode::Transfer => {}
            Mode::HBlank => {
                self.hblank = true;
                if self.stat & STAT_HBLANK_INT != 0 {
                    intf.request(Interrupt::LcdStat);
                }
                if self.cgb || self.lcdc & LCDC_BG_ENABLE != 0 {
                    self.draw_background_and_window();
                } else {
                    self.blank_line();
                }
                if self.lcdc & LCDC_OBJ_ENABLE != 0 {
                    self.draw_sprites();
                }
            }
        }
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u32 {
        let g = DMG_SHADES[((palette >> (color_id * 2)) & 0x03) as usize] as u32;
        (g << 16) | (g << 8) | g
    }

    #[inline(always)]
    fn pixel_index(&self, x: usize) -> usize {
        self.ly as usize * SCREEN_WIDTH + x
    }

    /// DMG with LCDC bit 0 clear shows a white line that never hides sprites.
    fn blank_line(&mut self) {
        let start = self.pixel_index(0);
        self.framebuffer[start..start + SCREEN_WIDTH].fill(WHITE);
        self.line_priority.fill(Priority::default());
    }

    fn draw_background_and_window(&mut self) {
        let ly = self.ly;
        let show_window = self.lcdc & LCDC_WINDOW_ENABLE != 0 && self.wy <= ly;
        let tile_data_base = if self.lcdc & LCDC_TILE_DATA != 0 {
            TILE_DATA_0_BASE
        } else {
            TILE_DATA_1_BASE
        };

        for x in 0..SCREEN_WIDTH {
            let in_window = show_window && x + 7 >= self.wx as usize;
            let (px, py, map_base) = if in_window {
                let map = if self.lcdc & LCDC_WINDOW_MAP != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                ((x + 7 - self.wx as usize) as u8, ly - self.wy, map)
            } else {
                let map = if self.lcdc & LCDC_BG_MAP != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                (self.scx.wrapping_add(x as u8), self.scy.wrapping_add(ly), map)
            };

            let map_addr = map_base + (py as usize / 8) * 32 + px as usize / 8;
            let tile_index = self.vram[0][map_addr];
            let addr = if self.lcdc & LCDC_TILE_DATA != 0 {
                tile_data_base + tile_index as usize * 16
            } else {
                tile_data_base + ((tile_index as i8 as i16 + 128) as usize) * 16
            };

            let mut tile_y = (py % 8) as usize;
            let mut bit = 7 - (px % 8) as usize;
            let mut priority = false;
            let mut palette = 0usize;
            let mut bank = 0usize;
            if self.cgb {
                let attr = self.vram[1][map_addr];
                palette = (attr & 0x07) as usize;
                bank = ((attr >> 3) & 0x01) as usize;
                if attr & 0x20 != 0 {
                    bit = (px % 8) as usize;
                }
                if attr & 0x40 != 0 {
                    tile_y = 7 - tile_y;
                }
                priority = attr & 0x80 != 0;
            }

            let lo = self.vram[bank][addr + tile_y * 2];
            let hi = self.vram[bank][addr + tile_y * 2 + 1];
            let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);

            self.line_priority[x] = Priority {
                bg_priority: priority,
                color: color_id,
            };
            let color = if self.cgb {
                self.bg_palette.rgb(palette, color_id as usize)
            } else {
                Self::dmg_shade(self.bgp, color_id)
            };
            let idx = self.pixel_index(x);
            self.framebuffer[idx] = color;
        }
    }

    /// Collect up to 10 sprites on the current line, best priority first.
    fn line_sprites(&self) -> ([Sprite; MAX_SPRITES_PER_LINE], usize) {
        let sprite_height: i16 = if self.lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 };
        let ly = self.ly as i16;
        let mut sprites = [Sprite::default(); MAX_SPRITES_PER_LINE];
        let mut count = 0;
        for i in 0..TOTAL_SPRITES {
            if count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as i16 - 16;
            if ly >= y && ly < y + sprite_height {
                sprites[count] = Sprite {
                    x: self.oam[base + 1] as i16 - 8,
                    y,
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: i,
                };
                count += 1;
            }
        }
        if !self.cgb {
            // DMG-style priority: sort by X position then OAM index
            sprites[..count].sort_by_key(|s| (s.x, s.oam_index));
        }
        (sprites, count)
    }

    fn draw_sprites(&mut self) {
        let sprite_height: i16 = if self.lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 };
        // CGB with LCDC bit 0 clear: sprites win over any background.
        let master_priority = !(self.cgb && self.lcdc & LCDC_BG_ENABLE == 0);
        let (sprites, count) = self.line_sprites();
        let mut drawn = [false; SCREEN_WIDTH];

        for s in &sprites[..count] {
            let tile = if sprite_height == 16 {
                s.tile & 0xFE
            } else {
                s.tile
            };
            let mut line = self.ly as i16 - s.y;
            if s.flags & 0x40 != 0 {
                line = sprite_height - 1 - line;
            }
            let bank = if self.cgb {
                ((s.flags >> 3) & 0x01) as usize
            } else {
                0
            };
            let addr = tile as usize * 16 + line as usize * 2;
            let lo = self.vram[bank][addr];
            let hi = self.vram[bank][addr + 1];

            for px in 0..8i16 {
                let sx = s.x + px;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) {
                    continue;
                }
                let sx = sx as usize;
                let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                if color_id == 0 || drawn[sx] {
                    continue;
                }
                // The highest priority opaque sprite owns the pixel even if
                // the background then hides it.
                drawn[sx] = true;

                let bg = self.line_priority[sx];
                if master_priority && (bg.bg_priority || s.flags & 0x80 != 0) && bg.color != 0 {
                    continue;
                }

                let color = if self.cgb {
                    self.obj_palette.rgb((s.flags & 0x07) as usize, color_id as usize)
                } else if s.flags & 0x10 != 0 {
                    Self::dmg_shade(self.obp1, color_id)
                } else {
                    Self::dmg_shade(self.obp0, color_id)
                };
                let idx = self.pixel_index(sx);
                self.framebuffer[idx] = color;
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_data_round_trips_through_components() {
        let mut pal = CgbPalette::new();
        pal.write_index(0x80 | 0x02);
        pal.write_data(0xFF);
        pal.write_data(0x7F);
        assert_eq!(pal.read_index(), 0x80 | 0x40 | 0x04);
        pal.write_index(0x02);
        assert_eq!(pal.read_data(), 0xFF);
        pal.write_index(0x03);
        assert_eq!(pal.read_data(), 0x7F);
        assert_eq!(&pal.data[3..6], &[0x1F, 0x1F, 0x1F]);
    }

    #[test]
    fn palette_reads_do_not_increment() {
        let mut pal = CgbPalette::new();
        pal.write_index(0x80 | 0x3F);
        let _ = pal.read_data();
        assert_eq!(pal.read_index() & 0x3F, 0x3F);
        pal.write_data(0x00);
        assert_eq!(pal.read_index() & 0x3F, 0x00);
    }

    #[test]
    fn color_correction() {
        let mut pal = CgbPalette::new();
        pal.write_index(0x80);
        // red = 0x1F
        pal.write_data(0x1F);
        pal.write_data(0x00);
        assert_eq!(pal.rgb(0, 0), (0xC9 << 16) | 0x2E);
        assert_eq!(pal.rgb(0, 1), 0);
    }

    #[test]
    fn dmg_shades() {
        assert_eq!(Ppu::dmg_shade(0xE4, 0), 0x00FF_FFFF);
        assert_eq!(Ppu::dmg_shade(0xE4, 1), 0x00C0_C0C0);
        assert_eq!(Ppu::dmg_shade(0xE4, 2), 0x0060_6060);
        assert_eq!(Ppu::dmg_shade(0xE4, 3), 0);
        assert_eq!(Ppu::dmg_shade(0x1B, 0), 0);
    }

    #[test]
    fn large_steps_do_not_lose_dots() {
        let mut ppu = Ppu::new();
        let mut intf = InterruptFlags::new();
        ppu.write_reg(0xFF40, 0x80);
        // Multiples of the slice size used to drop the final slice.
        ppu.step(160, &mut intf);
        ppu.step(160, &mut intf);
        ppu.step(136, &mut intf);
        assert_eq!(ppu.ly(), 1);
        assert_eq!(ppu.dots, 0);
    }
}
