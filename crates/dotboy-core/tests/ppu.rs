use dotboy_core::interrupt::{Interrupt, InterruptFlags};
use dotboy_core::ppu::{Mode, Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};

const FRAME_DOTS: u32 = 456 * 154;
const BLACK: u32 = 0x0000_0000;
const WHITE: u32 = 0x00FF_FFFF;
const LIGHT: u32 = 0x00C0_C0C0;

fn run_dots(ppu: &mut Ppu, intf: &mut InterruptFlags, mut dots: u32) {
    while dots > 0 {
        let n = dots.min(80);
        ppu.step(n, intf);
        dots -= n;
    }
}

/// Fill tile `index` (unsigned addressing) with a single color.
fn solid_tile(ppu: &mut Ppu, bank: usize, index: usize, color: u8) {
    let lo = if color & 1 != 0 { 0xFF } else { 0x00 };
    let hi = if color & 2 != 0 { 0xFF } else { 0x00 };
    for row in 0..8 {
        ppu.vram[bank][index * 16 + row * 2] = lo;
        ppu.vram[bank][index * 16 + row * 2 + 1] = hi;
    }
}

fn set_sprite(ppu: &mut Ppu, slot: usize, x: u8, y: u8, tile: u8, flags: u8) {
    ppu.write_oam(0xFE00 + slot as u16 * 4, y + 16);
    ppu.write_oam(0xFE00 + slot as u16 * 4 + 1, x + 8);
    ppu.write_oam(0xFE00 + slot as u16 * 4 + 2, tile);
    ppu.write_oam(0xFE00 + slot as u16 * 4 + 3, flags);
}

/// Run line 0 up to its HBlank so it gets rendered.
fn render_first_line(ppu: &mut Ppu, intf: &mut InterruptFlags) {
    run_dots(ppu, intf, 256);
    assert_eq!(ppu.mode(), Mode::HBlank);
}

#[test]
fn one_frame_of_dots_visits_every_mode_in_order() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF40, 0x80);

    let pattern = [1u32, 7, 80, 13, 64, 33, 80, 2];
    let mut modes = vec![ppu.mode()];
    let mut vblanks = 0;
    let mut remaining = FRAME_DOTS;
    let mut i = 0;
    while remaining > 0 {
        let n = pattern[i % pattern.len()].min(remaining);
        ppu.step(n, &mut intf);
        remaining -= n;
        i += 1;
        if ppu.mode() != *modes.last().unwrap() {
            if ppu.mode() == Mode::VBlank {
                vblanks += 1;
            }
            modes.push(ppu.mode());
        }
    }

    let mut expected = Vec::new();
    for _ in 0..SCREEN_HEIGHT {
        expected.extend([Mode::OamSearch, Mode::Transfer, Mode::HBlank]);
    }
    expected.push(Mode::VBlank);
    expected.push(Mode::OamSearch);

    assert_eq!(modes, expected);
    assert_eq!(vblanks, 1);
    assert_eq!(ppu.ly(), 0);
    assert!(intf.is_requested(Interrupt::VBlank));
    assert!(ppu.frame_updated());
}

#[test]
fn large_steps_keep_the_same_frame_length() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF40, 0x80);
    for _ in 0..(FRAME_DOTS / 456) {
        ppu.step(456, &mut intf);
    }
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.mode(), Mode::OamSearch);
    assert!(ppu.take_frame_updated());
    assert!(!ppu.frame_updated());
}

#[test]
fn disabling_the_lcd_resets_and_clears_to_white() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0xFF);
    ppu.write_reg(0xFF40, 0x91);
    run_dots(&mut ppu, &mut intf, FRAME_DOTS);
    assert!(ppu.framebuffer().iter().all(|&p| p == BLACK));
    ppu.take_frame_updated();

    run_dots(&mut ppu, &mut intf, 456 * 3 + 100);
    ppu.write_reg(0xFF40, 0x11);
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.mode(), Mode::OamSearch);
    assert_eq!(ppu.read_reg(0xFF41) & 0x03, 0);
    assert!(ppu.frame_updated());
    assert!(ppu.framebuffer().iter().all(|&p| p == WHITE));

    // Nothing advances while off
    run_dots(&mut ppu, &mut intf, 1000);
    assert_eq!(ppu.ly(), 0);
}

#[test]
fn lyc_match_raises_stat() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF40, 0x80);
    ppu.write_reg(0xFF45, 2);
    ppu.write_reg(0xFF41, 0x40);
    run_dots(&mut ppu, &mut intf, 456);
    assert!(!intf.is_requested(Interrupt::LcdStat));
    run_dots(&mut ppu, &mut intf, 456);
    assert!(intf.is_requested(Interrupt::LcdStat));
    assert_eq!(ppu.read_reg(0xFF41), 0x80 | 0x40 | 0x04 | Mode::OamSearch as u8);
}

#[test]
fn mode_stat_sources_follow_enable_bits() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF40, 0x80);
    ppu.write_reg(0xFF41, 0x08);
    run_dots(&mut ppu, &mut intf, 200);
    assert!(!intf.is_requested(Interrupt::LcdStat));
    run_dots(&mut ppu, &mut intf, 60);
    assert!(intf.is_requested(Interrupt::LcdStat));
    assert!(ppu.hblank_entered());
    ppu.step(4, &mut intf);
    assert!(!ppu.hblank_entered());
}

#[test]
fn signed_tile_addressing() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0xE4);
    // Tile 0x80 in 0x8800 mode lives at 0x8800
    solid_tile(&mut ppu, 0, 0x80, 3);
    ppu.vram[0][0x1800] = 0x80;
    ppu.write_reg(0xFF40, 0x81);
    render_first_line(&mut ppu, &mut intf);
    assert!(ppu.framebuffer()[..8].iter().all(|&p| p == BLACK));
    assert!(ppu.framebuffer()[8..SCREEN_WIDTH].iter().all(|&p| p == WHITE));
}

#[test]
fn window_starts_at_wx_minus_seven() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0xE4);
    solid_tile(&mut ppu, 0, 1, 3);
    ppu.vram[0][0x1C00..0x1C00 + 32].fill(1);
    ppu.write_reg(0xFF4A, 0);
    ppu.write_reg(0xFF4B, 87);
    ppu.write_reg(0xFF40, 0xF1);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert!(line[..80].iter().all(|&p| p == WHITE));
    assert!(line[80..].iter().all(|&p| p == BLACK));
}

#[test]
fn dmg_without_background_shows_white_and_sprites() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0xFF);
    ppu.write_reg(0xFF48, 0xE4);
    solid_tile(&mut ppu, 0, 1, 3);
    set_sprite(&mut ppu, 0, 8, 0, 1, 0x80);
    ppu.write_reg(0xFF40, 0x92);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert_eq!(line[0], WHITE);
    assert_eq!(line[8], BLACK);
}

#[test]
fn sprite_behind_nonzero_background() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0xE4);
    ppu.write_reg(0xFF48, 0xE4);
    // Background tile 0 is color 1 in columns 8-15 only
    ppu.vram[0][0x1800..0x1820].fill(2);
    ppu.vram[0][0x1801] = 3;
    solid_tile(&mut ppu, 0, 1, 3);
    solid_tile(&mut ppu, 0, 3, 1);
    set_sprite(&mut ppu, 0, 4, 0, 1, 0x80);
    ppu.write_reg(0xFF40, 0x93);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    // Over color 0 the sprite shows, over color 1 it is hidden
    assert_eq!(line[4], BLACK);
    assert_eq!(line[7], BLACK);
    assert_eq!(line[8], LIGHT);
    assert_eq!(line[11], LIGHT);
}

#[test]
fn dmg_sprites_prefer_lower_x() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0x00);
    ppu.write_reg(0xFF48, 0xE4);
    ppu.write_reg(0xFF49, 0x40);
    solid_tile(&mut ppu, 0, 1, 3);
    set_sprite(&mut ppu, 0, 10, 0, 1, 0x10);
    set_sprite(&mut ppu, 1, 8, 0, 1, 0x00);
    ppu.write_reg(0xFF40, 0x93);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert_eq!(line[8], BLACK);
    assert_eq!(line[12], BLACK);
    assert_eq!(line[16], LIGHT);
    assert_eq!(line[17], LIGHT);
    assert_eq!(line[18], WHITE);
}

#[test]
fn ten_sprites_per_line() {
    let mut ppu = Ppu::new();
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF47, 0x00);
    ppu.write_reg(0xFF48, 0xE4);
    solid_tile(&mut ppu, 0, 1, 3);
    for slot in 0..11 {
        set_sprite(&mut ppu, slot, slot as u8 * 8, 0, 1, 0);
    }
    ppu.write_reg(0xFF40, 0x93);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert_eq!(line[79], BLACK);
    assert_eq!(line[80], WHITE);
}

#[test]
fn cgb_sprites_prefer_oam_order() {
    let mut ppu = Ppu::new_with_mode(true);
    let mut intf = InterruptFlags::new();
    // Object palette 0 color 3 = red, palette 1 color 3 = blue
    ppu.write_reg(0xFF6A, 0x80 | 0x06);
    ppu.write_reg(0xFF6B, 0x1F);
    ppu.write_reg(0xFF6B, 0x00);
    ppu.write_reg(0xFF6A, 0x80 | 0x0E);
    ppu.write_reg(0xFF6B, 0x00);
    ppu.write_reg(0xFF6B, 0x7C);
    solid_tile(&mut ppu, 0, 1, 3);
    set_sprite(&mut ppu, 0, 10, 0, 1, 0x01);
    set_sprite(&mut ppu, 1, 8, 0, 1, 0x00);
    ppu.write_reg(0xFF40, 0x93);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert_eq!(line[8], ppu.ob_palette_color(0, 3));
    assert_eq!(line[8], 0x00C9_002E);
    assert_eq!(line[10], ppu.ob_palette_color(1, 3));
    assert_eq!(line[10], 0x000F_3EAA);
}

#[test]
fn cgb_background_attributes() {
    let mut ppu = Ppu::new_with_mode(true);
    let mut intf = InterruptFlags::new();
    ppu.write_reg(0xFF68, 0x80 | 0x08 | 0x02);
    ppu.write_reg(0xFF69, 0xFF);
    ppu.write_reg(0xFF69, 0x7F);
    // Tile 0 in bank 1: left column only
    for row in 0..8 {
        ppu.vram[1][row * 2] = 0x80;
    }
    // Map entry 0 uses palette 1, bank 1 and x-flip
    ppu.vram[1][0x1800] = 0x01 | 0x08 | 0x20;
    ppu.write_reg(0xFF40, 0x91);
    render_first_line(&mut ppu, &mut intf);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert_eq!(line[7], ppu.bg_palette_color(1, 1));
    assert_eq!(line[7], 0x00F8_F8F8);
    assert_eq!(line[0], ppu.bg_palette_color(1, 0));
}

#[test]
fn vram_bank_register_is_cgb_only() {
    let mut dmg = Ppu::new();
    dmg.write_reg(0xFF4F, 0x01);
    assert_eq!(dmg.read_reg(0xFF4F), 0xFF);
    assert_eq!(dmg.vram_bank, 0);

    let mut cgb = Ppu::new_with_mode(true);
    cgb.write_reg(0xFF4F, 0x01);
    assert_eq!(cgb.read_reg(0xFF4F), 0xFF);
    cgb.write_vram(0x8000, 0x5A);
    assert_eq!(cgb.vram[1][0], 0x5A);
    cgb.write_reg(0xFF4F, 0x00);
    assert_eq!(cgb.read_reg(0xFF4F), 0xFE);
    assert_eq!(cgb.read_vram(0x8000), 0x00);
}

#[test]
fn framebuffer_is_row_major() {
    let ppu = Ppu::new();
    assert_eq!(ppu.framebuffer().len(), SCREEN_WIDTH * SCREEN_HEIGHT);
}
