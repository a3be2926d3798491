//! Cartridge ROM/RAM and the memory bank controllers.
//!
//! Register writes into the ROM area:
//!
//! | MBC  | 0000-1FFF  | 2000-3FFF                          | 4000-5FFF         | 6000-7FFF    |
//! |------|------------|------------------------------------|-------------------|--------------|
//! | MBC1 | RAM enable | ROM bank bits 0-4                  | bank bits 5-6     | banking mode |
//! | MBC3 | RAM enable | ROM bank (7 bits)                  | RAM bank / RTC    | RTC latch    |
//! | MBC5 | RAM enable | 2000-2FFF low 8 bits, 3000-3FFF b8 | RAM bank (4 bits) | -            |
//!
//! MBC2 decodes the whole 0000-3FFF range with address bit 8: clear selects
//! RAM enable, set selects the 4-bit ROM bank.

pub mod header;
pub mod rtc;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

pub use header::{Header, HeaderError};
pub use rtc::{RealTimeClock, RtcError};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MBC2_RAM_SIZE: usize = 0x200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl MbcType {
    pub fn from_cart_type(cart_type: u8) -> Option<Self> {
        match cart_type {
            0x00 | 0x08 | 0x09 => Some(Self::RomOnly),
            0x01..=0x03 => Some(Self::Mbc1),
            0x05 | 0x06 => Some(Self::Mbc2),
            0x0F..=0x13 => Some(Self::Mbc3),
            0x19..=0x1E => Some(Self::Mbc5),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedType(u8),
}

/// How MBC1 interprets the two bits at 4000-5FFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankMode {
    /// High ROM bank bits; RAM bank fixed at 0.
    Rom,
    /// RAM bank select; ROM bank limited to the low 5 bits.
    Ram,
}

#[derive(Debug)]
enum MbcState {
    RomOnly,
    Mbc1 {
        /// 7-bit latch: bits 0-4 from 2000-3FFF, bits 5-6 from 4000-5FFF.
        bank: u8,
        mode: BankMode,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
        rtc: RealTimeClock,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
    },
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub cgb: bool,
    pub title: String,
    cart_type: u8,
    save_path: Option<PathBuf>,
    header_errors: Vec<HeaderError>,
    mbc_state: MbcState,
}

impl Cartridge {
    /// Load a ROM image from disk. Battery-backed RAM is restored from a
    /// `.sav` file next to the ROM and the MBC3 clock from a `.rtc` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(data, Some(path))
    }

    /// Build a cartridge from an in-memory image. Nothing is persisted.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, CartridgeError> {
        Self::load(data, None)
    }

    fn load(data: Vec<u8>, rom_path: Option<&Path>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&data);
        let header_errors = header.validate();
        for err in &header_errors {
            log::warn!("{err}");
        }

        let cart_type = header.cart_type();
        let mbc = MbcType::from_cart_type(cart_type)
            .ok_or(CartridgeError::UnsupportedType(cart_type))?;
        let cgb = header.cgb_supported();
        let title = header.title();
        let ram_size = match mbc {
            // MBC2 has 512x4-bit internal RAM regardless of header RAM size.
            MbcType::Mbc2 => MBC2_RAM_SIZE,
            _ => header.ram_size().unwrap_or(0),
        };

        let save_path = rom_path
            .filter(|_| has_battery(cart_type))
            .map(|p| p.with_extension("sav"));

        let mut ram = vec![0; ram_size];
        if let Some(save) = &save_path
            && let Ok(bytes) = fs::read(save)
        {
            for (d, s) in ram.iter_mut().zip(bytes.iter()) {
                *d = *s;
            }
            log::info!("Restored {} bytes of RAM from {}", bytes.len(), save.display());
        }

        let mbc_state = match mbc {
            MbcType::RomOnly => MbcState::RomOnly,
            MbcType::Mbc1 => MbcState::Mbc1 {
                bank: 0x01,
                mode: BankMode::Rom,
                ram_enable: false,
            },
            MbcType::Mbc2 => MbcState::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcType::Mbc3 => {
                let rtc = match rom_path {
                    Some(p) if matches!(cart_type, 0x0F | 0x10) => {
                        RealTimeClock::open(&p.with_extension("rtc"))
                    }
                    _ => RealTimeClock::new(rtc::unix_now()),
                };
                MbcState::Mbc3 {
                    rom_bank: 1,
                    ram_bank: 0,
                    ram_enable: false,
                    rtc,
                }
            }
            MbcType::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
        };

        log::info!(
            "Loaded ROM: {} (MBC: {:?}, CGB: {})",
            title,
            mbc,
            if cgb { "yes" } else { "no" }
        );

        Ok(Self {
            rom: data,
            ram,
            mbc,
            cgb,
            title,
            cart_type,
            save_path,
            header_errors,
            mbc_state,
        })
    }

    pub fn cart_type(&self) -> u8 {
        self.cart_type
    }

    /// Problems found in the header at load time.
    pub fn header_errors(&self) -> &[HeaderError] {
        &self.header_errors
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn has_battery(&self) -> bool {
        has_battery(self.cart_type)
    }

    pub fn rtc(&self) -> Option<&RealTimeClock> {
        match &self.mbc_state {
            MbcState::Mbc3 { rtc, .. } => Some(rtc),
            _ => None,
        }
    }

    fn rom_byte(&self, bank: usize, addr: u16) -> u8 {
        let bank_count = (self.rom.len() / ROM_BANK_SIZE).max(1);
        let offset = (bank % bank_count) * ROM_BANK_SIZE + (addr as usize & 0x3FFF);
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn ram_offset(bank: u8, addr: u16) -> usize {
        bank as usize * RAM_BANK_SIZE + (addr as usize - 0xA000)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match (&self.mbc_state, addr) {
            (_, 0x0000..=0x3FFF) => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            (MbcState::RomOnly, 0x4000..=0x7FFF) => self.rom_byte(1, addr),
            (MbcState::Mbc1 { bank, mode, .. }, 0x4000..=0x7FFF) => {
                let bank = match mode {
                    BankMode::Rom => bank & 0x7F,
                    BankMode::Ram => bank & 0x1F,
                };
                self.rom_byte(bank as usize, addr)
            }
            (MbcState::Mbc2 { rom_bank, .. }, 0x4000..=0x7FFF)
            | (MbcState::Mbc3 { rom_bank, .. }, 0x4000..=0x7FFF) => {
                self.rom_byte(*rom_bank as usize, addr)
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x4000..=0x7FFF) => {
                let bank = if *rom_bank == 0 { 1 } else { *rom_bank };
                self.rom_byte(bank as usize, addr)
            }
            (MbcState::RomOnly, 0xA000..=0xBFFF) => {
                self.ram.get(addr as usize - 0xA000).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc1 { ram_enable: false, .. }, 0xA000..=0xBFFF)
            | (MbcState::Mbc2 { ram_enable: false, .. }, 0xA000..=0xBFFF)
            | (MbcState::Mbc3 { ram_enable: false, .. }, 0xA000..=0xBFFF)
            | (MbcState::Mbc5 { ram_enable: false, .. }, 0xA000..=0xBFFF) => 0xFF,
            (MbcState::Mbc1 { bank, mode, .. }, 0xA000..=0xBFFF) => {
                let idx = Self::ram_offset(mbc1_ram_bank(*bank, *mode), addr);
                self.ram.get(idx).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc2 { .. }, 0xA000..=0xBFFF) => {
                // MBC2 RAM is mirrored across 0xA000-0xBFFF.
                let idx = (addr as usize - 0xA000) & (MBC2_RAM_SIZE - 1);
                let nibble = self.ram.get(idx).copied().unwrap_or(0x0F) & 0x0F;
                0xF0 | nibble
            }
            (MbcState::Mbc3 { ram_bank, rtc, .. }, 0xA000..=0xBFFF) => match *ram_bank {
                0x00..=0x03 => {
                    let idx = Self::ram_offset(*ram_bank, addr);
                    self.ram.get(idx).copied().unwrap_or(0xFF)
                }
                sel => rtc.get(sel).unwrap_or_else(|e| {
                    log::debug!("MBC3 read at {addr:#06x}: {e}");
                    0xFF
                }),
            },
            (MbcState::Mbc5 { ram_bank, .. }, 0xA000..=0xBFFF) => {
                let idx = Self::ram_offset(*ram_bank, addr);
                self.ram.get(idx).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let mut ram_disabled = false;
        match (&mut self.mbc_state, addr) {
            (MbcState::RomOnly, 0xA000..=0xBFFF) => {
                if let Some(b) = self.ram.get_mut(addr as usize - 0xA000) {
                    *b = val;
                }
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc5 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                ram_disabled = set_ram_enable(ram_enable, val);
            }
            (MbcState::Mbc1 { bank, .. }, 0x2000..=0x3FFF) => {
                let mut n = val & 0x1F;
                if n == 0 {
                    n = 1;
                }
                *bank = (*bank & 0x60) | n;
            }
            (MbcState::Mbc1 { bank, .. }, 0x4000..=0x5FFF) => {
                *bank = (*bank & 0x9F) | ((val & 0x03) << 5);
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => match val {
                0x00 => *mode = BankMode::Rom,
                0x01 => *mode = BankMode::Ram,
                _ => log::warn!("Invalid MBC1 banking mode {val:#04x} ignored"),
            },
            (MbcState::Mbc1 { ram_enable: true, bank, mode }, 0xA000..=0xBFFF) => {
                let idx = Self::ram_offset(mbc1_ram_bank(*bank, *mode), addr);
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
            (
                MbcState::Mbc2 {
                    rom_bank,
                    ram_enable,
                },
                0x0000..=0x3FFF,
            ) => {
                // Address bit 8 selects between RAM enable and ROM bank.
                if addr & 0x0100 == 0 {
                    ram_disabled = set_ram_enable(ram_enable, val);
                } else {
                    *rom_bank = val & 0x0F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                }
            }
            (MbcState::Mbc2 { ram_enable: true, .. }, 0xA000..=0xBFFF) => {
                let idx = (addr as usize - 0xA000) & (MBC2_RAM_SIZE - 1);
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val & 0x0F;
                }
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            (MbcState::Mbc3 { rtc, .. }, 0x6000..=0x7FFF) => {
                if val & 0x01 != 0 {
                    rtc.tic();
                }
            }
            (
                MbcState::Mbc3 {
                    ram_enable: true,
                    ram_bank,
                    rtc,
                    ..
                },
                0xA000..=0xBFFF,
            ) => match *ram_bank {
                0x00..=0x03 => {
                    let idx = Self::ram_offset(*ram_bank, addr);
                    if let Some(b) = self.ram.get_mut(idx) {
                        *b = val;
                    }
                }
                sel => {
                    if let Err(e) = rtc.set(sel, val) {
                        log::debug!("MBC3 write at {addr:#06x}: {e}");
                    }
                }
            },
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = (*rom_bank & 0x100) | val as u16;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0xFF) | (((val & 0x01) as u16) << 8);
            }
            (MbcState::Mbc5 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            (MbcState::Mbc5 { ram_enable: true, ram_bank, .. }, 0xA000..=0xBFFF) => {
                let idx = Self::ram_offset(*ram_bank, addr);
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
            _ => {}
        }

        if ram_disabled && let Err(e) = self.persist() {
            log::error!("Failed to save cartridge RAM: {e}");
        }
    }

    /// Write battery RAM and the RTC epoch to their backing files.
    ///
    /// Cartridges without a save path, or with no RAM, write nothing. The
    /// whole buffer is rewritten every time.
    pub fn persist(&self) -> io::Result<()> {
        if let Some(path) = &self.save_path
            && !self.ram.is_empty()
        {
            fs::write(path, &self.ram)?;
            log::debug!("Saved {} bytes of RAM to {}", self.ram.len(), path.display());
        }
        if let MbcState::Mbc3 { rtc, .. } = &self.mbc_state {
            rtc.save()?;
        }
        Ok(())
    }
}

fn has_battery(cart_type: u8) -> bool {
    matches!(
        cart_type,
        0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
    )
}

fn mbc1_ram_bank(bank: u8, mode: BankMode) -> u8 {
    match mode {
        BankMode::Rom => 0,
        BankMode::Ram => (bank & 0x60) >> 5,
    }
}

/// Update a RAM enable latch and report an enabled-to-disabled transition.
fn set_ram_enable(ram_enable: &mut bool, val: u8) -> bool {
    let was_enabled = *ram_enable;
    *ram_enable = val & 0x0F == 0x0A;
    was_enabled && !*ram_enable
}
