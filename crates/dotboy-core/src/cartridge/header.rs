//! Cartridge header parsing and validation.
//!
//! | Offset      | Field                      |
//! |-------------|----------------------------|
//! | 0x104-0x133 | Nintendo logo              |
//! | 0x134-0x143 | Title (0x134-0x13D on CGB) |
//! | 0x143       | CGB flag                   |
//! | 0x147       | Cartridge type             |
//! | 0x148       | ROM size code              |
//! | 0x149       | RAM size code              |
//! | 0x14D       | Header checksum            |

use thiserror::Error;

pub const HEADER_END: usize = 0x150;

const LOGO_START: usize = 0x104;

const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

/// Structural problems found in a ROM header. None of these stop a
/// cartridge from loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("image is {0} bytes, missing the header area at 0x100-0x14F")]
    TooSmall(usize),

    #[error("image is {actual} bytes, larger than the declared ROM size of {declared} bytes")]
    TooLarge { actual: usize, declared: usize },

    #[error("Nintendo logo is incorrect")]
    BadLogo,

    #[error("header checksum mismatch: computed {computed:#04x}, header says {expected:#04x}")]
    BadChecksum { computed: u8, expected: u8 },

    #[error("unknown ROM size code {0:#04x}")]
    UnknownRomSize(u8),

    #[error("unknown RAM size code {0:#04x}")]
    UnknownRamSize(u8),
}

pub struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    pub fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn byte(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    pub fn title(&self) -> String {
        // CGB titles give up their tail to the manufacturer code.
        let end = if self.byte(0x0143) == 0x80 { 0x013E } else { 0x0143 };
        let end = end.min(self.data.len());
        let mut slice = &self.data[0x0134.min(end)..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    pub fn cgb_supported(&self) -> bool {
        self.byte(0x0143) & 0x80 != 0
    }

    pub fn cart_type(&self) -> u8 {
        self.byte(0x0147)
    }

    pub fn rom_size_code(&self) -> u8 {
        self.byte(0x0148)
    }

    pub fn ram_size_code(&self) -> u8 {
        self.byte(0x0149)
    }

    /// Declared ROM size in bytes.
    pub fn rom_size(&self) -> Option<usize> {
        const BANK: usize = 0x4000;
        match self.rom_size_code() {
            n @ 0x00..=0x08 => Some(BANK * 2 << n),
            0x52 => Some(BANK * 72),
            0x53 => Some(BANK * 80),
            0x54 => Some(BANK * 96),
            _ => None,
        }
    }

    /// Declared external RAM size in bytes.
    pub fn ram_size(&self) -> Option<usize> {
        match self.ram_size_code() {
            0x00 => Some(0),
            0x01 => Some(0x800),   // 2KB
            0x02 => Some(0x2000),  // 8KB
            0x03 => Some(0x8000),  // 32KB (4 banks)
            0x04 => Some(0x20000), // 128KB (16 banks)
            0x05 => Some(0x10000), // 64KB (8 banks)
            _ => None,
        }
    }

    pub fn logo_ok(&self) -> bool {
        self.data.get(LOGO_START..LOGO_START + NINTENDO_LOGO.len()) == Some(&NINTENDO_LOGO[..])
    }

    /// Running subtraction over 0x134..=0x14C.
    pub fn computed_checksum(&self) -> u8 {
        (0x0134..0x014D).fold(0u8, |v, i| v.wrapping_sub(self.byte(i)).wrapping_sub(1))
    }

    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum() == self.byte(0x014D)
    }

    /// Every structural problem with the image, in header order.
    pub fn validate(&self) -> Vec<HeaderError> {
        let mut errors = Vec::new();
        if self.data.len() < HEADER_END {
            errors.push(HeaderError::TooSmall(self.data.len()));
        }
        match self.rom_size() {
            Some(declared) if self.data.len() > declared => errors.push(HeaderError::TooLarge {
                actual: self.data.len(),
                declared,
            }),
            Some(_) => {}
            None => errors.push(HeaderError::UnknownRomSize(self.rom_size_code())),
        }
        if self.ram_size().is_none() {
            errors.push(HeaderError::UnknownRamSize(self.ram_size_code()));
        }
        if !self.logo_ok() {
            errors.push(HeaderError::BadLogo);
        }
        if !self.checksum_ok() {
            errors.push(HeaderError::BadChecksum {
                computed: self.computed_checksum(),
                expected: self.byte(0x014D),
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Vec<u8> {
        let mut rom = vec![0u8; HEADER_END];
        rom[LOGO_START..LOGO_START + 48].copy_from_slice(&NINTENDO_LOGO);
        rom[0x0134..0x0139].copy_from_slice(b"HELLO");
        rom[0x014D] = Header::parse(&rom).computed_checksum();
        rom
    }

    #[test]
    fn crafted_header_validates() {
        let rom = image();
        let header = Header::parse(&rom);
        assert!(header.checksum_ok());
        assert!(header.logo_ok());
        assert_eq!(header.title(), "HELLO");
        assert!(header.validate().is_empty());
    }

    #[test]
    fn flipped_byte_breaks_checksum() {
        let mut rom = image();
        rom[0x0140] ^= 0x01;
        let header = Header::parse(&rom);
        assert!(!header.checksum_ok());
        assert!(matches!(
            header.validate().as_slice(),
            [HeaderError::BadChecksum { .. }]
        ));
    }

    #[test]
    fn cgb_title_is_shortened() {
        let mut rom = image();
        rom[0x0134..0x0143].copy_from_slice(b"ABCDEFGHIJKLMNO");
        rom[0x0143] = 0x80;
        assert_eq!(Header::parse(&rom).title(), "ABCDEFGHIJ");
        rom[0x0143] = 0x00;
        assert_eq!(Header::parse(&rom).title(), "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn size_tables() {
        let mut rom = image();
        let rom_sizes = [
            (0x00u8, 0x8000usize),
            (0x05, 0x10_0000),
            (0x08, 0x80_0000),
            (0x52, 72 * 0x4000),
        ];
        for (code, size) in rom_sizes {
            rom[0x0148] = code;
            assert_eq!(Header::parse(&rom).rom_size(), Some(size));
        }
        rom[0x0148] = 0x09;
        assert_eq!(Header::parse(&rom).rom_size(), None);

        let ram_sizes = [
            (0u8, 0usize),
            (1, 0x800),
            (2, 0x2000),
            (3, 0x8000),
            (4, 0x20000),
            (5, 0x10000),
        ];
        for (code, size) in ram_sizes {
            rom[0x0149] = code;
            assert_eq!(Header::parse(&rom).ram_size(), Some(size));
        }
    }

    #[test]
    fn undersized_and_oversized_images_are_reported() {
        let short = vec![0u8; 0x40];
        let errors = Header::parse(&short).validate();
        assert!(errors.contains(&HeaderError::TooSmall(0x40)));
        assert!(errors.contains(&HeaderError::BadLogo));

        let mut big = image();
        big.resize(0x8000 + 1, 0);
        let errors = Header::parse(&big).validate();
        assert_eq!(
            errors,
            vec![HeaderError::TooLarge {
                actual: 0x8001,
                declared: 0x8000
            }]
        );
    }
}
