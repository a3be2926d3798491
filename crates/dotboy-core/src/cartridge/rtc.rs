//! MBC3 real-time clock.
//!
//! The clock does not count cycles. It stores the wall-clock second at which
//! the cartridge was first powered (the epoch) and recomputes every register
//! from the elapsed time whenever the game strobes the latch register.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;

pub const RTC_S: u8 = 0x08;
pub const RTC_M: u8 = 0x09;
pub const RTC_H: u8 = 0x0A;
pub const RTC_DL: u8 = 0x0B;
pub const RTC_DH: u8 = 0x0C;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcError {
    #[error("no RTC register is mapped at selector {0:#04x}")]
    InvalidRegister(u8),
}

#[derive(Debug, Clone)]
pub struct RealTimeClock {
    s: u8,
    m: u8,
    h: u8,
    dl: u8,
    /// Bit 0: day counter bit 8. Bit 6: halt. Bit 7: day counter carry.
    dh: u8,
    epoch: u64,
    path: Option<PathBuf>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RealTimeClock {
    pub fn new(epoch: u64) -> Self {
        Self {
            s: 0,
            m: 0,
            h: 0,
            dl: 0,
            dh: 0,
            epoch,
            path: None,
        }
    }

    /// Restore the epoch persisted at `path`, or start counting from now if
    /// there is no usable file.
    pub fn open(path: &Path) -> Self {
        let epoch = match fs::read(path) {
            Ok(bytes) => match bytes.get(..8).and_then(|b| b.try_into().ok()) {
                Some(raw) => u64::from_le_bytes(raw),
                None => {
                    log::warn!(
                        "RTC file {} is truncated ({} bytes); restarting clock",
                        path.display(),
                        bytes.len()
                    );
                    unix_now()
                }
            },
            Err(_) => unix_now(),
        };
        let mut rtc = Self::new(epoch);
        rtc.path = Some(path.to_path_buf());
        rtc
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Latch the registers from the current wall-clock time.
    pub fn tic(&mut self) {
        self.tic_at(unix_now());
    }

    pub fn tic_at(&mut self, now: u64) {
        let d = now.saturating_sub(self.epoch);
        self.s = (d % 60) as u8;
        self.m = (d / 60 % 60) as u8;
        self.h = (d / 3600 % 24) as u8;

        let days = d / 86_400;
        self.dl = (days % 256) as u8;
        // Day overflow bits accumulate; only a direct DH write clears them.
        match days {
            0x000..=0x0FF => {}
            0x100..=0x1FF => self.dh |= 0x01,
            _ => self.dh |= 0x81,
        }
    }

    pub fn get(&self, reg: u8) -> Result<u8, RtcError> {
        match reg {
            RTC_S => Ok(self.s),
            RTC_M => Ok(self.m),
            RTC_H => Ok(self.h),
            RTC_DL => Ok(self.dl),
            RTC_DH => Ok(self.dh),
            _ => Err(RtcError::InvalidRegister(reg)),
        }
    }

    pub fn set(&mut self, reg: u8, val: u8) -> Result<(), RtcError> {
        match reg {
            RTC_S => self.s = val,
            RTC_M => self.m = val,
            RTC_H => self.h = val,
            RTC_DL => self.dl = val,
            RTC_DH => self.dh = val,
            _ => return Err(RtcError::InvalidRegister(reg)),
        }
        Ok(())
    }

    /// Write the epoch as 8 little-endian bytes. Clocks without a backing
    /// file are not persisted.
    pub fn save(&self) -> io::Result<()> {
        match &self.path {
            Some(path) => fs::write(path, self.epoch.to_le_bytes()),
            None => Ok(()),
        }
    }
}
