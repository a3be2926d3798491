//! Sound register network.
//!
//! Only the control side of the APU is modelled: the NRxx registers, the
//! 512 Hz frame sequencer and the length, envelope and sweep units it
//! clocks, plus the channel status bits NR52 reports. No samples are
//! synthesized.
//!
//! ```text
//! Step   Length Ctr  Vol Env     Sweep
//! ---------------------------------------
//! 0      Clock       -           -
//! 1      -           -           -
//! 2      Clock       -           Clock
//! 3      -           -           -
//! 4      Clock       -           -
//! 5      -           -           -
//! 6      Clock       -           Clock
//! 7      -           Clock       -
//! ```
//!
//! Each channel keeps its registers in a struct of its own kind. The units
//! read their parameters from those registers every time they are clocked,
//! so a game rewriting NRx2 or NR10 mid-note is seen at the next clock.

use crate::clock::Clock;

#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

// 512 Hz frame sequencer tick (not doubled in CGB mode)
const FRAME_SEQUENCER_PERIOD: u32 = 8192;

const NR_BASE: u16 = 0xFF10;
const NR52: u16 = 0xFF26;

const MAX_FREQUENCY: u16 = 0x7FF;

/// Timer reload for sweep and envelope; a period of 0 counts as 8.
fn period_or_eight(period: u8) -> u8 {
    if period == 0 { 8 } else { period }
}

fn frequency_of(lo: u8, hi: u8) -> u16 {
    ((hi as u16 & 0x07) << 8) | lo as u16
}

fn store_frequency(lo: &mut u8, hi: &mut u8, freq: u16) {
    *lo = freq as u8;
    *hi = (*hi & 0xF8) | ((freq >> 8) as u8 & 0x07);
}

/// NRx1 length load and NRx4 control. Every channel has these.
pub trait LengthRegs {
    /// Counter value loaded by a trigger when the counter is zero.
    const MAX_LENGTH: u16;

    /// Raw NRx1.
    fn length_data(&self) -> u8;

    /// Raw NRx4.
    fn control(&self) -> u8;

    /// True while the channel DAC is powered.
    fn dac_on(&self) -> bool;

    fn length_load(&self) -> u16 {
        let mask = (Self::MAX_LENGTH - 1) as u8;
        Self::MAX_LENGTH - (self.length_data() & mask) as u16
    }

    fn length_enabled(&self) -> bool {
        self.control() & 0x40 != 0
    }
}

/// NRx2 volume envelope.
pub trait EnvelopeRegs {
    /// Raw NRx2.
    fn envelope(&self) -> u8;

    fn initial_volume(&self) -> u8 {
        self.envelope() >> 4
    }

    fn envelope_add(&self) -> bool {
        self.envelope() & 0x08 != 0
    }

    fn envelope_period(&self) -> u8 {
        self.envelope() & 0x07
    }
}

/// 11-bit frequency split across NRx3 and NRx4.
pub trait FrequencyRegs {
    fn frequency(&self) -> u16;
    fn set_frequency(&mut self, freq: u16);
}

/// NR10-NR14: square with sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct Square1Regs {
    pub nr10: u8,
    pub nr11: u8,
    pub nr12: u8,
    pub nr13: u8,
    pub nr14: u8,
}

impl Square1Regs {
    pub fn sweep_period(&self) -> u8 {
        (self.nr10 >> 4) & 0x07
    }

    pub fn sweep_negate(&self) -> bool {
        self.nr10 & 0x08 != 0
    }

    pub fn sweep_shift(&self) -> u8 {
        self.nr10 & 0x07
    }
}

impl LengthRegs for Square1Regs {
    const MAX_LENGTH: u16 = 64;

    fn length_data(&self) -> u8 {
        self.nr11
    }

    fn control(&self) -> u8 {
        self.nr14
    }

    fn dac_on(&self) -> bool {
        self.nr12 & 0xF8 != 0
    }
}

impl EnvelopeRegs for Square1Regs {
    fn envelope(&self) -> u8 {
        self.nr12
    }
}

impl FrequencyRegs for Square1Regs {
    fn frequency(&self) -> u16 {
        frequency_of(self.nr13, self.nr14)
    }

    fn set_frequency(&mut self, freq: u16) {
        store_frequency(&mut self.nr13, &mut self.nr14, freq);
    }
}

/// NR21-NR24: square without sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct Square2Regs {
    pub nr21: u8,
    pub nr22: u8,
    pub nr23: u8,
    pub nr24: u8,
}

impl LengthRegs for Square2Regs {
    const MAX_LENGTH: u16 = 64;

    fn length_data(&self) -> u8 {
        self.nr21
    }

    fn control(&self) -> u8 {
        self.nr24
    }

    fn dac_on(&self) -> bool {
        self.nr22 & 0xF8 != 0
    }
}

impl EnvelopeRegs for Square2Regs {
    fn envelope(&self) -> u8 {
        self.nr22
    }
}

impl FrequencyRegs for Square2Regs {
    fn frequency(&self) -> u16 {
        frequency_of(self.nr23, self.nr24)
    }

    fn set_frequency(&mut self, freq: u16) {
        store_frequency(&mut self.nr23, &mut self.nr24, freq);
    }
}

/// NR30-NR34: wave channel. Volume is a fixed shift code, not an envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveRegs {
    pub nr30: u8,
    pub nr31: u8,
    pub nr32: u8,
    pub nr33: u8,
    pub nr34: u8,
}

impl WaveRegs {
    pub fn volume_code(&self) -> u8 {
        (self.nr32 >> 5) & 0x03
    }
}

impl LengthRegs for WaveRegs {
    const MAX_LENGTH: u16 = 256;

    fn length_data(&self) -> u8 {
        self.nr31
    }

    fn control(&self) -> u8 {
        self.nr34
    }

    fn dac_on(&self) -> bool {
        self.nr30 & 0x80 != 0
    }
}

impl FrequencyRegs for WaveRegs {
    fn frequency(&self) -> u16 {
        frequency_of(self.nr33, self.nr34)
    }

    fn set_frequency(&mut self, freq: u16) {
        store_frequency(&mut self.nr33, &mut self.nr34, freq);
    }
}

/// NR41-NR44: noise channel. NR43 selects the LFSR clock, not a frequency.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoiseRegs {
    pub nr41: u8,
    pub nr42: u8,
    pub nr43: u8,
    pub nr44: u8,
}

impl NoiseRegs {
    pub fn clock_shift(&self) -> u8 {
        self.nr43 >> 4
    }

    pub fn width_mode(&self) -> bool {
        self.nr43 & 0x08 != 0
    }

    pub fn divisor_code(&self) -> u8 {
        self.nr43 & 0x07
    }
}

impl LengthRegs for NoiseRegs {
    const MAX_LENGTH: u16 = 64;

    fn length_data(&self) -> u8 {
        self.nr41
    }

    fn control(&self) -> u8 {
        self.nr44
    }

    fn dac_on(&self) -> bool {
        self.nr42 & 0xF8 != 0
    }
}

impl EnvelopeRegs for NoiseRegs {
    fn envelope(&self) -> u8 {
        self.nr42
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Envelope {
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn reset<R: EnvelopeRegs>(&mut self, regs: &R) {
        self.volume = regs.initial_volume();
        self.timer = period_or_eight(regs.envelope_period());
    }

    fn clock<R: EnvelopeRegs>(&mut self, regs: &R) {
        let period = regs.envelope_period();
        self.timer = self.timer.saturating_sub(1);
        if self.timer != 0 {
            return;
        }
        self.timer = period_or_eight(period);
        if period == 0 {
            return;
        }
        if regs.envelope_add() && self.volume < 15 {
            self.volume += 1;
        } else if !regs.envelope_add() && self.volume > 0 {
            self.volume -= 1;
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Sweep {
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn calculate(&self, regs: &Square1Regs) -> u16 {
        let delta = self.shadow >> regs.sweep_shift();
        if regs.sweep_negate() {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    /// Reload on trigger. Returns false if the immediate overflow check
    /// disables the channel.
    fn trigger(&mut self, regs: &Square1Regs) -> bool {
        self.shadow = regs.frequency();
        self.timer = period_or_eight(regs.sweep_period());
        self.enabled = regs.sweep_period() != 0 || regs.sweep_shift() != 0;
        regs.sweep_shift() == 0 || self.calculate(regs) <= MAX_FREQUENCY
    }

    /// Frame sequencer clock. A swept frequency is written back to NR13/NR14
    /// before the second overflow check. Returns false if either check
    /// overflows.
    fn clock(&mut self, regs: &mut Square1Regs) -> bool {
        let period = regs.sweep_period();
        self.timer = self.timer.saturating_sub(1);
        if self.timer != 0 {
            return true;
        }
        self.timer = period_or_eight(period);
        if !self.enabled || period == 0 {
            return true;
        }
        let new = self.calculate(regs);
        if new > MAX_FREQUENCY {
            return false;
        }
        if regs.sweep_shift() == 0 {
            return true;
        }
        self.shadow = new;
        regs.set_frequency(new);
        self.calculate(regs) <= MAX_FREQUENCY
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LengthCounter {
    counter: u16,
}

impl LengthCounter {
    /// Returns true when the counter reaches zero on this clock.
    fn clock(&mut self, enabled: bool) -> bool {
        if enabled && self.counter > 0 {
            self.counter -= 1;
            return self.counter == 0;
        }
        false
    }
}

/// One sound channel: its registers plus the unit state they drive.
///
/// Queries only exist for the units a channel has; the wave channel has no
/// envelope and the noise channel has no frequency:
///
/// ```compile_fail
/// let apu = dotboy_core::apu::Apu::new();
/// let _ = apu.wave().volume();
/// ```
///
/// ```compile_fail
/// let apu = dotboy_core::apu::Apu::new();
/// let _ = apu.noise().frequency();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Channel<R> {
    regs: R,
    enabled: bool,
    length: LengthCounter,
    envelope: Envelope,
}

impl<R> Channel<R> {
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// True if the channel's bit in NR52 is set.
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl<R: LengthRegs> Channel<R> {
    pub fn length_counter(&self) -> u16 {
        self.length.counter
    }

    fn load_length(&mut self) {
        self.length.counter = self.regs.length_load();
    }

    fn clock_length(&mut self) {
        if self.length.clock(self.regs.length_enabled()) {
            self.enabled = false;
        }
    }

    /// A DAC switched off silences the channel at once.
    fn check_dac(&mut self) {
        if !self.regs.dac_on() {
            self.enabled = false;
        }
    }

    fn trigger_length(&mut self) {
        if self.length.counter == 0 {
            self.length.counter = R::MAX_LENGTH;
        }
        self.enabled = self.regs.dac_on();
    }
}

impl<R: EnvelopeRegs> Channel<R> {
    pub fn volume(&self) -> u8 {
        self.envelope.volume
    }

    fn clock_envelope(&mut self) {
        self.envelope.clock(&self.regs);
    }
}

impl<R: FrequencyRegs> Channel<R> {
    pub fn frequency(&self) -> u16 {
        self.regs.frequency()
    }
}

struct FrameSequencer {
    step: u8,
}

impl FrameSequencer {
    fn new() -> Self {
        Self { step: 0 }
    }

    fn advance(&mut self) -> u8 {
        let s = self.step;
        self.step = (self.step + 1) & 7;
        s
    }
}

pub struct Apu {
    square1: Channel<Square1Regs>,
    square2: Channel<Square2Regs>,
    wave: Channel<WaveRegs>,
    noise: Channel<NoiseRegs>,
    nr50: u8,
    nr51: u8,
    wave_ram: [u8; 0x10],
    power: bool,
    sweep: Sweep,
    sequencer: FrameSequencer,
    clock: Clock,
}

impl Apu {
    pub fn new() -> Self {
        Self {
            square1: Channel::default(),
            square2: Channel::default(),
            wave: Channel::default(),
            noise: Channel::default(),
            nr50: 0,
            nr51: 0,
            wave_ram: [0; 0x10],
            power: true,
            sweep: Sweep::default(),
            sequencer: FrameSequencer::new(),
            clock: Clock::new(FRAME_SEQUENCER_PERIOD),
        }
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 => 0x3F,
            0xFF12 => 0x00,
            0xFF13 => 0xFF,
            0xFF14 => 0xBF,
            0xFF16 => 0x3F,
            0xFF17 => 0x00,
            0xFF18 => 0xFF,
            0xFF19 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1B => 0xFF,
            0xFF1C => 0x9F,
            0xFF1D => 0xFF,
            0xFF1E => 0xBF,
            0xFF20 => 0xFF,
            0xFF21 => 0x00,
            0xFF22 => 0x00,
            0xFF23 => 0xBF,
            0xFF24 => 0x00,
            0xFF25 => 0x00,
            0xFF26 => 0x70,
            _ => 0xFF,
        }
    }

    pub fn square1(&self) -> &Channel<Square1Regs> {
        &self.square1
    }

    pub fn square2(&self) -> &Channel<Square2Regs> {
        &self.square2
    }

    pub fn wave(&self) -> &Channel<WaveRegs> {
        &self.wave
    }

    pub fn noise(&self) -> &Channel<NoiseRegs> {
        &self.noise
    }

    /// Frequency the sweep unit last computed from.
    pub fn sweep_shadow(&self) -> u16 {
        self.sweep.shadow
    }

    pub fn sequencer_step(&self) -> u8 {
        self.sequencer.step
    }

    fn raw_reg(&self, addr: u16) -> u8 {
        let (s1, s2) = (&self.square1.regs, &self.square2.regs);
        let (w, n) = (&self.wave.regs, &self.noise.regs);
        match addr {
            0xFF10 => s1.nr10,
            0xFF11 => s1.nr11,
            0xFF12 => s1.nr12,
            0xFF13 => s1.nr13,
            0xFF14 => s1.nr14,
            0xFF16 => s2.nr21,
            0xFF17 => s2.nr22,
            0xFF18 => s2.nr23,
            0xFF19 => s2.nr24,
            0xFF1A => w.nr30,
            0xFF1B => w.nr31,
            0xFF1C => w.nr32,
            0xFF1D => w.nr33,
            0xFF1E => w.nr34,
            0xFF20 => n.nr41,
            0xFF21 => n.nr42,
            0xFF22 => n.nr43,
            0xFF23 => n.nr44,
            0xFF24 => self.nr50,
            0xFF25 => self.nr51,
            _ => 0,
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            NR52 => {
                let mut val = if self.power { 0x80 } else { 0 };
                let status = [
                    self.square1.enabled,
                    self.square2.enabled,
                    self.wave.enabled,
                    self.noise.enabled,
                ];
                for (ch, on) in status.into_iter().enumerate() {
                    if on {
                        val |= 1 << ch;
                    }
                }
                val | Apu::read_mask(addr)
            }
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize],
            NR_BASE..NR52 => self.raw_reg(addr) | Apu::read_mask(addr),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        if let 0xFF30..=0xFF3F = addr {
            self.wave_ram[(addr - 0xFF30) as usize] = val;
            return;
        }
        if addr == NR52 {
            let on = val & 0x80 != 0;
            if self.power && !on {
                self.power_off();
            }
            self.power = on;
            return;
        }
        if !self.power {
            return;
        }

        match addr {
            0xFF10 => self.square1.regs.nr10 = val,
            0xFF11 => {
                self.square1.regs.nr11 = val;
                self.square1.load_length();
            }
            0xFF12 => {
                self.square1.regs.nr12 = val;
                self.square1.check_dac();
            }
            0xFF13 => self.square1.regs.nr13 = val,
            0xFF14 => {
                self.square1.regs.nr14 = val;
                if val & 0x80 != 0 {
                    self.trigger_square1();
                }
            }
            0xFF16 => {
                self.square2.regs.nr21 = val;
                self.square2.load_length();
            }
            0xFF17 => {
                self.square2.regs.nr22 = val;
                self.square2.check_dac();
            }
            0xFF18 => self.square2.regs.nr23 = val,
            0xFF19 => {
                self.square2.regs.nr24 = val;
                if val & 0x80 != 0 {
                    self.square2.trigger_length();
                    self.square2.envelope.reset(&self.square2.regs);
                    apu_trace!("APU trigger ch2 enabled={}", self.square2.enabled);
                }
            }
            0xFF1A => {
                self.wave.regs.nr30 = val;
                self.wave.check_dac();
            }
            0xFF1B => {
                self.wave.regs.nr31 = val;
                self.wave.load_length();
            }
            0xFF1C => self.wave.regs.nr32 = val,
            0xFF1D => self.wave.regs.nr33 = val,
            0xFF1E => {
                self.wave.regs.nr34 = val;
                if val & 0x80 != 0 {
                    self.wave.trigger_length();
                    apu_trace!("APU trigger ch3 enabled={}", self.wave.enabled);
                }
            }
            0xFF20 => {
                self.noise.regs.nr41 = val;
                self.noise.load_length();
            }
            0xFF21 => {
                self.noise.regs.nr42 = val;
                self.noise.check_dac();
            }
            0xFF22 => self.noise.regs.nr43 = val,
            0xFF23 => {
                self.noise.regs.nr44 = val;
                if val & 0x80 != 0 {
                    self.noise.trigger_length();
                    self.noise.envelope.reset(&self.noise.regs);
                    apu_trace!("APU trigger ch4 enabled={}", self.noise.enabled);
                }
            }
            0xFF24 => self.nr50 = val,
            0xFF25 => self.nr51 = val,
            _ => {}
        }
    }

    fn trigger_square1(&mut self) {
        self.square1.trigger_length();
        self.square1.envelope.reset(&self.square1.regs);
        if !self.sweep.trigger(&self.square1.regs) {
            self.square1.enabled = false;
        }
        apu_trace!("APU trigger ch1 enabled={}", self.square1.enabled);
    }

    fn power_off(&mut self) {
        self.square1 = Channel::default();
        self.square2 = Channel::default();
        self.wave = Channel::default();
        self.noise = Channel::default();
        self.nr50 = 0;
        self.nr51 = 0;
        self.sweep = Sweep::default();
        self.sequencer = FrameSequencer::new();
        self.clock.reset();
    }

    fn clock_frame_sequencer(&mut self, step: u8) {
        if step % 2 == 0 {
            self.square1.clock_length();
            self.square2.clock_length();
            self.wave.clock_length();
            self.noise.clock_length();
        }
        if (step == 2 || step == 6) && !self.sweep.clock(&mut self.square1.regs) {
            apu_trace!("APU sweep overflow");
            self.square1.enabled = false;
        }
        if step == 7 {
            self.square1.clock_envelope();
            self.square2.clock_envelope();
            self.noise.clock_envelope();
        }
    }

    /// Advance by `cycles` video-domain cycles.
    pub fn step(&mut self, cycles: u32) {
        if !self.power {
            return;
        }
        for _ in 0..self.clock.next(cycles) {
            let step = self.sequencer.advance();
            self.clock_frame_sequencer(step);
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_steps(apu: &mut Apu, steps: u32) {
        apu.step(FRAME_SEQUENCER_PERIOD * steps);
    }

    #[test]
    fn envelope_period_zero_keeps_volume() {
        let regs = Square2Regs {
            nr22: 0xA0,
            ..Default::default()
        };
        let mut env = Envelope::default();
        env.reset(&regs);
        assert_eq!(env.timer, 8);
        for _ in 0..32 {
            env.clock(&regs);
        }
        assert_eq!(env.volume, 0x0A);
    }

    #[test]
    fn envelope_steps_toward_limits() {
        let mut regs = Square2Regs {
            nr22: 0xE9,
            ..Default::default()
        };
        let mut env = Envelope::default();
        env.reset(&regs);
        for _ in 0..5 {
            env.clock(&regs);
        }
        assert_eq!(env.volume, 0x0F);

        regs.nr22 = 0x11;
        env.reset(&regs);
        env.clock(&regs);
        assert_eq!(env.volume, 0);
        env.clock(&regs);
        assert_eq!(env.volume, 0);
    }

    #[test]
    fn envelope_follows_live_period() {
        let mut regs = NoiseRegs {
            nr42: 0x82,
            ..Default::default()
        };
        let mut env = Envelope::default();
        env.reset(&regs);
        env.clock(&regs);
        env.clock(&regs);
        assert_eq!(env.volume, 7);

        regs.nr42 = 0x80;
        for _ in 0..16 {
            env.clock(&regs);
        }
        assert_eq!(env.volume, 7);
    }

    #[test]
    fn sweep_period_zero_does_not_update() {
        let mut regs = Square1Regs {
            nr10: 0x01,
            ..Default::default()
        };
        regs.set_frequency(0x100);
        let mut sweep = Sweep::default();
        assert!(sweep.trigger(&regs));
        assert!(sweep.enabled);
        for _ in 0..16 {
            assert!(sweep.clock(&mut regs));
        }
        assert_eq!(regs.frequency(), 0x100);
        assert_eq!(sweep.shadow, 0x100);
    }

    #[test]
    fn frequency_write_keeps_control_bits() {
        let mut regs = Square2Regs {
            nr24: 0xC0,
            ..Default::default()
        };
        regs.set_frequency(0x7AB);
        assert_eq!(regs.nr23, 0xAB);
        assert_eq!(regs.nr24, 0xC7);
        assert_eq!(regs.frequency(), 0x7AB);
    }

    #[test]
    fn length_loads_per_channel_kind() {
        let sq = Square1Regs {
            nr11: 0xFE,
            ..Default::default()
        };
        assert_eq!(sq.length_load(), 2);
        let wave = WaveRegs {
            nr31: 0x01,
            ..Default::default()
        };
        assert_eq!(wave.length_load(), 255);
    }

    #[test]
    fn length_counter_disables_channel() {
        let mut apu = Apu::new();
        apu.write_reg(0xFF17, 0xF0);
        apu.write_reg(0xFF16, 0x3E); // 2 ticks left
        apu.write_reg(0xFF19, 0xC0);
        assert!(apu.square2().enabled());
        run_steps(&mut apu, 2);
        assert!(apu.square2().enabled());
        run_steps(&mut apu, 1);
        assert!(!apu.square2().enabled());
    }

    #[test]
    fn trigger_without_dac_stays_off() {
        let mut apu = Apu::new();
        apu.write_reg(0xFF21, 0x00);
        apu.write_reg(0xFF23, 0x80);
        assert!(!apu.noise().enabled());
        assert_eq!(apu.noise().length_counter(), 64);
    }

    #[test]
    fn nr52_reports_power_and_channels() {
        let mut apu = Apu::new();
        apu.write_reg(0xFF12, 0xF3);
        apu.write_reg(0xFF14, 0x80);
        assert_eq!(apu.read_reg(0xFF26), 0xF1);

        apu.write_reg(0xFF26, 0x00);
        assert_eq!(apu.read_reg(0xFF26), 0x70);
        assert_eq!(apu.read_reg(0xFF12), 0x00);
        // Ignored while powered down
        apu.write_reg(0xFF12, 0xF3);
        assert_eq!(apu.read_reg(0xFF12), 0x00);
        // Wave RAM stays accessible
        apu.write_reg(0xFF30, 0x12);
        assert_eq!(apu.read_reg(0xFF30), 0x12);
    }

    #[test]
    fn read_masks_apply() {
        let mut apu = Apu::new();
        assert_eq!(apu.read_reg(0xFF10), 0x80);
        assert_eq!(apu.read_reg(0xFF13), 0xFF);
        assert_eq!(apu.read_reg(0xFF15), 0xFF);
        assert_eq!(apu.read_reg(0xFF1A), 0x7F);
        assert_eq!(apu.read_reg(0xFF1C), 0x9F);

        apu.write_reg(0xFF1C, 0x40);
        assert_eq!(apu.wave().regs().volume_code(), 2);
        apu.write_reg(0xFF22, 0x5B);
        let noise = apu.noise().regs();
        assert_eq!(noise.clock_shift(), 5);
        assert!(noise.width_mode());
        assert_eq!(noise.divisor_code(), 3);
        apu.write_reg(0xFF24, 0x77);
        assert_eq!(apu.read_reg(0xFF24), 0x77);
    }
}
