/// Interrupt sources in IF/IE bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// The IF register.
///
/// Every unit that can raise an interrupt receives a `&mut InterruptFlags`
/// from the [`Mmu`](crate::mmu::Mmu), which owns the only instance. The CPU
/// clears bits as it services them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptFlags {
    data: u8,
}

impl InterruptFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, irq: Interrupt) {
        self.data |= irq.mask();
    }

    pub fn clear(&mut self, irq: Interrupt) {
        self.data &= !irq.mask();
    }

    pub fn is_requested(&self, irq: Interrupt) -> bool {
        self.data & irq.mask() != 0
    }

    /// Raw 5-bit value.
    pub fn bits(&self) -> u8 {
        self.data
    }

    pub fn set_bits(&mut self, val: u8) {
        self.data = val & 0x1F;
    }

    /// Highest priority interrupt that is both requested and enabled in `ie`.
    pub fn pending(&self, ie: u8) -> Option<Interrupt> {
        let active = self.data & ie & 0x1F;
        Interrupt::ALL.into_iter().find(|irq| active & irq.mask() != 0)
    }
}
