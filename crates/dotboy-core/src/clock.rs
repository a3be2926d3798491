/// Divides an incoming cycle count down to a fixed period.
///
/// `next` accumulates cycles and returns how many whole periods elapsed,
/// keeping the remainder for the following call.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    period: u32,
    n: u32,
}

impl Clock {
    pub fn new(period: u32) -> Self {
        debug_assert!(period > 0);
        Self { period, n: 0 }
    }

    pub fn next(&mut self, cycles: u32) -> u32 {
        self.n += cycles;
        let rs = self.n / self.period;
        self.n %= self.period;
        rs
    }

    pub fn reset(&mut self) {
        self.n = 0;
    }

    pub fn period(&self) -> u32 {
        self.period
    }
}
