//! # IOC — I/O controller
//!
//! Two 16-bit down-counting interval timers and the two-bank IRQ plus FIQ
//! aggregator. The CPU samples the derived `irq_pending` / `fiq_pending`
//! flags between instruction retirements; they are recomputed after every
//! register write and every timer tick so the invariant
//!
//! ```text
//! irq_pending = (request_a & mask_a) != 0 || (request_b & mask_b) != 0
//! fiq_pending = (fiq_request & fiq_mask) != 0
//! ```
//!
//! holds at all times.

use logger::log_debug;

/// VFLY (vertical flyback) input, bit 3 of IRQ bank A.
pub const IRQ_A_VFLY: u32 = 1 << 3;

/// Timer 0 reload, bit 5 of IRQ bank A.
pub const IRQ_A_TIMER0: u32 = 1 << 5;

/// Timer 1 reload, bit 6 of IRQ bank A.
pub const IRQ_A_TIMER1: u32 = 1 << 6;

/// One 16-bit interval timer.
///
/// `current_low` counts against `latch` and wraps; each wrap increments
/// `current_high`. Reads of the high word go through `high_latched`, which
/// is captured on every high read and on latch writes so software sees a
/// stable pair.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    pub latch: u32,
    pub current_low: u32,
    pub current_high: u32,
    pub high_latched: u32,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            latch: 0xFFFF,
            current_low: 0,
            current_high: 0,
            high_latched: 0,
        }
    }
}

impl Timer {
    /// Advances the counter by `cycles`. Returns whether the counter
    /// reached the latch (however many times) during this tick.
    fn advance(&mut self, cycles: u32) -> bool {
        self.current_low += cycles;

        if self.latch == 0 || self.current_low < self.latch {
            return false;
        }

        let wraps = self.current_low / self.latch;
        self.current_low %= self.latch;
        self.current_high = (self.current_high + wraps) & 0xFFFF;

        true
    }

    /// A latch write also resets the running count.
    fn write_latch(&mut self, value: u32) {
        self.latch = value & 0xFFFF;
        self.current_low = value & 0xFFFF;
        self.high_latched = self.current_high;
    }

    /// Reading the high word captures the running high count first.
    fn read_high(&mut self) -> u32 {
        self.high_latched = self.current_high;
        self.high_latched
    }
}

pub struct Ioc {
    /// Control byte.
    pub control: u32,

    pub timer0: Timer,
    pub timer1: Timer,

    /// IRQ bank A level inputs (VFLY, timers).
    pub irq_status_a: u32,
    /// IRQ bank A latched requests; software clears bits by writing 1s.
    pub irq_request_a: u32,
    /// IRQ bank A mask, wholly writable.
    pub irq_mask_a: u32,

    pub irq_status_b: u32,
    pub irq_request_b: u32,
    pub irq_mask_b: u32,

    pub fiq_status: u32,
    pub fiq_request: u32,
    pub fiq_mask: u32,

    pub podule_irq_mask: u32,
    pub podule_irq_request: u32,

    /// Total cycles ticked since reset.
    pub cycles: u64,

    /// Derived: some unmasked IRQ request is asserted.
    pub irq_pending: bool,
    /// Derived: some unmasked FIQ request is asserted.
    pub fiq_pending: bool,
}

impl Default for Ioc {
    fn default() -> Self {
        Self {
            control: 0,
            timer0: Timer::default(),
            timer1: Timer::default(),
            irq_status_a: 0,
            irq_request_a: 0,
            // Timer interrupts enabled out of reset.
            irq_mask_a: IRQ_A_TIMER0 | IRQ_A_TIMER1,
            irq_status_b: 0,
            irq_request_b: 0,
            irq_mask_b: 0,
            fiq_status: 0,
            fiq_request: 0,
            fiq_mask: 0,
            podule_irq_mask: 0,
            podule_irq_request: 0,
            cycles: 0,
            irq_pending: false,
            fiq_pending: false,
        }
    }
}

impl Ioc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the register at `offset` (in words from the IOC base).
    pub fn read_register(&mut self, offset: u32) -> u32 {
        match offset {
            0 => self.control,
            1 => self.timer0.current_low,
            2 => self.timer0.read_high(),
            3 => self.timer1.current_low,
            4 => self.timer1.read_high(),
            5 => self.timer0.latch,
            6 => self.timer1.latch,
            7 => self.irq_status_a,
            8 => self.irq_request_a,
            9 => self.irq_mask_a,
            10 => self.irq_status_b,
            11 => self.irq_request_b,
            12 => self.irq_mask_b,
            13 => self.fiq_status,
            14 => self.fiq_request,
            15 => self.fiq_mask,
            16 => self.podule_irq_mask,
            17 => self.podule_irq_request,
            _ => {
                log_debug(format!("IOC read at offset {offset:#X} (unimplemented)"));
                0
            }
        }
    }

    /// Writes the register at `offset` (in words from the IOC base).
    ///
    /// Request registers are write-1-to-clear; a timer latch write also
    /// resets the matching counter.
    pub fn write_register(&mut self, offset: u32, value: u32) {
        match offset {
            0 => self.control = value,
            1 => self.timer0.current_low = value & 0xFFFF,
            2 => self.timer0.current_high = value & 0xFFFF,
            3 => self.timer1.current_low = value & 0xFFFF,
            4 => self.timer1.current_high = value & 0xFFFF,
            5 => self.timer0.write_latch(value),
            6 => self.timer1.write_latch(value),
            7 => self.irq_status_a = value,
            8 => self.irq_request_a &= !value,
            9 => self.irq_mask_a = value,
            10 => self.irq_status_b = value,
            11 => self.irq_request_b &= !value,
            12 => self.irq_mask_b = value,
            13 => self.fiq_status = value,
            14 => self.fiq_request &= !value,
            15 => self.fiq_mask = value,
            16 => self.podule_irq_mask = value,
            17 => self.podule_irq_request = value,
            _ => {
                log_debug(format!(
                    "IOC write at offset {offset:#X} with value {value:#010X} (unimplemented)"
                ));
            }
        }

        self.update_pending();
    }

    /// Advances both timers by one frame worth of cycles and asserts VFLY.
    ///
    /// At 8 MHz and 50 Hz the machine passes 160 000 cycles per call.
    pub fn update_timers(&mut self, cycles: u32) {
        self.cycles += u64::from(cycles);

        if self.timer0.advance(cycles) {
            self.irq_request_a |= IRQ_A_TIMER0;
        }
        if self.timer1.advance(cycles) {
            self.irq_request_a |= IRQ_A_TIMER1;
        }

        // Vertical flyback, once per frame tick.
        self.irq_request_a |= IRQ_A_VFLY;

        self.update_pending();
    }

    pub fn update_pending(&mut self) {
        self.irq_pending = (self.irq_request_a & self.irq_mask_a) != 0
            || (self.irq_request_b & self.irq_mask_b) != 0;
        self.fiq_pending = (self.fiq_request & self.fiq_mask) != 0;
    }

    /// Whether the VFLY request is currently asserted; the VIDC control
    /// register shadows this bit on reads.
    pub fn vfly_asserted(&self) -> bool {
        self.irq_request_a & IRQ_A_VFLY != 0
    }
}
