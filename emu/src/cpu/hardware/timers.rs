use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Prescaler shift per the low two control bits: /1, /64, /256, /1024.
const PRESCALE_SHIFT: [u32; 4] = [0, 6, 8, 10];

/// One of the four 16-bit timers.
///
/// `counter` is kept wider than 16 bits so overflow can be observed as
/// `counter > 0xFFFF` before the reload is applied; I/O reads expose the low
/// halfword. `accumulator` holds CPU cycles that have not yet amounted to a
/// prescaled tick.
#[derive(Default, Serialize, Deserialize)]
pub struct Timer {
    /// TMxCNT_L on write.
    pub reload: u16,

    /// TMxCNT_L on read.
    pub counter: u32,

    /// TMxCNT_H.
    pub control: u16,

    pub accumulator: u32,
}

impl Timer {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(7)
    }

    #[must_use]
    pub fn cascade(&self) -> bool {
        self.control.get_bit(2)
    }

    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.control.get_bit(6)
    }

    #[must_use]
    pub fn prescale_shift(&self) -> u32 {
        PRESCALE_SHIFT[(self.control & 0b11) as usize]
    }

    /// Consume `cycles` CPU cycles, advancing the counter by however many
    /// prescaled ticks they amount to.
    pub fn accumulate(&mut self, cycles: u32) {
        self.accumulator += cycles;
        let ticks = self.accumulator >> self.prescale_shift();
        self.counter += ticks;
        self.accumulator -= ticks << self.prescale_shift();
    }

    /// Apply the overflow reload rule: the excess above 0x10000 carries into
    /// the reloaded counter.
    pub fn reload_after_overflow(&mut self) {
        self.counter = self.reload as u32 + (self.counter - 0x10000);
    }

    /// Write the low control byte, reloading the counter when the enable bit
    /// flips from 0 to 1.
    pub fn write_control(&mut self, byte: u8) {
        let old = self.control.get_byte(0);
        self.control.set_byte(0, byte);

        if (old ^ byte) & byte & 0x80 != 0 {
            self.counter = self.reload as u32;
            self.accumulator = 0;
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct Timers {
    pub timers: [Timer; 4],
}

impl Timers {
    /// True when at least one timer is running, so the per-instruction tick
    /// can be skipped entirely otherwise.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.timers.iter().any(Timer::enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_accumulates_partial_ticks() {
        let mut timer = Timer {
            control: 0x80 | 0b01, // enabled, /64
            ..Default::default()
        };

        timer.accumulate(63);
        assert_eq!(timer.counter, 0);
        assert_eq!(timer.accumulator, 63);

        timer.accumulate(1);
        assert_eq!(timer.counter, 1);
        assert_eq!(timer.accumulator, 0);

        timer.accumulate(129);
        assert_eq!(timer.counter, 3);
        assert_eq!(timer.accumulator, 1);
    }

    #[test]
    fn overflow_reload_keeps_excess() {
        let mut timer = Timer {
            reload: 0xFF00,
            counter: 0x10003,
            ..Default::default()
        };

        timer.reload_after_overflow();
        assert_eq!(timer.counter, 0xFF03);
    }

    #[test]
    fn enabling_reloads_counter() {
        let mut timer = Timer {
            reload: 0x1234,
            counter: 0,
            accumulator: 55,
            ..Default::default()
        };

        timer.write_control(0x80);
        assert_eq!(timer.counter, 0x1234);
        assert_eq!(timer.accumulator, 0);

        // Rewriting the enable bit must not reload again.
        timer.counter = 0x2000;
        timer.write_control(0x80);
        assert_eq!(timer.counter, 0x2000);
    }
}
