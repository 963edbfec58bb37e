use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// DMACNT_H enable bit.
pub const DMA_ENABLE: u16 = 1 << 15;

/// DMACNT_H interrupt-request bit.
pub const DMA_IRQ: u16 = 1 << 14;

/// DMACNT_H 32-bit transfer bit.
pub const DMA_32BIT: u16 = 1 << 10;

/// DMACNT_H repeat bit.
pub const DMA_REPEAT: u16 = 1 << 9;

/// Start timing, DMACNT_H bits 13..12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Immediately = 0,
    VBlank = 1,
    HBlank = 2,
    Special = 3,
}

/// One DMA channel: the programmer-visible registers plus the internal
/// latches the transfer engine actually walks.
#[derive(Default, Serialize, Deserialize)]
pub struct Channel {
    pub source_address: u32,
    pub destination_address: u32,
    pub word_count: u16,
    pub control: u16,

    /// Latched at the 0→1 enable edge; advanced during transfers.
    pub internal_source: u32,
    pub internal_destination: u32,
    pub remaining: u32,
}

impl Channel {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control & DMA_ENABLE != 0
    }

    #[must_use]
    pub fn timing(&self) -> Timing {
        match self.control.get_bits(12..=13) {
            0 => Timing::Immediately,
            1 => Timing::VBlank,
            2 => Timing::HBlank,
            _ => Timing::Special,
        }
    }

    #[must_use]
    pub fn word_transfer(&self) -> bool {
        self.control & DMA_32BIT != 0
    }

    /// Bytes moved per unit.
    #[must_use]
    pub fn unit_size(&self) -> u32 {
        if self.word_transfer() {
            4
        } else {
            2
        }
    }

    /// Signed destination step per unit, plus the end-reload flag.
    #[must_use]
    pub fn destination_step(&self) -> (i32, bool) {
        let unit = self.unit_size() as i32;
        match self.control.get_bits(5..=6) {
            0 => (unit, false),
            1 => (-unit, false),
            3 => (unit, true),
            _ => (0, false),
        }
    }

    /// Signed source step per unit.
    #[must_use]
    pub fn source_step(&self) -> i32 {
        let unit = self.unit_size() as i32;
        match self.control.get_bits(7..=8) {
            0 => unit,
            1 => -unit,
            _ => 0,
        }
    }

    /// Latch source, destination and count, aligning the addresses to the
    /// transfer unit.
    pub fn latch(&mut self) {
        let align = !(self.unit_size() - 1);
        self.internal_source = self.source_address & align;
        self.internal_destination = self.destination_address & align;
        self.remaining = self.word_count as u32;
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [Channel; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_aligns_to_unit() {
        let mut channel = Channel {
            source_address: 0x0200_0003,
            destination_address: 0x0700_0002,
            word_count: 0x40,
            control: DMA_32BIT,
            ..Default::default()
        };

        channel.latch();
        assert_eq!(channel.internal_source, 0x0200_0000);
        assert_eq!(channel.internal_destination, 0x0700_0000);
        assert_eq!(channel.remaining, 0x40);

        channel.control = 0;
        channel.latch();
        assert_eq!(channel.internal_source, 0x0200_0002);
    }

    #[test]
    fn increment_decoding() {
        let mut channel = Channel::default();

        channel.control = DMA_32BIT;
        assert_eq!(channel.source_step(), 4);
        assert_eq!(channel.destination_step(), (4, false));

        channel.control = DMA_32BIT | (1 << 5) | (1 << 7);
        assert_eq!(channel.source_step(), -4);
        assert_eq!(channel.destination_step(), (-4, false));

        channel.control = (2 << 5) | (2 << 7);
        assert_eq!(channel.source_step(), 0);
        assert_eq!(channel.destination_step(), (0, false));

        channel.control = 3 << 5;
        assert_eq!(channel.destination_step(), (2, true));
    }

    #[test]
    fn timing_decoding() {
        let mut channel = Channel::default();
        for (bits, timing) in [
            (0, Timing::Immediately),
            (1, Timing::VBlank),
            (2, Timing::HBlank),
            (3, Timing::Special),
        ] {
            channel.control = bits << 12;
            assert_eq!(channel.timing(), timing);
        }
    }
}
