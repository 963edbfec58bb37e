use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Cycles between output samples: 16.78 MHz / 32768 Hz.
const CYCLES_PER_SAMPLE: u32 = 512;

/// Bound on buffered samples before the oldest are dropped.
const SAMPLE_BUFFER_LEN: usize = 0x4000;

/// One of the two direct-sound FIFOs. DMA writes land in `latch` (the
/// FIFO_A/FIFO_B registers) and are committed four bytes at a time;
/// timer overflow consumes one byte per `load`.
#[derive(Default, Serialize, Deserialize)]
pub struct Fifo {
    pub latch: u32,
    data: [u8; 32],
    len: usize,
}

impl Fifo {
    /// Commit the four latched bytes. A full FIFO drops the write.
    pub fn copy_latch(&mut self) {
        if self.len + 4 > self.data.len() {
            return;
        }

        for byte in 0..4 {
            self.data[self.len] = self.latch.get_byte(byte);
            self.len += 1;
        }
    }

    /// Pop the oldest byte as a signed sample, if any.
    pub fn load(&mut self) -> Option<i8> {
        if self.len == 0 {
            return None;
        }

        let sample = self.data[0] as i8;
        self.len -= 1;
        self.data.copy_within(1.., 0);
        Some(sample)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// FIFO DMA refills once the backlog drops to half capacity.
    #[must_use]
    pub fn needs_refill(&self) -> bool {
        self.len <= 0x10
    }
}

/// The sound register file plus the FIFO plumbing.
///
/// Tone/wave/noise synthesis is not modeled: the PSG registers hold their
/// documented read/write behavior and the direct-sound path latches one
/// sample per FIFO on timer overflow, which is what DMA and the timers
/// observe. `advance` turns those latches into a drainable sample stream.
#[derive(Default, Serialize, Deserialize)]
pub struct Sound {
    /// SOUND1CNT_L (sweep), 0x04000060.
    pub sound1cnt_l: u16,
    /// SOUND1CNT_H (duty/length/envelope), 0x04000062.
    pub sound1cnt_h: u16,
    /// SOUND1CNT_X (frequency/control), 0x04000064.
    pub sound1cnt_x: u16,
    /// SOUND2CNT_L, 0x04000068.
    pub sound2cnt_l: u16,
    /// SOUND2CNT_H, 0x0400006C.
    pub sound2cnt_h: u16,
    /// SOUND3CNT_L (stop/wave RAM select), 0x04000070.
    pub sound3cnt_l: u16,
    /// SOUND3CNT_H (length/volume), 0x04000072.
    pub sound3cnt_h: u16,
    /// SOUND3CNT_X, 0x04000074.
    pub sound3cnt_x: u16,
    /// SOUND4CNT_L, 0x04000078.
    pub sound4cnt_l: u16,
    /// SOUND4CNT_H, 0x0400007C.
    pub sound4cnt_h: u16,
    /// SOUNDCNT_L (stereo volume/enable), 0x04000080.
    pub soundcnt_l: u16,
    /// SOUNDCNT_H (mixing/DMA control), 0x04000082.
    pub soundcnt_h: u16,
    /// SOUNDCNT_X (master enable), 0x04000084.
    pub soundcnt_x: u16,
    /// SOUNDBIAS, 0x04000088.
    pub soundbias: u32,

    /// Two 16-byte wave pattern banks, selected by SOUND3CNT_L bit 6.
    pub wave_ram: [[u8; 16]; 2],

    pub fifo: [Fifo; 2],

    /// Last sample consumed from each FIFO, held until the next overflow.
    pub fifo_samples: [i8; 2],

    sample_buffer: Vec<i16>,
    sound_cycles: u32,
}

impl Sound {
    /// SOUNDCNT_X bit 7. Most PSG registers reject writes while clear.
    #[must_use]
    pub fn master_enabled(&self) -> bool {
        self.soundcnt_x.get_bit(7)
    }

    /// Which timer (0/1) drives the given FIFO.
    #[must_use]
    pub fn fifo_timer(&self, fifo: usize) -> usize {
        let bit = if fifo == 0 { 10 } else { 14 };
        self.soundcnt_h.get_bit(bit) as usize
    }

    /// The wave RAM bank visible at 0x04000090..0x0400009F (the one *not*
    /// currently being played).
    #[must_use]
    pub fn visible_wave_bank(&self) -> usize {
        !self.sound3cnt_l.get_bit(6) as usize
    }

    /// Consume one byte from a FIFO on timer overflow.
    pub fn fifo_load(&mut self, fifo: usize) {
        if let Some(sample) = self.fifo[fifo].load() {
            self.fifo_samples[fifo] = sample;
        }
    }

    /// Advance the audio clock. One output sample is produced every 512
    /// cycles from the current FIFO latches.
    pub fn advance(&mut self, cycles: u32) {
        self.sound_cycles += cycles;

        while self.sound_cycles >= CYCLES_PER_SAMPLE {
            self.sound_cycles -= CYCLES_PER_SAMPLE;

            let mixed = (self.fifo_samples[0] as i16 + self.fifo_samples[1] as i16) << 6;
            if self.sample_buffer.len() >= SAMPLE_BUFFER_LEN {
                self.sample_buffer.remove(0);
            }
            self.sample_buffer.push(mixed);
        }
    }

    /// Hand the buffered samples to the host.
    pub fn drain_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.sample_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_copy_and_load() {
        let mut fifo = Fifo::default();
        fifo.latch = 0x4433_2211;
        fifo.copy_latch();

        assert_eq!(fifo.len(), 4);
        assert_eq!(fifo.load(), Some(0x11));
        assert_eq!(fifo.load(), Some(0x22));
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn full_fifo_drops_writes() {
        let mut fifo = Fifo::default();
        for _ in 0..8 {
            fifo.copy_latch();
        }
        assert_eq!(fifo.len(), 32);
        assert!(!fifo.needs_refill());

        fifo.copy_latch();
        assert_eq!(fifo.len(), 32);
    }

    #[test]
    fn refill_threshold() {
        let mut fifo = Fifo::default();
        for _ in 0..5 {
            fifo.copy_latch();
        }
        assert_eq!(fifo.len(), 20);
        assert!(!fifo.needs_refill());

        for _ in 0..4 {
            fifo.load();
        }
        assert!(fifo.needs_refill());
    }

    #[test]
    fn fifo_timer_selection() {
        let mut sound = Sound::default();
        assert_eq!(sound.fifo_timer(0), 0);
        assert_eq!(sound.fifo_timer(1), 0);

        sound.soundcnt_h = (1 << 10) | (1 << 14);
        assert_eq!(sound.fifo_timer(0), 1);
        assert_eq!(sound.fifo_timer(1), 1);
    }

    #[test]
    fn advance_produces_samples() {
        let mut sound = Sound::default();
        sound.fifo_samples = [4, -2];

        sound.advance(1232);
        let samples = sound.drain_samples();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|&s| s == 2 << 6));
        assert!(sound.drain_samples().is_empty());
    }
}
