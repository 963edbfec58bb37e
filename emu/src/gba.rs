//! The assembled system and its scanline scheduler.
//!
//! A frame is 228 scanlines of 1232 cycles each: 1006 cycles of H-draw and
//! 226 of H-blank. Per scanline the scheduler handles the V-count match and
//! V-blank edges, drives the CPU through both cycle budgets, renders the
//! line, fires the H-blank/V-blank DMAs and advances the audio clock.

use logger::log;

use crate::cartridge::Cartridge;
use crate::bus::Bus;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::dma::Timing;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::cpu::hardware::keypad::GbaButton;
use crate::cpu::hardware::lcd::{DISPLAY_HEIGHT, DISPLAY_WIDTH, TOTAL_LINES};
use crate::cpu::EmulatorError;

/// CPU cycles per full scanline.
pub const CYCLES_PER_SCANLINE: u32 = 1232;

/// CPU cycles of the visible (H-draw) part of a scanline.
pub const CYCLES_PER_HDRAW: u32 = 1006;

pub struct Gba {
    pub cpu: Arm7tdmi,
}

impl Gba {
    /// Assemble a system around a cartridge and BIOS image.
    ///
    /// With `skip_bios` the CPU starts at the cartridge entry point with the
    /// documented post-BIOS register state; otherwise it boots through the
    /// reset vector.
    #[must_use]
    pub fn new(cartridge: Cartridge, bios: [u8; 0x4000], skip_bios: bool) -> Self {
        if !cartridge.title.is_empty() {
            log(format!(
                "cartridge: {} ({})",
                cartridge.title, cartridge.game_code
            ));
        }

        let bus = Bus::new(cartridge, bios);
        let mut cpu = Arm7tdmi::new(bus);

        if skip_bios {
            cpu.skip_bios();
        }

        Self { cpu }
    }

    /// Host input hook.
    pub fn set_button(&mut self, button: GbaButton, pressed: bool) {
        self.cpu.bus.keypad.set_button(button, pressed);
    }

    /// The full 240x228 native frame; only the top 160 rows are visible.
    #[must_use]
    pub fn frame(&self) -> &[u32] {
        &self.cpu.bus.lcd.frame
    }

    /// The visible 240x160 part of the frame.
    #[must_use]
    pub fn visible_frame(&self) -> &[u32] {
        &self.cpu.bus.lcd.frame[..DISPLAY_WIDTH * DISPLAY_HEIGHT]
    }

    /// Hand the buffered audio samples to the host.
    pub fn drain_audio(&mut self) -> Vec<i16> {
        self.cpu.bus.sound.drain_samples()
    }

    /// Run one scanline. Returns true when this scanline completed a frame.
    pub fn step_scanline(&mut self) -> Result<bool, EmulatorError> {
        let bus = &mut self.cpu.bus;

        bus.lcd.set_hblank_flag(false);
        bus.lcd.set_vcount_flag(false);

        if bus.lcd.vcount == bus.lcd.vcount_setting() {
            bus.lcd.set_vcount_flag(true);
            if bus.lcd.vcount_irq_enabled() {
                bus.raise_irq(Interrupt::VCount);
            }
        }

        if bus.lcd.vcount as usize == DISPLAY_HEIGHT {
            // Entering V-blank: latch the affine reference points, then let
            // the V-blank DMAs run before the CPU sees the flag.
            bus.lcd.reload_affine_references();
            bus.lcd.set_vblank_flag(true);
            if bus.lcd.vblank_irq_enabled() {
                bus.raise_irq(Interrupt::VBlank);
            }
            bus.dma_transfer(Timing::VBlank);
        }

        self.cpu.run_for(CYCLES_PER_HDRAW)?;

        let bus = &mut self.cpu.bus;
        if (bus.lcd.vcount as usize) < DISPLAY_HEIGHT {
            bus.lcd.render_scanline();
            bus.dma_transfer(Timing::HBlank);
        }

        bus.lcd.set_hblank_flag(true);
        if bus.lcd.hblank_irq_enabled() {
            bus.raise_irq(Interrupt::HBlank);
        }

        self.cpu.run_for(CYCLES_PER_SCANLINE - CYCLES_PER_HDRAW)?;

        let bus = &mut self.cpu.bus;
        bus.sound.advance(CYCLES_PER_SCANLINE);

        bus.lcd.vcount += 1;
        if bus.lcd.vcount as usize == TOTAL_LINES {
            bus.lcd.vcount = 0;
            bus.lcd.set_vblank_flag(false);
            return Ok(true);
        }

        Ok(false)
    }

    /// Run scanlines until a frame has been published.
    pub fn run_frame(&mut self) -> Result<(), EmulatorError> {
        while !self.step_scanline()? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwise::Bits;
    use pretty_assertions::assert_eq;

    fn idle_gba() -> Gba {
        // An empty cartridge: the CPU executes zero words, which decode as
        // ANDEQ r0, r0, r0 and stay harmless.
        let mut gba = Gba::new(Cartridge::new(vec![0; 0x100]), [0; 0x4000], true);
        // Park the CPU in RAM so fetches stay cheap and predictable.
        gba.cpu.registers.set_program_counter(0x0300_0000);
        gba
    }

    #[test]
    fn scanline_walks_vcount_and_flags() {
        let mut gba = idle_gba();

        assert!(!gba.step_scanline().unwrap());
        assert_eq!(gba.cpu.bus.lcd.vcount, 1);
        assert!(gba.cpu.bus.lcd.dispstat.get_bit(1), "H-blank flag");

        let mut frames = 0;
        for _ in 1..TOTAL_LINES {
            if gba.step_scanline().unwrap() {
                frames += 1;
            }
        }
        assert_eq!(frames, 1);
        assert_eq!(gba.cpu.bus.lcd.vcount, 0);
    }

    #[test]
    fn vblank_flag_spans_lines_160_to_227() {
        let mut gba = idle_gba();

        for _ in 0..DISPLAY_HEIGHT {
            gba.step_scanline().unwrap();
        }
        assert!(!gba.cpu.bus.lcd.dispstat.get_bit(0));

        gba.step_scanline().unwrap();
        assert!(gba.cpu.bus.lcd.dispstat.get_bit(0), "V-blank flag set at 160");

        gba.run_frame().unwrap();
        assert!(!gba.cpu.bus.lcd.dispstat.get_bit(0), "cleared at wrap");
    }

    #[test]
    fn vblank_irq_fires_when_enabled() {
        let mut gba = idle_gba();
        gba.cpu.bus.lcd.dispstat.set_bit_on(3);

        gba.run_frame().unwrap();

        assert_ne!(
            gba.cpu.bus.interrupt_control.interrupt_flags & Interrupt::VBlank.flag(),
            0
        );
    }

    #[test]
    fn vcount_match_fires_at_configured_line() {
        let mut gba = idle_gba();
        // LYC = 3 with the match IRQ enabled.
        gba.cpu.bus.lcd.dispstat = (3 << 8) | (1 << 5);

        for _ in 0..3 {
            gba.step_scanline().unwrap();
            assert!(!gba.cpu.bus.lcd.dispstat.get_bit(2));
            gba.cpu.bus.interrupt_control.interrupt_flags = 0;
        }

        gba.step_scanline().unwrap();
        assert!(gba.cpu.bus.lcd.dispstat.get_bit(2));
        assert_ne!(
            gba.cpu.bus.interrupt_control.interrupt_flags & Interrupt::VCount.flag(),
            0
        );
    }

    #[test]
    fn vblank_dma_runs_at_line_160() {
        let mut gba = idle_gba();

        for i in 0..4u32 {
            gba.cpu.bus.write_word(0x0200_0000 + i * 4, 0xAABB_0000 + i);
        }

        gba.cpu.bus.write_word(0x0400_00B0, 0x0200_0000);
        gba.cpu.bus.write_word(0x0400_00B4, 0x0300_0800);
        gba.cpu.bus.write_half_word(0x0400_00B8, 8);
        // Enabled, V-blank timing, 32-bit.
        gba.cpu.bus.write_half_word(0x0400_00BA, 0x8000 | (1 << 12) | (1 << 10));

        for _ in 0..DISPLAY_HEIGHT {
            gba.step_scanline().unwrap();
        }
        assert_eq!(gba.cpu.bus.read_word(0x0300_0800), 0);

        gba.step_scanline().unwrap();
        for i in 0..4u32 {
            assert_eq!(gba.cpu.bus.read_word(0x0300_0800 + i * 4), 0xAABB_0000 + i);
        }
    }

    #[test]
    fn frame_renders_mode4_backdrop_and_layer() {
        let mut gba = idle_gba();
        let bus = &mut gba.cpu.bus;

        // Mode 4, BG2 on; palette 1 = white; one line of pixel index 1.
        bus.write_half_word(0x0400_0000, 0x0404);
        bus.write_half_word(0x0500_0002, 0x7FFF);
        for x in 0..DISPLAY_WIDTH as u32 {
            bus.write_byte(0x0600_0000 + x, 0x01);
        }

        gba.run_frame().unwrap();

        let frame = gba.visible_frame();
        for x in 0..DISPLAY_WIDTH {
            assert_eq!(frame[x], 0xFFFF_FFFF, "pixel {x}");
        }
        // Row 1 has no pixel data: backdrop.
        assert_eq!(frame[DISPLAY_WIDTH], 0xFF00_0000);
    }

    #[test]
    fn audio_samples_accumulate_per_frame() {
        let mut gba = idle_gba();
        gba.run_frame().unwrap();

        let samples = gba.drain_audio();
        // 228 scanlines * 1232 cycles / 512 cycles per sample.
        assert_eq!(samples.len(), (TOTAL_LINES as u32 * CYCLES_PER_SCANLINE / 512) as usize);
    }
}
