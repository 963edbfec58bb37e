//! The unified memory fabric.
//!
//! Every CPU and DMA access funnels through [`Bus`]: region dispatch by the
//! top address byte, the byte-laned I/O register file at 0x04000000, the
//! cartridge backup overlays, waitstate bookkeeping, the DMA engine and the
//! timer fabric. The bus owns all hardware state; the CPU keeps only its
//! register file and hands the bus its current r15 for the few accesses that
//! depend on it (BIOS protection, the BIOS-only DISPCNT bit).

use logger::log;

use crate::bitwise::Bits;
use crate::cartridge::Cartridge;
use crate::cpu::hardware::backup::Backup;
use crate::cpu::hardware::dma::{Dma, Timing, DMA_ENABLE, DMA_IRQ, DMA_REPEAT};
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::interrupt_control::{Interrupt, InterruptControl, PowerState};
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::serial::Serial;
use crate::cpu::hardware::sound::Sound;
use crate::cpu::hardware::timers::Timers;

/// First-access waitstates per WAITCNT setting.
const GAME_PAK_NON_SEQ: [u32; 4] = [4, 3, 2, 8];

/// Per-region access times, non-sequential and sequential, refreshed from
/// WAITCNT. Indexed by the top address nibble.
struct WaitStates {
    access16: [[u32; 16]; 2],
    access32: [[u32; 16]; 2],
}

impl Default for WaitStates {
    fn default() -> Self {
        let mut wait_states = Self {
            access16: [[1, 1, 3, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 1]; 2],
            access32: [[1, 1, 6, 1, 1, 2, 2, 1, 0, 0, 0, 0, 0, 0, 0, 1]; 2],
        };
        wait_states.update(0);
        wait_states
    }
}

impl WaitStates {
    fn update(&mut self, waitcnt: u16) {
        let sram = GAME_PAK_NON_SEQ[(waitcnt.get_bits(0..=1)) as usize];
        let ws0_first = GAME_PAK_NON_SEQ[(waitcnt.get_bits(2..=3)) as usize];
        let ws0_second = if waitcnt.get_bit(4) { 1 } else { 2 };
        let ws1_first = GAME_PAK_NON_SEQ[(waitcnt.get_bits(5..=6)) as usize];
        let ws1_second = if waitcnt.get_bit(7) { 1 } else { 4 };
        let ws2_first = GAME_PAK_NON_SEQ[(waitcnt.get_bits(8..=9)) as usize];
        let ws2_second = if waitcnt.get_bit(10) { 1 } else { 8 };

        for bank in [8, 9] {
            self.access16[0][bank] = 1 + ws0_first;
            self.access16[1][bank] = 1 + ws0_second;
        }
        for bank in [10, 11] {
            self.access16[0][bank] = 1 + ws1_first;
            self.access16[1][bank] = 1 + ws1_second;
        }
        for bank in [12, 13] {
            self.access16[0][bank] = 1 + ws2_first;
            self.access16[1][bank] = 1 + ws2_second;
        }
        self.access16[0][14] = 1 + sram;
        self.access16[1][14] = 1 + sram;

        for bank in 8..=14 {
            self.access32[0][bank] = self.access16[0][bank] + self.access16[1][bank];
            self.access32[1][bank] = 2 * self.access16[1][bank];
        }
    }
}

#[derive(Default)]
pub struct Bus {
    pub internal_memory: InternalMemory,
    pub cartridge: Cartridge,
    pub backup: Backup,
    pub lcd: Lcd,
    pub sound: Sound,
    pub dma: Dma,
    pub timers: Timers,
    pub serial: Serial,
    pub keypad: Keypad,
    pub interrupt_control: InterruptControl,
    wait_states: WaitStates,

    /// Snapshot of r15, refreshed by the CPU every step.
    pub(crate) program_counter: u32,

    /// Cycles burned by DMA since the CPU last collected them.
    dma_stall: u32,
}

impl Bus {
    #[must_use]
    pub fn new(cartridge: Cartridge, bios: [u8; 0x4000]) -> Self {
        Self {
            internal_memory: InternalMemory::with_bios(bios),
            cartridge,
            ..Default::default()
        }
    }

    pub fn raise_irq(&mut self, interrupt: Interrupt) {
        self.interrupt_control.raise(interrupt);
    }

    /// 16-bit access time for an address.
    #[must_use]
    pub fn access_cycles_16(&self, address: u32, sequential: bool) -> u32 {
        self.wait_states.access16[sequential as usize][((address >> 24) & 0xF) as usize]
    }

    /// 32-bit access time for an address.
    #[must_use]
    pub fn access_cycles_32(&self, address: u32, sequential: bool) -> u32 {
        self.wait_states.access32[sequential as usize][((address >> 24) & 0xF) as usize]
    }

    /// Cycles consumed by DMA since the last call.
    pub fn take_dma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.dma_stall)
    }

    fn bios_accessible(&self, address: u32) -> bool {
        (address | self.program_counter) < 0x4000
    }

    fn eeprom_overlay(&self, address: u32) -> bool {
        if self.cartridge.len() > 0x0100_0000 {
            address >> 8 == 0x000D_FFFF
        } else {
            address >> 24 == 0x0D
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn read_word(&mut self, address: u32) -> u32 {
        let address = address & !3;

        match (address >> 24) & 0xFF {
            0x00 => {
                if self.bios_accessible(address) {
                    let offset = (address & 0x3FFF) as usize;
                    let value = u32::from_le_bytes(
                        self.internal_memory.bios[offset..offset + 4].try_into().unwrap(),
                    );
                    self.internal_memory.bios_bus = value;
                    value
                } else {
                    self.internal_memory.bios_bus
                }
            }
            0x0C | 0x0D if self.backup.is_eeprom() && self.eeprom_overlay(address) => {
                self.eeprom_read_lane(0) as u32
            }
            _ => {
                let low = self.read_half_word(address) as u32;
                let high = self.read_half_word(address + 2) as u32;
                low | (high << 16)
            }
        }
    }

    pub fn read_half_word(&mut self, address: u32) -> u16 {
        let address = address & !1;

        match (address >> 24) & 0xFF {
            0x00 => {
                if self.bios_accessible(address) {
                    let offset = (address & 0x3FFF) as usize;
                    u16::from_le_bytes(
                        self.internal_memory.bios[offset..offset + 2].try_into().unwrap(),
                    )
                } else {
                    self.internal_memory.bios_bus as u16
                }
            }
            0x04 => {
                let low = self.read_io(address) as u16;
                let high = self.read_io(address + 1) as u16;
                low | (high << 8)
            }
            0x0C | 0x0D if self.backup.is_eeprom() && self.eeprom_overlay(address) => {
                self.eeprom_read_lane(0) as u16
            }
            _ => {
                let low = self.read_plain_byte(address) as u16;
                let high = self.read_plain_byte(address + 1) as u16;
                low | (high << 8)
            }
        }
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        match (address >> 24) & 0xFF {
            0x00 => {
                if self.bios_accessible(address) {
                    self.internal_memory.bios[(address & 0x3FFF) as usize]
                } else {
                    self.internal_memory.bios_bus as u8
                }
            }
            0x04 => self.read_io(address),
            0x0C | 0x0D if self.backup.is_eeprom() && self.eeprom_overlay(address) => {
                self.eeprom_read_lane(0)
            }
            _ => self.read_plain_byte(address),
        }
    }

    /// Word load with the ARM7 misaligned-load rotation applied.
    pub fn read_word_rotated(&mut self, address: u32) -> u32 {
        self.read_word(address).rotate_right(8 * (address & 3))
    }

    /// Halfword load with the ARM7 misaligned-load rotation applied.
    pub fn read_half_word_rotated(&mut self, address: u32) -> u32 {
        (self.read_half_word(address) as u32).rotate_right(8 * (address & 1))
    }

    /// Byte read of the RAM-like regions (everything except BIOS, I/O and
    /// the EEPROM overlay, which are width-sensitive).
    fn read_plain_byte(&mut self, address: u32) -> u8 {
        match (address >> 24) & 0xFF {
            0x02 => self.internal_memory.working_ram[(address & 0x3_FFFF) as usize],
            0x03 => self.internal_memory.working_iram[(address & 0x7FFF) as usize],
            0x04 => self.read_io(address),
            0x05 => self.lcd.palette_ram[(address & 0x3FF) as usize],
            0x06 => self.lcd.video_ram[Lcd::vram_offset(address)],
            0x07 => self.lcd.oam[(address & 0x3FF) as usize],
            0x08..=0x0D => self.cartridge.read((address & 0x01FF_FFFF) as usize),
            0x0E | 0x0F => self.backup.read(address),
            _ => {
                tracing::debug!("read on unused memory {address:#010X}");
                0
            }
        }
    }

    fn eeprom_read_lane(&mut self, _lane: u32) -> u8 {
        if let Backup::Eeprom(eeprom) = &mut self.backup {
            eeprom.read_bit()
        } else {
            0
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & !3;

        match (address >> 24) & 0xF {
            0x4 => {
                for lane in 0..4 {
                    self.write_io(address + lane, value.get_byte(lane as u8));
                }
            }
            0x5 => {
                let offset = (address & 0x3FF) as usize;
                self.lcd.palette_ram[offset] = value.get_byte(0);
                self.lcd.palette_ram[offset + 1] = value.get_byte(1);
                self.lcd.palette_ram[offset + 2] = value.get_byte(2);
                self.lcd.palette_ram[offset + 3] = value.get_byte(3);
                self.lcd.refresh_palette_entry(address);
                self.lcd.refresh_palette_entry(address + 2);
            }
            0x6 => {
                let offset = Lcd::vram_offset(address);
                self.lcd.video_ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            }
            0x7 => {
                let offset = (address & 0x3FF) as usize;
                self.lcd.oam[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            }
            0xC | 0xD => {
                if self.eeprom_overlay(address) {
                    let request = self.dma.channels[3].word_count as u32;
                    self.backup.eeprom_write_bit(value.get_byte(0), request);
                }
            }
            0xE | 0xF => {
                for lane in 0..4 {
                    self.backup.write(address + lane, value.get_byte(lane as u8));
                }
            }
            _ => {
                self.write_plain_half_word(address, value as u16);
                self.write_plain_half_word(address + 2, (value >> 16) as u16);
            }
        }
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let address = address & !1;

        match (address >> 24) & 0xF {
            0x4 => {
                self.write_io(address, value.get_byte(0));
                self.write_io(address + 1, value.get_byte(1));
            }
            0x5 => {
                let offset = (address & 0x3FF) as usize;
                self.lcd.palette_ram[offset] = value.get_byte(0);
                self.lcd.palette_ram[offset + 1] = value.get_byte(1);
                self.lcd.refresh_palette_entry(address);
            }
            0x6 => {
                let offset = Lcd::vram_offset(address);
                self.lcd.video_ram[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            }
            0x7 => {
                let offset = (address & 0x3FF) as usize;
                self.lcd.oam[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            }
            0xC | 0xD => {
                if self.eeprom_overlay(address) {
                    let request = self.dma.channels[3].word_count as u32;
                    self.backup.eeprom_write_bit(value.get_byte(0), request);
                }
            }
            0xE | 0xF => {
                self.backup.write(address, value.get_byte(0));
                self.backup.write(address + 1, value.get_byte(1));
            }
            _ => self.write_plain_half_word(address, value),
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        match (address >> 24) & 0xF {
            0x2 => self.internal_memory.working_ram[(address & 0x3_FFFF) as usize] = value,
            0x3 => self.internal_memory.working_iram[(address & 0x7FFF) as usize] = value,
            0x4 => self.write_io(address, value),
            0x5 => {
                // A byte write to palette RAM acts as a halfword write with
                // the byte on both lanes.
                self.write_half_word(address & !1, u16::from_le_bytes([value, value]));
            }
            0x6 => {
                // Same duplication rule for VRAM.
                let offset = Lcd::vram_offset(address & !1);
                self.lcd.video_ram[offset] = value;
                self.lcd.video_ram[offset + 1] = value;
            }
            0x7 => {
                // Byte writes to OAM are ignored.
            }
            0xC | 0xD => {
                if self.eeprom_overlay(address) {
                    let request = self.dma.channels[3].word_count as u32;
                    self.backup.eeprom_write_bit(value, request);
                }
            }
            0xE | 0xF => self.backup.write(address, value),
            _ => {
                tracing::debug!("write on unused memory {address:#010X}");
            }
        }
    }

    /// Halfword write into the RAM regions (used by the word splitter).
    fn write_plain_half_word(&mut self, address: u32, value: u16) {
        match (address >> 24) & 0xF {
            0x2 => {
                let offset = (address & 0x3_FFFF) as usize;
                self.internal_memory.working_ram[offset..offset + 2]
                    .copy_from_slice(&value.to_le_bytes());
            }
            0x3 => {
                let offset = (address & 0x7FFF) as usize;
                self.internal_memory.working_iram[offset..offset + 2]
                    .copy_from_slice(&value.to_le_bytes());
            }
            _ => {
                tracing::debug!("write on unused memory {address:#010X}");
            }
        }
    }

    // ------------------------------------------------------------------
    // I/O register file, byte-laned
    // ------------------------------------------------------------------

    fn read_io(&self, address: u32) -> u8 {
        match address {
            0x0400_0000..=0x0400_005F => self.read_lcd_raw(address),
            0x0400_0060..=0x0400_00AF => self.read_sound_raw(address),
            0x0400_00B0..=0x0400_00FF => self.read_dma_raw(address),
            0x0400_0100..=0x0400_011F => self.read_timers_raw(address),
            0x0400_0120..=0x0400_012F | 0x0400_0134..=0x0400_01FF => self.read_serial_raw(address),
            0x0400_0130..=0x0400_0133 => self.read_keypad_raw(address),
            0x0400_0200..=0x04FF_FFFF => self.read_interrupt_control_raw(address),
            _ => self.read_undocumented(address),
        }
    }

    fn write_io(&mut self, address: u32, value: u8) {
        match address {
            0x0400_0000..=0x0400_005F => self.write_lcd_raw(address, value),
            0x0400_0060..=0x0400_00AF => self.write_sound_raw(address, value),
            0x0400_00B0..=0x0400_00FF => self.write_dma_raw(address, value),
            0x0400_0100..=0x0400_011F => self.write_timers_raw(address, value),
            0x0400_0120..=0x0400_012F | 0x0400_0134..=0x0400_01FF => {
                self.write_serial_raw(address, value);
            }
            0x0400_0130..=0x0400_0133 => self.write_keypad_raw(address, value),
            0x0400_0200..=0x04FF_FFFF => self.write_interrupt_control_raw(address, value),
            _ => {
                tracing::debug!("I/O write outside the register file {address:#010X}");
            }
        }
    }

    fn read_undocumented(&self, address: u32) -> u8 {
        log(format!(
            "I/O read of undocumented or write-only register {address:#010X}"
        ));
        0
    }

    fn read_lcd_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0000 => self.lcd.dispcnt.get_byte(0),
            0x0400_0001 => self.lcd.dispcnt.get_byte(1),
            0x0400_0002 => self.lcd.green_swap.get_byte(0),
            0x0400_0003 => self.lcd.green_swap.get_byte(1),
            0x0400_0004 => self.lcd.dispstat.get_byte(0),
            0x0400_0005 => self.lcd.dispstat.get_byte(1),
            0x0400_0006 => self.lcd.vcount.get_byte(0),
            0x0400_0007 => self.lcd.vcount.get_byte(1),
            0x0400_0008..=0x0400_000F => {
                let bg = ((address - 0x0400_0008) / 2) as usize;
                self.lcd.bgcnt[bg].get_byte((address & 1) as u8)
            }
            0x0400_0048 => self.lcd.winin.get_byte(0),
            0x0400_0049 => self.lcd.winin.get_byte(1),
            0x0400_004A => self.lcd.winout.get_byte(0),
            0x0400_004B => self.lcd.winout.get_byte(1),
            0x0400_0050 => self.lcd.bldcnt.get_byte(0),
            0x0400_0051 => self.lcd.bldcnt.get_byte(1),
            0x0400_0052 => self.lcd.bldalpha.get_byte(0),
            0x0400_0053 => self.lcd.bldalpha.get_byte(1),
            _ => self.read_undocumented(address),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn write_lcd_raw(&mut self, address: u32, mut value: u8) {
        match address {
            0x0400_0000 => {
                // The CGB-mode bit can only be set from inside the BIOS.
                if self.program_counter >= 0x4000 {
                    value &= 0xF7;
                }
                self.lcd.dispcnt.set_byte(0, value);
            }
            0x0400_0001 => self.lcd.dispcnt.set_byte(1, value),
            0x0400_0002 => self.lcd.green_swap.set_byte(0, value),
            0x0400_0003 => self.lcd.green_swap.set_byte(1, value),
            0x0400_0004 => {
                // Bits 0..2 (and the undocumented bit 6) are read-only.
                let current = self.lcd.dispstat.get_byte(0);
                self.lcd.dispstat.set_byte(0, (current & 0x47) | (value & !0x47));
            }
            0x0400_0005 => self.lcd.dispstat.set_byte(1, value),
            // VCOUNT is read-only.
            0x0400_0006 | 0x0400_0007 => {}
            0x0400_0008..=0x0400_000F => {
                let bg = ((address - 0x0400_0008) / 2) as usize;
                // BG0/BG1 have no display-area-overflow bit.
                if address & 1 == 1 && bg < 2 {
                    value &= 0xDF;
                }
                self.lcd.bgcnt[bg].set_byte((address & 1) as u8, value);
            }
            0x0400_0010..=0x0400_001F => {
                let which = ((address - 0x0400_0010) / 4) as usize;
                // The scroll offsets are 9 bits wide.
                if address & 1 == 1 {
                    value &= 0x1;
                }
                if address & 2 == 0 {
                    self.lcd.bg_hofs[which].set_byte((address & 1) as u8, value);
                } else {
                    self.lcd.bg_vofs[which].set_byte((address & 1) as u8, value);
                }
            }
            0x0400_0020..=0x0400_0027 | 0x0400_0030..=0x0400_0037 => {
                let bg = ((address >> 4) & 1) as usize; // 0 for BG2, 1 for BG3
                let lane = (address & 1) as u8;
                match (address >> 1) & 3 {
                    0 => self.lcd.bg_pa[bg].set_byte(lane, value),
                    1 => self.lcd.bg_pb[bg].set_byte(lane, value),
                    2 => self.lcd.bg_pc[bg].set_byte(lane, value),
                    _ => self.lcd.bg_pd[bg].set_byte(lane, value),
                }
            }
            0x0400_0028..=0x0400_002F | 0x0400_0038..=0x0400_003F => {
                let bg = (((address >> 4) & 3) - 2) as usize; // 0 for BG2, 1 for BG3
                let lane = (address & 3) as u8;
                if address & 4 == 0 {
                    self.lcd.bg_x[bg].set_byte(lane, value);
                    self.lcd.internal_x[bg].set_byte(lane, value);
                } else {
                    self.lcd.bg_y[bg].set_byte(lane, value);
                    self.lcd.internal_y[bg].set_byte(lane, value);
                }
            }
            0x0400_0040 => self.lcd.win0h.set_byte(0, value),
            0x0400_0041 => self.lcd.win0h.set_byte(1, value),
            0x0400_0042 => self.lcd.win1h.set_byte(0, value),
            0x0400_0043 => self.lcd.win1h.set_byte(1, value),
            0x0400_0044 => self.lcd.win0v.set_byte(0, value),
            0x0400_0045 => self.lcd.win0v.set_byte(1, value),
            0x0400_0046 => self.lcd.win1v.set_byte(0, value),
            0x0400_0047 => self.lcd.win1v.set_byte(1, value),
            0x0400_0048 => self.lcd.winin.set_byte(0, value & 0x3F),
            0x0400_0049 => self.lcd.winin.set_byte(1, value & 0x3F),
            0x0400_004A => self.lcd.winout.set_byte(0, value & 0x3F),
            0x0400_004B => self.lcd.winout.set_byte(1, value & 0x3F),
            0x0400_004C => self.lcd.mosaic.set_byte(0, value),
            0x0400_004D => self.lcd.mosaic.set_byte(1, value),
            0x0400_0050 => self.lcd.bldcnt.set_byte(0, value),
            0x0400_0051 => self.lcd.bldcnt.set_byte(1, value & 0x3F),
            0x0400_0052 => self.lcd.bldalpha.set_byte(0, value & 0x1F),
            0x0400_0053 => self.lcd.bldalpha.set_byte(1, value & 0x1F),
            0x0400_0054 => self.lcd.bldy.set_byte(0, value),
            0x0400_0055 => self.lcd.bldy.set_byte(1, value),
            _ => {
                tracing::debug!("write on unused LCD register {address:#010X}");
            }
        }
    }

    fn read_sound_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0060 => self.sound.sound1cnt_l.get_byte(0),
            0x0400_0061 => self.sound.sound1cnt_l.get_byte(1),
            0x0400_0062 => self.sound.sound1cnt_h.get_byte(0) & 0xC0,
            0x0400_0063 => self.sound.sound1cnt_h.get_byte(1),
            0x0400_0065 => self.sound.sound1cnt_x.get_byte(1) & 0x40,
            0x0400_0068 => self.sound.sound2cnt_l.get_byte(0) & 0xC0,
            0x0400_0069 => self.sound.sound2cnt_l.get_byte(1),
            0x0400_006D => self.sound.sound2cnt_h.get_byte(1) & 0x40,
            0x0400_0070 => self.sound.sound3cnt_l.get_byte(0) & 0xE0,
            0x0400_0073 => self.sound.sound3cnt_h.get_byte(1) & 0xE0,
            0x0400_0075 => self.sound.sound3cnt_x.get_byte(1) & 0x40,
            0x0400_0079 => self.sound.sound4cnt_l.get_byte(1),
            0x0400_007C => self.sound.sound4cnt_h.get_byte(0),
            0x0400_007D => self.sound.sound4cnt_h.get_byte(1) & 0x40,
            0x0400_0080 => self.sound.soundcnt_l.get_byte(0),
            0x0400_0081 => self.sound.soundcnt_l.get_byte(1),
            0x0400_0082 => self.sound.soundcnt_h.get_byte(0),
            0x0400_0083 => self.sound.soundcnt_h.get_byte(1),
            0x0400_0084 => self.sound.soundcnt_x.get_byte(0) & 0x8F,
            0x0400_0088 => self.sound.soundbias.get_byte(0),
            0x0400_0089 => self.sound.soundbias.get_byte(1),
            0x0400_0090..=0x0400_009F => {
                self.sound.wave_ram[self.sound.visible_wave_bank()][(address & 0xF) as usize]
            }
            _ => self.read_undocumented(address),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn write_sound_raw(&mut self, address: u32, value: u8) {
        // Most PSG registers ignore writes while the master enable is off.
        let master = self.sound.master_enabled();

        match address {
            0x0400_0060 if master => self.sound.sound1cnt_l.set_byte(0, value),
            0x0400_0061 if master => self.sound.sound1cnt_l.set_byte(1, value),
            0x0400_0062 if master => self.sound.sound1cnt_h.set_byte(0, value),
            0x0400_0063 if master => self.sound.sound1cnt_h.set_byte(1, value),
            0x0400_0064 if master => self.sound.sound1cnt_x.set_byte(0, value),
            0x0400_0065 if master => {
                self.sound.sound1cnt_x.set_byte(1, value & !0x80);
            }
            0x0400_0068 if master => self.sound.sound2cnt_l.set_byte(0, value),
            0x0400_0069 if master => self.sound.sound2cnt_l.set_byte(1, value),
            0x0400_006C if master => self.sound.sound2cnt_h.set_byte(0, value),
            0x0400_006D if master => {
                self.sound.sound2cnt_h.set_byte(1, value & !0x80);
            }
            0x0400_0070 if master => self.sound.sound3cnt_l.set_byte(0, value),
            0x0400_0071 if master => self.sound.sound3cnt_l.set_byte(1, value),
            0x0400_0072 if master => self.sound.sound3cnt_h.set_byte(0, value),
            0x0400_0073 if master => self.sound.sound3cnt_h.set_byte(1, value),
            0x0400_0074 if master => self.sound.sound3cnt_x.set_byte(0, value),
            0x0400_0075 if master => {
                self.sound.sound3cnt_x.set_byte(1, value & !0x80);
            }
            0x0400_0078 if master => self.sound.sound4cnt_l.set_byte(0, value),
            0x0400_0079 if master => self.sound.sound4cnt_l.set_byte(1, value),
            0x0400_007C if master => self.sound.sound4cnt_h.set_byte(0, value),
            0x0400_007D if master => {
                self.sound.sound4cnt_h.set_byte(1, value & !0x80);
            }
            0x0400_0080 if master => self.sound.soundcnt_l.set_byte(0, value & 0x77),
            0x0400_0081 if master => self.sound.soundcnt_l.set_byte(1, value),
            // SOUNDCNT_H, SOUNDCNT_X master bit, SOUNDBIAS, wave RAM and the
            // FIFOs stay writable with the master off.
            0x0400_0082 => self.sound.soundcnt_h.set_byte(0, value & 0x0F),
            0x0400_0083 => {
                self.sound.soundcnt_h.set_byte(1, value);

                // FIFO reset bits read back as zero and act immediately.
                if self.sound.soundcnt_h.get_bit(11) {
                    self.sound.fifo[0].reset();
                    self.sound.soundcnt_h.set_bit_off(11);
                }
                if self.sound.soundcnt_h.get_bit(15) {
                    self.sound.fifo[1].reset();
                    self.sound.soundcnt_h.set_bit_off(15);
                }
            }
            0x0400_0084 => {
                let was_enabled = self.sound.soundcnt_x.get_bit(7);
                self.sound.soundcnt_x.set_byte(0, value & 0x80);

                if was_enabled && !self.sound.master_enabled() {
                    self.sound.fifo[0].reset();
                    self.sound.fifo[1].reset();
                    self.sound.sound3cnt_l = 0;
                    self.sound.sound3cnt_h = 0;
                    self.sound.sound3cnt_x = 0;
                }
            }
            0x0400_0088 => self.sound.soundbias.set_byte(0, value),
            0x0400_0089 => self.sound.soundbias.set_byte(1, value),
            0x0400_008A => self.sound.soundbias.set_byte(2, value),
            0x0400_008B => self.sound.soundbias.set_byte(3, value),
            0x0400_0090..=0x0400_009F => {
                let bank = self.sound.visible_wave_bank();
                self.sound.wave_ram[bank][(address & 0xF) as usize] = value;
            }
            0x0400_00A0..=0x0400_00A7 => {
                let fifo = ((address >> 2) & 1) as usize;
                let lane = (address & 3) as u8;
                self.sound.fifo[fifo].latch.set_byte(lane, value);
                if lane == 3 {
                    self.sound.fifo[fifo].copy_latch();
                }
            }
            _ => {
                tracing::debug!("write on unused sound register {address:#010X}");
            }
        }
    }

    fn read_dma_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_00B0..=0x0400_00DF => {
                let channel = ((address - 0x0400_00B0) / 12) as usize;
                let offset = (address - 0x0400_00B0) % 12;
                match offset {
                    10 => self.dma.channels[channel].control.get_byte(0),
                    11 => self.dma.channels[channel].control.get_byte(1),
                    _ => self.read_undocumented(address),
                }
            }
            _ => self.read_undocumented(address),
        }
    }

    fn write_dma_raw(&mut self, address: u32, value: u8) {
        match address {
            0x0400_00B0..=0x0400_00DF => {
                let channel = ((address - 0x0400_00B0) / 12) as usize;
                let offset = (address - 0x0400_00B0) % 12;
                match offset {
                    0..=3 => self.dma.channels[channel]
                        .source_address
                        .set_byte(offset as u8, value),
                    4..=7 => self.dma.channels[channel]
                        .destination_address
                        .set_byte((offset - 4) as u8, value),
                    8 | 9 => self.dma.channels[channel]
                        .word_count
                        .set_byte((offset - 8) as u8, value),
                    10 => self.dma.channels[channel].control.set_byte(0, value & 0xE0),
                    _ => self.dma_load(channel, value),
                }
            }
            _ => {
                tracing::debug!("write on unused DMA register {address:#010X}");
            }
        }
    }

    fn read_timers_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0100..=0x0400_010F => {
                let timer = ((address - 0x0400_0100) / 4) as usize;
                match address & 3 {
                    0 => (self.timers.timers[timer].counter as u16).get_byte(0),
                    1 => (self.timers.timers[timer].counter as u16).get_byte(1),
                    2 => self.timers.timers[timer].control.get_byte(0),
                    _ => self.read_undocumented(address),
                }
            }
            _ => self.read_undocumented(address),
        }
    }

    fn write_timers_raw(&mut self, address: u32, value: u8) {
        match address {
            0x0400_0100..=0x0400_010F => {
                let timer = ((address - 0x0400_0100) / 4) as usize;
                match address & 3 {
                    0 => self.timers.timers[timer].reload.set_byte(0, value),
                    1 => self.timers.timers[timer].reload.set_byte(1, value),
                    2 => self.timers.timers[timer].write_control(value),
                    _ => self.timers.timers[timer].control.set_byte(1, value),
                }
            }
            _ => {
                tracing::debug!("write on unused timer register {address:#010X}");
            }
        }
    }

    fn read_serial_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0120 => self.serial.sio_data32.get_byte(0),
            0x0400_0121 => self.serial.sio_data32.get_byte(1),
            0x0400_0122 => self.serial.sio_data32.get_byte(2),
            0x0400_0123 => self.serial.sio_data32.get_byte(3),
            0x0400_0124 => self.serial.sio_multi_2.get_byte(0),
            0x0400_0125 => self.serial.sio_multi_2.get_byte(1),
            0x0400_0126 => self.serial.sio_multi_3.get_byte(0),
            0x0400_0127 => self.serial.sio_multi_3.get_byte(1),
            0x0400_0128 => self.serial.sio_control.get_byte(0),
            0x0400_0129 => self.serial.sio_control.get_byte(1),
            0x0400_012A => self.serial.sio_send.get_byte(0),
            0x0400_012B => self.serial.sio_send.get_byte(1),
            0x0400_0134 => self.serial.mode_select.get_byte(0),
            0x0400_0135 => self.serial.mode_select.get_byte(1),
            0x0400_0140 => self.serial.joy_control.get_byte(0),
            0x0400_0141 => self.serial.joy_control.get_byte(1),
            0x0400_0150 => self.serial.joy_receive.get_byte(0),
            0x0400_0151 => self.serial.joy_receive.get_byte(1),
            0x0400_0152 => self.serial.joy_receive.get_byte(2),
            0x0400_0153 => self.serial.joy_receive.get_byte(3),
            0x0400_0154 => self.serial.joy_transmit.get_byte(0),
            0x0400_0155 => self.serial.joy_transmit.get_byte(1),
            0x0400_0156 => self.serial.joy_transmit.get_byte(2),
            0x0400_0157 => self.serial.joy_transmit.get_byte(3),
            0x0400_0158 => self.serial.joy_status.get_byte(0),
            0x0400_0159 => self.serial.joy_status.get_byte(1),
            _ => self.read_undocumented(address),
        }
    }

    fn write_serial_raw(&mut self, address: u32, value: u8) {
        match address {
            0x0400_0120 => self.serial.sio_data32.set_byte(0, value),
            0x0400_0121 => self.serial.sio_data32.set_byte(1, value),
            0x0400_0122 => self.serial.sio_data32.set_byte(2, value),
            0x0400_0123 => self.serial.sio_data32.set_byte(3, value),
            0x0400_0124 => self.serial.sio_multi_2.set_byte(0, value),
            0x0400_0125 => self.serial.sio_multi_2.set_byte(1, value),
            0x0400_0126 => self.serial.sio_multi_3.set_byte(0, value),
            0x0400_0127 => self.serial.sio_multi_3.set_byte(1, value),
            0x0400_0128 => self.serial.sio_control.set_byte(0, value),
            0x0400_0129 => self.serial.sio_control.set_byte(1, value),
            0x0400_012A => self.serial.sio_send.set_byte(0, value),
            0x0400_012B => self.serial.sio_send.set_byte(1, value),
            0x0400_0134 => self.serial.mode_select.set_byte(0, value),
            0x0400_0135 => self.serial.mode_select.set_byte(1, value),
            0x0400_0140 => self.serial.joy_control.set_byte(0, value),
            0x0400_0141 => self.serial.joy_control.set_byte(1, value),
            0x0400_0150 => self.serial.joy_receive.set_byte(0, value),
            0x0400_0151 => self.serial.joy_receive.set_byte(1, value),
            0x0400_0152 => self.serial.joy_receive.set_byte(2, value),
            0x0400_0153 => self.serial.joy_receive.set_byte(3, value),
            0x0400_0154 => self.serial.joy_transmit.set_byte(0, value),
            0x0400_0155 => self.serial.joy_transmit.set_byte(1, value),
            0x0400_0156 => self.serial.joy_transmit.set_byte(2, value),
            0x0400_0157 => self.serial.joy_transmit.set_byte(3, value),
            0x0400_0158 => self.serial.joy_status.set_byte(0, value),
            0x0400_0159 => self.serial.joy_status.set_byte(1, value),
            _ => {
                tracing::debug!("write on unused serial register {address:#010X}");
            }
        }
    }

    fn read_keypad_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0130 => self.keypad.key_input.get_byte(0),
            0x0400_0131 => self.keypad.key_input.get_byte(1),
            0x0400_0132 => self.keypad.key_interrupt_control.get_byte(0),
            0x0400_0133 => self.keypad.key_interrupt_control.get_byte(1),
            _ => unreachable!(),
        }
    }

    fn write_keypad_raw(&mut self, address: u32, value: u8) {
        match address {
            // KEYINPUT is read-only from the bus; the host pokes it directly.
            0x0400_0130 | 0x0400_0131 => {}
            0x0400_0132 => self.keypad.key_interrupt_control.set_byte(0, value),
            0x0400_0133 => self.keypad.key_interrupt_control.set_byte(1, value),
            _ => unreachable!(),
        }
    }

    fn read_interrupt_control_raw(&self, address: u32) -> u8 {
        match address {
            0x0400_0200 => self.interrupt_control.interrupt_enable.get_byte(0),
            0x0400_0201 => self.interrupt_control.interrupt_enable.get_byte(1),
            0x0400_0202 => self.interrupt_control.interrupt_flags.get_byte(0),
            0x0400_0203 => self.interrupt_control.interrupt_flags.get_byte(1),
            0x0400_0204 => self.interrupt_control.wait_state_control.get_byte(0),
            0x0400_0205 => self.interrupt_control.wait_state_control.get_byte(1),
            0x0400_0208 => self.interrupt_control.interrupt_master_enable.get_byte(0),
            0x0400_0209 => self.interrupt_control.interrupt_master_enable.get_byte(1),
            0x0400_0300 => self.interrupt_control.post_boot_flag,
            _ => self.read_undocumented(address),
        }
    }

    fn write_interrupt_control_raw(&mut self, address: u32, value: u8) {
        match address {
            0x0400_0200 => self.interrupt_control.interrupt_enable.set_byte(0, value),
            0x0400_0201 => self.interrupt_control.interrupt_enable.set_byte(1, value),
            // IF writes acknowledge the written bits.
            0x0400_0202 => self.interrupt_control.interrupt_flags &= !(value as u16),
            0x0400_0203 => self.interrupt_control.interrupt_flags &= !((value as u16) << 8),
            0x0400_0204 => {
                self.interrupt_control.wait_state_control.set_byte(0, value);
                self.wait_states.update(self.interrupt_control.wait_state_control);
            }
            0x0400_0205 => {
                self.interrupt_control.wait_state_control.set_byte(1, value);
                self.wait_states.update(self.interrupt_control.wait_state_control);
            }
            0x0400_0208 => self
                .interrupt_control
                .interrupt_master_enable
                .set_byte(0, value),
            0x0400_0209 => self
                .interrupt_control
                .interrupt_master_enable
                .set_byte(1, value),
            0x0400_0300 => self.interrupt_control.post_boot_flag = value,
            0x0400_0301 => {
                self.interrupt_control.power_state = if value.get_bit(7) {
                    PowerState::Stop
                } else {
                    PowerState::Halt
                };
            }
            _ => {
                tracing::debug!("write on unused interrupt register {address:#010X}");
            }
        }
    }

    // ------------------------------------------------------------------
    // DMA engine
    // ------------------------------------------------------------------

    /// Write the high control byte of a channel; a 0→1 enable edge latches
    /// the transfer registers and fires any immediate transfer.
    pub fn dma_load(&mut self, channel: usize, value: u8) {
        let old = self.dma.channels[channel].control.get_byte(1);
        self.dma.channels[channel].control.set_byte(1, value);

        if (old ^ value) & value & 0x80 != 0 {
            self.dma.channels[channel].latch();
            self.dma_transfer(Timing::Immediately);
        }
    }

    /// Run every enabled channel whose start timing matches.
    pub fn dma_transfer(&mut self, timing: Timing) {
        for channel in 0..4 {
            if !self.dma.channels[channel].enabled()
                || self.dma.channels[channel].timing() != timing
            {
                continue;
            }

            self.run_dma_channel(channel);
        }
    }

    fn run_dma_channel(&mut self, channel: usize) {
        // Every DMA3 transfer starts a fresh EEPROM request stream.
        if channel == 3 {
            if let Backup::Eeprom(eeprom) = &mut self.backup {
                eeprom.reset_transfer();
            }
        }

        let word = self.dma.channels[channel].word_transfer();
        let (destination_step, destination_reload) = self.dma.channels[channel].destination_step();
        let source_step = self.dma.channels[channel].source_step();

        let mut source = self.dma.channels[channel].internal_source;
        let mut destination = self.dma.channels[channel].internal_destination;
        let mut remaining = self.dma.channels[channel].remaining;

        let mut stall = 0;
        let mut sequential = false;

        while remaining > 0 {
            remaining -= 1;

            if word {
                let value = self.read_word(source);
                self.write_word(destination, value);
                stall += self.access_cycles_32(source, sequential)
                    + self.access_cycles_32(destination, sequential);
            } else {
                let value = self.read_half_word(source);
                self.write_half_word(destination, value);
                stall += self.access_cycles_16(source, sequential)
                    + self.access_cycles_16(destination, sequential);
            }
            sequential = true;

            source = source.wrapping_add(source_step as u32);
            destination = destination.wrapping_add(destination_step as u32);
        }

        self.dma_stall += stall;

        let control = self.dma.channels[channel].control;

        self.dma.channels[channel].internal_source = source;
        self.dma.channels[channel].internal_destination = destination;
        self.dma.channels[channel].remaining = remaining;

        if control & DMA_IRQ != 0 {
            self.raise_irq(Interrupt::dma(channel));
        }

        if control & DMA_REPEAT != 0 {
            let channel = &mut self.dma.channels[channel];
            channel.remaining = channel.word_count as u32;
            if destination_reload {
                channel.internal_destination = channel.destination_address;
            }
        } else {
            self.dma.channels[channel].control &= !DMA_ENABLE;
        }
    }

    /// Sound FIFO refill: four words from the latched source into the FIFO
    /// register, leaving count and destination untouched.
    pub fn dma_transfer_fifo(&mut self, channel: usize) {
        if !self.dma.channels[channel].enabled()
            || self.dma.channels[channel].timing() != Timing::Special
        {
            return;
        }

        let source_step = self.dma.channels[channel].source_step();
        let mut source = self.dma.channels[channel].internal_source;
        let destination = self.dma.channels[channel].internal_destination;

        let mut stall = 0;
        for i in 0..4 {
            let value = self.read_word(source);
            self.write_word(destination, value);
            stall += self.access_cycles_32(source, i != 0) + self.access_cycles_32(destination, i != 0);

            // Only +unit and -unit apply to FIFO sources.
            match source_step {
                4 => source = source.wrapping_add(4),
                -4 => source = source.wrapping_sub(4),
                _ => {}
            }
        }

        self.dma.channels[channel].internal_source = source;
        self.dma_stall += stall;

        if self.dma.channels[channel].control & DMA_IRQ != 0 {
            self.raise_irq(Interrupt::dma(channel));
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Advance the timer fabric by a batch of CPU cycles.
    pub fn advance_timers(&mut self, cycles: u32) {
        if !self.timers.any_enabled() {
            return;
        }

        let mut overflowed = false;

        for index in 0..4 {
            if !self.timers.timers[index].enabled() {
                overflowed = false;
                continue;
            }

            if self.timers.timers[index].cascade() {
                if overflowed {
                    self.timers.timers[index].counter += 1;
                }
            } else {
                self.timers.timers[index].accumulate(cycles);
            }

            overflowed = self.timers.timers[index].counter > 0xFFFF;

            if overflowed {
                self.timers.timers[index].reload_after_overflow();

                for fifo in 0..2 {
                    if self.sound.fifo_timer(fifo) == index {
                        self.sound.fifo_load(fifo);
                        if self.sound.fifo[fifo].needs_refill() {
                            self.dma_transfer_fifo(fifo + 1);
                        }
                    }
                }

                if self.timers.timers[index].irq_enabled() {
                    self.raise_irq(Interrupt::timer(index));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::dma::DMA_32BIT;
    use pretty_assertions::assert_eq;

    #[test]
    fn ram_halfword_roundtrip() {
        let mut bus = Bus::default();

        bus.write_half_word(0x0300_0010, 0xBEEF);
        assert_eq!(bus.read_half_word(0x0300_0010), 0xBEEF);

        bus.write_word(0x0200_0020, 0xDEAD_BEEF);
        assert_eq!(bus.read_word(0x0200_0020), 0xDEAD_BEEF);
        assert_eq!(bus.read_byte(0x0200_0023), 0xDE);
    }

    #[test]
    fn misaligned_loads_rotate() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0xDEAD_BEEF);

        assert_eq!(bus.read_word_rotated(0x0300_0000), 0xDEAD_BEEF);
        assert_eq!(bus.read_word_rotated(0x0300_0001), 0xEFDE_ADBE);
        assert_eq!(bus.read_word_rotated(0x0300_0002), 0xBEEF_DEAD);

        assert_eq!(bus.read_half_word_rotated(0x0300_0000), 0xBEEF);
        assert_eq!(bus.read_half_word_rotated(0x0300_0001), 0xEF00_00BE);
    }

    #[test]
    fn ewram_mirrors_every_256k() {
        let mut bus = Bus::default();
        bus.write_byte(0x0201_0003, 5);

        assert_eq!(bus.read_byte(0x0205_0003), 5);
        assert_eq!(bus.read_byte(0x02F5_0003), 5);
    }

    #[test]
    fn bios_reads_are_gated_by_pc() {
        let mut bus = Bus::default();
        bus.internal_memory.bios[0..4].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        bus.program_counter = 0x0000_0100;
        assert_eq!(bus.read_word(0), 0x4433_2211);

        // From outside the BIOS, reads see the last fetched BIOS word.
        bus.program_counter = 0x0800_0000;
        assert_eq!(bus.read_word(0), 0x4433_2211);
        assert_eq!(bus.read_half_word(0), 0x2211);
        assert_eq!(bus.read_byte(2), 0x11);
    }

    #[test]
    fn palette_byte_write_duplicates_and_derives() {
        let mut bus = Bus::default();

        bus.write_half_word(0x0500_0002, 0x7FFF);
        assert_eq!(bus.read_half_word(0x0500_0002), 0x7FFF);
        assert_eq!(bus.lcd.palette[1], 0xFFFF_FFFF);

        // A byte write lands on both lanes of the halfword.
        bus.write_byte(0x0500_0005, 0x03);
        assert_eq!(bus.read_half_word(0x0500_0004), 0x0303);
        assert_eq!(
            bus.lcd.palette[2],
            crate::cpu::hardware::lcd::native_color(0x0303)
        );
    }

    #[test]
    fn vram_byte_write_duplicates() {
        let mut bus = Bus::default();

        bus.write_byte(0x0600_0001, 0xAB);
        assert_eq!(bus.lcd.video_ram[0], 0xAB);
        assert_eq!(bus.lcd.video_ram[1], 0xAB);

        // Upper-window mirror.
        bus.write_half_word(0x0601_8000, 0x1234);
        assert_eq!(bus.read_half_word(0x0601_0000), 0x1234);
    }

    #[test]
    fn oam_ignores_byte_writes() {
        let mut bus = Bus::default();

        bus.write_byte(0x0700_0000, 0xFF);
        assert_eq!(bus.read_byte(0x0700_0000), 0);

        bus.write_half_word(0x0700_0000, 0x1234);
        assert_eq!(bus.read_half_word(0x0700_0000), 0x1234);
    }

    #[test]
    fn rom_region_is_read_only() {
        let mut bus = Bus::default();
        bus.cartridge = Cartridge::new(vec![0xAA, 0xBB, 0xCC, 0xDD]);

        assert_eq!(bus.read_byte(0x0800_0001), 0xBB);
        bus.write_byte(0x0800_0001, 0x00);
        assert_eq!(bus.read_byte(0x0800_0001), 0xBB);

        // Mirrors at 0x0A and 0x0C.
        assert_eq!(bus.read_byte(0x0A00_0001), 0xBB);
        assert_eq!(bus.read_byte(0x0C00_0001), 0xBB);
    }

    #[test]
    fn io_halfword_assembles_from_lanes() {
        let mut bus = Bus::default();

        bus.write_half_word(0x0400_0048, 0x1234);
        assert_eq!(bus.read_half_word(0x0400_0048), 0x1234 & 0x3F3F);

        bus.write_byte(0x0400_0049, 0x05);
        assert_eq!(bus.read_half_word(0x0400_0048), (0x05 << 8) | 0x34);
    }

    #[test]
    fn dispstat_read_only_bits_are_preserved() {
        let mut bus = Bus::default();
        bus.lcd.dispstat = 0x0007;

        bus.write_half_word(0x0400_0004, 0xFF38);
        assert_eq!(bus.lcd.dispstat & 0x0007, 0x0007);
        assert!(bus.lcd.vblank_irq_enabled());
        assert!(bus.lcd.hblank_irq_enabled());
        assert!(bus.lcd.vcount_irq_enabled());
        assert_eq!(bus.lcd.vcount_setting(), 0xFF);
    }

    #[test]
    fn vcount_is_read_only() {
        let mut bus = Bus::default();
        bus.lcd.vcount = 100;

        bus.write_half_word(0x0400_0006, 0x1234);
        assert_eq!(bus.read_half_word(0x0400_0006), 100);
    }

    #[test]
    fn interrupt_flags_acknowledge_on_write() {
        let mut bus = Bus::default();
        bus.raise_irq(Interrupt::VBlank);
        bus.raise_irq(Interrupt::Timer0);
        assert_eq!(bus.read_half_word(0x0400_0202), 0b1001);

        bus.write_half_word(0x0400_0202, 0b0001);
        assert_eq!(bus.read_half_word(0x0400_0202), 0b1000);
    }

    #[test]
    fn waitcnt_refreshes_access_tables() {
        let mut bus = Bus::default();

        // Defaults: 4-cycle first access, 2-cycle second access in WS0.
        assert_eq!(bus.access_cycles_16(0x0800_0000, false), 5);
        assert_eq!(bus.access_cycles_16(0x0800_0000, true), 3);
        assert_eq!(bus.access_cycles_32(0x0800_0000, false), 8);
        assert_eq!(bus.access_cycles_32(0x0800_0000, true), 6);

        // WS0 3,1: first bits 2..3 = 1, second bit 4 = 1.
        bus.write_half_word(0x0400_0204, (1 << 2) | (1 << 4));
        assert_eq!(bus.access_cycles_16(0x0800_0000, false), 4);
        assert_eq!(bus.access_cycles_16(0x0800_0000, true), 2);
        assert_eq!(bus.access_cycles_32(0x0800_0000, true), 4);

        // SRAM: 8 waits.
        bus.write_half_word(0x0400_0204, 3);
        assert_eq!(bus.access_cycles_16(0x0E00_0000, false), 9);
    }

    #[test]
    fn immediate_dma_copies_and_disables() {
        let mut bus = Bus::default();

        for i in 0..0x40u32 {
            bus.write_word(0x0200_0000 + i * 4, 0x1111_0000 + i);
        }

        bus.write_word(0x0400_00B0, 0x0200_0000); // DMA0SAD
        bus.write_word(0x0400_00B4, 0x0700_0000); // DMA0DAD
        bus.write_half_word(0x0400_00B8, 0x40); // count
        bus.write_half_word(0x0400_00BA, DMA_ENABLE | DMA_32BIT); // control

        for i in 0..0x40u32 {
            assert_eq!(bus.read_word(0x0700_0000 + i * 4), 0x1111_0000 + i, "word {i}");
        }

        // Enable bit cleared after a non-repeating transfer.
        assert_eq!(bus.dma.channels[0].control & DMA_ENABLE, 0);
    }

    #[test]
    fn repeating_dma_stays_armed() {
        let mut bus = Bus::default();

        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0300_0000);
        bus.write_half_word(0x0400_00B8, 4);

        // H-blank timing, repeat, 16-bit.
        let control = DMA_ENABLE | DMA_REPEAT | (2 << 12);
        bus.write_half_word(0x0400_00BA, control);

        bus.write_half_word(0x0200_0000, 0xABCD);
        bus.dma_transfer(Timing::HBlank);

        assert_eq!(bus.read_half_word(0x0300_0000), 0xABCD);
        assert_ne!(bus.dma.channels[0].control & DMA_ENABLE, 0);
        assert_eq!(bus.dma.channels[0].remaining, 4);
    }

    #[test]
    fn dma_irq_raises_flag() {
        let mut bus = Bus::default();

        bus.write_word(0x0400_00D4, 0x0200_0000); // DMA3SAD
        bus.write_word(0x0400_00D8, 0x0300_0000);
        bus.write_half_word(0x0400_00DC, 1);
        bus.write_half_word(0x0400_00DE, DMA_ENABLE | DMA_IRQ);

        assert_ne!(
            bus.interrupt_control.interrupt_flags & Interrupt::Dma3.flag(),
            0
        );
    }

    #[test]
    fn timer_overflow_raises_irq_and_cascades() {
        let mut bus = Bus::default();

        // Timer 0: reload 0xFFFF, IRQ enabled, no prescale.
        bus.write_half_word(0x0400_0100, 0xFFFF);
        bus.write_half_word(0x0400_0102, 0x80 | 0x40);

        // Timer 1: cascade, counts timer-0 overflows.
        bus.write_half_word(0x0400_0104, 0);
        bus.write_half_word(0x0400_0106, 0x80 | 0x04);

        bus.advance_timers(1);

        assert_ne!(
            bus.interrupt_control.interrupt_flags & Interrupt::Timer0.flag(),
            0
        );
        assert_eq!(bus.timers.timers[1].counter, 1);
        assert_eq!(bus.timers.timers[0].counter as u16, 0xFFFF);
    }

    #[test]
    fn keypad_defaults_released() {
        let mut bus = Bus::default();
        assert_eq!(bus.read_half_word(0x0400_0130), 0x03FF);

        // Bus writes cannot fake input.
        bus.write_half_word(0x0400_0130, 0);
        assert_eq!(bus.read_half_word(0x0400_0130), 0x03FF);
    }

    #[test]
    fn haltcnt_sets_power_state() {
        let mut bus = Bus::default();

        bus.write_byte(0x0400_0301, 0x00);
        assert_eq!(bus.interrupt_control.power_state, PowerState::Halt);

        bus.write_byte(0x0400_0301, 0x80);
        assert_eq!(bus.interrupt_control.power_state, PowerState::Stop);

        bus.raise_irq(Interrupt::VBlank);
        assert_eq!(bus.interrupt_control.power_state, PowerState::Run);
    }
}
