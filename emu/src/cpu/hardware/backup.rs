//! Cartridge backup storage: SRAM, Flash or EEPROM, selected at runtime.
//!
//! Every cartridge starts out as plain SRAM. The first recognized Flash
//! command sequence promotes the region to [`FlashState`]; the first EEPROM
//! bit-stream write (a DMA into the 0x0D overlay) promotes it to
//! [`EepromState`]. Until then the 0x0E region behaves as a flat 64 KiB RAM.

use serde::{Deserialize, Serialize};

const SRAM_SIZE: usize = 0x1_0000;
const FLASH_SIZE: usize = 0x2_0000;
const EEPROM_SIZE: usize = 0x2000;

/// Flash manufacturer/device id pair returned in id mode (Sanyo 128 KiB).
const FLASH_ID: [u8; 2] = [0x62, 0x13];

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashMode {
    #[default]
    Idle,
    Erase,
    Write,
    BankSwitch,
}

#[derive(Serialize, Deserialize)]
pub struct FlashState {
    pub mode: FlashMode,
    pub id_mode: bool,

    /// 0 or 0x10000: offset of the selected 64 KiB bank.
    pub bank: usize,

    /// Two 64 KiB banks of Flash proper.
    pub data: Vec<u8>,

    /// Raw write-through bytes. The 0xAA/0x55 guard sequence is observed
    /// here, exactly as on the real part where commands travel over the same
    /// data lines as SRAM writes.
    pub shadow: Vec<u8>,
}

impl FlashState {
    fn command_guard(&self) -> bool {
        self.shadow[0x5555] == 0xAA && self.shadow[0x2AAA] == 0x55
    }

    pub fn read(&self, address: u32) -> u8 {
        let offset = (address & 0xFFFF) as usize;

        if self.id_mode && offset < 2 {
            return FLASH_ID[offset];
        }

        self.data[self.bank | offset]
    }

    pub fn write(&mut self, address: u32, value: u8) {
        let offset = (address & 0xFFFF) as usize;

        match self.mode {
            FlashMode::Write => {
                self.data[self.bank | offset] = value;
                self.mode = FlashMode::Idle;
            }
            FlashMode::BankSwitch if offset == 0 => {
                self.bank = ((value & 1) as usize) << 16;
                self.mode = FlashMode::Idle;
            }
            _ => {
                if self.command_guard() {
                    if offset == 0x5555 {
                        match value {
                            0x10 if self.mode == FlashMode::Erase => {
                                self.data.fill(0xFF);
                                self.mode = FlashMode::Idle;
                            }
                            0x80 => self.mode = FlashMode::Erase,
                            0x90 => self.id_mode = true,
                            0xA0 => self.mode = FlashMode::Write,
                            0xB0 => self.mode = FlashMode::BankSwitch,
                            0xF0 => self.id_mode = false,
                            _ => {
                                tracing::debug!("unknown flash command {value:#04X}");
                            }
                        }
                    } else if self.mode == FlashMode::Erase && value == 0x30 {
                        // 4 KiB sector erase in the current bank.
                        let start = self.bank | (offset & 0xF000);
                        self.data[start..start + 0x1000].fill(0xFF);
                        self.mode = FlashMode::Idle;
                    }
                }

                self.shadow[offset] = value;
            }
        }
    }
}

/// EEPROM request phases: 2 mode bits, a 6- or 14-bit address, and for
/// writes a 64-bit payload, all clocked one bit per 16-bit DMA unit.
const EEPROM_MODE_WRITE: u8 = 2;
const EEPROM_MODE_READ: u8 = 3;

#[derive(Serialize, Deserialize)]
pub struct EepromState {
    pub data: Vec<u8>,

    /// Captured 6/14-bit address, pre-shifted to a byte offset.
    pub address: usize,

    /// Byte offset the next read stream delivers from.
    pub read_address: usize,

    /// Bit-packed staging buffer for the request in flight.
    buffer: Vec<u8>,

    /// Position in the current bit stream (shared by reads and writes; reset
    /// when DMA3 arms).
    bit_index: u32,
}

impl Default for EepromState {
    fn default() -> Self {
        Self {
            data: vec![0; EEPROM_SIZE],
            address: 0,
            read_address: 0,
            buffer: vec![0; 0x100],
            bit_index: 0,
        }
    }
}

impl EepromState {
    /// Called when DMA channel 3 arms: every request is one DMA transfer.
    pub fn reset_transfer(&mut self) {
        self.bit_index = 0;
    }

    /// Clock one bit of a request in. `request_len` is the DMA word count;
    /// reaching it completes the request.
    pub fn write_bit(&mut self, value: u8, request_len: u32) {
        if self.bit_index == 0 {
            self.buffer.fill(0);
        }

        let idx = ((self.bit_index >> 3) & 0xFF) as usize;
        let bit = self.bit_index & 0x7;
        self.buffer[idx] |= (value & 1) << (bit ^ 7);

        self.bit_index += 1;
        if self.bit_index == request_len {
            self.complete_request();
        }
    }

    fn complete_request(&mut self) {
        let mode = self.buffer[0] >> 6;
        if mode & 3 == 0 {
            return;
        }

        // A 512-byte part uses 6 address bits: 9-bit read requests and
        // 73-bit write requests. The 8 KiB part uses 14 bits.
        let payload_bits = if mode == EEPROM_MODE_WRITE { 64 } else { 0 };
        let small = self.bit_index == 2 + 6 + payload_bits + 1;

        let address = if small {
            (self.buffer[0] & 0x3F) as usize
        } else {
            (((self.buffer[0] & 0x3F) as usize) << 8) | self.buffer[1] as usize
        };
        self.address = address << 3;

        if mode == EEPROM_MODE_WRITE {
            let payload = if small { 1 } else { 2 };
            for i in 0..8 {
                self.data[(self.address + i) % EEPROM_SIZE] = self.buffer[payload + i];
            }
        } else {
            self.read_address = self.address;
        }

        self.bit_index = 0;
    }

    /// Clock one bit of a reply out. Reads deliver 4 junk bits, then the 64
    /// data bits MSB-first; a completed write reports ready (1).
    pub fn read_bit(&mut self) -> u8 {
        match self.buffer[0] >> 6 {
            EEPROM_MODE_WRITE => 1,
            EEPROM_MODE_READ => {
                let mut value = 0;

                if self.bit_index >= 4 {
                    let idx = (((self.bit_index - 4) >> 3) & 7) as usize;
                    let bit = (self.bit_index - 4) & 7;
                    value = (self.data[(self.read_address + idx) % EEPROM_SIZE] >> (bit ^ 7)) & 1;
                }

                self.bit_index += 1;
                value
            }
            _ => 0,
        }
    }
}

/// The backup device behind 0x0E000000 (and the 0x0D EEPROM overlay).
#[derive(Serialize, Deserialize)]
pub enum Backup {
    Sram { data: Vec<u8> },
    Flash(FlashState),
    Eeprom(EepromState),
}

impl Default for Backup {
    fn default() -> Self {
        Self::Sram {
            data: vec![0; SRAM_SIZE],
        }
    }
}

impl Backup {
    pub fn read(&self, address: u32) -> u8 {
        match self {
            Self::Sram { data } => data[(address & 0xFFFF) as usize],
            Self::Flash(flash) => flash.read(address),
            Self::Eeprom(_) => 0,
        }
    }

    pub fn write(&mut self, address: u32, value: u8) {
        match self {
            Self::Sram { data } => {
                let offset = (address & 0xFFFF) as usize;
                let guard = data[0x5555] == 0xAA && data[0x2AAA] == 0x55;

                if guard && offset == 0x5555 && matches!(value, 0x80 | 0x90 | 0xA0 | 0xB0) {
                    // First real Flash command: promote the region.
                    tracing::debug!("flash command {value:#04X}, promoting backup to flash");

                    let mut flash = FlashState {
                        mode: match value {
                            0x80 => FlashMode::Erase,
                            0xA0 => FlashMode::Write,
                            0xB0 => FlashMode::BankSwitch,
                            _ => FlashMode::Idle,
                        },
                        id_mode: value == 0x90,
                        bank: 0,
                        data: vec![0; FLASH_SIZE],
                        shadow: std::mem::take(data),
                    };
                    flash.shadow[offset] = value;
                    *self = Self::Flash(flash);
                } else {
                    data[offset] = value;
                }
            }
            Self::Flash(flash) => flash.write(address, value),
            Self::Eeprom(_) => {}
        }
    }

    /// Route an EEPROM-overlay write, promoting plain SRAM on first use.
    pub fn eeprom_write_bit(&mut self, value: u8, request_len: u32) {
        if matches!(self, Self::Sram { .. }) {
            tracing::debug!("EEPROM stream write, promoting backup to EEPROM");
            *self = Self::Eeprom(EepromState::default());
        }

        if let Self::Eeprom(eeprom) = self {
            eeprom.write_bit(value, request_len);
        }
    }

    #[must_use]
    pub fn is_eeprom(&self) -> bool {
        matches!(self, Self::Eeprom(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(backup: &mut Backup, value: u8) {
        backup.write(0x0E00_5555, 0xAA);
        backup.write(0x0E00_2AAA, 0x55);
        backup.write(0x0E00_5555, value);
    }

    #[test]
    fn starts_as_flat_sram() {
        let mut backup = Backup::default();
        backup.write(0x0E00_0123, 0x42);
        assert_eq!(backup.read(0x0E00_0123), 0x42);
        assert!(matches!(backup, Backup::Sram { .. }));
    }

    #[test]
    fn id_mode_reports_device() {
        let mut backup = Backup::default();
        command(&mut backup, 0x90);

        assert!(matches!(backup, Backup::Flash(_)));
        assert_eq!(backup.read(0x0E00_0000), 0x62);
        assert_eq!(backup.read(0x0E00_0001), 0x13);
    }

    #[test]
    fn flash_write_command() {
        let mut backup = Backup::default();
        command(&mut backup, 0xA0);
        backup.write(0x0E00_1234, 0x77);

        assert!(matches!(backup, Backup::Flash(_)));
        assert_eq!(backup.read(0x0E00_1234), 0x77);
    }

    #[test]
    fn flash_id_and_exit() {
        let mut backup = Backup::default();
        command(&mut backup, 0xA0);
        backup.write(0x0E00_0000, 0x00);

        command(&mut backup, 0x90);
        assert_eq!(backup.read(0x0E00_0000), 0x62);
        assert_eq!(backup.read(0x0E00_0001), 0x13);

        command(&mut backup, 0xF0);
        assert_eq!(backup.read(0x0E00_0000), 0x00);
    }

    #[test]
    fn flash_chip_erase() {
        let mut backup = Backup::default();
        command(&mut backup, 0xA0);
        backup.write(0x0E00_0040, 0x11);
        assert_eq!(backup.read(0x0E00_0040), 0x11);

        command(&mut backup, 0x80);
        command(&mut backup, 0x10);
        assert_eq!(backup.read(0x0E00_0040), 0xFF);
    }

    #[test]
    fn flash_sector_erase() {
        let mut backup = Backup::default();
        command(&mut backup, 0xA0);
        backup.write(0x0E00_1000, 0x11);
        command(&mut backup, 0xA0);
        backup.write(0x0E00_2000, 0x22);

        command(&mut backup, 0x80);
        backup.write(0x0E00_5555, 0xAA);
        backup.write(0x0E00_2AAA, 0x55);
        backup.write(0x0E00_1000, 0x30);

        assert_eq!(backup.read(0x0E00_1000), 0xFF);
        assert_eq!(backup.read(0x0E00_2000), 0x22);
    }

    #[test]
    fn flash_bank_switch() {
        let mut backup = Backup::default();
        command(&mut backup, 0xA0);
        backup.write(0x0E00_0100, 0xB0);

        command(&mut backup, 0xB0);
        backup.write(0x0E00_0000, 0x01);

        command(&mut backup, 0xA0);
        backup.write(0x0E00_0100, 0xB1);

        assert_eq!(backup.read(0x0E00_0100), 0xB1);

        command(&mut backup, 0xB0);
        backup.write(0x0E00_0000, 0x00);
        assert_eq!(backup.read(0x0E00_0100), 0xB0);
    }

    #[test]
    fn eeprom_write_then_read() {
        let mut eeprom = EepromState::default();

        // 73-bit write request to address 3 of a 512-byte part:
        // mode 0b10, address 0b000011, payload 0x8000000000000001, stop bit.
        let mut bits = vec![1, 0, 0, 0, 0, 0, 1, 1];
        let mut payload = vec![0u8; 64];
        payload[0] = 1;
        payload[63] = 1;
        bits.extend_from_slice(&payload);
        bits.push(0);

        let len = bits.len() as u32;
        for bit in bits {
            eeprom.write_bit(bit, len);
        }

        assert_eq!(eeprom.address, 3 << 3);
        assert_eq!(eeprom.data[3 << 3], 0x80);
        assert_eq!(eeprom.data[(3 << 3) + 7], 0x01);

        // 9-bit read request for the same address.
        eeprom.reset_transfer();
        for bit in [1, 1, 0, 0, 0, 0, 1, 1, 0] {
            eeprom.write_bit(bit, 9);
        }

        eeprom.reset_transfer();
        let mut stream = Vec::new();
        for _ in 0..68 {
            stream.push(eeprom.read_bit());
        }

        assert_eq!(&stream[..4], &[0, 0, 0, 0]);
        assert_eq!(stream[4], 1); // msb of 0x80
        assert_eq!(&stream[5..12], &[0; 7]);
        assert_eq!(stream[67], 1); // lsb of the last byte
    }
}
