use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Maximum Game Pak ROM size: 32 MiB.
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// A loaded cartridge image.
///
/// No header validation is performed; the title and game code are pulled out
/// for reporting only and may be empty for homebrew images.
#[derive(Default, Serialize, Deserialize)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub title: String,
    pub game_code: String,
}

fn header_string(rom: &[u8], range: std::ops::Range<usize>) -> String {
    rom.get(range)
        .map(|bytes| {
            bytes
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect()
        })
        .unwrap_or_default()
}

impl Cartridge {
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        let title = header_string(&rom, 0xA0..0xAC);
        let game_code = header_string(&rom, 0xAC..0xB0);

        Self {
            rom,
            title,
            game_code,
        }
    }

    /// Byte size of the loaded image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rom.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }

    /// Read one ROM byte.
    ///
    /// Past the end of the image the Game Pak AD bus keeps the low half of
    /// the halfword address it just transferred, so that is what a read
    /// returns.
    #[must_use]
    pub fn read(&self, offset: usize) -> u8 {
        if offset < self.rom.len() {
            self.rom[offset]
        } else {
            let halfword = ((offset >> 1) & 0xFFFF) as u16;
            halfword.get_byte((offset & 1) as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let mut rom = vec![0; 0xC0];
        rom[0xA0..0xA9].copy_from_slice(b"TESTTITLE");
        rom[0xAC..0xB0].copy_from_slice(b"ABCD");

        let cartridge = Cartridge::new(rom);
        assert_eq!(cartridge.title, "TESTTITLE");
        assert_eq!(cartridge.game_code, "ABCD");
    }

    #[test]
    fn tiny_rom_has_no_header() {
        let cartridge = Cartridge::new(vec![1, 2, 3]);
        assert_eq!(cartridge.title, "");
        assert_eq!(cartridge.read(0), 1);
    }

    #[test]
    fn open_bus_past_end() {
        let cartridge = Cartridge::new(vec![1, 2, 3, 4]);

        // Offset 0x1FFFFFE -> halfword address 0xFFFFFF, low 16 bits 0xFFFF.
        assert_eq!(cartridge.read(0x01FF_FFFE), 0xFF);
        assert_eq!(cartridge.read(0x01FF_FFFF), 0xFF);

        // Offset 0x1FFFFEE -> halfword 0xFFFFF7, bytes F7, FF.
        assert_eq!(cartridge.read(0x01FF_FFEE), 0xF7);
        assert_eq!(cartridge.read(0x01FF_FFEF), 0xFF);
    }
}
