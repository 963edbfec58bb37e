//! # Satsuma Emulation Core
//!
//! All GBA hardware emulation lives in this crate - no host or UI code.
//!
//! | Module        | Description                                      |
//! |---------------|--------------------------------------------------|
//! | [`gba`]       | Top-level system and scanline scheduler          |
//! | [`cpu`]       | ARM7TDMI processor and the two instruction sets  |
//! | [`bus`]       | Memory fabric, I/O registers, DMA and timers     |
//! | [`cartridge`] | ROM image handling                               |
//!
//! ## Quick start
//!
//! ```ignore
//! use emu::{cartridge::Cartridge, gba::Gba};
//!
//! let rom = std::fs::read("game.gba")?;
//! let bios = std::fs::read("gba_bios.bin")?;
//!
//! let mut gba = Gba::new(Cartridge::new(rom), bios.try_into()?, true);
//! loop {
//!     gba.run_frame()?;
//!     // hand gba.visible_frame() to the display
//! }
//! ```

mod bitwise;

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod gba;
