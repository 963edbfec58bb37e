//! The live register window.
//!
//! r0..r7 and r15 are never banked; r8..r14 are swapped against
//! [`RegisterBank`](super::register_bank::RegisterBank) storage on every mode
//! change, so reads and writes here never need to chase the current mode.
//!
//! r15 always addresses the next fetch word. Because of the prefetch latch it
//! reads two instructions ahead of the one currently executing (+8 in ARM,
//! +4 in Thumb).

use serde::{Deserialize, Serialize};

/// Stack pointer register index.
pub const REG_SP: usize = 13;

/// Link register index.
pub const REG_LR: usize = 14;

/// Program counter register index.
pub const REG_PC: usize = 15;

#[derive(Default, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.0[REG_PC]
    }

    pub fn set_program_counter(&mut self, new_value: u32) {
        self.0[REG_PC] = new_value;
    }

    #[must_use]
    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        assert!(reg <= 15, "invalid register index: {reg}");
        self.0[reg] = new_value;
    }
}
