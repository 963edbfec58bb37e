use serde::{Deserialize, Serialize};

pub const BIOS_SIZE: usize = 0x4000;
const EWRAM_SIZE: usize = 0x4_0000;
const IWRAM_SIZE: usize = 0x8000;

/// On-board storage: BIOS ROM plus the two work RAMs.
///
/// The BIOS is readable only while r15 executes inside it; any other read
/// sees `bios_bus`, the last word the BIOS itself fetched (open-bus
/// behavior of the protected ROM).
#[derive(Serialize, Deserialize)]
pub struct InternalMemory {
    /// From 0x00000000 to 0x00003FFF (16 KiB).
    pub bios: Vec<u8>,

    /// From 0x02000000 to 0x0203FFFF (256 KiB), mirrored through 0x02FFFFFF.
    pub working_ram: Vec<u8>,

    /// From 0x03000000 to 0x03007FFF (32 KiB), mirrored through 0x03FFFFFF.
    pub working_iram: Vec<u8>,

    /// Last word successfully fetched from the BIOS region.
    pub bios_bus: u32,
}

impl Default for InternalMemory {
    fn default() -> Self {
        Self {
            bios: vec![0; BIOS_SIZE],
            working_ram: vec![0; EWRAM_SIZE],
            working_iram: vec![0; IWRAM_SIZE],
            bios_bus: 0,
        }
    }
}

impl InternalMemory {
    #[must_use]
    pub fn with_bios(bios: [u8; BIOS_SIZE]) -> Self {
        Self {
            bios: bios.to_vec(),
            ..Default::default()
        }
    }
}
