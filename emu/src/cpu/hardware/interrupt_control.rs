use serde::{Deserialize, Serialize};

/// The fourteen interrupt sources, as bit positions in IE/IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    #[must_use]
    pub const fn flag(self) -> u16 {
        1 << self as u16
    }

    #[must_use]
    pub const fn timer(index: usize) -> Self {
        match index {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            _ => Self::Timer3,
        }
    }

    #[must_use]
    pub const fn dma(channel: usize) -> Self {
        match channel {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }
}

/// Instruction dispatch state. HALT and STOP are entered through HALTCNT and
/// left when an enabled interrupt becomes pending.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Run,
    Halt,
    Stop,
}

/// Interrupt, waitstate and power-down control registers
/// (0x04000200..0x04000301).
#[derive(Default, Serialize, Deserialize)]
pub struct InterruptControl {
    /// IE, 0x04000200.
    pub interrupt_enable: u16,

    /// IF, 0x04000202. Writes acknowledge (clear) the written bits.
    pub interrupt_flags: u16,

    /// WAITCNT, 0x04000204.
    pub wait_state_control: u16,

    /// IME, 0x04000208. Only bit 0 matters.
    pub interrupt_master_enable: u16,

    /// POSTFLG, 0x04000300.
    pub post_boot_flag: u8,

    /// HALTCNT, 0x04000301 (write-only).
    pub power_state: PowerState,
}

impl InterruptControl {
    #[must_use]
    pub fn master_enabled(&self) -> bool {
        self.interrupt_master_enable & 1 != 0
    }

    /// True when any enabled interrupt is pending, regardless of IME and the
    /// CPSR I bit. This is the condition that wakes HALT/STOP.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.interrupt_enable & self.interrupt_flags != 0
    }

    /// Latch an interrupt request and leave power-down.
    pub fn raise(&mut self, interrupt: Interrupt) {
        self.interrupt_flags |= interrupt.flag();
        self.power_state = PowerState::Run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_wakes_power_down() {
        let mut control = InterruptControl {
            power_state: PowerState::Halt,
            interrupt_enable: Interrupt::VBlank.flag(),
            ..Default::default()
        };

        assert!(!control.pending());
        control.raise(Interrupt::VBlank);

        assert!(control.pending());
        assert_eq!(control.power_state, PowerState::Run);
        assert_eq!(control.interrupt_flags, 1);
    }

    #[test]
    fn pending_needs_matching_enable() {
        let mut control = InterruptControl::default();
        control.raise(Interrupt::Timer2);

        assert!(!control.pending());
        control.interrupt_enable = Interrupt::Timer2.flag();
        assert!(control.pending());
    }
}
