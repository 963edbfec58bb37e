//! Program Status Registers (CPSR and SPSR).
//!
//! ```text
//! 31 30 29 28 27      8 7 6 5 4   0
//! ┌──┬──┬──┬──┬────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │Reserved│I│F│T│Mode │
//! └──┴──┴──┴──┴────────┴─┴─┴─┴─────┘
//! ```
//!
//! The flags are tested by [`Condition`](super::condition::Condition)
//! predicates; the mode field selects the active register bank.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};

/// A CPSR or SPSR value, wrapping the raw `u32` with typed accessors.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    pub(crate) fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            NV => false,
        }
    }

    /// N, bit 31.
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z, bit 30.
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C, bit 29.
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V, bit 28.
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I, bit 7. Set means IRQs are masked.
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F, bit 6. Set means FIQs are masked.
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T, bit 5. Set in Thumb state.
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    /// Mode bits 4..0.
    ///
    /// The BIOS occasionally leaves invalid mode values in an SPSR; fall back
    /// to Supervisor instead of panicking on them.
    #[must_use]
    pub fn mode(self) -> Mode {
        Mode::try_from(self.0).unwrap_or_else(|bits| {
            tracing::debug!("invalid mode bits {bits:#07b} in PSR {:#010X}", self.0);
            Mode::Supervisor
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// Apply the NZCV output of an ALU operation in one go.
    pub fn set_flags(&mut self, op_result: ArithmeticOpResult) {
        self.set_sign_flag(op_result.sign);
        self.set_zero_flag(op_result.zero);
        self.set_carry_flag(op_result.carry);
        self.set_overflow_flag(op_result.overflow);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    /// Do not flip this outside of branch-exchange or exception entry.
    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    pub fn set_mode(&mut self, m: Mode) {
        self.0 = (self.0 & !0b11111) | m as u32;
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        Self(m as u32)
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

/// The CPU execution state (ARM or Thumb), controlled by CPSR bit 5.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CpuState {
    /// 16-bit instructions.
    Thumb,
    /// 32-bit instructions.
    Arm,
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state {
            Self::Thumb
        } else {
            Self::Arm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accessors() {
        let mut cpsr = Psr::default();

        cpsr.set_sign_flag(true);
        assert!(cpsr.sign_flag());

        cpsr.set_zero_flag(true);
        assert!(cpsr.zero_flag());

        cpsr.set_carry_flag(true);
        assert!(cpsr.carry_flag());

        cpsr.set_overflow_flag(true);
        assert!(cpsr.overflow_flag());

        assert_eq!(u32::from(cpsr) >> 28, 0b1111);
    }

    #[test]
    fn control_bits() {
        let mut cpsr = Psr::default();

        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);
        assert!(cpsr.irq_disable());
        assert!(cpsr.fiq_disable());

        cpsr.set_cpu_state(CpuState::Thumb);
        assert_eq!(cpsr.cpu_state(), CpuState::Thumb);
        cpsr.set_cpu_state(CpuState::Arm);
        assert_eq!(cpsr.cpu_state(), CpuState::Arm);
    }

    #[test]
    fn mode_field() {
        let mut cpsr = Psr::default();
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            cpsr.set_mode(mode);
            assert_eq!(cpsr.mode(), mode);
        }
    }

    #[test]
    fn invalid_mode_falls_back_to_supervisor() {
        let cpsr = Psr::from(0u32);
        assert_eq!(cpsr.mode(), Mode::Supervisor);
    }

    #[test]
    fn condition_evaluation() {
        let mut cpsr = Psr::default();
        cpsr.set_zero_flag(true);
        cpsr.set_carry_flag(true);

        assert!(cpsr.can_execute(Condition::EQ));
        assert!(!cpsr.can_execute(Condition::NE));
        assert!(cpsr.can_execute(Condition::CS));
        assert!(!cpsr.can_execute(Condition::HI));
        assert!(cpsr.can_execute(Condition::LS));
        assert!(cpsr.can_execute(Condition::GE));
        assert!(!cpsr.can_execute(Condition::GT));
        assert!(cpsr.can_execute(Condition::LE));
        assert!(cpsr.can_execute(Condition::AL));
        assert!(!cpsr.can_execute(Condition::NV));
    }
}
