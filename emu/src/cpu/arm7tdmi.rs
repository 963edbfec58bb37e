//! The CPU core: prefetch, banked register file, exception entry, power
//! states and the per-instruction step loop.
//!
//! The core keeps a one-slot prefetch latch. Each step takes the latched
//! opcode (fetching one if the latch is empty after a pipeline flush),
//! refills the latch from r15, then decodes and executes. r15 therefore
//! always addresses the next fetch word and reads two instructions ahead of
//! the executing one. Writing r15 empties the latch.

use crate::bus::Bus;
use crate::cpu::arm::ArmModeOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::hardware::interrupt_control::PowerState;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{Registers, REG_LR, REG_PC};
use crate::cpu::thumb::ThumbModeOpcode;
use crate::cpu::EmulatorError;

/// Exception vector addresses.
pub const VEC_RESET: u32 = 0x00;
pub const VEC_UND: u32 = 0x04;
pub const VEC_SVC: u32 = 0x08;
pub const VEC_PABT: u32 = 0x0C;
pub const VEC_DABT: u32 = 0x10;
pub const VEC_ADDR26: u32 = 0x14;
pub const VEC_IRQ: u32 = 0x18;
pub const VEC_FIQ: u32 = 0x1C;

pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,

    /// The SPSR of the current mode (meaningless in User/System).
    pub spsr: Psr,

    pub registers: Registers,
    pub register_bank: RegisterBank,

    /// Prefetch latch: the next opcode to execute, if already fetched.
    pipeline: Option<u32>,

    /// Free-running cycle counter.
    pub cycles: u64,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        let mut cpsr = Psr::from(Mode::System);
        cpsr.set_cpu_state(CpuState::Arm);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        Self {
            bus: Bus::default(),
            cpsr,
            spsr: Psr::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            pipeline: None,
            cycles: 0,
        }
    }
}

impl Arm7tdmi {
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            ..Default::default()
        }
    }

    /// Apply the documented post-BIOS register state, so a cartridge can be
    /// entered directly without executing the BIOS.
    pub fn skip_bios(&mut self) {
        self.register_bank.r13_svc = 0x0300_7FE0;
        self.register_bank.r13_irq = 0x0300_7FA0;
        self.registers.set_register_at(13, 0x0300_7F00);
        self.registers.set_program_counter(0x0800_0000);

        self.bus.interrupt_control.post_boot_flag = 1;
        self.bus.serial.mode_select = 0x8000;
        self.bus.internal_memory.bios_bus = 0xE129_F000;
    }

    pub fn flush_pipeline(&mut self) {
        self.pipeline = None;
    }

    /// Bytes per instruction in the current state.
    #[must_use]
    pub fn instruction_size(&self) -> u32 {
        match self.cpsr.cpu_state() {
            CpuState::Arm => 4,
            CpuState::Thumb => 2,
        }
    }

    /// r15 as stores and register-specified shifts observe it: one word
    /// further ahead than the fetch address.
    #[must_use]
    pub fn pc_value(&self) -> u32 {
        self.registers
            .program_counter()
            .wrapping_add(self.instruction_size())
    }

    #[must_use]
    pub fn reg(&self, n: usize) -> u32 {
        self.registers.register_at(n)
    }

    /// Register write with the r15 rules applied: the program counter is
    /// force-aligned for the current state and the prefetch latch dropped.
    pub fn set_reg(&mut self, n: usize, value: u32) {
        if n == REG_PC {
            let aligned = match self.cpsr.cpu_state() {
                CpuState::Arm => value & !0b11,
                CpuState::Thumb => value & !0b1,
            };
            self.registers.set_program_counter(aligned);
            self.flush_pipeline();
        } else {
            self.registers.set_register_at(n, value);
        }
    }

    /// Fetch the next opcode at r15, advancing r15 past it.
    fn fetch(&mut self) -> u32 {
        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                let pc = self.registers.program_counter() & !0b11;
                self.bus.program_counter = pc;
                let instruction = self.bus.read_word(pc);
                self.registers.set_program_counter(pc.wrapping_add(4));
                instruction
            }
            CpuState::Thumb => {
                let pc = self.registers.program_counter() & !0b1;
                self.bus.program_counter = pc;
                let instruction = self.bus.read_half_word(pc) as u32;
                self.registers.set_program_counter(pc.wrapping_add(2));
                instruction
            }
        }
    }

    /// Execute one instruction (or idle for a cycle in HALT/STOP), returning
    /// the cycles consumed.
    pub fn step(&mut self) -> Result<u32, EmulatorError> {
        if self.bus.interrupt_control.power_state != PowerState::Run {
            if self.bus.interrupt_control.pending() {
                self.bus.interrupt_control.power_state = PowerState::Run;
            } else {
                self.cycles += 1;
                return Ok(1);
            }
        }

        let start = self.cycles;
        self.bus.program_counter = self.registers.program_counter();

        let instruction = match self.pipeline.take() {
            Some(op) => op,
            None => self.fetch(),
        };
        self.pipeline = Some(self.fetch());

        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                let op_code: ArmModeOpcode = instruction.try_into()?;
                if self.cpsr.can_execute(op_code.condition) {
                    self.execute_arm(op_code)?;
                } else {
                    // Condition-failed instructions still cost one cycle.
                    self.cycles += 1;
                }
            }
            CpuState::Thumb => {
                let op_code: ThumbModeOpcode = (instruction as u16).try_into()?;
                self.execute_thumb(op_code)?;
            }
        }

        // Stall for any DMA the executed instruction kicked off.
        self.cycles += self.bus.take_dma_stall() as u64;

        Ok((self.cycles - start) as u32)
    }

    /// Drive execution for at least `budget` cycles, interleaving timers and
    /// the IRQ sample after every instruction.
    pub fn run_for(&mut self, budget: u32) -> Result<(), EmulatorError> {
        let mut total = 0;
        while total < budget {
            let elapsed = self.step()?;
            self.bus.advance_timers(elapsed);
            self.check_irq();
            total += elapsed;
        }
        Ok(())
    }

    /// Take the IRQ exception when one is pending, enabled and unmasked.
    pub fn check_irq(&mut self) {
        if !self.cpsr.irq_disable()
            && self.bus.interrupt_control.master_enabled()
            && self.bus.interrupt_control.pending()
        {
            self.exception(VEC_IRQ, Mode::Irq);
        }
    }

    /// Exception entry: bank registers for the target mode, save CPSR to its
    /// SPSR, mask interrupts, drop to ARM state and jump to the vector.
    pub fn exception(&mut self, vector: u32, new_mode: Mode) {
        let cpsr = self.cpsr;
        let thumb = self.cpsr.cpu_state() == CpuState::Thumb;

        self.swap_mode(new_mode);
        if new_mode.has_spsr() {
            self.spsr = cpsr;
        }

        if vector == VEC_FIQ || vector == VEC_RESET {
            self.cpsr.set_fiq_disable(true);
        }

        let pc = self.registers.program_counter();
        match vector {
            // SWI and undefined return past the faulting instruction.
            VEC_UND | VEC_SVC => {
                let lr = if thumb { pc.wrapping_sub(2) } else { pc.wrapping_sub(4) };
                self.registers.set_register_at(REG_LR, lr);
            }
            VEC_RESET => {}
            _ => {
                self.registers.set_register_at(REG_LR, pc.wrapping_sub(4));
            }
        }

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);

        self.registers.set_program_counter(vector);
        self.flush_pipeline();
        self.pipeline = Some(self.fetch());
    }

    /// Switch the active mode, swapping the banked register window.
    pub fn swap_mode(&mut self, new_mode: Mode) {
        if self.cpsr.mode() == new_mode {
            return;
        }

        // Park the live registers in the departing mode's bank.
        match self.cpsr.mode() {
            Mode::Fiq => {
                self.register_bank.r8_fiq = self.registers.register_at(8);
                self.register_bank.r9_fiq = self.registers.register_at(9);
                self.register_bank.r10_fiq = self.registers.register_at(10);
                self.register_bank.r11_fiq = self.registers.register_at(11);
                self.register_bank.r12_fiq = self.registers.register_at(12);
                self.register_bank.r13_fiq = self.registers.register_at(13);
                self.register_bank.r14_fiq = self.registers.register_at(14);
                self.register_bank.spsr_fiq = self.spsr;

                self.registers.set_register_at(8, self.register_bank.r8_old);
                self.registers.set_register_at(9, self.register_bank.r9_old);
                self.registers.set_register_at(10, self.register_bank.r10_old);
                self.registers.set_register_at(11, self.register_bank.r11_old);
                self.registers.set_register_at(12, self.register_bank.r12_old);
            }
            Mode::User | Mode::System => {
                self.register_bank.r13_old = self.registers.register_at(13);
                self.register_bank.r14_old = self.registers.register_at(14);
            }
            Mode::Supervisor => {
                self.register_bank.r13_svc = self.registers.register_at(13);
                self.register_bank.r14_svc = self.registers.register_at(14);
                self.register_bank.spsr_svc = self.spsr;
            }
            Mode::Abort => {
                self.register_bank.r13_abt = self.registers.register_at(13);
                self.register_bank.r14_abt = self.registers.register_at(14);
                self.register_bank.spsr_abt = self.spsr;
            }
            Mode::Irq => {
                self.register_bank.r13_irq = self.registers.register_at(13);
                self.register_bank.r14_irq = self.registers.register_at(14);
                self.register_bank.spsr_irq = self.spsr;
            }
            Mode::Undefined => {
                self.register_bank.r13_und = self.registers.register_at(13);
                self.register_bank.r14_und = self.registers.register_at(14);
                self.register_bank.spsr_und = self.spsr;
            }
        }

        // Load the arriving mode's bank into the live window.
        match new_mode {
            Mode::Fiq => {
                self.register_bank.r8_old = self.registers.register_at(8);
                self.register_bank.r9_old = self.registers.register_at(9);
                self.register_bank.r10_old = self.registers.register_at(10);
                self.register_bank.r11_old = self.registers.register_at(11);
                self.register_bank.r12_old = self.registers.register_at(12);

                self.registers.set_register_at(8, self.register_bank.r8_fiq);
                self.registers.set_register_at(9, self.register_bank.r9_fiq);
                self.registers.set_register_at(10, self.register_bank.r10_fiq);
                self.registers.set_register_at(11, self.register_bank.r11_fiq);
                self.registers.set_register_at(12, self.register_bank.r12_fiq);
                self.registers.set_register_at(13, self.register_bank.r13_fiq);
                self.registers.set_register_at(14, self.register_bank.r14_fiq);

                self.spsr = self.register_bank.spsr_fiq;
            }
            Mode::User | Mode::System => {
                self.registers.set_register_at(13, self.register_bank.r13_old);
                self.registers.set_register_at(14, self.register_bank.r14_old);
            }
            Mode::Supervisor => {
                self.registers.set_register_at(13, self.register_bank.r13_svc);
                self.registers.set_register_at(14, self.register_bank.r14_svc);
                self.spsr = self.register_bank.spsr_svc;
            }
            Mode::Abort => {
                self.registers.set_register_at(13, self.register_bank.r13_abt);
                self.registers.set_register_at(14, self.register_bank.r14_abt);
                self.spsr = self.register_bank.spsr_abt;
            }
            Mode::Irq => {
                self.registers.set_register_at(13, self.register_bank.r13_irq);
                self.registers.set_register_at(14, self.register_bank.r14_irq);
                self.spsr = self.register_bank.spsr_irq;
            }
            Mode::Undefined => {
                self.registers.set_register_at(13, self.register_bank.r13_und);
                self.registers.set_register_at(14, self.register_bank.r14_und);
                self.spsr = self.register_bank.spsr_und;
            }
        }

        self.cpsr.set_mode(new_mode);
    }

    /// The PSR MRS/MSR observe: the current mode's SPSR, or CPSR where none
    /// exists.
    #[must_use]
    pub fn saved_psr(&self) -> Psr {
        if self.cpsr.mode().has_spsr() {
            self.spsr
        } else {
            self.cpsr
        }
    }

    pub fn set_saved_psr(&mut self, value: Psr) {
        if self.cpsr.mode().has_spsr() {
            self.spsr = value;
        } else {
            self.cpsr = value;
        }
    }

    /// Load CPSR from the current SPSR, banking registers for the restored
    /// mode. Used by data processing with S and r15, and by LDM with the PSR
    /// bit.
    pub fn restore_cpsr_from_spsr(&mut self) {
        let saved = self.saved_psr();
        self.swap_mode(saved.mode());
        self.cpsr = saved;
    }
}
