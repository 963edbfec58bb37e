//! Execution of the ARM (32-bit) instruction set.

use crate::bitwise::Bits;
use crate::cpu::arm::alu::{
    adc_flags, add_flags, barrel_shifter, multiplier_cycles, sbc_flags, sub_flags, ShiftKind,
};
use crate::cpu::arm::instructions::{
    AluSecondOperand, ArmAluOpcode, ArmInstruction, ArmMultiplyLongVariant, ArmMultiplyVariant,
    HalfwordTransferKind, HalfwordTransferOffset, MsrOperand, PsrKind, PsrOp,
    SingleDataTransferOffset,
};
use crate::cpu::arm::ArmModeOpcode;
use crate::cpu::arm7tdmi::{Arm7tdmi, VEC_SVC, VEC_UND};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::psr::Psr;
use crate::cpu::registers::{REG_LR, REG_PC};
use crate::cpu::{EmulatorError, InstructionMode};

impl Arm7tdmi {
    pub(crate) fn execute_arm(&mut self, op_code: ArmModeOpcode) -> Result<(), EmulatorError> {
        match op_code.instruction {
            ArmInstruction::BranchAndExchange { rn } => {
                self.branch_and_exchange(rn);
                Ok(())
            }
            ArmInstruction::Branch { link, offset } => {
                self.branch(link, offset);
                Ok(())
            }
            ArmInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                psr_force_user,
                write_back,
                load_store,
                base_register,
                register_list,
            } => {
                self.block_data_transfer(
                    indexing,
                    offsetting,
                    psr_force_user,
                    write_back,
                    load_store,
                    base_register,
                    register_list,
                );
                Ok(())
            }
            ArmInstruction::SoftwareInterrupt => {
                self.exception(VEC_SVC, Mode::Supervisor);
                self.cycles += 3;
                Ok(())
            }
            ArmInstruction::Undefined => {
                self.exception(VEC_UND, Mode::Undefined);
                self.cycles += 3;
                Ok(())
            }
            ArmInstruction::SingleDataTransfer {
                indexing,
                offsetting,
                quantity,
                write_back,
                load_store,
                base_register,
                source_destination,
                offset,
            } => self.single_data_transfer(
                &op_code,
                indexing,
                offsetting,
                quantity,
                write_back,
                load_store,
                base_register,
                source_destination,
                offset,
            ),
            ArmInstruction::SingleDataSwap {
                quantity,
                base_register,
                destination,
                source,
            } => {
                self.single_data_swap(quantity, base_register, destination, source);
                Ok(())
            }
            ArmInstruction::Multiply {
                variant,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                self.multiply(variant, set_conditions, rd, rn, rs, rm);
                Ok(())
            }
            ArmInstruction::MultiplyLong {
                variant,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => {
                self.multiply_long(variant, set_conditions, rd_hi, rd_lo, rs, rm);
                Ok(())
            }
            ArmInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                source_destination,
                offset,
                transfer_kind,
            } => self.halfword_data_transfer(
                &op_code,
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                source_destination,
                offset,
                transfer_kind,
            ),
            ArmInstruction::PsrTransfer { psr, op } => {
                self.psr_transfer(psr, op);
                Ok(())
            }
            ArmInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                self.data_processing(alu_instruction, set_conditions, rn, destination, op2);
                Ok(())
            }
        }
    }

    fn branch(&mut self, link: bool, offset: i32) {
        let pc = self.registers.program_counter();

        if link {
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(4));
        }

        self.set_reg(REG_PC, pc.wrapping_add(offset as u32));
        self.cycles += 3;
    }

    fn branch_and_exchange(&mut self, rn: usize) {
        let destination = self.reg(rn);

        self.cpsr.set_cpu_state(destination.get_bit(0).into());
        self.set_reg(REG_PC, destination);
        self.cycles += 3;
    }

    /// Evaluate operand 2, producing the value, the shifter carry-out (None
    /// leaves C untouched) and whether a register-specified shift was used.
    fn alu_second_operand(
        &mut self,
        op2: AluSecondOperand,
        operand1: &mut u32,
        rn: usize,
    ) -> (u32, Option<bool>, bool) {
        let carry_in = self.cpsr.carry_flag();

        match op2 {
            AluSecondOperand::Immediate { value, rotate } => {
                let (value, carry) = barrel_shifter(ShiftKind::Ror, value, rotate, false, carry_in);
                (value, carry, false)
            }
            AluSecondOperand::ShiftedRegister {
                rm,
                shift_kind,
                amount,
            } => {
                let (value, carry) =
                    barrel_shifter(shift_kind, self.reg(rm), amount, true, carry_in);
                (value, carry, false)
            }
            AluSecondOperand::RegisterShiftedRegister { rm, shift_kind, rs } => {
                // With a register-specified shift, a PC operand reads one
                // word further ahead.
                if rn == REG_PC {
                    *operand1 = self.pc_value();
                }
                let rm_value = if rm == REG_PC {
                    self.pc_value()
                } else {
                    self.reg(rm)
                };

                let amount = self.reg(rs) & 0xFF;
                let (value, carry) = barrel_shifter(shift_kind, rm_value, amount, false, carry_in);
                (value, carry, true)
            }
        }
    }

    fn set_logical_flags(&mut self, result: u32, shifter_carry: Option<bool>) {
        self.cpsr.set_sign_flag(result.get_bit(31));
        self.cpsr.set_zero_flag(result == 0);
        if let Some(carry) = shifter_carry {
            self.cpsr.set_carry_flag(carry);
        }
    }

    fn data_processing(
        &mut self,
        alu_instruction: ArmAluOpcode,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperand,
    ) {
        let mut operand1 = self.reg(rn);
        let (operand2, shifter_carry, register_shift) =
            self.alu_second_operand(op2, &mut operand1, rn);

        let carry_in = self.cpsr.carry_flag();
        let pc_written = destination == REG_PC && !alu_instruction.is_test();

        let write = |cpu: &mut Self, result: u32| {
            cpu.set_reg(destination, result);
        };

        match alu_instruction {
            ArmAluOpcode::And => {
                let result = operand1 & operand2;
                if set_conditions {
                    self.set_logical_flags(result, shifter_carry);
                }
                write(self, result);
            }
            ArmAluOpcode::Eor => {
                let result = operand1 ^ operand2;
                if set_conditions {
                    self.set_logical_flags(result, shifter_carry);
                }
                write(self, result);
            }
            ArmAluOpcode::Sub => {
                let op = sub_flags(operand1, operand2);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Rsb => {
                let op = sub_flags(operand2, operand1);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Add => {
                let op = add_flags(operand1, operand2);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Adc => {
                let op = adc_flags(operand1, operand2, carry_in);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Sbc => {
                let op = sbc_flags(operand1, operand2, carry_in);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Rsc => {
                let op = sbc_flags(operand2, operand1, carry_in);
                if set_conditions {
                    self.cpsr.set_flags(op);
                }
                write(self, op.result);
            }
            ArmAluOpcode::Tst => {
                self.set_logical_flags(operand1 & operand2, shifter_carry);
            }
            ArmAluOpcode::Teq => {
                self.set_logical_flags(operand1 ^ operand2, shifter_carry);
            }
            ArmAluOpcode::Cmp => {
                self.cpsr.set_flags(sub_flags(operand1, operand2));
            }
            ArmAluOpcode::Cmn => {
                self.cpsr.set_flags(add_flags(operand1, operand2));
            }
            ArmAluOpcode::Orr => {
                let result = operand1 | operand2;
                if set_conditions {
                    self.set_logical_flags(result, shifter_carry);
                }
                write(self, result);
            }
            ArmAluOpcode::Mov => {
                if set_conditions {
                    self.set_logical_flags(operand2, shifter_carry);
                }
                write(self, operand2);
            }
            ArmAluOpcode::Bic => {
                let result = operand1 & !operand2;
                if set_conditions {
                    self.set_logical_flags(result, shifter_carry);
                }
                write(self, result);
            }
            ArmAluOpcode::Mvn => {
                if set_conditions {
                    self.set_logical_flags(!operand2, shifter_carry);
                }
                write(self, !operand2);
            }
        }

        // An S-bit write to r15 also restores CPSR from the mode's SPSR.
        if set_conditions && pc_written {
            self.restore_cpsr_from_spsr();
        }

        self.cycles += 1 + register_shift as u64 + if pc_written { 2 } else { 0 };
    }

    fn psr_transfer(&mut self, psr: PsrKind, op: PsrOp) {
        match op {
            PsrOp::Mrs { destination } => {
                let value = match psr {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.saved_psr(),
                };
                self.set_reg(destination, value.into());
            }
            PsrOp::Msr {
                write_flags,
                write_control,
                operand,
            } => {
                let operand = match operand {
                    MsrOperand::Immediate { value, rotate } => value.rotate_right(rotate),
                    MsrOperand::Register(rm) => self.reg(rm),
                };

                let current: u32 = match psr {
                    PsrKind::Cpsr => self.cpsr.into(),
                    PsrKind::Spsr => self.saved_psr().into(),
                };

                let mut value = current;
                if write_flags {
                    value = (value & 0x00FF_FFFF) | (operand & 0xFF00_0000);
                }
                if write_control {
                    value = (value & 0xFFFF_FF00) | (operand & 0x0000_00FF);
                }

                match psr {
                    PsrKind::Cpsr => {
                        let new_psr = Psr::from(value);
                        // A control-byte write may switch modes, which banks
                        // registers.
                        self.swap_mode(new_psr.mode());
                        self.cpsr = new_psr;
                    }
                    PsrKind::Spsr => self.set_saved_psr(Psr::from(value)),
                }
            }
        }

        self.cycles += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        op_code: &ArmModeOpcode,
        indexing: Indexing,
        offsetting: Offsetting,
        quantity: ReadWriteKind,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        source_destination: usize,
        offset: SingleDataTransferOffset,
    ) -> Result<(), EmulatorError> {
        if indexing == Indexing::Post && write_back {
            // LDRT/STRT force the user-mode view; no game hits this path.
            return Err(EmulatorError::Unimplemented {
                mode: InstructionMode::Arm,
                opcode: op_code.raw,
                what: "LDRT/STRT",
            });
        }

        let carry_in = self.cpsr.carry_flag();
        let offset_value = match offset {
            SingleDataTransferOffset::Immediate(value) => value,
            SingleDataTransferOffset::Register {
                rm,
                shift_kind,
                amount,
            } => barrel_shifter(shift_kind, self.reg(rm), amount, true, carry_in).0,
        };
        let offset_value = match offsetting {
            Offsetting::Up => offset_value,
            Offsetting::Down => offset_value.wrapping_neg(),
        };

        let base = self.reg(base_register);
        let address = match indexing {
            Indexing::Pre => base.wrapping_add(offset_value),
            Indexing::Post => base,
        };

        let pc_transferred = source_destination == REG_PC;

        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => self.bus.read_byte(address) as u32,
                    ReadWriteKind::Word => self.bus.read_word_rotated(address),
                };
                self.set_reg(source_destination, value);
                self.cycles += 3 + if pc_transferred { 2 } else { 0 };
            }
            LoadStoreKind::Store => {
                // A stored r15 reads one word further ahead.
                let value = self
                    .reg(source_destination)
                    .wrapping_add((pc_transferred as u32) << 2);
                match quantity {
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                    ReadWriteKind::Word => self.bus.write_word(address, value),
                }
                self.cycles += 2;
            }
        }

        let should_write_back = indexing == Indexing::Post || write_back;
        if should_write_back
            && !(load_store == LoadStoreKind::Load && base_register == source_destination)
        {
            let new_base = self
                .reg(base_register)
                .wrapping_add(((base_register == REG_PC) as u32) << 2)
                .wrapping_add(offset_value);
            self.set_reg(base_register, new_base);
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn halfword_data_transfer(
        &mut self,
        op_code: &ArmModeOpcode,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        source_destination: usize,
        offset: HalfwordTransferOffset,
        transfer_kind: HalfwordTransferKind,
    ) -> Result<(), EmulatorError> {
        let offset_value = match offset {
            HalfwordTransferOffset::Immediate(value) => value,
            HalfwordTransferOffset::Register(rm) => self.reg(rm),
        };
        let offset_value = match offsetting {
            Offsetting::Up => offset_value,
            Offsetting::Down => offset_value.wrapping_neg(),
        };

        let base = self.reg(base_register);
        let address = match indexing {
            Indexing::Pre => base.wrapping_add(offset_value),
            Indexing::Post => base,
        };

        let pc_transferred = source_destination == REG_PC;

        match load_store {
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfword => {
                        self.bus.read_half_word_rotated(address)
                    }
                    HalfwordTransferKind::SignedByte => {
                        self.bus.read_byte(address) as i8 as i32 as u32
                    }
                    HalfwordTransferKind::SignedHalfword => {
                        if address.get_bit(0) {
                            // A misaligned signed halfword degrades to a
                            // signed byte load.
                            self.bus.read_byte(address) as i8 as i32 as u32
                        } else {
                            self.bus.read_half_word(address) as i16 as i32 as u32
                        }
                    }
                    HalfwordTransferKind::Doubleword => {
                        return Err(EmulatorError::Unimplemented {
                            mode: InstructionMode::Arm,
                            opcode: op_code.raw,
                            what: "LDRD",
                        });
                    }
                };
                self.set_reg(source_destination, value);
                self.cycles += 3 + if pc_transferred { 2 } else { 0 };
            }
            LoadStoreKind::Store => {
                match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfword => {
                        let value = self
                            .reg(source_destination)
                            .wrapping_add((pc_transferred as u32) << 2);
                        self.bus.write_half_word(address, value as u16);
                    }
                    _ => {
                        return Err(EmulatorError::Unimplemented {
                            mode: InstructionMode::Arm,
                            opcode: op_code.raw,
                            what: "STRD",
                        });
                    }
                }
                self.cycles += 2;
            }
        }

        let should_write_back = indexing == Indexing::Post || write_back;
        if should_write_back
            && !(load_store == LoadStoreKind::Load && base_register == source_destination)
        {
            let new_base = self
                .reg(base_register)
                .wrapping_add(((base_register == REG_PC) as u32) << 2)
                .wrapping_add(offset_value);
            self.set_reg(base_register, new_base);
        }

        Ok(())
    }

    fn single_data_swap(
        &mut self,
        quantity: ReadWriteKind,
        base_register: usize,
        destination: usize,
        source: usize,
    ) {
        let address = self.reg(base_register);

        match quantity {
            ReadWriteKind::Byte => {
                let loaded = self.bus.read_byte(address) as u32;
                let stored = self.reg(source);
                self.bus.write_byte(address, stored as u8);
                self.set_reg(destination, loaded);
            }
            ReadWriteKind::Word => {
                let loaded = self.bus.read_word_rotated(address);
                let stored = self.reg(source);
                self.bus.write_word(address, stored);
                self.set_reg(destination, loaded);
            }
        }

        self.cycles += 4;
    }

    fn multiply(
        &mut self,
        variant: ArmMultiplyVariant,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) {
        let multiplier = self.reg(rs);
        let m = multiplier_cycles(multiplier);

        let result = match variant {
            ArmMultiplyVariant::Mul => {
                self.cycles += 1 + m;
                self.reg(rm).wrapping_mul(multiplier)
            }
            ArmMultiplyVariant::Mla => {
                self.cycles += 2 + m;
                self.reg(rm).wrapping_mul(multiplier).wrapping_add(self.reg(rn))
            }
        };

        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }

        self.set_reg(rd, result);
    }

    fn multiply_long(
        &mut self,
        variant: ArmMultiplyLongVariant,
        set_conditions: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    ) {
        let m = multiplier_cycles(self.reg(rs));

        let accumulator = ((self.reg(rd_hi) as u64) << 32) | self.reg(rd_lo) as u64;

        let result = match variant {
            ArmMultiplyLongVariant::Umull => {
                self.cycles += 2 + m;
                (self.reg(rm) as u64).wrapping_mul(self.reg(rs) as u64)
            }
            ArmMultiplyLongVariant::Umlal => {
                self.cycles += 3 + m;
                (self.reg(rm) as u64)
                    .wrapping_mul(self.reg(rs) as u64)
                    .wrapping_add(accumulator)
            }
            ArmMultiplyLongVariant::Smull => {
                self.cycles += 2 + m;
                (self.reg(rm) as i32 as i64).wrapping_mul(self.reg(rs) as i32 as i64) as u64
            }
            ArmMultiplyLongVariant::Smlal => {
                self.cycles += 3 + m;
                (self.reg(rm) as i32 as i64)
                    .wrapping_mul(self.reg(rs) as i32 as i64)
                    .wrapping_add(accumulator as i64) as u64
            }
        };

        if set_conditions {
            self.cpsr.set_sign_flag(result >> 63 != 0);
            self.cpsr.set_zero_flag(result == 0);
        }

        self.set_reg(rd_lo, result as u32);
        self.set_reg(rd_hi, (result >> 32) as u32);
    }

    #[allow(clippy::too_many_arguments)]
    fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        psr_force_user: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    ) {
        let mut register_list = register_list;
        let mut r15_transferred = register_list.get_bit(15);
        let load = load_store == LoadStoreKind::Load;

        // With S set, LDM with r15 restores CPSR; any other combination
        // temporarily transfers the user bank.
        let mut forced_mode = None;
        if psr_force_user {
            if load && r15_transferred {
                self.restore_cpsr_from_spsr();
            } else {
                forced_mode = Some(self.cpsr.mode());
                self.swap_mode(Mode::User);
            }
        }

        let total_transfers = register_list.count_ones();
        let empty_list = total_transfers == 0;

        let mut base = self.reg(base_register);
        let base_copy = base;
        let step: u32 = match offsetting {
            Offsetting::Up => 4,
            Offsetting::Down => 4u32.wrapping_neg(),
        };

        if empty_list {
            // An empty list transfers r15 and moves the base by 64 bytes.
            register_list.set_bit_on(15);
            self.set_reg(base_register, base.wrapping_add(step.wrapping_mul(16)));
            r15_transferred = true;
        } else if write_back {
            self.set_reg(
                base_register,
                base.wrapping_add(step.wrapping_mul(total_transfers)),
            );
        }

        let first_transferred = register_list.trailing_zeros() as usize;

        let ascending = matches!(offsetting, Offsetting::Up) ^ empty_list;
        let order: Vec<usize> = if ascending {
            (0..16).collect()
        } else {
            (0..16).rev().collect()
        };

        for reg in order {
            if register_list.get_bit(reg as u8) {
                let transfer_address = match indexing {
                    Indexing::Pre => base.wrapping_add(step),
                    Indexing::Post => base,
                };

                if load {
                    let value = self.bus.read_word(transfer_address);
                    self.set_reg(reg, value);
                } else {
                    // Storing the base register stores its original value
                    // when it is the first register in the list.
                    let value = if reg == base_register && reg == first_transferred {
                        base_copy
                    } else if reg == REG_PC {
                        self.pc_value()
                    } else {
                        self.reg(reg)
                    };
                    self.bus.write_word(transfer_address, value);
                }

                base = base.wrapping_add(step);
            }

            if empty_list {
                base = base.wrapping_add(step);
            }
        }

        if let Some(mode) = forced_mode {
            self.swap_mode(mode);
        }

        let total = total_transfers as u64;
        let pc_extra = r15_transferred as u64;
        if load {
            self.cycles += (total + pc_extra) + (1 + pc_extra) + 1;
        } else {
            self.cycles += if total == 0 { 1 } else { total + 1 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::condition::Condition;
    use crate::cpu::psr::CpuState;
    use pretty_assertions::assert_eq;

    fn execute(cpu: &mut Arm7tdmi, op_code: u32) {
        let decoded: ArmModeOpcode = op_code.try_into().unwrap();
        assert_ne!(decoded.condition, Condition::NV);
        cpu.execute_arm(decoded).unwrap();
    }

    #[test]
    fn mov_immediate_sets_register_in_one_cycle() {
        let mut cpu = Arm7tdmi::default();
        let flags_before = u32::from(cpu.cpsr) >> 28;

        let start = cpu.cycles;
        execute(&mut cpu, 0xE3A0_0001); // MOV r0, #1

        assert_eq!(cpu.reg(0), 1);
        assert_eq!(cpu.cycles - start, 1);
        assert_eq!(u32::from(cpu.cpsr) >> 28, flags_before);
    }

    #[test]
    fn cmp_equal_values() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(0, 5);
        cpu.registers.set_register_at(1, 5);

        execute(&mut cpu, 0xE150_0001); // CMP r0, r1

        assert!(!cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.overflow_flag());
    }

    #[test]
    fn ldr_aligned_and_rotated() {
        let mut cpu = Arm7tdmi::default();
        cpu.bus.write_word(0x0300_0000, 0xDEAD_BEEF);

        cpu.registers.set_register_at(1, 0x0300_0000);
        execute(&mut cpu, 0xE591_0000); // LDR r0, [r1]
        assert_eq!(cpu.reg(0), 0xDEAD_BEEF);

        cpu.registers.set_register_at(1, 0x0300_0001);
        execute(&mut cpu, 0xE591_0000);
        assert_eq!(cpu.reg(0), 0xEFDE_ADBE);
    }

    #[test]
    fn str_with_pc_offset_addressing() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(0, 0x0300_0100);
        cpu.registers.set_register_at(2, 0xFEED_F00D);

        // STR r2, [r0, #8]
        execute(&mut cpu, 0xE580_2008);
        assert_eq!(cpu.bus.read_word(0x0300_0108), 0xFEED_F00D);

        // Post-indexed STR r2, [r0], #-4
        execute(&mut cpu, 0xE400_2004);
        assert_eq!(cpu.bus.read_word(0x0300_0100), 0xFEED_F00D);
        assert_eq!(cpu.reg(0), 0x0300_00FC);
    }

    #[test]
    fn branches_move_pc() {
        let mut cpu = Arm7tdmi::default();

        // B +60
        execute(&mut cpu, 0xEA00_000F);
        assert_eq!(cpu.registers.program_counter(), 60);

        // B -36
        execute(&mut cpu, 0xEAFF_FFF7);
        assert_eq!(cpu.registers.program_counter(), 24);

        // BL +60: lr holds the next instruction.
        execute(&mut cpu, 0xEB00_000F);
        assert_eq!(cpu.reg(14), 20);
        assert_eq!(cpu.registers.program_counter(), 84);
    }

    #[test]
    fn bx_switches_state() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(3, 0x0300_0101);

        execute(&mut cpu, 0xE12F_FF13); // BX r3

        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.registers.program_counter(), 0x0300_0100);
    }

    #[test]
    fn block_transfer_load_increment_after() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(13, 0x0300_1000);
        cpu.bus.write_word(0x0300_1000, 1);
        cpu.bus.write_word(0x0300_1004, 5);
        cpu.bus.write_word(0x0300_1008, 7);

        // LDMIA r13!, {r1, r5, r7}
        execute(&mut cpu, 0xE8BD_00A2);

        assert_eq!(cpu.reg(1), 1);
        assert_eq!(cpu.reg(5), 5);
        assert_eq!(cpu.reg(7), 7);
        assert_eq!(cpu.reg(13), 0x0300_100C);
    }

    #[test]
    fn block_transfer_store_decrement_before() {
        let mut cpu = Arm7tdmi::default();
        for r in 0..8 {
            cpu.registers.set_register_at(r, r as u32);
        }
        cpu.registers.set_register_at(13, 0x0300_1000);

        // STMDB r13!, {r1, r5, r7}
        execute(&mut cpu, 0xE92D_00A2);

        assert_eq!(cpu.bus.read_word(0x0300_0FFC), 7);
        assert_eq!(cpu.bus.read_word(0x0300_0FF8), 5);
        assert_eq!(cpu.bus.read_word(0x0300_0FF4), 1);
        assert_eq!(cpu.reg(13), 0x0300_0FF4);
    }

    #[test]
    fn swap_exchanges_register_and_memory() {
        let mut cpu = Arm7tdmi::default();
        cpu.bus.write_word(0x0300_0020, 0x0BAD_F00D);
        cpu.registers.set_register_at(2, 0x0300_0020);
        cpu.registers.set_register_at(1, 0x1234_5678);

        let start = cpu.cycles;
        execute(&mut cpu, 0xE102_0091); // SWP r0, r1, [r2]

        assert_eq!(cpu.reg(0), 0x0BAD_F00D);
        assert_eq!(cpu.bus.read_word(0x0300_0020), 0x1234_5678);
        assert_eq!(cpu.cycles - start, 4);
    }

    #[test]
    fn halfword_transfers() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(0, 0x0101_0101);
        cpu.registers.set_register_at(1, 0);
        cpu.registers.set_register_at(2, 0x0300_0010);

        // STRH r0, [r2, r1]
        execute(&mut cpu, 0xE182_00B1);
        assert_eq!(cpu.bus.read_word(0x0300_0010), 0x0101);

        // LDRSB r3, [r2]
        cpu.bus.write_byte(0x0300_0010, 0xFB);
        execute(&mut cpu, 0xE1D2_30D0);
        assert_eq!(cpu.reg(3), (-5i32) as u32);

        // LDRSH r4, [r2]
        cpu.bus.write_half_word(0x0300_0010, (-300i16) as u16);
        execute(&mut cpu, 0xE1D2_40F0);
        assert_eq!(cpu.reg(4), (-300i32) as u32);
    }

    #[test]
    fn multiply_cycle_counts() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(1, 7);
        cpu.registers.set_register_at(2, 3);

        let start = cpu.cycles;
        execute(&mut cpu, 0xE000_0291); // MUL r0, r1, r2

        assert_eq!(cpu.reg(0), 21);
        // m = 1 for a small multiplier.
        assert_eq!(cpu.cycles - start, 2);
    }

    #[test]
    fn multiply_long_unsigned() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(2, 0x8000_0000);
        cpu.registers.set_register_at(3, 4);

        execute(&mut cpu, 0xE081_0392); // UMULL r0, r1, r2, r3

        assert_eq!(cpu.reg(0), 0);
        assert_eq!(cpu.reg(1), 2);
    }

    #[test]
    fn msr_switches_bank() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(13, 0xAAAA);

        // MSR CPSR_c, #0x12 (IRQ mode)
        execute(&mut cpu, 0xE321_F012);

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(cpu.reg(13), 0);

        // MRS r0, CPSR
        execute(&mut cpu, 0xE10F_0000);
        assert_eq!(cpu.reg(0) & 0x1F, 0x12);
    }

    #[test]
    fn shifter_carry_feeds_flags() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_register_at(1, 0x8000_0000);

        // MOVS r0, r1, LSL #1 -> carry out of bit 31.
        execute(&mut cpu, 0xE1B0_0081);
        assert_eq!(cpu.reg(0), 0);
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
    }
}
