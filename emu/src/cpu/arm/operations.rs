use crate::bitwise::Bits;
use crate::bus::{Bus, ADDR_MASK, PC_MASK};
use crate::cpu::arm::alu_instruction::{
    shift, AluInstructionKind, AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction,
    Kind, ShiftOperator,
};
use crate::cpu::arm::instructions::{ArmModeInstruction, SingleDataTransferOffsetInfo};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm3::{Arm3, Exception};
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use logger::log_debug;

pub const SIZE_OF_INSTRUCTION: u32 = 4;

impl Arm3 {
    pub fn execute_arm(&mut self, bus: &mut Bus, op_code: ArmModeOpcode) {
        if !self.cpsr.can_execute(op_code.condition) {
            return;
        }

        match op_code.instruction {
            ArmModeInstruction::DataProcessing {
                condition: _,
                alu_instruction,
                set_conditions,
                op_kind: _,
                rn,
                destination,
                op2,
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            ArmModeInstruction::Multiply {
                condition: _,
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(accumulate, set_conditions, rd, rn, rs, rm),
            ArmModeInstruction::SingleDataTransfer {
                condition: _,
                kind,
                quantity,
                write_back,
                indexing,
                offsetting,
                rd,
                base_register,
                offset_info,
            } => self.single_data_transfer(
                bus,
                kind,
                quantity,
                write_back,
                indexing,
                offsetting,
                rd,
                base_register,
                offset_info,
            ),
            ArmModeInstruction::BlockDataTransfer {
                condition: _,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                bus,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch {
                condition: _,
                link,
                offset,
            } => self.branch(link, offset),
            ArmModeInstruction::CoprocessorTransfer { condition: _ } => {
                log_debug(format!(
                    "coprocessor transfer not implemented, skipping {:#010X}",
                    op_code.raw
                ));
            }
            ArmModeInstruction::SoftwareInterrupt {
                condition: _,
                comment,
            } => self.software_interrupt(comment),
            ArmModeInstruction::Undefined => {
                log_debug(format!(
                    "undefined instruction {:#010X}, skipping",
                    op_code.raw
                ));
            }
        }
    }

    /// Value of a register named as an instruction operand. R15 reads as the
    /// current instruction's address + 8 because of prefetch; PC already
    /// points one instruction ahead when we execute, so that is PC + 4.
    pub(crate) fn register_operand(&self, reg: u32) -> u32 {
        if reg == REG_PROGRAM_COUNTER {
            (self.registers.program_counter() as u32).wrapping_add(SIZE_OF_INSTRUCTION)
        } else {
            self.registers.register_at(reg.try_into().unwrap())
        }
    }

    pub fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) {
        let op1 = self.register_operand(rn);
        let op2 = self.get_operand(alu_instruction, set_conditions, op2);

        use ArmModeAluInstruction::*;
        let rd = destination.try_into().unwrap();
        match alu_instruction {
            And => self.and(rd, op1, op2, set_conditions),
            Eor => self.eor(rd, op1, op2, set_conditions),
            Sub => self.sub(rd, op1, op2, set_conditions),
            Rsb => self.rsb(rd, op1, op2, set_conditions),
            Add => self.add(rd, op1, op2, set_conditions),
            Adc => self.adc(rd, op1, op2, set_conditions),
            Sbc => self.sbc(rd, op1, op2, set_conditions),
            Rsc => self.rsc(rd, op1, op2, set_conditions),
            Tst => self.tst(op1, op2),
            Teq => self.teq(op1, op2),
            Cmp => self.cmp(op1, op2),
            Cmn => self.cmn(op1, op2),
            Orr => self.orr(rd, op1, op2, set_conditions),
            Mov => self.mov(rd, op2, set_conditions),
            Bic => self.bic(rd, op1, op2, set_conditions),
            Mvn => self.mvn(rd, op2, set_conditions),
        };

        // Test instructions never write Rd, so they take neither branch below.
        if matches!(alu_instruction, Tst | Teq | Cmp | Cmn) {
            return;
        }

        if destination == REG_PROGRAM_COUNTER {
            // The 26-bit "R15 writes PSR" quirk: with S set, writing PC also
            // restores CPSR from the current mode's SPSR (exception return).
            if set_conditions {
                self.restore_spsr();
            }
            let pc = self.registers.program_counter() as u32 & PC_MASK;
            self.registers.set_program_counter(pc);
        }
    }

    /// Resolves the second operand of a data processing instruction.
    ///
    /// A rotated immediate updates the shifter carry from bit 31 of the
    /// result when the rotation is non-zero; a register shifted by a
    /// register amount of zero is passed through untouched, carry included.
    pub fn get_operand(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        s: bool,
        op2: AluSecondOperandInfo,
    ) -> u32 {
        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                let result = base.rotate_right(shift);
                if shift != 0 && s && alu_instruction.kind() == AluInstructionKind::Logical {
                    self.cpsr.set_carry_flag(result.get_bit(31));
                }
                result
            }
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                let rm = self.register_operand(register);

                let shift_amount = match shift_op {
                    ShiftOperator::Immediate(amount) => amount,
                    ShiftOperator::Register(rs) => {
                        // Only the bottom byte of Rs is used; a value of 0
                        // leaves Rm and the carry flag alone.
                        let amount =
                            self.registers.register_at(rs.try_into().unwrap()) & 0xFF;
                        if amount == 0 {
                            return rm;
                        }
                        amount
                    }
                };

                self.shift_operand(alu_instruction, s, shift_kind, shift_amount, rm)
            }
        }
    }

    pub fn shift_operand(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        s: bool,
        shift_kind: crate::cpu::flags::ShiftKind,
        shift_amount: u32,
        rm: u32,
    ) -> u32 {
        let result = shift(shift_kind, shift_amount, rm, self.cpsr.carry_flag());

        // If the instruction is a logical ALU instruction and S is set we set the carry flag
        if alu_instruction.kind() == AluInstructionKind::Logical && s {
            self.cpsr.set_carry_flag(result.carry);
        }

        result.result
    }

    pub fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        // we do the sum in 64bits so that the 33rd bit is the carry
        let result_and_carry = (first_op as u64).wrapping_add(second_op as u64);
        let result = result_and_carry as u32;

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        let carry = (result_and_carry & 0x1_0000_0000) != 0;

        // overflow only occurs when operands have the same sign and result has the opposite one
        let same_sign = sign_op1 == sign_op2;

        ArithmeticOpResult {
            result,
            carry,
            overflow: same_sign && (sign_op1 != sign_r),
            sign: sign_r,
            zero: result == 0,
        }
    }

    pub fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let result = first_op.wrapping_sub(second_op);

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        let different_sign = sign_op1 != sign_op2;

        ArithmeticOpResult {
            result,
            // C is NOT-borrow for the SUB family
            carry: first_op >= second_op,
            overflow: different_sign && sign_op2 == sign_r,
            sign: sign_r,
            zero: result == 0,
        }
    }

    pub fn and(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & op2;

        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn eor(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn ^ op2;

        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    fn sub(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let sub_result = Self::sub_inner_op(rn, op2);

        self.registers.set_register_at(rd, sub_result.result);

        if s {
            self.cpsr.set_flags(&sub_result);
        }
    }

    fn rsb(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        self.sub(rd, op2, rn, s);
    }

    fn add(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let add_result = Self::add_inner_op(rn, op2);

        self.registers.set_register_at(rd, add_result.result);

        if s {
            self.cpsr.set_flags(&add_result);
        }
    }

    fn adc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let carry = self.cpsr.carry_flag() as u32;

        let wide = (rn as u64) + (op2 as u64) + (carry as u64);
        let result = wide as u32;

        let op_result = ArithmeticOpResult {
            result,
            carry: wide > u32::MAX as u64,
            overflow: (!(rn ^ op2) & (rn ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        };

        self.registers.set_register_at(rd, op_result.result);

        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn sbc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let borrow = !self.cpsr.carry_flag() as u32;

        let result = rn.wrapping_sub(op2).wrapping_sub(borrow);

        let op_result = ArithmeticOpResult {
            result,
            // C is NOT-borrow: set when no borrow was needed
            carry: (rn as u64) >= (op2 as u64) + (borrow as u64),
            overflow: ((rn ^ op2) & (rn ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        };

        self.registers.set_register_at(rd, op_result.result);

        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn rsc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        self.sbc(rd, op2, rn, s);
    }

    pub fn tst(&mut self, rn: u32, op2: u32) {
        let value = rn & op2;

        self.cpsr.set_sign_flag(value.get_bit(31));
        self.cpsr.set_zero_flag(value == 0);
    }

    fn teq(&mut self, rn: u32, op2: u32) {
        let value = rn ^ op2;

        self.cpsr.set_sign_flag(value.get_bit(31));
        self.cpsr.set_zero_flag(value == 0);
    }

    pub fn cmp(&mut self, rn: u32, op2: u32) {
        let sub_result = Self::sub_inner_op(rn, op2);

        self.cpsr.set_flags(&sub_result);
    }

    fn cmn(&mut self, rn: u32, op2: u32) {
        let add_result = Self::add_inner_op(rn, op2);

        self.cpsr.set_flags(&add_result);
    }

    pub fn orr(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn | op2;

        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    fn mov(&mut self, rd: usize, op2: u32, s: bool) {
        self.registers.set_register_at(rd, op2);

        if s {
            self.cpsr.set_zero_flag(op2 == 0);
            self.cpsr.set_sign_flag(op2.get_bit(31));
        }
    }

    fn bic(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & !op2;

        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    pub fn mvn(&mut self, rd: usize, op2: u32, s: bool) {
        let result = !op2;

        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    /// `Rd = Rm * Rs` (plus `Rn` for MLA), modulo 2^32.
    ///
    /// S updates only N and Z; C and V are architecturally unpredictable
    /// after a multiply and this core leaves them unchanged.
    pub fn multiply(
        &mut self,
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm_value = self.registers.register_at(rm.try_into().unwrap());
        let rs_value = self.registers.register_at(rs.try_into().unwrap());

        let mut result = rm_value.wrapping_mul(rs_value);
        if accumulate {
            result = result.wrapping_add(self.registers.register_at(rn.try_into().unwrap()));
        }

        self.registers.set_register_at(rd.try_into().unwrap(), result);

        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    /// Branch (with optional link): sign-extend the shifted 24-bit offset
    /// and add it to the fetch address + 8. BL saves the address of the
    /// following instruction into R14 first.
    pub fn branch(&mut self, link: bool, offset: u32) {
        // `offset` is already shifted left by two at decode, so 26
        // significant bits remain.
        let offset = offset.sign_extended(26);
        let pc = self.registers.program_counter() as u32;

        if link {
            // PC points at the next instruction already.
            self.registers.set_register_at(REG_LR, pc);
        }

        let destination = pc
            .wrapping_add(SIZE_OF_INSTRUCTION)
            .wrapping_add(offset)
            & ADDR_MASK;
        self.registers.set_program_counter(destination);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn single_data_transfer(
        &mut self,
        bus: &mut Bus,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
    ) {
        let base = self.register_operand(base_register);

        let amount = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                // The shifter runs but C is not affected by LDR/STR.
                let value = self.register_operand(reg_offset);
                shift(shift_kind, shift_amount, value, self.cpsr.carry_flag()).result
            }
        };

        let offset_address = match offsetting {
            Offsetting::Down => base.wrapping_sub(amount),
            Offsetting::Up => base.wrapping_add(amount),
        };

        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        match kind {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => bus.read_word(address),
                    // Byte loads zero-extend.
                    ReadWriteKind::Byte => bus.read_byte(address).into(),
                };
                let value = if rd == REG_PROGRAM_COUNTER {
                    value & PC_MASK
                } else {
                    value
                };
                self.registers.set_register_at(rd.try_into().unwrap(), value);
            }
            LoadStoreKind::Store => {
                let value = self.register_operand(rd);
                match quantity {
                    ReadWriteKind::Word => bus.write_word(address, value),
                    ReadWriteKind::Byte => bus.write_byte(address, value as u8),
                }
            }
        }

        // Post-indexed forms always write back, regardless of W.
        if indexing == Indexing::Post || write_back {
            self.registers
                .set_register_at(base_register.try_into().unwrap(), offset_address);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn block_data_transfer(
        &mut self,
        bus: &mut Bus,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    ) {
        let base = self.registers.register_at(rn.try_into().unwrap());
        let count = register_list.count_ones();

        // Lowest register always goes to the lowest address: start from the
        // bottom edge of the transferred block and walk upwards.
        let mut address = match offsetting {
            Offsetting::Up => base,
            Offsetting::Down => base.wrapping_sub(count * 4),
        };
        match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Pre) | (Offsetting::Down, Indexing::Post) => {
                address = address.wrapping_add(4);
            }
            _ => {}
        }

        // S without R15 in an LDM (or any STM) transfers the User bank
        // instead of the current mode's registers.
        let pc_in_list = register_list.get_bit(15);
        let user_bank =
            load_psr && !(load_store == LoadStoreKind::Load && pc_in_list);

        for r in 0..16u8 {
            if !register_list.get_bit(r) {
                continue;
            }

            match load_store {
                LoadStoreKind::Load => {
                    let value = bus.read_word(address);
                    if user_bank {
                        self.set_user_register_at(r.into(), value);
                    } else if u32::from(r) == REG_PROGRAM_COUNTER {
                        self.registers.set_program_counter(value & PC_MASK);
                    } else {
                        self.registers.set_register_at(r.into(), value);
                    }
                }
                LoadStoreKind::Store => {
                    let value = if u32::from(r) == REG_PROGRAM_COUNTER {
                        self.register_operand(REG_PROGRAM_COUNTER)
                    } else if user_bank {
                        self.user_register_at(r.into())
                    } else {
                        self.registers.register_at(r.into())
                    };
                    bus.write_word(address, value);
                }
            }

            address = address.wrapping_add(4);
        }

        if write_back {
            let new_base = match offsetting {
                Offsetting::Up => base.wrapping_add(count * 4),
                Offsetting::Down => base.wrapping_sub(count * 4),
            };
            self.registers
                .set_register_at(rn.try_into().unwrap(), new_base);
        }

        if load_store == LoadStoreKind::Load && load_psr && pc_in_list {
            self.restore_spsr();
        }
    }

    /// SWI: save CPSR into `SPSR_svc`, the return address into `R14_svc`,
    /// switch to Supervisor with IRQs disabled and branch to vector 0x08.
    pub fn software_interrupt(&mut self, comment: u32) {
        log_debug(format!("SWI {comment:#08X}"));
        self.enter_exception(Exception::SoftwareInterrupt);
    }
}
