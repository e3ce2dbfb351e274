use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, ShiftOperator,
};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind, ShiftKind};

/// Offset operand of a single data transfer: either a 12-bit immediate or a
/// register shifted by an immediate amount.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#{offset}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

/// One decoded ARMv2/v3 instruction.
///
/// The decode lives in `From<u32>`; execution lives in
/// [`operations`](super::operations). Coprocessor transfers are decoded so
/// the CPU can log and skip them without treating them as undefined.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        condition: Condition,
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    },
    SingleDataTransfer {
        condition: Condition,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        offset: u32,
    },
    CoprocessorTransfer {
        condition: Condition,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Undefined,
}

impl From<u32> for ArmModeInstruction {
    fn from(op_code: u32) -> Self {
        use ArmModeInstruction::*;

        let condition = Condition::from(op_code.get_bits(28..=31) as u8);
        // NOTE: the order matters. The multiply pattern collides with data
        // processing on bits 27:26 and must win; SWI shadows the 111x
        // coprocessor space.
        if op_code.get_bits(22..=27) == 0b000000 && op_code.get_bits(4..=7) == 0b1001 {
            Multiply {
                condition,
                accumulate: op_code.get_bit(21),
                set_conditions: op_code.get_bit(20),
                rd: op_code.get_bits(16..=19),
                rn: op_code.get_bits(12..=15),
                rs: op_code.get_bits(8..=11),
                rm: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(24..=27) == 0b1111 {
            SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            }
        } else if op_code.get_bits(26..=27) == 0b11 {
            CoprocessorTransfer { condition }
        } else if op_code.get_bits(25..=27) == 0b101 {
            let link = op_code.get_bit(24);
            let offset = op_code.get_bits(0..=23) << 2;
            Branch {
                condition,
                link,
                offset,
            }
        } else if op_code.get_bits(25..=27) == 0b100 {
            let indexing = op_code.get_bit(24).into();
            let offsetting = op_code.get_bit(23).into();
            let load_psr = op_code.get_bit(22);
            let write_back = op_code.get_bit(21);
            let load_store = op_code.get_bit(20).into();
            let rn = op_code.get_bits(16..=19);
            let register_list = op_code.get_bits(0..=15);

            BlockDataTransfer {
                condition,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            }
        } else if op_code.get_bits(26..=27) == 0b01 {
            // NOTE: this bit is negated compared to data processing: I=0
            // means immediate offset here.
            let op_kind: OperandKind = (!op_code.get_bit(25)).into();
            let indexing: Indexing = op_code.get_bit(24).into();
            let offsetting: Offsetting = op_code.get_bit(23).into();
            let quantity: ReadWriteKind = op_code.get_bit(22).into();
            let write_back = op_code.get_bit(21);
            let kind: LoadStoreKind = op_code.get_bit(20).into();
            let rn = op_code.get_bits(16..=19);
            let rd = op_code.get_bits(12..=15);

            let offset_info = match op_kind {
                OperandKind::Immediate => {
                    let offset = op_code.get_bits(0..=11);
                    SingleDataTransferOffsetInfo::Immediate { offset }
                }
                OperandKind::Register => {
                    let shift_amount = op_code.get_bits(7..=11);
                    let shift_kind: ShiftKind = op_code.get_bits(5..=6).into();
                    let reg_offset = op_code.get_bits(0..=3);
                    SingleDataTransferOffsetInfo::RegisterImmediate {
                        shift_amount,
                        shift_kind,
                        reg_offset,
                    }
                }
            };

            SingleDataTransfer {
                condition,
                kind,
                quantity,
                write_back,
                indexing,
                offsetting,
                rd,
                base_register: rn,
                offset_info,
            }
        } else if op_code.get_bits(26..=27) == 0b00 {
            let alu_instruction = op_code.get_bits(21..=24).into();
            let set_conditions = op_code.get_bit(20);
            let rn = op_code.get_bits(16..=19);
            let op_kind: OperandKind = op_code.get_bit(25).into();
            let rd = op_code.get_bits(12..=15);

            let op2 = match op_kind {
                OperandKind::Immediate => {
                    let shift = op_code.get_bits(8..=11) * 2;
                    let base = op_code.get_bits(0..=7);
                    AluSecondOperandInfo::Immediate { base, shift }
                }
                OperandKind::Register => {
                    let shift_kind: ShiftKind = op_code.get_bits(5..=6).into();
                    let register = op_code.get_bits(0..=3);
                    let shift_op = if op_code.get_bit(4) {
                        ShiftOperator::Register(op_code.get_bits(8..=11))
                    } else {
                        ShiftOperator::Immediate(op_code.get_bits(7..=11))
                    };
                    AluSecondOperandInfo::Register {
                        shift_op,
                        shift_kind,
                        register,
                    }
                }
            };

            DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                op_kind,
                rn,
                destination: rd,
                op2,
            }
        } else {
            Undefined
        }
    }
}

impl ArmModeInstruction {
    pub const fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::Multiply { condition, .. }
            | Self::SingleDataTransfer { condition, .. }
            | Self::BlockDataTransfer { condition, .. }
            | Self::Branch { condition, .. }
            | Self::CoprocessorTransfer { condition }
            | Self::SoftwareInterrupt { condition, .. } => *condition,
            Self::Undefined => Condition::AL,
        }
    }

    pub(crate) fn disassembler(&self) -> String {
        match self {
            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                op_kind: _,
                rn,
                destination,
                op2,
            } => {
                let set_string = if *set_conditions { "S" } else { "" };
                use ArmModeAluInstruction::*;
                match alu_instruction {
                    And | Eor | Sub | Rsb | Add | Adc | Sbc | Rsc | Orr | Bic => {
                        format!(
                            "{alu_instruction}{condition}{set_string} R{destination}, R{rn}, {op2}"
                        )
                    }
                    Tst | Teq | Cmp | Cmn => {
                        format!("{alu_instruction}{condition} R{rn}, {op2}")
                    }
                    Mov | Mvn => {
                        format!("{alu_instruction}{condition}{set_string} R{destination}, {op2}")
                    }
                }
            }
            Self::Multiply {
                condition,
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                let set_string = if *set_conditions { "S" } else { "" };
                if *accumulate {
                    format!("MLA{condition}{set_string} R{rd}, R{rm}, R{rs}, R{rn}")
                } else {
                    format!("MUL{condition}{set_string} R{rd}, R{rm}, R{rs}")
                }
            }
            Self::SingleDataTransfer {
                condition,
                kind,
                quantity,
                write_back: _,
                indexing,
                offsetting,
                rd,
                base_register,
                offset_info,
            } => {
                let b = match quantity {
                    ReadWriteKind::Word => "",
                    ReadWriteKind::Byte => "B",
                };
                let sign = match offsetting {
                    Offsetting::Up => "+",
                    Offsetting::Down => "-",
                };
                let address = match indexing {
                    Indexing::Pre => format!("[R{base_register}, {sign}{offset_info}]"),
                    Indexing::Post => format!("[R{base_register}], {sign}{offset_info}"),
                };
                format!("{kind}{condition}{b} R{rd}, {address}")
            }
            Self::BlockDataTransfer {
                condition,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STM",
                    LoadStoreKind::Load => "LDM",
                };
                let offset_modifier = match offsetting {
                    Offsetting::Down => "D",
                    Offsetting::Up => "I",
                };
                let index_type = match indexing {
                    Indexing::Pre => "B",
                    Indexing::Post => "A",
                };
                let wb = if *write_back { "!" } else { "" };
                let psr = if *load_psr { "^" } else { "" };
                format!(
                    "{op}{condition}{offset_modifier}{index_type} R{rn}{wb}, {{{register_list:#06X}}}{psr}"
                )
            }
            Self::Branch {
                condition,
                link,
                offset,
            } => {
                let link = if *link { "L" } else { "" };
                // The raw 26-bit offset, before sign extension and prefetch
                // adjustment.
                format!("B{link}{condition} {offset:#010X}")
            }
            Self::CoprocessorTransfer { condition } => format!("CDP{condition}"),
            Self::SoftwareInterrupt { condition, comment } => {
                format!("SWI{condition} {comment:#08X}")
            }
            Self::Undefined => "UNDEFINED".to_string(),
        }
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let output = ArmModeInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: true,
                offset: 508,
            },
            output
        );
        assert_eq!("BL 0x000001FC", output.disassembler());

        let output = ArmModeInstruction::from(0b0000_1010_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::EQ,
                link: false,
                offset: 508,
            },
            output
        );
        assert_eq!("BEQ 0x000001FC", output.disassembler());
    }

    #[test]
    fn decode_data_processing() {
        // MOV R0, #5
        let output = ArmModeInstruction::from(0xE3A0_0005);
        assert_eq!(
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Mov,
                set_conditions: false,
                op_kind: OperandKind::Immediate,
                rn: 0,
                destination: 0,
                op2: AluSecondOperandInfo::Immediate { base: 5, shift: 0 },
            },
            output
        );
        assert_eq!("MOV R0, #5", output.disassembler());

        // SUBS R0, R0, #1
        let output = ArmModeInstruction::from(0xE250_0001);
        assert_eq!(
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Sub,
                set_conditions: true,
                op_kind: OperandKind::Immediate,
                rn: 0,
                destination: 0,
                op2: AluSecondOperandInfo::Immediate { base: 1, shift: 0 },
            },
            output
        );
        assert_eq!("SUBS R0, R0, #1", output.disassembler());
    }

    #[test]
    fn decode_multiply() {
        // MUL R2, R0, R1 -> cond 1110, 000000AS, rd=2, rn=0, rs=1, 1001, rm=0
        let output = ArmModeInstruction::from(0b1110_0000_0000_0010_0000_0001_1001_0000);
        assert_eq!(
            ArmModeInstruction::Multiply {
                condition: Condition::AL,
                accumulate: false,
                set_conditions: false,
                rd: 2,
                rn: 0,
                rs: 1,
                rm: 0,
            },
            output
        );

        // MLAS R4, R3, R2, R1
        let output = ArmModeInstruction::from(0b1110_0000_0011_0100_0001_0010_1001_0011);
        assert_eq!(
            ArmModeInstruction::Multiply {
                condition: Condition::AL,
                accumulate: true,
                set_conditions: true,
                rd: 4,
                rn: 1,
                rs: 2,
                rm: 3,
            },
            output
        );
    }

    #[test]
    fn decode_single_data_transfer() {
        // STR R1, [R0]
        let output = ArmModeInstruction::from(0xE580_1000);
        assert_eq!(
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                kind: LoadStoreKind::Store,
                quantity: ReadWriteKind::Word,
                write_back: false,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                rd: 1,
                base_register: 0,
                offset_info: SingleDataTransferOffsetInfo::Immediate { offset: 0 },
            },
            output
        );

        // LDRB R2, [R0], #-4
        let output = ArmModeInstruction::from(0xE450_2004);
        assert_eq!(
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                kind: LoadStoreKind::Load,
                quantity: ReadWriteKind::Byte,
                write_back: false,
                indexing: Indexing::Post,
                offsetting: Offsetting::Down,
                rd: 2,
                base_register: 0,
                offset_info: SingleDataTransferOffsetInfo::Immediate { offset: 4 },
            },
            output
        );
    }

    #[test]
    fn decode_block_data_transfer() {
        // LDMIA R13!, {R0, R1, R6}
        let output = ArmModeInstruction::from(0xE8BD_0043);
        assert_eq!(
            ArmModeInstruction::BlockDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Post,
                offsetting: Offsetting::Up,
                load_psr: false,
                write_back: true,
                load_store: LoadStoreKind::Load,
                rn: 13,
                register_list: 0x43,
            },
            output
        );
    }

    #[test]
    fn decode_software_interrupt() {
        let output = ArmModeInstruction::from(0xEF00_0010);
        assert_eq!(
            ArmModeInstruction::SoftwareInterrupt {
                condition: Condition::AL,
                comment: 0x10,
            },
            output
        );
    }

    #[test]
    fn decode_coprocessor_transfer() {
        // MCR p15, ...
        let output = ArmModeInstruction::from(0xEE01_0F10);
        assert_eq!(
            ArmModeInstruction::CoprocessorTransfer {
                condition: Condition::AL
            },
            output
        );
    }

    #[test]
    fn multiply_wins_over_data_processing() {
        // Bits 27:26 are 00 for both; bits 7:4 = 1001 picks multiply.
        let output = ArmModeInstruction::from(0b1110_0000_0000_0010_0000_0001_1001_0000);
        assert!(matches!(output, ArmModeInstruction::Multiply { .. }));
    }
}
