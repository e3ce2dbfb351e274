use logger::{log, log_debug};

use crate::bus::{Bus, ADDR_MASK, INVALID_READ, PC_MASK};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm::operations::SIZE_OF_INSTRUCTION;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{Registers, REG_LR};

/// Exceptions this core can take, with their vector addresses.
///
/// Undefined instructions and aborts never raise an exception here: the
/// step loop logs and skips them instead (a sentinel fetch halts the frame,
/// it does not vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    SoftwareInterrupt,
    Irq,
    Fiq,
}

impl Exception {
    pub const fn vector(self) -> u32 {
        match self {
            Self::SoftwareInterrupt => 0x0000_0008,
            Self::Irq => 0x0000_0018,
            Self::Fiq => 0x0000_001C,
        }
    }

    pub const fn mode(self) -> Mode {
        match self {
            Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Irq => Mode::Irq,
            Self::Fiq => Mode::Fiq,
        }
    }

    /// What gets added to the current PC to form the banked R14.
    ///
    /// For SWI the PC has already advanced past the instruction, so R14 is
    /// the PC itself; for IRQ/FIQ the PC still points at the instruction
    /// that would have executed and R14 is PC + 4 (return via
    /// `SUBS PC, LR, #4`).
    const fn link_offset(self) -> u32 {
        match self {
            Self::SoftwareInterrupt => 0,
            Self::Irq | Self::Fiq => 4,
        }
    }
}

/// The ARMv2/v3 integer core of the Archimedes.
///
/// PC and PSR live in separate fields even though the real 26-bit machine
/// packs both into R15; they are folded together only by the instructions
/// that name R15 explicitly. The bus is not owned: `step` borrows it for
/// the duration of one instruction retirement.
pub struct Arm3 {
    pub registers: Registers,
    pub cpsr: Psr,
    /// SPSR of the current mode. Swapped with the bank on mode changes.
    pub spsr: Psr,
    pub register_bank: RegisterBank,

    /// Cleared when a fetch returns the invalid-read sentinel. The frame
    /// loop stops stepping until the next reset.
    pub running: bool,
}

impl Default for Arm3 {
    fn default() -> Self {
        let mut s = Self {
            registers: Registers::default(),
            cpsr: Psr::from(Mode::Supervisor),
            spsr: Psr::default(),
            register_bank: RegisterBank::default(),
            running: true,
        };

        // Interrupts are off until the OS unmasks them.
        s.cpsr.set_irq_disable(true);
        s.cpsr.set_fiq_disable(true);

        s
    }
}

impl Arm3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts the CPU back into its power-on state: all registers zero,
    /// PC at the reset vector, Supervisor mode with IRQ and FIQ masked.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.register_bank = RegisterBank::default();
        self.cpsr = Psr::from(Mode::Supervisor);
        self.cpsr.set_irq_disable(true);
        self.cpsr.set_fiq_disable(true);
        self.spsr = Psr::default();
        self.running = true;

        log("CPU reset: PC = 0x00000000");
    }

    /// One instruction retirement.
    ///
    /// Pending interrupts are sampled first (FIQ before IRQ); taking one
    /// consumes the step. Otherwise: fetch at the word-aligned PC, advance
    /// PC by 4, test the condition field, execute. A fetch that returns
    /// the bus sentinel halts the CPU for the rest of the frame.
    pub fn step(&mut self, bus: &mut Bus) {
        if bus.ioc.fiq_pending && !self.cpsr.fiq_disable() {
            self.enter_exception(Exception::Fiq);
            return;
        }
        if bus.ioc.irq_pending && !self.cpsr.irq_disable() {
            self.enter_exception(Exception::Irq);
            return;
        }

        let fetch_pc = self.registers.program_counter() as u32 & PC_MASK;
        let instruction = bus.read_word(fetch_pc);
        if instruction == INVALID_READ {
            log(format!("invalid fetch at {fetch_pc:#010X}, halting"));
            self.running = false;
            return;
        }

        self.registers
            .set_program_counter(fetch_pc.wrapping_add(SIZE_OF_INSTRUCTION));

        let op_code = ArmModeOpcode::from(instruction);
        log_debug(format!("{fetch_pc:#010X}: {op_code}"));

        self.execute_arm(bus, op_code);
    }

    /// Exception entry: bank-switch to the target mode, capture the old
    /// CPSR in that mode's SPSR, stash the return address in the banked
    /// R14, mask the interrupt class, and jump to the vector.
    pub fn enter_exception(&mut self, exception: Exception) {
        let old_cpsr = self.cpsr;
        let return_address =
            (self.registers.program_counter() as u32).wrapping_add(exception.link_offset());

        self.swap_mode(exception.mode());
        self.spsr = old_cpsr;
        self.registers.set_register_at(REG_LR, return_address);

        self.cpsr.set_irq_disable(true);
        if exception == Exception::Fiq {
            self.cpsr.set_fiq_disable(true);
        }

        self.registers
            .set_program_counter(exception.vector() & ADDR_MASK);
    }

    /// Exception return: restore CPSR (and the register bank of the mode
    /// it names) from the current mode's SPSR.
    pub(crate) fn restore_spsr(&mut self) {
        let saved = self.spsr;
        self.swap_mode(saved.mode());
        self.cpsr = saved;
    }

    pub fn swap_mode(&mut self, new_mode: Mode) {
        if self.cpsr.mode() == new_mode {
            return;
        }

        match self.cpsr.mode() {
            // If we leave Fiq we store r8-14 and spsr.
            // We should also restore r8-r12 since other modes do not have them banked
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
                self.registers
                    .set_register_at(10, self.register_bank.r10_old);
                self.registers
                    .set_register_at(11, self.register_bank.r11_old);
                self.registers
                    .set_register_at(12, self.register_bank.r12_old);
            }
            // If we leave User we store r13-14
            Mode::User => {
                self.register_bank.r13_old = self.registers.register_at(13);
                self.register_bank.r14_old = self.registers.register_at(14);
            }
            // Otherwise we store r13-14 and spsr
            Mode::Supervisor => {
                self.register_bank.r13_svc = self.registers.register_at(13);
                self.register_bank.r14_svc = self.registers.register_at(14);
                self.register_bank.spsr_svc = self.spsr;
            }
            Mode::Irq => {
                self.register_bank.r13_irq = self.registers.register_at(13);
                self.register_bank.r14_irq = self.registers.register_at(14);
                self.register_bank.spsr_irq = self.spsr;
            }
        }

        match new_mode {
            // If we enter Fiq we restore r8-14 and spsr.
            // We should also store r8-12 otherwise we lose them.
            Mode::Fiq => {
                self.register_bank.r8_old = self.registers.register_at(8);
                self.register_bank.r9_old = self.registers.register_at(9);
                self.register_bank.r10_old = self.registers.register_at(10);
                self.register_bank.r11_old = self.registers.register_at(11);
                self.register_bank.r12_old = self.registers.register_at(12);

                self.registers.set_register_at(8, self.register_bank.r8_fiq);
                self.registers.set_register_at(9, self.register_bank.r9_fiq);
                self.registers
                    .set_register_at(10, self.register_bank.r10_fiq);
                self.registers
                    .set_register_at(11, self.register_bank.r11_fiq);
                self.registers
                    .set_register_at(12, self.register_bank.r12_fiq);
                self.registers
                    .set_register_at(13, self.register_bank.r13_fiq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_fiq);

                self.spsr = self.register_bank.spsr_fiq;
            }
            // If we enter User we restore r13-14
            Mode::User => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_old);
                self.registers
                    .set_register_at(14, self.register_bank.r14_old);
            }
            // Otherwise we restore r13-14 and spsr
            Mode::Supervisor => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_svc);
                self.registers
                    .set_register_at(14, self.register_bank.r14_svc);
                self.spsr = self.register_bank.spsr_svc;
            }
            Mode::Irq => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_irq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_irq);
                self.spsr = self.register_bank.spsr_irq;
            }
        }

        self.cpsr.set_mode(new_mode);
    }

    /// Reads the User-bank copy of a register, for the S-bit forms of
    /// LDM/STM executed from an exception mode.
    pub(crate) fn user_register_at(&self, reg: usize) -> u32 {
        if self.cpsr.mode() == Mode::User {
            return self.registers.register_at(reg);
        }

        match (self.cpsr.mode(), reg) {
            (Mode::Fiq, 8) => self.register_bank.r8_old,
            (Mode::Fiq, 9) => self.register_bank.r9_old,
            (Mode::Fiq, 10) => self.register_bank.r10_old,
            (Mode::Fiq, 11) => self.register_bank.r11_old,
            (Mode::Fiq, 12) => self.register_bank.r12_old,
            (_, 13) => self.register_bank.r13_old,
            (_, 14) => self.register_bank.r14_old,
            _ => self.registers.register_at(reg),
        }
    }

    pub(crate) fn set_user_register_at(&mut self, reg: usize, value: u32) {
        if self.cpsr.mode() == Mode::User {
            self.registers.set_register_at(reg, value);
            return;
        }

        match (self.cpsr.mode(), reg) {
            (Mode::Fiq, 8) => self.register_bank.r8_old = value,
            (Mode::Fiq, 9) => self.register_bank.r9_old = value,
            (Mode::Fiq, 10) => self.register_bank.r10_old = value,
            (Mode::Fiq, 11) => self.register_bank.r11_old = value,
            (Mode::Fiq, 12) => self.register_bank.r12_old = value,
            (_, 13) => self.register_bank.r13_old = value,
            (_, 14) => self.register_bank.r14_old = value,
            _ => self.registers.set_register_at(reg, value),
        }
    }
}
