//! # Banked Registers for Exception Modes
//!
//! When the CPU switches modes (e.g. from User to IRQ because an IOC timer
//! fired), specific registers are swapped out for private copies. Without
//! banking, an interrupt handler would corrupt the interrupted program's
//! stack pointer and return address.
//!
//! ```text
//! ┌───────────┬────────────────────────────────────────────────────────┐
//! │ Registers │ Banking behavior                                       │
//! ├───────────┼────────────────────────────────────────────────────────┤
//! │ R0 - R7   │ Never banked.                                          │
//! │ R8 - R12  │ Banked only in FIQ mode (why FIQ is "fast": the        │
//! │           │ handler gets five scratch registers for free).         │
//! │ R13 (SP)  │ Banked in FIQ, IRQ and Supervisor modes.               │
//! │ R14 (LR)  │ Banked in FIQ, IRQ and Supervisor modes.               │
//! │ R15 (PC)  │ Never banked.                                          │
//! │ SPSR      │ One per exception mode; captures CPSR on entry.        │
//! │           │ User mode has none.                                    │
//! └───────────┴────────────────────────────────────────────────────────┘
//! ```
//!
//! `Arm3::swap_mode` moves values between the live register file and this
//! bank on every mode transition; nothing else touches the bank directly
//! except the S-bit forms of LDM/STM, which read and write the User copies.

use crate::cpu::psr::Psr;

/// Storage for banked registers across all CPU modes.
#[derive(Default)]
pub struct RegisterBank {
    // User mode R8-R14 saved here while another bank is live
    /// R8 value when in FIQ mode (saved when entering FIQ).
    pub r8_old: u32,
    /// R9 value when in FIQ mode.
    pub r9_old: u32,
    /// R10 value when in FIQ mode.
    pub r10_old: u32,
    /// R11 value when in FIQ mode.
    pub r11_old: u32,
    /// R12 value when in FIQ mode.
    pub r12_old: u32,
    /// R13 (SP) value when in any exception mode.
    pub r13_old: u32,
    /// R14 (LR) value when in any exception mode.
    pub r14_old: u32,

    // FIQ mode banked registers
    /// R8 for FIQ mode.
    pub r8_fiq: u32,
    /// R9 for FIQ mode.
    pub r9_fiq: u32,
    /// R10 for FIQ mode.
    pub r10_fiq: u32,
    /// R11 for FIQ mode.
    pub r11_fiq: u32,
    /// R12 for FIQ mode.
    pub r12_fiq: u32,
    /// R13 (SP) for FIQ mode.
    pub r13_fiq: u32,
    /// R14 (LR) for FIQ mode.
    pub r14_fiq: u32,

    // Supervisor mode banked registers
    /// R13 (SP) for Supervisor mode (SWI handler stack).
    pub r13_svc: u32,
    /// R14 (LR) for Supervisor mode (return address from SWI).
    pub r14_svc: u32,

    // IRQ mode banked registers
    /// R13 (SP) for IRQ mode (interrupt handler stack).
    pub r13_irq: u32,
    /// R14 (LR) for IRQ mode (return address from interrupt).
    pub r14_irq: u32,

    // Saved Program Status Registers (one per exception mode)
    /// SPSR for FIQ mode (saves CPSR when FIQ occurs).
    pub spsr_fiq: Psr,
    /// SPSR for Supervisor mode (saves CPSR when SWI or reset occurs).
    pub spsr_svc: Psr,
    /// SPSR for IRQ mode (saves CPSR when IRQ occurs).
    pub spsr_irq: Psr,
}
