//! # CPU Operating Modes
//!
//! The ARMv2/v3 core of the Archimedes runs in one of four operating modes.
//! Which mode is current decides which banked registers are visible and
//! which SPSR an exception saves into.
//!
//! ```text
//! ┌─────────────┬──────────┬──────────────────────────────────────────┐
//! │    Mode     │  Binary  │                 Purpose                  │
//! ├─────────────┼──────────┼──────────────────────────────────────────┤
//! │ User        │  10000   │ Normal program execution (unprivileged)  │
//! │ FIQ         │  10001   │ Fast interrupt handling                  │
//! │ IRQ         │  10010   │ General interrupt handling               │
//! │ Supervisor  │  10011   │ Reset and SWI handling (RISC OS kernel)  │
//! └─────────────┴──────────┴──────────────────────────────────────────┘
//! ```
//!
//! Exception entry points used by this core:
//!
//! | Exception          | Mode       | Vector Address |
//! |--------------------|------------|----------------|
//! | Reset              | Supervisor | 0x00000000     |
//! | Software Interrupt | Supervisor | 0x00000008     |
//! | IRQ                | IRQ        | 0x00000018     |
//! | FIQ                | FIQ        | 0x0000001C     |

/// The CPU operating mode, stored in bits 0-4 of the CPSR/SPSR.
///
/// Each mode determines which banked registers are active and where an
/// exception saves the pre-exception CPSR.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    /// Normal program execution state (unprivileged).
    User = 0b10000,

    /// Fast Interrupt Request mode.
    ///
    /// Has the most banked registers (R8-R14) for minimal context-save
    /// overhead.
    Fiq = 0b10001,

    /// Interrupt Request mode.
    ///
    /// Entered when the IOC raises an unmasked IRQ (VFLY, timers).
    Irq = 0b10010,

    /// Supervisor mode (privileged).
    ///
    /// Entered via Reset or the SWI instruction; RISC OS kernel code runs
    /// here.
    Supervisor = 0b10011,
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            _ => Err(String::from("Unexpected value for Mode")),
        }
    }
}
