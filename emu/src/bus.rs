//! # Bus — 26-bit physical address decoder
//!
//! Every access is masked to 26 bits and resolved against the Archimedes
//! memory map:
//!
//! | Range                     | Region                                    |
//! |---------------------------|-------------------------------------------|
//! | `0x0000000..=0x01FFFFF`   | Boot alias of ROM while `boot_mode` holds |
//! | `0x0000000..=0x0FFFFFF`   | RAM (4-16 MiB, configurable) after boot   |
//! | `0x2000000..=0x21FFFFF`   | ROM alias (always)                        |
//! | `0x3200000..=0x33FFFFF`   | IOC registers                             |
//! | `0x3400000..=0x35FFFFF`   | VIDC registers                            |
//! | `0x3600000..=0x37FFFFF`   | MEMC control (write clears `boot_mode`)   |
//! | `0x3800000..=0x39FFFFF`   | ROM (primary window)                      |
//!
//! At reset the machine fetches from address 0, which the boot alias maps
//! onto the ROM image so the reset vector lands in firmware; the first
//! MEMC control write drops the alias and low memory becomes RAM.
//!
//! Invalid word reads return [`INVALID_READ`]; the CPU treats a fetch of
//! that value as a halt condition. All writes to ROM-backed regions are
//! ignored.

use logger::{log, log_debug};

use crate::bitwise::Bits;
use crate::cpu::hardware::ioc::{Ioc, IRQ_A_VFLY};
use crate::cpu::hardware::vidc::Vidc;

/// 26-bit physical address space.
pub const ADDR_MASK: u32 = 0x03FF_FFFF;

/// Fetch mask: 26 bits, word-aligned.
pub const PC_MASK: u32 = 0x03FF_FFFC;

/// Sentinel returned for invalid word reads.
pub const INVALID_READ: u32 = 0xFFFF_FFFF;

/// Sentinel returned for invalid byte reads (one lane of [`INVALID_READ`]).
pub const INVALID_READ_BYTE: u8 = 0xFF;

pub const RAM_BASE: u32 = 0x0000_0000;
pub const DEFAULT_RAM_SIZE: usize = 8 * 1024 * 1024;

/// End of the boot-time low alias of ROM.
const LOW_ALIAS_END: u32 = 0x0020_0000;

const ROM_ALIAS_BASE: u32 = 0x0200_0000;
const ROM_ALIAS_END: u32 = 0x0220_0000;

pub const IOC_BASE: u32 = 0x0320_0000;
const IOC_END: u32 = 0x0340_0000;

pub const VIDC_BASE: u32 = 0x0340_0000;
const VIDC_END: u32 = 0x0360_0000;

/// The MEMC control latch: the only MEMC state this core models is the
/// boot-mode flag, cleared by any word write into this window.
pub const MEMC_BASE: u32 = 0x0360_0000;
const MEMC_END: u32 = 0x0380_0000;

pub const ROM_DEFAULT_BASE: u32 = 0x0380_0000;
pub const ROM_MAX_SIZE: usize = 2 * 1024 * 1024;

pub struct Bus {
    ram: Vec<u8>,
    /// Always [`ROM_MAX_SIZE`] bytes; only the first `rom_len` hold the
    /// loaded image. Never written after load.
    rom: Vec<u8>,
    rom_len: usize,
    rom_base: u32,

    /// True from reset until the first MEMC control write. While set, the
    /// low 2 MiB mirror ROM instead of RAM.
    boot_mode: bool,

    pub ioc: Ioc,
    pub vidc: Vidc,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_RAM_SIZE, ROM_DEFAULT_BASE, 640, 480)
    }
}

impl Bus {
    pub fn new(ram_size: usize, rom_base: u32, display_width: u32, display_height: u32) -> Self {
        Self {
            ram: vec![0; ram_size],
            rom: vec![0; ROM_MAX_SIZE],
            rom_len: 0,
            rom_base: rom_base & ADDR_MASK,
            boot_mode: true,
            ioc: Ioc::new(),
            vidc: Vidc::new(display_width, display_height),
        }
    }

    /// Copies up to [`ROM_MAX_SIZE`] bytes of firmware into the ROM buffer
    /// and returns how many were kept.
    pub fn load_rom(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(ROM_MAX_SIZE);
        self.rom[..len].copy_from_slice(&data[..len]);
        self.rom_len = len;

        log(format!(
            "Loaded ROM: {len} bytes at {:#010X}",
            self.rom_base
        ));
        len
    }

    /// Re-enters boot mode. RAM and ROM contents are left alone.
    pub fn reset(&mut self) {
        self.boot_mode = true;
    }

    pub const fn boot_mode(&self) -> bool {
        self.boot_mode
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn in_ram(&self, address: u32) -> bool {
        (address as usize) < self.ram.len()
    }

    /// Word read from either ROM window, wrapping the offset modulo the
    /// loaded image size.
    fn rom_aliased_read_word(&self, address: u32) -> u32 {
        if self.rom_len < 4 {
            log_debug(format!("ROM alias read with no ROM loaded at {address:#010X}"));
            return INVALID_READ;
        }

        let offset = (address as usize & 0x001F_FFFF) % self.rom_len;
        if offset + 4 > self.rom_len {
            log_debug(format!("ROM alias read beyond size at {address:#010X}"));
            return INVALID_READ;
        }

        u32::from_le_bytes(self.rom[offset..offset + 4].try_into().unwrap())
    }

    fn rom_aliased_read_byte(&self, address: u32) -> u8 {
        if self.rom_len == 0 {
            log_debug(format!("ROM alias byte read with no ROM loaded at {address:#010X}"));
            return INVALID_READ_BYTE;
        }

        let offset = (address as usize & 0x001F_FFFF) % self.rom_len;
        self.rom[offset]
    }

    pub fn read_word(&mut self, address: u32) -> u32 {
        let address = address & ADDR_MASK;

        if self.boot_mode && address < LOW_ALIAS_END {
            return self.rom_aliased_read_word(address);
        }
        if (ROM_ALIAS_BASE..ROM_ALIAS_END).contains(&address) {
            return self.rom_aliased_read_word(address);
        }
        if self.in_ram(address) {
            // RAM fast path requires word alignment and full containment.
            let offset = address as usize;
            if address & 3 == 0 && offset + 4 <= self.ram.len() {
                return u32::from_le_bytes(self.ram[offset..offset + 4].try_into().unwrap());
            }
            log_debug(format!("unaligned or partial RAM word read at {address:#010X}"));
            return INVALID_READ;
        }
        if (IOC_BASE..IOC_END).contains(&address) {
            return self.ioc.read_register((address - IOC_BASE) >> 2);
        }
        if (VIDC_BASE..VIDC_END).contains(&address) {
            return self
                .vidc
                .read_register((address - VIDC_BASE) >> 2, self.ioc.vfly_asserted());
        }
        if self.in_rom(address) {
            let offset = (address - self.rom_base) as usize;
            if address & 3 == 0 && offset + 4 <= self.rom_len {
                return u32::from_le_bytes(self.rom[offset..offset + 4].try_into().unwrap());
            }
            log_debug(format!("unaligned or partial ROM word read at {address:#010X}"));
            return INVALID_READ;
        }

        log_debug(format!("invalid read at {address:#010X}"));
        INVALID_READ
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & ADDR_MASK;

        if self.boot_mode && address < LOW_ALIAS_END {
            log_debug(format!("write to boot ROM alias at {address:#010X} ignored"));
            return;
        }
        if (ROM_ALIAS_BASE..ROM_ALIAS_END).contains(&address) {
            log_debug(format!("write to ROM alias at {address:#010X} ignored"));
            return;
        }
        if self.in_ram(address) {
            let offset = address as usize;
            if address & 3 == 0 && offset + 4 <= self.ram.len() {
                self.ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                return;
            }
            log_debug(format!("unaligned or partial RAM word write at {address:#010X}"));
            return;
        }
        if (IOC_BASE..IOC_END).contains(&address) {
            self.ioc.write_register((address - IOC_BASE) >> 2, value);
            return;
        }
        if (VIDC_BASE..VIDC_END).contains(&address) {
            self.vidc.write_register((address - VIDC_BASE) >> 2, value);
            return;
        }
        if (MEMC_BASE..MEMC_END).contains(&address) {
            if self.boot_mode {
                self.boot_mode = false;
                log("MEMC control write: boot mode exited");
            }
            return;
        }
        if self.in_rom(address) {
            log_debug(format!("write to ROM at {address:#010X} ignored"));
            return;
        }

        log_debug(format!("invalid write at {address:#010X} = {value:#010X}"));
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        let address = address & ADDR_MASK;

        if self.boot_mode && address < LOW_ALIAS_END {
            return self.rom_aliased_read_byte(address);
        }
        if (ROM_ALIAS_BASE..ROM_ALIAS_END).contains(&address) {
            return self.rom_aliased_read_byte(address);
        }
        if self.in_ram(address) {
            return self.ram[address as usize];
        }
        if (IOC_BASE..IOC_END).contains(&address) || (VIDC_BASE..VIDC_END).contains(&address) {
            // Byte lane out of the containing word.
            let word = self.read_word(address & !3);
            return word.get_byte((address & 3) as u8);
        }
        if self.in_rom(address) {
            let offset = (address - self.rom_base) as usize;
            if offset < self.rom_len {
                return self.rom[offset];
            }
        }

        log_debug(format!("invalid byte read at {address:#010X}"));
        INVALID_READ_BYTE
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        let address = address & ADDR_MASK;

        if self.boot_mode && address < LOW_ALIAS_END {
            log_debug(format!("byte write to boot ROM alias at {address:#010X} ignored"));
            return;
        }
        if (ROM_ALIAS_BASE..ROM_ALIAS_END).contains(&address) {
            log_debug(format!("byte write to ROM alias at {address:#010X} ignored"));
            return;
        }
        if self.in_ram(address) {
            self.ram[address as usize] = value;
            return;
        }
        if (IOC_BASE..IOC_END).contains(&address)
            || (VIDC_BASE..VIDC_END).contains(&address)
            || (MEMC_BASE..MEMC_END).contains(&address)
        {
            // Read-modify-write of the containing word.
            let aligned = address & !3;
            let mut word = self.read_word(aligned);
            word.set_byte((address & 3) as u8, value);
            self.write_word(aligned, word);
            return;
        }
        if self.in_rom(address) {
            log_debug(format!("byte write to ROM at {address:#010X} ignored"));
            return;
        }

        log_debug(format!("invalid byte write at {address:#010X} = {value:#04X}"));
    }

    fn in_rom(&self, address: u32) -> bool {
        address >= self.rom_base && ((address - self.rom_base) as usize) < ROM_MAX_SIZE
    }

    /// Scans the VIDC framebuffer out of RAM and asserts VFLY.
    pub fn render_frame(&mut self, out: &mut Vec<u16>) {
        self.vidc.render_frame(&self.ram, out);
        self.ioc.irq_request_a |= IRQ_A_VFLY;
        self.ioc.update_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bus_with_rom(words: &[u32]) -> Bus {
        let mut bus = Bus::default();
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bus.load_rom(&bytes);
        bus
    }

    /// A bus with the boot alias already dropped, so low memory is RAM.
    fn ram_bus() -> Bus {
        let mut bus = Bus::default();
        bus.write_word(MEMC_BASE, 0);
        bus
    }

    #[test]
    fn address_high_bits_are_masked() {
        let mut bus = ram_bus();
        bus.write_word(0x1000, 0xCAFE_BABE);

        // Bits above 25 fall away before decoding.
        assert_eq!(bus.read_word(0xFC00_1000), 0xCAFE_BABE);
        assert_eq!(bus.read_word(0x1000), bus.read_word(0x1000 & 0x03FF_FFFC));
    }

    #[test]
    fn ram_word_round_trip() {
        let mut bus = ram_bus();
        bus.write_word(0x0000_2000, 0x1234_5678);
        assert_eq!(bus.read_word(0x0000_2000), 0x1234_5678);
    }

    #[test]
    fn ram_little_endian_layout() {
        let mut bus = ram_bus();
        bus.write_word(0x2000, 0x1234_5678);

        assert_eq!(bus.read_byte(0x2000), 0x78);
        assert_eq!(bus.read_byte(0x2001), 0x56);
        assert_eq!(bus.read_byte(0x2002), 0x34);
        assert_eq!(bus.read_byte(0x2003), 0x12);
    }

    #[test]
    fn ram_byte_write_read_identity() {
        let mut bus = ram_bus();
        for lane in 0..4u32 {
            bus.write_byte(0x3000 + lane, lane as u8 + 1);
            assert_eq!(bus.read_byte(0x3000 + lane), lane as u8 + 1);
        }
        assert_eq!(bus.read_word(0x3000), 0x0403_0201);
    }

    #[test]
    fn unaligned_ram_word_access_is_invalid() {
        let mut bus = ram_bus();
        bus.write_word(0x2001, 0xDEAD_BEEF);
        assert_eq!(bus.read_word(0x2000), 0);
        assert_eq!(bus.read_word(0x2001), INVALID_READ);
    }

    #[test]
    fn word_access_spanning_end_of_ram_is_invalid() {
        let mut bus = Bus::new(4 * 1024 * 1024, ROM_DEFAULT_BASE, 640, 480);
        let last = 4 * 1024 * 1024 - 4;

        bus.write_word(last as u32, 7);
        assert_eq!(bus.read_word(last as u32), 7);

        // The last three bytes cannot hold a word.
        assert_eq!(bus.read_word(last as u32 + 1), INVALID_READ);
    }

    #[test]
    fn boot_alias_reads_rom_and_exits_on_memc_write() {
        let mut bus = bus_with_rom(&[0xAABB_CCDD, 0x1122_3344]);

        // Low memory mirrors ROM while booting.
        assert_eq!(bus.read_word(0x0000_0000), 0xAABB_CCDD);
        assert_eq!(bus.read_word(0x0000_0004), 0x1122_3344);
        // Writes into the alias are dropped.
        bus.write_word(0x0000_0000, 0xFFFF_0000);
        assert_eq!(bus.read_word(0x0000_0000), 0xAABB_CCDD);

        // MEMC control write drops the alias.
        bus.write_word(MEMC_BASE, 0);
        assert!(!bus.boot_mode());
        assert_eq!(bus.read_word(0x0000_0000), 0);

        // Idempotent: further control writes change nothing.
        bus.write_word(MEMC_BASE, 1);
        assert!(!bus.boot_mode());

        // And low memory is plain RAM now.
        bus.write_word(0x0000_0000, 0x5555_AAAA);
        assert_eq!(bus.read_word(0x0000_0000), 0x5555_AAAA);
    }

    #[test]
    fn rom_alias_wraps_modulo_rom_size() {
        let mut bus = bus_with_rom(&[0x1111_1111, 0x2222_2222]);

        // 8-byte image: offset 8 wraps to 0.
        assert_eq!(bus.read_word(0x0200_0000), 0x1111_1111);
        assert_eq!(bus.read_word(0x0200_0008), 0x1111_1111);
        assert_eq!(bus.read_word(0x0200_000C), 0x2222_2222);
    }

    #[test]
    fn rom_is_write_protected() {
        let mut bus = bus_with_rom(&[0x1111_1111]);

        let original = bus.read_word(ROM_DEFAULT_BASE);
        bus.write_word(ROM_DEFAULT_BASE, 0xDEAD_BEEF);
        bus.write_byte(ROM_DEFAULT_BASE, 0xEE);
        bus.write_word(0x0200_0000, 0xDEAD_BEEF);

        assert_eq!(bus.read_word(ROM_DEFAULT_BASE), original);
        assert_eq!(original, 0x1111_1111);
    }

    #[test]
    fn empty_rom_reads_sentinel() {
        let mut bus = Bus::default();
        assert_eq!(bus.read_word(0x0000_0000), INVALID_READ);
        assert_eq!(bus.read_word(0x0200_0000), INVALID_READ);
        assert_eq!(bus.read_byte(0x0200_0000), INVALID_READ_BYTE);
    }

    #[test]
    fn unmapped_addresses_read_sentinel() {
        let mut bus = Bus::default();
        // A hole between the RAM top and the IO windows.
        assert_eq!(bus.read_word(0x0300_0000), INVALID_READ);
        assert_eq!(bus.read_byte(0x0300_0000), INVALID_READ_BYTE);
        // Writes are dropped without panicking.
        bus.write_word(0x0300_0000, 1);
        bus.write_byte(0x0300_0000, 1);
    }

    #[test]
    fn ioc_registers_reachable_through_window() {
        let mut bus = Bus::default();

        // Mask A is at word offset 9.
        bus.write_word(IOC_BASE + 9 * 4, 0xAB);
        assert_eq!(bus.read_word(IOC_BASE + 9 * 4), 0xAB);
        assert_eq!(bus.ioc.irq_mask_a, 0xAB);
    }

    #[test]
    fn vidc_registers_reachable_through_window() {
        let mut bus = Bus::default();

        // Palette entry 0 is at word offset 1.
        bus.write_word(VIDC_BASE + 4, 0x1E00);
        assert_eq!(bus.read_word(VIDC_BASE + 4), 0x1E00);
        assert_eq!(bus.vidc.palette[0], 0x1E00);
    }

    #[test]
    fn mmio_byte_write_preserves_other_lanes() {
        let mut bus = Bus::default();

        // VIDC h_cycle at word offset 260.
        let address = VIDC_BASE + 260 * 4;
        bus.write_word(address, 0x1122_3344);

        bus.write_byte(address + 1, 0xEE);

        assert_eq!(bus.read_word(address), 0x1122_EE44);
    }

    #[test]
    fn mmio_byte_read_extracts_lane() {
        let mut bus = Bus::default();

        let address = VIDC_BASE + 260 * 4;
        bus.write_word(address, 0x1122_3344);

        assert_eq!(bus.read_byte(address), 0x44);
        assert_eq!(bus.read_byte(address + 2), 0x22);
    }

    #[test]
    fn vidc_control_read_shadows_vfly_through_bus() {
        let mut bus = Bus::default();
        bus.write_word(VIDC_BASE, 0x30);

        assert_eq!(bus.read_word(VIDC_BASE), 0x30);

        bus.ioc.update_timers(160_000);
        assert_eq!(bus.read_word(VIDC_BASE), 0x38);
    }

    #[test]
    fn render_frame_asserts_vfly() {
        let mut bus = Bus::default();
        assert!(!bus.ioc.vfly_asserted());

        let mut out = Vec::new();
        bus.render_frame(&mut out);

        assert!(bus.ioc.vfly_asserted());
        assert_eq!(out.len(), 640 * 480);
    }

    #[test]
    fn reset_reenters_boot_mode() {
        let mut bus = bus_with_rom(&[0x1234_5678]);
        bus.write_word(MEMC_BASE, 0);
        assert!(!bus.boot_mode());

        bus.reset();

        assert!(bus.boot_mode());
        assert_eq!(bus.read_word(0), 0x1234_5678);
    }

    #[test]
    fn rom_load_is_truncated_to_capacity() {
        let mut bus = Bus::default();
        let oversized = vec![0xAB; ROM_MAX_SIZE + 16];

        assert_eq!(bus.load_rom(&oversized), ROM_MAX_SIZE);
        assert_eq!(bus.read_byte(ROM_DEFAULT_BASE), 0xAB);
    }
}
