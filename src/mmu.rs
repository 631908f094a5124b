//! MMU (Memory Management Unit) functions and structures.

use matcha_common::util::SharedMut;

use crate::{
    consts::{DMA_ADDR, IE_ADDR, IF_ADDR, JOYP_ADDR},
    debugln,
    dma::{Dma, DMA_TRANSFER_SIZE},
    gb::Components,
    irq::InterruptController,
    pad::Pad,
    ppu::Ppu,
    rom::Cartridge,
    serial::Serial,
    timer::Timer,
};

/// Size of the work RAM, mapped in range 0xC000-0xDFFF and
/// echoed in range 0xE000-0xFDFF.
pub const RAM_SIZE: usize = 8192;

/// Size of the high RAM, mapped in range 0xFF80-0xFFFE.
pub const HRAM_SIZE: usize = 127;

pub struct Mmu {
    /// Reference to the PPU (Pixel Processing Unit) that is going
    /// to be used both for VRAM/OAM reading and writing and to
    /// forward some of the access operations.
    ppu: Ppu,

    /// Reference to the DMA controller tracking the OAM transfer
    /// active window.
    dma: Dma,

    /// Reference to the Gamepad structure that is going to control
    /// the I/O access to this device.
    pad: Pad,

    /// The timer controller to be used as part of the I/O access
    /// that is memory mapped.
    timer: Timer,

    /// The serial data transfer controller to be used to control the
    /// link cable connection, this component is memory mapped.
    serial: Serial,

    /// The cartridge ROM that is currently loaded into the system,
    /// going to be used to access ROM and external RAM banks. With
    /// no cartridge attached reads return 0xFF and writes are
    /// dropped.
    rom: Option<Cartridge>,

    /// Handle to the interrupt controller, used to route the IF
    /// and IE register accesses.
    int: SharedMut<InterruptController>,

    /// Buffer that is used to store the work RAM of the system,
    /// mapped in range 0xC000-0xDFFF.
    ram: [u8; RAM_SIZE],

    /// Buffer that is used to store the high RAM of the system,
    /// mapped in range 0xFF80-0xFFFE.
    hram: [u8; HRAM_SIZE],
}

impl Mmu {
    pub fn new(components: Components, int: SharedMut<InterruptController>) -> Self {
        Self {
            ppu: components.ppu,
            dma: components.dma,
            pad: components.pad,
            timer: components.timer,
            serial: components.serial,
            rom: None,
            int,
            ram: [0u8; RAM_SIZE],
            hram: [0u8; HRAM_SIZE],
        }
    }

    pub fn reset(&mut self) {
        self.rom = None;
        self.ram = [0u8; RAM_SIZE];
        self.hram = [0u8; HRAM_SIZE];
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x3FFF - ROM bank 0
            // 0x4000-0x7FFF - ROM bank (switchable)
            0x0000..=0x7fff => self.rom.as_ref().map_or(0xff, |rom| rom.read_rom(addr)),

            // 0x8000-0x9FFF - Graphics: VRAM (8 KB)
            0x8000..=0x9fff => self.ppu.read(addr),

            // 0xA000-0xBFFF - External RAM (8 KB)
            0xa000..=0xbfff => self.rom.as_ref().map_or(0xff, |rom| rom.read_ram(addr)),

            // 0xC000-0xDFFF - Working RAM (8 KB)
            0xc000..=0xdfff => self.ram[(addr & 0x1fff) as usize],

            // 0xE000-0xFDFF - Working RAM Shadow
            0xe000..=0xfdff => self.ram[(addr & 0x1fff) as usize],

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.read(addr),

            // 0xFEA0-0xFEFF - Not Usable
            0xfea0..=0xfeff => 0xff,

            // 0xFF00 - Joypad input
            JOYP_ADDR => self.pad.read(addr),

            // 0xFF01-0xFF02 - Serial data transfer
            0xff01..=0xff02 => self.serial.read(addr),

            // 0xFF04-0xFF07 - Timer and divider
            0xff04..=0xff07 => self.timer.read(addr),

            // 0xFF0F — IF: Interrupt flag
            IF_ADDR => self.int.borrow().read_flags(),

            // 0xFF40-0xFF45 - PPU registers
            // 0xFF47-0xFF4B - PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.read(addr),

            // 0xFF46 — DMA: OAM DMA source address & start
            DMA_ADDR => self.dma.read(addr),

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize],

            // 0xFFFF — IE: Interrupt enable
            IE_ADDR => self.int.borrow().read_enable(),

            addr => {
                debugln!("Reading from unimplemented location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0x0000-0x7FFF - ROM range, drives the bank controller
            0x0000..=0x7fff => {
                if let Some(rom) = self.rom.as_mut() {
                    rom.write_rom(addr, value);
                }
            }

            // 0x8000-0x9FFF - Graphics: VRAM (8 KB)
            0x8000..=0x9fff => self.ppu.write(addr, value),

            // 0xA000-0xBFFF - External RAM (8 KB)
            0xa000..=0xbfff => {
                if let Some(rom) = self.rom.as_mut() {
                    rom.write_ram(addr, value);
                }
            }

            // 0xC000-0xDFFF - Working RAM (8 KB)
            0xc000..=0xdfff => self.ram[(addr & 0x1fff) as usize] = value,

            // 0xE000-0xFDFF - Working RAM Shadow
            0xe000..=0xfdff => self.ram[(addr & 0x1fff) as usize] = value,

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.write(addr, value),

            // 0xFEA0-0xFEFF - Not Usable
            0xfea0..=0xfeff => (),

            // 0xFF00 - Joypad input
            JOYP_ADDR => self.pad.write(addr, value),

            // 0xFF01-0xFF02 - Serial data transfer
            0xff01..=0xff02 => self.serial.write(addr, value),

            // 0xFF04-0xFF07 - Timer and divider
            0xff04..=0xff07 => self.timer.write(addr, value),

            // 0xFF0F — IF: Interrupt flag
            IF_ADDR => self.int.borrow_mut().write_flags(value),

            // 0xFF40-0xFF45 - PPU registers
            // 0xFF47-0xFF4B - PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.write(addr, value),

            // 0xFF46 — DMA: OAM DMA source address & start, the
            // copy itself is immediately observable, the controller
            // only tracks the bus contention window
            DMA_ADDR => {
                self.dma.write(addr, value);
                if value <= 0xdf {
                    let source = (value as u16) << 8;
                    for index in 0..DMA_TRANSFER_SIZE {
                        let byte = self.read(source + index);
                        self.ppu.write(0xfe00 + index, byte);
                    }
                }
            }

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize] = value,

            // 0xFFFF — IE: Interrupt enable
            IE_ADDR => self.int.borrow_mut().write_enable(value),

            addr => debugln!("Writing to unimplemented location 0x{:04x}", addr),
        }
    }

    /// Reads a 16 bit word from the provided address using the
    /// little-endian byte order of the Game Boy.
    pub fn read_word(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | ((self.read(addr.wrapping_add(1)) as u16) << 8)
    }

    /// Writes a 16 bit word to the provided address using the
    /// little-endian byte order of the Game Boy.
    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write(addr, value as u8);
        self.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Advances the DMA active window by the provided number of
    /// master cycles.
    pub fn step_dma(&mut self, cycles: u16) {
        self.dma.clock(cycles);
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn ppu_i(&self) -> &Ppu {
        &self.ppu
    }

    pub fn dma(&mut self) -> &mut Dma {
        &mut self.dma
    }

    pub fn dma_i(&self) -> &Dma {
        &self.dma
    }

    pub fn pad(&mut self) -> &mut Pad {
        &mut self.pad
    }

    pub fn pad_i(&self) -> &Pad {
        &self.pad
    }

    pub fn timer(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn timer_i(&self) -> &Timer {
        &self.timer
    }

    pub fn serial(&mut self) -> &mut Serial {
        &mut self.serial
    }

    pub fn serial_i(&self) -> &Serial {
        &self.serial
    }

    pub fn rom(&mut self) -> Option<&mut Cartridge> {
        self.rom.as_mut()
    }

    pub fn rom_i(&self) -> Option<&Cartridge> {
        self.rom.as_ref()
    }

    pub fn set_rom(&mut self, rom: Cartridge) -> &mut Cartridge {
        self.rom.insert(rom)
    }

    pub fn int(&self) -> SharedMut<InterruptController> {
        self.int.clone()
    }
}

impl Default for Mmu {
    fn default() -> Self {
        use std::{cell::RefCell, rc::Rc};
        let int: SharedMut<InterruptController> = Rc::new(RefCell::new(InterruptController::new()));
        Mmu::new(Components::new(int.clone()), int)
    }
}

#[cfg(test)]
mod tests {
    use crate::{consts::IF_ADDR, test::build_rom, rom::Cartridge};

    use super::Mmu;

    #[test]
    fn test_echo_ram() {
        let mut mmu = Mmu::default();
        mmu.write(0xc042, 0xa5);
        assert_eq!(mmu.read(0xe042), 0xa5);

        mmu.write(0xe100, 0x5a);
        assert_eq!(mmu.read(0xc100), 0x5a);

        // every echo address mirrors the one 0x2000 below
        for addr in (0xe000u16..0xfe00).step_by(0x100) {
            assert_eq!(mmu.read(addr), mmu.read(addr - 0x2000));
        }
    }

    #[test]
    fn test_unusable_range() {
        let mut mmu = Mmu::default();
        for addr in 0xfea0u16..=0xfeff {
            mmu.write(addr, 0x42);
            assert_eq!(mmu.read(addr), 0xff);
        }
    }

    #[test]
    fn test_if_forced_bits() {
        let mut mmu = Mmu::default();
        for value in [0x00u8, 0x1f, 0x42, 0xff] {
            mmu.write(IF_ADDR, value);
            assert_eq!(mmu.read(IF_ADDR) & 0xe0, 0xe0);
        }
        mmu.write(IF_ADDR, 0x05);
        assert_eq!(mmu.read(IF_ADDR), 0xe5);
    }

    #[test]
    fn test_word_round_trip() {
        let mut mmu = Mmu::default();
        mmu.write_word(0xc000, 0x1234);
        assert_eq!(mmu.read(0xc000), 0x34);
        assert_eq!(mmu.read(0xc001), 0x12);
        assert_eq!(mmu.read_word(0xc000), 0x1234);

        mmu.write_word(0xff80, 0xbeef);
        assert_eq!(mmu.read_word(0xff80), 0xbeef);
    }

    #[test]
    fn test_no_cartridge() {
        let mut mmu = Mmu::default();
        assert_eq!(mmu.read(0x0000), 0xff);
        assert_eq!(mmu.read(0x4000), 0xff);
        assert_eq!(mmu.read(0xa000), 0xff);
        mmu.write(0x2000, 0x01);
        mmu.write(0xa000, 0x42);
        assert_eq!(mmu.read(0xa000), 0xff);
    }

    #[test]
    fn test_cartridge_routing() {
        let mut mmu = Mmu::default();
        let rom = Cartridge::from_data(&build_rom(0x01, 4, 0x00)).unwrap();
        mmu.set_rom(rom);

        assert_eq!(mmu.read(0x0000), 0x10);
        assert_eq!(mmu.read(0x4000), 0x11);
        mmu.write(0x2000, 0x02);
        assert_eq!(mmu.read(0x4000), 0x12);
    }

    #[test]
    fn test_unimplemented_io() {
        let mut mmu = Mmu::default();
        // APU and CGB-only registers are not implemented
        for addr in [0xff10u16, 0xff26, 0xff30, 0xff4d, 0xff70] {
            assert_eq!(mmu.read(addr), 0xff);
            mmu.write(addr, 0x42);
            assert_eq!(mmu.read(addr), 0xff);
        }
    }

    #[test]
    fn test_dma_transfer() {
        let mut mmu = Mmu::default();
        for index in 0..160u16 {
            mmu.write(0xc000 + index, index as u8);
        }

        mmu.write(0xff46, 0xc0);

        // the copy is observable immediately, the active window
        // lasts for 640 cycles
        for index in 0..160u16 {
            assert_eq!(mmu.read(0xfe00 + index), index as u8);
        }
        assert!(mmu.dma_i().active());
        assert_eq!(mmu.read(0xff46), 0xc0);

        mmu.step_dma(640);
        assert!(!mmu.dma_i().active());
    }

    #[test]
    fn test_dma_invalid_source() {
        let mut mmu = Mmu::default();
        mmu.write(0xfe00, 0x42);
        mmu.write(0xff46, 0xe0);
        assert_eq!(mmu.read(0xfe00), 0x42);
        assert!(!mmu.dma_i().active());
    }

    #[test]
    fn test_hram() {
        let mut mmu = Mmu::default();
        mmu.write(0xff80, 0x12);
        mmu.write(0xfffe, 0x34);
        assert_eq!(mmu.read(0xff80), 0x12);
        assert_eq!(mmu.read(0xfffe), 0x34);
    }

    #[test]
    fn test_ie_register() {
        let mut mmu = Mmu::default();
        mmu.write(0xffff, 0x15);
        assert_eq!(mmu.read(0xffff), 0x15);
    }
}
