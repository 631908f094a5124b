//! Game Boy emulation entrypoint and associated functions and structures.
//!
//! Most of the meaningful publicly available functions and structures to build
//! a working emulator should be present here.
//!
//! # Examples
//!
//! Creates a simple [`GameBoy`] instance, loads an empty cartridge and runs
//! a complete frame of emulation.
//!
//! ```rust
//! use matcha::gb::GameBoy;
//! let mut game_boy = GameBoy::new();
//! game_boy.load_rom_empty().unwrap();
//! game_boy.boot();
//! let cycles = game_boy.next_frame();
//! println!("Ran {} cycles", cycles);
//! ```

use std::{
    cell::RefCell,
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use matcha_common::{
    error::Error,
    util::{read_file, SharedMut},
};

use crate::{
    cpu::Cpu,
    dma::Dma,
    irq::InterruptController,
    mmu::Mmu,
    pad::{Pad, PadKey},
    ppu::{Ppu, PpuMode, FRAME_BUFFER_SIZE, FRAME_CYCLES},
    rom::Cartridge,
    serial::Serial,
    timer::Timer,
};

/// Aggregation structure allowing the bundling of
/// all the components of a Game Boy into a single
/// element for easy access.
pub struct Components {
    pub ppu: Ppu,
    pub dma: Dma,
    pub pad: Pad,
    pub timer: Timer,
    pub serial: Serial,
}

impl Components {
    /// Builds the complete set of peripherals, all of them sharing
    /// the provided interrupt controller handle.
    pub fn new(int: SharedMut<InterruptController>) -> Self {
        Self {
            ppu: Ppu::new(int.clone()),
            dma: Dma::default(),
            pad: Pad::new(int.clone()),
            timer: Timer::new(int.clone()),
            serial: Serial::new(int),
        }
    }
}

/// Snapshot of the most relevant CPU and PPU registers, meant
/// for debugging and for front-end display purposes.
pub struct Registers {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub scy: u8,
    pub scx: u8,
    pub wy: u8,
    pub wx: u8,
    pub ly: u8,
    pub lyc: u8,
}

/// Top level structure that abstracts the usage of the
/// Game Boy system under the Matcha emulator.
///
/// Should serve as the main entry-point API.
pub struct GameBoy {
    /// Reference to the Game Boy CPU component to be
    /// used as the main element of the system, when
    /// clocked, the amount of ticks from it will be
    /// used as reference for the rest of the components.
    cpu: Cpu,
}

impl GameBoy {
    /// The logic frequency of the Game Boy
    /// CPU in hz.
    pub const CPU_FREQ: u32 = 4194304;

    /// The visual frequency (refresh rate)
    /// of the Game Boy, close to 60 hz.
    pub const VISUAL_FREQ: f32 = 59.7275;

    /// The cycles taken to run a complete frame
    /// loop in the Game Boy's PPU (in CPU cycles).
    pub const LCD_CYCLES: u32 = FRAME_CYCLES;

    pub fn new() -> Self {
        let int: SharedMut<InterruptController> = Rc::new(RefCell::new(InterruptController::new()));
        let mmu = Mmu::new(Components::new(int.clone()), int.clone());
        let cpu = Cpu::new(mmu, int);
        Self { cpu }
    }

    pub fn reset(&mut self) {
        self.ppu().reset();
        self.timer().reset();
        self.serial().reset();
        self.pad().reset();
        self.dma().reset();
        self.mmu().reset();
        self.cpu.int().borrow_mut().reset();
        self.cpu.reset();
    }

    /// Checks if the provided data would parse as a loadable
    /// cartridge image.
    pub fn verify_rom(data: &[u8]) -> bool {
        Cartridge::from_data(data).is_ok()
    }

    /// Advances the clock of the system by one master step, this
    /// implies executing one CPU instruction (or servicing one
    /// interrupt, or idling one halted tick) and advancing all the
    /// other components of the system by the resulting amount of
    /// cycles, in a fixed order (timer, PPU, DMA, serial).
    ///
    /// The amount of cycles executed by the CPU is returned.
    pub fn clock(&mut self) -> u16 {
        let cycles = self.cpu.clock() as u16;
        self.timer().clock(cycles);
        self.ppu().clock(cycles);
        self.mmu().step_dma(cycles);
        self.serial().clock(cycles);
        cycles
    }

    /// Equivalent to `clock()` but allows the execution of multiple
    /// master steps in a single call.
    pub fn clocks(&mut self, count: usize) -> u64 {
        let mut cycles = 0_u64;
        for _ in 0..count {
            cycles += self.clock() as u64;
        }
        cycles
    }

    /// Clocks the emulator until the limit of cycles that has been
    /// provided and returns the amount of cycles that have been
    /// clocked.
    pub fn clocks_cycles(&mut self, limit: usize) -> u64 {
        let mut cycles = 0_u64;
        while cycles < limit as u64 {
            cycles += self.clock() as u64;
        }
        cycles
    }

    /// Runs master steps until the PPU has produced one complete
    /// frame, returning the number of cycles that have elapsed.
    pub fn next_frame(&mut self) -> u32 {
        let mut cycles = 0u32;
        let current_frame = self.ppu_frame();
        while self.ppu_frame() == current_frame {
            cycles += self.clock() as u32;
        }
        cycles
    }

    /// Runs master steps until the PC (Program Counter) reaches the
    /// provided address.
    pub fn step_to(&mut self, addr: u16) -> u32 {
        let mut cycles = 0u32;
        while self.cpu_i().pc() != addr {
            cycles += self.clock() as u32;
        }
        cycles
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.pad().key_press(key);
    }

    pub fn key_lift(&mut self, key: PadKey) {
        self.pad().key_lift(key);
    }

    pub fn ppu_ly(&mut self) -> u8 {
        self.ppu().ly()
    }

    pub fn ppu_mode(&mut self) -> PpuMode {
        self.ppu().mode()
    }

    pub fn ppu_frame(&mut self) -> u16 {
        self.ppu().frame_index()
    }

    /// Direct boot method that immediately jumps the machine
    /// to the post boot state, this will effectively skip the
    /// boot sequence and jump to the cartridge execution.
    pub fn boot(&mut self) {
        self.cpu.boot();
    }

    pub fn registers(&mut self) -> Registers {
        let ppu = self.ppu_i();
        let (scy, scx) = (ppu.read(0xff42), ppu.read(0xff43));
        let (wy, wx) = (ppu.read(0xff4a), ppu.read(0xff4b));
        let (ly, lyc) = (ppu.read(0xff44), ppu.read(0xff45));
        Registers {
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            e: self.cpu.e,
            h: self.cpu.h,
            l: self.cpu.l,
            scy,
            scx,
            wy,
            wx,
            ly,
            lyc,
        }
    }

    pub fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn cpu_i(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&mut self) -> &mut Mmu {
        self.cpu.mmu()
    }

    pub fn mmu_i(&self) -> &Mmu {
        self.cpu.mmu_i()
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        self.cpu.mmu().ppu()
    }

    pub fn ppu_i(&self) -> &Ppu {
        self.cpu.mmu_i().ppu_i()
    }

    pub fn dma(&mut self) -> &mut Dma {
        self.cpu.mmu().dma()
    }

    pub fn dma_i(&self) -> &Dma {
        self.cpu.mmu_i().dma_i()
    }

    pub fn pad(&mut self) -> &mut Pad {
        self.cpu.mmu().pad()
    }

    pub fn pad_i(&self) -> &Pad {
        self.cpu.mmu_i().pad_i()
    }

    pub fn timer(&mut self) -> &mut Timer {
        self.cpu.mmu().timer()
    }

    pub fn timer_i(&self) -> &Timer {
        self.cpu.mmu_i().timer_i()
    }

    pub fn serial(&mut self) -> &mut Serial {
        self.cpu.mmu().serial()
    }

    pub fn serial_i(&self) -> &Serial {
        self.cpu.mmu_i().serial_i()
    }

    pub fn rom(&mut self) -> Option<&mut Cartridge> {
        self.mmu().rom()
    }

    pub fn rom_i(&self) -> Option<&Cartridge> {
        self.mmu_i().rom_i()
    }

    pub fn frame_buffer(&mut self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.ppu().frame_buffer()
    }

    pub fn load_rom(
        &mut self,
        data: &[u8],
        ram_data: Option<&[u8]>,
    ) -> Result<&mut Cartridge, Error> {
        let mut rom = Cartridge::from_data(data)?;
        if let Some(ram_data) = ram_data {
            rom.set_ram_data(ram_data);
        }
        Ok(self.mmu().set_rom(rom))
    }

    pub fn load_rom_file(
        &mut self,
        path: &str,
        ram_path: Option<&str>,
    ) -> Result<&mut Cartridge, Error> {
        let data = read_file(path)?;
        match ram_path {
            Some(ram_path) => {
                let ram_data = read_file(ram_path)?;
                self.load_rom(&data, Some(&ram_data))
            }
            None => self.load_rom(&data, None),
        }
    }

    pub fn load_rom_empty(&mut self) -> Result<&mut Cartridge, Error> {
        let data = [0u8; 32 * 1024];
        self.load_rom(&data, None)
    }

    /// Returns the battery backed state of the loaded cartridge as
    /// an opaque blob, or `None` when no battery is present.
    pub fn battery_ram(&mut self) -> Option<Vec<u8>> {
        match self.mmu().rom() {
            Some(rom) if rom.has_battery() => Some(rom.get_external_ram()),
            _ => None,
        }
    }

    /// Restores a battery blob previously produced by
    /// [`GameBoy::battery_ram`], mismatched blobs are silently
    /// ignored by the cartridge.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        if let Some(rom) = self.mmu().rom() {
            rom.load_external_ram(data);
        }
    }

    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.mmu().read(addr)
    }

    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.mmu().write(addr, value);
    }

    pub fn description(&self, column_length: usize) -> String {
        let freq_l = format!("{:width$}", "Clock", width = column_length);
        let cartridge = match self.rom_i() {
            Some(rom) => rom.description(column_length),
            None => String::from("No cartridge"),
        };
        format!(
            "{}  {:.02} Mhz\n{}",
            freq_l,
            Self::CPU_FREQ as f32 / 1000.0 / 1000.0,
            cartridge
        )
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameBoy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description(9))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        pad::PadKey,
        ppu::FRAME_CYCLES,
        test::{build_gb, build_rom},
    };

    use super::GameBoy;

    #[test]
    fn test_boot_state() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        assert_eq!(gb.cpu_i().pc(), 0x0100);
        assert_eq!(gb.cpu_i().sp(), 0xfffe);
        assert_eq!(gb.cpu_i().af(), 0x01b0);
        assert_eq!(gb.cpu_i().bc(), 0x0013);
        assert_eq!(gb.cpu_i().de(), 0x00d8);
        assert_eq!(gb.cpu_i().hl(), 0x014d);
        assert!(!gb.cpu_i().ime());
        assert_eq!(gb.read_memory(0xff40), 0x91);
        assert_eq!(gb.read_memory(0xff47), 0xfc);
    }

    #[test]
    fn test_master_step() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        // the empty cartridge is filled with NOPs
        let cycles = gb.clock();
        assert_eq!(cycles, 4);
        assert_eq!(gb.cpu_i().pc(), 0x0101);
    }

    #[test]
    fn test_frame_step_cycles() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        // a complete frame takes exactly the LCD cycle budget, for
        // two consecutive frames
        assert_eq!(gb.next_frame(), FRAME_CYCLES);
        assert_eq!(gb.next_frame(), FRAME_CYCLES);
    }

    #[test]
    fn test_vblank_interrupt_flag() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        gb.next_frame();
        assert_eq!(gb.read_memory(0xff0f) & 0x01, 0x01);
    }

    #[test]
    fn test_div_reset() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        gb.clocks(100);
        assert_ne!(gb.read_memory(0xff04), 0x00);
        gb.write_memory(0xff04, 0x12);
        assert_eq!(gb.read_memory(0xff04), 0x00);
    }

    #[test]
    fn test_joypad_interrupt() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        assert_eq!(gb.read_memory(0xff0f) & 0x10, 0x00);
        gb.key_press(PadKey::Start);
        assert_eq!(gb.read_memory(0xff0f) & 0x10, 0x10);
        gb.key_lift(PadKey::Start);
    }

    #[test]
    fn test_battery_round_trip() {
        let data = build_rom(0x03, 4, 0x02);
        let mut gb = build_gb(&data);
        gb.write_memory(0x0000, 0x0a);
        gb.write_memory(0xa000, 0x42);
        gb.write_memory(0xa123, 0x24);

        let blob = gb.battery_ram().unwrap();

        let mut restored = build_gb(&data);
        restored.load_battery_ram(&blob);
        restored.write_memory(0x0000, 0x0a);
        assert_eq!(restored.read_memory(0xa000), 0x42);
        assert_eq!(restored.read_memory(0xa123), 0x24);
    }

    #[test]
    fn test_no_battery() {
        let data = build_rom(0x01, 4, 0x00);
        let mut gb = build_gb(&data);
        assert!(gb.battery_ram().is_none());
    }

    #[test]
    fn test_step_to() {
        let mut gb = GameBoy::new();
        gb.load_rom_empty().unwrap();
        gb.boot();

        let cycles = gb.step_to(0x0110);
        assert_eq!(gb.cpu_i().pc(), 0x0110);
        assert_eq!(cycles, 16 * 4);
    }

    #[test]
    fn test_verify_rom() {
        assert!(GameBoy::verify_rom(&build_rom(0x00, 2, 0x00)));
        assert!(!GameBoy::verify_rom(&[0u8; 16]));
    }
}
