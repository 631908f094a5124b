//! Cartridge (ROM) related functions and structures.

use core::fmt;
use std::{
    fmt::{Display, Formatter},
    io::Cursor,
};

use matcha_common::{
    data::{read_u8, write_u8},
    error::Error,
    util::{read_file, timestamp},
};

use crate::debugln;

pub const ROM_BANK_SIZE: usize = 16384;
pub const RAM_BANK_SIZE: usize = 8192;

/// Minimum size of a loadable ROM buffer, enough to hold the
/// complete cartridge header.
pub const MIN_ROM_SIZE: usize = 0x0150;

/// Number of bytes of RTC state appended to the battery blob of
/// an MBC3 cartridge with clock support.
pub const RTC_STATE_SIZE: usize = 5;

/// The cartridge type byte as read from 0x0147, every documented
/// value is recognized even when no controller implementation is
/// available for it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomType {
    RomOnly = 0x00,
    Mbc1 = 0x01,
    Mbc1Ram = 0x02,
    Mbc1RamBattery = 0x03,
    Mbc2 = 0x05,
    Mbc2Battery = 0x06,
    Mbc3TimerBattery = 0x0f,
    Mbc3TimerRamBattery = 0x10,
    Mbc3 = 0x11,
    Mbc3Ram = 0x12,
    Mbc3RamBattery = 0x13,
    Mbc4 = 0x15,
    Mbc4Ram = 0x16,
    Mbc4RamBattery = 0x17,
    Mbc5 = 0x19,
    Mbc5Ram = 0x1a,
    Mbc5RamBattery = 0x1b,
    Mbc5Rumble = 0x1c,
    Mbc5RumbleRam = 0x1d,
    Mbc5RumbleRamBattery = 0x1e,
    Mbc6 = 0x20,
    Mbc7SensorRumbleRamBattery = 0x22,
    BandaiTama5 = 0xfd,
    HuC3 = 0xfe,
    HuC1RamBattery = 0xff,
}

impl RomType {
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            0x00 => Ok(RomType::RomOnly),
            0x01 => Ok(RomType::Mbc1),
            0x02 => Ok(RomType::Mbc1Ram),
            0x03 => Ok(RomType::Mbc1RamBattery),
            0x05 => Ok(RomType::Mbc2),
            0x06 => Ok(RomType::Mbc2Battery),
            0x0f => Ok(RomType::Mbc3TimerBattery),
            0x10 => Ok(RomType::Mbc3TimerRamBattery),
            0x11 => Ok(RomType::Mbc3),
            0x12 => Ok(RomType::Mbc3Ram),
            0x13 => Ok(RomType::Mbc3RamBattery),
            0x15 => Ok(RomType::Mbc4),
            0x16 => Ok(RomType::Mbc4Ram),
            0x17 => Ok(RomType::Mbc4RamBattery),
            0x19 => Ok(RomType::Mbc5),
            0x1a => Ok(RomType::Mbc5Ram),
            0x1b => Ok(RomType::Mbc5RamBattery),
            0x1c => Ok(RomType::Mbc5Rumble),
            0x1d => Ok(RomType::Mbc5RumbleRam),
            0x1e => Ok(RomType::Mbc5RumbleRamBattery),
            0x20 => Ok(RomType::Mbc6),
            0x22 => Ok(RomType::Mbc7SensorRumbleRamBattery),
            0xfd => Ok(RomType::BandaiTama5),
            0xfe => Ok(RomType::HuC3),
            0xff => Ok(RomType::HuC1RamBattery),
            value => Err(Error::UnknownCartridge(value)),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RomType::RomOnly => "ROM Only",
            RomType::Mbc1 => "MBC1",
            RomType::Mbc1Ram => "MBC1 + RAM",
            RomType::Mbc1RamBattery => "MBC1 + RAM + Battery",
            RomType::Mbc2 => "MBC2",
            RomType::Mbc2Battery => "MBC2 + Battery",
            RomType::Mbc3TimerBattery => "MBC3 + Timer + Battery",
            RomType::Mbc3TimerRamBattery => "MBC3 + Timer + RAM + Battery",
            RomType::Mbc3 => "MBC3",
            RomType::Mbc3Ram => "MBC3 + RAM",
            RomType::Mbc3RamBattery => "MBC3 + RAM + Battery",
            RomType::Mbc4 => "MBC4",
            RomType::Mbc4Ram => "MBC4 + RAM",
            RomType::Mbc4RamBattery => "MBC4 + RAM + Battery",
            RomType::Mbc5 => "MBC5",
            RomType::Mbc5Ram => "MBC5 + RAM",
            RomType::Mbc5RamBattery => "MBC5 + RAM + Battery",
            RomType::Mbc5Rumble => "MBC5 + Rumble",
            RomType::Mbc5RumbleRam => "MBC5 + Rumble + RAM",
            RomType::Mbc5RumbleRamBattery => "MBC5 + Rumble + RAM + Battery",
            RomType::Mbc6 => "MBC6",
            RomType::Mbc7SensorRumbleRamBattery => "MBC7 + Sensor + Rumble + RAM + Battery",
            RomType::BandaiTama5 => "Bandai TAMA5",
            RomType::HuC3 => "HuC3",
            RomType::HuC1RamBattery => "HuC1 + RAM + Battery",
        }
    }

    /// If the cartridge carries a battery able to keep the external
    /// RAM (and the RTC) powered while the console is off.
    pub fn has_battery(&self) -> bool {
        matches!(
            self,
            RomType::Mbc1RamBattery
                | RomType::Mbc3TimerBattery
                | RomType::Mbc3TimerRamBattery
                | RomType::Mbc3RamBattery
                | RomType::Mbc5RamBattery
                | RomType::Mbc5RumbleRamBattery
        )
    }

    pub fn has_rtc(&self) -> bool {
        matches!(
            self,
            RomType::Mbc3TimerBattery | RomType::Mbc3TimerRamBattery
        )
    }
}

impl Display for RomType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The ROM size as encoded in byte 0x0148 of the header, the
/// special 0x52-0x54 codes cover the odd 1.1/1.2/1.5 MB layouts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomSize {
    Size32K,
    Size64K,
    Size128K,
    Size256K,
    Size512K,
    Size1M,
    Size2M,
    Size4M,
    Size8M,
    Size1M1,
    Size1M2,
    Size1M5,
    SizeUnknown,
}

impl RomSize {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => RomSize::Size32K,
            0x01 => RomSize::Size64K,
            0x02 => RomSize::Size128K,
            0x03 => RomSize::Size256K,
            0x04 => RomSize::Size512K,
            0x05 => RomSize::Size1M,
            0x06 => RomSize::Size2M,
            0x07 => RomSize::Size4M,
            0x08 => RomSize::Size8M,
            0x52 => RomSize::Size1M1,
            0x53 => RomSize::Size1M2,
            0x54 => RomSize::Size1M5,
            _ => RomSize::SizeUnknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RomSize::Size32K => "32 KB",
            RomSize::Size64K => "64 KB",
            RomSize::Size128K => "128 KB",
            RomSize::Size256K => "256 KB",
            RomSize::Size512K => "512 KB",
            RomSize::Size1M => "1 MB",
            RomSize::Size2M => "2 MB",
            RomSize::Size4M => "4 MB",
            RomSize::Size8M => "8 MB",
            RomSize::Size1M1 => "1.1 MB",
            RomSize::Size1M2 => "1.2 MB",
            RomSize::Size1M5 => "1.5 MB",
            RomSize::SizeUnknown => "Unknown",
        }
    }

    pub fn rom_banks(&self) -> u16 {
        match self {
            RomSize::Size32K => 2,
            RomSize::Size64K => 4,
            RomSize::Size128K => 8,
            RomSize::Size256K => 16,
            RomSize::Size512K => 32,
            RomSize::Size1M => 64,
            RomSize::Size2M => 128,
            RomSize::Size4M => 256,
            RomSize::Size8M => 512,
            RomSize::Size1M1 => 72,
            RomSize::Size1M2 => 80,
            RomSize::Size1M5 => 96,
            RomSize::SizeUnknown => 0,
        }
    }
}

impl Display for RomSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The external RAM size as encoded in byte 0x0149 of the header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RamSize {
    NoRam,
    Size2K,
    Size8K,
    Size32K,
    Size64K,
    Size128K,
    SizeUnknown,
}

impl RamSize {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => RamSize::NoRam,
            0x01 => RamSize::Size2K,
            0x02 => RamSize::Size8K,
            0x03 => RamSize::Size32K,
            0x04 => RamSize::Size128K,
            0x05 => RamSize::Size64K,
            _ => RamSize::SizeUnknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RamSize::NoRam => "No RAM",
            RamSize::Size2K => "2 KB",
            RamSize::Size8K => "8 KB",
            RamSize::Size32K => "32 KB",
            RamSize::Size64K => "64 KB",
            RamSize::Size128K => "128 KB",
            RamSize::SizeUnknown => "Unknown",
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            RamSize::NoRam => 0,
            RamSize::Size2K => 2048,
            RamSize::Size8K => 8192,
            RamSize::Size32K => 32768,
            RamSize::Size64K => 65536,
            RamSize::Size128K => 131072,
            RamSize::SizeUnknown => 0,
        }
    }

    pub fn ram_banks(&self) -> u16 {
        match self {
            RamSize::NoRam => 0,
            RamSize::Size2K => 1,
            RamSize::Size8K => 1,
            RamSize::Size32K => 4,
            RamSize::Size64K => 8,
            RamSize::Size128K => 16,
            RamSize::SizeUnknown => 0,
        }
    }
}

impl Display for RamSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The MBC3 real-time clock.
///
/// Registers tick from wall-clock time, lazily cascaded whenever the
/// clock is touched. Reads always go through the latched snapshot,
/// the latch operation copies the live registers into it.
pub struct Rtc {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days_low: u8,

    /// Bit 0 is the ninth day bit, bit 6 halts the clock and
    /// bit 7 flags a day counter overflow.
    days_high: u8,

    /// Snapshot of the five registers frozen by the latch
    /// sequence, the values visible through the RAM window.
    latched: [u8; RTC_STATE_SIZE],

    /// Unix timestamp of the moment the live registers were
    /// last brought up to date.
    last_update: u64,
}

impl Rtc {
    pub fn new() -> Self {
        Self {
            seconds: 0,
            minutes: 0,
            hours: 0,
            days_low: 0,
            days_high: 0,
            latched: [0u8; RTC_STATE_SIZE],
            last_update: timestamp(),
        }
    }

    /// Cascades the wall-clock seconds elapsed since the last update
    /// into the live registers, honoring the halt flag.
    pub fn update(&mut self) {
        let now = timestamp();
        if self.days_high & 0x40 != 0 {
            self.last_update = now;
            return;
        }

        let elapsed = now.saturating_sub(self.last_update);
        if elapsed == 0 {
            return;
        }
        self.last_update = now;

        let seconds = self.seconds as u64 + elapsed;
        self.seconds = (seconds % 60) as u8;

        let minutes = self.minutes as u64 + seconds / 60;
        self.minutes = (minutes % 60) as u8;

        let hours = self.hours as u64 + minutes / 60;
        self.hours = (hours % 24) as u8;

        let mut days = (self.days_low as u64 | ((self.days_high as u64 & 0x01) << 8)) + hours / 24;
        if days >= 512 {
            // the 9-bit day counter wrapped, the overflow flag is
            // sticky until software clears it
            days %= 512;
            self.days_high |= 0x80;
        }
        self.days_low = days as u8;
        self.days_high = (self.days_high & 0xc0) | ((days >> 8) as u8 & 0x01);
    }

    /// Freezes the live registers into the readable snapshot.
    pub fn latch(&mut self) {
        self.update();
        self.latched = [
            self.seconds,
            self.minutes,
            self.hours,
            self.days_low,
            self.days_high,
        ];
    }

    pub fn read(&self, select: u8) -> u8 {
        match select {
            0x08..=0x0c => self.latched[(select - 0x08) as usize],
            _ => 0xff,
        }
    }

    pub fn write(&mut self, select: u8, value: u8) {
        self.update();
        match select {
            0x08 => self.seconds = value,
            0x09 => self.minutes = value,
            0x0a => self.hours = value,
            0x0b => self.days_low = value,
            0x0c => self.days_high = value,
            _ => (),
        }
        self.last_update = timestamp();
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.update();
        let mut cursor = Cursor::new(vec![]);
        for value in [
            self.seconds,
            self.minutes,
            self.hours,
            self.days_low,
            self.days_high,
        ] {
            write_u8(&mut cursor, value)?;
        }
        Ok(cursor.into_inner())
    }

    pub fn from_bytes(&mut self, data: &[u8]) {
        let mut cursor = Cursor::new(data);
        self.seconds = read_u8(&mut cursor).unwrap_or(0);
        self.minutes = read_u8(&mut cursor).unwrap_or(0);
        self.hours = read_u8(&mut cursor).unwrap_or(0);
        self.days_low = read_u8(&mut cursor).unwrap_or(0);
        self.days_high = read_u8(&mut cursor).unwrap_or(0);
        self.latched = [
            self.seconds,
            self.minutes,
            self.hours,
            self.days_low,
            self.days_high,
        ];
        self.last_update = timestamp();
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

/// The bank controller state of a cartridge, a tagged variant per
/// controller family so that the hot memory path dispatches through
/// a plain match instead of dynamic calls.
pub enum Mbc {
    None,
    Mbc1 {
        /// The 5 low bits of the ROM bank, never zero (selecting
        /// bank zero quietly maps to bank one).
        rom_bank: u8,

        /// The 2-bit secondary register, high ROM bits in simple
        /// mode and the RAM bank index in advanced mode.
        secondary: u8,

        /// The banking mode latch (false=simple, true=advanced).
        mode: bool,

        ram_enabled: bool,
    },
    Mbc3 {
        /// The 7-bit ROM bank, never zero.
        rom_bank: u8,

        /// The RAM bank / RTC register selection (0x00-0x03 selects
        /// a RAM bank, 0x08-0x0C an RTC register).
        select: u8,

        ram_enabled: bool,

        /// Previous value written to the latch range, the latch
        /// triggers on a 0x00 then 0x01 sequence.
        latch_data: u8,

        rtc: Option<Rtc>,
    },
    Mbc5 {
        /// The full 9-bit ROM bank, bank zero is a legal selection.
        rom_bank: u16,

        /// The 4-bit RAM bank.
        ram_bank: u8,

        ram_enabled: bool,
    },
}

impl Mbc {
    /// Builds the initial controller state for the provided cartridge
    /// type, failing for recognized types with no implementation.
    pub fn for_type(rom_type: RomType) -> Result<Self, Error> {
        match rom_type {
            RomType::RomOnly => Ok(Mbc::None),
            RomType::Mbc1 | RomType::Mbc1Ram | RomType::Mbc1RamBattery => Ok(Mbc::Mbc1 {
                rom_bank: 1,
                secondary: 0,
                mode: false,
                ram_enabled: false,
            }),
            RomType::Mbc3TimerBattery
            | RomType::Mbc3TimerRamBattery
            | RomType::Mbc3
            | RomType::Mbc3Ram
            | RomType::Mbc3RamBattery => Ok(Mbc::Mbc3 {
                rom_bank: 1,
                select: 0,
                ram_enabled: false,
                latch_data: 0xff,
                rtc: if rom_type.has_rtc() {
                    Some(Rtc::new())
                } else {
                    None
                },
            }),
            RomType::Mbc5
            | RomType::Mbc5Ram
            | RomType::Mbc5RamBattery
            | RomType::Mbc5Rumble
            | RomType::Mbc5RumbleRam
            | RomType::Mbc5RumbleRamBattery => Ok(Mbc::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enabled: false,
            }),
            rom_type => Err(Error::UnsupportedCartridge(String::from(
                rom_type.description(),
            ))),
        }
    }
}

/// Structure that defines a Game Boy cartridge, both the ROM
/// contents and the associated bank controller state. Correctly
/// addresses the specifics of all the supported MBCs (Memory
/// Bank Controllers).
pub struct Cartridge {
    /// The complete data of the ROM cartridge, including the
    /// complete set of ROM banks.
    rom_data: Vec<u8>,

    /// The external RAM of the cartridge, possibly battery
    /// backed, sized according to the header.
    ram_data: Vec<u8>,

    /// The cartridge type as parsed from the header.
    rom_type: RomType,

    /// The bank controller state in charge of the memory access
    /// for the current cartridge.
    mbc: Mbc,

    /// The number of ROM banks (of 16KB) that are available
    /// to the current cartridge, a computed value to allow
    /// improved performance.
    rom_bank_count: u16,

    /// The number of RAM banks (of 8KB) that are available
    /// to the current cartridge, a computed value to allow
    /// improved performance.
    ram_bank_count: u16,
}

impl Cartridge {
    pub fn from_data(data: &[u8]) -> Result<Self, Error> {
        if data.len() < MIN_ROM_SIZE {
            return Err(Error::RomTooSmall);
        }
        let rom_type = RomType::from_u8(data[0x0147])?;
        let mbc = Mbc::for_type(rom_type)?;
        let rom_size = RomSize::from_u8(data[0x0148]);
        let ram_size = RamSize::from_u8(data[0x0149]);
        let mut cartridge = Self {
            rom_data: data.to_vec(),
            ram_data: vec![],
            rom_type,
            mbc,
            rom_bank_count: rom_size.rom_banks(),
            ram_bank_count: ram_size.ram_banks(),
        };
        cartridge.allocate_ram(ram_size);
        Ok(cartridge)
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let data = read_file(path)?;
        Self::from_data(&data)
    }

    fn allocate_ram(&mut self, ram_size: RamSize) {
        self.ram_data = vec![0u8; ram_size.size_bytes()];
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let bank = match &self.mbc {
            Mbc::None => (addr >> 14) as usize,
            Mbc::Mbc1 {
                rom_bank,
                secondary,
                mode,
                ..
            } => match addr {
                // 0x0000-0x3FFF - ROM bank X0, remapped by the
                // secondary register in advanced mode only
                0x0000..=0x3fff => {
                    if *mode {
                        ((*secondary as usize) << 5) % self.rom_bank_count.max(1) as usize
                    } else {
                        0
                    }
                }
                // 0x4000-0x7FFF - ROM bank 01-7F
                _ => {
                    (((*secondary as usize) << 5) | *rom_bank as usize)
                        % self.rom_bank_count.max(1) as usize
                }
            },
            Mbc::Mbc3 { rom_bank, .. } => match addr {
                0x0000..=0x3fff => 0,
                _ => *rom_bank as usize % self.rom_bank_count.max(1) as usize,
            },
            Mbc::Mbc5 { rom_bank, .. } => match addr {
                0x0000..=0x3fff => 0,
                // banks addressing beyond the physical ROM are
                // left unmapped
                _ => {
                    if *rom_bank >= self.rom_bank_count {
                        return 0xff;
                    }
                    *rom_bank as usize
                }
            },
        };
        let offset = bank * ROM_BANK_SIZE + (addr as usize & 0x3fff);
        *self.rom_data.get(offset).unwrap_or(&0xff)
    }

    pub fn write_rom(&mut self, addr: u16, value: u8) {
        match &mut self.mbc {
            Mbc::None => debugln!(
                "Ignoring write to ROM-only cartridge location 0x{:04x}",
                addr
            ),
            Mbc::Mbc1 {
                rom_bank,
                secondary,
                mode,
                ram_enabled,
            } => match addr {
                // 0x0000-0x1FFF - RAM enabled flag
                0x0000..=0x1fff => *ram_enabled = value & 0x0f == 0x0a,
                // 0x2000-0x3FFF - ROM bank selection 5 lower bits
                0x2000..=0x3fff => {
                    let mut bank = value & 0x1f;
                    if bank == 0 {
                        bank = 1;
                    }
                    *rom_bank = bank;
                }
                // 0x4000-0x5FFF - Secondary banking register
                0x4000..=0x5fff => *secondary = value & 0x03,
                // 0x6000-0x7FFF - Banking mode selection
                _ => *mode = value & 0x01 == 0x01,
            },
            Mbc::Mbc3 {
                rom_bank,
                select,
                ram_enabled,
                latch_data,
                rtc,
            } => match addr {
                // 0x0000-0x1FFF - RAM and RTC enabled flag
                0x0000..=0x1fff => *ram_enabled = value & 0x0f == 0x0a,
                // 0x2000-0x3FFF - ROM bank selection
                0x2000..=0x3fff => {
                    let mut bank = value & 0x7f;
                    if bank == 0 {
                        bank = 1;
                    }
                    *rom_bank = bank;
                }
                // 0x4000-0x5FFF - RAM bank or RTC register selection
                0x4000..=0x5fff => *select = value,
                // 0x6000-0x7FFF - RTC latch, triggered by a 0x00
                // then 0x01 write sequence
                _ => {
                    if *latch_data == 0x00 && value == 0x01 {
                        if let Some(rtc) = rtc {
                            rtc.latch();
                        }
                    }
                    *latch_data = value;
                }
            },
            Mbc::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enabled,
            } => match addr {
                // 0x0000-0x1FFF - RAM enabled flag
                0x0000..=0x1fff => *ram_enabled = value & 0x0f == 0x0a,
                // 0x2000-0x2FFF - ROM bank selection 8 lower bits
                0x2000..=0x2fff => *rom_bank = (*rom_bank & 0x0100) | value as u16,
                // 0x3000-0x3FFF - ROM bank selection 9th bit
                0x3000..=0x3fff => *rom_bank = (*rom_bank & 0x00ff) | (((value & 0x01) as u16) << 8),
                // 0x4000-0x5FFF - RAM bank selection
                0x4000..=0x5fff => *ram_bank = value & 0x0f,
                // 0x6000-0x7FFF - Unused
                _ => (),
            },
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        match &self.mbc {
            Mbc::None => 0xff,
            Mbc::Mbc1 {
                secondary,
                mode,
                ram_enabled,
                ..
            } => {
                if !*ram_enabled {
                    return 0xff;
                }
                let bank = if *mode { *secondary } else { 0 };
                self.ram_byte(bank, addr)
            }
            Mbc::Mbc3 {
                select,
                ram_enabled,
                rtc,
                ..
            } => {
                if !*ram_enabled {
                    return 0xff;
                }
                match *select {
                    0x00..=0x03 => self.ram_byte(*select, addr),
                    0x08..=0x0c => rtc.as_ref().map_or(0xff, |rtc| rtc.read(*select)),
                    _ => 0xff,
                }
            }
            Mbc::Mbc5 {
                ram_bank,
                ram_enabled,
                ..
            } => {
                if !*ram_enabled {
                    return 0xff;
                }
                self.ram_byte(*ram_bank, addr)
            }
        }
    }

    pub fn write_ram(&mut self, addr: u16, value: u8) {
        let ram_bank_count = self.ram_bank_count;
        match &mut self.mbc {
            Mbc::None => (),
            Mbc::Mbc1 {
                secondary,
                mode,
                ram_enabled,
                ..
            } => {
                if !*ram_enabled {
                    return;
                }
                let bank = if *mode { *secondary } else { 0 };
                if bank as u16 >= ram_bank_count {
                    return;
                }
                let offset = bank as usize * RAM_BANK_SIZE + (addr as usize & 0x1fff);
                if let Some(byte) = self.ram_data.get_mut(offset) {
                    *byte = value;
                }
            }
            Mbc::Mbc3 {
                select,
                ram_enabled,
                rtc,
                ..
            } => {
                if !*ram_enabled {
                    return;
                }
                match *select {
                    0x00..=0x03 => {
                        if *select as u16 >= ram_bank_count {
                            return;
                        }
                        let offset = *select as usize * RAM_BANK_SIZE + (addr as usize & 0x1fff);
                        if let Some(byte) = self.ram_data.get_mut(offset) {
                            *byte = value;
                        }
                    }
                    0x08..=0x0c => {
                        if let Some(rtc) = rtc {
                            rtc.write(*select, value);
                        }
                    }
                    _ => (),
                }
            }
            Mbc::Mbc5 {
                ram_bank,
                ram_enabled,
                ..
            } => {
                if !*ram_enabled {
                    return;
                }
                if *ram_bank as u16 >= ram_bank_count {
                    return;
                }
                let offset = *ram_bank as usize * RAM_BANK_SIZE + (addr as usize & 0x1fff);
                if let Some(byte) = self.ram_data.get_mut(offset) {
                    *byte = value;
                }
            }
        }
    }

    fn ram_byte(&self, bank: u8, addr: u16) -> u8 {
        if bank as u16 >= self.ram_bank_count {
            return 0xff;
        }
        let offset = bank as usize * RAM_BANK_SIZE + (addr as usize & 0x1fff);
        *self.ram_data.get(offset).unwrap_or(&0xff)
    }

    pub fn title(&self) -> String {
        let mut end = 0x0134;
        for byte in &self.rom_data[0x0134..0x0144] {
            if *byte == 0u8 {
                break;
            }
            end += 1;
        }
        String::from(
            std::str::from_utf8(&self.rom_data[0x0134..end])
                .unwrap_or("")
                .trim(),
        )
    }

    pub fn rom_type(&self) -> RomType {
        self.rom_type
    }

    pub fn rom_size(&self) -> RomSize {
        RomSize::from_u8(self.rom_data[0x0148])
    }

    pub fn ram_size(&self) -> RamSize {
        RamSize::from_u8(self.rom_data[0x0149])
    }

    pub fn rom_bank_count(&self) -> u16 {
        self.rom_bank_count
    }

    pub fn checksum(&self) -> u8 {
        let mut sum: u8 = 0;
        for i in 0x0134..=0x014c {
            sum = sum.wrapping_sub(self.rom_data[i]).wrapping_sub(1);
        }
        sum
    }

    pub fn valid_checksum(&self) -> bool {
        self.rom_data[0x014d] == self.checksum()
    }

    pub fn has_battery(&self) -> bool {
        self.rom_type.has_battery()
    }

    /// Size in bytes of the battery blob produced by
    /// [`Cartridge::get_external_ram`].
    pub fn external_ram_size(&self) -> usize {
        self.ram_data.len()
            + if self.rom_type.has_rtc() {
                RTC_STATE_SIZE
            } else {
                0
            }
    }

    /// Exports the battery backed state of the cartridge as an
    /// opaque byte blob, the external RAM contents optionally
    /// followed by the RTC registers.
    pub fn get_external_ram(&mut self) -> Vec<u8> {
        let mut data = self.ram_data.clone();
        if let Mbc::Mbc3 { rtc: Some(rtc), .. } = &mut self.mbc {
            if let Ok(bytes) = rtc.to_bytes() {
                data.extend(bytes);
            }
        }
        data
    }

    /// Restores a battery blob previously produced by
    /// [`Cartridge::get_external_ram`], blobs of mismatched size
    /// are silently ignored.
    pub fn load_external_ram(&mut self, data: &[u8]) {
        if data.len() != self.external_ram_size() {
            debugln!(
                "Ignoring battery blob of unexpected size {} bytes",
                data.len()
            );
            return;
        }
        let ram_len = self.ram_data.len();
        self.ram_data.copy_from_slice(&data[..ram_len]);
        if let Mbc::Mbc3 { rtc: Some(rtc), .. } = &mut self.mbc {
            rtc.from_bytes(&data[ram_len..]);
        }
    }

    pub fn rom_data(&self) -> &Vec<u8> {
        &self.rom_data
    }

    pub fn ram_data(&self) -> &Vec<u8> {
        &self.ram_data
    }

    pub fn set_ram_data(&mut self, data: &[u8]) {
        if data.len() != self.ram_data.len() {
            return;
        }
        self.ram_data.copy_from_slice(data);
    }

    pub fn description(&self, column_length: usize) -> String {
        let title_l = format!("{:width$}", "Title", width = column_length);
        let type_l = format!("{:width$}", "Type", width = column_length);
        let rom_size_l = format!("{:width$}", "ROM Size", width = column_length);
        let ram_size_l = format!("{:width$}", "RAM Size", width = column_length);
        format!(
            "{}  {}\n{}  {}\n{}  {}\n{}  {}",
            title_l,
            self.title(),
            type_l,
            self.rom_type(),
            rom_size_l,
            self.rom_size(),
            ram_size_l,
            self.ram_size()
        )
    }
}

impl Display for Cartridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description(9))
    }
}
