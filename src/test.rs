//! Test and benchmark support utilities.

use crate::{gb::GameBoy, rom::ROM_BANK_SIZE};

/// Builds a synthetic ROM image with a valid header, the requested
/// controller type byte, ROM bank count and RAM size code. The
/// first byte of every bank is stamped with `0x10 + bank` so that
/// banking behavior can be asserted.
pub fn build_rom(rom_type: u8, rom_banks: usize, ram_size: u8) -> Vec<u8> {
    let mut data = vec![0x00; rom_banks * ROM_BANK_SIZE];
    data[0x0134..0x013f].copy_from_slice(b"MATCHA TEST");
    data[0x0147] = rom_type;
    data[0x0148] = rom_size_code(rom_banks);
    data[0x0149] = ram_size;

    let mut sum: u8 = 0;
    for i in 0x0134..=0x014c {
        sum = sum.wrapping_sub(data[i]).wrapping_sub(1);
    }
    data[0x014d] = sum;

    for bank in 0..rom_banks {
        data[bank * ROM_BANK_SIZE] = 0x10u8.wrapping_add(bank as u8);
    }
    data
}

/// Builds a booted emulator with the provided ROM image loaded,
/// ready to be clocked.
pub fn build_gb(data: &[u8]) -> GameBoy {
    let mut game_boy = GameBoy::new();
    game_boy.load_rom(data, None).unwrap();
    game_boy.boot();
    game_boy
}

fn rom_size_code(rom_banks: usize) -> u8 {
    match rom_banks {
        2 => 0x00,
        4 => 0x01,
        8 => 0x02,
        16 => 0x03,
        32 => 0x04,
        64 => 0x05,
        128 => 0x06,
        256 => 0x07,
        512 => 0x08,
        _ => 0x00,
    }
}
