//! Serial transfer (Link Cable) functions and structures.
//!
//! Only the register-side contract is implemented, there is no
//! partner device and a completed transfer reads back 0xFF.

use matcha_common::util::SharedMut;

use crate::{
    consts::{SB_ADDR, SC_ADDR},
    irq::{Interrupt, InterruptController},
    warnln,
};

/// Number of master cycles taken by a complete byte transfer.
pub const SERIAL_TRANSFER_CYCLES: u16 = 512;

pub struct Serial {
    data: u8,
    shift_clock: bool,
    transfer_enabled: bool,
    cycles: u16,
    int: SharedMut<InterruptController>,
}

impl Serial {
    pub fn new(int: SharedMut<InterruptController>) -> Self {
        Self {
            data: 0x00,
            shift_clock: false,
            transfer_enabled: false,
            cycles: 0x0,
            int,
        }
    }

    pub fn reset(&mut self) {
        self.data = 0x00;
        self.shift_clock = false;
        self.transfer_enabled = false;
        self.cycles = 0x0;
    }

    /// Arms the internal transfer countdown, the transfer
    /// completes once it has been fully consumed.
    pub fn start_transfer(&mut self) {
        self.cycles = SERIAL_TRANSFER_CYCLES;
    }

    pub fn clock(&mut self, cycles: u16) {
        // an exchange clocked by the (absent) partner never makes
        // progress, only armed transfers are counted down
        if !self.transfer_enabled || self.cycles == 0 {
            return;
        }

        self.cycles = self.cycles.saturating_sub(cycles);
        if self.cycles == 0 {
            // with no partner attached the line is pulled high,
            // a completed exchange always reads back 0xFF
            self.data = 0xff;
            self.transfer_enabled = false;
            self.int.borrow_mut().request(Interrupt::Serial);
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.data,
            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => {
                (if self.shift_clock { 0x01 } else { 0x00 }
                    | if self.transfer_enabled { 0x80 } else { 0x00 })
                    | 0x7e
            }
            _ => {
                warnln!("Reading from unknown Serial location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.data = value,
            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => {
                self.shift_clock = value & 0x01 == 0x01;
                self.transfer_enabled = value & 0x80 == 0x80;

                // a transfer only starts when this side drives the
                // clock, otherwise the (absent) partner would
                if self.transfer_enabled && self.shift_clock {
                    self.start_transfer();
                }
            }
            _ => warnln!("Writing to unknown Serial location 0x{:04x}", addr),
        }
    }

    #[inline(always)]
    pub fn transferring(&self) -> bool {
        self.transfer_enabled
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::irq::InterruptController;

    use super::{Serial, SB_ADDR, SC_ADDR};

    fn build_serial() -> Serial {
        Serial::new(Rc::new(RefCell::new(InterruptController::new())))
    }

    #[test]
    fn test_transfer_completion() {
        let mut serial = build_serial();
        serial.int.borrow_mut().write_enable(0x1f);

        serial.write(SB_ADDR, 0x42);
        serial.write(SC_ADDR, 0x81);
        assert!(serial.transferring());

        serial.clock(256);
        assert!(serial.transferring());
        assert_eq!(serial.int.borrow().pending(), 0x00);

        serial.clock(256);
        assert!(!serial.transferring());
        assert_eq!(serial.read(SB_ADDR), 0xff);
        assert_eq!(serial.int.borrow().pending(), 0x08);
    }

    #[test]
    fn test_external_clock_idles() {
        let mut serial = build_serial();
        serial.int.borrow_mut().write_enable(0x1f);

        serial.write(SC_ADDR, 0x80);
        serial.clock(1024);
        assert_eq!(serial.int.borrow().pending(), 0x00);
    }

    #[test]
    fn test_control_read_mask() {
        let mut serial = build_serial();
        serial.write(SC_ADDR, 0x81);
        assert_eq!(serial.read(SC_ADDR), 0xff);
        serial.write(SC_ADDR, 0x00);
        assert_eq!(serial.read(SC_ADDR), 0x7e);
    }
}
