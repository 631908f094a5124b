//! Gamepad (Joypad) functions and structures.

use matcha_common::util::SharedMut;

use crate::{
    consts::JOYP_ADDR,
    irq::{Interrupt, InterruptController},
    warnln,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadKey {
    Up,
    Down,
    Left,
    Right,
    Start,
    Select,
    A,
    B,
}

pub struct Pad {
    down: bool,
    up: bool,
    left: bool,
    right: bool,
    start: bool,
    select: bool,
    b: bool,
    a: bool,

    /// Select lines written through JOYP bits 4 and 5, stored
    /// active-high (true means the group is selected).
    select_direction: bool,
    select_action: bool,

    int: SharedMut<InterruptController>,
}

impl Pad {
    pub fn new(int: SharedMut<InterruptController>) -> Self {
        Self {
            down: false,
            up: false,
            left: false,
            right: false,
            start: false,
            select: false,
            b: false,
            a: false,
            select_direction: false,
            select_action: false,
            int,
        }
    }

    pub fn reset(&mut self) {
        self.down = false;
        self.up = false;
        self.left = false;
        self.right = false;
        self.start = false;
        self.select = false;
        self.b = false;
        self.a = false;
        self.select_direction = false;
        self.select_action = false;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            JOYP_ADDR => {
                // pressed buttons pull their line low, with no group
                // selected (or nothing pressed) the nibble reads high
                let mut nibble = 0x0f;
                if self.select_direction {
                    nibble &= if self.right { 0x00 } else { 0x01 }
                        | if self.left { 0x00 } else { 0x02 }
                        | if self.up { 0x00 } else { 0x04 }
                        | if self.down { 0x00 } else { 0x08 };
                }
                if self.select_action {
                    nibble &= if self.a { 0x00 } else { 0x01 }
                        | if self.b { 0x00 } else { 0x02 }
                        | if self.select { 0x00 } else { 0x04 }
                        | if self.start { 0x00 } else { 0x08 };
                }
                0xc0 | if self.select_direction { 0x00 } else { 0x10 }
                    | if self.select_action { 0x00 } else { 0x20 }
                    | nibble
            }
            _ => {
                warnln!("Reading from unknown Pad location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            JOYP_ADDR => {
                self.select_direction = value & 0x10 == 0x00;
                self.select_action = value & 0x20 == 0x00;
            }
            _ => warnln!("Writing to unknown Pad location 0x{:04x}", addr),
        }
    }

    pub fn key_press(&mut self, key: PadKey) {
        let state = self.key_state_mut(key);
        let pressed = *state;
        *state = true;
        if !pressed {
            self.int.borrow_mut().request(Interrupt::Joypad);
        }
    }

    pub fn key_lift(&mut self, key: PadKey) {
        *self.key_state_mut(key) = false;
    }

    fn key_state_mut(&mut self, key: PadKey) -> &mut bool {
        match key {
            PadKey::Up => &mut self.up,
            PadKey::Down => &mut self.down,
            PadKey::Left => &mut self.left,
            PadKey::Right => &mut self.right,
            PadKey::Start => &mut self.start,
            PadKey::Select => &mut self.select,
            PadKey::A => &mut self.a,
            PadKey::B => &mut self.b,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::irq::InterruptController;

    use super::{Pad, PadKey, JOYP_ADDR};

    fn build_pad() -> Pad {
        let pad = Pad::new(Rc::new(RefCell::new(InterruptController::new())));
        pad.int.borrow_mut().write_enable(0x1f);
        pad
    }

    #[test]
    fn test_read_no_selection() {
        let mut pad = build_pad();
        pad.key_press(PadKey::A);
        assert_eq!(pad.read(JOYP_ADDR), 0xff);
    }

    #[test]
    fn test_read_action_group() {
        let mut pad = build_pad();
        pad.write(JOYP_ADDR, 0x10);
        assert_eq!(pad.read(JOYP_ADDR), 0xdf);

        pad.key_press(PadKey::A);
        pad.key_press(PadKey::Start);
        assert_eq!(pad.read(JOYP_ADDR), 0xd6);

        // direction keys should not leak into the action view
        pad.key_press(PadKey::Left);
        assert_eq!(pad.read(JOYP_ADDR), 0xd6);
    }

    #[test]
    fn test_read_direction_group() {
        let mut pad = build_pad();
        pad.write(JOYP_ADDR, 0x20);
        pad.key_press(PadKey::Down);
        assert_eq!(pad.read(JOYP_ADDR), 0xe7);
    }

    #[test]
    fn test_interrupt_on_edge() {
        let mut pad = build_pad();
        pad.key_press(PadKey::B);
        assert_eq!(pad.int.borrow().pending(), 0x10);

        // holding the key does not re-trigger
        pad.int.borrow_mut().write_flags(0x00);
        pad.key_press(PadKey::B);
        assert_eq!(pad.int.borrow().pending(), 0x00);

        pad.key_lift(PadKey::B);
        pad.key_press(PadKey::B);
        assert_eq!(pad.int.borrow().pending(), 0x10);
    }
}
