//! General purpose 32-bit timer
//!
//! One page of word-only registers:
//!
//! | offset | register | meaning                                            |
//! |--------|----------|----------------------------------------------------|
//! | 0x00   | CTRL     | 6:4 prescaler select, 3 auto-reload, 2 prescaler   |
//! |        |          | enable, 1 interrupt enable, 0 start                |
//! | 0x04   | COUNT    | current count                                      |
//! | 0x08   | RELOAD   | value loaded into COUNT on overflow (auto-reload)  |
//! | 0x0c   | MATCH    | COUNT value which flags a match                    |
//! | 0x10   | IE       | 1 match interrupt enable, 0 overflow enable        |
//! | 0x14   | IP       | 1 match flagged, 0 overflow flagged (read only)    |
//! | 0x18   | IA       | write 1 to clear the matching IP bit (write only)  |
//!
//! With the prescaler enabled, the count advances once every
//! 2^(select+1) cycles; otherwise it advances every cycle.

use crate::bus::{AddressTrap, BusAccess, Peripheral};

use super::InterruptSource;

const REG_CTRL: u32 = 0;
const REG_COUNT: u32 = 1;
const REG_RELOAD: u32 = 2;
const REG_MATCH: u32 = 3;
const REG_IE: u32 = 4;
const REG_IP: u32 = 5;
const REG_IA: u32 = 6;

const CTRL_AUTO_RELOAD: u32 = 1 << 3;
const CTRL_PRESCALER_ENABLE: u32 = 1 << 2;
const CTRL_INTERRUPT_ENABLE: u32 = 1 << 1;
const CTRL_START: u32 = 1 << 0;

const FLAG_MATCH: u32 = 1 << 1;
const FLAG_OVERFLOW: u32 = 1 << 0;

#[derive(Debug, Default)]
pub struct Timer {
    /// Prescaler select, 0 to 7
    prescaler_select: u32,
    auto_reload: bool,
    prescaler_enable: bool,
    interrupt_enable: bool,
    running: bool,
    prescaler_counter: u32,
    counter: u32,
    reload: u32,
    match_value: u32,
    match_interrupt_enable: bool,
    overflow_interrupt_enable: bool,
    match_flagged: bool,
    overflow_flagged: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cycles per count when the prescaler is enabled
    pub fn prescaler_period(&self) -> u32 {
        2 << self.prescaler_select
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn match_flagged(&self) -> bool {
        self.match_flagged
    }

    pub fn overflow_flagged(&self) -> bool {
        self.overflow_flagged
    }

    /// Advance the count by one cycle
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        let increment = if self.prescaler_enable {
            self.prescaler_counter += 1;
            if self.prescaler_counter >= self.prescaler_period() {
                self.prescaler_counter = 0;
                true
            } else {
                false
            }
        } else {
            true
        };
        if !increment {
            return;
        }
        if self.counter == u32::MAX {
            self.overflow_flagged = true;
            self.counter = if self.auto_reload { self.reload } else { 0 };
        } else {
            self.counter += 1;
        }
        if self.counter == self.match_value {
            self.match_flagged = true;
        }
    }

    fn ctrl(&self) -> u32 {
        let mut ctrl = self.prescaler_select << 4;
        if self.auto_reload {
            ctrl |= CTRL_AUTO_RELOAD;
        }
        if self.prescaler_enable {
            ctrl |= CTRL_PRESCALER_ENABLE;
        }
        if self.interrupt_enable {
            ctrl |= CTRL_INTERRUPT_ENABLE;
        }
        if self.running {
            ctrl |= CTRL_START;
        }
        ctrl
    }

    fn set_ctrl(&mut self, value: u32) {
        self.prescaler_select = (value >> 4) & 0b111;
        self.auto_reload = value & CTRL_AUTO_RELOAD != 0;
        self.prescaler_enable = value & CTRL_PRESCALER_ENABLE != 0;
        self.interrupt_enable = value & CTRL_INTERRUPT_ENABLE != 0;
        self.running = value & CTRL_START != 0;
    }

    fn flags(match_bit: bool, overflow_bit: bool) -> u32 {
        let mut flags = 0;
        if match_bit {
            flags |= FLAG_MATCH;
        }
        if overflow_bit {
            flags |= FLAG_OVERFLOW;
        }
        flags
    }
}

impl Peripheral for Timer {
    fn number_of_pages(&self) -> u32 {
        1
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, AddressTrap> {
        match (offset & 0xfff) >> 2 {
            REG_CTRL => Ok(self.ctrl()),
            REG_COUNT => Ok(self.counter),
            REG_RELOAD => Ok(self.reload),
            REG_MATCH => Ok(self.match_value),
            REG_IE => Ok(Self::flags(
                self.match_interrupt_enable,
                self.overflow_interrupt_enable,
            )),
            REG_IP => Ok(Self::flags(self.match_flagged, self.overflow_flagged)),
            _ => Err(AddressTrap::load_fault(offset)),
        }
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), AddressTrap> {
        match (offset & 0xfff) >> 2 {
            REG_CTRL => self.set_ctrl(value),
            REG_COUNT => self.counter = value,
            REG_RELOAD => self.reload = value,
            REG_MATCH => self.match_value = value,
            REG_IE => {
                self.match_interrupt_enable = value & FLAG_MATCH != 0;
                self.overflow_interrupt_enable = value & FLAG_OVERFLOW != 0;
            }
            REG_IA => {
                if value & FLAG_MATCH != 0 {
                    self.match_flagged = false;
                }
                if value & FLAG_OVERFLOW != 0 {
                    self.overflow_flagged = false;
                }
            }
            _ => return Err(AddressTrap::store_fault(offset)),
        }
        Ok(())
    }

    fn cycle(&mut self, _bus: &mut dyn BusAccess) {
        self.tick();
    }
}

impl InterruptSource for Timer {
    fn interrupt_asserted(&self) -> bool {
        self.interrupt_enable
            && ((self.match_interrupt_enable && self.match_flagged)
                || (self.overflow_interrupt_enable && self.overflow_flagged))
    }

    /// Software clears the flags through IA, so there is nothing to
    /// do here
    fn acknowledge_interrupt(&mut self) {}
}
