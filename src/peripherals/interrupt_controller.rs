//! Interrupt controller
//!
//! Arbitrates up to 32 interrupt lines onto the hart's single
//! external interrupt. Each line has an enable bit, a 5-bit priority
//! (lower value is more urgent) and a pending flag, and the whole
//! controller has a master enable.
//!
//! The controller occupies four pages. Its registers are 32 bits
//! wide and only word access is allowed:
//!
//! | offset        | register | meaning                                        |
//! |---------------|----------|------------------------------------------------|
//! | 0x000         | MIS      | bit 31 master enable, low bits current line    |
//! | 0x004         | IER      | bit n enables line n                           |
//! | 0x008         | IPR      | bit n set while line n is pending (read only)  |
//! | 0x00c         | IAR      | write 1 to bit n to acknowledge line n         |
//! | 0x010 - 0x08c | PRIOn    | priority of line n, low 5 bits                 |
//!
//! When no line is current, the low 31 bits of MIS read as all ones.

use log::debug;
use thiserror::Error;

use crate::bus::{AddressTrap, BusAccess, Peripheral};

use super::{InterruptSource, SharedInterruptSource};

pub const NUM_LINES: usize = 32;
pub const NUM_PAGES: u32 = 4;

const REG_MIS: u32 = 0;
const REG_IER: u32 = 1;
const REG_IPR: u32 = 2;
const REG_IAR: u32 = 3;
const REG_PRIORITY_BASE: u32 = 4;

const MASTER_ENABLE_BIT: u32 = 0x8000_0000;
const PRIORITY_MASK: u8 = 0x1f;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterruptError {
    #[error("interrupt line {0} does not exist (lines are 0 to 31)")]
    InvalidLine(usize),
}

#[derive(Debug, Default, Clone, Copy)]
struct Line {
    enabled: bool,
    pending: bool,
    priority: u8,
}

#[derive(Default)]
pub struct InterruptController {
    master_enable: bool,
    lines: [Line; NUM_LINES],
    /// The line most recently delivered to the hart, until it is
    /// acknowledged
    current: Option<u8>,
    /// Set whenever anything that could change the arbitration
    /// result happens; cleared when an interrupt is delivered
    state_changed: bool,
    sources: Vec<(usize, SharedInterruptSource)>,
}

fn check_line(line: usize) -> Result<(), InterruptError> {
    if line < NUM_LINES {
        Ok(())
    } else {
        Err(InterruptError::InvalidLine(line))
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_enable(&self) -> bool {
        self.master_enable
    }

    pub fn set_master_enable(&mut self, enable: bool) {
        self.master_enable = enable;
        self.state_changed = true;
    }

    pub fn enabled(&self, line: usize) -> Result<bool, InterruptError> {
        check_line(line)?;
        Ok(self.lines[line].enabled)
    }

    pub fn set_enabled(&mut self, line: usize, enable: bool) -> Result<(), InterruptError> {
        check_line(line)?;
        self.lines[line].enabled = enable;
        self.state_changed = true;
        Ok(())
    }

    pub fn priority(&self, line: usize) -> Result<u8, InterruptError> {
        check_line(line)?;
        Ok(self.lines[line].priority)
    }

    /// Only the low 5 bits of priority are kept
    pub fn set_priority(&mut self, line: usize, priority: u8) -> Result<(), InterruptError> {
        check_line(line)?;
        self.lines[line].priority = priority & PRIORITY_MASK;
        self.state_changed = true;
        Ok(())
    }

    pub fn pending(&self, line: usize) -> Result<bool, InterruptError> {
        check_line(line)?;
        Ok(self.lines[line].pending)
    }

    /// The line last delivered to the hart and not yet acknowledged
    pub fn current_interrupt(&self) -> Option<u8> {
        self.current
    }

    /// Mark a line as pending. Asserting an already pending line
    /// has no effect.
    pub fn assert_interrupt(&mut self, line: usize) -> Result<(), InterruptError> {
        check_line(line)?;
        if !self.lines[line].pending {
            self.lines[line].pending = true;
            self.state_changed = true;
        }
        Ok(())
    }

    /// Clear a line's pending flag and tell its source (if any) that
    /// it has been serviced
    pub fn acknowledge_interrupt(&mut self, line: usize) -> Result<(), InterruptError> {
        check_line(line)?;
        if self.lines[line].pending {
            self.lines[line].pending = false;
            self.state_changed = true;
            if self.current == Some(line as u8) {
                self.current = None;
            }
            for (_, source) in self.sources.iter().filter(|(l, _)| *l == line) {
                source.borrow_mut().acknowledge_interrupt();
            }
            debug!("interrupt line {line} acknowledged");
        }
        Ok(())
    }

    /// Connect a device to a line. The device is polled on every
    /// cycle() and its line asserted while it requests an interrupt.
    pub fn register_source(
        &mut self,
        source: SharedInterruptSource,
        line: usize,
    ) -> Result<(), InterruptError> {
        check_line(line)?;
        self.sources.push((line, source));
        Ok(())
    }

    /// Assert the line of every registered source currently
    /// requesting an interrupt
    pub fn poll_sources(&mut self) {
        let asserted: Vec<usize> = self
            .sources
            .iter()
            .filter(|(_, source)| source.borrow().interrupt_asserted())
            .map(|(line, _)| *line)
            .collect();
        for line in asserted {
            // Lines were checked at registration
            let _ = self.assert_interrupt(line);
        }
    }

    /// The pending and enabled line with the lowest priority value,
    /// with ties going to the lower line number. None if the master
    /// enable is off or no line qualifies.
    pub fn next_interrupt(&self) -> Option<u8> {
        if !self.master_enable {
            return None;
        }
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.pending && line.enabled)
            .min_by_key(|(n, line)| (line.priority, *n))
            .map(|(n, _)| n as u8)
    }

    /// Decide whether to interrupt the hart. Returns the line to
    /// deliver if something has changed since the last delivery,
    /// there is a deliverable line that is not already current, and
    /// the hart is accepting interrupts. The returned line becomes
    /// the current interrupt.
    pub fn dispatch(&mut self, hart_interrupts_enabled: bool) -> Option<u8> {
        if !self.state_changed || !hart_interrupts_enabled {
            return None;
        }
        let next = self.next_interrupt()?;
        if self.current == Some(next) {
            return None;
        }
        self.state_changed = false;
        self.current = Some(next);
        debug!("delivering interrupt line {next}");
        Some(next)
    }

    /// Put the controller back in its power-on state. Registered
    /// sources stay connected.
    pub fn reset(&mut self) {
        self.master_enable = false;
        self.lines = [Line::default(); NUM_LINES];
        self.current = None;
        self.state_changed = false;
    }

    fn enable_register(&self) -> u32 {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.enabled)
            .fold(0, |reg, (n, _)| reg | 1 << n)
    }

    fn pending_register(&self) -> u32 {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.pending)
            .fold(0, |reg, (n, _)| reg | 1 << n)
    }
}

/// Register number for a local offset
fn register_number(offset: u32) -> u32 {
    (offset & 0xfff) >> 2
}

/// Register number of a priority register, as a line number
fn priority_line(reg: u32) -> Option<usize> {
    let line = reg.checked_sub(REG_PRIORITY_BASE)? as usize;
    (line < NUM_LINES).then_some(line)
}

impl Peripheral for InterruptController {
    fn number_of_pages(&self) -> u32 {
        NUM_PAGES
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, AddressTrap> {
        let reg = register_number(offset);
        match reg {
            REG_MIS => {
                let enable = if self.master_enable {
                    MASTER_ENABLE_BIT
                } else {
                    0
                };
                let current = self.current.map_or(!MASTER_ENABLE_BIT, u32::from);
                Ok(enable | current)
            }
            REG_IER => Ok(self.enable_register()),
            REG_IPR => Ok(self.pending_register()),
            REG_IAR => Ok(0),
            _ => match priority_line(reg) {
                Some(line) => Ok(self.lines[line].priority.into()),
                None => Err(AddressTrap::load_fault(offset)),
            },
        }
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), AddressTrap> {
        let reg = register_number(offset);
        match reg {
            REG_MIS => self.set_master_enable(value & MASTER_ENABLE_BIT != 0),
            REG_IER => {
                for n in 0..NUM_LINES {
                    self.lines[n].enabled = (value >> n) & 1 != 0;
                }
                self.state_changed = true;
            }
            REG_IAR => {
                for n in (0..NUM_LINES).filter(|n| (value >> n) & 1 != 0) {
                    // n is always a valid line
                    let _ = self.acknowledge_interrupt(n);
                }
            }
            _ => match priority_line(reg) {
                Some(line) => {
                    self.lines[line].priority = (value as u8) & PRIORITY_MASK;
                    self.state_changed = true;
                }
                None => return Err(AddressTrap::store_fault(offset)),
            },
        }
        Ok(())
    }

    fn cycle(&mut self, _bus: &mut dyn BusAccess) {
        self.poll_sources();
    }
}
