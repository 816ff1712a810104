//! Devices that plug into the system bus. Rom and Ram back the
//! program and data regions of the microcontroller; the interrupt
//! controller arbitrates interrupt lines; the timer is a simple
//! counter peripheral that raises interrupts.

use std::cell::RefCell;
use std::rc::Rc;

pub mod interrupt_controller;
pub mod memory;
pub mod ram;
pub mod rom;
pub mod timer;

pub use interrupt_controller::InterruptController;
pub use ram::Ram;
pub use rom::Rom;
pub use timer::Timer;

/// A device which can request an interrupt. The interrupt controller
/// polls interrupt_asserted() once per cycle for each registered
/// source and marks the source's line pending while it is asserted.
pub trait InterruptSource {
    fn interrupt_asserted(&self) -> bool;

    /// Called when the interrupt controller acknowledges the
    /// source's line
    fn acknowledge_interrupt(&mut self);
}

pub type SharedInterruptSource = Rc<RefCell<dyn InterruptSource>>;
