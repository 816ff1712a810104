//! System bus
//!
//! The 32-bit physical address space is divided into 1024-byte
//! pages. A peripheral is attached at a base address and occupies
//! as many consecutive pages as it reports; every access is routed
//! by page number to the owning peripheral, after alignment has
//! been checked, with the address translated down into the
//! peripheral's own window.
//!
//! The bus also holds the load-reserved/store-conditional
//! reservation. There is at most one reservation, at word
//! granularity, and any store to the reserved word (of any width,
//! from the hart or from a peripheral doing DMA through this bus)
//! clears it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

pub const PAGE_SIZE: u32 = 1024;

/// Page number of the page containing address 0xffff_ffff
pub const LAST_VALID_PAGE: u32 = 0xffff_ffff >> 10;

/// The kind of an address trap, corresponding one-to-one with the
/// address-related exception causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressTrapKind {
    InstructionMisaligned,
    InstructionAccessFault,
    LoadMisaligned,
    LoadAccessFault,
    StoreMisaligned,
    StoreAccessFault,
}

impl AddressTrapKind {
    /// The mcause value for this kind of trap
    pub fn cause(&self) -> u32 {
        match self {
            Self::InstructionMisaligned => 0,
            Self::InstructionAccessFault => 1,
            Self::LoadMisaligned => 4,
            Self::LoadAccessFault => 5,
            Self::StoreMisaligned => 6,
            Self::StoreAccessFault => 7,
        }
    }
}

/// A failed bus access. Peripherals construct these with the local
/// offset they were given; the bus replaces it with the physical
/// address before the trap leaves the bus.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("address trap (cause {}) at 0x{address:08x}", .kind.cause())]
pub struct AddressTrap {
    pub kind: AddressTrapKind,
    pub address: u32,
}

impl AddressTrap {
    pub fn new(kind: AddressTrapKind, address: u32) -> Self {
        Self { kind, address }
    }

    pub fn load_misaligned(address: u32) -> Self {
        Self::new(AddressTrapKind::LoadMisaligned, address)
    }

    pub fn load_fault(address: u32) -> Self {
        Self::new(AddressTrapKind::LoadAccessFault, address)
    }

    pub fn store_misaligned(address: u32) -> Self {
        Self::new(AddressTrapKind::StoreMisaligned, address)
    }

    pub fn store_fault(address: u32) -> Self {
        Self::new(AddressTrapKind::StoreAccessFault, address)
    }

    pub fn cause(&self) -> u32 {
        self.kind.cause()
    }

    fn at(self, address: u32) -> Self {
        Self { address, ..self }
    }
}

/// Mask which reduces a physical address to an offset inside a
/// window of the given number of pages. The window is the page
/// count rounded up to a power of two.
pub fn window_mask(pages: u32) -> u32 {
    let window = u64::from(pages) * u64::from(PAGE_SIZE);
    (window.next_power_of_two() - 1) as u32
}

/// A memory-mapped device
///
/// All offsets passed to the read and write functions are local to
/// the device (see translate_address). Any of them may refuse an
/// access by returning an AddressTrap. The defaults for byte and
/// halfword access suit a device with only word-sized registers:
/// byte and halfword reads raise a load-misaligned trap, and writes
/// a store-misaligned trap.
///
/// cycle() is called once per hart instruction. timestep() is called
/// once per coarse tick, and only after every peripheral's cycle()
/// for that tick has returned, so a device may rely on multi-cycle
/// work (such as DMA) of other devices being complete when its
/// timestep() runs. Both are handed the system bus, through which a
/// device may load and store like the hart does. A device reaching
/// its own registers that way gets an access fault.
pub trait Peripheral {
    /// Number of 1024-byte pages occupied by the device
    fn number_of_pages(&self) -> u32;

    /// Convert a physical address into an offset within this
    /// device's window
    fn translate_address(&self, address: u32) -> u32 {
        address & window_mask(self.number_of_pages())
    }

    fn read_byte(&mut self, offset: u32) -> Result<u8, AddressTrap> {
        Err(AddressTrap::load_misaligned(offset))
    }

    fn read_halfword(&mut self, offset: u32) -> Result<u16, AddressTrap> {
        Err(AddressTrap::load_misaligned(offset))
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, AddressTrap>;

    fn write_byte(&mut self, offset: u32, _value: u8) -> Result<(), AddressTrap> {
        Err(AddressTrap::store_misaligned(offset))
    }

    fn write_halfword(&mut self, offset: u32, _value: u16) -> Result<(), AddressTrap> {
        Err(AddressTrap::store_misaligned(offset))
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), AddressTrap>;

    fn cycle(&mut self, _bus: &mut dyn BusAccess) {}

    fn timestep(&mut self, _bus: &mut dyn BusAccess) {}
}

/// Peripherals are shared between the bus and whoever else needs
/// typed access to them (the microcontroller, or the interrupt
/// controller when the device is also an interrupt source).
pub type SharedPeripheral = Rc<RefCell<dyn Peripheral>>;

/// The load/store interface of the bus. This is what the hart
/// executes loads and stores against, and what a DMA-capable device
/// uses to reach memory.
pub trait BusAccess {
    fn load_byte(&mut self, address: u32) -> Result<u8, AddressTrap>;
    fn load_halfword(&mut self, address: u32) -> Result<u16, AddressTrap>;
    fn load_word(&mut self, address: u32) -> Result<u32, AddressTrap>;
    fn store_byte(&mut self, address: u32, value: u8) -> Result<(), AddressTrap>;
    fn store_halfword(&mut self, address: u32, value: u16) -> Result<(), AddressTrap>;
    fn store_word(&mut self, address: u32, value: u32) -> Result<(), AddressTrap>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("peripheral must occupy at least one page")]
    NoPages,
    #[error("base 0x{base:08x} is not aligned to the peripheral window (0x{window:x} bytes)")]
    MisalignedBase { base: u32, window: u64 },
    #[error("peripheral at 0x{base:08x} extends beyond the end of the address space")]
    BeyondAddressSpace { base: u32 },
    #[error("page at 0x{0:08x} is already mapped to another peripheral")]
    PageInUse(u32),
}

/// One attached device: its base address, size in pages, and the
/// device itself
pub struct AddressSpaceEntry {
    pub base: u32,
    pub pages: u32,
    pub peripheral: SharedPeripheral,
}

#[derive(Default)]
pub struct SystemBus {
    entries: Vec<AddressSpaceEntry>,
    /// Page number to index in entries
    page_map: HashMap<u32, usize>,
    /// Reserved word (address >> 2)
    reservation: Option<u32>,
}

impl fmt::Debug for SystemBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let windows: Vec<(u32, u32)> = self
            .entries
            .iter()
            .map(|entry| (entry.base, entry.pages))
            .collect();
        f.debug_struct("SystemBus")
            .field("windows", &windows)
            .field("reservation", &self.reservation.map(|word| word << 2))
            .finish()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a peripheral into the address space at base. Nothing is
    /// mapped if any of its pages is unavailable.
    pub fn attach(
        &mut self,
        peripheral: SharedPeripheral,
        base: u32,
    ) -> Result<(), BusError> {
        let pages = peripheral.borrow().number_of_pages();
        if pages == 0 {
            return Err(BusError::NoPages);
        }
        let window = u64::from(window_mask(pages)) + 1;
        if u64::from(base) % window != 0 {
            return Err(BusError::MisalignedBase { base, window });
        }
        let first_page = base >> 10;
        let last_page = u64::from(first_page) + u64::from(pages) - 1;
        if last_page > u64::from(LAST_VALID_PAGE) {
            return Err(BusError::BeyondAddressSpace { base });
        }
        // Validate everything before mapping anything
        let page_range = first_page..=(last_page as u32);
        if let Some(page) = page_range.clone().find(|page| self.page_map.contains_key(page)) {
            return Err(BusError::PageInUse(page << 10));
        }
        let index = self.entries.len();
        for page in page_range {
            self.page_map.insert(page, index);
        }
        self.entries.push(AddressSpaceEntry {
            base,
            pages,
            peripheral,
        });
        log::debug!("attached peripheral {index} at 0x{base:08x} ({pages} pages)");
        Ok(())
    }

    pub fn entries(&self) -> &[AddressSpaceEntry] {
        &self.entries
    }

    /// Find the peripheral containing address, and the offset of
    /// address within it
    fn route(&self, address: u32) -> Option<(&SharedPeripheral, u32)> {
        let index = *self.page_map.get(&(address >> 10))?;
        let peripheral = &self.entries[index].peripheral;
        let offset = peripheral.try_borrow().ok()?.translate_address(address);
        Some((peripheral, offset))
    }

    /// Read the instruction word at address. Misaligned fetches and
    /// fetches from unmapped addresses (or from a device that
    /// refuses the read) raise instruction-address traps.
    pub fn fetch_instruction(&mut self, address: u32) -> Result<u32, AddressTrap> {
        let fault = AddressTrap::new(AddressTrapKind::InstructionAccessFault, address);
        if address & 0b11 != 0 {
            return Err(AddressTrap::new(
                AddressTrapKind::InstructionMisaligned,
                address,
            ));
        }
        let (peripheral, offset) = self.route(address).ok_or(fault)?;
        let mut peripheral = peripheral.try_borrow_mut().map_err(|_| fault)?;
        peripheral.read_word(offset).map_err(|_| fault)
    }

    pub fn set_reservation(&mut self, address: u32) {
        log::debug!("reservation set at 0x{:08x}", address & !0b11);
        self.reservation = Some(address >> 2);
    }

    pub fn is_reserved(&self, address: u32) -> bool {
        self.reservation == Some(address >> 2)
    }

    pub fn clear_reservation(&mut self) {
        self.reservation = None;
    }

    /// Called after every successful store
    fn invalidate_reservation(&mut self, address: u32) {
        if self.is_reserved(address) {
            log::debug!("reservation at 0x{:08x} cleared by store", address & !0b11);
            self.reservation = None;
        }
    }
}

/// Generates the body of a load: check alignment, route, and
/// delegate to the peripheral's read function
macro_rules! load_access {
    ($self:ident, $address:ident, $align:expr, $read:ident) => {{
        if $address & $align != 0 {
            return Err(AddressTrap::load_misaligned($address));
        }
        let (peripheral, offset) = $self
            .route($address)
            .ok_or(AddressTrap::load_fault($address))?;
        let mut peripheral = peripheral
            .try_borrow_mut()
            .map_err(|_| AddressTrap::load_fault($address))?;
        let value = peripheral.$read(offset);
        value.map_err(|trap| trap.at($address))
    }};
}

macro_rules! store_access {
    ($self:ident, $address:ident, $value:ident, $align:expr, $write:ident) => {{
        if $address & $align != 0 {
            return Err(AddressTrap::store_misaligned($address));
        }
        let (peripheral, offset) = $self
            .route($address)
            .ok_or(AddressTrap::store_fault($address))?;
        let result = match peripheral.try_borrow_mut() {
            Ok(mut peripheral) => peripheral.$write(offset, $value),
            Err(_) => Err(AddressTrap::store_fault($address)),
        };
        result.map_err(|trap| trap.at($address))?;
        $self.invalidate_reservation($address);
        Ok(())
    }};
}

impl BusAccess for SystemBus {
    fn load_byte(&mut self, address: u32) -> Result<u8, AddressTrap> {
        load_access!(self, address, 0b00, read_byte)
    }

    fn load_halfword(&mut self, address: u32) -> Result<u16, AddressTrap> {
        load_access!(self, address, 0b01, read_halfword)
    }

    fn load_word(&mut self, address: u32) -> Result<u32, AddressTrap> {
        load_access!(self, address, 0b11, read_word)
    }

    fn store_byte(&mut self, address: u32, value: u8) -> Result<(), AddressTrap> {
        store_access!(self, address, value, 0b00, write_byte)
    }

    fn store_halfword(&mut self, address: u32, value: u16) -> Result<(), AddressTrap> {
        store_access!(self, address, value, 0b01, write_halfword)
    }

    fn store_word(&mut self, address: u32, value: u32) -> Result<(), AddressTrap> {
        store_access!(self, address, value, 0b11, write_word)
    }
}
