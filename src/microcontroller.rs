//! Microcontroller
//!
//! The composition root: one hart, a ROM for program text at
//! address 0, a RAM for data at 0x1000_0000 and the interrupt
//! controller at 0xea00_1000. Further peripherals can be attached
//! anywhere else in the address space.
//!
//! Time advances in two phases. cycle() executes one instruction
//! and then gives every attached peripheral one cycle, followed by
//! the interrupt controller. timestep() is a coarser tick, called by
//! the owner of the microcontroller after a batch of cycles, which
//! lets devices finish work spanning many cycles (for example a DMA
//! transfer) before acting on the result.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::bus::{BusError, Peripheral, SharedPeripheral, SystemBus, PAGE_SIZE};
use crate::elf_image::{ElfError, ElfImage};
use crate::hart::trap::Trap;
use crate::hart::{Hart, RESET_VECTOR};
use crate::peripherals::interrupt_controller::{InterruptController, InterruptError};
use crate::peripherals::memory::MemoryError;
use crate::peripherals::{Ram, Rom, SharedInterruptSource};

pub const ROM_BASE: u32 = 0x0000_0000;
pub const RAM_BASE: u32 = 0x1000_0000;
/// First address above the region RAM may occupy
pub const RAM_TOP: u32 = 0x2000_0000;
pub const INTERRUPT_CONTROLLER_BASE: u32 = 0xea00_1000;

/// Sizes of the two memories, in 1 KiB pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicrocontrollerConfig {
    pub rom_pages: u32,
    pub ram_pages: u32,
}

impl Default for MicrocontrollerConfig {
    fn default() -> Self {
        Self {
            rom_pages: 64,
            ram_pages: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ROM of {0} pages does not fit below the RAM base 0x10000000")]
    RomTooLarge(u32),
    #[error("RAM of {0} pages does not fit below 0x20000000")]
    RamTooLarge(u32),
    #[error(transparent)]
    Bus(#[from] BusError),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Elf(#[from] ElfError),
    #[error("segment 0x{base:08x}-0x{end:08x} spans ROM and RAM")]
    SegmentSpansRegions { base: u32, end: u64 },
    #[error("segment 0x{base:08x}-0x{end:08x} is outside both ROM and RAM")]
    SegmentOutsideMemory { base: u32, end: u64 },
    #[error("segment 0x{base:08x}-0x{end:08x} does not fit in {size} bytes of {region}")]
    SegmentTooLarge {
        base: u32,
        end: u64,
        size: usize,
        region: &'static str,
    },
    #[error("could not write segment at 0x{base:08x}: {source}")]
    Write { base: u32, source: MemoryError },
}

/// Where a segment is placed by the loader
enum Region {
    Rom(u32),
    Ram(u32),
}

/// The region is chosen by the base address; the end must then lie
/// in the same region
fn classify_segment(base: u32, len: usize) -> Result<Region, LoaderError> {
    let end = u64::from(base) + len as u64;
    if base < RAM_BASE {
        if end > u64::from(RAM_BASE) {
            return Err(LoaderError::SegmentSpansRegions { base, end });
        }
        Ok(Region::Rom(base - ROM_BASE))
    } else if base < RAM_TOP && end <= u64::from(RAM_TOP) {
        Ok(Region::Ram(base - RAM_BASE))
    } else {
        Err(LoaderError::SegmentOutsideMemory { base, end })
    }
}

/// Initial stack pointer: the top word of RAM, rounded down to an
/// 8-byte boundary
fn initial_stack_pointer(ram_pages: u32) -> u32 {
    (RAM_BASE + ram_pages * PAGE_SIZE - 1) & !0b111
}

pub struct Microcontroller {
    hart: Hart,
    config: MicrocontrollerConfig,
    rom: Rc<RefCell<Rom>>,
    ram: Rc<RefCell<Ram>>,
    interrupt_controller: Rc<RefCell<InterruptController>>,
    /// Peripherals attached by the owner, in attachment order
    peripherals: Vec<SharedPeripheral>,
}

impl Microcontroller {
    pub fn new(config: MicrocontrollerConfig) -> Result<Self, ConfigError> {
        let MicrocontrollerConfig {
            rom_pages,
            ram_pages,
        } = config;
        if u64::from(rom_pages) * u64::from(PAGE_SIZE) > u64::from(RAM_BASE - ROM_BASE) {
            return Err(ConfigError::RomTooLarge(rom_pages));
        }
        if u64::from(ram_pages) * u64::from(PAGE_SIZE) > u64::from(RAM_TOP - RAM_BASE) {
            return Err(ConfigError::RamTooLarge(ram_pages));
        }

        let rom = Rc::new(RefCell::new(Rom::new(rom_pages)));
        let ram = Rc::new(RefCell::new(Ram::new(ram_pages)));
        let interrupt_controller = Rc::new(RefCell::new(InterruptController::new()));

        let mut bus = SystemBus::new();
        bus.attach(rom.clone(), ROM_BASE)?;
        bus.attach(ram.clone(), RAM_BASE)?;
        bus.attach(interrupt_controller.clone(), INTERRUPT_CONTROLLER_BASE)?;

        let mut hart = Hart::new(bus);
        hart.set_x(2, initial_stack_pointer(ram_pages));

        Ok(Self {
            hart,
            config,
            rom,
            ram,
            interrupt_controller,
            peripherals: Vec::new(),
        })
    }

    /// Map a peripheral at base_address. It will be cycled and
    /// timestepped after the peripherals attached before it.
    pub fn attach_peripheral(
        &mut self,
        peripheral: SharedPeripheral,
        base_address: u32,
    ) -> Result<(), BusError> {
        self.hart.bus.attach(peripheral.clone(), base_address)?;
        self.peripherals.push(peripheral);
        Ok(())
    }

    /// Connect an interrupt source to an interrupt controller line
    pub fn register_interrupt(
        &mut self,
        source: SharedInterruptSource,
        line: usize,
    ) -> Result<(), InterruptError> {
        self.interrupt_controller
            .borrow_mut()
            .register_source(source, line)
    }

    /// Replace the contents of ROM and RAM with the loadable
    /// segments of an ELF image. Every segment is checked before
    /// anything is written, so a rejected image leaves memory
    /// untouched. Both memories are zeroed first, which also
    /// supplies the part of each segment beyond its file data. The
    /// pc is not changed (see reset()).
    pub fn load_elf(&mut self, elf: &ElfImage) -> Result<(), LoaderError> {
        let rom_size = self.rom.borrow().size();
        let ram_size = self.ram.borrow().size();

        let mut placements = Vec::new();
        for segment in &elf.program_headers {
            let base = segment.base_address;
            let len = segment.data.len().max(segment.memory_size as usize);
            let region = classify_segment(base, len)?;
            let (offset, size, name) = match region {
                Region::Rom(offset) => (offset, rom_size, "ROM"),
                Region::Ram(offset) => (offset, ram_size, "RAM"),
            };
            if offset as usize + len > size {
                return Err(LoaderError::SegmentTooLarge {
                    base,
                    end: u64::from(base) + len as u64,
                    size,
                    region: name,
                });
            }
            placements.push((region, base, &segment.data));
        }

        let mut rom = self.rom.borrow_mut();
        let mut ram = self.ram.borrow_mut();
        rom.erase();
        ram.clear();
        for (region, base, data) in placements {
            log::info!("segment 0x{base:08x}: {} bytes", data.len());
            let written = match region {
                Region::Rom(offset) => rom.program(offset, data),
                Region::Ram(offset) => ram.write_bytes(offset, data),
            };
            written.map_err(|source| LoaderError::Write { base, source })?;
        }
        log::info!(
            "loaded {} segments, entry point 0x{:08x}",
            elf.program_headers.len(),
            elf.entry_point
        );
        Ok(())
    }

    /// Reset the hart: the pc goes to the reset vector, registers
    /// and CSRs are cleared and the stack pointer is set to the top
    /// of RAM. The interrupt controller is reset too. Memory
    /// contents are kept.
    pub fn reset(&mut self) {
        self.hart.reset();
        self.hart.set_x(2, initial_stack_pointer(self.config.ram_pages));
        self.interrupt_controller.borrow_mut().reset();
        log::info!("reset, pc = 0x{RESET_VECTOR:08x}");
    }

    /// One instruction cycle: the hart steps, then every attached
    /// peripheral cycles in attachment order, then the interrupt
    /// controller polls its sources and may interrupt the hart.
    /// Returns the trap the hart took during its step, if any.
    pub fn cycle(&mut self) -> Result<(), Trap> {
        let result = self.hart.step();
        for peripheral in &self.peripherals {
            peripheral.borrow_mut().cycle(&mut self.hart.bus);
        }
        let mut interrupt_controller = self.interrupt_controller.borrow_mut();
        interrupt_controller.cycle(&mut self.hart.bus);
        if interrupt_controller
            .dispatch(self.hart.interrupts_enabled())
            .is_some()
        {
            self.hart.raise_external_interrupt();
        }
        result
    }

    /// The coarse tick. Must only be called between cycles.
    pub fn timestep(&mut self) {
        for peripheral in &self.peripherals {
            peripheral.borrow_mut().timestep(&mut self.hart.bus);
        }
        self.interrupt_controller
            .borrow_mut()
            .timestep(&mut self.hart.bus);
    }

    pub fn config(&self) -> MicrocontrollerConfig {
        self.config
    }

    pub fn hart(&self) -> &Hart {
        &self.hart
    }

    pub fn hart_mut(&mut self) -> &mut Hart {
        &mut self.hart
    }

    pub fn rom(&self) -> &Rc<RefCell<Rom>> {
        &self.rom
    }

    pub fn ram(&self) -> &Rc<RefCell<Ram>> {
        &self.ram
    }

    pub fn interrupt_controller(&self) -> &Rc<RefCell<InterruptController>> {
        &self.interrupt_controller
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::bus::{AddressTrap, BusAccess};
    use crate::elf_image::ProgramHeader;
    use crate::encode::*;
    use crate::peripherals::{InterruptSource, Timer};

    fn program_bytes(program: &[u32]) -> Vec<u8> {
        program.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    fn image(segments: Vec<(u32, Vec<u8>)>) -> ElfImage {
        ElfImage {
            entry_point: RESET_VECTOR,
            program_headers: segments
                .into_iter()
                .map(|(base_address, data)| ProgramHeader {
                    header_type: 1,
                    base_address,
                    memory_size: data.len() as u32,
                    data,
                })
                .collect(),
        }
    }

    fn small() -> Microcontroller {
        Microcontroller::new(MicrocontrollerConfig {
            rom_pages: 4,
            ram_pages: 5,
        })
        .unwrap()
    }

    #[test]
    fn check_stack_pointer_primed() {
        let mcu = small();
        assert_eq!(mcu.hart().x(2), 0x1000_13f8);
        assert_eq!(mcu.hart().pc(), RESET_VECTOR);
    }

    #[test]
    fn check_oversized_memories_rejected() {
        let result = Microcontroller::new(MicrocontrollerConfig {
            rom_pages: 0x4_0001,
            ram_pages: 1,
        });
        assert!(matches!(result, Err(ConfigError::RomTooLarge(0x4_0001))));
        let result = Microcontroller::new(MicrocontrollerConfig {
            rom_pages: 1,
            ram_pages: 0x4_0001,
        });
        assert!(matches!(result, Err(ConfigError::RamTooLarge(0x4_0001))));
    }

    #[test]
    fn check_add_program_returns_42() {
        let mut mcu = small();
        let program = [addi(5, 10, 0), add(10, 10, 5), jalr(0, 1, 0)];
        mcu.load_elf(&image(vec![(RESET_VECTOR, program_bytes(&program))]))
            .unwrap();
        mcu.reset();
        mcu.hart_mut().set_x(10, 21);
        mcu.hart_mut().set_x(1, 0xddcc_ddcc);
        for _ in 0..3 {
            mcu.cycle().unwrap();
        }
        assert_eq!(mcu.hart().x(10), 42);
        assert_eq!(mcu.hart().pc(), 0xddcc_ddcc);
    }

    #[test]
    fn check_segments_placed_in_rom_and_ram() {
        let mut mcu = small();
        let elf = image(vec![
            (0x200, vec![1, 2, 3, 4]),
            (0x1000_0010, vec![5, 6, 7, 8, 0, 0]),
        ]);
        mcu.load_elf(&elf).unwrap();
        assert_eq!(mcu.rom().borrow().read_bytes(0x200, 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(mcu.ram().borrow().read_bytes(0x10, 4).unwrap(), &[5, 6, 7, 8]);
        assert_eq!(mcu.hart_mut().load_word(0x1000_0010).unwrap(), 0x0807_0605);
    }

    #[test]
    fn check_spanning_segment_rejected() {
        let mut mcu = small();
        let elf = image(vec![(0x0fff_fffc, vec![0; 8])]);
        let result = mcu.load_elf(&elf);
        assert!(matches!(result, Err(LoaderError::SegmentSpansRegions { .. })));
    }

    #[test]
    fn check_segment_outside_memory_rejected() {
        let mut mcu = small();
        let elf = image(vec![(0x2000_0000, vec![0; 4])]);
        let result = mcu.load_elf(&elf);
        assert!(matches!(result, Err(LoaderError::SegmentOutsideMemory { .. })));
    }

    #[test]
    fn check_segment_larger_than_rom_rejected() {
        let mut mcu = small();
        let elf = image(vec![(0xffc, vec![0; 8])]);
        let result = mcu.load_elf(&elf);
        assert!(matches!(
            result,
            Err(LoaderError::SegmentTooLarge { region: "ROM", .. })
        ));
    }

    #[test]
    fn check_rejected_image_leaves_memory_untouched() {
        let mut mcu = small();
        mcu.load_elf(&image(vec![(0x200, vec![9; 4])])).unwrap();
        let bad = image(vec![(0x200, vec![1; 4]), (0x3000_0000, vec![0; 4])]);
        assert!(mcu.load_elf(&bad).is_err());
        assert_eq!(mcu.rom().borrow().read_bytes(0x200, 4).unwrap(), &[9; 4]);
    }

    #[test]
    fn check_rom_is_read_only_to_programs() {
        let mut mcu = small();
        let program = [sw(0, 0, 0x100)];
        mcu.load_elf(&image(vec![(RESET_VECTOR, program_bytes(&program))]))
            .unwrap();
        mcu.reset();
        let trap = mcu.cycle().unwrap_err();
        assert_eq!(trap.mcause(), 7);
    }

    #[test]
    fn check_reset_restores_pc_and_stack_pointer() {
        let mut mcu = small();
        mcu.hart_mut().pc = 0x400;
        mcu.hart_mut().set_x(2, 0);
        mcu.hart_mut().set_x(3, 1);
        mcu.reset();
        assert_eq!(mcu.hart().pc(), RESET_VECTOR);
        assert_eq!(mcu.hart().x(2), 0x1000_13f8);
        assert_eq!(mcu.hart().x(3), 0);
    }

    #[test]
    fn check_attached_peripheral_is_cycled() {
        let mut mcu = small();
        let timer = Rc::new(RefCell::new(Timer::new()));
        mcu.attach_peripheral(timer.clone(), 0xe900_0000).unwrap();
        // Start the timer from the host side
        mcu.hart_mut().bus.store_word(0xe900_0000, 1).unwrap();
        for _ in 0..5 {
            let _ = mcu.cycle();
        }
        assert_eq!(timer.borrow().counter(), 5);
    }

    #[test]
    fn check_attach_over_ram_fails() {
        let mut mcu = small();
        let timer = Rc::new(RefCell::new(Timer::new()));
        let result = mcu.attach_peripheral(timer, RAM_BASE);
        assert!(matches!(result, Err(BusError::PageInUse(RAM_BASE))));
    }

    #[test]
    fn check_register_interrupt_invalid_line() {
        let mut mcu = small();
        let timer = Rc::new(RefCell::new(Timer::new()));
        let result = mcu.register_interrupt(timer, 32);
        assert_eq!(result, Err(InterruptError::InvalidLine(32)));
    }

    #[test]
    fn check_empty_segment_at_ram_base_loads() {
        let mut mcu = small();
        assert!(mcu.load_elf(&image(vec![(RAM_BASE, vec![])])).is_ok());
    }

    #[test]
    fn check_memory_beyond_file_data_zeroed() {
        let mut mcu = small();
        mcu.load_elf(&image(vec![(RAM_BASE, vec![0xff; 8])])).unwrap();
        let elf = ElfImage {
            entry_point: RESET_VECTOR,
            program_headers: vec![ProgramHeader {
                header_type: 1,
                base_address: RAM_BASE,
                memory_size: 8,
                data: vec![1, 2],
            }],
        };
        mcu.load_elf(&elf).unwrap();
        assert_eq!(
            mcu.ram().borrow().read_bytes(0, 8).unwrap(),
            &[1, 2, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn check_file_data_past_end_of_rom_rejected() {
        let mut mcu = small();
        mcu.load_elf(&image(vec![(0xffc, vec![9; 4])])).unwrap();
        let elf = ElfImage {
            entry_point: RESET_VECTOR,
            program_headers: vec![ProgramHeader {
                header_type: 1,
                base_address: 0xffc,
                memory_size: 4,
                data: vec![1; 8],
            }],
        };
        let result = mcu.load_elf(&elf);
        assert!(matches!(
            result,
            Err(LoaderError::SegmentTooLarge { region: "ROM", .. })
        ));
        assert_eq!(mcu.rom().borrow().read_bytes(0xffc, 4).unwrap(), &[9; 4]);
    }

    type Log = Rc<RefCell<Vec<String>>>;

    /// Device that records its cycle and timestep calls, and
    /// requests an interrupt once it has been cycled
    struct Recorder {
        name: &'static str,
        log: Log,
        asserting: bool,
    }

    impl Recorder {
        fn shared(name: &'static str, log: &Log) -> Rc<RefCell<Recorder>> {
            Rc::new(RefCell::new(Recorder {
                name,
                log: log.clone(),
                asserting: false,
            }))
        }
    }

    impl Peripheral for Recorder {
        fn number_of_pages(&self) -> u32 {
            1
        }

        fn read_word(&mut self, offset: u32) -> Result<u32, AddressTrap> {
            Err(AddressTrap::load_fault(offset))
        }

        fn write_word(&mut self, offset: u32, _value: u32) -> Result<(), AddressTrap> {
            Err(AddressTrap::store_fault(offset))
        }

        fn cycle(&mut self, _bus: &mut dyn BusAccess) {
            self.log.borrow_mut().push(format!("{} cycle", self.name));
            self.asserting = true;
        }

        fn timestep(&mut self, _bus: &mut dyn BusAccess) {
            self.log.borrow_mut().push(format!("{} timestep", self.name));
        }
    }

    impl InterruptSource for Recorder {
        fn interrupt_asserted(&self) -> bool {
            self.asserting
        }

        fn acknowledge_interrupt(&mut self) {
            self.asserting = false;
        }
    }

    /// Microcontroller spinning at the reset vector
    fn spinning() -> Microcontroller {
        let mut mcu = small();
        let program = [jal(0, 0)];
        mcu.load_elf(&image(vec![(RESET_VECTOR, program_bytes(&program))]))
            .unwrap();
        mcu.reset();
        mcu
    }

    #[test]
    fn check_cycle_and_timestep_order() {
        let mut mcu = spinning();
        let log = Log::default();
        mcu.attach_peripheral(Recorder::shared("a", &log), 0xe800_0000)
            .unwrap();
        mcu.attach_peripheral(Recorder::shared("b", &log), 0xe800_0400)
            .unwrap();
        mcu.cycle().unwrap();
        mcu.cycle().unwrap();
        assert_eq!(*log.borrow(), ["a cycle", "b cycle", "a cycle", "b cycle"]);
        mcu.timestep();
        assert_eq!(&log.borrow()[4..], ["a timestep", "b timestep"]);
    }

    #[test]
    fn check_interrupt_controller_sees_peripheral_cycle() {
        let mut mcu = spinning();
        let log = Log::default();
        let recorder = Recorder::shared("a", &log);
        mcu.attach_peripheral(recorder.clone(), 0xe800_0000)
            .unwrap();
        mcu.register_interrupt(recorder.clone(), 3).unwrap();
        {
            let mut pic = mcu.interrupt_controller().borrow_mut();
            pic.set_master_enable(true);
            pic.set_enabled(3, true).unwrap();
        }
        mcu.hart_mut().csr.write(0x300, 1).unwrap();

        // The device only asserts from inside its cycle(), so the
        // controller must poll after it within the same cycle
        mcu.cycle().unwrap();
        assert!(recorder.borrow().asserting);
        assert!(mcu.interrupt_controller().borrow().pending(3).unwrap());
        assert!(mcu.hart().external_interrupt_pending());
        assert!(mcu.cycle().is_err());
    }

    const DMA_TARGET: u32 = RAM_BASE + 0x100;

    /// Device that stores its cycle count into RAM every cycle and
    /// reads it back on the timestep
    struct Dma {
        base: u32,
        count: u32,
        read_back: Option<u32>,
        own_register_cause: Option<u32>,
    }

    impl Peripheral for Dma {
        fn number_of_pages(&self) -> u32 {
            1
        }

        fn read_word(&mut self, _offset: u32) -> Result<u32, AddressTrap> {
            Ok(self.count)
        }

        fn write_word(&mut self, offset: u32, _value: u32) -> Result<(), AddressTrap> {
            Err(AddressTrap::store_fault(offset))
        }

        fn cycle(&mut self, bus: &mut dyn BusAccess) {
            if let Err(trap) = bus.load_word(self.base) {
                self.own_register_cause = Some(trap.cause());
            }
            self.count += 1;
            let _ = bus.store_word(DMA_TARGET, self.count);
        }

        fn timestep(&mut self, bus: &mut dyn BusAccess) {
            self.read_back = bus.load_word(DMA_TARGET).ok();
        }
    }

    #[test]
    fn check_peripheral_dma_through_bus() {
        let mut mcu = spinning();
        let dma = Rc::new(RefCell::new(Dma {
            base: 0xe800_0000,
            count: 0,
            read_back: None,
            own_register_cause: None,
        }));
        mcu.attach_peripheral(dma.clone(), 0xe800_0000).unwrap();
        for _ in 0..3 {
            mcu.cycle().unwrap();
        }
        assert_eq!(mcu.hart_mut().load_word(DMA_TARGET).unwrap(), 3);
        mcu.timestep();
        assert_eq!(dma.borrow().read_back, Some(3));
        // A device reaching its own registers gets an access fault
        assert_eq!(dma.borrow().own_register_cause, Some(5));
    }
}
